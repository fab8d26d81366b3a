//! Chain registry: node storage, linking, and id minting
//!
//! A chain is a singly linked list of nodes keyed by string id in one shared
//! map. The head of each chain is its master node (`master_id == None`, id is
//! the user-supplied event name); every other node is a slave carrying a
//! minted id. Master names and minted ids share a single namespace.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::context::ChainListener;
use crate::error::{ChainError, Result};

/// Shared handle to a registered listener.
pub type Listener<T> = Arc<dyn ChainListener<T>>;

/// Precedence assigned to appended listeners when none is given.
pub const DEFAULT_PRECEDENCE: i64 = 100;

/// Precedence pinned on master nodes. Masters have no ordering position; the
/// value only exists so the append walk can start at the head.
pub(crate) const MASTER_PRECEDENCE: i64 = -1;

pub(crate) struct ChainNode<T> {
    pub(crate) callback: Listener<T>,
    /// Back-reference to the chain's master; `None` exactly on the master.
    pub(crate) master_id: Option<String>,
    /// Forward link; `None` on the current tail.
    pub(crate) next_id: Option<String>,
    /// Ordering key, consulted only while inserting via append.
    pub(crate) precedence: i64,
}

/// Snapshot of a single node, as returned by [`lookup`].
///
/// [`lookup`]: crate::core::chain::EventChains::lookup
pub struct NodeRef<T> {
    pub id: String,
    pub master_id: Option<String>,
    pub next_id: Option<String>,
    pub precedence: i64,
    pub callback: Listener<T>,
}

pub(crate) struct Registry<T> {
    nodes: HashMap<String, ChainNode<T>>,
    uid: u64,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            uid: 0,
        }
    }

    /// Mints an id that is unused anywhere in the registry, including among
    /// user-chosen master names. The counter makes uniqueness a guarantee
    /// rather than a probability; the seed keeps ids readable.
    fn mint_id(&mut self, seed: &str) -> String {
        loop {
            self.uid += 1;
            let id = format!("{seed}#{:x}", self.uid);
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Creates the master node for `master` if it does not exist (returning
    /// the master name itself), otherwise inserts a new slave ordered by
    /// `precedence`: after every slave of lower-or-equal precedence, before
    /// the first slave of strictly greater precedence. Equal precedence is
    /// stable, so later registrations land after earlier ones.
    pub(crate) fn append(&mut self, master: &str, precedence: i64, callback: Listener<T>) -> String {
        if !self.nodes.contains_key(master) {
            self.nodes.insert(
                master.to_string(),
                ChainNode {
                    callback,
                    master_id: None,
                    next_id: None,
                    precedence: MASTER_PRECEDENCE,
                },
            );
            return master.to_string();
        }

        let mut cursor = master.to_string();
        loop {
            let next = match self.nodes.get(&cursor).and_then(|n| n.next_id.clone()) {
                Some(next) => next,
                None => break,
            };
            match self.nodes.get(&next) {
                Some(node) if node.precedence <= precedence => cursor = next,
                _ => break,
            }
        }

        let id = self.mint_id(master);
        let old_next = self.nodes.get(&cursor).and_then(|n| n.next_id.clone());
        self.nodes.insert(
            id.clone(),
            ChainNode {
                callback,
                master_id: Some(master.to_string()),
                next_id: old_next,
                precedence,
            },
        );
        if let Some(anchor) = self.nodes.get_mut(&cursor) {
            anchor.next_id = Some(id.clone());
        }
        id
    }

    /// Splices a new slave directly after `anchor`, ignoring precedence.
    pub(crate) fn insert_after(&mut self, anchor: &str, callback: Listener<T>) -> Result<String> {
        let (master_id, old_next) = match self.nodes.get(anchor) {
            Some(node) => (
                node.master_id.clone().unwrap_or_else(|| anchor.to_string()),
                node.next_id.clone(),
            ),
            None => return Err(ChainError::UnknownEvent(anchor.to_string())),
        };

        let id = self.mint_id(anchor);
        self.nodes.insert(
            id.clone(),
            ChainNode {
                callback,
                master_id: Some(master_id),
                next_id: old_next,
                precedence: DEFAULT_PRECEDENCE,
            },
        );
        if let Some(anchor) = self.nodes.get_mut(anchor) {
            anchor.next_id = Some(id.clone());
        }
        Ok(id)
    }

    /// Deletes `master` and every node reachable from it.
    pub(crate) fn remove_chain(&mut self, master: &str) -> bool {
        if !self.nodes.contains_key(master) {
            return false;
        }
        let mut ids = vec![master.to_string()];
        let mut cursor = master.to_string();
        while let Some(next) = self.nodes.get(&cursor).and_then(|n| n.next_id.clone()) {
            ids.push(next.clone());
            cursor = next;
        }
        for id in ids {
            self.nodes.remove(&id);
        }
        true
    }

    /// Removes one node. Master ids take the whole chain down; slave ids are
    /// spliced out by relinking the predecessor. Returns the traversal error
    /// when the predecessor cannot be found (inconsistent chain).
    pub(crate) fn remove(&mut self, id: &str) -> Result<bool> {
        let master = match self.nodes.get(id) {
            Some(node) => match &node.master_id {
                Some(master) => master.clone(),
                None => return Ok(self.remove_chain(id)),
            },
            None => return Ok(false),
        };

        let removed_next = self.nodes.get(id).and_then(|n| n.next_id.clone());
        let prev = self.predecessor_of(id, &master)?;
        if let Some(node) = self.nodes.get_mut(&prev) {
            node.next_id = removed_next;
        }
        self.nodes.remove(id);
        Ok(true)
    }

    fn predecessor_of(&self, id: &str, master: &str) -> Result<String> {
        let mut cursor = master.to_string();
        loop {
            let node = self.nodes.get(&cursor).ok_or_else(|| {
                ChainError::BrokenChain(format!(
                    "node {cursor} missing while seeking predecessor of {id}"
                ))
            })?;
            match &node.next_id {
                Some(next) if next == id => return Ok(cursor),
                Some(next) => cursor = next.clone(),
                None => {
                    return Err(ChainError::BrokenChain(format!(
                        "no predecessor of {id} reachable from {master}"
                    )))
                }
            }
        }
    }

    pub(crate) fn master_names(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.master_id.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn follower_count(&self, master: &str) -> usize {
        self.follower_ids(master).len()
    }

    pub(crate) fn followers(&self, master: &str) -> Vec<Listener<T>> {
        self.follower_ids(master)
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| n.callback.clone()))
            .collect()
    }

    fn follower_ids(&self, master: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut cursor = match self.nodes.get(master) {
            Some(_) => master.to_string(),
            None => return ids,
        };
        while let Some(next) = self.nodes.get(&cursor).and_then(|n| n.next_id.clone()) {
            ids.push(next.clone());
            cursor = next;
        }
        ids
    }

    pub(crate) fn get(&self, id: &str) -> Option<&ChainNode<T>> {
        self.nodes.get(id)
    }

    pub(crate) fn snapshot(&self, id: &str) -> Option<NodeRef<T>> {
        self.nodes.get(id).map(|node| NodeRef {
            id: id.to_string(),
            master_id: node.master_id.clone(),
            next_id: node.next_id.clone(),
            precedence: node.precedence,
            callback: node.callback.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::StepContext;

    fn noop() -> Listener<i32> {
        Arc::new(|_ctx: StepContext<i32>| {})
    }

    fn chain_order(reg: &Registry<i32>, master: &str) -> Vec<i64> {
        reg.follower_ids(master)
            .iter()
            .map(|id| reg.get(id).unwrap().precedence)
            .collect()
    }

    #[test]
    fn test_first_append_creates_master() {
        let mut reg = Registry::new();
        let id = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        assert_eq!(id, "boot");

        let node = reg.get("boot").unwrap();
        assert!(node.master_id.is_none());
        assert!(node.next_id.is_none());
        assert_eq!(node.precedence, MASTER_PRECEDENCE);
    }

    #[test]
    fn test_append_keeps_registration_order_for_default_precedence() {
        let mut reg = Registry::new();
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s0 = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s1 = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s2 = reg.append("boot", DEFAULT_PRECEDENCE, noop());

        assert_eq!(reg.follower_ids("boot"), vec![s0, s1, s2]);
        assert_eq!(reg.follower_count("boot"), 3);
    }

    #[test]
    fn test_append_orders_by_precedence() {
        let mut reg = Registry::new();
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        reg.append("boot", 100, noop());
        reg.append("boot", 10, noop());
        reg.append("boot", 50, noop());
        reg.append("boot", 150, noop());

        assert_eq!(chain_order(&reg, "boot"), vec![10, 50, 100, 150]);
    }

    #[test]
    fn test_lowest_precedence_lands_before_first_slave() {
        let mut reg = Registry::new();
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        reg.append("boot", 10, noop());
        reg.append("boot", 5, noop());

        assert_eq!(chain_order(&reg, "boot"), vec![5, 10]);
    }

    #[test]
    fn test_equal_precedence_is_stable() {
        let mut reg = Registry::new();
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s0 = reg.append("boot", 50, noop());
        let s1 = reg.append("boot", 50, noop());
        let s2 = reg.append("boot", 50, noop());

        assert_eq!(reg.follower_ids("boot"), vec![s0, s1, s2]);
    }

    #[test]
    fn test_insert_after_master() {
        let mut reg = Registry::new();
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s0 = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let inserted = reg.insert_after("boot", noop()).unwrap();

        assert_eq!(reg.follower_ids("boot"), vec![inserted.clone(), s0]);
        let node = reg.get(&inserted).unwrap();
        assert_eq!(node.master_id.as_deref(), Some("boot"));
    }

    #[test]
    fn test_insert_after_slave_inherits_master() {
        let mut reg = Registry::new();
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s0 = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s1 = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let inserted = reg.insert_after(&s0, noop()).unwrap();

        assert_eq!(reg.follower_ids("boot"), vec![s0, inserted.clone(), s1]);
        assert_eq!(reg.get(&inserted).unwrap().master_id.as_deref(), Some("boot"));
    }

    #[test]
    fn test_insert_after_unknown_anchor() {
        let mut reg: Registry<i32> = Registry::new();
        let err = reg.insert_after("ghost", noop()).unwrap_err();
        assert!(matches!(err, ChainError::UnknownEvent(_)));
    }

    #[test]
    fn test_remove_chain_deletes_every_node() {
        let mut reg = Registry::new();
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s0 = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s1 = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        reg.append("other", DEFAULT_PRECEDENCE, noop());

        assert!(reg.remove_chain("boot"));
        assert!(reg.get("boot").is_none());
        assert!(reg.get(&s0).is_none());
        assert!(reg.get(&s1).is_none());
        assert_eq!(reg.master_names(), vec!["other".to_string()]);
        assert!(!reg.remove_chain("boot"));
    }

    #[test]
    fn test_remove_slave_preserves_connectivity() {
        let mut reg = Registry::new();
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s0 = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s1 = reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s2 = reg.append("boot", DEFAULT_PRECEDENCE, noop());

        assert!(reg.remove(&s1).unwrap());
        assert_eq!(reg.follower_ids("boot"), vec![s0, s2]);
        assert!(!reg.remove(&s1).unwrap());
    }

    #[test]
    fn test_remove_master_id_removes_whole_chain() {
        let mut reg = Registry::new();
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s0 = reg.append("boot", DEFAULT_PRECEDENCE, noop());

        assert!(reg.remove("boot").unwrap());
        assert!(reg.get("boot").is_none());
        assert!(reg.get(&s0).is_none());
        assert!(reg.master_names().is_empty());
    }

    #[test]
    fn test_minted_ids_skip_taken_names() {
        let mut reg = Registry::new();
        // Occupy the id the first mint for "boot" would produce.
        reg.append("boot#1", DEFAULT_PRECEDENCE, noop());
        reg.append("boot", DEFAULT_PRECEDENCE, noop());
        let s0 = reg.append("boot", DEFAULT_PRECEDENCE, noop());

        assert_ne!(s0, "boot#1");
        assert_eq!(reg.follower_count("boot"), 1);
        assert_eq!(reg.follower_count("boot#1"), 0);
    }
}

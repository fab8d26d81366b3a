//! Public handle over one registry: registration, removal, introspection,
//! and the dispatcher that drives chains forward.
//!
//! Dispatch is purely reactive. `emit` invokes exactly one listener; every
//! later step happens as a direct consequence of that listener consuming its
//! context. The interior lock only serializes raw map access and is always
//! released before user code runs, so listeners are free to re-enter the
//! registry (advance, terminate, register, remove) without deadlocking.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::core::context::{ChainListener, SharedPayload, StepContext, Termination};
use crate::core::registry::{Listener, NodeRef, Registry, DEFAULT_PRECEDENCE};
use crate::error::Result;

/// A registry of event chains plus the dispatcher that runs them.
///
/// Cloning is cheap and clones share the same registry; a clone rides inside
/// every [`StepContext`] so listeners can reach back into the engine.
pub struct EventChains<T> {
    inner: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for EventChains<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for EventChains<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventChains<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry::new())),
        }
    }

    /// Registers `listener` at the end of its precedence band on `master`'s
    /// chain, at [`DEFAULT_PRECEDENCE`]. The first registration for a name
    /// creates the master node and returns the name itself; later ones return
    /// the new slave's minted id.
    pub fn register_append<L>(&self, master: &str, listener: L) -> String
    where
        L: ChainListener<T> + 'static,
    {
        self.register_append_at(master, DEFAULT_PRECEDENCE, listener)
    }

    /// Like [`register_append`], with an explicit precedence. Lower values run
    /// earlier; equal values keep registration order. Master creation ignores
    /// the precedence entirely.
    ///
    /// [`register_append`]: EventChains::register_append
    pub fn register_append_at<L>(&self, master: &str, precedence: i64, listener: L) -> String
    where
        L: ChainListener<T> + 'static,
    {
        let id = self
            .inner
            .lock()
            .append(master, precedence, Arc::new(listener));
        debug!("registered {id} on chain {master} (precedence {precedence})");
        id
    }

    /// Splices `listener` directly after the node `anchor`, ignoring
    /// precedence. Note that when the anchor is the master, the new node
    /// becomes the chain's first slave and therefore runs before everything
    /// registered earlier. Fails with `UnknownEvent` for a missing anchor.
    pub fn register_after<L>(&self, anchor: &str, listener: L) -> Result<String>
    where
        L: ChainListener<T> + 'static,
    {
        let id = self.inner.lock().insert_after(anchor, Arc::new(listener))?;
        debug!("registered {id} directly after {anchor}");
        Ok(id)
    }

    /// Deletes a master and all of its slaves. `false` if no such node.
    pub fn remove_chain(&self, master: &str) -> bool {
        let removed = self.inner.lock().remove_chain(master);
        if removed {
            debug!("removed chain {master}");
        }
        removed
    }

    /// Deletes one node, relinking its neighbors; a master id removes the
    /// whole chain. `false` for unknown ids or an inconsistent chain.
    pub fn remove_node(&self, id: &str) -> bool {
        match self.inner.lock().remove(id) {
            Ok(removed) => removed,
            Err(err) => {
                warn!("cannot remove {id}: {err}");
                false
            }
        }
    }

    /// Every registered master event name, in no particular order.
    pub fn master_names(&self) -> Vec<String> {
        self.inner.lock().master_names()
    }

    /// Number of slaves on `master`'s chain; 0 for unknown names.
    pub fn follower_count(&self, master: &str) -> usize {
        self.inner.lock().follower_count(master)
    }

    /// The slave callbacks of `master`'s chain, in execution order.
    pub fn followers(&self, master: &str) -> Vec<Listener<T>> {
        self.inner.lock().followers(master)
    }

    /// Snapshot of a single node.
    pub fn lookup(&self, id: &str) -> Option<NodeRef<T>> {
        self.inner.lock().snapshot(id)
    }

    /// Starts a chain invocation. For a master name this wraps `payload` as
    /// the invocation's shared data and invokes the first slave, or the
    /// master's own callback directly when the chain has no slaves (in which
    /// case no completion signal is expected). For a slave id, the re-entrant
    /// form, it invokes that node directly. `false` if `event` is unknown.
    pub fn emit(&self, event: &str, payload: Vec<T>) -> bool {
        let target = {
            let registry = self.inner.lock();
            match registry.get(event) {
                Some(node) if node.master_id.is_none() => node
                    .next_id
                    .clone()
                    .unwrap_or_else(|| event.to_string()),
                Some(_) => event.to_string(),
                None => {
                    trace!("emit on unknown event {event}");
                    return false;
                }
            }
        };
        self.dispatch(&target, Arc::new(Mutex::new(payload)))
    }

    /// Invokes one node's listener with a fresh context carrying `data`.
    pub(crate) fn dispatch(&self, id: &str, data: SharedPayload<T>) -> bool {
        let callback = {
            let registry = self.inner.lock();
            match registry.get(id) {
                Some(node) => node.callback.clone(),
                None => return false,
            }
        };
        trace!("dispatching {id}");
        let ctx = StepContext::new(self.clone(), id.to_string(), data);
        callback.call(ctx);
        true
    }

    /// The continuation behind [`StepContext::advance`]: dispatch the next
    /// node, or hand the context to the master at the tail. A next node that
    /// vanished mid-flight degrades to a premature hand-off rather than an
    /// error.
    pub(crate) fn advance(&self, mut ctx: StepContext<T>) {
        let next = self
            .inner
            .lock()
            .get(ctx.actual())
            .and_then(|node| node.next_id.clone());

        match next {
            Some(next_id) => {
                if !self.dispatch(&next_id, ctx.data()) {
                    warn!(
                        "next node {next_id} after {} vanished; premature hand-off to master",
                        ctx.actual()
                    );
                    ctx.mark(Termination::Premature);
                    self.invoke_master(ctx);
                }
            }
            None => {
                ctx.mark(Termination::Complete);
                self.invoke_master(ctx);
            }
        }
    }

    /// The stop behind [`StepContext::terminate`]. Soft marks the context
    /// premature and calls the master now; hard drops the context with no
    /// master call at all.
    pub(crate) fn terminate(&self, mut ctx: StepContext<T>, hard: bool) {
        if hard {
            trace!("hard terminate at {}; chain halted", ctx.actual());
            return;
        }
        ctx.mark(Termination::Premature);
        self.invoke_master(ctx);
    }

    /// Terminal hand-off: the master receives the signaling node's own
    /// context, not a fresh one. If the chain was mutated so badly that the
    /// master cannot be resolved anymore, the hand-off is dropped.
    fn invoke_master(&self, ctx: StepContext<T>) {
        let callback = {
            let registry = self.inner.lock();
            let master = registry
                .get(ctx.actual())
                .map(|node| {
                    node.master_id
                        .clone()
                        .unwrap_or_else(|| ctx.actual().to_string())
                });
            match master.and_then(|id| registry.get(&id).map(|node| node.callback.clone())) {
                Some(callback) => callback,
                None => {
                    warn!(
                        "master of {} unresolvable; dropping terminal hand-off",
                        ctx.actual()
                    );
                    return;
                }
            }
        };
        callback.call(ctx);
    }
}

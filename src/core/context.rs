//! Per-step execution context handed to each listener
//!
//! Every dispatch step builds a fresh [`StepContext`] and passes it to the
//! node's listener by value. The listener signals exactly once by consuming
//! the context: [`StepContext::advance`] runs the next node,
//! [`StepContext::terminate`] cuts the chain short. A listener that does
//! neither simply drops the context and the chain stays suspended, which is
//! how deferred completion works: move the context into a timer or task and
//! signal from there.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::chain::EventChains;

/// Flag key recorded when a chain reaches its tail and hands off to the master.
pub const COMPLETE_TERMINATION: &str = "COMPLETE_TERMINATION";

/// Flag key recorded when a chain is cut short before its tail.
pub const PREMATURE_TERMINATION: &str = "PREMATURE_TERMINATION";

/// Payload shared across every step of one chain invocation.
///
/// `emit` collects its arguments into the `Vec` once; the same allocation is
/// forwarded through the whole chain, so in-place mutation by one listener is
/// visible to every later one and to the master.
pub type SharedPayload<T> = Arc<Mutex<Vec<T>>>;

/// How a chain invocation ended, as seen by the master callback.
///
/// The two unobservable outcomes need no variant: a context consumed by
/// `advance` mid-chain continues, and a hard terminate drops the context
/// without any master call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every slave ran and signaled completion.
    Complete,
    /// The chain was cut short: a soft terminate, or a vanished next node.
    Premature,
}

/// A chain listener. Blanket-implemented for closures, so
/// `|ctx: StepContext<T>| { .. }` registers directly.
pub trait ChainListener<T>: Send + Sync {
    fn call(&self, ctx: StepContext<T>);
}

impl<T, F> ChainListener<T> for F
where
    F: Fn(StepContext<T>) + Send + Sync,
{
    fn call(&self, ctx: StepContext<T>) {
        self(ctx)
    }
}

/// Execution context for one dispatch step.
pub struct StepContext<T> {
    actual: String,
    watcher: EventChains<T>,
    data: SharedPayload<T>,
    flags: HashMap<String, i64>,
    termination: Option<Termination>,
}

impl<T> StepContext<T> {
    pub(crate) fn new(watcher: EventChains<T>, actual: String, data: SharedPayload<T>) -> Self {
        Self {
            actual,
            watcher,
            data,
            flags: HashMap::new(),
            termination: None,
        }
    }

    /// Id of the node currently executing.
    pub fn actual(&self) -> &str {
        &self.actual
    }

    /// The registry this invocation belongs to.
    pub fn watcher(&self) -> &EventChains<T> {
        &self.watcher
    }

    /// The shared payload for this invocation.
    pub fn data(&self) -> SharedPayload<T> {
        Arc::clone(&self.data)
    }

    /// Runs `f` against the payload under its lock.
    pub fn with_data<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        f(&mut self.data.lock())
    }

    pub fn flag(&self, key: &str) -> Option<i64> {
        self.flags.get(key).copied()
    }

    pub fn set_flag(&mut self, key: impl Into<String>, value: i64) {
        self.flags.insert(key.into(), value);
    }

    pub fn flags(&self) -> &HashMap<String, i64> {
        &self.flags
    }

    /// How the invocation ended; `None` on a mid-chain or zero-slave context.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn is_complete(&self) -> bool {
        self.termination == Some(Termination::Complete)
    }

    pub fn is_premature(&self) -> bool {
        self.termination == Some(Termination::Premature)
    }

    /// Signals that this listener's job is done and dispatches the next node
    /// in the chain, or hands off to the master when this was the tail.
    ///
    /// Consuming `self` means a context can signal at most once; calling this
    /// is the one obligation of every slave listener.
    pub fn advance(self) {
        let watcher = self.watcher.clone();
        watcher.advance(self);
    }

    /// Stops the chain here. Soft (`hard == false`) marks the invocation
    /// premature and calls the master immediately, skipping the remaining
    /// slaves; hard drops everything silently and the master never runs.
    /// The asymmetry is intentional and matches the engine's contract.
    pub fn terminate(self, hard: bool) {
        let watcher = self.watcher.clone();
        watcher.terminate(self, hard);
    }

    pub(crate) fn mark(&mut self, termination: Termination) {
        let key = match termination {
            Termination::Complete => COMPLETE_TERMINATION,
            Termination::Premature => PREMATURE_TERMINATION,
        };
        self.flags.insert(key.to_string(), 1);
        self.termination = Some(termination);
    }
}

//! Core module: chain registry, dispatcher, and execution context

pub mod chain;
pub mod context;
pub mod registry;

pub use chain::EventChains;
pub use context::{
    ChainListener, SharedPayload, StepContext, Termination, COMPLETE_TERMINATION,
    PREMATURE_TERMINATION,
};
pub use registry::{Listener, NodeRef, DEFAULT_PRECEDENCE};

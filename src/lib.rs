//! Seqchain - sequential event chaining
//!
//! Many listeners register against one named event, but they run one at a
//! time, in a defined order, and each must explicitly signal completion
//! before the next runs. When the chain is exhausted (or cut short) a
//! distinguished master callback is invoked with the terminal context.
//!
//! ```
//! use seqchain::prelude::*;
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! let chains = EventChains::<i32>::new();
//! let out = Arc::new(Mutex::new(0));
//!
//! let done = out.clone();
//! chains.register_append("sum", move |ctx: StepContext<i32>| {
//!     assert!(ctx.is_complete());
//!     assert_eq!(*done.lock(), 3);
//! });
//! for i in 0..2 {
//!     let out = out.clone();
//!     chains.register_append("sum", move |ctx: StepContext<i32>| {
//!         *out.lock() += ctx.with_data(|data| data[0]) + i;
//!         ctx.advance();
//!     });
//! }
//!
//! assert!(chains.emit("sum", vec![1]));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

pub mod core;
pub mod error;

pub mod prelude {
    //! Commonly used types and traits

    pub use crate::core::{
        ChainListener, EventChains, Listener, NodeRef, SharedPayload, StepContext, Termination,
        COMPLETE_TERMINATION, DEFAULT_PRECEDENCE, PREMATURE_TERMINATION,
    };
    pub use crate::error::{ChainError, Result};
}

pub use core::{ChainListener, EventChains, StepContext, Termination};
pub use error::{ChainError, Result};

/// Crate version, as compiled.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let chains = EventChains::<i32>::new();
        assert!(chains.master_names().is_empty());
        assert_eq!(DEFAULT_PRECEDENCE, 100);
    }
}

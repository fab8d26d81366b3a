//! Error handling system

use thiserror::Error;

/// Errors surfaced by registry and dispatch operations.
///
/// Queryable failures (`emit`, `remove_chain`, `remove_node`) keep their
/// boolean returns; `ChainError` covers the operations that carry more
/// context than a `bool` can, and the internal traversal failures the
/// dispatcher recovers from.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Broken chain: {0}")]
    BrokenChain(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;

//! Error types for the tree-walk engine.

use thiserror::Error;

/// Main error type for tree-walk engine operations.
///
/// Every variant here corresponds to a fatal condition in the walk: there is
/// no variant for export-buffer-full, since that path is local and
/// recoverable (a plain `-1` sentinel, not an `Err`) and never reaches this
/// type except when a configured retry ceiling is exceeded.
#[derive(Debug, Error)]
pub enum TreeWalkError {
    /// Malformed or insufficient configuration (payload alignment, missing
    /// tree, buffer budget too small, mask/hmax preconditions).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A violation of the engine's traversal protocol (pseudo-node in
    /// Ghosts mode, export called outside TopTree, export queue invariant
    /// broken).
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The adaptive hsml loop failed to converge within its iteration
    /// ceiling.
    #[error("convergence failure: {0}")]
    Convergence(String),

    /// Any other internal error, including communication failures surfaced
    /// from the transport layer.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for tree-walk engine operations.
pub type Result<T> = std::result::Result<T, TreeWalkError>;

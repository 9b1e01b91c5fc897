use thiserror::Error;

/// Errors that cross a public API boundary and are worth matching on
/// (cancellation vs. an engine/registry failure). `main.rs` is the only
/// caller that needs a catch-all error type, and uses `anyhow::Result` for
/// that, matching the rest of this codebase's convention of `anyhow` at the
/// process boundary and typed errors everywhere under it.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("engine error: {0}")]
    Engine(String),

    #[error("registry error: {0}")]
    Registry(String),
}

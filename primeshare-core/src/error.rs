//! Error kinds surfaced by the primitives engine.

use thiserror::Error;

/// The error type for engine operations.
#[derive(Debug, Error)]
pub enum PrimitivesError {
    /// Malformed arguments to an operation constructor or to the
    /// configuration. Raised synchronously while scheduling; nothing is
    /// enqueued.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A recoverable fault inside a running operation set, e.g. not enough
    /// shares for interpolation or an unexpected state. Aborts the current
    /// set.
    #[error("primitives error: {0}")]
    Primitives(String),

    /// Too few peers remain for the computation to stay private.
    #[error("privacy violation: {0}")]
    PrivacyViolation(String),

    /// The shared stopper was tripped; the round was unwound cleanly.
    #[error("computation stopped")]
    Stopped,

    /// A transport-level failure that could not be degraded to a missing
    /// share.
    #[error(transparent)]
    Network(#[from] eyre::Report),
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, PrimitivesError>;

impl PrimitivesError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub(crate) fn primitives(msg: impl Into<String>) -> Self {
        Self::Primitives(msg.into())
    }
}

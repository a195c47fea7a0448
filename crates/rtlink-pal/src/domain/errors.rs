//! Uniform socket error taxonomy.
//!
//! Raw native error numbers never cross the PAL boundary: each backend
//! translates them into this closed set exactly once, at the call site that
//! observed the failure. The PAL itself never retries; whether a transient
//! class is retried, and how, belongs to the caller.

use thiserror::Error;

/// Classification of a failed socket operation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketError {
    /// A non-blocking operation could not complete immediately.
    /// Re-poll for readiness and retry.
    #[error("operation would block")]
    WouldBlock,

    /// The resource is temporarily unavailable. On most targets this aliases
    /// [`SocketError::WouldBlock`]; it is kept distinct for backends where
    /// the native numbers differ.
    #[error("resource temporarily unavailable")]
    Again,

    /// The call was interrupted by a signal before any data transferred.
    #[error("interrupted by signal")]
    Interrupted,

    /// A non-blocking connect was initiated and has not completed. Wait for
    /// writability, then check the error-description path for the outcome.
    #[error("connection attempt in progress")]
    InProgress,

    /// A transient environmental failure (peer reset, timeout, unreachable
    /// network). The handle may still be usable depending on the operation.
    #[error("transient socket failure")]
    Transient,

    /// An irrecoverable failure (invalid handle, unsupported address family,
    /// exhausted descriptors). The handle is left unusable but is not closed
    /// by the PAL, so the error description can still be queried.
    #[error("fatal socket failure")]
    Fatal,
}

impl SocketError {
    /// Whether the caller may reasonably retry or wait out the condition.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        !matches!(self, SocketError::Fatal)
    }

    /// Whether this is a would-block-style completion rather than a failure.
    #[must_use]
    pub const fn is_retry_hint(self) -> bool {
        matches!(
            self,
            SocketError::WouldBlock
                | SocketError::Again
                | SocketError::Interrupted
                | SocketError::InProgress
        )
    }
}

//! Errors returned from the permission request path.
//!
//! A negative decision is not an error: [`crate::PermissionService::request`]
//! returns `Ok(false)` when the approver denies. Errors are reserved for
//! policy violations and for requests that never received a decision.

use thiserror::Error;

use crate::permission::PermissionMode;

/// Error type for permission requests.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The current mode forbids this action outright (Plan-mode write block).
    #[error("{reason}")]
    PolicyViolation {
        /// Mode that rejected the request
        mode: PermissionMode,
        /// Human-readable reason
        reason: String,
    },

    /// The caller's cancellation token fired before a decision arrived.
    #[error("permission request cancelled")]
    Cancelled,

    /// The rendezvous slot was dropped without a decision being delivered.
    #[error("Failed to receive permission response: channel closed")]
    ChannelClosed,

    /// The approver denied the request.
    ///
    /// Only produced by [`crate::PermissionService::require`].
    #[error("user denied permission")]
    Denied,
}

impl PermissionError {
    /// Returns true if the request was blocked by the permission mode
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::PolicyViolation { .. })
    }

    /// Returns true if the caller cancelled the request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the approver denied the request
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied)
    }
}

/// Result type alias for permission requests
pub type Result<T> = std::result::Result<T, PermissionError>;

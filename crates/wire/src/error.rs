// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The abstract error taxonomy of spec §7, made concrete enough to cross
//! the wire. Variants carry just enough detail for a collaborator to
//! decide retryability; the propagation policy itself (what gets
//! swallowed, what surfaces) lives in the daemon.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireError {
    /// Malformed request: missing fields, unsupported format, illegal
    /// identifier. Non-retryable.
    Validation { message: String },
    /// Unknown service or token. Non-retryable.
    NotFound { message: String },
    /// Identity already registered, or kill-of-killed. Non-retryable.
    Conflict { message: String },
    /// Source did not compile; non-retryable for the same source.
    CompileFailure { message: String },
    /// Load shedder rejection, open circuit breaker, or limit exceeded.
    /// Retryable after backoff.
    ResourceExhausted { message: String },
    /// Capability verification failed, with the specific sub-reason.
    PermissionDenied { reason: String },
    /// Event-store/token-store persistence failure.
    TransientIo { message: String },
    /// Should not occur; logged at critical severity by the caller.
    InvariantViolation { message: String },
}

impl WireError {
    /// Whether a caller may retry the same request after backoff (spec §7
    /// "Propagation policy").
    pub fn is_retryable(&self) -> bool {
        matches!(self, WireError::ResourceExhausted { .. } | WireError::TransientIo { .. })
    }
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Validation { message } => write!(f, "validation: {message}"),
            WireError::NotFound { message } => write!(f, "not found: {message}"),
            WireError::Conflict { message } => write!(f, "conflict: {message}"),
            WireError::CompileFailure { message } => write!(f, "compile failure: {message}"),
            WireError::ResourceExhausted { message } => write!(f, "resource exhausted: {message}"),
            WireError::PermissionDenied { reason } => write!(f, "permission denied: {reason}"),
            WireError::TransientIo { message } => write!(f, "transient I/O error: {message}"),
            WireError::InvariantViolation { message } => write!(f, "invariant violation: {message}"),
        }
    }
}

impl std::error::Error for WireError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn resource_exhausted_and_transient_io_are_retryable() {
    assert!(WireError::ResourceExhausted { message: "tenant limit".to_string() }.is_retryable());
    assert!(WireError::TransientIo { message: "wal write failed".to_string() }.is_retryable());
}

#[test]
fn other_kinds_are_not_retryable() {
    assert!(!WireError::Validation { message: "x".to_string() }.is_retryable());
    assert!(!WireError::NotFound { message: "x".to_string() }.is_retryable());
    assert!(!WireError::Conflict { message: "x".to_string() }.is_retryable());
    assert!(!WireError::CompileFailure { message: "x".to_string() }.is_retryable());
    assert!(!WireError::PermissionDenied { reason: "x".to_string() }.is_retryable());
    assert!(!WireError::InvariantViolation { message: "x".to_string() }.is_retryable());
}

#[test]
fn round_trips_through_json() {
    let error = WireError::PermissionDenied { reason: "tenant_mismatch".to_string() };
    let json = serde_json::to_string(&error).unwrap();
    let back: WireError = serde_json::from_str(&json).unwrap();
    assert_eq!(error, back);
}

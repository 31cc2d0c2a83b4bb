// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kernel-wire: plain request/response types for the nine external
//! operations (spec §6). No transport code — protobuf/gRPC, JSON/HTTP, and
//! the CLI escript are all thin translations of these types, built by
//! collaborators outside this workspace's scope.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod requests;
pub mod responses;

pub use error::WireError;
pub use requests::{
    DeployRequest, GrantCapabilityRequest, HotSwapRequest, KillRequest, ListRequest,
    RevokeCapabilityRequest, StatusRequest, VerifyCapabilityRequest, WatchRequest,
};
pub use responses::{
    DeployResponse, GrantCapabilityResponse, ListEntry, ListResponse, StatusResponse, WatchEvent,
};

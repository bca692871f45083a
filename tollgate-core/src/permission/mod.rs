//! Permission gate for tool execution.
//!
//! Every tool call asks the [`PermissionService`] before it runs. The
//! service answers in one of three ways:
//!
//! - **Mode gate**: Yolo approves everything; Plan rejects writes
//!   ([`evaluate`])
//! - **Fast path**: allowlist, session auto-approve, or a persistent grant
//!   approves without prompting ([`FastPath`])
//! - **Prompt**: a [`PermissionRequest`] is published and the caller waits
//!   for an [`Approver`] to decide
//!
//! # Modes
//!
//! | Mode | Writes (`write`, `execute`) | Everything else |
//! |------|-----------------------------|-----------------|
//! | Regular | fast path, then prompt | fast path, then prompt |
//! | Yolo | approved | approved |
//! | Plan | rejected with an error | fast path, then prompt |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tollgate_core::permission::{ApprovalLoop, CreatePermissionRequest, ScriptedApprover, Decision};
//! use tollgate_core::PermissionService;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let service = Arc::new(PermissionService::new("/repo"));
//! let token = CancellationToken::new();
//! ApprovalLoop::new(Arc::clone(&service), ScriptedApprover::new([Decision::Deny]))
//!     .spawn(token.clone());
//!
//! let opts = CreatePermissionRequest::new("s1", "call-1", "edit", "write");
//! assert!(!service.request(opts).await.unwrap());
//! token.cancel();
//! # });
//! ```

mod approver;
mod cache;
mod mode;
mod request;
mod service;

pub use approver::{
    AlwaysGrant, ApprovalLoop, Approver, Decision, DecisionGateway, FnApprover, ScriptedApprover,
};
pub use cache::{resolve_path, AllowList, FastPath, SessionGrant};
pub use mode::{
    evaluate, is_read_only_tool, is_write_action, PermissionMode, PolicyDecision,
    PLAN_MODE_WRITE_BLOCKED,
};
pub use request::{CreatePermissionRequest, PermissionNotification, PermissionRequest};
pub use service::{PermissionService, PermissionServiceBuilder};

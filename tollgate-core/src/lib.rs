//! # Tollgate
//!
//! An in-process permission gate for AI coding assistant tool calls.
//!
//! Before a tool runs (a shell command, a file write, ...) it asks the
//! [`PermissionService`]. The service applies the current
//! [`PermissionMode`], checks the allowlist and per-session approvals, and
//! otherwise publishes a prompt and waits for an approver to grant or deny
//! it. Prompts are strictly one at a time across the whole service.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tollgate_core::permission::{AlwaysGrant, ApprovalLoop};
//! use tollgate_core::{CreatePermissionRequest, PermissionService};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let service = Arc::new(
//!     PermissionService::builder()
//!         .with_working_dir("/repo")
//!         .with_allowed_tools(["view"])
//!         .build(),
//! );
//!
//! let token = CancellationToken::new();
//! ApprovalLoop::new(Arc::clone(&service), AlwaysGrant).spawn(token.clone());
//!
//! let opts = CreatePermissionRequest::new("session-1", "call-1", "bash", "execute")
//!     .with_description("run cargo fmt");
//! service.require(opts).await.unwrap();
//! token.cancel();
//! # });
//! ```
//!
//! ## Streams
//!
//! The service exposes two independent event streams:
//!
//! - [`PermissionService::subscribe`]: requests that need a decision
//! - [`PermissionService::subscribe_notifications`]: requested / granted /
//!   denied status for passive observers
//!
//! Decisions come back through [`PermissionService::grant`],
//! [`PermissionService::grant_persistent`] and [`PermissionService::deny`],
//! or through an [`permission::ApprovalLoop`] driving an
//! [`permission::Approver`].

pub mod config;
pub mod error;
pub mod permission;
pub mod pubsub;

pub use config::{load_config_file, ConfigError, PermissionConfig};
pub use error::{PermissionError, Result};
pub use permission::{
    CreatePermissionRequest, PermissionMode, PermissionNotification, PermissionRequest,
    PermissionService,
};
pub use pubsub::{Event, EventKind, Subscription};

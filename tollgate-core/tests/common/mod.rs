//! Shared helpers for permission service integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tollgate_core::{
    CreatePermissionRequest, PermissionNotification, PermissionRequest, PermissionService,
    Subscription,
};

/// How long to wait for an event that should arrive.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to watch for an event that should not arrive.
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

pub const WORKING_DIR: &str = "/repo";

/// A Regular-mode service rooted at [`WORKING_DIR`].
pub fn service() -> Arc<PermissionService> {
    Arc::new(PermissionService::new(WORKING_DIR))
}

pub fn opts(session: &str, call: &str, tool: &str, action: &str, path: &str) -> CreatePermissionRequest {
    CreatePermissionRequest::new(session, call, tool, action)
        .with_description(format!("{} {}", tool, action))
        .with_path(path)
}

/// Wait for the next prompt, failing the test if none arrives.
pub async fn next_request(prompts: &mut Subscription<PermissionRequest>) -> PermissionRequest {
    tokio::time::timeout(EVENT_TIMEOUT, prompts.recv())
        .await
        .expect("timed out waiting for a permission request")
        .expect("request stream closed")
        .payload
}

/// Assert that no prompt is published for a while.
pub async fn assert_no_request(prompts: &mut Subscription<PermissionRequest>) {
    if let Ok(Some(event)) = tokio::time::timeout(QUIET_PERIOD, prompts.recv()).await {
        panic!("unexpected permission request: {:?}", event.payload);
    }
}

/// Wait for the next status notification.
pub async fn next_notification(
    notes: &mut Subscription<PermissionNotification>,
) -> PermissionNotification {
    tokio::time::timeout(EVENT_TIMEOUT, notes.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification stream closed")
        .payload
}

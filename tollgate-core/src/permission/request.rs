//! Permission request and notification types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Input to [`crate::PermissionService::request`].
///
/// Describes one tool invocation that wants to run. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatePermissionRequest {
    /// Session the tool call belongs to.
    pub session_id: String,
    /// Tool call this request gates.
    pub tool_call_id: String,
    /// Tool name (e.g. "bash", "edit").
    pub tool_name: String,
    /// Description shown to the approver.
    pub description: String,
    /// Action kind (e.g. "read", "write", "execute").
    pub action: String,
    /// Tool parameters, passed through to the approver.
    #[serde(default)]
    pub params: Value,
    /// Filesystem path the action touches. Empty means the working directory.
    #[serde(default)]
    pub path: String,
}

impl CreatePermissionRequest {
    /// Create a request for a tool call.
    pub fn new(
        session_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    /// Set the description shown to the approver.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the tool parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Set the path the action touches.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

/// A request waiting for (or granted by) an approver.
///
/// Identity is [`PermissionRequest::id`]. Cache matching ignores the ID and
/// compares tool, action, session and resolved path instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// Unique ID, generated per prompt.
    pub id: String,
    pub session_id: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub description: String,
    pub action: String,
    #[serde(default)]
    pub params: Value,
    /// Resolved directory (never a file path, never empty).
    pub path: String,
}

impl PermissionRequest {
    /// Build a request from caller input with a fresh ID and resolved path.
    pub(crate) fn from_create(opts: CreatePermissionRequest, resolved_path: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: opts.session_id,
            tool_call_id: opts.tool_call_id,
            tool_name: opts.tool_name,
            description: opts.description,
            action: opts.action,
            params: opts.params,
            path: resolved_path,
        }
    }

    /// Check if this request covers the same tool, action, session and directory.
    pub fn same_scope(&self, tool_name: &str, action: &str, session_id: &str, path: &str) -> bool {
        self.tool_name == tool_name
            && self.action == action
            && self.session_id == session_id
            && self.path == path
    }
}

/// Lifecycle status of a tool call's permission, for passive observers.
///
/// Both flags false means "requested"; `granted` means approved by any route;
/// `denied` means the approver rejected it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionNotification {
    pub tool_call_id: String,
    pub granted: bool,
    pub denied: bool,
}

impl PermissionNotification {
    pub fn requested(tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            granted: false,
            denied: false,
        }
    }

    pub fn granted(tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            granted: true,
            denied: false,
        }
    }

    pub fn denied(tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            granted: false,
            denied: true,
        }
    }

    /// True for the "requested" notification (neither granted nor denied).
    pub fn is_requested(&self) -> bool {
        !self.granted && !self.denied
    }
}

//! Fast-path checks that approve a request without prompting.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::request::PermissionRequest;

/// Which fast path approved a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPath {
    /// Listed in the allowed-tools configuration.
    AllowList,
    /// The session was flagged for auto-approval.
    AutoApprove,
    /// A matching persistent grant exists for the session.
    SessionGrant,
}

impl std::fmt::Display for FastPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FastPath::AllowList => write!(f, "allowlist"),
            FastPath::AutoApprove => write!(f, "auto-approve"),
            FastPath::SessionGrant => write!(f, "session grant"),
        }
    }
}

/// Static list of `"tool"` or `"tool:action"` entries that bypass prompting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<String>,
}

impl AllowList {
    pub fn new(entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Check for `"tool:action"` or bare `"tool"`.
    pub fn allows(&self, tool_name: &str, action: &str) -> bool {
        let command_key = format!("{}:{}", tool_name, action);
        self.entries
            .iter()
            .any(|entry| *entry == command_key || entry == tool_name)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// A persistent grant recorded in the session cache.
#[derive(Debug, Clone, Serialize)]
pub struct SessionGrant {
    /// Copy of the granted request.
    pub request: PermissionRequest,
    /// When the grant was recorded.
    pub granted_at: DateTime<Utc>,
}

/// Per-session approvals that live for the lifetime of the service.
///
/// Grants are append-only. Denials are never recorded.
#[derive(Debug, Default)]
pub(crate) struct SessionPermissions {
    grants: RwLock<Vec<SessionGrant>>,
    auto_approve: RwLock<HashSet<String>>,
}

impl SessionPermissions {
    pub(crate) fn record(&self, request: PermissionRequest) {
        self.grants.write().push(SessionGrant {
            request,
            granted_at: Utc::now(),
        });
    }

    pub(crate) fn is_granted(
        &self,
        tool_name: &str,
        action: &str,
        session_id: &str,
        path: &str,
    ) -> bool {
        self.grants
            .read()
            .iter()
            .any(|g| g.request.same_scope(tool_name, action, session_id, path))
    }

    /// Flag a session. Returns true if it was not flagged before.
    pub(crate) fn auto_approve(&self, session_id: &str) -> bool {
        self.auto_approve.write().insert(session_id.to_string())
    }

    pub(crate) fn is_auto_approved(&self, session_id: &str) -> bool {
        self.auto_approve.read().contains(session_id)
    }

    pub(crate) fn grants(&self) -> Vec<SessionGrant> {
        self.grants.read().clone()
    }

    /// Run the fast-path checks in order; the first hit wins.
    pub(crate) fn fast_path(
        &self,
        allow_list: &AllowList,
        tool_name: &str,
        action: &str,
        session_id: &str,
        resolved_path: &str,
    ) -> Option<FastPath> {
        if allow_list.allows(tool_name, action) {
            Some(FastPath::AllowList)
        } else if self.is_auto_approved(session_id) {
            Some(FastPath::AutoApprove)
        } else if self.is_granted(tool_name, action, session_id, resolved_path) {
            Some(FastPath::SessionGrant)
        } else {
            None
        }
    }
}

/// Resolve a request path to the directory that grants are keyed on.
///
/// Empty paths and `"."` become the working directory; other relative paths
/// are joined onto it. The result is cleaned lexically (no `.` segments, no
/// trailing separator, `..` folded into its parent) so equivalent spellings
/// key the same grant. A path naming an existing file becomes its parent
/// directory. Paths that do not exist are kept as they are.
pub async fn resolve_path(path: &str, working_dir: &Path) -> String {
    let candidate = Path::new(path);
    let candidate = if candidate.is_absolute() {
        clean_path(candidate)
    } else {
        clean_path(&working_dir.join(candidate))
    };

    let dir = match tokio::fs::metadata(&candidate).await {
        Ok(meta) if !meta.is_dir() => candidate
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(candidate),
        _ => candidate,
    };

    if dir.as_os_str().is_empty() {
        return ".".to_string();
    }
    dir.to_string_lossy().into_owned()
}

/// Lexically clean a path without touching the filesystem.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = cleaned.components().next_back();
                match last {
                    Some(Component::Normal(_)) => {
                        cleaned.pop();
                    }
                    // `..` at the root stays at the root
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => cleaned.push(Component::ParentDir),
                }
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}

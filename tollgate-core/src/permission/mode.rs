//! Permission modes and the policy check that runs before anything else.

use serde::{Deserialize, Serialize};

/// Reason given when Plan mode blocks a write.
pub const PLAN_MODE_WRITE_BLOCKED: &str = "write operations are not allowed in plan mode";

/// Actions treated as writes by Plan mode.
const WRITE_ACTIONS: &[&str] = &["write", "execute"];

/// Tools that report an "execute" action but never modify state.
const READ_ONLY_TOOLS: &[&str] = &["mcp_sequential-thinking_sequentialthinking"];

/// The three mutually exclusive permission states.
///
/// One value is current for the whole service and is read by every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    /// Every action goes through the normal permission checks.
    #[default]
    Regular,

    /// Every action is approved without prompting or notification.
    Yolo,

    /// Writes are blocked; reads go through the normal permission checks.
    Plan,
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionMode::Regular => write!(f, "regular"),
            PermissionMode::Yolo => write!(f, "yolo"),
            PermissionMode::Plan => write!(f, "plan"),
        }
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(PermissionMode::Regular),
            "yolo" => Ok(PermissionMode::Yolo),
            "plan" => Ok(PermissionMode::Plan),
            other => Err(format!("unknown permission mode '{}'", other)),
        }
    }
}

/// Outcome of the mode check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Approve immediately, skip every other check.
    Allow,
    /// Reject immediately with a reason.
    Deny(String),
    /// Fall through to the fast path and prompting.
    Continue,
}

/// Decide what the current mode says about an action before any prompting.
///
/// ```rust
/// use tollgate_core::permission::{evaluate, PermissionMode, PolicyDecision};
///
/// assert_eq!(evaluate(PermissionMode::Yolo, "write", "edit"), PolicyDecision::Allow);
/// assert!(matches!(evaluate(PermissionMode::Plan, "write", "edit"), PolicyDecision::Deny(_)));
/// assert_eq!(evaluate(PermissionMode::Plan, "read", "view"), PolicyDecision::Continue);
/// ```
pub fn evaluate(mode: PermissionMode, action: &str, tool_name: &str) -> PolicyDecision {
    match mode {
        PermissionMode::Yolo => PolicyDecision::Allow,
        PermissionMode::Plan if is_write_action(action) && !is_read_only_tool(tool_name) => {
            PolicyDecision::Deny(PLAN_MODE_WRITE_BLOCKED.to_string())
        }
        PermissionMode::Plan | PermissionMode::Regular => PolicyDecision::Continue,
    }
}

/// Check if an action is blocked in Plan mode.
pub fn is_write_action(action: &str) -> bool {
    WRITE_ACTIONS.contains(&action)
}

/// Check if a tool is exempt from the Plan-mode write block.
pub fn is_read_only_tool(tool_name: &str) -> bool {
    READ_ONLY_TOOLS.contains(&tool_name)
}

//! The permission service: mode gate, fast paths and single-flight prompting.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::approver::DecisionGateway;
use super::cache::{resolve_path, AllowList, SessionGrant, SessionPermissions};
use super::mode::{evaluate, PermissionMode, PolicyDecision};
use super::request::{CreatePermissionRequest, PermissionNotification, PermissionRequest};
use crate::config::PermissionConfig;
use crate::error::{PermissionError, Result};
use crate::pubsub::{Broker, EventKind, Subscription, DEFAULT_BUFFER_SIZE};

/// Authorizes tool calls before they run.
///
/// Every call to [`PermissionService::request`] passes the mode gate, then
/// the fast paths (allowlist, session auto-approve, persistent grants). If
/// none of those decide, a [`PermissionRequest`] is published on the request
/// stream and the caller waits until an approver resolves it through
/// [`PermissionService::grant`], [`PermissionService::grant_persistent`] or
/// [`PermissionService::deny`].
///
/// Only one request is ever waiting for an approver. Concurrent callers queue
/// on an internal lock in arrival order and are prompted one at a time.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tollgate_core::{CreatePermissionRequest, PermissionService};
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let service = Arc::new(PermissionService::new("/repo"));
/// let token = CancellationToken::new();
/// let mut prompts = service.subscribe(&token);
///
/// let approver = Arc::clone(&service);
/// tokio::spawn(async move {
///     if let Some(event) = prompts.recv().await {
///         approver.grant(&event.payload);
///     }
/// });
///
/// let opts = CreatePermissionRequest::new("s1", "call-1", "bash", "execute")
///     .with_path("/repo");
/// assert!(service.request(opts).await.unwrap());
/// # });
/// ```
pub struct PermissionService {
    requests: Broker<PermissionRequest>,
    notifications: Broker<PermissionNotification>,
    working_dir: PathBuf,
    allow_list: AllowList,
    mode: RwLock<PermissionMode>,
    session: SessionPermissions,
    pending: Mutex<HashMap<String, oneshot::Sender<bool>>>,
    active: Mutex<Option<PermissionRequest>>,
    // Held from the fast-path check until the decision arrives.
    request_lock: tokio::sync::Mutex<()>,
}

impl PermissionService {
    /// Create a service in Regular mode with an empty allowlist.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::builder().with_working_dir(working_dir).build()
    }

    /// Create a builder for configuring a service.
    pub fn builder() -> PermissionServiceBuilder {
        PermissionServiceBuilder::new()
    }

    /// Ask for permission to run a tool call.
    ///
    /// Returns `Ok(true)` if granted and `Ok(false)` if the approver denied.
    /// Dropping the returned future abandons the request cleanly.
    pub async fn request(&self, opts: CreatePermissionRequest) -> Result<bool> {
        self.request_cancellable(opts, &CancellationToken::new())
            .await
    }

    /// Like [`PermissionService::request`], but gives up with
    /// [`PermissionError::Cancelled`] when `cancel` fires.
    pub async fn request_cancellable(
        &self,
        opts: CreatePermissionRequest,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let mode = self.mode();
        match evaluate(mode, &opts.action, &opts.tool_name) {
            PolicyDecision::Allow => return Ok(true),
            PolicyDecision::Deny(reason) => {
                return Err(PermissionError::PolicyViolation { mode, reason });
            }
            PolicyDecision::Continue => {}
        }

        self.notifications.publish(
            EventKind::Created,
            PermissionNotification::requested(&opts.tool_call_id),
        );

        let _turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PermissionError::Cancelled),
            guard = self.request_lock.lock() => guard,
        };

        let path = resolve_path(&opts.path, &self.working_dir).await;
        if let Some(hit) = self.session.fast_path(
            &self.allow_list,
            &opts.tool_name,
            &opts.action,
            &opts.session_id,
            &path,
        ) {
            log::debug!(
                "{}:{} for session {} approved by {}",
                opts.tool_name,
                opts.action,
                opts.session_id,
                hit
            );
            self.notifications.publish(
                EventKind::Created,
                PermissionNotification::granted(&opts.tool_call_id),
            );
            return Ok(true);
        }

        let request = PermissionRequest::from_create(opts, path);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request.id.clone(), tx);
        *self.active.lock() = Some(request.clone());
        let _slot = PendingSlot {
            service: self,
            id: request.id.clone(),
        };

        log::debug!(
            "prompting for {}:{} in {} (request {})",
            request.tool_name,
            request.action,
            request.path,
            request.id
        );
        self.requests.publish(EventKind::Created, request);

        tokio::select! {
            _ = cancel.cancelled() => Err(PermissionError::Cancelled),
            decision = rx => decision.map_err(|_| PermissionError::ChannelClosed),
        }
    }

    /// Ask for permission and treat a denial as [`PermissionError::Denied`].
    pub async fn require(&self, opts: CreatePermissionRequest) -> Result<()> {
        if self.request(opts).await? {
            Ok(())
        } else {
            Err(PermissionError::Denied)
        }
    }

    /// Approve a pending request once.
    pub fn grant(&self, request: &PermissionRequest) {
        self.resolve_pending(request, true, false);
    }

    /// Approve a pending request and remember the approval for its session,
    /// tool, action and directory.
    pub fn grant_persistent(&self, request: &PermissionRequest) {
        self.resolve_pending(request, true, true);
    }

    /// Reject a pending request. Denials are not remembered.
    pub fn deny(&self, request: &PermissionRequest) {
        self.resolve_pending(request, false, false);
    }

    fn resolve_pending(&self, request: &PermissionRequest, granted: bool, persist: bool) {
        let Some(tx) = self.pending.lock().remove(&request.id) else {
            log::debug!("ignoring decision for unknown request {}", request.id);
            return;
        };

        if persist {
            self.session.record(request.clone());
        }

        let notification = if granted {
            PermissionNotification::granted(&request.tool_call_id)
        } else {
            PermissionNotification::denied(&request.tool_call_id)
        };
        self.notifications.publish(EventKind::Created, notification);

        if tx.send(granted).is_err() {
            log::debug!("request {} was abandoned before its decision", request.id);
        }
        self.clear_active(&request.id);
    }

    fn clear_active(&self, id: &str) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|r| r.id == id) {
            *active = None;
        }
    }

    /// Change the mode for requests that have not passed the mode gate yet.
    pub fn set_mode(&self, mode: PermissionMode) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            log::info!("permission mode changed from {} to {}", previous, mode);
        }
    }

    /// Get the current mode.
    pub fn mode(&self) -> PermissionMode {
        *self.mode.read()
    }

    /// Approve every future request of a session that reaches the fast path.
    ///
    /// Plan mode still blocks writes for the session.
    pub fn auto_approve_session(&self, session_id: &str) {
        if self.session.auto_approve(session_id) {
            log::info!("auto-approving session {}", session_id);
        }
    }

    /// Switch between Yolo (`true`) and Regular (`false`).
    #[deprecated(note = "use set_mode(PermissionMode::Yolo) instead")]
    pub fn set_skip_requests(&self, skip: bool) {
        self.set_mode(if skip {
            PermissionMode::Yolo
        } else {
            PermissionMode::Regular
        });
    }

    /// Whether requests skip prompting entirely.
    #[deprecated(note = "use mode() == PermissionMode::Yolo instead")]
    pub fn skip_requests(&self) -> bool {
        self.mode() == PermissionMode::Yolo
    }

    /// Subscribe to requests that need an approver's decision.
    pub fn subscribe(&self, token: &CancellationToken) -> Subscription<PermissionRequest> {
        self.requests.subscribe(token)
    }

    /// Subscribe to requested/granted/denied status updates.
    pub fn subscribe_notifications(
        &self,
        token: &CancellationToken,
    ) -> Subscription<PermissionNotification> {
        self.notifications.subscribe(token)
    }

    /// The request currently waiting for a decision, if any.
    pub fn active_request(&self) -> Option<PermissionRequest> {
        self.active.lock().clone()
    }

    /// Persistent grants recorded so far, oldest first.
    pub fn session_grants(&self) -> Vec<SessionGrant> {
        self.session.grants()
    }

    /// Number of requests waiting for a decision.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Directory used for empty and relative request paths.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Tools that never prompt.
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }
}

impl DecisionGateway for PermissionService {
    fn grant(&self, request: &PermissionRequest) {
        PermissionService::grant(self, request);
    }

    fn grant_persistent(&self, request: &PermissionRequest) {
        PermissionService::grant_persistent(self, request);
    }

    fn deny(&self, request: &PermissionRequest) {
        PermissionService::deny(self, request);
    }
}

/// Removes a pending request when the waiting caller finishes or is dropped.
struct PendingSlot<'a> {
    service: &'a PermissionService,
    id: String,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.service.pending.lock().remove(&self.id);
        self.service.clear_active(&self.id);
    }
}

/// Builder for [`PermissionService`].
///
/// # Example
///
/// ```rust
/// use tollgate_core::{PermissionMode, PermissionService};
///
/// let service = PermissionService::builder()
///     .with_working_dir("/repo")
///     .with_allowed_tools(["view", "bash:read"])
///     .with_mode(PermissionMode::Plan)
///     .build();
///
/// assert_eq!(service.mode(), PermissionMode::Plan);
/// ```
pub struct PermissionServiceBuilder {
    working_dir: Option<PathBuf>,
    allowed_tools: Vec<String>,
    mode: PermissionMode,
    buffer_size: usize,
}

impl PermissionServiceBuilder {
    /// Create a builder with Regular mode and an empty allowlist.
    pub fn new() -> Self {
        Self {
            working_dir: None,
            allowed_tools: Vec::new(),
            mode: PermissionMode::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Apply a loaded configuration.
    pub fn with_config(mut self, config: &PermissionConfig) -> Self {
        if let Some(dir) = &config.working_dir {
            self.working_dir = Some(dir.clone());
        }
        self.allowed_tools = config.allowed_tools.clone();
        self.mode = config.initial_mode();
        self
    }

    /// Directory used for empty and relative request paths.
    ///
    /// Defaults to the process's current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the `"tool"` or `"tool:action"` entries that never prompt.
    pub fn with_allowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set the initial permission mode.
    pub fn with_mode(mut self, mode: PermissionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Per-subscriber event buffer for both streams.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Create the service.
    pub fn build(self) -> PermissionService {
        let working_dir = self
            .working_dir
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        PermissionService {
            requests: Broker::with_buffer_size(self.buffer_size),
            notifications: Broker::with_buffer_size(self.buffer_size),
            working_dir,
            allow_list: AllowList::new(self.allowed_tools),
            mode: RwLock::new(self.mode),
            session: SessionPermissions::default(),
            pending: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            request_lock: tokio::sync::Mutex::new(()),
        }
    }
}

impl Default for PermissionServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn opts(tool: &str, action: &str) -> CreatePermissionRequest {
        CreatePermissionRequest::new("s1", "call-1", tool, action).with_path("/repo")
    }

    #[test]
    fn test_builder_defaults() {
        let service = PermissionService::builder().build();
        assert_eq!(service.mode(), PermissionMode::Regular);
        assert!(service.allow_list().entries().is_empty());
        assert_eq!(service.pending_count(), 0);
        assert!(service.active_request().is_none());
    }

    #[test]
    fn test_builder_with_config() {
        let config = PermissionConfig {
            working_dir: Some(PathBuf::from("/repo")),
            allowed_tools: vec!["view".to_string()],
            mode: PermissionMode::Plan,
            skip_requests: false,
        };
        let service = PermissionService::builder().with_config(&config).build();

        assert_eq!(service.working_dir(), Path::new("/repo"));
        assert_eq!(service.allow_list().entries(), ["view".to_string()]);
        assert_eq!(service.mode(), PermissionMode::Plan);
    }

    #[test]
    fn test_set_and_get_mode() {
        let service = PermissionService::new("/repo");
        service.set_mode(PermissionMode::Yolo);
        assert_eq!(service.mode(), PermissionMode::Yolo);
        service.set_mode(PermissionMode::Plan);
        assert_eq!(service.mode(), PermissionMode::Plan);
    }

    #[test]
    #[allow(deprecated)]
    fn test_skip_requests_maps_to_modes() {
        let service = PermissionService::new("/repo");
        assert!(!service.skip_requests());

        service.set_skip_requests(true);
        assert_eq!(service.mode(), PermissionMode::Yolo);
        assert!(service.skip_requests());

        service.set_skip_requests(false);
        assert_eq!(service.mode(), PermissionMode::Regular);
    }

    #[tokio::test]
    async fn test_yolo_approves_without_notifications() {
        let service = PermissionService::builder()
            .with_working_dir("/repo")
            .with_mode(PermissionMode::Yolo)
            .build();
        let token = CancellationToken::new();
        let mut notes = service.subscribe_notifications(&token);

        assert!(service.request(opts("bash", "execute")).await.unwrap());

        let next = tokio::time::timeout(Duration::from_millis(50), notes.recv()).await;
        assert!(next.is_err(), "yolo mode should not notify");
    }

    #[tokio::test]
    async fn test_plan_mode_blocks_before_fast_paths() {
        let service = PermissionService::builder()
            .with_working_dir("/repo")
            .with_allowed_tools(["bash"])
            .with_mode(PermissionMode::Plan)
            .build();
        service.auto_approve_session("s1");

        let err = service.request(opts("bash", "execute")).await.unwrap_err();
        assert!(err.is_policy_violation());
        assert_eq!(
            err.to_string(),
            "write operations are not allowed in plan mode"
        );
    }

    #[tokio::test]
    async fn test_allowlist_fast_path_emits_requested_then_granted() {
        let service = PermissionService::builder()
            .with_working_dir("/repo")
            .with_allowed_tools(["bash:execute"])
            .build();
        let token = CancellationToken::new();
        let mut notes = service.subscribe_notifications(&token);

        assert!(service.request(opts("bash", "execute")).await.unwrap());

        let requested = notes.recv().await.unwrap().payload;
        assert!(requested.is_requested());
        let granted = notes.recv().await.unwrap().payload;
        assert!(granted.granted);
        assert_eq!(granted.tool_call_id, "call-1");
        assert_eq!(service.pending_count(), 0);
    }

    #[test]
    fn test_decisions_for_unknown_ids_are_noops() {
        let service = PermissionService::new("/repo");
        let request = PermissionRequest::from_create(opts("edit", "write"), "/repo".to_string());

        service.grant(&request);
        service.grant_persistent(&request);
        service.deny(&request);

        assert!(service.session_grants().is_empty());
        assert_eq!(service.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_request_future_cleans_up() {
        let service = PermissionService::new("/repo");
        let token = CancellationToken::new();
        let mut prompts = service.subscribe(&token);

        {
            let fut = service.request(opts("edit", "write"));
            tokio::pin!(fut);
            tokio::select! {
                _ = &mut fut => panic!("request should wait for a decision"),
                event = prompts.recv() => {
                    assert!(event.is_some());
                }
            }
            assert_eq!(service.pending_count(), 1);
            assert!(service.active_request().is_some());
        }

        assert_eq!(service.pending_count(), 0);
        assert!(service.active_request().is_none());
    }
}

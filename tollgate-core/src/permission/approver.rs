//! Approvers: whoever answers permission prompts.
//!
//! The service never calls an approver directly. It publishes requests on
//! its request stream; an [`ApprovalLoop`] reads that stream, asks an
//! [`Approver`] for a [`Decision`], and hands the decision back through the
//! [`DecisionGateway`].
//!
//! Implementations:
//! - [`AlwaysGrant`]: approve everything that reaches the prompt
//! - [`ScriptedApprover`]: replay a fixed list of decisions (tests, scripts)
//! - [`FnApprover`]: wrap a closure

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::request::PermissionRequest;
use super::service::PermissionService;

/// An approver's answer to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Allow this call once.
    Grant,
    /// Allow and remember for the session, tool, action and directory.
    GrantPersistent,
    /// Deny the call.
    Deny,
}

/// Entry points for resolving a pending request.
///
/// Calls against an unknown or already resolved request are ignored.
pub trait DecisionGateway: Send + Sync {
    fn grant(&self, request: &PermissionRequest);

    fn grant_persistent(&self, request: &PermissionRequest);

    fn deny(&self, request: &PermissionRequest);

    /// Dispatch a [`Decision`] to the matching entry point.
    fn resolve(&self, request: &PermissionRequest, decision: Decision) {
        match decision {
            Decision::Grant => self.grant(request),
            Decision::GrantPersistent => self.grant_persistent(request),
            Decision::Deny => self.deny(request),
        }
    }
}

/// Trait for approver implementations.
///
/// Implement this to answer prompts from a UI, a policy engine, or a script.
#[async_trait]
pub trait Approver: Send + Sync {
    /// Decide on a request. May wait as long as it needs to.
    async fn decide(&self, request: &PermissionRequest) -> Decision;

    /// Human-readable name for this approver
    fn name(&self) -> &'static str;
}

/// Approves every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGrant;

#[async_trait]
impl Approver for AlwaysGrant {
    async fn decide(&self, _request: &PermissionRequest) -> Decision {
        Decision::Grant
    }

    fn name(&self) -> &'static str {
        "AlwaysGrant"
    }
}

/// Replays decisions in order, then falls back to a fixed decision.
///
/// Every request it sees is recorded for later inspection.
///
/// ```rust
/// use tollgate_core::permission::{Decision, ScriptedApprover};
///
/// let approver = ScriptedApprover::new([Decision::Grant, Decision::Deny])
///     .with_fallback(Decision::GrantPersistent);
/// assert!(approver.requests().is_empty());
/// ```
#[derive(Debug)]
pub struct ScriptedApprover {
    script: Mutex<VecDeque<Decision>>,
    fallback: Decision,
    seen: Mutex<Vec<PermissionRequest>>,
}

impl ScriptedApprover {
    /// Create an approver that denies once the script runs out.
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            script: Mutex::new(decisions.into_iter().collect()),
            fallback: Decision::Deny,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, fallback: Decision) -> Self {
        self.fallback = fallback;
        self
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<PermissionRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Approver for ScriptedApprover {
    async fn decide(&self, request: &PermissionRequest) -> Decision {
        self.seen.lock().push(request.clone());
        self.script.lock().pop_front().unwrap_or(self.fallback)
    }

    fn name(&self) -> &'static str {
        "ScriptedApprover"
    }
}

/// Adapts a closure into an [`Approver`].
pub struct FnApprover<F>(pub F);

#[async_trait]
impl<F> Approver for FnApprover<F>
where
    F: Fn(&PermissionRequest) -> Decision + Send + Sync,
{
    async fn decide(&self, request: &PermissionRequest) -> Decision {
        (self.0)(request)
    }

    fn name(&self) -> &'static str {
        "FnApprover"
    }
}

/// Connects an [`Approver`] to a service's request stream.
pub struct ApprovalLoop {
    service: Arc<PermissionService>,
    approver: Arc<dyn Approver>,
}

impl ApprovalLoop {
    pub fn new(service: Arc<PermissionService>, approver: impl Approver + 'static) -> Self {
        Self {
            service,
            approver: Arc::new(approver),
        }
    }

    /// Use an approver that is shared elsewhere (e.g. to inspect it later).
    pub fn with_shared(service: Arc<PermissionService>, approver: Arc<dyn Approver>) -> Self {
        Self { service, approver }
    }

    /// Start answering prompts until `token` is cancelled.
    ///
    /// The subscription is taken before this returns, so no request published
    /// afterwards is missed.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        let mut requests = self.service.subscribe(&token);

        tokio::spawn(async move {
            while let Some(event) = requests.recv().await {
                let request = event.payload;
                let decision = tokio::select! {
                    _ = token.cancelled() => break,
                    decision = self.approver.decide(&request) => decision,
                };
                log::debug!(
                    "{} decided {:?} for request {}",
                    self.approver.name(),
                    decision,
                    request.id
                );
                self.service.resolve(&request, decision);
            }
        })
    }
}

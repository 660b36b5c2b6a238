//! Policy-enforcement seam.
//!
//! The framework never evaluates authorization policies itself; it delegates
//! to an injected [`PolicyEnforcementPoint`]. Collaborator failures are
//! treated as denials, never propagated.

use daedalus_core::context::SecurityContext;
use daedalus_core::middleware::BoxFuture;
use thiserror::Error;

/// Errors surfaced by a policy-enforcement collaborator.
///
/// The framework catches these and denies; they exist so enforcement-point
/// implementations have a typed failure channel for logging.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// The policy engine evaluated the request but failed.
    #[error("policy evaluation failed: {0}")]
    Evaluation(String),

    /// The policy engine could not be reached.
    #[error("policy engine unavailable: {0}")]
    Unavailable(String),
}

/// External collaborator evaluating named authorization policies.
///
/// Implementations wrap whatever engine the embedder runs (OPA, a database
/// of grants, a remote service). The framework only consumes the boolean.
pub trait PolicyEnforcementPoint: Send + Sync {
    /// Evaluates `policy` for the given security context and optional
    /// resource identifier.
    fn enforce<'a>(
        &'a self,
        policy: &'a str,
        security: &'a SecurityContext,
        resource: Option<&'a str>,
    ) -> BoxFuture<'a, Result<bool, PolicyError>>;
}

/// An enforcement point that allows or denies everything.
///
/// Useful as a test double and for environments without a policy engine.
#[derive(Debug, Clone, Copy)]
pub struct StaticPolicyEnforcementPoint {
    allow: bool,
}

impl StaticPolicyEnforcementPoint {
    /// An enforcement point that allows every policy.
    #[must_use]
    pub const fn allow_all() -> Self {
        Self { allow: true }
    }

    /// An enforcement point that denies every policy.
    #[must_use]
    pub const fn deny_all() -> Self {
        Self { allow: false }
    }
}

impl PolicyEnforcementPoint for StaticPolicyEnforcementPoint {
    fn enforce<'a>(
        &'a self,
        _policy: &'a str,
        _security: &'a SecurityContext,
        _resource: Option<&'a str>,
    ) -> BoxFuture<'a, Result<bool, PolicyError>> {
        let allow = self.allow;
        Box::pin(async move { Ok(allow) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_enforcement_point() {
        let security = SecurityContext::new("user-1");

        let pep = StaticPolicyEnforcementPoint::allow_all();
        assert!(pep.enforce("users.read", &security, None).await.expect("ok"));

        let pep = StaticPolicyEnforcementPoint::deny_all();
        assert!(!pep
            .enforce("users.read", &security, Some("user-2"))
            .await
            .expect("ok"));
    }
}

//! Request and execution contexts.
//!
//! A [`RequestContext`] is the per-request identity and metadata handed to
//! the pipeline by the embedding server. An [`ExecutionContext`] wraps it for
//! the lifetime of one chain, accumulating execution bookkeeping that is
//! discarded when the chain completes.

use crate::types::{ApplicationContext, MiddlewareResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Security context carried on authenticated requests.
///
/// Populated by the embedding identity layer; the framework only inspects
/// its presence and forwards it to the policy-enforcement point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityContext {
    /// Authenticated subject identifier.
    pub subject: String,
    /// Roles granted to the subject.
    pub roles: Vec<String>,
    /// Additional attributes for policy evaluation.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl SecurityContext {
    /// Creates a security context for the given subject.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// Per-request identity and metadata.
///
/// The identity fields are set at construction; the `metadata` bag is the
/// one mutable surface, letting units communicate within a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique request id (UUID v7, time-ordered).
    pub id: Uuid,
    /// Request path.
    pub path: String,
    /// HTTP method.
    pub method: String,
    /// Request headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Query parameters.
    #[serde(default)]
    pub query: HashMap<String, String>,
    /// Route parameters.
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// When the request was received.
    pub received_at: DateTime<Utc>,
    /// Correlation id propagated across services.
    pub correlation_id: Uuid,
    /// The application context this request belongs to.
    pub context: ApplicationContext,
    /// Security context, when the caller is authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,
    /// Mutable metadata bag shared along the chain.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RequestContext {
    /// Creates a request context with fresh request and correlation ids.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        context: ApplicationContext,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            path: path.into(),
            method: method.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
            params: HashMap::new(),
            received_at: Utc::now(),
            correlation_id: Uuid::now_v7(),
            context,
            security_context: None,
            metadata: HashMap::new(),
        }
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Adds a route parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sets the correlation id (propagated from an upstream service).
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Attaches a security context.
    #[must_use]
    pub fn with_security_context(mut self, security: SecurityContext) -> Self {
        self.security_context = Some(security);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Sets a metadata entry in place.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Returns a metadata entry, if present.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Returns `true` if this request is a synthetic health probe.
    #[must_use]
    pub fn is_health_probe(&self) -> bool {
        matches!(
            self.metadata.get("healthCheck"),
            Some(serde_json::Value::Bool(true))
        )
    }
}

/// Timing record for one chain execution.
#[derive(Debug, Clone, Default)]
pub struct PerformanceRecord {
    /// Wall time for the whole chain.
    pub total_duration: Duration,
    /// Per-unit wall times, in execution order.
    pub middleware_durations: Vec<(String, Duration)>,
}

impl PerformanceRecord {
    /// Returns the recorded duration for a unit, if it ran.
    #[must_use]
    pub fn duration_for(&self, name: &str) -> Option<Duration> {
        self.middleware_durations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| *d)
    }
}

/// Per-chain execution state wrapped around a [`RequestContext`].
///
/// Mutated only by the executor and the units it drives; dropped when the
/// chain returns.
#[derive(Debug)]
pub struct ExecutionContext {
    request: RequestContext,
    /// Names of units that completed, in execution order.
    pub executed_middleware: Vec<String>,
    /// Names of units that failed (threw or timed out).
    pub failed_middleware: Vec<String>,
    /// Timing bookkeeping.
    pub performance: PerformanceRecord,
    /// Set by a unit to stop the chain after it returns.
    pub should_terminate: bool,
    /// The result to return when terminating.
    pub termination_result: Option<MiddlewareResult>,
}

impl ExecutionContext {
    /// Wraps a request for one chain execution.
    #[must_use]
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            executed_middleware: Vec::new(),
            failed_middleware: Vec::new(),
            performance: PerformanceRecord::default(),
            should_terminate: false,
            termination_result: None,
        }
    }

    /// Returns the wrapped request.
    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    /// Returns the wrapped request mutably (for the metadata bag).
    pub fn request_mut(&mut self) -> &mut RequestContext {
        &mut self.request
    }

    /// Records a completed unit.
    pub fn record_success(&mut self, name: &str, duration: Duration) {
        self.executed_middleware.push(name.to_string());
        self.performance
            .middleware_durations
            .push((name.to_string(), duration));
    }

    /// Records a failed unit.
    pub fn record_failure(&mut self, name: &str, duration: Duration) {
        self.failed_middleware.push(name.to_string());
        self.performance
            .middleware_durations
            .push((name.to_string(), duration));
    }

    /// Requests early termination with the given result.
    ///
    /// The executor honors this after the current unit returns; no
    /// later-ordered unit runs.
    pub fn terminate(&mut self, result: MiddlewareResult) {
        self.should_terminate = true;
        self.termination_result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApplicationContext;

    #[test]
    fn test_request_context_ids_are_unique() {
        let a = RequestContext::new("GET", "/a", ApplicationContext::User);
        let b = RequestContext::new("GET", "/b", ApplicationContext::User);
        assert_ne!(a.id, b.id);
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn test_health_probe_marker() {
        let ctx = RequestContext::new("GET", "/__health", ApplicationContext::System)
            .with_metadata("healthCheck", serde_json::Value::Bool(true));
        assert!(ctx.is_health_probe());

        let ctx = RequestContext::new("GET", "/api", ApplicationContext::User);
        assert!(!ctx.is_health_probe());
    }

    #[test]
    fn test_execution_bookkeeping() {
        let request = RequestContext::new("GET", "/api", ApplicationContext::User);
        let mut ctx = ExecutionContext::new(request);

        ctx.record_success("auth", Duration::from_millis(3));
        ctx.record_failure("flaky", Duration::from_millis(7));

        assert_eq!(ctx.executed_middleware, vec!["auth"]);
        assert_eq!(ctx.failed_middleware, vec!["flaky"]);
        assert_eq!(
            ctx.performance.duration_for("flaky"),
            Some(Duration::from_millis(7))
        );
        assert_eq!(ctx.performance.duration_for("absent"), None);
    }

    #[test]
    fn test_terminate_sets_result() {
        let request = RequestContext::new("GET", "/api", ApplicationContext::User);
        let mut ctx = ExecutionContext::new(request);
        assert!(!ctx.should_terminate);

        ctx.terminate(MiddlewareResult::terminated(Some(401), None, None));
        assert!(ctx.should_terminate);
        assert_eq!(
            ctx.termination_result.as_ref().and_then(|r| r.status_code),
            Some(401)
        );
    }

    #[test]
    fn test_security_context_builder() {
        let sec = SecurityContext::new("user-42").with_role("admin");
        let ctx = RequestContext::new("DELETE", "/api/users/1", ApplicationContext::User)
            .with_security_context(sec);
        assert_eq!(
            ctx.security_context.as_ref().map(|s| s.subject.as_str()),
            Some("user-42")
        );
    }
}

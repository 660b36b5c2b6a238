//! The per-request chain executor.
//!
//! [`MiddlewareFramework`] owns the registry for mutation and turns it into
//! an ordered execution chain per request: eligible units are filtered,
//! sorted by priority, and driven sequentially with per-unit timeouts and
//! error recovery.
//!
//! Execution is an explicit index loop over the pre-sorted chain, not a
//! nested continuation stack: each unit's `execute` future is awaited under
//! `tokio::time::timeout`, so ordering within one chain is strictly
//! sequential and a timed-out unit is cancelled by dropping its future.
//! Independent requests run independent chains concurrently; each gets its
//! own [`ExecutionContext`].

use crate::policy::PolicyEnforcementPoint;
use crate::store::MiddlewareRegistry;
use daedalus_core::context::{ExecutionContext, RequestContext};
use daedalus_core::error::MiddlewareError;
use daedalus_core::middleware::{Middleware, UsageRecorder};
use daedalus_core::types::{MiddlewareInfo, MiddlewareRegistration, MiddlewareResult};
use daedalus_core::RegistryResult;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Global execution policy for the framework.
#[derive(Debug, Clone)]
pub struct FrameworkConfig {
    /// Timeout applied to units that do not set their own.
    pub default_timeout: Duration,
    /// When `false`, an error a unit chose to survive still ends the chain
    /// in failure. A unit's own *termination* decision always wins either
    /// way.
    pub continue_on_error: bool,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            continue_on_error: false,
        }
    }
}

/// One eligible unit in a built chain.
struct ChainEntry {
    name: String,
    timeout: Option<Duration>,
    middleware: Arc<dyn Middleware>,
}

/// The pipeline executor and registry owner.
pub struct MiddlewareFramework {
    registry: Arc<MiddlewareRegistry>,
    config: FrameworkConfig,
    policy: Option<Arc<dyn PolicyEnforcementPoint>>,
    usage: Option<Arc<dyn UsageRecorder>>,
}

impl MiddlewareFramework {
    /// Creates a framework with an empty registry and default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FrameworkConfig::default())
    }

    /// Creates a framework with the given execution policy.
    #[must_use]
    pub fn with_config(config: FrameworkConfig) -> Self {
        Self {
            registry: Arc::new(MiddlewareRegistry::new()),
            config,
            policy: None,
            usage: None,
        }
    }

    /// Injects the policy-enforcement collaborator.
    #[must_use]
    pub fn with_policy_enforcement(mut self, pep: Arc<dyn PolicyEnforcementPoint>) -> Self {
        self.policy = Some(pep);
        self
    }

    /// Injects the usage-analytics sink fed after each chain.
    #[must_use]
    pub fn with_usage_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.usage = Some(recorder);
        self
    }

    /// Returns the shared registry, for read-side components.
    #[must_use]
    pub fn registry(&self) -> &Arc<MiddlewareRegistry> {
        &self.registry
    }

    /// Registers a middleware unit. See [`MiddlewareRegistry::register`].
    pub fn register(&self, registration: MiddlewareRegistration) -> RegistryResult<()> {
        self.registry.register(registration)
    }

    /// Unregisters a middleware unit. See [`MiddlewareRegistry::unregister`].
    pub fn unregister(&self, name: &str) -> RegistryResult<()> {
        self.registry.unregister(name)
    }

    /// Enables or disables a unit.
    pub fn set_middleware_enabled(&self, name: &str, enabled: bool) -> RegistryResult<()> {
        self.registry.set_enabled(name, enabled)
    }

    /// Returns metadata snapshots for all registrations.
    #[must_use]
    pub fn middleware_info(&self) -> Vec<MiddlewareInfo> {
        self.registry.info()
    }

    /// Executes the chain for one request.
    ///
    /// Eligibility: a unit runs iff it is enabled, its `should_execute`
    /// accepts the request, and all its conditions match. Eligible units run
    /// in priority order (descending), ties broken by registration order.
    pub async fn execute_chain(&self, request: RequestContext) -> MiddlewareResult {
        let chain = self.build_chain(&request);
        debug!(
            request_id = %request.id,
            path = %request.path,
            chain_len = chain.len(),
            "executing middleware chain"
        );

        let mut ctx = ExecutionContext::new(request);
        let chain_start = Instant::now();
        let mut propagated: Option<MiddlewareError> = None;
        let mut last_recovered: Option<String> = None;

        for entry in &chain {
            let deadline = entry.timeout.unwrap_or(self.config.default_timeout);
            let unit_start = Instant::now();

            let outcome = match tokio::time::timeout(deadline, entry.middleware.execute(&mut ctx))
                .await
            {
                Ok(result) => result,
                // The losing future was dropped, cancelling the unit's work.
                Err(_) => Err(MiddlewareError::timeout(entry.name.clone(), deadline)),
            };
            let elapsed = unit_start.elapsed();

            match outcome {
                Ok(()) => {
                    ctx.record_success(&entry.name, elapsed);
                    if ctx.should_terminate {
                        ctx.performance.total_duration = chain_start.elapsed();
                        self.finish_bookkeeping(&ctx);
                        debug!(middleware = %entry.name, "chain terminated by middleware");
                        return ctx
                            .termination_result
                            .take()
                            .unwrap_or_else(MiddlewareResult::ok);
                    }
                }
                Err(error) => {
                    ctx.record_failure(&entry.name, elapsed);
                    warn!(middleware = %entry.name, %error, "middleware failed");

                    let decision = entry.middleware.on_error(&error, ctx.request());
                    if !decision.should_continue {
                        // Termination always wins over global policy.
                        ctx.performance.total_duration = chain_start.elapsed();
                        self.finish_bookkeeping(&ctx);
                        return MiddlewareResult::terminated(
                            decision.status_code,
                            decision.response,
                            Some(error.to_string()),
                        );
                    }
                    if self.config.continue_on_error {
                        last_recovered = Some(error.to_string());
                    } else {
                        // The unit wanted to continue, but global policy
                        // forces the failure to propagate.
                        propagated = Some(error);
                        break;
                    }
                }
            }
        }

        ctx.performance.total_duration = chain_start.elapsed();
        self.finish_bookkeeping(&ctx);

        if let Some(error) = propagated {
            return MiddlewareResult::failure(error.to_string());
        }
        if ctx.failed_middleware.is_empty() {
            MiddlewareResult::ok()
        } else {
            MiddlewareResult::completed_with_failures(last_recovered)
        }
    }

    /// Evaluates a named policy for the request.
    ///
    /// Returns `false` without consulting the collaborator when the request
    /// carries no security context or no enforcement point is injected.
    /// Collaborator errors are logged and treated as denial.
    pub async fn enforce_policy(
        &self,
        policy: &str,
        ctx: &RequestContext,
        resource: Option<&str>,
    ) -> bool {
        let Some(security) = ctx.security_context.as_ref() else {
            debug!(policy, "policy denied: request has no security context");
            return false;
        };
        let Some(pep) = self.policy.as_ref() else {
            warn!(policy, "policy denied: no enforcement point injected");
            return false;
        };

        match pep.enforce(policy, security, resource).await {
            Ok(allowed) => allowed,
            Err(error) => {
                warn!(policy, %error, "policy enforcement failed; denying");
                false
            }
        }
    }

    /// Filters and orders the eligible units for a request.
    fn build_chain(&self, request: &RequestContext) -> Vec<ChainEntry> {
        let snapshot = self.registry.snapshot();
        let mut eligible: Vec<&MiddlewareRegistration> = snapshot
            .values()
            .filter(|reg| {
                reg.config.enabled
                    && reg.middleware.should_execute(request)
                    && reg.config.conditions.iter().all(|c| c.matches(request))
            })
            .collect();

        // Priority descending; ties broken by registration order so equal
        // priorities execute deterministically.
        eligible.sort_by(|a, b| {
            b.config
                .priority
                .cmp(&a.config.priority)
                .then(a.sequence.cmp(&b.sequence))
        });

        eligible
            .into_iter()
            .map(|reg| ChainEntry {
                name: reg.name.clone(),
                timeout: reg.config.timeout,
                middleware: Arc::clone(&reg.middleware),
            })
            .collect()
    }

    /// Updates usage counters and feeds the analytics sink.
    fn finish_bookkeeping(&self, ctx: &ExecutionContext) {
        for name in &ctx.executed_middleware {
            self.registry.record_execution(name);
            if let Some(usage) = &self.usage {
                usage.record_usage(name, ctx.performance.duration_for(name));
            }
        }
    }
}

impl Default for MiddlewareFramework {
    fn default() -> Self {
        Self::new()
    }
}

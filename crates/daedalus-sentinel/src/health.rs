//! Readiness probing for registered middleware.
//!
//! The checker drives each unit's [`Middleware::probe`] hook against a
//! synthetic system request, races it against a timeout, and retries expired
//! probes. Results are cached for queries and unhealthy units are announced
//! on the event bus. A periodic sweep can be started per checker instance.

use daedalus_core::context::RequestContext;
use daedalus_core::types::{ApplicationContext, MiddlewareRegistration};
use daedalus_events::{EventManager, RegistryEventType};
use daedalus_registry::MiddlewareRegistry;
use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Tunables for a health-check sweep.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Per-attempt probe timeout.
    pub timeout: Duration,
    /// Probe attempts per unit when a registration carries no retry count.
    pub retries: u32,
    /// Pause between retried attempts.
    pub retry_delay: Duration,
    /// Probe all units concurrently rather than one by one.
    pub parallel: bool,
    /// Skip disabled units entirely instead of reporting them unhealthy.
    pub enabled_only: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            parallel: true,
            enabled_only: false,
        }
    }
}

/// Outcome of probing one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// The probed unit.
    pub middleware_name: String,
    /// Whether the probe reported ready.
    pub healthy: bool,
    /// When the probe finished.
    pub last_check: chrono::DateTime<chrono::Utc>,
    /// Wall time of the successful attempt, when one completed.
    #[serde(with = "opt_duration_millis", rename = "response_time_ms")]
    pub response_time: Option<Duration>,
    /// Failure description for unhealthy results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form details (attempt counts and the like).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Aggregate numbers over the cached probe results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatistics {
    /// Units with a cached result.
    pub total_checked: usize,
    /// Units whose last probe passed.
    pub healthy_count: usize,
    /// Units whose last probe failed.
    pub unhealthy_count: usize,
    /// Fraction of healthy units, 0.0 when nothing was checked.
    pub health_ratio: f64,
    /// Mean response time over probes that completed, in milliseconds.
    pub average_response_time_ms: Option<f64>,
}

mod opt_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(|d| d.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Drives readiness probes over the registry and caches the outcomes.
pub struct HealthChecker {
    config: HealthCheckConfig,
    events: Arc<EventManager>,
    results: RwLock<HashMap<String, HealthCheckResult>>,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl HealthChecker {
    /// Creates a checker with default tunables.
    #[must_use]
    pub fn new(events: Arc<EventManager>) -> Self {
        Self::with_config(HealthCheckConfig::default(), events)
    }

    /// Creates a checker with the given tunables.
    #[must_use]
    pub fn with_config(config: HealthCheckConfig, events: Arc<EventManager>) -> Self {
        Self {
            config,
            events,
            results: RwLock::new(HashMap::new()),
            periodic: Mutex::new(None),
        }
    }

    /// The synthetic request passed to probes. Units that skip health
    /// traffic can recognize it through
    /// [`is_health_probe`](RequestContext::is_health_probe).
    fn probe_request() -> RequestContext {
        RequestContext::new("GET", "/__health", ApplicationContext::System)
            .with_metadata("healthCheck", serde_json::Value::Bool(true))
    }

    /// Probes one registration. Never errors: every failure mode folds into
    /// an unhealthy [`HealthCheckResult`].
    pub async fn perform_single_health_check(
        &self,
        registration: &MiddlewareRegistration,
    ) -> HealthCheckResult {
        let name = registration.name.clone();

        if !registration.is_enabled() {
            return HealthCheckResult {
                middleware_name: name,
                healthy: false,
                last_check: chrono::Utc::now(),
                response_time: None,
                error: Some("middleware is disabled".to_string()),
                details: None,
            };
        }

        // A registration-level retry count overrides the sweep default;
        // every unit gets at least one attempt.
        let attempts = registration
            .config
            .retry_count
            .unwrap_or(self.config.retries)
            .max(1);
        let request = Self::probe_request();

        let mut healthy = false;
        let mut response_time = None;
        let mut error = None;
        let mut attempts_used = 0;

        for attempt in 1..=attempts {
            attempts_used = attempt;
            let started = std::time::Instant::now();
            match tokio::time::timeout(self.config.timeout, registration.middleware.probe(&request))
                .await
            {
                Ok(ready) => {
                    // A definitive answer ends the loop; only expired
                    // attempts are retried.
                    response_time = Some(started.elapsed());
                    healthy = ready;
                    if !ready {
                        error = Some("readiness probe returned false".to_string());
                    }
                    break;
                }
                Err(_) => {
                    debug!(
                        middleware = %registration.name,
                        attempt,
                        timeout_ms = self.config.timeout.as_millis() as u64,
                        "health probe timed out"
                    );
                    error = Some(format!(
                        "readiness probe timed out after {} attempt(s)",
                        attempt
                    ));
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        HealthCheckResult {
            middleware_name: registration.name.clone(),
            healthy,
            last_check: chrono::Utc::now(),
            response_time,
            error: if healthy { None } else { error },
            details: Some(serde_json::json!({
                "attempts": attempts_used,
                "max_attempts": attempts,
            })),
        }
    }

    /// Sweeps the registry, caches the results, and announces failures and
    /// the sweep summary on the event bus.
    pub async fn perform_health_checks(
        &self,
        registry: &MiddlewareRegistry,
    ) -> Vec<HealthCheckResult> {
        let snapshot = registry.snapshot();
        let targets: Vec<&MiddlewareRegistration> = snapshot
            .values()
            .filter(|reg| !self.config.enabled_only || reg.is_enabled())
            .collect();

        let results = if self.config.parallel {
            join_all(
                targets
                    .iter()
                    .map(|reg| self.perform_single_health_check(reg)),
            )
            .await
        } else {
            let mut sequential = Vec::with_capacity(targets.len());
            for reg in &targets {
                sequential.push(self.perform_single_health_check(reg).await);
            }
            sequential
        };

        let healthy = results.iter().filter(|r| r.healthy).count();
        let unhealthy = results.len() - healthy;

        {
            let mut cache = self.results.write();
            for result in &results {
                cache.insert(result.middleware_name.clone(), result.clone());
            }
        }

        for result in results.iter().filter(|r| !r.healthy) {
            warn!(
                middleware = %result.middleware_name,
                error = result.error.as_deref().unwrap_or("unknown"),
                "health check failed"
            );
            self.events.emit(
                RegistryEventType::HealthCheckFailed,
                result.middleware_name.clone(),
                Some(serde_json::json!({ "error": result.error })),
            );
        }
        self.events.emit(
            RegistryEventType::HealthCheckSummary,
            "registry",
            Some(serde_json::json!({
                "total": results.len(),
                "healthy": healthy,
                "unhealthy": unhealthy,
            })),
        );
        info!(
            total = results.len(),
            healthy, unhealthy, "health-check sweep finished"
        );

        results
    }

    /// Starts a background sweep on a fixed interval, replacing any sweep
    /// previously started on this checker.
    pub fn start_periodic_health_checks(
        self: &Arc<Self>,
        interval: Duration,
        registry: Arc<MiddlewareRegistry>,
    ) {
        let mut slot = self.periodic.lock();
        if let Some(handle) = slot.take() {
            handle.abort();
        }

        let checker = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so the caller
            // controls when the first sweep lands.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                checker.perform_health_checks(&registry).await;
            }
        }));
        info!(interval_ms = interval.as_millis() as u64, "periodic health checks started");
    }

    /// Stops the background sweep. Safe to call when none is running.
    pub fn stop_periodic_health_checks(&self) {
        if let Some(handle) = self.periodic.lock().take() {
            handle.abort();
            info!("periodic health checks stopped");
        }
    }

    /// Returns the cached probe results.
    #[must_use]
    pub fn get_health_checks(&self) -> HashMap<String, HealthCheckResult> {
        self.results.read().clone()
    }

    /// Returns the cached verdict for one unit, if it was ever probed.
    #[must_use]
    pub fn is_healthy(&self, name: &str) -> Option<bool> {
        self.results.read().get(name).map(|r| r.healthy)
    }

    /// Aggregates the cached results.
    #[must_use]
    pub fn health_statistics(&self) -> HealthStatistics {
        let results = self.results.read();
        let total = results.len();
        let healthy_count = results.values().filter(|r| r.healthy).count();
        let timed: Vec<f64> = results
            .values()
            .filter_map(|r| r.response_time)
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();

        HealthStatistics {
            total_checked: total,
            healthy_count,
            unhealthy_count: total - healthy_count,
            health_ratio: if total == 0 {
                0.0
            } else {
                healthy_count as f64 / total as f64
            },
            average_response_time_ms: if timed.is_empty() {
                None
            } else {
                Some(timed.iter().sum::<f64>() / timed.len() as f64)
            },
        }
    }
}

impl Drop for HealthChecker {
    fn drop(&mut self) {
        if let Some(handle) = self.periodic.lock().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("config", &self.config)
            .field("cached_results", &self.results.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::context::ExecutionContext;
    use daedalus_core::error::MiddlewareError;
    use daedalus_core::middleware::{BoxFuture, Middleware};
    use daedalus_core::types::MiddlewareCategory;

    struct Ready;

    impl Middleware for Ready {
        fn execute<'a>(
            &'a self,
            _ctx: &'a mut ExecutionContext,
        ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct NotReady;

    impl Middleware for NotReady {
        fn execute<'a>(
            &'a self,
            _ctx: &'a mut ExecutionContext,
        ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
            Box::pin(async { Ok(()) })
        }

        fn probe<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, bool> {
            Box::pin(async { false })
        }
    }

    struct Hanging;

    impl Middleware for Hanging {
        fn execute<'a>(
            &'a self,
            _ctx: &'a mut ExecutionContext,
        ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
            Box::pin(async { Ok(()) })
        }

        fn probe<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, bool> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                true
            })
        }
    }

    fn registration(name: &str, mw: Arc<dyn Middleware>) -> MiddlewareRegistration {
        MiddlewareRegistration::new(name, MiddlewareCategory::Custom, mw)
            .with_version("1.0.0")
            .with_context(ApplicationContext::System)
    }

    fn checker(config: HealthCheckConfig) -> HealthChecker {
        HealthChecker::with_config(config, Arc::new(EventManager::new()))
    }

    #[tokio::test]
    async fn test_ready_middleware_is_healthy() {
        let checker = checker(HealthCheckConfig::default());
        let result = checker
            .perform_single_health_check(&registration("auth", Arc::new(Ready)))
            .await;

        assert!(result.healthy);
        assert!(result.error.is_none());
        assert!(result.response_time.is_some());
    }

    #[tokio::test]
    async fn test_disabled_middleware_is_unhealthy_without_probing() {
        let checker = checker(HealthCheckConfig::default());
        let reg = registration("auth", Arc::new(Hanging)).with_enabled(false);

        // Completes instantly despite the hanging probe.
        let result = checker.perform_single_health_check(&reg).await;
        assert!(!result.healthy);
        assert_eq!(result.error.as_deref(), Some("middleware is disabled"));
    }

    #[tokio::test]
    async fn test_definitive_false_is_not_retried() {
        let checker = checker(HealthCheckConfig::default());
        let result = checker
            .perform_single_health_check(&registration("flaky", Arc::new(NotReady)))
            .await;

        assert!(!result.healthy);
        assert_eq!(
            result.error.as_deref(),
            Some("readiness probe returned false")
        );
        let details = result.details.expect("details present");
        assert_eq!(details["attempts"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_exhausts_retries() {
        let checker = checker(HealthCheckConfig {
            timeout: Duration::from_millis(50),
            retries: 3,
            retry_delay: Duration::from_millis(10),
            ..HealthCheckConfig::default()
        });

        let result = checker
            .perform_single_health_check(&registration("slow", Arc::new(Hanging)))
            .await;

        assert!(!result.healthy);
        assert!(result
            .error
            .as_deref()
            .unwrap_or("")
            .contains("timed out after 3"));
        let details = result.details.expect("details present");
        assert_eq!(details["attempts"], 3);
    }

    #[tokio::test]
    async fn test_registration_retry_count_overrides_default() {
        let checker = checker(HealthCheckConfig {
            timeout: Duration::from_millis(10),
            retries: 5,
            retry_delay: Duration::from_millis(1),
            ..HealthCheckConfig::default()
        });
        let reg = registration("slow", Arc::new(Hanging)).with_retry_count(1);

        let result = checker.perform_single_health_check(&reg).await;
        let details = result.details.expect("details present");
        assert_eq!(details["max_attempts"], 1);
    }

    #[tokio::test]
    async fn test_sweep_caches_results_and_emits_events() {
        let events = Arc::new(EventManager::new());
        let checker = HealthChecker::with_config(HealthCheckConfig::default(), events.clone());

        let registry = MiddlewareRegistry::new();
        registry
            .register(registration("auth", Arc::new(Ready)))
            .expect("registers");
        registry
            .register(registration("flaky", Arc::new(NotReady)))
            .expect("registers");

        let results = checker.perform_health_checks(&registry).await;
        assert_eq!(results.len(), 2);

        assert_eq!(checker.is_healthy("auth"), Some(true));
        assert_eq!(checker.is_healthy("flaky"), Some(false));
        assert_eq!(checker.is_healthy("ghost"), None);

        let stats = checker.health_statistics();
        assert_eq!(stats.total_checked, 2);
        assert_eq!(stats.healthy_count, 1);
        assert!((stats.health_ratio - 0.5).abs() < f64::EPSILON);

        let failed = events.events_by_type(RegistryEventType::HealthCheckFailed, None);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].middleware_name, "flaky");

        let summary = events.events_by_type(RegistryEventType::HealthCheckSummary, None);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].middleware_name, "registry");
        let meta = summary[0].metadata.as_ref().expect("summary metadata");
        assert_eq!(meta["total"], 2);
        assert_eq!(meta["unhealthy"], 1);
    }

    #[tokio::test]
    async fn test_enabled_only_skips_disabled_units() {
        let checker = checker(HealthCheckConfig {
            enabled_only: true,
            ..HealthCheckConfig::default()
        });

        let registry = MiddlewareRegistry::new();
        registry
            .register(registration("auth", Arc::new(Ready)))
            .expect("registers");
        registry
            .register(registration("parked", Arc::new(Ready)).with_enabled(false))
            .expect("registers");

        let results = checker.perform_health_checks(&registry).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].middleware_name, "auth");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_periodic_sweeps_run_and_stop() {
        let checker = Arc::new(checker(HealthCheckConfig::default()));
        let registry = Arc::new(MiddlewareRegistry::new());
        registry
            .register(registration("auth", Arc::new(Ready)))
            .expect("registers");

        checker.start_periodic_health_checks(Duration::from_millis(20), registry.clone());
        tokio::time::sleep(Duration::from_millis(120)).await;
        checker.stop_periodic_health_checks();

        assert_eq!(checker.is_healthy("auth"), Some(true));

        // Idempotent stop, and no further sweeps after stopping.
        checker.stop_periodic_health_checks();
        let before = checker.get_health_checks()["auth"].last_check;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(checker.get_health_checks()["auth"].last_check, before);
    }
}

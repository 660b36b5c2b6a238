//! Registration metadata and result types.
//!
//! A [`MiddlewareRegistration`] couples declarative metadata (category,
//! contexts, tags, priority, dependencies) with the executable
//! [`Middleware`](crate::middleware::Middleware) contract. Registrations are
//! the values of the shared registry map; everything else in Daedalus reads
//! or mutates them through the framework owner.

use crate::condition::Condition;
use crate::middleware::Middleware;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

/// Maximum allowed priority for a middleware unit.
pub const MAX_PRIORITY: u8 = 100;

/// Maximum recommended length for a registration name.
///
/// Longer names are accepted but flagged as warnings by the validator.
pub const MAX_NAME_LENGTH: usize = 50;

/// Returns `true` if `name` is non-empty and contains only ASCII
/// alphanumerics, `_`, and `-`.
///
/// The registry enforces this at registration time; the validator re-checks
/// it during full audits. Both share this predicate so the two checks cannot
/// drift apart.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        regex::Regex::new("^[a-zA-Z0-9_-]+$").expect("name pattern is valid")
    });
    pattern.is_match(name)
}

/// Functional category of a middleware unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareCategory {
    /// General security hardening (headers, CSRF, etc.).
    Security,
    /// Credential verification.
    Authentication,
    /// Permission checks.
    Authorization,
    /// Request payload validation.
    Validation,
    /// Request/response logging.
    Logging,
    /// Throttling and quota enforcement.
    RateLimiting,
    /// Response caching.
    Caching,
    /// Metrics and health instrumentation.
    Monitoring,
    /// Anything that does not fit the above.
    Custom,
}

impl MiddlewareCategory {
    /// All categories, in declaration order.
    ///
    /// Used to pre-seed statistic tables so absent categories still appear
    /// with zero counts.
    pub const ALL: [Self; 9] = [
        Self::Security,
        Self::Authentication,
        Self::Authorization,
        Self::Validation,
        Self::Logging,
        Self::RateLimiting,
        Self::Caching,
        Self::Monitoring,
        Self::Custom,
    ];

    /// Returns the category name as used in logs and serialized output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::Logging => "logging",
            Self::RateLimiting => "rate_limiting",
            Self::Caching => "caching",
            Self::Monitoring => "monitoring",
            Self::Custom => "custom",
        }
    }

    /// Returns `true` for categories counted as security middleware by the
    /// validator's aggregate statistics.
    #[must_use]
    pub const fn is_security_related(self) -> bool {
        matches!(
            self,
            Self::Security | Self::Authentication | Self::Authorization
        )
    }
}

impl fmt::Display for MiddlewareCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Application context a middleware unit applies to.
///
/// Contexts tag the business domain a unit participates in. A registration
/// must declare at least one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationContext {
    /// User account operations.
    User,
    /// Organization management.
    Organization,
    /// Session and identity lifecycle.
    Session,
    /// Audit and observability logging.
    Audit,
    /// Anatomy catalog operations.
    Anatomy,
    /// Exercise catalog operations.
    Exercise,
    /// Internal system operations (health probes, maintenance).
    System,
    /// Applies to every request.
    Global,
}

impl ApplicationContext {
    /// All contexts, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::User,
        Self::Organization,
        Self::Session,
        Self::Audit,
        Self::Anatomy,
        Self::Exercise,
        Self::System,
        Self::Global,
    ];

    /// Returns the context name as used in logs and serialized output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Organization => "organization",
            Self::Session => "session",
            Self::Audit => "audit",
            Self::Anatomy => "anatomy",
            Self::Exercise => "exercise",
            Self::System => "system",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for ApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serde adapter storing an optional [`Duration`] as integer milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

/// Per-unit execution configuration embedded in a registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Must match the registration name; checked by the validator.
    pub name: String,
    /// Whether the unit participates in chains.
    pub enabled: bool,
    /// Chain ordering priority, `0..=100`. Higher runs earlier.
    pub priority: u8,
    /// Declarative predicates gating chain participation (AND semantics).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Per-unit execution timeout; falls back to the framework default.
    #[serde(default, with = "duration_millis", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Health-probe retry override; falls back to the checker default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl MiddlewareConfig {
    /// Creates an enabled config with the given name and priority.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority,
            conditions: Vec::new(),
            timeout: None,
            retry_count: None,
        }
    }
}

/// A registered middleware unit: declarative metadata plus the executable
/// contract.
#[derive(Clone)]
pub struct MiddlewareRegistration {
    /// Unique registry key.
    pub name: String,
    /// Version of the unit (required; the validator flags empty versions).
    pub version: String,
    /// Human-readable description (recommended).
    pub description: String,
    /// Author or owning team (recommended).
    pub author: String,
    /// Functional category.
    pub category: MiddlewareCategory,
    /// Application contexts the unit applies to (must be non-empty).
    pub contexts: BTreeSet<ApplicationContext>,
    /// Free-form tags for discovery.
    pub tags: BTreeSet<String>,
    /// When the unit was registered.
    pub registered_at: DateTime<Utc>,
    /// Monotonic execution counter, maintained by the registry.
    pub usage_count: u64,
    /// When the unit last executed.
    pub last_used: Option<DateTime<Utc>>,
    /// Names of registrations this unit requires.
    pub dependencies: Vec<String>,
    /// Execution configuration.
    pub config: MiddlewareConfig,
    /// Registration order, assigned by the store. Breaks priority ties.
    pub sequence: u64,
    /// The executable contract.
    pub middleware: Arc<dyn Middleware>,
}

impl fmt::Debug for MiddlewareRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistration")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("category", &self.category)
            .field("contexts", &self.contexts)
            .field("priority", &self.config.priority)
            .field("enabled", &self.config.enabled)
            .field("dependencies", &self.dependencies)
            .field("usage_count", &self.usage_count)
            .finish_non_exhaustive()
    }
}

impl MiddlewareRegistration {
    /// Creates a registration with default metadata.
    ///
    /// The config is enabled with priority 50 and no conditions; metadata
    /// fields start empty and should be filled via the `with_` builders.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        category: MiddlewareCategory,
        middleware: Arc<dyn Middleware>,
    ) -> Self {
        let name = name.into();
        Self {
            config: MiddlewareConfig::new(name.clone(), 50),
            name,
            version: String::new(),
            description: String::new(),
            author: String::new(),
            category,
            contexts: BTreeSet::new(),
            tags: BTreeSet::new(),
            registered_at: Utc::now(),
            usage_count: 0,
            last_used: None,
            dependencies: Vec::new(),
            sequence: 0,
            middleware,
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Adds an application context.
    #[must_use]
    pub fn with_context(mut self, context: ApplicationContext) -> Self {
        self.contexts.insert(context);
        self
    }

    /// Adds a discovery tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Declares a dependency on another registration.
    #[must_use]
    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Sets the chain priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.config.priority = priority;
        self
    }

    /// Enables or disables the unit.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Adds an execution condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.config.conditions.push(condition);
        self
    }

    /// Sets the per-unit execution timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Sets the health-probe retry override.
    #[must_use]
    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.config.retry_count = Some(retries);
        self
    }

    /// Returns `true` if the unit is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns a serializable metadata snapshot of this registration.
    #[must_use]
    pub fn info(&self) -> MiddlewareInfo {
        MiddlewareInfo::from(self)
    }
}

/// Serializable metadata view of a registration (no trait objects).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareInfo {
    /// Registration name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Description.
    pub description: String,
    /// Author.
    pub author: String,
    /// Functional category.
    pub category: MiddlewareCategory,
    /// Declared application contexts.
    pub contexts: Vec<ApplicationContext>,
    /// Discovery tags.
    pub tags: Vec<String>,
    /// Whether the unit is enabled.
    pub enabled: bool,
    /// Chain priority.
    pub priority: u8,
    /// Declared dependencies.
    pub dependencies: Vec<String>,
    /// Execution count.
    pub usage_count: u64,
    /// When the unit was registered.
    pub registered_at: DateTime<Utc>,
    /// When the unit last executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    /// Per-unit timeout in milliseconds, if overridden.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl From<&MiddlewareRegistration> for MiddlewareInfo {
    fn from(reg: &MiddlewareRegistration) -> Self {
        Self {
            name: reg.name.clone(),
            version: reg.version.clone(),
            description: reg.description.clone(),
            author: reg.author.clone(),
            category: reg.category,
            contexts: reg.contexts.iter().copied().collect(),
            tags: reg.tags.iter().cloned().collect(),
            enabled: reg.config.enabled,
            priority: reg.config.priority,
            dependencies: reg.dependencies.clone(),
            usage_count: reg.usage_count,
            registered_at: reg.registered_at,
            last_used: reg.last_used,
            timeout_ms: reg
                .config
                .timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

/// Outcome of one chain execution (or of a unit's termination decision).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareResult {
    /// `true` when no unit failed during the chain.
    pub success: bool,
    /// `false` when a unit terminated the chain early.
    pub should_continue: bool,
    /// The propagated error, when the chain ended in failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Response body supplied by a terminating unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Status code supplied by a terminating unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Response headers supplied by a terminating unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl MiddlewareResult {
    /// A successful chain completion.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            should_continue: true,
            error: None,
            response: None,
            status_code: None,
            headers: None,
        }
    }

    /// A chain that completed but saw at least one recovered failure.
    #[must_use]
    pub fn completed_with_failures(error: Option<String>) -> Self {
        Self {
            success: false,
            should_continue: true,
            error,
            response: None,
            status_code: None,
            headers: None,
        }
    }

    /// A chain that ended in an unrecovered failure.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            should_continue: false,
            error: Some(error.into()),
            response: None,
            status_code: None,
            headers: None,
        }
    }

    /// A chain terminated early by a unit, carrying its response verbatim.
    #[must_use]
    pub fn terminated(
        status_code: Option<u16>,
        response: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Self {
        Self {
            success: false,
            should_continue: false,
            error,
            response,
            status_code,
            headers: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::error::MiddlewareError;
    use crate::middleware::BoxFuture;

    struct Noop;

    impl Middleware for Noop {
        fn execute<'a>(
            &'a self,
            _ctx: &'a mut ExecutionContext,
        ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn noop() -> Arc<dyn Middleware> {
        Arc::new(Noop)
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("auth"));
        assert!(is_valid_name("rate-limiter_2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("dots.not.allowed"));
    }

    #[test]
    fn test_category_tables() {
        assert_eq!(MiddlewareCategory::ALL.len(), 9);
        assert!(MiddlewareCategory::Authentication.is_security_related());
        assert!(!MiddlewareCategory::Logging.is_security_related());
        assert_eq!(MiddlewareCategory::RateLimiting.name(), "rate_limiting");
    }

    #[test]
    fn test_registration_builder() {
        let reg = MiddlewareRegistration::new("auth", MiddlewareCategory::Authentication, noop())
            .with_version("1.2.0")
            .with_author("platform")
            .with_context(ApplicationContext::User)
            .with_tag("security")
            .with_dependency("logging")
            .with_priority(90)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(reg.name, "auth");
        assert_eq!(reg.config.name, "auth");
        assert_eq!(reg.config.priority, 90);
        assert!(reg.is_enabled());
        assert_eq!(reg.dependencies, vec!["logging"]);
        assert_eq!(reg.config.timeout, Some(Duration::from_secs(5)));
        assert!(reg.contexts.contains(&ApplicationContext::User));
    }

    #[test]
    fn test_info_snapshot_serializes() {
        let reg = MiddlewareRegistration::new("audit", MiddlewareCategory::Logging, noop())
            .with_version("0.1.0")
            .with_context(ApplicationContext::Audit)
            .with_timeout(Duration::from_millis(250));

        let info = reg.info();
        assert_eq!(info.timeout_ms, Some(250));

        let json = serde_json::to_string(&info).expect("serializes");
        assert!(json.contains("\"category\":\"logging\""));
        assert!(json.contains("\"contexts\":[\"audit\"]"));
    }

    #[test]
    fn test_result_constructors() {
        assert!(MiddlewareResult::ok().success);
        assert!(MiddlewareResult::ok().should_continue);

        let r = MiddlewareResult::terminated(Some(429), None, Some("throttled".into()));
        assert!(!r.success);
        assert!(!r.should_continue);
        assert_eq!(r.status_code, Some(429));
    }
}

//! Error types for the Daedalus registry.
//!
//! Two families of errors exist with deliberately different delivery:
//!
//! - [`RegistryError`] — rejected synchronously at the mutation boundary
//!   (duplicate names, missing dependencies). The registry is left unchanged.
//! - [`MiddlewareError`] — captured per-unit during chain execution and
//!   handed to the failing unit's own `on_error` handler.
//!
//! Structural *findings* (naming violations, cycles, priority conflicts) are
//! never raised as errors at all: they are returned as [`ValidationError`]
//! values tagged with a [`Severity`] so batch audits can present all findings
//! at once and callers decide policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for registry mutations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors rejected synchronously at the registry mutation boundary.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A registration with the same name already exists.
    #[error("middleware '{name}' is already registered")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// A declared dependency does not name an existing registration.
    #[error("middleware '{name}' depends on '{dependency}' which is not registered")]
    MissingDependency {
        /// The registration being added.
        name: String,
        /// The unresolved dependency.
        dependency: String,
    },

    /// The named registration does not exist.
    #[error("middleware '{name}' is not registered")]
    NotFound {
        /// The unknown name.
        name: String,
    },

    /// Other registrations still depend on the one being removed.
    #[error("middleware '{name}' cannot be removed: depended on by {dependents:?}")]
    HasDependents {
        /// The registration being removed.
        name: String,
        /// Direct dependents blocking the removal.
        dependents: Vec<String>,
    },

    /// The registration name is empty or contains invalid characters.
    #[error("invalid middleware name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },
}

impl RegistryError {
    /// Creates a duplicate-name error.
    #[must_use]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Creates a missing-dependency error.
    #[must_use]
    pub fn missing_dependency(name: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::MissingDependency {
            name: name.into(),
            dependency: dependency.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an invalid-name error.
    #[must_use]
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by a middleware unit during chain execution.
///
/// These are captured by the executor and routed to the failing unit's own
/// `on_error` handler; they only escape the chain when global policy forces
/// propagation.
#[derive(Error, Debug)]
pub enum MiddlewareError {
    /// The unit did not complete within its timeout.
    ///
    /// The timed-out future is dropped, which cancels it.
    #[error("middleware '{middleware}' timed out after {timeout:?}")]
    Timeout {
        /// The unit that timed out.
        middleware: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The unit failed while executing.
    #[error("middleware '{middleware}' failed: {message}")]
    Execution {
        /// The unit that failed.
        middleware: String,
        /// Human-readable failure message.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl MiddlewareError {
    /// Creates a timeout error for the given unit.
    #[must_use]
    pub fn timeout(middleware: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            middleware: middleware.into(),
            timeout,
        }
    }

    /// Creates an execution error with a message.
    #[must_use]
    pub fn execution(middleware: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            middleware: middleware.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an execution error wrapping an underlying error.
    pub fn execution_with_source(
        middleware: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Execution {
            middleware: middleware.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the name of the unit this error originated from.
    #[must_use]
    pub fn middleware_name(&self) -> &str {
        match self {
            Self::Timeout { middleware, .. } | Self::Execution { middleware, .. } => middleware,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The finding violates a structural invariant; callers should block on it.
    Error,
    /// The finding is advisory; the registry still functions.
    Warning,
}

/// A single validation finding.
///
/// Findings are accumulated and returned, never thrown, so a full audit can
/// surface every problem in one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// The field or aspect the finding applies to.
    pub field: String,
    /// Human-readable description.
    pub message: String,
    /// Machine-readable finding code.
    pub code: String,
    /// The offending value, if it is meaningful to echo back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// How serious the finding is.
    pub severity: Severity,
}

impl ValidationError {
    /// Creates an error-severity finding.
    #[must_use]
    pub fn error(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
            value: None,
            severity: Severity::Error,
        }
    }

    /// Creates a warning-severity finding.
    #[must_use]
    pub fn warning(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
            value: None,
            severity: Severity::Warning,
        }
    }

    /// Attaches the offending value to the finding.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Returns `true` if this finding has error severity.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::duplicate("auth");
        assert!(err.to_string().contains("already registered"));

        let err = RegistryError::missing_dependency("rate-limiter", "auth");
        assert!(err.to_string().contains("rate-limiter"));
        assert!(err.to_string().contains("auth"));
    }

    #[test]
    fn test_middleware_error_name() {
        let err = MiddlewareError::timeout("slow", Duration::from_secs(5));
        assert_eq!(err.middleware_name(), "slow");
        assert!(err.is_timeout());

        let err = MiddlewareError::execution("broken", "boom");
        assert_eq!(err.middleware_name(), "broken");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_validation_error_severity() {
        let finding = ValidationError::error("name", "name is empty", "EMPTY_NAME");
        assert!(finding.is_error());

        let finding = ValidationError::warning("description", "missing", "NO_DESCRIPTION")
            .with_value("");
        assert!(!finding.is_error());
        assert_eq!(finding.value.as_deref(), Some(""));
    }

    #[test]
    fn test_severity_serialization() {
        let json = serde_json::to_string(&Severity::Warning).expect("serializes");
        assert_eq!(json, "\"warning\"");
    }
}

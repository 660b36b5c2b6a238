//! Registry lifecycle event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of registry lifecycle events.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RegistryEventType {
    /// A middleware unit was added to the registry.
    MiddlewareRegistered,
    /// A middleware unit was removed from the registry.
    MiddlewareUnregistered,
    /// A unit was enabled.
    MiddlewareEnabled,
    /// A unit was disabled.
    MiddlewareDisabled,
    /// A chain execution completed.
    ChainExecuted,
    /// A chain execution ended in failure.
    ChainFailed,
    /// A health probe reported a unit healthy.
    HealthCheckPassed,
    /// A health probe reported a unit unhealthy.
    HealthCheckFailed,
    /// A full health-check sweep finished.
    HealthCheckSummary,
}

impl RegistryEventType {
    /// Returns the event-type name as used in logs and serialized output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MiddlewareRegistered => "middleware_registered",
            Self::MiddlewareUnregistered => "middleware_unregistered",
            Self::MiddlewareEnabled => "middleware_enabled",
            Self::MiddlewareDisabled => "middleware_disabled",
            Self::ChainExecuted => "chain_executed",
            Self::ChainFailed => "chain_failed",
            Self::HealthCheckPassed => "health_check_passed",
            Self::HealthCheckFailed => "health_check_failed",
            Self::HealthCheckSummary => "health_check_summary",
        }
    }
}

impl fmt::Display for RegistryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable, append-only registry lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEvent {
    /// What happened.
    pub event_type: RegistryEventType,
    /// The middleware the event concerns (`"registry"` for sweep-level
    /// events).
    pub middleware_name: String,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// Free-form event payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RegistryEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        event_type: RegistryEventType,
        middleware_name: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            middleware_name: middleware_name.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = RegistryEvent::new(
            RegistryEventType::MiddlewareRegistered,
            "auth",
            Some(serde_json::json!({ "priority": 90 })),
        );

        let json = serde_json::to_string(&event).expect("serializes");
        assert!(json.contains("\"event_type\":\"middleware_registered\""));
        assert!(json.contains("\"middleware_name\":\"auth\""));
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(RegistryEventType::ChainFailed.name(), "chain_failed");
        assert_eq!(
            RegistryEventType::HealthCheckSummary.to_string(),
            "health_check_summary"
        );
    }
}

//! # Daedalus
//!
//! **Composable middleware registry and execution pipeline**
//!
//! Daedalus is an opinionated middleware platform that provides:
//!
//! - 🗂 **Central Registry** – Named, versioned middleware with dependency tracking
//! - ⚙️ **Deterministic Pipelines** – Priority-ordered chains with per-unit timeouts
//! - 🧭 **Discovery** – Query middleware by category, context, tags, and usage
//! - 🩺 **Health Probing** – Async readiness checks with retries and periodic sweeps
//! - 📊 **Usage Analytics** – Execution trends and composition reports
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use daedalus::prelude::*;
//! use std::sync::Arc;
//!
//! struct Auth;
//!
//! impl Middleware for Auth {
//!     fn execute<'a>(
//!         &'a self,
//!         ctx: &'a mut ExecutionContext,
//!     ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
//!         Box::pin(async move {
//!             // Your middleware logic here
//!             Ok(())
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let framework = MiddlewareFramework::new();
//!     framework.register(
//!         MiddlewareRegistration::new("auth", MiddlewareCategory::Authentication, Arc::new(Auth))
//!             .with_version("1.0.0")
//!             .with_context(ApplicationContext::User)
//!             .with_priority(90),
//!     )?;
//!
//!     let request = RequestContext::new("GET", "/api/users/42", ApplicationContext::User);
//!     let result = framework.execute_chain(request).await;
//!     assert!(result.success);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The registry is the single source of truth; every other component
//! observes it through snapshots:
//!
//! ```text
//! Request → Framework → filter → sort → execute loop → MiddlewareResult
//!              │
//!           Registry ←─ Validator / HealthChecker / Discovery / Statistics
//!              │
//!           EventManager (lifecycle + health events)
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use daedalus_core as core;

// Re-export the event bus
pub use daedalus_events as events;

// Re-export the registry, pipeline, and discovery
pub use daedalus_registry as registry;

// Re-export validation and health checking
pub use daedalus_sentinel as sentinel;

// Re-export usage analytics
pub use daedalus_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use daedalus::prelude::*;
/// ```
pub mod prelude {
    pub use daedalus_core::context::{ExecutionContext, RequestContext, SecurityContext};
    pub use daedalus_core::error::{
        MiddlewareError, RegistryError, RegistryResult, Severity, ValidationError,
    };
    pub use daedalus_core::middleware::{
        BoxFuture, ErrorDecision, FnMiddleware, Middleware, UsageRecorder,
    };
    pub use daedalus_core::types::{
        ApplicationContext, MiddlewareCategory, MiddlewareConfig, MiddlewareInfo,
        MiddlewareRegistration, MiddlewareResult,
    };

    // Re-export condition types
    pub use daedalus_core::condition::{Condition, ConditionKind, ConditionOperator};

    // Re-export registry types
    pub use daedalus_registry::{
        Discovery, DiscoveryCriteria, FrameworkConfig, MiddlewareFramework, MiddlewareRegistry,
        PolicyEnforcementPoint, StaticPolicyEnforcementPoint,
    };

    // Re-export event types
    pub use daedalus_events::{EventManager, EventStats, RegistryEvent, RegistryEventType};

    // Re-export validation and health types
    pub use daedalus_sentinel::{
        HealthCheckConfig, HealthChecker, ValidationReport,
    };

    // Re-export analytics types
    pub use daedalus_telemetry::{RegistryStats, UsageStatistics};
}

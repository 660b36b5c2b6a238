//! # Daedalus Core
//!
//! Core types and the middleware contract for the Daedalus registry.
//!
//! Daedalus composes named, independently-authored processing units into a
//! deterministic per-request execution chain. This crate defines everything
//! the rest of the workspace operates over:
//!
//! - the [`Middleware`](middleware::Middleware) trait
//!   (`execute`/`should_execute`/`on_error` plus the health `probe`);
//! - [`MiddlewareRegistration`](types::MiddlewareRegistration), the value
//!   type of the shared registry map;
//! - [`RequestContext`](context::RequestContext) and
//!   [`ExecutionContext`](context::ExecutionContext);
//! - declarative [`Condition`](condition::Condition)s gating chain
//!   participation;
//! - the error and validation-finding vocabulary.
//!
//! The executor, validator, health checker, statistics, and event bus live
//! in their own crates and depend on this one.

#![doc(html_root_url = "https://docs.rs/daedalus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod condition;
pub mod context;
pub mod error;
pub mod middleware;
pub mod types;

// Re-export main types at crate root
pub use condition::{Condition, ConditionKind, ConditionOperator};
pub use context::{ExecutionContext, PerformanceRecord, RequestContext, SecurityContext};
pub use error::{
    MiddlewareError, RegistryError, RegistryResult, Severity, ValidationError,
};
pub use middleware::{BoxFuture, ErrorDecision, FnMiddleware, Middleware, UsageRecorder};
pub use types::{
    is_valid_name, ApplicationContext, MiddlewareCategory, MiddlewareConfig, MiddlewareInfo,
    MiddlewareRegistration, MiddlewareResult, MAX_NAME_LENGTH, MAX_PRIORITY,
};

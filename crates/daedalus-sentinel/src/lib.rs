//! # Daedalus Sentinel
//!
//! The registry's watchdogs: structural validation and readiness probing.
//!
//! [`validator`] audits a registration snapshot for naming violations,
//! unresolved and cyclic dependencies, and priority conflicts, producing a
//! [`ValidationReport`] of tagged findings. [`health`] drives asynchronous
//! readiness probes over the live registry, caches the verdicts, and
//! announces failures on the event bus.
//!
//! Both components are read-side observers: they take snapshots, never hold
//! registry locks, and never mutate registrations.

#![doc(html_root_url = "https://docs.rs/daedalus-sentinel/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod health;
pub mod validator;

pub use health::{HealthCheckConfig, HealthCheckResult, HealthChecker, HealthStatistics};
pub use validator::{
    can_remove, validate, validate_name, validate_single, DependencyCycle, PriorityConflict,
    RemovalCheck, ValidationReport, ValidationStatistics,
};

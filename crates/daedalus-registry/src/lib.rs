//! # Daedalus Registry
//!
//! The registry store, pipeline executor, and discovery engine.
//!
//! [`MiddlewareFramework`] is the single owner of the shared
//! `name → registration` map: registrations go in through it, chains are
//! built and executed by it, and the policy-enforcement collaborator hangs
//! off it. Read-side components ([`Discovery`] here, the validator, health
//! checker and statistics in their own crates) observe the same map through
//! snapshots.
//!
//! ## Execution model
//!
//! ```text
//! request ──▶ filter (enabled ∧ should_execute ∧ conditions)
//!         ──▶ sort (priority desc, registration order)
//!         ──▶ loop: timeout(execute) → on_error → continue / terminate
//!         ──▶ MiddlewareResult
//! ```
//!
//! Each request gets its own [`ExecutionContext`](daedalus_core::ExecutionContext);
//! concurrent requests share nothing but the registry snapshot.

#![doc(html_root_url = "https://docs.rs/daedalus-registry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod discovery;
pub mod pipeline;
pub mod policy;
pub mod store;

pub use discovery::{Discovery, DiscoveryCriteria};
pub use pipeline::{FrameworkConfig, MiddlewareFramework};
pub use policy::{PolicyEnforcementPoint, PolicyError, StaticPolicyEnforcementPoint};
pub use store::MiddlewareRegistry;

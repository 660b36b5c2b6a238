//! # Daedalus Events
//!
//! Bounded pub/sub bus for registry lifecycle observability.
//!
//! The [`EventManager`] retains a circular history of
//! [`RegistryEvent`]s (oldest dropped past the bound) and notifies
//! subscribed listeners synchronously. A failing listener never disturbs
//! other listeners or the emitter.
//!
//! The bus is a leaf: it has no dependency on the registry. The registry
//! owner decides what to announce — registration mutations are announced by
//! the caller, health sweeps by the health checker.

#![doc(html_root_url = "https://docs.rs/daedalus-events/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bus;
pub mod event;

pub use bus::{EventListener, EventManager, EventStats, ListenerId, DEFAULT_MAX_HISTORY};
pub use event::{RegistryEvent, RegistryEventType};

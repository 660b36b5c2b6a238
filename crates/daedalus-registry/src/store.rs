//! The shared registration store.
//!
//! [`MiddlewareRegistry`] owns the `name → registration` map everything else
//! operates over. Mutation (register/unregister/enable) goes through this
//! single owner; read-side components (validator, discovery, health checker,
//! statistics) work on snapshots and never block execution.
//!
//! The interior `RwLock` serializes concurrent writers, but the design
//! assumes a single logical writer: embedders that mutate from several
//! places must provide their own ordering on top.

use chrono::Utc;
use daedalus_core::error::{RegistryError, RegistryResult};
use daedalus_core::types::{is_valid_name, MiddlewareInfo, MiddlewareRegistration};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Single-owner store for middleware registrations.
#[derive(Debug, Default)]
pub struct MiddlewareRegistry {
    entries: RwLock<BTreeMap<String, MiddlewareRegistration>>,
    next_sequence: AtomicU64,
}

impl MiddlewareRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration.
    ///
    /// Fails on a malformed or duplicate name, or when a declared dependency
    /// does not name an existing registration. On failure the registry is
    /// left unchanged. No event is emitted here — lifecycle announcements
    /// belong to the caller.
    pub fn register(&self, mut registration: MiddlewareRegistration) -> RegistryResult<()> {
        if !is_valid_name(&registration.name) {
            return Err(RegistryError::invalid_name(
                registration.name.clone(),
                "names must be non-empty and contain only [a-zA-Z0-9_-]",
            ));
        }

        let mut entries = self.entries.write();
        if entries.contains_key(&registration.name) {
            return Err(RegistryError::duplicate(registration.name.clone()));
        }
        for dependency in &registration.dependencies {
            if !entries.contains_key(dependency) {
                return Err(RegistryError::missing_dependency(
                    registration.name.clone(),
                    dependency.clone(),
                ));
            }
        }

        registration.sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        info!(
            name = %registration.name,
            category = %registration.category,
            priority = registration.config.priority,
            "middleware registered"
        );
        entries.insert(registration.name.clone(), registration);
        Ok(())
    }

    /// Removes a registration.
    ///
    /// Fails when unknown, or when any other registration lists `name` as a
    /// dependency. This check is intentionally shallow (direct dependents
    /// only); use the validator's removal audit for the transitive picture
    /// before unregistering.
    pub fn unregister(&self, name: &str) -> RegistryResult<()> {
        let mut entries = self.entries.write();
        if !entries.contains_key(name) {
            return Err(RegistryError::not_found(name));
        }

        let dependents: Vec<String> = entries
            .values()
            .filter(|reg| reg.name != name && reg.dependencies.iter().any(|d| d == name))
            .map(|reg| reg.name.clone())
            .collect();
        if !dependents.is_empty() {
            return Err(RegistryError::HasDependents {
                name: name.to_string(),
                dependents,
            });
        }

        entries.remove(name);
        info!(name, "middleware unregistered");
        Ok(())
    }

    /// Enables or disables a registration.
    ///
    /// The stored config is replaced wholesale so readers holding an earlier
    /// snapshot never observe a half-updated config.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> RegistryResult<()> {
        let mut entries = self.entries.write();
        let registration = entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::not_found(name))?;

        let mut config = registration.config.clone();
        config.enabled = enabled;
        registration.config = config;
        debug!(name, enabled, "middleware enabled flag updated");
        Ok(())
    }

    /// Bumps the usage counter and last-used timestamp for an executed unit.
    pub fn record_execution(&self, name: &str) {
        let mut entries = self.entries.write();
        if let Some(registration) = entries.get_mut(name) {
            registration.usage_count += 1;
            registration.last_used = Some(Utc::now());
        }
    }

    /// Returns a clone of one registration.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<MiddlewareRegistration> {
        self.entries.read().get(name).cloned()
    }

    /// Returns `true` if a registration with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Returns a point-in-time clone of the whole map.
    ///
    /// Snapshots are cheap (`Arc`-backed middleware) and are how every
    /// read-side component observes the registry.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, MiddlewareRegistration> {
        self.entries.read().clone()
    }

    /// Returns the registered names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no middleware is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns serializable metadata snapshots for all registrations.
    #[must_use]
    pub fn info(&self) -> Vec<MiddlewareInfo> {
        self.entries.read().values().map(MiddlewareInfo::from).collect()
    }
}

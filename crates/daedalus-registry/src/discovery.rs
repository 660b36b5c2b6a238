//! Criteria-based search over the registry.
//!
//! Pure read side: a [`Discovery`] borrows the shared registry, applies
//! [`DiscoveryCriteria`] conjunctively over a snapshot, and returns
//! serializable metadata views. It never mutates execution behavior.

use crate::store::MiddlewareRegistry;
use chrono::{Duration as ChronoDuration, Utc};
use daedalus_core::types::{
    ApplicationContext, MiddlewareCategory, MiddlewareInfo, MiddlewareRegistration,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum number of suggestions returned for a context.
const MAX_SUGGESTIONS: usize = 10;

/// Search criteria, applied conjunctively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryCriteria {
    /// Exact category match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<MiddlewareCategory>,
    /// The unit must declare this context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ApplicationContext>,
    /// Enabled-flag match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Inclusive lower priority bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_priority: Option<u8>,
    /// Inclusive upper priority bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority: Option<u8>,
    /// All requested tags must be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// All requested dependencies must be declared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Case-insensitive substring over name, description, author and tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl DiscoveryCriteria {
    /// Returns `true` if the registration satisfies every criterion.
    fn matches(&self, reg: &MiddlewareRegistration) -> bool {
        if self.category.is_some_and(|c| c != reg.category) {
            return false;
        }
        if self.context.is_some_and(|c| !reg.contexts.contains(&c)) {
            return false;
        }
        if self.enabled.is_some_and(|e| e != reg.config.enabled) {
            return false;
        }
        if self.min_priority.is_some_and(|p| reg.config.priority < p) {
            return false;
        }
        if self.max_priority.is_some_and(|p| reg.config.priority > p) {
            return false;
        }
        if !self.tags.iter().all(|t| reg.tags.contains(t)) {
            return false;
        }
        if !self
            .dependencies
            .iter()
            .all(|d| reg.dependencies.iter().any(|dep| dep == d))
        {
            return false;
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let haystack_hit = reg.name.to_lowercase().contains(&needle)
                || reg.description.to_lowercase().contains(&needle)
                || reg.author.to_lowercase().contains(&needle)
                || reg.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !haystack_hit {
                return false;
            }
        }
        true
    }
}

/// Read-only query engine over the shared registry.
#[derive(Debug, Clone)]
pub struct Discovery {
    registry: Arc<MiddlewareRegistry>,
}

impl Discovery {
    /// Creates a discovery view over the registry.
    #[must_use]
    pub fn new(registry: Arc<MiddlewareRegistry>) -> Self {
        Self { registry }
    }

    /// Returns registrations matching the criteria, sorted by priority
    /// descending, then usage descending, then registration time descending.
    #[must_use]
    pub fn discover(&self, criteria: &DiscoveryCriteria) -> Vec<MiddlewareInfo> {
        let snapshot = self.registry.snapshot();
        let mut matched: Vec<&MiddlewareRegistration> =
            snapshot.values().filter(|reg| criteria.matches(reg)).collect();

        matched.sort_by(|a, b| {
            b.config
                .priority
                .cmp(&a.config.priority)
                .then(b.usage_count.cmp(&a.usage_count))
                .then(b.registered_at.cmp(&a.registered_at))
        });

        matched.into_iter().map(MiddlewareInfo::from).collect()
    }

    /// Registrations in the given category.
    #[must_use]
    pub fn by_category(&self, category: MiddlewareCategory) -> Vec<MiddlewareInfo> {
        self.discover(&DiscoveryCriteria {
            category: Some(category),
            ..DiscoveryCriteria::default()
        })
    }

    /// Registrations declaring the given context.
    #[must_use]
    pub fn by_context(&self, context: ApplicationContext) -> Vec<MiddlewareInfo> {
        self.discover(&DiscoveryCriteria {
            context: Some(context),
            ..DiscoveryCriteria::default()
        })
    }

    /// All enabled registrations.
    #[must_use]
    pub fn enabled(&self) -> Vec<MiddlewareInfo> {
        self.discover(&DiscoveryCriteria {
            enabled: Some(true),
            ..DiscoveryCriteria::default()
        })
    }

    /// All disabled registrations.
    #[must_use]
    pub fn disabled(&self) -> Vec<MiddlewareInfo> {
        self.discover(&DiscoveryCriteria {
            enabled: Some(false),
            ..DiscoveryCriteria::default()
        })
    }

    /// Free-text search over name, description, author and tags.
    #[must_use]
    pub fn search(&self, text: impl Into<String>) -> Vec<MiddlewareInfo> {
        self.discover(&DiscoveryCriteria {
            search: Some(text.into()),
            ..DiscoveryCriteria::default()
        })
    }

    /// The `limit` most-used registrations.
    #[must_use]
    pub fn most_used(&self, limit: usize) -> Vec<MiddlewareInfo> {
        let snapshot = self.registry.snapshot();
        let mut regs: Vec<&MiddlewareRegistration> = snapshot.values().collect();
        regs.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        regs.into_iter().take(limit).map(MiddlewareInfo::from).collect()
    }

    /// Registrations added within the trailing `days`, newest first.
    #[must_use]
    pub fn recently_registered(&self, days: i64, limit: Option<usize>) -> Vec<MiddlewareInfo> {
        let cutoff = Utc::now() - ChronoDuration::days(days);
        let snapshot = self.registry.snapshot();
        let mut regs: Vec<&MiddlewareRegistration> = snapshot
            .values()
            .filter(|reg| reg.registered_at >= cutoff)
            .collect();
        regs.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        regs.into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(MiddlewareInfo::from)
            .collect()
    }

    /// Registrations used within the trailing `days`, most recently used
    /// first.
    #[must_use]
    pub fn recently_used(&self, days: i64, limit: Option<usize>) -> Vec<MiddlewareInfo> {
        let cutoff = Utc::now() - ChronoDuration::days(days);
        let snapshot = self.registry.snapshot();
        let mut regs: Vec<&MiddlewareRegistration> = snapshot
            .values()
            .filter(|reg| reg.last_used.is_some_and(|t| t >= cutoff))
            .collect();
        regs.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        regs.into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(MiddlewareInfo::from)
            .collect()
    }

    /// Candidates for a context that are not already in use, ranked by
    /// priority then usage, capped at ten.
    #[must_use]
    pub fn suggestions(
        &self,
        context: ApplicationContext,
        existing: &[String],
    ) -> Vec<MiddlewareInfo> {
        let snapshot = self.registry.snapshot();
        let mut candidates: Vec<&MiddlewareRegistration> = snapshot
            .values()
            .filter(|reg| {
                reg.contexts.contains(&context) && !existing.iter().any(|n| n == &reg.name)
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.config
                .priority
                .cmp(&a.config.priority)
                .then(b.usage_count.cmp(&a.usage_count))
        });
        candidates
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(MiddlewareInfo::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::context::ExecutionContext;
    use daedalus_core::error::MiddlewareError;
    use daedalus_core::middleware::{BoxFuture, Middleware};
    use daedalus_core::types::MiddlewareRegistration;

    struct Noop;

    impl Middleware for Noop {
        fn execute<'a>(
            &'a self,
            _ctx: &'a mut ExecutionContext,
        ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn seeded_registry() -> Arc<MiddlewareRegistry> {
        let registry = Arc::new(MiddlewareRegistry::new());
        registry
            .register(
                MiddlewareRegistration::new(
                    "auth",
                    MiddlewareCategory::Authentication,
                    Arc::new(Noop),
                )
                .with_version("1.0.0")
                .with_author("identity team")
                .with_description("token verification")
                .with_context(ApplicationContext::User)
                .with_context(ApplicationContext::Session)
                .with_tag("security")
                .with_priority(90),
            )
            .expect("registers");
        registry
            .register(
                MiddlewareRegistration::new("audit", MiddlewareCategory::Logging, Arc::new(Noop))
                    .with_version("1.0.0")
                    .with_context(ApplicationContext::Audit)
                    .with_tag("observability")
                    .with_priority(20),
            )
            .expect("registers");
        registry
            .register(
                MiddlewareRegistration::new(
                    "rate-limiter",
                    MiddlewareCategory::RateLimiting,
                    Arc::new(Noop),
                )
                .with_version("1.0.0")
                .with_dependency("auth")
                .with_context(ApplicationContext::User)
                .with_tag("security")
                .with_priority(70)
                .with_enabled(false),
            )
            .expect("registers");
        registry
    }

    #[test]
    fn test_conjunctive_criteria() {
        let discovery = Discovery::new(seeded_registry());

        let hits = discovery.discover(&DiscoveryCriteria {
            context: Some(ApplicationContext::User),
            tags: vec!["security".to_string()],
            ..DiscoveryCriteria::default()
        });
        let names: Vec<&str> = hits.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["auth", "rate-limiter"]);

        let hits = discovery.discover(&DiscoveryCriteria {
            context: Some(ApplicationContext::User),
            enabled: Some(true),
            ..DiscoveryCriteria::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "auth");
    }

    #[test]
    fn test_priority_range_and_dependency_filters() {
        let discovery = Discovery::new(seeded_registry());

        let hits = discovery.discover(&DiscoveryCriteria {
            min_priority: Some(50),
            max_priority: Some(80),
            ..DiscoveryCriteria::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "rate-limiter");

        let hits = discovery.discover(&DiscoveryCriteria {
            dependencies: vec!["auth".to_string()],
            ..DiscoveryCriteria::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "rate-limiter");
    }

    #[test]
    fn test_free_text_search_is_case_insensitive() {
        let discovery = Discovery::new(seeded_registry());

        let hits = discovery.search("TOKEN");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "auth");

        let hits = discovery.search("observability");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "audit");
    }

    #[test]
    fn test_convenience_views() {
        let discovery = Discovery::new(seeded_registry());

        assert_eq!(discovery.by_category(MiddlewareCategory::Logging).len(), 1);
        assert_eq!(discovery.by_context(ApplicationContext::Session).len(), 1);
        assert_eq!(discovery.enabled().len(), 2);
        assert_eq!(discovery.disabled().len(), 1);
    }

    #[test]
    fn test_most_used_ranking() {
        let registry = seeded_registry();
        registry.record_execution("audit");
        registry.record_execution("audit");
        registry.record_execution("auth");

        let discovery = Discovery::new(registry);
        let top = discovery.most_used(2);
        assert_eq!(top[0].name, "audit");
        assert_eq!(top[1].name, "auth");
    }

    #[test]
    fn test_recently_registered_and_used() {
        let registry = seeded_registry();
        registry.record_execution("auth");
        let discovery = Discovery::new(registry);

        assert_eq!(discovery.recently_registered(1, None).len(), 3);
        assert_eq!(discovery.recently_registered(1, Some(2)).len(), 2);

        let used = discovery.recently_used(1, None);
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].name, "auth");
    }

    #[test]
    fn test_suggestions_exclude_existing_and_cap() {
        let discovery = Discovery::new(seeded_registry());

        let suggested =
            discovery.suggestions(ApplicationContext::User, &["auth".to_string()]);
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].name, "rate-limiter");

        let suggested = discovery.suggestions(ApplicationContext::User, &[]);
        let names: Vec<&str> = suggested.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["auth", "rate-limiter"]);
    }
}

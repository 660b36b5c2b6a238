//! Usage recording and registry-composition analytics.
//!
//! [`UsageStatistics`] is the telemetry sink the framework feeds through the
//! [`UsageRecorder`] trait: one sample per executed unit, folded into a
//! running per-unit average and a bounded trend log. The report methods
//! combine those samples with a registration snapshot to answer composition
//! questions (category and context spread, most and least used units,
//! registration growth).

use chrono::{DateTime, Datelike, Utc};
use daedalus_core::middleware::UsageRecorder;
use daedalus_core::types::{ApplicationContext, MiddlewareCategory, MiddlewareRegistration};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tracing::trace;

/// Bound on the retained execution trend log.
pub const MAX_TREND_ENTRIES: usize = 10_000;

const TOP_N: usize = 5;

/// One recorded execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageTrendEntry {
    /// The executed unit.
    pub middleware_name: String,
    /// When the sample was recorded.
    pub timestamp: DateTime<Utc>,
    /// Wall time of the execution, when measured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

/// Accumulated usage for one unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitUsage {
    /// All-time execution count.
    pub total_executions: u64,
    /// Running mean wall time over timed samples, in milliseconds.
    pub average_execution_time_ms: f64,
    /// When the unit last executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_executed: Option<DateTime<Utc>>,
}

/// A (name, executions) ranking entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRanking {
    /// Unit name.
    pub name: String,
    /// All-time execution count.
    pub executions: u64,
}

/// Composition and usage breakdown for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    /// The category.
    pub category: MiddlewareCategory,
    /// Registered units in the category.
    pub count: usize,
    /// Share of all registrations, 0–100.
    pub percentage: f64,
    /// Summed executions over the category's units.
    pub total_usage: u64,
    /// The category's most-executed unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_used: Option<String>,
}

/// Composition breakdown for one application context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextStats {
    /// The context.
    pub context: ApplicationContext,
    /// Units declaring the context.
    pub count: usize,
    /// Share of all registrations, 0–100.
    pub percentage: f64,
}

/// Executions bucketed by calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    /// The day, `YYYY-MM-DD`.
    pub date: String,
    /// Executions recorded on that day.
    pub executions: u64,
    /// Distinct units that executed on that day.
    pub unique_middleware: usize,
    /// The day's most-executed units, at most five.
    pub top: Vec<UsageRanking>,
}

/// Aggregate timing numbers over recorded executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// All-time recorded executions.
    pub total_executions: u64,
    /// Mean wall time over all timed samples, in milliseconds.
    pub average_execution_time_ms: Option<f64>,
    /// The unit with the highest per-unit average, over units with samples.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest_middleware: Option<String>,
    /// The unit with the lowest per-unit average.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest_middleware: Option<String>,
}

/// The full registry report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Total registrations.
    pub total_middleware: usize,
    /// Enabled registrations.
    pub enabled_count: usize,
    /// Registrations per category, including empty ones.
    pub by_category: BTreeMap<MiddlewareCategory, usize>,
    /// Registrations per context, including empty ones.
    pub by_context: BTreeMap<ApplicationContext, usize>,
    /// Mean execution count per registration.
    pub average_usage: f64,
    /// Top executed units, at most five.
    pub most_used: Vec<UsageRanking>,
    /// Least executed units, at most five.
    pub least_used: Vec<UsageRanking>,
    /// Registrations bucketed by day and category.
    pub registration_trend: BTreeMap<String, BTreeMap<MiddlewareCategory, usize>>,
}

#[derive(Default)]
struct Inner {
    trend: VecDeque<UsageTrendEntry>,
    per_name: HashMap<String, UnitUsage>,
    total_executions: u64,
}

/// Thread-safe usage accumulator and report generator.
#[derive(Default)]
pub struct UsageStatistics {
    inner: RwLock<Inner>,
}

impl UsageStatistics {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the full composition report from a registration snapshot.
    #[must_use]
    pub fn generate_stats(
        &self,
        registry: &BTreeMap<String, MiddlewareRegistration>,
    ) -> RegistryStats {
        // Pre-seed so empty categories and contexts appear with zero counts.
        let mut by_category: BTreeMap<MiddlewareCategory, usize> =
            MiddlewareCategory::ALL.iter().map(|c| (*c, 0)).collect();
        let mut by_context: BTreeMap<ApplicationContext, usize> =
            ApplicationContext::ALL.iter().map(|c| (*c, 0)).collect();
        let mut registration_trend: BTreeMap<String, BTreeMap<MiddlewareCategory, usize>> =
            BTreeMap::new();

        for registration in registry.values() {
            *by_category.entry(registration.category).or_insert(0) += 1;
            for context in &registration.contexts {
                *by_context.entry(*context).or_insert(0) += 1;
            }
            let day = day_key(registration.registered_at);
            *registration_trend
                .entry(day)
                .or_default()
                .entry(registration.category)
                .or_insert(0) += 1;
        }

        let mut by_usage: Vec<UsageRanking> = registry
            .values()
            .map(|r| UsageRanking {
                name: r.name.clone(),
                executions: r.usage_count,
            })
            .collect();
        by_usage.sort_by(|a, b| b.executions.cmp(&a.executions).then(a.name.cmp(&b.name)));

        let most_used = by_usage.iter().take(TOP_N).cloned().collect();
        let least_used = {
            let mut tail: Vec<UsageRanking> = by_usage.iter().rev().take(TOP_N).cloned().collect();
            tail.sort_by(|a, b| a.executions.cmp(&b.executions).then(a.name.cmp(&b.name)));
            tail
        };

        let average_usage = if registry.is_empty() {
            0.0
        } else {
            registry.values().map(|r| r.usage_count as f64).sum::<f64>() / registry.len() as f64
        };

        RegistryStats {
            total_middleware: registry.len(),
            enabled_count: registry.values().filter(|r| r.config.enabled).count(),
            by_category,
            by_context,
            average_usage,
            most_used,
            least_used,
            registration_trend,
        }
    }

    /// Per-category composition with usage totals.
    #[must_use]
    pub fn category_stats(
        &self,
        registry: &BTreeMap<String, MiddlewareRegistration>,
    ) -> Vec<CategoryStats> {
        let total = registry.len();
        MiddlewareCategory::ALL
            .iter()
            .map(|category| {
                let members: Vec<&MiddlewareRegistration> = registry
                    .values()
                    .filter(|r| r.category == *category)
                    .collect();
                let most_used = members
                    .iter()
                    .max_by(|a, b| a.usage_count.cmp(&b.usage_count).then(b.name.cmp(&a.name)))
                    .filter(|r| r.usage_count > 0)
                    .map(|r| r.name.clone());
                CategoryStats {
                    category: *category,
                    count: members.len(),
                    percentage: percentage(members.len(), total),
                    total_usage: members.iter().map(|r| r.usage_count).sum(),
                    most_used,
                }
            })
            .collect()
    }

    /// Per-context composition.
    #[must_use]
    pub fn context_stats(
        &self,
        registry: &BTreeMap<String, MiddlewareRegistration>,
    ) -> Vec<ContextStats> {
        let total = registry.len();
        ApplicationContext::ALL
            .iter()
            .map(|context| {
                let count = registry
                    .values()
                    .filter(|r| r.contexts.contains(context))
                    .count();
                ContextStats {
                    context: *context,
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect()
    }

    /// Executions bucketed per day over the trailing `days`, oldest first.
    /// Days with no recorded executions appear with a zero count.
    #[must_use]
    pub fn daily_usage_stats(&self, days: u32) -> Vec<DailyUsage> {
        let inner = self.inner.read();
        let mut buckets: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        let today = Utc::now().date_naive();
        for offset in (0..days).rev() {
            if let Some(day) = today.checked_sub_days(chrono::Days::new(u64::from(offset))) {
                buckets.insert(day.format("%Y-%m-%d").to_string(), BTreeMap::new());
            }
        }
        for entry in &inner.trend {
            let key = day_key(entry.timestamp);
            if let Some(per_name) = buckets.get_mut(&key) {
                *per_name.entry(entry.middleware_name.clone()).or_insert(0) += 1;
            }
        }
        buckets
            .into_iter()
            .map(|(date, per_name)| day_summary(date, &per_name))
            .collect()
    }

    /// The busiest recorded day over the whole trend log, if anything was
    /// recorded.
    #[must_use]
    pub fn peak_usage_day(&self) -> Option<DailyUsage> {
        let inner = self.inner.read();
        let mut by_day: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        for entry in &inner.trend {
            *by_day
                .entry(day_key(entry.timestamp))
                .or_default()
                .entry(entry.middleware_name.clone())
                .or_insert(0) += 1;
        }
        by_day
            .into_iter()
            .map(|(date, per_name)| day_summary(date, &per_name))
            .max_by(|a, b| a.executions.cmp(&b.executions).then(b.date.cmp(&a.date)))
    }

    /// Returns recorded executions, most recent first, up to `limit`.
    #[must_use]
    pub fn usage_trends(&self, limit: Option<usize>) -> Vec<UsageTrendEntry> {
        let inner = self.inner.read();
        let take = limit.unwrap_or(usize::MAX);
        inner.trend.iter().rev().take(take).cloned().collect()
    }

    /// Returns the accumulated usage for one unit.
    #[must_use]
    pub fn usage_for(&self, name: &str) -> Option<UnitUsage> {
        self.inner.read().per_name.get(name).cloned()
    }

    /// Aggregate timing numbers over everything recorded so far.
    #[must_use]
    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let inner = self.inner.read();
        let timed: Vec<(&String, &UnitUsage)> = inner
            .per_name
            .iter()
            .filter(|(_, usage)| usage.average_execution_time_ms > 0.0)
            .collect();

        let average = if timed.is_empty() {
            None
        } else {
            // Weighted by execution count so busy units dominate the mean.
            let executions: u64 = timed.iter().map(|(_, u)| u.total_executions).sum();
            let weighted: f64 = timed
                .iter()
                .map(|(_, u)| u.average_execution_time_ms * u.total_executions as f64)
                .sum();
            Some(weighted / executions as f64)
        };

        let slowest = timed
            .iter()
            .max_by(|a, b| {
                a.1.average_execution_time_ms
                    .total_cmp(&b.1.average_execution_time_ms)
            })
            .map(|(name, _)| (*name).clone());
        let fastest = timed
            .iter()
            .min_by(|a, b| {
                a.1.average_execution_time_ms
                    .total_cmp(&b.1.average_execution_time_ms)
            })
            .map(|(name, _)| (*name).clone());

        PerformanceMetrics {
            total_executions: inner.total_executions,
            average_execution_time_ms: average,
            slowest_middleware: slowest,
            fastest_middleware: fastest,
        }
    }
}

impl UsageRecorder for UsageStatistics {
    fn record_usage(&self, name: &str, execution_time: Option<Duration>) {
        let now = Utc::now();
        let millis = execution_time.map(|d| d.as_secs_f64() * 1000.0);
        trace!(middleware = name, execution_time_ms = millis, "usage sample");

        let mut inner = self.inner.write();
        inner.total_executions += 1;

        inner.trend.push_back(UsageTrendEntry {
            middleware_name: name.to_string(),
            timestamp: now,
            execution_time_ms: millis.map(|m| m as u64),
        });
        while inner.trend.len() > MAX_TREND_ENTRIES {
            inner.trend.pop_front();
        }

        let usage = inner.per_name.entry(name.to_string()).or_default();
        let previous = usage.total_executions;
        usage.total_executions += 1;
        usage.last_executed = Some(now);
        if let Some(sample) = millis {
            usage.average_execution_time_ms = (usage.average_execution_time_ms
                * previous as f64
                + sample)
                / (previous + 1) as f64;
        }
    }
}

impl std::fmt::Debug for UsageStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("UsageStatistics")
            .field("total_executions", &inner.total_executions)
            .field("tracked_units", &inner.per_name.len())
            .field("trend_entries", &inner.trend.len())
            .finish()
    }
}

fn day_summary(date: String, per_name: &BTreeMap<String, u64>) -> DailyUsage {
    let mut top: Vec<UsageRanking> = per_name
        .iter()
        .map(|(name, executions)| UsageRanking {
            name: name.clone(),
            executions: *executions,
        })
        .collect();
    top.sort_by(|a, b| b.executions.cmp(&a.executions).then(a.name.cmp(&b.name)));
    top.truncate(TOP_N);

    DailyUsage {
        date,
        executions: per_name.values().sum(),
        unique_middleware: per_name.len(),
        top,
    }
}

fn day_key(timestamp: DateTime<Utc>) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        timestamp.year(),
        timestamp.month(),
        timestamp.day()
    )
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

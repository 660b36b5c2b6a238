//! # Daedalus Telemetry
//!
//! Usage accounting and composition analytics for the registry.
//!
//! [`UsageStatistics`] implements the framework's
//! [`UsageRecorder`](daedalus_core::middleware::UsageRecorder) sink: attach
//! one to a framework and every executed unit feeds it a sample. Reports are
//! computed on demand from the accumulated samples plus a registration
//! snapshot, so generating them never blocks execution.

#![doc(html_root_url = "https://docs.rs/daedalus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod stats;

pub use stats::{
    CategoryStats, ContextStats, DailyUsage, PerformanceMetrics, RegistryStats, UnitUsage,
    UsageRanking, UsageStatistics, UsageTrendEntry, MAX_TREND_ENTRIES,
};

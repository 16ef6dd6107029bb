// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # TxPulse
//!
//! Transaction KPI aggregation, period comparison and threshold alerting.
//!
//! TxPulse turns raw per-window aggregates into business KPIs and watches them:
//! - **Snapshots**: null-safe KPI values for a window, amounts rounded to cents
//! - **Comparisons**: percent change between adjacent windows
//! - **Thresholds**: WARNING/CRITICAL bands per rule, plus an INFO volume rule
//! - **Suppression**: the same alert type fires at most once per window
//!
//! ## Quick Start
//!
//! ```rust
//! use txpulse::{KpiCalculator, PeriodStatsBuilder, ThresholdConfig, ThresholdEvaluator};
//! use txpulse::{AlertType, Severity};
//! use rust_decimal::Decimal;
//!
//! let previous = PeriodStatsBuilder::new()
//!     .transactions(100)
//!     .gtv(Decimal::from(10_000))
//!     .build();
//! let current = PeriodStatsBuilder::new()
//!     .transactions(100)
//!     .gtv(Decimal::from(7_500))
//!     .build();
//!
//! let comparison = KpiCalculator::new().compare(&current, &previous);
//! let alerts = ThresholdEvaluator::new().evaluate(&comparison, &ThresholdConfig::default());
//!
//! let drop = alerts
//!     .iter()
//!     .find(|a| a.alert_type == AlertType::RevenueDrop)
//!     .unwrap();
//! assert_eq!(drop.severity, Severity::Warning);
//! ```
//!
//! ## Running cycles
//!
//! The [`AlertEngine`] wires a [`MetricsStore`], an [`AlertHistoryLookup`] and an
//! [`AlertSink`] together and runs one fetch-evaluate-dedup-persist cycle per
//! call. Scheduling is left to the caller.
//!
//! ```rust
//! use std::sync::Arc;
//! use txpulse::{AlertEngine, InMemoryAlertStore, InMemoryMetricsStore, PulseConfig};
//!
//! let alerts = Arc::new(InMemoryAlertStore::new());
//! let engine = AlertEngine::new(
//!     PulseConfig::default(),
//!     Arc::new(InMemoryMetricsStore::new()),
//!     alerts.clone(),
//!     alerts.clone(),
//! )
//! .unwrap();
//!
//! let report = engine.run_cycle_now().unwrap();
//! assert!(report.persisted.is_empty());
//! ```
//!
//! ## Modules
//!
//! - [`kpi`]: Snapshots, comparisons and change arithmetic
//! - [`threshold`]: Alert rules
//! - [`dedup`]: Duplicate suppression
//! - [`engine`]: The alert cycle
//! - [`cache`]: TTL + LRU result cache
//! - [`query`]: Cached dashboard reads
//! - [`store`]: Collaborator traits and in-memory implementations

pub mod alert;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod kpi;
pub mod period;
pub mod query;
pub mod store;
pub mod threshold;

// Re-exports for convenient access
pub use alert::{Alert, AlertType, CandidateAlert, Severity};
pub use cache::{CacheKey, CacheStats, ResultCache, TtlPolicy};
pub use config::{
    CacheConfig, CountBand, EngineConfig, PercentBand, PulseConfig, RateBand, RetentionConfig,
    ScheduleConfig, ThresholdConfig, VolumeRule, MAX_WINDOW_DAYS, MAX_WINDOW_HOURS,
};
pub use dedup::NotificationDeduper;
pub use engine::{AlertEngine, CycleReport, CycleState, EngineStats};
pub use error::{PulseError, Result};
pub use kpi::{percent_change, point_change, KpiCalculator, KpiComparison, KpiSnapshot, Metric};
pub use period::{Period, PeriodStats, PeriodStatsBuilder};
pub use query::{DailyKpi, KpiQueryService};
pub use store::{
    AlertHistoryLookup, AlertSink, InMemoryAlertStore, InMemoryMetricsStore, MetricsStore,
    TransactionKind, TransactionRecord, TransactionStatus, UserRecord,
};
pub use threshold::{ThresholdEvaluator, VolumeBaseline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_quiet_windows_raise_nothing() {
        let comparison = KpiCalculator::new().compare(&PeriodStats::empty(), &PeriodStats::empty());
        let alerts = ThresholdEvaluator::new().evaluate(&comparison, &ThresholdConfig::default());
        assert!(alerts.is_empty());
    }
}

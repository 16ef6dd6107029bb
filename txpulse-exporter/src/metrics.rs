// TxPulse Exporter - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for TxPulse monitoring.
//!
//! Gauges mirror the KPI comparison of the latest completed cycle; counters
//! accumulate alerts and cycle outcomes across the process lifetime.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Encoder, Gauge, GaugeVec, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use txpulse::{Alert, CacheStats, CycleReport, KpiSnapshot, Metric};

lazy_static! {
    // ============================================================
    // KPI Metrics (from the latest cycle's comparison)
    // ============================================================

    /// KPI values labeled by metric and window (`current` or `previous`).
    pub static ref KPI_VALUE: GaugeVec = register_gauge_vec!(
        "txpulse_kpi_value",
        "KPI value for the evaluated window",
        &["metric", "window"]
    ).unwrap();

    /// Period-over-period change; percent, or percentage points for successRate.
    pub static ref KPI_CHANGE: GaugeVec = register_gauge_vec!(
        "txpulse_kpi_change",
        "Change of each KPI against the previous window",
        &["metric"]
    ).unwrap();

    // ============================================================
    // Alert Counters
    // ============================================================

    /// Alerts persisted (labeled by alert type and severity).
    pub static ref ALERTS_TOTAL: CounterVec = register_counter_vec!(
        "txpulse_alerts_total",
        "Total alerts persisted",
        &["alert_type", "severity"]
    ).unwrap();

    /// Candidates dropped as duplicates.
    pub static ref ALERTS_SUPPRESSED_TOTAL: Counter = register_counter!(
        "txpulse_alerts_suppressed_total",
        "Alert candidates suppressed within the duplicate window"
    ).unwrap();

    /// Alerts removed by retention cleanup.
    pub static ref ALERTS_CLEANED_TOTAL: Counter = register_counter!(
        "txpulse_alerts_cleaned_total",
        "Alerts deleted by retention cleanup"
    ).unwrap();

    // ============================================================
    // Scheduler Metrics
    // ============================================================

    /// Cycle outcomes (`completed` or `aborted`).
    pub static ref CYCLES_TOTAL: CounterVec = register_counter_vec!(
        "txpulse_cycles_total",
        "Alert cycles run, by outcome",
        &["outcome"]
    ).unwrap();

    /// Unix time of the last completed cycle.
    pub static ref LAST_CYCLE_TIMESTAMP: Gauge = register_gauge!(
        "txpulse_last_cycle_timestamp_seconds",
        "Unix time of the last completed alert cycle"
    ).unwrap();

    // ============================================================
    // Exporter Metrics
    // ============================================================

    /// Rows loaded from the ledger files.
    pub static ref LEDGER_ROWS: GaugeVec = register_gauge_vec!(
        "txpulse_exporter_ledger_rows",
        "Rows loaded from the ledger files",
        &["table"]
    ).unwrap();

    /// Read-path cache hit rate (0-1).
    pub static ref CACHE_HIT_RATE: Gauge = register_gauge!(
        "txpulse_exporter_cache_hit_rate",
        "Hit rate of the KPI query cache (0-1)"
    ).unwrap();

    /// Entries currently cached.
    pub static ref CACHE_ENTRIES: Gauge = register_gauge!(
        "txpulse_exporter_cache_entries",
        "Entries held by the KPI query cache"
    ).unwrap();
}

/// Cycle outcome label values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Aborted,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::Aborted => "aborted",
        }
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Set KPI gauges for one window.
pub fn update_kpi_values(snapshot: &KpiSnapshot, window: &str) {
    for metric in Metric::ALL {
        KPI_VALUE
            .with_label_values(&[metric.as_str(), window])
            .set(to_f64(snapshot.value(metric)));
    }
}

/// Record everything a completed cycle produced.
pub fn record_cycle(report: &CycleReport) {
    update_kpi_values(&report.comparison.current, "current");
    update_kpi_values(&report.comparison.previous, "previous");
    for (metric, change) in &report.comparison.changes {
        KPI_CHANGE
            .with_label_values(&[metric.as_str()])
            .set(to_f64(*change));
    }
    for alert in &report.persisted {
        record_alert(alert);
    }
    ALERTS_SUPPRESSED_TOTAL.inc_by(report.suppressed as f64);
    CYCLES_TOTAL
        .with_label_values(&[CycleOutcome::Completed.as_str()])
        .inc();
    LAST_CYCLE_TIMESTAMP.set(report.evaluated_at.timestamp() as f64);
}

/// Count an aborted cycle.
pub fn record_cycle_aborted() {
    CYCLES_TOTAL
        .with_label_values(&[CycleOutcome::Aborted.as_str()])
        .inc();
}

/// Increment the alert counter.
pub fn record_alert(alert: &Alert) {
    ALERTS_TOTAL
        .with_label_values(&[alert.alert_type.as_str(), alert.severity.as_str()])
        .inc();
}

/// Count alerts removed by cleanup.
pub fn record_cleanup(removed: u64) {
    ALERTS_CLEANED_TOTAL.inc_by(removed as f64);
}

/// Update ledger size gauges.
pub fn update_ledger_rows(transactions: usize, users: usize) {
    LEDGER_ROWS
        .with_label_values(&["transactions"])
        .set(transactions as f64);
    LEDGER_ROWS.with_label_values(&["users"]).set(users as f64);
}

/// Update cache gauges.
pub fn update_cache_metrics(stats: &CacheStats) {
    CACHE_HIT_RATE.set(stats.hit_rate);
    CACHE_ENTRIES.set(stats.size as f64);
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use txpulse::{
        AlertType, KpiCalculator, Period, PeriodStatsBuilder, Severity, ThresholdConfig,
        ThresholdEvaluator,
    };

    fn report() -> CycleReport {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let current = Period::ending_at(now, Duration::days(1));
        let previous = current.preceding();
        let comparison = KpiCalculator::new().compare(
            &PeriodStatsBuilder::new()
                .transactions(10)
                .success_rate(Decimal::from(99))
                .gtv(Decimal::from(750))
                .build(),
            &PeriodStatsBuilder::new()
                .transactions(10)
                .gtv(Decimal::from(1000))
                .build(),
        );
        let candidates =
            ThresholdEvaluator::new().evaluate(&comparison, &ThresholdConfig::default());
        let persisted = candidates
            .iter()
            .cloned()
            .map(|c| c.into_alert("p", now))
            .collect();
        CycleReport {
            evaluated_at: now,
            current,
            previous,
            comparison,
            candidates,
            suppressed: 0,
            persisted,
        }
    }

    #[test]
    fn test_report_carries_revenue_drop() {
        let report = report();
        assert_eq!(report.persisted.len(), 1);
        let alert = &report.persisted[0];
        assert_eq!(alert.alert_type, AlertType::RevenueDrop);
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.metric_value, Decimal::from(-25));
        assert_eq!(alert.threshold_value, Decimal::from(20));
    }

    #[test]
    fn test_cycle_outcome_as_str() {
        assert_eq!(CycleOutcome::Completed.as_str(), "completed");
        assert_eq!(CycleOutcome::Aborted.as_str(), "aborted");
    }

    #[test]
    fn test_record_cycle_sets_gauges() {
        record_cycle(&report());

        let change = KPI_CHANGE.with_label_values(&["totalGTV"]).get();
        assert!((change + 25.0).abs() < 1e-9);
        let gtv = KPI_VALUE.with_label_values(&["totalGTV", "current"]).get();
        assert!((gtv - 750.0).abs() < 1e-9);
        assert!(
            ALERTS_TOTAL
                .with_label_values(&["REVENUE_DROP", "WARNING"])
                .get()
                >= 1.0
        );
    }

    #[test]
    fn test_encode_metrics() {
        record_cycle_aborted();
        update_ledger_rows(3, 2);

        let output = encode_metrics().unwrap();
        assert!(output.contains("txpulse_cycles_total"));
        assert!(output.contains("txpulse_exporter_ledger_rows"));
    }
}

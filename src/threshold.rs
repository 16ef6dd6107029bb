// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Threshold evaluation over a KPI comparison.
//!
//! Each condition is judged independently and yields at most one candidate
//! per pass; when both bands are crossed only CRITICAL is reported.

use crate::alert::{AlertType, CandidateAlert, Severity};
use crate::config::{CountBand, PercentBand, RateBand, ThresholdConfig, VolumeRule};
use crate::kpi::{round_report, KpiComparison, Metric};
use rust_decimal::Decimal;

/// Mean daily transaction volume over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeBaseline {
    pub mean_daily_transactions: Decimal,
    pub days: i64,
}

impl VolumeBaseline {
    /// Mean of `total_transactions` spread over `days`. `None` for an empty window.
    pub fn from_total(total_transactions: u64, days: i64) -> Option<Self> {
        if days <= 0 {
            return None;
        }
        let mean = Decimal::from(total_transactions).checked_div(Decimal::from(days))?;
        Some(Self {
            mean_daily_transactions: mean,
            days,
        })
    }
}

/// Classifies KPI movements against configured severity bands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdEvaluator;

impl ThresholdEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every period-over-period condition. High-volume detection is
    /// skipped because it needs a trailing baseline.
    pub fn evaluate(&self, comparison: &KpiComparison, config: &ThresholdConfig) -> Vec<CandidateAlert> {
        self.evaluate_with_baseline(comparison, None, config)
    }

    /// Evaluate every condition, including high-volume detection when a
    /// trailing baseline is available.
    pub fn evaluate_with_baseline(
        &self,
        comparison: &KpiComparison,
        baseline: Option<VolumeBaseline>,
        config: &ThresholdConfig,
    ) -> Vec<CandidateAlert> {
        if !config.enabled {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        candidates.extend(check_revenue_drop(comparison, &config.revenue_drop));
        candidates.extend(check_failed_spike(comparison, &config.failed_spike));
        candidates.extend(check_low_success_rate(comparison, &config.low_success_rate));
        candidates.extend(check_high_pending(comparison, &config.high_pending));
        if let Some(baseline) = baseline {
            candidates.extend(check_high_volume(comparison, baseline, &config.high_volume));
        }
        candidates
    }
}

fn check_revenue_drop(comparison: &KpiComparison, band: &PercentBand) -> Option<CandidateAlert> {
    // No previous revenue means there is nothing to drop from.
    if comparison.previous.total_gtv.is_zero() {
        return None;
    }
    let change = comparison.change(Metric::TotalGtv);
    let (severity, bound) = if change <= -band.critical_pct {
        (Severity::Critical, band.critical_pct)
    } else if change <= -band.warning_pct {
        (Severity::Warning, band.warning_pct)
    } else {
        return None;
    };
    Some(CandidateAlert::new(
        AlertType::RevenueDrop,
        severity,
        change,
        bound,
        format!(
            "GTV changed {}% ({} -> {}), threshold -{}%",
            change, comparison.previous.total_gtv, comparison.current.total_gtv, bound
        ),
    ))
}

fn check_failed_spike(comparison: &KpiComparison, band: &PercentBand) -> Option<CandidateAlert> {
    let change = comparison.change(Metric::FailedTransactionCount);
    let (severity, bound) = if change >= band.critical_pct {
        (Severity::Critical, band.critical_pct)
    } else if change >= band.warning_pct {
        (Severity::Warning, band.warning_pct)
    } else {
        return None;
    };
    Some(CandidateAlert::new(
        AlertType::FailedSpike,
        severity,
        change,
        bound,
        format!(
            "Failed transactions changed +{}% ({} -> {}), threshold +{}%",
            change,
            comparison.previous.failed_transaction_count,
            comparison.current.failed_transaction_count,
            bound
        ),
    ))
}

fn check_low_success_rate(comparison: &KpiComparison, band: &RateBand) -> Option<CandidateAlert> {
    // An idle window has no success rate to judge.
    if comparison.current.total_transactions == 0 {
        return None;
    }
    let rate = comparison.current.success_rate;
    let (severity, bound) = if rate < band.critical_rate {
        (Severity::Critical, band.critical_rate)
    } else if rate < band.warning_rate {
        (Severity::Warning, band.warning_rate)
    } else {
        return None;
    };
    Some(CandidateAlert::new(
        AlertType::LowSuccessRate,
        severity,
        rate,
        bound,
        format!("Success rate {}% below {}%", rate, bound),
    ))
}

fn check_high_pending(comparison: &KpiComparison, band: &CountBand) -> Option<CandidateAlert> {
    let pending = comparison.current.pending_transactions;
    let (severity, bound) = if pending >= band.critical_count {
        (Severity::Critical, band.critical_count)
    } else if pending >= band.warning_count {
        (Severity::Warning, band.warning_count)
    } else {
        return None;
    };
    Some(CandidateAlert::new(
        AlertType::HighPending,
        severity,
        Decimal::from(pending),
        Decimal::from(bound),
        format!("{} pending transactions, threshold {}", pending, bound),
    ))
}

fn check_high_volume(
    comparison: &KpiComparison,
    baseline: VolumeBaseline,
    rule: &VolumeRule,
) -> Option<CandidateAlert> {
    if !rule.enabled || baseline.mean_daily_transactions.is_zero() {
        return None;
    }
    let limit = baseline.mean_daily_transactions.checked_mul(rule.multiplier)?;
    let volume = Decimal::from(comparison.current.total_transactions);
    if volume <= limit {
        return None;
    }
    let limit = round_report(limit);
    Some(CandidateAlert::new(
        AlertType::HighVolumeDay,
        Severity::Info,
        volume,
        limit,
        format!(
            "{} transactions, above {}x the {}-day mean ({})",
            volume,
            rule.multiplier,
            baseline.days,
            round_report(baseline.mean_daily_transactions)
        ),
    ))
}

// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! KPI snapshots and period-over-period comparison.
//!
//! All arithmetic runs on exact decimals. Rounding to two places (half away
//! from zero) is applied once, on the final value of each formula.
//!
//! | Metric | Change formula |
//! |--------|----------------|
//! | every count and amount | `(current - previous) / previous * 100` |
//! | `successRate` | `current - previous` (percentage points) |
//!
//! A zero denominator never fails: `0 -> 0` reports 0% and `0 -> x > 0`
//! reports 100%.

use crate::period::PeriodStats;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of decimal places kept on reported values.
pub const REPORT_SCALE: u32 = 2;

/// Metrics carried by a snapshot and compared across periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    TotalUsers,
    TotalTransactions,
    NewUsers,
    PendingTransactions,
    #[serde(rename = "totalGTV")]
    TotalGtv,
    SuccessRate,
    AverageTicketSize,
    FailedTransactionCount,
    FailedVolume,
}

impl Metric {
    /// Every metric, in reporting order.
    pub const ALL: [Metric; 9] = [
        Metric::TotalUsers,
        Metric::TotalTransactions,
        Metric::NewUsers,
        Metric::PendingTransactions,
        Metric::TotalGtv,
        Metric::SuccessRate,
        Metric::AverageTicketSize,
        Metric::FailedTransactionCount,
        Metric::FailedVolume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::TotalUsers => "totalUsers",
            Metric::TotalTransactions => "totalTransactions",
            Metric::NewUsers => "newUsers",
            Metric::PendingTransactions => "pendingTransactions",
            Metric::TotalGtv => "totalGTV",
            Metric::SuccessRate => "successRate",
            Metric::AverageTicketSize => "averageTicketSize",
            Metric::FailedTransactionCount => "failedTransactionCount",
            Metric::FailedVolume => "failedVolume",
        }
    }

    /// Whether the change is reported as an absolute percentage-point delta.
    pub fn is_absolute_change(&self) -> bool {
        matches!(self, Metric::SuccessRate)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Null-safe KPI values for one window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    pub total_users: u64,
    pub total_transactions: u64,
    pub new_users: u64,
    pub pending_transactions: u64,
    pub failed_transaction_count: u64,
    #[serde(rename = "totalGTV")]
    pub total_gtv: Decimal,
    pub success_rate: Decimal,
    pub average_ticket_size: Decimal,
    pub failed_volume: Decimal,
}

impl KpiSnapshot {
    /// Value of one metric as a decimal.
    pub fn value(&self, metric: Metric) -> Decimal {
        match metric {
            Metric::TotalUsers => Decimal::from(self.total_users),
            Metric::TotalTransactions => Decimal::from(self.total_transactions),
            Metric::NewUsers => Decimal::from(self.new_users),
            Metric::PendingTransactions => Decimal::from(self.pending_transactions),
            Metric::TotalGtv => self.total_gtv,
            Metric::SuccessRate => self.success_rate,
            Metric::AverageTicketSize => self.average_ticket_size,
            Metric::FailedTransactionCount => Decimal::from(self.failed_transaction_count),
            Metric::FailedVolume => self.failed_volume,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Current and previous snapshots with per-metric change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiComparison {
    pub current: KpiSnapshot,
    pub previous: KpiSnapshot,
    pub changes: BTreeMap<Metric, Decimal>,
}

impl KpiComparison {
    /// Change reported for `metric`. Missing entries read as zero.
    pub fn change(&self, metric: Metric) -> Decimal {
        self.changes.get(&metric).copied().unwrap_or(Decimal::ZERO)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Round to the reporting scale, half away from zero.
pub fn round_report(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(REPORT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Relative change from `previous` to `current`, in percent.
///
/// Zero denominators follow the reporting convention instead of failing.
pub fn percent_change(previous: Decimal, current: Decimal) -> Decimal {
    if previous.is_zero() {
        return if current > Decimal::ZERO {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
    }
    let delta = current - previous;
    match delta
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(previous))
    {
        Some(change) => round_report(change),
        None => Decimal::ZERO,
    }
}

/// Absolute difference in percentage points.
pub fn point_change(previous: Decimal, current: Decimal) -> Decimal {
    round_report(current - previous)
}

/// Turns raw period stats into snapshots and comparisons.
#[derive(Debug, Clone, Copy, Default)]
pub struct KpiCalculator;

impl KpiCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Build a snapshot, coercing every absent value to zero.
    pub fn compute_snapshot(&self, stats: &PeriodStats) -> KpiSnapshot {
        KpiSnapshot {
            total_users: stats.total_users,
            total_transactions: stats.total_transactions,
            new_users: stats.new_users,
            pending_transactions: stats.pending_count,
            failed_transaction_count: stats.failed_count,
            total_gtv: round_report(stats.total_gtv),
            success_rate: round_report(stats.success_rate.unwrap_or(Decimal::ZERO)),
            average_ticket_size: round_report(stats.avg_ticket_size.unwrap_or(Decimal::ZERO)),
            failed_volume: round_report(stats.failed_volume),
        }
    }

    /// Compare two windows.
    ///
    /// Changes are computed from the unrounded inputs so rounding happens
    /// once per reported figure.
    pub fn compare(&self, current: &PeriodStats, previous: &PeriodStats) -> KpiComparison {
        let changes = Metric::ALL
            .iter()
            .map(|&metric| {
                let prev = raw_value(previous, metric);
                let curr = raw_value(current, metric);
                let change = if metric.is_absolute_change() {
                    point_change(prev, curr)
                } else {
                    percent_change(prev, curr)
                };
                (metric, change)
            })
            .collect();

        KpiComparison {
            current: self.compute_snapshot(current),
            previous: self.compute_snapshot(previous),
            changes,
        }
    }
}

fn raw_value(stats: &PeriodStats, metric: Metric) -> Decimal {
    match metric {
        Metric::TotalUsers => Decimal::from(stats.total_users),
        Metric::TotalTransactions => Decimal::from(stats.total_transactions),
        Metric::NewUsers => Decimal::from(stats.new_users),
        Metric::PendingTransactions => Decimal::from(stats.pending_count),
        Metric::TotalGtv => stats.total_gtv,
        Metric::SuccessRate => stats.success_rate.unwrap_or(Decimal::ZERO),
        Metric::AverageTicketSize => stats.avg_ticket_size.unwrap_or(Decimal::ZERO),
        Metric::FailedTransactionCount => Decimal::from(stats.failed_count),
        Metric::FailedVolume => stats.failed_volume,
    }
}

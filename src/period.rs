// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Time windows and the raw aggregates a metrics store returns for them.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    /// Create a window. `end` earlier than `start` collapses to an empty window at `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Window of `length` ending at `end`.
    ///
    /// Panics if the start falls outside the representable range; use
    /// [`Period::checked_ending_at`] for untrusted lengths.
    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Self {
        Self::new(end - length, end)
    }

    /// Window of `length` ending at `end`, or `None` if its start is out of range.
    pub fn checked_ending_at(end: DateTime<Utc>, length: Duration) -> Option<Self> {
        end.checked_sub_signed(length).map(|start| Self::new(start, end))
    }

    /// Window length.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether the window covers no time at all.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `ts` falls inside the window.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// The adjacent window of equal length immediately before this one.
    pub fn preceding(&self) -> Self {
        Self::new(self.start - self.duration(), self.start)
    }

    /// Like [`Period::preceding`], or `None` if the earlier window is out of range.
    pub fn checked_preceding(&self) -> Option<Self> {
        Self::checked_ending_at(self.start, self.duration())
    }

    /// Split into consecutive one-day buckets. The last bucket is truncated at `end`.
    pub fn daily_buckets(&self) -> Vec<Period> {
        let mut buckets = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = (cursor + Duration::days(1)).min(self.end);
            buckets.push(Period::new(cursor, next));
            cursor = next;
        }
        buckets
    }

    /// Stable textual key, used for cache keys and alert records.
    pub fn key(&self) -> String {
        format!("{}/{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Aggregate figures for one window, as returned by a metrics store.
///
/// Optional fields are absent when the window holds no transactions.
/// Values are never mutated after construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodStats {
    pub total_transactions: u64,
    pub pending_count: u64,
    pub failed_count: u64,
    /// Gross value of successful payment transactions only.
    pub total_gtv: Decimal,
    pub avg_ticket_size: Option<Decimal>,
    pub failed_volume: Decimal,
    /// Percentage in `[0, 100]`.
    pub success_rate: Option<Decimal>,
    pub total_users: u64,
    pub new_users: u64,
}

impl PeriodStats {
    /// Stats for a window with no activity.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the window saw any transaction.
    pub fn has_transactions(&self) -> bool {
        self.total_transactions > 0
    }
}

/// Builder for `PeriodStats`, mostly useful for stores and tests.
#[derive(Debug, Clone, Default)]
pub struct PeriodStatsBuilder {
    stats: PeriodStats,
}

impl PeriodStatsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(mut self, total: u64) -> Self {
        self.stats.total_transactions = total;
        self
    }

    pub fn pending(mut self, count: u64) -> Self {
        self.stats.pending_count = count;
        self
    }

    pub fn failed(mut self, count: u64, volume: Decimal) -> Self {
        self.stats.failed_count = count;
        self.stats.failed_volume = volume;
        self
    }

    pub fn gtv(mut self, gtv: Decimal) -> Self {
        self.stats.total_gtv = gtv;
        self
    }

    pub fn avg_ticket_size(mut self, value: Decimal) -> Self {
        self.stats.avg_ticket_size = Some(value);
        self
    }

    pub fn success_rate(mut self, rate: Decimal) -> Self {
        self.stats.success_rate = Some(rate);
        self
    }

    pub fn users(mut self, total: u64, new: u64) -> Self {
        self.stats.total_users = total;
        self.stats.new_users = new;
        self
    }

    pub fn build(self) -> PeriodStats {
        self.stats
    }
}

// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Interactive KPI reads backed by the result cache.
//!
//! Dashboard queries run concurrently with the alert cycle and only touch the
//! metrics store and the cache.

use crate::cache::{CacheKey, CacheStats, ResultCache, TtlPolicy};
use crate::config::CacheConfig;
use crate::error::{PulseError, Result};
use crate::kpi::{KpiCalculator, KpiComparison, KpiSnapshot};
use crate::period::Period;
use crate::store::MetricsStore;
use serde::Serialize;
use std::sync::Arc;

/// One bucket of a daily chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyKpi {
    pub period: Period,
    pub snapshot: KpiSnapshot,
}

/// Cached read path for snapshots, comparisons and chart series.
pub struct KpiQueryService {
    store: Arc<dyn MetricsStore>,
    calculator: KpiCalculator,
    config: CacheConfig,
    snapshots: ResultCache<KpiSnapshot>,
    comparisons: ResultCache<KpiComparison>,
    series: ResultCache<Vec<DailyKpi>>,
}

impl KpiQueryService {
    pub fn new(store: Arc<dyn MetricsStore>, config: CacheConfig) -> Self {
        Self {
            store,
            calculator: KpiCalculator::new(),
            snapshots: ResultCache::new(config.capacity),
            comparisons: ResultCache::new(config.capacity),
            series: ResultCache::new(config.capacity),
            config,
        }
    }

    /// KPI snapshot for `period`.
    pub fn snapshot(&self, period: &Period) -> Result<KpiSnapshot> {
        let key = CacheKey::new("snapshot").with_period(period);
        self.snapshots
            .get_or_compute(&key, TtlPolicy::Live.ttl(&self.config), || {
                let stats = self.store.period_stats(period)?;
                Ok(self.calculator.compute_snapshot(&stats))
            })
    }

    /// Comparison of two arbitrary windows.
    pub fn compare(&self, current: &Period, previous: &Period) -> Result<KpiComparison> {
        let key = CacheKey::new("comparison")
            .with_period(current)
            .with_period(previous);
        self.comparisons
            .get_or_compute(&key, TtlPolicy::Live.ttl(&self.config), || {
                let current_stats = self.store.period_stats(current)?;
                let previous_stats = self.store.period_stats(previous)?;
                Ok(self.calculator.compare(&current_stats, &previous_stats))
            })
    }

    /// Comparison of `period` against the equal-length window before it.
    pub fn compare_previous(&self, period: &Period) -> Result<KpiComparison> {
        let previous = period.checked_preceding().ok_or_else(|| {
            PulseError::invalid_config(format!("no window precedes {}", period))
        })?;
        self.compare(period, &previous)
    }

    /// One snapshot per day across `period`, oldest first.
    pub fn daily_series(&self, period: &Period) -> Result<Vec<DailyKpi>> {
        let key = CacheKey::new("series").with_period(period);
        self.series
            .get_or_compute(&key, TtlPolicy::Historical.ttl(&self.config), || {
                period
                    .daily_buckets()
                    .into_iter()
                    .map(|bucket| -> Result<DailyKpi> {
                        let stats = self.store.period_stats(&bucket)?;
                        Ok(DailyKpi {
                            period: bucket,
                            snapshot: self.calculator.compute_snapshot(&stats),
                        })
                    })
                    .collect()
            })
    }

    /// Drop all cached results.
    pub fn invalidate_all(&self) {
        self.snapshots.clear();
        self.comparisons.clear();
        self.series.clear();
    }

    /// Combined statistics over every cache.
    pub fn cache_stats(&self) -> CacheStats {
        let parts = [
            self.snapshots.stats(),
            self.comparisons.stats(),
            self.series.stats(),
        ];
        let mut total = CacheStats::default();
        for part in parts {
            total.hits += part.hits;
            total.misses += part.misses;
            total.evictions += part.evictions;
            total.expirations += part.expirations;
            total.size += part.size;
        }
        let lookups = total.hits + total.misses;
        if lookups > 0 {
            total.hit_rate = total.hits as f64 / lookups as f64;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodStats;
    use crate::store::{InMemoryMetricsStore, TransactionKind, TransactionRecord, TransactionStatus};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn payment(id: &str, amount: i64, at: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            user_id: "u1".to_string(),
            kind: TransactionKind::Payment,
            status: TransactionStatus::Success,
            amount: Decimal::from(amount),
            created_at: at,
        }
    }

    /// Counts how often the store is hit.
    struct CountingStore {
        calls: AtomicUsize,
        fail: bool,
    }

    impl MetricsStore for CountingStore {
        fn period_stats(&self, _period: &Period) -> Result<PeriodStats> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PulseError::unavailable("metrics_store", "offline"));
            }
            Ok(PeriodStats::empty())
        }
    }

    #[test]
    fn test_snapshot_is_cached() {
        let store = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let service = KpiQueryService::new(store.clone(), CacheConfig::default());
        let period = Period::ending_at(t0(), Duration::days(1));

        service.snapshot(&period).unwrap();
        service.snapshot(&period).unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.cache_stats().hits, 1);
    }

    #[test]
    fn test_failed_reads_are_retried() {
        let store = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let service = KpiQueryService::new(store.clone(), CacheConfig::default());
        let period = Period::ending_at(t0(), Duration::days(1));

        assert!(service.compare_previous(&period).is_err());
        assert!(service.compare_previous(&period).is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_compare_previous_uses_adjacent_window() {
        let store = InMemoryMetricsStore::new();
        store.add_transaction(payment("t1", 100, t0() - Duration::hours(30))).unwrap();
        store.add_transaction(payment("t2", 150, t0() - Duration::hours(3))).unwrap();

        let service = KpiQueryService::new(Arc::new(store), CacheConfig::default());
        let comparison = service
            .compare_previous(&Period::ending_at(t0(), Duration::days(1)))
            .unwrap();

        assert_eq!(comparison.current.total_gtv, Decimal::from(150));
        assert_eq!(comparison.previous.total_gtv, Decimal::from(100));
        assert_eq!(comparison.change(crate::kpi::Metric::TotalGtv), Decimal::from(50));
    }

    #[test]
    fn test_daily_series_buckets() {
        let store = InMemoryMetricsStore::new();
        store.add_transaction(payment("t1", 10, t0() - Duration::hours(50))).unwrap();
        store.add_transaction(payment("t2", 20, t0() - Duration::hours(1))).unwrap();

        let service = KpiQueryService::new(Arc::new(store), CacheConfig::default());
        let series = service
            .daily_series(&Period::ending_at(t0(), Duration::days(3)))
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].snapshot.total_gtv, Decimal::from(10));
        assert_eq!(series[1].snapshot.total_transactions, 0);
        assert_eq!(series[2].snapshot.total_gtv, Decimal::from(20));
    }

    #[test]
    fn test_invalidate_all_forces_recompute() {
        let store = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let service = KpiQueryService::new(store.clone(), CacheConfig::default());
        let period = Period::ending_at(t0(), Duration::days(1));

        service.snapshot(&period).unwrap();
        service.invalidate_all();
        service.snapshot(&period).unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_compare_previous_out_of_range() {
        let store = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let service = KpiQueryService::new(store.clone(), CacheConfig::default());
        let period = Period::new(DateTime::<Utc>::MIN_UTC, t0());

        let result = service.compare_previous(&period);
        assert!(matches!(result, Err(PulseError::InvalidConfiguration(_))));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }
}

//! Benchmarks for KPI aggregation, comparison and threshold evaluation

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use txpulse::{
    CacheKey, InMemoryMetricsStore, KpiCalculator, MetricsStore, Period, PeriodStats,
    PeriodStatsBuilder, ResultCache, ThresholdConfig, ThresholdEvaluator, TransactionKind,
    TransactionRecord, TransactionStatus,
};

fn random_stats(rng: &mut StdRng) -> PeriodStats {
    let total: u64 = rng.gen_range(0..10_000);
    let failed = rng.gen_range(0..=total);
    let pending = rng.gen_range(0..=total - failed);
    PeriodStatsBuilder::new()
        .transactions(total)
        .pending(pending)
        .failed(failed, Decimal::new(rng.gen_range(0..1_000_000), 2))
        .gtv(Decimal::new(rng.gen_range(0..100_000_000), 2))
        .success_rate(Decimal::new(rng.gen_range(0..10_000), 2))
        .users(rng.gen_range(0..50_000), rng.gen_range(0..500))
        .build()
}

fn generate_ledger(count: usize) -> InMemoryMetricsStore {
    let mut rng = StdRng::seed_from_u64(42);
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let records = (0..count)
        .map(|i| {
            let status = match rng.gen_range(0..10) {
                0 => TransactionStatus::Failed,
                1 => TransactionStatus::Pending,
                _ => TransactionStatus::Success,
            };
            TransactionRecord {
                id: format!("t{}", i),
                user_id: format!("u{}", rng.gen_range(0..1_000)),
                kind: TransactionKind::Payment,
                status,
                amount: Decimal::new(rng.gen_range(100..100_000), 2),
                created_at: start + Duration::minutes(rng.gen_range(0..60 * 24 * 60)),
            }
        })
        .collect();
    InMemoryMetricsStore::with_records(records, Vec::new())
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi");

    let mut rng = StdRng::seed_from_u64(7);
    let pairs: Vec<_> = (0..1000)
        .map(|_| (random_stats(&mut rng), random_stats(&mut rng)))
        .collect();
    let calculator = KpiCalculator::new();
    let evaluator = ThresholdEvaluator::new();
    let config = ThresholdConfig::default();

    group.throughput(Throughput::Elements(1000));

    group.bench_function("compare_1000_pairs", |b| {
        b.iter(|| {
            for (current, previous) in &pairs {
                black_box(calculator.compare(current, previous));
            }
        })
    });

    group.bench_function("compare_and_evaluate_1000_pairs", |b| {
        b.iter(|| {
            for (current, previous) in &pairs {
                let comparison = calculator.compare(current, previous);
                black_box(evaluator.evaluate(&comparison, &config));
            }
        })
    });

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    let store = generate_ledger(100_000);
    let end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
    let period = Period::ending_at(end, Duration::days(1));

    group.throughput(Throughput::Elements(100_000));

    group.bench_function("period_stats_100k_rows", |b| {
        b.iter(|| black_box(store.period_stats(&period).unwrap()))
    });

    group.finish();
}

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");

    let cache: ResultCache<u64> = ResultCache::new(256);
    let keys: Vec<_> = (0..256)
        .map(|i| CacheKey::new("bench").with_filter("i", i))
        .collect();
    let ttl = std::time::Duration::from_secs(60);

    group.bench_function("hit_256_keys", |b| {
        b.iter(|| {
            for (i, key) in keys.iter().enumerate() {
                black_box(cache.get_or_compute(key, ttl, || Ok(i as u64)).unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_compare, bench_store, bench_cache);
criterion_main!(benches);

// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! AlertEngine - one evaluation cycle per scheduler tick.
//!
//! A cycle walks `Idle -> Fetching -> Evaluating -> Deduping -> Persisting -> Idle`.
//! A failure before `Persisting` aborts the cycle with nothing written, and the
//! surviving alerts are handed to the sink as one batch. Retention cleanup runs
//! under the same lock so it never interleaves with a cycle.

use crate::alert::{Alert, CandidateAlert};
use crate::config::PulseConfig;
use crate::dedup::NotificationDeduper;
use crate::error::{PulseError, Result};
use crate::kpi::{KpiCalculator, KpiComparison};
use crate::period::Period;
use crate::store::{AlertHistoryLookup, AlertSink, MetricsStore};
use crate::threshold::{ThresholdEvaluator, VolumeBaseline};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Stage of the alert cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleState {
    Idle,
    Fetching,
    Evaluating,
    Deduping,
    Persisting,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Idle => "IDLE",
            CycleState::Fetching => "FETCHING",
            CycleState::Evaluating => "EVALUATING",
            CycleState::Deduping => "DEDUPING",
            CycleState::Persisting => "PERSISTING",
        }
    }
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub evaluated_at: DateTime<Utc>,
    pub current: Period,
    pub previous: Period,
    pub comparison: KpiComparison,
    /// Everything the evaluator raised.
    pub candidates: Vec<CandidateAlert>,
    /// Candidates dropped as duplicates.
    pub suppressed: usize,
    /// Alerts handed to the sink.
    pub persisted: Vec<Alert>,
}

/// Counters across the engine's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub cycles_completed: u64,
    pub cycles_aborted: u64,
    pub alerts_persisted: u64,
    pub alerts_cleaned: u64,
}

/// Orchestrates fetching, evaluation, suppression and persistence.
pub struct AlertEngine {
    config: PulseConfig,
    store: Arc<dyn MetricsStore>,
    history: Arc<dyn AlertHistoryLookup>,
    sink: Arc<dyn AlertSink>,
    calculator: KpiCalculator,
    evaluator: ThresholdEvaluator,
    deduper: NotificationDeduper,

    /// Shared by `run_cycle` and `cleanup`.
    cycle_lock: Mutex<()>,
    state: Mutex<CycleState>,
    last_report: Mutex<Option<CycleReport>>,

    cycles_completed: AtomicU64,
    cycles_aborted: AtomicU64,
    alerts_persisted: AtomicU64,
    alerts_cleaned: AtomicU64,
}

impl AlertEngine {
    /// Create an engine. Refuses an invalid configuration.
    pub fn new(
        config: PulseConfig,
        store: Arc<dyn MetricsStore>,
        history: Arc<dyn AlertHistoryLookup>,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        config.validate()?;
        let deduper = NotificationDeduper::new(config.thresholds.duplicate_window());
        Ok(Self {
            config,
            store,
            history,
            sink,
            calculator: KpiCalculator::new(),
            evaluator: ThresholdEvaluator::new(),
            deduper,
            cycle_lock: Mutex::new(()),
            state: Mutex::new(CycleState::Idle),
            last_report: Mutex::new(None),
            cycles_completed: AtomicU64::new(0),
            cycles_aborted: AtomicU64::new(0),
            alerts_persisted: AtomicU64::new(0),
            alerts_cleaned: AtomicU64::new(0),
        })
    }

    /// Run one cycle for windows ending at `now`.
    pub fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let _cycle = lock_ignoring_poison(&self.cycle_lock);
        let _reset = IdleOnDrop(&self.state);

        match self.execute_cycle(now) {
            Ok(report) => {
                self.cycles_completed.fetch_add(1, Ordering::Relaxed);
                self.alerts_persisted
                    .fetch_add(report.persisted.len() as u64, Ordering::Relaxed);
                *lock_ignoring_poison(&self.last_report) = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                self.cycles_aborted.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "alert cycle at {} aborted during {}: {}",
                    now,
                    self.state().as_str(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Run one cycle for windows ending at the current wall-clock time.
    pub fn run_cycle_now(&self) -> Result<CycleReport> {
        self.run_cycle(Utc::now())
    }

    /// Delete alerts older than the retention window. Returns how many were removed.
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<u64> {
        let _cycle = lock_ignoring_poison(&self.cycle_lock);
        let cutoff = now
            .checked_sub_signed(self.config.retention.window())
            .ok_or_else(|| out_of_range("retention window", now))?;
        let removed = self.sink.delete_older_than(cutoff)?;
        self.alerts_cleaned.fetch_add(removed, Ordering::Relaxed);
        log::info!("retention cleanup removed {} alerts older than {}", removed, cutoff);
        Ok(removed)
    }

    /// Current cycle stage.
    pub fn state(&self) -> CycleState {
        *lock_ignoring_poison(&self.state)
    }

    /// Report of the last completed cycle.
    pub fn last_report(&self) -> Option<CycleReport> {
        lock_ignoring_poison(&self.last_report).clone()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_aborted: self.cycles_aborted.load(Ordering::Relaxed),
            alerts_persisted: self.alerts_persisted.load(Ordering::Relaxed),
            alerts_cleaned: self.alerts_cleaned.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    fn execute_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        self.enter(CycleState::Fetching);
        let current = Period::checked_ending_at(now, self.config.engine.window())
            .ok_or_else(|| out_of_range("current window", now))?;
        let previous = current
            .checked_preceding()
            .ok_or_else(|| out_of_range("previous window", now))?;
        let current_stats = self.store.period_stats(&current)?;
        let previous_stats = self.store.period_stats(&previous)?;
        let baseline = self.volume_baseline(&current)?;

        self.enter(CycleState::Evaluating);
        let comparison = self.calculator.compare(&current_stats, &previous_stats);
        let candidates = self.evaluator.evaluate_with_baseline(
            &comparison,
            baseline,
            &self.config.thresholds,
        );

        self.enter(CycleState::Deduping);
        let kept = self
            .deduper
            .filter(candidates.clone(), self.history.as_ref(), now)?;
        let suppressed = candidates.len() - kept.len();

        self.enter(CycleState::Persisting);
        let comparison_period = format!("{} vs {}", current, previous);
        let alerts: Vec<Alert> = kept
            .into_iter()
            .map(|c| c.into_alert(comparison_period.clone(), now))
            .collect();
        if !alerts.is_empty() {
            self.sink.persist_all(&alerts)?;
        }
        for alert in &alerts {
            log::info!(
                "{} {} raised: {}",
                alert.severity,
                alert.alert_type,
                alert.message
            );
        }

        Ok(CycleReport {
            evaluated_at: now,
            current,
            previous,
            comparison,
            candidates,
            suppressed,
            persisted: alerts,
        })
    }

    fn volume_baseline(&self, current: &Period) -> Result<Option<VolumeBaseline>> {
        let rule = &self.config.thresholds.high_volume;
        if !self.config.thresholds.enabled || !rule.enabled {
            return Ok(None);
        }
        let trailing = Period::checked_ending_at(current.start, rule.trailing_window())
            .ok_or_else(|| out_of_range("trailing volume window", current.start))?;
        let stats = self.store.period_stats(&trailing)?;
        Ok(VolumeBaseline::from_total(stats.total_transactions, rule.trailing_days))
    }

    fn enter(&self, state: CycleState) {
        *lock_ignoring_poison(&self.state) = state;
    }
}

/// Returns the state machine to `Idle` however the cycle exits.
struct IdleOnDrop<'a>(&'a Mutex<CycleState>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        *lock_ignoring_poison(self.0) = CycleState::Idle;
    }
}

fn out_of_range(window: &str, end: DateTime<Utc>) -> PulseError {
    PulseError::invalid_config(format!("{} ending at {} is out of range", window, end))
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// TxPulse Exporter - Alert scheduler
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Periodic timers driving the alert engine.
//!
//! Two independent tickers run on the tokio runtime: one for alert cycles and
//! one for retention cleanup. The engine itself is synchronous, so every call
//! goes through `spawn_blocking`. A failed cycle is logged and counted; the
//! next tick simply tries again.

use crate::metrics::{record_cleanup, record_cycle, record_cycle_aborted};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use txpulse::{AlertEngine, ScheduleConfig};

/// Handle to the running timers. Dropping it without `shutdown` leaves the
/// timers running until the sender goes away.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop both timers and wait for any in-flight run to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Scheduler task failed: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}

/// Start the cycle and cleanup timers. The first cycle runs immediately.
pub fn spawn(engine: Arc<AlertEngine>, schedule: &ScheduleConfig) -> SchedulerHandle {
    let (stop, stop_signal) = watch::channel(false);

    info!(
        "Scheduler started: cycle every {:?}, cleanup every {:?}",
        schedule.cycle_interval(),
        schedule.cleanup_interval()
    );

    let cycle_task = tokio::spawn(cycle_loop(
        Arc::clone(&engine),
        schedule.cycle_interval(),
        stop_signal.clone(),
    ));
    let cleanup_task = tokio::spawn(cleanup_loop(
        engine,
        schedule.cleanup_interval(),
        stop_signal,
    ));

    SchedulerHandle {
        stop,
        tasks: vec![cycle_task, cleanup_task],
    }
}

async fn cycle_loop(engine: Arc<AlertEngine>, period: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => break,
        }

        let engine = Arc::clone(&engine);
        match tokio::task::spawn_blocking(move || engine.run_cycle_now()).await {
            Ok(Ok(report)) => {
                record_cycle(&report);
                if report.persisted.is_empty() {
                    debug!(
                        "Cycle complete: {} candidates, {} suppressed",
                        report.candidates.len(),
                        report.suppressed
                    );
                } else {
                    info!(
                        "Cycle complete: {} alerts persisted, {} suppressed",
                        report.persisted.len(),
                        report.suppressed
                    );
                }
            }
            Ok(Err(e)) => {
                record_cycle_aborted();
                warn!("Cycle aborted: {}", e);
            }
            Err(e) => {
                record_cycle_aborted();
                error!("Cycle task failed: {}", e);
            }
        }
    }
}

async fn cleanup_loop(engine: Arc<AlertEngine>, period: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; cleanup waits a full period.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => break,
        }

        let engine = Arc::clone(&engine);
        match tokio::task::spawn_blocking(move || engine.cleanup(chrono::Utc::now())).await {
            Ok(Ok(removed)) => {
                record_cleanup(removed);
                info!("Retention cleanup removed {} alerts", removed);
            }
            Ok(Err(e)) => warn!("Retention cleanup failed: {}", e),
            Err(e) => error!("Cleanup task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use txpulse::{
        InMemoryAlertStore, InMemoryMetricsStore, PulseConfig, TransactionKind, TransactionRecord,
        TransactionStatus,
    };

    fn pending(id: usize) -> TransactionRecord {
        TransactionRecord {
            id: format!("t{}", id),
            user_id: "u1".to_string(),
            kind: TransactionKind::Payment,
            status: TransactionStatus::Pending,
            amount: Decimal::from(10),
            created_at: Utc::now() - chrono::Duration::minutes(5),
        }
    }

    fn engine_with(records: Vec<TransactionRecord>) -> (Arc<AlertEngine>, Arc<InMemoryAlertStore>) {
        let alerts = Arc::new(InMemoryAlertStore::new());
        let store = Arc::new(InMemoryMetricsStore::with_records(records, Vec::new()));
        let engine = AlertEngine::new(PulseConfig::default(), store, alerts.clone(), alerts.clone())
            .unwrap();
        (Arc::new(engine), alerts)
    }

    fn hourly() -> ScheduleConfig {
        ScheduleConfig {
            cycle_interval_secs: 3600,
            cleanup_interval_secs: 86_400,
        }
    }

    #[tokio::test]
    async fn test_first_cycle_runs_immediately() {
        let (engine, _) = engine_with(Vec::new());
        let handle = spawn(Arc::clone(&engine), &hourly());

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;

        assert_eq!(engine.stats().cycles_completed, 1);
    }

    #[tokio::test]
    async fn test_scheduled_cycle_persists_alert() {
        let (engine, alerts) = engine_with((0..120).map(pending).collect());
        let handle = spawn(Arc::clone(&engine), &hourly());

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;

        let persisted = alerts.all();
        assert!(persisted
            .iter()
            .any(|a| a.alert_type == txpulse::AlertType::HighPending));
        assert_eq!(engine.stats().alerts_persisted, persisted.len() as u64);
    }

    #[tokio::test]
    async fn test_shutdown_stops_timers() {
        let (engine, _) = engine_with(Vec::new());
        let handle = spawn(
            Arc::clone(&engine),
            &ScheduleConfig {
                cycle_interval_secs: 1,
                cleanup_interval_secs: 1,
            },
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;

        let completed = engine.stats().cycles_completed;
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(engine.stats().cycles_completed, completed);
    }
}

// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Collaborator interfaces and their in-memory implementations.
//!
//! The engine only talks to these traits. `InMemoryMetricsStore` aggregates
//! raw transaction and user rows; `InMemoryAlertStore` keeps emitted alerts
//! and answers history lookups.

use crate::alert::{Alert, AlertType};
use crate::error::{PulseError, Result};
use crate::period::{Period, PeriodStats};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, RwLock};

/// Supplies aggregate figures for a window.
///
/// Must return zero/absent fields for a window with no data, never an error.
pub trait MetricsStore: Send + Sync {
    fn period_stats(&self, period: &Period) -> Result<PeriodStats>;
}

/// Answers whether an alert of a given type was emitted recently.
pub trait AlertHistoryLookup: Send + Sync {
    fn exists_since(&self, alert_type: AlertType, since: DateTime<Utc>) -> Result<bool>;
}

/// Persists emitted alerts and removes expired ones.
pub trait AlertSink: Send + Sync {
    fn persist(&self, alert: &Alert) -> Result<()>;

    /// Persist a batch. Stores with transactional writes should override this
    /// so a batch lands entirely or not at all.
    fn persist_all(&self, alerts: &[Alert]) -> Result<()> {
        for alert in alerts {
            self.persist(alert)?;
        }
        Ok(())
    }

    /// Delete alerts created strictly before `cutoff`. Returns how many were removed.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Transaction kind. Only payments count towards GTV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Payment,
    Refund,
    Transfer,
    Withdrawal,
}

/// Transaction outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Pending,
    Failed,
}

/// One raw transaction row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Ledger {
    transactions: Vec<TransactionRecord>,
    users: Vec<UserRecord>,
}

/// Metrics store over raw rows held in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetricsStore {
    ledger: RwLock<Ledger>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with rows.
    pub fn with_records(transactions: Vec<TransactionRecord>, users: Vec<UserRecord>) -> Self {
        Self {
            ledger: RwLock::new(Ledger {
                transactions,
                users,
            }),
        }
    }

    pub fn add_transaction(&self, record: TransactionRecord) -> Result<()> {
        self.write()?.transactions.push(record);
        Ok(())
    }

    pub fn add_user(&self, record: UserRecord) -> Result<()> {
        self.write()?.users.push(record);
        Ok(())
    }

    /// Number of transaction rows held.
    pub fn transaction_count(&self) -> usize {
        self.ledger
            .read()
            .map(|ledger| ledger.transactions.len())
            .unwrap_or(0)
    }

    /// Number of user rows held.
    pub fn user_count(&self) -> usize {
        self.ledger.read().map(|ledger| ledger.users.len()).unwrap_or(0)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Ledger>> {
        self.ledger
            .write()
            .map_err(|_| PulseError::unavailable("metrics_store", "ledger lock poisoned"))
    }
}

impl MetricsStore for InMemoryMetricsStore {
    fn period_stats(&self, period: &Period) -> Result<PeriodStats> {
        let ledger = self
            .ledger
            .read()
            .map_err(|_| PulseError::unavailable("metrics_store", "ledger lock poisoned"))?;

        let mut stats = PeriodStats::empty();
        let mut successful = 0u64;
        let mut successful_payments = 0u64;

        for tx in ledger.transactions.iter().filter(|tx| period.contains(tx.created_at)) {
            stats.total_transactions += 1;
            match tx.status {
                TransactionStatus::Pending => stats.pending_count += 1,
                TransactionStatus::Failed => {
                    stats.failed_count += 1;
                    stats.failed_volume += tx.amount;
                }
                TransactionStatus::Success => {
                    successful += 1;
                    if tx.kind == TransactionKind::Payment {
                        successful_payments += 1;
                        stats.total_gtv += tx.amount;
                    }
                }
            }
        }

        if stats.total_transactions > 0 {
            stats.success_rate = Decimal::from(successful * 100)
                .checked_div(Decimal::from(stats.total_transactions));
        }
        if successful_payments > 0 {
            stats.avg_ticket_size = stats
                .total_gtv
                .checked_div(Decimal::from(successful_payments));
        }

        // Users registered before the window closes form the user base.
        stats.total_users = ledger
            .users
            .iter()
            .filter(|u| u.created_at < period.end)
            .count() as u64;
        stats.new_users = ledger
            .users
            .iter()
            .filter(|u| period.contains(u.created_at))
            .count() as u64;

        Ok(stats)
    }
}

/// Alert history and sink held in memory.
#[derive(Debug, Default)]
pub struct InMemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored alert, oldest first.
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// The `limit` most recent alerts, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        let mut alerts = self.all();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit);
        alerts
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Alert>>> {
        self.alerts
            .lock()
            .map_err(|_| PulseError::unavailable("alert_store", "alert lock poisoned"))
    }
}

impl AlertHistoryLookup for InMemoryAlertStore {
    fn exists_since(&self, alert_type: AlertType, since: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .lock()?
            .iter()
            .any(|a| a.alert_type == alert_type && a.created_at >= since))
    }
}

impl AlertSink for InMemoryAlertStore {
    fn persist(&self, alert: &Alert) -> Result<()> {
        self.lock()?.push(alert.clone());
        Ok(())
    }

    fn persist_all(&self, alerts: &[Alert]) -> Result<()> {
        self.lock()?.extend_from_slice(alerts);
        Ok(())
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut alerts = self.lock()?;
        let before = alerts.len();
        alerts.retain(|a| a.created_at >= cutoff);
        Ok((before - alerts.len()) as u64)
    }
}

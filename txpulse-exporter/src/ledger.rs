// TxPulse Exporter - CSV ledger import
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Loads transaction and user rows from CSV into the in-memory metrics store.
//!
//! Expected headers:
//!
//! ```text
//! transactions: id,user_id,kind,status,amount,created_at
//! users:        id,created_at
//! ```
//!
//! `kind` is one of `PAYMENT`, `REFUND`, `TRANSFER`, `WITHDRAWAL`; `status` one
//! of `SUCCESS`, `PENDING`, `FAILED`; timestamps are RFC 3339.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use txpulse::{InMemoryMetricsStore, TransactionKind, TransactionRecord, TransactionStatus, UserRecord};

/// Transaction row as it appears in the file. Amounts stay textual until
/// parsed so no precision is lost through floats.
#[derive(Debug, Deserialize)]
struct TransactionRow {
    id: String,
    user_id: String,
    kind: TransactionKind,
    status: TransactionStatus,
    amount: String,
    created_at: DateTime<Utc>,
}

/// Row counts of a loaded ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LedgerSummary {
    pub transactions: usize,
    pub users: usize,
}

/// Parse a transactions CSV file.
pub fn load_transactions(path: &Path) -> Result<Vec<TransactionRecord>, LedgerError> {
    if !path.exists() {
        return Err(LedgerError::FileNotFound(path.display().to_string()));
    }
    let mut reader = csv::Reader::from_path(path)?;

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<TransactionRow>().enumerate() {
        let row = row?;
        // Header is line 1.
        let line = index + 2;
        let amount = Decimal::from_str(row.amount.trim()).map_err(|_| LedgerError::InvalidAmount {
            line,
            value: row.amount.clone(),
        })?;
        if amount.is_sign_negative() {
            return Err(LedgerError::InvalidAmount {
                line,
                value: row.amount,
            });
        }
        records.push(TransactionRecord {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            status: row.status,
            amount,
            created_at: row.created_at,
        });
    }
    Ok(records)
}

/// Parse a users CSV file.
pub fn load_users(path: &Path) -> Result<Vec<UserRecord>, LedgerError> {
    if !path.exists() {
        return Err(LedgerError::FileNotFound(path.display().to_string()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let users = reader
        .deserialize::<UserRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Build a metrics store from optional transaction and user files.
pub fn load_store(
    transactions: Option<&Path>,
    users: Option<&Path>,
) -> Result<(InMemoryMetricsStore, LedgerSummary), LedgerError> {
    let transactions = match transactions {
        Some(path) => load_transactions(path)?,
        None => Vec::new(),
    };
    let users = match users {
        Some(path) => load_users(path)?,
        None => Vec::new(),
    };

    let summary = LedgerSummary {
        transactions: transactions.len(),
        users: users.len(),
    };
    info!(
        "Ledger loaded: {} transactions, {} users",
        summary.transactions, summary.users
    );

    Ok((InMemoryMetricsStore::with_records(transactions, users), summary))
}

/// Ledger import errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid amount on line {line}: {value:?}")]
    InvalidAmount { line: usize, value: String },
}

// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert types and definitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition an alert reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    /// GTV fell against the previous window.
    RevenueDrop,
    /// Failed transaction count rose against the previous window.
    FailedSpike,
    /// Current success rate below the configured band.
    LowSuccessRate,
    /// Pending transactions piling up.
    HighPending,
    /// Unusually busy window compared to the trailing daily mean.
    HighVolumeDay,
}

impl AlertType {
    pub const ALL: [AlertType; 5] = [
        AlertType::RevenueDrop,
        AlertType::FailedSpike,
        AlertType::LowSuccessRate,
        AlertType::HighPending,
        AlertType::HighVolumeDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::RevenueDrop => "REVENUE_DROP",
            AlertType::FailedSpike => "FAILED_SPIKE",
            AlertType::LowSuccessRate => "LOW_SUCCESS_RATE",
            AlertType::HighPending => "HIGH_PENDING",
            AlertType::HighVolumeDay => "HIGH_VOLUME_DAY",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition that crossed its band during one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAlert {
    pub alert_type: AlertType,
    pub severity: Severity,
    /// Observed value (percent change, rate, count or volume).
    pub metric_value: Decimal,
    /// Bound of the band that fired.
    pub threshold_value: Decimal,
    /// Human-readable reason.
    pub reason: String,
}

impl CandidateAlert {
    pub fn new(
        alert_type: AlertType,
        severity: Severity,
        metric_value: Decimal,
        threshold_value: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            severity,
            metric_value,
            threshold_value,
            reason: reason.into(),
        }
    }

    /// Stamp the candidate into a persisted alert record.
    pub fn into_alert(self, comparison_period: impl Into<String>, created_at: DateTime<Utc>) -> Alert {
        Alert {
            alert_type: self.alert_type,
            severity: self.severity,
            metric_value: self.metric_value,
            threshold_value: self.threshold_value,
            comparison_period: comparison_period.into(),
            message: self.reason,
            created_at,
        }
    }
}

/// An emitted alert. Never updated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub metric_value: Decimal,
    pub threshold_value: Decimal,
    /// Windows compared, e.g. `"<current> vs <previous>"`.
    pub comparison_period: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

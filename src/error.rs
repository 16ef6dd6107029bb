// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for TxPulse
//!
//! Pure computation (snapshots, comparisons, threshold evaluation) never fails
//! for data-shape reasons. Errors only come from collaborators and from
//! configuration loading.

use thiserror::Error;

/// Result type alias for TxPulse operations
pub type Result<T> = std::result::Result<T, PulseError>;

/// Main error type for TxPulse operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PulseError {
    /// A collaborator (metrics store, alert history, alert sink) failed
    #[error("Data unavailable from {source_name}: {reason}")]
    DataUnavailable { source_name: String, reason: String },

    /// Configuration rejected at load time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration file could not be read
    #[error("Cannot read configuration file {path}: {reason}")]
    ConfigIo { path: String, reason: String },

    /// Configuration document could not be parsed
    #[error("Cannot parse configuration: {0}")]
    ConfigParse(String),
}

impl PulseError {
    /// Build a `DataUnavailable` error for a named collaborator.
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Build an `InvalidConfiguration` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Whether this error came from a collaborator rather than from configuration.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Self::DataUnavailable { .. })
    }
}

impl From<serde_json::Error> for PulseError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

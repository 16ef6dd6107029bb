// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! TxPulse configuration.
//!
//! Every section has documented defaults. A configuration is validated once at
//! load time; the engine never mutates it afterwards.

use crate::error::{PulseError, Result};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest accepted window of any kind, in days.
pub const MAX_WINDOW_DAYS: i64 = 3_650;

/// Longest accepted window of any kind, in hours.
pub const MAX_WINDOW_HOURS: i64 = MAX_WINDOW_DAYS * 24;

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Alert thresholds and duplicate suppression.
    pub thresholds: ThresholdConfig,

    /// Evaluation window settings.
    pub engine: EngineConfig,

    /// Alert retention.
    pub retention: RetentionConfig,

    /// Read-path cache.
    pub cache: CacheConfig,

    /// Background timers.
    pub schedule: ScheduleConfig,
}

impl PulseConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PulseConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| PulseError::ConfigIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.engine.validate()?;
        self.retention.validate()?;
        self.cache.validate()?;
        self.schedule.validate()
    }
}

/// Thresholds for every alert condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Master switch for alert evaluation.
    pub enabled: bool,

    /// Minimum hours between two alerts of the same type.
    pub duplicate_window_hours: i64,

    /// GTV drop, in percent of the previous window.
    pub revenue_drop: PercentBand,

    /// Failed-count increase, in percent of the previous window.
    pub failed_spike: PercentBand,

    /// Current success rate floor, in percent.
    pub low_success_rate: RateBand,

    /// Current pending transaction count.
    pub high_pending: CountBand,

    /// Busy-day detection against the trailing daily mean.
    pub high_volume: VolumeRule,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duplicate_window_hours: 6,
            revenue_drop: PercentBand::new(20, 40),
            failed_spike: PercentBand::new(25, 50),
            low_success_rate: RateBand::new(85, 70),
            high_pending: CountBand::new(100, 500),
            high_volume: VolumeRule::default(),
        }
    }
}

impl ThresholdConfig {
    /// Duplicate suppression window.
    pub fn duplicate_window(&self) -> Duration {
        Duration::hours(self.duplicate_window_hours)
    }

    pub fn validate(&self) -> Result<()> {
        check_window(
            "thresholds.duplicate_window_hours",
            self.duplicate_window_hours,
            0,
            MAX_WINDOW_HOURS,
        )?;
        self.revenue_drop.validate("revenue_drop")?;
        self.failed_spike.validate("failed_spike")?;
        self.low_success_rate.validate("low_success_rate")?;
        self.high_pending.validate("high_pending")?;
        self.high_volume.validate()
    }
}

/// Percent-change band. Critical must be at least as large as warning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentBand {
    pub warning_pct: Decimal,
    pub critical_pct: Decimal,
}

impl PercentBand {
    pub fn new(warning_pct: i64, critical_pct: i64) -> Self {
        Self {
            warning_pct: Decimal::from(warning_pct),
            critical_pct: Decimal::from(critical_pct),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.warning_pct.is_sign_negative() || self.critical_pct.is_sign_negative() {
            return Err(PulseError::invalid_config(format!(
                "{}: percentages must not be negative",
                name
            )));
        }
        if self.critical_pct < self.warning_pct {
            return Err(PulseError::invalid_config(format!(
                "{}: critical_pct ({}) is less strict than warning_pct ({})",
                name, self.critical_pct, self.warning_pct
            )));
        }
        Ok(())
    }
}

/// Success-rate floor. Critical must be at or below warning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBand {
    pub warning_rate: Decimal,
    pub critical_rate: Decimal,
}

impl RateBand {
    pub fn new(warning_rate: i64, critical_rate: i64) -> Self {
        Self {
            warning_rate: Decimal::from(warning_rate),
            critical_rate: Decimal::from(critical_rate),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let hundred = Decimal::ONE_HUNDRED;
        for rate in [self.warning_rate, self.critical_rate] {
            if rate.is_sign_negative() || rate > hundred {
                return Err(PulseError::invalid_config(format!(
                    "{}: rate {} outside [0, 100]",
                    name, rate
                )));
            }
        }
        if self.critical_rate > self.warning_rate {
            return Err(PulseError::invalid_config(format!(
                "{}: critical_rate ({}) is less strict than warning_rate ({})",
                name, self.critical_rate, self.warning_rate
            )));
        }
        Ok(())
    }
}

/// Absolute count band. Critical must be at least as large as warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountBand {
    pub warning_count: u64,
    pub critical_count: u64,
}

impl CountBand {
    pub fn new(warning_count: u64, critical_count: u64) -> Self {
        Self {
            warning_count,
            critical_count,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.warning_count == 0 {
            return Err(PulseError::invalid_config(format!(
                "{}: warning_count must be positive",
                name
            )));
        }
        if self.critical_count < self.warning_count {
            return Err(PulseError::invalid_config(format!(
                "{}: critical_count ({}) is less strict than warning_count ({})",
                name, self.critical_count, self.warning_count
            )));
        }
        Ok(())
    }
}

/// High-volume detection rule. Only ever raises INFO.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeRule {
    pub enabled: bool,
    /// Current volume must exceed `multiplier * trailing mean`.
    pub multiplier: Decimal,
    /// Days in the trailing baseline window.
    pub trailing_days: i64,
}

impl Default for VolumeRule {
    fn default() -> Self {
        Self {
            enabled: true,
            multiplier: Decimal::new(15, 1),
            trailing_days: 30,
        }
    }
}

impl VolumeRule {
    /// Trailing baseline window length.
    pub fn trailing_window(&self) -> Duration {
        Duration::days(self.trailing_days)
    }

    fn validate(&self) -> Result<()> {
        if self.multiplier <= Decimal::ZERO {
            return Err(PulseError::invalid_config(format!(
                "high_volume: multiplier must be positive (got {})",
                self.multiplier
            )));
        }
        check_window("high_volume.trailing_days", self.trailing_days, 1, MAX_WINDOW_DAYS)
    }
}

/// Evaluation window settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of both the current and the previous window, in hours.
    pub window_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { window_hours: 24 }
    }
}

impl EngineConfig {
    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours)
    }

    fn validate(&self) -> Result<()> {
        check_window("engine.window_hours", self.window_hours, 1, MAX_WINDOW_HOURS)
    }
}

/// Alert retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Alerts older than this are deleted by the cleanup job.
    pub days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { days: 30 }
    }
}

impl RetentionConfig {
    pub fn window(&self) -> Duration {
        Duration::days(self.days)
    }

    fn validate(&self) -> Result<()> {
        check_window("retention.days", self.days, 1, MAX_WINDOW_DAYS)
    }
}

/// Read-path cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries before LRU eviction.
    pub capacity: usize,
    /// TTL for live dashboard KPIs (seconds).
    pub live_ttl_secs: u64,
    /// TTL for historical chart series (seconds).
    pub historical_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            live_ttl_secs: 30,
            historical_ttl_secs: 90,
        }
    }
}

impl CacheConfig {
    pub fn live_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.live_ttl_secs)
    }

    pub fn historical_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.historical_ttl_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(PulseError::invalid_config("cache.capacity must be positive"));
        }
        Ok(())
    }
}

/// Background timer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between alert evaluation cycles.
    pub cycle_interval_secs: u64,
    /// Seconds between retention cleanups.
    pub cleanup_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 3_600,
            cleanup_interval_secs: 86_400,
        }
    }
}

impl ScheduleConfig {
    pub fn cycle_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.cycle_interval_secs == 0 || self.cleanup_interval_secs == 0 {
            return Err(PulseError::invalid_config(
                "schedule intervals must be positive",
            ));
        }
        Ok(())
    }
}

fn check_window(name: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(PulseError::invalid_config(format!(
            "{} must be within [{}, {}] (got {})",
            name, min, max, value
        )));
    }
    Ok(())
}

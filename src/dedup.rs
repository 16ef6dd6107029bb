// TxPulse - Transaction KPI monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Duplicate alert suppression.
//!
//! Suppression is keyed on alert type only: a CRITICAL following a WARNING of
//! the same type inside the window is dropped too.

use crate::alert::{AlertType, CandidateAlert};
use crate::error::{PulseError, Result};
use crate::store::AlertHistoryLookup;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Drops candidates whose type already fired within the duplicate window.
#[derive(Debug, Clone)]
pub struct NotificationDeduper {
    window: Duration,
}

impl NotificationDeduper {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Suppression window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Keep only candidates with no alert of the same type since `now - window`.
    ///
    /// Lookup failures abort the whole filter, as does a window reaching
    /// before the earliest representable instant.
    pub fn filter(
        &self,
        candidates: Vec<CandidateAlert>,
        history: &dyn AlertHistoryLookup,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateAlert>> {
        let since = now.checked_sub_signed(self.window).ok_or_else(|| {
            PulseError::invalid_config(format!(
                "duplicate window of {} hours before {} is out of range",
                self.window.num_hours(),
                now
            ))
        })?;
        let mut seen: HashSet<AlertType> = HashSet::new();
        let mut kept = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if !seen.insert(candidate.alert_type) {
                log::debug!("dropping repeated {} candidate in batch", candidate.alert_type);
                continue;
            }
            if history.exists_since(candidate.alert_type, since)? {
                log::debug!(
                    "suppressing {} {}: already raised since {}",
                    candidate.severity,
                    candidate.alert_type,
                    since
                );
                continue;
            }
            kept.push(candidate);
        }

        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Severity;
    use crate::store::{AlertSink, InMemoryAlertStore};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    struct FailingHistory;

    impl AlertHistoryLookup for FailingHistory {
        fn exists_since(&self, _: AlertType, _: DateTime<Utc>) -> Result<bool> {
            Err(PulseError::unavailable("alert_history", "timeout"))
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn candidate(alert_type: AlertType, severity: Severity) -> CandidateAlert {
        CandidateAlert::new(alert_type, severity, Decimal::ONE, Decimal::ONE, "test")
    }

    #[test]
    fn test_passes_without_history() {
        let deduper = NotificationDeduper::new(Duration::hours(6));
        let history = InMemoryAlertStore::new();
        let kept = deduper
            .filter(vec![candidate(AlertType::HighPending, Severity::Warning)], &history, t0())
            .unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_suppresses_within_window() {
        let deduper = NotificationDeduper::new(Duration::hours(6));
        let history = InMemoryAlertStore::new();
        history
            .persist(&candidate(AlertType::HighPending, Severity::Warning).into_alert("p", t0()))
            .unwrap();

        let at_2h = deduper
            .filter(
                vec![candidate(AlertType::HighPending, Severity::Warning)],
                &history,
                t0() + Duration::hours(2),
            )
            .unwrap();
        assert!(at_2h.is_empty());

        let at_7h = deduper
            .filter(
                vec![candidate(AlertType::HighPending, Severity::Warning)],
                &history,
                t0() + Duration::hours(7),
            )
            .unwrap();
        assert_eq!(at_7h.len(), 1);
    }

    #[test]
    fn test_suppression_ignores_severity() {
        let deduper = NotificationDeduper::new(Duration::hours(6));
        let history = InMemoryAlertStore::new();
        history
            .persist(&candidate(AlertType::RevenueDrop, Severity::Warning).into_alert("p", t0()))
            .unwrap();

        let kept = deduper
            .filter(
                vec![
                    candidate(AlertType::RevenueDrop, Severity::Critical),
                    candidate(AlertType::FailedSpike, Severity::Warning),
                ],
                &history,
                t0() + Duration::hours(1),
            )
            .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].alert_type, AlertType::FailedSpike);
    }

    #[test]
    fn test_repeated_type_in_batch_keeps_first() {
        let deduper = NotificationDeduper::new(Duration::hours(6));
        let kept = deduper
            .filter(
                vec![
                    candidate(AlertType::HighPending, Severity::Critical),
                    candidate(AlertType::HighPending, Severity::Warning),
                ],
                &InMemoryAlertStore::new(),
                t0(),
            )
            .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].severity, Severity::Critical);
    }

    #[test]
    fn test_lookup_failure_propagates() {
        let deduper = NotificationDeduper::new(Duration::hours(6));
        let result = deduper.filter(
            vec![candidate(AlertType::HighPending, Severity::Warning)],
            &FailingHistory,
            t0(),
        );
        assert!(matches!(result, Err(PulseError::DataUnavailable { .. })));
    }

    #[test]
    fn test_window_before_earliest_instant_is_an_error() {
        let deduper = NotificationDeduper::new(Duration::hours(1_000_000_000_000));
        let result = deduper.filter(
            vec![candidate(AlertType::HighPending, Severity::Warning)],
            &InMemoryAlertStore::new(),
            t0(),
        );
        assert!(matches!(result, Err(PulseError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_empty_candidates_skip_lookup() {
        let deduper = NotificationDeduper::new(Duration::hours(6));
        let kept = deduper.filter(Vec::new(), &FailingHistory, t0()).unwrap();
        assert!(kept.is_empty());
    }
}

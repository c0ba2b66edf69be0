//! Cycle record and creation limits.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};

/// Upper bound no cycle duration may exceed.
pub const MAX_CYCLE_MINUTES: u32 = 60;

/// Creation-ordered cycle identifier derived from epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(i64);

impl CycleId {
    /// Next identifier for a cycle created at `now`.
    ///
    /// Ids track the creation timestamp but never repeat or go backwards:
    /// two cycles in the same millisecond (or a clock stepping back) get
    /// `previous + 1`. Returns `None` once the id space is used up.
    pub fn next_after(previous: Option<CycleId>, now: DateTime<Utc>) -> Option<Self> {
        let ms = now.timestamp_millis();
        let next = match previous {
            Some(prev) if prev.0 >= ms => CycleId(prev.0.checked_add(1)?),
            _ => CycleId(ms),
        };
        next.has_successor().then_some(next)
    }

    /// Whether another id can still follow this one.
    pub(crate) fn has_successor(self) -> bool {
        self.0 < i64::MAX
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    InProgress,
    Finished,
    Interrupted,
}

impl CycleStatus {
    pub fn label(self) -> &'static str {
        match self {
            CycleStatus::InProgress => "In progress",
            CycleStatus::Finished => "Finished",
            CycleStatus::Interrupted => "Interrupted",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One task/duration attempt.
///
/// Fields are read-only outside the crate. Terminal dates are written only
/// by [`CycleStore`](super::CycleStore), and at most one of them is ever set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    id: CycleId,
    task: String,
    minutes_amount: u32,
    start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interrupted_date: Option<DateTime<Utc>>,
}

impl Cycle {
    pub(crate) fn new(
        id: CycleId,
        task: String,
        minutes_amount: u32,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task,
            minutes_amount,
            start_date,
            finished_date: None,
            interrupted_date: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> CycleId {
        self.id
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn minutes_amount(&self) -> u32 {
        self.minutes_amount
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn finished_date(&self) -> Option<DateTime<Utc>> {
        self.finished_date
    }

    pub fn interrupted_date(&self) -> Option<DateTime<Utc>> {
        self.interrupted_date
    }

    pub fn total_seconds(&self) -> i64 {
        i64::from(self.minutes_amount) * 60
    }

    pub fn is_terminal(&self) -> bool {
        self.finished_date.is_some() || self.interrupted_date.is_some()
    }

    pub fn status(&self) -> CycleStatus {
        if self.finished_date.is_some() {
            CycleStatus::Finished
        } else if self.interrupted_date.is_some() {
            CycleStatus::Interrupted
        } else {
            CycleStatus::InProgress
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Returns `false` and leaves the cycle untouched if it is already terminal.
    pub(crate) fn mark_finished(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.finished_date = Some(at);
        true
    }

    /// Returns `false` and leaves the cycle untouched if it is already terminal.
    pub(crate) fn mark_interrupted(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.interrupted_date = Some(at);
        true
    }

    pub(crate) fn has_both_terminal_dates(&self) -> bool {
        self.finished_date.is_some() && self.interrupted_date.is_some()
    }
}

/// Inclusive bounds on a cycle's duration in minutes.
///
/// Always within `1..=MAX_CYCLE_MINUTES`; the only way in is [`CycleLimits::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleLimits {
    min_minutes: u32,
    max_minutes: u32,
}

impl Default for CycleLimits {
    fn default() -> Self {
        Self {
            min_minutes: 1,
            max_minutes: MAX_CYCLE_MINUTES,
        }
    }
}

impl CycleLimits {
    /// # Errors
    /// `InvalidValue` unless `1 <= min_minutes <= max_minutes <= 60`.
    pub fn new(min_minutes: u32, max_minutes: u32) -> Result<Self, ConfigError> {
        if min_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cycle.min_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        if max_minutes > MAX_CYCLE_MINUTES || max_minutes < min_minutes {
            return Err(ConfigError::InvalidValue {
                key: "cycle.max_minutes".into(),
                message: format!("must be between {min_minutes} and {MAX_CYCLE_MINUTES}"),
            });
        }
        Ok(Self {
            min_minutes,
            max_minutes,
        })
    }

    pub fn min_minutes(&self) -> u32 {
        self.min_minutes
    }

    pub fn max_minutes(&self) -> u32 {
        self.max_minutes
    }

    /// Validate creation input, returning the trimmed task label.
    pub fn validate(&self, task: &str, minutes_amount: u32) -> Result<String, ValidationError> {
        let task = task.trim();
        if task.is_empty() {
            return Err(ValidationError::EmptyTask);
        }
        if minutes_amount < self.min_minutes || minutes_amount > self.max_minutes {
            return Err(ValidationError::DurationOutOfRange {
                value: minutes_amount,
                min: self.min_minutes,
                max: self.max_minutes,
            });
        }
        Ok(task.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn ids_follow_clock_and_never_repeat() {
        let first = CycleId::next_after(None, t0()).unwrap();
        assert_eq!(first.as_i64(), t0().timestamp_millis());

        let same_ms = CycleId::next_after(Some(first), t0()).unwrap();
        assert_eq!(same_ms.as_i64(), first.as_i64() + 1);

        let earlier =
            CycleId::next_after(Some(same_ms), t0() - chrono::Duration::seconds(5)).unwrap();
        assert!(earlier > same_ms);

        let later =
            CycleId::next_after(Some(earlier), t0() + chrono::Duration::seconds(5)).unwrap();
        assert_eq!(later.as_i64(), (t0() + chrono::Duration::seconds(5)).timestamp_millis());
    }

    #[test]
    fn id_space_end_yields_none() {
        assert_eq!(CycleId::next_after(Some(CycleId(i64::MAX)), t0()), None);
        assert_eq!(CycleId::next_after(Some(CycleId(i64::MAX - 1)), t0()), None);
        let last = CycleId::next_after(Some(CycleId(i64::MAX - 2)), t0()).unwrap();
        assert_eq!(last.as_i64(), i64::MAX - 1);
        assert!(last.has_successor());
    }

    #[test]
    fn limits_constructor_enforces_range() {
        assert!(matches!(
            CycleLimits::new(0, 500),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(CycleLimits::new(0, 10).is_err());
        assert!(CycleLimits::new(1, 61).is_err());
        assert!(CycleLimits::new(10, 5).is_err());

        let strict = CycleLimits::new(5, 60).unwrap();
        assert_eq!((strict.min_minutes(), strict.max_minutes()), (5, 60));
        assert_eq!(CycleLimits::new(1, 60).unwrap(), CycleLimits::default());
    }

    #[test]
    fn terminal_dates_are_exclusive() {
        let mut cycle = Cycle::new(CycleId(1), "Read".into(), 10, t0());
        assert_eq!(cycle.status(), CycleStatus::InProgress);

        assert!(cycle.mark_interrupted(t0()));
        assert!(!cycle.mark_finished(t0()));
        assert!(!cycle.mark_interrupted(t0() + chrono::Duration::seconds(1)));

        assert_eq!(cycle.status(), CycleStatus::Interrupted);
        assert_eq!(cycle.interrupted_date(), Some(t0()));
        assert!(cycle.finished_date().is_none());
    }

    #[test]
    fn limits_reject_blank_task_and_out_of_range() {
        let limits = CycleLimits::default();
        assert_eq!(limits.validate("", 10), Err(ValidationError::EmptyTask));
        assert_eq!(limits.validate("   ", 10), Err(ValidationError::EmptyTask));
        assert!(matches!(
            limits.validate("x", 0),
            Err(ValidationError::DurationOutOfRange { value: 0, .. })
        ));
        assert!(limits.validate("x", 61).is_err());
        assert_eq!(limits.validate("  Write  ", 60).unwrap(), "Write");
        assert!(limits.validate("x", 1).is_ok());
    }

    #[test]
    fn open_cycle_omits_terminal_dates_in_json() {
        let cycle = Cycle::new(CycleId(42), "Plan".into(), 25, t0());
        let json = serde_json::to_value(&cycle).unwrap();
        assert_eq!(json["id"], 42);
        assert!(json.get("finished_date").is_none());
        assert!(json.get("interrupted_date").is_none());
    }
}

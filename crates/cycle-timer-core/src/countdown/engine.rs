//! Countdown engine.
//!
//! Remaining time is never accumulated from tick counts. Each tick derives
//! elapsed time from the wall-clock difference between `now` and the cycle's
//! start, so a tick that arrives after the process was suspended immediately
//! reflects the true elapsed time.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = CountdownEngine::default();
//! // Once per second:
//! match engine.tick(&mut store, Utc::now())? {
//!     Some(Event::CycleFinished { .. }) => { /* stop driving */ }
//!     _ => {}
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cycle::{Cycle, CycleStore};
use crate::error::Result;
use crate::events::Event;
use crate::storage::StateSlot;

/// Display-ready remaining time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
    /// Whole minutes left, zero-padded to two digits.
    pub minutes: String,
    /// Seconds within the current minute, zero-padded to two digits.
    pub seconds: String,
    pub remaining_seconds: u64,
}

impl Remaining {
    fn from_seconds(remaining_seconds: u64) -> Self {
        Self {
            minutes: format!("{:02}", remaining_seconds / 60),
            seconds: format!("{:02}", remaining_seconds % 60),
            remaining_seconds,
        }
    }

    /// `MM:SS`
    pub fn clock(&self) -> String {
        format!("{}:{}", self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TickResult {
    Running { remaining_seconds: u64 },
    Completed,
}

/// Whole seconds since the cycle started, clamped to `[0, total]`.
pub fn elapsed_seconds(cycle: &Cycle, now: DateTime<Utc>) -> i64 {
    (now - cycle.start_date())
        .num_seconds()
        .clamp(0, cycle.total_seconds())
}

pub fn compute_remaining(cycle: &Cycle, now: DateTime<Utc>) -> Remaining {
    let remaining = cycle.total_seconds() - elapsed_seconds(cycle, now);
    Remaining::from_seconds(remaining.max(0) as u64)
}

/// Pure completion check; does not touch the store.
pub fn evaluate(cycle: &Cycle, now: DateTime<Utc>) -> TickResult {
    let total = cycle.total_seconds();
    let elapsed = elapsed_seconds(cycle, now);
    if elapsed >= total {
        TickResult::Completed
    } else {
        TickResult::Running {
            remaining_seconds: (total - elapsed) as u64,
        }
    }
}

/// Title text: `"<idle> - MM:SS"` while running, `idle` otherwise.
pub fn indicator_label(remaining: Option<&Remaining>, idle_title: &str) -> String {
    match remaining {
        Some(r) => format!("{idle_title} - {}", r.clock()),
        None => idle_title.to_string(),
    }
}

/// Drives the active cycle of a [`CycleStore`] toward completion.
#[derive(Debug, Clone)]
pub struct CountdownEngine {
    idle_title: String,
}

impl Default for CountdownEngine {
    fn default() -> Self {
        Self::new("Ignite Timer")
    }
}

impl CountdownEngine {
    pub fn new(idle_title: impl Into<String>) -> Self {
        Self {
            idle_title: idle_title.into(),
        }
    }

    pub fn idle_title(&self) -> &str {
        &self.idle_title
    }

    pub fn label(&self, remaining: Option<&Remaining>) -> String {
        indicator_label(remaining, &self.idle_title)
    }

    /// Recompute the active cycle against `now`.
    ///
    /// Returns `None` when nothing is active, a `CountdownTick` while the
    /// cycle runs, and `CycleFinished` on the tick that observes completion.
    /// Finishing clears the active cycle, so completion is reported once.
    pub fn tick<S: StateSlot>(
        &self,
        store: &mut CycleStore<S>,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        let (cycle_id, result, remaining) = match store.active_cycle() {
            Some(cycle) => (
                cycle.id(),
                evaluate(cycle, now),
                compute_remaining(cycle, now),
            ),
            None => return Ok(None),
        };

        match result {
            TickResult::Running { remaining_seconds } => {
                tracing::debug!(cycle_id = %cycle_id, remaining_seconds, "tick");
                Ok(Some(Event::CountdownTick {
                    cycle_id,
                    title: self.label(Some(&remaining)),
                    minutes: remaining.minutes,
                    seconds: remaining.seconds,
                    remaining_seconds,
                    at: now,
                }))
            }
            TickResult::Completed => {
                let finished = store.finish_active_cycle_at(now)?;
                Ok(Event::cycle_closed(&finished))
            }
        }
    }

    /// Full read-only view of the store at `now`.
    pub fn snapshot<S: StateSlot>(&self, store: &CycleStore<S>, now: DateTime<Utc>) -> Event {
        let active = store.active_cycle().cloned();
        let remaining = active.as_ref().map(|c| compute_remaining(c, now));
        Event::StateSnapshot {
            title: self.label(remaining.as_ref()),
            active_cycle: active,
            remaining,
            at: now,
        }
    }
}

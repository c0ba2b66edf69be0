use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::Remaining;
use crate::cycle::{Cycle, CycleId};

/// Every cycle transition and countdown update produces an Event.
/// The CLI prints them as JSON; the watch loop streams them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    CycleCreated {
        cycle_id: CycleId,
        task: String,
        minutes_amount: u32,
        at: DateTime<Utc>,
    },
    CycleInterrupted {
        cycle_id: CycleId,
        at: DateTime<Utc>,
    },
    CycleFinished {
        cycle_id: CycleId,
        at: DateTime<Utc>,
    },
    /// One driver tick while the cycle is still running.
    CountdownTick {
        cycle_id: CycleId,
        minutes: String,
        seconds: String,
        remaining_seconds: u64,
        title: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        active_cycle: Option<Cycle>,
        remaining: Option<Remaining>,
        title: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn cycle_created(cycle: &Cycle) -> Self {
        Event::CycleCreated {
            cycle_id: cycle.id(),
            task: cycle.task().to_string(),
            minutes_amount: cycle.minutes_amount(),
            at: cycle.start_date(),
        }
    }

    /// Terminal event for a closed cycle; `None` while it is still running.
    pub fn cycle_closed(cycle: &Cycle) -> Option<Self> {
        match (cycle.finished_date(), cycle.interrupted_date()) {
            (Some(at), _) => Some(Event::CycleFinished {
                cycle_id: cycle.id(),
                at,
            }),
            (None, Some(at)) => Some(Event::CycleInterrupted {
                cycle_id: cycle.id(),
                at,
            }),
            (None, None) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::CycleFinished { .. } | Event::CycleInterrupted { .. }
        )
    }
}

//! Aggregated view over cycle history.

use serde::{Deserialize, Serialize};

use super::model::{Cycle, CycleStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total_cycles: u64,
    pub finished: u64,
    pub interrupted: u64,
    pub in_progress: u64,
    /// Planned minutes of cycles that ran to completion.
    pub finished_minutes: u64,
}

impl HistorySummary {
    pub fn from_cycles(cycles: &[Cycle]) -> Self {
        cycles.iter().fold(Self::default(), |mut summary, cycle| {
            summary.total_cycles += 1;
            match cycle.status() {
                CycleStatus::Finished => {
                    summary.finished += 1;
                    summary.finished_minutes += u64::from(cycle.minutes_amount());
                }
                CycleStatus::Interrupted => summary.interrupted += 1,
                CycleStatus::InProgress => summary.in_progress += 1,
            }
            summary
        })
    }
}

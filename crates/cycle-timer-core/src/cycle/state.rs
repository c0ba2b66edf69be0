//! The durable cycle aggregate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::model::{Cycle, CycleId};

/// All cycles in creation order plus the id of the running one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCollection {
    #[serde(default)]
    cycles: Vec<Cycle>,
    #[serde(default)]
    active_cycle_id: Option<CycleId>,
}

impl CycleCollection {
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn active_cycle_id(&self) -> Option<CycleId> {
        self.active_cycle_id
    }

    pub fn active_cycle(&self) -> Option<&Cycle> {
        let id = self.active_cycle_id?;
        self.cycles.iter().find(|c| c.id() == id)
    }

    pub fn last_id(&self) -> Option<CycleId> {
        self.cycles.last().map(Cycle::id)
    }

    /// Check the aggregate invariants.
    ///
    /// - ids are unique and strictly increasing, and the last one still has
    ///   a successor
    /// - no cycle carries both terminal dates
    /// - at most one cycle is non-terminal, and it is exactly the active one
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.cycles.len());
        if !self.cycles.iter().all(|c| seen.insert(c.id())) {
            return false;
        }
        if self.cycles.windows(2).any(|w| w[0].id() >= w[1].id()) {
            return false;
        }
        if self.last_id().is_some_and(|id| !id.has_successor()) {
            return false;
        }
        if self.cycles.iter().any(Cycle::has_both_terminal_dates) {
            return false;
        }

        let mut open = self.cycles.iter().filter(|c| !c.is_terminal());
        match (open.next(), open.next(), self.active_cycle_id) {
            (None, None, None) => true,
            (Some(only), None, Some(active)) => only.id() == active,
            _ => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    // ── Store-only mutation ─────────────────────────────────────────

    pub(crate) fn push_active(&mut self, cycle: Cycle) {
        self.active_cycle_id = Some(cycle.id());
        self.cycles.push(cycle);
    }

    /// Detach the active cycle and hand back a mutable reference to it.
    pub(crate) fn take_active_mut(&mut self) -> Option<&mut Cycle> {
        let id = self.active_cycle_id.take()?;
        self.cycles.iter_mut().find(|c| c.id() == id)
    }
}

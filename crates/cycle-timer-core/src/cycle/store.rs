//! Cycle store: the single owner and writer of the cycle aggregate.
//!
//! Every transition mutates the in-memory aggregate first, then writes the
//! whole aggregate to the durable slot. A failed write never rolls the
//! transition back: the in-memory state stays authoritative for the session
//! and the failure is kept as a warning for the caller to surface.
//!
//! ```text
//! (none) --create--> ACTIVE --finish----> FINISHED
//!                           \-interrupt-> INTERRUPTED
//! ```

use chrono::{DateTime, Utc};

use super::model::{Cycle, CycleId, CycleLimits};
use super::state::CycleCollection;
use crate::error::{CoreError, Result};
use crate::storage::StateSlot;

/// Version of the persisted aggregate layout. Bump on any `Cycle` shape change.
pub const SCHEMA_VERSION: &str = "1.0.0";

pub const DEFAULT_STATE_KEY_PREFIX: &str = "cycles-state";

/// Slot key for a given prefix, e.g. `cycles-state-1.0.0`.
pub fn state_key(prefix: &str) -> String {
    format!("{prefix}-{SCHEMA_VERSION}")
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Finished,
    Interrupted,
}

pub struct CycleStore<S: StateSlot> {
    slot: S,
    key: String,
    limits: CycleLimits,
    state: CycleCollection,
    /// Memory holds transitions the slot has not stored yet.
    dirty: bool,
    persist_warning: Option<CoreError>,
}

impl<S: StateSlot> CycleStore<S> {
    /// Open a store over `slot` with default limits and key.
    pub fn open(slot: S) -> Self {
        Self::open_with(slot, CycleLimits::default(), DEFAULT_STATE_KEY_PREFIX)
    }

    /// Open a store, restoring whatever aggregate the slot holds.
    ///
    /// Missing, unreadable or inconsistent state is not an error: the store
    /// starts from the empty aggregate.
    pub fn open_with(slot: S, limits: CycleLimits, key_prefix: &str) -> Self {
        let key = state_key(key_prefix);
        let state = Self::restore(&slot, &key);
        tracing::debug!(
            key = %key,
            cycles = state.cycles().len(),
            active = ?state.active_cycle_id(),
            "cycle store opened"
        );
        Self {
            slot,
            key,
            limits,
            state,
            dirty: false,
            persist_warning: None,
        }
    }

    fn restore(slot: &S, key: &str) -> CycleCollection {
        let json = match slot.read_slot(key) {
            Ok(Some(json)) => json,
            Ok(None) => return CycleCollection::default(),
            Err(e) => {
                tracing::warn!(key, error = %e, "cycle state unreadable, starting empty");
                return CycleCollection::default();
            }
        };
        match CycleCollection::from_json(&json) {
            Ok(state) if state.is_consistent() => state,
            Ok(_) => {
                tracing::warn!(key, "persisted cycle state violates invariants, starting empty");
                CycleCollection::default()
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "persisted cycle state is corrupt, starting empty");
                CycleCollection::default()
            }
        }
    }

    /// Re-read the slot, adopting its aggregate when it is readable,
    /// consistent, and keeps every cycle closed in memory exactly as it is.
    ///
    /// While memory holds unsaved transitions the slot is stale: the write is
    /// retried instead and nothing is read.
    pub fn reload(&mut self) {
        if self.dirty {
            match self.write_state() {
                Ok(()) => self.dirty = false,
                Err(e) => tracing::debug!(key = %self.key, error = %e, "retrying unsaved cycle state failed"),
            }
            return;
        }
        match self.slot.read_slot(&self.key) {
            Ok(Some(json)) => match CycleCollection::from_json(&json) {
                Ok(state) if state.is_consistent() && self.keeps_closed_cycles(&state) => {
                    self.state = state
                }
                _ => tracing::debug!(key = %self.key, "slot unusable on reload, keeping memory"),
            },
            Ok(None) => {}
            Err(e) => tracing::debug!(key = %self.key, error = %e, "slot read failed on reload"),
        }
    }

    fn keeps_closed_cycles(&self, incoming: &CycleCollection) -> bool {
        let theirs = incoming.cycles();
        self.state
            .cycles()
            .iter()
            .filter(|c| c.is_terminal())
            .all(|closed| {
                theirs
                    .binary_search_by_key(&closed.id(), Cycle::id)
                    .is_ok_and(|i| theirs[i] == *closed)
            })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn active_cycle(&self) -> Option<&Cycle> {
        self.state.active_cycle()
    }

    /// All cycles, terminal and active, in creation order.
    pub fn history(&self) -> &[Cycle] {
        self.state.cycles()
    }

    pub fn state(&self) -> &CycleCollection {
        &self.state
    }

    pub fn limits(&self) -> CycleLimits {
        self.limits
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Whether the slot is behind memory after a failed write.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Take the error from the most recent failed write, if any.
    pub fn take_persist_warning(&mut self) -> Option<CoreError> {
        self.persist_warning.take()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn create_cycle(&mut self, task: &str, minutes_amount: u32) -> Result<Cycle> {
        self.create_cycle_at(task, minutes_amount, Utc::now())
    }

    /// Start a new cycle at `now`.
    ///
    /// # Errors
    /// `Validation` for an empty task or out-of-range duration,
    /// `CycleAlreadyActive` if another cycle is running, `IdsExhausted` if no
    /// id can follow the last one.
    pub fn create_cycle_at(
        &mut self,
        task: &str,
        minutes_amount: u32,
        now: DateTime<Utc>,
    ) -> Result<Cycle> {
        let task = self.limits.validate(task, minutes_amount)?;
        if let Some(active) = self.state.active_cycle_id() {
            return Err(CoreError::CycleAlreadyActive { id: active });
        }

        let id = CycleId::next_after(self.state.last_id(), now).ok_or(CoreError::IdsExhausted)?;
        let cycle = Cycle::new(id, task, minutes_amount, now);
        self.state.push_active(cycle.clone());
        tracing::info!(cycle_id = %id, task = cycle.task(), minutes = minutes_amount, "cycle started");

        self.persist();
        Ok(cycle)
    }

    pub fn interrupt_active_cycle(&mut self) -> Result<Cycle> {
        self.interrupt_active_cycle_at(Utc::now())
    }

    /// Mark the active cycle interrupted at `now`.
    ///
    /// # Errors
    /// `NoActiveCycle` if nothing is running.
    pub fn interrupt_active_cycle_at(&mut self, now: DateTime<Utc>) -> Result<Cycle> {
        self.close_active(now, Outcome::Interrupted)
    }

    pub fn finish_active_cycle(&mut self) -> Result<Cycle> {
        self.finish_active_cycle_at(Utc::now())
    }

    /// Mark the active cycle finished at `now`. Only the countdown engine
    /// calls this, once it observes the full duration has elapsed.
    ///
    /// # Errors
    /// `NoActiveCycle` if nothing is running.
    pub fn finish_active_cycle_at(&mut self, now: DateTime<Utc>) -> Result<Cycle> {
        self.close_active(now, Outcome::Finished)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn close_active(&mut self, now: DateTime<Utc>, outcome: Outcome) -> Result<Cycle> {
        let cycle = self
            .state
            .take_active_mut()
            .ok_or(CoreError::NoActiveCycle)?;
        let marked = match outcome {
            Outcome::Finished => cycle.mark_finished(now),
            Outcome::Interrupted => cycle.mark_interrupted(now),
        };
        debug_assert!(marked, "active cycle was already terminal");
        let closed = cycle.clone();
        tracing::info!(cycle_id = %closed.id(), outcome = ?outcome, "cycle closed");

        self.persist();
        Ok(closed)
    }

    fn write_state(&self) -> Result<()> {
        let json = self.state.to_json()?;
        self.slot.write_slot(&self.key, &json)
    }

    fn persist(&mut self) {
        match self.write_state() {
            Ok(()) => self.dirty = false,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to persist cycle state");
                self.dirty = true;
                self.persist_warning = Some(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use super::*;
    use crate::countdown::CountdownEngine;
    use crate::cycle::CycleStatus;
    use crate::storage::Database;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn store() -> CycleStore<Database> {
        CycleStore::open(Database::open_memory().unwrap())
    }

    #[test]
    fn key_carries_schema_version() {
        assert_eq!(state_key(DEFAULT_STATE_KEY_PREFIX), "cycles-state-1.0.0");
        assert_eq!(store().key(), "cycles-state-1.0.0");
    }

    #[test]
    fn create_makes_cycle_active_and_persists() {
        let mut store = store();
        let cycle = store.create_cycle_at("Write report", 25, t0()).unwrap();

        assert_eq!(store.active_cycle(), Some(&cycle));
        assert_eq!(cycle.start_date(), t0());

        let json = store.slot().kv_get(store.key()).unwrap().unwrap();
        let persisted = CycleCollection::from_json(&json).unwrap();
        assert_eq!(&persisted, store.state());
    }

    #[test]
    fn failed_validation_leaves_state_untouched() {
        let mut store = store();
        assert!(store.create_cycle_at("", 10, t0()).is_err());
        assert!(store.history().is_empty());
        assert!(store.slot().kv_get(store.key()).unwrap().is_none());
    }

    #[test]
    fn finish_then_interrupt_is_rejected() {
        let mut store = store();
        store.create_cycle_at("Read", 5, t0()).unwrap();
        let finished = store.finish_active_cycle_at(t0()).unwrap();
        assert!(finished.finished_date().is_some());

        assert!(matches!(
            store.interrupt_active_cycle_at(t0()),
            Err(CoreError::NoActiveCycle)
        ));
        assert_eq!(store.history()[0], finished);
    }

    /// In-memory slot whose writes can be switched off.
    #[derive(Default)]
    struct FlakySlot {
        data: RefCell<HashMap<String, String>>,
        failing: Cell<bool>,
    }

    impl StateSlot for FlakySlot {
        fn read_slot(&self, key: &str) -> Result<Option<String>> {
            Ok(self.data.borrow().get(key).cloned())
        }

        fn write_slot(&self, key: &str, value: &str) -> Result<()> {
            if self.failing.get() {
                return Err(std::io::Error::other("disk full").into());
            }
            self.data.borrow_mut().insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[test]
    fn reload_keeps_unsaved_interrupt() {
        let mut store = CycleStore::open(FlakySlot::default());
        let cycle = store.create_cycle_at("Draft", 1, t0()).unwrap();

        store.slot().failing.set(true);
        store.interrupt_active_cycle_at(t0() + Duration::seconds(10)).unwrap();
        assert!(store.has_unsaved_changes());
        assert!(store.take_persist_warning().is_some());

        store.reload();
        assert!(store.active_cycle().is_none());
        assert_eq!(store.history()[0].status(), CycleStatus::Interrupted);

        let engine = CountdownEngine::default();
        assert_eq!(engine.tick(&mut store, t0() + Duration::seconds(90)).unwrap(), None);
        assert_eq!(store.history()[0].status(), CycleStatus::Interrupted);
        assert_eq!(store.history()[0].id(), cycle.id());

        // Once the slot accepts writes again, reload stores memory first.
        store.slot().failing.set(false);
        store.reload();
        assert!(!store.has_unsaved_changes());
        let json = store.slot().read_slot(store.key()).unwrap().unwrap();
        assert_eq!(&CycleCollection::from_json(&json).unwrap(), store.state());
    }

    #[test]
    fn reload_refuses_to_reopen_closed_cycle() {
        let mut store = CycleStore::open(FlakySlot::default());
        store.create_cycle_at("Draft", 5, t0()).unwrap();
        let stale = store.slot().read_slot(store.key()).unwrap().unwrap();
        store.interrupt_active_cycle_at(t0()).unwrap();

        // Another writer puts back the state from before the interrupt.
        let key = store.key().to_string();
        store.slot().data.borrow_mut().insert(key, stale);
        store.reload();

        assert!(store.active_cycle().is_none());
        assert_eq!(store.history()[0].status(), CycleStatus::Interrupted);
    }

    #[test]
    fn reload_adopts_external_interrupt() {
        let mut store = CycleStore::open(FlakySlot::default());
        store.create_cycle_at("Shared", 5, t0()).unwrap();

        let mut other = store.state().clone();
        other.take_active_mut().unwrap().mark_interrupted(t0());
        let key = store.key().to_string();
        store.slot().data.borrow_mut().insert(key, other.to_json().unwrap());
        store.reload();

        assert!(store.active_cycle().is_none());
        assert_eq!(store.state(), &other);
    }

    #[test]
    fn create_fails_when_ids_are_exhausted() {
        let slot = FlakySlot::default();
        slot.data.borrow_mut().insert(
            state_key(DEFAULT_STATE_KEY_PREFIX),
            r#"{"cycles":[{"id":9223372036854775806,"task":"x","minutes_amount":5,
                "start_date":"2024-03-01T09:00:00Z","interrupted_date":"2024-03-01T09:01:00Z"}],
                "active_cycle_id":null}"#
                .to_string(),
        );
        let mut store = CycleStore::open(slot);
        assert_eq!(store.history().len(), 1);

        assert!(matches!(
            store.create_cycle_at("y", 5, t0()),
            Err(CoreError::IdsExhausted)
        ));
        assert_eq!(store.history().len(), 1);
        assert!(store.active_cycle().is_none());
    }

    #[test]
    fn consecutive_cycles_get_increasing_ids() {
        let mut store = store();
        let a = store.create_cycle_at("a", 5, t0()).unwrap();
        store.interrupt_active_cycle_at(t0()).unwrap();
        let b = store.create_cycle_at("b", 5, t0()).unwrap();
        assert!(b.id() > a.id());
        assert!(store.state().is_consistent());
    }
}

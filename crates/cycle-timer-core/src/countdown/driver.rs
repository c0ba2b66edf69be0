//! Periodic countdown driver.
//!
//! A driver is a tokio task ticking on a fixed interval. It is owned through
//! a [`DriverHandle`]: cancelling consumes the handle, and dropping it aborts
//! the task, so a driver can never outlive its owner.
//!
//! [`CountdownDriver`] keeps at most one driver alive and points it at the
//! store's current active cycle. Moving to a different cycle always cancels
//! the previous driver before the new one starts.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::engine::CountdownEngine;
use crate::clock::{Clock, SystemClock};
use crate::cycle::{Cycle, CycleId, CycleStore};
use crate::events::Event;
use crate::storage::StateSlot;

pub type SharedStore<S> = Arc<Mutex<CycleStore<S>>>;

pub type EventObserver = Arc<dyn Fn(&Event) + Send + Sync>;

/// Lock the shared store. A panic inside a previous holder does not leave the
/// aggregate half-written (transitions are single assignments), so poisoning
/// is ignored.
pub fn lock_store<S: StateSlot>(store: &Mutex<CycleStore<S>>) -> MutexGuard<'_, CycleStore<S>> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancellation handle for a running driver.
#[derive(Debug)]
pub struct DriverHandle {
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Stop the driver. Consumes the handle, so this happens at most once.
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the driver stops on its own or is aborted.
    pub async fn join(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Call `on_tick` every `period` (first call after one period) until it
/// returns `Break`.
///
/// # Panics
/// Must be called from within a tokio runtime.
pub fn start_driver<F>(period: Duration, mut on_tick: F) -> DriverHandle
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        // After a suspension, one catch-up tick is enough: elapsed time is
        // recomputed from the wall clock anyway.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if on_tick().is_break() {
                break;
            }
        }
    });
    DriverHandle { task }
}

/// Keeps a single driver attached to the store's active cycle.
pub struct CountdownDriver<S: StateSlot + Send + 'static> {
    store: SharedStore<S>,
    engine: CountdownEngine,
    period: Duration,
    clock: Arc<dyn Clock>,
    observer: EventObserver,
    reload_each_tick: bool,
    current: Option<(CycleId, DriverHandle)>,
}

impl<S: StateSlot + Send + 'static> CountdownDriver<S> {
    pub fn new(store: SharedStore<S>, engine: CountdownEngine, period: Duration) -> Self {
        Self {
            store,
            engine,
            period,
            clock: Arc::new(SystemClock),
            observer: Arc::new(|_: &Event| {}),
            reload_each_tick: false,
            current: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Receive every tick and the final `CycleFinished` event.
    pub fn on_event<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    /// Re-read the durable slot before each tick, so transitions written by
    /// another process (e.g. an interrupt) are picked up.
    pub fn reload_each_tick(mut self, reload: bool) -> Self {
        self.reload_each_tick = reload;
        self
    }

    pub fn store(&self) -> &SharedStore<S> {
        &self.store
    }

    /// Cycle currently being driven, if its driver is still alive.
    pub fn driving(&self) -> Option<CycleId> {
        self.current
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| *id)
    }

    /// Align the driver with the store's active cycle: start one for a newly
    /// active cycle, replace one driving a stale cycle, stop it when idle.
    pub fn sync(&mut self) -> Option<CycleId> {
        let active = lock_store(&self.store).active_cycle().map(Cycle::id);
        match active {
            Some(id) if self.driving() == Some(id) => {}
            Some(id) => {
                self.stop();
                tracing::debug!(cycle_id = %id, "starting countdown driver");
                let handle = self.spawn_for(id);
                self.current = Some((id, handle));
            }
            None => self.stop(),
        }
        self.driving()
    }

    /// Cancel the current driver, if any.
    pub fn stop(&mut self) {
        if let Some((id, handle)) = self.current.take() {
            tracing::debug!(cycle_id = %id, "stopping countdown driver");
            handle.cancel();
        }
    }

    /// Wait for the current driver to stop on its own (completion, or the
    /// cycle leaving the active slot). Returns immediately when idle.
    pub async fn stopped(&mut self) {
        if let Some((_, handle)) = self.current.take() {
            handle.join().await;
        }
    }

    fn spawn_for(&self, id: CycleId) -> DriverHandle {
        let store = Arc::clone(&self.store);
        let engine = self.engine.clone();
        let clock = Arc::clone(&self.clock);
        let observer = Arc::clone(&self.observer);
        let reload = self.reload_each_tick;

        start_driver(self.period, move || {
            let mut guard = lock_store(&store);
            if reload {
                guard.reload();
            }
            if guard.active_cycle().map(Cycle::id) != Some(id) {
                tracing::debug!(cycle_id = %id, "driven cycle is no longer active");
                return ControlFlow::Break(());
            }

            let ticked = engine.tick(&mut *guard, clock.now());
            drop(guard);
            match ticked {
                Ok(Some(event)) => {
                    observer(&event);
                    if event.is_terminal() {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                }
                Ok(None) => ControlFlow::Break(()),
                Err(e) => {
                    tracing::error!(cycle_id = %id, error = %e, "countdown tick failed");
                    ControlFlow::Break(())
                }
            }
        })
    }
}

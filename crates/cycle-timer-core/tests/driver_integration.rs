//! Integration tests for the countdown driver on a paused tokio clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use cycle_timer_core::countdown::lock_store;
use cycle_timer_core::{
    Clock, CountdownDriver, CountdownEngine, CycleStore, Database, Event, SharedStore,
};

struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn new(at: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(at)))
    }

    fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn secs(n: i64) -> chrono::Duration {
    chrono::Duration::seconds(n)
}

fn setup() -> (
    SharedStore<Database>,
    Arc<ManualClock>,
    Arc<Mutex<Vec<Event>>>,
    CountdownDriver<Database>,
) {
    let store: SharedStore<Database> = Arc::new(Mutex::new(CycleStore::open(
        Database::open_memory().unwrap(),
    )));
    let clock = ManualClock::new(t0());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let driver = CountdownDriver::new(
        Arc::clone(&store),
        CountdownEngine::default(),
        Duration::from_secs(1),
    )
    .with_clock(clock.clone())
    .on_event(move |event| sink.lock().unwrap().push(event.clone()));
    (store, clock, events, driver)
}

#[tokio::test(start_paused = true)]
async fn driver_finishes_cycle_once() {
    let (store, clock, events, mut driver) = setup();
    let cycle = lock_store(&store).create_cycle_at("Stretch", 1, t0()).unwrap();
    assert_eq!(driver.sync(), Some(cycle.id()));

    clock.set(t0() + secs(30));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    {
        let seen = events.lock().unwrap();
        assert!(matches!(
            seen.last(),
            Some(Event::CountdownTick { remaining_seconds: 30, .. })
        ));
    }

    clock.set(t0() + secs(61));
    driver.stopped().await;

    let seen = events.lock().unwrap();
    let finished: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, Event::CycleFinished { .. }))
        .collect();
    assert_eq!(finished.len(), 1);

    let store = lock_store(&store);
    assert!(store.active_cycle().is_none());
    assert_eq!(store.history()[0].finished_date(), Some(t0() + secs(61)));
}

#[tokio::test(start_paused = true)]
async fn new_cycle_replaces_previous_driver() {
    let (store, clock, events, mut driver) = setup();
    let first = lock_store(&store).create_cycle_at("First", 5, t0()).unwrap();
    driver.sync();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    lock_store(&store).interrupt_active_cycle_at(t0() + secs(1)).unwrap();
    let second = lock_store(&store)
        .create_cycle_at("Second", 5, t0() + secs(1))
        .unwrap();
    assert_eq!(driver.sync(), Some(second.id()));
    events.lock().unwrap().clear();

    clock.set(t0() + secs(3));
    // New driver ticks at 2.5s, 3.5s and 4.5s.
    tokio::time::sleep(Duration::from_millis(3200)).await;

    let seen = events.lock().unwrap();
    assert_eq!(seen.len(), 3, "exactly one driver ticks per second");
    assert!(seen.iter().all(|e| matches!(
        e,
        Event::CountdownTick { cycle_id, .. } if *cycle_id == second.id()
    )));
    assert!(seen.iter().all(|e| !matches!(
        e,
        Event::CountdownTick { cycle_id, .. } if *cycle_id == first.id()
    )));
}

#[tokio::test(start_paused = true)]
async fn dropping_driver_cancels_ticks() {
    let (store, _clock, events, mut driver) = setup();
    lock_store(&store).create_cycle_at("Teardown", 5, t0()).unwrap();
    driver.sync();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    drop(driver);
    let count = events.lock().unwrap().len();
    assert_eq!(count, 2);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(events.lock().unwrap().len(), count);
    assert!(lock_store(&store).active_cycle().is_some());
}

#[tokio::test(start_paused = true)]
async fn reload_picks_up_external_interrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cycles.db");
    let store: SharedStore<Database> = Arc::new(Mutex::new(CycleStore::open(
        Database::open_at(&path).unwrap(),
    )));
    lock_store(&store).create_cycle_at("Shared", 5, t0()).unwrap();

    let mut driver = CountdownDriver::new(
        Arc::clone(&store),
        CountdownEngine::default(),
        Duration::from_secs(1),
    )
    .with_clock(ManualClock::new(t0()))
    .reload_each_tick(true);
    driver.sync();

    // Another process interrupts through its own connection.
    let mut other = CycleStore::open(Database::open_at(&path).unwrap());
    other.interrupt_active_cycle_at(t0() + secs(2)).unwrap();

    driver.stopped().await;
    let store = lock_store(&store);
    assert!(store.active_cycle().is_none());
    assert_eq!(store.history()[0].interrupted_date(), Some(t0() + secs(2)));
}

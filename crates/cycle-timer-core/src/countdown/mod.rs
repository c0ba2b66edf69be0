mod driver;
mod engine;

pub use driver::{lock_store, start_driver, CountdownDriver, DriverHandle, EventObserver, SharedStore};
pub use engine::{
    compute_remaining, elapsed_seconds, evaluate, indicator_label, CountdownEngine, Remaining,
    TickResult,
};

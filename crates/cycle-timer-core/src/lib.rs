//! # Cycle Timer Core Library
//!
//! Core logic for a single-active work cycle timer: a user names a task,
//! picks a duration, and the cycle either runs to completion or is
//! interrupted. History survives restarts.
//!
//! ## Architecture
//!
//! - **Cycle Store**: owns the cycle aggregate, enforces that at most one
//!   cycle is active, and persists after every transition
//! - **Countdown Engine**: wall-clock-based; recomputes remaining time from
//!   the cycle's start on every tick and finishes the cycle when time is up
//! - **Driver**: a cancellable one-second tokio interval feeding the engine
//! - **Storage**: SQLite key-value slot for state and TOML configuration
//!
//! ## Key Components
//!
//! - [`CycleStore`]: cycle lifecycle state machine
//! - [`CountdownEngine`]: remaining-time computation and completion
//! - [`CountdownDriver`]: periodic driver bound to the active cycle
//! - [`Database`]: durable state slot
//! - [`Config`]: application configuration

pub mod clock;
pub mod countdown;
pub mod cycle;
pub mod error;
pub mod events;
pub mod storage;

pub use clock::{Clock, SystemClock};
pub use countdown::{
    compute_remaining, CountdownDriver, CountdownEngine, DriverHandle, Remaining, SharedStore,
    TickResult,
};
pub use cycle::{Cycle, CycleCollection, CycleId, CycleLimits, CycleStatus, CycleStore, HistorySummary};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use storage::{Config, Database, StateSlot};

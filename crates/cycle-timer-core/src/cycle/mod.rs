mod history;
mod model;
mod state;
mod store;

pub use history::HistorySummary;
pub use model::{Cycle, CycleId, CycleLimits, CycleStatus, MAX_CYCLE_MINUTES};
pub use state::CycleCollection;
pub use store::{state_key, CycleStore, DEFAULT_STATE_KEY_PREFIX, SCHEMA_VERSION};

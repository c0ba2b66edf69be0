pub mod config;
pub mod cycle;
pub mod history;

use cycle_timer_core::{Config, CycleStore, Database};
use serde::Serialize;

/// Open the cycle store over the default database with configured limits.
pub fn open_store(config: &Config) -> Result<CycleStore<Database>, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    Ok(CycleStore::open_with(
        db,
        config.limits()?,
        &config.storage.state_key_prefix,
    ))
}

/// State writes never fail a command; tell the user the change was not saved.
pub fn report_persist_warning(store: &mut CycleStore<Database>) {
    if let Some(e) = store.take_persist_warning() {
        eprintln!("warning: cycle state was not saved: {e}");
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

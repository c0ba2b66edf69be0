use chrono::Local;
use clap::Subcommand;
use cycle_timer_core::{Config, Cycle, CycleStatus, HistorySummary};
use serde::Serialize;

use super::{open_store, print_json};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List every cycle, oldest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Counts per outcome
    Summary,
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    #[serde(flatten)]
    cycle: &'a Cycle,
    status: CycleStatus,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = open_store(&config)?;

    match action {
        HistoryAction::List { json: true } => {
            let rows: Vec<_> = store
                .history()
                .iter()
                .map(|cycle| HistoryRow {
                    cycle,
                    status: cycle.status(),
                })
                .collect();
            print_json(&rows)?;
        }
        HistoryAction::List { json: false } => {
            if store.history().is_empty() {
                println!("no cycles yet");
                return Ok(());
            }
            println!("{:<30} {:>8}  {:<16}  {}", "TASK", "MINUTES", "STARTED", "STATUS");
            for cycle in store.history() {
                println!(
                    "{:<30} {:>8}  {:<16}  {}",
                    truncate(cycle.task(), 30),
                    cycle.minutes_amount(),
                    cycle
                        .start_date()
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M"),
                    cycle.status()
                );
            }
        }
        HistoryAction::Summary => {
            print_json(&HistorySummary::from_cycles(store.history()))?;
        }
    }
    Ok(())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use clap::Subcommand;
use cycle_timer_core::countdown::lock_store;
use cycle_timer_core::{
    Config, CountdownDriver, CountdownEngine, CycleStore, Database, Event, SharedStore,
};

use super::{open_store, print_json, report_persist_warning};

#[derive(Subcommand)]
pub enum CycleAction {
    /// Start a new cycle
    Start {
        /// What you are working on
        task: String,
        /// Cycle length in minutes
        #[arg(short, long)]
        minutes: u32,
    },
    /// Interrupt the running cycle
    Interrupt,
    /// Print current state as JSON
    Status,
    /// Follow the running cycle until it ends (Ctrl-C stops watching)
    Watch {
        /// Stream events as JSON lines instead of the title
        #[arg(long)]
        json: bool,
    },
}

/// Finish the active cycle if its time ran out while nobody was ticking.
fn settle(
    engine: &CountdownEngine,
    store: &mut CycleStore<Database>,
) -> Result<Option<Event>, Box<dyn std::error::Error>> {
    match engine.tick(store, Utc::now())? {
        Some(event) if event.is_terminal() => Ok(Some(event)),
        _ => Ok(None),
    }
}

pub fn run(action: CycleAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut store = open_store(&config)?;
    let engine = CountdownEngine::new(config.countdown.idle_title.clone());

    if let Some(event) = settle(&engine, &mut store)? {
        print_json(&event)?;
    }

    let result = match action {
        CycleAction::Start { task, minutes } => store
            .create_cycle(&task, minutes)
            .map_err(Into::into)
            .and_then(|cycle| print_json(&Event::cycle_created(&cycle))),
        CycleAction::Interrupt => store
            .interrupt_active_cycle()
            .map_err(Into::into)
            .and_then(|cycle| match Event::cycle_closed(&cycle) {
                Some(event) => print_json(&event),
                None => Ok(()),
            }),
        CycleAction::Status => print_json(&engine.snapshot(&store, Utc::now())),
        CycleAction::Watch { json } => {
            report_persist_warning(&mut store);
            return watch(store, engine, config.tick_interval(), json);
        }
    };

    report_persist_warning(&mut store);
    result
}

fn print_event(event: &Event, json: bool, idle_title: &str) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!(error = %e, "failed to encode event"),
        }
        return;
    }
    match event {
        Event::CountdownTick { title, .. } => println!("{title}"),
        Event::CycleFinished { .. } => println!("{idle_title} - cycle finished"),
        Event::CycleInterrupted { .. } => println!("{idle_title} - cycle interrupted"),
        _ => {}
    }
}

fn watch(
    store: CycleStore<Database>,
    engine: CountdownEngine,
    period: Duration,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let initial = engine.snapshot(&store, Utc::now());
    let idle_title = engine.idle_title().to_string();
    let shared: SharedStore<Database> = Arc::new(Mutex::new(store));

    runtime.block_on(async {
        let title = idle_title.clone();
        let mut driver = CountdownDriver::new(Arc::clone(&shared), engine, period)
            .reload_each_tick(true)
            .on_event(move |event| print_event(event, json, &title));

        match &initial {
            Event::StateSnapshot {
                active_cycle: Some(_),
                title,
                ..
            } if !json => println!("{title}"),
            snapshot if json => print_event(snapshot, true, &idle_title),
            _ => {}
        }

        if driver.sync().is_none() {
            if !json {
                println!("{idle_title}");
            }
            return;
        }

        let ended = tokio::select! {
            _ = driver.stopped() => true,
            _ = tokio::signal::ctrl_c() => false,
        };
        if !ended {
            driver.stop();
            eprintln!("stopped watching; the cycle is still running");
            return;
        }

        // Interrupts written by another process end the driver without an
        // engine event.
        let closed = lock_store(&shared)
            .history()
            .last()
            .and_then(Event::cycle_closed);
        if let Some(event @ Event::CycleInterrupted { .. }) = closed {
            print_event(&event, json, &idle_title);
        }
    });

    report_persist_warning(&mut lock_store(&shared));
    Ok(())
}

//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `tempo_core` linkage without the Flutter/FFI runtime.
//! - Seed a throwaway in-memory workspace and print its weekly report.

use chrono::Days;
use std::process::ExitCode;
use std::sync::Arc;
use tempo_core::seed::SeedOptions;
use tempo_core::{CoreConfig, SystemClock, TempoWorkspace};

const DEMO_USER: &str = "demo-user";
const DEMO_SEED: u64 = 7;

fn main() -> ExitCode {
    println!("tempo_core ping={}", tempo_core::ping());
    println!("tempo_core version={}", tempo_core::core_version());

    match run_demo() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("demo failed: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> Result<(), String> {
    let workspace = TempoWorkspace::open_in_memory(CoreConfig::default(), Arc::new(SystemClock))
        .map_err(|err| err.to_string())?;
    workspace
        .auth()
        .sign_in(DEMO_USER)
        .map_err(|err| err.to_string())?;

    let seeded = workspace
        .seeder()
        .seed_history(&SeedOptions {
            days: 7,
            rng_seed: Some(DEMO_SEED),
            ..SeedOptions::default()
        })
        .map_err(|err| err.to_string())?;
    println!(
        "seeded days={} tasks={} completed={} sessions={}",
        seeded.days, seeded.tasks_created, seeded.tasks_completed, seeded.sessions_created
    );

    let today = workspace.clock().today();
    let start = today.checked_sub_days(Days::new(7)).unwrap_or(today);
    let report = workspace.analytics(start, today);
    for day in &report.daily {
        println!("{} focus_minutes={}", day.date, day.focus_minutes);
    }
    println!(
        "total focus_minutes={} work_sessions={} completion_rate={:.2}",
        report.total_focus_minutes, report.total_work_sessions, report.completion_rate
    );
    for category in &report.categories {
        println!(
            "category {} total={} completed={}",
            category.category, category.total, category.completed
        );
    }
    Ok(())
}

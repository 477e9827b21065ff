//! Prints the next times a cron expression matches, starting from now.
//!
//! Set `RUST_LOG=minicron=trace` to watch the search.

use chrono::Utc;
use minicron::{Error, Schedule};
use tracing_subscriber::EnvFilter;

const DEFAULT_COUNT: usize = 10;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let count = match args.get(2).map(|s| s.parse::<usize>()).transpose() {
        Ok(count) => count.unwrap_or(DEFAULT_COUNT),
        Err(err) => {
            println!("Invalid count: {}", err);
            return;
        }
    };

    match args.get(1) {
        Some(expression) => {
            if let Err(err) = print_times(expression, count) {
                println!("{}", err);
            }
        }
        None => println!("Usage: cargo run --example future-times -- \"[cron expression]\" [count]"),
    }
}

fn print_times(expression: &str, count: usize) -> Result<(), Error> {
    let schedule = Schedule::parse(expression, Utc)?;

    let mut last = Utc::now();
    for _ in 0..count {
        let time = schedule.next(&last)?;
        if !schedule.contains(&time) {
            println!("Failed check! Schedule does not contain {}.", time);
            break;
        }
        println!("{}", time.format("%F %R"));
        last = time;
    }

    Ok(())
}

use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{self, cargo, test_summary, OnFailure};

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    if !integration_only {
        let output = step::run(
            "Unit tests",
            &mut cargo(&["test", "--lib", "-p", "dae", "-p", "firmware", "--features", "firmware/emulator"]),
            OnFailure::Abort,
        )?;
        if let Some(output) = output {
            println!("    {}", test_summary(&output).dimmed());
        }
    }

    if !unit_only {
        let output = step::run(
            "Integration tests",
            &mut cargo(&["test", "--tests", "-p", "dae", "-p", "firmware"]),
            OnFailure::Abort,
        )?;
        if let Some(output) = output {
            println!("    {}", test_summary(&output).dimmed());
        }
    }

    step::run(
        "Doc tests",
        &mut cargo(&["test", "--doc", "-p", "dae"]),
        OnFailure::Warn,
    )?;

    println!(
        "{}",
        format!(
            "✓ All tests completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}

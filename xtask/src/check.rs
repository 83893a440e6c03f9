use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{self, cargo, OnFailure, TARGET};

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking firmware builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    step::run(
        "Hardware target (STM32F411)",
        &mut cargo(&["check", "-p", "firmware", "--target", TARGET, "--features", "hardware"]),
        OnFailure::Abort,
    )?;
    step::run(
        "Emulator target (host)",
        &mut cargo(&["check", "-p", "firmware", "--features", "emulator", "--all-targets"]),
        OnFailure::Abort,
    )?;
    // The engine core must stay no_std on its own, without firmware features.
    step::run(
        "dae crate (no_std)",
        &mut cargo(&["check", "-p", "dae", "--target", TARGET]),
        OnFailure::Abort,
    )?;
    step::run(
        "Clippy",
        &mut cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"]),
        OnFailure::Warn,
    )?;
    if step::run("Formatting", &mut cargo(&["fmt", "--all", "--check"]), OnFailure::Warn)?.is_none() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}

use anyhow::{Context, Result};
use colored::Colorize;

use crate::step::cargo;

/// Run the simulator in the foreground so its output streams to the terminal.
pub fn run(realtime: bool, blocks: u32) -> Result<()> {
    println!();
    println!("{}", "🎹 Starting simulator...".cyan().bold());
    println!();

    let blocks = blocks.to_string();
    let mut cmd = cargo(&[
        "run",
        "-p",
        "firmware",
        "--example",
        "simulator",
        "--features",
        "emulator",
        "--",
        "--blocks",
        &blocks,
    ]);
    if realtime {
        cmd.arg("--realtime");
    }

    let status = cmd.status().context("Failed to run cargo")?;
    if !status.success() {
        anyhow::bail!("Simulator exited with {status}");
    }
    Ok(())
}

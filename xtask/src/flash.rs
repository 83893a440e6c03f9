use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;

use crate::step::{self, cargo, OnFailure, CHIP, TARGET};

pub fn run(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };
    let binary = format!("target/{TARGET}/{mode}/firmware");

    println!();
    println!(
        "{}",
        format!("🔨 Building firmware ({mode} mode)...").cyan().bold()
    );
    println!();

    let mut build = cargo(&["build", "-p", "firmware", "--target", TARGET, "--features", "hardware"]);
    if release {
        build.arg("--release");
    }
    step::run("Build", &mut build, OnFailure::Abort)?;

    show_binary_size(&binary);

    println!("{}", format!("📡 Flashing to {CHIP}...").cyan().bold());
    println!("   {}", "Connecting to probe...".dimmed());

    // `probe-rs run` flashes, resets and then streams defmt/RTT until Ctrl-C.
    let status = Command::new("probe-rs")
        .args(["run", "--chip", CHIP, "--probe-index", "0", &binary])
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !status.success() {
        anyhow::bail!("Flash failed - check that the probe is connected and the board is powered");
    }
    Ok(())
}

fn show_binary_size(binary: &str) {
    let output = Command::new("rust-size").args([binary, "-A"]).output();

    match output {
        Ok(out) if out.status.success() => {
            println!("{}", "📊 Binary size:".cyan());
            for line in String::from_utf8_lossy(&out.stdout).lines() {
                println!("   {}", line.dimmed());
            }
            println!();
        }
        _ => println!("   {}", "rust-size not found; skipping size report".dimmed()),
    }
}

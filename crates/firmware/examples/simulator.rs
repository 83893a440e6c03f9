//! SynthCore desktop simulator
//!
//! Runs the audio engine against a simulated DMA interrupt and a scripted
//! MIDI performance, then prints what came out.
//!
//! Run with: cargo run -p firmware --example simulator --features emulator -- --realtime
//! Verbose MIDI trace: RUST_LOG=debug cargo run ...

#![allow(clippy::print_stdout)]

use clap::Parser;
use dae::config::{APP_NAME, APP_VERSION, BLOCK_SIZE};
use dae::{EngineConfig, MidiChannel};
use firmware::simulator::{init_tracing, run_offline, run_realtime, SimConfig, SimReport};

/// Simulate the SynthCore audio engine on the desktop.
#[derive(Parser, Debug)]
#[command(name = "simulator", version, about)]
struct Args {
    /// Blocks to render.
    #[arg(long, default_value_t = 400)]
    blocks: u32,

    /// Pace DMA notifications at the real block rate instead of as fast as possible.
    #[arg(long)]
    realtime: bool,

    /// Output sample rate in Hz.
    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,

    /// MIDI channel to listen on (1-16), or 0 for omni.
    #[arg(long, default_value_t = 1)]
    channel: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let engine = EngineConfig::with_sample_rate(args.sample_rate).map_err(|e| e.to_string())?;
    let channel = match args.channel {
        0 => MidiChannel::Omni,
        n => MidiChannel::new(n).map_err(|e| e.to_string())?,
    };
    let config = SimConfig {
        engine,
        blocks: args.blocks,
        channel,
        ..SimConfig::default()
    };

    println!("{APP_NAME} v{APP_VERSION} - Simulator");
    println!(
        "{} Hz, {} frames/block, {} us/block, {} blocks ({})\n",
        engine.sample_rate.get(),
        BLOCK_SIZE,
        engine.block_period_us(BLOCK_SIZE),
        config.blocks,
        if args.realtime { "real time" } else { "offline" }
    );

    let report = if args.realtime {
        run_realtime(&config).await
    } else {
        run_offline(&config)
    }
    .map_err(|e| e.to_string())?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &SimReport) {
    let stats = &report.stats;
    println!("Blocks rendered:  {}", report.blocks);
    println!("MIDI messages:    {}", stats.midi_messages);
    println!("  filtered:       {}", stats.filtered);
    println!("  malformed:      {}", stats.malformed);
    println!("  dropped:        {}", stats.dropped);
    println!("Overruns:         {}", stats.overruns);
    println!("Peak level:       {:.3}", report.level.peak());
    println!("RMS level:        {:.3}", report.level.rms());
}

//! SynthCore firmware: board layer for the digital audio engine.
//!
//! Connects the [`dae`] core to an STM32F411CE blackpill: I2S2 audio out
//! through circular DMA, MIDI in on USART1, and the clock tree behind both.
//! The same engine also runs on the desktop against simulated hardware.
//!
//! # Architecture
//!
//! ```text
//! Application (main.rs: tasks, interrupt handlers)
//!         ↓
//! Board layer (audio::i2s, midi, boot, pins)
//!         ↓
//! Register words + clock math (registers, audio::clock_math), host-tested
//!         ↓
//! stm32-metapac
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the STM32F411 target (embassy executor, defmt)
//! - `emulator` - Build the desktop simulator (tokio, tracing)
//! - `std` - Enable standard library (for emulator and testing)
//!
//! # Examples
//!
//! ## Hardware Target
//!
//! ```bash
//! cargo run --release -p firmware --target thumbv7em-none-eabihf --features hardware
//! ```
//!
//! ## Emulator Target
//!
//! ```bash
//! cargo run -p firmware --example simulator --features emulator -- --realtime
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline (allow println in tests via clippy.toml)
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
// Pedantic lints too noisy for firmware application code:
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::similar_names)]

pub mod audio;
pub mod boot;
pub mod exception_handlers;
pub mod midi;
pub mod pins;
pub mod registers;
pub mod telemetry;

#[cfg(feature = "emulator")]
pub mod simulator;

pub use audio::MockAudioOutput;
pub use boot::BootError;
pub use telemetry::{StatsDelta, StatsThrottle};

#[cfg(feature = "hardware")]
pub use audio::I2sDmaOutput;

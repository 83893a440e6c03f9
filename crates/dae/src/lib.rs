//! Digital Audio Engine (DAE): real-time core of the SynthCore synthesizer.
//!
//! Produces stereo audio blocks into a double-buffered circular DMA buffer
//! while ingesting MIDI from a UART interrupt, with no allocation and no
//! locks on the interrupt side.
//!
//! # Data flow
//!
//! ```text
//! UART RX ISR ──► MidiQueue ──► MidiParser ──► AudioSource::handle_midi
//!                  (SPSC)        (task)
//!
//! DMA HT/TC ISR ──► BufferReady ──► Dae::run_iteration ──► AudioSource::process_block
//!                   (Signal)         (task)                        │
//!                                                                  ▼
//!                                     OutputBuffer::select_writable_half ──► I2S
//! ```
//!
//! # Ownership
//!
//! Everything shared between interrupts and the task lives in one
//! [`DaeState`]. [`DaeState::split`] turns it into interrupt handles
//! ([`IsrHandles`]) and task handles ([`TaskHandles`]); the latter are moved
//! into [`Dae::start`]. Hardware drivers implement [`AudioOutput`]; synthesis
//! algorithms implement [`AudioSource`].
//!
//! # Features
//!
//! - `defmt`: derive `defmt::Format` on public types for on-target logging
//!
//! # Example
//!
//! ```no_run
//! use dae::{Dae, DaeState, EngineConfig, TestTone, AudioOutput, SampleRateHz};
//!
//! struct Board;
//! impl AudioOutput for Board {
//!     fn start_audio(&mut self, _buffer: &mut [i16], _rate: SampleRateHz) {}
//! }
//!
//! async fn audio_task(state: &'static mut DaeState<128, 256>) {
//!     let (_isr, task) = state.split();
//!     let Ok(mut dae) = Dae::start(task, TestTone::default(), EngineConfig::default(), &mut Board)
//!     else {
//!         return;
//!     };
//!     loop {
//!         let _report = dae.run_iteration().await;
//!     }
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this real-time core:
#![allow(clippy::doc_markdown)] // hex values and register names in doc comments
#![allow(clippy::must_use_candidate)] // accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod double_buffer;
pub mod error;
pub mod handoff;
pub mod midi;
pub mod output;
pub mod scheduler;
pub mod source;
pub mod state;

pub use config::{EngineConfig, SampleRateHz};
pub use double_buffer::{BufferView, Half, OutputBuffer};
pub use error::ConfigError;
pub use handoff::{BufferReady, Notification};
pub use midi::{MessageKind, MidiChannel, MidiMessage, MidiParser, MidiQueue};
pub use output::AudioOutput;
pub use scheduler::{Dae, EngineStats, IterationReport, Phase};
pub use source::{AudioSource, TestTone};
pub use state::{DaeState, DmaIrq, IsrHandles, TaskHandles, UartIrq};

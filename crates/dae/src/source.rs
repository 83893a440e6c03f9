//! Pluggable audio source: the synthesis algorithm behind the engine.
//!
//! The engine drives a source through three calls:
//!
//! 1. [`prepare`](AudioSource::prepare) once at startup,
//! 2. [`handle_midi`](AudioSource::handle_midi) for every message received
//!    since the previous block,
//! 3. [`process_block`](AudioSource::process_block) once per block.
//!
//! MIDI is applied at block boundaries, so timing resolution is one block
//! (2.67 ms at 128 frames / 48 kHz), not one sample.

use crate::midi::{MidiChannel, MidiMessage};

/// A block-based stereo generator.
///
/// All methods run on the audio task inside the block deadline: no blocking,
/// no allocation.
pub trait AudioSource {
    /// Called once before the first block. Returns the channel the source
    /// listens on; channel-voice messages on other channels are not delivered.
    fn prepare(&mut self, sample_rate: f32, block_size: usize) -> MidiChannel;

    /// Fill one block. `left` and `right` have the same length (the block
    /// size); samples are in `[-1.0, 1.0]`.
    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]);

    /// React to one complete message. Default: ignore.
    fn handle_midi(&mut self, message: MidiMessage) {
        let _ = message;
    }
}

impl<S: AudioSource + ?Sized> AudioSource for &mut S {
    fn prepare(&mut self, sample_rate: f32, block_size: usize) -> MidiChannel {
        (**self).prepare(sample_rate, block_size)
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        (**self).process_block(left, right);
    }

    fn handle_midi(&mut self, message: MidiMessage) {
        (**self).handle_midi(message);
    }
}

// ── TestTone ─────────────────────────────────────────────────────────────────

/// 440 Hz sine on both channels, the power-on default source.
///
/// Uses a parabolic sine approximation (no `libm`), accurate to ~0.1 %.
#[derive(Debug, Clone)]
pub struct TestTone {
    frequency: f32,
    phase: f32,
    increment: f32,
}

impl TestTone {
    /// Concert A.
    pub const DEFAULT_FREQUENCY: f32 = 440.0;

    const B: f32 = 1.273_239_5;
    const C: f32 = -0.405_284_73;
    const P: f32 = 0.225;

    /// A tone at `frequency` Hz. Silent until [`prepare`](AudioSource::prepare).
    #[must_use]
    pub const fn new(frequency: f32) -> Self {
        Self {
            frequency,
            phase: 0.0,
            increment: 0.0,
        }
    }

    /// Tone frequency in Hz.
    #[must_use]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Parabolic sine of `angle` in `[-π, π]`.
    #[must_use]
    pub fn fast_sin(angle: f32) -> f32 {
        let y = Self::B * angle + Self::C * angle * angle.abs();
        Self::P * (y * y.abs() - y) + y
    }

    fn next_sample(&mut self) -> f32 {
        // Map phase [0, 1) onto angle (π, -π].
        let angle = -(self.phase * 2.0 * core::f32::consts::PI - core::f32::consts::PI);
        let sample = Self::fast_sin(angle);
        self.phase += self.increment;
        if self.phase > 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

impl Default for TestTone {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FREQUENCY)
    }
}

impl AudioSource for TestTone {
    fn prepare(&mut self, sample_rate: f32, _block_size: usize) -> MidiChannel {
        self.phase = 0.0;
        self.increment = if sample_rate > 0.0 {
            self.frequency / sample_rate
        } else {
            0.0
        };
        MidiChannel::Omni
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let sample = self.next_sample();
            *l = sample;
            *r = sample;
        }
    }
}

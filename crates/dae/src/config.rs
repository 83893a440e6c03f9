//! Engine configuration and compile-time sizing constants.
//!
//! Buffer sizes are fixed at compile time: nothing in the engine allocates,
//! and every buffer is statically owned for the process lifetime.
//!
//! # Output buffer layout
//!
//! ```text
//! OUTPUT_BUFFER_WORDS = 2 halves × BLOCK_SIZE frames × WORDS_PER_FRAME
//!                     = 2 × 128 × 4 = 1024 i16 words
//!
//! ├── Half A (words 0..512):    hardware reads while the task fills B
//! └── Half B (words 512..1024): hardware reads while the task fills A
//! ```
//!
//! At 48 kHz one block of 128 frames lasts 2.67 ms. That is the hard deadline
//! for draining MIDI, rendering and packing one half.

use crate::error::ConfigError;

/// Application name used in startup banners.
pub const APP_NAME: &str = "SynthCore DAE";

/// Application version (synchronized with Cargo.toml).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default output sample rate in Hz.
pub const SAMPLE_RATE_HZ: u32 = 48_000;

/// Frames per audio block (and per output-buffer half).
pub const BLOCK_SIZE: usize = 128;

/// 16-bit words per stereo frame: 32-bit right then 32-bit left, each split
/// into high and low halves.
pub const WORDS_PER_FRAME: usize = 4;

/// Total length of the circular DMA buffer in 16-bit words.
pub const OUTPUT_BUFFER_WORDS: usize = 2 * BLOCK_SIZE * WORDS_PER_FRAME;

/// MIDI ring-queue capacity in bytes. One slot is sacrificed to tell full
/// from empty, so at most `MIDI_QUEUE_CAPACITY - 1` bytes are buffered.
///
/// At 31 250 baud a UART delivers ~3 bytes per millisecond; 256 bytes covers
/// a dense chord burst plus controller sweeps across several blocks.
pub const MIDI_QUEUE_CAPACITY: usize = 256;

// ── SampleRateHz ─────────────────────────────────────────────────────────────

/// Output sample rate in Hz, validated to the range the I2S clock tree can
/// produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SampleRateHz(u32);

impl SampleRateHz {
    /// Minimum supported sample rate.
    pub const MIN_HZ: u32 = 8_000;

    /// Maximum supported sample rate.
    pub const MAX_HZ: u32 = 192_000;

    /// The default 48 kHz rate.
    pub const DEFAULT: Self = Self(SAMPLE_RATE_HZ);

    /// Create a `SampleRateHz`, returning an error outside 8 kHz – 192 kHz.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SampleRateOutOfRange`] if `hz` is out of range.
    pub fn new(hz: u32) -> Result<Self, ConfigError> {
        if (Self::MIN_HZ..=Self::MAX_HZ).contains(&hz) {
            Ok(Self(hz))
        } else {
            Err(ConfigError::SampleRateOutOfRange {
                value: hz,
                min: Self::MIN_HZ,
                max: Self::MAX_HZ,
            })
        }
    }

    /// Return the sample rate in Hz.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// The sample rate as handed to [`AudioSource::prepare`](crate::AudioSource::prepare).
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Safety: MAX_HZ (192 000) is exact in f32
    pub fn as_f32(self) -> f32 {
        self.0 as f32
    }
}

impl Default for SampleRateHz {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── EngineConfig ─────────────────────────────────────────────────────────────

/// Runtime parameters for the engine.
///
/// Block size and queue capacity are const generics on the engine types, so
/// only the sample rate is chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    /// Rate passed to `start_audio` and to the source's `prepare`.
    pub sample_rate: SampleRateHz,
}

impl EngineConfig {
    /// Build a configuration from a raw sample rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SampleRateOutOfRange`] for unsupported rates.
    pub fn with_sample_rate(hz: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            sample_rate: SampleRateHz::new(hz)?,
        })
    }

    /// Check a block size against this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyBlock`] for a zero-frame block.
    pub fn validate_block(&self, block_size: usize) -> Result<(), ConfigError> {
        if block_size == 0 {
            return Err(ConfigError::EmptyBlock);
        }
        Ok(())
    }

    /// Duration of one block in microseconds, the scheduler's deadline.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: sample_rate >= MIN_HZ, so no division by zero
    #[allow(clippy::cast_possible_truncation)] // Safety: result fits u32 for any sane block size
    pub fn block_period_us(&self, block_size: usize) -> u32 {
        ((block_size as u64 * 1_000_000) / u64::from(self.sample_rate.get())) as u32
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRateHz::DEFAULT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_words_cover_two_halves() {
        assert_eq!(OUTPUT_BUFFER_WORDS, BLOCK_SIZE * 8);
    }

    #[test]
    fn test_default_rate_is_48k() {
        assert_eq!(EngineConfig::default().sample_rate.get(), 48_000);
    }

    #[test]
    fn test_rejects_zero_rate() {
        assert!(SampleRateHz::new(0).is_err());
    }

    #[test]
    fn test_block_period_at_48k() {
        let config = EngineConfig::default();
        assert_eq!(config.block_period_us(128), 2_666);
    }

    #[test]
    fn test_empty_block_rejected() {
        let config = EngineConfig::default();
        assert_eq!(config.validate_block(0), Err(ConfigError::EmptyBlock));
        assert!(config.validate_block(BLOCK_SIZE).is_ok());
    }
}

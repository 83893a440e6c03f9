//! Error types.
//!
//! Runtime conditions inside the audio loop are never errors: queue overflow,
//! malformed MIDI and buffer overruns are absorbed and counted (see
//! [`EngineStats`](crate::EngineStats)). Only startup configuration can fail.

use thiserror_no_std::Error;

/// Configuration rejected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Sample rate outside the supported range.
    #[error("sample rate {value} Hz outside {min}..={max} Hz")]
    SampleRateOutOfRange {
        /// Rejected value.
        value: u32,
        /// Inclusive minimum.
        min: u32,
        /// Inclusive maximum.
        max: u32,
    },
    /// A block must contain at least one frame.
    #[error("block size must be non-zero")]
    EmptyBlock,
    /// MIDI channel outside 1–16.
    #[error("MIDI channel {0} outside 1..=16")]
    InvalidMidiChannel(u8),
}

//! Audio output: I2S2 + DMA1 stream 4 on hardware, recording mock for tests.
//!
//! # Structure
//!
//! - `clock_math`: PLL/PLLI2S/prescaler arithmetic (host-testable)
//! - `mock`: [`MockAudioOutput`], records `start_audio` calls
//! - `i2s`: `I2sDmaOutput`, the STM32F411 driver (`hardware` only)
//!
//! # Dependency Injection
//!
//! The engine targets the [`dae::AudioOutput`] trait. Concrete types are
//! injected at the call site:
//!
//! ```rust,ignore
//! // Hardware:
//! Dae::start(task, source, config, &mut I2sDmaOutput::new())?;
//! // Tests:
//! Dae::start(task, source, config, &mut MockAudioOutput::new())?;
//! ```

pub mod clock_math;
pub mod mock;

#[cfg(feature = "hardware")]
pub mod i2s;

#[cfg(feature = "hardware")]
pub use i2s::I2sDmaOutput;

pub use mock::MockAudioOutput;

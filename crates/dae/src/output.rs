//! Audio output hardware contract.

use crate::config::SampleRateHz;

/// Serial-audio peripheral driven by circular DMA.
///
/// Implementations: the STM32 I2S/DMA driver in the firmware crate, a
/// simulated device for the desktop build, and a recording mock for tests.
pub trait AudioOutput {
    /// Arm DMA and the serial-audio peripheral against `buffer` and start a
    /// continuous circular transfer at `sample_rate`.
    ///
    /// Called exactly once, before the scheduler first waits. The transfer
    /// length is `buffer.len()` words. The hardware keeps reading from the
    /// buffer's address after this returns, so the buffer must stay in place
    /// for the rest of the program (it lives in a `static`). From then on the
    /// hardware raises `buffer_half_consumed` once per half.
    fn start_audio(&mut self, buffer: &mut [i16], sample_rate: SampleRateHz);
}

impl<O: AudioOutput + ?Sized> AudioOutput for &mut O {
    fn start_audio(&mut self, buffer: &mut [i16], sample_rate: SampleRateHz) {
        (**self).start_audio(buffer, sample_rate);
    }
}

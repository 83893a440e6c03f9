//! Mock audio output for host-side testing
//!
//! Implements [`AudioOutput`] without any hardware dependency. Records every
//! call for assertion in tests.

use dae::{AudioOutput, SampleRateHz};

/// Mock serial-audio device: records all calls for test assertions.
#[derive(Debug, Default)]
pub struct MockAudioOutput {
    /// Number of `start_audio` calls
    pub starts: u32,
    /// Sample rate from the last `start_audio`
    pub sample_rate: Option<SampleRateHz>,
    /// Transfer length (words) from the last `start_audio`
    pub words: usize,
    /// Address of the buffer handed over, for identity checks
    pub buffer_addr: usize,
}

impl MockAudioOutput {
    /// A mock that has not been started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `start_audio` has been called.
    pub fn is_started(&self) -> bool {
        self.starts > 0
    }
}

impl AudioOutput for MockAudioOutput {
    fn start_audio(&mut self, buffer: &mut [i16], sample_rate: SampleRateHz) {
        self.starts = self.starts.saturating_add(1);
        self.sample_rate = Some(sample_rate);
        self.words = buffer.len();
        self.buffer_addr = buffer.as_ptr() as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_output_records_start() {
        let mut out = MockAudioOutput::new();
        assert!(!out.is_started());
        let mut buffer = [0i16; 16];
        out.start_audio(&mut buffer, SampleRateHz::DEFAULT);
        assert!(out.is_started());
        assert_eq!(out.starts, 1);
        assert_eq!(out.words, 16);
        assert_eq!(out.sample_rate, Some(SampleRateHz::DEFAULT));
        assert_eq!(out.buffer_addr, buffer.as_ptr() as usize);
    }
}

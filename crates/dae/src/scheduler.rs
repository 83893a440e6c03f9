//! The audio scheduler: one task, one suspension point, one block per wake.
//!
//! ```text
//!        ┌──────────────────────────────────────────────────────────┐
//!        ▼                                                          │
//!   [Idle] ── BufferReady::wait ──► [DrainMidi] ──► [GenerateBlock] ──► [WriteOutput]
//!   (only await)                    queue→parser   process_block       writable half
//!                                   →handle_midi
//! ```
//!
//! All MIDI received before a block is applied before that block is
//! rendered: timing resolution is one block, not one sample.
//!
//! Startup is [`Dae::start`]: `start_audio` first (hardware begins on half
//! A), then the source's `prepare`. There is no way to build a `Dae` without
//! starting it, so both happen exactly once.

use core::sync::atomic::{compiler_fence, Ordering};

use crate::config::EngineConfig;
use crate::double_buffer::{Half, OutputBuffer};
use crate::error::ConfigError;
use crate::handoff::Notification;
use crate::midi::{MidiChannel, MidiParser};
use crate::output::AudioOutput;
use crate::source::AudioSource;
use crate::state::TaskHandles;

/// Scheduler phase within one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Blocked on the buffer-ready signal.
    Idle,
    /// Draining the MIDI queue through the parser into the source.
    DrainMidi,
    /// Source is rendering the block.
    GenerateBlock,
    /// Packing the block into the writable half.
    WriteOutput,
}

/// Result of one scheduler iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IterationReport {
    /// Half in flight while this block was written.
    pub active: Half,
    /// Half that received the block.
    pub written: Half,
    /// Blocks missed before this one (coalesced notifications).
    pub missed: u32,
    /// Messages delivered to the source.
    pub midi_messages: u32,
    /// Channel-voice messages dropped by the channel filter.
    pub filtered: u32,
}

/// Running totals since start. All counters wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineStats {
    /// Blocks rendered.
    pub blocks: u32,
    /// Messages delivered to the source.
    pub midi_messages: u32,
    /// Messages dropped by the channel filter.
    pub filtered: u32,
    /// Notifications that arrived before the previous block was done.
    pub overruns: u32,
    /// Stray data bytes discarded by the parser.
    pub malformed: u32,
    /// MIDI bytes dropped because the queue was full.
    pub dropped: u32,
}

/// The digital audio engine.
///
/// `FRAMES` is the block size, `QUEUE` the MIDI queue capacity.
pub struct Dae<'a, S, const FRAMES: usize, const QUEUE: usize> {
    task: TaskHandles<'a, FRAMES, QUEUE>,
    source: S,
    parser: MidiParser,
    channel: MidiChannel,
    config: EngineConfig,
    left: [f32; FRAMES],
    right: [f32; FRAMES],
    phase: Phase,
    stats: EngineStats,
}

impl<'a, S, const FRAMES: usize, const QUEUE: usize> Dae<'a, S, FRAMES, QUEUE>
where
    S: AudioSource,
{
    /// Start the hardware, prepare the source and return the running engine.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyBlock`] if `FRAMES` is zero; the hardware
    /// is not touched in that case.
    pub fn start<O: AudioOutput>(
        task: TaskHandles<'a, FRAMES, QUEUE>,
        mut source: S,
        config: EngineConfig,
        output: &mut O,
    ) -> Result<Self, ConfigError> {
        config.validate_block(FRAMES)?;
        output.start_audio(task.output.as_words_mut(), config.sample_rate);
        let channel = source.prepare(config.sample_rate.as_f32(), FRAMES);
        Ok(Self {
            task,
            source,
            parser: MidiParser::new(),
            channel,
            config,
            left: [0.0; FRAMES],
            right: [0.0; FRAMES],
            phase: Phase::Idle,
            stats: EngineStats::default(),
        })
    }

    /// Wait for the next half-consumed notification and fill the freed half.
    pub async fn run_iteration(&mut self) -> IterationReport {
        self.phase = Phase::Idle;
        let notification = self.task.ready.wait().await;
        self.render(notification)
    }

    /// Poll variant of [`run_iteration`](Self::run_iteration): renders only if
    /// a notification is pending.
    pub fn poll_iteration(&mut self) -> Option<IterationReport> {
        let notification = self.task.ready.try_take()?;
        Some(self.render(notification))
    }

    /// Run one iteration for `notification` without waiting.
    pub fn render(&mut self, notification: Notification) -> IterationReport {
        if notification.is_overrun() {
            self.stats.overruns = self.stats.overruns.wrapping_add(notification.missed);
        }

        self.phase = Phase::DrainMidi;
        let (midi_messages, filtered) = self.drain_midi();

        self.phase = Phase::GenerateBlock;
        self.source.process_block(&mut self.left, &mut self.right);

        self.phase = Phase::WriteOutput;
        let mut view = self.task.output.select_writable_half(notification.active);
        let written = view.half();
        view.write_block(&self.left, &self.right);
        // Block must be in memory before the DMA engine reaches this half.
        compiler_fence(Ordering::Release);

        self.phase = Phase::Idle;
        self.stats.blocks = self.stats.blocks.wrapping_add(1);
        IterationReport {
            active: notification.active,
            written,
            missed: notification.missed,
            midi_messages,
            filtered,
        }
    }

    /// Parse every byte currently queued and forward accepted messages.
    ///
    /// Bounded to one queue's worth of bytes so a babbling sender cannot
    /// starve the block; later bytes wait for the next block.
    fn drain_midi(&mut self) -> (u32, u32) {
        let mut delivered = 0u32;
        let mut filtered = 0u32;
        for _ in 0..QUEUE {
            let Some(byte) = self.task.midi.try_read() else {
                break;
            };
            let Some(message) = self.parser.push(byte) else {
                continue;
            };
            let accepted = message
                .channel()
                .map_or(true, |channel| self.channel.accepts(channel));
            if accepted {
                self.source.handle_midi(message);
                delivered = delivered.wrapping_add(1);
            } else {
                filtered = filtered.wrapping_add(1);
            }
        }
        self.stats.midi_messages = self.stats.midi_messages.wrapping_add(delivered);
        self.stats.filtered = self.stats.filtered.wrapping_add(filtered);
        self.stats.malformed = self.parser.malformed_count();
        self.stats.dropped = self.task.midi.dropped();
        (delivered, filtered)
    }

    /// Current phase ([`Phase::Idle`] between iterations).
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Totals since start.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Channel returned by the source's `prepare`.
    #[must_use]
    pub fn midi_channel(&self) -> MidiChannel {
        self.channel
    }

    /// Configuration the engine was started with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The source, mutably (for parameter changes between blocks).
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// The output buffer, read-only (for inspection on the host).
    #[must_use]
    pub fn output(&self) -> &OutputBuffer<FRAMES> {
        self.task.output
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use crate::config::SampleRateHz;
    use crate::midi::{MessageKind, MidiMessage};
    use crate::state::DaeState;

    #[derive(Default)]
    struct NullOutput {
        started: u32,
        words: usize,
    }

    impl AudioOutput for NullOutput {
        fn start_audio(&mut self, buffer: &mut [i16], _sample_rate: SampleRateHz) {
            self.started += 1;
            self.words = buffer.len();
        }
    }

    #[derive(Debug, PartialEq)]
    enum Event {
        Prepare(usize),
        Midi(MidiMessage),
        Block,
    }

    struct Recorder {
        channel: MidiChannel,
        value: f32,
        events: Vec<Event>,
    }

    impl Recorder {
        fn new(channel: MidiChannel, value: f32) -> Self {
            Self {
                channel,
                value,
                events: Vec::new(),
            }
        }
    }

    impl AudioSource for Recorder {
        fn prepare(&mut self, _sample_rate: f32, block_size: usize) -> MidiChannel {
            self.events.push(Event::Prepare(block_size));
            self.channel
        }

        fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
            self.events.push(Event::Block);
            left.fill(self.value);
            right.fill(self.value);
        }

        fn handle_midi(&mut self, message: MidiMessage) {
            self.events.push(Event::Midi(message));
        }
    }

    #[test]
    fn test_start_arms_output_once_then_prepares() {
        let mut state: DaeState<8, 16> = DaeState::new();
        let (_isr, task) = state.split();
        let mut out = NullOutput::default();
        let dae = Dae::start(
            task,
            Recorder::new(MidiChannel::Omni, 0.0),
            EngineConfig::default(),
            &mut out,
        )
        .unwrap();
        assert_eq!(out.started, 1);
        assert_eq!(out.words, 2 * 8 * 4);
        assert_eq!(dae.source().events, [Event::Prepare(8)]);
        assert_eq!(dae.phase(), Phase::Idle);
    }

    #[test]
    fn test_empty_block_is_rejected_before_hardware() {
        let mut state: DaeState<0, 16> = DaeState::new();
        let (_isr, task) = state.split();
        let mut out = NullOutput::default();
        let result = Dae::start(
            task,
            Recorder::new(MidiChannel::Omni, 0.0),
            EngineConfig::default(),
            &mut out,
        );
        assert!(matches!(result, Err(ConfigError::EmptyBlock)));
        assert_eq!(out.started, 0);
    }

    #[test]
    fn test_midi_before_block_and_half_one_written() {
        let mut state: DaeState<4, 16> = DaeState::new();
        let (mut isr, task) = state.split();
        let mut out = NullOutput::default();
        let mut dae = Dae::start(
            task,
            Recorder::new(MidiChannel::Omni, 0.5),
            EngineConfig::default(),
            &mut out,
        )
        .unwrap();

        for byte in [0x90, 0x40, 0x7F] {
            assert!(isr.uart.midi_byte_received(byte));
        }
        let report = dae.render(Notification {
            active: Half::A,
            missed: 0,
        });

        assert_eq!(report.written, Half::B);
        assert_eq!(report.midi_messages, 1);
        let events = &dae.source().events;
        assert_eq!(events.len(), 3);
        match &events[1] {
            Event::Midi(msg) => {
                assert_eq!(msg.kind(), MessageKind::NoteOn);
                assert_eq!(msg.as_bytes(), &[0x90, 0x40, 0x7F]);
            }
            other => panic!("expected MIDI before block, got {other:?}"),
        }
        assert_eq!(events[2], Event::Block);
        assert!(dae
            .output()
            .half_frames(Half::B)
            .iter()
            .all(|f| *f == [0x4000, 0, 0x4000, 0]));
        assert!(dae.output().half_words(Half::A).iter().all(|&w| w == 0));
    }

    #[test]
    fn test_channel_filter_drops_other_channels() {
        let mut state: DaeState<4, 32> = DaeState::new();
        let (mut isr, task) = state.split();
        let mut out = NullOutput::default();
        let mut dae = Dae::start(
            task,
            Recorder::new(MidiChannel::Channel(2), 0.0),
            EngineConfig::default(),
            &mut out,
        )
        .unwrap();

        // Note-on ch 1 (filtered), note-on ch 2 (kept), clock (no channel, kept).
        for byte in [0x90, 0x40, 0x7F, 0x91, 0x40, 0x7F, 0xF8] {
            isr.uart.midi_byte_received(byte);
        }
        let report = dae.render(Notification {
            active: Half::B,
            missed: 0,
        });
        assert_eq!(report.midi_messages, 2);
        assert_eq!(report.filtered, 1);
        assert_eq!(dae.stats().filtered, 1);
    }

    #[test]
    fn test_overrun_is_counted() {
        let mut state: DaeState<4, 16> = DaeState::new();
        let (isr, task) = state.split();
        let mut out = NullOutput::default();
        let mut dae = Dae::start(
            task,
            Recorder::new(MidiChannel::Omni, 0.0),
            EngineConfig::default(),
            &mut out,
        )
        .unwrap();

        isr.dma.buffer_half_consumed(Half::A);
        isr.dma.buffer_half_consumed(Half::B);
        let report = dae.poll_iteration().unwrap();
        assert_eq!(report.missed, 1);
        assert_eq!(report.written, Half::B);
        assert_eq!(dae.stats().overruns, 1);
        assert!(dae.poll_iteration().is_none());
    }

    #[tokio::test]
    async fn test_run_iteration_waits_for_interrupt() {
        let mut state: DaeState<4, 16> = DaeState::new();
        let (isr, task) = state.split();
        let mut out = NullOutput::default();
        let mut dae = Dae::start(
            task,
            Recorder::new(MidiChannel::Omni, 0.25),
            EngineConfig::default(),
            &mut out,
        )
        .unwrap();

        let dma = isr.dma;
        let fire = async {
            tokio::task::yield_now().await;
            dma.buffer_half_consumed(Half::A);
        };
        let (report, ()) = tokio::join!(dae.run_iteration(), fire);
        assert_eq!(report.active, Half::B);
        assert_eq!(report.written, Half::A);
        assert_eq!(dae.stats().blocks, 1);
        assert!(dae
            .output()
            .half_frames(Half::A)
            .iter()
            .all(|f| *f == [0x2000, 0, 0x2000, 0]));
    }
}

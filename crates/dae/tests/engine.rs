//! End-to-end engine tests: interrupt handles on one side, scheduler on the other.
// Integration test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]
//!
//! Run with: cargo test -p dae --test engine

use dae::{
    AudioOutput, AudioSource, Dae, DaeState, EngineConfig, Half, MessageKind, MidiChannel,
    MidiMessage, Phase, SampleRateHz,
};
use embassy_futures::block_on;

const FRAMES: usize = 16;
const QUEUE: usize = 64;

#[derive(Default)]
struct CaptureOutput {
    calls: Vec<(usize, u32)>,
}

impl AudioOutput for CaptureOutput {
    fn start_audio(&mut self, buffer: &mut [i16], sample_rate: SampleRateHz) {
        self.calls.push((buffer.len(), sample_rate.get()));
    }
}

/// Records call order and plays a constant.
#[derive(Default)]
struct Constant {
    level: f32,
    log: Vec<&'static str>,
    notes: Vec<MidiMessage>,
    prepared_with: Option<(f32, usize)>,
}

impl AudioSource for Constant {
    fn prepare(&mut self, sample_rate: f32, block_size: usize) -> MidiChannel {
        self.prepared_with = Some((sample_rate, block_size));
        self.log.push("prepare");
        MidiChannel::Omni
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.log.push("block");
        left.fill(self.level);
        right.fill(self.level);
    }

    fn handle_midi(&mut self, message: MidiMessage) {
        self.log.push("midi");
        self.notes.push(message);
    }
}

#[test]
fn test_startup_passes_buffer_and_rate() {
    let mut state: DaeState<FRAMES, QUEUE> = DaeState::new();
    let (_isr, task) = state.split();
    let mut out = CaptureOutput::default();
    let config = EngineConfig::with_sample_rate(44_100).unwrap();
    let dae = Dae::start(task, Constant::default(), config, &mut out).unwrap();

    assert_eq!(out.calls, [(2 * FRAMES * 4, 44_100)]);
    assert_eq!(dae.source().prepared_with, Some((44_100.0, FRAMES)));
    assert_eq!(dae.midi_channel(), MidiChannel::Omni);
}

/// Active half A, queue holding one note-on, source at 0.5: half B holds the
/// encoding of 0.5 in every frame and the note arrives before the block.
#[test]
fn test_note_on_then_constant_block_into_half_b() {
    let mut state: DaeState<FRAMES, QUEUE> = DaeState::new();
    let (mut isr, task) = state.split();
    let mut out = CaptureOutput::default();
    let source = Constant {
        level: 0.5,
        ..Constant::default()
    };
    let mut dae = Dae::start(task, source, EngineConfig::default(), &mut out).unwrap();

    for byte in [0x90, 0x40, 0x7F] {
        assert!(isr.uart.midi_byte_received(byte));
    }
    // Hardware finished B and moved on to A.
    isr.dma.buffer_half_consumed(Half::B);
    let report = block_on(dae.run_iteration());

    assert_eq!(report.active, Half::A);
    assert_eq!(report.written, Half::B);
    assert_eq!(dae.phase(), Phase::Idle);
    assert_eq!(dae.source().log, ["prepare", "midi", "block"]);
    assert_eq!(dae.source().notes.len(), 1);
    let note = dae.source().notes[0];
    assert_eq!(note.kind(), MessageKind::NoteOn);
    assert_eq!(note.as_bytes(), &[0x90, 0x40, 0x7F]);

    for frame in dae.output().half_frames(Half::B) {
        assert_eq!(*frame, [0x4000, 0x0000, 0x4000, 0x0000]);
    }
    assert!(dae.output().half_words(Half::A).iter().all(|&w| w == 0));
}

#[test]
fn test_halves_alternate_across_iterations() {
    let mut state: DaeState<FRAMES, QUEUE> = DaeState::new();
    let (isr, task) = state.split();
    let mut out = CaptureOutput::default();
    let mut dae = Dae::start(task, Constant::default(), EngineConfig::default(), &mut out).unwrap();

    let mut consumed = Half::A;
    for _ in 0..6 {
        isr.dma.buffer_half_consumed(consumed);
        let report = block_on(dae.run_iteration());
        assert_eq!(report.written, consumed);
        assert_eq!(report.missed, 0);
        consumed = consumed.other();
    }
    assert_eq!(dae.stats().blocks, 6);
    assert_eq!(dae.stats().overruns, 0);
}

#[test]
fn test_stray_bytes_and_drops_reach_stats() {
    let mut state: DaeState<FRAMES, 4> = DaeState::new();
    let (mut isr, task) = state.split();
    let mut out = CaptureOutput::default();
    let mut dae = Dae::start(task, Constant::default(), EngineConfig::default(), &mut out).unwrap();

    // Capacity 3: the fourth byte is dropped.
    for byte in [0x40, 0x41, 0x42, 0x43] {
        isr.uart.midi_byte_received(byte);
    }
    isr.dma.buffer_half_consumed(Half::A);
    block_on(dae.run_iteration());

    let stats = dae.stats();
    assert_eq!(stats.malformed, 3);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.midi_messages, 0);
}

/// UART interrupt on another thread, scheduler on this one: every note
/// arrives exactly once and in order.
#[test]
fn test_concurrent_midi_arrives_in_order() {
    const NOTES: u8 = 100;
    let mut state: DaeState<FRAMES, 8> = DaeState::new();
    let (isr, task) = state.split();
    let mut out = CaptureOutput::default();
    let mut dae = Dae::start(task, Constant::default(), EngineConfig::default(), &mut out).unwrap();
    let dma = isr.dma;
    let mut uart = isr.uart;

    std::thread::scope(|s| {
        s.spawn(move || {
            for key in 0..NOTES {
                for byte in [0x90, key, 0x64] {
                    while !uart.midi_byte_received(byte) {
                        std::thread::yield_now();
                    }
                }
            }
        });

        let mut consumed = Half::A;
        let mut spins = 0u32;
        while dae.source().notes.len() < usize::from(NOTES) {
            dma.buffer_half_consumed(consumed);
            block_on(dae.run_iteration());
            consumed = consumed.other();
            spins += 1;
            assert!(spins < 1_000_000, "MIDI stalled");
            std::thread::yield_now();
        }
    });

    let keys: Vec<u8> = dae.source().notes.iter().map(MidiMessage::data1).collect();
    let expected: Vec<u8> = (0..NOTES).collect();
    assert_eq!(keys, expected);
}

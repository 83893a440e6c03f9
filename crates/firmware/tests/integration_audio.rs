//! Audio integration tests: board-layer decoding driving the real engine.
// Integration test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
)]
//!
//! The interrupt-side helpers (`registers::StreamEvents`, `midi::handle_rx`)
//! are fed raw register values exactly as the handlers in `main.rs` read
//! them, and the engine is driven with `MockAudioOutput` in place of I2S.
//!
//! Run with: cargo test -p firmware --test integration_audio

use dae::config::{BLOCK_SIZE, MIDI_QUEUE_CAPACITY, WORDS_PER_FRAME};
use dae::{Dae, DaeState, EngineConfig, Half, SampleRateHz, TestTone};
use embassy_futures::block_on;
use firmware::audio::clock_math::{I2sClock, I2sPll};
use firmware::midi::{handle_rx, RxOutcome};
use firmware::registers::{self, StreamEvents, UartStatus};
use firmware::MockAudioOutput;

const SR_RXNE: u32 = 1 << 5;
const SR_FE: u32 = 1 << 1;
const HISR_HT: u32 = 1 << 4;
const HISR_TC: u32 = 1 << 5;

/// Start hands the whole double buffer to the output exactly once.
#[test]
fn test_start_hands_whole_buffer_to_output() {
    let mut state = DaeState::<BLOCK_SIZE, MIDI_QUEUE_CAPACITY>::new();
    let (_isr, task) = state.split();
    let mut output = MockAudioOutput::new();

    let dae = Dae::start(task, TestTone::default(), EngineConfig::default(), &mut output)
        .expect("default config must start");

    assert_eq!(output.starts, 1);
    assert_eq!(output.words, 2 * BLOCK_SIZE * WORDS_PER_FRAME);
    assert_eq!(output.words, 1024);
    assert_eq!(output.sample_rate, Some(SampleRateHz::DEFAULT));
    assert_eq!(output.buffer_addr, dae.output().as_words().as_ptr() as usize);
}

/// HT then TC interrupts fill A then B, each with audible tone.
#[test]
fn test_dma_flags_drive_block_rendering() {
    let mut state = DaeState::<BLOCK_SIZE, MIDI_QUEUE_CAPACITY>::new();
    let (isr, task) = state.split();
    let mut output = MockAudioOutput::new();
    let mut dae = Dae::start(task, TestTone::default(), EngineConfig::default(), &mut output)
        .unwrap();

    for (hisr, expected) in [(HISR_HT, Half::A), (HISR_TC, Half::B)] {
        for half in StreamEvents::from_hisr(hisr).consumed() {
            isr.dma.buffer_half_consumed(half);
        }
        let report = block_on(dae.run_iteration());
        assert_eq!(report.written, expected);
        assert_eq!(report.missed, 0);
        assert!(
            dae.output().half_words(expected).iter().any(|&w| w != 0),
            "half {expected:?} should hold tone samples"
        );
    }
    assert_eq!(dae.stats().blocks, 2);
}

/// A late interrupt with both flags set is an overrun of one block.
#[test]
fn test_late_interrupt_with_both_flags_counts_overrun() {
    let mut state = DaeState::<BLOCK_SIZE, MIDI_QUEUE_CAPACITY>::new();
    let (isr, task) = state.split();
    let mut output = MockAudioOutput::new();
    let mut dae = Dae::start(task, TestTone::default(), EngineConfig::default(), &mut output)
        .unwrap();

    let events = StreamEvents::from_hisr(HISR_HT | HISR_TC);
    for half in events.consumed() {
        isr.dma.buffer_half_consumed(half);
    }

    let report = dae.poll_iteration().expect("a notification is pending");
    assert_eq!(report.missed, 1);
    assert_eq!(report.written, Half::B);
    assert_eq!(dae.stats().overruns, 1);
    assert!(dae.poll_iteration().is_none());
}

/// UART bytes pass through the receive path into the engine's parser;
/// line errors never reach the queue.
#[test]
fn test_uart_bytes_reach_engine() {
    let mut state = DaeState::<BLOCK_SIZE, MIDI_QUEUE_CAPACITY>::new();
    let (mut isr, task) = state.split();
    let mut output = MockAudioOutput::new();
    let mut dae = Dae::start(task, TestTone::default(), EngineConfig::default(), &mut output)
        .unwrap();

    let received = UartStatus::from_sr(SR_RXNE);
    for byte in [0x90, 0x45, 0x64] {
        assert_eq!(handle_rx(received, byte, &mut isr.uart), RxOutcome::Queued);
    }
    let garbled = UartStatus::from_sr(SR_RXNE | SR_FE);
    assert_eq!(handle_rx(garbled, 0x80, &mut isr.uart), RxOutcome::LineError);

    isr.dma.buffer_half_consumed(Half::A);
    let report = dae.poll_iteration().unwrap();
    assert_eq!(report.midi_messages, 1);
    assert_eq!(dae.stats().malformed, 0);
    assert_eq!(dae.stats().dropped, 0);
}

/// Every supported rate gets a PLLI2S setting and lands within 0.1 %.
#[test]
fn test_clock_plan_for_supported_rates() {
    for (rate, pll) in [
        (44_100, I2sPll::RATE_44K1),
        (48_000, I2sPll::RATE_48K),
        (96_000, I2sPll::RATE_96K),
    ] {
        let clock = I2sClock::for_rate(rate);
        assert_eq!(clock.pll, pll);
        assert!(
            clock.error_ppm(rate).abs() < 1_000,
            "{rate} Hz: {} ppm",
            clock.error_ppm(rate)
        );
    }
}

/// The words written at start-up for the default rate.
#[test]
fn test_register_words_for_default_rate() {
    let clock = I2sClock::for_rate(SampleRateHz::DEFAULT.get());
    assert_eq!(registers::i2spr(&clock), 3 | (1 << 8) | (1 << 9));
    assert_eq!(registers::i2scfgr(false), 0xA05);
    assert_eq!(registers::i2scfgr(true), 0xA05 | (1 << 10));
    assert_eq!(registers::dma_cr(true) & 1, 1);
    assert_eq!(registers::dma_cr(false) & 1, 0);
}

//! SynthCore firmware - Main Entry Point
//!
//! Hardware-only entry point for the STM32F411CE blackpill.
//!
//! # Execution contexts
//!
//! | Context            | Priority | Work                                   |
//! |--------------------|----------|----------------------------------------|
//! | `DMA1_STREAM4` ISR | 1        | report consumed half, wake audio task  |
//! | `USART1` ISR       | 2        | push MIDI byte                         |
//! | `SPI3` (executor)  | 3        | audio task: drain MIDI, render, pack   |
//! | thread mode        | lowest   | statistics reporter                    |
//!
//! SPI3 is unused on this board; its vector drives the audio executor.

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use dae::config::{APP_NAME, APP_VERSION, BLOCK_SIZE, MIDI_QUEUE_CAPACITY};
use dae::{Dae, DaeState, DmaIrq, EngineConfig, EngineStats, TaskHandles, TestTone, UartIrq};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use static_cell::ConstStaticCell;
use stm32_metapac::{interrupt, Interrupt};

use firmware::audio::i2s::on_dma_interrupt;
use firmware::midi::hardware::{discard_pending, init_usart1, on_usart_interrupt};
use firmware::midi::RxOutcome;
use firmware::{I2sDmaOutput, StatsDelta, StatsThrottle};

use {defmt_rtt as _, panic_probe as _};

type State = DaeState<BLOCK_SIZE, MIDI_QUEUE_CAPACITY>;
type AudioHandles = TaskHandles<'static, BLOCK_SIZE, MIDI_QUEUE_CAPACITY>;
type MidiHandle = UartIrq<'static, MIDI_QUEUE_CAPACITY>;

/// NVIC priorities (upper four bits on the Cortex-M4F).
const PRIO_DMA: u8 = 1 << 4;
const PRIO_UART: u8 = 2 << 4;
const PRIO_AUDIO: u8 = 3 << 4;

static STATE: ConstStaticCell<State> = ConstStaticCell::new(DaeState::new());

static DMA_HANDLE: Mutex<RefCell<Option<DmaIrq<'static>>>> = Mutex::new(RefCell::new(None));
static MIDI_HANDLE: Mutex<RefCell<Option<MidiHandle>>> = Mutex::new(RefCell::new(None));

/// Latest totals, published about once per second by the audio task.
static STATS: Signal<CriticalSectionRawMutex, EngineStats> = Signal::new();

/// Bytes discarded for framing errors or noise.
static LINE_ERRORS: AtomicU32 = AtomicU32::new(0);

static AUDIO_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SPI3() {
    // SAFETY: SPI3 is reserved for the audio executor.
    unsafe { AUDIO_EXECUTOR.on_interrupt() }
}

#[interrupt]
fn DMA1_STREAM4() {
    static mut DMA: Option<DmaIrq<'static>> = None;
    if DMA.is_none() {
        *DMA = critical_section::with(|cs| DMA_HANDLE.borrow_ref_mut(cs).take());
    }
    if let Some(dma) = DMA.as_ref() {
        let events = on_dma_interrupt(dma);
        if events.error {
            defmt::error!("DMA1 stream 4 error");
        }
    }
}

#[interrupt]
fn USART1() {
    static mut MIDI: Option<MidiHandle> = None;
    if MIDI.is_none() {
        *MIDI = critical_section::with(|cs| MIDI_HANDLE.borrow_ref_mut(cs).take());
    }
    match MIDI.as_mut() {
        Some(uart) => {
            if on_usart_interrupt(uart) == RxOutcome::LineError {
                LINE_ERRORS.fetch_add(1, Ordering::Relaxed);
            }
        }
        None => discard_pending(),
    }
}

#[embassy_executor::task]
async fn audio_task(task: AudioHandles, config: EngineConfig) {
    let mut output = I2sDmaOutput::new();
    let mut engine = match Dae::start(task, TestTone::default(), config, &mut output) {
        Ok(engine) => engine,
        Err(e) => {
            defmt::error!("Engine start failed: {}", e);
            return;
        }
    };
    defmt::info!(
        "Audio running: {=u32} Hz, {=usize} frames/block ({=u32} us deadline), channel {}",
        config.sample_rate.get(),
        BLOCK_SIZE,
        config.block_period_us(BLOCK_SIZE),
        engine.midi_channel()
    );

    let mut throttle = StatsThrottle::per_second(&config, BLOCK_SIZE);
    let mut last = EngineStats::default();
    loop {
        let report = engine.run_iteration().await;
        let stats = engine.stats();
        let delta = StatsDelta::between(&last, &stats);
        if report.missed > 0 {
            defmt::warn!("Overrun: {=u32} block(s) missed before half {}", report.missed, report.written);
        }
        if delta.dropped > 0 {
            defmt::warn!("MIDI queue full: {=u32} byte(s) dropped", delta.dropped);
        }
        last = stats;
        if throttle.tick() {
            STATS.signal(stats);
        }
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    defmt::info!("{=str} v{=str}", APP_NAME, APP_VERSION);
    for step in firmware::boot::BOOT_SEQUENCE_STEPS {
        defmt::debug!("boot: {=str}", step);
    }

    let config = EngineConfig::default();
    match firmware::boot::hardware::init_clocks(config.sample_rate) {
        Ok(clocks) => defmt::info!(
            "Clocks: SYSCLK {=u32} Hz, I2S {=u32} Hz actual",
            clocks.sysclk_hz,
            clocks.i2s.actual_rate_hz()
        ),
        Err(e) => {
            defmt::error!("Clock bring-up failed: {}", e);
            loop {
                cortex_m::asm::wfi();
            }
        }
    }

    let (isr, task) = STATE.take().split();
    critical_section::with(|cs| {
        DMA_HANDLE.borrow_ref_mut(cs).replace(isr.dma);
        MIDI_HANDLE.borrow_ref_mut(cs).replace(isr.uart);
    });

    // SAFETY: priorities are set once, before any of these lines is unmasked.
    unsafe {
        let mut core = cortex_m::Peripherals::steal();
        core.NVIC.set_priority(Interrupt::DMA1_STREAM4, PRIO_DMA);
        core.NVIC.set_priority(Interrupt::USART1, PRIO_UART);
        core.NVIC.set_priority(Interrupt::SPI3, PRIO_AUDIO);
        cortex_m::peripheral::NVIC::unmask(Interrupt::DMA1_STREAM4);
        cortex_m::peripheral::NVIC::unmask(Interrupt::USART1);
    }

    // Audio runs in the SPI3 interrupt executor so it preempts thread mode.
    let audio_spawner = AUDIO_EXECUTOR.start(Interrupt::SPI3);
    if audio_spawner.spawn(audio_task(task, config)).is_err() {
        defmt::error!("Audio task already running");
    }

    init_usart1();

    loop {
        let stats = STATS.wait().await;
        defmt::info!(
            "blocks={=u32} midi={=u32} filtered={=u32} overruns={=u32} malformed={=u32} dropped={=u32} line_errors={=u32}",
            stats.blocks,
            stats.midi_messages,
            stats.filtered,
            stats.overruns,
            stats.malformed,
            stats.dropped,
            LINE_ERRORS.load(Ordering::Relaxed)
        );
    }
}

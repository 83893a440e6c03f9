//! Desktop simulator: the real engine against simulated DMA and UART.
//!
//! Two drivers share one setup:
//!
//! - [`run_offline`]: deterministic. Per block, the scripted MIDI bytes are
//!   pushed through the UART handle, the next half is reported consumed and
//!   the engine renders with `poll_iteration`. Used by tests.
//! - [`run_realtime`]: a tokio interval plays the DMA interrupt at the real
//!   block period while a second future plays the MIDI script, and the
//!   engine awaits `run_iteration` exactly as on hardware.
//!
//! Logging goes through `tracing`; call [`init_tracing`] once from `main`.

use std::time::Duration;

use dae::config::{BLOCK_SIZE, MIDI_QUEUE_CAPACITY};
use dae::double_buffer::unpack_frame;
use dae::{
    AudioOutput, AudioSource, ConfigError, Dae, DaeState, DmaIrq, EngineConfig, EngineStats,
    Half, IterationReport, MessageKind, MidiChannel, MidiMessage, OutputBuffer, SampleRateHz,
    TestTone,
};
use thiserror_no_std::Error;
use tracing::{debug, info, warn};

use crate::telemetry::{StatsDelta, StatsThrottle};

type SimState = DaeState<BLOCK_SIZE, MIDI_QUEUE_CAPACITY>;

/// Simulator failure.
#[derive(Debug, Error)]
pub enum SimError {
    /// Engine refused its configuration.
    #[error("engine configuration rejected: {0}")]
    Config(#[from] ConfigError),
    /// The engine did not finish a block within four block periods.
    #[error("engine stalled at block {block}")]
    Stalled {
        /// Block that never completed.
        block: u32,
    },
}

// ── Simulated hardware ───────────────────────────────────────────────────────

/// Stand-in for the I2S/DMA peripheral. Records what the engine asked for.
#[derive(Debug, Default)]
pub struct SimulatedOutput {
    /// Rate requested by `start_audio`.
    pub sample_rate: Option<SampleRateHz>,
    /// Transfer length in words.
    pub words: usize,
}

impl AudioOutput for SimulatedOutput {
    fn start_audio(&mut self, buffer: &mut [i16], sample_rate: SampleRateHz) {
        info!(
            sample_rate = sample_rate.get(),
            words = buffer.len(),
            "simulated I2S started"
        );
        self.sample_rate = Some(sample_rate);
        self.words = buffer.len();
    }
}

/// MIDI bytes arriving on the simulated UART just before `block` renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiEvent {
    /// Block index.
    pub block: u32,
    /// Raw bytes, in wire order.
    pub bytes: Vec<u8>,
}

impl MidiEvent {
    /// Bytes `bytes` before block `block`.
    pub fn new(block: u32, bytes: &[u8]) -> Self {
        Self {
            block,
            bytes: bytes.to_vec(),
        }
    }
}

/// A short performance on channel 1: a stray data byte before any status,
/// a held note with a clock tick and a controller, a message on channel 2
/// and a two-note chord using running status.
pub fn demo_script() -> Vec<MidiEvent> {
    vec![
        MidiEvent::new(2, &[0x33]),
        MidiEvent::new(10, &[0x90, 0x45, 0x64]),
        MidiEvent::new(60, &[0xF8, 0xB0, 0x07, 0x50]),
        MidiEvent::new(120, &[0x80, 0x45, 0x00]),
        MidiEvent::new(180, &[0x91, 0x3C, 0x7F]),
        MidiEvent::new(200, &[0x90, 0x48, 0x60, 0x4C, 0x60]),
        MidiEvent::new(320, &[0x80, 0x48, 0x00, 0x4C, 0x00]),
    ]
}

// ── Demo source ──────────────────────────────────────────────────────────────

/// Wraps a source and mutes it unless at least one note is held.
///
/// Listens on `channel`; every delivered message is traced.
#[derive(Debug, Clone)]
pub struct GatedSource<S> {
    inner: S,
    channel: MidiChannel,
    held: u32,
    messages: u32,
}

impl<S> GatedSource<S> {
    /// Gate `inner` on notes received on `channel`.
    pub fn new(inner: S, channel: MidiChannel) -> Self {
        Self {
            inner,
            channel,
            held: 0,
            messages: 0,
        }
    }

    /// Notes currently held.
    pub fn held_notes(&self) -> u32 {
        self.held
    }

    /// Messages delivered so far.
    pub fn messages(&self) -> u32 {
        self.messages
    }
}

impl<S: AudioSource> AudioSource for GatedSource<S> {
    fn prepare(&mut self, sample_rate: f32, block_size: usize) -> MidiChannel {
        let _ = self.inner.prepare(sample_rate, block_size);
        info!(sample_rate, block_size, "source prepared");
        self.channel
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.inner.process_block(left, right);
        if self.held == 0 {
            left.fill(0.0);
            right.fill(0.0);
        }
    }

    fn handle_midi(&mut self, message: MidiMessage) {
        self.messages = self.messages.saturating_add(1);
        match message.kind() {
            MessageKind::NoteOn if message.data2() > 0 => {
                self.held = self.held.saturating_add(1);
            }
            MessageKind::NoteOn | MessageKind::NoteOff => {
                self.held = self.held.saturating_sub(1);
            }
            _ => {}
        }
        debug!(
            status = message.status(),
            data1 = message.data1(),
            data2 = message.data2(),
            held = self.held,
            "midi"
        );
    }
}

// ── Measurement ──────────────────────────────────────────────────────────────

/// Peak and RMS over every half the engine wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelMeter {
    peak: f32,
    sum_squares: f64,
    samples: u64,
}

impl LevelMeter {
    /// Add the frames of `half`.
    pub fn measure<const FRAMES: usize>(&mut self, buffer: &OutputBuffer<FRAMES>, half: Half) {
        for frame in buffer.half_frames(half) {
            let (left, right) = unpack_frame(frame);
            for sample in [left, right] {
                self.peak = self.peak.max(sample.abs());
                self.sum_squares += f64::from(sample) * f64::from(sample);
                self.samples = self.samples.saturating_add(1);
            }
        }
    }

    /// Largest absolute sample.
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Root mean square over all samples (0 if none).
    pub fn rms(&self) -> f32 {
        if self.samples == 0 {
            return 0.0;
        }
        (self.sum_squares / self.samples as f64).sqrt() as f32
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimReport {
    /// Blocks rendered.
    pub blocks: u32,
    /// Engine totals at the end.
    pub stats: EngineStats,
    /// Output level over the whole run.
    pub level: LevelMeter,
    /// Halves written, in order, for the first eight blocks.
    pub first_halves: [Option<Half>; 8],
}

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Engine configuration.
    pub engine: EngineConfig,
    /// Blocks to render.
    pub blocks: u32,
    /// MIDI channel the demo source listens on.
    pub channel: MidiChannel,
    /// UART traffic.
    pub script: Vec<MidiEvent>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            blocks: 400,
            channel: MidiChannel::Channel(1),
            script: demo_script(),
        }
    }
}

impl SimConfig {
    /// Duration of one block at the configured rate.
    pub fn block_period(&self) -> Duration {
        Duration::from_micros(u64::from(self.engine.block_period_us(BLOCK_SIZE)))
    }
}

// ── Drivers ──────────────────────────────────────────────────────────────────

struct Recorder {
    report: SimReport,
    throttle: StatsThrottle,
    last: EngineStats,
}

impl Recorder {
    fn new(config: &SimConfig) -> Self {
        Self {
            report: SimReport {
                blocks: 0,
                stats: EngineStats::default(),
                level: LevelMeter::default(),
                first_halves: [None; 8],
            },
            throttle: StatsThrottle::per_second(&config.engine, BLOCK_SIZE),
            last: EngineStats::default(),
        }
    }

    fn record<S: AudioSource>(
        &mut self,
        dae: &Dae<'_, S, BLOCK_SIZE, MIDI_QUEUE_CAPACITY>,
        report: &IterationReport,
    ) {
        let index = self.report.blocks as usize;
        if let Some(slot) = self.report.first_halves.get_mut(index) {
            *slot = Some(report.written);
        }
        self.report.blocks = self.report.blocks.saturating_add(1);
        self.report.level.measure(dae.output(), report.written);

        let stats = dae.stats();
        let delta = StatsDelta::between(&self.last, &stats);
        if !delta.is_quiet() {
            warn!(
                overruns = delta.overruns,
                dropped = delta.dropped,
                malformed = delta.malformed,
                block = self.report.blocks,
                "engine anomaly"
            );
        }
        self.last = stats;
        if self.throttle.tick() {
            info!(
                blocks = stats.blocks,
                midi = stats.midi_messages,
                filtered = stats.filtered,
                overruns = stats.overruns,
                "engine stats"
            );
        }
        self.report.stats = stats;
    }
}

fn start_engine<'a>(
    state: &'a mut SimState,
    config: &SimConfig,
) -> Result<
    (
        dae::IsrHandles<'a, MIDI_QUEUE_CAPACITY>,
        Dae<'a, GatedSource<TestTone>, BLOCK_SIZE, MIDI_QUEUE_CAPACITY>,
    ),
    SimError,
> {
    let (isr, task) = state.split();
    let source = GatedSource::new(TestTone::default(), config.channel);
    let mut output = SimulatedOutput::default();
    let dae = Dae::start(task, source, config.engine, &mut output)?;
    Ok((isr, dae))
}

/// Run `config.blocks` blocks as fast as possible, interleaving simulated
/// interrupts and engine iterations deterministically.
pub fn run_offline(config: &SimConfig) -> Result<SimReport, SimError> {
    let mut state = SimState::new();
    let (mut isr, mut dae) = start_engine(&mut state, config)?;
    let mut recorder = Recorder::new(config);
    let mut consumed = Half::A;

    for block in 0..config.blocks {
        for event in config.script.iter().filter(|e| e.block == block) {
            for &byte in &event.bytes {
                isr.uart.midi_byte_received(byte);
            }
        }
        isr.dma.buffer_half_consumed(consumed);
        consumed = consumed.other();

        let Some(report) = dae.poll_iteration() else {
            return Err(SimError::Stalled { block });
        };
        recorder.record(&dae, &report);
    }

    info!(
        blocks = recorder.report.blocks,
        peak = recorder.report.level.peak(),
        rms = recorder.report.level.rms(),
        "offline run complete"
    );
    Ok(recorder.report)
}

/// Run in real time: DMA interrupts at the true block period, MIDI bytes at
/// their scripted block times.
#[allow(clippy::arithmetic_side_effects)] // Safety: block counts are small; Duration/Instant sums cannot overflow
pub async fn run_realtime(config: &SimConfig) -> Result<SimReport, SimError> {
    let mut state = SimState::new();
    let (isr, mut dae) = start_engine(&mut state, config)?;
    let dae::IsrHandles { dma, mut uart } = isr;
    let period = config.block_period();
    let blocks = config.blocks;

    let dma_ticks = simulate_dma(dma, period, blocks);

    let midi = async {
        let start = tokio::time::Instant::now();
        for event in config.script.iter().filter(|e| e.block < blocks) {
            let at = start + period * event.block;
            tokio::time::sleep_until(at).await;
            for &byte in &event.bytes {
                if !uart.midi_byte_received(byte) {
                    warn!(byte, "MIDI queue full");
                }
            }
        }
    };

    let engine = async {
        let mut recorder = Recorder::new(config);
        // Halves reported by the DMA task, including coalesced ones.
        let mut consumed = 0u32;
        while consumed < blocks {
            match tokio::time::timeout(period * 4, dae.run_iteration()).await {
                Ok(report) => {
                    consumed = consumed.saturating_add(1).saturating_add(report.missed);
                    recorder.record(&dae, &report);
                }
                Err(_) => return Err(SimError::Stalled { block: consumed }),
            }
        }
        Ok(recorder.report)
    };

    let ((), (), result) = tokio::join!(dma_ticks, midi, engine);
    if let Ok(report) = &result {
        info!(
            blocks = report.blocks,
            overruns = report.stats.overruns,
            peak = report.level.peak(),
            "realtime run complete"
        );
    }
    result
}

/// Play the DMA half/complete interrupts: one half per block period.
async fn simulate_dma(dma: DmaIrq<'_>, period: Duration, blocks: u32) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);
    // The first tick completes immediately; the hardware needs a full block.
    interval.tick().await;
    let mut consumed = Half::A;
    for _ in 0..blocks {
        interval.tick().await;
        dma.buffer_half_consumed(consumed);
        consumed = consumed.other();
    }
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_alternates_halves() {
        let config = SimConfig {
            blocks: 8,
            script: Vec::new(),
            ..SimConfig::default()
        };
        let report = run_offline(&config).unwrap();
        assert_eq!(report.blocks, 8);
        assert_eq!(report.first_halves[0], Some(Half::A));
        assert_eq!(report.first_halves[1], Some(Half::B));
        assert_eq!(report.first_halves[2], Some(Half::A));
        assert_eq!(report.stats.overruns, 0);
    }

    #[test]
    fn test_silent_without_notes() {
        let config = SimConfig {
            blocks: 20,
            script: Vec::new(),
            ..SimConfig::default()
        };
        let report = run_offline(&config).unwrap();
        assert_eq!(report.level.peak(), 0.0);
    }

    #[test]
    fn test_demo_script_counts() {
        let report = run_offline(&SimConfig::default()).unwrap();
        let stats = report.stats;
        // Channel 2 note-on is filtered; the leading 0x33 is malformed.
        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.malformed, 1);
        // note on, clock, CC, note off, 2 note ons (running status), 2 note offs.
        assert_eq!(stats.midi_messages, 8);
        assert!(report.level.peak() > 0.9, "tone audible while notes held");
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_gate_tracks_held_notes() {
        let mut source = GatedSource::new(TestTone::default(), MidiChannel::Omni);
        source.prepare(48_000.0, 4);
        let mut parser = dae::MidiParser::new();
        for byte in [0x90, 0x40, 0x7F, 0x41, 0x7F, 0x40, 0x00] {
            if let Some(msg) = parser.push(byte) {
                source.handle_midi(msg);
            }
        }
        // Two note-ons, then velocity-0 note-on releases one.
        assert_eq!(source.held_notes(), 1);
        assert_eq!(source.messages(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_realtime_keeps_up() {
        let config = SimConfig {
            blocks: 50,
            ..SimConfig::default()
        };
        let report = run_realtime(&config).await.unwrap();
        assert_eq!(report.blocks, 50);
        assert_eq!(report.stats.midi_messages, 1);
    }
}

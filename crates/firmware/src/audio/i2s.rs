//! I2S2 + DMA1 stream 4 output driver for the STM32F411.
//!
//! SPI2 runs as I2S master transmitter (Philips, 32-bit data in 32-bit
//! channels, MCLK = 256 x fs). DMA1 stream 4 / channel 0 feeds SPI2_DR from
//! the engine's output buffer in circular mode, 16 bits per transfer, and
//! raises half-transfer (half A read) and transfer-complete (half B read).
//!
//! PLLI2S must already be locked for the requested rate (see
//! `boot::hardware::init_clocks`).
//!
//! # Interrupt
//!
//! `DMA1_STREAM4` calls [`on_dma_interrupt`], which clears the stream flags
//! and reports each consumed half to the engine.

use core::sync::atomic::{compiler_fence, Ordering};

use dae::{AudioOutput, DmaIrq, SampleRateHz};
use stm32_metapac as pac;

use crate::audio::clock_math::I2sClock;
use crate::pins::{self, I2S_PINS};
use crate::registers::{self, StreamEvents, DMA_STREAM};

/// DMA1 HISR/HIFCR index (streams 4–7).
const HIGH_FLAGS: usize = 1;

/// Spins allowed for a disabled stream to release EN.
const STREAM_DISABLE_SPINS: u32 = 10_000;

/// I2S2 transmitter fed by circular DMA.
#[derive(Debug, Default)]
pub struct I2sDmaOutput {
    clock: Option<I2sClock>,
}

impl I2sDmaOutput {
    /// A stopped output. Nothing is touched until `start_audio`.
    pub const fn new() -> Self {
        Self { clock: None }
    }

    /// Clock settings in use, once started.
    pub fn clock(&self) -> Option<I2sClock> {
        self.clock
    }
}

impl AudioOutput for I2sDmaOutput {
    fn start_audio(&mut self, buffer: &mut [i16], sample_rate: SampleRateHz) {
        let clock = I2sClock::for_rate(sample_rate.get());
        defmt::info!(
            "I2S: {=u32} Hz requested, {=u32} Hz actual (I2SDIV={=u8} ODD={=bool})",
            sample_rate.get(),
            clock.actual_rate_hz(),
            clock.div,
            clock.odd
        );

        pac::RCC.ahb1enr().modify(|w| {
            w.set_gpioaen(true);
            w.set_gpioben(true);
            w.set_dma1en(true);
        });
        pac::RCC.apb1enr().modify(|w| w.set_spi2en(true));
        for pin in I2S_PINS {
            pins::hardware::configure(pin);
        }

        let spi = pac::SPI2;
        spi.i2scfgr().write(|w| w.0 = registers::i2scfgr(false));
        spi.i2spr().write(|w| w.0 = registers::i2spr(&clock));
        spi.cr2().modify(|w| w.set_txdmaen(true));

        let stream = pac::DMA1.st(DMA_STREAM);
        stream.cr().write(|w| w.0 = registers::dma_cr(false));
        let mut spins = 0u32;
        while stream.cr().read().en() && spins < STREAM_DISABLE_SPINS {
            spins = spins.saturating_add(1);
        }
        pac::DMA1
            .ifcr(HIGH_FLAGS)
            .write(|w| w.0 = registers::STREAM4_FLAGS);

        let words = buffer.len().min(usize::from(u16::MAX));
        stream.par().write_value(spi.dr().as_ptr() as u32);
        stream.m0ar().write_value(buffer.as_mut_ptr() as u32);
        stream.ndtr().write(|w| w.0 = words as u32);
        // Direct mode: FIFO off.
        stream.fcr().write(|w| w.0 = 0);

        // Buffer contents must be in RAM before the first DMA read.
        compiler_fence(Ordering::Release);
        stream.cr().write(|w| w.0 = registers::dma_cr(true));
        spi.i2scfgr().write(|w| w.0 = registers::i2scfgr(true));

        self.clock = Some(clock);
        defmt::info!(
            "I2S: circular DMA started, {=usize} words ({=usize} frames per half)",
            words,
            words / dae::config::WORDS_PER_FRAME / 2
        );
    }
}

/// Service `DMA1_STREAM4`: clear the observed flags, then hand each consumed
/// half to the engine.
pub fn on_dma_interrupt(dma: &DmaIrq<'_>) -> StreamEvents {
    let hisr = pac::DMA1.isr(HIGH_FLAGS).read().0;
    pac::DMA1
        .ifcr(HIGH_FLAGS)
        .write(|w| w.0 = hisr & registers::STREAM4_FLAGS);
    let events = StreamEvents::from_hisr(hisr);
    for half in events.consumed() {
        dma.buffer_half_consumed(half);
    }
    events
}

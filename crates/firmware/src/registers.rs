//! Raw register words for RCC, SPI2/I2S2, DMA1 stream 4 and USART1.
//!
//! The board code writes these values verbatim, so every bit that reaches
//! the hardware is computed here and checked by host tests. Bit positions
//! follow STM32F411 RM0383 Rev 3.

// Safety: every shift is by a constant below 32 on a masked field.
#![allow(clippy::arithmetic_side_effects)]

use dae::Half;

use crate::audio::clock_math::{I2sClock, I2sPll, PLLI2S_M, PLL_M, PLL_N, PLL_P};

// ── RCC ──────────────────────────────────────────────────────────────────────

/// PLLQ: 200 MHz / 4 = 50 MHz (unused; USB OTG is not clocked).
pub const PLL_Q: u32 = 4;

const PLLCFGR_PLLSRC_HSE: u32 = 1 << 22;

/// RCC_PLLCFGR for the 100 MHz system clock (RM0383 §6.3.2).
#[must_use]
pub const fn pllcfgr() -> u32 {
    // PLLP encodes /2, /4, /6, /8 as 0..=3.
    let p_bits = PLL_P / 2 - 1;
    (PLL_M & 0x3F)
        | ((PLL_N & 0x1FF) << 6)
        | ((p_bits & 0b11) << 16)
        | PLLCFGR_PLLSRC_HSE
        | ((PLL_Q & 0xF) << 24)
}

/// RCC_PLLI2SCFGR for `pll` (RM0383 §6.3.23).
#[must_use]
pub const fn plli2scfgr(pll: I2sPll) -> u32 {
    (PLLI2S_M & 0x3F) | ((pll.n as u32 & 0x1FF) << 6) | ((pll.r as u32 & 0b111) << 28)
}

/// RCC_CFGR prescalers: AHB /1, APB1 /2, APB2 /1 (PPRE1 = 0b100).
pub const CFGR_PRESCALERS: u32 = 0b100 << 10;

/// RCC_CFGR.SW / SWS value selecting the main PLL.
pub const CFGR_SW_PLL: u8 = 0b10;

// ── SPI2 in I2S mode ─────────────────────────────────────────────────────────

const I2SCFGR_CHLEN_32: u32 = 1 << 0;
const I2SCFGR_DATLEN_32: u32 = 0b10 << 1;
const I2SCFGR_I2SCFG_MASTER_TX: u32 = 0b10 << 8;
const I2SCFGR_I2SE: u32 = 1 << 10;
const I2SCFGR_I2SMOD: u32 = 1 << 11;

const I2SPR_ODD: u32 = 1 << 8;
const I2SPR_MCKOE: u32 = 1 << 9;

/// SPI_I2SCFGR: I2S mode, master transmit, Philips standard, 32-bit data in
/// a 32-bit channel, clock idle low. `enable` sets I2SE.
#[must_use]
pub const fn i2scfgr(enable: bool) -> u32 {
    let base = I2SCFGR_I2SMOD | I2SCFGR_I2SCFG_MASTER_TX | I2SCFGR_DATLEN_32 | I2SCFGR_CHLEN_32;
    if enable {
        base | I2SCFGR_I2SE
    } else {
        base
    }
}

/// SPI_I2SPR: prescaler from `clock`, master clock output enabled.
#[must_use]
pub const fn i2spr(clock: &I2sClock) -> u32 {
    let odd = if clock.odd { I2SPR_ODD } else { 0 };
    clock.div as u32 | odd | I2SPR_MCKOE
}

// ── DMA1 stream 4 ────────────────────────────────────────────────────────────

/// SPI2_TX request channel on DMA1 stream 4 (RM0383 Table 27).
pub const DMA_CHANNEL: u32 = 0;

/// Stream index within DMA1.
pub const DMA_STREAM: usize = 4;

const CR_EN: u32 = 1 << 0;
const CR_HTIE: u32 = 1 << 3;
const CR_TCIE: u32 = 1 << 4;
const CR_DIR_M2P: u32 = 0b01 << 6;
const CR_CIRC: u32 = 1 << 8;
const CR_MINC: u32 = 1 << 10;
const CR_PSIZE_16: u32 = 0b01 << 11;
const CR_MSIZE_16: u32 = 0b01 << 13;
const CR_PL_VERY_HIGH: u32 = 0b11 << 16;

/// DMA_SxCR: memory to peripheral, 16-bit both sides, memory increment,
/// circular, half- and full-transfer interrupts, very high priority.
#[must_use]
pub const fn dma_cr(enable: bool) -> u32 {
    let base = (DMA_CHANNEL << 25)
        | CR_PL_VERY_HIGH
        | CR_MSIZE_16
        | CR_PSIZE_16
        | CR_MINC
        | CR_CIRC
        | CR_DIR_M2P
        | CR_TCIE
        | CR_HTIE;
    if enable {
        base | CR_EN
    } else {
        base
    }
}

/// Stream 4 flags in DMA_HISR / DMA_HIFCR (bits 5:0).
pub const STREAM4_FLAGS: u32 = 0b11_1101;

const HISR_FEIF4: u32 = 1 << 0;
const HISR_DMEIF4: u32 = 1 << 2;
const HISR_TEIF4: u32 = 1 << 3;
const HISR_HTIF4: u32 = 1 << 4;
const HISR_TCIF4: u32 = 1 << 5;

/// Decoded stream 4 interrupt flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub struct StreamEvents {
    /// First half of the buffer has been read.
    pub half_transfer: bool,
    /// Second half has been read; the transfer wrapped.
    pub transfer_complete: bool,
    /// Transfer, direct-mode or FIFO error.
    pub error: bool,
}

impl StreamEvents {
    /// Decode DMA_HISR.
    #[must_use]
    pub const fn from_hisr(hisr: u32) -> Self {
        Self {
            half_transfer: hisr & HISR_HTIF4 != 0,
            transfer_complete: hisr & HISR_TCIF4 != 0,
            error: hisr & (HISR_TEIF4 | HISR_DMEIF4 | HISR_FEIF4) != 0,
        }
    }

    /// Halves the hardware finished with. With both flags set (a late
    /// interrupt), HT is reported before TC.
    pub fn consumed(self) -> impl Iterator<Item = Half> {
        let first = self.half_transfer.then_some(Half::A);
        let second = self.transfer_complete.then_some(Half::B);
        first.into_iter().chain(second)
    }
}

// ── USART1 ───────────────────────────────────────────────────────────────────

const CR1_RE: u32 = 1 << 2;
const CR1_RXNEIE: u32 = 1 << 5;
const CR1_UE: u32 = 1 << 13;

/// USART_CR1: receiver only, 8N1, 16x oversampling, RXNE interrupt (which
/// also fires on overrun).
pub const USART_CR1_MIDI_RX: u32 = CR1_UE | CR1_RXNEIE | CR1_RE;

const SR_ORE: u32 = 1 << 3;
const SR_RXNE: u32 = 1 << 5;
const SR_FE: u32 = 1 << 1;
const SR_NF: u32 = 1 << 2;

/// Decoded USART_SR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub struct UartStatus {
    /// A byte is waiting in DR.
    pub received: bool,
    /// A byte was lost in hardware before DR was read.
    pub overrun: bool,
    /// Framing error or noise on the last byte.
    pub line_error: bool,
}

impl UartStatus {
    /// Decode USART_SR.
    #[must_use]
    pub const fn from_sr(sr: u32) -> Self {
        Self {
            received: sr & SR_RXNE != 0,
            overrun: sr & SR_ORE != 0,
            line_error: sr & (SR_FE | SR_NF) != 0,
        }
    }

    /// Whether DR must be read to clear the interrupt (RXNE or ORE).
    #[must_use]
    pub const fn needs_read(self) -> bool {
        self.received || self.overrun
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pllcfgr_fields() {
        let value = pllcfgr();
        assert_eq!(value & 0x3F, 25, "PLLM");
        assert_eq!((value >> 6) & 0x1FF, 200, "PLLN");
        assert_eq!((value >> 16) & 0b11, 0, "PLLP = /2");
        assert_ne!(value & (1 << 22), 0, "PLLSRC = HSE");
        assert_eq!((value >> 24) & 0xF, 4, "PLLQ");
    }

    #[test]
    fn plli2scfgr_for_48k() {
        let value = plli2scfgr(I2sPll::RATE_48K);
        assert_eq!(value & 0x3F, 25);
        assert_eq!((value >> 6) & 0x1FF, 258);
        assert_eq!((value >> 28) & 0b111, 3);
    }

    #[test]
    fn i2s_is_master_tx_philips_32bit() {
        let value = i2scfgr(false);
        assert_eq!(value, 0b1010_0000_0101);
        assert_eq!(i2scfgr(true), value | (1 << 10));
    }

    #[test]
    fn i2spr_carries_div_odd_and_mckoe() {
        let clock = I2sClock::for_rate(48_000);
        assert_eq!(i2spr(&clock), 3 | (1 << 8) | (1 << 9));
    }

    #[test]
    fn dma_cr_is_circular_halfword_m2p() {
        let value = dma_cr(true);
        assert_eq!(value & 1, 1);
        assert_eq!((value >> 6) & 0b11, 0b01, "DIR");
        assert_ne!(value & (1 << 8), 0, "CIRC");
        assert_eq!((value >> 11) & 0b11, 0b01, "PSIZE");
        assert_eq!((value >> 13) & 0b11, 0b01, "MSIZE");
        assert_eq!((value >> 25) & 0b111, 0, "CHSEL");
        assert_eq!(value & 0b1_1000, 0b1_1000, "HTIE | TCIE");
        assert_eq!(dma_cr(false) & 1, 0);
    }

    #[test]
    fn stream_events_map_to_halves() {
        let ht = StreamEvents::from_hisr(1 << 4);
        assert_eq!(ht.consumed().collect::<Vec<_>>(), [Half::A]);
        let tc = StreamEvents::from_hisr(1 << 5);
        assert_eq!(tc.consumed().collect::<Vec<_>>(), [Half::B]);
        let both = StreamEvents::from_hisr(0b11_0000);
        assert_eq!(both.consumed().collect::<Vec<_>>(), [Half::A, Half::B]);
        assert!(!both.error);
    }

    #[test]
    fn stream_events_ignore_other_streams() {
        // Stream 5 flags start at bit 6.
        let events = StreamEvents::from_hisr(0b11_1101 << 6);
        assert_eq!(events, StreamEvents::default());
        assert!(StreamEvents::from_hisr(1 << 3).error);
    }

    #[test]
    fn uart_status_decoding() {
        let status = UartStatus::from_sr(1 << 5);
        assert!(status.received && status.needs_read());
        let overrun = UartStatus::from_sr(1 << 3);
        assert!(!overrun.received && overrun.needs_read());
        assert!(UartStatus::from_sr(1 << 1).line_error);
        assert!(!UartStatus::from_sr(0).needs_read());
    }

    #[test]
    fn usart_cr1_enables_rx_only() {
        assert_eq!(USART_CR1_MIDI_RX, (1 << 13) | (1 << 5) | (1 << 2));
        assert_eq!(USART_CR1_MIDI_RX & (1 << 3), 0, "TE off");
    }
}

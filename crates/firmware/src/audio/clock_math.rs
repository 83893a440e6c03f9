//! Clock-tree arithmetic for the STM32F411CE blackpill: system PLL, PLLI2S
//! and I2S prescaler, USART baud divisor.
//!
//! Everything here is pure integer math so it can be checked on the host.
//! [`crate::registers`] turns the results into RCC, SPI2 and USART1 words.
//!
//! # Clock Tree
//!
//!   HSE (25 MHz) -> PLLM (div 25) -> VCO_IN (1 MHz)
//!                     -> PLLN (x200) -> VCO (200 MHz) -> PLLP (div 2) -> SYSCLK 100 MHz
//!                                                                   -> APB1 (div 2) 50 MHz
//!                                                                   -> APB2 (div 1) 100 MHz -> USART1
//!                -> PLLI2SM (div 25) -> 1 MHz
//!                     -> PLLI2SN / PLLI2SR -> I2SCLK -> SPI2 (I2S2) prescaler -> MCLK = 256 x fs
//!
//! # I2S sample rate (master clock output enabled)
//!
//!   fs = I2SCLK / (256 x (2 x I2SDIV + ODD))
//!
//! PLLI2S N/R come from RM0383 Table 90 for a 1 MHz PLLI2S input. I2SDIV and
//! ODD are derived from the requested rate the same way the reference
//! manual's rounding does it, so rates outside the table still land close.
//!
//! References:
//! - STM32F411 RM0383 Rev 3, §6.3.2 (RCC_PLLCFGR), §6.3.23 (RCC_PLLI2SCFGR)
//! - STM32F411 RM0383 Rev 3, §20.4.4 (clock generator), Table 90
//! - STM32F411 RM0383 Rev 3, §19.3.4 (fractional baud rate generation)

/// External crystal on the blackpill.
pub const HSE_HZ: u32 = 25_000_000;

/// Main PLL input divider: HSE / 25 = 1 MHz (RM0383: 1–2 MHz VCO input).
pub const PLL_M: u32 = 25;

/// Main PLL multiplier: 1 MHz x 200 = 200 MHz VCO (100–432 MHz).
pub const PLL_N: u32 = 200;

/// Main PLL output divider: 200 MHz / 2 = 100 MHz SYSCLK (F411 maximum).
pub const PLL_P: u32 = 2;

/// PLLI2S input divider: HSE / 25 = 1 MHz, matching Table 90.
pub const PLLI2S_M: u32 = 25;

/// APB1 prescaler (APB1 must stay at or below 50 MHz).
pub const APB1_DIV: u32 = 2;

/// Resulting system clock.
pub const SYSCLK_HZ: u32 = HSE_HZ / PLL_M * PLL_N / PLL_P;

/// APB2 clock; feeds USART1.
pub const PCLK2_HZ: u32 = SYSCLK_HZ;

/// APB1 clock.
pub const PCLK1_HZ: u32 = SYSCLK_HZ / APB1_DIV;

/// MIDI baud rate.
pub const MIDI_BAUD: u32 = 31_250;

/// Flash wait states for 100 MHz at 3.3 V (RM0383 Table 5).
pub const FLASH_LATENCY: u8 = 3;

/// MCLK/fs ratio with master clock output enabled.
pub const MCLK_FS_RATIO: u32 = 256;

/// PLLI2S multiplier and output divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub struct I2sPll {
    /// PLLI2SN (50–432).
    pub n: u16,
    /// PLLI2SR (2–7).
    pub r: u8,
}

impl I2sPll {
    /// 44.1 kHz family: 1 MHz x 271 / 2 = 135.5 MHz.
    pub const RATE_44K1: Self = Self { n: 271, r: 2 };
    /// 48 kHz: 1 MHz x 258 / 3 = 86 MHz.
    pub const RATE_48K: Self = Self { n: 258, r: 3 };
    /// 96 kHz: 1 MHz x 344 / 2 = 172 MHz.
    pub const RATE_96K: Self = Self { n: 344, r: 2 };

    /// PLL settings for `sample_rate_hz`. Rates not in the table use the
    /// 44.1 kHz PLL and rely on the prescaler to approximate.
    #[must_use]
    pub const fn for_rate(sample_rate_hz: u32) -> Self {
        match sample_rate_hz {
            48_000 => Self::RATE_48K,
            96_000 => Self::RATE_96K,
            _ => Self::RATE_44K1,
        }
    }

    /// I2SCLK produced by this PLL setting.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: r >= 2; 1 MHz x 432 fits u32
    pub const fn i2sclk_hz(&self) -> u32 {
        HSE_HZ / PLLI2S_M * self.n as u32 / self.r as u32
    }
}

/// Complete I2S clock configuration for one sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub struct I2sClock {
    /// PLLI2S settings.
    pub pll: I2sPll,
    /// SPI_I2SPR.I2SDIV (2–255).
    pub div: u8,
    /// SPI_I2SPR.ODD.
    pub odd: bool,
}

impl I2sClock {
    /// Clock settings for `sample_rate_hz` with MCLK output enabled.
    ///
    /// `sample_rate_hz` must be non-zero; the result saturates the prescaler
    /// to its legal range.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: sample_rate_hz >= 8 000 (SampleRateHz), all values < 2^32
    #[allow(clippy::cast_possible_truncation)] // Safety: clamped to 2..=255 before the cast
    pub fn for_rate(sample_rate_hz: u32) -> Self {
        let pll = I2sPll::for_rate(sample_rate_hz);
        let rate = sample_rate_hz.max(1);
        // Rounded to the nearest integer, as RM0383 §20.4.4 recommends.
        let divider = ((pll.i2sclk_hz() / MCLK_FS_RATIO) * 10 / rate + 5) / 10;
        let odd = divider & 1 == 1;
        let div = ((divider - u32::from(odd)) / 2).clamp(2, 255) as u8;
        Self { pll, div, odd }
    }

    /// Sample rate the hardware will actually produce.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: div >= 2, so the divisor is >= 1024
    pub fn actual_rate_hz(&self) -> u32 {
        let divider = 2 * u32::from(self.div) + u32::from(self.odd);
        self.pll.i2sclk_hz() / (MCLK_FS_RATIO * divider)
    }

    /// Deviation from `sample_rate_hz` in parts per million.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: i64 holds the product of two u32 values
    pub fn error_ppm(&self, sample_rate_hz: u32) -> i64 {
        let actual = i64::from(self.actual_rate_hz());
        let target = i64::from(sample_rate_hz.max(1));
        (actual - target) * 1_000_000 / target
    }
}

/// USART_BRR value for `baud` at `pclk_hz`, 16x oversampling.
///
/// With OVER8 = 0 the register holds USARTDIV x 16 directly (mantissa in
/// bits 15:4, fraction in 3:0), so this is `pclk / baud` rounded.
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // Safety: baud > 0 (max(1)), sums stay far below u32::MAX
#[allow(clippy::cast_possible_truncation)] // Safety: clamped to u16 range before the cast
pub fn usart_brr(pclk_hz: u32, baud: u32) -> u16 {
    let baud = baud.max(1);
    ((pclk_hz + baud / 2) / baud).min(u32::from(u16::MAX)) as u16
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    /// RM0383 §6.3.2: VCO input must be 1–2 MHz.
    #[test]
    fn pll_m_gives_valid_vco_input() {
        let vco_input = HSE_HZ / PLL_M;
        assert!((1_000_000..=2_000_000).contains(&vco_input), "VCO input {vco_input} Hz");
    }

    /// RM0383 §6.3.2: VCO output must be 100–432 MHz.
    #[test]
    fn pll_n_gives_valid_vco_output() {
        let vco = HSE_HZ / PLL_M * PLL_N;
        assert!((100_000_000..=432_000_000).contains(&vco), "VCO output {vco} Hz");
    }

    #[test]
    fn sysclk_is_100mhz_and_apb1_within_limit() {
        assert_eq!(SYSCLK_HZ, 100_000_000);
        assert!(PCLK1_HZ <= 50_000_000, "APB1 {PCLK1_HZ} Hz exceeds 50 MHz");
    }

    #[test]
    fn i2s_48k_matches_table_90() {
        let clock = I2sClock::for_rate(48_000);
        assert_eq!(clock.pll, I2sPll::RATE_48K);
        assert_eq!(clock.div, 3);
        assert!(clock.odd);
        assert_eq!(clock.actual_rate_hz(), 47_991);
    }

    #[test]
    fn i2s_44k1_matches_table_90() {
        let clock = I2sClock::for_rate(44_100);
        assert_eq!(clock.div, 6);
        assert!(!clock.odd);
        assert_eq!(clock.actual_rate_hz(), 44_108);
    }

    /// Every table rate must be within 0.05 % (500 ppm) of nominal.
    #[test]
    fn table_rates_are_within_500_ppm() {
        for rate in [44_100, 48_000, 96_000] {
            let clock = I2sClock::for_rate(rate);
            let ppm = clock.error_ppm(rate);
            assert!(ppm.abs() < 500, "{rate} Hz: {} Hz actual, {ppm} ppm", clock.actual_rate_hz());
        }
    }

    /// RM0383 §6.3.23: PLLI2SN 50–432, PLLI2SR 2–7, VCO 100–432 MHz.
    #[test]
    fn plli2s_table_entries_in_range() {
        for pll in [I2sPll::RATE_44K1, I2sPll::RATE_48K, I2sPll::RATE_96K] {
            assert!((50..=432).contains(&pll.n));
            assert!((2..=7).contains(&pll.r));
            let vco = HSE_HZ / PLLI2S_M * u32::from(pll.n);
            assert!((100_000_000..=432_000_000).contains(&vco));
        }
    }

    #[test]
    fn prescaler_stays_legal_for_extreme_rates() {
        let slow = I2sClock::for_rate(8_000);
        assert!(slow.div >= 2);
        let fast = I2sClock::for_rate(192_000);
        assert_eq!(fast.div, 2, "clamped to the minimum divider");
    }

    /// 100 MHz / 31 250 = 3200 = 0xC80 (mantissa 200, fraction 0).
    #[test]
    fn midi_baud_divisor() {
        assert_eq!(usart_brr(PCLK2_HZ, MIDI_BAUD), 0x0C80);
    }
}

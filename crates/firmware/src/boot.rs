//! Hardware boot sequence for the SynthCore blackpill.
//!
//! Initialization order (MUST be respected):
//!   1. FLASH wait states + ART caches, before SYSCLK rises
//!   2. PWR voltage scale 1 (required above 84 MHz)
//!   3. HSE 25 MHz crystal
//!   4. Main PLL -> 100 MHz SYSCLK, APB1 /2
//!   5. PLLI2S for the configured sample rate
//!   6. Engine start (I2S + circular DMA armed by `Dae::start`)
//!   7. USART1 MIDI receiver, after the engine's ISR handles are installed
//!
//! Every wait on a ready flag is bounded; a clock that never locks is a
//! [`BootError`], not a hang.

use thiserror_no_std::Error;

use crate::audio::clock_math::I2sClock;

/// Ordered list of boot steps, for logs and tests.
pub const BOOT_SEQUENCE_STEPS: &[&str] = &[
    "1. FLASH: 3 wait states, prefetch + I/D caches before raising SYSCLK",
    "2. PWR: voltage scale 1 for 100 MHz",
    "3. HSE: start 25 MHz crystal",
    "4. PLL: 25 MHz / 25 x 200 / 2 = 100 MHz SYSCLK, APB1 50 MHz",
    "5. PLLI2S: MCLK PLL for the configured sample rate",
    "6. Engine: start_audio arms I2S2 + DMA1 stream 4",
    "7. MIDI: USART1 RX at 31250 baud, interrupt unmasked",
];

/// Spin iterations allowed for any ready flag. At 16 MHz HSI this is ~10 ms,
/// far beyond the HSE start-up time (2 ms typical).
pub const READY_SPIN_LIMIT: u32 = 100_000;

/// Clock bring-up failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub enum BootError {
    /// HSERDY never set: crystal missing or not oscillating.
    #[error("HSE did not start")]
    HseTimeout,
    /// PLLRDY never set.
    #[error("main PLL did not lock")]
    PllTimeout,
    /// PLLI2SRDY never set.
    #[error("PLLI2S did not lock")]
    PllI2sTimeout,
    /// SWS never reported the PLL as system clock.
    #[error("system clock switch to PLL failed")]
    ClockSwitchTimeout,
}

/// Poll `ready` up to `limit` times.
///
/// # Errors
///
/// Returns `error` if `ready` never returned `true`.
pub fn wait_ready(
    mut ready: impl FnMut() -> bool,
    limit: u32,
    error: BootError,
) -> Result<(), BootError> {
    for _ in 0..limit {
        if ready() {
            return Ok(());
        }
    }
    Err(error)
}

/// Clock settings chosen at boot, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub struct ClockReport {
    /// System clock in Hz.
    pub sysclk_hz: u32,
    /// I2S clock settings.
    pub i2s: I2sClock,
}

// ── Hardware-only init ────────────────────────────────────────────────────────
//
// Only compiled for the target. Host tests never link this module.

#[cfg(feature = "hardware")]
pub mod hardware {
    //! RCC, FLASH and PWR register writes.

    use dae::SampleRateHz;
    use stm32_metapac as pac;

    use super::{wait_ready, BootError, ClockReport, READY_SPIN_LIMIT};
    use crate::audio::clock_math::{I2sClock, FLASH_LATENCY, SYSCLK_HZ};
    use crate::registers::{self, CFGR_PRESCALERS, CFGR_SW_PLL};

    /// PWR_CR.VOS = scale 1.
    const PWR_CR_VOS_SCALE1: u32 = 0b11 << 14;

    /// Bring SYSCLK to 100 MHz from HSE and lock PLLI2S for `sample_rate`.
    ///
    /// # Errors
    ///
    /// Returns the first oscillator or PLL that failed to become ready. The
    /// chip is left running from HSI in that case.
    pub fn init_clocks(sample_rate: SampleRateHz) -> Result<ClockReport, BootError> {
        let rcc = pac::RCC;

        pac::FLASH.acr().modify(|w| {
            w.set_latency(pac::flash::vals::Latency::from_bits(FLASH_LATENCY));
            w.set_prften(true);
            w.set_icen(true);
            w.set_dcen(true);
        });

        rcc.apb1enr().modify(|w| w.set_pwren(true));
        pac::PWR.cr1().modify(|w| w.0 |= PWR_CR_VOS_SCALE1);

        rcc.cr().modify(|w| w.set_hseon(true));
        wait_ready(|| rcc.cr().read().hserdy(), READY_SPIN_LIMIT, BootError::HseTimeout)?;

        rcc.cr().modify(|w| w.set_pllon(false));
        rcc.pllcfgr().write(|w| w.0 = registers::pllcfgr());
        rcc.cr().modify(|w| w.set_pllon(true));
        wait_ready(|| rcc.cr().read().pllrdy(), READY_SPIN_LIMIT, BootError::PllTimeout)?;

        rcc.cfgr().modify(|w| {
            // SW in bits 1:0, prescalers in 15:4.
            w.0 = (w.0 & !0xFFF3) | CFGR_PRESCALERS | u32::from(CFGR_SW_PLL);
        });
        wait_ready(
            || (rcc.cfgr().read().0 >> 2) & 0b11 == u32::from(CFGR_SW_PLL),
            READY_SPIN_LIMIT,
            BootError::ClockSwitchTimeout,
        )?;

        let i2s = I2sClock::for_rate(sample_rate.get());
        rcc.cr().modify(|w| w.set_plli2son(false));
        rcc.plli2scfgr().write(|w| w.0 = registers::plli2scfgr(i2s.pll));
        rcc.cr().modify(|w| w.set_plli2son(true));
        wait_ready(
            || rcc.cr().read().plli2srdy(),
            READY_SPIN_LIMIT,
            BootError::PllI2sTimeout,
        )?;

        Ok(ClockReport {
            sysclk_hz: SYSCLK_HZ,
            i2s,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

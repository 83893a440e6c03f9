//! Pin assignments for the STM32F411CE blackpill.
//!
//! | Signal    | Pin  | AF | Peripheral  |
//! |-----------|------|----|-------------|
//! | I2S2_MCK  | PA3  | 5  | SPI2 / I2S2 |
//! | I2S2_CK   | PB10 | 5  | SPI2 / I2S2 |
//! | I2S2_WS   | PB12 | 5  | SPI2 / I2S2 |
//! | I2S2_SD   | PB15 | 5  | SPI2 / I2S2 |
//! | USART1_RX | PA10 | 7  | USART1      |
//!
//! Alternate-function numbers from the STM32F411xC/E datasheet, Table 9.

/// GPIO port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub enum Port {
    /// GPIOA
    A,
    /// GPIOB
    B,
}

/// A pin routed to a peripheral through the alternate-function mux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub struct AltPin {
    /// Port.
    pub port: Port,
    /// Pin number, 0–15.
    pub pin: u8,
    /// Alternate function, 0–15.
    pub af: u8,
}

impl AltPin {
    const fn new(port: Port, pin: u8, af: u8) -> Self {
        Self { port, pin, af }
    }
}

/// I2S2 master clock.
pub const I2S_MCK: AltPin = AltPin::new(Port::A, 3, 5);
/// I2S2 bit clock.
pub const I2S_CK: AltPin = AltPin::new(Port::B, 10, 5);
/// I2S2 word select.
pub const I2S_WS: AltPin = AltPin::new(Port::B, 12, 5);
/// I2S2 serial data out.
pub const I2S_SD: AltPin = AltPin::new(Port::B, 15, 5);

/// All I2S pins.
pub const I2S_PINS: [AltPin; 4] = [I2S_MCK, I2S_CK, I2S_WS, I2S_SD];

/// MIDI in.
pub const MIDI_RX: AltPin = AltPin::new(Port::A, 10, 7);

#[cfg(feature = "hardware")]
pub(crate) mod hardware {
    //! Alternate-function setup via direct register access.

    use stm32_metapac as pac;
    use pac::gpio::vals::{Moder, Ospeedr};

    use super::{AltPin, Port};

    /// Route `pin` to its peripheral at very high output speed.
    pub(crate) fn configure(pin: AltPin) {
        let gpio = match pin.port {
            Port::A => pac::GPIOA,
            Port::B => pac::GPIOB,
        };
        let n = usize::from(pin.pin);
        gpio.ospeedr().modify(|w| w.set_ospeedr(n, Ospeedr::VERYHIGHSPEED));
        gpio.afr(n / 8).modify(|w| w.set_afr(n % 8, pin.af));
        gpio.moder().modify(|w| w.set_moder(n, Moder::ALTERNATE));
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn pins_are_distinct_and_in_range() {
        let mut all = I2S_PINS.to_vec();
        all.push(MIDI_RX);
        for (i, a) in all.iter().enumerate() {
            assert!(a.pin < 16 && a.af < 16);
            for b in all.iter().skip(i + 1) {
                assert!(!(a.port == b.port && a.pin == b.pin), "{a:?} used twice");
            }
        }
    }

    #[test]
    fn i2s_pins_use_af5() {
        assert!(I2S_PINS.iter().all(|p| p.af == 5));
        assert_eq!(MIDI_RX.af, 7);
    }
}

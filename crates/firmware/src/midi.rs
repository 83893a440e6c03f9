//! MIDI input on USART1 (PA10), 31 250 baud, 8N1, receive interrupt.
//!
//! The interrupt reads one byte per RXNE and pushes it into the engine's
//! queue through [`UartIrq`]. Bytes with a framing error or noise flag are
//! discarded; the parser resynchronises on the next status byte.

use dae::UartIrq;

use crate::registers::UartStatus;

/// What the receive interrupt did with one status/data pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "hardware", derive(defmt::Format))]
pub enum RxOutcome {
    /// Byte queued for the audio task.
    Queued,
    /// Queue full; byte dropped and counted by the queue.
    QueueFull,
    /// Framing error or noise; byte discarded.
    LineError,
    /// Nothing received (spurious interrupt).
    Idle,
}

/// Route one received byte. `data` is only meaningful when `status` says a
/// byte (or an overrun) was latched.
pub fn handle_rx<const QUEUE: usize>(
    status: UartStatus,
    data: u8,
    uart: &mut UartIrq<'_, QUEUE>,
) -> RxOutcome {
    if !status.needs_read() {
        return RxOutcome::Idle;
    }
    if status.line_error {
        return RxOutcome::LineError;
    }
    if uart.midi_byte_received(data) {
        RxOutcome::Queued
    } else {
        RxOutcome::QueueFull
    }
}

#[cfg(feature = "hardware")]
pub mod hardware {
    //! USART1 register access.

    use dae::UartIrq;
    use stm32_metapac as pac;

    use super::{handle_rx, RxOutcome};
    use crate::audio::clock_math::{usart_brr, MIDI_BAUD, PCLK2_HZ};
    use crate::pins::{self, MIDI_RX};
    use crate::registers::{UartStatus, USART_CR1_MIDI_RX};

    /// Clock, pin and enable USART1 as a 31 250 baud receiver with RXNEIE.
    pub fn init_usart1() {
        pac::RCC.ahb1enr().modify(|w| w.set_gpioaen(true));
        pac::RCC.apb2enr().modify(|w| w.set_usart1en(true));
        pins::hardware::configure(MIDI_RX);

        let usart = pac::USART1;
        usart.cr1().write(|w| w.0 = 0);
        usart.brr().write(|w| w.0 = u32::from(usart_brr(PCLK2_HZ, MIDI_BAUD)));
        usart.cr2().write(|w| w.0 = 0);
        usart.cr3().write(|w| w.0 = 0);
        usart.cr1().write(|w| w.0 = USART_CR1_MIDI_RX);
        defmt::info!("MIDI: USART1 RX on PA10, {=u32} baud", MIDI_BAUD);
    }

    /// Service `USART1`. Reading SR then DR clears RXNE, ORE and the error
    /// flags in one go.
    pub fn on_usart_interrupt<const QUEUE: usize>(uart: &mut UartIrq<'_, QUEUE>) -> RxOutcome {
        let usart = pac::USART1;
        let status = UartStatus::from_sr(usart.sr().read().0);
        if !status.needs_read() {
            return RxOutcome::Idle;
        }
        let data = usart.dr().read().0 as u8;
        handle_rx(status, data, uart)
    }

    /// Read and drop any pending byte. Used before the engine handles exist.
    pub fn discard_pending() {
        let usart = pac::USART1;
        if UartStatus::from_sr(usart.sr().read().0).needs_read() {
            let _ = usart.dr().read();
        }
    }
}

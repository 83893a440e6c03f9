//! Shared engine state and its split into interrupt and task handles.
//!
//! Everything the interrupts and the audio task share lives in one
//! [`DaeState`]. [`DaeState::split`] borrows it mutably once and hands out
//! handles whose types encode who may do what:
//!
//! | Handle         | Context        | May                                  |
//! |----------------|----------------|--------------------------------------|
//! | [`DmaIrq`]     | DMA HT/TC ISR  | publish the active half, wake task   |
//! | [`UartIrq`]    | UART RX ISR    | push MIDI bytes                      |
//! | [`TaskHandles`]| audio task     | pop MIDI bytes, write output buffer  |
//!
//! On hardware the state sits in a `static` and `split` is called on a
//! `&'static mut`, so the handles are `'static` too.

use crate::double_buffer::{Half, OutputBuffer};
use crate::handoff::BufferReady;
use crate::midi::{MidiConsumer, MidiProducer, MidiQueue};

/// All state shared between interrupt context and the audio task.
pub struct DaeState<const FRAMES: usize, const QUEUE: usize> {
    output: OutputBuffer<FRAMES>,
    midi: MidiQueue<QUEUE>,
    ready: BufferReady,
}

impl<const FRAMES: usize, const QUEUE: usize> DaeState<FRAMES, QUEUE> {
    /// Silent output, empty queue, half A in flight.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            output: OutputBuffer::new(),
            midi: MidiQueue::new(),
            ready: BufferReady::new(),
        }
    }

    /// Hand out the interrupt-side and task-side handles.
    pub fn split(&mut self) -> (IsrHandles<'_, QUEUE>, TaskHandles<'_, FRAMES, QUEUE>) {
        let (producer, consumer) = self.midi.split();
        let ready = &self.ready;
        (
            IsrHandles {
                dma: DmaIrq { ready },
                uart: UartIrq { producer },
            },
            TaskHandles {
                output: &mut self.output,
                midi: consumer,
                ready,
            },
        )
    }
}

impl<const FRAMES: usize, const QUEUE: usize> Default for DaeState<FRAMES, QUEUE> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Interrupt side ───────────────────────────────────────────────────────────

/// Both interrupt-side handles.
pub struct IsrHandles<'a, const QUEUE: usize> {
    /// For the DMA half/complete-transfer interrupt.
    pub dma: DmaIrq<'a>,
    /// For the UART receive interrupt.
    pub uart: UartIrq<'a, QUEUE>,
}

/// DMA interrupt handle.
#[derive(Clone, Copy)]
pub struct DmaIrq<'a> {
    ready: &'a BufferReady,
}

impl DmaIrq<'_> {
    /// `consumed` has been fully transferred and is now writable.
    pub fn buffer_half_consumed(&self, consumed: Half) {
        self.ready.buffer_half_consumed(consumed);
    }
}

/// UART interrupt handle. Owns the only MIDI producer.
pub struct UartIrq<'a, const QUEUE: usize> {
    producer: MidiProducer<'a, QUEUE>,
}

impl<const QUEUE: usize> UartIrq<'_, QUEUE> {
    /// One byte arrived. Returns `false` if the queue was full and the byte
    /// was dropped.
    pub fn midi_byte_received(&mut self, byte: u8) -> bool {
        self.producer.write(byte)
    }

    /// Bytes dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.producer.dropped()
    }
}

// ── Task side ────────────────────────────────────────────────────────────────

/// Audio-task handles, moved into the scheduler.
pub struct TaskHandles<'a, const FRAMES: usize, const QUEUE: usize> {
    pub(crate) output: &'a mut OutputBuffer<FRAMES>,
    pub(crate) midi: MidiConsumer<'a, QUEUE>,
    pub(crate) ready: &'a BufferReady,
}

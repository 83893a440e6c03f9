//! Lock-free single-producer / single-consumer MIDI byte queue.
//!
//! The UART receive interrupt is the only producer; the audio task is the
//! only consumer. Each side owns one index and only reads the other's:
//!
//! | Index   | Written by      | Read by          |
//! |---------|-----------------|------------------|
//! | `write` | producer (ISR)  | consumer (task)  |
//! | `read`  | consumer (task) | producer (ISR)   |
//!
//! The partner's index is loaded with `Acquire`, one's own is published with
//! `Release`, so a slot's byte is visible before the index that hands it
//! over. No critical section, no mutex, no read-modify-write: `write()` is
//! safe to call from any interrupt priority.
//!
//! Exclusive roles are enforced by the type system: [`MidiQueue::split`]
//! borrows the queue mutably and hands out exactly one [`MidiProducer`] and
//! one [`MidiConsumer`].
//!
//! # Capacity
//!
//! Both indices wrap modulo `N`. The queue is empty when they are equal and
//! full when `write + 1 == read (mod N)`, so one slot is always sacrificed and
//! at most `N - 1` bytes are buffered.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use super::message::ACTIVE_SENSING;

/// Fixed-capacity SPSC byte queue.
pub struct MidiQueue<const N: usize> {
    slots: [UnsafeCell<u8>; N],
    write: AtomicUsize,
    read: AtomicUsize,
    dropped: AtomicU32,
}

// SAFETY: slot `i` is written only by the single producer while `i` lies
// outside the readable range, and read only by the single consumer after the
// producer published it with a Release store of `write`. `split` makes the
// single-producer / single-consumer roles unforgeable.
unsafe impl<const N: usize> Sync for MidiQueue<N> {}

impl<const N: usize> MidiQueue<N> {
    const CAPACITY_OK: () = assert!(N >= 2, "MidiQueue needs at least two slots");

    /// Create an empty queue. `const` so it can live in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            slots: [const { UnsafeCell::new(0) }; N],
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Split into the producer (interrupt side) and consumer (task side).
    pub fn split(&mut self) -> (MidiProducer<'_, N>, MidiConsumer<'_, N>) {
        let queue: &Self = self;
        (MidiProducer { queue }, MidiConsumer { queue })
    }

    /// Bytes currently buffered (a snapshot; may change concurrently).
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: both indices < N, so write + N - read cannot overflow
    pub fn len(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        (write + N - read) % N
    }

    /// `true` when no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of bytes the queue can hold (`N - 1`).
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: N >= 2 (CAPACITY_OK)
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Bytes dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: index < N, +1 cannot overflow usize
    fn next(index: usize) -> usize {
        (index + 1) % N
    }
}

impl<const N: usize> Default for MidiQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Producer ─────────────────────────────────────────────────────────────────

/// Interrupt-side handle. Exactly one exists per queue.
pub struct MidiProducer<'a, const N: usize> {
    queue: &'a MidiQueue<N>,
}

impl<const N: usize> MidiProducer<'_, N> {
    /// Enqueue one received byte. O(1), never blocks.
    ///
    /// Active-sensing (`0xFE`) is consumed here and never queued. Returns
    /// `false` and drops the byte when the queue is full.
    pub fn write(&mut self, byte: u8) -> bool {
        if byte == ACTIVE_SENSING {
            return true;
        }
        let q = self.queue;
        let write = q.write.load(Ordering::Relaxed);
        let next = MidiQueue::<N>::next(write);
        if next == q.read.load(Ordering::Acquire) {
            // Single writer: load + store is enough, no RMW needed.
            let dropped = q.dropped.load(Ordering::Relaxed);
            q.dropped.store(dropped.wrapping_add(1), Ordering::Relaxed);
            return false;
        }
        if let Some(slot) = q.slots.get(write) {
            // SAFETY: `write` is outside the readable range [read, write), so
            // the consumer does not touch this slot until the store below.
            unsafe { *slot.get() = byte };
        }
        q.write.store(next, Ordering::Release);
        true
    }

    /// Bytes dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.queue.dropped()
    }
}

// ── Consumer ─────────────────────────────────────────────────────────────────

/// Task-side handle. Exactly one exists per queue.
pub struct MidiConsumer<'a, const N: usize> {
    queue: &'a MidiQueue<N>,
}

impl<'a, const N: usize> MidiConsumer<'a, N> {
    /// Dequeue the oldest byte, or `None` when empty.
    pub fn try_read(&mut self) -> Option<u8> {
        let q = self.queue;
        let read = q.read.load(Ordering::Relaxed);
        if read == q.write.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: `read` is inside [read, write); the producer published this
        // slot with the Release store we just synchronised with and will not
        // overwrite it until `read` advances.
        let byte = q.slots.get(read).map(|slot| unsafe { *slot.get() });
        q.read.store(MidiQueue::<N>::next(read), Ordering::Release);
        byte
    }

    /// Drain every byte currently visible, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = u8> + use<'_, 'a, N> {
        core::iter::from_fn(move || self.try_read())
    }

    /// Bytes currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Bytes the producer has dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.queue.dropped()
    }
}

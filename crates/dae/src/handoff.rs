//! Buffer-ready handoff from the DMA interrupt to the audio task.
//!
//! ```text
//! DMA HT/TC ISR                              audio task
//! ─────────────                              ──────────
//! active  ← consumed.other()   (Release)
//! pending += 1                 (AcqRel)
//! signal()  ──────────────────────────────►  wait().await
//!                                            n = pending.swap(0)
//!                                            active (Acquire)
//! ```
//!
//! The [`Signal`] coalesces: two interrupts before the task wakes produce one
//! wake-up. The `pending` counter does not, so the task learns how many
//! blocks it missed ([`Notification::missed`]). Only the latest active half is
//! visible; half indices are not queued.
//!
//! `CriticalSectionRawMutex` is required because `signal()` runs in
//! interrupt context while `wait()` runs in a task. On a single core the
//! critical section only masks interrupts for the few instructions that touch
//! the waker.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::double_buffer::{writable_half, Half};

/// What the task learns when it wakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Notification {
    /// Half the hardware is transferring now.
    pub active: Half,
    /// Notifications coalesced into this one (0 when the task kept up).
    pub missed: u32,
}

impl Notification {
    /// The half the task should fill.
    #[must_use]
    pub fn writable(&self) -> Half {
        writable_half(self.active)
    }

    /// `true` if at least one block deadline was missed.
    #[must_use]
    pub fn is_overrun(&self) -> bool {
        self.missed > 0
    }
}

/// Interrupt-to-task "half consumed" notification.
pub struct BufferReady {
    active: AtomicU8,
    pending: AtomicU32,
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl BufferReady {
    /// Hardware starts on half A, so A is active until the first interrupt.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: AtomicU8::new(Half::A as u8),
            pending: AtomicU32::new(0),
            signal: Signal::new(),
        }
    }

    /// Called from the DMA interrupt when `consumed` has been fully read.
    ///
    /// Publishes the new active half before waking the task.
    pub fn buffer_half_consumed(&self, consumed: Half) {
        self.active.store(consumed.other() as u8, Ordering::Release);
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.signal.signal(());
    }

    /// Wait for the next notification. The scheduler's only suspension point.
    pub async fn wait(&self) -> Notification {
        loop {
            self.signal.wait().await;
            // A stale wake-up (counter already drained by `try_take`) is skipped.
            if let Some(notification) = self.take() {
                return notification;
            }
        }
    }

    /// Non-blocking variant of [`wait`](Self::wait).
    ///
    /// The signal is cleared before the counter is read, so an interrupt
    /// landing in between leaves a set signal (a stale wake-up `wait`
    /// skips) rather than a pending count with no wake-up.
    pub fn try_take(&self) -> Option<Notification> {
        self.signal.reset();
        self.take()
    }

    /// Half currently in flight.
    #[must_use]
    pub fn active(&self) -> Half {
        Half::from_index(self.active.load(Ordering::Acquire)).unwrap_or(Half::A)
    }

    fn take(&self) -> Option<Notification> {
        let n = self.pending.swap(0, Ordering::AcqRel);
        if n == 0 {
            return None;
        }
        Some(Notification {
            active: self.active(),
            missed: n.saturating_sub(1),
        })
    }
}

impl Default for BufferReady {
    fn default() -> Self {
        Self::new()
    }
}

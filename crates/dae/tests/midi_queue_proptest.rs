//! Property-based tests for the SPSC MIDI queue against a `VecDeque` model.
#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::collections::VecDeque;

use dae::MidiQueue;
use proptest::prelude::*;

const SLOTS: usize = 16;

#[derive(Debug, Clone)]
enum Op {
    Write(u8),
    Read,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u8>().prop_map(Op::Write), Just(Op::Read)]
}

proptest! {
    /// Interleaved writes and reads behave exactly like a bounded FIFO
    /// holding `SLOTS - 1` bytes, with active sensing never stored.
    #[test]
    fn queue_matches_bounded_fifo(ops in proptest::collection::vec(op(), 0..400)) {
        let mut queue: MidiQueue<SLOTS> = MidiQueue::new();
        let (mut tx, mut rx) = queue.split();
        let mut model: VecDeque<u8> = VecDeque::new();
        let mut drops = 0u32;

        for op in ops {
            match op {
                Op::Write(byte) => {
                    let accepted = tx.write(byte);
                    if byte == 0xFE {
                        prop_assert!(accepted);
                    } else if model.len() == SLOTS - 1 {
                        prop_assert!(!accepted);
                        drops += 1;
                    } else {
                        prop_assert!(accepted);
                        model.push_back(byte);
                    }
                }
                Op::Read => prop_assert_eq!(rx.try_read(), model.pop_front()),
            }
            prop_assert_eq!(rx.len(), model.len());
            prop_assert!(rx.len() < SLOTS);
        }
        prop_assert_eq!(rx.dropped(), drops);
    }

    /// Up to capacity, everything written comes back out in order.
    #[test]
    fn fifo_order_up_to_capacity(bytes in proptest::collection::vec(0u8..0xFE, 0..SLOTS)) {
        let mut queue: MidiQueue<SLOTS> = MidiQueue::new();
        let (mut tx, mut rx) = queue.split();
        let fits = bytes.len().min(SLOTS - 1);
        for (i, &b) in bytes.iter().enumerate() {
            prop_assert_eq!(tx.write(b), i < fits);
        }
        let out: Vec<u8> = rx.drain().collect();
        prop_assert_eq!(&out[..], &bytes[..fits]);
    }
}

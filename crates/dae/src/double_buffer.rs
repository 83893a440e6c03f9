//! Double-buffered (ping-pong) output buffer and sample packing.
//!
//! The circular DMA transfer reads the whole buffer continuously. While it
//! reads one half, the audio task fills the other:
//!
//! ```text
//!  ┌───────────── Half A ─────────────┬───────────── Half B ─────────────┐
//!  │ frame 0 │ frame 1 │ … │ frame N-1 │ frame 0 │ frame 1 │ … │ frame N-1 │
//!  └──────────────────────────────────┴──────────────────────────────────┘
//!        ▲ in flight (hardware)              ▲ writable (task)
//! ```
//!
//! **Rule:** the task writes only into the half that is *not* in flight.
//! [`OutputBuffer::select_writable_half`] is the only way to obtain a
//! writable view, and it always picks the half opposite the active one.
//!
//! # Frame format
//!
//! Each channel is a 32-bit signed fixed-point sample sent as two 16-bit
//! words, most significant first. Frame word order is fixed by the I2S
//! slot layout:
//!
//! | Word | Content           |
//! |------|-------------------|
//! | 0    | right, bits 31–16 |
//! | 1    | right, bits 15–0  |
//! | 2    | left, bits 31–16  |
//! | 3    | left, bits 15–0   |

use crate::config::WORDS_PER_FRAME;

/// Scale factor from `[-1.0, 1.0]` to 32-bit fixed point.
#[allow(clippy::cast_precision_loss)] // Safety: rounds to 2^31; the i32 cast saturates the top value
const FULL_SCALE: f32 = i32::MAX as f32;

/// One packed stereo frame.
pub type PackedFrame = [i16; WORDS_PER_FRAME];

// ── Half ─────────────────────────────────────────────────────────────────────

/// One half of the circular output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Half {
    /// First half (index 0).
    A = 0,
    /// Second half (index 1).
    B = 1,
}

impl Half {
    /// The opposite half.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// 0 for A, 1 for B.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decode a half index as reported by hardware; `None` for anything but 0 or 1.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }
}

/// The half the task may write while `active` is in flight.
#[must_use]
pub const fn writable_half(active: Half) -> Half {
    active.other()
}

// ── Sample conversion ────────────────────────────────────────────────────────

/// Convert a float sample to 32-bit fixed point.
///
/// Input is clamped to `[-1.0, 1.0]` first, so hot signals saturate instead
/// of wrapping. `NaN` becomes silence.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Safety: float-to-int `as` saturates; input is clamped
pub fn quantize(sample: f32) -> i32 {
    (sample.clamp(-1.0, 1.0) * FULL_SCALE) as i32
}

/// Inverse of [`quantize`], for inspection and tests.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Safety: result only needs f32 precision
pub fn dequantize(value: i32) -> f32 {
    value as f32 / FULL_SCALE
}

/// Split a 32-bit sample into its (high, low) 16-bit words.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Safety: truncation to 16 bits is the point
pub const fn split_word(value: i32) -> (i16, i16) {
    ((value >> 16) as i16, value as i16)
}

/// Recombine (high, low) 16-bit words into a 32-bit sample.
#[must_use]
#[allow(clippy::cast_sign_loss)] // Safety: reinterpreting the low word's bits
pub const fn join_words(high: i16, low: i16) -> i32 {
    ((high as i32) << 16) | (low as u16 as i32)
}

/// Pack one stereo frame in wire order: R-hi, R-lo, L-hi, L-lo.
#[must_use]
pub fn pack_frame(left: f32, right: f32) -> PackedFrame {
    let (r_hi, r_lo) = split_word(quantize(right));
    let (l_hi, l_lo) = split_word(quantize(left));
    [r_hi, r_lo, l_hi, l_lo]
}

/// Decode a packed frame back to `(left, right)`.
#[must_use]
pub fn unpack_frame(frame: &PackedFrame) -> (f32, f32) {
    let [r_hi, r_lo, l_hi, l_lo] = *frame;
    (
        dequantize(join_words(l_hi, l_lo)),
        dequantize(join_words(r_hi, r_lo)),
    )
}

// ── OutputBuffer ─────────────────────────────────────────────────────────────

/// Two halves of `FRAMES` packed frames each, contiguous in memory.
///
/// The hardware sees it as a flat `[i16]` of `2 × FRAMES × 4` words
/// ([`as_words_mut`](Self::as_words_mut)).
#[derive(Debug, Clone)]
#[repr(C)]
pub struct OutputBuffer<const FRAMES: usize> {
    halves: [[PackedFrame; FRAMES]; 2],
}

impl<const FRAMES: usize> OutputBuffer<FRAMES> {
    /// A silent buffer. `const` so it can live in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            halves: [[[0; WORDS_PER_FRAME]; FRAMES]; 2],
        }
    }

    /// Frames per half (one block).
    #[must_use]
    pub const fn frames_per_half(&self) -> usize {
        FRAMES
    }

    /// Borrow the half the task may write while `active` is in flight.
    ///
    /// The view borrows the buffer mutably, so it cannot outlive the
    /// iteration that obtained it.
    pub fn select_writable_half(&mut self, active: Half) -> BufferView<'_, FRAMES> {
        let half = writable_half(active);
        let [a, b] = &mut self.halves;
        let frames = match half {
            Half::A => a,
            Half::B => b,
        };
        BufferView { half, frames }
    }

    /// Read-only words of one half.
    #[must_use]
    pub fn half_words(&self, half: Half) -> &[i16] {
        let [a, b] = &self.halves;
        match half {
            Half::A => a.as_flattened(),
            Half::B => b.as_flattened(),
        }
    }

    /// Read-only frames of one half.
    #[must_use]
    pub fn half_frames(&self, half: Half) -> &[PackedFrame; FRAMES] {
        let [a, b] = &self.halves;
        match half {
            Half::A => a,
            Half::B => b,
        }
    }

    /// The whole buffer as the flat word slice handed to the DMA engine.
    pub fn as_words_mut(&mut self) -> &mut [i16] {
        self.halves.as_flattened_mut().as_flattened_mut()
    }

    /// The whole buffer as a flat word slice.
    #[must_use]
    pub fn as_words(&self) -> &[i16] {
        self.halves.as_flattened().as_flattened()
    }
}

impl<const FRAMES: usize> Default for OutputBuffer<FRAMES> {
    fn default() -> Self {
        Self::new()
    }
}

// ── BufferView ───────────────────────────────────────────────────────────────

/// Exclusive, iteration-scoped view over the writable half.
pub struct BufferView<'a, const FRAMES: usize> {
    half: Half,
    frames: &'a mut [PackedFrame; FRAMES],
}

impl<const FRAMES: usize> BufferView<'_, FRAMES> {
    /// Which half this view covers.
    #[must_use]
    pub fn half(&self) -> Half {
        self.half
    }

    /// Quantize and store one frame. Indices past the block are ignored.
    pub fn write_frame(&mut self, index: usize, left: f32, right: f32) {
        if let Some(frame) = self.frames.get_mut(index) {
            *frame = pack_frame(left, right);
        }
    }

    /// Write a whole block. Extra samples on either side are ignored.
    pub fn write_block(&mut self, left: &[f32], right: &[f32]) {
        for (index, (&l, &r)) in left.iter().zip(right).enumerate() {
            self.write_frame(index, l, r);
        }
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_writable_half_is_opposite_of_active() {
        assert_eq!(writable_half(Half::A), Half::B);
        assert_eq!(writable_half(Half::B), Half::A);
    }

    #[test]
    fn test_from_index() {
        assert_eq!(Half::from_index(0), Some(Half::A));
        assert_eq!(Half::from_index(1), Some(Half::B));
        assert_eq!(Half::from_index(2), None);
    }

    #[test]
    fn test_half_encodes_as_high_word_only() {
        assert_eq!(pack_frame(0.5, 0.5), [0x4000, 0, 0x4000, 0]);
    }

    #[test]
    fn test_word_order_is_right_then_left() {
        let frame = pack_frame(-0.5, 0.25);
        assert_eq!(frame[0], 0x2000, "right high word first");
        assert_eq!(frame[2], -0x4000, "left high word third");
    }

    #[test]
    fn test_full_scale_saturates() {
        assert_eq!(quantize(1.0), i32::MAX);
        assert_eq!(quantize(4.0), i32::MAX);
        assert_eq!(quantize(-1.0), i32::MIN);
        assert_eq!(quantize(-4.0), i32::MIN);
    }

    #[test]
    fn test_nan_is_silence() {
        assert_eq!(quantize(f32::NAN), 0);
    }

    #[test]
    fn test_low_word_keeps_bits() {
        let value = 0x1234_ABCD_u32 as i32;
        let (hi, lo) = split_word(value);
        assert_eq!(hi, 0x1234);
        assert_eq!(lo as u16, 0xABCD);
        assert_eq!(join_words(hi, lo), value);
    }

    #[test]
    fn test_select_writes_only_opposite_half() {
        let mut buf: OutputBuffer<4> = OutputBuffer::new();
        {
            let mut view = buf.select_writable_half(Half::A);
            assert_eq!(view.half(), Half::B);
            for i in 0..4 {
                view.write_frame(i, 0.5, 0.5);
            }
        }
        assert!(buf.half_words(Half::A).iter().all(|&w| w == 0));
        assert!(buf
            .half_frames(Half::B)
            .iter()
            .all(|f| *f == [0x4000, 0, 0x4000, 0]));
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let mut buf: OutputBuffer<2> = OutputBuffer::new();
        buf.select_writable_half(Half::B).write_frame(2, 1.0, 1.0);
        assert!(buf.as_words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_flat_layout_is_half_a_then_half_b() {
        let mut buf: OutputBuffer<2> = OutputBuffer::new();
        assert_eq!(buf.as_words_mut().len(), 2 * 2 * WORDS_PER_FRAME);
        buf.select_writable_half(Half::A).write_frame(0, 0.0, 0.5);
        // Half B frame 0 starts right after Half A's 8 words.
        assert_eq!(buf.as_words()[8], 0x4000);
        assert_eq!(buf.as_words()[..8], [0; 8]);
    }
}

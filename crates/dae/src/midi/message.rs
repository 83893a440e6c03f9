//! Complete, validated MIDI messages.

use crate::error::ConfigError;

/// Active-sensing realtime byte. Filtered before it reaches the queue.
pub const ACTIVE_SENSING: u8 = 0xFE;

/// First realtime status byte; everything from here up is out-of-band.
pub const REALTIME_MIN: u8 = 0xF8;

/// Message kind decoded from the status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageKind {
    /// `0x8n` key, velocity
    NoteOff,
    /// `0x9n` key, velocity
    NoteOn,
    /// `0xAn` key, pressure
    PolyPressure,
    /// `0xBn` controller, value
    ControlChange,
    /// `0xCn` program
    ProgramChange,
    /// `0xDn` pressure
    ChannelPressure,
    /// `0xEn` lsb, msb
    PitchBend,
    /// `0xF1` quarter-frame
    TimeCode,
    /// `0xF2` lsb, msb
    SongPosition,
    /// `0xF3` song
    SongSelect,
    /// `0xF6`
    TuneRequest,
    /// `0xF8`
    Clock,
    /// `0xFA`
    Start,
    /// `0xFB`
    Continue,
    /// `0xFC`
    Stop,
    /// `0xFE`
    ActiveSensing,
    /// `0xFF`
    Reset,
    /// `0xF9` / `0xFD`: reserved realtime bytes, passed through untouched.
    UndefinedRealtime,
}

impl MessageKind {
    /// Decode the kind of a status byte, or `None` for data bytes, SysEx
    /// framing (`0xF0`, `0xF7`) and the undefined `0xF4`/`0xF5`.
    #[must_use]
    pub fn from_status(status: u8) -> Option<Self> {
        let kind = match status {
            0x80..=0x8F => Self::NoteOff,
            0x90..=0x9F => Self::NoteOn,
            0xA0..=0xAF => Self::PolyPressure,
            0xB0..=0xBF => Self::ControlChange,
            0xC0..=0xCF => Self::ProgramChange,
            0xD0..=0xDF => Self::ChannelPressure,
            0xE0..=0xEF => Self::PitchBend,
            0xF1 => Self::TimeCode,
            0xF2 => Self::SongPosition,
            0xF3 => Self::SongSelect,
            0xF6 => Self::TuneRequest,
            0xF8 => Self::Clock,
            0xFA => Self::Start,
            0xFB => Self::Continue,
            0xFC => Self::Stop,
            0xFE => Self::ActiveSensing,
            0xFF => Self::Reset,
            0xF9 | 0xFD => Self::UndefinedRealtime,
            _ => return None,
        };
        Some(kind)
    }

    /// Number of data bytes that follow the status byte.
    #[must_use]
    pub fn data_len(self) -> u8 {
        match self {
            Self::NoteOff
            | Self::NoteOn
            | Self::PolyPressure
            | Self::ControlChange
            | Self::PitchBend
            | Self::SongPosition => 2,
            Self::ProgramChange | Self::ChannelPressure | Self::TimeCode | Self::SongSelect => 1,
            Self::TuneRequest
            | Self::Clock
            | Self::Start
            | Self::Continue
            | Self::Stop
            | Self::ActiveSensing
            | Self::Reset
            | Self::UndefinedRealtime => 0,
        }
    }

    /// `true` for the seven channel-voice kinds (eligible for running status).
    #[must_use]
    pub fn is_channel_voice(self) -> bool {
        matches!(
            self,
            Self::NoteOff
                | Self::NoteOn
                | Self::PolyPressure
                | Self::ControlChange
                | Self::ProgramChange
                | Self::ChannelPressure
                | Self::PitchBend
        )
    }

    /// `true` for realtime kinds (status `>= 0xF8`).
    #[must_use]
    pub fn is_realtime(self) -> bool {
        matches!(
            self,
            Self::Clock
                | Self::Start
                | Self::Continue
                | Self::Stop
                | Self::ActiveSensing
                | Self::Reset
                | Self::UndefinedRealtime
        )
    }
}

/// `true` if `byte` is a status byte (high bit set).
#[inline]
#[must_use]
pub fn is_status(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// `true` if `byte` is a realtime status byte.
#[inline]
#[must_use]
pub fn is_realtime(byte: u8) -> bool {
    byte >= REALTIME_MIN
}

// ── MidiMessage ──────────────────────────────────────────────────────────────

/// A complete MIDI message: status byte plus zero to two data bytes.
///
/// Only [`MidiParser`](crate::midi::MidiParser) constructs these, so every
/// message carries the data-byte count its status demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MidiMessage {
    kind: MessageKind,
    bytes: [u8; 3],
}

impl MidiMessage {
    pub(crate) fn new(kind: MessageKind, status: u8, data: [u8; 2]) -> Self {
        Self {
            kind,
            bytes: [status, data[0], data[1]],
        }
    }

    /// Decoded message kind.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Raw status byte (including the channel nibble for channel-voice kinds).
    #[must_use]
    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    /// First data byte, `0` when absent.
    #[must_use]
    pub fn data1(&self) -> u8 {
        self.bytes[1]
    }

    /// Second data byte, `0` when absent.
    #[must_use]
    pub fn data2(&self) -> u8 {
        self.bytes[2]
    }

    /// Wire length in bytes (1–3).
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.kind.data_len()).saturating_add(1)
    }

    /// Always `false`: a message has at least its status byte.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The message as it appeared on the wire (status restored even when it
    /// arrived via running status).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.get(..self.len()).unwrap_or(&self.bytes)
    }

    /// Channel for channel-voice messages, `None` otherwise.
    #[must_use]
    pub fn channel(&self) -> Option<MidiChannel> {
        if self.kind.is_channel_voice() {
            Some(MidiChannel::from_nibble(self.bytes[0]))
        } else {
            None
        }
    }
}

// ── MidiChannel ──────────────────────────────────────────────────────────────

/// Channel a source listens on, as returned from
/// [`AudioSource::prepare`](crate::AudioSource::prepare).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MidiChannel {
    /// Accept channel-voice messages on every channel.
    #[default]
    Omni,
    /// A single channel, stored 1-based (1–16) as musicians count them.
    Channel(u8),
}

impl MidiChannel {
    /// Build a single-channel selector from a 1-based channel number.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMidiChannel`] outside 1–16.
    pub fn new(channel: u8) -> Result<Self, ConfigError> {
        if (1..=16).contains(&channel) {
            Ok(Self::Channel(channel))
        } else {
            Err(ConfigError::InvalidMidiChannel(channel))
        }
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: nibble is 0..=15, +1 cannot overflow
    fn from_nibble(status: u8) -> Self {
        Self::Channel((status & 0x0F) + 1)
    }

    /// `true` if a message on `other` should reach a source listening here.
    #[must_use]
    pub fn accepts(self, other: MidiChannel) -> bool {
        match (self, other) {
            (Self::Omni, _) | (_, Self::Omni) => true,
            (Self::Channel(a), Self::Channel(b)) => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_expects_two_data_bytes() {
        assert_eq!(MessageKind::from_status(0x93), Some(MessageKind::NoteOn));
        assert_eq!(MessageKind::NoteOn.data_len(), 2);
    }

    #[test]
    fn test_program_change_expects_one_data_byte() {
        assert_eq!(MessageKind::ProgramChange.data_len(), 1);
    }

    #[test]
    fn test_sysex_framing_has_no_kind() {
        assert_eq!(MessageKind::from_status(0xF0), None);
        assert_eq!(MessageKind::from_status(0xF7), None);
        assert_eq!(MessageKind::from_status(0x40), None);
    }

    #[test]
    fn test_channel_is_one_based() {
        let msg = MidiMessage::new(MessageKind::NoteOn, 0x90, [0x40, 0x7F]);
        assert_eq!(msg.channel(), Some(MidiChannel::Channel(1)));
        let msg = MidiMessage::new(MessageKind::NoteOn, 0x9F, [0x40, 0x7F]);
        assert_eq!(msg.channel(), Some(MidiChannel::Channel(16)));
    }

    #[test]
    fn test_realtime_has_no_channel() {
        let msg = MidiMessage::new(MessageKind::Clock, 0xF8, [0, 0]);
        assert_eq!(msg.channel(), None);
        assert_eq!(msg.as_bytes(), &[0xF8]);
    }

    #[test]
    fn test_channel_bounds() {
        assert!(MidiChannel::new(0).is_err());
        assert!(MidiChannel::new(17).is_err());
        assert_eq!(MidiChannel::new(10), Ok(MidiChannel::Channel(10)));
    }

    #[test]
    fn test_omni_accepts_everything() {
        assert!(MidiChannel::Omni.accepts(MidiChannel::Channel(7)));
        assert!(MidiChannel::Channel(3).accepts(MidiChannel::Channel(3)));
        assert!(!MidiChannel::Channel(3).accepts(MidiChannel::Channel(4)));
    }
}

//! Incremental MIDI frame parser.
//!
//! Turns the raw byte stream drained from [`MidiQueue`](super::MidiQueue)
//! into complete [`MidiMessage`]s, one byte at a time.
//!
//! ```text
//!            status (0 data) ──► emit
//!           ┌──────────────┐
//!   [Idle] ─┤ status (1/2) ├─► [CollectingData] ── last data byte ──► emit ─► [Idle]
//!      │    └──────────────┘
//!      ├─ data + running status ─► [CollectingData]
//!      ├─ data, no running status ─► discard (resync)
//!      └─ 0xF0 ─► [SysEx] ── 0xF7 / any status ──► [Idle]
//!
//!   realtime (>= 0xF8) in any state ─► emit, state untouched
//! ```

use super::message::{is_realtime, is_status, MessageKind, MidiMessage};

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

/// Where the parser is within the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParserState {
    /// Waiting for a status byte (or a data byte under running status).
    Idle,
    /// Accumulating the data bytes of `status`.
    CollectingData {
        /// Status byte of the message in progress.
        status: u8,
        /// Data bytes received so far.
        received: u8,
    },
    /// Inside a System Exclusive dump; payload bytes are skipped.
    SysEx,
}

/// Byte-at-a-time MIDI parser with running-status support.
///
/// Owned by the audio task; never shared.
#[derive(Debug, Clone)]
pub struct MidiParser {
    state: ParserState,
    data: [u8; 2],
    running_status: Option<u8>,
    malformed: u32,
}

impl MidiParser {
    /// Create a parser in the idle state with no running status.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ParserState::Idle,
            data: [0; 2],
            running_status: None,
            malformed: 0,
        }
    }

    /// Feed one byte. Returns a message when `byte` completes one.
    pub fn push(&mut self, byte: u8) -> Option<MidiMessage> {
        if is_realtime(byte) {
            // Out-of-band: emitted immediately, in-progress message untouched.
            return MessageKind::from_status(byte).map(|kind| MidiMessage::new(kind, byte, [0; 2]));
        }
        if is_status(byte) {
            self.on_status(byte)
        } else {
            self.on_data(byte)
        }
    }

    fn on_status(&mut self, status: u8) -> Option<MidiMessage> {
        self.data = [0; 2];
        match status {
            SYSEX_START => {
                self.running_status = None;
                self.state = ParserState::SysEx;
                None
            }
            SYSEX_END => {
                // Also a stray EOX outside SysEx: system common, cancels running status.
                self.running_status = None;
                self.state = ParserState::Idle;
                None
            }
            _ => match MessageKind::from_status(status) {
                Some(kind) => {
                    self.running_status = kind.is_channel_voice().then_some(status);
                    if kind.data_len() == 0 {
                        self.state = ParserState::Idle;
                        Some(MidiMessage::new(kind, status, self.data))
                    } else {
                        self.state = ParserState::CollectingData {
                            status,
                            received: 0,
                        };
                        None
                    }
                }
                // 0xF4 / 0xF5: undefined system common.
                None => {
                    self.running_status = None;
                    self.state = ParserState::Idle;
                    None
                }
            },
        }
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: received < data_len <= 2 before the increment
    fn on_data(&mut self, byte: u8) -> Option<MidiMessage> {
        let (status, received) = match self.state {
            ParserState::SysEx => return None,
            ParserState::CollectingData { status, received } => (status, received),
            ParserState::Idle => match self.running_status {
                Some(status) => (status, 0),
                None => {
                    self.malformed = self.malformed.wrapping_add(1);
                    return None;
                }
            },
        };
        let Some(kind) = MessageKind::from_status(status) else {
            self.state = ParserState::Idle;
            return None;
        };
        if let Some(slot) = self.data.get_mut(usize::from(received)) {
            *slot = byte;
        }
        let received = received + 1;
        if received >= kind.data_len() {
            self.state = ParserState::Idle;
            let message = MidiMessage::new(kind, status, self.data);
            self.data = [0; 2];
            Some(message)
        } else {
            self.state = ParserState::CollectingData { status, received };
            None
        }
    }

    /// Drop any partial message and running status.
    pub fn reset(&mut self) {
        self.state = ParserState::Idle;
        self.data = [0; 2];
        self.running_status = None;
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Running status, if a channel-voice status may be omitted.
    #[must_use]
    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }

    /// Data bytes discarded because neither a status nor running status
    /// preceded them.
    #[must_use]
    pub fn malformed_count(&self) -> u32 {
        self.malformed
    }
}

impl Default for MidiParser {
    fn default() -> Self {
        Self::new()
    }
}

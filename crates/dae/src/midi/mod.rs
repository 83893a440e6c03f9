//! MIDI input path: interrupt-fed byte queue and incremental frame parser.
//!
//! ```text
//! UART ISR ──write()──► MidiQueue ──try_read()──► MidiParser ──► MidiMessage
//!  (producer)                         (audio task, once per block)
//! ```

pub mod message;
pub mod parser;
pub mod queue;

pub use message::{MessageKind, MidiChannel, MidiMessage};
pub use parser::{MidiParser, ParserState};
pub use queue::{MidiConsumer, MidiProducer, MidiQueue};

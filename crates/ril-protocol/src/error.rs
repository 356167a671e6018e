//! Error types for RIL parcel decoding and request encoding

use thiserror::Error;

/// Errors that can occur while decoding wire data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer is incomplete - need more data
    #[error("incomplete data: need {needed} more bytes")]
    Incomplete { needed: usize },

    /// Cursor moved outside the parcel
    #[error("invalid data position {position} (parcel length {len})")]
    InvalidPosition { position: usize, len: usize },

    /// Array or string length prefix is negative or absurd
    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),

    /// String payload is not valid UTF-16
    #[error("invalid UTF-16 string data")]
    InvalidString,

    /// Response type is neither solicited nor unsolicited
    #[error("unknown response type: {0}")]
    UnknownResponseType(i32),

    /// Opcode not in the vendor table
    #[error("unknown opcode: {0}")]
    UnknownOpcode(i32),

    /// Call status code outside 0..=7
    #[error("unknown call status: {0}")]
    UnknownCallStatus(i32),

    /// Audio path code not in the vendor table
    #[error("unknown audio path: {0}")]
    UnknownAudioPath(i32),

    /// Call state code outside 0..=2
    #[error("unknown call state: {0}")]
    UnknownCallState(i32),

    /// Radio state code not recognised
    #[error("unknown radio state: {0}")]
    UnknownRadioState(i32),
}

/// Higher-level protocol errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Caller supplied the wrong number of fields for an opcode
    #[error("opcode 0x{opcode:X} expects {expected} fields, got {actual}")]
    ArityMismatch {
        opcode: i32,
        expected: usize,
        actual: usize,
    },

    /// Caller supplied a field of the wrong kind for an opcode
    #[error("opcode 0x{opcode:X} field {index} has the wrong type")]
    FieldType { opcode: i32, index: usize },
}

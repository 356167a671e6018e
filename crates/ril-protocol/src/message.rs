//! Incoming daemon messages
//!
//! Every record from the daemon starts with a response type:
//!
//! ```text
//! 0 (solicited):   [type][serial][error][payload...]
//! 1 (unsolicited): [type][opcode][payload...]
//! ```

use crate::error::ParseError;
use crate::parcel::Parcel;

/// Response type for replies to requests
pub const RESPONSE_SOLICITED: i32 = 0;
/// Response type for pushed events
pub const RESPONSE_UNSOLICITED: i32 = 1;

/// Error code carried by a solicited response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RilErrorCode {
    Success,
    RadioNotAvailable,
    GenericFailure,
    PasswordIncorrect,
    SimPin2,
    SimPuk2,
    RequestNotSupported,
    Cancelled,
    /// Any other daemon error number
    Other(i32),
}

impl RilErrorCode {
    /// Wire code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::RadioNotAvailable => 1,
            Self::GenericFailure => 2,
            Self::PasswordIncorrect => 3,
            Self::SimPin2 => 4,
            Self::SimPuk2 => 5,
            Self::RequestNotSupported => 6,
            Self::Cancelled => 7,
            Self::Other(c) => c,
        }
    }
}

impl From<i32> for RilErrorCode {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Success,
            1 => Self::RadioNotAvailable,
            2 => Self::GenericFailure,
            3 => Self::PasswordIncorrect,
            4 => Self::SimPin2,
            5 => Self::SimPuk2,
            6 => Self::RequestNotSupported,
            7 => Self::Cancelled,
            other => Self::Other(other),
        }
    }
}

/// A parsed daemon record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RilMessage {
    /// Reply to a request
    Solicited {
        serial: i32,
        error: RilErrorCode,
        /// Remaining bytes, cursor at the start of the response body
        payload: Parcel,
    },
    /// Pushed event; the cursor sits on the unsolicited opcode
    Unsolicited(Parcel),
}

impl RilMessage {
    /// Parse a framed record
    pub fn parse(frame: Vec<u8>) -> Result<Self, ParseError> {
        let mut parcel = Parcel::from_bytes(frame);
        match parcel.read_i32()? {
            RESPONSE_SOLICITED => {
                let serial = parcel.read_i32()?;
                let error = RilErrorCode::from(parcel.read_i32()?);
                Ok(Self::Solicited {
                    serial,
                    error,
                    payload: parcel,
                })
            }
            RESPONSE_UNSOLICITED => Ok(Self::Unsolicited(parcel)),
            other => Err(ParseError::UnknownResponseType(other)),
        }
    }
}

/// Decoded unsolicited payload shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    /// Nothing beyond the opcode
    Void,
    /// Length-prefixed integer array
    Ints(Vec<i32>),
}

/// Decode a void payload; consumes nothing
pub fn decode_void(_parcel: &mut Parcel) -> ResponsePayload {
    ResponsePayload::Void
}

/// Decode a length-prefixed i32 array
pub fn decode_ints(parcel: &mut Parcel) -> Result<ResponsePayload, ParseError> {
    let count = parcel.read_i32()?;
    if count < 0 {
        return Err(ParseError::InvalidLength(count));
    }
    let count = count as usize;
    if parcel.remaining() < count * 4 {
        return Err(ParseError::Incomplete {
            needed: count * 4 - parcel.remaining(),
        });
    }

    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(parcel.read_i32()?);
    }
    Ok(ResponsePayload::Ints(values))
}

/// Build a solicited response record (used by simulators and tests)
pub fn encode_solicited(serial: i32, error: RilErrorCode, body: &[u8]) -> Vec<u8> {
    let mut parcel = Parcel::new();
    parcel.write_i32(RESPONSE_SOLICITED);
    parcel.write_i32(serial);
    parcel.write_i32(error.code());
    let mut bytes = parcel.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

/// Build an unsolicited record (used by simulators and tests)
pub fn encode_unsolicited(opcode: i32, body: &[u8]) -> Vec<u8> {
    let mut parcel = Parcel::new();
    parcel.write_i32(RESPONSE_UNSOLICITED);
    parcel.write_i32(opcode);
    let mut bytes = parcel.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

/// Body for an integer-array payload
pub fn ints_body(values: &[i32]) -> Vec<u8> {
    let mut parcel = Parcel::new();
    parcel.write_i32(values.len() as i32);
    for v in values {
        parcel.write_i32(*v);
    }
    parcel.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_solicited() {
        let frame = encode_solicited(12, RilErrorCode::GenericFailure, &[1, 0, 0, 0]);
        match RilMessage::parse(frame).unwrap() {
            RilMessage::Solicited {
                serial,
                error,
                mut payload,
            } => {
                assert_eq!(serial, 12);
                assert_eq!(error, RilErrorCode::GenericFailure);
                assert_eq!(payload.read_i32().unwrap(), 1);
            }
            other => panic!("Expected solicited, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unsolicited_leaves_cursor_on_opcode() {
        let frame = encode_unsolicited(1053, &ints_body(&[7, 2]));
        match RilMessage::parse(frame).unwrap() {
            RilMessage::Unsolicited(mut p) => {
                assert_eq!(p.data_position(), 4);
                assert_eq!(p.read_i32().unwrap(), 1053);
                assert_eq!(decode_ints(&mut p).unwrap(), ResponsePayload::Ints(vec![7, 2]));
            }
            other => panic!("Expected unsolicited, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_response_type() {
        let mut p = Parcel::new();
        p.write_i32(5);
        assert_eq!(
            RilMessage::parse(p.into_bytes()),
            Err(ParseError::UnknownResponseType(5))
        );
    }

    #[test]
    fn test_decode_ints_rejects_negative_count() {
        let mut p = Parcel::new();
        p.write_i32(-3);
        let mut p = Parcel::from_bytes(p.into_bytes());
        assert_eq!(decode_ints(&mut p), Err(ParseError::InvalidLength(-3)));
    }

    #[test]
    fn test_decode_ints_short_payload() {
        let mut p = Parcel::new();
        p.write_i32(2);
        p.write_i32(7);
        let mut p = Parcel::from_bytes(p.into_bytes());
        assert_eq!(decode_ints(&mut p), Err(ParseError::Incomplete { needed: 4 }));
    }

    #[test]
    fn test_decode_void_consumes_nothing() {
        let mut p = Parcel::from_bytes(vec![1, 2, 3, 4]);
        assert_eq!(decode_void(&mut p), ResponsePayload::Void);
        assert_eq!(p.data_position(), 0);
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(RilErrorCode::from(1), RilErrorCode::RadioNotAvailable);
        assert_eq!(RilErrorCode::from(42), RilErrorCode::Other(42));
        assert_eq!(RilErrorCode::Other(42).code(), 42);
    }
}

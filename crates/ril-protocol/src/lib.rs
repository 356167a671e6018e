//! RIL Protocol Library
//!
//! This crate provides the wire format spoken between the telephony stack
//! and the modem daemon, extended with one vendor's proprietary opcodes:
//!
//! - **Parcel**: flat little-endian records with a read cursor
//! - **Framing**: big-endian length-prefixed records on the daemon socket
//! - **Requests**: `[opcode][serial][fields...]` with per-opcode layouts
//! - **Messages**: solicited replies and unsolicited events
//!
//! # Architecture
//!
//! The crate is purely synchronous. The bridge engine owns the socket and
//! the request bookkeeping; this crate only turns typed values into bytes and
//! back.
//!
//! # Example
//!
//! ```rust
//! use ril_protocol::{AudioPath, Parcel, RilRequest, VendorOpcodes};
//!
//! let vendor = VendorOpcodes::default();
//! let parcel = RilRequest::SetAudioPath { path: AudioPath::Earpiece }
//!     .encode(1, &vendor)
//!     .unwrap();
//!
//! let mut p = Parcel::from_bytes(parcel.into_bytes());
//! assert_eq!(p.read_i32().unwrap(), 0xFD);
//! ```

pub mod command;
pub mod error;
pub mod frame;
pub mod message;
pub mod opcode;
pub mod parcel;
pub mod types;

pub use command::{
    encode_request, normalize_service_class, toa_from_number, Field, RilRequest,
    SERVICE_CLASS_ALL,
};
pub use error::{ParseError, ProtocolError};
pub use frame::{encode_frame, FrameCodec, MAX_FRAME_LEN};
pub use message::{
    decode_ints, decode_void, encode_solicited, encode_unsolicited, ints_body, ResponsePayload,
    RilErrorCode, RilMessage,
};
pub use opcode::{request, request_name, UnsolicitedCode, VendorOpcodes};
pub use parcel::Parcel;
pub use types::{AudioPath, CallState, CallStatus, RadioState};

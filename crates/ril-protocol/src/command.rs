//! Outgoing request encoding
//!
//! Every request is written as `[opcode][serial][fields...]`. Opcodes with a
//! fixed layout are checked for arity and field kind before anything is
//! written. `RilRequest` builds correctly-shaped field lists so callers using
//! it cannot get the layout wrong.

use crate::error::ProtocolError;
use crate::opcode::{request, VendorOpcodes};
use crate::parcel::Parcel;
use crate::types::AudioPath;

/// Service class value the vendor treats as "all classes"
pub const SERVICE_CLASS_ALL: i32 = 255;

/// Type of address: international number
pub const TOA_INTERNATIONAL: i32 = 0x91;
/// Type of address: unknown/national number
pub const TOA_UNKNOWN: i32 = 0x81;

/// One request field
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Field {
    /// 32-bit integer
    Int(i32),
    /// UTF-16 string, `None` for the null string
    Str(Option<String>),
}

impl Field {
    fn kind(&self) -> FieldKind {
        match self {
            Field::Int(_) => FieldKind::Int,
            Field::Str(_) => FieldKind::Str,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Int,
    Str,
}

const CALL_FORWARD_LAYOUT: &[FieldKind] = &[
    FieldKind::Int,
    FieldKind::Int,
    FieldKind::Int,
    FieldKind::Int,
    FieldKind::Str,
    FieldKind::Int,
];

/// Index of the service-class field in call forwarding requests
const SERVICE_CLASS_INDEX: usize = 2;

/// Field layout for opcodes this crate knows about
fn layout(opcode: i32) -> Option<&'static [FieldKind]> {
    match opcode {
        request::GET_IMEI
        | request::HANGUP_WAITING_OR_BACKGROUND
        | request::VENDOR_HANG_UP_CALL => Some(&[]),
        request::SET_CALL_FORWARD | request::QUERY_CALL_FORWARD_STATUS => {
            Some(CALL_FORWARD_LAYOUT)
        }
        request::VENDOR_SET_AUDIO_PATH | request::VENDOR_SEND_COMMAND => {
            Some(&[FieldKind::Int, FieldKind::Int])
        }
        _ => None,
    }
}

fn has_service_class(opcode: i32) -> bool {
    matches!(
        opcode,
        request::SET_CALL_FORWARD | request::QUERY_CALL_FORWARD_STATUS
    )
}

/// Map service class 0 to the vendor's "all classes" value
pub fn normalize_service_class(service_class: i32) -> i32 {
    if service_class == 0 {
        SERVICE_CLASS_ALL
    } else {
        service_class
    }
}

/// Derive the type-of-address byte from a dial string
pub fn toa_from_number(number: Option<&str>) -> i32 {
    match number {
        Some(n) if n.starts_with('+') => TOA_INTERNATIONAL,
        _ => TOA_UNKNOWN,
    }
}

/// Encode a request parcel
///
/// Returns `ArityMismatch` or `FieldType` when `fields` does not match the
/// opcode's fixed layout. Opcodes without a known layout are written as given.
pub fn encode_request(opcode: i32, serial: i32, fields: &[Field]) -> Result<Parcel, ProtocolError> {
    if let Some(expected) = layout(opcode) {
        if expected.len() != fields.len() {
            return Err(ProtocolError::ArityMismatch {
                opcode,
                expected: expected.len(),
                actual: fields.len(),
            });
        }
        if let Some(index) = expected
            .iter()
            .zip(fields)
            .position(|(kind, field)| *kind != field.kind())
        {
            return Err(ProtocolError::FieldType { opcode, index });
        }
    }

    let mut parcel = Parcel::new();
    parcel.write_i32(opcode);
    parcel.write_i32(serial);

    for (index, field) in fields.iter().enumerate() {
        match field {
            Field::Int(v) if index == SERVICE_CLASS_INDEX && has_service_class(opcode) => {
                parcel.write_i32(normalize_service_class(*v))
            }
            Field::Int(v) => parcel.write_i32(*v),
            Field::Str(s) => parcel.write_string(s.as_deref()),
        }
    }

    Ok(parcel)
}

/// Requests the bridge knows how to build
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RilRequest {
    /// Read the IMEI
    GetImei,

    /// Hang up a held or waiting call (baseline opcode)
    HangupWaitingOrBackground,

    /// Vendor hang-up; the opcode comes from [`VendorOpcodes`]
    HangUpCall,

    /// Configure call forwarding
    SetCallForward {
        action: i32,
        reason: i32,
        service_class: i32,
        number: Option<String>,
        time_seconds: i32,
    },

    /// Query call forwarding
    QueryCallForwardStatus {
        reason: i32,
        service_class: i32,
        number: Option<String>,
    },

    /// Select the call audio path
    SetAudioPath { path: AudioPath },

    /// Vendor generic command
    VendorCommand { command: i32, argument: i32 },

    /// Anything else, passed through as-is
    Raw { opcode: i32, fields: Vec<Field> },
}

impl RilRequest {
    /// Opcode this request is sent with
    pub fn opcode(&self, vendor: &VendorOpcodes) -> i32 {
        match self {
            Self::GetImei => request::GET_IMEI,
            Self::HangupWaitingOrBackground => request::HANGUP_WAITING_OR_BACKGROUND,
            Self::HangUpCall => vendor.hang_up_call(),
            Self::SetCallForward { .. } => request::SET_CALL_FORWARD,
            Self::QueryCallForwardStatus { .. } => request::QUERY_CALL_FORWARD_STATUS,
            Self::SetAudioPath { .. } => request::VENDOR_SET_AUDIO_PATH,
            Self::VendorCommand { .. } => request::VENDOR_SEND_COMMAND,
            Self::Raw { opcode, .. } => *opcode,
        }
    }

    /// Ordered fields for this request
    pub fn fields(&self) -> Vec<Field> {
        match self {
            Self::GetImei | Self::HangupWaitingOrBackground | Self::HangUpCall => Vec::new(),
            Self::SetCallForward {
                action,
                reason,
                service_class,
                number,
                time_seconds,
            } => vec![
                Field::Int(*action),
                Field::Int(*reason),
                Field::Int(*service_class),
                Field::Int(toa_from_number(number.as_deref())),
                Field::Str(number.clone()),
                Field::Int(*time_seconds),
            ],
            // Query reuses the set layout with action 2 (query) and no timer
            Self::QueryCallForwardStatus {
                reason,
                service_class,
                number,
            } => vec![
                Field::Int(2),
                Field::Int(*reason),
                Field::Int(*service_class),
                Field::Int(toa_from_number(number.as_deref())),
                Field::Str(number.clone()),
                Field::Int(0),
            ],
            // Leading 1 is the element count the daemon expects
            Self::SetAudioPath { path } => vec![Field::Int(1), Field::Int(path.code())],
            Self::VendorCommand { command, argument } => {
                vec![Field::Int(*command), Field::Int(*argument)]
            }
            Self::Raw { fields, .. } => fields.clone(),
        }
    }

    /// Encode with the given serial
    pub fn encode(&self, serial: i32, vendor: &VendorOpcodes) -> Result<Parcel, ProtocolError> {
        encode_request(self.opcode(vendor), serial, &self.fields())
    }
}

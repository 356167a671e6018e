//! Request and unsolicited opcode tables
//!
//! Baseline opcodes are the generic radio interface layer numbers. Vendor
//! opcodes are specific to this modem firmware and must match the wire
//! exactly.

use crate::error::ParseError;

/// Baseline request opcodes used by this crate
pub mod request {
    /// Hang up a held or waiting call
    pub const HANGUP_WAITING_OR_BACKGROUND: i32 = 13;
    /// Query call forwarding status
    pub const QUERY_CALL_FORWARD_STATUS: i32 = 33;
    /// Configure call forwarding
    pub const SET_CALL_FORWARD: i32 = 34;
    /// Read the IMEI
    pub const GET_IMEI: i32 = 38;

    /// Vendor hang-up (replaces HANGUP_WAITING_OR_BACKGROUND outside a call)
    pub const VENDOR_HANG_UP_CALL: i32 = 0xB7;
    /// Vendor audio path selection
    pub const VENDOR_SET_AUDIO_PATH: i32 = 0xFD;
    /// Vendor generic command
    pub const VENDOR_SEND_COMMAND: i32 = 0x113;
}

/// Unsolicited events this bridge handles itself
///
/// Every other unsolicited opcode belongs to the baseline layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnsolicitedCode {
    /// Radio power/availability changed (1000)
    RadioStateChanged = 1000,
    /// Vendor per-call status report (1053)
    CallStatus = 1053,
    /// Modem asks for its daemon to be restarted (1055)
    RestartDaemon = 1055,
    /// SIM state changed, legacy numbering (1060)
    SimStateChanged = 1060,
    /// SIM state changed, newer numbering (1061)
    SimStateChangedNew = 1061,
    /// Factory test mode ready (1080)
    FactoryReady = 1080,
}

impl UnsolicitedCode {
    /// Classify a raw opcode, returning `None` for anything baseline
    pub fn vendor(code: i32) -> Option<Self> {
        Self::try_from(code).ok()
    }

    /// Raw opcode value
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Returns true if the payload is a length-prefixed integer array
    pub fn carries_ints(self) -> bool {
        matches!(self, Self::CallStatus)
    }
}

impl TryFrom<i32> for UnsolicitedCode {
    type Error = ParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1000 => Ok(Self::RadioStateChanged),
            1053 => Ok(Self::CallStatus),
            1055 => Ok(Self::RestartDaemon),
            1060 => Ok(Self::SimStateChanged),
            1061 => Ok(Self::SimStateChangedNew),
            1080 => Ok(Self::FactoryReady),
            _ => Err(ParseError::UnknownOpcode(value)),
        }
    }
}

/// Human-readable request name for logs
pub fn request_name(opcode: i32) -> String {
    match opcode {
        request::HANGUP_WAITING_OR_BACKGROUND => "HANGUP_WAITING_OR_BACKGROUND".into(),
        request::QUERY_CALL_FORWARD_STATUS => "QUERY_CALL_FORWARD_STATUS".into(),
        request::SET_CALL_FORWARD => "SET_CALL_FORWARD".into(),
        request::GET_IMEI => "GET_IMEI".into(),
        request::VENDOR_HANG_UP_CALL => "VENDOR_HANG_UP_CALL".into(),
        request::VENDOR_SET_AUDIO_PATH => "VENDOR_SET_AUDIO_PATH".into(),
        request::VENDOR_SEND_COMMAND => "VENDOR_SEND_COMMAND".into(),
        other => format!("<unknown request 0x{:X}>", other),
    }
}

/// Vendor opcodes that firmware may renumber at runtime
///
/// Only the hang-up opcode is reconfigurable. The factory-ready event pins it
/// back to its default through [`VendorOpcodes::reassert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorOpcodes {
    hang_up_call: i32,
    default_hang_up_call: i32,
}

impl VendorOpcodes {
    /// Use `hang_up_call` as both the current and default value
    pub fn new(hang_up_call: i32) -> Self {
        Self {
            hang_up_call,
            default_hang_up_call: hang_up_call,
        }
    }

    /// Current hang-up opcode
    pub fn hang_up_call(&self) -> i32 {
        self.hang_up_call
    }

    /// Override the hang-up opcode until the next reassert
    pub fn set_hang_up_call(&mut self, opcode: i32) {
        self.hang_up_call = opcode;
    }

    /// Restore every reconfigurable opcode to its default
    pub fn reassert(&mut self) {
        self.hang_up_call = self.default_hang_up_call;
    }
}

impl Default for VendorOpcodes {
    fn default() -> Self {
        Self::new(request::VENDOR_HANG_UP_CALL)
    }
}

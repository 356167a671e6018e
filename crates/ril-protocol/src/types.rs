//! Telephony domain values
//!
//! The numeric codes on these enums are wire-significant.

use crate::error::ParseError;

/// Call audio routing selected on the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AudioPath {
    /// Nothing sent yet
    None = -1,
    /// No call audio
    Idle = 0,
    /// Handset earpiece
    Earpiece = 1,
    /// Loudspeaker
    Speaker = 3,
    /// Bluetooth headset
    Bluetooth = 4,
}

impl AudioPath {
    /// Wire code
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for AudioPath {
    type Error = ParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::None),
            0 => Ok(Self::Idle),
            1 => Ok(Self::Earpiece),
            3 => Ok(Self::Speaker),
            4 => Ok(Self::Bluetooth),
            _ => Err(ParseError::UnknownAudioPath(value)),
        }
    }
}

/// Per-call status reported by the vendor call-status event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallStatus {
    Established = 0,
    OnHold = 1,
    DialStart = 2,
    Dialing = 3,
    Incoming = 4,
    Waiting = 5,
    Hangup = 6,
    Answered = 7,
}

impl CallStatus {
    /// Returns true if this status puts the call in the active set
    pub fn activates(self) -> bool {
        matches!(self, Self::DialStart | Self::Incoming | Self::Answered)
    }

    /// Wire code
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for CallStatus {
    type Error = ParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Established),
            1 => Ok(Self::OnHold),
            2 => Ok(Self::DialStart),
            3 => Ok(Self::Dialing),
            4 => Ok(Self::Incoming),
            5 => Ok(Self::Waiting),
            6 => Ok(Self::Hangup),
            7 => Ok(Self::Answered),
            _ => Err(ParseError::UnknownCallStatus(value)),
        }
    }
}

/// Aggregate call activity mirrored from the telephony stack
///
/// Variants are declared in activity order so `Ord` gives
/// `Offhook > Ringing > Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallState {
    #[default]
    Idle = 0,
    Ringing = 1,
    Offhook = 2,
}

impl TryFrom<i32> for CallState {
    type Error = ParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Idle),
            1 => Ok(Self::Ringing),
            2 => Ok(Self::Offhook),
            _ => Err(ParseError::UnknownCallState(value)),
        }
    }
}

/// Radio availability as seen by the telephony stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RadioState {
    /// Radio powered off
    Off,
    /// Daemon or modem not reachable
    #[default]
    Unavailable,
    /// Radio powered on
    On,
}

impl RadioState {
    /// Map a daemon radio state code
    ///
    /// Codes 2..=9 are the legacy SIM/RUIM/NV ready states and 10 is
    /// RADIO_ON; all of them mean the radio is on.
    pub fn from_code(code: i32) -> Result<Self, ParseError> {
        match code {
            0 => Ok(Self::Off),
            1 => Ok(Self::Unavailable),
            2..=10 => Ok(Self::On),
            _ => Err(ParseError::UnknownRadioState(code)),
        }
    }

    /// Code written when reporting this state
    pub fn code(self) -> i32 {
        match self {
            Self::Off => 0,
            Self::Unavailable => 1,
            Self::On => 10,
        }
    }
}

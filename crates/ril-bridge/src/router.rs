//! Unsolicited event router
//!
//! Peeks at the opcode of an unsolicited record and decides who owns it.
//! Vendor events are decoded here; everything else goes to the baseline layer
//! with the cursor still on the opcode, so the baseline parser sees the
//! record exactly as it arrived.

use ril_protocol::{
    decode_ints, decode_void, CallStatus, Parcel, ParseError, RadioState, ResponsePayload,
    UnsolicitedCode,
};
use tracing::debug;

use crate::platform::BaselineRil;

/// Decoded vendor event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorEvent {
    /// Radio state reported by the daemon
    RadioStateChanged(RadioState),
    /// Per-call status report
    CallStatus { call_id: i32, status: CallStatus },
    /// Call status report with a code outside the known table
    UnknownCallStatus { call_id: i32, code: i32 },
    /// Daemon asks to be restarted
    RestartDaemon,
    /// SIM state changed (either numbering)
    SimStateChanged(UnsolicitedCode),
    /// Factory mode ready
    FactoryReady,
}

/// Where an unsolicited record went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Decoded here
    Vendor(VendorEvent),
    /// Handed to the baseline layer untouched
    Delegated,
}

/// Route one unsolicited record
///
/// `parcel` must be positioned on the unsolicited opcode.
pub fn route(parcel: &mut Parcel, baseline: &mut dyn BaselineRil) -> Result<Routed, ParseError> {
    let opcode = parcel.peek_i32()?;

    let Some(code) = UnsolicitedCode::vendor(opcode) else {
        baseline.process_unsolicited(parcel);
        return Ok(Routed::Delegated);
    };
    parcel.read_i32()?;

    let payload = if code.carries_ints() {
        decode_ints(parcel)?
    } else {
        decode_void(parcel)
    };

    let event = match (code, payload) {
        (UnsolicitedCode::CallStatus, ResponsePayload::Ints(values)) => {
            if values.len() < 2 {
                return Err(ParseError::InvalidLength(values.len() as i32));
            }
            let call_id = values[0];
            match CallStatus::try_from(values[1]) {
                Ok(status) => VendorEvent::CallStatus { call_id, status },
                Err(_) => VendorEvent::UnknownCallStatus {
                    call_id,
                    code: values[1],
                },
            }
        }
        // The state integer follows the (void) payload
        (UnsolicitedCode::RadioStateChanged, _) => {
            VendorEvent::RadioStateChanged(RadioState::from_code(parcel.read_i32()?)?)
        }
        (UnsolicitedCode::RestartDaemon, _) => VendorEvent::RestartDaemon,
        (UnsolicitedCode::FactoryReady, _) => VendorEvent::FactoryReady,
        (UnsolicitedCode::SimStateChanged | UnsolicitedCode::SimStateChangedNew, _) => {
            VendorEvent::SimStateChanged(code)
        }
        (UnsolicitedCode::CallStatus, ResponsePayload::Void) => {
            return Err(ParseError::InvalidLength(0));
        }
    };

    debug!("UNSOL {} -> {:?}", opcode, event);
    Ok(Routed::Vendor(event))
}

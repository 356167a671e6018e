//! Virtual modem daemon
//!
//! Speaks the daemon side of the socket protocol: decodes framed requests,
//! records them, answers them, and queues unsolicited events on demand.

use std::collections::{HashMap, VecDeque};

use ril_protocol::{
    encode_frame, encode_solicited, encode_unsolicited, ints_body, request, CallStatus,
    FrameCodec, Parcel, ParseError, RadioState, RilErrorCode, UnsolicitedCode,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A request as the daemon received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub opcode: i32,
    pub serial: i32,
    /// Bytes after the serial
    pub body: Vec<u8>,
}

impl RecordedRequest {
    fn parse(frame: Vec<u8>) -> Result<Self, ParseError> {
        let mut p = Parcel::from_bytes(frame);
        let opcode = p.read_i32()?;
        let serial = p.read_i32()?;
        let start = p.data_position();
        let body = p.into_bytes().split_off(start);
        Ok(Self {
            opcode,
            serial,
            body,
        })
    }

    /// Body read as a sequence of i32s (trailing partial word ignored)
    pub fn ints(&self) -> Vec<i32> {
        self.body
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Body as a parcel with the cursor at the first field
    pub fn parcel(&self) -> Parcel {
        Parcel::from_bytes(self.body.clone())
    }
}

/// Configuration for creating a virtual modem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualModemConfig {
    /// IMEI returned for GET_IMEI
    pub imei: String,
    /// Answer every request with a solicited response
    pub auto_reply: bool,
}

impl Default for VirtualModemConfig {
    fn default() -> Self {
        Self {
            imei: "356938035643809".to_string(),
            auto_reply: true,
        }
    }
}

/// A simulated modem daemon
#[derive(Debug)]
pub struct VirtualModem {
    imei: String,
    auto_reply: bool,
    codec: FrameCodec,
    /// Every request received, in order
    requests: Vec<RecordedRequest>,
    /// Error code to answer with, per opcode
    failures: HashMap<i32, RilErrorCode>,
    /// Framed records waiting to be written to the bridge
    pending_output: VecDeque<Vec<u8>>,
}

impl VirtualModem {
    pub fn new() -> Self {
        Self::from_config(VirtualModemConfig::default())
    }

    pub fn from_config(config: VirtualModemConfig) -> Self {
        Self {
            imei: config.imei,
            auto_reply: config.auto_reply,
            codec: FrameCodec::new(),
            requests: Vec::new(),
            failures: HashMap::new(),
            pending_output: VecDeque::new(),
        }
    }

    pub fn imei(&self) -> &str {
        &self.imei
    }

    pub fn set_auto_reply(&mut self, enabled: bool) {
        self.auto_reply = enabled;
    }

    /// Answer `opcode` with `error` from now on
    pub fn fail_opcode(&mut self, opcode: i32, error: RilErrorCode) {
        self.failures.insert(opcode, error);
    }

    /// All requests received so far
    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    /// Requests received with the given opcode
    pub fn requests_with_opcode(&self, opcode: i32) -> impl Iterator<Item = &RecordedRequest> {
        self.requests.iter().filter(move |r| r.opcode == opcode)
    }

    /// Feed bytes written by the bridge; returns the requests they completed
    pub fn feed(&mut self, data: &[u8]) -> Vec<RecordedRequest> {
        self.codec.push_bytes(data);

        let mut received = Vec::new();
        while let Some(frame) = self.codec.next_frame() {
            match RecordedRequest::parse(frame) {
                Ok(req) => {
                    debug!(
                        "Modem received [{:04}] {}",
                        req.serial,
                        ril_protocol::request_name(req.opcode)
                    );
                    if self.auto_reply {
                        self.auto_respond(&req);
                    }
                    self.requests.push(req.clone());
                    received.push(req);
                }
                Err(e) => warn!("Modem dropped malformed request: {}", e),
            }
        }
        received
    }

    fn auto_respond(&mut self, req: &RecordedRequest) {
        let error = self
            .failures
            .get(&req.opcode)
            .copied()
            .unwrap_or(RilErrorCode::Success);

        let body = match (error, req.opcode) {
            (RilErrorCode::Success, request::GET_IMEI) => {
                let mut p = Parcel::new();
                p.write_string(Some(&self.imei));
                p.into_bytes()
            }
            // One entry: not active
            (RilErrorCode::Success, request::QUERY_CALL_FORWARD_STATUS) => ints_body(&[0]),
            _ => Vec::new(),
        };
        self.reply(req.serial, error, &body);
    }

    /// Queue a solicited response
    pub fn reply(&mut self, serial: i32, error: RilErrorCode, body: &[u8]) {
        self.queue(encode_solicited(serial, error, body));
    }

    /// Queue an arbitrary unsolicited record
    pub fn push_unsolicited(&mut self, opcode: i32, body: &[u8]) {
        self.queue(encode_unsolicited(opcode, body));
    }

    pub fn push_call_status(&mut self, call_id: i32, status: CallStatus) {
        self.push_unsolicited(
            UnsolicitedCode::CallStatus.code(),
            &ints_body(&[call_id, status.code()]),
        );
    }

    pub fn push_radio_state(&mut self, state: RadioState) {
        let mut body = Parcel::new();
        body.write_i32(state.code());
        self.push_unsolicited(UnsolicitedCode::RadioStateChanged.code(), body.as_bytes());
    }

    /// Ask the bridge to restart the daemon
    pub fn push_restart(&mut self) {
        self.push_unsolicited(UnsolicitedCode::RestartDaemon.code(), &[]);
    }

    pub fn push_sim_state_changed(&mut self, new_numbering: bool) {
        let code = if new_numbering {
            UnsolicitedCode::SimStateChangedNew
        } else {
            UnsolicitedCode::SimStateChanged
        };
        self.push_unsolicited(code.code(), &[]);
    }

    pub fn push_factory_ready(&mut self) {
        self.push_unsolicited(UnsolicitedCode::FactoryReady.code(), &[]);
    }

    fn queue(&mut self, record: Vec<u8>) {
        self.pending_output.push_back(encode_frame(&record));
    }

    /// Next framed record to write to the bridge
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.pending_output.pop_front()
    }

    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }
}

impl Default for VirtualModem {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use ril_protocol::{RilRequest, VendorOpcodes};

    proptest! {
        #[test]
        fn chunking_does_not_change_requests(
            serials in prop::collection::vec(0i32..1000, 1..8),
            chunk in 1usize..40
        ) {
            let mut bytes = Vec::new();
            for serial in &serials {
                let parcel = RilRequest::VendorCommand { command: 1, argument: *serial }
                    .encode(*serial, &VendorOpcodes::default())
                    .unwrap();
                bytes.extend(encode_frame(parcel.as_bytes()));
            }

            let mut modem = VirtualModem::new();
            for piece in bytes.chunks(chunk) {
                modem.feed(piece);
            }

            let got: Vec<i32> = modem.requests().iter().map(|r| r.serial).collect();
            prop_assert_eq!(got, serials);
        }
    }
}

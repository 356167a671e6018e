//! Request dispatcher
//!
//! Assigns serial numbers, keeps the in-flight table and matches solicited
//! responses back to whoever submitted the request. Every entry leaves the
//! table exactly once: through a response, a transport failure, or
//! [`RequestDispatcher::clear_all`].

use std::collections::HashMap;

use ril_protocol::{encode_frame, encode_request, request_name, Field, Parcel, RilErrorCode};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::RequestError;

/// Serial handed out first, and again after every reset
pub const SERIAL_BASELINE: i32 = 0;

/// Outcome delivered to a request's completion slot
pub type RequestResult = Result<Parcel, RequestError>;

/// Single-assignment completion slot
pub type Completion = oneshot::Sender<RequestResult>;

/// A request with its serial assigned, ready to write
#[derive(Debug)]
pub struct Request {
    pub serial: i32,
    pub opcode: i32,
    pub parcel: Parcel,
}

struct PendingRequest {
    opcode: i32,
    completion: Option<Completion>,
}

/// Serial allocation and in-flight bookkeeping
pub struct RequestDispatcher {
    next_serial: i32,
    in_flight: HashMap<i32, PendingRequest>,
    outbound_tx: mpsc::Sender<Vec<u8>>,
}

impl RequestDispatcher {
    /// Create a dispatcher writing framed records to `outbound_tx`
    pub fn new(outbound_tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            next_serial: SERIAL_BASELINE,
            in_flight: HashMap::new(),
            outbound_tx,
        }
    }

    /// Serial the next allocation will receive
    pub fn next_serial(&self) -> i32 {
        self.next_serial
    }

    /// Number of requests awaiting a response
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Assign a serial, encode, and register the request
    ///
    /// If the fields do not fit the opcode the completion receives
    /// `RequestError::Encode` and nothing is registered.
    pub fn allocate(
        &mut self,
        opcode: i32,
        fields: &[Field],
        completion: Option<Completion>,
    ) -> Option<Request> {
        let serial = self.next_serial;

        let parcel = match encode_request(opcode, serial, fields) {
            Ok(p) => p,
            Err(e) => {
                warn!("Cannot encode {}: {}", request_name(opcode), e);
                if let Some(tx) = completion {
                    let _ = tx.send(Err(RequestError::Encode(e)));
                }
                return None;
            }
        };

        self.next_serial = self.next_serial.wrapping_add(1);
        self.in_flight
            .insert(serial, PendingRequest { opcode, completion });

        Some(Request {
            serial,
            opcode,
            parcel,
        })
    }

    /// Write a request to the transport
    ///
    /// Returns false (and fails the request with `RadioNotAvailable`) if the
    /// transport is gone.
    pub async fn send(&mut self, request: Request) -> bool {
        debug!(
            "[{:04}]> {}",
            request.serial,
            request_name(request.opcode)
        );

        let frame = encode_frame(request.parcel.as_bytes());
        if self.outbound_tx.send(frame).await.is_err() {
            warn!(
                "Transport closed, failing [{:04}] {}",
                request.serial,
                request_name(request.opcode)
            );
            self.resolve(request.serial, Err(RequestError::RadioNotAvailable));
            return false;
        }
        true
    }

    /// Complete the in-flight request for `serial`
    ///
    /// Unknown serials are logged and ignored. Returns true if an entry was
    /// found.
    pub fn resolve(&mut self, serial: i32, result: RequestResult) -> bool {
        let Some(pending) = self.in_flight.remove(&serial) else {
            warn!("Unexpected solicited response! sn: {}", serial);
            return false;
        };

        debug!(
            "[{:04}]< {} {}",
            serial,
            request_name(pending.opcode),
            if result.is_ok() { "ok" } else { "failed" }
        );

        if let Some(tx) = pending.completion {
            // Receiver may have given up; nothing else to do
            let _ = tx.send(result);
        }
        true
    }

    /// Complete a request from a parsed solicited response
    pub fn resolve_response(&mut self, serial: i32, error: RilErrorCode, payload: Parcel) -> bool {
        let result = match error {
            RilErrorCode::Success => Ok(payload),
            RilErrorCode::RadioNotAvailable => Err(RequestError::RadioNotAvailable),
            code => Err(RequestError::Rejected(code)),
        };
        self.resolve(serial, result)
    }

    /// Restart serial numbering at [`SERIAL_BASELINE`]
    pub fn reset_serial(&mut self) {
        self.next_serial = SERIAL_BASELINE;
    }

    /// Fail every in-flight request with `reason` and empty the table
    ///
    /// Returns the number of requests failed.
    pub fn clear_all(&mut self, reason: RequestError) -> usize {
        let count = self.in_flight.len();
        if count > 0 {
            debug!("Clearing {} in-flight requests: {}", count, reason);
        }
        for (_, pending) in self.in_flight.drain() {
            if let Some(tx) = pending.completion {
                let _ = tx.send(Err(reason.clone()));
            }
        }
        count
    }
}

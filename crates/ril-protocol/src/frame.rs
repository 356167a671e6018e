//! Modem socket framing
//!
//! The daemon socket is a byte stream of records, each preceded by a 4-byte
//! big-endian length header:
//!
//! ```text
//! [len: u32 BE] [parcel bytes ...]
//! ```
//!
//! `FrameCodec` buffers partial reads and yields complete parcel payloads.

use tracing::warn;

/// Largest record the daemon will send or accept
pub const MAX_FRAME_LEN: usize = 8 * 1024;

/// Length of the record header
pub const HEADER_LEN: usize = 4;

/// Prefix a payload with its length header
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Streaming record codec
#[derive(Debug)]
pub struct FrameCodec {
    buffer: Vec<u8>,
}

impl FrameCodec {
    /// Create a new frame codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Push raw bytes into the codec buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete record payload, if available
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.buffer.len() < HEADER_LEN {
                return None;
            }

            let len = u32::from_be_bytes([
                self.buffer[0],
                self.buffer[1],
                self.buffer[2],
                self.buffer[3],
            ]) as usize;

            if len > MAX_FRAME_LEN {
                // Drop the header and try to resync on whatever follows
                warn!("Discarding oversized RIL record header ({} bytes)", len);
                self.buffer.drain(..HEADER_LEN);
                continue;
            }

            if self.buffer.len() < HEADER_LEN + len {
                return None;
            }

            let frame = self.buffer[HEADER_LEN..HEADER_LEN + len].to_vec();
            self.buffer.drain(..HEADER_LEN + len);
            return Some(frame);
        }
    }

    /// Number of buffered bytes not yet returned as a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

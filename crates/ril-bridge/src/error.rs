//! Error types for the bridge

use ril_protocol::{ParseError, ProtocolError, RilErrorCode};
use thiserror::Error;

/// Why a submitted request did not produce a successful response
///
/// `RadioNotAvailable` means the request never got an answer from a live
/// daemon; `Rejected` means the daemon answered with an error code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Transport down, daemon restarting, or bookkeeping cleared
    #[error("radio not available")]
    RadioNotAvailable,

    /// Daemon replied with a non-success error code
    #[error("modem rejected request: {0:?}")]
    Rejected(RilErrorCode),

    /// Request could not be encoded
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}

/// Errors that can occur in the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The bridge actor has stopped
    #[error("bridge actor is not running")]
    ActorGone,

    /// A submitted request failed
    #[error("request failed: {0}")]
    Request(#[from] RequestError),

    /// Daemon stop/start failed
    #[error("failed to {action} daemon {name}: {reason}")]
    Lifecycle {
        /// Daemon service name
        name: String,
        /// "stop" or "start"
        action: &'static str,
        /// Failure description
        reason: String,
    },

    /// Protocol error
    #[error("protocol error: {0}")]
    ProtocolError(#[from] ProtocolError),

    /// Parse error
    #[error("parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Configuration file could not be parsed
    #[error("config error: {0}")]
    ConfigError(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

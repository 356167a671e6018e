//! Unified event stream for the bridge
//!
//! Everything observable about the bridge (socket traffic, audio path
//! changes, radio state, daemon recovery) is emitted through a single event
//! channel so observers see it in the order the actor produced it.
//!
//! Publishing never waits: when observers fall behind and the channel is
//! full, events are dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};

use ril_protocol::{AudioPath, RadioState};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Unified event enum for all bridge activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    // -------------------------------------------------------------------------
    // Traffic events
    // -------------------------------------------------------------------------
    /// Record received from the modem daemon (without frame header)
    ModemDataIn {
        /// Raw record bytes
        data: Vec<u8>,
    },

    /// Record sent to the modem daemon (without frame header)
    ModemDataOut {
        /// Raw record bytes
        data: Vec<u8>,
    },

    // -------------------------------------------------------------------------
    // Call audio events
    // -------------------------------------------------------------------------
    /// A set-audio-path command was sent
    AudioPathChanged {
        /// Path sent to the modem
        path: AudioPath,
    },

    /// The active call set changed
    ActiveCallsChanged {
        /// Active call ids in ascending order
        calls: Vec<i32>,
    },

    // -------------------------------------------------------------------------
    // Radio and SIM events
    // -------------------------------------------------------------------------
    /// Radio state changed
    RadioStateChanged {
        /// New state
        state: RadioState,
    },

    /// ICC status observers were notified
    IccStatusChanged,

    // -------------------------------------------------------------------------
    // Daemon recovery events
    // -------------------------------------------------------------------------
    /// Recovery started; the daemon has been restarted and is settling
    DaemonRestarting {
        /// In-flight requests failed by the restart
        cleared: usize,
    },

    /// Recovery finished and the radio is back on
    DaemonRestarted,

    // -------------------------------------------------------------------------
    // Anomalies
    // -------------------------------------------------------------------------
    /// A solicited response arrived for a serial nobody is waiting on
    ResponseOrphaned {
        /// Serial carried by the response
        serial: i32,
    },

    /// An error occurred in the bridge
    Error {
        /// Source of the error
        source: String,
        /// Error message
        message: String,
    },
}

impl BridgeEvent {
    /// Check if this is a traffic event (for traffic monitor filtering)
    pub fn is_traffic(&self) -> bool {
        matches!(
            self,
            BridgeEvent::ModemDataIn { .. } | BridgeEvent::ModemDataOut { .. }
        )
    }

    /// Check if this is a daemon recovery event
    pub fn is_recovery(&self) -> bool {
        matches!(
            self,
            BridgeEvent::DaemonRestarting { .. } | BridgeEvent::DaemonRestarted
        )
    }
}

/// Non-blocking publisher for [`BridgeEvent`]s
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<BridgeEvent>,
    dropped: AtomicU64,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<BridgeEvent>) -> Self {
        Self {
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue an event, dropping it if the channel is full
    pub fn emit(&self, event: BridgeEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 1000 == 0 {
                    warn!("Event channel full, {} events dropped so far", dropped);
                } else {
                    debug!("Event channel full, dropping traffic={}", event.is_traffic());
                }
            }
            // Nobody listening
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Events dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

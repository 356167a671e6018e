//! Platform services the bridge depends on
//!
//! The bridge only extends the baseline radio interface layer; the baseline
//! itself, the audio manager and the service manager live elsewhere and are
//! reached through these traits.

use async_trait::async_trait;
use ril_protocol::{Parcel, RadioState};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::BridgeError;

/// The baseline radio interface layer being extended
pub trait BaselineRil: Send {
    /// Current radio state
    fn radio_state(&self) -> RadioState;

    /// Change radio state and notify observers
    fn set_radio_state(&mut self, state: RadioState);

    /// Handle an unsolicited event the bridge does not own
    ///
    /// The parcel cursor is positioned on the unsolicited opcode.
    fn process_unsolicited(&mut self, parcel: &mut Parcel);

    /// Notify SIM/ICC status observers
    fn notify_icc_status_changed(&mut self);
}

/// Audio routing queries
pub trait AudioDevices: Send {
    /// Loudspeaker routing requested
    fn is_speakerphone_on(&self) -> bool;

    /// Bluetooth SCO audio connected
    fn is_bluetooth_audio_on(&self) -> bool;
}

/// Modem daemon process control
#[async_trait]
pub trait DaemonLifecycle: Send {
    /// Stop the named daemon
    async fn stop_daemon(&mut self, name: &str) -> Result<(), BridgeError>;

    /// Start the named daemon
    async fn start_daemon(&mut self, name: &str) -> Result<(), BridgeError>;
}

/// Everything the actor needs from the platform
pub struct PlatformServices {
    pub baseline: Box<dyn BaselineRil>,
    pub audio: Box<dyn AudioDevices>,
    pub lifecycle: Box<dyn DaemonLifecycle>,
}

/// Daemon control through the init property service
///
/// Runs `<program> ctl.stop <name>` / `<program> ctl.start <name>`.
#[derive(Debug, Clone)]
pub struct PropertyLifecycle {
    program: String,
}

impl PropertyLifecycle {
    /// Use the given property setter binary
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, action: &'static str, name: &str) -> Result<(), BridgeError> {
        let property = format!("ctl.{}", action);
        debug!("{} {} {}", self.program, property, name);

        let status = Command::new(&self.program)
            .arg(&property)
            .arg(name)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| BridgeError::Lifecycle {
                name: name.to_string(),
                action,
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(BridgeError::Lifecycle {
                name: name.to_string(),
                action,
                reason: format!("{} exited with {}", self.program, status),
            })
        }
    }
}

impl Default for PropertyLifecycle {
    fn default() -> Self {
        Self::new("setprop")
    }
}

#[async_trait]
impl DaemonLifecycle for PropertyLifecycle {
    async fn stop_daemon(&mut self, name: &str) -> Result<(), BridgeError> {
        self.run("stop", name).await
    }

    async fn start_daemon(&mut self, name: &str) -> Result<(), BridgeError> {
        self.run("start", name).await
    }
}

/// Minimal baseline that publishes radio state through a watch channel
///
/// Unsolicited events it receives are logged and dropped.
pub struct TrackingBaseline {
    state_tx: watch::Sender<RadioState>,
    icc_tx: watch::Sender<u64>,
}

impl TrackingBaseline {
    /// Start in `RadioState::Unavailable`
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(RadioState::Unavailable);
        let (icc_tx, _) = watch::channel(0);
        Self { state_tx, icc_tx }
    }

    /// Observe radio state changes
    pub fn subscribe(&self) -> watch::Receiver<RadioState> {
        self.state_tx.subscribe()
    }

    /// Observe ICC status notifications (value counts notifications)
    pub fn subscribe_icc(&self) -> watch::Receiver<u64> {
        self.icc_tx.subscribe()
    }
}

impl Default for TrackingBaseline {
    fn default() -> Self {
        Self::new()
    }
}

impl BaselineRil for TrackingBaseline {
    fn radio_state(&self) -> RadioState {
        *self.state_tx.borrow()
    }

    fn set_radio_state(&mut self, state: RadioState) {
        let old = self.state_tx.send_replace(state);
        if old != state {
            info!("Radio state {:?} -> {:?}", old, state);
        }
    }

    fn process_unsolicited(&mut self, parcel: &mut Parcel) {
        match parcel.read_i32() {
            Ok(opcode) => debug!(
                "Baseline unsolicited {} ({} payload bytes)",
                opcode,
                parcel.remaining()
            ),
            Err(e) => debug!("Baseline unsolicited unreadable: {}", e),
        }
    }

    fn notify_icc_status_changed(&mut self) {
        self.icc_tx.send_modify(|n| *n += 1);
    }
}

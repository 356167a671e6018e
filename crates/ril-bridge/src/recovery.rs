//! Modem daemon recovery
//!
//! When the daemon asks to be restarted the bridge takes the radio down,
//! bounces the daemon, drops all request bookkeeping and waits a short settle
//! window before declaring the radio on again. The settle window is a
//! deadline polled by the actor's select loop rather than a sleep, so the
//! actor keeps answering (and refusing) requests while it runs.

use std::time::Duration;

use ril_protocol::RadioState;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::dispatcher::RequestDispatcher;
use crate::error::{BridgeError, RequestError};
use crate::platform::{BaselineRil, DaemonLifecycle};

/// Daemon restart state machine
#[derive(Debug, Clone)]
pub struct DaemonRecovery {
    daemon_name: String,
    settle: Duration,
    deadline: Option<Instant>,
}

impl DaemonRecovery {
    pub fn new(daemon_name: impl Into<String>, settle: Duration) -> Self {
        Self {
            daemon_name: daemon_name.into(),
            settle,
            deadline: None,
        }
    }

    /// True between the start of a restart and the radio coming back on
    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the settle window ends, if one is running
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn daemon_name(&self) -> &str {
        &self.daemon_name
    }

    /// Run the restart up to the settle window
    ///
    /// Takes the radio down, stops the daemon, resets serial numbering,
    /// fails every in-flight request and starts the daemon again. Returns the
    /// number of requests failed. A stop failure is logged and ignored; a
    /// start failure aborts the procedure with the radio left unavailable.
    ///
    /// Calling this while a settle window is running restarts the procedure.
    pub async fn begin(
        &mut self,
        dispatcher: &mut RequestDispatcher,
        baseline: &mut dyn BaselineRil,
        lifecycle: &mut dyn DaemonLifecycle,
    ) -> Result<usize, BridgeError> {
        if self.deadline.take().is_some() {
            info!("Restart requested during settle window, starting over");
        }
        info!("Restarting {}", self.daemon_name);

        baseline.set_radio_state(RadioState::Unavailable);

        if let Err(e) = lifecycle.stop_daemon(&self.daemon_name).await {
            warn!("Stopping {} failed, continuing: {}", self.daemon_name, e);
        }

        dispatcher.reset_serial();
        let cleared = dispatcher.clear_all(RequestError::RadioNotAvailable);

        lifecycle.start_daemon(&self.daemon_name).await?;

        self.deadline = Some(Instant::now() + self.settle);
        Ok(cleared)
    }

    /// Finish the restart once the settle window has elapsed
    pub fn finish(&mut self, baseline: &mut dyn BaselineRil) {
        self.deadline = None;
        baseline.set_radio_state(RadioState::On);
        info!("{} restarted", self.daemon_name);
    }
}

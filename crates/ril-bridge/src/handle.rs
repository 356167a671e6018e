//! Request surface for the telephony stack
//!
//! [`BridgeHandle`] is a cloneable front for the actor's command channel.
//! Callers submit the same requests they would send to the baseline layer;
//! vendor rewriting happens inside the actor.

use ril_protocol::{CallState, Field, Parcel, RilRequest};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::actor::{run_bridge_actor, BridgeCommand, BridgeStatus};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::platform::PlatformServices;

/// Cloneable handle to a running bridge actor
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    cmd_tx: mpsc::Sender<BridgeCommand>,
}

impl BridgeHandle {
    pub fn new(cmd_tx: mpsc::Sender<BridgeCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Raw command sender, for the socket task
    pub fn sender(&self) -> mpsc::Sender<BridgeCommand> {
        self.cmd_tx.clone()
    }

    async fn send(&self, cmd: BridgeCommand) -> Result<(), BridgeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| BridgeError::ActorGone)
    }

    /// Submit a request and wait for its response body
    pub async fn submit(&self, request: RilRequest) -> Result<Parcel, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send(BridgeCommand::Submit {
            request,
            response: Some(tx),
        })
        .await?;
        let result = rx.await.map_err(|_| BridgeError::ActorGone)?;
        Ok(result?)
    }

    /// Submit a request without waiting for the response
    pub async fn submit_detached(&self, request: RilRequest) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Submit {
            request,
            response: None,
        })
        .await
    }

    /// Read the IMEI
    pub async fn get_imei(&self) -> Result<Option<String>, BridgeError> {
        let mut reply = self.submit(RilRequest::GetImei).await?;
        Ok(reply.read_string()?)
    }

    /// Hang up the held or waiting call
    pub async fn hangup_waiting_or_background(&self) -> Result<(), BridgeError> {
        self.submit(RilRequest::HangupWaitingOrBackground).await?;
        Ok(())
    }

    /// Configure call forwarding
    ///
    /// A `service_class` of 0 means all classes.
    pub async fn set_call_forward(
        &self,
        action: i32,
        reason: i32,
        service_class: i32,
        number: Option<&str>,
        time_seconds: i32,
    ) -> Result<(), BridgeError> {
        self.submit(RilRequest::SetCallForward {
            action,
            reason,
            service_class,
            number: number.map(str::to_string),
            time_seconds,
        })
        .await?;
        Ok(())
    }

    /// Query call forwarding; returns the raw response body
    pub async fn query_call_forward_status(
        &self,
        reason: i32,
        service_class: i32,
        number: Option<&str>,
    ) -> Result<Parcel, BridgeError> {
        self.submit(RilRequest::QueryCallForwardStatus {
            reason,
            service_class,
            number: number.map(str::to_string),
        })
        .await
    }

    /// Send an arbitrary opcode with caller-supplied fields
    pub async fn send_raw(&self, opcode: i32, fields: Vec<Field>) -> Result<Parcel, BridgeError> {
        self.submit(RilRequest::Raw { opcode, fields }).await
    }

    /// Forward a call-state notification from the telephony stack
    pub async fn call_state_changed(
        &self,
        state: CallState,
        number: Option<String>,
    ) -> Result<(), BridgeError> {
        self.send(BridgeCommand::CallStateChanged { state, number })
            .await
    }

    /// Snapshot of the actor state
    pub async fn status(&self) -> Result<BridgeStatus, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send(BridgeCommand::QueryStatus { response: tx }).await?;
        rx.await.map_err(|_| BridgeError::ActorGone)
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Shutdown).await
    }
}

/// Spawn the actor and return its handle, event stream and task
///
/// Framed records for the daemon are written to `outbound_tx`.
pub fn spawn_bridge(
    config: BridgeConfig,
    services: PlatformServices,
    outbound_tx: mpsc::Sender<Vec<u8>>,
) -> (BridgeHandle, mpsc::Receiver<BridgeEvent>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
    let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(run_bridge_actor(
        cmd_rx,
        event_tx,
        outbound_tx,
        services,
        config,
    ));
    (BridgeHandle::new(cmd_tx), event_rx, task)
}

//! Bridge Actor
//!
//! All bridge state (the in-flight table, the active call set, the last audio
//! path sent, daemon recovery) is owned by one async task. Requests from the
//! telephony stack, records from the modem socket, call-state notifications
//! and both timers are funneled through its select loop, so nothing else ever
//! touches that state.
//!
//! # Architecture
//!
//! The actor receives commands through a channel and emits events through
//! another. Framed records for the daemon go out through a third channel
//! drained by [`crate::connection::ModemConnection`].
//!
//! Two deadlines are polled by the loop:
//! - the off-hook audio path re-check, re-armed after each tick while the
//!   call state stays off-hook
//! - the daemon restart settle window
//!
//! # Example
//!
//! ```rust,ignore
//! use ril_bridge::actor::{run_bridge_actor, BridgeCommand};
//! use tokio::sync::mpsc;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//! let (outbound_tx, outbound_rx) = mpsc::channel(256);
//!
//! tokio::spawn(run_bridge_actor(cmd_rx, event_tx, outbound_tx, services, config));
//! ```

use std::time::Duration;

use ril_protocol::{
    AudioPath, CallState, RadioState, RilMessage, RilRequest, VendorOpcodes,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::call_path::CallPathController;
use crate::config::BridgeConfig;
use crate::dispatcher::{Completion, RequestDispatcher};
use crate::error::RequestError;
use crate::events::{BridgeEvent, EventSink};
use crate::platform::PlatformServices;
use crate::recovery::DaemonRecovery;
use crate::router::{route, Routed, VendorEvent};

/// Vendor command sent ahead of every IMEI read
const IMEI_PREPARE_COMMAND: (i32, i32) = (1, 0);

/// Snapshot of the bridge state that can be sent across channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatus {
    /// Radio state as reported by the baseline layer
    pub radio_state: RadioState,
    /// Aggregate call state
    pub call_state: CallState,
    /// Active call ids in ascending order
    pub active_calls: Vec<i32>,
    /// Last audio path sent to the modem
    pub last_path: AudioPath,
    /// Requests awaiting a response
    pub in_flight: usize,
    /// Serial the next request will receive
    pub next_serial: i32,
    /// Daemon restart in progress
    pub restarting: bool,
    /// Modem socket connected
    pub connected: bool,
    /// Hang-up opcode currently in use
    pub hang_up_opcode: i32,
    /// Events dropped because the event channel was full
    pub events_dropped: u64,
}

/// Commands sent to the bridge actor
#[derive(Debug)]
pub enum BridgeCommand {
    /// Submit a request to the modem
    Submit {
        /// The request
        request: RilRequest,
        /// Completion slot, or None for fire-and-forget
        response: Option<Completion>,
    },

    /// A framed record arrived from the modem (emits ModemDataIn, then parses)
    ModemFrame {
        /// Record bytes without the length header
        data: Vec<u8>,
    },

    /// The modem socket is up
    ModemConnected,

    /// The modem socket went away; fails everything in flight
    ModemDisconnected,

    /// Call-state notification from the telephony stack
    CallStateChanged {
        /// New aggregate call state
        state: CallState,
        /// Originating number, if known
        number: Option<String>,
    },

    /// Override the vendor hang-up opcode until the next factory-ready event
    SetHangUpOpcode {
        /// Opcode to use
        opcode: i32,
    },

    /// Query a status snapshot
    QueryStatus {
        /// Channel to send back the snapshot
        response: oneshot::Sender<BridgeStatus>,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Internal state for the bridge actor
struct BridgeActorState {
    dispatcher: RequestDispatcher,
    vendor: VendorOpcodes,
    call_path: CallPathController,
    recovery: DaemonRecovery,
    services: PlatformServices,
    /// Socket up; requests are refused while it is down
    connected: bool,
    /// Next audio path re-check, if armed
    path_check_at: Option<Instant>,
    path_check_interval: Duration,
}

impl BridgeActorState {
    fn new(
        outbound_tx: mpsc::Sender<Vec<u8>>,
        services: PlatformServices,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            dispatcher: RequestDispatcher::new(outbound_tx),
            vendor: VendorOpcodes::new(config.hangup_opcode),
            call_path: CallPathController::new(),
            recovery: DaemonRecovery::new(config.daemon_name.clone(), config.restart_settle()),
            services,
            connected: true,
            path_check_at: None,
            path_check_interval: config.path_check_interval(),
        }
    }

    fn accepting_requests(&self) -> bool {
        self.connected && !self.recovery.is_active()
    }

    fn status(&self, events_dropped: u64) -> BridgeStatus {
        BridgeStatus {
            radio_state: self.services.baseline.radio_state(),
            call_state: self.call_path.call_state(),
            active_calls: self.call_path.active_calls().collect(),
            last_path: self.call_path.last_path(),
            in_flight: self.dispatcher.in_flight_len(),
            next_serial: self.dispatcher.next_serial(),
            restarting: self.recovery.is_active(),
            connected: self.connected,
            hang_up_opcode: self.vendor.hang_up_call(),
            events_dropped,
        }
    }
}

/// Encode, register and write one request
///
/// Returns false if the request could not be encoded or written; its
/// completion has already been resolved in that case.
async fn send_request(
    state: &mut BridgeActorState,
    events: &EventSink,
    request: &RilRequest,
    response: Option<Completion>,
) -> bool {
    let opcode = request.opcode(&state.vendor);
    let Some(req) = state
        .dispatcher
        .allocate(opcode, &request.fields(), response)
    else {
        return false;
    };

    events.emit(BridgeEvent::ModemDataOut {
        data: req.parcel.as_bytes().to_vec(),
    });

    state.dispatcher.send(req).await
}

/// Apply vendor overrides to a submitted request and send it
async fn submit_request(
    state: &mut BridgeActorState,
    events: &EventSink,
    request: RilRequest,
    response: Option<Completion>,
) {
    if !state.accepting_requests() {
        debug!("Refusing {:?}: radio not available", request);
        if let Some(tx) = response {
            let _ = tx.send(Err(RequestError::RadioNotAvailable));
        }
        return;
    }

    let request = match request {
        RilRequest::GetImei => {
            let (command, argument) = IMEI_PREPARE_COMMAND;
            let prepare = RilRequest::VendorCommand { command, argument };
            send_request(state, events, &prepare, None).await;
            RilRequest::GetImei
        }
        // The baseline opcode only works while a call is up
        RilRequest::HangupWaitingOrBackground
            if state.call_path.call_state() != CallState::Offhook =>
        {
            RilRequest::HangUpCall
        }
        other => other,
    };

    send_request(state, events, &request, response).await;
}

/// Tell the modem which audio path to use
async fn send_audio_path(state: &mut BridgeActorState, events: &EventSink, path: AudioPath) {
    info!("Audio path -> {:?}", path);
    send_request(state, events, &RilRequest::SetAudioPath { path }, None).await;
    events.emit(BridgeEvent::AudioPathChanged { path });
}

/// One audio path re-check; re-arms itself while off-hook
async fn run_path_check(state: &mut BridgeActorState, events: &EventSink) {
    let check = state
        .call_path
        .check_audio_route(state.services.audio.as_ref());

    if let Some(path) = check.emit {
        send_audio_path(state, events, path).await;
    }

    state.path_check_at = check
        .rearm
        .then(|| Instant::now() + state.path_check_interval);
}

fn set_radio_state(state: &mut BridgeActorState, events: &EventSink, radio_state: RadioState) {
    let baseline = state.services.baseline.as_mut();
    if baseline.radio_state() == radio_state {
        return;
    }
    baseline.set_radio_state(radio_state);
    events.emit(BridgeEvent::RadioStateChanged { state: radio_state });
}

async fn begin_recovery(state: &mut BridgeActorState, events: &EventSink) {
    let result = state
        .recovery
        .begin(
            &mut state.dispatcher,
            state.services.baseline.as_mut(),
            state.services.lifecycle.as_mut(),
        )
        .await;

    events.emit(BridgeEvent::RadioStateChanged {
        state: RadioState::Unavailable,
    });

    match result {
        Ok(cleared) => events.emit(BridgeEvent::DaemonRestarting { cleared }),
        Err(e) => {
            error!(
                "Restart of {} failed, radio stays unavailable: {}",
                state.recovery.daemon_name(),
                e
            );
            events.emit(BridgeEvent::Error {
                source: "Recovery".to_string(),
                message: e.to_string(),
            });
        }
    }
}

fn finish_recovery(state: &mut BridgeActorState, events: &EventSink) {
    state.recovery.finish(state.services.baseline.as_mut());
    events.emit(BridgeEvent::RadioStateChanged {
        state: RadioState::On,
    });
    events.emit(BridgeEvent::DaemonRestarted);
}

async fn handle_vendor_event(state: &mut BridgeActorState, events: &EventSink, event: VendorEvent) {
    match event {
        VendorEvent::RadioStateChanged(radio_state) => {
            set_radio_state(state, events, radio_state);
        }

        VendorEvent::CallStatus { call_id, status } => {
            let before: Vec<i32> = state.call_path.active_calls().collect();
            let path = state.call_path.on_call_status(call_id, status);
            let after: Vec<i32> = state.call_path.active_calls().collect();

            if before != after {
                events.emit(BridgeEvent::ActiveCallsChanged { calls: after });
            }
            if let Some(path) = path {
                send_audio_path(state, events, path).await;
            }
        }

        VendorEvent::UnknownCallStatus { call_id, code } => {
            debug!("Call {} reported unknown status {}", call_id, code);
        }

        VendorEvent::RestartDaemon => {
            begin_recovery(state, events).await;
        }

        VendorEvent::SimStateChanged(code) => {
            debug!("SIM state changed ({:?})", code);
            state.services.baseline.notify_icc_status_changed();
            events.emit(BridgeEvent::IccStatusChanged);
        }

        VendorEvent::FactoryReady => {
            state.vendor.reassert();
            info!(
                "Factory ready, hang-up opcode 0x{:X}",
                state.vendor.hang_up_call()
            );
        }
    }
}

/// Process one record from the modem
async fn handle_modem_frame(state: &mut BridgeActorState, events: &EventSink, data: Vec<u8>) {
    events.emit(BridgeEvent::ModemDataIn { data: data.clone() });

    let message = match RilMessage::parse(data) {
        Ok(m) => m,
        Err(e) => {
            warn!("Dropping unparseable record: {}", e);
            events.emit(BridgeEvent::Error {
                source: "Modem".to_string(),
                message: e.to_string(),
            });
            return;
        }
    };

    match message {
        RilMessage::Solicited {
            serial,
            error,
            payload,
        } => {
            if !state.dispatcher.resolve_response(serial, error, payload) {
                events.emit(BridgeEvent::ResponseOrphaned { serial });
            }
        }
        RilMessage::Unsolicited(mut parcel) => {
            match route(&mut parcel, state.services.baseline.as_mut()) {
                Ok(Routed::Vendor(event)) => handle_vendor_event(state, events, event).await,
                Ok(Routed::Delegated) => {}
                Err(e) => {
                    warn!("Malformed unsolicited record: {}", e);
                    events.emit(BridgeEvent::Error {
                        source: "Router".to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Run the bridge actor
///
/// Processes commands until [`BridgeCommand::Shutdown`] or until every
/// command sender is dropped. Whatever is still in flight at that point is
/// failed with `RadioNotAvailable`.
///
/// Events are published without waiting; if `event_tx` is not drained they
/// are dropped and counted in [`BridgeStatus::events_dropped`].
///
/// # Arguments
///
/// * `cmd_rx` - Receiver for commands sent to the actor
/// * `event_tx` - Sender for events emitted by the actor
/// * `outbound_tx` - Framed records for the modem socket
/// * `services` - Baseline layer, audio and daemon control
/// * `config` - Timing and naming
pub async fn run_bridge_actor(
    mut cmd_rx: mpsc::Receiver<BridgeCommand>,
    event_tx: mpsc::Sender<BridgeEvent>,
    outbound_tx: mpsc::Sender<Vec<u8>>,
    services: PlatformServices,
    config: BridgeConfig,
) {
    let mut state = BridgeActorState::new(outbound_tx, services, &config);
    let events = EventSink::new(event_tx);
    info!("Bridge actor started");

    loop {
        let path_check_at = state.path_check_at;
        let settle_at = state.recovery.deadline();

        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                match cmd {
                    BridgeCommand::Submit { request, response } => {
                        submit_request(&mut state, &events, request, response).await;
                    }

                    BridgeCommand::ModemFrame { data } => {
                        handle_modem_frame(&mut state, &events, data).await;
                    }

                    BridgeCommand::ModemConnected => {
                        info!("Modem connected");
                        state.connected = true;
                    }

                    BridgeCommand::ModemDisconnected => {
                        warn!("Modem disconnected");
                        state.connected = false;
                        state.dispatcher.clear_all(RequestError::RadioNotAvailable);
                        set_radio_state(&mut state, &events, RadioState::Unavailable);
                    }

                    BridgeCommand::CallStateChanged { state: call_state, number } => {
                        debug!("Call state {:?} ({:?})", call_state, number);
                        if state.call_path.on_call_state_changed(call_state) {
                            // Off-hook checks now; the tick re-arms the single deadline
                            run_path_check(&mut state, &events).await;
                        }
                    }

                    BridgeCommand::SetHangUpOpcode { opcode } => {
                        info!("Hang-up opcode 0x{:X}", opcode);
                        state.vendor.set_hang_up_call(opcode);
                    }

                    BridgeCommand::QueryStatus { response } => {
                        let _ = response.send(state.status(events.dropped()));
                    }

                    BridgeCommand::Shutdown => {
                        info!("Bridge actor shutting down");
                        break;
                    }
                }
            }

            _ = sleep_until(path_check_at.unwrap_or_else(Instant::now)), if path_check_at.is_some() => {
                state.path_check_at = None;
                run_path_check(&mut state, &events).await;
            }

            _ = sleep_until(settle_at.unwrap_or_else(Instant::now)), if settle_at.is_some() => {
                finish_recovery(&mut state, &events);
            }
        }
    }

    state.dispatcher.clear_all(RequestError::RadioNotAvailable);
    info!("Bridge actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use ril_protocol::{
        encode_solicited, encode_unsolicited, ints_body, request, FrameCodec, Parcel,
        RilErrorCode,
    };

    use crate::error::BridgeError;
    use crate::platform::{AudioDevices, BaselineRil, DaemonLifecycle};

    #[derive(Clone, Default)]
    struct Shared {
        radio: Arc<Mutex<Vec<RadioState>>>,
        delegated: Arc<Mutex<Vec<i32>>>,
        icc: Arc<Mutex<u32>>,
        lifecycle: Arc<Mutex<Vec<String>>>,
        speaker: Arc<AtomicBool>,
    }

    struct Baseline(Shared);

    impl BaselineRil for Baseline {
        fn radio_state(&self) -> RadioState {
            self.0.radio.lock().unwrap().last().copied().unwrap_or(RadioState::On)
        }
        fn set_radio_state(&mut self, state: RadioState) {
            self.0.radio.lock().unwrap().push(state);
        }
        fn process_unsolicited(&mut self, parcel: &mut Parcel) {
            let opcode = parcel.read_i32().unwrap();
            self.0.delegated.lock().unwrap().push(opcode);
        }
        fn notify_icc_status_changed(&mut self) {
            *self.0.icc.lock().unwrap() += 1;
        }
    }

    struct Audio(Shared);

    impl AudioDevices for Audio {
        fn is_speakerphone_on(&self) -> bool {
            self.0.speaker.load(Ordering::SeqCst)
        }
        fn is_bluetooth_audio_on(&self) -> bool {
            false
        }
    }

    struct Lifecycle(Shared);

    #[async_trait::async_trait]
    impl DaemonLifecycle for Lifecycle {
        async fn stop_daemon(&mut self, name: &str) -> Result<(), BridgeError> {
            self.0.lifecycle.lock().unwrap().push(format!("stop {}", name));
            Ok(())
        }
        async fn start_daemon(&mut self, name: &str) -> Result<(), BridgeError> {
            self.0.lifecycle.lock().unwrap().push(format!("start {}", name));
            Ok(())
        }
    }

    struct Harness {
        cmd_tx: mpsc::Sender<BridgeCommand>,
        event_rx: mpsc::Receiver<BridgeEvent>,
        outbound_rx: mpsc::Receiver<Vec<u8>>,
        shared: Shared,
        actor: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        fn start() -> Self {
            Self::with_event_capacity(256)
        }

        fn with_event_capacity(capacity: usize) -> Self {
            let shared = Shared::default();
            let services = PlatformServices {
                baseline: Box::new(Baseline(shared.clone())),
                audio: Box::new(Audio(shared.clone())),
                lifecycle: Box::new(Lifecycle(shared.clone())),
            };
            let (cmd_tx, cmd_rx) = mpsc::channel(64);
            let (event_tx, event_rx) = mpsc::channel(capacity);
            let (outbound_tx, outbound_rx) = mpsc::channel(64);
            let actor = tokio::spawn(run_bridge_actor(
                cmd_rx,
                event_tx,
                outbound_tx,
                services,
                BridgeConfig::default(),
            ));
            Self {
                cmd_tx,
                event_rx,
                outbound_rx,
                shared,
                actor,
            }
        }

        async fn submit(&self, request: RilRequest) -> oneshot::Receiver<Result<Parcel, RequestError>> {
            let (tx, rx) = oneshot::channel();
            self.cmd_tx
                .send(BridgeCommand::Submit {
                    request,
                    response: Some(tx),
                })
                .await
                .unwrap();
            rx
        }

        async fn frame(&self, data: Vec<u8>) {
            self.cmd_tx
                .send(BridgeCommand::ModemFrame { data })
                .await
                .unwrap();
        }

        async fn call_state(&self, state: CallState) {
            self.cmd_tx
                .send(BridgeCommand::CallStateChanged {
                    state,
                    number: None,
                })
                .await
                .unwrap();
        }

        async fn status(&self) -> BridgeStatus {
            let (tx, rx) = oneshot::channel();
            self.cmd_tx
                .send(BridgeCommand::QueryStatus { response: tx })
                .await
                .unwrap();
            rx.await.unwrap()
        }

        /// Next outbound record as (opcode, serial, remaining ints)
        async fn outbound(&mut self) -> (i32, i32, Vec<i32>) {
            let bytes = self.outbound_rx.recv().await.unwrap();
            let mut codec = FrameCodec::new();
            codec.push_bytes(&bytes);
            let mut p = Parcel::from_bytes(codec.next_frame().unwrap());
            let opcode = p.read_i32().unwrap();
            let serial = p.read_i32().unwrap();
            let mut rest = Vec::new();
            while p.remaining() >= 4 {
                rest.push(p.read_i32().unwrap());
            }
            (opcode, serial, rest)
        }

        fn drain_events(&mut self) -> Vec<BridgeEvent> {
            let mut events = Vec::new();
            while let Ok(e) = self.event_rx.try_recv() {
                events.push(e);
            }
            events
        }

        async fn shutdown(self) {
            self.cmd_tx.send(BridgeCommand::Shutdown).await.unwrap();
            self.actor.await.unwrap();
        }
    }

    fn call_status(call_id: i32, status: i32) -> Vec<u8> {
        encode_unsolicited(1053, &ints_body(&[call_id, status]))
    }

    #[tokio::test]
    async fn test_get_imei_sends_vendor_command_first() {
        let mut h = Harness::start();
        let rx = h.submit(RilRequest::GetImei).await;

        assert_eq!(h.outbound().await, (request::VENDOR_SEND_COMMAND, 0, vec![1, 0]));
        assert_eq!(h.outbound().await, (request::GET_IMEI, 1, vec![]));

        let mut body = Parcel::new();
        body.write_string(Some("356938035643809"));
        h.frame(encode_solicited(1, RilErrorCode::Success, body.as_bytes()))
            .await;

        let mut reply = rx.await.unwrap().unwrap();
        assert_eq!(reply.read_string().unwrap().as_deref(), Some("356938035643809"));

        // Vendor command response has no waiter but is still expected
        h.frame(encode_solicited(0, RilErrorCode::Success, &[])).await;
        assert_eq!(h.status().await.in_flight, 0);
        assert!(!h
            .drain_events()
            .iter()
            .any(|e| matches!(e, BridgeEvent::ResponseOrphaned { .. })));

        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_hangup_opcode_depends_on_call_state() {
        let mut h = Harness::start();

        h.submit(RilRequest::HangupWaitingOrBackground).await;
        assert_eq!(h.outbound().await.0, 0xB7);

        h.call_state(CallState::Offhook).await;
        // Off-hook with no calls selects idle immediately
        assert_eq!(
            h.outbound().await,
            (request::VENDOR_SET_AUDIO_PATH, 1, vec![1, 0])
        );

        h.submit(RilRequest::HangupWaitingOrBackground).await;
        assert_eq!(h.outbound().await.0, request::HANGUP_WAITING_OR_BACKGROUND);

        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_factory_ready_reasserts_hang_up_opcode() {
        let mut h = Harness::start();
        h.cmd_tx
            .send(BridgeCommand::SetHangUpOpcode { opcode: 0xC0 })
            .await
            .unwrap();
        assert_eq!(h.status().await.hang_up_opcode, 0xC0);

        h.frame(encode_unsolicited(1080, &[])).await;
        assert_eq!(h.status().await.hang_up_opcode, 0xB7);

        h.submit(RilRequest::HangUpCall).await;
        assert_eq!(h.outbound().await.0, 0xB7);

        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_orphaned_response_is_reported() {
        let mut h = Harness::start();
        h.frame(encode_solicited(41, RilErrorCode::Success, &[])).await;
        h.status().await;

        let events = h.drain_events();
        assert!(events.contains(&BridgeEvent::ResponseOrphaned { serial: 41 }));
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_response_is_distinct_from_unavailable() {
        let mut h = Harness::start();
        let rx = h
            .submit(RilRequest::QueryCallForwardStatus {
                reason: 0,
                service_class: 0,
                number: None,
            })
            .await;
        let (_, serial, _) = h.outbound().await;

        h.frame(encode_solicited(serial, RilErrorCode::GenericFailure, &[]))
            .await;
        assert_eq!(
            rx.await.unwrap().unwrap_err(),
            RequestError::Rejected(RilErrorCode::GenericFailure)
        );
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_unowned_unsolicited_reaches_baseline() {
        let mut h = Harness::start();
        h.frame(encode_unsolicited(1009, &ints_body(&[3]))).await;
        h.frame(call_status(7, 2)).await;
        h.status().await;

        assert_eq!(*h.shared.delegated.lock().unwrap(), vec![1009]);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_call_status_sequence_drives_audio_path() {
        let mut h = Harness::start();

        h.frame(call_status(7, 2)).await;
        assert_eq!(h.outbound().await.2, vec![1, 1]);
        h.frame(call_status(7, 7)).await;
        assert_eq!(h.outbound().await.2, vec![1, 1]);
        h.frame(call_status(7, 6)).await;
        assert_eq!(h.outbound().await.2, vec![1, 0]);

        let status = h.status().await;
        assert!(status.active_calls.is_empty());
        assert_eq!(status.last_path, AudioPath::Idle);

        let calls: Vec<Vec<i32>> = h
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                BridgeEvent::ActiveCallsChanged { calls } => Some(calls),
                _ => None,
            })
            .collect();
        assert_eq!(calls, vec![vec![7], vec![]]);

        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_hangup_of_unknown_call_sends_nothing() {
        let mut h = Harness::start();
        h.frame(call_status(42, 6)).await;
        let status = h.status().await;

        assert!(status.active_calls.is_empty());
        assert_eq!(status.last_path, AudioPath::None);
        assert!(h.outbound_rx.try_recv().is_err());
        assert!(!h
            .drain_events()
            .iter()
            .any(|e| matches!(e, BridgeEvent::AudioPathChanged { .. })));
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_undrained_event_channel_does_not_stall_actor() {
        // Event receiver held but never read
        let Harness {
            cmd_tx,
            event_rx: _event_rx,
            mut outbound_rx,
            actor,
            ..
        } = Harness::with_event_capacity(4);
        let outbound = tokio::spawn(async move {
            let mut n = 0;
            while outbound_rx.recv().await.is_some() {
                n += 1;
            }
            n
        });

        for _ in 0..300 {
            cmd_tx
                .send(BridgeCommand::Submit {
                    request: RilRequest::HangUpCall,
                    response: None,
                })
                .await
                .unwrap();
        }

        let (tx, rx) = oneshot::channel();
        cmd_tx
            .send(BridgeCommand::QueryStatus { response: tx })
            .await
            .unwrap();
        let status = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("actor stalled on a full event channel")
            .unwrap();
        assert_eq!(status.in_flight, 300);
        assert_eq!(status.events_dropped, 300 - 4);

        cmd_tx.send(BridgeCommand::Shutdown).await.unwrap();
        actor.await.unwrap();
        assert_eq!(outbound.await.unwrap(), 300);
    }

    #[tokio::test]
    async fn test_sim_state_notifies_icc_observers() {
        let mut h = Harness::start();
        h.frame(encode_unsolicited(1060, &[])).await;
        h.frame(encode_unsolicited(1061, &[])).await;
        h.status().await;

        assert_eq!(*h.shared.icc.lock().unwrap(), 2);
        let icc_events = h
            .drain_events()
            .into_iter()
            .filter(|e| *e == BridgeEvent::IccStatusChanged)
            .count();
        assert_eq!(icc_events, 2);
        h.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_check_follows_speakerphone() {
        let mut h = Harness::start();
        h.frame(call_status(1, 7)).await;
        assert_eq!(h.outbound().await.2, vec![1, 1]);

        h.call_state(CallState::Offhook).await;
        h.status().await;
        // Earpiece already sent, so the immediate check is silent
        assert!(h.outbound_rx.try_recv().is_err());

        h.shared.speaker.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2600)).await;
        assert_eq!(h.outbound().await.2, vec![1, 3]);

        // No change on the following ticks
        tokio::time::sleep(Duration::from_millis(5000)).await;
        h.status().await;
        assert!(h.outbound_rx.try_recv().is_err());

        h.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_check_stops_after_idle() {
        let mut h = Harness::start();
        h.frame(call_status(1, 7)).await;
        h.outbound().await;
        h.call_state(CallState::Offhook).await;
        h.call_state(CallState::Idle).await;
        h.status().await;

        h.shared.speaker.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        h.status().await;
        assert!(h.outbound_rx.try_recv().is_err());

        h.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_refuses_requests_until_settled() {
        let mut h = Harness::start();
        let pending = h.submit(RilRequest::GetImei).await;
        h.outbound().await;
        h.outbound().await;

        h.frame(encode_unsolicited(1055, &[])).await;
        assert_eq!(pending.await.unwrap().unwrap_err(), RequestError::RadioNotAvailable);

        let status = h.status().await;
        assert!(status.restarting);
        assert_eq!(status.radio_state, RadioState::Unavailable);
        assert_eq!(status.next_serial, 0);
        assert_eq!(status.in_flight, 0);

        let refused = h.submit(RilRequest::GetImei).await;
        assert_eq!(refused.await.unwrap().unwrap_err(), RequestError::RadioNotAvailable);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let status = h.status().await;
        assert!(!status.restarting);
        assert_eq!(status.radio_state, RadioState::On);
        assert_eq!(
            *h.shared.lifecycle.lock().unwrap(),
            vec!["stop ril-daemon", "start ril-daemon"]
        );

        h.submit(RilRequest::GetImei).await;
        assert_eq!(h.outbound().await.1, 0);

        let events = h.drain_events();
        assert!(events.contains(&BridgeEvent::DaemonRestarting { cleared: 2 }));
        assert!(events.contains(&BridgeEvent::DaemonRestarted));

        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_fails_in_flight_and_refuses() {
        let mut h = Harness::start();
        let pending = h
            .submit(RilRequest::VendorCommand {
                command: 5,
                argument: 1,
            })
            .await;
        h.outbound().await;

        h.cmd_tx.send(BridgeCommand::ModemDisconnected).await.unwrap();
        assert_eq!(pending.await.unwrap().unwrap_err(), RequestError::RadioNotAvailable);

        let refused = h.submit(RilRequest::GetImei).await;
        assert_eq!(refused.await.unwrap().unwrap_err(), RequestError::RadioNotAvailable);

        h.cmd_tx.send(BridgeCommand::ModemConnected).await.unwrap();
        assert!(h.status().await.connected);

        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_fails_in_flight() {
        let mut h = Harness::start();
        let pending = h
            .submit(RilRequest::SetAudioPath {
                path: AudioPath::Speaker,
            })
            .await;
        h.outbound().await;

        h.shutdown().await;
        assert_eq!(pending.await.unwrap().unwrap_err(), RequestError::RadioNotAvailable);
    }
}

//! Virtual modem actor task
//!
//! Owns a [`VirtualModem`] and the daemon end of a stream. The task uses a
//! select! loop to:
//! - Read framed requests from the bridge and answer them
//! - Apply commands from a channel (push unsolicited events, script replies)
//! - Publish every received request on a broadcast channel for tests

use std::io;

use ril_protocol::{CallStatus, RadioState, RilErrorCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::modem::{RecordedRequest, VirtualModem};

/// Commands that can be sent to a virtual modem task
#[derive(Debug, Clone)]
pub enum VirtualModemCommand {
    /// Report a call status change
    PushCallStatus { call_id: i32, status: CallStatus },
    /// Report a radio state change
    PushRadioState(RadioState),
    /// Ask the bridge to restart the daemon
    PushRestart,
    /// Report a SIM state change
    PushSimStateChanged { new_numbering: bool },
    /// Report factory mode ready
    PushFactoryReady,
    /// Push an arbitrary unsolicited record
    PushUnsolicited { opcode: i32, body: Vec<u8> },
    /// Send a solicited response by hand
    Reply {
        serial: i32,
        error: RilErrorCode,
        body: Vec<u8>,
    },
    /// Answer an opcode with an error from now on
    FailOpcode { opcode: i32, error: RilErrorCode },
    /// Enable or disable automatic replies
    SetAutoReply(bool),
    /// Shutdown the virtual modem task
    Shutdown,
}

async fn flush_output<S>(stream: &mut S, modem: &mut VirtualModem) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    while let Some(bytes) = modem.take_output() {
        stream.write_all(&bytes).await?;
    }
    stream.flush().await
}

/// Run the virtual modem task
///
/// Ends when the stream closes, the command channel closes or
/// [`VirtualModemCommand::Shutdown`] arrives.
pub async fn run_virtual_modem_task<S>(
    mut stream: S,
    mut modem: VirtualModem,
    mut cmd_rx: mpsc::Receiver<VirtualModemCommand>,
    request_tx: broadcast::Sender<RecordedRequest>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 4096];
    info!("Starting virtual modem task");

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual modem stream closed");
                        break;
                    }
                    Ok(n) => {
                        for req in modem.feed(&buf[..n]) {
                            let _ = request_tx.send(req);
                        }
                        flush_output(&mut stream, &mut modem).await?;
                    }
                    Err(e) => {
                        warn!("Virtual modem stream error: {}", e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("Command channel closed for virtual modem");
                    break;
                };
                match cmd {
                    VirtualModemCommand::PushCallStatus { call_id, status } => {
                        modem.push_call_status(call_id, status);
                    }
                    VirtualModemCommand::PushRadioState(state) => modem.push_radio_state(state),
                    VirtualModemCommand::PushRestart => modem.push_restart(),
                    VirtualModemCommand::PushSimStateChanged { new_numbering } => {
                        modem.push_sim_state_changed(new_numbering);
                    }
                    VirtualModemCommand::PushFactoryReady => modem.push_factory_ready(),
                    VirtualModemCommand::PushUnsolicited { opcode, body } => {
                        modem.push_unsolicited(opcode, &body);
                    }
                    VirtualModemCommand::Reply { serial, error, body } => {
                        modem.reply(serial, error, &body);
                    }
                    VirtualModemCommand::FailOpcode { opcode, error } => {
                        modem.fail_opcode(opcode, error);
                    }
                    VirtualModemCommand::SetAutoReply(enabled) => modem.set_auto_reply(enabled),
                    VirtualModemCommand::Shutdown => {
                        info!("Shutdown requested for virtual modem");
                        break;
                    }
                }
                flush_output(&mut stream, &mut modem).await?;
            }
        }
    }

    info!("Virtual modem task ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ril_protocol::{encode_frame, request, FrameCodec, RilMessage, RilRequest, VendorOpcodes};

    #[tokio::test]
    async fn test_requests_are_answered_and_published() {
        let (mut bridge_side, modem_side) = tokio::io::duplex(1024);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (request_tx, mut request_rx) = broadcast::channel(8);

        let task = tokio::spawn(run_virtual_modem_task(
            modem_side,
            VirtualModem::new(),
            cmd_rx,
            request_tx,
        ));

        let parcel = RilRequest::GetImei
            .encode(3, &VendorOpcodes::default())
            .unwrap();
        bridge_side
            .write_all(&encode_frame(parcel.as_bytes()))
            .await
            .unwrap();

        let req = request_rx.recv().await.unwrap();
        assert_eq!(req.opcode, request::GET_IMEI);
        assert_eq!(req.serial, 3);

        let mut codec = FrameCodec::new();
        let mut buf = [0u8; 256];
        let frame = loop {
            let n = bridge_side.read(&mut buf).await.unwrap();
            codec.push_bytes(&buf[..n]);
            if let Some(f) = codec.next_frame() {
                break f;
            }
        };
        assert!(matches!(
            RilMessage::parse(frame).unwrap(),
            RilMessage::Solicited { serial: 3, .. }
        ));

        cmd_tx.send(VirtualModemCommand::Shutdown).await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_pushed_event_is_written() {
        let (mut bridge_side, modem_side) = tokio::io::duplex(1024);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (request_tx, _) = broadcast::channel(8);

        let task = tokio::spawn(run_virtual_modem_task(
            modem_side,
            VirtualModem::new(),
            cmd_rx,
            request_tx,
        ));

        cmd_tx.send(VirtualModemCommand::PushRestart).await.unwrap();

        let mut header = [0u8; 4];
        bridge_side.read_exact(&mut header).await.unwrap();
        let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
        bridge_side.read_exact(&mut body).await.unwrap();
        assert_eq!(body, vec![1, 0, 0, 0, 0x1F, 0x04, 0, 0]);

        drop(cmd_tx);
        task.await.unwrap().unwrap();
    }
}

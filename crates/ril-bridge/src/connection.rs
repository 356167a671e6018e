//! Modem daemon socket
//!
//! Owns the byte stream to the daemon. Incoming bytes are split into records
//! with [`FrameCodec`] and handed to the actor one record at a time; framed
//! records from the actor's dispatcher are written out as they arrive.
//!
//! Generic over the I/O type so tests and the simulator can use
//! `tokio::io::duplex()` in place of the Unix socket.

use std::path::Path;

use ril_protocol::FrameCodec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actor::BridgeCommand;
use crate::error::BridgeError;

/// Why [`ModemConnection::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// The daemon closed the socket
    PeerClosed,
    /// The actor is gone (command or outbound channel closed)
    BridgeClosed,
}

/// Connection to the modem daemon
pub struct ModemConnection<T> {
    name: String,
    io: T,
    codec: FrameCodec,
    bridge_tx: mpsc::Sender<BridgeCommand>,
    buffer: Vec<u8>,
}

impl ModemConnection<UnixStream> {
    /// Connect to the daemon's Unix socket
    pub async fn connect(
        path: impl AsRef<Path>,
        bridge_tx: mpsc::Sender<BridgeCommand>,
    ) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).await?;
        info!("Connected to {}", path.display());
        Ok(Self::new(path.display().to_string(), stream, bridge_tx))
    }
}

impl<T> ModemConnection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-open stream
    pub fn new(name: String, io: T, bridge_tx: mpsc::Sender<BridgeCommand>) -> Self {
        Self {
            name,
            io,
            codec: FrameCodec::new(),
            bridge_tx,
            buffer: vec![0u8; 4096],
        }
    }

    /// Pump bytes both ways until one side goes away
    ///
    /// Tells the actor the modem is connected on entry and disconnected on
    /// exit. `outbound_rx` is borrowed so it can be reused for the next
    /// connection.
    pub async fn run(
        mut self,
        outbound_rx: &mut mpsc::Receiver<Vec<u8>>,
    ) -> Result<ConnectionEnd, BridgeError> {
        if self.bridge_tx.send(BridgeCommand::ModemConnected).await.is_err() {
            return Ok(ConnectionEnd::BridgeClosed);
        }

        let result = self.pump(outbound_rx).await;

        if !matches!(result, Ok(ConnectionEnd::BridgeClosed)) {
            let _ = self.bridge_tx.send(BridgeCommand::ModemDisconnected).await;
        }
        info!("Connection to {} ended: {:?}", self.name, result);
        result
    }

    async fn pump(
        &mut self,
        outbound_rx: &mut mpsc::Receiver<Vec<u8>>,
    ) -> Result<ConnectionEnd, BridgeError> {
        loop {
            tokio::select! {
                out = outbound_rx.recv() => {
                    let Some(frame) = out else {
                        return Ok(ConnectionEnd::BridgeClosed);
                    };
                    self.io.write_all(&frame).await?;
                    self.io.flush().await?;
                }

                read = self.io.read(&mut self.buffer) => {
                    let n = match read {
                        Ok(0) => return Ok(ConnectionEnd::PeerClosed),
                        Ok(n) => n,
                        Err(e) => {
                            warn!("Read error on {}: {}", self.name, e);
                            return Err(e.into());
                        }
                    };
                    let data = &self.buffer[..n];
                    debug!("Read {} bytes from {}: {:02X?}", n, self.name, &data[..n.min(64)]);
                    self.codec.push_bytes(data);

                    while let Some(frame) = self.codec.next_frame() {
                        if self
                            .bridge_tx
                            .send(BridgeCommand::ModemFrame { data: frame })
                            .await
                            .is_err()
                        {
                            return Ok(ConnectionEnd::BridgeClosed);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ril_protocol::encode_frame;

    #[tokio::test]
    async fn test_frames_reach_actor_and_outbound_reaches_peer() {
        let (local, mut peer) = tokio::io::duplex(1024);
        let (bridge_tx, mut bridge_rx) = mpsc::channel(16);
        let (outbound_tx, mut outbound_rx) = mpsc::channel(16);

        let conn = ModemConnection::new("duplex".to_string(), local, bridge_tx);
        let task = tokio::spawn(async move { conn.run(&mut outbound_rx).await });

        assert!(matches!(
            bridge_rx.recv().await,
            Some(BridgeCommand::ModemConnected)
        ));

        // Two records split across writes
        let mut bytes = encode_frame(&[1, 0, 0, 0, 0x0F, 0x04, 0, 0]);
        bytes.extend(encode_frame(&[0, 0, 0, 0]));
        peer.write_all(&bytes[..5]).await.unwrap();
        peer.write_all(&bytes[5..]).await.unwrap();

        match bridge_rx.recv().await {
            Some(BridgeCommand::ModemFrame { data }) => {
                assert_eq!(data, vec![1, 0, 0, 0, 0x0F, 0x04, 0, 0])
            }
            other => panic!("Expected ModemFrame, got {:?}", other),
        }
        assert!(matches!(
            bridge_rx.recv().await,
            Some(BridgeCommand::ModemFrame { .. })
        ));

        let out = encode_frame(&[0x26, 0, 0, 0, 0, 0, 0, 0]);
        outbound_tx.send(out.clone()).await.unwrap();
        let mut received = vec![0u8; out.len()];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(received, out);

        drop(peer);
        assert_eq!(task.await.unwrap().unwrap(), ConnectionEnd::PeerClosed);
        assert!(matches!(
            bridge_rx.recv().await,
            Some(BridgeCommand::ModemDisconnected)
        ));
    }

    #[tokio::test]
    async fn test_closed_outbound_ends_connection() {
        let (local, _peer) = tokio::io::duplex(64);
        let (bridge_tx, mut bridge_rx) = mpsc::channel(4);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(4);
        drop(outbound_tx);

        let conn = ModemConnection::new("duplex".to_string(), local, bridge_tx);
        assert_eq!(
            conn.run(&mut outbound_rx).await.unwrap(),
            ConnectionEnd::BridgeClosed
        );
        assert!(matches!(
            bridge_rx.recv().await,
            Some(BridgeCommand::ModemConnected)
        ));
        assert!(bridge_rx.try_recv().is_err());
    }
}

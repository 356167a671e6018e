//! Vendor RIL Bridge Daemon
//!
//! Connects the bridge engine to the modem daemon's Unix socket and keeps it
//! connected. Call-state notifications and audio switches come from an
//! operator console on stdin.
//!
//! Usage: `ril-bridged [config.json]`

mod console;

use std::path::PathBuf;

use anyhow::Context;
use console::{run_console, ConsoleAudio};
use ril_bridge::{
    spawn_bridge, BridgeConfig, BridgeEvent, ConnectionEnd, ModemConnection, PlatformServices,
    PropertyLifecycle, TrackingBaseline,
};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "/etc/ril-bridge.json";

fn log_event(event: &BridgeEvent) {
    match event {
        BridgeEvent::ModemDataIn { data } => debug!("<- {} bytes", data.len()),
        BridgeEvent::ModemDataOut { data } => debug!("-> {} bytes", data.len()),
        BridgeEvent::AudioPathChanged { path } => info!("Audio path {:?}", path),
        BridgeEvent::ActiveCallsChanged { calls } => info!("Active calls {:?}", calls),
        BridgeEvent::RadioStateChanged { state } => info!("Radio {:?}", state),
        BridgeEvent::IccStatusChanged => info!("SIM status changed"),
        BridgeEvent::DaemonRestarting { cleared } => {
            warn!("Modem daemon restarting ({} requests failed)", cleared)
        }
        BridgeEvent::DaemonRestarted => info!("Modem daemon back"),
        BridgeEvent::ResponseOrphaned { serial } => {
            debug!("Response for unknown serial {}", serial)
        }
        BridgeEvent::Error { source, message } => error!("{}: {}", source, message),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ril_bridged=info,ril_protocol=info,ril_bridge=info,ril_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = BridgeConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    info!(
        "Starting RIL bridge on {} (daemon {})",
        config.socket_path, config.daemon_name
    );

    let audio = ConsoleAudio::new();
    let services = PlatformServices {
        baseline: Box::new(TrackingBaseline::new()),
        audio: Box::new(audio.clone()),
        lifecycle: Box::new(PropertyLifecycle::default()),
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel(config.channel_capacity);
    let (bridge, mut events, actor_task) = spawn_bridge(config.clone(), services, outbound_tx);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let console_bridge = bridge.clone();
    let console = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        match run_console(stdin, console_bridge, audio).await {
            Ok(true) => info!("Quit requested"),
            // Running detached: keep serving until interrupted
            Ok(false) => {
                info!("Console input closed");
                std::future::pending::<()>().await
            }
            Err(e) => error!("Console failed: {:#}", e),
        }
    });

    let cmd_tx = bridge.sender();
    let socket_path = config.socket_path.clone();
    let reconnect_delay = config.reconnect_delay();
    let link = tokio::spawn(async move {
        loop {
            match ModemConnection::connect(&socket_path, cmd_tx.clone()).await {
                Ok(conn) => match conn.run(&mut outbound_rx).await {
                    Ok(ConnectionEnd::BridgeClosed) => break,
                    Ok(ConnectionEnd::PeerClosed) => warn!("Modem daemon closed the socket"),
                    Err(e) => warn!("Modem socket error: {}", e),
                },
                Err(e) => debug!("Connect to {} failed: {}", socket_path, e),
            }
            tokio::time::sleep(reconnect_delay).await;
        }
        info!("Modem link stopped");
    });

    tokio::select! {
        result = console => {
            if let Err(e) = result {
                error!("Console task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    bridge.shutdown().await.ok();
    actor_task.await.context("bridge actor panicked")?;
    link.abort();

    info!("RIL bridge stopped");
    Ok(())
}

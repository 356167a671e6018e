//! Operator console
//!
//! Reads commands from stdin so the bridge can be driven by hand on a device
//! without the telephony stack attached. The audio switches set here are what
//! the off-hook path check sees.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ril_bridge::{AudioDevices, BridgeHandle};
use ril_protocol::CallState;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// Speakerphone and Bluetooth switches flipped from the console
#[derive(Debug, Clone, Default)]
pub struct ConsoleAudio {
    speaker: Arc<AtomicBool>,
    bluetooth: Arc<AtomicBool>,
}

impl ConsoleAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_speakerphone(&self, on: bool) {
        self.speaker.store(on, Ordering::SeqCst);
    }

    pub fn set_bluetooth(&self, on: bool) {
        self.bluetooth.store(on, Ordering::SeqCst);
    }
}

impl AudioDevices for ConsoleAudio {
    fn is_speakerphone_on(&self) -> bool {
        self.speaker.load(Ordering::SeqCst)
    }

    fn is_bluetooth_audio_on(&self) -> bool {
        self.bluetooth.load(Ordering::SeqCst)
    }
}

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    CallState {
        state: CallState,
        number: Option<String>,
    },
    Speaker(bool),
    Bluetooth(bool),
    Imei,
    Hangup,
    Status,
    Quit,
}

fn parse_switch(arg: Option<&str>) -> Option<bool> {
    match arg? {
        "on" | "1" => Some(true),
        "off" | "0" => Some(false),
        _ => None,
    }
}

impl ConsoleCommand {
    /// Parse one line; `None` for blank or unknown input
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let arg = words.next();

        let state = match verb {
            "idle" => Some(CallState::Idle),
            "ringing" => Some(CallState::Ringing),
            "offhook" => Some(CallState::Offhook),
            _ => None,
        };
        if let Some(state) = state {
            return Some(Self::CallState {
                state,
                number: arg.map(str::to_string),
            });
        }

        match verb {
            "speaker" => parse_switch(arg).map(Self::Speaker),
            "bt" => parse_switch(arg).map(Self::Bluetooth),
            "imei" => Some(Self::Imei),
            "hangup" => Some(Self::Hangup),
            "status" => Some(Self::Status),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Run console commands until `quit` or end of input
///
/// Returns `true` if the operator asked to quit.
pub async fn run_console<R>(
    input: R,
    bridge: BridgeHandle,
    audio: ConsoleAudio,
) -> anyhow::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(cmd) = ConsoleCommand::parse(&line) else {
            if !line.trim().is_empty() {
                warn!("Unknown command: {}", line.trim());
            }
            continue;
        };

        match cmd {
            ConsoleCommand::CallState { state, number } => {
                bridge.call_state_changed(state, number).await?;
            }
            ConsoleCommand::Speaker(on) => audio.set_speakerphone(on),
            ConsoleCommand::Bluetooth(on) => audio.set_bluetooth(on),
            ConsoleCommand::Imei => match bridge.get_imei().await {
                Ok(imei) => info!("IMEI: {}", imei.as_deref().unwrap_or("<none>")),
                Err(e) => warn!("IMEI read failed: {}", e),
            },
            ConsoleCommand::Hangup => {
                if let Err(e) = bridge.hangup_waiting_or_background().await {
                    warn!("Hang up failed: {}", e);
                }
            }
            ConsoleCommand::Status => {
                let status = bridge.status().await?;
                info!(
                    "radio={:?} call={:?} calls={:?} path={:?} in_flight={} connected={} restarting={} dropped={}",
                    status.radio_state,
                    status.call_state,
                    status.active_calls,
                    status.last_path,
                    status.in_flight,
                    status.connected,
                    status.restarting,
                    status.events_dropped
                );
            }
            ConsoleCommand::Quit => return Ok(true),
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ril_bridge::BridgeCommand;
    use tokio::sync::mpsc;

    #[test]
    fn test_parse_call_states() {
        assert_eq!(
            ConsoleCommand::parse("offhook 5550100"),
            Some(ConsoleCommand::CallState {
                state: CallState::Offhook,
                number: Some("5550100".to_string())
            })
        );
        assert_eq!(
            ConsoleCommand::parse("  idle "),
            Some(ConsoleCommand::CallState {
                state: CallState::Idle,
                number: None
            })
        );
    }

    #[test]
    fn test_parse_switches() {
        assert_eq!(ConsoleCommand::parse("speaker on"), Some(ConsoleCommand::Speaker(true)));
        assert_eq!(ConsoleCommand::parse("bt 0"), Some(ConsoleCommand::Bluetooth(false)));
        assert_eq!(ConsoleCommand::parse("speaker"), None);
        assert_eq!(ConsoleCommand::parse("dial 911"), None);
        assert_eq!(ConsoleCommand::parse(""), None);
    }

    #[tokio::test]
    async fn test_console_forwards_call_state_and_flips_audio() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let audio = ConsoleAudio::new();
        let input: &[u8] = b"speaker on\nringing\nbogus\nquit\nidle\n";

        let quit = run_console(input, BridgeHandle::new(cmd_tx), audio.clone())
            .await
            .unwrap();
        assert!(quit);

        assert!(audio.is_speakerphone_on());
        assert!(matches!(
            cmd_rx.recv().await,
            Some(BridgeCommand::CallStateChanged {
                state: CallState::Ringing,
                number: None
            })
        ));
        // Nothing after quit
        assert!(cmd_rx.try_recv().is_err());
    }
}

//! Platform doubles
//!
//! Cloneable stand-ins for the baseline layer, the audio manager and the
//! service manager. Clones share state, so a test keeps one clone and hands
//! the other to the bridge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ril_bridge::{AudioDevices, BaselineRil, BridgeError, DaemonLifecycle, PlatformServices};
use ril_protocol::{Parcel, RadioState};
use tracing::debug;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Speakerphone and Bluetooth switches
#[derive(Debug, Clone, Default)]
pub struct SimAudio {
    speaker: Arc<AtomicBool>,
    bluetooth: Arc<AtomicBool>,
}

impl SimAudio {
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

impl AudioDevices for SimAudio {
    fn is_speakerphone_on(&self) -> bool {
        self.speaker.load(Ordering::SeqCst)
    }

    fn is_bluetooth_audio_on(&self) -> bool {
        self.bluetooth.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct LifecycleState {
    calls: Vec<String>,
    fail_stop: bool,
    fail_start: bool,
}

/// Records daemon stop/start calls; can be told to fail
#[derive(Debug, Clone, Default)]
pub struct SimLifecycle {
    state: Arc<Mutex<LifecycleState>>,
}

impl SimLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls so far, as `"stop <name>"` / `"start <name>"`
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn set_fail_stop(&self, fail: bool) {
        lock(&self.state).fail_stop = fail;
    }

    pub fn set_fail_start(&self, fail: bool) {
        lock(&self.state).fail_start = fail;
    }

    fn record(&self, action: &'static str, name: &str) -> Result<(), BridgeError> {
        let mut state = lock(&self.state);
        state.calls.push(format!("{} {}", action, name));
        let fail = match action {
            "stop" => state.fail_stop,
            _ => state.fail_start,
        };
        if fail {
            return Err(BridgeError::Lifecycle {
                name: name.to_string(),
                action,
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DaemonLifecycle for SimLifecycle {
    async fn stop_daemon(&mut self, name: &str) -> Result<(), BridgeError> {
        self.record("stop", name)
    }

    async fn start_daemon(&mut self, name: &str) -> Result<(), BridgeError> {
        self.record("start", name)
    }
}

#[derive(Debug)]
struct BaselineState {
    radio_state: RadioState,
    history: Vec<RadioState>,
    /// (cursor position, opcode) for each delegated event
    delegated: Vec<(usize, i32)>,
    icc_notifications: u32,
}

/// Baseline layer double
#[derive(Debug, Clone)]
pub struct SimBaseline {
    state: Arc<Mutex<BaselineState>>,
}

impl SimBaseline {
    /// Start with the radio on
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BaselineState {
                radio_state: RadioState::On,
                history: Vec::new(),
                delegated: Vec::new(),
                icc_notifications: 0,
            })),
        }
    }

    /// Every state passed to `set_radio_state`, in order
    pub fn radio_history(&self) -> Vec<RadioState> {
        lock(&self.state).history.clone()
    }

    /// Opcodes of delegated events with the cursor position they arrived at
    pub fn delegated(&self) -> Vec<(usize, i32)> {
        lock(&self.state).delegated.clone()
    }

    pub fn icc_notifications(&self) -> u32 {
        lock(&self.state).icc_notifications
    }
}

impl Default for SimBaseline {
    fn default() -> Self {
        Self::new()
    }
}

impl BaselineRil for SimBaseline {
    fn radio_state(&self) -> RadioState {
        lock(&self.state).radio_state
    }

    fn set_radio_state(&mut self, state: RadioState) {
        let mut s = lock(&self.state);
        s.radio_state = state;
        s.history.push(state);
    }

    fn process_unsolicited(&mut self, parcel: &mut Parcel) {
        let position = parcel.data_position();
        match parcel.read_i32() {
            Ok(opcode) => {
                debug!("Baseline double got unsolicited {}", opcode);
                lock(&self.state).delegated.push((position, opcode));
            }
            Err(e) => debug!("Baseline double got unreadable record: {}", e),
        }
    }

    fn notify_icc_status_changed(&mut self) {
        lock(&self.state).icc_notifications += 1;
    }
}

/// Shared handles to a full set of platform doubles
#[derive(Debug, Clone, Default)]
pub struct SimPlatform {
    pub baseline: SimBaseline,
    pub audio: SimAudio,
    pub lifecycle: SimLifecycle,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Services for the bridge; state stays shared with `self`
    pub fn services(&self) -> PlatformServices {
        PlatformServices {
            baseline: Box::new(self.baseline.clone()),
            audio: Box::new(self.audio.clone()),
            lifecycle: Box::new(self.lifecycle.clone()),
        }
    }
}

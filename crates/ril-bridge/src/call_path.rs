//! Call audio path controller
//!
//! Tracks which calls are active and which audio path was last sent to the
//! modem. Two inputs drive it:
//!
//! - vendor call-status events, which add and remove call ids and force the
//!   path to earpiece or idle at the edges of the active set
//! - the periodic off-hook re-check, which samples speakerphone/Bluetooth
//!   state and sends a new path only when it differs from the last one sent
//!
//! The controller never talks to the modem itself; it returns the path to
//! send and the actor does the sending. `last_path` is the single record of
//! what the modem was last told.

use std::collections::BTreeSet;

use ril_protocol::{AudioPath, CallState, CallStatus};
use tracing::{debug, info};

use crate::platform::AudioDevices;

/// Result of one periodic re-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCheck {
    /// Path to send, if it changed
    pub emit: Option<AudioPath>,
    /// Whether another check should be scheduled
    pub rearm: bool,
}

/// Active-call tracking and audio path selection
#[derive(Debug, Clone)]
pub struct CallPathController {
    active_calls: BTreeSet<i32>,
    last_path: AudioPath,
    call_state: CallState,
}

impl CallPathController {
    /// No calls, nothing sent, idle
    pub fn new() -> Self {
        Self {
            active_calls: BTreeSet::new(),
            last_path: AudioPath::None,
            call_state: CallState::Idle,
        }
    }

    /// Currently active call ids
    pub fn active_calls(&self) -> impl Iterator<Item = i32> + '_ {
        self.active_calls.iter().copied()
    }

    /// Returns true if `call_id` is in the active set
    pub fn is_active(&self, call_id: i32) -> bool {
        self.active_calls.contains(&call_id)
    }

    /// Last path sent to the modem
    pub fn last_path(&self) -> AudioPath {
        self.last_path
    }

    /// Aggregate call state as last accepted
    pub fn call_state(&self) -> CallState {
        self.call_state
    }

    /// Apply a vendor call-status event
    ///
    /// Returns the path to send. Activation always forces the earpiece, even
    /// when the last path sent was already earpiece; the periodic check moves
    /// it to speaker or Bluetooth afterwards if needed.
    pub fn on_call_status(&mut self, call_id: i32, status: CallStatus) -> Option<AudioPath> {
        let path = match status {
            s if s.activates() => {
                self.active_calls.insert(call_id);
                Some(AudioPath::Earpiece)
            }
            // Unknown ids change nothing, even with the set already empty
            CallStatus::Hangup => {
                let removed = self.active_calls.remove(&call_id);
                (removed && self.active_calls.is_empty()).then_some(AudioPath::Idle)
            }
            _ => None,
        };

        debug!(
            "Call {} status {:?}, active calls {:?}",
            call_id, status, self.active_calls
        );

        if let Some(p) = path {
            self.last_path = p;
        }
        path
    }

    /// Accept a call-state notification from the telephony stack
    ///
    /// The stored state only moves to idle or to something more active, so a
    /// late duplicate cannot regress it. Returns true when the notification
    /// is off-hook, meaning a path check is due now.
    pub fn on_call_state_changed(&mut self, state: CallState) -> bool {
        if state == CallState::Idle || state > self.call_state {
            if state != self.call_state {
                info!("Call state {:?} -> {:?}", self.call_state, state);
            }
            self.call_state = state;
        }
        state == CallState::Offhook
    }

    /// Path the current audio routing calls for
    pub fn desired_path(&self, audio: &dyn AudioDevices) -> AudioPath {
        if self.active_calls.is_empty() {
            AudioPath::Idle
        } else if audio.is_speakerphone_on() {
            AudioPath::Speaker
        } else if audio.is_bluetooth_audio_on() {
            AudioPath::Bluetooth
        } else {
            AudioPath::Earpiece
        }
    }

    /// One tick of the off-hook re-check
    ///
    /// Does nothing and stops the timer when the call state is no longer
    /// off-hook, so a tick that fires late is harmless.
    pub fn check_audio_route(&mut self, audio: &dyn AudioDevices) -> PathCheck {
        if self.call_state != CallState::Offhook {
            return PathCheck {
                emit: None,
                rearm: false,
            };
        }

        let desired = self.desired_path(audio);
        let emit = (desired != self.last_path).then(|| {
            debug!("Audio path {:?} -> {:?}", self.last_path, desired);
            self.last_path = desired;
            desired
        });

        PathCheck {
            emit,
            rearm: self.call_state == CallState::Offhook,
        }
    }
}

impl Default for CallPathController {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn call_status() -> impl Strategy<Value = CallStatus> {
        (0i32..=7).prop_map(|c| CallStatus::try_from(c).unwrap())
    }

    proptest! {
        #[test]
        fn active_set_matches_latest_edge_status(
            events in prop::collection::vec((0i32..5, call_status()), 0..40)
        ) {
            let mut c = CallPathController::new();
            // Last activating-or-hangup status per call
            let mut latest: HashMap<i32, CallStatus> = HashMap::new();

            for (id, status) in &events {
                c.on_call_status(*id, *status);
                if status.activates() || *status == CallStatus::Hangup {
                    latest.insert(*id, *status);
                }
            }

            let mut expected: Vec<i32> = latest
                .iter()
                .filter(|(_, s)| s.activates())
                .map(|(id, _)| *id)
                .collect();
            expected.sort();
            prop_assert_eq!(c.active_calls().collect::<Vec<_>>(), expected);
        }

        #[test]
        fn hangup_of_non_member_is_noop(
            ids in prop::collection::btree_set(0i32..10, 0..5),
            stranger in 10i32..20
        ) {
            let mut c = CallPathController::new();
            for id in &ids {
                c.on_call_status(*id, CallStatus::Answered);
            }
            let before: Vec<i32> = c.active_calls().collect();
            let last = c.last_path();
            prop_assert_eq!(c.on_call_status(stranger, CallStatus::Hangup), None);
            prop_assert_eq!(c.active_calls().collect::<Vec<_>>(), before);
            prop_assert_eq!(c.last_path(), last);
        }
    }
}

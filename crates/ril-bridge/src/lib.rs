//! RIL Bridge Engine
//!
//! This crate extends a baseline radio interface layer with one vendor's
//! proprietary opcodes and call-audio handling.
//!
//! # Architecture
//!
//! A single actor task owns all bridge state:
//!
//! - **Dispatcher**: serial allocation and the in-flight request table
//! - **Router**: peeks unsolicited opcodes, decodes vendor events and hands
//!   everything else to the baseline layer untouched
//! - **Call path**: active call set and the last audio path sent
//! - **Recovery**: daemon restart with a settle window
//!
//! The modem socket runs in its own task ([`ModemConnection`]) and talks to
//! the actor through channels. Everything observable is emitted on a single
//! [`BridgeEvent`] stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use ril_bridge::{spawn_bridge, BridgeConfig, PlatformServices, PropertyLifecycle, TrackingBaseline};
//! # use ril_bridge::AudioDevices;
//! # struct NoAudio;
//! # impl AudioDevices for NoAudio {
//! #     fn is_speakerphone_on(&self) -> bool { false }
//! #     fn is_bluetooth_audio_on(&self) -> bool { false }
//! # }
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> Result<(), ril_bridge::BridgeError> {
//! let services = PlatformServices {
//!     baseline: Box::new(TrackingBaseline::new()),
//!     audio: Box::new(NoAudio),
//!     lifecycle: Box::new(PropertyLifecycle::default()),
//! };
//! let (outbound_tx, _outbound_rx) = mpsc::channel(256);
//! let (bridge, _events, _task) = spawn_bridge(BridgeConfig::default(), services, outbound_tx);
//!
//! let _imei = bridge.get_imei().await?;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod call_path;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handle;
pub mod platform;
pub mod recovery;
pub mod router;

// Re-export actor types
pub use actor::{run_bridge_actor, BridgeCommand, BridgeStatus};
pub use handle::{spawn_bridge, BridgeHandle};

// Re-export event types
pub use events::{BridgeEvent, EventSink};

pub use call_path::{CallPathController, PathCheck};
pub use config::BridgeConfig;
pub use connection::{ConnectionEnd, ModemConnection};
pub use dispatcher::{Completion, Request, RequestDispatcher, RequestResult, SERIAL_BASELINE};
pub use error::{BridgeError, RequestError};
pub use platform::{
    AudioDevices, BaselineRil, DaemonLifecycle, PlatformServices, PropertyLifecycle,
    TrackingBaseline,
};
pub use recovery::DaemonRecovery;
pub use router::{route, Routed, VendorEvent};

//! RIL Simulation Library
//!
//! This crate provides a simulation layer for testing the RIL bridge without
//! a phone. It includes:
//!
//! - **VirtualModem**: the daemon side of the socket protocol, answering
//!   requests and pushing vendor unsolicited events
//! - **Platform doubles**: baseline layer, audio manager and daemon control
//!   stand-ins with shared, inspectable state
//!
//! # Example
//!
//! ```rust
//! use ril_sim::VirtualModem;
//! use ril_protocol::CallStatus;
//!
//! let mut modem = VirtualModem::new();
//! modem.push_call_status(7, CallStatus::DialStart);
//!
//! while let Some(bytes) = modem.take_output() {
//!     println!("Modem output: {:02X?}", bytes);
//! }
//! ```

pub mod modem;
pub mod modem_task;
pub mod platform;

pub use modem::{RecordedRequest, VirtualModem, VirtualModemConfig};
pub use modem_task::{run_virtual_modem_task, VirtualModemCommand};
pub use platform::{SimAudio, SimBaseline, SimLifecycle, SimPlatform};

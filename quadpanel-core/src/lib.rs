//! Board-agnostic message bus for the Quadpanel controller
//!
//! This crate schedules the half-duplex conversation between the
//! controller and its four panels:
//!
//! - Request and response value types with borrowed buffers
//! - Per-port request queues and the global response queue
//! - Per-port protocol state machine with timeout detection
//! - Port-pair scheduler that rotates which two ports may transact
//! - Interrupt flags shared with the serial driver's completion callbacks
//! - Fatal fault reporting, configuration and diagnostics
//!
//! The serial driver itself lives behind [`quadpanel_hal::SerialBus`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod bus;
pub mod config;
pub mod diagnostics;
pub mod fault;
pub mod queue;
pub mod request;
pub mod scheduler;
pub mod state;

#[cfg(test)]
mod testing;

pub use bus::{AckBuffers, MessageBus};
pub use config::{BusConfig, PanelConfig};
pub use diagnostics::{Diagnostics, REPORT_LEN};
pub use fault::{fatal, ErrorCode, Fault};
pub use request::{Request, Response};
pub use scheduler::PortPair;
pub use state::{InterruptFlags, PortStatus};

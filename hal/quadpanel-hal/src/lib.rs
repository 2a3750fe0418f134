//! Quadpanel Hardware Abstraction Layer
//!
//! This crate defines the traits the message bus core needs from the
//! board: a DMA-driven serial collaborator, completion callbacks, panel
//! ready inputs and a tick counter. The firmware implements them on top
//! of the chip HAL; the core's tests implement them with mocks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  quadpanel-firmware (main poll loop)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  quadpanel-core (message bus)           │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  quadpanel-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`serial::SerialBus`] - Start/abort asynchronous transfers on a port
//! - [`serial::TransferEvents`] - Completion callbacks from interrupt context
//! - [`gpio::InputPin`] - Panel ready lines
//! - [`time::TickSource`] - Monotonic tick counter for timeouts

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod line;
pub mod serial;
pub mod time;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use gpio::InputPin;
pub use line::{Connection, LineMux, PhysicalLine};
pub use serial::{SerialBus, TransferEvents};
pub use time::TickSource;
pub use uart::UartConfig;

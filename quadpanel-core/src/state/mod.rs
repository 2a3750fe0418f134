//! Per-port protocol state
//!
//! Each port walks through one half-duplex transaction at a time. The
//! serial driver reports completions through [`InterruptFlags`]; the
//! foreground loop turns the flags into [`PortState`] transitions.

pub mod events;
pub mod machine;

pub use events::{InterruptFlags, PendingEvents};
pub use machine::{PortState, PortStatus};

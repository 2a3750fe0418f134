//! Configuration types
//!
//! Per-deployment settings for the bus: which panels are wired up and how
//! long a port may wait for a panel before giving up.

pub mod ready;
pub mod types;

pub use ready::wait_for_panels;
pub use types::*;

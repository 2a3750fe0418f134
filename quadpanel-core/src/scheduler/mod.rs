//! Port-pair scheduler
//!
//! Two ports transact at a time. The pairing is fixed; only which pair
//! holds the bus rotates, and only once both of its ports are quiescent.

pub mod pair;

pub use pair::{PairScheduler, PortPair};

//! Port pairs and their rotation

use serde::{Deserialize, Serialize};

use quadpanel_protocol::ComportId;

/// Two ports that are selected together
///
/// Each pair holds one of the multiplexed ports, so the shared line only
/// ever serves one port at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortPair {
    pub first: ComportId,
    pub second: ComportId,
}

impl PortPair {
    pub const LEFT_UP: PortPair = PortPair {
        first: ComportId::Left,
        second: ComportId::Up,
    };

    pub const RIGHT_DOWN: PortPair = PortPair {
        first: ComportId::Right,
        second: ComportId::Down,
    };

    pub const fn ports(&self) -> [ComportId; 2] {
        [self.first, self.second]
    }

    pub fn contains(&self, port: ComportId) -> bool {
        self.first == port || self.second == port
    }
}

/// Tracks which pair holds the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairScheduler {
    selected: PortPair,
    unselected: PortPair,
}

impl PairScheduler {
    /// Left and Up hold the bus first
    pub const fn new() -> Self {
        Self {
            selected: PortPair::LEFT_UP,
            unselected: PortPair::RIGHT_DOWN,
        }
    }

    pub fn selected(&self) -> PortPair {
        self.selected
    }

    pub fn is_selected(&self, port: ComportId) -> bool {
        self.selected.contains(port)
    }

    /// Hand the bus to the other pair, returning the newly selected one
    pub fn rotate(&mut self) -> PortPair {
        core::mem::swap(&mut self.selected, &mut self.unselected);
        self.selected
    }
}

impl Default for PairScheduler {
    fn default() -> Self {
        Self::new()
    }
}

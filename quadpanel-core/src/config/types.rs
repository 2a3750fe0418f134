//! Configuration type definitions

use quadpanel_protocol::{ComportId, PORT_COUNT};
use serde::{Deserialize, Serialize};

/// Ticks a port may wait for an acknowledge or response
pub const DEFAULT_RESPONSE_TIMEOUT_TICKS: u32 = 2;

/// Which panel connectors have a panel attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelConfig {
    connected: [bool; PORT_COUNT],
}

impl PanelConfig {
    /// Wiring of the deployed controller: Down and Right
    pub const DEPLOYED: Self = Self::none()
        .with(ComportId::Down, true)
        .with(ComportId::Right, true);

    /// No panels connected
    pub const fn none() -> Self {
        Self {
            connected: [false; PORT_COUNT],
        }
    }

    /// All four panels connected
    pub const fn all() -> Self {
        Self {
            connected: [true; PORT_COUNT],
        }
    }

    /// Mark a single port connected or not
    pub const fn with(mut self, port: ComportId, connected: bool) -> Self {
        self.connected[port.index()] = connected;
        self
    }

    /// Check whether a panel is wired to `port`
    pub const fn panel_connected(&self, port: ComportId) -> bool {
        self.connected[port.index()]
    }

    /// Iterate the connected ports in index order
    pub fn connected_ports(&self) -> impl Iterator<Item = ComportId> + '_ {
        ComportId::ALL
            .into_iter()
            .filter(move |port| self.panel_connected(*port))
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self::DEPLOYED
    }
}

/// Message bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Connected panels; requests to other ports are dropped
    pub panels: PanelConfig,
    /// Ticks after which a waiting port is abandoned
    pub response_timeout_ticks: u32,
}

impl BusConfig {
    /// Default timeout with the given panel wiring
    pub const fn with_panels(panels: PanelConfig) -> Self {
        Self {
            panels,
            response_timeout_ticks: DEFAULT_RESPONSE_TIMEOUT_TICKS,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::with_panels(PanelConfig::DEPLOYED)
    }
}

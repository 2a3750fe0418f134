//! Physical line bookkeeping
//!
//! Left and Down each have a USART of their own. Up and Right share
//! USART2 through two connector pin sets, so only one of them can be
//! wired to the peripheral at a time. [`LineMux`] tracks which one is.

use quadpanel_protocol::ComportId;

/// USART peripheral behind a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhysicalLine {
    /// Left connector
    Usart1,
    /// Up and Right connectors
    Usart2,
    /// Down connector
    Usart3,
}

impl PhysicalLine {
    /// Line serving `port`
    pub const fn of(port: ComportId) -> Self {
        match port {
            ComportId::Left => PhysicalLine::Usart1,
            ComportId::Up | ComportId::Right => PhysicalLine::Usart2,
            ComportId::Down => PhysicalLine::Usart3,
        }
    }

    /// Whether more than one port lives on this line
    pub const fn is_shared(self) -> bool {
        matches!(self, PhysicalLine::Usart2)
    }
}

/// What the driver has to do to connect a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Connection {
    /// Port owns its line, nothing to do
    Dedicated,
    /// Port is already switched onto the shared line
    AlreadyConnected,
    /// Shared line must be torn down and brought up on `to`'s pins
    Switch {
        from: Option<ComportId>,
        to: ComportId,
    },
}

/// Tracks which port is switched onto the shared line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineMux {
    switched: Option<ComportId>,
}

impl LineMux {
    /// Shared line starts disconnected
    pub const fn new() -> Self {
        Self { switched: None }
    }

    /// Port currently on the shared line
    pub fn switched(&self) -> Option<ComportId> {
        self.switched
    }

    /// Record a connect request and report the work it needs
    pub fn connect(&mut self, port: ComportId) -> Connection {
        if !port.is_multiplexed() {
            return Connection::Dedicated;
        }
        if self.switched == Some(port) {
            return Connection::AlreadyConnected;
        }
        let from = self.switched.replace(port);
        Connection::Switch { from, to: port }
    }

    /// Whether transfers on `port` currently reach the panel
    pub fn is_connected(&self, port: ComportId) -> bool {
        !port.is_multiplexed() || self.switched == Some(port)
    }

    /// Logical port a completion on `line` belongs to
    pub fn port_on(&self, line: PhysicalLine) -> Option<ComportId> {
        match line {
            PhysicalLine::Usart1 => Some(ComportId::Left),
            PhysicalLine::Usart2 => self.switched,
            PhysicalLine::Usart3 => Some(ComportId::Down),
        }
    }
}

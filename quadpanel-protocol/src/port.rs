//! Logical panel ports
//!
//! The controller has four panel connectors. Their numeric values are
//! used to index per-port storage, so they must stay 0..=3.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Raw byte used on the host link to mean "no port"
pub const COMPORT_NONE: u8 = 0xFF;

/// Number of logical ports
pub const PORT_COUNT: usize = 4;

/// Logical panel port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ComportId {
    /// Left connector, dedicated line
    Left = 0x00,
    /// Down connector, dedicated line
    Down = 0x01,
    /// Up connector, shares its line with Right
    Up = 0x02,
    /// Right connector, shares its line with Up
    Right = 0x03,
}

/// Raw byte that does not name a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidPort(pub u8);

impl ComportId {
    /// All ports in index order
    pub const ALL: [ComportId; PORT_COUNT] = [
        ComportId::Left,
        ComportId::Down,
        ComportId::Up,
        ComportId::Right,
    ];

    /// Index into per-port arrays
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Raw byte value
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parse a raw port byte
    ///
    /// Returns `Ok(None)` for the [`COMPORT_NONE`] sentinel.
    pub fn from_byte(byte: u8) -> Result<Option<Self>, InvalidPort> {
        match byte {
            COMPORT_NONE => Ok(None),
            _ => Self::try_from(byte).map(Some),
        }
    }

    /// Whether this port shares its physical line with another port
    pub const fn is_multiplexed(self) -> bool {
        matches!(self, ComportId::Up | ComportId::Right)
    }
}

impl TryFrom<u8> for ComportId {
    type Error = InvalidPort;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(ComportId::Left),
            0x01 => Ok(ComportId::Down),
            0x02 => Ok(ComportId::Up),
            0x03 => Ok(ComportId::Right),
            other => Err(InvalidPort(other)),
        }
    }
}

//! Acknowledge format
//!
//! After a command the panel answers `[ACK, command]`; after a payload
//! that expects no response it answers `[ACK]`.

use crate::command::Command;

/// Acknowledge marker byte
pub const ACK: u8 = 0xAC;

/// Length of the acknowledge that follows a command byte
pub const COMMAND_ACK_LEN: usize = 2;

/// Length of the acknowledge that follows a payload
pub const DATA_ACK_LEN: usize = 1;

/// Ways an acknowledge can be wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckError {
    /// First byte was not [`ACK`]
    BadMarker(u8),
    /// Marker was fine but the echoed command differs
    BadEcho { expected: u8, received: u8 },
    /// Fewer bytes than the acknowledge needs
    Truncated,
}

impl AckError {
    /// Pack the offending bytes into one word for fault reporting
    pub fn data(&self) -> u32 {
        match *self {
            AckError::BadMarker(byte) => byte as u32,
            AckError::BadEcho { expected, received } => {
                ((ACK as u32) << 16) | ((expected as u32) << 8) | received as u32
            }
            AckError::Truncated => 0,
        }
    }
}

/// Bytes a panel sends to acknowledge `command`
pub const fn command_ack(command: Command) -> [u8; COMMAND_ACK_LEN] {
    [ACK, command.as_byte()]
}

/// Verify a command acknowledge
pub fn check_command_ack(received: &[u8], command: Command) -> Result<(), AckError> {
    match received {
        [marker, echo, ..] => {
            if *marker != ACK {
                return Err(AckError::BadMarker(*marker));
            }
            if *echo != command.as_byte() {
                return Err(AckError::BadEcho {
                    expected: command.as_byte(),
                    received: *echo,
                });
            }
            Ok(())
        }
        _ => Err(AckError::Truncated),
    }
}

/// Verify a data acknowledge
pub fn check_data_ack(received: &[u8]) -> Result<(), AckError> {
    match received.first() {
        Some(&ACK) => Ok(()),
        Some(&other) => Err(AckError::BadMarker(other)),
        None => Err(AckError::Truncated),
    }
}

//! Transaction shape
//!
//! Which wire phases a transaction goes through depends only on whether
//! it carries a payload and whether it expects a response.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Wire phases of one transaction, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransactionShape {
    /// Panel acknowledges the command byte with `[ACK, command]`
    pub command_ack: bool,
    /// Controller sends a payload after the command
    pub payload: bool,
    /// Panel acknowledges the payload with `[ACK]`
    pub data_ack: bool,
    /// Panel sends a response of the expected length
    pub response: bool,
}

impl TransactionShape {
    /// Compute the shape for a request
    pub const fn of(payload_len: usize, response_len: usize) -> Self {
        let payload = payload_len > 0;
        let response = response_len > 0;
        Self {
            // A bare query is answered with its response straight away
            command_ack: payload || !response,
            payload,
            data_ack: payload && !response,
            response,
        }
    }

    /// Receive armed before the command byte goes out is the response itself
    pub const fn responds_immediately(&self) -> bool {
        !self.command_ack
    }

}

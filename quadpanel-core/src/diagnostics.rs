//! Bus diagnostics
//!
//! A snapshot of the bus, serialized with postcard into a fixed-size
//! report for the host link.

use serde::{Deserialize, Serialize};

use quadpanel_protocol::PORT_COUNT;

use crate::scheduler::PortPair;
use crate::state::PortStatus;

/// Size of one diagnostics report on the host link
pub const REPORT_LEN: usize = 64;

/// Errors while encoding or decoding a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagnosticsError {
    /// Report buffer too small
    Serialize,
    /// Report bytes malformed
    Deserialize,
}

/// Per-port part of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortDiagnostics {
    pub status: PortStatus,
    pub selected: bool,
    /// Requests waiting in the port's queue
    pub queued: u8,
    /// Transactions abandoned for lack of an answer
    pub timeouts: u32,
}

/// Snapshot of the whole bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    /// Indexed by port
    pub ports: [PortDiagnostics; PORT_COUNT],
    /// Pair currently holding the bus
    pub selected: PortPair,
    pub pending_responses: u8,
    /// Responses lost to a full response queue
    pub dropped_responses: u32,
}

impl Diagnostics {
    /// Total timeouts across all ports
    pub fn total_timeouts(&self) -> u32 {
        self.ports
            .iter()
            .fold(0u32, |sum, port| sum.wrapping_add(port.timeouts))
    }

    /// Serialize into `buf`, returning the used prefix
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], DiagnosticsError> {
        postcard::to_slice(self, buf).map_err(|_| DiagnosticsError::Serialize)
    }

    /// Serialize into a zero-padded report
    pub fn to_report(&self) -> Result<[u8; REPORT_LEN], DiagnosticsError> {
        let mut report = [0u8; REPORT_LEN];
        self.encode(&mut report)?;
        Ok(report)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DiagnosticsError> {
        postcard::from_bytes(bytes).map_err(|_| DiagnosticsError::Deserialize)
    }
}

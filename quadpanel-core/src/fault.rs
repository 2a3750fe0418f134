//! Fatal fault reporting
//!
//! Protocol violations and caller contract violations cannot be continued
//! past. They are reported with an error code and one word of auxiliary
//! data, then the firmware halts: release and dev profiles both build with
//! `panic = "abort"`, and the firmware's panic handler never returns.

use quadpanel_protocol::ComportId;

/// Numeric fault codes
///
/// Values are shared with the controller's debug tooling and must not be
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ErrorCode {
    /// Serial driver asked about a port it does not serve
    UartInvalidComport = 0x2101,
    /// Message bus asked about a byte that is not a port
    MsgBusInvalidComport = 0x2201,
    /// Send completed while the port was not sending
    SendCompleteInvalidStatus = 0x2202,
    /// Receive completed while the port was not receiving
    ReceiveCompleteInvalidStatus = 0x2203,
    /// Panel answered with something other than an acknowledge
    ReceiveCompleteNoAck = 0x2204,
    /// Request queue for a port overflowed
    RequestQueueFull = 0x2205,
    /// Response taken while none was pending
    NoPendingResponse = 0x2206,
}

impl ErrorCode {
    /// Numeric code
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// A fatal fault with its auxiliary data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fault {
    pub code: ErrorCode,
    pub data: u32,
}

impl Fault {
    pub const fn new(code: ErrorCode, data: u32) -> Self {
        Self { code, data }
    }

    /// Halt with this fault
    pub fn raise(self) -> ! {
        fatal(self.code, self.data)
    }
}

/// Report a fatal fault and halt
#[cold]
#[track_caller]
pub fn fatal(code: ErrorCode, data: u32) -> ! {
    error!("fatal fault {} ({:#x}), data {:#x}", code, code.code(), data);
    panic!(
        "fatal fault {:?} ({:#06x}), data {:#010x}",
        code,
        code.code(),
        data
    )
}

/// Convert a raw port byte from an external source, halting on garbage
pub fn port_or_fatal(raw: u8) -> ComportId {
    match ComportId::try_from(raw) {
        Ok(port) => port,
        Err(invalid) => fatal(ErrorCode::MsgBusInvalidComport, invalid.0 as u32),
    }
}

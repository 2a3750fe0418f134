//! Completion flags shared with interrupt context
//!
//! One byte per port. The interrupt side only ever sets bits, the
//! foreground side only ever clears bits it has already observed, so an
//! event raised between the two steps survives until the next poll.

use portable_atomic::{AtomicU8, Ordering};
use quadpanel_hal::TransferEvents;
use quadpanel_protocol::{ComportId, PORT_COUNT};

const SEND_COMPLETE: u8 = 1 << 0;
const RECEIVE_COMPLETE: u8 = 1 << 1;

/// Completion flags for all four ports
///
/// `Sync`, so it can live in a `static` next to the interrupt handlers.
pub struct InterruptFlags {
    ports: [AtomicU8; PORT_COUNT],
}

impl InterruptFlags {
    pub const fn new() -> Self {
        Self {
            ports: [
                AtomicU8::new(0),
                AtomicU8::new(0),
                AtomicU8::new(0),
                AtomicU8::new(0),
            ],
        }
    }

    pub fn set_send_complete(&self, port: ComportId) {
        self.ports[port.index()].fetch_or(SEND_COMPLETE, Ordering::Release);
    }

    pub fn set_receive_complete(&self, port: ComportId) {
        self.ports[port.index()].fetch_or(RECEIVE_COMPLETE, Ordering::Release);
    }

    /// Whether any port has an unhandled event
    pub fn any_pending(&self) -> bool {
        self.ports
            .iter()
            .any(|flags| flags.load(Ordering::Acquire) != 0)
    }

    /// Read the events for `port` without clearing them
    pub fn peek(&self, port: ComportId) -> PendingEvents {
        PendingEvents(self.ports[port.index()].load(Ordering::Acquire))
    }

    /// Read and clear the events for `port`
    ///
    /// Only the bits that were observed are cleared.
    pub fn take(&self, port: ComportId) -> PendingEvents {
        let flags = &self.ports[port.index()];
        let observed = flags.load(Ordering::Acquire);
        if observed != 0 {
            flags.fetch_and(!observed, Ordering::AcqRel);
        }
        PendingEvents(observed)
    }
}

impl Default for InterruptFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferEvents for InterruptFlags {
    fn on_send_complete(&self, port: ComportId) {
        self.set_send_complete(port);
    }

    fn on_receive_complete(&self, port: ComportId) {
        self.set_receive_complete(port);
    }
}

/// Events observed on one port during one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingEvents(u8);

impl PendingEvents {
    pub const NONE: PendingEvents = PendingEvents(0);

    pub fn send_complete(self) -> bool {
        self.0 & SEND_COMPLETE != 0
    }

    pub fn receive_complete(self) -> bool {
        self.0 & RECEIVE_COMPLETE != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

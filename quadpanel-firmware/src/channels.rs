//! Inter-task communication channels
//!
//! The bus runs in thread mode and hands transfers to the line tasks on
//! the interrupt executor through these statics. Completions travel back
//! through the core's `InterruptFlags`.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use quadpanel_protocol::ComportId;

/// Pending operations per direction on one line
///
/// A port has at most one send and one receive outstanding; the extra
/// room absorbs an abort queued behind a fresh receive.
const LINE_QUEUE_SIZE: usize = 4;

/// Receive buffer lent to a line task
///
/// Between arming and completion (or abort) the bus leaves the buffer
/// alone, and the line task only writes it in that window. The completion
/// flag is published with release ordering after the last write.
#[derive(Clone, Copy)]
pub struct RxBuffer(&'static [Cell<u8>]);

// SAFETY: ownership of the cells passes to the line task with the `Arm`
// command and back to the bus with the receive-complete flag or the
// abort; the two sides never access them at the same time.
unsafe impl Send for RxBuffer {}

impl RxBuffer {
    pub fn new(cells: &'static [Cell<u8>]) -> Self {
        Self(cells)
    }

    pub fn capacity(&self) -> usize {
        self.0.len()
    }

    /// Copy received bytes into the lent cells
    pub fn fill(&self, bytes: &[u8]) {
        for (cell, byte) in self.0.iter().zip(bytes) {
            cell.set(*byte);
        }
    }
}

/// Work for a line's receive side
#[derive(Clone, Copy)]
pub enum RxCommand {
    /// Start receiving `capacity()` bytes into the buffer
    Arm(RxBuffer),
    /// Drop the armed receive without completing it
    Abort,
}

/// Queues feeding one physical line
pub struct LineChannels {
    pub tx: Channel<CriticalSectionRawMutex, &'static [u8], LINE_QUEUE_SIZE>,
    pub rx: Channel<CriticalSectionRawMutex, RxCommand, LINE_QUEUE_SIZE>,
}

impl LineChannels {
    pub const fn new() -> Self {
        Self {
            tx: Channel::new(),
            rx: Channel::new(),
        }
    }
}

/// USART1, Left connector
pub static LEFT_LINE: LineChannels = LineChannels::new();

/// USART3, Down connector
pub static DOWN_LINE: LineChannels = LineChannels::new();

/// USART2, whichever of Up and Right is switched on
pub static SHARED_LINE: LineChannels = LineChannels::new();

/// Port USART2 should be brought up on next
pub static SHARED_SWITCH: Signal<CriticalSectionRawMutex, ComportId> = Signal::new();

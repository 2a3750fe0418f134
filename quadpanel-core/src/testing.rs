//! Test doubles for the serial driver and the tick source

use core::cell::Cell;
use core::ptr;

use quadpanel_hal::{SerialBus, TickSource};
use quadpanel_protocol::{ComportId, ACK, PORT_COUNT};

use crate::bus::AckBuffers;
use crate::state::InterruptFlags;

/// One call made on the serial driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(ComportId),
    Send(ComportId, Vec<u8>),
    Receive(ComportId, usize),
    Abort(ComportId),
}

impl Call {
    pub fn send(port: ComportId, data: &[u8]) -> Self {
        Call::Send(port, data.to_vec())
    }
}

/// Serial driver that records calls
///
/// In manual mode the test completes transfers with [`complete_send`] and
/// [`deliver`]. In auto mode every send completes at once and an armed
/// receive is answered like a well-behaved panel: acknowledges echo the
/// command, responses repeat the sent bytes doubled.
///
/// [`complete_send`]: MockSerial::complete_send
/// [`deliver`]: MockSerial::deliver
pub struct MockSerial<'a> {
    flags: &'a InterruptFlags,
    acks: &'a AckBuffers,
    calls: Vec<Call>,
    armed: [Option<&'a [Cell<u8>]>; PORT_COUNT],
    auto: bool,
    silent: [bool; PORT_COUNT],
}

impl<'a> MockSerial<'a> {
    pub fn new(flags: &'a InterruptFlags, acks: &'a AckBuffers) -> Self {
        Self {
            flags,
            acks,
            calls: Vec::new(),
            armed: [None; PORT_COUNT],
            auto: false,
            silent: [false; PORT_COUNT],
        }
    }

    /// Mock that plays the panels' side of every transaction
    pub fn auto(flags: &'a InterruptFlags, acks: &'a AckBuffers) -> Self {
        Self {
            auto: true,
            ..Self::new(flags, acks)
        }
    }

    /// In auto mode, never answer on `port`
    pub fn silence(&mut self, port: ComportId) {
        self.silent[port.index()] = true;
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Calls that moved bytes, without connects
    pub fn transfers(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|call| !matches!(call, Call::Connect(_)))
            .cloned()
            .collect()
    }

    /// Whether `buf` is the buffer armed for receiving on `port`
    pub fn armed_is(&self, port: ComportId, buf: &[Cell<u8>]) -> bool {
        self.armed[port.index()].is_some_and(|armed| ptr::eq(armed.as_ptr(), buf.as_ptr()))
    }

    /// Length of the receive armed on `port`
    pub fn armed_len(&self, port: ComportId) -> Option<usize> {
        self.armed[port.index()].map(<[Cell<u8>]>::len)
    }

    pub fn complete_send(&self, port: ComportId) {
        self.flags.set_send_complete(port);
    }

    /// Fill the armed receive on `port` with `bytes` and complete it
    pub fn deliver(&mut self, port: ComportId, bytes: &[u8]) {
        let buf = self.armed[port.index()]
            .take()
            .expect("no receive armed");
        for (cell, byte) in buf.iter().zip(bytes) {
            cell.set(*byte);
        }
        self.flags.set_receive_complete(port);
    }

    fn answer(&mut self, port: ComportId, sent: &[u8]) {
        let Some(buf) = self.armed[port.index()].take() else {
            return;
        };
        let ack = self.acks.for_port(port);
        if ptr::eq(buf.as_ptr(), ack.as_ptr()) {
            buf[0].set(ACK);
            if let (Some(echo), Some(command)) = (buf.get(1), sent.first()) {
                echo.set(*command);
            }
        } else {
            for (i, cell) in buf.iter().enumerate() {
                cell.set(sent[i % sent.len()].wrapping_mul(2));
            }
        }
        self.flags.set_receive_complete(port);
    }
}

impl<'a> SerialBus<'a> for MockSerial<'a> {
    fn connect(&mut self, port: ComportId) {
        self.calls.push(Call::Connect(port));
    }

    fn send(&mut self, port: ComportId, data: &'a [u8]) {
        self.calls.push(Call::send(port, data));
        if self.auto {
            self.flags.set_send_complete(port);
            if !self.silent[port.index()] {
                self.answer(port, data);
            }
        }
    }

    fn receive(&mut self, port: ComportId, buf: &'a [Cell<u8>]) {
        self.calls.push(Call::Receive(port, buf.len()));
        self.armed[port.index()] = Some(buf);
    }

    fn abort_receive(&mut self, port: ComportId) {
        self.calls.push(Call::Abort(port));
        self.armed[port.index()] = None;
    }
}

/// Tick source advanced by hand
#[derive(Default)]
pub struct ManualClock {
    now: Cell<u32>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ticks: u32) {
        self.now.set(self.now.get().wrapping_add(ticks));
    }
}

impl TickSource for ManualClock {
    fn now(&self) -> u32 {
        self.now.get()
    }
}

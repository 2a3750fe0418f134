//! Port protocol state machine
//!
//! One transaction at a time per port:
//!
//! ```text
//! Idle ─start─► SendingCommand ─sent─► AwaitingCommandAck ─ack─► SendingData ─sent─► AwaitingDataAck ─ack─► Done
//!                      │                       │                       │
//!                      └─sent─► Receiving ◄────┴───────────────────────┘
//!                                   │
//!                                   └─received─► Done
//! ```
//!
//! `Done` becomes `Idle` when the scheduler rotates the port out.

use core::cell::Cell;

use serde::{Deserialize, Serialize};

use quadpanel_hal::SerialBus;
use quadpanel_protocol::ack::{check_command_ack, check_data_ack};
use quadpanel_protocol::{ComportId, COMMAND_ACK_LEN, DATA_ACK_LEN};

use crate::fault::{ErrorCode, Fault};
use crate::queue::{Enqueued, QueueFull, RequestQueue};
use crate::request::{Request, Response};

/// Where a port is in its current transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PortStatus {
    /// Nothing in flight
    Idle = 0,
    /// Command byte going out
    SendingCommand = 1,
    /// Waiting for `[ACK, command]`
    AwaitingCommandAck = 2,
    /// Payload going out
    SendingData = 3,
    /// Waiting for `[ACK]`
    AwaitingDataAck = 4,
    /// Waiting for the response bytes
    Receiving = 5,
    /// Transaction finished or timed out
    Done = 6,
}

impl PortStatus {
    /// No transaction in flight
    pub fn is_quiescent(&self) -> bool {
        matches!(self, PortStatus::Idle | PortStatus::Done)
    }

    /// Waiting on the panel, subject to the response timeout
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            PortStatus::AwaitingCommandAck | PortStatus::AwaitingDataAck | PortStatus::Receiving
        )
    }

    pub fn is_busy(&self) -> bool {
        !self.is_quiescent()
    }
}

/// Runtime state of one port
pub struct PortState<'a> {
    port: ComportId,
    status: PortStatus,
    selected: bool,
    current: Option<Request<'a>>,
    response: Option<Response<'a>>,
    queue: RequestQueue<'a>,
    waiting_since: u32,
    timeout_count: u32,
    ack: &'a [Cell<u8>; COMMAND_ACK_LEN],
}

impl<'a> PortState<'a> {
    /// Idle port that receives acknowledges into `ack`
    pub fn new(port: ComportId, ack: &'a [Cell<u8>; COMMAND_ACK_LEN], selected: bool) -> Self {
        Self {
            port,
            status: PortStatus::Idle,
            selected,
            current: None,
            response: None,
            queue: RequestQueue::new(),
            waiting_since: 0,
            timeout_count: 0,
            ack,
        }
    }

    pub fn port(&self) -> ComportId {
        self.port
    }

    pub fn status(&self) -> PortStatus {
        self.status
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Whether a new request can start right away
    pub fn can_start(&self) -> bool {
        self.selected && self.status == PortStatus::Idle
    }

    /// Most recent response received on this port
    pub fn last_response(&self) -> Option<&Response<'a>> {
        self.response.as_ref()
    }

    pub fn timeout_count(&self) -> u32 {
        self.timeout_count
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Whether `request` is the transaction currently on the wire
    pub fn is_in_flight(&self, request: &Request<'_>) -> bool {
        self.status.is_busy()
            && self
                .current
                .as_ref()
                .is_some_and(|current| current.same_as(request))
    }

    /// Queue `request` unless it is already queued or in flight
    pub fn enqueue(&mut self, request: Request<'a>) -> Result<Enqueued, QueueFull> {
        if self.is_in_flight(&request) {
            return Ok(Enqueued::Duplicate);
        }
        self.queue.push(request)
    }

    /// Remove the oldest queued request
    pub fn take_queued(&mut self) -> Option<Request<'a>> {
        self.queue.take()
    }

    pub fn select(&mut self) {
        self.selected = true;
    }

    /// Rotate the port out; whatever finished becomes `Idle`
    pub fn deselect(&mut self) {
        self.selected = false;
        self.status = PortStatus::Idle;
    }

    /// Put `request` on the wire
    ///
    /// The receive for the panel's first answer is armed before the command
    /// byte goes out: the response itself for a bare query, otherwise the
    /// command acknowledge.
    pub fn start<S: SerialBus<'a>>(&mut self, request: Request<'a>, serial: &mut S) {
        debug_assert!(self.can_start(), "start on busy or unselected port");

        self.current = Some(request);
        self.status = PortStatus::SendingCommand;

        match request.response_buffer() {
            Some(buf) if request.shape().responds_immediately() => serial.receive(self.port, buf),
            _ => serial.receive(self.port, self.ack_buf(COMMAND_ACK_LEN)),
        }
        serial.send(self.port, request.command.wire());
    }

    /// Handle a send completion observed at tick `now`
    pub fn send_complete(&mut self, now: u32) -> Result<(), Fault> {
        let shape = self.current.map(|request| request.shape());
        self.status = match (self.status, shape) {
            (PortStatus::SendingCommand, Some(shape)) if shape.responds_immediately() => {
                PortStatus::Receiving
            }
            (PortStatus::SendingCommand, Some(_)) => PortStatus::AwaitingCommandAck,
            (PortStatus::SendingData, Some(shape)) if shape.response => PortStatus::Receiving,
            (PortStatus::SendingData, Some(_)) => PortStatus::AwaitingDataAck,
            (status, _) => return Err(self.invalid(ErrorCode::SendCompleteInvalidStatus, status)),
        };
        self.waiting_since = now;
        Ok(())
    }

    /// Handle a receive completion
    ///
    /// Returns the response when this completion finished one.
    pub fn receive_complete<S: SerialBus<'a>>(
        &mut self,
        serial: &mut S,
    ) -> Result<Option<Response<'a>>, Fault> {
        let (status, Some(request)) = (self.status, self.current) else {
            return Err(self.invalid(ErrorCode::ReceiveCompleteInvalidStatus, self.status));
        };

        match status {
            PortStatus::AwaitingCommandAck => {
                let received = self.take_ack();
                check_command_ack(&received, request.command)
                    .map_err(|err| Fault::new(ErrorCode::ReceiveCompleteNoAck, err.data()))?;

                match request.payload() {
                    None => self.status = PortStatus::Done,
                    Some(data) => {
                        self.status = PortStatus::SendingData;
                        match request.response_buffer() {
                            Some(buf) => serial.receive(self.port, buf),
                            None => serial.receive(self.port, self.ack_buf(DATA_ACK_LEN)),
                        }
                        serial.send(self.port, data);
                    }
                }
                Ok(None)
            }
            PortStatus::AwaitingDataAck => {
                let received = self.take_ack();
                check_data_ack(&received[..DATA_ACK_LEN])
                    .map_err(|err| Fault::new(ErrorCode::ReceiveCompleteNoAck, err.data()))?;
                self.status = PortStatus::Done;
                Ok(None)
            }
            PortStatus::Receiving => {
                let Some(data) = request.response_buffer() else {
                    return Err(self.invalid(ErrorCode::ReceiveCompleteInvalidStatus, status));
                };
                let response = Response {
                    port: self.port,
                    command: request.command,
                    data,
                };
                self.response = Some(response);
                self.status = PortStatus::Done;
                Ok(Some(response))
            }
            status => Err(self.invalid(ErrorCode::ReceiveCompleteInvalidStatus, status)),
        }
    }

    /// Give up on a panel that has been silent for more than `limit` ticks
    ///
    /// Returns `true` if the transaction was abandoned.
    pub fn check_timeout<S: SerialBus<'a>>(&mut self, now: u32, limit: u32, serial: &mut S) -> bool {
        if !self.status.is_waiting() || now.wrapping_sub(self.waiting_since) <= limit {
            return false;
        }

        serial.abort_receive(self.port);
        for cell in self.ack.iter() {
            cell.set(0);
        }
        self.timeout_count = self.timeout_count.wrapping_add(1);
        self.status = PortStatus::Done;
        true
    }

    fn ack_buf(&self, len: usize) -> &'a [Cell<u8>] {
        let ack: &'a [Cell<u8>] = self.ack;
        &ack[..len]
    }

    /// Read the acknowledge bytes and clear them for the next transaction
    fn take_ack(&self) -> [u8; COMMAND_ACK_LEN] {
        let mut received = [0u8; COMMAND_ACK_LEN];
        for (byte, cell) in received.iter_mut().zip(self.ack.iter()) {
            *byte = cell.replace(0);
        }
        received
    }

    fn invalid(&self, code: ErrorCode, status: PortStatus) -> Fault {
        Fault::new(code, ((self.port.as_byte() as u32) << 8) | status as u32)
    }
}

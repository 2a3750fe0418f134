//! Message bus
//!
//! Owns the four port state machines, the pair scheduler and the response
//! queue. Everything here runs on the foreground loop; the serial driver
//! only reaches the bus through [`InterruptFlags`].
//!
//! A typical loop:
//!
//! ```ignore
//! loop {
//!     bus.process_flags();
//!     while bus.have_pending() {
//!         let response = bus.take_pending();
//!         handle(response);
//!     }
//! }
//! ```

use core::cell::Cell;

use quadpanel_hal::{SerialBus, TickSource};
use quadpanel_protocol::{ComportId, COMMAND_ACK_LEN, PORT_COUNT};

use crate::config::BusConfig;
use crate::diagnostics::{Diagnostics, PortDiagnostics};
use crate::fault::{fatal, ErrorCode};
use crate::queue::{Enqueued, QueueFull, ResponseQueue};
use crate::request::{Request, Response};
use crate::scheduler::{PairScheduler, PortPair};
use crate::state::{InterruptFlags, PortState, PortStatus};

const EMPTY_ACK: [Cell<u8>; COMMAND_ACK_LEN] = [Cell::new(0), Cell::new(0)];

/// Acknowledge receive buffers, one per port
///
/// Kept outside the bus so the serial driver can be handed references
/// that outlive every transaction.
pub struct AckBuffers {
    ports: [[Cell<u8>; COMMAND_ACK_LEN]; PORT_COUNT],
}

impl AckBuffers {
    pub const fn new() -> Self {
        Self {
            ports: [EMPTY_ACK; PORT_COUNT],
        }
    }

    pub fn for_port(&self, port: ComportId) -> &[Cell<u8>; COMMAND_ACK_LEN] {
        &self.ports[port.index()]
    }
}

impl Default for AckBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler for the half-duplex conversation with all four panels
pub struct MessageBus<'a, S, T> {
    serial: S,
    clock: T,
    flags: &'a InterruptFlags,
    ports: [PortState<'a>; PORT_COUNT],
    pairs: PairScheduler,
    responses: ResponseQueue<'a>,
    config: BusConfig,
}

impl<'a, S, T> MessageBus<'a, S, T>
where
    S: SerialBus<'a>,
    T: TickSource,
{
    /// Create the bus and connect the initially selected pair
    ///
    /// `flags` must be the same instance the serial driver reports
    /// completions to.
    pub fn new(
        mut serial: S,
        clock: T,
        flags: &'a InterruptFlags,
        acks: &'a AckBuffers,
        config: BusConfig,
    ) -> Self {
        let pairs = PairScheduler::new();
        let ports = ComportId::ALL
            .map(|port| PortState::new(port, acks.for_port(port), pairs.is_selected(port)));
        for port in pairs.selected().ports() {
            serial.connect(port);
        }

        Self {
            serial,
            clock,
            flags,
            ports,
            pairs,
            responses: ResponseQueue::new(),
            config,
        }
    }

    /// Hand a request to the bus
    ///
    /// Starts it at once if its port is selected and idle, queues it
    /// otherwise. Requests for absent panels and resubmissions of a queued
    /// or in-flight request are dropped. Overflowing a port's queue is
    /// fatal.
    pub fn submit(&mut self, request: Request<'a>) {
        let port = request.port;
        if !self.config.panels.panel_connected(port) {
            trace!("drop {}: panel not connected", request);
            return;
        }

        let state = &mut self.ports[port.index()];
        if state.can_start() {
            state.start(request, &mut self.serial);
            return;
        }

        match state.enqueue(request) {
            Ok(Enqueued::Added) => {}
            Ok(Enqueued::Duplicate) => trace!("coalesced duplicate {}", request),
            Err(QueueFull) => fatal(ErrorCode::RequestQueueFull, port.as_byte() as u32),
        }
    }

    /// Advance every port on the completions reported since the last call
    ///
    /// With nothing reported, ports that waited too long are abandoned
    /// instead. Either way the pair rotates if the selected one is done.
    pub fn process_flags(&mut self) {
        let now = self.clock.now();

        if self.flags.any_pending() {
            for port in ComportId::ALL {
                self.process_port(port, now);
            }
        } else {
            self.check_timeouts(now);
        }

        self.switch_if_done();
    }

    fn process_port(&mut self, port: ComportId, now: u32) {
        let events = self.flags.take(port);
        if events.is_empty() {
            return;
        }

        let state = &mut self.ports[port.index()];
        if events.send_complete() {
            if let Err(fault) = state.send_complete(now) {
                fault.raise();
            }
        }
        if events.receive_complete() {
            match state.receive_complete(&mut self.serial) {
                Ok(Some(response)) => {
                    if !self.responses.push(response) {
                        warn!("response queue full, dropped {}", response);
                    }
                }
                Ok(None) => {}
                Err(fault) => fault.raise(),
            }
        }
    }

    fn check_timeouts(&mut self, now: u32) {
        let limit = self.config.response_timeout_ticks;
        for state in self.ports.iter_mut() {
            if state.check_timeout(now, limit, &mut self.serial) {
                warn!(
                    "{} timed out, {} so far",
                    state.port(),
                    state.timeout_count()
                );
            }
        }
    }

    /// Rotate the pair once both selected ports are quiescent
    ///
    /// The ports rotated out become idle; each port rotated in starts its
    /// oldest queued request.
    pub fn switch_if_done(&mut self) {
        let done = self
            .pairs
            .selected()
            .ports()
            .iter()
            .all(|port| self.ports[port.index()].status().is_quiescent());
        if !done {
            return;
        }

        let previous = self.pairs.selected();
        let next = self.pairs.rotate();
        for port in previous.ports() {
            self.ports[port.index()].deselect();
        }
        for port in next.ports() {
            self.serial.connect(port);
            let state = &mut self.ports[port.index()];
            state.select();
            if let Some(request) = state.take_queued() {
                state.start(request, &mut self.serial);
            }
        }
        debug!("pair {} -> {}", previous, next);
    }

    /// Whether a response is waiting
    pub fn have_pending(&self) -> bool {
        !self.responses.is_empty()
    }

    /// Oldest waiting response
    ///
    /// Fatal if none is waiting; check [`have_pending`](Self::have_pending)
    /// first. Copy the data out before the port's next response arrives.
    pub fn take_pending(&mut self) -> Response<'a> {
        match self.responses.take() {
            Some(response) => response,
            None => fatal(ErrorCode::NoPendingResponse, 0),
        }
    }

    /// Poll until `port` is idle with nothing queued
    pub fn wait_for_idle(&mut self, port: ComportId) {
        loop {
            let state = &self.ports[port.index()];
            if state.status() == PortStatus::Idle && state.queued() == 0 {
                return;
            }
            self.process_flags();
        }
    }

    pub fn port_status(&self, port: ComportId) -> PortStatus {
        self.ports[port.index()].status()
    }

    /// Transactions on `port` abandoned for lack of an answer
    pub fn timeout_count(&self, port: ComportId) -> u32 {
        self.ports[port.index()].timeout_count()
    }

    /// Requests waiting in `port`'s queue
    pub fn queued(&self, port: ComportId) -> usize {
        self.ports[port.index()].queued()
    }

    pub fn is_selected(&self, port: ComportId) -> bool {
        self.ports[port.index()].is_selected()
    }

    pub fn selected_pair(&self) -> PortPair {
        self.pairs.selected()
    }

    /// Most recent response received on `port`, consumed or not
    pub fn last_response(&self, port: ComportId) -> Option<&Response<'a>> {
        self.ports[port.index()].last_response()
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    /// Snapshot of the bus for reporting
    pub fn diagnostics(&self) -> Diagnostics {
        let ports = ComportId::ALL.map(|port| {
            let state = &self.ports[port.index()];
            PortDiagnostics {
                status: state.status(),
                selected: state.is_selected(),
                queued: state.queued() as u8,
                timeouts: state.timeout_count(),
            }
        });

        Diagnostics {
            ports,
            selected: self.pairs.selected(),
            pending_responses: self.responses.len() as u8,
            dropped_responses: self.responses.dropped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use crate::queue::RESPONSE_QUEUE_MAX;
    use crate::testing::{Call, ManualClock, MockSerial};
    use quadpanel_protocol::{Command, ACK};

    type TestBus<'a> = MessageBus<'a, MockSerial<'a>, &'a ManualClock>;

    fn all_panels() -> BusConfig {
        BusConfig::with_panels(PanelConfig::all())
    }

    fn bus<'a>(
        serial: MockSerial<'a>,
        clock: &'a ManualClock,
        flags: &'a InterruptFlags,
        acks: &'a AckBuffers,
        config: BusConfig,
    ) -> TestBus<'a> {
        MessageBus::new(serial, clock, flags, acks, config)
    }

    fn assert_one_pair_selected(bus: &TestBus<'_>) {
        let pair = bus.selected_pair();
        for port in ComportId::ALL {
            assert_eq!(bus.is_selected(port), pair.contains(port));
            if !pair.contains(port) {
                assert_eq!(bus.port_status(port), PortStatus::Idle);
            }
        }
    }

    #[test]
    fn test_starts_with_left_up_connected() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let bus = bus(MockSerial::new(&flags, &acks), &clock, &flags, &acks, all_panels());

        assert_eq!(bus.selected_pair(), PortPair::LEFT_UP);
        assert_eq!(
            bus.serial().calls(),
            &[Call::Connect(ComportId::Left), Call::Connect(ComportId::Up)]
        );
        assert_one_pair_selected(&bus);
    }

    #[test]
    fn test_handshake_order_with_payload_and_response() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let payload = [1u8, 2, 3];
        let mut raw = [0u8; 3];
        let reply = Cell::from_mut(&mut raw[..]).as_slice_of_cells();
        let mut bus = bus(MockSerial::new(&flags, &acks), &clock, &flags, &acks, all_panels());

        bus.submit(
            Request::new(ComportId::Left, Command::TestDoubleValues)
                .with_payload(&payload)
                .with_response(reply),
        );
        assert_eq!(bus.serial().armed_len(ComportId::Left), Some(2));
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::SendingCommand);

        bus.serial().complete_send(ComportId::Left);
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::AwaitingCommandAck);

        bus.serial_mut().deliver(ComportId::Left, &[ACK, 0x73]);
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::SendingData);
        assert!(bus.serial().armed_is(ComportId::Left, reply));

        bus.serial().complete_send(ComportId::Left);
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::Receiving);

        bus.serial_mut().deliver(ComportId::Left, &[2, 4, 6]);
        bus.process_flags();

        assert_eq!(
            bus.serial().transfers(),
            vec![
                Call::Receive(ComportId::Left, 2),
                Call::send(ComportId::Left, &[0x73]),
                Call::Receive(ComportId::Left, 3),
                Call::send(ComportId::Left, &payload),
            ]
        );
        assert!(bus.have_pending());
        let response = bus.take_pending();
        assert_eq!(response.port, ComportId::Left);
        assert_eq!(response.to_vec::<4>().as_slice(), &[2, 4, 6]);
    }

    #[test]
    fn test_silent_panel_times_out_once() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut bus = bus(MockSerial::new(&flags, &acks), &clock, &flags, &acks, all_panels());

        bus.submit(Request::new(ComportId::Left, Command::CommitLeds));
        bus.serial().complete_send(ComportId::Left);
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::AwaitingCommandAck);

        clock.advance(2);
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::AwaitingCommandAck);
        assert_eq!(bus.timeout_count(ComportId::Left), 0);

        clock.advance(1);
        bus.process_flags();
        assert_eq!(bus.timeout_count(ComportId::Left), 1);
        assert!(!bus.have_pending());

        // The abandoned port was rotated out in the same poll
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::Idle);
        assert!(!bus.is_selected(ComportId::Left));

        for _ in 0..5 {
            clock.advance(10);
            bus.process_flags();
        }
        let aborts = bus
            .serial()
            .calls()
            .iter()
            .filter(|call| **call == Call::Abort(ComportId::Left))
            .count();
        assert_eq!(aborts, 1);
        assert_eq!(bus.timeout_count(ComportId::Left), 1);
    }

    #[test]
    fn test_pending_flag_delays_overdue_timeout() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut bus = bus(MockSerial::new(&flags, &acks), &clock, &flags, &acks, all_panels());

        bus.submit(Request::new(ComportId::Left, Command::CommitLeds));
        bus.submit(Request::new(ComportId::Up, Command::CommitLeds));
        bus.serial().complete_send(ComportId::Left);
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::AwaitingCommandAck);

        // Left is overdue, but Up reports a completion on the same poll
        clock.advance(3);
        bus.serial().complete_send(ComportId::Up);
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::AwaitingCommandAck);
        assert_eq!(bus.port_status(ComportId::Up), PortStatus::AwaitingCommandAck);
        assert_eq!(bus.timeout_count(ComportId::Left), 0);

        bus.process_flags();
        assert_eq!(bus.timeout_count(ComportId::Left), 1);
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::Done);
        assert_eq!(bus.timeout_count(ComportId::Up), 0);
        assert_eq!(bus.port_status(ComportId::Up), PortStatus::AwaitingCommandAck);
        assert_eq!(
            bus.serial()
                .calls()
                .iter()
                .filter(|call| **call == Call::Abort(ComportId::Left))
                .count(),
            1
        );
    }

    #[test]
    fn test_round_trip_on_unselected_port() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut raw = [0u8; 2];
        let reply = Cell::from_mut(&mut raw[..]).as_slice_of_cells();
        let mut bus = bus(
            MockSerial::new(&flags, &acks),
            &clock,
            &flags,
            &acks,
            BusConfig::default(),
        );

        bus.submit(Request::new(ComportId::Down, Command::RequestSensors).with_response(reply));
        assert_eq!(bus.queued(ComportId::Down), 1);
        assert_eq!(bus.port_status(ComportId::Down), PortStatus::Idle);

        // Left and Up are idle, so the first poll hands the bus over
        bus.process_flags();
        assert_eq!(bus.selected_pair(), PortPair::RIGHT_DOWN);
        assert_eq!(bus.queued(ComportId::Down), 0);
        assert_eq!(bus.port_status(ComportId::Down), PortStatus::SendingCommand);
        assert!(bus.serial().armed_is(ComportId::Down, reply));

        bus.serial().complete_send(ComportId::Down);
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Down), PortStatus::Receiving);

        bus.serial_mut().deliver(ComportId::Down, &[0xBE, 0xEF]);
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Down), PortStatus::Idle);

        let response = bus.take_pending();
        assert_eq!(response.port, ComportId::Down);
        assert_eq!(response.command, Command::RequestSensors);
        assert_eq!(response.len(), 2);
        assert_eq!(response.to_vec::<2>().as_slice(), &[0xBE, 0xEF]);
        assert!(!bus.have_pending());
        assert!(bus.last_response(ComportId::Down).is_some());
    }

    #[test]
    #[should_panic(expected = "RequestQueueFull")]
    fn test_request_queue_overflow_is_fatal() {
        static PAYLOADS: [[u8; 1]; 17] = [[0; 1]; 17];
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut bus = bus(
            MockSerial::new(&flags, &acks),
            &clock,
            &flags,
            &acks,
            BusConfig::default(),
        );

        for (i, payload) in PAYLOADS.iter().enumerate() {
            bus.submit(Request::new(ComportId::Down, Command::ProcessLedSegment).with_payload(payload));
            assert_eq!(bus.queued(ComportId::Down), i + 1);
        }
    }

    #[test]
    fn test_fifth_response_is_dropped() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut raw = [0u8; 10];
        let cells = Cell::from_mut(&mut raw[..]).as_slice_of_cells();
        let mut buffers = cells.chunks(2);
        let mut next = || buffers.next().unwrap();
        let mut bus = bus(MockSerial::auto(&flags, &acks), &clock, &flags, &acks, all_panels());

        for port in ComportId::ALL {
            bus.submit(Request::new(port, Command::RequestSensors).with_response(next()));
        }
        bus.submit(Request::new(ComportId::Left, Command::TestExpect2B).with_response(next()));

        for _ in 0..6 {
            bus.process_flags();
        }

        assert_eq!(bus.diagnostics().dropped_responses, 1);
        for _ in 0..RESPONSE_QUEUE_MAX {
            assert!(bus.have_pending());
            let response = bus.take_pending();
            assert_eq!(response.command, Command::RequestSensors);
            assert_eq!(response.to_vec::<2>().as_slice(), &[0x02, 0x02]);
        }
        assert!(!bus.have_pending());
    }

    #[test]
    fn test_duplicates_are_coalesced() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let payload = [9u8; 4];
        let copy = payload;
        let request = Request::new(ComportId::Down, Command::ProcessLedSegment).with_payload(&payload);
        let mut bus = bus(
            MockSerial::new(&flags, &acks),
            &clock,
            &flags,
            &acks,
            BusConfig::default(),
        );

        bus.submit(request);
        bus.submit(request);
        assert_eq!(bus.queued(ComportId::Down), 1);

        // Now in flight, still a duplicate
        bus.process_flags();
        assert_eq!(bus.port_status(ComportId::Down), PortStatus::SendingCommand);
        bus.submit(request);
        assert_eq!(bus.queued(ComportId::Down), 0);

        // Same bytes in a different buffer are a different request
        bus.submit(Request::new(ComportId::Down, Command::ProcessLedSegment).with_payload(&copy));
        assert_eq!(bus.queued(ComportId::Down), 1);
    }

    #[test]
    fn test_absent_panel_is_ignored() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut bus = bus(
            MockSerial::new(&flags, &acks),
            &clock,
            &flags,
            &acks,
            BusConfig::default(),
        );

        bus.submit(Request::new(ComportId::Left, Command::CommitLeds));
        assert_eq!(bus.port_status(ComportId::Left), PortStatus::Idle);
        assert_eq!(bus.queued(ComportId::Left), 0);
        assert!(bus.serial().transfers().is_empty());
    }

    #[test]
    #[should_panic(expected = "NoPendingResponse")]
    fn test_take_without_pending_is_fatal() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut bus = bus(MockSerial::new(&flags, &acks), &clock, &flags, &acks, all_panels());
        bus.take_pending();
    }

    #[test]
    #[should_panic(expected = "ReceiveCompleteNoAck")]
    fn test_bad_ack_is_fatal() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut bus = bus(MockSerial::new(&flags, &acks), &clock, &flags, &acks, all_panels());

        bus.submit(Request::new(ComportId::Up, Command::CommitLeds));
        bus.serial().complete_send(ComportId::Up);
        bus.process_flags();
        bus.serial_mut().deliver(ComportId::Up, &[0x00, 0x03]);
        bus.process_flags();
    }

    #[test]
    fn test_wait_for_idle_drives_transaction() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let payload = [0x10u8, 0x20];
        let mut raw = [0u8; 4];
        let reply = Cell::from_mut(&mut raw[..]).as_slice_of_cells();
        let mut bus = bus(MockSerial::auto(&flags, &acks), &clock, &flags, &acks, all_panels());

        bus.submit(
            Request::new(ComportId::Down, Command::TestDoubleValues)
                .with_payload(&payload)
                .with_response(reply),
        );
        bus.wait_for_idle(ComportId::Down);

        assert_eq!(bus.port_status(ComportId::Down), PortStatus::Idle);
        assert_eq!(bus.queued(ComportId::Down), 0);
        let response = bus.take_pending();
        assert_eq!(response.to_vec::<4>().as_slice(), &[0x20, 0x40, 0x20, 0x40]);
    }

    #[test]
    fn test_one_pair_selected_throughout() {
        static PAYLOADS: [[u8; 2]; 4] = [[1, 2], [3, 4], [5, 6], [7, 8]];
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut serial = MockSerial::auto(&flags, &acks);
        serial.silence(ComportId::Up);
        let mut bus = bus(serial, &clock, &flags, &acks, all_panels());

        for round in 0..40 {
            let port = ComportId::ALL[round % 4];
            let request = match round % 3 {
                0 => Request::new(port, Command::CommitLeds),
                _ => Request::new(port, Command::ProcessLedSegment)
                    .with_payload(&PAYLOADS[round % PAYLOADS.len()]),
            };
            bus.submit(request);
            bus.process_flags();
            clock.advance(1);
            assert_one_pair_selected(&bus);
        }

        // Up never answers, so let the clock run while the queues drain
        for _ in 0..60 {
            clock.advance(1);
            bus.process_flags();
            assert_one_pair_selected(&bus);
        }
        for port in ComportId::ALL {
            assert_eq!(bus.queued(port), 0);
        }
        assert!(bus.timeout_count(ComportId::Up) > 0);
        assert_eq!(bus.timeout_count(ComportId::Left), 0);
    }

    #[test]
    fn test_diagnostics_snapshot() {
        let (flags, acks, clock) = (InterruptFlags::new(), AckBuffers::new(), ManualClock::new());
        let mut bus = bus(
            MockSerial::new(&flags, &acks),
            &clock,
            &flags,
            &acks,
            BusConfig::default(),
        );
        bus.submit(Request::new(ComportId::Right, Command::CommitLeds));

        let diag = bus.diagnostics();
        assert_eq!(diag.selected, PortPair::LEFT_UP);
        assert_eq!(diag.ports[ComportId::Right.index()].queued, 1);
        assert!(diag.ports[ComportId::Left.index()].selected);
        assert_eq!(diag.ports[ComportId::Left.index()].status, PortStatus::Idle);
        assert_eq!(diag.pending_responses, 0);
    }
}

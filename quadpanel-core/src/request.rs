//! Request and response value types
//!
//! Buffers are borrowed, never owned: the submitter keeps the payload and
//! the response buffer alive for `'a`, and the bus only passes references
//! on to the serial driver. Response buffers are slices of [`Cell`] so the
//! driver can fill them while the request still refers to them; turn a
//! `&mut [u8]` into one with `Cell::from_mut(buf).as_slice_of_cells()`.

use core::cell::Cell;
use core::ptr;

use heapless::Vec;
use quadpanel_protocol::{Command, ComportId, TransactionShape};

/// An outbound command and the reply it expects
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    /// Port the request goes out on
    pub port: ComportId,
    /// Command byte sent first
    pub command: Command,
    payload: Option<&'a [u8]>,
    response: Option<&'a [Cell<u8>]>,
}

impl<'a> Request<'a> {
    /// Command with no payload and no reply
    pub const fn new(port: ComportId, command: Command) -> Self {
        Self {
            port,
            command,
            payload: None,
            response: None,
        }
    }

    /// Send `data` after the command byte
    ///
    /// An empty slice means no payload.
    pub fn with_payload(mut self, data: &'a [u8]) -> Self {
        self.payload = if data.is_empty() { None } else { Some(data) };
        self
    }

    /// Expect `buf.len()` response bytes, written into `buf`
    ///
    /// An empty slice means no response.
    pub fn with_response(mut self, buf: &'a [Cell<u8>]) -> Self {
        self.response = if buf.is_empty() { None } else { Some(buf) };
        self
    }

    /// Outbound payload, if any
    pub fn payload(&self) -> Option<&'a [u8]> {
        self.payload
    }

    /// Buffer the response will land in, if a response is expected
    pub fn response_buffer(&self) -> Option<&'a [Cell<u8>]> {
        self.response
    }

    /// Number of payload bytes
    pub fn send_data_len(&self) -> usize {
        self.payload.map_or(0, <[u8]>::len)
    }

    /// Number of response bytes expected
    pub fn response_len(&self) -> usize {
        self.response.map_or(0, <[Cell<u8>]>::len)
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn expects_response(&self) -> bool {
        self.response.is_some()
    }

    /// Wire phases this request goes through
    pub fn shape(&self) -> TransactionShape {
        TransactionShape::of(self.send_data_len(), self.response_len())
    }

    /// Whether `other` is a resubmission of this request
    ///
    /// Requests are the same when they target the same port with the same
    /// command and the same payload buffer (by address, not contents).
    pub fn same_as(&self, other: &Request<'_>) -> bool {
        self.port == other.port
            && self.command == other.command
            && match (self.payload, other.payload) {
                (None, None) => true,
                (Some(a), Some(b)) => ptr::eq(a.as_ptr(), b.as_ptr()),
                _ => false,
            }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Request<'_> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Request[{} {} out={} in={}]",
            self.port,
            self.command,
            self.send_data_len(),
            self.response_len()
        );
    }
}

/// A completed response
///
/// `data` is the buffer supplied with the originating request. The port
/// reuses its buffer for the next transaction, so copy out before the next
/// response on the same port arrives.
#[derive(Debug, Clone, Copy)]
pub struct Response<'a> {
    /// Port the response came in on
    pub port: ComportId,
    /// Command that asked for it
    pub command: Command,
    /// Received bytes
    pub data: &'a [Cell<u8>],
}

impl<'a> Response<'a> {
    /// Number of bytes received
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte at `index`
    pub fn get(&self, index: usize) -> Option<u8> {
        self.data.get(index).map(Cell::get)
    }

    /// Iterate the received bytes
    pub fn bytes(&self) -> impl Iterator<Item = u8> + 'a {
        self.data.iter().map(Cell::get)
    }

    /// Copy the received bytes into `out`
    ///
    /// Returns the number of bytes copied.
    pub fn copy_to(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.data.len());
        for (dst, src) in out.iter_mut().zip(self.data) {
            *dst = src.get();
        }
        n
    }

    /// Copy up to `N` received bytes into a fixed-capacity vector
    pub fn to_vec<const N: usize>(&self) -> Vec<u8, N> {
        self.bytes().take(N).collect()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Response<'_> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Response[{} {} len={}]", self.port, self.command, self.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_command() {
        let req = Request::new(ComportId::Left, Command::CommitLeds);
        assert!(!req.has_payload());
        assert!(!req.expects_response());
        assert_eq!(req.send_data_len(), 0);
        assert_eq!(req.response_len(), 0);
    }

    #[test]
    fn test_empty_buffers_mean_none() {
        let mut none: [u8; 0] = [];
        let cells = Cell::from_mut(&mut none[..]).as_slice_of_cells();
        let req = Request::new(ComportId::Up, Command::RequestSensors)
            .with_payload(&[])
            .with_response(cells);
        assert!(req.payload().is_none());
        assert!(req.response_buffer().is_none());
    }

    #[test]
    fn test_lengths_and_shape() {
        let payload = [1u8, 2, 3];
        let mut reply = [0u8; 8];
        let cells = Cell::from_mut(&mut reply[..]).as_slice_of_cells();
        let req = Request::new(ComportId::Down, Command::TestDoubleValues)
            .with_payload(&payload)
            .with_response(cells);
        assert_eq!(req.send_data_len(), 3);
        assert_eq!(req.response_len(), 8);
        assert_eq!(req.shape(), TransactionShape::of(3, 8));
    }

    #[test]
    fn test_sameness_uses_payload_address() {
        let a = [7u8; 4];
        let b = [7u8; 4];
        let first = Request::new(ComportId::Left, Command::ProcessLedSegment).with_payload(&a);
        let again = Request::new(ComportId::Left, Command::ProcessLedSegment).with_payload(&a);
        let other_buffer =
            Request::new(ComportId::Left, Command::ProcessLedSegment).with_payload(&b);
        let other_port = Request::new(ComportId::Up, Command::ProcessLedSegment).with_payload(&a);
        let other_command = Request::new(ComportId::Left, Command::CommitLeds).with_payload(&a);

        assert!(first.same_as(&again));
        assert!(!first.same_as(&other_buffer));
        assert!(!first.same_as(&other_port));
        assert!(!first.same_as(&other_command));
    }

    #[test]
    fn test_payloadless_requests_match_on_command() {
        let a = Request::new(ComportId::Down, Command::RequestSensors);
        let b = Request::new(ComportId::Down, Command::RequestSensors);
        let c = Request::new(ComportId::Down, Command::CommitLeds);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_response_reads_through_buffer() {
        let mut raw = [0u8; 3];
        let cells = Cell::from_mut(&mut raw[..]).as_slice_of_cells();
        let resp = Response {
            port: ComportId::Right,
            command: Command::TestExpect2B,
            data: cells,
        };
        cells[0].set(0xBE);
        cells[1].set(0xEF);
        assert_eq!(resp.len(), 3);
        assert_eq!(resp.get(0), Some(0xBE));
        assert_eq!(resp.get(3), None);

        let mut out = [0u8; 2];
        assert_eq!(resp.copy_to(&mut out), 2);
        assert_eq!(out, [0xBE, 0xEF]);

        let v: Vec<u8, 8> = resp.to_vec();
        assert_eq!(v.as_slice(), &[0xBE, 0xEF, 0x00]);
    }
}

//! Serial transfer abstractions
//!
//! The bus core never moves bytes itself. It asks a collaborator to start
//! transfers and learns about their completion through [`TransferEvents`],
//! which the collaborator calls from interrupt context.

use core::cell::Cell;

use quadpanel_protocol::ComportId;

/// Asynchronous, DMA-style transfers on the four logical ports
///
/// Every `send` and every `receive` completes exactly once, reported
/// through [`TransferEvents`], unless the receive is aborted first.
/// Buffers are borrowed for `'a`; the collaborator may read from `data`
/// and write into `buf` at any point until the matching completion.
pub trait SerialBus<'a> {
    /// Electrically connect `port` to its physical line
    ///
    /// Idempotent. For the two ports sharing a line this may tear down and
    /// reconfigure the line; for dedicated ports it does nothing.
    fn connect(&mut self, port: ComportId);

    /// Start sending `data` on `port`
    fn send(&mut self, port: ComportId, data: &'a [u8]);

    /// Start receiving `buf.len()` bytes on `port` into `buf`
    fn receive(&mut self, port: ComportId, buf: &'a [Cell<u8>]);

    /// Cancel the in-flight receive on `port`, if any
    ///
    /// No receive completion is reported for an aborted receive.
    fn abort_receive(&mut self, port: ComportId);
}

/// Completion callbacks
///
/// Called from interrupt context; implementations must only record the
/// event.
pub trait TransferEvents {
    /// A send started with [`SerialBus::send`] finished
    fn on_send_complete(&self, port: ComportId);

    /// A receive started with [`SerialBus::receive`] filled its buffer
    fn on_receive_complete(&self, port: ComportId);
}

impl<T: TransferEvents + ?Sized> TransferEvents for &T {
    fn on_send_complete(&self, port: ComportId) {
        (**self).on_send_complete(port)
    }

    fn on_receive_complete(&self, port: ComportId) {
        (**self).on_receive_complete(port)
    }
}

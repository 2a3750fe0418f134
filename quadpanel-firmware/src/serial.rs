//! Panel serial driver
//!
//! Implements [`SerialBus`] on top of embassy's DMA UARTs. Every physical
//! line has a task on the interrupt executor; `send` and `receive` queue
//! work for it and return at once. The task starts the transfer as soon
//! as it runs and raises completions through [`InterruptFlags`] from
//! interrupt context.
//!
//! Left and Down own USART1 and USART3. Up and Right share USART2 on two
//! pin sets; its task tears the peripheral down and brings it up on the
//! other pin set whenever the bus switches ports, leaving the idle pin set
//! floating.

use core::cell::Cell;

use defmt::*;
use embassy_futures::join::join;
use embassy_futures::select::{select, Either};
use embassy_stm32::mode::Async;
use embassy_stm32::peripherals::{DMA1_CH6, DMA1_CH7, PA15, PA2, PA3, PB3, USART2};
use embassy_stm32::usart::{self, Uart, UartRx, UartTx};
use embassy_stm32::Peri;

use quadpanel_core::fault::fatal;
use quadpanel_core::{ErrorCode, InterruptFlags};
use quadpanel_hal::{Connection, LineMux, PhysicalLine, SerialBus, TransferEvents};
use quadpanel_protocol::ComportId;

use crate::channels::{
    LineChannels, RxBuffer, RxCommand, DOWN_LINE, LEFT_LINE, SHARED_LINE, SHARED_SWITCH,
};
use crate::Irqs;

/// Longest single receive (the 64-byte link test)
pub const MAX_RECEIVE: usize = 64;

/// USART2 and the two pin sets it can be routed to
pub struct SharedLine {
    pub usart: Peri<'static, USART2>,
    pub tx_dma: Peri<'static, DMA1_CH7>,
    pub rx_dma: Peri<'static, DMA1_CH6>,
    pub up_rx: Peri<'static, PA3>,
    pub up_tx: Peri<'static, PA2>,
    pub right_rx: Peri<'static, PA15>,
    pub right_tx: Peri<'static, PB3>,
    pub config: usart::Config,
}

/// Serve a dedicated line forever
#[embassy_executor::task(pool_size = 2)]
pub async fn dedicated_line_task(
    port: ComportId,
    uart: Uart<'static, Async>,
    line: &'static LineChannels,
    events: &'static InterruptFlags,
) {
    let (mut tx, mut rx) = uart.split();
    info!("{} line up", port);
    run_line(port, &mut tx, &mut rx, line, events).await;
}

/// Serve USART2 on whichever port the bus switched to
#[embassy_executor::task]
pub async fn shared_line_task(mut shared: SharedLine, events: &'static InterruptFlags) {
    let mut port = SHARED_SWITCH.wait().await;
    loop {
        let uart = match port {
            ComportId::Up => Uart::new(
                shared.usart.reborrow(),
                shared.up_rx.reborrow(),
                shared.up_tx.reborrow(),
                Irqs,
                shared.tx_dma.reborrow(),
                shared.rx_dma.reborrow(),
                shared.config,
            ),
            _ => Uart::new(
                shared.usart.reborrow(),
                shared.right_rx.reborrow(),
                shared.right_tx.reborrow(),
                Irqs,
                shared.tx_dma.reborrow(),
                shared.rx_dma.reborrow(),
                shared.config,
            ),
        };
        let uart = match uart {
            Ok(uart) => uart,
            Err(err) => {
                error!("USART2 setup failed for {}: {}", port, err);
                fatal(ErrorCode::UartInvalidComport, port.as_byte() as u32)
            }
        };

        debug!("USART2 up on {}", port);
        let (mut tx, mut rx) = uart.split();
        let serve = run_line(port, &mut tx, &mut rx, &SHARED_LINE, events);
        if let Either::Second(next) = select(serve, SHARED_SWITCH.wait()).await {
            port = next;
        }
    }
}

/// Run both directions of a line
///
/// The receive side is polled first, so a receive queued together with a
/// send is armed before the first byte leaves.
async fn run_line(
    port: ComportId,
    tx: &mut UartTx<'_, Async>,
    rx: &mut UartRx<'_, Async>,
    line: &LineChannels,
    events: &InterruptFlags,
) {
    join(
        receive_loop(port, rx, line, events),
        send_loop(port, tx, line, events),
    )
    .await;
}

async fn send_loop(
    port: ComportId,
    tx: &mut UartTx<'_, Async>,
    line: &LineChannels,
    events: &InterruptFlags,
) {
    loop {
        let data = line.tx.receive().await;
        if let Err(err) = tx.write(data).await {
            warn!("{} send error: {}", port, err);
        }
        // The panel's silence is handled by the bus timeout
        events.on_send_complete(port);
    }
}

async fn receive_loop(
    port: ComportId,
    rx: &mut UartRx<'_, Async>,
    line: &LineChannels,
    events: &InterruptFlags,
) {
    let mut scratch = [0u8; MAX_RECEIVE];
    let mut armed: Option<RxBuffer> = None;

    loop {
        let Some(buf) = armed.take() else {
            if let RxCommand::Arm(buf) = line.rx.receive().await {
                armed = Some(buf);
            }
            continue;
        };

        let len = buf.capacity().min(MAX_RECEIVE);
        let event = select(rx.read(&mut scratch[..len]), line.rx.receive()).await;
        match event {
            Either::First(Ok(())) => {
                buf.fill(&scratch[..len]);
                events.on_receive_complete(port);
            }
            Either::First(Err(err)) => {
                // Stay armed; the bus gives up on its own schedule
                warn!("{} receive error: {}", port, err);
                armed = Some(buf);
            }
            Either::Second(RxCommand::Arm(next)) => armed = Some(next),
            Either::Second(RxCommand::Abort) => trace!("{} receive aborted", port),
        }
    }
}

/// The controller's four panel ports, as seen from the bus
pub struct PanelSerial {
    mux: LineMux,
}

impl PanelSerial {
    pub const fn new() -> Self {
        Self { mux: LineMux::new() }
    }

    /// Queues of the line serving `port`
    ///
    /// Work for the multiplexed port that is not switched on cannot reach
    /// its panel.
    fn line(&self, port: ComportId) -> &'static LineChannels {
        match PhysicalLine::of(port) {
            PhysicalLine::Usart1 => &LEFT_LINE,
            PhysicalLine::Usart3 => &DOWN_LINE,
            PhysicalLine::Usart2 if self.mux.is_connected(port) => &SHARED_LINE,
            PhysicalLine::Usart2 => fatal(ErrorCode::UartInvalidComport, port.as_byte() as u32),
        }
    }
}

impl SerialBus<'static> for PanelSerial {
    fn connect(&mut self, port: ComportId) {
        match self.mux.connect(port) {
            Connection::Switch { from, to } => {
                debug!("USART2 {} -> {}", from, to);
                SHARED_SWITCH.signal(to);
            }
            Connection::Dedicated | Connection::AlreadyConnected => {}
        }
    }

    fn send(&mut self, port: ComportId, data: &'static [u8]) {
        if self.line(port).tx.try_send(data).is_err() {
            fatal(ErrorCode::UartInvalidComport, port.as_byte() as u32);
        }
    }

    fn receive(&mut self, port: ComportId, buf: &'static [Cell<u8>]) {
        let command = RxCommand::Arm(RxBuffer::new(buf));
        if self.line(port).rx.try_send(command).is_err() {
            fatal(ErrorCode::UartInvalidComport, port.as_byte() as u32);
        }
    }

    fn abort_receive(&mut self, port: ComportId) {
        if self.line(port).rx.try_send(RxCommand::Abort).is_err() {
            fatal(ErrorCode::UartInvalidComport, port.as_byte() as u32);
        }
    }
}

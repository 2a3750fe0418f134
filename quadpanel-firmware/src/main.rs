//! Quadpanel - Panel Bus Controller Firmware
//!
//! Main firmware binary for the STM32F303 panel hub. Waits for the
//! connected panels to come up, checks each link, then polls the panels
//! for sensor readings through the message bus and gathers the answers
//! into one report.
//!
//! The bus runs on the thread-mode executor. The line tasks run on an
//! interrupt executor, so transfer completions preempt the bus the way
//! DMA interrupts would.

#![no_std]
#![no_main]

use core::cell::Cell;

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::bind_interrupts;
use embassy_stm32::gpio::{Input, Pull};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::peripherals::{USART1, USART2, USART3};
use embassy_stm32::usart::{self, Uart};
use embassy_time::{Duration, Instant};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use quadpanel_core::config::wait_for_panels;
use quadpanel_core::{AckBuffers, BusConfig, InterruptFlags, MessageBus, Request, Response};
use quadpanel_hal::UartConfig;
use quadpanel_protocol::{Command, ComportId, PORT_COUNT};

use crate::board::{MillisClock, ReadyLine, Transceivers};
use crate::channels::{DOWN_LINE, LEFT_LINE};
use crate::report::{SensorReport, SENSOR_LEN};
use crate::serial::{dedicated_line_task, shared_line_task, PanelSerial, SharedLine};

mod board;
mod channels;
mod report;
mod serial;

bind_interrupts!(pub struct Irqs {
    USART1 => usart::InterruptHandler<USART1>;
    USART2 => usart::InterruptHandler<USART2>;
    USART3 => usart::InterruptHandler<USART3>;
});

/// How often every connected panel is asked for its sensors
const SENSOR_PERIOD: Duration = Duration::from_millis(10);

/// How often bus health is logged
const DIAGNOSTICS_PERIOD: Duration = Duration::from_secs(1);

/// Bytes a panel answers the short link test with
const LINK_TEST_LEN: usize = 2;

// Line tasks, pended through the otherwise unused UART4 vector
static EXECUTOR_LINES: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART4() {
    EXECUTOR_LINES.on_interrupt()
}

// Completion flags, written by the line tasks and read by the bus
static FLAGS: InterruptFlags = InterruptFlags::new();

// Buffers the bus lends to the line tasks (must live forever)
static ACKS: StaticCell<AckBuffers> = StaticCell::new();
static SENSORS: StaticCell<[[Cell<u8>; SENSOR_LEN]; PORT_COUNT]> = StaticCell::new();

type Bus = MessageBus<'static, PanelSerial, MillisClock>;

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Quadpanel controller starting...");

    let p = embassy_stm32::init(board::clock_config());
    info!("Peripherals initialized");

    // Transceiver pins in port order: Left, Down, Up, Right
    let _transceivers = Transceivers::new(
        [p.PB14.into(), p.PB0.into(), p.PA5.into(), p.PB6.into()],
        [p.PB15.into(), p.PB1.into(), p.PB8.into(), p.PB4.into()],
        [p.PB13.into(), p.PB2.into(), p.PB9.into(), p.PB7.into()],
    );

    let config = BusConfig::default();
    let panels = config.panels;
    for port in panels.connected_ports() {
        info!("Panel expected on {}", port);
    }

    // Ready lines in port order: Left, Down, Up, Right
    let ready = [
        ReadyLine(Input::new(p.PA8, Pull::Down)),
        ReadyLine(Input::new(p.PB12, Pull::Down)),
        ReadyLine(Input::new(p.PA4, Pull::Down)),
        ReadyLine(Input::new(p.PB5, Pull::Down)),
    ];
    wait_for_panels(&panels, &ready);
    info!("All connected panels ready");

    let line = board::usart_config(&UartConfig::PANEL_LINK);
    let left = unwrap!(Uart::new(
        p.USART1, p.PA10, p.PA9, Irqs, p.DMA1_CH4, p.DMA1_CH5, line
    ));
    let down = unwrap!(Uart::new(
        p.USART3, p.PB11, p.PB10, Irqs, p.DMA1_CH2, p.DMA1_CH3, line
    ));
    let shared = SharedLine {
        usart: p.USART2,
        tx_dma: p.DMA1_CH7,
        rx_dma: p.DMA1_CH6,
        up_rx: p.PA3,
        up_tx: p.PA2,
        right_rx: p.PA15,
        right_tx: p.PB3,
        config: line,
    };

    interrupt::UART4.set_priority(Priority::P6);
    let lines = EXECUTOR_LINES.start(interrupt::UART4);
    unwrap!(lines.spawn(dedicated_line_task(ComportId::Left, left, &LEFT_LINE, &FLAGS)));
    unwrap!(lines.spawn(dedicated_line_task(ComportId::Down, down, &DOWN_LINE, &FLAGS)));
    unwrap!(lines.spawn(shared_line_task(shared, &FLAGS)));
    info!("Line tasks started");

    let acks: &'static AckBuffers = ACKS.init(AckBuffers::new());
    let sensors: &'static [[Cell<u8>; SENSOR_LEN]; PORT_COUNT] = SENSORS.init_with(|| {
        core::array::from_fn(|_| core::array::from_fn(|_| Cell::new(0)))
    });

    let mut bus: Bus = MessageBus::new(PanelSerial::new(), MillisClock, &FLAGS, acks, config);
    info!("Message bus up, selected pair {}", bus.selected_pair());

    let mut report = SensorReport::new();
    check_links(&mut bus, sensors, &mut report);

    let mut next_poll = Instant::now();
    let mut next_diagnostics = Instant::now() + DIAGNOSTICS_PERIOD;

    loop {
        bus.process_flags();
        drain_responses(&mut bus, &mut report);

        let now = Instant::now();
        if now >= next_poll {
            next_poll = now + SENSOR_PERIOD;
            if report.has_all(panels.connected_ports()) {
                let bytes = report.take();
                debug!("Sensor report: {:02x}", bytes);
            }
            for port in panels.connected_ports() {
                let buf = &sensors[port.index()][..];
                bus.submit(Request::new(port, Command::RequestSensors).with_response(buf));
            }
        }

        if now >= next_diagnostics {
            next_diagnostics = now + DIAGNOSTICS_PERIOD;
            let diagnostics = bus.diagnostics();
            info!(
                "Bus: pair {}, {} timeouts, {} dropped responses",
                diagnostics.selected,
                diagnostics.total_timeouts(),
                diagnostics.dropped_responses
            );
            match diagnostics.to_report() {
                Ok(bytes) => trace!("Diagnostics report: {:02x}", bytes),
                Err(e) => warn!("Diagnostics report failed: {}", e),
            }
        }

        embassy_futures::yield_now().await;
    }
}

/// Run the short link test on every connected panel, one at a time
fn check_links(
    bus: &mut Bus,
    buffers: &'static [[Cell<u8>; SENSOR_LEN]; PORT_COUNT],
    report: &mut SensorReport,
) {
    let panels = bus.config().panels;
    for port in panels.connected_ports() {
        let buf = &buffers[port.index()][..LINK_TEST_LEN];
        let timeouts = bus.timeout_count(port);
        bus.submit(Request::new(port, Command::TestExpect2B).with_response(buf));
        bus.wait_for_idle(port);

        if bus.timeout_count(port) != timeouts {
            warn!("{} link test timed out", port);
        } else if let Some(response) = bus.last_response(port) {
            let bytes = response.to_vec::<LINK_TEST_LEN>();
            info!("{} link test answered {:02x}", port, bytes);
        }
        drain_responses(bus, report);
    }
}

fn drain_responses(bus: &mut Bus, report: &mut SensorReport) {
    while bus.have_pending() {
        let response = bus.take_pending();
        handle_response(report, &response);
    }
}

fn handle_response(report: &mut SensorReport, response: &Response<'_>) {
    match response.command {
        Command::RequestSensors if response.len() == SENSOR_LEN => report.store(response),
        _ => trace!("Unhandled response {}", response),
    }
}

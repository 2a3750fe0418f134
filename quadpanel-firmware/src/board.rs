//! Board glue
//!
//! Adapts embassy types to the quadpanel HAL traits and holds the clock
//! and line settings of the controller board.

use embassy_stm32::gpio::{AnyPin, Input, Level, Output, Speed};
use embassy_stm32::time::Hertz;
use embassy_stm32::usart;
use embassy_stm32::Peri;
use embassy_time::Instant;

use quadpanel_hal::uart::{DataBits, Parity, StopBits};
use quadpanel_hal::{InputPin, TickSource, UartConfig};
use quadpanel_protocol::PORT_COUNT;

/// A panel's ready line
pub struct ReadyLine<'d>(pub Input<'d>);

impl InputPin for ReadyLine<'_> {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}

/// Bus ticks are embassy milliseconds
pub struct MillisClock;

impl TickSource for MillisClock {
    fn now(&self) -> u32 {
        Instant::now().as_millis() as u32
    }
}

/// 72 MHz from the 8 MHz crystal; USART1 on the 72 MHz APB2, USART2/3 on
/// the 36 MHz APB1
pub fn clock_config() -> embassy_stm32::Config {
    use embassy_stm32::rcc::*;

    let mut config = embassy_stm32::Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(8_000_000),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll = Some(Pll {
        src: PllSource::HSE,
        prediv: PllPreDiv::DIV1,
        mul: PllMul::MUL9,
    });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV2;
    config.rcc.apb2_pre = APBPrescaler::DIV1;
    config
}

/// Translate line settings to the chip driver's config
///
/// The driver picks 8x oversampling by itself when the baud rate needs it.
pub fn usart_config(line: &UartConfig) -> usart::Config {
    let mut config = usart::Config::default();
    config.baudrate = line.baudrate;
    config.data_bits = match line.data_bits {
        DataBits::Seven => usart::DataBits::DataBits7,
        DataBits::Eight => usart::DataBits::DataBits8,
        DataBits::Nine => usart::DataBits::DataBits9,
    };
    config.parity = match line.parity {
        Parity::None => usart::Parity::ParityNone,
        Parity::Even => usart::Parity::ParityEven,
        Parity::Odd => usart::Parity::ParityOdd,
    };
    config.stop_bits = match line.stop_bits {
        StopBits::One => usart::StopBits::STOP1,
        StopBits::Two => usart::StopBits::STOP2,
    };
    config
}

/// RS485 transceiver direction pins, held for the life of the firmware
///
/// Each array is in port order. Driver enables are high and receiver
/// enables low (active low). The CK transceivers stay in receive, since
/// the clock line is only read as the panel's ready signal. Dropping this
/// releases the pins and silences every line.
pub struct Transceivers {
    _tx_enable: [Output<'static>; PORT_COUNT],
    _rx_enable: [Output<'static>; PORT_COUNT],
    _ck_enable: [Output<'static>; PORT_COUNT],
}

impl Transceivers {
    pub fn new(
        tx_enable: [Peri<'static, AnyPin>; PORT_COUNT],
        rx_enable: [Peri<'static, AnyPin>; PORT_COUNT],
        ck_enable: [Peri<'static, AnyPin>; PORT_COUNT],
    ) -> Self {
        Self {
            _tx_enable: tx_enable.map(|pin| Output::new(pin, Level::High, Speed::Low)),
            _rx_enable: rx_enable.map(|pin| Output::new(pin, Level::Low, Speed::Low)),
            _ck_enable: ck_enable.map(|pin| Output::new(pin, Level::Low, Speed::Low)),
        }
    }
}

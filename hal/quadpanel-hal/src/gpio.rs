//! GPIO pin abstractions
//!
//! Each panel drives its USART clock line high once it has booted. The
//! controller reads those lines as plain inputs before starting the bus.

/// Digital input pin
///
/// Implementations should handle the actual hardware register reading
/// for the specific chip.
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

impl<T: InputPin + ?Sized> InputPin for &T {
    fn is_high(&self) -> bool {
        (**self).is_high()
    }
}

/// Input with a fixed level, for panels whose ready line is not wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLevel(pub bool);

impl InputPin for FixedLevel {
    fn is_high(&self) -> bool {
        self.0
    }
}

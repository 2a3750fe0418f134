//! Tick source
//!
//! Timeouts are measured in ticks of a free-running counter. On the
//! controller one tick is one millisecond.

/// Monotonic tick counter
///
/// The counter may wrap; consumers compare with `wrapping_sub`.
pub trait TickSource {
    /// Current tick count
    fn now(&self) -> u32;
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn now(&self) -> u32 {
        (**self).now()
    }
}

//! Sensor report
//!
//! Each panel answers a sensor request with 8 bytes. The controller
//! gathers them into one 64-byte report, one slot per port in port order.

use quadpanel_core::{Response, REPORT_LEN};
use quadpanel_protocol::{ComportId, PORT_COUNT};

/// Bytes in one panel's sensor answer
pub const SENSOR_LEN: usize = 8;

pub struct SensorReport {
    bytes: [u8; REPORT_LEN],
    fresh: u8,
}

impl SensorReport {
    pub const fn new() -> Self {
        Self {
            bytes: [0; REPORT_LEN],
            fresh: 0,
        }
    }

    /// Copy a sensor answer into its port's slot
    pub fn store(&mut self, response: &Response<'_>) {
        let offset = response.port.index() * SENSOR_LEN;
        response.copy_to(&mut self.bytes[offset..offset + SENSOR_LEN]);
        self.fresh |= 1 << response.port.index();
    }

    /// Whether every port in `ports` answered since the last [`take`](Self::take)
    pub fn has_all(&self, mut ports: impl Iterator<Item = ComportId>) -> bool {
        ports.all(|port| self.fresh & (1 << port.index()) != 0)
    }

    /// Hand out the report and start collecting the next one
    pub fn take(&mut self) -> [u8; REPORT_LEN] {
        let report = self.bytes;
        self.bytes[..PORT_COUNT * SENSOR_LEN].fill(0);
        self.fresh = 0;
        report
    }
}

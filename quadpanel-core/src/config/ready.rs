//! Panel readiness
//!
//! A panel drives its clock line high once it has booted and is listening.
//! The bus must not start before every connected panel has done so.

use quadpanel_hal::InputPin;
use quadpanel_protocol::PORT_COUNT;

use super::types::PanelConfig;

impl PanelConfig {
    /// Check that every connected panel reports ready
    ///
    /// `ready_lines` is indexed by port. Lines of unconnected ports are
    /// ignored.
    pub fn all_ready<P: InputPin>(&self, ready_lines: &[P; PORT_COUNT]) -> bool {
        self.connected_ports()
            .all(|port| ready_lines[port.index()].is_high())
    }
}

/// Busy-wait until every connected panel reports ready
///
/// Returns the number of polls it took.
pub fn wait_for_panels<P: InputPin>(panels: &PanelConfig, ready_lines: &[P; PORT_COUNT]) -> u32 {
    let mut polls = 0u32;
    while !panels.all_ready(ready_lines) {
        polls = polls.wrapping_add(1);
        core::hint::spin_loop();
    }
    debug!("panels ready after {} polls", polls);
    polls
}

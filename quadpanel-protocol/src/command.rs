//! Panel command bytes
//!
//! The first byte of every transaction tells the panel what to do.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// Command IDs: production
pub const CMD_NONE: u8 = 0x00;
pub const CMD_REQUEST_SENSORS: u8 = 0x01;
pub const CMD_PROCESS_LED_SEGMENT: u8 = 0x02;
pub const CMD_COMMIT_LEDS: u8 = 0x03;

// Command IDs: link tests
pub const CMD_TEST_EXPECT_2B: u8 = 0x71;
pub const CMD_TEST_EXPECT_64B: u8 = 0x72;
pub const CMD_TEST_DOUBLE_VALUES: u8 = 0x73;

// Command IDs: LED tests
pub const CMD_TEST_HARDCODED_LEDS: u8 = 0x81;
pub const CMD_TEST_SOLID_COLOR_LEDS: u8 = 0x82;
pub const CMD_TEST_SEGMENT_SOLID_COLOR_LEDS: u8 = 0x83;
pub const CMD_TEST_COMMIT_LEDS: u8 = 0x84;

/// One static byte per possible command value, so a command can be handed
/// to a DMA transfer without borrowing the request that carries it.
static COMMAND_BYTES: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = i as u8;
        i += 1;
    }
    table
};

/// Command sent to a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Command {
    /// No-op
    None,
    /// Ask the panel for its sensor readings
    RequestSensors,
    /// Upload one LED segment's colors
    ProcessLedSegment,
    /// Latch uploaded LED data onto the LEDs
    CommitLeds,
    /// Link test: panel answers with 2 fixed bytes
    TestExpect2B,
    /// Link test: panel answers with 64 fixed bytes
    TestExpect64B,
    /// Link test: panel answers with every payload byte doubled
    TestDoubleValues,
    /// LED test: show the panel's built-in pattern
    TestHardcodedLeds,
    /// LED test: fill all LEDs with one RGB color
    TestSolidColorLeds,
    /// LED test: fill one segment with one RGB color
    TestSegmentSolidColorLeds,
    /// LED test: commit test data
    TestCommitLeds,
    /// Any other byte
    Other(u8),
}

impl Command {
    /// Parse a command byte
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            CMD_NONE => Command::None,
            CMD_REQUEST_SENSORS => Command::RequestSensors,
            CMD_PROCESS_LED_SEGMENT => Command::ProcessLedSegment,
            CMD_COMMIT_LEDS => Command::CommitLeds,
            CMD_TEST_EXPECT_2B => Command::TestExpect2B,
            CMD_TEST_EXPECT_64B => Command::TestExpect64B,
            CMD_TEST_DOUBLE_VALUES => Command::TestDoubleValues,
            CMD_TEST_HARDCODED_LEDS => Command::TestHardcodedLeds,
            CMD_TEST_SOLID_COLOR_LEDS => Command::TestSolidColorLeds,
            CMD_TEST_SEGMENT_SOLID_COLOR_LEDS => Command::TestSegmentSolidColorLeds,
            CMD_TEST_COMMIT_LEDS => Command::TestCommitLeds,
            other => Command::Other(other),
        }
    }

    /// Byte value on the wire
    pub const fn as_byte(self) -> u8 {
        match self {
            Command::None => CMD_NONE,
            Command::RequestSensors => CMD_REQUEST_SENSORS,
            Command::ProcessLedSegment => CMD_PROCESS_LED_SEGMENT,
            Command::CommitLeds => CMD_COMMIT_LEDS,
            Command::TestExpect2B => CMD_TEST_EXPECT_2B,
            Command::TestExpect64B => CMD_TEST_EXPECT_64B,
            Command::TestDoubleValues => CMD_TEST_DOUBLE_VALUES,
            Command::TestHardcodedLeds => CMD_TEST_HARDCODED_LEDS,
            Command::TestSolidColorLeds => CMD_TEST_SOLID_COLOR_LEDS,
            Command::TestSegmentSolidColorLeds => CMD_TEST_SEGMENT_SOLID_COLOR_LEDS,
            Command::TestCommitLeds => CMD_TEST_COMMIT_LEDS,
            Command::Other(byte) => byte,
        }
    }

    /// The command as a one-byte buffer that outlives any transfer
    pub fn wire(self) -> &'static [u8] {
        let i = self.as_byte() as usize;
        &COMMAND_BYTES[i..i + 1]
    }
}

impl From<u8> for Command {
    fn from(byte: u8) -> Self {
        Command::from_byte(byte)
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        cmd.as_byte()
    }
}

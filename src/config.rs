//!# Controller configuration
//!
//! Bit timing is taken from a fixed table of known-good CNF1/CNF2/CNF3 values
//! per oscillator frequency and CAN bit rate.
//!
//!```
//!# use mcp2515::config::{lookup, BitTiming, CanSpeed, McpClock};
//!#
//! let timing = lookup(McpClock::MHz16, CanSpeed::Kbps1000).unwrap();
//! assert_eq!(BitTiming { cnf1: 0x00, cnf2: 0xD0, cnf3: 0x82 }, timing);
//!
//! // 95 kbps is only available with a 16 MHz oscillator
//! assert!(lookup(McpClock::MHz8, CanSpeed::Kbps95).is_err());
//!```
use crate::registers::CanCtrl;
use crate::status::OperationMode;
use embedded_time::duration::Milliseconds;
use serde::{Deserialize, Serialize};

/// Entire configuration applied by [crate::can::Controller::configure]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Oscillator frequency and CAN bit rate
    pub bit_rate: BitRateConfig,

    /// Mode entered at the end of configuration
    pub mode: OperationMode,

    /// CLKOUT pin setting
    pub clock_output: ClockOutput,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            bit_rate: BitRateConfig::default(),
            mode: OperationMode::Normal,
            clock_output: ClockOutput::default(),
        }
    }
}

/// Frequency of the oscillator attached to the MCP2515
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum McpClock {
    MHz8,
    MHz16,
    MHz20,
}

/// Nominal CAN bit rate
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanSpeed {
    Kbps5,
    Kbps10,
    Kbps20,
    Kbps31_25,
    Kbps33_3,
    Kbps40,
    Kbps50,
    Kbps80,
    Kbps83_3,
    Kbps95,
    Kbps100,
    Kbps125,
    Kbps200,
    Kbps250,
    Kbps500,
    Kbps1000,
}

/// Oscillator frequency and CAN bit rate pair
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitRateConfig {
    pub clock: McpClock,
    pub speed: CanSpeed,
}

impl Default for BitRateConfig {
    fn default() -> Self {
        Self {
            clock: McpClock::MHz16,
            speed: CanSpeed::Kbps500,
        }
    }
}

impl BitRateConfig {
    /// Returns the CNF register values for this pair, or `None` if the pair is not supported
    pub fn bit_timing(&self) -> Option<BitTiming> {
        BIT_TIMINGS
            .iter()
            .find(|(config, _)| config == self)
            .map(|(_, timing)| *timing)
    }
}

/// Values of the three bit timing configuration registers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitTiming {
    /// SJW and baud rate prescaler
    pub cnf1: u8,
    /// BTLMODE, SAM, phase segment 1 and propagation segment
    pub cnf2: u8,
    /// SOF, WAKFIL and phase segment 2
    pub cnf3: u8,
}

/// Error returned by [lookup] for oscillator/bit rate pairs missing in the table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Unsupported(pub BitRateConfig);

/// Returns the CNF register values for the given oscillator frequency and bit rate
pub fn lookup(clock: McpClock, speed: CanSpeed) -> Result<BitTiming, Unsupported> {
    let config = BitRateConfig { clock, speed };
    config.bit_timing().ok_or(Unsupported(config))
}

const fn entry(clock: McpClock, speed: CanSpeed, cnf1: u8, cnf2: u8, cnf3: u8) -> (BitRateConfig, BitTiming) {
    (BitRateConfig { clock, speed }, BitTiming { cnf1, cnf2, cnf3 })
}

use CanSpeed::*;
use McpClock::*;

/// Supported oscillator/bit rate pairs
static BIT_TIMINGS: [(BitRateConfig, BitTiming); 40] = [
    entry(MHz8, Kbps1000, 0x00, 0x80, 0x80),
    entry(MHz8, Kbps500, 0x00, 0x90, 0x82),
    entry(MHz8, Kbps250, 0x00, 0xB1, 0x85),
    entry(MHz8, Kbps200, 0x00, 0xB4, 0x86),
    entry(MHz8, Kbps125, 0x01, 0xB1, 0x85),
    entry(MHz8, Kbps100, 0x01, 0xB4, 0x86),
    entry(MHz8, Kbps80, 0x01, 0xBF, 0x87),
    entry(MHz8, Kbps50, 0x03, 0xB4, 0x86),
    entry(MHz8, Kbps40, 0x03, 0xBF, 0x87),
    entry(MHz8, Kbps33_3, 0x47, 0xE2, 0x85),
    entry(MHz8, Kbps31_25, 0x07, 0xA4, 0x84),
    entry(MHz8, Kbps20, 0x07, 0xBF, 0x87),
    entry(MHz8, Kbps10, 0x0F, 0xBF, 0x87),
    entry(MHz8, Kbps5, 0x1F, 0xBF, 0x87),
    entry(MHz16, Kbps1000, 0x00, 0xD0, 0x82),
    entry(MHz16, Kbps500, 0x00, 0xF0, 0x86),
    entry(MHz16, Kbps250, 0x41, 0xF1, 0x85),
    entry(MHz16, Kbps200, 0x01, 0xFA, 0x87),
    entry(MHz16, Kbps125, 0x03, 0xF0, 0x86),
    entry(MHz16, Kbps100, 0x03, 0xFA, 0x87),
    entry(MHz16, Kbps95, 0x03, 0xAD, 0x07),
    entry(MHz16, Kbps83_3, 0x03, 0xBE, 0x07),
    entry(MHz16, Kbps80, 0x03, 0xFF, 0x87),
    entry(MHz16, Kbps50, 0x07, 0xFA, 0x87),
    entry(MHz16, Kbps40, 0x07, 0xFF, 0x87),
    entry(MHz16, Kbps33_3, 0x4E, 0xF1, 0x85),
    entry(MHz16, Kbps20, 0x0F, 0xFF, 0x87),
    entry(MHz16, Kbps10, 0x1F, 0xFF, 0x87),
    entry(MHz16, Kbps5, 0x3F, 0xFF, 0x87),
    entry(MHz20, Kbps1000, 0x00, 0xD9, 0x82),
    entry(MHz20, Kbps500, 0x00, 0xFA, 0x87),
    entry(MHz20, Kbps250, 0x41, 0xFB, 0x86),
    entry(MHz20, Kbps200, 0x01, 0xFF, 0x87),
    entry(MHz20, Kbps125, 0x03, 0xFA, 0x87),
    entry(MHz20, Kbps100, 0x04, 0xFA, 0x87),
    entry(MHz20, Kbps83_3, 0x04, 0xFE, 0x87),
    entry(MHz20, Kbps80, 0x04, 0xFF, 0x87),
    entry(MHz20, Kbps50, 0x09, 0xFA, 0x87),
    entry(MHz20, Kbps40, 0x09, 0xFF, 0x87),
    entry(MHz20, Kbps33_3, 0x0B, 0xFF, 0x87),
];

/// CLKOUT pin configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockOutput {
    #[default]
    Disabled,
    DivideBy1,
    DivideBy2,
    DivideBy4,
    DivideBy8,
}

impl ClockOutput {
    /// Encodes the CLKEN and CLKPRE bits of CANCTRL
    pub(crate) fn as_register(&self) -> u8 {
        let canctrl = match self {
            Self::Disabled => CanCtrl::new(),
            Self::DivideBy1 => CanCtrl::new().with_clken(true).with_clkpre(0b00),
            Self::DivideBy2 => CanCtrl::new().with_clken(true).with_clkpre(0b01),
            Self::DivideBy4 => CanCtrl::new().with_clken(true).with_clkpre(0b10),
            Self::DivideBy8 => CanCtrl::new().with_clken(true).with_clkpre(0b11),
        };

        canctrl.into()
    }
}

/// Timing of the mode confirmation loop
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModeTiming {
    /// Maximum time to wait for the requested mode
    pub timeout: Milliseconds<u32>,

    /// Pause between two CANSTAT reads, zero polls continuously
    pub poll_interval: Milliseconds<u32>,
}

impl Default for ModeTiming {
    fn default() -> Self {
        Self {
            timeout: Milliseconds(10_000),
            poll_interval: Milliseconds(1),
        }
    }
}

use crate::registers::{CanStat, ReadStatusReg};
use serde::{Deserialize, Serialize};

/// Operation mode as requested in CANCTRL.REQOP and reported in CANSTAT.OPMOD
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationMode {
    /// Module is in normal mode, transmits and receives on the bus
    Normal = 0b000,
    /// Module is in sleep mode
    Sleep = 0b001,
    /// Module is in loopback mode, transmitted messages are received internally
    Loopback = 0b010,
    /// Module is in listen-only mode, no acknowledge or error frames are sent
    ListenOnly = 0b011,
    /// Module is in configuration mode, required for bit timing, filters and masks
    Configuration = 0b100,
    /// Power-up value of REQOP
    PowerUp = 0b111,
}

impl OperationMode {
    /// Maps the three bit mode field. `None` for the reserved codes
    pub(crate) fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b111 {
            0b000 => Some(Self::Normal),
            0b001 => Some(Self::Sleep),
            0b010 => Some(Self::Loopback),
            0b011 => Some(Self::ListenOnly),
            0b100 => Some(Self::Configuration),
            0b111 => Some(Self::PowerUp),
            _ => None,
        }
    }
}

/// Highest priority pending interrupt, CANSTAT.ICOD
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterruptCode {
    None,
    Error,
    WakeUp,
    Txb0,
    Txb1,
    Txb2,
    Rxb0,
    Rxb1,
}

impl InterruptCode {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Self::None,
            0b001 => Self::Error,
            0b010 => Self::WakeUp,
            0b011 => Self::Txb0,
            0b100 => Self::Txb1,
            0b101 => Self::Txb2,
            0b110 => Self::Rxb0,
            _ => Self::Rxb1,
        }
    }
}

///  Operation status read from CANSTAT register
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OperationStatus {
    /// Current operation mode, `None` if the chip reports a reserved code
    pub mode: Option<OperationMode>,

    /// Interrupt flag code
    pub interrupt: InterruptCode,
}

impl OperationStatus {
    pub(crate) fn from_register(register: u8) -> Self {
        let canstat = CanStat::from(register);

        Self {
            mode: OperationMode::from_bits(canstat.opmod()),
            interrupt: InterruptCode::from_bits(canstat.icod()),
        }
    }
}

/// Quick status returned by the READ STATUS instruction
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Status {
    /// Unprocessed reply byte
    pub raw: u8,

    /// Receive buffer 0 holds a message (RX0IF)
    pub rx0_full: bool,

    /// Receive buffer 1 holds a message (RX1IF)
    pub rx1_full: bool,

    /// Transmission pending per TX buffer (TXREQ)
    pub tx_pending: [bool; 3],

    /// Transmission finished per TX buffer (TXnIF)
    pub tx_done: [bool; 3],
}

impl Status {
    pub(crate) fn from_register(register: u8) -> Self {
        let reg = ReadStatusReg::from(register);

        Self {
            raw: register,
            rx0_full: reg.rx0if(),
            rx1_full: reg.rx1if(),
            tx_pending: [reg.tx0req(), reg.tx1req(), reg.tx2req()],
            tx_done: [reg.tx0if(), reg.tx1if(), reg.tx2if()],
        }
    }

    /// True if any receive buffer holds a message
    pub fn has_message(&self) -> bool {
        self.rx0_full || self.rx1_full
    }
}

/// Error flags read from EFLG register
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ErrorFlags {
    /// Receive buffer 1 overflowed
    pub rx1_overflow: bool,

    /// Receive buffer 0 overflowed
    pub rx0_overflow: bool,

    /// TEC reached 255, module is bus-off
    pub bus_off: bool,

    /// TEC >= 128
    pub tx_error_passive: bool,

    /// REC >= 128
    pub rx_error_passive: bool,

    /// TEC >= 96
    pub tx_warning: bool,

    /// REC >= 96
    pub rx_warning: bool,

    /// TXWAR or RXWAR is set
    pub warning: bool,
}

impl ErrorFlags {
    pub(crate) fn from_register(register: u8) -> Self {
        Self {
            rx1_overflow: register & (1 << 7) != 0,
            rx0_overflow: register & (1 << 6) != 0,
            bus_off: register & (1 << 5) != 0,
            tx_error_passive: register & (1 << 4) != 0,
            rx_error_passive: register & (1 << 3) != 0,
            tx_warning: register & (1 << 2) != 0,
            rx_warning: register & (1 << 1) != 0,
            warning: register & 1 != 0,
        }
    }

    /// True if any flag indicating a receive overflow, error passive or bus-off state is set
    pub fn has_error(&self) -> bool {
        self.rx1_overflow || self.rx0_overflow || self.bus_off || self.tx_error_passive || self.rx_error_passive
    }
}

/// Transmit and receive error counters (TEC/REC)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ErrorCounters {
    pub transmit: u8,
    pub receive: u8,
}

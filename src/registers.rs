#![allow(unused_braces)]
use modular_bitfield_msb::prelude::*;

pub(crate) const RXF0SIDH: u8 = 0x00;
pub(crate) const RXF1SIDH: u8 = 0x04;
pub(crate) const RXF2SIDH: u8 = 0x08;
pub(crate) const CANSTAT: u8 = 0x0E;
pub(crate) const CANCTRL: u8 = 0x0F;
pub(crate) const RXF3SIDH: u8 = 0x10;
pub(crate) const RXF4SIDH: u8 = 0x14;
pub(crate) const RXF5SIDH: u8 = 0x18;
pub(crate) const TEC: u8 = 0x1C;
pub(crate) const RXM0SIDH: u8 = 0x20;
pub(crate) const RXM1SIDH: u8 = 0x24;
pub(crate) const CNF3: u8 = 0x28;
pub(crate) const CNF2: u8 = 0x29;
pub(crate) const CNF1: u8 = 0x2A;
pub(crate) const CANINTE: u8 = 0x2B;
pub(crate) const CANINTF: u8 = 0x2C;
pub(crate) const EFLG: u8 = 0x2D;
pub(crate) const TXB0CTRL: u8 = 0x30;
pub(crate) const TXB1CTRL: u8 = 0x40;
pub(crate) const TXB2CTRL: u8 = 0x50;
pub(crate) const RXB0CTRL: u8 = 0x60;
pub(crate) const RXB0SIDH: u8 = 0x61;
pub(crate) const RXB0DATA: u8 = 0x66;
pub(crate) const RXB1CTRL: u8 = 0x70;
pub(crate) const RXB1SIDH: u8 = 0x71;
pub(crate) const RXB1DATA: u8 = 0x76;

/// CANCTRL bits requesting the operation mode
pub(crate) const CANCTRL_REQOP: u8 = 0xE0;

/// CANCTRL bits controlling the CLKOUT pin
pub(crate) const CANCTRL_CLKOUT: u8 = 0x07;

/// CANINTF receive buffer 0 full flag
pub(crate) const CANINTF_RX0IF: u8 = 0x01;

/// CANINTF receive buffer 1 full flag
pub(crate) const CANINTF_RX1IF: u8 = 0x02;

pub(crate) const CANINTF_ERRIF: u8 = 0x20;

pub(crate) const CANINTF_MERRF: u8 = 0x80;

/// RXBnCTRL bits written during initialisation (RXM, BUKT and FILHIT)
pub(crate) const RXBCTRL_INIT_MASK: u8 = 0x67;

/// Largest single SPI exchange: instruction, address and 14 data bytes
pub(crate) const MAX_TRANSFER_LENGTH: usize = 16;

/// SPI instruction set
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Instruction {
    Reset,
    Read,
    Write,
    BitModify,
    ReadStatus,
    /// Load TX buffer n, starting at TXBnSIDH
    LoadTx(u8),
    /// Request to send TX buffer n
    RequestToSend(u8),
}

impl Instruction {
    /// Returns the instruction byte sent first on the bus
    pub(crate) fn opcode(self) -> u8 {
        match self {
            Self::Reset => 0xC0,
            Self::Read => 0x03,
            Self::Write => 0x02,
            Self::BitModify => 0x05,
            Self::ReadStatus => 0xA0,
            Self::LoadTx(buffer) => 0x40 | ((buffer & 0x03) << 1),
            Self::RequestToSend(buffer) => 0x80 | (1 << (buffer & 0x03)),
        }
    }
}

/// Register set of a single receive buffer
#[derive(Copy, Clone, Debug)]
pub(crate) struct RxBufferRegisters {
    pub ctrl: u8,
    pub sidh: u8,
    pub data: u8,
    /// CANINTF flag signaling a pending message
    pub interrupt_flag: u8,
}

pub(crate) const RX_BUFFERS: [RxBufferRegisters; 2] = [
    RxBufferRegisters {
        ctrl: RXB0CTRL,
        sidh: RXB0SIDH,
        data: RXB0DATA,
        interrupt_flag: CANINTF_RX0IF,
    },
    RxBufferRegisters {
        ctrl: RXB1CTRL,
        sidh: RXB1SIDH,
        data: RXB1DATA,
        interrupt_flag: CANINTF_RX1IF,
    },
];

/// Control register addresses of the three transmit buffers
pub(crate) const TX_BUFFERS: [u8; 3] = [TXB0CTRL, TXB1CTRL, TXB2CTRL];

#[bitfield]
#[derive(Default)]
#[repr(u8)]
/// CAN control register
pub struct CanCtrl {
    /// Request operation mode bits
    pub reqop: B3,
    /// Abort all pending transmissions bit
    pub abat: bool,
    /// One-shot mode bit
    pub osm: bool,
    /// CLKOUT pin enable bit
    pub clken: bool,
    /// CLKOUT pin prescaler bits
    pub clkpre: B2,
}

#[bitfield]
#[derive(Default)]
#[repr(u8)]
/// CAN status register
pub struct CanStat {
    /// Operation mode bits
    pub opmod: B3,
    #[skip]
    __: B1,
    /// Interrupt flag code bits
    pub icod: B3,
    #[skip]
    __: B1,
}

#[bitfield]
#[derive(Default)]
#[repr(u8)]
/// Receive buffer 0 control register
pub struct Rxb0Ctrl {
    #[skip]
    __: B1,
    /// Receive buffer operating mode bits
    pub rxm: B2,
    #[skip]
    __: B1,
    /// Received remote transfer request bit
    pub rxrtr: bool,
    /// Rollover enable bit
    pub bukt: bool,
    /// Read-only copy of BUKT
    pub bukt1: bool,
    /// Filter hit bit
    pub filhit0: bool,
}

#[bitfield]
#[derive(Default)]
#[repr(u8)]
/// Receive buffer 1 control register
pub struct Rxb1Ctrl {
    #[skip]
    __: B1,
    /// Receive buffer operating mode bits
    pub rxm: B2,
    #[skip]
    __: B1,
    /// Received remote transfer request bit
    pub rxrtr: bool,
    /// Filter hit bits
    pub filhit: B3,
}

#[bitfield]
#[derive(Default)]
#[repr(u8)]
/// Reply byte of the READ STATUS instruction
pub struct ReadStatusReg {
    /// CANINTF.TX2IF
    pub tx2if: bool,
    /// TXB2CTRL.TXREQ
    pub tx2req: bool,
    /// CANINTF.TX1IF
    pub tx1if: bool,
    /// TXB1CTRL.TXREQ
    pub tx1req: bool,
    /// CANINTF.TX0IF
    pub tx0if: bool,
    /// TXB0CTRL.TXREQ
    pub tx0req: bool,
    /// CANINTF.RX1IF
    pub rx1if: bool,
    /// CANINTF.RX0IF
    pub rx0if: bool,
}

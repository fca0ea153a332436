//!# CAN Controller device
//!
//!```
//!# use mcp2515::can::{CanController, Controller, RxError};
//!# use mcp2515::config::*;
//!# use mcp2515::example::*;
//!# use mcp2515::frame::CanFrame;
//!# use mcp2515::status::OperationMode;
//!# use embedded_can::{Frame, StandardId};
//!#
//! let clock = ExampleClock::default();
//! let spi_bus = ExampleSPIBus::default();
//! let pin_cs = ExampleCSPin {};
//!
//! // Initialize controller object
//! let mut controller: Controller<_, _, ExampleClock> = Controller::new(spi_bus, pin_cs);
//!
//! // Loopback mode receives every transmitted frame
//! let config = Configuration {
//!     bit_rate: BitRateConfig {
//!         clock: McpClock::MHz8,
//!         speed: CanSpeed::Kbps500,
//!     },
//!     mode: OperationMode::Loopback,
//!     clock_output: ClockOutput::Disabled,
//! };
//! controller.configure(&config, &clock).unwrap();
//!
//! let frame = CanFrame::new(StandardId::new(0x55).unwrap(), &[1, 2, 3]).unwrap();
//! controller.transmit(&frame).unwrap();
//!
//! assert_eq!(frame, controller.receive().unwrap());
//! assert_eq!(RxError::NoMessage, controller.receive().unwrap_err());
//! ```

use crate::codec::{decode_identifier, decode_length, encode_identifier, encode_length, MAX_PAYLOAD_LENGTH};
use crate::config::{lookup, BitRateConfig, Configuration, ModeTiming, Unsupported};
use crate::filter::{RxFilter, RxMask};
use crate::frame::CanFrame;
use crate::registers::*;
use crate::status::{ErrorCounters, ErrorFlags, OperationMode, OperationStatus, Status};
use core::marker::PhantomData;
use embedded_can::{Frame, Id};
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;
use embedded_time::duration::Milliseconds;
use embedded_time::{Clock, Instant};
use log::debug;

/// Oscillator start-up time after a reset
const RESET_DELAY: Milliseconds<u32> = Milliseconds(10);

/// Number of zero bytes clearing a transmit buffer (CTRL to D7)
const TX_BUFFER_LENGTH: usize = 14;

/// SPI bus or chip select failure
#[derive(Debug, PartialEq)]
pub enum BusError<B, CS> {
    /// SPI transfer failed
    TransferError(B),
    /// Setting the chip select pin failed
    CSError(CS),
}

/// Possible errors while configuring the controller
#[derive(Debug, PartialEq)]
pub enum ConfigError<B, CS> {
    /// SPI bus or CS pin error
    BusError(BusError<B, CS>),
    /// Internal clock error
    ClockError,
    /// Device did not enter the requested mode within timeout
    ModeTimeout(OperationMode),
    /// No bit timing known for oscillator frequency and bit rate
    UnsupportedBitRate(BitRateConfig),
    /// Filter index outside 0-5
    InvalidFilterIndex(u8),
    /// Mask index outside 0-1
    InvalidMaskIndex(u8),
}

/// Possible errors while receiving a CAN frame
#[derive(Debug, PartialEq)]
pub enum RxError<B, CS> {
    /// SPI bus or CS pin error
    BusError(BusError<B, CS>),
    /// Both receive buffers are empty
    NoMessage,
    /// Received data length exceeds 8 bytes. The receive buffer is not released.
    Malformed(usize),
}

/// Possible errors while transmitting a CAN frame
#[derive(Debug, PartialEq)]
pub enum TxError<B, CS> {
    /// SPI bus or CS pin error
    BusError(BusError<B, CS>),
    /// All three transmit buffers have a pending transmission
    AllTxBusy,
}

impl<B, CS> From<BusError<B, CS>> for ConfigError<B, CS> {
    fn from(value: BusError<B, CS>) -> Self {
        Self::BusError(value)
    }
}

impl<B, CS> From<embedded_time::clock::Error> for ConfigError<B, CS> {
    fn from(_error: embedded_time::clock::Error) -> Self {
        Self::ClockError
    }
}

impl<B, CS> From<BusError<B, CS>> for RxError<B, CS> {
    fn from(value: BusError<B, CS>) -> Self {
        Self::BusError(value)
    }
}

impl<B, CS> From<BusError<B, CS>> for TxError<B, CS> {
    fn from(value: BusError<B, CS>) -> Self {
        Self::BusError(value)
    }
}

/// Trait for CAN controller
pub trait CanController {
    type Frame;
    type TxError;
    type RxError;

    /// Transmit CAN frame using the first idle transmit buffer
    fn transmit(&mut self, frame: &Self::Frame) -> Result<(), Self::TxError>;

    /// Receive CAN frame, returns immediately if no message is pending
    fn receive(&mut self) -> Result<Self::Frame, Self::RxError>;
}

/// Main MCP2515 CAN controller device
pub struct Controller<B: Transfer<u8>, CS: OutputPin, CLK: Clock> {
    /// SPI bus
    bus: B,

    /// CS pin
    pin_cs: CS,

    /// Timeout and poll interval of mode changes
    timing: ModeTiming,

    /// System clock
    clock: PhantomData<CLK>,
}

impl<B, CS, CLK> CanController for Controller<B, CS, CLK>
where
    B: Transfer<u8>,
    CS: OutputPin,
    CLK: Clock,
{
    type Frame = CanFrame;
    type TxError = TxError<B::Error, CS::Error>;
    type RxError = RxError<B::Error, CS::Error>;

    fn transmit(&mut self, frame: &CanFrame) -> Result<(), Self::TxError> {
        let status = self.read_status()?;

        let index = match status.tx_pending.iter().position(|pending| !pending) {
            Some(index) => index as u8,
            None => {
                debug!("All TX buffers busy, status: {:#04x}", status.raw);
                return Err(TxError::AllTxBusy);
            }
        };

        self.load_tx_buffer(index, frame)?;

        // Request transmission of the loaded buffer
        self.transfer(&mut [Instruction::RequestToSend(index).opcode()])?;

        Ok(())
    }

    fn receive(&mut self) -> Result<CanFrame, Self::RxError> {
        let status = self.read_status()?;

        // RXB0 takes priority
        if status.rx0_full {
            self.read_rx_buffer(0)
        } else if status.rx1_full {
            self.read_rx_buffer(1)
        } else {
            Err(RxError::NoMessage)
        }
    }
}

impl<B, CS, CLK> Controller<B, CS, CLK>
where
    B: Transfer<u8>,
    CS: OutputPin,
    CLK: Clock,
{
    pub fn new(bus: B, pin_cs: CS) -> Self {
        Self {
            bus,
            pin_cs,
            timing: ModeTiming::default(),
            clock: Default::default(),
        }
    }

    /// Overrides timeout and poll interval of mode changes
    pub fn with_mode_timing(mut self, timing: ModeTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Releases SPI bus and CS pin
    pub fn free(self) -> (B, CS) {
        (self.bus, self.pin_cs)
    }

    /// Resets the device and configures it with the given settings.
    ///
    /// All messages with standard or extended IDs are accepted.
    /// Receive buffer 0 rolls over into receive buffer 1.
    pub fn configure(&mut self, config: &Configuration, clock: &CLK) -> Result<(), ConfigError<B::Error, CS::Error>> {
        self.reset()?;
        Self::wait(clock, clock.try_now()?, RESET_DELAY)?;

        for register in TX_BUFFERS {
            self.write_registers(register, &[0u8; TX_BUFFER_LENGTH])?;
        }

        self.write_register(RXB0CTRL, 0x00)?;
        self.write_register(RXB1CTRL, 0x00)?;

        // CANINTE shares the bit layout of CANINTF
        self.write_register(
            CANINTE,
            CANINTF_RX0IF | CANINTF_RX1IF | CANINTF_ERRIF | CANINTF_MERRF,
        )?;

        self.modify_register(RXB0CTRL, RXBCTRL_INIT_MASK, Rxb0Ctrl::new().with_bukt(true).into())?;
        self.modify_register(RXB1CTRL, RXBCTRL_INIT_MASK, Rxb1Ctrl::new().with_filhit(1).into())?;

        // Filter 0 matches standard, filter 1 extended frames, masks let everything pass
        for filter in RxFilter::ALL {
            self.set_filter_object(filter, filter == RxFilter::F1, 0, clock)?;
        }

        for mask in RxMask::ALL {
            self.set_mask_object(mask, true, 0, clock)?;
        }

        self.apply_bitrate(&config.bit_rate, clock)?;

        self.modify_register(CANCTRL, CANCTRL_CLKOUT, config.clock_output.as_register())?;

        self.request_mode(config.mode, clock)
    }

    /// Writes the bit timing registers for the given oscillator frequency and bit rate.
    /// Enters configuration mode before looking up the timing.
    pub fn apply_bitrate(&mut self, config: &BitRateConfig, clock: &CLK) -> Result<(), ConfigError<B::Error, CS::Error>> {
        self.request_configuration(clock)?;

        let timing = lookup(config.clock, config.speed).map_err(|Unsupported(config)| {
            debug!("No bit timing for {:?} at {:?}", config.speed, config.clock);
            ConfigError::UnsupportedBitRate(config)
        })?;

        self.write_register(CNF1, timing.cnf1)?;
        self.write_register(CNF2, timing.cnf2)?;
        self.write_register(CNF3, timing.cnf3)?;

        Ok(())
    }

    /// Sets acceptance filter 0-5 to the given identifier. Enters configuration mode before writing.
    pub fn set_filter(
        &mut self,
        index: u8,
        extended: bool,
        identifier: u32,
        clock: &CLK,
    ) -> Result<(), ConfigError<B::Error, CS::Error>> {
        let filter = RxFilter::from_index(index).ok_or_else(|| {
            debug!("Invalid filter index {index}");
            ConfigError::InvalidFilterIndex(index)
        })?;

        self.set_filter_object(filter, extended, identifier, clock)
    }

    /// Sets acceptance mask 0-1 to the given identifier bits. Enters configuration mode before writing.
    pub fn set_filter_mask(
        &mut self,
        index: u8,
        extended: bool,
        identifier: u32,
        clock: &CLK,
    ) -> Result<(), ConfigError<B::Error, CS::Error>> {
        let mask = RxMask::from_index(index).ok_or_else(|| {
            debug!("Invalid mask index {index}");
            ConfigError::InvalidMaskIndex(index)
        })?;

        self.set_mask_object(mask, extended, identifier, clock)
    }

    /// Sets the given acceptance filter
    pub fn set_filter_object(
        &mut self,
        filter: RxFilter,
        extended: bool,
        identifier: u32,
        clock: &CLK,
    ) -> Result<(), ConfigError<B::Error, CS::Error>> {
        self.request_configuration(clock)?;
        self.write_registers(filter.register(), &encode_identifier(identifier, extended))?;

        Ok(())
    }

    /// Sets the given acceptance mask
    pub fn set_mask_object(
        &mut self,
        mask: RxMask,
        extended: bool,
        identifier: u32,
        clock: &CLK,
    ) -> Result<(), ConfigError<B::Error, CS::Error>> {
        self.request_configuration(clock)?;
        self.write_registers(mask.register(), &encode_identifier(identifier, extended))?;

        Ok(())
    }

    /// Enters configuration mode
    pub fn request_configuration(&mut self, clock: &CLK) -> Result<(), ConfigError<B::Error, CS::Error>> {
        self.request_mode(OperationMode::Configuration, clock)
    }

    /// Enters normal mode
    pub fn request_normal(&mut self, clock: &CLK) -> Result<(), ConfigError<B::Error, CS::Error>> {
        self.request_mode(OperationMode::Normal, clock)
    }

    /// Requests the given mode and polls CANSTAT until the mode is reached or the timeout expires
    pub fn request_mode(&mut self, mode: OperationMode, clock: &CLK) -> Result<(), ConfigError<B::Error, CS::Error>> {
        self.modify_register(CANCTRL, CANCTRL_REQOP, CanCtrl::new().with_reqop(mode as u8).into())?;

        let deadline = clock
            .try_now()?
            .checked_add(self.timing.timeout)
            .ok_or(ConfigError::ClockError)?;

        loop {
            let canstat = CanStat::from(self.read_register(CANSTAT)?);

            if canstat.opmod() == mode as u8 {
                return Ok(());
            }

            let now = clock.try_now()?;

            if now > deadline {
                debug!(
                    "Device did not enter {mode:?} mode within timeout. Current mode: {:?}",
                    OperationMode::from_bits(canstat.opmod())
                );
                return Err(ConfigError::ModeTimeout(mode));
            }

            if self.timing.poll_interval.0 > 0 {
                Self::wait(clock, now, self.timing.poll_interval)?;
            }
        }
    }

    /// Reads and returns the operation status
    pub fn read_operation_status(&mut self) -> Result<OperationStatus, BusError<B::Error, CS::Error>> {
        let data = self.read_register(CANSTAT)?;

        Ok(OperationStatus::from_register(data))
    }

    /// Reads the quick status of receive and transmit buffers
    pub fn read_status(&mut self) -> Result<Status, BusError<B::Error, CS::Error>> {
        let mut buffer = [Instruction::ReadStatus.opcode(), 0x00];
        self.transfer(&mut buffer)?;

        Ok(Status::from_register(buffer[1]))
    }

    /// Reads and returns the error flags
    pub fn read_error_flags(&mut self) -> Result<ErrorFlags, BusError<B::Error, CS::Error>> {
        let data = self.read_register(EFLG)?;

        Ok(ErrorFlags::from_register(data))
    }

    /// Reads the transmit and receive error counters
    pub fn read_error_counters(&mut self) -> Result<ErrorCounters, BusError<B::Error, CS::Error>> {
        let mut counters = [0u8; 2];
        self.read_registers(TEC, &mut counters)?;

        Ok(ErrorCounters {
            transmit: counters[0],
            receive: counters[1],
        })
    }

    /// Resets internal registers to default and switches to configuration mode
    pub fn reset(&mut self) -> Result<(), BusError<B::Error, CS::Error>> {
        self.transfer(&mut [Instruction::Reset.opcode()])
    }

    /// Reads the message of the given receive buffer and releases the buffer
    fn read_rx_buffer(&mut self, index: usize) -> Result<CanFrame, RxError<B::Error, CS::Error>> {
        let registers = RX_BUFFERS[index];

        let mut header = [0u8; 5];
        self.read_registers(registers.sidh, &mut header)?;

        let (identifier, extended) = decode_identifier(&header);
        let length = decode_length(header[4]);

        // Interrupt flag stays set, so the message is not dropped silently
        if length > MAX_PAYLOAD_LENGTH {
            debug!("RX buffer {index} contains invalid data length {length}");
            return Err(RxError::Malformed(length));
        }

        let control = self.read_register(registers.ctrl)?;
        let remote = match index {
            0 => Rxb0Ctrl::from(control).rxrtr(),
            _ => Rxb1Ctrl::from(control).rxrtr(),
        };

        let mut data = [0u8; MAX_PAYLOAD_LENGTH];
        self.read_registers(registers.data, &mut data[..length])?;

        self.modify_register(CANINTF, registers.interrupt_flag, 0x00)?;

        CanFrame::from_raw_parts(identifier, extended, remote, &data[..length]).ok_or(RxError::Malformed(length))
    }

    /// Loads identifier, DLC and payload into the given transmit buffer
    fn load_tx_buffer(&mut self, index: u8, frame: &CanFrame) -> Result<(), BusError<B::Error, CS::Error>> {
        let (identifier, extended) = match frame.id() {
            Id::Standard(sid) => (sid.as_raw() as u32, false),
            Id::Extended(eid) => (eid.as_raw(), true),
        };
        let payload = frame.data();

        let mut buffer = [0u8; MAX_TRANSFER_LENGTH];
        buffer[0] = Instruction::LoadTx(index).opcode();
        buffer[1..5].copy_from_slice(&encode_identifier(identifier, extended));
        buffer[5] = encode_length(frame.dlc(), frame.is_remote_frame());
        buffer[6..6 + payload.len()].copy_from_slice(payload);

        self.transfer(&mut buffer[..6 + payload.len()])
    }

    /// Reads a single register byte
    fn read_register(&mut self, register: u8) -> Result<u8, BusError<B::Error, CS::Error>> {
        let mut buffer = [Instruction::Read.opcode(), register, 0x00];
        self.transfer(&mut buffer)?;

        Ok(buffer[2])
    }

    /// Reads consecutive registers, relies on the address auto increment of the device
    fn read_registers(&mut self, register: u8, data: &mut [u8]) -> Result<(), BusError<B::Error, CS::Error>> {
        debug_assert!(data.len() <= MAX_TRANSFER_LENGTH - 2);

        let length = data.len() + 2;
        let mut buffer = [0u8; MAX_TRANSFER_LENGTH];
        buffer[0] = Instruction::Read.opcode();
        buffer[1] = register;

        self.transfer(&mut buffer[..length])?;
        data.copy_from_slice(&buffer[2..length]);

        Ok(())
    }

    /// Writes a single register byte
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusError<B::Error, CS::Error>> {
        self.write_registers(register, &[value])
    }

    /// Writes consecutive registers, relies on the address auto increment of the device
    fn write_registers(&mut self, register: u8, values: &[u8]) -> Result<(), BusError<B::Error, CS::Error>> {
        debug_assert!(values.len() <= MAX_TRANSFER_LENGTH - 2);

        let length = values.len() + 2;
        let mut buffer = [0u8; MAX_TRANSFER_LENGTH];
        buffer[0] = Instruction::Write.opcode();
        buffer[1] = register;
        buffer[2..length].copy_from_slice(values);

        self.transfer(&mut buffer[..length])
    }

    /// Updates the register bits selected by mask
    fn modify_register(&mut self, register: u8, mask: u8, data: u8) -> Result<(), BusError<B::Error, CS::Error>> {
        let mut buffer = [Instruction::BitModify.opcode(), register, mask, data];
        self.transfer(&mut buffer)
    }

    /// Executes a SPI transfer framed by the CS pin, the received bytes replace the buffer content
    fn transfer(&mut self, buffer: &mut [u8]) -> Result<(), BusError<B::Error, CS::Error>> {
        let length = buffer.len();
        let mut received = [0u8; MAX_TRANSFER_LENGTH];

        self.pin_cs.set_low().map_err(BusError::CSError)?;
        let result = self.bus.transfer(buffer).map(|data| {
            let count = data.len().min(length);
            received[..count].copy_from_slice(&data[..count]);
        });
        self.pin_cs.set_high().map_err(BusError::CSError)?;

        result.map_err(BusError::TransferError)?;
        buffer.copy_from_slice(&received[..length]);

        Ok(())
    }

    /// Blocks until the given duration elapsed since start
    fn wait(clock: &CLK, start: Instant<CLK>, duration: Milliseconds<u32>) -> Result<(), ConfigError<B::Error, CS::Error>> {
        let target = start.checked_add(duration).ok_or(ConfigError::ClockError)?;

        while clock.try_now()? < target {}

        Ok(())
    }
}

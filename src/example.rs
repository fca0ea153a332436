//! # Simulated MCP2515 for doc examples
//!
//! [ExampleSPIBus] interprets the SPI instruction set on an in-memory register file.
//! Mode changes take effect immediately and loopback mode delivers transmitted
//! frames to the receive buffers.
use core::cell::Cell;
use core::convert::Infallible;
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;
use embedded_time::clock::Error;
use embedded_time::duration::Duration;
use embedded_time::fixed_point::FixedPoint;
use embedded_time::fraction::Fraction;
use embedded_time::timer::param::{Armed, OneShot};
use embedded_time::{Clock, Instant, Timer};

const CANSTAT: usize = 0x0E;
const CANCTRL: usize = 0x0F;
const CANINTF: usize = 0x2C;
const TXB0CTRL: usize = 0x30;
const RXB0CTRL: usize = 0x60;

/// Distance between the register blocks of two buffers
const BUFFER_OFFSET: usize = 0x10;

/// SIDH to D7
const MESSAGE_LENGTH: usize = 13;

const TXREQ: u8 = 0x08;
const RXRTR: u8 = 0x08;
const DLC_RTR: u8 = 0x40;
const LOOPBACK_MODE: u8 = 0b010;

/// Register level simulation of a MCP2515
#[derive(Debug)]
pub struct ExampleSPIBus {
    registers: [u8; 128],
}

impl Default for ExampleSPIBus {
    fn default() -> Self {
        let mut bus = Self { registers: [0; 128] };
        bus.reset();
        bus
    }
}

impl ExampleSPIBus {
    /// Returns the current value of the given register
    pub fn register(&self, address: u8) -> u8 {
        self.registers[(address & 0x7F) as usize]
    }

    /// Overwrites a register, bypassing the SPI protocol
    pub fn set_register(&mut self, address: u8, value: u8) {
        self.registers[(address & 0x7F) as usize] = value;
    }

    fn reset(&mut self) {
        self.registers = [0; 128];
        self.registers[CANSTAT] = 0x80;
        self.registers[CANCTRL] = 0x87;
    }

    fn read(&self, address: usize) -> u8 {
        self.registers[address & 0x7F]
    }

    fn write(&mut self, address: usize, value: u8) {
        match address & 0x7F {
            // read-only
            CANSTAT => {}
            CANCTRL => {
                self.registers[CANCTRL] = value;
                self.registers[CANSTAT] = (self.registers[CANSTAT] & 0x1F) | (value & 0xE0);
            }
            address => self.registers[address] = value,
        }
    }

    fn status(&self) -> u8 {
        let intf = self.registers[CANINTF];
        let txreq = |index: usize| (self.registers[TXB0CTRL + index * BUFFER_OFFSET] & TXREQ) != 0;

        let mut status = intf & 0x03;
        for index in 0..3 {
            status |= (txreq(index) as u8) << (2 + 2 * index);
            status |= ((intf >> (2 + index)) & 1) << (3 + 2 * index);
        }

        status
    }

    fn request_to_send(&mut self, index: usize) {
        let tx_ctrl = TXB0CTRL + index * BUFFER_OFFSET;
        self.registers[tx_ctrl] &= !TXREQ;
        self.registers[CANINTF] |= 0x04 << index;

        if self.registers[CANSTAT] >> 5 != LOOPBACK_MODE {
            return;
        }

        let rx_index = match self.registers[CANINTF] & 0x03 {
            0b00 | 0b10 => 0,
            0b01 => 1,
            _ => return,
        };

        let rx_ctrl = RXB0CTRL + rx_index * BUFFER_OFFSET;
        let (tx_message, rx_message) = (tx_ctrl + 1, rx_ctrl + 1);
        self.registers
            .copy_within(tx_message..tx_message + MESSAGE_LENGTH, rx_message);

        let remote = self.registers[tx_message + 4] & DLC_RTR != 0;
        self.registers[rx_ctrl] = if remote { RXRTR } else { 0 };
        self.registers[CANINTF] |= 1 << rx_index;
    }
}

impl Transfer<u8> for ExampleSPIBus {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        match words[0] {
            // RESET
            0xC0 => self.reset(),
            // READ
            0x03 if words.len() > 2 => {
                let address = words[1] as usize;
                for (offset, word) in words[2..].iter_mut().enumerate() {
                    *word = self.read(address + offset);
                }
            }
            // WRITE
            0x02 => {
                let address = words[1] as usize;
                for (offset, value) in words[2..].iter().enumerate() {
                    self.write(address + offset, *value);
                }
            }
            // BIT MODIFY
            0x05 if words.len() == 4 => {
                let address = words[1] as usize;
                let value = (self.read(address) & !words[2]) | (words[3] & words[2]);
                self.write(address, value);
            }
            // READ STATUS
            0xA0 => {
                let status = self.status();
                words[1..].iter_mut().for_each(|word| *word = status);
            }
            // LOAD TX BUFFER
            0x40 | 0x42 | 0x44 => {
                let address = TXB0CTRL + 1 + ((words[0] as usize & 0x06) >> 1) * BUFFER_OFFSET;
                for (offset, value) in words[1..].iter().enumerate() {
                    self.write(address + offset, *value);
                }
            }
            // RTS
            0x81..=0x87 => {
                for index in 0..3 {
                    if words[0] & (1 << index) != 0 {
                        self.request_to_send(index);
                    }
                }
            }
            _ => {}
        }

        Ok(words)
    }
}

/// Chip select pin without effect
#[derive(Default, Debug)]
pub struct ExampleCSPin {}

impl OutputPin for ExampleCSPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Clock advancing by one millisecond on every access
#[derive(Debug, Default)]
pub struct ExampleClock {
    ticks: Cell<u64>,
}

impl Clock for ExampleClock {
    type T = u64;
    const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

    fn try_now(&self) -> Result<Instant<Self>, Error> {
        let now = self.ticks.get();
        self.ticks.set(now + 1_000);

        Ok(Instant::new(now))
    }

    fn new_timer<Dur: Duration + FixedPoint>(&self, duration: Dur) -> Timer<OneShot, Armed, Self, Dur> {
        Timer::new(self, duration)
    }
}

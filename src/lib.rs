#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]
#![allow(clippy::identity_op)]

//! # Library for MCP2515 CAN controller
//!
//! Crate currently offer the following features:
//! * CAN2.0 frames with standard and extended IDs
//! * Bit timing for 8, 16 and 20 MHz oscillators from 5 kbps up to 1 Mbps
//! * Operation mode changes with configurable timeout
//! * Acceptance filter and mask configuration
//! * Polling based transmission and reception
//! * no_std support
//!
//!## CAN Tx/Rx example
//!
//!```
//!use mcp2515::example::{ExampleClock, ExampleCSPin, ExampleSPIBus};
//!use mcp2515::can::{CanController, Controller};
//!use mcp2515::config::*;
//!use mcp2515::frame::CanFrame;
//!use mcp2515::status::OperationMode;
//!use embedded_can::{ExtendedId, Frame, Id};
//!
//!let cs_pin = ExampleCSPin {};
//!let spi_bus = ExampleSPIBus::default();
//!let clock = ExampleClock::default();
//!
//!let mut controller = Controller::new(spi_bus, cs_pin);
//! // configure CAN controller
//!controller
//!    .configure(
//!        &Configuration {
//!            bit_rate: BitRateConfig {
//!                clock: McpClock::MHz16,
//!                speed: CanSpeed::Kbps1000,
//!            },
//!            mode: OperationMode::Loopback,
//!            clock_output: ClockOutput::Disabled,
//!        },
//!        &clock,
//!    )
//!    .unwrap();
//!
//! // only accept extended ID 0x14C92A2B in receive buffer 0
//!controller.set_filter_mask(0, true, 0x1FFF_FFFF, &clock).unwrap();
//!controller.set_filter(0, true, 0x14C92A2B, &clock).unwrap();
//!controller.request_mode(OperationMode::Loopback, &clock).unwrap();
//!
//! // Create message frame
//!let can_id = Id::Extended(ExtendedId::new(0x14C92A2B).unwrap());
//!let frame = CanFrame::new(can_id, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
//!
//! // Transmit CAN message
//!controller.transmit(&frame).unwrap();
//!
//! // Receive CAN message
//!let received = controller.receive().unwrap();
//!assert_eq!(can_id, received.id());
//!assert_eq!(&[1, 2, 3, 4, 5, 6, 7, 8], received.data());
//!```

pub mod can;
pub mod codec;
pub mod config;
pub mod status;

pub mod filter;
pub mod frame;

pub mod example;
#[cfg(test)]
pub(crate) mod mocks;
mod registers;
#[cfg(test)]
mod tests;

use crate::can::{BusError, CanController, ConfigError, Controller, RxError, TxError};
use crate::config::{BitRateConfig, CanSpeed, ClockOutput, Configuration, McpClock, ModeTiming};
use crate::example::{ExampleCSPin, ExampleClock, ExampleSPIBus};
use crate::frame::{CanFrame, CAN_EFF_FLAG, CAN_RTR_FLAG};
use crate::mocks::{reply, MockPin, MockSPIBus, TestClock};
use crate::status::{InterruptCode, OperationMode};
use embedded_can::{ExtendedId, Frame, Id, StandardId};
use embedded_time::duration::Milliseconds;
use mockall::Sequence;

#[test]
fn test_receive_no_message() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0xA0, 0x00], &[0x00, 0x00], &mut seq);

    let mut controller = mocks.into_controller();
    assert_eq!(RxError::NoMessage, controller.receive().unwrap_err());
}

#[test]
fn test_receive_standard_frame() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    // RX0IF set
    mocks.mock_transfer(&[0xA0, 0x00], &[0x00, 0x01], &mut seq);

    // SIDH..DLC of RXB0
    mocks.mock_transfer(
        &[0x03, 0x61, 0x00, 0x00, 0x00, 0x00, 0x00],
        &[0x00, 0x00, 0x20, 0x40, 0x00, 0x00, 0x02],
        &mut seq,
    );

    // RXB0CTRL, no remote request
    mocks.mock_transfer(&[0x03, 0x60, 0x00], &[0x00, 0x00, 0x00], &mut seq);

    // Payload
    mocks.mock_transfer(&[0x03, 0x66, 0x00, 0x00], &[0x00, 0x00, 0xAA, 0xBB], &mut seq);

    // Clearing RX0IF
    mocks.mock_transfer(&[0x05, 0x2C, 0x01, 0x00], &[0x00; 4], &mut seq);

    let mut controller = mocks.into_controller();
    let frame = controller.receive().unwrap();

    assert_eq!(Id::Standard(StandardId::new(0x102).unwrap()), frame.id());
    assert_eq!(0x102, frame.raw_id());
    assert_eq!(2, frame.dlc());
    assert_eq!(&[0xAA, 0xBB], frame.data());
    assert!(!frame.is_remote_frame());
}

#[test]
fn test_receive_extended_remote_frame_buffer1() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    // RX1IF set
    mocks.mock_transfer(&[0xA0, 0x00], &[0x00, 0x02], &mut seq);

    mocks.mock_transfer(
        &[0x03, 0x71, 0x00, 0x00, 0x00, 0x00, 0x00],
        &[0x00, 0x00, 0xA6, 0x49, 0x2A, 0x2B, 0x40],
        &mut seq,
    );

    // RXB1CTRL with RXRTR set
    mocks.mock_transfer(&[0x03, 0x70, 0x00], &[0x00, 0x00, 0x08], &mut seq);

    // Empty payload read
    mocks.mock_transfer(&[0x03, 0x76], &[0x00, 0x00], &mut seq);

    // Clearing RX1IF
    mocks.mock_transfer(&[0x05, 0x2C, 0x02, 0x00], &[0x00; 4], &mut seq);

    let mut controller = mocks.into_controller();
    let frame = controller.receive().unwrap();

    assert_eq!(Id::Extended(ExtendedId::new(0x14C9_2A2B).unwrap()), frame.id());
    assert_eq!(CAN_EFF_FLAG | CAN_RTR_FLAG | 0x14C9_2A2B, frame.raw_id());
    assert!(frame.is_remote_frame());
    assert_eq!(0, frame.dlc());
    assert!(frame.data().is_empty());
}

#[test]
fn test_receive_buffer0_first() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    // RX0IF and RX1IF set
    mocks.mock_transfer(&[0xA0, 0x00], &[0x00, 0x03], &mut seq);

    mocks.mock_transfer(
        &[0x03, 0x61, 0x00, 0x00, 0x00, 0x00, 0x00],
        &[0x00, 0x00, 0x0A, 0xA0, 0x00, 0x00, 0x01],
        &mut seq,
    );
    mocks.mock_transfer(&[0x03, 0x60, 0x00], &[0x00, 0x00, 0x00], &mut seq);
    mocks.mock_transfer(&[0x03, 0x66, 0x00], &[0x00, 0x00, 0x11], &mut seq);
    mocks.mock_transfer(&[0x05, 0x2C, 0x01, 0x00], &[0x00; 4], &mut seq);

    let mut controller = mocks.into_controller();
    let frame = controller.receive().unwrap();

    assert_eq!(0x55, frame.raw_id());
    assert_eq!(&[0x11], frame.data());
}

#[test]
fn test_receive_malformed_length() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0xA0, 0x00], &[0x00, 0x01], &mut seq);

    // DLC 15
    mocks.mock_transfer(
        &[0x03, 0x61, 0x00, 0x00, 0x00, 0x00, 0x00],
        &[0x00, 0x00, 0x20, 0x40, 0x00, 0x00, 0x0F],
        &mut seq,
    );

    // Neither payload read nor flag clearing expected
    let mut controller = mocks.into_controller();
    assert_eq!(RxError::Malformed(15), controller.receive().unwrap_err());
}

#[test]
fn test_receive_transfer_error() {
    let mut mocks = Mocks::default();
    mocks.mock_transfer_error();

    let mut controller = mocks.into_controller();
    assert_eq!(
        RxError::BusError(BusError::TransferError(55)),
        controller.receive().unwrap_err()
    );
}

#[test]
fn test_receive_cs_error() {
    let mut mocks = Mocks::default();
    mocks.mock_cs_error();

    let mut controller = mocks.into_controller();
    assert_eq!(RxError::BusError(BusError::CSError(21)), controller.receive().unwrap_err());
}

#[test]
fn test_transmit_standard_frame() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    // TXB0 pending
    mocks.mock_transfer(&[0xA0, 0x00], &[0x00, 0b0000_0100], &mut seq);

    // LOAD TX BUFFER 1
    mocks.mock_transfer(
        &[0x42, 0x0A, 0xA0, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03],
        &[0x00; 9],
        &mut seq,
    );

    // RTS TXB1
    mocks.mock_transfer(&[0x82], &[0x00], &mut seq);

    let frame = CanFrame::new(StandardId::new(0x55).unwrap(), &[1, 2, 3]).unwrap();

    let mut controller = mocks.into_controller();
    controller.transmit(&frame).unwrap();
}

#[test]
fn test_transmit_extended_remote_frame() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0xA0, 0x00], &[0x00, 0x00], &mut seq);
    mocks.mock_transfer(&[0x40, 0x00, 0x08, 0x12, 0x34, 0x42], &[0x00; 6], &mut seq);
    mocks.mock_transfer(&[0x81], &[0x00], &mut seq);

    let frame = CanFrame::new_remote(ExtendedId::new(0x1234).unwrap(), 2).unwrap();

    let mut controller = mocks.into_controller();
    controller.transmit(&frame).unwrap();
}

#[test]
fn test_transmit_all_busy() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0xA0, 0x00], &[0x00, 0b0101_0100], &mut seq);

    let frame = CanFrame::new(StandardId::new(0x55).unwrap(), &[1]).unwrap();

    let mut controller = mocks.into_controller();
    assert_eq!(TxError::AllTxBusy, controller.transmit(&frame).unwrap_err());
}

#[test]
fn test_apply_bitrate_correct() {
    let clock = TestClock::new(vec![
        100, // Config mode: Timer start
    ]);

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    // Request configuration mode
    mocks.mock_transfer(&[0x05, 0x0F, 0xE0, 0x80], &[0x00; 4], &mut seq);
    mocks.mock_register_read::<0x80>([0x03, 0x0E], &mut seq);

    mocks.mock_transfer(&[0x02, 0x2A, 0x00], &[0x00; 3], &mut seq);
    mocks.mock_transfer(&[0x02, 0x29, 0xD0], &[0x00; 3], &mut seq);
    mocks.mock_transfer(&[0x02, 0x28, 0x82], &[0x00; 3], &mut seq);

    let mut controller = mocks.into_controller();
    controller
        .apply_bitrate(
            &BitRateConfig {
                clock: McpClock::MHz16,
                speed: CanSpeed::Kbps1000,
            },
            &clock,
        )
        .unwrap();

    assert_eq!(0, clock.remaining());
}

#[test]
fn test_apply_bitrate_unsupported() {
    let clock = TestClock::new(vec![100]);
    let config = BitRateConfig {
        clock: McpClock::MHz8,
        speed: CanSpeed::Kbps95,
    };

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    // Configuration mode is entered, but no CNF register is written
    mocks.mock_transfer(&[0x05, 0x0F, 0xE0, 0x80], &[0x00; 4], &mut seq);
    mocks.mock_register_read::<0x80>([0x03, 0x0E], &mut seq);

    let mut controller = mocks.into_controller();
    assert_eq!(
        ConfigError::UnsupportedBitRate(config),
        controller.apply_bitrate(&config, &clock).unwrap_err()
    );
}

#[test]
fn test_apply_bitrate_mode_timeout() {
    let clock = TestClock::new(vec![
        0,          // Config mode: Timer start
        10_000_001, // Config mode: Expired
    ]);

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0x05, 0x0F, 0xE0, 0x80], &[0x00; 4], &mut seq);

    // Still in normal mode, CNF registers are not written
    mocks.mock_register_read::<0x00>([0x03, 0x0E], &mut seq);

    let mut controller = mocks.into_controller();
    let result = controller.apply_bitrate(
        &BitRateConfig {
            clock: McpClock::MHz16,
            speed: CanSpeed::Kbps500,
        },
        &clock,
    );

    assert_eq!(ConfigError::ModeTimeout(OperationMode::Configuration), result.unwrap_err());
}

#[test]
fn test_request_mode_correct() {
    let clock = TestClock::new(vec![
        100, // Timer start
        200, // First expiration check
    ]);

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0x05, 0x0F, 0xE0, 0x40], &[0x00; 4], &mut seq);

    // Still in configuration mode
    mocks.mock_register_read::<0x80>([0x03, 0x0E], &mut seq);

    // Loopback mode
    mocks.mock_register_read::<0x40>([0x03, 0x0E], &mut seq);

    let mut controller = mocks.into_controller();
    controller.request_mode(OperationMode::Loopback, &clock).unwrap();

    assert_eq!(0, clock.remaining());
}

#[test]
fn test_request_mode_timeout() {
    let clock = TestClock::new(vec![
        0,          // Timer start
        5_000_000,  // First expiration check
        10_000_001, // Second expiration check
    ]);

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0x05, 0x0F, 0xE0, 0x00], &[0x00; 4], &mut seq);
    mocks.mock_register_read::<0x80>([0x03, 0x0E], &mut seq);
    mocks.mock_register_read::<0x80>([0x03, 0x0E], &mut seq);

    let mut controller = mocks.into_controller();
    assert_eq!(
        ConfigError::ModeTimeout(OperationMode::Normal),
        controller.request_normal(&clock).unwrap_err()
    );
}

#[test]
fn test_request_mode_poll_interval() {
    let clock = TestClock::new(vec![
        0,     // Timer start
        100,   // Expiration check
        500,   // Poll interval not elapsed
        1_100, // Poll interval elapsed
    ]);

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0x05, 0x0F, 0xE0, 0x80], &[0x00; 4], &mut seq);
    mocks.mock_register_read::<0x00>([0x03, 0x0E], &mut seq);
    mocks.mock_register_read::<0x80>([0x03, 0x0E], &mut seq);

    let mut controller = mocks.into_controller().with_mode_timing(ModeTiming {
        timeout: Milliseconds(10_000),
        poll_interval: Milliseconds(1),
    });
    controller.request_configuration(&clock).unwrap();

    assert_eq!(0, clock.remaining());
}

#[test]
fn test_request_mode_clock_error() {
    let clock = TestClock::new(vec![]);

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();
    mocks.mock_transfer(&[0x05, 0x0F, 0xE0, 0x80], &[0x00; 4], &mut seq);

    let mut controller = mocks.into_controller();
    assert_eq!(ConfigError::ClockError, controller.request_configuration(&clock).unwrap_err());
}

#[test]
fn test_request_mode_transfer_error() {
    let clock = TestClock::new(vec![]);

    let mut mocks = Mocks::default();
    mocks.mock_transfer_error();

    let mut controller = mocks.into_controller();
    assert_eq!(
        ConfigError::BusError(BusError::TransferError(55)),
        controller.request_normal(&clock).unwrap_err()
    );
}

#[test]
fn test_set_filter_standard() {
    let clock = TestClock::new(vec![100]);

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0x05, 0x0F, 0xE0, 0x80], &[0x00; 4], &mut seq);
    mocks.mock_register_read::<0x80>([0x03, 0x0E], &mut seq);

    // RXF2SIDH..RXF2EID0
    mocks.mock_transfer(&[0x02, 0x08, 0x24, 0x60, 0x00, 0x00], &[0x00; 6], &mut seq);

    let mut controller = mocks.into_controller();
    controller.set_filter(2, false, 0x123, &clock).unwrap();
}

#[test]
fn test_set_filter_invalid_index() {
    let clock = TestClock::new(vec![]);

    let mut controller = Mocks::default().into_controller();
    assert_eq!(
        ConfigError::InvalidFilterIndex(6),
        controller.set_filter(6, false, 0x123, &clock).unwrap_err()
    );
}

#[test]
fn test_set_filter_mask_extended() {
    let clock = TestClock::new(vec![100]);

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();

    mocks.mock_transfer(&[0x05, 0x0F, 0xE0, 0x80], &[0x00; 4], &mut seq);
    mocks.mock_register_read::<0x80>([0x03, 0x0E], &mut seq);

    // RXM1SIDH..RXM1EID0
    mocks.mock_transfer(&[0x02, 0x24, 0xFF, 0xEB, 0xFF, 0xFF], &[0x00; 6], &mut seq);

    let mut controller = mocks.into_controller();
    controller.set_filter_mask(1, true, 0x1FFF_FFFF, &clock).unwrap();
}

#[test]
fn test_set_filter_mask_invalid_index() {
    let clock = TestClock::new(vec![]);

    let mut controller = Mocks::default().into_controller();
    assert_eq!(
        ConfigError::InvalidMaskIndex(2),
        controller.set_filter_mask(2, true, 0x00, &clock).unwrap_err()
    );
}

#[test]
fn test_reset_command() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();
    mocks.mock_transfer(&[0xC0], &[0x00], &mut seq);

    let mut controller = mocks.into_controller();
    controller.reset().unwrap();
}

#[test]
fn test_reset_cs_error() {
    let mut mocks = Mocks::default();
    mocks.mock_cs_error();

    let mut controller = mocks.into_controller();
    assert_eq!(BusError::CSError(21), controller.reset().unwrap_err());
}

#[test]
fn test_read_operation_status() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();
    mocks.mock_register_read::<0b1000_1100>([0x03, 0x0E], &mut seq);

    let mut controller = mocks.into_controller();
    let status = controller.read_operation_status().unwrap();

    assert_eq!(Some(OperationMode::Configuration), status.mode);
    assert_eq!(InterruptCode::Rxb0, status.interrupt);
}

#[test]
fn test_read_error_flags() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();
    mocks.mock_register_read::<0b0010_0101>([0x03, 0x2D], &mut seq);

    let mut controller = mocks.into_controller();
    let flags = controller.read_error_flags().unwrap();

    assert!(flags.bus_off);
    assert!(flags.tx_warning);
    assert!(flags.warning);
    assert!(!flags.rx0_overflow);
    assert!(flags.has_error());
}

#[test]
fn test_read_error_counters() {
    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();
    mocks.mock_transfer(&[0x03, 0x1C, 0x00, 0x00], &[0x00, 0x00, 5, 130], &mut seq);

    let mut controller = mocks.into_controller();
    let counters = controller.read_error_counters().unwrap();

    assert_eq!(5, counters.transmit);
    assert_eq!(130, counters.receive);
}

#[test]
fn test_configure_clock_error() {
    let clock = TestClock::new(vec![]);

    let mut mocks = Mocks::default();
    let mut seq = Sequence::new();
    mocks.mock_transfer(&[0xC0], &[0x00], &mut seq);

    let mut controller = mocks.into_controller();
    assert_eq!(
        ConfigError::ClockError,
        controller.configure(&Configuration::default(), &clock).unwrap_err()
    );
}

#[test]
fn test_configure_registers() {
    let clock = ExampleClock::default();
    let mut controller: Controller<_, _, ExampleClock> = Controller::new(ExampleSPIBus::default(), ExampleCSPin {});

    controller
        .configure(
            &Configuration {
                bit_rate: BitRateConfig {
                    clock: McpClock::MHz16,
                    speed: CanSpeed::Kbps250,
                },
                mode: OperationMode::Normal,
                clock_output: ClockOutput::DivideBy4,
            },
            &clock,
        )
        .unwrap();

    let (bus, _) = controller.free();

    // CNF1..CNF3
    assert_eq!(0x41, bus.register(0x2A));
    assert_eq!(0xF1, bus.register(0x29));
    assert_eq!(0x85, bus.register(0x28));

    assert_eq!(0xA3, bus.register(0x2B));
    assert_eq!(0x04, bus.register(0x60));
    assert_eq!(0x01, bus.register(0x70));

    // EXIDE of filter 1 and both masks
    assert_eq!(0x00, bus.register(0x01));
    assert_eq!(0x08, bus.register(0x05));
    assert_eq!(0x08, bus.register(0x21));
    assert_eq!(0x08, bus.register(0x25));

    // Normal mode with CLKOUT = Fosc / 4
    assert_eq!(0x06, bus.register(0x0F));
    assert_eq!(0x00, bus.register(0x0E) >> 5);
}

#[test]
fn test_configure_unsupported_bitrate() {
    let clock = ExampleClock::default();
    let mut controller: Controller<_, _, ExampleClock> = Controller::new(ExampleSPIBus::default(), ExampleCSPin {});

    let bit_rate = BitRateConfig {
        clock: McpClock::MHz20,
        speed: CanSpeed::Kbps5,
    };
    let result = controller.configure(
        &Configuration {
            bit_rate,
            mode: OperationMode::Normal,
            clock_output: ClockOutput::Disabled,
        },
        &clock,
    );

    assert_eq!(ConfigError::UnsupportedBitRate(bit_rate), result.unwrap_err());

    // Device stays in configuration mode
    let (bus, _) = controller.free();
    assert_eq!(0b100, bus.register(0x0E) >> 5);
}

#[test]
fn test_loopback_remote_frame() {
    let clock = ExampleClock::default();
    let mut controller: Controller<_, _, ExampleClock> = Controller::new(ExampleSPIBus::default(), ExampleCSPin {});

    controller
        .configure(
            &Configuration {
                mode: OperationMode::Loopback,
                ..Default::default()
            },
            &clock,
        )
        .unwrap();

    let frame = CanFrame::new_remote(StandardId::new(0x7FF).unwrap(), 3).unwrap();
    controller.transmit(&frame).unwrap();

    let received = controller.receive().unwrap();
    assert!(received.is_remote_frame());
    assert_eq!(3, received.dlc());
    assert_eq!(CAN_RTR_FLAG | 0x7FF, received.raw_id());
    assert_eq!(RxError::NoMessage, controller.receive().unwrap_err());
}

#[test]
fn test_loopback_remote_frame_after_data_frame() {
    let clock = ExampleClock::default();
    let mut controller: Controller<_, _, ExampleClock> = Controller::new(ExampleSPIBus::default(), ExampleCSPin {});

    controller
        .configure(
            &Configuration {
                mode: OperationMode::Loopback,
                ..Default::default()
            },
            &clock,
        )
        .unwrap();

    let id = StandardId::new(0x123).unwrap();

    let data = CanFrame::new(id, &[1, 2, 3]).unwrap();
    controller.transmit(&data).unwrap();
    assert_eq!(data, controller.receive().unwrap());

    // TXB0 still holds the payload of the previous frame
    let remote = CanFrame::new_remote(id, 3).unwrap();
    controller.transmit(&remote).unwrap();
    assert_eq!(remote, controller.receive().unwrap());
}

#[derive(Default)]
struct Mocks {
    bus: MockSPIBus,
    pin_cs: MockPin,
}

impl Mocks {
    pub fn into_controller(self) -> Controller<MockSPIBus, MockPin, TestClock> {
        Controller::new(self.bus, self.pin_cs).with_mode_timing(ModeTiming {
            timeout: Milliseconds(10_000),
            poll_interval: Milliseconds(0),
        })
    }

    /// Simulates a SPI transfer fault
    pub fn mock_transfer_error(&mut self) {
        self.bus.expect_transfer().times(1).return_const(Err(55));
        self.pin_cs.expect_set_low().times(1).return_const(Ok(()));
        self.pin_cs.expect_set_high().times(1).return_const(Ok(()));
    }

    /// Simulates a CS pin set error
    pub fn mock_cs_error(&mut self) {
        self.pin_cs.expect_set_low().times(1).return_const(Err(21));
    }

    /// Mocks the reading of a single register byte
    pub fn mock_register_read<const REG: u8>(&mut self, expected_command: [u8; 2], seq: &mut Sequence) {
        self.mock_transfer(&[expected_command[0], expected_command[1], 0x00], &[0x00, 0x00, REG], seq);
    }

    /// Mocks a single SPI transfer framed by the CS pin
    pub fn mock_transfer(&mut self, expected: &[u8], response: &[u8], seq: &mut Sequence) {
        let expected = expected.to_vec();
        let response = reply(response);

        self.pin_cs.expect_set_low().times(1).return_const(Ok(())).in_sequence(seq);

        self.bus
            .expect_transfer()
            .times(1)
            .returning(move |data| {
                assert_eq!(expected.as_slice(), data);
                Ok(response)
            })
            .in_sequence(seq);

        self.pin_cs.expect_set_high().times(1).return_const(Ok(())).in_sequence(seq);
    }
}

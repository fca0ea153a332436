#![no_std]
#![no_main]

pub mod clock;

use crate::clock::SystemClock;
use embedded_can::{Frame, Id, StandardId};
use hal::clocks::Clock;
use hal::fugit::RateExtU32;
use hal::pac;
use mcp2515::can::{CanController, Controller, RxError, TxError};
use mcp2515::config::{BitRateConfig, CanSpeed, ClockOutput, Configuration, McpClock};
use mcp2515::frame::CanFrame;
use mcp2515::status::OperationMode;
use panic_halt as _;
use rp2040_hal as hal;

#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

const XTAL_FREQ_HZ: u32 = 12_000_000u32;

#[rp2040_hal::entry]
fn main() -> ! {
    let mut pac = pac::Peripherals::take().unwrap();
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    // Configure the clocks
    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let clock = SystemClock::new(timer);

    let sio = hal::Sio::new(pac.SIO);

    let pins = hal::gpio::Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);

    let spi_mosi = pins.gpio7.into_function::<hal::gpio::FunctionSpi>();
    let spi_miso = pins.gpio4.into_function::<hal::gpio::FunctionSpi>();
    let spi_sclk = pins.gpio6.into_function::<hal::gpio::FunctionSpi>();
    let spi = hal::spi::Spi::<_, _, _, 8>::new(pac.SPI0, (spi_mosi, spi_miso, spi_sclk));

    // Exchange the uninitialised SPI driver for an initialised one
    let spi = spi.init(
        &mut pac.RESETS,
        clocks.peripheral_clock.freq(),
        8.MHz(),
        embedded_hal::spi::MODE_0,
    );

    // Configure GPIO5 as an CS pin
    let pin_cs = pins.gpio5.into_push_pull_output();

    let mut controller: Controller<_, _, SystemClock> = Controller::new(spi, pin_cs);

    // Common breakout boards carry an 8 MHz crystal
    let config = Configuration {
        bit_rate: BitRateConfig {
            clock: McpClock::MHz8,
            speed: CanSpeed::Kbps500,
        },
        mode: OperationMode::Normal,
        clock_output: ClockOutput::Disabled,
    };
    controller.configure(&config, &clock).unwrap();

    let ready = CanFrame::new(StandardId::new(0x100).unwrap(), &[0x01]).unwrap();
    controller.transmit(&ready).unwrap();

    // Echo every received data frame with the next higher standard ID
    loop {
        let frame = match controller.receive() {
            Ok(frame) => frame,
            Err(RxError::NoMessage) => continue,
            // Malformed entries keep their interrupt flag, a reset releases the buffer
            Err(RxError::Malformed(_)) => {
                controller.configure(&config, &clock).unwrap();
                continue;
            }
            Err(RxError::BusError(_)) => panic!("SPI failure while receiving"),
        };

        let echo_id = match frame.id() {
            Id::Standard(id) => StandardId::new((id.as_raw() + 1) & 0x7FF),
            Id::Extended(_) => None,
        };

        if let Some(id) = echo_id {
            if let Some(echo) = CanFrame::new(id, frame.data()) {
                match controller.transmit(&echo) {
                    Ok(()) => {}
                    // Echo is dropped while all TX buffers are pending
                    Err(TxError::AllTxBusy) => {}
                    Err(TxError::BusError(_)) => panic!("SPI failure while transmitting"),
                }
            }
        }
    }
}

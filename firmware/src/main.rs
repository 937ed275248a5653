#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

//! NanoWatchdog firmware for the STM32G0 reference board.
//!
//! All board semantics live in `watchdog-core`; this binary only wires the
//! shared logic to the hardware: a UART to the host, an I2C EEPROM for the
//! event store, and GPIO for the LEDs and the reset relay. One loop
//! alternates between draining UART bytes and a 1 Hz watchdog poll, so a
//! command is never interrupted by the miss-timer check.

#[cfg(target_os = "none")]
mod hw;
#[cfg(target_os = "none")]
mod panic;

#[cfg(target_os = "none")]
use defmt_rtt as _;

#[cfg(target_os = "none")]
use embassy_executor::Spawner;
#[cfg(target_os = "none")]
use embassy_futures::select::{select, Either};
#[cfg(target_os = "none")]
use embassy_stm32 as hal;
#[cfg(target_os = "none")]
use embassy_stm32::gpio::{Level, Output, Speed};
#[cfg(target_os = "none")]
use embassy_stm32::i2c::I2c;
#[cfg(target_os = "none")]
use embassy_stm32::time::Hertz;
#[cfg(target_os = "none")]
use embassy_stm32::usart::{BufferedUart, Config as UartConfig};
#[cfg(target_os = "none")]
use embassy_time::{Duration, Ticker};
#[cfg(target_os = "none")]
use embedded_io_async::{Read, Write};
#[cfg(target_os = "none")]
use heapless::String;

#[cfg(target_os = "none")]
use watchdog_core::board::WatchdogBoard;
#[cfg(target_os = "none")]
use watchdog_core::repl::LineAssembler;

#[cfg(target_os = "none")]
hal::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => hal::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

/// Host link speed; must match the supervisor's `baudrate` parameter.
#[cfg(target_os = "none")]
const HOST_UART_BAUD: u32 = 19_200;

/// Large enough for the longest reply (a full `EEPROM DUMP`).
#[cfg(target_os = "none")]
const REPLY_CAPACITY: usize = 4096;

#[cfg(target_os = "none")]
static mut UART_TX_BUFFER: [u8; 512] = [0; 512];
#[cfg(target_os = "none")]
static mut UART_RX_BUFFER: [u8; 128] = [0; 128];

#[cfg(target_os = "none")]
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA4,
        PA5,
        PB0,
        PB1,
        PB6,
        PB7,
        I2C1,
        USART5,
        ..
    } = hal::init(config);

    let actuator = hw::BoardActuator::new(
        Output::new(PA0, Level::Low, Speed::Low),
        Output::new(PA1, Level::Low, Speed::Low),
        Output::new(PA4, Level::Low, Speed::Low),
        Output::new(PA5, Level::Low, Speed::Low),
    );

    let i2c = I2c::new_blocking(I2C1, PB6, PB7, Hertz(100_000), Default::default());
    let nvm = hw::Eeprom::new(i2c);

    let mut board = WatchdogBoard::new(nvm, hw::BoardClock::new(), actuator);

    let mut uart_config = UartConfig::default();
    uart_config.baudrate = HOST_UART_BAUD;
    let uart = BufferedUart::new(
        USART5,
        UartIrqs,
        PB1,
        PB0,
        unsafe { &mut *core::ptr::addr_of_mut!(UART_TX_BUFFER) },
        unsafe { &mut *core::ptr::addr_of_mut!(UART_RX_BUFFER) },
        uart_config,
    )
    .expect("UART bring-up failed");
    let (mut tx, mut rx) = uart.split();

    defmt::info!("NanoWatchdog firmware up");

    let mut assembler = LineAssembler::new();
    let mut ticker = Ticker::every(Duration::from_secs(1));
    let mut ingress = [0u8; 32];

    loop {
        match select(rx.read(&mut ingress), ticker.next()).await {
            Either::First(Ok(count)) => {
                for &byte in &ingress[..count] {
                    if let Some(line) = assembler.feed(byte) {
                        handle_line(&mut board, line.as_slice(), &mut tx).await;
                    }
                }
            }
            Either::First(Err(err)) => {
                defmt::warn!("uart read error: {}", err);
            }
            Either::Second(()) => {
                board.poll();
            }
        }
    }
}

#[cfg(target_os = "none")]
async fn handle_line<M, C, A, W>(board: &mut WatchdogBoard<M, C, A>, line: &[u8], tx: &mut W)
where
    M: watchdog_core::store::NonVolatileMemory,
    C: watchdog_core::board::Clock,
    A: watchdog_core::board::Actuator,
    W: Write,
{
    let Ok(text) = core::str::from_utf8(line) else {
        let _ = tx.write_all(b"Unknown or invalid command: \n").await;
        return;
    };

    let mut reply: String<REPLY_CAPACITY> = String::new();
    if board.handle_line(text, &mut reply).is_err() {
        defmt::warn!("reply overflow, line dropped");
        return;
    }

    if tx.write_all(reply.as_bytes()).await.is_err() {
        defmt::warn!("uart write error");
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}

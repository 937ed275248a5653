//! Hardware bindings for the reference board.

mod eeprom;

pub use eeprom::Eeprom;

use embassy_stm32::gpio::Output;
use embassy_time::{block_for, Duration, Instant};

use watchdog_core::board::{Actuator, Clock, Led, RELAY_PULSE_MILLIS};

/// Board clock: monotonic uptime plus a host-supplied epoch offset.
pub struct BoardClock {
    offset: i64,
}

impl BoardClock {
    pub const fn new() -> Self {
        Self { offset: 0 }
    }

    fn uptime_secs() -> i64 {
        Instant::now().as_secs() as i64
    }
}

impl Clock for BoardClock {
    fn now(&self) -> u32 {
        (self.offset + Self::uptime_secs()).max(0) as u32
    }

    fn set(&mut self, epoch: u32) {
        self.offset = i64::from(epoch) - Self::uptime_secs();
    }
}

/// Three status LEDs and the reset relay, all push-pull outputs.
pub struct BoardActuator {
    start_led: Output<'static>,
    ping_led: Output<'static>,
    reset_led: Output<'static>,
    relay: Output<'static>,
}

impl BoardActuator {
    pub fn new(
        start_led: Output<'static>,
        ping_led: Output<'static>,
        reset_led: Output<'static>,
        relay: Output<'static>,
    ) -> Self {
        Self {
            start_led,
            ping_led,
            reset_led,
            relay,
        }
    }

    fn pin(&mut self, led: Led) -> &mut Output<'static> {
        match led {
            Led::Start => &mut self.start_led,
            Led::Ping => &mut self.ping_led,
            Led::Reset => &mut self.reset_led,
        }
    }
}

impl Actuator for BoardActuator {
    fn led(&mut self, led: Led, on: bool) {
        if on {
            self.pin(led).set_high();
        } else {
            self.pin(led).set_low();
        }
    }

    fn blink(&mut self, led: Led) {
        self.pin(led).set_high();
        block_for(Duration::from_millis(RELAY_PULSE_MILLIS as u64));
        self.pin(led).set_low();
    }

    fn pulse_relay(&mut self) {
        defmt::warn!("closing the reset relay");
        self.relay.set_high();
        block_for(Duration::from_millis(RELAY_PULSE_MILLIS as u64));
        self.relay.set_low();
    }
}

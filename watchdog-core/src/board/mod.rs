//! Board runtime state machine.
//!
//! [`WatchdogBoard`] ties the command interpreter, the event store, and the
//! actuator together without depending on a specific clock or pin driver.
//! Firmware and emulator implementations provide concrete [`Clock`] and
//! [`Actuator`] types while reusing the shared command handling housed here.

pub mod status;

use core::fmt;

use crate::event::{reason, ResetEvent};
use crate::repl::{self, Command};
use crate::store::{EventStore, NonVolatileMemory, MAX_RESET_EVENTS};

/// Watchdog delay applied until the host configures one.
pub const DEFAULT_DELAY_SECS: u16 = 60;

/// Duration of the relay pulse and of a LED blink, in milliseconds.
pub const RELAY_PULSE_MILLIS: u32 = 300;

/// Board clock, counted in seconds since the Unix epoch.
///
/// Boards have no battery-backed RTC; the host aligns the clock with
/// `SET DATE` shortly after the supervisor starts. Before that the clock
/// runs from an arbitrary origin, which is fine: the watchdog only ever
/// compares differences.
pub trait Clock {
    /// Current board time.
    fn now(&self) -> u32;

    /// Aligns the clock with a host-provided epoch second.
    fn set(&mut self, epoch: u32);
}

/// Status LEDs present on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Led {
    Start,
    Ping,
    Reset,
}

/// Abstraction over the LED and relay outputs.
pub trait Actuator {
    /// Drives a status LED.
    fn led(&mut self, led: Led, on: bool);

    /// Briefly flashes a status LED.
    fn blink(&mut self, led: Led);

    /// Closes the reset relay for [`RELAY_PULSE_MILLIS`], then releases it.
    fn pulse_relay(&mut self);
}

/// Actuator that performs no hardware interaction.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopActuator;

impl Actuator for NoopActuator {
    fn led(&mut self, _: Led, _: bool) {}

    fn blink(&mut self, _: Led) {}

    fn pulse_relay(&mut self) {}
}

/// The watchdog board: command interpreter, miss-timer, and reset actuator.
pub struct WatchdogBoard<M, C, A> {
    store: EventStore<M>,
    clock: C,
    actuator: A,
    start_time: u32,
    last_ping: u32,
    reset_time: u32,
    delay_secs: u16,
    test_mode: bool,
    date_set: bool,
}

impl<M, C, A> WatchdogBoard<M, C, A>
where
    M: NonVolatileMemory,
    C: Clock,
    A: Actuator,
{
    pub fn new(nvm: M, clock: C, actuator: A) -> Self {
        Self {
            store: EventStore::new(nvm),
            clock,
            actuator,
            start_time: 0,
            last_ping: 0,
            reset_time: 0,
            delay_secs: DEFAULT_DELAY_SECS,
            test_mode: false,
            date_set: false,
        }
    }

    /// Handles one received command line (terminator already stripped) and
    /// writes the full reply into `out`.
    ///
    /// Commands producing multi-line output (`HELP`, `STATUS`, `EEPROM DUMP`)
    /// emit it before the final acknowledgement line.
    pub fn handle_line<W: fmt::Write>(&mut self, line: &str, out: &mut W) -> fmt::Result {
        match repl::parse(line) {
            Ok(command) => {
                self.execute(command, out)?;
                writeln!(out, "OK: {line}")
            }
            Err(_) => writeln!(out, "Unknown or invalid command: {line}"),
        }
    }

    /// Evaluates the watchdog condition. Call once per main-loop pass.
    pub fn poll(&mut self) {
        if self.start_time == 0 || self.reset_time != 0 {
            return;
        }
        let now = self.clock.now();
        if now > self.last_ping.saturating_add(u32::from(self.delay_secs)) {
            self.execute_reset(reason::NO_PING);
        }
    }

    fn execute<W: fmt::Write>(&mut self, command: Command, out: &mut W) -> fmt::Result {
        match command {
            Command::Noop => Ok(()),
            Command::Help => status::write_help(out),
            Command::Ping => {
                // Silently ignored unless started and not yet reset.
                if self.start_time != 0 && self.reset_time == 0 {
                    self.last_ping = self.clock.now();
                    self.actuator.blink(Led::Ping);
                }
                Ok(())
            }
            Command::Start => {
                if self.start_time == 0 {
                    let now = self.clock.now();
                    self.start_time = now;
                    self.last_ping = now;
                    self.actuator.led(Led::Start, true);
                }
                Ok(())
            }
            Command::Stop | Command::Reinit => {
                self.start_time = 0;
                self.last_ping = 0;
                self.reset_time = 0;
                self.actuator.led(Led::Start, false);
                self.actuator.led(Led::Ping, false);
                self.actuator.led(Led::Reset, false);
                Ok(())
            }
            Command::SetDate(epoch) => {
                self.clock.set(epoch);
                self.date_set = true;
                Ok(())
            }
            Command::SetDelay(delay) => {
                self.delay_secs = delay;
                Ok(())
            }
            Command::SetTest(test) => {
                self.test_mode = test;
                Ok(())
            }
            Command::Reboot(code) => {
                self.execute_reset(code);
                Ok(())
            }
            Command::Acknowledge(slot) => {
                let mut event = self.store.reset_event(usize::from(slot));
                event.acknowledge(true);
                self.store.set_reset_event(&event, usize::from(slot));
                Ok(())
            }
            Command::EepromInit => {
                self.store.erase(self.clock.now());
                Ok(())
            }
            Command::EepromDump => self.write_dump(out),
            Command::Status => status::write_status(self, out),
        }
    }

    /// Fires the reset actuator, once.
    ///
    /// Further pings and resets have no effect until the board is reinitialized.
    /// Test mode suppresses the relay pulse and the persisted event; only the
    /// RESET LED reports the firing.
    fn execute_reset(&mut self, code: u8) {
        if self.reset_time != 0 {
            return;
        }
        let now = self.clock.now();
        self.reset_time = now;
        self.actuator.led(Led::Reset, true);
        if !self.test_mode {
            self.store.push_reset_event(&ResetEvent::new(code, now));
            self.actuator.pulse_relay();
        }
    }

    fn write_dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "Initialization event:")?;
        self.store.init_event().write_report(out, "    ")?;
        let count = self.store.reset_count();
        writeln!(out, "Reset events count: {count}")?;
        for slot in 0..count.min(MAX_RESET_EVENTS) {
            writeln!(out, "Reset event #{slot}:")?;
            self.store.reset_event(slot).write_report(out, "    ")?;
        }
        Ok(())
    }

    /// The event store, for inspection.
    pub fn store(&self) -> &EventStore<M> {
        &self.store
    }

    pub fn delay_secs(&self) -> u16 {
        self.delay_secs
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn is_date_set(&self) -> bool {
        self.date_set
    }

    pub fn start_time(&self) -> u32 {
        self.start_time
    }

    pub fn last_ping(&self) -> u32 {
        self.last_ping
    }

    pub fn reset_time(&self) -> u32 {
        self.reset_time
    }

    pub(crate) fn clock_now(&self) -> u32 {
        self.clock.now()
    }
}

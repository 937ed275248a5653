use std::cell::{Cell, RefCell};
use std::rc::Rc;

use watchdog_core::board::{Actuator, Clock, Led, WatchdogBoard};
use watchdog_core::event::reason;
use watchdog_core::store::{RamNvm, MAX_RESET_EVENTS};

#[derive(Clone, Default)]
struct TestClock(Rc<Cell<u32>>);

impl TestClock {
    fn advance(&self, secs: u32) {
        self.0.set(self.0.get() + secs);
    }
}

impl Clock for TestClock {
    fn now(&self) -> u32 {
        self.0.get()
    }

    fn set(&mut self, epoch: u32) {
        self.0.set(epoch);
    }
}

#[derive(Clone, Default)]
struct RecordingActuator {
    relay_pulses: Rc<Cell<usize>>,
    led_states: Rc<RefCell<[bool; 3]>>,
}

impl RecordingActuator {
    fn relay_pulses(&self) -> usize {
        self.relay_pulses.get()
    }

    fn led(&self, led: Led) -> bool {
        self.led_states.borrow()[led_index(led)]
    }
}

fn led_index(led: Led) -> usize {
    match led {
        Led::Start => 0,
        Led::Ping => 1,
        Led::Reset => 2,
    }
}

impl Actuator for RecordingActuator {
    fn led(&mut self, led: Led, on: bool) {
        self.led_states.borrow_mut()[led_index(led)] = on;
    }

    fn blink(&mut self, _: Led) {}

    fn pulse_relay(&mut self) {
        self.relay_pulses.set(self.relay_pulses.get() + 1);
    }
}

struct Harness {
    board: WatchdogBoard<RamNvm, TestClock, RecordingActuator>,
    clock: TestClock,
    actuator: RecordingActuator,
}

impl Harness {
    fn new() -> Self {
        let clock = TestClock::default();
        let actuator = RecordingActuator::default();
        let board = WatchdogBoard::new(RamNvm::new(), clock.clone(), actuator.clone());
        Self {
            board,
            clock,
            actuator,
        }
    }

    fn send(&mut self, line: &str) -> String {
        let mut reply = String::new();
        self.board
            .handle_line(line, &mut reply)
            .expect("reply rendering failed");
        reply
    }

    fn send_ok(&mut self, line: &str) {
        let reply = self.send(line);
        assert_eq!(
            reply.lines().last(),
            Some(format!("OK: {line}").as_str()),
            "unexpected reply to {line:?}: {reply}"
        );
    }
}

fn bring_up(harness: &mut Harness, test_mode: bool) {
    harness.send_ok("EEPROM INIT");
    harness.send_ok("SET DATE 1700000000");
    harness.send_ok("SET DELAY 60");
    harness.send_ok(if test_mode { "SET TEST ON" } else { "SET TEST OFF" });
    harness.send_ok("START");
}

#[test]
fn empty_board_bring_up_then_missed_ping_reset() {
    let mut harness = Harness::new();

    let reply = harness.send("NOOP");
    assert_eq!(reply, "OK: NOOP\n");

    bring_up(&mut harness, false);
    let init = harness.board.store().init_event();
    assert_eq!(init.reason(), reason::INIT);
    assert!(init.is_acknowledged());
    assert_eq!(harness.board.store().reset_count(), 0);

    // Exactly `delay` seconds elapsed: the window is still open.
    harness.clock.advance(60);
    harness.board.poll();
    assert_eq!(harness.actuator.relay_pulses(), 0);

    // One second past the window: the relay fires and the event is stored.
    harness.clock.advance(1);
    harness.board.poll();
    assert_eq!(harness.actuator.relay_pulses(), 1);
    assert!(harness.actuator.led(Led::Reset));

    let status = harness.send("STATUS");
    assert!(status.contains("Status: reset"), "status was: {status}");

    let event = harness.board.store().reset_event(0);
    assert_eq!(event.reason(), reason::NO_PING);
    assert_eq!(event.time(), 1_700_000_061);
    assert!(!event.is_acknowledged());
    assert_eq!(harness.board.store().reset_count(), 1);
}

#[test]
fn pings_sustain_the_watchdog() {
    let mut harness = Harness::new();
    bring_up(&mut harness, true);

    // Five minutes of pinging every 20 seconds.
    for _ in 0..15 {
        harness.clock.advance(20);
        harness.board.poll();
        harness.send_ok("PING");
    }

    assert_eq!(harness.actuator.relay_pulses(), 0);
    assert_eq!(harness.board.store().reset_count(), 0);
    let status = harness.send("STATUS");
    assert!(status.contains("Status: started"), "status was: {status}");
}

#[test]
fn external_reboot_records_the_callers_reason() {
    let mut harness = Harness::new();
    bring_up(&mut harness, false);

    let reply = harness.send("REBOOT 22");
    assert_eq!(reply.lines().last(), Some("OK: REBOOT 22"));
    assert_eq!(harness.actuator.relay_pulses(), 1);

    let event = harness.board.store().reset_event(0);
    assert_eq!(event.reason(), 22);
    assert!(!event.is_acknowledged());

    let status = harness.send("STATUS");
    assert!(status.contains("    reason: 22 (external command)"));
    assert!(status.contains("    acknowledged: no"));
}

#[test]
fn reset_is_one_shot_until_reinit() {
    let mut harness = Harness::new();
    bring_up(&mut harness, false);

    harness.send_ok("REBOOT 20");
    let first_reset = harness.board.reset_time();

    // Neither pings nor further reboots take effect now.
    harness.clock.advance(5);
    harness.send_ok("PING");
    assert_eq!(harness.board.last_ping(), 1_700_000_000);
    harness.send_ok("REBOOT 21");
    assert_eq!(harness.actuator.relay_pulses(), 1);
    assert_eq!(harness.board.reset_time(), first_reset);
    assert_eq!(harness.board.store().reset_count(), 1);

    harness.send_ok("REINIT");
    assert_eq!(harness.board.reset_time(), 0);
    assert!(!harness.actuator.led(Led::Reset));
    assert!(!harness.actuator.led(Led::Start));

    harness.send_ok("START");
    harness.send_ok("REBOOT 21");
    assert_eq!(harness.actuator.relay_pulses(), 2);
    assert_eq!(harness.board.store().reset_count(), 2);
}

#[test]
fn test_mode_suppresses_relay_and_event() {
    let mut harness = Harness::new();
    bring_up(&mut harness, true);

    harness.clock.advance(61);
    harness.board.poll();

    assert!(harness.actuator.led(Led::Reset));
    assert_eq!(harness.actuator.relay_pulses(), 0);
    assert_eq!(harness.board.store().reset_count(), 0);
    assert_ne!(harness.board.reset_time(), 0);
}

#[test]
fn invalid_commands_change_nothing() {
    let mut harness = Harness::new();
    bring_up(&mut harness, false);
    let before = harness.board.store().nvm().as_bytes().to_vec();

    for line in [
        "noop",
        "PING ",
        "SET DELAY 0",
        "SET DELAY 65536",
        "REBOOT 5",
        "REBOOT 128",
        "ACKNOWLEDGE 10",
        "ACKNOWLEDGE -1",
        "EEPROM INIT NOW",
        "gibberish",
    ] {
        let reply = harness.send(line);
        assert_eq!(
            reply,
            format!("Unknown or invalid command: {line}\n"),
            "line {line:?} should be rejected"
        );
    }

    assert_eq!(harness.board.store().nvm().as_bytes(), &before[..]);
    assert_eq!(harness.actuator.relay_pulses(), 0);
}

#[test]
fn ring_saturates_at_ten_events() {
    let mut harness = Harness::new();
    harness.send_ok("EEPROM INIT");
    harness.send_ok("SET DATE 1000");

    for _ in 0..11 {
        harness.send_ok("START");
        harness.send_ok("REBOOT 22");
        harness.send_ok("REINIT");
        harness.clock.advance(1);
    }

    let store = harness.board.store();
    assert_eq!(store.reset_count(), MAX_RESET_EVENTS);
    // Slot 0 carries the most recent firing, slot 9 the oldest survivor.
    assert_eq!(store.reset_event(0).time(), 1_010);
    assert_eq!(store.reset_event(MAX_RESET_EVENTS - 1).time(), 1_001);
}

#[test]
fn acknowledge_is_idempotent() {
    let mut harness = Harness::new();
    bring_up(&mut harness, false);
    harness.send_ok("REBOOT 23");

    harness.send_ok("ACKNOWLEDGE 0");
    let first = harness.board.store().reset_event(0);
    assert!(first.is_acknowledged());

    harness.send_ok("ACKNOWLEDGE 0");
    let second = harness.board.store().reset_event(0);
    assert_eq!(first.to_bytes(), second.to_bytes());
}

#[test]
fn eeprom_dump_lists_the_stored_events() {
    let mut harness = Harness::new();
    bring_up(&mut harness, false);
    harness.send_ok("REBOOT 19");

    let dump = harness.send("EEPROM DUMP");
    assert!(dump.contains("Initialization event:"));
    assert!(dump.contains("Reset events count: 1"));
    assert!(dump.contains("Reset event #0:"));
    assert!(dump.contains("reason: 19 (external command)"));
    assert!(dump.ends_with("OK: EEPROM DUMP\n"));
}

#[test]
fn stop_gates_pings_silently() {
    let mut harness = Harness::new();
    bring_up(&mut harness, false);
    harness.send_ok("STOP");

    // Accepted but ignored: the board is stopped.
    harness.clock.advance(10);
    harness.send_ok("PING");
    assert_eq!(harness.board.last_ping(), 0);

    harness.clock.advance(100);
    harness.board.poll();
    assert_eq!(harness.actuator.relay_pulses(), 0);
}

#[test]
fn help_lists_commands_before_the_acknowledgement() {
    let mut harness = Harness::new();
    let reply = harness.send("HELP");
    assert!(reply.starts_with("Available commands:"));
    assert!(reply.contains("  EEPROM DUMP"));
    assert_eq!(reply.lines().last(), Some("OK: HELP"));
}

//! Textual status surface for the board.
//!
//! The host supervisor parses the `STATUS` reply with line-prefix matching
//! (`Status:`, `reason:`, `acknowledged:`), so the labels written here are
//! part of the wire protocol and must stay stable.

use core::fmt;

use crate::event::VERSION_STRING;
use crate::store::NonVolatileMemory;

use super::{Actuator, Clock, WatchdogBoard};

/// Writes an epoch second as `yyyy-mm-dd hh:mm:ss UTC`.
pub fn write_datetime<W: fmt::Write>(out: &mut W, epoch: u32) -> fmt::Result {
    let days = i64::from(epoch / 86_400);
    let secs = epoch % 86_400;

    // Civil-from-days conversion on a proleptic Gregorian calendar.
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    write!(
        out,
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02} UTC",
        secs / 3_600,
        (secs / 60) % 60,
        secs % 60,
    )
}

/// Writes the `HELP` command list.
pub fn write_help<W: fmt::Write>(out: &mut W) -> fmt::Result {
    writeln!(out, "Available commands:")?;
    writeln!(out, "  NOOP")?;
    writeln!(out, "  HELP")?;
    writeln!(out, "  PING")?;
    writeln!(out, "  START")?;
    writeln!(out, "  STOP")?;
    writeln!(out, "  REINIT")?;
    writeln!(out, "  STATUS")?;
    writeln!(out, "  SET DATE <epoch>")?;
    writeln!(out, "  SET DELAY <1..65535>")?;
    writeln!(out, "  SET TEST ON|OFF")?;
    writeln!(out, "  REBOOT <16..127>")?;
    writeln!(out, "  ACKNOWLEDGE <0..9>")?;
    writeln!(out, "  EEPROM INIT")?;
    writeln!(out, "  EEPROM DUMP")
}

/// Writes the multi-line `STATUS` report.
pub fn write_status<M, C, A, W>(board: &WatchdogBoard<M, C, A>, out: &mut W) -> fmt::Result
where
    M: NonVolatileMemory,
    C: Clock,
    A: Actuator,
    W: fmt::Write,
{
    let now = board.clock_now();

    writeln!(out, "{VERSION_STRING}")?;

    write!(out, "Date: ")?;
    write_datetime(out, now)?;
    writeln!(
        out,
        " (set: {})",
        if board.is_date_set() { "yes" } else { "no" }
    )?;

    writeln!(out, "Delay: {} s", board.delay_secs())?;
    writeln!(
        out,
        "Test mode: {}",
        if board.is_test_mode() { "on" } else { "off" }
    )?;

    if board.reset_time() != 0 {
        writeln!(out, "Status: reset")?;
        write!(out, "  Reset on: ")?;
        write_datetime(out, board.reset_time())?;
        writeln!(out)?;
    } else if board.start_time() != 0 {
        writeln!(out, "Status: started")?;
        write!(out, "  Started on: ")?;
        write_datetime(out, board.start_time())?;
        writeln!(out)?;
        write!(out, "  Last ping: ")?;
        write_datetime(out, board.last_ping())?;
        writeln!(out)?;
        let expiry = board.last_ping().saturating_add(u32::from(board.delay_secs()));
        writeln!(out, "  Before reset: {} s", expiry.saturating_sub(now))?;
    } else {
        writeln!(out, "Status: stopped")?;
    }

    let last = board.store().reset_event(0);
    if last.is_null() {
        writeln!(out, "  Last reset: none")
    } else {
        writeln!(out, "  Last reset:")?;
        last.write_report(out, "    ")
    }
}

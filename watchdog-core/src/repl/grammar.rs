//! Command grammar for the board serial protocol.
//!
//! The wire protocol is deliberately rigid: keywords are case-sensitive and
//! compared byte-exactly, tokens are separated by exactly one space, and any
//! trailing bytes invalidate the whole line. The parser composes `winnow`
//! combinators over the raw line and accepts a command only when the full
//! input is consumed.

use core::fmt;

use winnow::ascii::digit1;
use winnow::combinator::{alt, preceded};
use winnow::error::EmptyError;
use winnow::prelude::*;

/// Structured commands produced by the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Noop,
    Help,
    Ping,
    Start,
    Stop,
    Reinit,
    SetDate(u32),
    SetDelay(u16),
    SetTest(bool),
    Reboot(u8),
    Acknowledge(u8),
    EepromInit,
    EepromDump,
    Status,
}

/// Rejection of a command line.
///
/// The protocol answers every bad line with the same negative
/// acknowledgement, so the error carries no detail: an unknown keyword, a
/// malformed argument, and an out-of-range value are all the same failure
/// to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown or invalid command")
    }
}

/// Parses one command line (terminator already stripped).
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut input = line;
    let command = command.parse_next(&mut input).map_err(|_| ParseError)?;
    if !input.is_empty() {
        return Err(ParseError);
    }
    Ok(command)
}

fn command(input: &mut &str) -> ModalResult<Command, EmptyError> {
    alt((
        "NOOP".value(Command::Noop),
        "HELP".value(Command::Help),
        "PING".value(Command::Ping),
        "START".value(Command::Start),
        "STOP".value(Command::Stop),
        "REINIT".value(Command::Reinit),
        "STATUS".value(Command::Status),
        "EEPROM INIT".value(Command::EepromInit),
        "EEPROM DUMP".value(Command::EepromDump),
        preceded("SET DATE ", epoch_second).map(Command::SetDate),
        preceded("SET DELAY ", delay_seconds).map(Command::SetDelay),
        preceded("SET TEST ", test_flag).map(Command::SetTest),
        preceded("REBOOT ", reboot_reason).map(Command::Reboot),
        preceded("ACKNOWLEDGE ", slot_index).map(Command::Acknowledge),
    ))
    .parse_next(input)
}

fn epoch_second(input: &mut &str) -> ModalResult<u32, EmptyError> {
    digit1.try_map(str::parse::<u32>).parse_next(input)
}

fn delay_seconds(input: &mut &str) -> ModalResult<u16, EmptyError> {
    digit1
        .try_map(str::parse::<u16>)
        .verify(|delay| *delay >= 1)
        .parse_next(input)
}

fn test_flag(input: &mut &str) -> ModalResult<bool, EmptyError> {
    alt(("ON".value(true), "OFF".value(false))).parse_next(input)
}

fn reboot_reason(input: &mut &str) -> ModalResult<u8, EmptyError> {
    digit1
        .try_map(str::parse::<u8>)
        .verify(|reason| (16..=127).contains(reason))
        .parse_next(input)
}

fn slot_index(input: &mut &str) -> ModalResult<u8, EmptyError> {
    digit1
        .try_map(str::parse::<u8>)
        .verify(|slot| *slot <= 9)
        .parse_next(input)
}

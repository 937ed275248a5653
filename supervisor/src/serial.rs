//! Serial transport to the watchdog board.
//!
//! The wire exchange is synchronous: write one command line, then collect
//! whatever the board answers until the line has been silent for
//! `read-timeout` poll windows of ~100 ms. The transport may therefore hold
//! the single-threaded main loop for up to `read-timeout × 100 ms`, which is
//! tolerated because `read-timeout` is sized well below the check interval.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serialport::{DataBits, Parity, SerialPort, StopBits};

use crate::config::Config;

/// Poll window used while collecting a reply.
const READ_POLL: Duration = Duration::from_millis(100);

/// Request/reply channel to the board.
pub trait BoardLink {
    /// Sends one command line (without terminator) and returns the reply,
    /// trailing CR/LF trimmed. An empty string means the board said nothing
    /// within the read timeout.
    fn send_command(&mut self, line: &str) -> io::Result<String>;
}

/// Real serial link, 8N1 with DTR deasserted so opening the port does not
/// reset the board.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    read_timeout: u32,
}

impl SerialLink {
    pub fn open(config: &Config) -> Result<Self> {
        let device = config.device.get();
        let mut port = serialport::new(device, config.baudrate.value())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_POLL)
            .open()
            .with_context(|| format!("cannot open serial device {device}"))?;
        port.write_data_terminal_ready(false)
            .context("cannot deassert DTR")?;
        info!(
            "opened {device} at {} baud 8N1",
            config.baudrate.value()
        );
        Ok(Self {
            port,
            read_timeout: config.read_timeout.value(),
        })
    }
}

impl BoardLink for SerialLink {
    fn send_command(&mut self, line: &str) -> io::Result<String> {
        debug!("serial > {line}");
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;

        let mut buffer = Vec::new();
        let mut silent_windows = 0;
        while silent_windows < self.read_timeout {
            let mut chunk = [0u8; 256];
            match self.port.read(&mut chunk) {
                Ok(0) => silent_windows += 1,
                Ok(n) => {
                    buffer.extend_from_slice(&chunk[..n]);
                    silent_windows = 0;
                }
                Err(err) if err.kind() == io::ErrorKind::TimedOut => silent_windows += 1,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }

        let reply = String::from_utf8_lossy(&buffer)
            .trim_end_matches(['\r', '\n'])
            .to_owned();
        debug!("serial < {reply}");
        Ok(reply)
    }
}

/// Stand-in link used when the serial layer is disabled for testing: every
/// command is echoed back with a marker prefix.
pub struct EchoLink;

impl BoardLink for EchoLink {
    fn send_command(&mut self, line: &str) -> io::Result<String> {
        Ok(format!("<echo> {line}"))
    }
}

/// Returns `true` when `reply` acknowledges `command`.
pub fn is_ack(reply: &str, command: &str) -> bool {
    reply
        .lines()
        .last()
        .is_some_and(|last| last == format!("OK: {command}"))
}

/// Startup handshake: `NOOP` once per second until the board acknowledges,
/// bounded by `open-timeout` seconds.
pub fn handshake(link: &mut dyn BoardLink, config: &Config) -> Result<()> {
    let attempts = config.open_timeout.value();
    for attempt in 1..=attempts {
        let reply = link.send_command("NOOP")?;
        if is_ack(&reply, "NOOP") {
            debug!("board answered NOOP on attempt {attempt}");
            return Ok(());
        }
        // An empty reply just means the board is not ready yet.
        thread::sleep(Duration::from_secs(1));
    }
    bail!("board did not answer NOOP within {attempts} s");
}

/// Board configuration sequence sent at startup and on USR1.
pub fn configure_board(link: &mut dyn BoardLink, config: &Config) -> Result<()> {
    let test = if config.action.value() {
        "SET TEST OFF"
    } else {
        "SET TEST ON"
    };
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let date = format!("SET DATE {epoch}");
    let delay = format!("SET DELAY {}", config.delay.value());

    for command in [test, date.as_str(), delay.as_str(), "START"] {
        let reply = link.send_command(command)?;
        if !is_ack(&reply, command) {
            warn!("board rejected {command:?}: {reply:?}");
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted link recording every sent command.
    ///
    /// The record is shared so tests can keep a handle while the link itself
    /// is boxed away behind `dyn BoardLink`.
    pub struct MockLink {
        sent: Arc<Mutex<Vec<String>>>,
        replies: VecDeque<String>,
    }

    impl MockLink {
        pub fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                replies: VecDeque::new(),
            }
        }

        /// Queues a scripted reply; once drained, commands are acknowledged.
        pub fn push_reply(&mut self, reply: impl Into<String>) {
            self.replies.push_back(reply.into());
        }

        /// Snapshot of the commands sent so far.
        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        /// Shared handle onto the sent-command record.
        pub fn sent_handle(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.sent)
        }
    }

    impl BoardLink for MockLink {
        fn send_command(&mut self, line: &str) -> io::Result<String> {
            self.sent.lock().unwrap().push(line.to_owned());
            Ok(self
                .replies
                .pop_front()
                .unwrap_or_else(|| format!("OK: {line}")))
        }
    }
}

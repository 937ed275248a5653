use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use watchdog_core::board::{Actuator, Clock, Led, WatchdogBoard};
use watchdog_core::store::RamNvm;

/// Board session over a RAM-backed store.
///
/// The emulator speaks the exact serial protocol of the real board, so the
/// supervisor can be pointed at a pseudo-terminal wired to this process and
/// exercised end to end without hardware.
pub struct Session {
    board: WatchdogBoard<RamNvm, HostClock, TranscriptActuator>,
    transcript: Option<TranscriptLogger>,
    started_at: Instant,
}

impl Session {
    pub fn new(log_path: Option<PathBuf>) -> io::Result<Self> {
        let transcript = log_path.map(|path| TranscriptLogger::new(&path)).transpose()?;
        let actuator = TranscriptActuator;
        let board = WatchdogBoard::new(RamNvm::new(), HostClock::default(), actuator);
        Ok(Self {
            board,
            transcript,
            started_at: Instant::now(),
        })
    }

    /// Feeds one received line to the board and returns the full reply.
    pub fn handle_line(&mut self, line: &str) -> io::Result<String> {
        let elapsed = self.started_at.elapsed();
        if let Some(transcript) = &mut self.transcript {
            transcript.append_line(elapsed, TranscriptRole::Host, line)?;
        }

        // The emulator is line-driven; evaluate the miss-timer on every
        // exchange so an expired watchdog fires before the command runs.
        self.board.poll();

        let mut reply = String::new();
        self.board
            .handle_line(line, &mut reply)
            .map_err(|_| io::Error::other("reply rendering failed"))?;

        if let Some(transcript) = &mut self.transcript {
            for reply_line in reply.lines() {
                transcript.append_line(elapsed, TranscriptRole::Board, reply_line)?;
            }
        }
        Ok(reply)
    }
}

/// Clock tracking the host time, adjustable by `SET DATE`.
#[derive(Default)]
struct HostClock {
    offset: i64,
}

impl HostClock {
    fn host_epoch() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl Clock for HostClock {
    fn now(&self) -> u32 {
        (Self::host_epoch() + self.offset).max(0) as u32
    }

    fn set(&mut self, epoch: u32) {
        self.offset = i64::from(epoch) - Self::host_epoch();
    }
}

/// Actuator that narrates LED and relay transitions on stderr.
struct TranscriptActuator;

fn led_name(led: Led) -> &'static str {
    match led {
        Led::Start => "START",
        Led::Ping => "PING",
        Led::Reset => "RESET",
    }
}

impl Actuator for TranscriptActuator {
    fn led(&mut self, led: Led, on: bool) {
        eprintln!("[led] {} {}", led_name(led), if on { "on" } else { "off" });
    }

    fn blink(&mut self, led: Led) {
        eprintln!("[led] {} blink", led_name(led));
    }

    fn pulse_relay(&mut self) {
        eprintln!("[relay] pulse 300 ms");
    }
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# NanoWatchdog emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Board,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST >",
            TranscriptRole::Board => "BOARD<",
        }
    }
}

//! Command-line surface of the supervisor.
//!
//! Long options only. Every boolean flag has a `--no<flag>` negation; when
//! both are given the negation wins. Flags left unset keep whatever the
//! configuration file or the defaults decided.

use std::path::PathBuf;

use clap::Parser;

use crate::config::parse_number;

#[derive(Parser, Debug, Default)]
#[command(name = "nanowatchdogd", version, about = "NanoWatchdog host supervisor")]
pub struct Cli {
    /// Verbosity level (decimal, 0x… or 0b…)
    #[arg(long, value_parser = parse_verbose)]
    pub verbose: Option<u32>,

    /// Configuration file to read instead of the default
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run in the background (backgrounding itself is left to the init system)
    #[arg(long)]
    pub daemon: bool,
    #[arg(long = "nodaemon", hide = true)]
    pub nodaemon: bool,

    /// Talk to a real serial device (--noserial echoes commands back instead)
    #[arg(long)]
    pub serial: bool,
    #[arg(long = "noserial", hide = true)]
    pub noserial: bool,

    /// Serial device of the board
    #[arg(long)]
    pub device: Option<String>,

    /// Address both TCP listeners bind to
    #[arg(long)]
    pub ip: Option<String>,

    /// Port of the supervisor-command listener
    #[arg(long = "port-daemon")]
    pub port_daemon: Option<u16>,

    /// Port of the board-forwarding listener
    #[arg(long = "port-board")]
    pub port_board: Option<u16>,

    /// Watchdog delay configured on the board, seconds
    #[arg(long)]
    pub delay: Option<u16>,

    /// Seconds between check-and-ping cycles
    #[arg(long)]
    pub interval: Option<u32>,

    /// Ping the board on every cycle
    #[arg(long)]
    pub ping: bool,
    #[arg(long = "noping", hide = true)]
    pub noping: bool,

    /// Actually reboot when a check fails (--noaction only logs the intent)
    #[arg(long)]
    pub action: bool,
    #[arg(long = "noaction", hide = true)]
    pub noaction: bool,

    /// Accepted for compatibility; has no effect
    #[arg(long)]
    pub sync: bool,
    #[arg(long = "nosync", hide = true)]
    pub nosync: bool,

    /// Accepted for compatibility; has no effect
    #[arg(long)]
    pub softboot: bool,
    #[arg(long = "nosoftboot", hide = true)]
    pub nosoftboot: bool,

    /// Accept out-of-range parameter values instead of clamping them
    #[arg(long)]
    pub force: bool,
    #[arg(long = "noforce", hide = true)]
    pub noforce: bool,
}

fn parse_verbose(text: &str) -> Result<u32, String> {
    parse_number(text).map_err(|()| format!("invalid verbosity {text:?}"))
}

fn tri_state(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (false, false) => None,
        (_, true) => Some(false),
        (true, false) => Some(true),
    }
}

impl Cli {
    pub fn flag_daemon(&self) -> Option<bool> {
        tri_state(self.daemon, self.nodaemon)
    }

    pub fn flag_serial(&self) -> Option<bool> {
        tri_state(self.serial, self.noserial)
    }

    pub fn flag_ping(&self) -> Option<bool> {
        tri_state(self.ping, self.noping)
    }

    pub fn flag_action(&self) -> Option<bool> {
        tri_state(self.action, self.noaction)
    }

    pub fn flag_sync(&self) -> Option<bool> {
        tri_state(self.sync, self.nosync)
    }

    pub fn flag_softboot(&self) -> Option<bool> {
        tri_state(self.softboot, self.nosoftboot)
    }

    pub fn flag_force(&self) -> Option<bool> {
        tri_state(self.force, self.noforce)
    }
}

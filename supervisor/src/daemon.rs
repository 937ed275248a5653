//! The supervisor main loop.
//!
//! One iteration per second: service at most one pending connection per
//! listener, observe the signal flags, sleep, then do the interval work —
//! ping the board and run the check pipeline. Signal handlers only set
//! atomic flags; all real work happens here, which keeps the process
//! strictly single-threaded and cooperative.
//!
//! The ping shares its interval with the checks: a failing check commandeers
//! the cycle with a `REBOOT`, and a slow pipeline counts against the board's
//! delay. Operators must size `delay` strictly larger than `interval` plus
//! the worst-case pipeline duration.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGUSR1};

use watchdog_core::event::reason;

use crate::checks::{run_pipeline, ProbeEnv};
use crate::cli::Cli;
use crate::command::{self, Action};
use crate::config::Config;
use crate::listener::{self, Listeners};
use crate::serial::{self, BoardLink};

/// Signal flags observed at the top of every iteration.
pub struct SignalFlags {
    term: Arc<AtomicBool>,
    int: Arc<AtomicBool>,
    hup: Arc<AtomicBool>,
    usr1: Arc<AtomicBool>,
}

impl SignalFlags {
    pub fn register() -> Result<Self> {
        let flags = Self {
            term: Arc::new(AtomicBool::new(false)),
            int: Arc::new(AtomicBool::new(false)),
            hup: Arc::new(AtomicBool::new(false)),
            usr1: Arc::new(AtomicBool::new(false)),
        };
        signal_hook::flag::register(SIGTERM, Arc::clone(&flags.term))
            .context("cannot register SIGTERM")?;
        signal_hook::flag::register(SIGINT, Arc::clone(&flags.int))
            .context("cannot register SIGINT")?;
        signal_hook::flag::register(SIGHUP, Arc::clone(&flags.hup))
            .context("cannot register SIGHUP")?;
        signal_hook::flag::register(SIGUSR1, Arc::clone(&flags.usr1))
            .context("cannot register SIGUSR1")?;
        Ok(flags)
    }

    #[cfg(test)]
    fn unregistered() -> Self {
        Self {
            term: Arc::new(AtomicBool::new(false)),
            int: Arc::new(AtomicBool::new(false)),
            hup: Arc::new(AtomicBool::new(false)),
            usr1: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Pid-file guard against a second supervisor instance.
///
/// A stale file naming a pid that is no longer alive is reclaimed. Without a
/// configured pid-file there is no guard.
pub fn claim_pid_file(config: &Config) -> Result<Option<PathBuf>> {
    let Some(path) = config.pid_file.get().clone() else {
        return Ok(None);
    };
    if let Ok(content) = fs::read_to_string(&path) {
        if let Ok(pid) = content.trim().parse::<u32>() {
            if PathBuf::from("/proc").join(pid.to_string()).exists() {
                bail!("already running as pid {pid} (per {})", path.display());
            }
        }
        warn!("removing stale pid file {}", path.display());
    }
    fs::write(&path, format!("{}\n", std::process::id()))
        .with_context(|| format!("cannot write pid file {}", path.display()))?;
    Ok(Some(path))
}

pub struct Daemon {
    config: Config,
    cli: Cli,
    link: Box<dyn BoardLink>,
    listeners: Listeners,
    env: ProbeEnv,
    flags: SignalFlags,
    pid_file: Option<PathBuf>,
    tick: u32,
    subtick: u32,
    quit: bool,
    exit_code: u8,
}

impl Daemon {
    pub fn new(
        config: Config,
        cli: Cli,
        link: Box<dyn BoardLink>,
        listeners: Listeners,
        pid_file: Option<PathBuf>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            cli,
            link,
            listeners,
            env: ProbeEnv::default(),
            flags: SignalFlags::register()?,
            pid_file,
            tick: 0,
            subtick: 0,
            quit: false,
            exit_code: 0,
        })
    }

    /// Runs until QUIT or a terminating signal; returns the exit code.
    pub fn run(mut self) -> u8 {
        info!(
            "entering main loop (interval {} s, delay {} s)",
            self.config.interval.value(),
            self.config.delay.value()
        );
        loop {
            if let Some(mut stream) = listener::accept_one(&self.listeners.board) {
                self.serve_board(&mut stream);
            }
            if let Some(mut stream) = listener::accept_one(&self.listeners.command) {
                self.serve_command(&mut stream);
            }
            self.observe_signals();
            if self.quit {
                break;
            }
            thread::sleep(Duration::from_secs(1));
            self.interval_work();
        }
        self.shutdown()
    }

    fn serve_board(&mut self, stream: &mut std::net::TcpStream) {
        let request = match listener::read_request(stream) {
            Ok(request) => request,
            Err(err) => {
                warn!("board endpoint: dropping connection: {err}");
                return;
            }
        };
        let reply = match self.link.send_command(&request) {
            Ok(reply) => reply,
            Err(err) => {
                warn!("board endpoint: serial exchange failed: {err}");
                return;
            }
        };
        if let Err(err) = listener::send_reply(stream, &reply) {
            warn!("board endpoint: dropping connection: {err}");
        }
    }

    fn serve_command(&mut self, stream: &mut std::net::TcpStream) {
        let request = match listener::read_request(stream) {
            Ok(request) => request,
            Err(err) => {
                warn!("command endpoint: dropping connection: {err}");
                return;
            }
        };
        let (reply, action) = command::handle(&mut self.config, &request);
        if let Err(err) = listener::send_reply(stream, &reply) {
            warn!("command endpoint: dropping connection: {err}");
        }
        if action == Action::Quit {
            self.quit = true;
        }
    }

    fn observe_signals(&mut self) {
        if self.flags.int.swap(false, Ordering::Relaxed) {
            info!("caught SIGINT, terminating");
            self.exit_code = 1;
            self.quit = true;
        }
        if self.flags.term.swap(false, Ordering::Relaxed) {
            info!("caught SIGTERM, terminating");
            self.quit = true;
        }
        if self.flags.hup.swap(false, Ordering::Relaxed) {
            info!("caught SIGHUP, re-reading configuration");
            self.config.reload(&self.cli);
        }
        if self.flags.usr1.swap(false, Ordering::Relaxed) {
            info!("caught SIGUSR1, reconfiguring the board");
            if let Err(err) = self.reconfigure_board() {
                warn!("board reconfiguration failed: {err:#}");
            }
        }
    }

    fn reconfigure_board(&mut self) -> Result<()> {
        if !self.config.serial.value() {
            return Ok(());
        }
        self.link.send_command("STOP")?;
        thread::sleep(Duration::from_secs(1));
        serial::configure_board(self.link.as_mut(), &self.config)
    }

    fn interval_work(&mut self) {
        self.subtick += 1;
        if self.subtick <= self.config.interval.value() {
            return;
        }
        self.subtick = 0;
        self.tick += 1;

        if self.config.nwping.value() {
            if let Err(err) = self.link.send_command("PING") {
                warn!("ping failed: {err}");
            }
        }

        if let Some(code) = run_pipeline(&self.config, &self.env) {
            self.reboot(code);
        }

        if self.tick >= self.config.logtick.value() {
            self.tick = 0;
            info!("watchdog alive, all checks passing");
        }
    }

    fn reboot(&mut self, code: u8) {
        warn!(
            "check requested reboot: reason {code} ({})",
            reason::label(code)
        );
        if !self.config.action.value() {
            info!("action disabled, reboot not issued");
            return;
        }
        let command = format!("REBOOT {code}");
        match self.link.send_command(&command) {
            Ok(reply) if serial::is_ack(&reply, &command) => {}
            Ok(reply) => warn!("board rejected {command:?}: {reply:?}"),
            Err(err) => warn!("cannot issue {command:?}: {err}"),
        }
    }

    fn shutdown(mut self) -> u8 {
        if self.config.serial.value() {
            if let Err(err) = self.link.send_command("STOP") {
                warn!("cannot stop the board watchdog: {err}");
            }
        }
        if let Some(path) = &self.pid_file {
            if let Err(err) = fs::remove_file(path) {
                warn!("cannot remove pid file {}: {err}", path.display());
            }
        }
        info!("terminated with exit code {}", self.exit_code);
        self.exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Origin;
    use crate::serial::mock::MockLink;
    use std::sync::Mutex;

    fn daemon_with_link(link: MockLink, config: Config) -> (Daemon, Arc<Mutex<Vec<String>>>) {
        let sent = link.sent_handle();
        let listeners = Listeners::bind(&test_config()).unwrap();
        let daemon = Daemon {
            config,
            cli: Cli::default(),
            link: Box::new(link),
            listeners,
            env: ProbeEnv::default(),
            flags: SignalFlags::unregistered(),
            pid_file: None,
            tick: 0,
            subtick: 0,
            quit: false,
            exit_code: 0,
        };
        (daemon, sent)
    }

    fn test_config() -> Config {
        let mut config = Config::load(&Cli::default());
        // Ephemeral ports so parallel tests do not collide.
        config.port_serial.set(0, Origin::Runtime);
        config.port_daemon.set(0, Origin::Runtime);
        config
    }

    #[test]
    fn interval_boundary_pings_the_board() {
        let mut config = test_config();
        config.interval.set(2, Origin::Runtime);
        let (mut daemon, sent) = daemon_with_link(MockLink::new(), config);

        daemon.interval_work(); // subtick 1
        daemon.interval_work(); // subtick 2
        daemon.interval_work(); // boundary

        assert_eq!(*sent.lock().unwrap(), ["PING"]);
    }

    #[test]
    fn ping_off_withholds_the_ping() {
        let mut config = test_config();
        config.interval.set(1, Origin::Runtime);
        config.nwping.set(false, Origin::Runtime);
        let (mut daemon, sent) = daemon_with_link(MockLink::new(), config);

        daemon.interval_work();
        daemon.interval_work();

        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn disabled_action_only_logs_the_reboot() {
        let mut config = test_config();
        config.action.set(false, Origin::Runtime);
        let (mut daemon, sent) = daemon_with_link(MockLink::new(), config);

        daemon.reboot(reason::PING);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn enabled_action_issues_the_reboot() {
        let (mut daemon, sent) = daemon_with_link(MockLink::new(), test_config());
        daemon.reboot(reason::MIN_MEMORY);
        assert_eq!(*sent.lock().unwrap(), ["REBOOT 19"]);
    }
}

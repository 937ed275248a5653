//! NanoWatchdog host supervisor daemon.
//!
//! Pings the watchdog board while the host is healthy, lets the board reset
//! the host when it is not, and exposes two line-oriented TCP endpoints for
//! operators.

mod checks;
mod cli;
mod command;
mod config;
mod daemon;
mod listener;
mod notify;
mod serial;

use std::env;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{error, info, LevelFilter};

use cli::Cli;
use config::Config;
use daemon::Daemon;
use serial::{BoardLink, EchoLink, SerialLink};

/// Maps the verbosity parameter onto a log level.
pub(crate) fn level_filter(verbose: u32) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    // Invoked bare, the supervisor explains itself rather than arming a
    // reboot path with defaults.
    if env::args().len() <= 1 {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    }

    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(level_filter(cli.verbose.unwrap_or(1)))
        .init();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    info!(
        "NanoWatchdog supervisor {} starting",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load(&cli);
    log::set_max_level(level_filter(config.verbose.value()));
    if config.daemon.value() {
        info!("daemon mode requested; backgrounding is left to the init system");
    }

    let pid_file = daemon::claim_pid_file(&config)?;

    // Everything opened from here on must be released if startup fails;
    // the pid file is the only resource not dropped automatically.
    let startup = || -> Result<(Box<dyn BoardLink>, String)> {
        let mut link: Box<dyn BoardLink> = if config.serial.value() {
            Box::new(SerialLink::open(&config)?)
        } else {
            info!("serial layer disabled, echoing commands back");
            Box::new(EchoLink)
        };

        if config.serial.value() {
            serial::handshake(link.as_mut(), &config)?;
            serial::configure_board(link.as_mut(), &config)?;
        }

        let status = notify::notify_boot(&config, link.as_mut(), &notify::SendmailSink::default())?;
        Ok((link, status))
    };

    let (link, status) = match startup() {
        Ok(parts) => parts,
        Err(err) => {
            if let Some(path) = &pid_file {
                let _ = fs::remove_file(path);
            }
            return Err(err);
        }
    };

    if let Some(path) = config.status_file.get() {
        if let Err(err) = fs::write(path, format!("{status}\n")) {
            log::warn!("cannot write status file {}: {err}", path.display());
        }
    }

    let listeners = match listener::Listeners::bind(&config) {
        Ok(listeners) => listeners,
        Err(err) => {
            if let Some(path) = &pid_file {
                let _ = fs::remove_file(path);
            }
            return Err(err);
        }
    };

    let daemon = Daemon::new(config, cli, link, listeners, pid_file)
        .context("cannot set up the main loop")?;
    Ok(daemon.run())
}

//! Boot-time notifier and the mail sink it reports through.
//!
//! Right after the startup handshake the supervisor asks the board for its
//! `STATUS`. If the most recent reset event has not been acknowledged yet,
//! the operator gets a mail carrying the full STATUS text and the event is
//! acknowledged on the board so the next boot stays quiet.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::{Config, SendMail};
use crate::serial::BoardLink;

/// Outgoing mail transport.
pub trait MailSink {
    fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> io::Result<()>;
}

/// Pipes the message through a sendmail-compatible binary.
pub struct SendmailSink {
    pub program: PathBuf,
}

impl Default for SendmailSink {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/sbin/sendmail"),
        }
    }
}

impl MailSink for SendmailSink {
    fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> io::Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        {
            let stdin = child.stdin.as_mut().expect("stdin was piped");
            write!(stdin, "From: {from}\nTo: {to}\nSubject: {subject}\n\n{body}\n")?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(io::Error::other(format!(
                "{} exited with {status}",
                self.program.display()
            )));
        }
        Ok(())
    }
}

/// What the notifier extracted from a STATUS reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub acknowledged: Option<bool>,
    pub reason: Option<u8>,
}

/// Parses a STATUS reply by line-prefix matching.
///
/// The board renders the slot-0 event with `reason:` and `acknowledged:`
/// labels; anything else in the reply is ignored.
pub fn parse_status(reply: &str) -> StatusReport {
    let mut report = StatusReport::default();
    for line in reply.lines() {
        let line = line.trim_start();
        if let Some(rest) = line.strip_prefix("acknowledged:") {
            report.acknowledged = Some(rest.trim() == "yes");
        } else if let Some(rest) = line.strip_prefix("reason:") {
            report.reason = rest
                .trim()
                .split_whitespace()
                .next()
                .and_then(|code| code.parse::<u8>().ok());
        }
    }
    report
}

/// Inspects the board status and mails the operator if needed.
///
/// Returns the raw STATUS reply so the caller can persist it as the status
/// snapshot.
pub fn notify_boot(
    config: &Config,
    link: &mut dyn BoardLink,
    sink: &dyn MailSink,
) -> Result<String> {
    let status = link
        .send_command("STATUS")
        .context("cannot read board status")?;

    let admin = match (config.send_mail.value(), config.admin.get()) {
        (SendMail::Never, _) | (_, None) => return Ok(status),
        (_, Some(admin)) => admin.clone(),
    };

    let report = parse_status(&status);
    if report.acknowledged == Some(false) {
        let reason = report
            .reason
            .map(|code| code.to_string())
            .unwrap_or_else(|| "unknown".to_owned());
        info!("unacknowledged reset event (reason {reason}), mailing {admin}");
        let body = format!(
            "The watchdog board reports an unacknowledged reset event.\n\n{status}\n"
        );
        sink.send(
            config.send_from.get(),
            &admin,
            "NanoWatchdog: unacknowledged reset event",
            &body,
        )
        .context("cannot send the boot notification")?;

        let reply = link.send_command("ACKNOWLEDGE 0")?;
        if !crate::serial::is_ack(&reply, "ACKNOWLEDGE 0") {
            warn!("board rejected ACKNOWLEDGE 0: {reply:?}");
        }
    } else if config.send_mail.value() == SendMail::Always {
        sink.send(
            config.send_from.get(),
            &admin,
            "NanoWatchdog: no unacknowledged event",
            "The watchdog board reports no unacknowledged reset event.\n",
        )
        .context("cannot send the boot notification")?;
    }

    Ok(status)
}

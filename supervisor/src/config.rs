//! Supervisor configuration with per-parameter origin tracking.
//!
//! Every parameter remembers where its current value came from. Later layers
//! only override earlier ones: defaults, then the configuration file, then
//! the command line, then runtime commands on the control endpoint. A HUP
//! reload re-reads the file without clobbering command-line or runtime
//! values.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;

use crate::cli::Cli;

/// Configuration file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nanowatchdog.conf";

/// Where a parameter value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Default,
    ConfigFile,
    CommandLine,
    Runtime,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Default => "default",
            Origin::ConfigFile => "config-file",
            Origin::CommandLine => "command-line",
            Origin::Runtime => "runtime",
        })
    }
}

/// One configuration parameter and its origin.
#[derive(Clone, Debug)]
pub struct Param<T> {
    value: T,
    origin: Origin,
}

impl<T> Param<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            origin: Origin::Default,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn set(&mut self, value: T, origin: Origin) {
        self.value = value;
        self.origin = origin;
    }

    /// Applies a config-file value unless the command line or a runtime
    /// command already pinned this parameter.
    fn set_from_file(&mut self, value: T) {
        if matches!(self.origin, Origin::Default | Origin::ConfigFile) {
            self.value = value;
            self.origin = Origin::ConfigFile;
        }
    }
}

impl<T: Copy> Param<T> {
    pub fn value(&self) -> T {
        self.value
    }
}

/// When to send the boot notification mail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendMail {
    Never,
    Auto,
    Always,
}

impl FromStr for SendMail {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(SendMail::Never),
            "auto" => Ok(SendMail::Auto),
            "always" => Ok(SendMail::Always),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SendMail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SendMail::Never => "never",
            SendMail::Auto => "auto",
            SendMail::Always => "always",
        })
    }
}

/// The full supervisor configuration record.
#[derive(Clone, Debug)]
pub struct Config {
    pub device: Param<String>,
    pub baudrate: Param<u32>,
    /// Seconds to wait for the board to answer the startup `NOOP`.
    pub open_timeout: Param<u32>,
    /// Serial read timeout, in ~100 ms units of silence.
    pub read_timeout: Param<u32>,
    pub ip: Param<String>,
    /// Board-forwarding listener port.
    pub port_serial: Param<u16>,
    /// Supervisor-command listener port.
    pub port_daemon: Param<u16>,
    /// Watchdog delay configured on the board, seconds.
    pub delay: Param<u16>,
    /// Seconds between check-and-ping cycles.
    pub interval: Param<u32>,
    /// Check cycles between heartbeat log lines.
    pub logtick: Param<u32>,
    pub pid_file: Param<Option<PathBuf>>,
    pub status_file: Param<Option<PathBuf>>,
    pub send_mail: Param<SendMail>,
    pub send_from: Param<String>,
    pub admin: Param<Option<String>>,
    pub max_load_1: Param<u32>,
    pub max_load_5: Param<u32>,
    pub max_load_15: Param<u32>,
    /// Minimum free swap, in 4 KiB pages. Zero disables the check.
    pub min_memory: Param<u32>,
    /// Celsius ceiling for every readable thermal zone.
    pub max_temperature: Param<u32>,
    pub pidfiles: Param<Vec<PathBuf>>,
    pub ping_hosts: Param<Vec<String>>,
    pub interfaces: Param<Vec<String>>,
    pub test_directory: Param<Option<PathBuf>>,

    pub verbose: Param<u32>,
    pub daemon: Param<bool>,
    /// Whether the serial layer is real or echoed back for testing.
    pub serial: Param<bool>,
    /// Whether the periodic board ping is emitted.
    pub nwping: Param<bool>,
    /// Whether a failing check actually reboots, or is only logged.
    pub action: Param<bool>,
    pub sync: Param<bool>,
    pub softboot: Param<bool>,
    pub force: Param<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: Param::new("/dev/ttyUSB0".to_owned()),
            baudrate: Param::new(19_200),
            open_timeout: Param::new(10),
            read_timeout: Param::new(5),
            ip: Param::new("127.0.0.1".to_owned()),
            port_serial: Param::new(7777),
            port_daemon: Param::new(7778),
            delay: Param::new(60),
            interval: Param::new(10),
            logtick: Param::new(6),
            pid_file: Param::new(None),
            status_file: Param::new(None),
            send_mail: Param::new(SendMail::Auto),
            send_from: Param::new("nanowatchdog".to_owned()),
            admin: Param::new(None),
            max_load_1: Param::new(0),
            max_load_5: Param::new(0),
            max_load_15: Param::new(0),
            min_memory: Param::new(0),
            max_temperature: Param::new(90),
            pidfiles: Param::new(Vec::new()),
            ping_hosts: Param::new(Vec::new()),
            interfaces: Param::new(Vec::new()),
            test_directory: Param::new(None),
            verbose: Param::new(1),
            daemon: Param::new(false),
            serial: Param::new(true),
            nwping: Param::new(true),
            action: Param::new(true),
            sync: Param::new(false),
            softboot: Param::new(false),
            force: Param::new(false),
        }
    }
}

impl Config {
    /// Builds the effective configuration: defaults, then the configuration
    /// file (if any), then the command line, then range clamping.
    pub fn load(cli: &Cli) -> Self {
        let mut config = Config::default();
        config.apply_file_layer(cli);
        config.apply_cli(cli);
        config.finalize();
        config
    }

    /// Re-reads the configuration file layer, preserving parameters pinned
    /// by the command line or at runtime.
    pub fn reload(&mut self, cli: &Cli) {
        // Parameters owned by the file layer fall back to their default
        // before the file is re-applied, so deletions take effect too.
        let fresh = Config::default();
        self.reset_file_layer(&fresh);
        self.apply_file_layer(cli);
        self.apply_cli(cli);
        self.finalize();
    }

    fn apply_file_layer(&mut self, cli: &Cli) {
        let path = match (&cli.config, Path::new(DEFAULT_CONFIG_PATH).exists()) {
            (Some(path), _) => path.clone(),
            (None, true) => PathBuf::from(DEFAULT_CONFIG_PATH),
            (None, false) => return,
        };
        let mut entries = Vec::new();
        read_entries(&path, 0, &mut entries);
        self.apply_entries(&entries);
    }

    fn apply_entries(&mut self, entries: &[(String, String)]) {
        // Repeatable keys replace the previous load on first occurrence.
        let mut pidfiles = Vec::new();
        let mut ping_hosts = Vec::new();
        let mut interfaces = Vec::new();

        for (key, value) in entries {
            match key.as_str() {
                "device" => self.device.set_from_file(value.clone()),
                "baudrate" => self.set_numeric_from_file(value, |c, v| c.baudrate.set_from_file(v)),
                "open-timeout" => {
                    self.set_numeric_from_file(value, |c, v| c.open_timeout.set_from_file(v))
                }
                "read-timeout" => {
                    self.set_numeric_from_file(value, |c, v| c.read_timeout.set_from_file(v))
                }
                "ip" => self.ip.set_from_file(value.clone()),
                "port-serial" => {
                    self.set_u16_from_file(value, |c, v| c.port_serial.set_from_file(v))
                }
                "port-daemon" => {
                    self.set_u16_from_file(value, |c, v| c.port_daemon.set_from_file(v))
                }
                "delay" => self.set_u16_from_file(value, |c, v| c.delay.set_from_file(v)),
                "interval" => self.set_numeric_from_file(value, |c, v| c.interval.set_from_file(v)),
                "logtick" => self.set_numeric_from_file(value, |c, v| c.logtick.set_from_file(v)),
                "pid-file" => self.pid_file.set_from_file(Some(PathBuf::from(value))),
                "status-file" => self.status_file.set_from_file(Some(PathBuf::from(value))),
                "send-mail" => match value.parse::<SendMail>() {
                    Ok(mode) => self.send_mail.set_from_file(mode),
                    Err(()) => warn!("send-mail: unknown mode {value:?}, keeping {}", self.send_mail.value()),
                },
                "send-from" => self.send_from.set_from_file(value.clone()),
                "admin" => self.admin.set_from_file(Some(value.clone())),
                "max-load-1" => {
                    self.set_numeric_from_file(value, |c, v| c.max_load_1.set_from_file(v))
                }
                "max-load-5" => {
                    self.set_numeric_from_file(value, |c, v| c.max_load_5.set_from_file(v))
                }
                "max-load-15" => {
                    self.set_numeric_from_file(value, |c, v| c.max_load_15.set_from_file(v))
                }
                "min-memory" => {
                    self.set_numeric_from_file(value, |c, v| c.min_memory.set_from_file(v))
                }
                "max-temperature" => {
                    self.set_numeric_from_file(value, |c, v| c.max_temperature.set_from_file(v))
                }
                "pidfile" => pidfiles.push(PathBuf::from(value)),
                "ping" => ping_hosts.push(value.clone()),
                "interface" => interfaces.push(value.clone()),
                "test-directory" => self.test_directory.set_from_file(Some(PathBuf::from(value))),
                "include" => {} // already flattened by read_entries
                other => warn!("ignoring unknown configuration key {other:?}"),
            }
        }

        if !pidfiles.is_empty() {
            self.pidfiles.set_from_file(pidfiles);
        }
        if !ping_hosts.is_empty() {
            self.ping_hosts.set_from_file(ping_hosts);
        }
        if !interfaces.is_empty() {
            self.interfaces.set_from_file(interfaces);
        }
    }

    fn set_numeric_from_file(&mut self, value: &str, apply: impl FnOnce(&mut Self, u32)) {
        match parse_number(value) {
            Ok(parsed) => apply(self, parsed),
            Err(()) => warn!("ignoring non-numeric configuration value {value:?}"),
        }
    }

    fn set_u16_from_file(&mut self, value: &str, apply: impl FnOnce(&mut Self, u16)) {
        match parse_number(value).ok().and_then(|v| u16::try_from(v).ok()) {
            Some(parsed) => apply(self, parsed),
            None => warn!("ignoring out-of-range configuration value {value:?}"),
        }
    }

    fn reset_file_layer(&mut self, fresh: &Config) {
        macro_rules! reset {
            ($($field:ident),+ $(,)?) => {
                $(
                    if self.$field.origin() == Origin::ConfigFile {
                        self.$field = fresh.$field.clone();
                    }
                )+
            };
        }
        reset!(
            device,
            baudrate,
            open_timeout,
            read_timeout,
            ip,
            port_serial,
            port_daemon,
            delay,
            interval,
            logtick,
            pid_file,
            status_file,
            send_mail,
            send_from,
            admin,
            max_load_1,
            max_load_5,
            max_load_15,
            min_memory,
            max_temperature,
            pidfiles,
            ping_hosts,
            interfaces,
            test_directory,
        );
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(verbose) = cli.verbose {
            self.verbose.set(verbose, Origin::CommandLine);
        }
        if let Some(daemon) = cli.flag_daemon() {
            self.daemon.set(daemon, Origin::CommandLine);
        }
        if let Some(serial) = cli.flag_serial() {
            self.serial.set(serial, Origin::CommandLine);
        }
        if let Some(device) = &cli.device {
            self.device.set(device.clone(), Origin::CommandLine);
        }
        if let Some(ip) = &cli.ip {
            self.ip.set(ip.clone(), Origin::CommandLine);
        }
        if let Some(port) = cli.port_daemon {
            self.port_daemon.set(port, Origin::CommandLine);
        }
        if let Some(port) = cli.port_board {
            self.port_serial.set(port, Origin::CommandLine);
        }
        if let Some(delay) = cli.delay {
            self.delay.set(delay, Origin::CommandLine);
        }
        if let Some(interval) = cli.interval {
            self.interval.set(interval, Origin::CommandLine);
        }
        if let Some(ping) = cli.flag_ping() {
            self.nwping.set(ping, Origin::CommandLine);
        }
        if let Some(action) = cli.flag_action() {
            self.action.set(action, Origin::CommandLine);
        }
        if let Some(sync) = cli.flag_sync() {
            self.sync.set(sync, Origin::CommandLine);
        }
        if let Some(softboot) = cli.flag_softboot() {
            self.softboot.set(softboot, Origin::CommandLine);
        }
        if let Some(force) = cli.flag_force() {
            self.force.set(force, Origin::CommandLine);
        }
    }

    /// Derived defaults and range clamping.
    fn finalize(&mut self) {
        // Re-derived on every load so a removed max-load-1 clears them too.
        let load1 = self.max_load_1.value();
        if self.max_load_5.origin() == Origin::Default {
            self.max_load_5.set(load1 * 3 / 4, Origin::Default);
        }
        if self.max_load_15.origin() == Origin::Default {
            self.max_load_15.set(load1 / 2, Origin::Default);
        }

        if self.force.value() {
            return;
        }
        clamp_param("interval", &mut self.interval, 5, 60);
        clamp_param("logtick", &mut self.logtick, 1, 3_600);
        clamp_param("open-timeout", &mut self.open_timeout, 1, 60);
        clamp_param("read-timeout", &mut self.read_timeout, 1, 50);
        clamp_param("baudrate", &mut self.baudrate, 300, 921_600);
        if self.delay.value() < 1 {
            warn!("delay: clamping 0 to 1");
            self.delay.set(1, self.delay.origin());
        }
    }

    /// Looks a parameter up by its public name, as used by `GET`.
    pub fn get(&self, name: &str) -> Option<String> {
        let value = match name {
            "device" => self.device.get().clone(),
            "baudrate" => self.baudrate.value().to_string(),
            "open-timeout" => self.open_timeout.value().to_string(),
            "read-timeout" => self.read_timeout.value().to_string(),
            "ip" => self.ip.get().clone(),
            "port-serial" => self.port_serial.value().to_string(),
            "port-daemon" => self.port_daemon.value().to_string(),
            "delay" => self.delay.value().to_string(),
            "interval" => self.interval.value().to_string(),
            "logtick" => self.logtick.value().to_string(),
            "pid-file" => display_path(self.pid_file.get()),
            "status-file" => display_path(self.status_file.get()),
            "send-mail" => self.send_mail.value().to_string(),
            "send-from" => self.send_from.get().clone(),
            "admin" => self.admin.get().clone().unwrap_or_default(),
            "max-load-1" => self.max_load_1.value().to_string(),
            "max-load-5" => self.max_load_5.value().to_string(),
            "max-load-15" => self.max_load_15.value().to_string(),
            "min-memory" => self.min_memory.value().to_string(),
            "max-temperature" => self.max_temperature.value().to_string(),
            "pidfile" => join_paths(self.pidfiles.get()),
            "ping" => self.ping_hosts.get().join(","),
            "interface" => self.interfaces.get().join(","),
            "test-directory" => display_path(self.test_directory.get()),
            "verbose" => self.verbose.value().to_string(),
            "daemon" => self.daemon.value().to_string(),
            "serial" => self.serial.value().to_string(),
            "nwping" => self.nwping.value().to_string(),
            "action" => self.action.value().to_string(),
            "sync" => self.sync.value().to_string(),
            "softboot" => self.softboot.value().to_string(),
            "force" => self.force.value().to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Renders the `DUMP PARMS` table: name, value, origin.
    pub fn dump_parms(&self) -> String {
        let mut out = String::new();
        let mut row = |name: &str, value: String, origin: Origin| {
            out.push_str(&format!("{name:<16} {value:<32} {origin}\n"));
        };

        row("device", self.device.get().clone(), self.device.origin());
        row("baudrate", self.baudrate.value().to_string(), self.baudrate.origin());
        row("open-timeout", self.open_timeout.value().to_string(), self.open_timeout.origin());
        row("read-timeout", self.read_timeout.value().to_string(), self.read_timeout.origin());
        row("ip", self.ip.get().clone(), self.ip.origin());
        row("port-serial", self.port_serial.value().to_string(), self.port_serial.origin());
        row("port-daemon", self.port_daemon.value().to_string(), self.port_daemon.origin());
        row("delay", self.delay.value().to_string(), self.delay.origin());
        row("interval", self.interval.value().to_string(), self.interval.origin());
        row("logtick", self.logtick.value().to_string(), self.logtick.origin());
        row("pid-file", display_path(self.pid_file.get()), self.pid_file.origin());
        row("status-file", display_path(self.status_file.get()), self.status_file.origin());
        row("send-mail", self.send_mail.value().to_string(), self.send_mail.origin());
        row("send-from", self.send_from.get().clone(), self.send_from.origin());
        row("admin", self.admin.get().clone().unwrap_or_default(), self.admin.origin());
        row("max-load-1", self.max_load_1.value().to_string(), self.max_load_1.origin());
        row("max-load-5", self.max_load_5.value().to_string(), self.max_load_5.origin());
        row("max-load-15", self.max_load_15.value().to_string(), self.max_load_15.origin());
        row("min-memory", self.min_memory.value().to_string(), self.min_memory.origin());
        row("max-temperature", self.max_temperature.value().to_string(), self.max_temperature.origin());
        row("pidfile", join_paths(self.pidfiles.get()), self.pidfiles.origin());
        row("ping", self.ping_hosts.get().join(","), self.ping_hosts.origin());
        row("interface", self.interfaces.get().join(","), self.interfaces.origin());
        row("test-directory", display_path(self.test_directory.get()), self.test_directory.origin());
        row("verbose", self.verbose.value().to_string(), self.verbose.origin());
        row("daemon", self.daemon.value().to_string(), self.daemon.origin());
        row("serial", self.serial.value().to_string(), self.serial.origin());
        row("nwping", self.nwping.value().to_string(), self.nwping.origin());
        row("action", self.action.value().to_string(), self.action.origin());
        row("sync", self.sync.value().to_string(), self.sync.origin());
        row("softboot", self.softboot.value().to_string(), self.softboot.origin());
        row("force", self.force.value().to_string(), self.force.origin());
        out
    }
}

fn clamp_param(name: &str, param: &mut Param<u32>, min: u32, max: u32) {
    let value = param.value();
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!("{name}: clamping {value} to {clamped} (allowed {min}..{max})");
        let origin = param.origin();
        param.set(clamped, origin);
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a decimal, `0x…` hexadecimal, or `0b…` binary number.
pub fn parse_number(text: &str) -> Result<u32, ()> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|_| ())
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u32::from_str_radix(bin, 2).map_err(|_| ())
    } else {
        text.parse::<u32>().map_err(|_| ())
    }
}

const MAX_INCLUDE_DEPTH: usize = 4;

/// Reads `key = value` entries from `path`, flattening `include` directives.
///
/// An unreadable file is logged and skipped; the caller keeps whatever layer
/// it already has.
fn read_entries(path: &Path, depth: usize, entries: &mut Vec<(String, String)>) {
    if depth >= MAX_INCLUDE_DEPTH {
        warn!("{}: include nesting too deep, skipping", path.display());
        return;
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!("{}: cannot read configuration: {err}", path.display());
            return;
        }
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!("{}: ignoring malformed line {line:?}", path.display());
            continue;
        };
        let key = key.trim().to_owned();
        let value = value.trim().to_owned();
        if key == "include" {
            read_entries(Path::new(&value), depth + 1, entries);
        } else {
            entries.push((key, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("nwd-config-{}-{name}", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn cli_with_config(path: &Path) -> Cli {
        let mut cli = Cli::default();
        cli.config = Some(path.to_path_buf());
        cli
    }

    #[test]
    fn defaults_have_default_origin() {
        let config = Config::default();
        assert_eq!(config.delay.value(), 60);
        assert_eq!(config.interval.value(), 10);
        assert_eq!(config.port_serial.value(), 7777);
        assert_eq!(config.port_daemon.value(), 7778);
        assert_eq!(config.delay.origin(), Origin::Default);
        assert!(config.nwping.value());
        assert!(config.action.value());
    }

    #[test]
    fn file_values_override_defaults() {
        let path = scratch_file(
            "file-overrides",
            "# test configuration\n\
             delay = 120\n\
             admin = root@example.org\n\
             pidfile = /run/sshd.pid\n\
             pidfile = /run/crond.pid\n",
        );
        let config = Config::load(&cli_with_config(&path));
        assert_eq!(config.delay.value(), 120);
        assert_eq!(config.delay.origin(), Origin::ConfigFile);
        assert_eq!(config.admin.get().as_deref(), Some("root@example.org"));
        assert_eq!(config.pidfiles.get().len(), 2);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn command_line_wins_over_file() {
        let path = scratch_file("cli-wins", "delay = 120\n");
        let mut cli = cli_with_config(&path);
        cli.delay = Some(30);
        let config = Config::load(&cli);
        assert_eq!(config.delay.value(), 30);
        assert_eq!(config.delay.origin(), Origin::CommandLine);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn reload_preserves_runtime_and_command_line() {
        let path = scratch_file("reload", "interval = 20\ndelay = 90\n");
        let mut cli = cli_with_config(&path);
        cli.delay = Some(45);
        let mut config = Config::load(&cli);
        config.nwping.set(false, Origin::Runtime);

        fs::write(&path, "interval = 30\ndelay = 100\n").unwrap();
        config.reload(&cli);

        assert_eq!(config.interval.value(), 30);
        assert_eq!(config.delay.value(), 45);
        assert!(!config.nwping.value());
        assert_eq!(config.nwping.origin(), Origin::Runtime);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let path = scratch_file("clamped", "interval = 3600\nread-timeout = 0\n");
        let config = Config::load(&cli_with_config(&path));
        assert_eq!(config.interval.value(), 60);
        assert_eq!(config.read_timeout.value(), 1);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn force_accepts_out_of_range_values() {
        let path = scratch_file("forced", "interval = 3600\n");
        let mut cli = cli_with_config(&path);
        cli.force = true;
        let config = Config::load(&cli);
        assert_eq!(config.interval.value(), 3_600);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn load_defaults_are_derived() {
        let path = scratch_file("loads", "max-load-1 = 24\n");
        let config = Config::load(&cli_with_config(&path));
        assert_eq!(config.max_load_5.value(), 18);
        assert_eq!(config.max_load_15.value(), 12);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn include_chains_to_a_second_file() {
        let inner = scratch_file("include-inner", "max-temperature = 75\n");
        let outer = scratch_file(
            "include-outer",
            &format!("delay = 80\ninclude = {}\n", inner.display()),
        );
        let config = Config::load(&cli_with_config(&outer));
        assert_eq!(config.delay.value(), 80);
        assert_eq!(config.max_temperature.value(), 75);
        fs::remove_file(inner).unwrap();
        fs::remove_file(outer).unwrap();
    }

    #[test]
    fn get_by_public_name() {
        let config = Config::default();
        assert_eq!(config.get("nwping").as_deref(), Some("true"));
        assert_eq!(config.get("port-serial").as_deref(), Some("7777"));
        assert_eq!(config.get("no-such-parameter"), None);
    }

    #[test]
    fn dump_lists_every_parameter_with_origin() {
        let mut config = Config::default();
        config.nwping.set(false, Origin::Runtime);
        let dump = config.dump_parms();
        assert!(dump.lines().any(|l| l.starts_with("device")));
        let nwping = dump.lines().find(|l| l.starts_with("nwping")).unwrap();
        assert!(nwping.contains("false"));
        assert!(nwping.ends_with("runtime"));
    }

    #[test]
    fn number_radix_parsing() {
        assert_eq!(parse_number("42"), Ok(42));
        assert_eq!(parse_number("0x10"), Ok(16));
        assert_eq!(parse_number("0b101"), Ok(5));
        assert_eq!(parse_number("4x2"), Err(()));
    }
}

//! Health-check pipeline.
//!
//! Checks run in a fixed order and short-circuit: the first one that trips
//! decides the reboot reason and the rest are skipped. A check whose data
//! source cannot be read logs the problem and reports "no" — the next
//! interval re-evaluates everything anyway, which is the only retry
//! mechanism the supervisor has.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, warn};

use watchdog_core::event::reason;

use crate::config::Config;

/// Where the probes read their data from. Tests substitute fake trees and a
/// deterministic pinger.
pub struct ProbeEnv {
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
    pub pinger: Box<dyn Pinger>,
}

impl Default for ProbeEnv {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
            pinger: Box::new(ExternalPinger),
        }
    }
}

/// ICMP reachability probe.
pub trait Pinger {
    fn reachable(&self, host: &str) -> bool;
}

/// Shells out to `ping -c1` with a bounded wait.
pub struct ExternalPinger;

impl Pinger for ExternalPinger {
    fn reachable(&self, host: &str) -> bool {
        match Command::new("ping")
            .args(["-c1", "-W", "2", host])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => status.success(),
            Err(err) => {
                warn!("ping {host}: cannot run ping: {err}");
                false
            }
        }
    }
}

/// Runs the whole pipeline; returns the reason code of the first check that
/// requests a reboot.
pub fn run_pipeline(config: &Config, env: &ProbeEnv) -> Option<u8> {
    if check_memory(config, env) {
        return Some(reason::MIN_MEMORY);
    }
    if let Some(code) = check_load(config, env) {
        return Some(code);
    }
    if check_temperature(config, env) {
        return Some(reason::MAX_TEMPERATURE);
    }
    if check_pidfiles(config, env) {
        return Some(reason::PIDFILE);
    }
    if check_ping(config, env) {
        return Some(reason::PING);
    }
    if check_interfaces(config, env) {
        return Some(reason::INTERFACE);
    }
    // Reserved probe: a configured test directory never requests a reboot.
    let _ = config.test_directory.get();
    None
}

/// Free swap below the configured floor.
///
/// `min-memory` counts 4 KiB pages while `/proc/meminfo` reports kB, so the
/// comparison divides kB by four.
fn check_memory(config: &Config, env: &ProbeEnv) -> bool {
    let floor = config.min_memory.value();
    if floor == 0 {
        return false;
    }
    let path = env.proc_root.join("meminfo");
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            warn!("{}: {err}", path.display());
            return false;
        }
    };
    let Some(free_kb) = content.lines().find_map(|line| {
        line.strip_prefix("SwapFree:")?
            .trim()
            .split_whitespace()
            .next()?
            .parse::<u64>()
            .ok()
    }) else {
        warn!("{}: no parsable SwapFree line", path.display());
        return false;
    };
    let free_pages = free_kb / 4;
    debug!("swap free: {free_pages} pages (floor {floor})");
    free_pages < u64::from(floor)
}

/// Any enabled load average above its limit.
fn check_load(config: &Config, env: &ProbeEnv) -> Option<u8> {
    let limits = [
        (config.max_load_1.value(), reason::MAX_LOAD_1),
        (config.max_load_5.value(), reason::MAX_LOAD_5),
        (config.max_load_15.value(), reason::MAX_LOAD_15),
    ];
    if limits.iter().all(|(limit, _)| *limit == 0) {
        return None;
    }
    let path = env.proc_root.join("loadavg");
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            warn!("{}: {err}", path.display());
            return None;
        }
    };
    let mut fields = content.split_whitespace();
    for (limit, code) in limits {
        let Some(load) = fields.next().and_then(|f| f.parse::<f64>().ok()) else {
            warn!("{}: unparsable load average", path.display());
            return None;
        };
        if limit > 0 && load > f64::from(limit) {
            return Some(code);
        }
    }
    None
}

/// Any readable thermal zone above the ceiling. Always enabled.
fn check_temperature(config: &Config, env: &ProbeEnv) -> bool {
    let ceiling = config.max_temperature.value();
    let thermal = env.sys_root.join("class/thermal");
    let entries = match fs::read_dir(&thermal) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("{}: {err}", thermal.display());
            return false;
        }
    };
    for entry in entries.flatten() {
        let temp_path = entry.path().join("temp");
        let Ok(raw) = fs::read_to_string(&temp_path) else {
            continue;
        };
        let Ok(millidegrees) = raw.trim().parse::<i64>() else {
            warn!("{}: unparsable temperature", temp_path.display());
            continue;
        };
        let degrees = millidegrees / 1_000;
        if degrees > i64::from(ceiling) {
            warn!(
                "{}: {degrees} C exceeds the {ceiling} C ceiling",
                temp_path.display()
            );
            return true;
        }
    }
    false
}

/// Any watched pid-file naming a process that is gone.
fn check_pidfiles(config: &Config, env: &ProbeEnv) -> bool {
    for pidfile in config.pidfiles.get() {
        let content = match fs::read_to_string(pidfile) {
            Ok(content) => content,
            Err(err) => {
                warn!("{}: {err}", pidfile.display());
                continue;
            }
        };
        let Ok(pid) = content.trim().parse::<u32>() else {
            warn!("{}: unparsable pid", pidfile.display());
            continue;
        };
        if !env.proc_root.join(pid.to_string()).exists() {
            warn!("{}: pid {pid} is not alive", pidfile.display());
            return true;
        }
    }
    false
}

/// Any watched host unreachable.
fn check_ping(config: &Config, env: &ProbeEnv) -> bool {
    for host in config.ping_hosts.get() {
        if !env.pinger.reachable(host) {
            warn!("host {host} did not answer ping");
            return true;
        }
    }
    false
}

/// Any watched interface with both packet counters still at zero.
fn check_interfaces(config: &Config, env: &ProbeEnv) -> bool {
    for ifname in config.interfaces.get() {
        let stats = env.sys_root.join("class/net").join(ifname).join("statistics");
        let rx = read_counter(&stats.join("rx_packets"));
        let tx = read_counter(&stats.join("tx_packets"));
        match (rx, tx) {
            (Some(0), Some(0)) => {
                warn!("interface {ifname} has seen no traffic");
                return true;
            }
            (None, _) | (_, None) => {
                warn!("interface {ifname}: statistics unreadable");
            }
            _ => {}
        }
    }
    false
}

fn read_counter(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::config::Origin;
    use std::io::Write;

    struct NeverReachable;

    impl Pinger for NeverReachable {
        fn reachable(&self, _: &str) -> bool {
            false
        }
    }

    struct FakeTree {
        root: PathBuf,
    }

    impl FakeTree {
        fn new(tag: &str) -> Self {
            let root =
                std::env::temp_dir().join(format!("nwd-checks-{}-{tag}", std::process::id()));
            let _ = fs::remove_dir_all(&root);
            fs::create_dir_all(root.join("proc")).unwrap();
            fs::create_dir_all(root.join("sys")).unwrap();
            Self { root }
        }

        fn write(&self, relative: &str, content: &str) {
            let path = self.root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            let mut file = fs::File::create(path).unwrap();
            file.write_all(content.as_bytes()).unwrap();
        }

        fn env(&self) -> ProbeEnv {
            ProbeEnv {
                proc_root: self.root.join("proc"),
                sys_root: self.root.join("sys"),
                pinger: Box::new(NeverReachable),
            }
        }
    }

    impl Drop for FakeTree {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    fn config() -> Config {
        Config::load(&Cli::default())
    }

    #[test]
    fn low_swap_short_circuits_the_pipeline() {
        let tree = FakeTree::new("swap");
        tree.write("proc/meminfo", "MemTotal: 16384 kB\nSwapFree: 1000 kB\n");
        // Load limits would also trip, but memory is evaluated first.
        tree.write("proc/loadavg", "99.0 99.0 99.0 1/100 42\n");

        let mut config = config();
        config.min_memory.set(4096, Origin::ConfigFile);
        config.max_load_1.set(1, Origin::ConfigFile);

        assert_eq!(run_pipeline(&config, &tree.env()), Some(reason::MIN_MEMORY));
    }

    #[test]
    fn ample_swap_is_quiet() {
        let tree = FakeTree::new("swap-ok");
        tree.write("proc/meminfo", "SwapFree: 8000000 kB\n");
        let mut config = config();
        config.min_memory.set(4096, Origin::ConfigFile);
        assert_eq!(run_pipeline(&config, &tree.env()), None);
    }

    #[test]
    fn load_averages_map_to_their_reasons() {
        let tree = FakeTree::new("load");
        tree.write("proc/loadavg", "0.5 7.0 0.2 1/100 42\n");
        let mut config = config();
        config.max_load_1.set(4, Origin::ConfigFile);
        config.max_load_5.set(4, Origin::ConfigFile);
        config.max_load_15.set(4, Origin::ConfigFile);
        assert_eq!(run_pipeline(&config, &tree.env()), Some(reason::MAX_LOAD_5));
    }

    #[test]
    fn zero_load_limit_disables_that_check() {
        let tree = FakeTree::new("load-disabled");
        tree.write("proc/loadavg", "9.0 9.0 9.0 1/100 42\n");
        let mut config = config();
        config.max_load_1.set(0, Origin::ConfigFile);
        assert_eq!(run_pipeline(&config, &tree.env()), None);
    }

    #[test]
    fn hot_thermal_zone_trips() {
        let tree = FakeTree::new("thermal");
        tree.write("sys/class/thermal/thermal_zone0/temp", "95000\n");
        let config = config();
        assert_eq!(
            run_pipeline(&config, &tree.env()),
            Some(reason::MAX_TEMPERATURE)
        );
    }

    #[test]
    fn dead_pidfile_process_trips() {
        let tree = FakeTree::new("pidfile");
        tree.write("proc/123/stat", "alive\n");
        tree.write("run/alive.pid", "123\n");
        tree.write("run/dead.pid", "4199\n");

        let mut config = config();
        config.pidfiles.set(
            vec![tree.root.join("run/alive.pid"), tree.root.join("run/dead.pid")],
            Origin::ConfigFile,
        );
        assert_eq!(run_pipeline(&config, &tree.env()), Some(reason::PIDFILE));
    }

    #[test]
    fn unreadable_pidfile_is_transient() {
        let tree = FakeTree::new("pidfile-missing");
        let mut config = config();
        config
            .pidfiles
            .set(vec![tree.root.join("run/nope.pid")], Origin::ConfigFile);
        assert_eq!(run_pipeline(&config, &tree.env()), None);
    }

    #[test]
    fn unreachable_host_trips() {
        let tree = FakeTree::new("ping");
        let mut config = config();
        config
            .ping_hosts
            .set(vec!["192.0.2.1".to_owned()], Origin::ConfigFile);
        assert_eq!(run_pipeline(&config, &tree.env()), Some(reason::PING));
    }

    #[test]
    fn silent_interface_trips() {
        let tree = FakeTree::new("iface");
        tree.write("sys/class/net/eth0/statistics/rx_packets", "0\n");
        tree.write("sys/class/net/eth0/statistics/tx_packets", "0\n");
        let mut config = config();
        config
            .interfaces
            .set(vec!["eth0".to_owned()], Origin::ConfigFile);
        assert_eq!(run_pipeline(&config, &tree.env()), Some(reason::INTERFACE));
    }

    #[test]
    fn interface_with_traffic_is_quiet() {
        let tree = FakeTree::new("iface-busy");
        tree.write("sys/class/net/eth0/statistics/rx_packets", "10\n");
        tree.write("sys/class/net/eth0/statistics/tx_packets", "0\n");
        let mut config = config();
        config
            .interfaces
            .set(vec!["eth0".to_owned()], Origin::ConfigFile);
        assert_eq!(run_pipeline(&config, &tree.env()), None);
    }
}

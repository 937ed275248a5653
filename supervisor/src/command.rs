//! Supervisor-command endpoint.
//!
//! One request line in, one reply out. Commands are case-sensitive;
//! surrounding whitespace is tolerated.

use log::{info, warn};

use crate::config::{parse_number, Config, Origin};

/// Follow-up the main loop must take after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
}

/// Handles one supervisor command and produces the reply text.
pub fn handle(config: &mut Config, request: &str) -> (String, Action) {
    let request = request.trim();
    match request {
        "DUMP PARMS" => (config.dump_parms(), Action::None),
        "DUMP OPTS" => {
            warn!("DUMP OPTS is deprecated, use DUMP PARMS");
            (config.dump_parms(), Action::None)
        }
        "HELP" => (help_text(), Action::None),
        "QUIT" => {
            info!("quit requested on the command endpoint");
            ("OK: QUIT".to_owned(), Action::Quit)
        }
        "PING ON" => {
            config.nwping.set(true, Origin::Runtime);
            ("OK: PING ON".to_owned(), Action::None)
        }
        "PING OFF" => {
            config.nwping.set(false, Origin::Runtime);
            ("OK: PING OFF".to_owned(), Action::None)
        }
        _ => {
            if let Some(name) = request.strip_prefix("GET ") {
                let name = name.trim();
                let reply = match config.get(name) {
                    Some(value) => format!("{name}={value}"),
                    None => String::new(),
                };
                return (reply, Action::None);
            }
            if let Some(level) = request.strip_prefix("SET VERBOSE ") {
                let level = level.trim();
                return match parse_number(level) {
                    Ok(parsed) => {
                        config.verbose.set(parsed, Origin::Runtime);
                        log::set_max_level(crate::level_filter(parsed));
                        info!("verbosity set to {parsed}");
                        (format!("OK: SET VERBOSE {level}"), Action::None)
                    }
                    Err(()) => (format!("unknown command: {request}"), Action::None),
                };
            }
            (format!("unknown command: {request}"), Action::None)
        }
    }
}

fn help_text() -> String {
    concat!(
        "Available commands:\n",
        "  DUMP PARMS         dump every parameter with value and origin\n",
        "  GET <name>         echo name=value for one parameter\n",
        "  PING ON|OFF        toggle the periodic board ping\n",
        "  SET VERBOSE <n>    update verbosity (decimal, 0x… or 0b…)\n",
        "  QUIT               terminate the supervisor\n",
    )
    .to_owned()
}

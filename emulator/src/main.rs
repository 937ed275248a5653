mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use session::Session;

fn main() -> io::Result<()> {
    let transcript = parse_transcript_arg().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: nanowatchdog-emulator [--transcript <path>]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(transcript)?;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.eq_ignore_ascii_case("exit") {
            break;
        }

        let reply = session.handle_line(trimmed)?;
        write!(writer, "{reply}")?;
        writer.flush()?;
    }

    Ok(())
}

fn parse_transcript_arg() -> Result<Option<PathBuf>, String> {
    let mut args = env::args().skip(1);
    match args.next() {
        None => Ok(None),
        Some(arg) => {
            if let Some(value) = arg.strip_prefix("--transcript=") {
                Ok(Some(PathBuf::from(value)))
            } else if arg == "--transcript" {
                args.next()
                    .map(|value| Some(PathBuf::from(value)))
                    .ok_or_else(|| "Expected value after --transcript".to_string())
            } else {
                Err(format!("Unknown argument {arg:?}"))
            }
        }
    }
}

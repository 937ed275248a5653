//! TCP listener plumbing.
//!
//! Both operator endpoints are non-blocking listeners serviced from the
//! single-threaded main loop: at most one pending connection per endpoint
//! per iteration, each a single-shot line exchange. The accepted socket is
//! switched back to blocking with a short read timeout so a stalled client
//! cannot hold the loop for long.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::config::Config;

/// Upper bound on one request; longer requests are truncated.
pub const MAX_REQUEST_BYTES: usize = 4096;

/// Patience for a connected client to finish its line.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// The two operator endpoints.
pub struct Listeners {
    /// Forwards request lines verbatim to the board.
    pub board: TcpListener,
    /// Interprets supervisor-local commands.
    pub command: TcpListener,
}

impl Listeners {
    pub fn bind(config: &Config) -> Result<Self> {
        let ip = config.ip.get();
        let board = bind_one(ip, config.port_serial.value())?;
        let command = bind_one(ip, config.port_daemon.value())?;
        Ok(Self { board, command })
    }
}

fn bind_one(ip: &str, port: u16) -> Result<TcpListener> {
    let listener = TcpListener::bind((ip, port))
        .with_context(|| format!("cannot bind listener on {ip}:{port}"))?;
    listener
        .set_nonblocking(true)
        .context("cannot make listener non-blocking")?;
    Ok(listener)
}

/// Accepts at most one pending connection. `None` when no client is waiting
/// or the accept failed (failures are logged; the listener stays open).
pub fn accept_one(listener: &TcpListener) -> Option<TcpStream> {
    match listener.accept() {
        Ok((stream, peer)) => {
            debug!("accepted connection from {peer}");
            Some(stream)
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => None,
        Err(err) => {
            warn!("accept failed: {err}");
            None
        }
    }
}

/// Reads one request line from a fresh connection.
///
/// Collects until a newline, EOF, [`MAX_REQUEST_BYTES`], or the client read
/// timeout, whichever comes first. Only the line terminator is stripped:
/// the board endpoint forwards the payload verbatim.
pub fn read_request(stream: &mut TcpStream) -> io::Result<String> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT))?;

    let mut buffer = Vec::new();
    let mut chunk = [0u8; 512];
    while buffer.len() < MAX_REQUEST_BYTES {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                break
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    buffer.truncate(MAX_REQUEST_BYTES);
    if let Some(end) = buffer.iter().position(|&b| b == b'\n') {
        buffer.truncate(end);
    }
    if buffer.last() == Some(&b'\r') {
        buffer.pop();
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Writes the reply and half-closes the connection.
pub fn send_reply(stream: &mut TcpStream, reply: &str) -> io::Result<()> {
    stream.write_all(reply.as_bytes())?;
    if !reply.ends_with('\n') {
        stream.write_all(b"\n")?;
    }
    stream.flush()?;
    stream.shutdown(Shutdown::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream as ClientStream;

    fn local_listener() -> TcpListener {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        listener.set_nonblocking(true).unwrap();
        listener
    }

    #[test]
    fn accept_returns_none_without_clients() {
        let listener = local_listener();
        assert!(accept_one(&listener).is_none());
    }

    #[test]
    fn request_is_read_up_to_the_newline() {
        let listener = local_listener();
        let addr = listener.local_addr().unwrap();
        let mut client = ClientStream::connect(addr).unwrap();
        client.write_all(b"  DUMP PARMS  \ntrailing garbage").unwrap();

        let mut stream = loop {
            if let Some(stream) = accept_one(&listener) {
                break stream;
            }
        };
        let request = read_request(&mut stream).unwrap();
        assert_eq!(request, "  DUMP PARMS  ");
    }

    #[test]
    fn oversized_requests_are_truncated() {
        let listener = local_listener();
        let addr = listener.local_addr().unwrap();
        let mut client = ClientStream::connect(addr).unwrap();
        let big = vec![b'A'; MAX_REQUEST_BYTES * 2];
        client.write_all(&big).unwrap();
        client.shutdown(Shutdown::Write).unwrap();

        let mut stream = loop {
            if let Some(stream) = accept_one(&listener) {
                break stream;
            }
        };
        let request = read_request(&mut stream).unwrap();
        assert_eq!(request.len(), MAX_REQUEST_BYTES);
    }

    #[test]
    fn reply_reaches_the_client() {
        let listener = local_listener();
        let addr = listener.local_addr().unwrap();
        let mut client = ClientStream::connect(addr).unwrap();
        client.write_all(b"HELP\n").unwrap();

        let mut stream = loop {
            if let Some(stream) = accept_one(&listener) {
                break stream;
            }
        };
        let _ = read_request(&mut stream).unwrap();
        send_reply(&mut stream, "OK: HELP").unwrap();

        let mut reply = String::new();
        client.read_to_string(&mut reply).unwrap();
        assert_eq!(reply, "OK: HELP\n");
    }
}

//! Reset event records and their fixed serialized layout.
//!
//! Every reset the board performs is remembered as a 37-byte record in
//! non-volatile memory: the firmware version that wrote it, the epoch second
//! it happened, and a packed acknowledgement/reason byte. The layout is fixed
//! so that stores written by earlier firmware revisions stay readable.

use core::fmt;

/// Size of the version field inside a serialized event, padding included.
pub const VERSION_BYTES: usize = 32;

/// Serialized size of one event record: version, time (LE), packed ack/reason.
pub const EVENT_BYTES: usize = VERSION_BYTES + 4 + 1;

/// Version string stamped into events written by this firmware build.
pub const VERSION_STRING: &str = concat!("NanoWatchdog v", env!("CARGO_PKG_VERSION"));

/// Reason codes carried by reset events.
///
/// Codes 0..=15 are reserved for the board itself; 16..=127 identify the
/// external caller that requested the reset. The packed on-wire byte keeps
/// the acknowledgement flag in bit 7, which caps reasons at 127.
pub mod reason {
    /// Store initialization marker.
    pub const INIT: u8 = 0;
    /// The host missed its ping window.
    pub const NO_PING: u8 = 1;
    /// First code available to external callers.
    pub const COMMAND_START: u8 = 16;
    pub const MAX_LOAD_1: u8 = 16;
    pub const MAX_LOAD_5: u8 = 17;
    pub const MAX_LOAD_15: u8 = 18;
    pub const MIN_MEMORY: u8 = 19;
    pub const MAX_TEMPERATURE: u8 = 20;
    pub const PIDFILE: u8 = 21;
    pub const PING: u8 = 22;
    pub const INTERFACE: u8 = 23;
    /// Largest encodable reason code.
    pub const MAX: u8 = 127;

    /// Human-readable label for a reason code.
    pub fn label(code: u8) -> &'static str {
        match code {
            INIT => "initialization",
            NO_PING => "no ping",
            COMMAND_START..=MAX => "external command",
            _ => "unknown reason code",
        }
    }
}

/// One persisted reset event.
///
/// A record with `time == 0` is "null": the slot it was read from has never
/// been written since the last store initialization.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ResetEvent {
    version: [u8; VERSION_BYTES],
    time: u32,
    reason: u8,
    ack: bool,
}

impl ResetEvent {
    /// Builds a fresh, unacknowledged event stamped with [`VERSION_STRING`].
    pub fn new(reason: u8, time: u32) -> Self {
        let mut version = [0u8; VERSION_BYTES];
        let src = VERSION_STRING.as_bytes();
        let len = src.len().min(VERSION_BYTES - 1);
        version[..len].copy_from_slice(&src[..len]);
        Self {
            version,
            time,
            reason: reason & 0x7f,
            ack: false,
        }
    }

    /// The null event, as read from an erased slot.
    pub const fn null() -> Self {
        Self {
            version: [0u8; VERSION_BYTES],
            time: 0,
            reason: 0,
            ack: false,
        }
    }

    /// Returns `true` when this record has never been written.
    pub const fn is_null(&self) -> bool {
        self.time == 0
    }

    /// Epoch second the event was recorded at.
    pub const fn time(&self) -> u32 {
        self.time
    }

    /// Reason code, 0..=127.
    pub const fn reason(&self) -> u8 {
        self.reason
    }

    /// Whether an operator has acknowledged the event.
    pub const fn is_acknowledged(&self) -> bool {
        self.ack
    }

    /// Sets the acknowledgement flag.
    pub fn acknowledge(&mut self, ack: bool) {
        self.ack = ack;
    }

    /// Version string of the firmware that wrote the record, padding trimmed.
    pub fn version_str(&self) -> &str {
        let end = self
            .version
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(VERSION_BYTES);
        core::str::from_utf8(&self.version[..end]).unwrap_or("")
    }

    /// Serializes the record into its fixed 37-byte layout.
    pub fn to_bytes(&self) -> [u8; EVENT_BYTES] {
        let mut bytes = [0u8; EVENT_BYTES];
        bytes[..VERSION_BYTES].copy_from_slice(&self.version);
        bytes[VERSION_BYTES..VERSION_BYTES + 4].copy_from_slice(&self.time.to_le_bytes());
        bytes[EVENT_BYTES - 1] = (self.reason & 0x7f) | if self.ack { 0x80 } else { 0 };
        bytes
    }

    /// Reconstructs a record from its serialized layout.
    pub fn from_bytes(bytes: &[u8; EVENT_BYTES]) -> Self {
        let mut version = [0u8; VERSION_BYTES];
        version.copy_from_slice(&bytes[..VERSION_BYTES]);
        let mut time = [0u8; 4];
        time.copy_from_slice(&bytes[VERSION_BYTES..VERSION_BYTES + 4]);
        let packed = bytes[EVENT_BYTES - 1];
        Self {
            version,
            time: u32::from_le_bytes(time),
            reason: packed & 0x7f,
            ack: packed & 0x80 != 0,
        }
    }

    /// Writes the event as indented report lines, one field per line.
    ///
    /// The `reason:` and `acknowledged:` labels are parsed by the host
    /// supervisor and must not change.
    pub fn write_report<W: fmt::Write>(&self, out: &mut W, prefix: &str) -> fmt::Result {
        writeln!(out, "{prefix}version: {}", self.version_str())?;
        write!(out, "{prefix}date: ")?;
        crate::board::status::write_datetime(out, self.time)?;
        writeln!(out)?;
        writeln!(
            out,
            "{prefix}reason: {} ({})",
            self.reason,
            reason::label(self.reason)
        )?;
        writeln!(
            out,
            "{prefix}acknowledged: {}",
            if self.ack { "yes" } else { "no" }
        )
    }
}

impl fmt::Debug for ResetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetEvent")
            .field("version", &self.version_str())
            .field("time", &self.time)
            .field("reason", &self.reason)
            .field("ack", &self.ack)
            .finish()
    }
}

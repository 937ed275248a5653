//! Non-volatile event store.
//!
//! The board keeps its reset history in a 1 KiB non-volatile region with a
//! fixed layout:
//!
//! | offset | size | content |
//! |--------|------|---------|
//! | 0      | 37   | store initialization event |
//! | 37     | 2    | count of stored reset events, LE |
//! | 39     | 370  | ten reset events, slot 0 most recent |
//! | 409    | ..   | unused |
//!
//! Inserting a new reset event shifts the existing records toward the older
//! slots; once ten are present the oldest one falls off and the counter
//! saturates. The shift keeps the on-wire layout identical to stores written
//! by earlier firmware, so upgrades do not lose history.

use crate::event::{reason, ResetEvent, EVENT_BYTES};

/// Size of the non-volatile region the store manages.
pub const NVM_BYTES: usize = 1024;

/// Offset of the initialization event.
pub const INIT_EVENT_OFFSET: usize = 0;

/// Offset of the reset event counter (16-bit little-endian).
pub const RESET_COUNT_OFFSET: usize = INIT_EVENT_OFFSET + EVENT_BYTES;

/// Offset of the first (most recent) reset event slot.
pub const RESET_RING_OFFSET: usize = RESET_COUNT_OFFSET + 2;

/// Number of reset events retained.
pub const MAX_RESET_EVENTS: usize = 10;

/// Byte-addressed non-volatile memory.
///
/// Implementations are infallible: EEPROM-style parts either answer or the
/// board is beyond help anyway. `offset + buf.len()` never exceeds
/// [`NVM_BYTES`] when called from [`EventStore`].
pub trait NonVolatileMemory {
    fn read(&self, offset: usize, buf: &mut [u8]);
    fn write(&mut self, offset: usize, data: &[u8]);
}

/// RAM-backed memory for the emulator and tests.
#[derive(Clone)]
pub struct RamNvm {
    bytes: [u8; NVM_BYTES],
}

impl RamNvm {
    pub const fn new() -> Self {
        Self {
            bytes: [0u8; NVM_BYTES],
        }
    }

    /// Raw view of the backing bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for RamNvm {
    fn default() -> Self {
        Self::new()
    }
}

impl NonVolatileMemory for RamNvm {
    fn read(&self, offset: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }
}

/// Event store over a non-volatile memory.
pub struct EventStore<M> {
    nvm: M,
}

impl<M: NonVolatileMemory> EventStore<M> {
    pub fn new(nvm: M) -> Self {
        Self { nvm }
    }

    /// Access to the underlying memory.
    pub fn nvm(&self) -> &M {
        &self.nvm
    }

    /// Reads the initialization event.
    pub fn init_event(&self) -> ResetEvent {
        self.read_event(INIT_EVENT_OFFSET)
    }

    /// Writes the initialization event.
    pub fn set_init_event(&mut self, event: &ResetEvent) {
        self.write_event(event, INIT_EVENT_OFFSET);
    }

    /// Count of stored reset events, clamped to the ring size.
    pub fn reset_count(&self) -> usize {
        let mut raw = [0u8; 2];
        self.nvm.read(RESET_COUNT_OFFSET, &mut raw);
        let count = i16::from_le_bytes(raw);
        if count < 0 {
            0
        } else {
            (count as usize).min(MAX_RESET_EVENTS)
        }
    }

    /// Reads the reset event in `slot` (0 = most recent, 9 = oldest).
    pub fn reset_event(&self, slot: usize) -> ResetEvent {
        debug_assert!(slot < MAX_RESET_EVENTS);
        self.read_event(RESET_RING_OFFSET + slot * EVENT_BYTES)
    }

    /// Overwrites the reset event in `slot` in place.
    pub fn set_reset_event(&mut self, event: &ResetEvent, slot: usize) {
        debug_assert!(slot < MAX_RESET_EVENTS);
        self.write_event(event, RESET_RING_OFFSET + slot * EVENT_BYTES);
    }

    /// Inserts `event` as the most recent reset event.
    ///
    /// Existing records shift one slot toward the old end; with the ring full
    /// the oldest record is discarded and the counter stays at ten.
    pub fn push_reset_event(&mut self, event: &ResetEvent) {
        let mut count = self.reset_count();
        if count == MAX_RESET_EVENTS {
            count -= 1;
        }
        for slot in (1..=count).rev() {
            let shifted = self.reset_event(slot - 1);
            self.set_reset_event(&shifted, slot);
        }
        self.set_reset_event(event, 0);
        let count = (count + 1) as i16;
        self.nvm.write(RESET_COUNT_OFFSET, &count.to_le_bytes());
    }

    /// Erases the whole region and stamps a fresh initialization event.
    ///
    /// Every ring slot reads as null afterwards; the initialization event is
    /// written with reason 0 and the acknowledgement flag already set.
    pub fn erase(&mut self, now: u32) {
        let zero = [0u8; 32];
        let mut offset = 0;
        while offset < NVM_BYTES {
            let len = zero.len().min(NVM_BYTES - offset);
            self.nvm.write(offset, &zero[..len]);
            offset += len;
        }
        let mut init = ResetEvent::new(reason::INIT, now);
        init.acknowledge(true);
        self.set_init_event(&init);
    }

    fn read_event(&self, offset: usize) -> ResetEvent {
        let mut bytes = [0u8; EVENT_BYTES];
        self.nvm.read(offset, &mut bytes);
        ResetEvent::from_bytes(&bytes)
    }

    fn write_event(&mut self, event: &ResetEvent, offset: usize) {
        self.nvm.write(offset, &event.to_bytes());
    }
}

//! AT24-style I2C EEPROM behind the non-volatile memory seam.
//!
//! The reference board carries a 1 KiB serial EEPROM with two-byte word
//! addressing and 32-byte write pages. Reads and writes are blocking; the
//! part answers in a handful of milliseconds and the board has nothing
//! better to do while its event store is being updated.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;

use watchdog_core::store::NonVolatileMemory;

/// Seven-bit bus address of the EEPROM.
const DEVICE_ADDR: u8 = 0x50;

/// Write page size of the part.
const PAGE_SIZE: usize = 32;

/// Write-cycle polling budget. The datasheet promises completion in 5 ms;
/// each poll costs one addressing attempt on a 100 kHz bus.
const ACK_POLL_ATTEMPTS: usize = 100;

pub struct Eeprom<B> {
    // The memory seam reads through `&self`; the bus transaction needs
    // exclusive access.
    bus: RefCell<B>,
}

impl<B: I2c> Eeprom<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus: RefCell::new(bus),
        }
    }

    /// Blocks until the part acknowledges its address again after a write.
    fn wait_write_cycle(&self, bus: &mut B) {
        for _ in 0..ACK_POLL_ATTEMPTS {
            if bus.write(DEVICE_ADDR, &[]).is_ok() {
                return;
            }
        }
    }
}

impl<B: I2c> NonVolatileMemory for Eeprom<B> {
    fn read(&self, offset: usize, buf: &mut [u8]) {
        let mut bus = self.bus.borrow_mut();
        let address = [(offset >> 8) as u8, offset as u8];
        if bus.write_read(DEVICE_ADDR, &address, buf).is_err() {
            // An unreadable slot reports as null rather than stale garbage.
            buf.fill(0);
        }
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        let mut bus = self.bus.borrow_mut();
        let mut offset = offset;
        let mut remaining = data;
        while !remaining.is_empty() {
            let span = (PAGE_SIZE - offset % PAGE_SIZE).min(remaining.len());
            let mut frame = [0u8; 2 + PAGE_SIZE];
            frame[0] = (offset >> 8) as u8;
            frame[1] = offset as u8;
            frame[2..2 + span].copy_from_slice(&remaining[..span]);
            let _ = bus.write(DEVICE_ADDR, &frame[..2 + span]);
            self.wait_write_cycle(&mut bus);
            offset += span;
            remaining = &remaining[span..];
        }
    }
}

#![allow(dead_code)]

use core::ptr::{read_volatile, write_volatile};

/* Raw I/O window access for the ARM920T side of the MMSP2. */

// The I/O window is mapped uncached and unbuffered by the boot page table,
// so plain volatile accesses are ordered with respect to the device.
pub fn put_u8(address: usize, value: u8) {
    unsafe { write_volatile(address as *mut u8, value) }
}

pub fn get_u8(address: usize) -> u8 {
    unsafe { read_volatile(address as *const u8) }
}

pub fn put_u16(address: usize, value: u16) {
    unsafe { write_volatile(address as *mut u16, value) }
}

pub fn get_u16(address: usize) -> u16 {
    unsafe { read_volatile(address as *const u16) }
}

pub fn get_u32(address: usize) -> u32 {
    unsafe { read_volatile(address as *const u32) }
}

pub mod addr {
    pub const IO_BASE: usize = 0xC000_0000;
    // Free-running timer, one tick every 135 ns.
    pub const TCOUNT: usize = IO_BASE + 0x0A00;
    // GPIO pin level registers (offsets inside the I/O window).
    pub const GPIOAPINLVL: usize = 0x1180;
    pub const GPIOIPINLVL: usize = GPIOAPINLVL + 8 * 2;
    // SD card-detect switch on GPIO I14, pulled up, low while a card sits in the slot.
    pub const SD_DETECT_PIN: u16 = 1 << 14;
}

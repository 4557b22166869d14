pub mod intrinsic;

use crate::driver::{Instant, RegisterBus, Timer};
use intrinsic::addr::{IO_BASE, TCOUNT};
use intrinsic::{get_u16, get_u32, get_u8, put_u16, put_u8};

/// The memory-mapped I/O window of the MMSP2.
///
/// Offsets handed to the [`RegisterBus`] methods are relative to
/// [`IO_BASE`].
pub struct Mmsp2Io;

impl RegisterBus for Mmsp2Io {
    fn read_u8(&mut self, offset: usize) -> u8 {
        get_u8(IO_BASE + offset)
    }

    fn write_u8(&mut self, offset: usize, value: u8) {
        put_u8(IO_BASE + offset, value)
    }

    fn read_u16(&mut self, offset: usize) -> u16 {
        get_u16(IO_BASE + offset)
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        put_u16(IO_BASE + offset, value)
    }
}

/// The 32-bit system timer counter.
pub struct Mmsp2Timer;

impl Timer for Mmsp2Timer {
    fn now(&self) -> Instant {
        Instant::from_ticks(get_u32(TCOUNT))
    }
}

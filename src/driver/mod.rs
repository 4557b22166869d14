pub mod disc_io;
pub mod sd;
pub mod timer;

pub use timer::{Instant, Timer};

/// Raw register access over a memory-mapped I/O window.
///
/// Offsets are relative to the start of the window. Implementations own the
/// window exclusively; nothing here is reentrant.
pub trait RegisterBus {
    fn read_u8(&mut self, offset: usize) -> u8;
    fn write_u8(&mut self, offset: usize, value: u8);
    fn read_u16(&mut self, offset: usize) -> u16;
    fn write_u16(&mut self, offset: usize, value: u16);

    fn set_bits_u16(&mut self, offset: usize, bits: u16) {
        let value = self.read_u16(offset);
        self.write_u16(offset, value | bits);
    }
}

/// A sector-addressed storage medium as seen by a filesystem layer.
///
/// Sectors are always 512 bytes at this boundary. Every method collapses
/// failure detail to `false`.
pub trait BlockDevice {
    fn startup(&mut self) -> bool;
    fn is_inserted(&mut self) -> bool;
    fn read_sectors(&mut self, sector: u32, count: u32, buf: &mut [u8]) -> bool;
    fn write_sectors(&mut self, sector: u32, count: u32, buf: &[u8]) -> bool;
    fn clear_status(&mut self) -> bool;
    fn shutdown(&mut self) -> bool;
}

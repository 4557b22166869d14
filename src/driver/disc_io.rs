//! Disc interface consumed by the filesystem layer.
//!
//! The table holds plain function pointers so it can be handed across to
//! code that knows nothing about the driver types behind it.

use log::{debug, warn};
use paste::paste;
use spin::Mutex;

use crate::arm920::{Mmsp2Io, Mmsp2Timer};
use crate::driver::sd::SdCard;
use crate::driver::{BlockDevice, RegisterBus, Timer};

pub const FEATURE_MEDIUM_CANREAD: u32 = 0x0000_0001;
pub const FEATURE_MEDIUM_CANWRITE: u32 = 0x0000_0002;

pub const DEVICE_TYPE_GP2X_SD: u32 = u32::from_le_bytes(*b"GPSD");

pub struct DiscInterface {
    pub io_type: u32,
    pub features: u32,
    pub startup: fn() -> bool,
    pub is_inserted: fn() -> bool,
    pub read_sectors: fn(u32, u32, &mut [u8]) -> bool,
    pub write_sectors: fn(u32, u32, &[u8]) -> bool,
    pub clear_status: fn() -> bool,
    pub shutdown: fn() -> bool,
}

impl<B: RegisterBus, T: Timer> BlockDevice for SdCard<B, T> {
    fn startup(&mut self) -> bool {
        if !SdCard::is_inserted(self) {
            debug!("sd: startup with empty slot");
            return false;
        }
        self.negotiate().is_ok()
    }

    fn is_inserted(&mut self) -> bool {
        SdCard::is_inserted(self)
    }

    fn read_sectors(&mut self, sector: u32, count: u32, buf: &mut [u8]) -> bool {
        let Ok(count) = u16::try_from(count) else {
            return false;
        };
        match self.read_blocks(sector, count, buf) {
            Ok(()) => true,
            Err(e) => {
                warn!("sd: read of {} sectors at {} failed: {}", count, sector, e);
                false
            }
        }
    }

    fn write_sectors(&mut self, sector: u32, count: u32, buf: &[u8]) -> bool {
        let Ok(count) = u16::try_from(count) else {
            return false;
        };
        match self.write_blocks(sector, count, buf) {
            Ok(()) => true,
            Err(e) => {
                warn!("sd: write of {} sectors at {} failed: {}", count, sector, e);
                false
            }
        }
    }

    // No error latch is kept, so there is nothing to clear.
    fn clear_status(&mut self) -> bool {
        true
    }

    fn shutdown(&mut self) -> bool {
        true
    }
}

static SD_DRIVER: Mutex<SdCard<Mmsp2Io, Mmsp2Timer>> = Mutex::new(SdCard::new(Mmsp2Io, Mmsp2Timer));

macro_rules! define_disc_fn {
    ($name:ident ( $($arg:ident : $ty:ty),* )) => {
        paste! {
            fn [<gp2xsd_ $name>]($($arg: $ty),*) -> bool {
                BlockDevice::$name(&mut *SD_DRIVER.lock(), $($arg),*)
            }
        }
    };
}

define_disc_fn!(startup());
define_disc_fn!(is_inserted());
define_disc_fn!(read_sectors(sector: u32, count: u32, buf: &mut [u8]));
define_disc_fn!(write_sectors(sector: u32, count: u32, buf: &[u8]));
define_disc_fn!(clear_status());
define_disc_fn!(shutdown());

static IO_GP2XSD: DiscInterface = DiscInterface {
    io_type: DEVICE_TYPE_GP2X_SD,
    features: FEATURE_MEDIUM_CANREAD | FEATURE_MEDIUM_CANWRITE,
    startup: gp2xsd_startup,
    is_inserted: gp2xsd_is_inserted,
    read_sectors: gp2xsd_read_sectors,
    write_sectors: gp2xsd_write_sectors,
    clear_status: gp2xsd_clear_status,
    shutdown: gp2xsd_shutdown,
};

/// The disc interface for the SD slot.
pub fn get_io_gp2xsd() -> &'static DiscInterface {
    &IO_GP2XSD
}

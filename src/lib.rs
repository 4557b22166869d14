#![cfg_attr(not(test), no_std)]

//! Orcus: bare-metal support library for the MMSP2 (GP2X) SoC.
//!
//! This crate carries the SD/MMC card controller driver and the disc
//! interface table a filesystem layer links against.

pub mod arm920;
pub mod common;
pub mod driver;

#[cfg(test)]
mod tests;

pub use driver::disc_io::{get_io_gp2xsd, DiscInterface};
pub use driver::sd::{CardSession, CardType, NegotiationError, SdCard, SdConfig, TransferError};
pub use driver::{BlockDevice, Instant, RegisterBus, Timer};

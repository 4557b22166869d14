//! SD/MMC card driver for the MMSP2 SDI controller.
//!
//! Everything is polled: commands wait on the status register, data moves a
//! byte at a time through the FIFO. See [`SdCard::negotiate`] for card
//! bring-up and [`SdCard::read_blocks`] / [`SdCard::write_blocks`] for data
//! transfer.

mod cmd;
mod csd;
pub mod defs;
mod init;
mod rw;

use core::fmt;

use crate::arm920::intrinsic::addr::{GPIOIPINLVL, SD_DETECT_PIN};
use crate::driver::{RegisterBus, Timer};
use defs::*;

pub use cmd::{CommandDescriptor, CommandOutcome, Response};
pub use csd::{parse_capacity, CapacityDescriptor};
pub use rw::Direction;

/// Hardware-observed tuning values. Most callers want [`SdConfig::DEFAULT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdConfig {
    pub setup_clock_hz: u32,
    pub sd_clock_hz: u32,
    pub mmc_clock_hz: u32,
    pub reset_attempts: u32,
    pub ready_attempts: u32,
    pub mmc_op_cond_attempts: u32,
    pub ready_delay_ns: u64,
    pub transfer_attempts: u32,
    pub fifo_timeout_ns: u64,
    pub data_finish_timeout_ns: u64,
    /// Card status bit that flags a command the card did not expect.
    pub illegal_command_mask: u32,
}

impl SdConfig {
    pub const DEFAULT: SdConfig = SdConfig {
        setup_clock_hz: FREQ_SETUP,
        sd_clock_hz: FREQ_SD,
        mmc_clock_hz: FREQ_MMC,
        reset_attempts: RESET_ATTEMPTS,
        ready_attempts: READY_ATTEMPTS,
        mmc_op_cond_attempts: MMC_OP_COND_ATTEMPTS,
        ready_delay_ns: READY_DELAY_NS,
        transfer_attempts: TRANSFER_ATTEMPTS,
        fifo_timeout_ns: FIFO_TIMEOUT_NS,
        data_finish_timeout_ns: DATA_FINISH_TIMEOUT_NS,
        illegal_command_mask: R1_ILLEGAL_COMMAND,
    };
}

impl Default for SdConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    /// SD v1 or SD v2 standard capacity: byte addressed.
    SdLegacy,
    /// SDHC/SDXC: block addressed.
    SdHcXc,
    /// MMC: byte addressed, slower bus clock.
    Mmc,
}

impl CardType {
    pub fn is_block_addressed(self) -> bool {
        self == CardType::SdHcXc
    }
}

/// What the last successful negotiation learned about the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardSession {
    pub inserted: bool,
    pub card_type: CardType,
    pub relative_address: u16,
    /// -1 while unknown.
    pub capacity_kb: i32,
}

impl CardSession {
    pub const fn new() -> Self {
        Self {
            inserted: false,
            card_type: CardType::SdLegacy,
            relative_address: 0,
            capacity_kb: -1,
        }
    }
}

impl Default for CardSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Negotiation failure, one per stage. [`NegotiationError::code`] gives the
/// numeric form used in diagnostics.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationError {
    ResetExhausted = 1,
    NoCompatibleCard = 2,
    ReadyTimeout = 3,
    BadDescriptor = 4,
    SelectFailed = 5,
}

impl NegotiationError {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            NegotiationError::ResetExhausted => "card never acknowledged reset",
            NegotiationError::NoCompatibleCard => "no compatible SD or MMC card",
            NegotiationError::ReadyTimeout => "card never finished power-up",
            NegotiationError::BadDescriptor => "unusable card-specific data",
            NegotiationError::SelectFailed => "card select failed",
        };
        write!(f, "negotiation error {}: {}", self.code(), stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// No card has been negotiated.
    NoCard,
    /// Buffer length is not `count * 512`.
    BufferSize,
    /// More blocks than the controller's block counter holds.
    TooManyBlocks,
    /// The start byte address does not fit the 32-bit argument.
    AddressOverflow,
    /// The block command kept failing until the attempt budget ran out.
    CommandFailed,
    /// STOP_TRANSMISSION was not accepted.
    StopFailed,
    /// Re-negotiation after an illegal command failed.
    CardLost(NegotiationError),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::NoCard => write!(f, "no card negotiated"),
            TransferError::BufferSize => write!(f, "buffer length does not match block count"),
            TransferError::TooManyBlocks => write!(f, "block count exceeds {}", MAX_BLOCKS_PER_TRANSFER),
            TransferError::AddressOverflow => write!(f, "start address out of range"),
            TransferError::CommandFailed => write!(f, "block command failed after retries"),
            TransferError::StopFailed => write!(f, "stop transmission failed"),
            TransferError::CardLost(e) => write!(f, "card lost: {}", e),
        }
    }
}

/// Driver for one card slot. Owns the register window and the timer.
pub struct SdCard<B: RegisterBus, T: Timer> {
    bus: B,
    timer: T,
    config: SdConfig,
    session: CardSession,
}

impl<B: RegisterBus, T: Timer> SdCard<B, T> {
    pub const fn new(bus: B, timer: T) -> Self {
        Self::with_config(bus, timer, SdConfig::DEFAULT)
    }

    pub const fn with_config(bus: B, timer: T, config: SdConfig) -> Self {
        Self {
            bus,
            timer,
            config,
            session: CardSession::new(),
        }
    }

    /// Reads the card-detect switch. Does not look at the session.
    pub fn is_inserted(&mut self) -> bool {
        self.bus.read_u16(GPIOIPINLVL) & SD_DETECT_PIN == 0
    }

    pub fn capacity_kb(&self) -> Option<i32> {
        if self.session.inserted {
            Some(self.session.capacity_kb)
        } else {
            None
        }
    }

    pub fn session(&self) -> &CardSession {
        &self.session
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    fn set_clock(&mut self, hz: u32) {
        self.bus.write_u16(SDIPRE, prescaler_for(hz));
        self.timer.delay_ns(CLOCK_SETTLE_NS);
    }
}

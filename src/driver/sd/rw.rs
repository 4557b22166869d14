use log::{debug, warn};

use super::cmd::CommandDescriptor;
use super::defs::*;
use super::{SdCard, TransferError};
use crate::common::{retry, Attempt};
use crate::driver::timer::ticks_from_ns;
use crate::driver::{RegisterBus, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

enum DataBuf<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl DataBuf<'_> {
    fn direction(&self) -> Direction {
        match self {
            DataBuf::Read(_) => Direction::Read,
            DataBuf::Write(_) => Direction::Write,
        }
    }

    fn len(&self) -> usize {
        match self {
            DataBuf::Read(buf) => buf.len(),
            DataBuf::Write(buf) => buf.len(),
        }
    }
}

/// One multi-block transfer; the buffer is borrowed for the call only.
struct TransferRequest<'a> {
    start_block: u32,
    block_count: u16,
    data: DataBuf<'a>,
}

type AttemptResult = Result<(), Attempt<TransferError>>;

impl<B: RegisterBus, T: Timer> SdCard<B, T> {
    /// Reads `count` 512-byte blocks starting at block `start` into `dest`.
    pub fn read_blocks(&mut self, start: u32, count: u16, dest: &mut [u8]) -> Result<(), TransferError> {
        self.transfer(TransferRequest {
            start_block: start,
            block_count: count,
            data: DataBuf::Read(dest),
        })
    }

    /// Writes `count` 512-byte blocks from `src` starting at block `start`.
    pub fn write_blocks(&mut self, start: u32, count: u16, src: &[u8]) -> Result<(), TransferError> {
        self.transfer(TransferRequest {
            start_block: start,
            block_count: count,
            data: DataBuf::Write(src),
        })
    }

    fn transfer(&mut self, mut req: TransferRequest<'_>) -> Result<(), TransferError> {
        if req.data.len() != req.block_count as usize * BLOCK_SIZE {
            return Err(TransferError::BufferSize);
        }
        if req.block_count == 0 {
            return Ok(());
        }
        if req.block_count > MAX_BLOCKS_PER_TRANSFER {
            return Err(TransferError::TooManyBlocks);
        }
        if !self.session.inserted {
            return Err(TransferError::NoCard);
        }

        let attempts = self.config.transfer_attempts;
        retry(attempts, |attempt| {
            if attempt > 0 {
                debug!("sd: retrying {:?} at block {}, attempt {}", req.data.direction(), req.start_block, attempt + 1);
            }
            self.transfer_attempt(&mut req)
        })
        .map_err(|e| e.or_exhausted(TransferError::CommandFailed))
    }

    fn transfer_attempt(&mut self, req: &mut TransferRequest<'_>) -> AttemptResult {
        let direction = req.data.direction();
        let arg = self.block_address(req.start_block)?;
        self.program_data_path(req.block_count, direction);

        let index = match direction {
            Direction::Read => CMD_READ_MULTI,
            Direction::Write => CMD_WRITE_MULTI,
        };
        if !self.issue_command(CommandDescriptor::short(index, arg)).is_ok() {
            debug!("sd: CMD{} {:#x} not accepted", index, arg);
            self.idle_data_path();
            self.recover_from_command_failure()?;
            return Err(Attempt::Retry);
        }

        if !self.move_bytes(&mut req.data) {
            warn!("sd: FIFO stalled during {:?}, restarting", direction);
            self.abort_transfer();
            return Err(Attempt::Retry);
        }

        let finish = ticks_from_ns(self.config.data_finish_timeout_ns);
        if !self.wait_for_bits(SDIDATSTA, DATSTA_FINISHED, finish) {
            warn!("sd: data path never finished, restarting");
            self.abort_transfer();
            return Err(Attempt::Retry);
        }

        self.stop_transfer()
    }

    /// Block index for high-capacity cards, byte offset for everything else.
    fn block_address(&self, block: u32) -> Result<u32, Attempt<TransferError>> {
        if self.session.card_type.is_block_addressed() {
            Ok(block)
        } else {
            block
                .checked_mul(BLOCK_SIZE as u32)
                .ok_or(Attempt::Fatal(TransferError::AddressOverflow))
        }
    }

    /// A rejected block command may mean the card lost track of the
    /// protocol state; if it says so, start over from reset.
    fn recover_from_command_failure(&mut self) -> AttemptResult {
        let illegal = self.config.illegal_command_mask;
        match self.card_status() {
            Some(status) if status & illegal != 0 => {
                warn!("sd: card reports illegal command (status {:#010x}), renegotiating", status);
                self.negotiate().map_err(|e| Attempt::Fatal(TransferError::CardLost(e)))
            }
            _ => Ok(()),
        }
    }

    fn program_data_path(&mut self, count: u16, direction: Direction) {
        let (mode, high) = match direction {
            Direction::Read => (DATCONL_MODE_RX, DATCONH_READ),
            Direction::Write => (DATCONL_MODE_TX, DATCONH_WRITE),
        };
        self.bus.write_u16(SDIDATSTA, DATSTA_CLEAR);
        self.bus.write_u16(SDIDATCONL, mode | (count & DATCONL_BLKNUM_MASK));
        self.bus.write_u16(SDIDATCONH, high);
        self.bus.set_bits_u16(SDICON, SDICON_FIFO_RESET);
    }

    fn move_bytes(&mut self, data: &mut DataBuf<'_>) -> bool {
        let timeout = ticks_from_ns(self.config.fifo_timeout_ns);
        match data {
            DataBuf::Read(dest) => {
                for byte in dest.iter_mut() {
                    if !self.wait_for_bits(SDIFSTA, FSTA_RX_AVAILABLE, timeout) {
                        return false;
                    }
                    *byte = self.bus.read_u8(SDIDAT);
                }
            }
            DataBuf::Write(src) => {
                for &byte in src.iter() {
                    if !self.wait_for_bits(SDIFSTA, FSTA_TX_AVAILABLE, timeout) {
                        return false;
                    }
                    self.bus.write_u8(SDIDAT, byte);
                }
            }
        }
        true
    }

    fn wait_for_bits(&mut self, reg: usize, bits: u16, timeout_ticks: u32) -> bool {
        let start = self.timer.now();
        loop {
            if self.bus.read_u16(reg) & bits != 0 {
                return true;
            }
            if self.timer.now().ticks_since(start) >= timeout_ticks {
                return false;
            }
        }
    }

    fn stop_transfer(&mut self) -> AttemptResult {
        self.bus.set_bits_u16(SDIDATCONL, DATCONL_STOP);
        let stopped = self.issue_command(CommandDescriptor::short(CMD_STOP_TRANS, 0)).is_ok();
        self.idle_data_path();
        if stopped {
            Ok(())
        } else {
            warn!("sd: STOP_TRANSMISSION failed");
            Err(Attempt::Fatal(TransferError::StopFailed))
        }
    }

    // Best effort: the card may already have dropped out of the data state.
    fn abort_transfer(&mut self) {
        self.bus.set_bits_u16(SDIDATCONL, DATCONL_STOP);
        let _ = self.issue_command(CommandDescriptor::short(CMD_STOP_TRANS, 0));
        self.idle_data_path();
    }

    fn idle_data_path(&mut self) {
        self.bus.write_u16(SDIDATCONL, 0);
        self.bus.write_u16(SDIDATCONH, 0);
        self.bus.write_u16(SDIDATSTA, DATSTA_CLEAR);
    }
}

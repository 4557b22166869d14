use std::cell::Cell;
use std::collections::{HashMap, VecDeque};

use crate::arm920::intrinsic::addr::{GPIOIPINLVL, SD_DETECT_PIN};
use crate::driver::sd::defs::*;
use crate::driver::sd::Direction;
use crate::driver::{Instant, RegisterBus, Timer};

pub const MOCK_RCA: u16 = 0xB368;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    /// Answers CMD8, reports CCS once powered up.
    SdV2Hc,
    /// Answers CMD8, never reports CCS.
    SdV2Sc,
    /// Ignores CMD8.
    SdV1,
    /// Ignores CMD8 and CMD55, powers up through CMD1.
    Mmc,
}

enum Reply {
    None,
    Silent,
    Short(u32),
    /// Short reply whose CRC the controller rejects (R3).
    ShortBadCrc(u32),
    Long([u16; NUM_RSP_REGS]),
}

struct DataPhase {
    direction: Direction,
    first_block: u32,
    total: usize,
    moved: usize,
    fifo: VecDeque<u8>,
    stalled: bool,
}

/// The SDI controller with one card behind it.
///
/// Models the registers the driver touches closely enough to drive it
/// through negotiation and transfers. The `pub` knobs inject faults.
pub struct MockSdi {
    kind: CardKind,
    csd: [u16; NUM_RSP_REGS],
    pub inserted: bool,
    /// CMD0 gets no acknowledgement.
    pub mute_reset: bool,
    /// The card has lost its protocol state: block commands get no reply
    /// and CMD13 reports an illegal command until the next CMD0.
    pub illegal_pending: bool,
    /// Number of upcoming block commands whose FIFO never becomes ready.
    pub stall_transfers: u32,
    pub fail_stop: bool,
    pub reject_select: bool,
    pub bad_echo: bool,
    /// Busy replies to ACMD41 or CMD1 after each reset.
    pub ready_polls: u32,
    polls_left: u32,
    app_cmd: bool,
    regs: HashMap<usize, u16>,
    rsp: [u16; NUM_RSP_REGS],
    cmdsta: u16,
    datsta: u16,
    data: Option<DataPhase>,
    blocks: HashMap<u32, [u8; BLOCK_SIZE]>,
    pub commands: Vec<(u8, u32)>,
    pub prescalers: Vec<u16>,
}

impl MockSdi {
    pub fn new(kind: CardKind, csd: [u16; NUM_RSP_REGS]) -> Self {
        MockSdi {
            kind,
            csd,
            inserted: true,
            mute_reset: false,
            illegal_pending: false,
            stall_transfers: 0,
            fail_stop: false,
            reject_select: false,
            bad_echo: false,
            ready_polls: 2,
            polls_left: 2,
            app_cmd: false,
            regs: HashMap::new(),
            rsp: [0; NUM_RSP_REGS],
            cmdsta: 0,
            datsta: 0,
            data: None,
            blocks: HashMap::new(),
            commands: vec![],
            prescalers: vec![],
        }
    }

    pub fn count(&self, index: u8) -> usize {
        self.commands.iter().filter(|(i, _)| *i == index).count()
    }

    pub fn args_of(&self, index: u8) -> Vec<u32> {
        self.commands
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, arg)| *arg)
            .collect()
    }

    pub fn block(&self, n: u32) -> [u8; BLOCK_SIZE] {
        self.blocks.get(&n).copied().unwrap_or([0; BLOCK_SIZE])
    }

    pub fn store_block(&mut self, n: u32, data: [u8; BLOCK_SIZE]) {
        self.blocks.insert(n, data);
    }

    fn rca(&self) -> u16 {
        if self.kind == CardKind::Mmc {
            0
        } else {
            MOCK_RCA
        }
    }

    fn is_sd(&self) -> bool {
        self.kind != CardKind::Mmc
    }

    fn reset(&mut self) {
        self.polls_left = self.ready_polls;
        self.illegal_pending = false;
        self.app_cmd = false;
        self.data = None;
    }

    fn op_cond(&mut self, arg: u32) -> u32 {
        if self.polls_left > 0 {
            self.polls_left -= 1;
            return OCR_VOLTAGE_WINDOW;
        }
        let mut ocr = OCR_VOLTAGE_WINDOW | OCR_POWER_UP_DONE;
        if self.kind == CardKind::SdV2Hc && arg & OCR_HCS != 0 {
            ocr |= OCR_CCS;
        }
        ocr
    }

    fn start_data(&mut self, index: u8, arg: u32) {
        let count = (self.regs.get(&SDIDATCONL).copied().unwrap_or(0) & DATCONL_BLKNUM_MASK) as usize;
        let first_block = if self.kind == CardKind::SdV2Hc {
            arg
        } else {
            arg / BLOCK_SIZE as u32
        };
        let stalled = self.stall_transfers > 0;
        if stalled {
            self.stall_transfers -= 1;
        }
        let direction = if index == CMD_READ_MULTI {
            Direction::Read
        } else {
            Direction::Write
        };
        let mut fifo = VecDeque::new();
        if direction == Direction::Read && !stalled {
            for n in 0..count {
                fifo.extend(self.block(first_block + n as u32));
            }
        }
        self.data = Some(DataPhase {
            direction,
            first_block,
            total: count * BLOCK_SIZE,
            moved: 0,
            fifo,
            stalled,
        });
    }

    fn execute(&mut self, index: u8, arg: u32) {
        self.commands.push((index, arg));
        let app = core::mem::replace(&mut self.app_cmd, false);
        let rca_arg = (self.rca() as u32) << 16;
        let reply = match index {
            CMD_GO_IDLE_STATE if self.mute_reset => Reply::Silent,
            CMD_GO_IDLE_STATE => {
                self.reset();
                Reply::None
            }
            CMD_APP_CMD if self.is_sd() => {
                self.app_cmd = true;
                Reply::Short(R1_APP_CMD)
            }
            ACMD_SD_SEND_OP_COND if app => Reply::ShortBadCrc(self.op_cond(arg)),
            CMD_SEND_IF_COND if matches!(self.kind, CardKind::SdV2Hc | CardKind::SdV2Sc) => {
                Reply::Short(if self.bad_echo { 0x1FF } else { arg & IF_COND_ECHO_MASK })
            }
            CMD_SEND_OP_COND if self.kind == CardKind::Mmc => Reply::ShortBadCrc(self.op_cond(arg)),
            CMD_ALL_SEND_CID => Reply::Long([0x003F, 0x0353, 0x4453, 0x4430, 0x3880, 0x1234, 0x5678, 0x00C1]),
            CMD_SEND_REL_ADDR if self.is_sd() => Reply::Short(rca_arg),
            CMD_SEND_CSD if arg == rca_arg => Reply::Long(self.csd),
            CMD_CARD_SELECT if arg == rca_arg && !self.reject_select => Reply::Short(0x0700),
            CMD_SEND_STATUS => {
                let illegal = if self.illegal_pending { R1_ILLEGAL_COMMAND } else { 0 };
                Reply::Short(illegal | 0x0900)
            }
            CMD_READ_MULTI | CMD_WRITE_MULTI if self.illegal_pending => Reply::Silent,
            CMD_READ_MULTI | CMD_WRITE_MULTI => {
                self.start_data(index, arg);
                Reply::Short(0x0900)
            }
            CMD_STOP_TRANS if self.fail_stop => Reply::Silent,
            CMD_STOP_TRANS => {
                self.data = None;
                Reply::Short(0x0B00)
            }
            _ => Reply::Silent,
        };

        match reply {
            Reply::None => self.cmdsta |= CMDSTA_SENT,
            Reply::Silent => self.cmdsta |= CMDSTA_SENT | CMDSTA_TIMEOUT,
            Reply::Short(payload) => self.short_reply(payload),
            Reply::ShortBadCrc(payload) => {
                self.short_reply(payload);
                self.cmdsta |= CMDSTA_CRC_FAIL;
            }
            Reply::Long(words) => {
                self.rsp = words;
                self.cmdsta |= CMDSTA_SENT | CMDSTA_RSP_FIN;
            }
        }
    }

    fn short_reply(&mut self, payload: u32) {
        self.rsp[1] = (payload >> 16) as u16;
        self.rsp[2] = (payload & 0xFFFF) as u16;
        self.cmdsta |= CMDSTA_SENT | CMDSTA_RSP_FIN;
    }

    fn fifo_status(&self) -> u16 {
        match &self.data {
            Some(phase) if !phase.stalled => match phase.direction {
                Direction::Read if !phase.fifo.is_empty() => FSTA_RX_AVAILABLE,
                Direction::Write if phase.moved < phase.total => FSTA_TX_AVAILABLE,
                _ => 0,
            },
            _ => 0,
        }
    }
}

impl RegisterBus for MockSdi {
    fn read_u8(&mut self, offset: usize) -> u8 {
        if offset != SDIDAT {
            return 0;
        }
        let Some(phase) = self.data.as_mut() else {
            return 0;
        };
        let Some(byte) = phase.fifo.pop_front() else {
            return 0;
        };
        phase.moved += 1;
        if phase.moved == phase.total {
            self.datsta |= DATSTA_FINISHED;
        }
        byte
    }

    fn write_u8(&mut self, offset: usize, value: u8) {
        if offset != SDIDAT {
            return;
        }
        let Some(phase) = self.data.as_mut() else {
            return;
        };
        if phase.direction != Direction::Write || phase.moved == phase.total {
            return;
        }
        phase.fifo.push_back(value);
        phase.moved += 1;
        if phase.moved == phase.total {
            let first = phase.first_block;
            let bytes: Vec<u8> = phase.fifo.drain(..).collect();
            for (n, chunk) in bytes.chunks(BLOCK_SIZE).enumerate() {
                let mut block = [0u8; BLOCK_SIZE];
                block.copy_from_slice(chunk);
                self.blocks.insert(first + n as u32, block);
            }
            self.datsta |= DATSTA_FINISHED;
        }
    }

    fn read_u16(&mut self, offset: usize) -> u16 {
        match offset {
            SDICMDSTA => self.cmdsta,
            SDIDATSTA => self.datsta,
            SDIFSTA => self.fifo_status(),
            GPIOIPINLVL => {
                if self.inserted {
                    0
                } else {
                    SD_DETECT_PIN
                }
            }
            o if (SDIRSP0..sdirsp(NUM_RSP_REGS)).contains(&o) => self.rsp[(o - SDIRSP0) / 2],
            _ => self.regs.get(&offset).copied().unwrap_or(0),
        }
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        match offset {
            SDICMDSTA => self.cmdsta &= !value,
            SDIDATSTA => self.datsta &= !value,
            SDIPRE => {
                self.prescalers.push(value);
                self.regs.insert(offset, value);
            }
            SDICMDCON => {
                self.regs.insert(offset, value);
                if value & CMDCON_START != 0 {
                    let low = self.regs.get(&SDICMDARGL).copied().unwrap_or(0) as u32;
                    let high = self.regs.get(&SDICMDARGH).copied().unwrap_or(0) as u32;
                    self.execute((value & CMDCON_INDEX_MASK) as u8, high << 16 | low);
                }
            }
            SDIDATCONL => {
                self.regs.insert(offset, value);
                if value & DATCONL_STOP != 0 {
                    self.data = None;
                }
            }
            _ => {
                self.regs.insert(offset, value);
            }
        }
    }
}

/// Advances by a fixed step every time it is read.
pub struct MockTimer {
    now: Cell<u32>,
    step: u32,
}

impl MockTimer {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(ticks: u32) -> Self {
        MockTimer {
            now: Cell::new(ticks),
            step: 997,
        }
    }
}

impl Timer for MockTimer {
    fn now(&self) -> Instant {
        let ticks = self.now.get();
        self.now.set(ticks.wrapping_add(self.step));
        Instant::from_ticks(ticks)
    }
}

#![allow(dead_code)]

// SDI register offsets inside the I/O window. All registers are 16 bits
// wide except SDIDAT, which is accessed a byte at a time.
pub const SDI_BASE: usize = 0x1500;
pub const SDICON: usize = SDI_BASE + 0x00;
pub const SDIPRE: usize = SDI_BASE + 0x02;
pub const SDICMDARGL: usize = SDI_BASE + 0x04;
pub const SDICMDARGH: usize = SDI_BASE + 0x06;
pub const SDICMDCON: usize = SDI_BASE + 0x08;
pub const SDICMDSTA: usize = SDI_BASE + 0x0A;
pub const SDIRSP0: usize = SDI_BASE + 0x0C;
pub const SDIBSIZE: usize = SDI_BASE + 0x1C;
pub const SDIDATCONL: usize = SDI_BASE + 0x1E;
pub const SDIDATCONH: usize = SDI_BASE + 0x20;
pub const SDIDATCNTL: usize = SDI_BASE + 0x22;
pub const SDIDATCNTH: usize = SDI_BASE + 0x24;
pub const SDIDATSTA: usize = SDI_BASE + 0x26;
pub const SDIFSTA: usize = SDI_BASE + 0x28;
pub const SDIDAT: usize = SDI_BASE + 0x2C;
pub const SDIDTIMERL: usize = SDI_BASE + 0x36;
pub const SDIDTIMERH: usize = SDI_BASE + 0x38;

pub const NUM_RSP_REGS: usize = 8;

pub const fn sdirsp(n: usize) -> usize {
    SDIRSP0 + n * 2
}

// SDICON
pub const SDICON_ENCLK: u16 = 1 << 0;
pub const SDICON_FIFO_RESET: u16 = 1 << 1;
pub const SDICON_BYT_ORDER: u16 = 1 << 4;

// SDICMDCON
pub const CMDCON_START: u16 = 1 << 8;
pub const CMDCON_WAIT_RSP: u16 = 1 << 9;
pub const CMDCON_LONG_RSP: u16 = 1 << 10;
// Start bits of the command token: the upper two bits of the index byte are 0b01.
pub const CMDCON_FRAMING: u16 = 0x40;
pub const CMDCON_INDEX_MASK: u16 = 0x3F;

// SDICMDSTA
pub const CMDSTA_RSP_FIN: u16 = 1 << 9;
pub const CMDSTA_TIMEOUT: u16 = 1 << 10;
pub const CMDSTA_SENT: u16 = 1 << 11;
pub const CMDSTA_CRC_FAIL: u16 = 1 << 12;
pub const CMDSTA_CLEAR: u16 = CMDSTA_RSP_FIN | CMDSTA_TIMEOUT | CMDSTA_SENT | CMDSTA_CRC_FAIL;

// SDIDATCONL
pub const DATCONL_BLKNUM_MASK: u16 = 0x0FFF;
pub const DATCONL_MODE_SHIFT: u16 = 12;
pub const DATCONL_MODE_RX: u16 = 2 << DATCONL_MODE_SHIFT;
pub const DATCONL_MODE_TX: u16 = 3 << DATCONL_MODE_SHIFT;
pub const DATCONL_STOP: u16 = 1 << 14;

// SDIDATCONH
pub const DATCONH_BLK_MODE: u16 = 1 << 1;
pub const DATCONH_RX_AFTER_CMD: u16 = 1 << 3;
pub const DATCONH_TX_AFTER_RSP: u16 = 1 << 4;
pub const DATCONH_READ: u16 = DATCONH_BLK_MODE | DATCONH_RX_AFTER_CMD;
pub const DATCONH_WRITE: u16 = DATCONH_BLK_MODE | DATCONH_TX_AFTER_RSP;

// SDIDATSTA
pub const DATSTA_FINISHED: u16 = 1 << 4;
pub const DATSTA_CLEAR: u16 = 0x07FF;

// SDIFSTA
pub const FSTA_RX_AVAILABLE: u16 = 1 << 12;
pub const FSTA_TX_AVAILABLE: u16 = 1 << 13;

// Data timeout counter, programmed as two halves.
pub const DTIMER_LOW: u16 = 0xFFFF;
pub const DTIMER_HIGH: u16 = 0x001F;

pub const BLOCK_SIZE: usize = 512;
pub const MAX_BLOCKS_PER_TRANSFER: u16 = DATCONL_BLKNUM_MASK;

// Peripheral clock feeding the SDI prescaler.
pub const PCLK_HZ: u32 = 74_649_600;
pub const FREQ_SETUP: u32 = 100_000;
pub const FREQ_SD: u32 = 25_000_000;
pub const FREQ_MMC: u32 = 10_000_000;

pub const fn prescaler_for(hz: u32) -> u16 {
    (PCLK_HZ / hz - 1) as u16
}

// Command indices.
pub const CMD_GO_IDLE_STATE: u8 = 0;
pub const CMD_SEND_OP_COND: u8 = 1;
pub const CMD_ALL_SEND_CID: u8 = 2;
pub const CMD_SEND_REL_ADDR: u8 = 3;
pub const CMD_CARD_SELECT: u8 = 7;
pub const CMD_SEND_IF_COND: u8 = 8;
pub const CMD_SEND_CSD: u8 = 9;
pub const CMD_STOP_TRANS: u8 = 12;
pub const CMD_SEND_STATUS: u8 = 13;
pub const CMD_READ_MULTI: u8 = 18;
pub const CMD_WRITE_MULTI: u8 = 25;
pub const CMD_APP_CMD: u8 = 55;
// Only valid straight after CMD_APP_CMD.
pub const ACMD_SD_SEND_OP_COND: u8 = 41;

// Arguments for specific commands.
pub const IF_COND_ARG: u32 = 0x0000_01AA;
pub const IF_COND_ECHO_MASK: u32 = 0x0000_0FFF;
pub const OCR_VOLTAGE_WINDOW: u32 = 0x00FF_8000;
pub const OCR_HCS: u32 = 1 << 30;
pub const ACMD41_ARG_HC: u32 = OCR_VOLTAGE_WINDOW | OCR_HCS;
pub const ACMD41_ARG_SC: u32 = OCR_VOLTAGE_WINDOW;
pub const MMC_OP_COND_ARG: u32 = OCR_VOLTAGE_WINDOW;

// R3 (OCR) bits.
pub const OCR_POWER_UP_DONE: u32 = 1 << 31;
pub const OCR_CCS: u32 = 1 << 30;

// R1 card status bits.
pub const R1_ILLEGAL_COMMAND: u32 = 1 << 22;
pub const R1_APP_CMD: u32 = 1 << 5;

pub const fn rca_arg(rca: u16) -> u32 {
    (rca as u32) << 16
}

// Retry budgets and timeouts.
pub const RESET_ATTEMPTS: u32 = 100;
pub const READY_ATTEMPTS: u32 = 150;
pub const MMC_OP_COND_ATTEMPTS: u32 = 150;
pub const READY_DELAY_NS: u64 = 10_000_000;
pub const TRANSFER_ATTEMPTS: u32 = 5;
pub const FIFO_TIMEOUT_NS: u64 = 50_000_000;
pub const DATA_FINISH_TIMEOUT_NS: u64 = 50_000_000;
pub const CLOCK_SETTLE_NS: u64 = 500_000;

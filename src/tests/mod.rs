mod mock;

use crate::driver::sd::defs::NUM_RSP_REGS;
use crate::driver::sd::SdCard;
use mock::{CardKind, MockSdi, MockTimer};

pub type TestCard = SdCard<MockSdi, MockTimer>;

pub fn card(kind: CardKind, csd: [u16; NUM_RSP_REGS]) -> TestCard {
    SdCard::new(MockSdi::new(kind, csd), MockTimer::new())
}

pub fn ready_card(kind: CardKind, csd: [u16; NUM_RSP_REGS]) -> TestCard {
    let mut card = card(kind, csd);
    card.negotiate().unwrap();
    card
}

// CSD images as they sit in SDIRSP0..SDIRSP7: bit b of the register is bit
// (15 - (143 - b) % 16) of word (143 - b) / 16.

pub fn csd_with_structure(structure: u16) -> [u16; NUM_RSP_REGS] {
    let mut words = [0u16; NUM_RSP_REGS];
    words[1] = (structure & 0x3) << 14;
    words
}

pub fn csd_v1(c_size: u32) -> [u16; NUM_RSP_REGS] {
    let mut words = csd_with_structure(1);
    words[4] = ((c_size >> 16) & 0x3F) as u16;
    words[5] = (c_size & 0xFFFF) as u16;
    words
}

pub fn csd_v0(read_bl_len: u8, c_size: u32, c_size_mult: u8) -> [u16; NUM_RSP_REGS] {
    let mut words = csd_with_structure(0);
    words[3] = read_bl_len as u16 & 0xF;
    words[4] = ((c_size >> 2) & 0x3FF) as u16;
    words[5] = ((c_size & 0x3) << 14) as u16 | ((c_size_mult as u16 >> 1) & 0x3);
    words[6] = (c_size_mult as u16 & 0x1) << 15;
    words
}

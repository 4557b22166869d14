use bitvec::prelude::*;

use super::defs::NUM_RSP_REGS;

/// Width of the long response as laid out in `SDIRSP0..SDIRSP7`: the header
/// byte sits in the low half of `SDIRSP0`, so CSD bit `b` lands at MSB-first
/// index `143 - b`.
const RSP_TOP_BIT: usize = 143;

/// Largest defined READ_BL_LEN (2 KiB blocks).
const MAX_READ_BL_LEN: u8 = 11;

/// Capacity-related part of the card-specific data register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityDescriptor {
    /// CSD structure 0: size = (C_SIZE + 1) * 2^(C_SIZE_MULT + 2) * 2^READ_BL_LEN.
    Standard { c_size: u32, c_size_mult: u8, read_bl_len: u8 },
    /// CSD structure 1: size = (C_SIZE + 1) * 512 KiB.
    High { c_size: u32 },
}

fn field(bits: &BitSlice<u16, Msb0>, hi: usize, lo: usize) -> u32 {
    bits[RSP_TOP_BIT - hi..=RSP_TOP_BIT - lo].load_be::<u32>()
}

impl CapacityDescriptor {
    /// Decodes the CSD from the eight long-response words. Returns `None` for
    /// structure versions other than 0 and 1 and for reserved block lengths.
    pub fn parse(words: &[u16]) -> Option<Self> {
        let raw: [u16; NUM_RSP_REGS] = words.try_into().ok()?;
        let bits = raw.view_bits::<Msb0>();
        match field(bits, 127, 126) {
            0 => {
                let read_bl_len = field(bits, 83, 80) as u8;
                // 12..=15 are reserved.
                if read_bl_len > MAX_READ_BL_LEN {
                    return None;
                }
                Some(CapacityDescriptor::Standard {
                    c_size: field(bits, 73, 62),
                    c_size_mult: field(bits, 49, 47) as u8,
                    read_bl_len,
                })
            }
            1 => Some(CapacityDescriptor::High {
                c_size: field(bits, 69, 48),
            }),
            _ => None,
        }
    }

    pub fn is_high_capacity(&self) -> bool {
        matches!(self, CapacityDescriptor::High { .. })
    }

    pub fn capacity_kb(&self) -> i32 {
        let kb = match *self {
            CapacityDescriptor::Standard {
                c_size,
                c_size_mult,
                read_bl_len,
            } => {
                let block_count = (c_size as u64 + 1) << (c_size_mult as u32 + 2);
                let block_len = 1u64 << read_bl_len;
                block_count * block_len / 1024
            }
            CapacityDescriptor::High { c_size } => (c_size as u64 + 1) * 512,
        };
        kb.min(i32::MAX as u64) as i32
    }
}

/// Card capacity in KiB, or `None` if the descriptor is invalid.
pub fn parse_capacity(words: &[u16]) -> Option<i32> {
    CapacityDescriptor::parse(words).map(|csd| csd.capacity_kb())
}

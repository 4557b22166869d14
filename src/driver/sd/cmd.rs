use super::defs::*;
use super::SdCard;
use crate::driver::{RegisterBus, Timer};

/// One command as handed to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub index: u8,
    pub argument: u32,
    pub expects_response: bool,
    /// 136-bit response instead of 48-bit.
    pub long_response: bool,
    /// Some responses carry no valid CRC (R3) or arrive before the card has
    /// settled on one.
    pub ignore_crc: bool,
}

impl CommandDescriptor {
    /// 48-bit response, CRC checked.
    pub const fn short(index: u8, argument: u32) -> Self {
        debug_assert!(index < 64, "command index is six bits");
        Self {
            index,
            argument,
            expects_response: true,
            long_response: false,
            ignore_crc: false,
        }
    }

    /// 136-bit response, CRC checked.
    pub const fn long(index: u8, argument: u32) -> Self {
        Self {
            long_response: true,
            ..Self::short(index, argument)
        }
    }

    /// No response expected.
    pub const fn bare(index: u8, argument: u32) -> Self {
        Self {
            expects_response: false,
            ignore_crc: true,
            ..Self::short(index, argument)
        }
    }

    pub const fn crc_ignored(self) -> Self {
        Self {
            ignore_crc: true,
            ..self
        }
    }

    pub fn control_word(&self) -> u16 {
        let mut word = CMDCON_START | CMDCON_FRAMING | (self.index as u16 & CMDCON_INDEX_MASK);
        if self.expects_response {
            word |= CMDCON_WAIT_RSP;
        }
        if self.long_response {
            word |= CMDCON_LONG_RSP;
        }
        word
    }
}

/// Response register contents.
///
/// Short responses keep the 32-bit payload as `SDIRSP1:SDIRSP2`. Long
/// responses keep all eight registers; `SDIRSP0` holds the header byte and
/// `SDIRSP1..SDIRSP7` hold register bits 127..16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    words: [u16; NUM_RSP_REGS],
    len: usize,
}

impl Response {
    pub const fn empty() -> Self {
        Self {
            words: [0; NUM_RSP_REGS],
            len: 0,
        }
    }

    pub fn words(&self) -> &[u16] {
        &self.words[..self.len]
    }

    /// The 32-bit payload of a short response.
    pub fn payload(&self) -> u32 {
        if self.len < 2 {
            return 0;
        }
        (self.words[0] as u32) << 16 | self.words[1] as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Ok(Response),
    Timeout,
    CrcError,
}

impl CommandOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, CommandOutcome::Ok(_))
    }

    pub fn ok(self) -> Option<Response> {
        match self {
            CommandOutcome::Ok(rsp) => Some(rsp),
            _ => None,
        }
    }
}

impl<B: RegisterBus, T: Timer> SdCard<B, T> {
    /// Sends one command and classifies the result from the status register.
    ///
    /// Waits for the controller without a deadline: it always raises either
    /// "sent", "response finished" or "timeout". Never retries.
    pub fn issue_command(&mut self, desc: CommandDescriptor) -> CommandOutcome {
        self.bus.write_u16(SDICMDSTA, CMDSTA_CLEAR);
        self.bus.write_u16(SDICMDARGL, (desc.argument & 0xFFFF) as u16);
        self.bus.write_u16(SDICMDARGH, (desc.argument >> 16) as u16);
        self.bus.write_u16(SDICMDCON, desc.control_word());

        let done = if desc.expects_response {
            CMDSTA_RSP_FIN | CMDSTA_TIMEOUT
        } else {
            CMDSTA_SENT
        };
        let mut status = self.bus.read_u16(SDICMDSTA);
        while status & done == 0 {
            status = self.bus.read_u16(SDICMDSTA);
        }

        if status & CMDSTA_TIMEOUT != 0 {
            return CommandOutcome::Timeout;
        }
        if !desc.ignore_crc && status & CMDSTA_CRC_FAIL != 0 {
            return CommandOutcome::CrcError;
        }

        let mut rsp = Response::empty();
        if desc.long_response {
            for (n, word) in rsp.words.iter_mut().enumerate() {
                *word = self.bus.read_u16(sdirsp(n));
            }
            rsp.len = NUM_RSP_REGS;
        } else if desc.expects_response {
            rsp.words[0] = self.bus.read_u16(sdirsp(1));
            rsp.words[1] = self.bus.read_u16(sdirsp(2));
            rsp.len = 2;
        }
        CommandOutcome::Ok(rsp)
    }

    /// CMD55: the next command is read as an application command.
    pub(super) fn issue_app_prefix(&mut self) -> CommandOutcome {
        let prefix = CommandDescriptor::short(CMD_APP_CMD, rca_arg(self.session.relative_address));
        self.issue_command(prefix)
    }

    /// Reads the card status register with CMD13.
    pub(super) fn card_status(&mut self) -> Option<u32> {
        let desc = CommandDescriptor::short(CMD_SEND_STATUS, rca_arg(self.session.relative_address));
        self.issue_command(desc).ok().map(|rsp| rsp.payload())
    }
}

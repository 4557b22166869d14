use log::{debug, info, warn};

use super::cmd::{CommandDescriptor, CommandOutcome};
use super::csd::CapacityDescriptor;
use super::defs::*;
use super::{CardSession, CardType, NegotiationError, SdCard};
use crate::common::{retry, Attempt};
use crate::driver::{RegisterBus, Timer};

impl<B: RegisterBus, T: Timer> SdCard<B, T> {
    /// Brings the card from power-on to the selected transfer state.
    ///
    /// The session is cleared first and only written back once every stage
    /// has succeeded, so a failure always leaves the driver "not inserted".
    pub fn negotiate(&mut self) -> Result<(), NegotiationError> {
        self.session = CardSession::new();
        match self.run_negotiation() {
            Ok(session) => {
                info!(
                    "sd: {:?} card ready, rca {:#06x}, {} KiB",
                    session.card_type, session.relative_address, session.capacity_kb
                );
                self.session = session;
                Ok(())
            }
            Err(e) => {
                warn!("sd: {}", e);
                Err(e)
            }
        }
    }

    fn run_negotiation(&mut self) -> Result<CardSession, NegotiationError> {
        self.setup_bus();
        self.reset_card()?;
        let mut card_type = self.identify_card()?;
        self.identify();
        let rca = self.assign_address(card_type);
        let csd = self.read_capacity(rca)?;
        if csd.is_high_capacity() && card_type == CardType::SdLegacy {
            card_type = CardType::SdHcXc;
        }

        let clock = match card_type {
            CardType::Mmc => self.config.mmc_clock_hz,
            _ => self.config.sd_clock_hz,
        };
        self.set_clock(clock);
        self.select(rca)?;

        Ok(CardSession {
            inserted: true,
            card_type,
            relative_address: rca,
            capacity_kb: csd.capacity_kb(),
        })
    }

    fn setup_bus(&mut self) {
        self.set_clock(self.config.setup_clock_hz);
        self.bus.write_u16(SDICON, SDICON_BYT_ORDER | SDICON_ENCLK);
        self.bus.write_u16(SDIDTIMERL, DTIMER_LOW);
        self.bus.write_u16(SDIDTIMERH, DTIMER_HIGH);
        self.bus.write_u16(SDIBSIZE, BLOCK_SIZE as u16);
        // Halt whatever a previous session left running.
        self.bus.write_u16(SDIDATCONL, DATCONL_STOP);
        self.bus.write_u16(SDIDATCONH, 0);
        self.bus.write_u16(SDIDATSTA, DATSTA_CLEAR);
        self.bus.set_bits_u16(SDICON, SDICON_FIFO_RESET);
    }

    fn reset_card(&mut self) -> Result<(), NegotiationError> {
        let attempts = self.config.reset_attempts;
        retry(attempts, |_| -> Result<(), Attempt<NegotiationError>> {
            match self.issue_command(CommandDescriptor::bare(CMD_GO_IDLE_STATE, 0)) {
                CommandOutcome::Ok(_) => Ok(()),
                _ => Err(Attempt::Retry),
            }
        })
        .map_err(|e| e.or_exhausted(NegotiationError::ResetExhausted))
    }

    /// Works out which kind of card answered the reset.
    fn identify_card(&mut self) -> Result<CardType, NegotiationError> {
        match self.issue_command(CommandDescriptor::short(CMD_SEND_IF_COND, IF_COND_ARG)) {
            CommandOutcome::Ok(rsp) => {
                if rsp.payload() & IF_COND_ECHO_MASK != IF_COND_ARG {
                    debug!("sd: CMD8 echo mismatch {:#010x}", rsp.payload());
                    return Err(NegotiationError::NoCompatibleCard);
                }
                let ocr = self.wait_ready(ACMD41_ARG_HC)?;
                Ok(if ocr & OCR_CCS != 0 {
                    CardType::SdHcXc
                } else {
                    CardType::SdLegacy
                })
            }
            _ => {
                debug!("sd: no CMD8 reply, trying SD v1");
                match self.wait_ready(ACMD41_ARG_SC) {
                    Ok(_) => return Ok(CardType::SdLegacy),
                    Err(NegotiationError::NoCompatibleCard) => debug!("sd: no CMD55 reply, trying MMC"),
                    Err(e) => debug!("sd: SD v1 ready-wait failed ({}), trying MMC", e),
                }
                // Back to idle: CMD1 is only valid straight after reset.
                self.reset_card()?;
                self.wait_mmc_ready().map(|_| CardType::Mmc)
            }
        }
    }

    /// Repeats CMD55 + ACMD41 until the card reports power-up complete.
    /// Returns the final OCR.
    ///
    /// A card that ignores the very first CMD55 is not an SD card at all and
    /// gets `NoCompatibleCard` without spending the attempt budget.
    fn wait_ready(&mut self, arg: u32) -> Result<u32, NegotiationError> {
        let attempts = self.config.ready_attempts;
        let delay = self.config.ready_delay_ns;
        retry(attempts, |attempt| -> Result<u32, Attempt<NegotiationError>> {
            if attempt > 0 {
                self.timer.delay_ns(delay);
            }
            match self.issue_app_prefix() {
                CommandOutcome::Ok(_) => {}
                CommandOutcome::Timeout if attempt == 0 => {
                    return Err(Attempt::Fatal(NegotiationError::NoCompatibleCard));
                }
                _ => return Err(Attempt::Retry),
            }
            let desc = CommandDescriptor::short(ACMD_SD_SEND_OP_COND, arg).crc_ignored();
            let ocr = self.issue_command(desc).ok().ok_or(Attempt::Retry)?.payload();
            if ocr & OCR_POWER_UP_DONE != 0 {
                Ok(ocr)
            } else {
                Err(Attempt::Retry)
            }
        })
        .map_err(|e| e.or_exhausted(NegotiationError::ReadyTimeout))
    }

    fn wait_mmc_ready(&mut self) -> Result<u32, NegotiationError> {
        let attempts = self.config.mmc_op_cond_attempts;
        let delay = self.config.ready_delay_ns;
        retry(attempts, |attempt| -> Result<u32, Attempt<NegotiationError>> {
            if attempt > 0 {
                self.timer.delay_ns(delay);
            }
            let desc = CommandDescriptor::short(CMD_SEND_OP_COND, MMC_OP_COND_ARG).crc_ignored();
            let ocr = self.issue_command(desc).ok().ok_or(Attempt::Retry)?.payload();
            if ocr & OCR_POWER_UP_DONE != 0 {
                Ok(ocr)
            } else {
                Err(Attempt::Retry)
            }
        })
        .map_err(|e| e.or_exhausted(NegotiationError::NoCompatibleCard))
    }

    // First responder wins; there is only ever one card on this bus.
    fn identify(&mut self) {
        while !self.issue_command(CommandDescriptor::long(CMD_ALL_SEND_CID, 0)).is_ok() {}
    }

    fn assign_address(&mut self, card_type: CardType) -> u16 {
        if card_type == CardType::Mmc {
            return 0;
        }
        loop {
            if let CommandOutcome::Ok(rsp) = self.issue_command(CommandDescriptor::short(CMD_SEND_REL_ADDR, 0)) {
                return (rsp.payload() >> 16) as u16;
            }
        }
    }

    fn read_capacity(&mut self, rca: u16) -> Result<CapacityDescriptor, NegotiationError> {
        let rsp = self
            .issue_command(CommandDescriptor::long(CMD_SEND_CSD, rca_arg(rca)))
            .ok()
            .ok_or(NegotiationError::BadDescriptor)?;
        CapacityDescriptor::parse(rsp.words()).ok_or(NegotiationError::BadDescriptor)
    }

    fn select(&mut self, rca: u16) -> Result<(), NegotiationError> {
        match self.issue_command(CommandDescriptor::short(CMD_CARD_SELECT, rca_arg(rca))) {
            CommandOutcome::Ok(_) => Ok(()),
            _ => Err(NegotiationError::SelectFailed),
        }
    }
}

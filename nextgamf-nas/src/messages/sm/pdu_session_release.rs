//! PDU session release (TS 24.501 §8.3.12 - §8.3.15)

use bytes::{Buf, BufMut};

use crate::codec::{peek_iei, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::SmMessageType;
use crate::header::PlainSmHeader;
use crate::ies::ie3::SmCause;
use crate::ies::ie4::IeGprsTimer3;
use crate::ies::ie6::IeExtendedProtocolConfigurationOptions;
use crate::messages::{opt_len, put_opt, take_opt, SmBody};

mod release_iei {
    pub const SM_CAUSE: u8 = 0x59;
    pub const BACK_OFF_TIMER: u8 = 0x37;
    pub const EPCO: u8 = 0x7B;
}

const EPCO_BOUND: usize = 1 + IeExtendedProtocolConfigurationOptions::MAX_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionReleaseRequest {
    pub sm_cause: Option<SmCause>,
    pub extended_pco: Option<IeExtendedProtocolConfigurationOptions>,
}

impl IeBounds for PduSessionReleaseRequest {
    const MIN_LEN: usize = PlainSmHeader::SIZE;
    const MAX_LEN: usize = PlainSmHeader::SIZE + 2 + EPCO_BOUND;
}

impl SmBody for PduSessionReleaseRequest {
    const MESSAGE_TYPE: SmMessageType = SmMessageType::PduSessionReleaseRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        put_opt(buf, release_iei::SM_CAUSE, &self.sm_cause)?;
        put_opt(buf, release_iei::EPCO, &self.extended_pco)
    }

    fn body_len(&self) -> usize {
        opt_len(&self.sm_cause) + opt_len(&self.extended_pco)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let mut msg = Self::default();
        while let Some(iei) = peek_iei(buf) {
            match iei {
                release_iei::SM_CAUSE => msg.sm_cause = take_opt(buf)?,
                release_iei::EPCO => msg.extended_pco = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionReleaseCommand {
    pub cause: SmCause,
    pub back_off_timer: Option<IeGprsTimer3>,
    pub extended_pco: Option<IeExtendedProtocolConfigurationOptions>,
}

impl PduSessionReleaseCommand {
    pub fn new(cause: SmCause) -> Self {
        Self {
            cause,
            back_off_timer: None,
            extended_pco: None,
        }
    }
}

impl IeBounds for PduSessionReleaseCommand {
    const MIN_LEN: usize = PlainSmHeader::SIZE + 1;
    const MAX_LEN: usize = PlainSmHeader::SIZE + 1 + (1 + IeGprsTimer3::MAX_LEN) + EPCO_BOUND;
}

impl SmBody for PduSessionReleaseCommand {
    const MESSAGE_TYPE: SmMessageType = SmMessageType::PduSessionReleaseCommand;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.cause.nas_encode(buf)?;
        put_opt(buf, release_iei::BACK_OFF_TIMER, &self.back_off_timer)?;
        put_opt(buf, release_iei::EPCO, &self.extended_pco)
    }

    fn body_len(&self) -> usize {
        1 + opt_len(&self.back_off_timer) + opt_len(&self.extended_pco)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let mut msg = Self::new(SmCause::nas_decode(buf)?);
        while let Some(iei) = peek_iei(buf) {
            match iei {
                release_iei::BACK_OFF_TIMER => msg.back_off_timer = take_opt(buf)?,
                release_iei::EPCO => msg.extended_pco = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionReleaseComplete {
    pub sm_cause: Option<SmCause>,
    pub extended_pco: Option<IeExtendedProtocolConfigurationOptions>,
}

impl IeBounds for PduSessionReleaseComplete {
    const MIN_LEN: usize = PlainSmHeader::SIZE;
    const MAX_LEN: usize = PlainSmHeader::SIZE + 2 + EPCO_BOUND;
}

impl SmBody for PduSessionReleaseComplete {
    const MESSAGE_TYPE: SmMessageType = SmMessageType::PduSessionReleaseComplete;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        put_opt(buf, release_iei::SM_CAUSE, &self.sm_cause)?;
        put_opt(buf, release_iei::EPCO, &self.extended_pco)
    }

    fn body_len(&self) -> usize {
        opt_len(&self.sm_cause) + opt_len(&self.extended_pco)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let mut msg = Self::default();
        while let Some(iei) = peek_iei(buf) {
            match iei {
                release_iei::SM_CAUSE => msg.sm_cause = take_opt(buf)?,
                release_iei::EPCO => msg.extended_pco = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

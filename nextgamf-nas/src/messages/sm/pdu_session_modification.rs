//! Network-requested PDU session modification (TS 24.501 §8.3.9 - §8.3.10)

use bytes::{Buf, BufMut};

use crate::codec::{peek_iei, CodecResult, IeBounds};
use crate::enums::SmMessageType;
use crate::header::PlainSmHeader;
use crate::ies::ie3::SmCause;
use crate::ies::ie4::IeSessionAmbr;
use crate::ies::ie6::{IeExtendedProtocolConfigurationOptions, IeQosFlowDescriptions, IeQosRules};
use crate::messages::{opt_len, put_opt, take_opt, SmBody};

mod modification_iei {
    pub const SM_CAUSE: u8 = 0x59;
    pub const SESSION_AMBR: u8 = 0x2A;
    pub const QOS_RULES: u8 = 0x7A;
    pub const QOS_FLOW_DESCRIPTIONS: u8 = 0x79;
    pub const EPCO: u8 = 0x7B;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionModificationCommand {
    pub sm_cause: Option<SmCause>,
    pub session_ambr: Option<IeSessionAmbr>,
    pub authorized_qos_rules: Option<IeQosRules>,
    pub qos_flow_descriptions: Option<IeQosFlowDescriptions>,
    pub extended_pco: Option<IeExtendedProtocolConfigurationOptions>,
}

impl IeBounds for PduSessionModificationCommand {
    const MIN_LEN: usize = PlainSmHeader::SIZE;
    const MAX_LEN: usize = PlainSmHeader::SIZE
        + 2
        + (1 + IeSessionAmbr::MAX_LEN)
        + (1 + IeQosRules::MAX_LEN)
        + (1 + IeQosFlowDescriptions::MAX_LEN)
        + (1 + IeExtendedProtocolConfigurationOptions::MAX_LEN);
}

impl SmBody for PduSessionModificationCommand {
    const MESSAGE_TYPE: SmMessageType = SmMessageType::PduSessionModificationCommand;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use modification_iei::*;
        put_opt(buf, SM_CAUSE, &self.sm_cause)?;
        put_opt(buf, SESSION_AMBR, &self.session_ambr)?;
        put_opt(buf, QOS_RULES, &self.authorized_qos_rules)?;
        put_opt(buf, QOS_FLOW_DESCRIPTIONS, &self.qos_flow_descriptions)?;
        put_opt(buf, EPCO, &self.extended_pco)
    }

    fn body_len(&self) -> usize {
        opt_len(&self.sm_cause)
            + opt_len(&self.session_ambr)
            + opt_len(&self.authorized_qos_rules)
            + opt_len(&self.qos_flow_descriptions)
            + opt_len(&self.extended_pco)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use modification_iei::*;
        let mut msg = Self::default();
        while let Some(iei) = peek_iei(buf) {
            match iei {
                SM_CAUSE => msg.sm_cause = take_opt(buf)?,
                SESSION_AMBR => msg.session_ambr = take_opt(buf)?,
                QOS_RULES => msg.authorized_qos_rules = take_opt(buf)?,
                QOS_FLOW_DESCRIPTIONS => msg.qos_flow_descriptions = take_opt(buf)?,
                EPCO => msg.extended_pco = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionModificationComplete {
    pub extended_pco: Option<IeExtendedProtocolConfigurationOptions>,
}

impl IeBounds for PduSessionModificationComplete {
    const MIN_LEN: usize = PlainSmHeader::SIZE;
    const MAX_LEN: usize = PlainSmHeader::SIZE + 1 + IeExtendedProtocolConfigurationOptions::MAX_LEN;
}

impl SmBody for PduSessionModificationComplete {
    const MESSAGE_TYPE: SmMessageType = SmMessageType::PduSessionModificationComplete;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        put_opt(buf, modification_iei::EPCO, &self.extended_pco)
    }

    fn body_len(&self) -> usize {
        opt_len(&self.extended_pco)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let mut msg = Self::default();
        while let Some(iei) = peek_iei(buf) {
            match iei {
                modification_iei::EPCO => msg.extended_pco = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

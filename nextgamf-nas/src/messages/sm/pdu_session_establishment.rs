//! PDU session establishment (TS 24.501 §8.3.1 - §8.3.3)

use bytes::{Buf, BufMut};

use crate::codec::{get_u8, peek_iei, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::SmMessageType;
use crate::header::PlainSmHeader;
use crate::ies::ie1::{encode_ie1_pair, IePduSessionType, InformationElement1, SscMode};
use crate::ies::ie3::{IeIntegrityProtectionMaxDataRate, SmCause};
use crate::ies::ie4::{Ie5gsmCapability, IeDnn, IeGprsTimer3, IePduAddress, IeSNssai, IeSessionAmbr};
use crate::ies::ie6::{IeExtendedProtocolConfigurationOptions, IeQosFlowDescriptions, IeQosRules};
use crate::messages::{opt_ie1_len, opt_len, presence_mask, put_opt, put_opt_ie1, take_opt, take_opt_ie1, SmBody};

mod establishment_iei {
    pub const PDU_SESSION_TYPE: u8 = 0x09;
    pub const SSC_MODE: u8 = 0x0A;
    pub const SM_CAPABILITY: u8 = 0x28;
    pub const MAX_PACKET_FILTERS: u8 = 0x55;
    pub const SM_CAUSE: u8 = 0x59;
    pub const PDU_ADDRESS: u8 = 0x29;
    pub const S_NSSAI: u8 = 0x22;
    pub const QOS_FLOW_DESCRIPTIONS: u8 = 0x79;
    pub const EPCO: u8 = 0x7B;
    pub const DNN: u8 = 0x25;
    pub const BACK_OFF_TIMER: u8 = 0x37;
}

// ============================================================================
// PDU Session Establishment Request
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionEstablishmentRequest {
    pub integrity_max_data_rate: IeIntegrityProtectionMaxDataRate,
    pub pdu_session_type: Option<IePduSessionType>,
    pub ssc_mode: Option<SscMode>,
    pub sm_capability: Option<Ie5gsmCapability>,
    pub max_packet_filters: Option<u16>,
    pub extended_pco: Option<IeExtendedProtocolConfigurationOptions>,
}

impl PduSessionEstablishmentRequest {
    pub fn presence_mask(&self) -> u32 {
        presence_mask(&[
            self.pdu_session_type.is_some(),
            self.ssc_mode.is_some(),
            self.sm_capability.is_some(),
            self.max_packet_filters.is_some(),
            self.extended_pco.is_some(),
        ])
    }
}

impl IeBounds for PduSessionEstablishmentRequest {
    const MIN_LEN: usize = PlainSmHeader::SIZE + IeIntegrityProtectionMaxDataRate::MIN_LEN;
    const MAX_LEN: usize = PlainSmHeader::SIZE
        + IeIntegrityProtectionMaxDataRate::MAX_LEN
        + 1
        + 1
        + (1 + Ie5gsmCapability::MAX_LEN)
        + 3
        + (1 + IeExtendedProtocolConfigurationOptions::MAX_LEN);
}

impl SmBody for PduSessionEstablishmentRequest {
    const MESSAGE_TYPE: SmMessageType = SmMessageType::PduSessionEstablishmentRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use establishment_iei::*;
        self.integrity_max_data_rate.nas_encode(buf)?;
        put_opt_ie1(buf, PDU_SESSION_TYPE, &self.pdu_session_type);
        put_opt_ie1(buf, SSC_MODE, &self.ssc_mode);
        put_opt(buf, SM_CAPABILITY, &self.sm_capability)?;
        put_opt(buf, MAX_PACKET_FILTERS, &self.max_packet_filters)?;
        put_opt(buf, EPCO, &self.extended_pco)
    }

    fn body_len(&self) -> usize {
        self.integrity_max_data_rate.encoded_len()
            + opt_ie1_len(&self.pdu_session_type)
            + opt_ie1_len(&self.ssc_mode)
            + opt_len(&self.sm_capability)
            + opt_len(&self.max_packet_filters)
            + opt_len(&self.extended_pco)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use establishment_iei::*;
        let mut msg = Self {
            integrity_max_data_rate: IeIntegrityProtectionMaxDataRate::nas_decode(buf)?,
            ..Default::default()
        };
        while let Some(iei) = peek_iei(buf) {
            match iei {
                iei if iei >> 4 == PDU_SESSION_TYPE => msg.pdu_session_type = take_opt_ie1(buf)?,
                iei if iei >> 4 == SSC_MODE => msg.ssc_mode = take_opt_ie1(buf)?,
                SM_CAPABILITY => msg.sm_capability = take_opt(buf)?,
                MAX_PACKET_FILTERS => msg.max_packet_filters = take_opt(buf)?,
                EPCO => msg.extended_pco = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

// ============================================================================
// PDU Session Establishment Accept
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentAccept {
    pub pdu_session_type: IePduSessionType,
    pub ssc_mode: SscMode,
    pub authorized_qos_rules: IeQosRules,
    pub session_ambr: IeSessionAmbr,
    pub sm_cause: Option<SmCause>,
    pub pdu_address: Option<IePduAddress>,
    pub s_nssai: Option<IeSNssai>,
    pub qos_flow_descriptions: Option<IeQosFlowDescriptions>,
    pub extended_pco: Option<IeExtendedProtocolConfigurationOptions>,
    pub dnn: Option<IeDnn>,
}

impl PduSessionEstablishmentAccept {
    pub fn new(
        pdu_session_type: IePduSessionType,
        ssc_mode: SscMode,
        authorized_qos_rules: IeQosRules,
        session_ambr: IeSessionAmbr,
    ) -> Self {
        Self {
            pdu_session_type,
            ssc_mode,
            authorized_qos_rules,
            session_ambr,
            sm_cause: None,
            pdu_address: None,
            s_nssai: None,
            qos_flow_descriptions: None,
            extended_pco: None,
            dnn: None,
        }
    }
}

impl IeBounds for PduSessionEstablishmentAccept {
    const MIN_LEN: usize = PlainSmHeader::SIZE + 1 + IeQosRules::MIN_LEN + IeSessionAmbr::MIN_LEN;
    const MAX_LEN: usize = PlainSmHeader::SIZE
        + 1
        + IeQosRules::MAX_LEN
        + IeSessionAmbr::MAX_LEN
        + 2
        + (1 + IePduAddress::MAX_LEN)
        + (1 + IeSNssai::MAX_LEN)
        + (1 + IeQosFlowDescriptions::MAX_LEN)
        + (1 + IeExtendedProtocolConfigurationOptions::MAX_LEN)
        + (1 + IeDnn::MAX_LEN);
}

impl SmBody for PduSessionEstablishmentAccept {
    const MESSAGE_TYPE: SmMessageType = SmMessageType::PduSessionEstablishmentAccept;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use establishment_iei::*;
        encode_ie1_pair(&self.ssc_mode, &self.pdu_session_type, buf);
        self.authorized_qos_rules.nas_encode(buf)?;
        self.session_ambr.nas_encode(buf)?;
        put_opt(buf, SM_CAUSE, &self.sm_cause)?;
        put_opt(buf, PDU_ADDRESS, &self.pdu_address)?;
        put_opt(buf, S_NSSAI, &self.s_nssai)?;
        put_opt(buf, QOS_FLOW_DESCRIPTIONS, &self.qos_flow_descriptions)?;
        put_opt(buf, EPCO, &self.extended_pco)?;
        put_opt(buf, DNN, &self.dnn)
    }

    fn body_len(&self) -> usize {
        1 + self.authorized_qos_rules.encoded_len()
            + self.session_ambr.encoded_len()
            + opt_len(&self.sm_cause)
            + opt_len(&self.pdu_address)
            + opt_len(&self.s_nssai)
            + opt_len(&self.qos_flow_descriptions)
            + opt_len(&self.extended_pco)
            + opt_len(&self.dnn)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use establishment_iei::*;
        let octet = get_u8(buf)?;
        let pdu_session_type = IePduSessionType::decode_value(octet & 0x0F)?;
        let ssc_mode = SscMode::decode_value(octet >> 4)?;
        let authorized_qos_rules = IeQosRules::nas_decode(buf)?;
        let session_ambr = IeSessionAmbr::nas_decode(buf)?;
        let mut msg = Self::new(pdu_session_type, ssc_mode, authorized_qos_rules, session_ambr);
        while let Some(iei) = peek_iei(buf) {
            match iei {
                SM_CAUSE => msg.sm_cause = take_opt(buf)?,
                PDU_ADDRESS => msg.pdu_address = take_opt(buf)?,
                S_NSSAI => msg.s_nssai = take_opt(buf)?,
                QOS_FLOW_DESCRIPTIONS => msg.qos_flow_descriptions = take_opt(buf)?,
                EPCO => msg.extended_pco = take_opt(buf)?,
                DNN => msg.dnn = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

// ============================================================================
// PDU Session Establishment Reject
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentReject {
    pub cause: SmCause,
    pub back_off_timer: Option<IeGprsTimer3>,
    pub extended_pco: Option<IeExtendedProtocolConfigurationOptions>,
}

impl PduSessionEstablishmentReject {
    pub fn new(cause: SmCause) -> Self {
        Self {
            cause,
            back_off_timer: None,
            extended_pco: None,
        }
    }
}

impl IeBounds for PduSessionEstablishmentReject {
    const MIN_LEN: usize = PlainSmHeader::SIZE + 1;
    const MAX_LEN: usize = PlainSmHeader::SIZE
        + 1
        + (1 + IeGprsTimer3::MAX_LEN)
        + (1 + IeExtendedProtocolConfigurationOptions::MAX_LEN);
}

impl SmBody for PduSessionEstablishmentReject {
    const MESSAGE_TYPE: SmMessageType = SmMessageType::PduSessionEstablishmentReject;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use establishment_iei::*;
        self.cause.nas_encode(buf)?;
        put_opt(buf, BACK_OFF_TIMER, &self.back_off_timer)?;
        put_opt(buf, EPCO, &self.extended_pco)
    }

    fn body_len(&self) -> usize {
        1 + opt_len(&self.back_off_timer) + opt_len(&self.extended_pco)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use establishment_iei::*;
        let mut msg = Self::new(SmCause::nas_decode(buf)?);
        while let Some(iei) = peek_iei(buf) {
            match iei {
                BACK_OFF_TIMER => msg.back_off_timer = take_opt(buf)?,
                EPCO => msg.extended_pco = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

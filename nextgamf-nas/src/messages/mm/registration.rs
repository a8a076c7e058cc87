//! Registration messages (TS 24.501 §8.2.6 - §8.2.9)

use bytes::{Buf, BufMut};

use crate::codec::{get_u8, peek_iei, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::MmMessageType;
use crate::header::PlainMmHeader;
use crate::ies::ie1::{encode_ie1_pair, Ie5gsRegistrationType, IeNasKeySetIdentifier, InformationElement1};
use crate::ies::ie3::{IeTai, MmCause};
use crate::ies::ie4::{
    Ie5gmmCapability, Ie5gsRegistrationResult, IeGprsTimer2, IeGprsTimer3, IeNssai, IePduSessionStatus,
    IeTaiList, IeUeSecurityCapability,
};
use crate::ies::ie6::{Ie5gsMobileIdentity, IeNasMessageContainer};
use crate::messages::{opt_ie1_len, opt_len, presence_mask, put_opt, put_opt_ie1, take_opt, take_opt_ie1, MmBody};

mod registration_request_iei {
    pub const NON_CURRENT_NG_KSI: u8 = 0xC;
    pub const MM_CAPABILITY: u8 = 0x10;
    pub const UE_SECURITY_CAPABILITY: u8 = 0x2E;
    pub const REQUESTED_NSSAI: u8 = 0x2F;
    pub const UPLINK_DATA_STATUS: u8 = 0x40;
    pub const PDU_SESSION_STATUS: u8 = 0x50;
    pub const LAST_VISITED_TAI: u8 = 0x52;
    pub const NAS_MESSAGE_CONTAINER: u8 = 0x71;
    pub const ADDITIONAL_GUTI: u8 = 0x77;
}

mod registration_accept_iei {
    pub const ALLOWED_NSSAI: u8 = 0x15;
    pub const T3502: u8 = 0x16;
    pub const PDU_SESSION_STATUS: u8 = 0x50;
    pub const TAI_LIST: u8 = 0x54;
    pub const T3512: u8 = 0x5E;
    pub const GUTI: u8 = 0x77;
}

mod registration_reject_iei {
    pub const T3502: u8 = 0x16;
    pub const T3346: u8 = 0x5F;
}

// ============================================================================
// Registration Request
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrationRequest {
    pub ng_ksi: IeNasKeySetIdentifier,
    pub registration_type: Ie5gsRegistrationType,
    pub mobile_identity: Ie5gsMobileIdentity,
    pub non_current_ng_ksi: Option<IeNasKeySetIdentifier>,
    pub mm_capability: Option<Ie5gmmCapability>,
    pub ue_security_capability: Option<IeUeSecurityCapability>,
    pub requested_nssai: Option<IeNssai>,
    pub last_visited_tai: Option<IeTai>,
    pub uplink_data_status: Option<IePduSessionStatus>,
    pub pdu_session_status: Option<IePduSessionStatus>,
    pub nas_message_container: Option<IeNasMessageContainer>,
    pub additional_guti: Option<Ie5gsMobileIdentity>,
}

impl RegistrationRequest {
    pub fn new(
        registration_type: Ie5gsRegistrationType,
        ng_ksi: IeNasKeySetIdentifier,
        mobile_identity: Ie5gsMobileIdentity,
    ) -> Self {
        Self {
            registration_type,
            ng_ksi,
            mobile_identity,
            ..Default::default()
        }
    }

    pub fn presence_mask(&self) -> u32 {
        presence_mask(&[
            self.non_current_ng_ksi.is_some(),
            self.mm_capability.is_some(),
            self.ue_security_capability.is_some(),
            self.requested_nssai.is_some(),
            self.last_visited_tai.is_some(),
            self.uplink_data_status.is_some(),
            self.pdu_session_status.is_some(),
            self.nas_message_container.is_some(),
            self.additional_guti.is_some(),
        ])
    }
}

impl IeBounds for RegistrationRequest {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1 + Ie5gsMobileIdentity::MIN_LEN;
    const MAX_LEN: usize = PlainMmHeader::SIZE
        + 1
        + Ie5gsMobileIdentity::MAX_LEN
        + 1
        + (1 + Ie5gmmCapability::MAX_LEN)
        + (1 + IeUeSecurityCapability::MAX_LEN)
        + (1 + IeNssai::MAX_LEN)
        + (1 + IeTai::MAX_LEN)
        + 2 * (1 + IePduSessionStatus::MAX_LEN)
        + (1 + IeNasMessageContainer::MAX_LEN)
        + (1 + Ie5gsMobileIdentity::MAX_LEN);
}

impl MmBody for RegistrationRequest {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::RegistrationRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use registration_request_iei::*;
        encode_ie1_pair(&self.ng_ksi, &self.registration_type, buf);
        self.mobile_identity.nas_encode(buf)?;
        put_opt_ie1(buf, NON_CURRENT_NG_KSI, &self.non_current_ng_ksi);
        put_opt(buf, MM_CAPABILITY, &self.mm_capability)?;
        put_opt(buf, UE_SECURITY_CAPABILITY, &self.ue_security_capability)?;
        put_opt(buf, REQUESTED_NSSAI, &self.requested_nssai)?;
        put_opt(buf, LAST_VISITED_TAI, &self.last_visited_tai)?;
        put_opt(buf, UPLINK_DATA_STATUS, &self.uplink_data_status)?;
        put_opt(buf, PDU_SESSION_STATUS, &self.pdu_session_status)?;
        put_opt(buf, NAS_MESSAGE_CONTAINER, &self.nas_message_container)?;
        put_opt(buf, ADDITIONAL_GUTI, &self.additional_guti)?;
        Ok(())
    }

    fn body_len(&self) -> usize {
        1 + self.mobile_identity.encoded_len()
            + opt_ie1_len(&self.non_current_ng_ksi)
            + opt_len(&self.mm_capability)
            + opt_len(&self.ue_security_capability)
            + opt_len(&self.requested_nssai)
            + opt_len(&self.last_visited_tai)
            + opt_len(&self.uplink_data_status)
            + opt_len(&self.pdu_session_status)
            + opt_len(&self.nas_message_container)
            + opt_len(&self.additional_guti)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use registration_request_iei::*;
        let first_octet = get_u8(buf)?;
        let ng_ksi = IeNasKeySetIdentifier::decode_value(first_octet >> 4)?;
        let registration_type = Ie5gsRegistrationType::decode_value(first_octet & 0x0F)?;
        let mobile_identity = Ie5gsMobileIdentity::nas_decode(buf)?;
        let mut msg = Self::new(registration_type, ng_ksi, mobile_identity);

        while let Some(iei) = peek_iei(buf) {
            match iei {
                iei if iei >> 4 == NON_CURRENT_NG_KSI => msg.non_current_ng_ksi = take_opt_ie1(buf)?,
                MM_CAPABILITY => msg.mm_capability = take_opt(buf)?,
                UE_SECURITY_CAPABILITY => msg.ue_security_capability = take_opt(buf)?,
                REQUESTED_NSSAI => msg.requested_nssai = take_opt(buf)?,
                LAST_VISITED_TAI => msg.last_visited_tai = take_opt(buf)?,
                UPLINK_DATA_STATUS => msg.uplink_data_status = take_opt(buf)?,
                PDU_SESSION_STATUS => msg.pdu_session_status = take_opt(buf)?,
                NAS_MESSAGE_CONTAINER => msg.nas_message_container = take_opt(buf)?,
                ADDITIONAL_GUTI => msg.additional_guti = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

// ============================================================================
// Registration Accept
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrationAccept {
    pub registration_result: Ie5gsRegistrationResult,
    pub guti: Option<Ie5gsMobileIdentity>,
    pub tai_list: Option<IeTaiList>,
    pub allowed_nssai: Option<IeNssai>,
    pub pdu_session_status: Option<IePduSessionStatus>,
    pub t3512: Option<IeGprsTimer3>,
    pub t3502: Option<IeGprsTimer2>,
}

impl RegistrationAccept {
    pub fn new(registration_result: Ie5gsRegistrationResult) -> Self {
        Self {
            registration_result,
            ..Default::default()
        }
    }

    pub fn presence_mask(&self) -> u32 {
        presence_mask(&[
            self.guti.is_some(),
            self.tai_list.is_some(),
            self.allowed_nssai.is_some(),
            self.pdu_session_status.is_some(),
            self.t3512.is_some(),
            self.t3502.is_some(),
        ])
    }
}

impl IeBounds for RegistrationAccept {
    const MIN_LEN: usize = PlainMmHeader::SIZE + Ie5gsRegistrationResult::MIN_LEN;
    const MAX_LEN: usize = PlainMmHeader::SIZE
        + Ie5gsRegistrationResult::MAX_LEN
        + (1 + Ie5gsMobileIdentity::MAX_LEN)
        + (1 + IeTaiList::MAX_LEN)
        + (1 + IeNssai::MAX_LEN)
        + (1 + IePduSessionStatus::MAX_LEN)
        + (1 + IeGprsTimer3::MAX_LEN)
        + (1 + IeGprsTimer2::MAX_LEN);
}

impl MmBody for RegistrationAccept {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::RegistrationAccept;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use registration_accept_iei::*;
        self.registration_result.nas_encode(buf)?;
        put_opt(buf, GUTI, &self.guti)?;
        put_opt(buf, TAI_LIST, &self.tai_list)?;
        put_opt(buf, ALLOWED_NSSAI, &self.allowed_nssai)?;
        put_opt(buf, PDU_SESSION_STATUS, &self.pdu_session_status)?;
        put_opt(buf, T3512, &self.t3512)?;
        put_opt(buf, T3502, &self.t3502)?;
        Ok(())
    }

    fn body_len(&self) -> usize {
        self.registration_result.encoded_len()
            + opt_len(&self.guti)
            + opt_len(&self.tai_list)
            + opt_len(&self.allowed_nssai)
            + opt_len(&self.pdu_session_status)
            + opt_len(&self.t3512)
            + opt_len(&self.t3502)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use registration_accept_iei::*;
        let mut msg = Self::new(Ie5gsRegistrationResult::nas_decode(buf)?);
        while let Some(iei) = peek_iei(buf) {
            match iei {
                GUTI => msg.guti = take_opt(buf)?,
                TAI_LIST => msg.tai_list = take_opt(buf)?,
                ALLOWED_NSSAI => msg.allowed_nssai = take_opt(buf)?,
                PDU_SESSION_STATUS => msg.pdu_session_status = take_opt(buf)?,
                T3512 => msg.t3512 = take_opt(buf)?,
                T3502 => msg.t3502 = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

// ============================================================================
// Registration Complete
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistrationComplete;

impl IeBounds for RegistrationComplete {
    const MIN_LEN: usize = PlainMmHeader::SIZE;
    const MAX_LEN: usize = PlainMmHeader::SIZE;
}

impl MmBody for RegistrationComplete {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::RegistrationComplete;

    fn encode_body<B: BufMut>(&self, _buf: &mut B) -> CodecResult<()> {
        Ok(())
    }

    fn body_len(&self) -> usize {
        0
    }

    fn decode_body<B: Buf>(_buf: &mut B) -> CodecResult<Self> {
        Ok(Self)
    }
}

// ============================================================================
// Registration Reject
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationReject {
    pub cause: MmCause,
    pub t3346: Option<IeGprsTimer2>,
    pub t3502: Option<IeGprsTimer2>,
}

impl RegistrationReject {
    pub fn new(cause: MmCause) -> Self {
        Self {
            cause,
            t3346: None,
            t3502: None,
        }
    }
}

impl IeBounds for RegistrationReject {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1;
    const MAX_LEN: usize = PlainMmHeader::SIZE + 1 + 2 * (1 + IeGprsTimer2::MAX_LEN);
}

impl MmBody for RegistrationReject {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::RegistrationReject;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use registration_reject_iei::*;
        self.cause.nas_encode(buf)?;
        put_opt(buf, T3346, &self.t3346)?;
        put_opt(buf, T3502, &self.t3502)?;
        Ok(())
    }

    fn body_len(&self) -> usize {
        1 + opt_len(&self.t3346) + opt_len(&self.t3502)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use registration_reject_iei::*;
        let mut msg = Self::new(MmCause::nas_decode(buf)?);
        while let Some(iei) = peek_iei(buf) {
            match iei {
                T3346 => msg.t3346 = take_opt(buf)?,
                T3502 => msg.t3502 = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

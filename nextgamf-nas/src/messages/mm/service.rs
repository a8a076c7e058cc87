//! Service request messages (TS 24.501 §8.2.16 - §8.2.18)

use bytes::{Buf, BufMut};

use crate::codec::{get_u8, peek_iei, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::MmMessageType;
use crate::header::PlainMmHeader;
use crate::ies::ie1::{encode_ie1_pair, IeNasKeySetIdentifier, InformationElement1, ServiceType};
use crate::ies::ie3::MmCause;
use crate::ies::ie4::{IeGprsTimer2, IePduSessionStatus};
use crate::ies::ie6::{Ie5gsMobileIdentity, IeNasMessageContainer};
use crate::messages::{opt_len, presence_mask, put_opt, take_opt, MmBody};

mod service_iei {
    pub const PDU_SESSION_REACTIVATION_RESULT: u8 = 0x26;
    pub const UPLINK_DATA_STATUS: u8 = 0x40;
    pub const PDU_SESSION_STATUS: u8 = 0x50;
    pub const T3346: u8 = 0x5F;
    pub const NAS_MESSAGE_CONTAINER: u8 = 0x71;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceRequest {
    pub ng_ksi: IeNasKeySetIdentifier,
    pub service_type: ServiceType,
    /// Normally a 5G-S-TMSI
    pub s_tmsi: Ie5gsMobileIdentity,
    pub uplink_data_status: Option<IePduSessionStatus>,
    pub pdu_session_status: Option<IePduSessionStatus>,
    pub nas_message_container: Option<IeNasMessageContainer>,
}

impl ServiceRequest {
    pub fn presence_mask(&self) -> u32 {
        presence_mask(&[
            self.uplink_data_status.is_some(),
            self.pdu_session_status.is_some(),
            self.nas_message_container.is_some(),
        ])
    }
}

impl IeBounds for ServiceRequest {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1 + Ie5gsMobileIdentity::MIN_LEN;
    const MAX_LEN: usize = PlainMmHeader::SIZE
        + 1
        + Ie5gsMobileIdentity::MAX_LEN
        + 2 * (1 + IePduSessionStatus::MAX_LEN)
        + (1 + IeNasMessageContainer::MAX_LEN);
}

impl MmBody for ServiceRequest {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::ServiceRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use service_iei::*;
        encode_ie1_pair(&self.ng_ksi, &self.service_type, buf);
        self.s_tmsi.nas_encode(buf)?;
        put_opt(buf, UPLINK_DATA_STATUS, &self.uplink_data_status)?;
        put_opt(buf, PDU_SESSION_STATUS, &self.pdu_session_status)?;
        put_opt(buf, NAS_MESSAGE_CONTAINER, &self.nas_message_container)
    }

    fn body_len(&self) -> usize {
        1 + self.s_tmsi.encoded_len()
            + opt_len(&self.uplink_data_status)
            + opt_len(&self.pdu_session_status)
            + opt_len(&self.nas_message_container)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use service_iei::*;
        let first_octet = get_u8(buf)?;
        let mut msg = Self {
            ng_ksi: IeNasKeySetIdentifier::decode_value(first_octet >> 4)?,
            service_type: ServiceType::decode_value(first_octet & 0x0F)?,
            s_tmsi: Ie5gsMobileIdentity::nas_decode(buf)?,
            ..Default::default()
        };
        while let Some(iei) = peek_iei(buf) {
            match iei {
                UPLINK_DATA_STATUS => msg.uplink_data_status = take_opt(buf)?,
                PDU_SESSION_STATUS => msg.pdu_session_status = take_opt(buf)?,
                NAS_MESSAGE_CONTAINER => msg.nas_message_container = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceAccept {
    pub pdu_session_status: Option<IePduSessionStatus>,
    pub pdu_session_reactivation_result: Option<IePduSessionStatus>,
}

impl IeBounds for ServiceAccept {
    const MIN_LEN: usize = PlainMmHeader::SIZE;
    const MAX_LEN: usize = PlainMmHeader::SIZE + 2 * (1 + IePduSessionStatus::MAX_LEN);
}

impl MmBody for ServiceAccept {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::ServiceAccept;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use service_iei::*;
        put_opt(buf, PDU_SESSION_STATUS, &self.pdu_session_status)?;
        put_opt(buf, PDU_SESSION_REACTIVATION_RESULT, &self.pdu_session_reactivation_result)
    }

    fn body_len(&self) -> usize {
        opt_len(&self.pdu_session_status) + opt_len(&self.pdu_session_reactivation_result)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use service_iei::*;
        let mut msg = Self::default();
        while let Some(iei) = peek_iei(buf) {
            match iei {
                PDU_SESSION_STATUS => msg.pdu_session_status = take_opt(buf)?,
                PDU_SESSION_REACTIVATION_RESULT => msg.pdu_session_reactivation_result = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceReject {
    pub cause: MmCause,
    pub pdu_session_status: Option<IePduSessionStatus>,
    pub t3346: Option<IeGprsTimer2>,
}

impl ServiceReject {
    pub fn new(cause: MmCause) -> Self {
        Self {
            cause,
            pdu_session_status: None,
            t3346: None,
        }
    }
}

impl IeBounds for ServiceReject {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1;
    const MAX_LEN: usize =
        PlainMmHeader::SIZE + 1 + (1 + IePduSessionStatus::MAX_LEN) + (1 + IeGprsTimer2::MAX_LEN);
}

impl MmBody for ServiceReject {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::ServiceReject;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use service_iei::*;
        self.cause.nas_encode(buf)?;
        put_opt(buf, PDU_SESSION_STATUS, &self.pdu_session_status)?;
        put_opt(buf, T3346, &self.t3346)
    }

    fn body_len(&self) -> usize {
        1 + opt_len(&self.pdu_session_status) + opt_len(&self.t3346)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use service_iei::*;
        let mut msg = Self::new(MmCause::nas_decode(buf)?);
        while let Some(iei) = peek_iei(buf) {
            match iei {
                PDU_SESSION_STATUS => msg.pdu_session_status = take_opt(buf)?,
                T3346 => msg.t3346 = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

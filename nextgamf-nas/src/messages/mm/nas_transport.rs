//! UL / DL NAS transport (TS 24.501 §8.2.10 - §8.2.11)

use bytes::{Buf, BufMut};

use crate::codec::{get_u8, peek_iei, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::MmMessageType;
use crate::header::PlainMmHeader;
use crate::ies::ie1::{encode_ie1_pair, InformationElement1, PayloadContainerType, RequestType, Spare};
use crate::ies::ie3::MmCause;
use crate::ies::ie4::{IeDnn, IeGprsTimer3, IeSNssai};
use crate::ies::ie6::IePayloadContainer;
use crate::messages::{opt_ie1_len, opt_len, put_opt, put_opt_ie1, take_opt, take_opt_ie1, MmBody};

mod nas_transport_iei {
    pub const PDU_SESSION_ID: u8 = 0x12;
    pub const OLD_PDU_SESSION_ID: u8 = 0x59;
    pub const REQUEST_TYPE: u8 = 0x08;
    pub const S_NSSAI: u8 = 0x22;
    pub const DNN: u8 = 0x25;
    pub const MM_CAUSE: u8 = 0x58;
    pub const BACK_OFF_TIMER: u8 = 0x37;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UlNasTransport {
    pub payload_container_type: PayloadContainerType,
    pub payload_container: IePayloadContainer,
    pub pdu_session_id: Option<u8>,
    pub old_pdu_session_id: Option<u8>,
    pub request_type: Option<RequestType>,
    pub s_nssai: Option<IeSNssai>,
    pub dnn: Option<IeDnn>,
}

impl UlNasTransport {
    /// N1 SM container for one PDU session
    pub fn for_session(pdu_session_id: u8, payload: Vec<u8>) -> Self {
        Self {
            payload_container_type: PayloadContainerType::N1SmInformation,
            payload_container: IePayloadContainer(payload),
            pdu_session_id: Some(pdu_session_id),
            ..Default::default()
        }
    }
}

impl IeBounds for UlNasTransport {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1 + IePayloadContainer::MIN_LEN;
    const MAX_LEN: usize = PlainMmHeader::SIZE
        + 1
        + IePayloadContainer::MAX_LEN
        + 2 * 2
        + 1
        + (1 + IeSNssai::MAX_LEN)
        + (1 + IeDnn::MAX_LEN);
}

impl MmBody for UlNasTransport {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::UlNasTransport;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use nas_transport_iei::*;
        encode_ie1_pair(&Spare, &self.payload_container_type, buf);
        self.payload_container.nas_encode(buf)?;
        put_opt(buf, PDU_SESSION_ID, &self.pdu_session_id)?;
        put_opt(buf, OLD_PDU_SESSION_ID, &self.old_pdu_session_id)?;
        put_opt_ie1(buf, REQUEST_TYPE, &self.request_type);
        put_opt(buf, S_NSSAI, &self.s_nssai)?;
        put_opt(buf, DNN, &self.dnn)
    }

    fn body_len(&self) -> usize {
        1 + self.payload_container.encoded_len()
            + opt_len(&self.pdu_session_id)
            + opt_len(&self.old_pdu_session_id)
            + opt_ie1_len(&self.request_type)
            + opt_len(&self.s_nssai)
            + opt_len(&self.dnn)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use nas_transport_iei::*;
        let payload_container_type = PayloadContainerType::decode_value(get_u8(buf)? & 0x0F)?;
        let mut msg = Self {
            payload_container_type,
            payload_container: IePayloadContainer::nas_decode(buf)?,
            ..Default::default()
        };
        while let Some(iei) = peek_iei(buf) {
            match iei {
                PDU_SESSION_ID => msg.pdu_session_id = take_opt(buf)?,
                OLD_PDU_SESSION_ID => msg.old_pdu_session_id = take_opt(buf)?,
                iei if iei >> 4 == REQUEST_TYPE => msg.request_type = take_opt_ie1(buf)?,
                S_NSSAI => msg.s_nssai = take_opt(buf)?,
                DNN => msg.dnn = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DlNasTransport {
    pub payload_container_type: PayloadContainerType,
    pub payload_container: IePayloadContainer,
    pub pdu_session_id: Option<u8>,
    /// Set when the payload could not be forwarded
    pub mm_cause: Option<MmCause>,
    pub back_off_timer: Option<IeGprsTimer3>,
}

impl DlNasTransport {
    pub fn for_session(pdu_session_id: u8, payload: Vec<u8>) -> Self {
        Self {
            payload_container_type: PayloadContainerType::N1SmInformation,
            payload_container: IePayloadContainer(payload),
            pdu_session_id: Some(pdu_session_id),
            ..Default::default()
        }
    }
}

impl IeBounds for DlNasTransport {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1 + IePayloadContainer::MIN_LEN;
    const MAX_LEN: usize =
        PlainMmHeader::SIZE + 1 + IePayloadContainer::MAX_LEN + 2 + 2 + (1 + IeGprsTimer3::MAX_LEN);
}

impl MmBody for DlNasTransport {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::DlNasTransport;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use nas_transport_iei::*;
        encode_ie1_pair(&Spare, &self.payload_container_type, buf);
        self.payload_container.nas_encode(buf)?;
        put_opt(buf, PDU_SESSION_ID, &self.pdu_session_id)?;
        put_opt(buf, MM_CAUSE, &self.mm_cause)?;
        put_opt(buf, BACK_OFF_TIMER, &self.back_off_timer)
    }

    fn body_len(&self) -> usize {
        1 + self.payload_container.encoded_len()
            + opt_len(&self.pdu_session_id)
            + opt_len(&self.mm_cause)
            + opt_len(&self.back_off_timer)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use nas_transport_iei::*;
        let payload_container_type = PayloadContainerType::decode_value(get_u8(buf)? & 0x0F)?;
        let mut msg = Self {
            payload_container_type,
            payload_container: IePayloadContainer::nas_decode(buf)?,
            ..Default::default()
        };
        while let Some(iei) = peek_iei(buf) {
            match iei {
                PDU_SESSION_ID => msg.pdu_session_id = take_opt(buf)?,
                MM_CAUSE => msg.mm_cause = take_opt(buf)?,
                BACK_OFF_TIMER => msg.back_off_timer = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

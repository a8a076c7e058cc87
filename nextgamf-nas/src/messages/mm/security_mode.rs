//! Security mode control (TS 24.501 §8.2.25 - §8.2.27)

use bytes::{Buf, BufMut};

use crate::codec::{get_u8, peek_iei, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::MmMessageType;
use crate::header::PlainMmHeader;
use crate::ies::ie1::{encode_ie1_pair, IeImeisvRequest, IeNasKeySetIdentifier, InformationElement1, Spare};
use crate::ies::ie3::{IeNasSecurityAlgorithms, MmCause};
use crate::ies::ie4::{IeAbba, IeUeSecurityCapability};
use crate::ies::ie6::{Ie5gsMobileIdentity, IeNasMessageContainer};
use crate::messages::{opt_ie1_len, opt_len, put_opt, put_opt_ie1, take_opt, take_opt_ie1, MmBody};

mod security_mode_iei {
    pub const IMEISV_REQUEST: u8 = 0x0E;
    pub const ABBA: u8 = 0x38;
    pub const IMEISV: u8 = 0x77;
    pub const NAS_MESSAGE_CONTAINER: u8 = 0x71;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityModeCommand {
    pub selected_algorithms: IeNasSecurityAlgorithms,
    pub ng_ksi: IeNasKeySetIdentifier,
    /// Echo of the capabilities the UE sent in registration
    pub replayed_ue_security_capability: IeUeSecurityCapability,
    pub imeisv_request: Option<IeImeisvRequest>,
    pub abba: Option<IeAbba>,
}

impl IeBounds for SecurityModeCommand {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 2 + IeUeSecurityCapability::MIN_LEN;
    const MAX_LEN: usize =
        PlainMmHeader::SIZE + 2 + IeUeSecurityCapability::MAX_LEN + 1 + (1 + IeAbba::MAX_LEN);
}

impl MmBody for SecurityModeCommand {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::SecurityModeCommand;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use security_mode_iei::*;
        self.selected_algorithms.nas_encode(buf)?;
        encode_ie1_pair(&Spare, &self.ng_ksi, buf);
        self.replayed_ue_security_capability.nas_encode(buf)?;
        put_opt_ie1(buf, IMEISV_REQUEST, &self.imeisv_request);
        put_opt(buf, ABBA, &self.abba)
    }

    fn body_len(&self) -> usize {
        2 + self.replayed_ue_security_capability.encoded_len()
            + opt_ie1_len(&self.imeisv_request)
            + opt_len(&self.abba)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use security_mode_iei::*;
        let selected_algorithms = IeNasSecurityAlgorithms::nas_decode(buf)?;
        let ng_ksi = IeNasKeySetIdentifier::decode_value(get_u8(buf)? & 0x0F)?;
        let mut msg = Self {
            selected_algorithms,
            ng_ksi,
            replayed_ue_security_capability: IeUeSecurityCapability::nas_decode(buf)?,
            ..Default::default()
        };
        while let Some(iei) = peek_iei(buf) {
            match iei {
                iei if iei >> 4 == IMEISV_REQUEST => msg.imeisv_request = take_opt_ie1(buf)?,
                ABBA => msg.abba = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityModeComplete {
    pub imeisv: Option<Ie5gsMobileIdentity>,
    /// Complete initial message, replayed under protection
    pub nas_message_container: Option<IeNasMessageContainer>,
}

impl IeBounds for SecurityModeComplete {
    const MIN_LEN: usize = PlainMmHeader::SIZE;
    const MAX_LEN: usize = PlainMmHeader::SIZE
        + (1 + Ie5gsMobileIdentity::MAX_LEN)
        + (1 + IeNasMessageContainer::MAX_LEN);
}

impl MmBody for SecurityModeComplete {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::SecurityModeComplete;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use security_mode_iei::*;
        put_opt(buf, IMEISV, &self.imeisv)?;
        put_opt(buf, NAS_MESSAGE_CONTAINER, &self.nas_message_container)
    }

    fn body_len(&self) -> usize {
        opt_len(&self.imeisv) + opt_len(&self.nas_message_container)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use security_mode_iei::*;
        let mut msg = Self::default();
        while let Some(iei) = peek_iei(buf) {
            match iei {
                IMEISV => msg.imeisv = take_opt(buf)?,
                NAS_MESSAGE_CONTAINER => msg.nas_message_container = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityModeReject {
    pub cause: MmCause,
}

impl IeBounds for SecurityModeReject {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1;
    const MAX_LEN: usize = PlainMmHeader::SIZE + 1;
}

impl MmBody for SecurityModeReject {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::SecurityModeReject;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.cause.nas_encode(buf)
    }

    fn body_len(&self) -> usize {
        1
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self {
            cause: MmCause::nas_decode(buf)?,
        })
    }
}

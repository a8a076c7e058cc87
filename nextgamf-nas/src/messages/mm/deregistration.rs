//! De-registration messages, UE originating (TS 24.501 §8.2.12 - §8.2.13)

use bytes::{Buf, BufMut};

use crate::codec::{get_u8, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::MmMessageType;
use crate::header::PlainMmHeader;
use crate::ies::ie1::{encode_ie1_pair, IeDeRegistrationType, IeNasKeySetIdentifier, InformationElement1};
use crate::ies::ie6::Ie5gsMobileIdentity;
use crate::messages::MmBody;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeregistrationRequestUeOriginating {
    pub ng_ksi: IeNasKeySetIdentifier,
    pub deregistration_type: IeDeRegistrationType,
    pub mobile_identity: Ie5gsMobileIdentity,
}

impl IeBounds for DeregistrationRequestUeOriginating {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1 + Ie5gsMobileIdentity::MIN_LEN;
    const MAX_LEN: usize = PlainMmHeader::SIZE + 1 + Ie5gsMobileIdentity::MAX_LEN;
}

impl MmBody for DeregistrationRequestUeOriginating {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::DeregistrationRequestUeOriginating;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        encode_ie1_pair(&self.ng_ksi, &self.deregistration_type, buf);
        self.mobile_identity.nas_encode(buf)
    }

    fn body_len(&self) -> usize {
        1 + self.mobile_identity.encoded_len()
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let first_octet = get_u8(buf)?;
        Ok(Self {
            ng_ksi: IeNasKeySetIdentifier::decode_value(first_octet >> 4)?,
            deregistration_type: IeDeRegistrationType::decode_value(first_octet & 0x0F)?,
            mobile_identity: Ie5gsMobileIdentity::nas_decode(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeregistrationAcceptUeOriginating;

impl IeBounds for DeregistrationAcceptUeOriginating {
    const MIN_LEN: usize = PlainMmHeader::SIZE;
    const MAX_LEN: usize = PlainMmHeader::SIZE;
}

impl MmBody for DeregistrationAcceptUeOriginating {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::DeregistrationAcceptUeOriginating;

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

//! Identity request / response (TS 24.501 §8.2.21 - §8.2.22)

use bytes::{Buf, BufMut};

use crate::codec::{get_u8, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::MmMessageType;
use crate::header::PlainMmHeader;
use crate::ies::ie1::{encode_ie1_pair, IdentityType, InformationElement1, Spare};
use crate::ies::ie6::Ie5gsMobileIdentity;
use crate::messages::MmBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdentityRequest {
    pub identity_type: IdentityType,
}

impl IeBounds for IdentityRequest {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1;
    const MAX_LEN: usize = PlainMmHeader::SIZE + 1;
}

impl MmBody for IdentityRequest {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::IdentityRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        encode_ie1_pair(&Spare, &self.identity_type, buf);
        Ok(())
    }

    fn body_len(&self) -> usize {
        1
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self {
            identity_type: IdentityType::decode_value(get_u8(buf)? & 0x0F)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdentityResponse {
    pub mobile_identity: Ie5gsMobileIdentity,
}

impl IeBounds for IdentityResponse {
    const MIN_LEN: usize = PlainMmHeader::SIZE + Ie5gsMobileIdentity::MIN_LEN;
    const MAX_LEN: usize = PlainMmHeader::SIZE + Ie5gsMobileIdentity::MAX_LEN;
}

impl MmBody for IdentityResponse {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::IdentityResponse;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.mobile_identity.nas_encode(buf)
    }

    fn body_len(&self) -> usize {
        self.mobile_identity.encoded_len()
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self {
            mobile_identity: Ie5gsMobileIdentity::nas_decode(buf)?,
        })
    }
}

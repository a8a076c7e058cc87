//! Authentication messages (TS 24.501 §8.2.1 - §8.2.5)

use bytes::{Buf, BufMut};

use crate::codec::{get_u8, peek_iei, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::MmMessageType;
use crate::header::PlainMmHeader;
use crate::ies::ie1::{encode_ie1_pair, IeNasKeySetIdentifier, InformationElement1, Spare};
use crate::ies::ie3::{IeRand, MmCause};
use crate::ies::ie4::{IeAbba, IeAuthenticationFailureParameter, IeAuthenticationResponseParameter, IeAutn};
use crate::messages::{opt_len, put_opt, take_opt, MmBody};

mod authentication_iei {
    pub const AUTN: u8 = 0x20;
    pub const RAND: u8 = 0x21;
    pub const RESPONSE_PARAMETER: u8 = 0x2D;
    pub const FAILURE_PARAMETER: u8 = 0x30;
}

// ============================================================================
// Authentication Request
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticationRequest {
    pub ng_ksi: IeNasKeySetIdentifier,
    pub abba: IeAbba,
    pub rand: Option<IeRand>,
    pub autn: Option<IeAutn>,
}

impl IeBounds for AuthenticationRequest {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1 + IeAbba::MIN_LEN;
    const MAX_LEN: usize =
        PlainMmHeader::SIZE + 1 + IeAbba::MAX_LEN + (1 + IeRand::MAX_LEN) + (1 + IeAutn::MAX_LEN);
}

impl MmBody for AuthenticationRequest {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::AuthenticationRequest;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use authentication_iei::*;
        encode_ie1_pair(&Spare, &self.ng_ksi, buf);
        self.abba.nas_encode(buf)?;
        put_opt(buf, RAND, &self.rand)?;
        put_opt(buf, AUTN, &self.autn)
    }

    fn body_len(&self) -> usize {
        1 + self.abba.encoded_len() + opt_len(&self.rand) + opt_len(&self.autn)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use authentication_iei::*;
        let ng_ksi = IeNasKeySetIdentifier::decode_value(get_u8(buf)? & 0x0F)?;
        let mut msg = Self {
            ng_ksi,
            abba: IeAbba::nas_decode(buf)?,
            ..Default::default()
        };
        while let Some(iei) = peek_iei(buf) {
            match iei {
                RAND => msg.rand = take_opt(buf)?,
                AUTN => msg.autn = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

// ============================================================================
// Authentication Response
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticationResponse {
    /// RES*
    pub response_parameter: Option<IeAuthenticationResponseParameter>,
}

impl IeBounds for AuthenticationResponse {
    const MIN_LEN: usize = PlainMmHeader::SIZE;
    const MAX_LEN: usize = PlainMmHeader::SIZE + 1 + IeAuthenticationResponseParameter::MAX_LEN;
}

impl MmBody for AuthenticationResponse {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::AuthenticationResponse;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        put_opt(buf, authentication_iei::RESPONSE_PARAMETER, &self.response_parameter)
    }

    fn body_len(&self) -> usize {
        opt_len(&self.response_parameter)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let mut msg = Self::default();
        while let Some(iei) = peek_iei(buf) {
            match iei {
                authentication_iei::RESPONSE_PARAMETER => msg.response_parameter = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

// ============================================================================
// Authentication Reject
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthenticationReject;

impl IeBounds for AuthenticationReject {
    const MIN_LEN: usize = PlainMmHeader::SIZE;
    const MAX_LEN: usize = PlainMmHeader::SIZE;
}

impl MmBody for AuthenticationReject {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::AuthenticationReject;

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
// Authentication Failure
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationFailure {
    pub cause: MmCause,
    /// AUTS, present with synch failure
    pub failure_parameter: Option<IeAuthenticationFailureParameter>,
}

impl IeBounds for AuthenticationFailure {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1;
    const MAX_LEN: usize = PlainMmHeader::SIZE + 1 + 1 + IeAuthenticationFailureParameter::MAX_LEN;
}

impl MmBody for AuthenticationFailure {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::AuthenticationFailure;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.cause.nas_encode(buf)?;
        put_opt(buf, authentication_iei::FAILURE_PARAMETER, &self.failure_parameter)
    }

    fn body_len(&self) -> usize {
        1 + opt_len(&self.failure_parameter)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let mut msg = Self {
            cause: MmCause::nas_decode(buf)?,
            failure_parameter: None,
        };
        while let Some(iei) = peek_iei(buf) {
            match iei {
                authentication_iei::FAILURE_PARAMETER => msg.failure_parameter = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

//! NAS message headers (TS 24.501 §9.1)
//!
//! ```text
//! plain 5GMM   | EPD | spare/SHT | message type |
//! plain 5GSM   | EPD | PDU session id | PTI | message type |
//! secured 5GMM | EPD | spare/SHT | MAC (4) | SQN | plain 5GMM message |
//! ```

use bytes::{Buf, BufMut};

use crate::codec::{ensure_remaining, CodecError, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::{ExtendedProtocolDiscriminator, MmMessageType, SecurityHeaderType, SmMessageType};

fn decode_epd(octet: u8) -> CodecResult<ExtendedProtocolDiscriminator> {
    ExtendedProtocolDiscriminator::try_from(octet).map_err(|_| CodecError::UnsupportedProtocol(octet))
}

fn decode_sht(octet: u8) -> CodecResult<SecurityHeaderType> {
    SecurityHeaderType::try_from(octet & 0x0F)
        .map_err(|_| CodecError::InvalidSecurityHeaderType(octet))
}

/// Reads the discriminator and security header type without consuming.
pub fn peek_header(data: &[u8]) -> CodecResult<(ExtendedProtocolDiscriminator, SecurityHeaderType)> {
    if data.len() < 2 {
        return Err(CodecError::BufferTooShort {
            expected: 2,
            actual: data.len(),
        });
    }
    let epd = decode_epd(data[0])?;
    let sht = match epd {
        ExtendedProtocolDiscriminator::MobilityManagement => decode_sht(data[1])?,
        // 5GSM messages carry the PDU session id in the second octet
        ExtendedProtocolDiscriminator::SessionManagement => SecurityHeaderType::NotProtected,
    };
    Ok((epd, sht))
}

/// Plain 5GMM header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainMmHeader {
    pub message_type: MmMessageType,
}

impl PlainMmHeader {
    pub const SIZE: usize = 3;

    pub fn new(message_type: MmMessageType) -> Self {
        Self { message_type }
    }
}

impl IeBounds for PlainMmHeader {
    const MIN_LEN: usize = Self::SIZE;
    const MAX_LEN: usize = Self::SIZE;
}

impl NasEncode for PlainMmHeader {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(ExtendedProtocolDiscriminator::MobilityManagement.into());
        buf.put_u8(SecurityHeaderType::NotProtected.into());
        buf.put_u8(self.message_type.into());
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        Self::SIZE
    }
}

impl NasDecode for PlainMmHeader {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, Self::SIZE)?;
        let epd_octet = buf.get_u8();
        if decode_epd(epd_octet)? != ExtendedProtocolDiscriminator::MobilityManagement {
            return Err(CodecError::UnexpectedElement(epd_octet));
        }
        let sht_octet = buf.get_u8();
        if decode_sht(sht_octet)?.is_protected() {
            return Err(CodecError::InvalidSecurityHeaderType(sht_octet));
        }
        let mt = buf.get_u8();
        let message_type = MmMessageType::try_from(mt).map_err(|_| CodecError::InvalidMessageType(mt))?;
        Ok(Self { message_type })
    }
}

/// Plain 5GSM header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainSmHeader {
    pub pdu_session_id: u8,
    /// Procedure transaction identity
    pub pti: u8,
    pub message_type: SmMessageType,
}

impl PlainSmHeader {
    pub const SIZE: usize = 4;

    pub fn new(pdu_session_id: u8, pti: u8, message_type: SmMessageType) -> Self {
        Self {
            pdu_session_id,
            pti,
            message_type,
        }
    }
}

impl IeBounds for PlainSmHeader {
    const MIN_LEN: usize = Self::SIZE;
    const MAX_LEN: usize = Self::SIZE;
}

impl NasEncode for PlainSmHeader {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(ExtendedProtocolDiscriminator::SessionManagement.into());
        buf.put_u8(self.pdu_session_id);
        buf.put_u8(self.pti);
        buf.put_u8(self.message_type.into());
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        Self::SIZE
    }
}

impl NasDecode for PlainSmHeader {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, Self::SIZE)?;
        let epd_octet = buf.get_u8();
        if decode_epd(epd_octet)? != ExtendedProtocolDiscriminator::SessionManagement {
            return Err(CodecError::UnexpectedElement(epd_octet));
        }
        let pdu_session_id = buf.get_u8();
        let pti = buf.get_u8();
        let mt = buf.get_u8();
        let message_type = SmMessageType::try_from(mt).map_err(|_| CodecError::InvalidMessageType(mt))?;
        Ok(Self {
            pdu_session_id,
            pti,
            message_type,
        })
    }
}

/// Security protected 5GMM header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecuredHeader {
    pub security_header_type: SecurityHeaderType,
    pub mac: [u8; 4],
    /// Low 8 bits of the NAS COUNT
    pub sequence_number: u8,
}

impl SecuredHeader {
    pub const SIZE: usize = 7;

    pub fn new(security_header_type: SecurityHeaderType, mac: [u8; 4], sequence_number: u8) -> Self {
        Self {
            security_header_type,
            mac,
            sequence_number,
        }
    }
}

impl IeBounds for SecuredHeader {
    const MIN_LEN: usize = Self::SIZE;
    const MAX_LEN: usize = Self::SIZE;
}

impl NasEncode for SecuredHeader {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        if !self.security_header_type.is_protected() {
            return Err(CodecError::EncodingError(
                "secured header with NotProtected security header type".into(),
            ));
        }
        buf.put_u8(ExtendedProtocolDiscriminator::MobilityManagement.into());
        buf.put_u8(self.security_header_type.into());
        buf.put_slice(&self.mac);
        buf.put_u8(self.sequence_number);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        Self::SIZE
    }
}

impl NasDecode for SecuredHeader {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        ensure_remaining(buf, Self::SIZE)?;
        let epd_octet = buf.get_u8();
        if decode_epd(epd_octet)? != ExtendedProtocolDiscriminator::MobilityManagement {
            return Err(CodecError::UnexpectedElement(epd_octet));
        }
        let sht_octet = buf.get_u8();
        let security_header_type = decode_sht(sht_octet)?;
        if !security_header_type.is_protected() {
            return Err(CodecError::InvalidSecurityHeaderType(sht_octet));
        }
        let mut mac = [0u8; 4];
        buf.copy_to_slice(&mut mac);
        let sequence_number = buf.get_u8();
        Ok(Self {
            security_header_type,
            mac,
            sequence_number,
        })
    }
}

//! NAS encoding/decoding traits and shared IE framing helpers
//!
//! Every IE and message implements [`NasEncode`] / [`NasDecode`] over `bytes`
//! buffers and declares its encoded size range through [`IeBounds`].
//!
//! IE formats (TS 24.501 §11.2):
//! - Type 1: half octet, optionally sharing the octet with a 4-bit IEI
//! - Type 3: fixed length value (V / TV)
//! - Type 4: one-octet length (LV / TLV)
//! - Type 6: two-octet length (LV-E / TLV-E)
//!
//! ```rust
//! use nextgamf_nas::codec::{decode_with_limit, encode_with_limit};
//! use nextgamf_nas::header::PlainMmHeader;
//! use nextgamf_nas::enums::MmMessageType;
//!
//! let header = PlainMmHeader::new(MmMessageType::RegistrationRequest);
//! let bytes = encode_with_limit(&header, 16).unwrap();
//! let (decoded, used) = decode_with_limit::<PlainMmHeader>(&bytes, bytes.len()).unwrap();
//! assert_eq!(decoded, header);
//! assert_eq!(used, 3);
//! ```

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Errors raised while encoding or decoding NAS octets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer octets than the element's minimum length
    #[error("Buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    /// Extended protocol discriminator is not 5GMM or 5GSM
    #[error("Unsupported protocol discriminator: 0x{0:02X}")]
    UnsupportedProtocol(u8),

    /// A mandatory position holds an element that does not belong there
    #[error("Unexpected element: 0x{0:02X}")]
    UnexpectedElement(u8),

    #[error("Invalid message type: 0x{0:02X}")]
    InvalidMessageType(u8),

    #[error("Invalid security header type: 0x{0:02X}")]
    InvalidSecurityHeaderType(u8),

    /// Field value outside its defined range
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Length exceeds buffer: length field is {length}, but only {remaining} bytes remain")]
    LengthExceedsBuffer { length: usize, remaining: usize },

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Result type for NAS codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes a value to a NAS buffer.
pub trait NasEncode {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()>;

    /// Exact number of octets `nas_encode` writes.
    fn encoded_len(&self) -> usize;
}

/// Decodes a value from a NAS buffer.
pub trait NasDecode: Sized {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self>;
}

/// Declared encoded size range.
///
/// For IEs the bounds cover the value part as it appears in its mandatory
/// position (length octets included for LV / LV-E). For messages they are the
/// sum over header, mandatory IEs and every optional IE.
pub trait IeBounds {
    const MIN_LEN: usize;
    const MAX_LEN: usize;
}

/// Decodes one element from `data`, looking at no more than `max_len` octets.
///
/// Returns the value and the number of octets consumed.
pub fn decode_with_limit<T: NasDecode + IeBounds>(
    data: &[u8],
    max_len: usize,
) -> CodecResult<(T, usize)> {
    let window = &data[..data.len().min(max_len)];
    if window.len() < T::MIN_LEN {
        return Err(CodecError::BufferTooShort {
            expected: T::MIN_LEN,
            actual: window.len(),
        });
    }
    let mut buf = window;
    let value = T::nas_decode(&mut buf)?;
    Ok((value, window.len() - buf.len()))
}

/// Encodes one element, failing if it would need more than `max_len` octets.
pub fn encode_with_limit<T: NasEncode>(value: &T, max_len: usize) -> CodecResult<Vec<u8>> {
    let len = value.encoded_len();
    if len > max_len {
        return Err(CodecError::BufferTooShort {
            expected: len,
            actual: max_len,
        });
    }
    let mut out = Vec::with_capacity(len);
    value.nas_encode(&mut out)?;
    Ok(out)
}

// ============================================================================
// Framing helpers
// ============================================================================

/// Fails with `BufferTooShort` unless `needed` octets remain.
pub fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> CodecResult<()> {
    if buf.remaining() < needed {
        return Err(CodecError::BufferTooShort {
            expected: needed,
            actual: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_u8<B: Buf>(buf: &mut B) -> CodecResult<u8> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn get_u16<B: Buf>(buf: &mut B) -> CodecResult<u16> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn get_array<B: Buf, const N: usize>(buf: &mut B) -> CodecResult<[u8; N]> {
    ensure_remaining(buf, N)?;
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn take_vec<B: Buf>(buf: &mut B, length: usize) -> CodecResult<Vec<u8>> {
    if buf.remaining() < length {
        return Err(CodecError::LengthExceedsBuffer {
            length,
            remaining: buf.remaining(),
        });
    }
    let mut out = vec![0u8; length];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Reads an LV value (one-octet length).
pub fn get_lv<B: Buf>(buf: &mut B) -> CodecResult<Vec<u8>> {
    let length = get_u8(buf)? as usize;
    take_vec(buf, length)
}

/// Reads an LV-E value (two-octet length).
pub fn get_lv_e<B: Buf>(buf: &mut B) -> CodecResult<Vec<u8>> {
    let length = get_u16(buf)? as usize;
    take_vec(buf, length)
}

/// Writes an LV value.
pub fn put_lv<B: BufMut>(buf: &mut B, value: &[u8]) -> CodecResult<()> {
    let len = u8::try_from(value.len()).map_err(|_| {
        CodecError::EncodingError(format!("Type 4 IE length {} exceeds maximum of 255", value.len()))
    })?;
    buf.put_u8(len);
    buf.put_slice(value);
    Ok(())
}

/// Writes an LV-E value.
pub fn put_lv_e<B: BufMut>(buf: &mut B, value: &[u8]) -> CodecResult<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        CodecError::EncodingError(format!(
            "Type 6 IE length {} exceeds maximum of 65535",
            value.len()
        ))
    })?;
    buf.put_u16(len);
    buf.put_slice(value);
    Ok(())
}

/// Writes a TLV-E (IEI + LV-E).
pub fn put_tlv_e<B: BufMut>(buf: &mut B, iei: u8, value: &[u8]) -> CodecResult<()> {
    buf.put_u8(iei);
    put_lv_e(buf, value)
}

/// Decodes `T` from exactly the octets of an LV value.
pub fn decode_lv<B: Buf, T: NasDecode>(buf: &mut B) -> CodecResult<T> {
    let contents = get_lv(buf)?;
    decode_contents(&contents)
}

fn decode_contents<T: NasDecode>(contents: &[u8]) -> CodecResult<T> {
    let mut slice = contents;
    let value = T::nas_decode(&mut slice)?;
    if !slice.is_empty() {
        return Err(CodecError::InvalidValue(format!(
            "{} trailing octets inside length-delimited IE",
            slice.len()
        )));
    }
    Ok(value)
}

/// Serialises a value into a fresh vector, for nesting inside LV / LV-E.
pub fn to_vec<T: NasEncode>(value: &T) -> CodecResult<Vec<u8>> {
    let mut out = Vec::with_capacity(value.encoded_len());
    value.nas_encode(&mut out)?;
    Ok(out)
}

/// Octet at the read position without consuming it.
///
/// Message decoders use this to read the IEI of the next optional element.
pub fn peek_iei<B: Buf>(buf: &B) -> Option<u8> {
    if buf.has_remaining() {
        Some(buf.chunk()[0])
    } else {
        None
    }
}

// ============================================================================
// Primitive implementations
// ============================================================================

impl NasEncode for u8 {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(*self);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl NasDecode for u8 {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        get_u8(buf)
    }
}

impl NasEncode for u16 {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u16(*self);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        2
    }
}

impl NasDecode for u16 {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        get_u16(buf)
    }
}

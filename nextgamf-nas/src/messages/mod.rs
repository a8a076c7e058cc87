//! NAS 5G messages (TS 24.501 §8)
//!
//! Every message is a struct whose optional IEs are `Option` fields; the
//! presence mask is derived from them and never stored. [`NasMessage`] is the
//! sum type selected by the message type octet, [`NasPdu`] adds the security
//! protected envelope.
//!
//! - 5GMM (Mobility Management) messages - [`mm`]
//! - 5GSM (Session Management) messages - [`sm`]

use bytes::{Buf, BufMut};

use crate::codec::{CodecError, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::{ExtendedProtocolDiscriminator, MmMessageType, SmMessageType};
use crate::header::{peek_header, PlainMmHeader, PlainSmHeader, SecuredHeader};
use crate::ies::ie1::InformationElement1;

pub mod mm;
pub mod sm;

pub use mm::*;
pub use sm::*;

/// Contents of a 5GMM message following the plain header.
pub trait MmBody: Sized + IeBounds {
    const MESSAGE_TYPE: MmMessageType;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()>;

    fn body_len(&self) -> usize;

    /// Decode from bytes (after header has been parsed)
    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self>;
}

/// Contents of a 5GSM message following the plain header.
pub trait SmBody: Sized + IeBounds {
    const MESSAGE_TYPE: SmMessageType;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()>;

    fn body_len(&self) -> usize;

    /// Decode from bytes (after header has been parsed)
    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self>;
}

// ============================================================================
// Optional IE helpers
// ============================================================================

/// One bit per optional IE, in declaration order.
pub fn presence_mask(present: &[bool]) -> u32 {
    present
        .iter()
        .enumerate()
        .fold(0, |mask, (bit, set)| if *set { mask | (1 << bit) } else { mask })
}

pub(crate) fn put_opt<B: BufMut, T: NasEncode>(buf: &mut B, iei: u8, ie: &Option<T>) -> CodecResult<()> {
    if let Some(value) = ie {
        buf.put_u8(iei);
        value.nas_encode(buf)?;
    }
    Ok(())
}

pub(crate) fn opt_len<T: NasEncode>(ie: &Option<T>) -> usize {
    ie.as_ref().map_or(0, |value| 1 + value.encoded_len())
}

pub(crate) fn put_opt_ie1<B: BufMut, T: InformationElement1>(buf: &mut B, iei: u8, ie: &Option<T>) {
    if let Some(value) = ie {
        buf.put_u8(((iei & 0x0F) << 4) | (value.encode_value() & 0x0F));
    }
}

pub(crate) fn opt_ie1_len<T>(ie: &Option<T>) -> usize {
    usize::from(ie.is_some())
}

/// Consumes the IEI octet and decodes the value behind it.
pub(crate) fn take_opt<B: Buf, T: NasDecode>(buf: &mut B) -> CodecResult<Option<T>> {
    buf.advance(1);
    T::nas_decode(buf).map(Some)
}

/// Consumes a type 1 optional IE whose IEI shares the octet.
pub(crate) fn take_opt_ie1<B: Buf, T: InformationElement1>(buf: &mut B) -> CodecResult<Option<T>> {
    let octet = buf.get_u8();
    T::decode_value(octet & 0x0F).map(Some)
}

// ============================================================================
// Message sum types
// ============================================================================

macro_rules! mm_messages {
    ($($variant:ident),+ $(,)?) => {
        /// Any 5GMM message
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum MmMessage {
            $($variant($variant)),+
        }

        impl MmMessage {
            pub fn message_type(&self) -> MmMessageType {
                match self {
                    $(MmMessage::$variant(_) => <$variant as MmBody>::MESSAGE_TYPE),+
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(MmMessage::$variant(_) => stringify!($variant)),+
                }
            }

            fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
                match self {
                    $(MmMessage::$variant(m) => m.encode_body(buf)),+
                }
            }

            fn body_len(&self) -> usize {
                match self {
                    $(MmMessage::$variant(m) => m.body_len()),+
                }
            }

            /// Declared minimum length of a whole message of type `mt`.
            pub fn min_len(mt: MmMessageType) -> usize {
                $(if mt == <$variant as MmBody>::MESSAGE_TYPE {
                    return <$variant as IeBounds>::MIN_LEN;
                })+
                PlainMmHeader::SIZE
            }

            /// Declared maximum length of a whole message of type `mt`.
            pub fn max_len(mt: MmMessageType) -> usize {
                $(if mt == <$variant as MmBody>::MESSAGE_TYPE {
                    return <$variant as IeBounds>::MAX_LEN;
                })+
                PlainMmHeader::SIZE
            }

            fn decode_body<B: Buf>(mt: MmMessageType, buf: &mut B) -> CodecResult<Self> {
                $(if mt == <$variant as MmBody>::MESSAGE_TYPE {
                    return <$variant as MmBody>::decode_body(buf).map(MmMessage::$variant);
                })+
                Err(CodecError::InvalidMessageType(mt.into()))
            }
        }

        $(impl From<$variant> for MmMessage {
            fn from(value: $variant) -> Self {
                MmMessage::$variant(value)
            }
        })+
    };
}

mm_messages! {
    RegistrationRequest,
    RegistrationAccept,
    RegistrationComplete,
    RegistrationReject,
    DeregistrationRequestUeOriginating,
    DeregistrationAcceptUeOriginating,
    ServiceRequest,
    ServiceAccept,
    ServiceReject,
    ConfigurationUpdateCommand,
    AuthenticationRequest,
    AuthenticationResponse,
    AuthenticationReject,
    AuthenticationFailure,
    IdentityRequest,
    IdentityResponse,
    SecurityModeCommand,
    SecurityModeComplete,
    SecurityModeReject,
    MmStatus,
    UlNasTransport,
    DlNasTransport,
}

macro_rules! sm_messages {
    ($($variant:ident),+ $(,)?) => {
        /// Any 5GSM message body
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum SmMessage {
            $($variant($variant)),+
        }

        impl SmMessage {
            pub fn message_type(&self) -> SmMessageType {
                match self {
                    $(SmMessage::$variant(_) => <$variant as SmBody>::MESSAGE_TYPE),+
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(SmMessage::$variant(_) => stringify!($variant)),+
                }
            }

            fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
                match self {
                    $(SmMessage::$variant(m) => m.encode_body(buf)),+
                }
            }

            fn body_len(&self) -> usize {
                match self {
                    $(SmMessage::$variant(m) => m.body_len()),+
                }
            }

            pub fn min_len(mt: SmMessageType) -> usize {
                $(if mt == <$variant as SmBody>::MESSAGE_TYPE {
                    return <$variant as IeBounds>::MIN_LEN;
                })+
                PlainSmHeader::SIZE
            }

            pub fn max_len(mt: SmMessageType) -> usize {
                $(if mt == <$variant as SmBody>::MESSAGE_TYPE {
                    return <$variant as IeBounds>::MAX_LEN;
                })+
                PlainSmHeader::SIZE
            }

            fn decode_body<B: Buf>(mt: SmMessageType, buf: &mut B) -> CodecResult<Self> {
                $(if mt == <$variant as SmBody>::MESSAGE_TYPE {
                    return <$variant as SmBody>::decode_body(buf).map(SmMessage::$variant);
                })+
                Err(CodecError::InvalidMessageType(mt.into()))
            }
        }

        $(impl From<$variant> for SmMessage {
            fn from(value: $variant) -> Self {
                SmMessage::$variant(value)
            }
        })+
    };
}

sm_messages! {
    PduSessionEstablishmentRequest,
    PduSessionEstablishmentAccept,
    PduSessionEstablishmentReject,
    PduSessionModificationCommand,
    PduSessionModificationComplete,
    PduSessionReleaseRequest,
    PduSessionReleaseCommand,
    PduSessionReleaseComplete,
    SmStatus,
}

/// 5GSM message with its session header fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmNasMessage {
    pub pdu_session_id: u8,
    /// Procedure transaction identity
    pub pti: u8,
    pub message: SmMessage,
}

impl SmNasMessage {
    pub fn new(pdu_session_id: u8, pti: u8, message: impl Into<SmMessage>) -> Self {
        Self {
            pdu_session_id,
            pti,
            message: message.into(),
        }
    }
}

/// A plain NAS message of either family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NasMessage {
    Mm(MmMessage),
    Sm(SmNasMessage),
}

impl From<MmMessage> for NasMessage {
    fn from(value: MmMessage) -> Self {
        NasMessage::Mm(value)
    }
}

impl From<SmNasMessage> for NasMessage {
    fn from(value: SmNasMessage) -> Self {
        NasMessage::Sm(value)
    }
}

fn too_short(expected: usize, actual: usize) -> CodecError {
    CodecError::BufferTooShort { expected, actual }
}

impl NasMessage {
    pub fn name(&self) -> &'static str {
        match self {
            NasMessage::Mm(m) => m.name(),
            NasMessage::Sm(m) => m.message.name(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            NasMessage::Mm(m) => PlainMmHeader::SIZE + m.body_len(),
            NasMessage::Sm(m) => PlainSmHeader::SIZE + m.message.body_len(),
        }
    }

    /// Encodes into a fresh buffer of at most `max_len` octets.
    pub fn encode(&self, max_len: usize) -> CodecResult<Vec<u8>> {
        let len = self.encoded_len();
        if len > max_len {
            return Err(too_short(len, max_len));
        }
        let mut out = Vec::with_capacity(len);
        match self {
            NasMessage::Mm(m) => {
                PlainMmHeader::new(m.message_type()).nas_encode(&mut out)?;
                m.encode_body(&mut out)?;
            }
            NasMessage::Sm(m) => {
                PlainSmHeader::new(m.pdu_session_id, m.pti, m.message.message_type()).nas_encode(&mut out)?;
                m.message.encode_body(&mut out)?;
            }
        }
        Ok(out)
    }

    /// Decodes one plain message from the first `max_len` octets of `data`.
    ///
    /// Returns the message and the octets consumed. Unrecognised trailing
    /// optional IEs are left unconsumed.
    pub fn decode(data: &[u8], max_len: usize) -> CodecResult<(Self, usize)> {
        let window = &data[..data.len().min(max_len)];
        let (epd, sht) = peek_header(window)?;
        let mut buf = window;
        let message = match epd {
            ExtendedProtocolDiscriminator::MobilityManagement => {
                if sht.is_protected() {
                    return Err(CodecError::InvalidSecurityHeaderType(sht.into()));
                }
                let header = PlainMmHeader::nas_decode(&mut buf)?;
                let min = MmMessage::min_len(header.message_type);
                if window.len() < min {
                    return Err(too_short(min, window.len()));
                }
                NasMessage::Mm(MmMessage::decode_body(header.message_type, &mut buf)?)
            }
            ExtendedProtocolDiscriminator::SessionManagement => {
                let header = PlainSmHeader::nas_decode(&mut buf)?;
                let min = SmMessage::min_len(header.message_type);
                if window.len() < min {
                    return Err(too_short(min, window.len()));
                }
                NasMessage::Sm(SmNasMessage {
                    pdu_session_id: header.pdu_session_id,
                    pti: header.pti,
                    message: SmMessage::decode_body(header.message_type, &mut buf)?,
                })
            }
        };
        Ok((message, window.len() - buf.len()))
    }
}

/// A NAS PDU as carried over N2, plain or security protected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NasPdu {
    Plain(NasMessage),
    Protected {
        header: SecuredHeader,
        message: NasMessage,
    },
}

impl NasPdu {
    pub fn message(&self) -> &NasMessage {
        match self {
            NasPdu::Plain(message) | NasPdu::Protected { message, .. } => message,
        }
    }

    pub fn into_message(self) -> NasMessage {
        match self {
            NasPdu::Plain(message) | NasPdu::Protected { message, .. } => message,
        }
    }

    pub fn security_header(&self) -> Option<&SecuredHeader> {
        match self {
            NasPdu::Plain(_) => None,
            NasPdu::Protected { header, .. } => Some(header),
        }
    }

    pub fn encode(&self, max_len: usize) -> CodecResult<Vec<u8>> {
        match self {
            NasPdu::Plain(message) => message.encode(max_len),
            NasPdu::Protected { header, message } => {
                let inner_max = max_len
                    .checked_sub(SecuredHeader::SIZE)
                    .ok_or_else(|| too_short(SecuredHeader::SIZE, max_len))?;
                let inner = message.encode(inner_max)?;
                let mut out = Vec::with_capacity(SecuredHeader::SIZE + inner.len());
                header.nas_encode(&mut out)?;
                out.extend_from_slice(&inner);
                Ok(out)
            }
        }
    }

    /// Decodes a PDU; the protected payload is read as plain text.
    pub fn decode(data: &[u8], max_len: usize) -> CodecResult<(Self, usize)> {
        let window = &data[..data.len().min(max_len)];
        let (_, sht) = peek_header(window)?;
        if !sht.is_protected() {
            let (message, used) = NasMessage::decode(window, window.len())?;
            return Ok((NasPdu::Plain(message), used));
        }
        let mut buf = window;
        let header = SecuredHeader::nas_decode(&mut buf)?;
        let (message, used) = NasMessage::decode(buf, buf.len())?;
        Ok((NasPdu::Protected { header, message }, SecuredHeader::SIZE + used))
    }
}

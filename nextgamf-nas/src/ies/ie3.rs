//! Type 3 Information Elements (fixed length)

use bytes::{Buf, BufMut};
use nextgamf_common::Tai;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::{get_array, get_u8, CodecError, CodecResult, IeBounds, NasDecode, NasEncode};

// ============================================================================
// Causes
// ============================================================================

/// 5GMM cause (TS 24.501 §9.11.3.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MmCause {
    IllegalUe = 0x03,
    PeiNotAccepted = 0x05,
    IllegalMe = 0x06,
    FiveGsServicesNotAllowed = 0x07,
    /// UE identity cannot be derived by the network
    UeIdentityCannotBeDerived = 0x09,
    ImplicitlyDeregistered = 0x0A,
    PlmnNotAllowed = 0x0B,
    TaNotAllowed = 0x0C,
    RoamingNotAllowedInTa = 0x0D,
    MacFailure = 0x14,
    SynchFailure = 0x15,
    Congestion = 0x16,
    UeSecurityCapabilitiesMismatch = 0x17,
    SecurityModeRejectedUnspecified = 0x18,
    Non5gAuthenticationUnacceptable = 0x1A,
    N1ModeNotAllowed = 0x1B,
    MaxPduSessionsReached = 0x41,
    NgKsiAlreadyInUse = 0x47,
    PayloadNotForwarded = 0x5A,
    DnnNotSupportedOrNotSubscribed = 0x5B,
    SemanticallyIncorrectMessage = 0x5F,
    InvalidMandatoryInformation = 0x60,
    MessageTypeNonExistent = 0x61,
    MessageTypeNotCompatible = 0x62,
    IeNonExistent = 0x63,
    ConditionalIeError = 0x64,
    MessageNotCompatible = 0x65,
    #[default]
    ProtocolErrorUnspecified = 0x6F,
}

impl MmCause {
    /// Maps a received octet; unknown values read as protocol error, unspecified.
    pub fn from_octet(value: u8) -> Self {
        MmCause::try_from(value).unwrap_or(MmCause::ProtocolErrorUnspecified)
    }
}

impl IeBounds for MmCause {
    const MIN_LEN: usize = 1;
    const MAX_LEN: usize = 1;
}

impl NasEncode for MmCause {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8((*self).into());
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl NasDecode for MmCause {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self::from_octet(get_u8(buf)?))
    }
}

/// 5GSM cause (TS 24.501 §9.11.4.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SmCause {
    OperatorDeterminedBarring = 0x08,
    InsufficientResources = 0x1A,
    MissingOrUnknownDnn = 0x1B,
    UnknownPduSessionType = 0x1C,
    UserAuthenticationFailed = 0x1D,
    RequestRejectedUnspecified = 0x1F,
    ServiceOptionNotSupported = 0x20,
    RegularDeactivation = 0x24,
    NetworkFailure = 0x26,
    ReactivationRequested = 0x27,
    InvalidPduSessionIdentity = 0x2B,
    PduSessionDoesNotExist = 0x36,
    InsufficientResourcesForSliceAndDnn = 0x43,
    MaxPduSessionsReached = 0x41,
    MissingOrUnknownDnnInSlice = 0x46,
    InvalidPtiValue = 0x51,
    SemanticallyIncorrectMessage = 0x5F,
    InvalidMandatoryInformation = 0x60,
    MessageTypeNonExistent = 0x61,
    MessageTypeNotCompatible = 0x62,
    IeNonExistent = 0x63,
    ConditionalIeError = 0x64,
    MessageNotCompatible = 0x65,
    #[default]
    ProtocolErrorUnspecified = 0x6F,
}

impl SmCause {
    pub fn from_octet(value: u8) -> Self {
        SmCause::try_from(value).unwrap_or(SmCause::ProtocolErrorUnspecified)
    }
}

impl IeBounds for SmCause {
    const MIN_LEN: usize = 1;
    const MAX_LEN: usize = 1;
}

impl NasEncode for SmCause {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8((*self).into());
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl NasDecode for SmCause {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self::from_octet(get_u8(buf)?))
    }
}

// ============================================================================
// NAS security algorithms (9.11.3.34)
// ============================================================================

/// Selected ciphering (bits 8-5) and integrity (bits 4-1) algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IeNasSecurityAlgorithms {
    /// 5G-EA code, 0 for NEA0
    pub ciphering: u8,
    /// 5G-IA code, 0 for NIA0
    pub integrity: u8,
}

impl IeNasSecurityAlgorithms {
    pub fn new(ciphering: u8, integrity: u8) -> Self {
        Self {
            ciphering: ciphering & 0x0F,
            integrity: integrity & 0x0F,
        }
    }
}

impl IeBounds for IeNasSecurityAlgorithms {
    const MIN_LEN: usize = 1;
    const MAX_LEN: usize = 1;
}

impl NasEncode for IeNasSecurityAlgorithms {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8((self.ciphering << 4) | self.integrity);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl NasDecode for IeNasSecurityAlgorithms {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let octet = get_u8(buf)?;
        Ok(Self::new(octet >> 4, octet & 0x0F))
    }
}

// ============================================================================
// GPRS timer (TS 24.008 §10.5.7.3)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum GprsTimerUnit {
    TwoSeconds = 0b000,
    OneMinute = 0b001,
    Decihours = 0b010,
    Deactivated = 0b111,
}

/// Timer value as a 3-bit unit and a 5-bit multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GprsTimer {
    pub unit: GprsTimerUnit,
    pub value: u8,
}

impl GprsTimer {
    pub const MAX_VALUE: u8 = 0x1F;

    pub fn new(unit: GprsTimerUnit, value: u8) -> Self {
        Self {
            unit,
            value: value & Self::MAX_VALUE,
        }
    }

    pub fn deactivated() -> Self {
        Self::new(GprsTimerUnit::Deactivated, 0)
    }

    /// Encodes a duration in minutes.
    ///
    /// Zero deactivates the timer. Up to 31 minutes are sent in minutes;
    /// longer durations in decihours (minutes / 6), saturating at 31.
    /// Anything past 186 minutes therefore encodes as 31 decihours, the
    /// largest value the 5-bit field carries.
    pub fn from_minutes(minutes: u32) -> Self {
        if minutes == 0 {
            Self::deactivated()
        } else if minutes <= u32::from(Self::MAX_VALUE) {
            Self::new(GprsTimerUnit::OneMinute, minutes as u8)
        } else {
            let decihours = (minutes / 6).min(u32::from(Self::MAX_VALUE));
            Self::new(GprsTimerUnit::Decihours, decihours as u8)
        }
    }

    /// Duration in seconds, `None` when deactivated.
    pub fn as_secs(&self) -> Option<u64> {
        let value = u64::from(self.value);
        match self.unit {
            GprsTimerUnit::TwoSeconds => Some(value * 2),
            GprsTimerUnit::OneMinute => Some(value * 60),
            GprsTimerUnit::Decihours => Some(value * 360),
            GprsTimerUnit::Deactivated => None,
        }
    }

    pub fn to_octet(&self) -> u8 {
        (u8::from(self.unit) << 5) | self.value
    }

    pub fn from_octet(octet: u8) -> Self {
        // Other unit values are interpreted as 1 minute
        let unit = GprsTimerUnit::try_from(octet >> 5).unwrap_or(GprsTimerUnit::OneMinute);
        Self::new(unit, octet & Self::MAX_VALUE)
    }
}

impl IeBounds for GprsTimer {
    const MIN_LEN: usize = 1;
    const MAX_LEN: usize = 1;
}

impl NasEncode for GprsTimer {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(self.to_octet());
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl NasDecode for GprsTimer {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self::from_octet(get_u8(buf)?))
    }
}

// ============================================================================
// Integrity protection maximum data rate (9.11.4.7)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IeIntegrityProtectionMaxDataRate {
    pub uplink: u8,
    pub downlink: u8,
}

impl IeIntegrityProtectionMaxDataRate {
    pub const RATE_64_KBPS: u8 = 0x00;
    pub const FULL_RATE: u8 = 0xFF;
}

impl Default for IeIntegrityProtectionMaxDataRate {
    fn default() -> Self {
        Self {
            uplink: Self::FULL_RATE,
            downlink: Self::FULL_RATE,
        }
    }
}

impl IeBounds for IeIntegrityProtectionMaxDataRate {
    const MIN_LEN: usize = 2;
    const MAX_LEN: usize = 2;
}

impl NasEncode for IeIntegrityProtectionMaxDataRate {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_u8(self.uplink);
        buf.put_u8(self.downlink);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        2
    }
}

impl NasDecode for IeIntegrityProtectionMaxDataRate {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        let [uplink, downlink] = get_array::<_, 2>(buf)?;
        Ok(Self { uplink, downlink })
    }
}

// ============================================================================
// Authentication parameter RAND (9.11.3.16)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IeRand(pub [u8; 16]);

impl IeBounds for IeRand {
    const MIN_LEN: usize = 16;
    const MAX_LEN: usize = 16;
}

impl NasEncode for IeRand {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_slice(&self.0);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        16
    }
}

impl NasDecode for IeRand {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self(get_array::<_, 16>(buf)?))
    }
}

// ============================================================================
// Tracking area identity (9.11.3.8), as TV
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IeTai(pub Tai);

impl IeBounds for IeTai {
    const MIN_LEN: usize = 6;
    const MAX_LEN: usize = 6;
}

impl NasEncode for IeTai {
    fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        buf.put_slice(&self.0.encode());
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        6
    }
}

impl NasDecode for IeTai {
    fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self(Tai::decode(get_array::<_, 6>(buf)?)))
    }
}

/// Checks a PDU session identity value, 1-15.
pub fn validate_pdu_session_id(id: u8) -> CodecResult<u8> {
    if (1..=15).contains(&id) {
        Ok(id)
    } else {
        Err(CodecError::InvalidValue(format!("PDU session identity {id}")))
    }
}

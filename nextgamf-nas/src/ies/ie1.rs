//! Type 1 Information Elements (half octet)
//!
//! A type 1 value occupies four bits. In mandatory positions two values share
//! one octet; as an optional IE the high nibble is the IEI.

use bytes::BufMut;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::{CodecError, CodecResult};

/// A value carried in a half octet.
pub trait InformationElement1: Sized {
    /// Value in the low four bits
    fn encode_value(&self) -> u8;

    fn decode_value(value: u8) -> CodecResult<Self>;
}

/// Packs two half-octet values, `high` in bits 8-5.
pub fn encode_ie1_pair<B: BufMut, H: InformationElement1, L: InformationElement1>(
    high: &H,
    low: &L,
    buf: &mut B,
) {
    buf.put_u8(((high.encode_value() & 0x0F) << 4) | (low.encode_value() & 0x0F));
}

/// Writes a half-octet value behind its 4-bit IEI.
pub fn encode_ie1_with_iei<B: BufMut, T: InformationElement1>(iei: u8, ie: &T, buf: &mut B) {
    buf.put_u8(((iei & 0x0F) << 4) | (ie.encode_value() & 0x0F));
}

/// Value occupying only the spare half of an octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Spare;

impl InformationElement1 for Spare {
    fn encode_value(&self) -> u8 {
        0
    }

    fn decode_value(_value: u8) -> CodecResult<Self> {
        Ok(Spare)
    }
}

// ============================================================================
// NAS key set identifier (9.11.3.32)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SecurityContextType {
    #[default]
    Native = 0,
    Mapped = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IeNasKeySetIdentifier {
    pub tsc: SecurityContextType,
    /// 0-6; 7 means no key is available
    pub ksi: u8,
}

impl IeNasKeySetIdentifier {
    pub const NO_KEY: u8 = 0x07;

    pub fn new(tsc: SecurityContextType, ksi: u8) -> Self {
        Self { tsc, ksi: ksi & 0x07 }
    }

    pub fn no_key() -> Self {
        Self::new(SecurityContextType::Native, Self::NO_KEY)
    }

    pub fn is_no_key(&self) -> bool {
        self.ksi == Self::NO_KEY
    }
}

impl Default for IeNasKeySetIdentifier {
    fn default() -> Self {
        Self::no_key()
    }
}

impl InformationElement1 for IeNasKeySetIdentifier {
    fn encode_value(&self) -> u8 {
        (u8::from(self.tsc) << 3) | (self.ksi & 0x07)
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        let tsc = if value & 0x08 != 0 {
            SecurityContextType::Mapped
        } else {
            SecurityContextType::Native
        };
        Ok(Self::new(tsc, value & 0x07))
    }
}

// ============================================================================
// 5GS registration type (9.11.3.7)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RegistrationType {
    #[default]
    InitialRegistration = 1,
    MobilityRegistrationUpdating = 2,
    PeriodicRegistrationUpdating = 3,
    EmergencyRegistration = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ie5gsRegistrationType {
    pub follow_on_request: bool,
    pub registration_type: RegistrationType,
}

impl Ie5gsRegistrationType {
    pub fn new(registration_type: RegistrationType, follow_on_request: bool) -> Self {
        Self {
            follow_on_request,
            registration_type,
        }
    }
}

impl InformationElement1 for Ie5gsRegistrationType {
    fn encode_value(&self) -> u8 {
        (u8::from(self.follow_on_request) << 3) | u8::from(self.registration_type)
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        // Unused values are interpreted as initial registration
        let registration_type =
            RegistrationType::try_from(value & 0x07).unwrap_or(RegistrationType::InitialRegistration);
        Ok(Self {
            follow_on_request: value & 0x08 != 0,
            registration_type,
        })
    }
}

// ============================================================================
// De-registration type (9.11.3.20)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AccessType {
    #[default]
    ThreeGppAccess = 1,
    NonThreeGppAccess = 2,
    Both = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IeDeRegistrationType {
    pub switch_off: bool,
    pub re_registration_required: bool,
    pub access_type: AccessType,
}

impl InformationElement1 for IeDeRegistrationType {
    fn encode_value(&self) -> u8 {
        (u8::from(self.switch_off) << 3)
            | (u8::from(self.re_registration_required) << 2)
            | u8::from(self.access_type)
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        let access_type = AccessType::try_from(value & 0x03)
            .map_err(|_| CodecError::InvalidValue(format!("access type {}", value & 0x03)))?;
        Ok(Self {
            switch_off: value & 0x08 != 0,
            re_registration_required: value & 0x04 != 0,
            access_type,
        })
    }
}

// ============================================================================
// Service type (9.11.3.50)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ServiceType {
    #[default]
    Signalling = 0,
    Data = 1,
    MobileTerminatedServices = 2,
    EmergencyServices = 3,
    EmergencyServicesFallback = 4,
    HighPriorityAccess = 5,
    ElevatedSignalling = 6,
}

impl InformationElement1 for ServiceType {
    fn encode_value(&self) -> u8 {
        (*self).into()
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        // Unused values are interpreted as signalling
        Ok(ServiceType::try_from(value & 0x0F).unwrap_or(ServiceType::Signalling))
    }
}

// ============================================================================
// 5GS identity type (9.11.3.3)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum IdentityType {
    NoIdentity = 0,
    #[default]
    Suci = 1,
    Guti = 2,
    Imei = 3,
    Tmsi = 4,
    Imeisv = 5,
    MacAddress = 6,
    Eui64 = 7,
}

impl InformationElement1 for IdentityType {
    fn encode_value(&self) -> u8 {
        (*self).into()
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        IdentityType::try_from(value & 0x07)
            .map_err(|_| CodecError::InvalidValue(format!("identity type {value}")))
    }
}

// ============================================================================
// Payload container type (9.11.3.40)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PayloadContainerType {
    #[default]
    N1SmInformation = 1,
    Sms = 2,
    Lpp = 3,
    SorTransparentContainer = 4,
    UePolicyContainer = 5,
    UeParametersUpdate = 6,
    Multiple = 15,
}

impl InformationElement1 for PayloadContainerType {
    fn encode_value(&self) -> u8 {
        (*self).into()
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        PayloadContainerType::try_from(value & 0x0F)
            .map_err(|_| CodecError::InvalidValue(format!("payload container type {value}")))
    }
}

// ============================================================================
// Request type (9.11.3.47)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RequestType {
    #[default]
    InitialRequest = 1,
    ExistingPduSession = 2,
    InitialEmergencyRequest = 3,
    ExistingEmergencyPduSession = 4,
    ModificationRequest = 5,
    MaPduRequest = 6,
}

impl InformationElement1 for RequestType {
    fn encode_value(&self) -> u8 {
        (*self).into()
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        RequestType::try_from(value & 0x07)
            .map_err(|_| CodecError::InvalidValue(format!("request type {value}")))
    }
}

// ============================================================================
// PDU session type (9.11.4.11)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum PduSessionType {
    #[default]
    Ipv4 = 1,
    Ipv6 = 2,
    Ipv4v6 = 3,
    Unstructured = 4,
    Ethernet = 5,
}

/// PDU session type as received.
///
/// Reserved codes are preserved so session management can answer them with
/// a cause instead of failing the whole message decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IePduSessionType {
    value: u8,
}

impl IePduSessionType {
    pub fn raw(value: u8) -> Self {
        Self { value: value & 0x07 }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn session_type(&self) -> Option<PduSessionType> {
        PduSessionType::try_from(self.value).ok()
    }
}

impl From<PduSessionType> for IePduSessionType {
    fn from(value: PduSessionType) -> Self {
        Self { value: value.into() }
    }
}

impl InformationElement1 for IePduSessionType {
    fn encode_value(&self) -> u8 {
        self.value
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        Ok(Self::raw(value))
    }
}

// ============================================================================
// SSC mode (9.11.4.16)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SscMode {
    #[default]
    Mode1 = 1,
    Mode2 = 2,
    Mode3 = 3,
}

impl InformationElement1 for SscMode {
    fn encode_value(&self) -> u8 {
        (*self).into()
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        SscMode::try_from(value & 0x07)
            .map_err(|_| CodecError::InvalidValue(format!("SSC mode {value}")))
    }
}

// ============================================================================
// IMEISV request (9.11.3.28)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IeImeisvRequest {
    pub requested: bool,
}

impl InformationElement1 for IeImeisvRequest {
    fn encode_value(&self) -> u8 {
        u8::from(self.requested)
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        Ok(Self {
            requested: value & 0x07 == 1,
        })
    }
}

// ============================================================================
// Configuration update indication (9.11.3.18)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IeConfigurationUpdateIndication {
    pub acknowledgement_requested: bool,
    pub registration_requested: bool,
}

impl InformationElement1 for IeConfigurationUpdateIndication {
    fn encode_value(&self) -> u8 {
        (u8::from(self.registration_requested) << 1) | u8::from(self.acknowledgement_requested)
    }

    fn decode_value(value: u8) -> CodecResult<Self> {
        Ok(Self {
            acknowledgement_requested: value & 0x01 != 0,
            registration_requested: value & 0x02 != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_type_pair_with_ngksi() {
        let reg = Ie5gsRegistrationType::new(RegistrationType::InitialRegistration, true);
        let ksi = IeNasKeySetIdentifier::no_key();
        let mut buf = Vec::new();
        encode_ie1_pair(&ksi, &reg, &mut buf);
        assert_eq!(buf, vec![0x79]);
    }

    #[test]
    fn test_registration_type_unused_value_is_initial() {
        let reg = Ie5gsRegistrationType::decode_value(0x06).unwrap();
        assert_eq!(reg.registration_type, RegistrationType::InitialRegistration);
        assert!(!reg.follow_on_request);
    }

    #[test]
    fn test_ngksi_mapped_context() {
        let ksi = IeNasKeySetIdentifier::decode_value(0x0A).unwrap();
        assert_eq!(ksi.tsc, SecurityContextType::Mapped);
        assert_eq!(ksi.ksi, 2);
        assert_eq!(ksi.encode_value(), 0x0A);
    }

    #[test]
    fn test_deregistration_type_bits() {
        let dereg = IeDeRegistrationType::decode_value(0x09).unwrap();
        assert!(dereg.switch_off);
        assert!(!dereg.re_registration_required);
        assert_eq!(dereg.access_type, AccessType::ThreeGppAccess);
        assert!(IeDeRegistrationType::decode_value(0x08).is_err());
    }

    #[test]
    fn test_pdu_session_type_keeps_reserved_codes() {
        let ie = IePduSessionType::decode_value(0x07).unwrap();
        assert_eq!(ie.session_type(), None);
        assert_eq!(ie.encode_value(), 7);
        let ie = IePduSessionType::from(PduSessionType::Ipv4v6);
        assert_eq!(ie.session_type(), Some(PduSessionType::Ipv4v6));
    }

    #[test]
    fn test_ie1_with_iei() {
        let mut buf = Vec::new();
        encode_ie1_with_iei(0x0E, &IeImeisvRequest { requested: true }, &mut buf);
        assert_eq!(buf, vec![0xE1]);
    }

    #[test]
    fn test_configuration_update_indication() {
        let ie = IeConfigurationUpdateIndication {
            acknowledgement_requested: true,
            registration_requested: false,
        };
        assert_eq!(ie.encode_value(), 0x01);
        assert_eq!(IeConfigurationUpdateIndication::decode_value(0x03).unwrap().registration_requested, true);
    }
}

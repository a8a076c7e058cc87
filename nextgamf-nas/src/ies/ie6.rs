//! Type 6 Information Elements (two-octet length, LV-E / TLV-E)

use bytes::{Buf, BufMut};
use nextgamf_common::{Guti, Plmn, STmsi, Supi};

use crate::codec::{get_lv_e, put_lv_e, CodecError, CodecResult, IeBounds, NasDecode, NasEncode};

macro_rules! impl_lv_e {
    ($ty:ty, $min:expr, $max:expr) => {
        impl IeBounds for $ty {
            const MIN_LEN: usize = 2 + $min;
            const MAX_LEN: usize = 2 + $max;
        }

        impl NasEncode for $ty {
            fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
                let contents = self.contents()?;
                put_lv_e(buf, &contents)
            }

            fn encoded_len(&self) -> usize {
                2 + self.contents().map_or(0, |c| c.len())
            }
        }

        impl NasDecode for $ty {
            fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
                let contents = get_lv_e(buf)?;
                if contents.len() < $min || contents.len() > $max {
                    return Err(CodecError::InvalidValue(format!(
                        "{} value length {} outside {}..={}",
                        stringify!($ty),
                        contents.len(),
                        $min,
                        $max
                    )));
                }
                Self::from_contents(&contents)
            }
        }
    };
}

// ============================================================================
// BCD digits
// ============================================================================

/// Packs decimal digits two per octet, first digit in the low nibble,
/// padding an odd count with 0xF.
pub fn encode_bcd(digits: &str) -> CodecResult<Vec<u8>> {
    let nibbles = digits
        .chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or_else(|| CodecError::EncodingError(format!("non-digit {c:?} in BCD string")))
        })
        .collect::<CodecResult<Vec<u8>>>()?;
    Ok(nibbles
        .chunks(2)
        .map(|pair| pair[0] | (pair.get(1).copied().unwrap_or(0x0F) << 4))
        .collect())
}

/// Reverse of [`encode_bcd`]; stops at the 0xF filler.
pub fn decode_bcd(octets: &[u8]) -> CodecResult<String> {
    let mut out = String::with_capacity(octets.len() * 2);
    for (i, octet) in octets.iter().enumerate() {
        for (n, nibble) in [octet & 0x0F, octet >> 4].into_iter().enumerate() {
            match nibble {
                0..=9 => out.push(char::from(b'0' + nibble)),
                0x0F if i == octets.len() - 1 && n == 1 => {}
                _ => return Err(CodecError::InvalidValue(format!("BCD nibble 0x{nibble:X}"))),
            }
        }
    }
    Ok(out)
}

// ============================================================================
// 5GS mobile identity (9.11.3.4)
// ============================================================================

/// SUCI in IMSI format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suci {
    pub plmn: Plmn,
    /// Routing indicator digits as carried (BCD, 0xF filler)
    pub routing_indicator: [u8; 2],
    pub protection_scheme: u8,
    pub home_network_key_id: u8,
    pub scheme_output: Vec<u8>,
}

/// Parts of an ECIES scheme output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcealedSupi<'a> {
    pub ue_public_key: &'a [u8],
    pub ciphertext: &'a [u8],
    pub mac_tag: &'a [u8],
}

impl Suci {
    pub const NULL_SCHEME: u8 = 0x00;
    pub const PROFILE_A: u8 = 0x01;
    pub const PROFILE_B: u8 = 0x02;
    const MAC_TAG_LEN: usize = 8;

    /// SUCI with the null protection scheme for `imsi`.
    pub fn null_scheme(supi: &Supi, long_mnc: bool) -> CodecResult<Self> {
        let imsi = supi.imsi();
        let plmn = Plmn::from_imsi(imsi, long_mnc)
            .ok_or_else(|| CodecError::EncodingError(format!("IMSI {imsi} too short")))?;
        let msin = &imsi[if long_mnc { 6 } else { 5 }..];
        Ok(Self {
            plmn,
            routing_indicator: [0xF0, 0xFF],
            protection_scheme: Self::NULL_SCHEME,
            home_network_key_id: 0,
            scheme_output: encode_bcd(msin)?,
        })
    }

    pub fn is_null_scheme(&self) -> bool {
        self.protection_scheme == Self::NULL_SCHEME
    }

    /// SUPI readable without deconcealment (null scheme only).
    pub fn plain_supi(&self) -> Option<Supi> {
        if !self.is_null_scheme() {
            return None;
        }
        let msin = decode_bcd(&self.scheme_output).ok()?;
        let mnc = if self.plmn.long_mnc {
            format!("{:03}", self.plmn.mnc)
        } else {
            format!("{:02}", self.plmn.mnc)
        };
        Supi::from_imsi(format!("{:03}{mnc}{msin}", self.plmn.mcc))
    }

    /// Splits a profile A/B scheme output into key, ciphertext and MAC tag.
    pub fn concealed(&self) -> Option<ConcealedSupi<'_>> {
        let key_len = match self.protection_scheme {
            Self::PROFILE_A => 32,
            Self::PROFILE_B => 33,
            _ => return None,
        };
        if self.scheme_output.len() < key_len + Self::MAC_TAG_LEN {
            return None;
        }
        let tag_start = self.scheme_output.len() - Self::MAC_TAG_LEN;
        Some(ConcealedSupi {
            ue_public_key: &self.scheme_output[..key_len],
            ciphertext: &self.scheme_output[key_len..tag_start],
            mac_tag: &self.scheme_output[tag_start..],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Ie5gsMobileIdentity {
    #[default]
    NoIdentity,
    Suci(Suci),
    Guti(Guti),
    Imei(String),
    Imeisv(String),
    STmsi(STmsi),
}

impl Ie5gsMobileIdentity {
    const TYPE_NONE: u8 = 0b000;
    const TYPE_SUCI: u8 = 0b001;
    const TYPE_GUTI: u8 = 0b010;
    const TYPE_IMEI: u8 = 0b011;
    const TYPE_TMSI: u8 = 0b100;
    const TYPE_IMEISV: u8 = 0b101;

    fn encode_digits(kind: u8, digits: &str) -> CodecResult<Vec<u8>> {
        let mut chars = digits.chars();
        let first = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| CodecError::EncodingError("empty IMEI".into()))? as u8;
        let rest: String = chars.collect();
        let odd = digits.len() % 2 == 1;
        let mut out = vec![(first << 4) | (u8::from(odd) << 3) | kind];
        out.extend(encode_bcd(&rest)?);
        Ok(out)
    }

    fn decode_digits(contents: &[u8]) -> CodecResult<String> {
        let first = contents[0] >> 4;
        let odd = contents[0] & 0x08 != 0;
        let mut digits = String::new();
        if first > 9 {
            return Err(CodecError::InvalidValue(format!("BCD nibble 0x{first:X}")));
        }
        digits.push(char::from(b'0' + first));
        digits.push_str(&decode_bcd(&contents[1..])?);
        if !odd && digits.len() % 2 == 1 {
            return Err(CodecError::InvalidValue("odd/even indicator mismatch".into()));
        }
        Ok(digits)
    }

    fn contents(&self) -> CodecResult<Vec<u8>> {
        match self {
            Ie5gsMobileIdentity::NoIdentity => Ok(vec![Self::TYPE_NONE]),
            Ie5gsMobileIdentity::Suci(suci) => {
                // SUPI format IMSI (000)
                let mut out = vec![Self::TYPE_SUCI];
                out.extend_from_slice(&suci.plmn.encode());
                out.extend_from_slice(&suci.routing_indicator);
                out.push(suci.protection_scheme & 0x0F);
                out.push(suci.home_network_key_id);
                out.extend_from_slice(&suci.scheme_output);
                Ok(out)
            }
            Ie5gsMobileIdentity::Guti(guti) => {
                let mut out = vec![0xF0 | Self::TYPE_GUTI];
                out.extend_from_slice(&guti.encode());
                Ok(out)
            }
            Ie5gsMobileIdentity::Imei(digits) => Self::encode_digits(Self::TYPE_IMEI, digits),
            Ie5gsMobileIdentity::Imeisv(digits) => Self::encode_digits(Self::TYPE_IMEISV, digits),
            Ie5gsMobileIdentity::STmsi(s_tmsi) => {
                let mut out = vec![0xF0 | Self::TYPE_TMSI];
                out.extend_from_slice(&s_tmsi.encode());
                Ok(out)
            }
        }
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let too_short = |expected: usize| CodecError::BufferTooShort {
            expected,
            actual: contents.len(),
        };
        match contents[0] & 0x07 {
            Self::TYPE_NONE => Ok(Ie5gsMobileIdentity::NoIdentity),
            Self::TYPE_SUCI => {
                let supi_format = (contents[0] >> 4) & 0x07;
                if supi_format != 0 {
                    return Err(CodecError::InvalidValue(format!("SUPI format {supi_format}")));
                }
                if contents.len() < 8 {
                    return Err(too_short(8));
                }
                Ok(Ie5gsMobileIdentity::Suci(Suci {
                    plmn: Plmn::decode([contents[1], contents[2], contents[3]]),
                    routing_indicator: [contents[4], contents[5]],
                    protection_scheme: contents[6] & 0x0F,
                    home_network_key_id: contents[7],
                    scheme_output: contents[8..].to_vec(),
                }))
            }
            Self::TYPE_GUTI => {
                let body: [u8; Guti::ENCODED_LEN] = contents[1..]
                    .try_into()
                    .map_err(|_| too_short(1 + Guti::ENCODED_LEN))?;
                Ok(Ie5gsMobileIdentity::Guti(Guti::decode(body)))
            }
            Self::TYPE_IMEI => Ok(Ie5gsMobileIdentity::Imei(Self::decode_digits(contents)?)),
            Self::TYPE_IMEISV => Ok(Ie5gsMobileIdentity::Imeisv(Self::decode_digits(contents)?)),
            Self::TYPE_TMSI => {
                let body: [u8; STmsi::ENCODED_LEN] = contents[1..]
                    .try_into()
                    .map_err(|_| too_short(1 + STmsi::ENCODED_LEN))?;
                Ok(Ie5gsMobileIdentity::STmsi(STmsi::decode(body)))
            }
            other => Err(CodecError::InvalidValue(format!("mobile identity type {other}"))),
        }
    }
}

impl_lv_e!(Ie5gsMobileIdentity, 1, 255);

// ============================================================================
// Payload container (9.11.3.39) / NAS message container (9.11.3.33)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IePayloadContainer(pub Vec<u8>);

impl IePayloadContainer {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self(contents.to_vec()))
    }
}

impl_lv_e!(IePayloadContainer, 1, 65_535);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IeNasMessageContainer(pub Vec<u8>);

impl IeNasMessageContainer {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self(contents.to_vec()))
    }
}

impl_lv_e!(IeNasMessageContainer, 1, 65_535);

/// Extended protocol configuration options (9.11.4.6), carried opaquely
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IeExtendedProtocolConfigurationOptions(pub Vec<u8>);

impl IeExtendedProtocolConfigurationOptions {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self(contents.to_vec()))
    }
}

impl_lv_e!(IeExtendedProtocolConfigurationOptions, 1, 65_535);

// ============================================================================
// QoS rules (9.11.4.13)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QosRuleOperation {
    CreateNew = 0b001,
    Delete = 0b010,
    ModifyAndAddFilters = 0b011,
    ModifyAndReplaceFilters = 0b100,
    ModifyAndDeleteFilters = 0b101,
    ModifyWithoutFilters = 0b110,
}

impl QosRuleOperation {
    fn from_bits(bits: u8) -> CodecResult<Self> {
        Ok(match bits {
            0b001 => QosRuleOperation::CreateNew,
            0b010 => QosRuleOperation::Delete,
            0b011 => QosRuleOperation::ModifyAndAddFilters,
            0b100 => QosRuleOperation::ModifyAndReplaceFilters,
            0b101 => QosRuleOperation::ModifyAndDeleteFilters,
            0b110 => QosRuleOperation::ModifyWithoutFilters,
            other => return Err(CodecError::InvalidValue(format!("QoS rule operation {other}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketFilter {
    /// 1 = downlink, 2 = uplink, 3 = bidirectional
    pub direction: u8,
    pub id: u8,
    /// Packet filter components; empty for id-only entries
    pub components: Vec<u8>,
}

impl PacketFilter {
    pub const MATCH_ALL: u8 = 0x01;

    pub fn match_all(id: u8) -> Self {
        Self {
            direction: 0b11,
            id: id & 0x0F,
            components: vec![Self::MATCH_ALL],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosRule {
    pub id: u8,
    pub operation: QosRuleOperation,
    pub default_rule: bool,
    pub packet_filters: Vec<PacketFilter>,
    pub precedence: u8,
    pub segregation: bool,
    pub qfi: u8,
}

impl QosRule {
    /// Default rule with one match-all filter for `qfi`.
    pub fn default_for_flow(id: u8, qfi: u8) -> Self {
        Self {
            id,
            operation: QosRuleOperation::CreateNew,
            default_rule: true,
            packet_filters: vec![PacketFilter::match_all(1)],
            precedence: 0xFF,
            segregation: false,
            qfi: qfi & 0x3F,
        }
    }

    fn filters_carry_components(&self) -> bool {
        self.operation != QosRuleOperation::ModifyAndDeleteFilters
    }

    fn has_trailer(&self) -> bool {
        self.operation != QosRuleOperation::Delete
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> CodecResult<()> {
        let mut body = vec![
            ((self.operation as u8) << 5)
                | (u8::from(self.default_rule) << 4)
                | (self.packet_filters.len() as u8 & 0x0F),
        ];
        for filter in &self.packet_filters {
            if self.filters_carry_components() {
                body.push(((filter.direction & 0x03) << 4) | (filter.id & 0x0F));
                let len = u8::try_from(filter.components.len())
                    .map_err(|_| CodecError::EncodingError("packet filter too long".into()))?;
                body.push(len);
                body.extend_from_slice(&filter.components);
            } else {
                body.push(filter.id & 0x0F);
            }
        }
        if self.has_trailer() {
            body.push(self.precedence);
            body.push((u8::from(self.segregation) << 6) | (self.qfi & 0x3F));
        }
        out.push(self.id);
        put_lv_e(out, &body)
    }

    fn decode_from(slice: &mut &[u8]) -> CodecResult<Self> {
        let id = crate::codec::get_u8(slice)?;
        let body = get_lv_e(slice)?;
        let (&head, mut rest) = body
            .split_first()
            .ok_or_else(|| CodecError::InvalidValue("empty QoS rule".into()))?;
        let operation = QosRuleOperation::from_bits(head >> 5)?;
        let mut rule = Self {
            id,
            operation,
            default_rule: head & 0x10 != 0,
            packet_filters: Vec::new(),
            precedence: 0,
            segregation: false,
            qfi: 0,
        };
        for _ in 0..(head & 0x0F) {
            let octet = crate::codec::get_u8(&mut rest)?;
            let filter = if rule.filters_carry_components() {
                let len = usize::from(crate::codec::get_u8(&mut rest)?);
                if rest.len() < len {
                    return Err(CodecError::LengthExceedsBuffer {
                        length: len,
                        remaining: rest.len(),
                    });
                }
                let components = rest[..len].to_vec();
                rest = &rest[len..];
                PacketFilter {
                    direction: (octet >> 4) & 0x03,
                    id: octet & 0x0F,
                    components,
                }
            } else {
                PacketFilter {
                    direction: 0,
                    id: octet & 0x0F,
                    components: Vec::new(),
                }
            };
            rule.packet_filters.push(filter);
        }
        if rule.has_trailer() {
            rule.precedence = crate::codec::get_u8(&mut rest)?;
            let octet = crate::codec::get_u8(&mut rest)?;
            rule.segregation = octet & 0x40 != 0;
            rule.qfi = octet & 0x3F;
        }
        Ok(rule)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IeQosRules(pub Vec<QosRule>);

impl IeQosRules {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        for rule in &self.0 {
            rule.encode_into(&mut out)?;
        }
        Ok(out)
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let mut slice = contents;
        let mut rules = Vec::new();
        while !slice.is_empty() {
            rules.push(QosRule::decode_from(&mut slice)?);
        }
        Ok(Self(rules))
    }
}

impl_lv_e!(IeQosRules, 4, 65_535);

// ============================================================================
// QoS flow descriptions (9.11.4.12)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosFlowParameter {
    pub id: u8,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosFlowDescription {
    pub qfi: u8,
    /// 1 = create, 2 = delete, 3 = modify
    pub operation: u8,
    pub parameters_included: bool,
    pub parameters: Vec<QosFlowParameter>,
}

impl QosFlowDescription {
    pub const PARAM_5QI: u8 = 0x01;

    pub fn create_with_5qi(qfi: u8, five_qi: u8) -> Self {
        Self {
            qfi: qfi & 0x3F,
            operation: 0b001,
            parameters_included: true,
            parameters: vec![QosFlowParameter {
                id: Self::PARAM_5QI,
                contents: vec![five_qi],
            }],
        }
    }

    pub fn five_qi(&self) -> Option<u8> {
        self.parameters
            .iter()
            .find(|p| p.id == Self::PARAM_5QI)
            .and_then(|p| p.contents.first().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IeQosFlowDescriptions(pub Vec<QosFlowDescription>);

impl IeQosFlowDescriptions {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        for flow in &self.0 {
            out.push(flow.qfi & 0x3F);
            out.push((flow.operation & 0x07) << 5);
            out.push((u8::from(flow.parameters_included) << 6) | (flow.parameters.len() as u8 & 0x3F));
            for param in &flow.parameters {
                out.push(param.id);
                crate::codec::put_lv(&mut out, &param.contents)?;
            }
        }
        Ok(out)
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let mut slice = contents;
        let mut flows = Vec::new();
        while !slice.is_empty() {
            let [qfi, operation, count] = crate::codec::get_array::<_, 3>(&mut slice)?;
            let mut parameters = Vec::new();
            for _ in 0..(count & 0x3F) {
                let id = crate::codec::get_u8(&mut slice)?;
                let contents = crate::codec::get_lv(&mut slice)?;
                parameters.push(QosFlowParameter { id, contents });
            }
            flows.push(QosFlowDescription {
                qfi: qfi & 0x3F,
                operation: operation >> 5,
                parameters_included: count & 0x40 != 0,
                parameters,
            });
        }
        Ok(Self(flows))
    }
}

impl_lv_e!(IeQosFlowDescriptions, 3, 65_535);

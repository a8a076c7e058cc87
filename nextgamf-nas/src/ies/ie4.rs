//! Type 4 Information Elements (one-octet length)
//!
//! Every IE here encodes as LV; optional occurrences prefix the IEI.

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut};
use nextgamf_common::{Plmn, SNssai, Tai};

use crate::codec::{get_lv, put_lv, CodecError, CodecResult, IeBounds, NasDecode, NasEncode};
use crate::ies::ie3::GprsTimer;

/// Implements LV framing from `contents` / `from_contents`.
///
/// The value part must be between `$min` and `$max` octets.
macro_rules! impl_lv {
    ($ty:ty, $min:expr, $max:expr) => {
        impl IeBounds for $ty {
            const MIN_LEN: usize = 1 + $min;
            const MAX_LEN: usize = 1 + $max;
        }

        impl NasEncode for $ty {
            fn nas_encode<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
                let contents = self.contents()?;
                put_lv(buf, &contents)
            }

            fn encoded_len(&self) -> usize {
                1 + self.contents().map_or(0, |c| c.len())
            }
        }

        impl NasDecode for $ty {
            fn nas_decode<B: Buf>(buf: &mut B) -> CodecResult<Self> {
                let contents = get_lv(buf)?;
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
// UE security capability (9.11.3.54)
// ============================================================================

/// Supported 5G-EA / 5G-IA algorithms as bitmaps, bit 8 is algorithm 0
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IeUeSecurityCapability {
    pub ea: u8,
    pub ia: u8,
    /// EPS algorithm octets, carried opaquely
    pub eps: Vec<u8>,
}

impl IeUeSecurityCapability {
    pub fn new(ea: u8, ia: u8) -> Self {
        Self {
            ea,
            ia,
            eps: Vec::new(),
        }
    }

    /// Builds the bitmaps from algorithm codes.
    pub fn from_algorithms(ea: &[u8], ia: &[u8]) -> Self {
        let bits = |codes: &[u8]| codes.iter().filter(|c| **c < 8).fold(0u8, |acc, c| acc | (0x80 >> c));
        Self::new(bits(ea), bits(ia))
    }

    pub fn supports_ea(&self, code: u8) -> bool {
        code < 8 && self.ea & (0x80 >> code) != 0
    }

    pub fn supports_ia(&self, code: u8) -> bool {
        code < 8 && self.ia & (0x80 >> code) != 0
    }

    fn contents(&self) -> CodecResult<Vec<u8>> {
        let mut out = vec![self.ea, self.ia];
        out.extend_from_slice(&self.eps);
        Ok(out)
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self {
            ea: contents[0],
            ia: contents[1],
            eps: contents[2..].to_vec(),
        })
    }
}

impl_lv!(IeUeSecurityCapability, 2, 8);

// ============================================================================
// 5GS registration result (9.11.3.6)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ie5gsRegistrationResult {
    pub sms_allowed: bool,
    /// 1 = 3GPP, 2 = non-3GPP, 3 = both
    pub access: u8,
}

impl Default for Ie5gsRegistrationResult {
    fn default() -> Self {
        Self::three_gpp()
    }
}

impl Ie5gsRegistrationResult {
    pub fn three_gpp() -> Self {
        Self {
            sms_allowed: false,
            access: 1,
        }
    }

    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(vec![(u8::from(self.sms_allowed) << 3) | (self.access & 0x07)])
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self {
            sms_allowed: contents[0] & 0x08 != 0,
            access: contents[0] & 0x07,
        })
    }
}

impl_lv!(Ie5gsRegistrationResult, 1, 1);

// ============================================================================
// Authentication IEs (9.11.3.10, 9.11.3.14, 9.11.3.15, 9.11.3.17)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IeAbba(pub Vec<u8>);

impl Default for IeAbba {
    fn default() -> Self {
        Self(vec![0x00, 0x00])
    }
}

impl IeAbba {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self(contents.to_vec()))
    }
}

impl_lv!(IeAbba, 2, 255);

/// AUTN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IeAutn(pub [u8; 16]);

impl IeAutn {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.to_vec())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let mut out = [0u8; 16];
        out.copy_from_slice(contents);
        Ok(Self(out))
    }
}

impl_lv!(IeAutn, 16, 16);

/// RES* returned by the UE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IeAuthenticationResponseParameter(pub Vec<u8>);

impl IeAuthenticationResponseParameter {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self(contents.to_vec()))
    }
}

impl_lv!(IeAuthenticationResponseParameter, 4, 16);

/// AUTS, sent with synch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IeAuthenticationFailureParameter(pub [u8; 14]);

impl IeAuthenticationFailureParameter {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.to_vec())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let mut out = [0u8; 14];
        out.copy_from_slice(contents);
        Ok(Self(out))
    }
}

impl_lv!(IeAuthenticationFailureParameter, 14, 14);

// ============================================================================
// S-NSSAI / NSSAI (9.11.2.8, 9.11.3.37)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IeSNssai(pub SNssai);

impl IeSNssai {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.encode())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        SNssai::decode(contents)
            .map(Self)
            .ok_or_else(|| CodecError::InvalidValue(format!("S-NSSAI length {}", contents.len())))
    }
}

impl_lv!(IeSNssai, 1, 8);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IeNssai(pub Vec<SNssai>);

impl IeNssai {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        for s_nssai in &self.0 {
            put_lv(&mut out, &s_nssai.encode())?;
        }
        Ok(out)
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let mut slice = contents;
        let mut list = Vec::new();
        while !slice.is_empty() {
            list.push(IeSNssai::nas_decode(&mut slice)?.0);
        }
        Ok(Self(list))
    }
}

impl_lv!(IeNssai, 2, 144);

// ============================================================================
// 5GS tracking area identity list (9.11.3.9)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IeTaiList(pub Vec<Tai>);

impl IeTaiList {
    pub const MAX_TAIS: usize = 16;

    /// Emits one "list of TACs belonging to one PLMN" per run of equal PLMNs.
    fn contents(&self) -> CodecResult<Vec<u8>> {
        if self.0.is_empty() || self.0.len() > Self::MAX_TAIS {
            return Err(CodecError::EncodingError(format!(
                "TAI list must hold 1..={} entries, got {}",
                Self::MAX_TAIS,
                self.0.len()
            )));
        }
        let mut out = Vec::new();
        let mut start = 0;
        while start < self.0.len() {
            let plmn = self.0[start].plmn;
            let end = self.0[start..]
                .iter()
                .position(|tai| tai.plmn != plmn)
                .map_or(self.0.len(), |offset| start + offset);
            out.push((end - start - 1) as u8 & 0x1F);
            out.extend_from_slice(&plmn.encode());
            for tai in &self.0[start..end] {
                out.extend_from_slice(&tai.tac.to_be_bytes()[1..]);
            }
            start = end;
        }
        Ok(out)
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        fn need(slice: &[u8], n: usize) -> CodecResult<()> {
            if slice.len() < n {
                return Err(CodecError::BufferTooShort {
                    expected: n,
                    actual: slice.len(),
                });
            }
            Ok(())
        }
        fn tac(octets: &[u8]) -> u32 {
            u32::from_be_bytes([0, octets[0], octets[1], octets[2]])
        }
        fn plmn(octets: &[u8]) -> Plmn {
            Plmn::decode([octets[0], octets[1], octets[2]])
        }

        let mut slice = contents;
        let mut tais = Vec::new();
        while !slice.is_empty() {
            let head = slice[0];
            let count = usize::from(head & 0x1F) + 1;
            slice = &slice[1..];
            match (head >> 5) & 0x03 {
                0b00 => {
                    need(slice, 3 + 3 * count)?;
                    let p = plmn(slice);
                    for i in 0..count {
                        tais.push(Tai::new(p, tac(&slice[3 + 3 * i..])));
                    }
                    slice = &slice[3 + 3 * count..];
                }
                0b01 => {
                    need(slice, 6)?;
                    let p = plmn(slice);
                    let first = tac(&slice[3..]);
                    for i in 0..count as u32 {
                        tais.push(Tai::new(p, first.wrapping_add(i) & 0x00FF_FFFF));
                    }
                    slice = &slice[6..];
                }
                0b10 => {
                    need(slice, 6 * count)?;
                    for i in 0..count {
                        let entry = &slice[6 * i..];
                        tais.push(Tai::new(plmn(entry), tac(&entry[3..])));
                    }
                    slice = &slice[6 * count..];
                }
                other => {
                    return Err(CodecError::InvalidValue(format!("TAI list type {other}")));
                }
            }
        }
        Ok(Self(tais))
    }
}

impl_lv!(IeTaiList, 7, 96);

// ============================================================================
// PDU session status (9.11.3.44)
// ============================================================================

/// Bitmap over PDU session identities 0-15
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IePduSessionStatus(pub u16);

impl IePduSessionStatus {
    pub fn from_ids(ids: impl IntoIterator<Item = u8>) -> Self {
        Self(ids.into_iter().filter(|id| *id < 16).fold(0, |acc, id| acc | (1 << id)))
    }

    pub fn is_active(&self, id: u8) -> bool {
        id < 16 && self.0 & (1 << id) != 0
    }

    pub fn active_ids(&self) -> Vec<u8> {
        (1..16).filter(|id| self.is_active(*id)).collect()
    }

    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(vec![(self.0 & 0xFF) as u8, (self.0 >> 8) as u8])
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self(u16::from(contents[0]) | (u16::from(contents[1]) << 8)))
    }
}

impl_lv!(IePduSessionStatus, 2, 32);

// ============================================================================
// DNN (9.11.2.1B)
// ============================================================================

/// Data network name in dotted form; encoded as length-prefixed labels
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IeDnn(pub String);

impl IeDnn {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn contents(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        for label in self.0.split('.') {
            if label.is_empty() || label.len() > 63 {
                return Err(CodecError::EncodingError(format!("invalid DNN label in {:?}", self.0)));
            }
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        Ok(out)
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let mut labels = Vec::new();
        let mut slice = contents;
        while let Some((&len, rest)) = slice.split_first() {
            let len = usize::from(len);
            if len == 0 || len > rest.len() {
                return Err(CodecError::InvalidValue("malformed DNN label".into()));
            }
            let label = std::str::from_utf8(&rest[..len])
                .map_err(|_| CodecError::InvalidValue("DNN label is not text".into()))?;
            labels.push(label.to_string());
            slice = &rest[len..];
        }
        Ok(Self(labels.join(".")))
    }
}

impl_lv!(IeDnn, 1, 100);

// ============================================================================
// Session-AMBR (9.11.4.14)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IeSessionAmbr {
    pub downlink_unit: u8,
    pub downlink: u16,
    pub uplink_unit: u8,
    pub uplink: u16,
}

impl IeSessionAmbr {
    /// Unit code 1 is 1 kbps; every following code multiplies by 4.
    fn unit_kbps(unit: u8) -> u64 {
        4u64.pow(u32::from(unit.saturating_sub(1)))
    }

    /// Smallest unit whose multiplier keeps the value within 16 bits.
    fn encode_rate(kbps: u64) -> (u8, u16) {
        let mut unit = 1u8;
        while kbps / Self::unit_kbps(unit) > u64::from(u16::MAX) && unit < 0x19 {
            unit += 1;
        }
        let value = (kbps / Self::unit_kbps(unit)).min(u64::from(u16::MAX));
        (unit, value as u16)
    }

    pub fn from_kbps(uplink_kbps: u64, downlink_kbps: u64) -> Self {
        let (downlink_unit, downlink) = Self::encode_rate(downlink_kbps);
        let (uplink_unit, uplink) = Self::encode_rate(uplink_kbps);
        Self {
            downlink_unit,
            downlink,
            uplink_unit,
            uplink,
        }
    }

    pub fn uplink_kbps(&self) -> u64 {
        u64::from(self.uplink) * Self::unit_kbps(self.uplink_unit)
    }

    pub fn downlink_kbps(&self) -> u64 {
        u64::from(self.downlink) * Self::unit_kbps(self.downlink_unit)
    }

    fn contents(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::with_capacity(6);
        out.put_u8(self.downlink_unit);
        out.put_u16(self.downlink);
        out.put_u8(self.uplink_unit);
        out.put_u16(self.uplink);
        Ok(out)
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let mut slice = contents;
        Ok(Self {
            downlink_unit: slice.get_u8(),
            downlink: slice.get_u16(),
            uplink_unit: slice.get_u8(),
            uplink: slice.get_u16(),
        })
    }
}

impl_lv!(IeSessionAmbr, 6, 6);

// ============================================================================
// PDU address (9.11.4.10)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IePduAddress {
    Ipv4(Ipv4Addr),
    /// IPv6 interface identifier
    Ipv6([u8; 8]),
    Ipv4v6([u8; 8], Ipv4Addr),
}

impl IePduAddress {
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            IePduAddress::Ipv4(addr) | IePduAddress::Ipv4v6(_, addr) => Some(*addr),
            IePduAddress::Ipv6(_) => None,
        }
    }

    fn contents(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::with_capacity(13);
        match self {
            IePduAddress::Ipv4(addr) => {
                out.push(0x01);
                out.extend_from_slice(&addr.octets());
            }
            IePduAddress::Ipv6(iid) => {
                out.push(0x02);
                out.extend_from_slice(iid);
            }
            IePduAddress::Ipv4v6(iid, addr) => {
                out.push(0x03);
                out.extend_from_slice(iid);
                out.extend_from_slice(&addr.octets());
            }
        }
        Ok(out)
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let body = &contents[1..];
        let iid = |octets: &[u8]| {
            let mut out = [0u8; 8];
            out.copy_from_slice(&octets[..8]);
            out
        };
        let v4 = |octets: &[u8]| Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
        match (contents[0] & 0x07, body.len()) {
            (0x01, 4) => Ok(IePduAddress::Ipv4(v4(body))),
            (0x02, 8) => Ok(IePduAddress::Ipv6(iid(body))),
            (0x03, 12) => Ok(IePduAddress::Ipv4v6(iid(body), v4(&body[8..]))),
            (kind, len) => Err(CodecError::InvalidValue(format!(
                "PDU address type {kind} with {len} address octets"
            ))),
        }
    }
}

impl_lv!(IePduAddress, 5, 13);

// ============================================================================
// Network name (TS 24.008 §10.5.3.5a)
// ============================================================================

const GSM_ESCAPE_FREE_PUNCT: &str = " !\"#%&'()*+,-./:;<=>?";

fn gsm_septet(c: char) -> Option<u8> {
    match c {
        '@' => Some(0x00),
        '$' => Some(0x02),
        '_' => Some(0x11),
        '\n' => Some(0x0A),
        '\r' => Some(0x0D),
        'A'..='Z' | 'a'..='z' | '0'..='9' => Some(c as u8),
        c if GSM_ESCAPE_FREE_PUNCT.contains(c) => Some(c as u8),
        _ => None,
    }
}

fn gsm_char(septet: u8) -> char {
    match septet {
        0x00 => '@',
        0x02 => '$',
        0x11 => '_',
        0x0A => '\n',
        0x0D => '\r',
        s if s.is_ascii_alphanumeric() => s as char,
        s if GSM_ESCAPE_FREE_PUNCT.contains(s as char) => s as char,
        _ => '?',
    }
}

/// Packs septets LSB first. Returns the octets and the unused bit count of
/// the last octet.
pub fn pack_gsm7(text: &str) -> CodecResult<(Vec<u8>, u8)> {
    let septets = text
        .chars()
        .map(|c| {
            gsm_septet(c).ok_or_else(|| {
                CodecError::EncodingError(format!("{c:?} has no GSM 7-bit default alphabet code"))
            })
        })
        .collect::<CodecResult<Vec<u8>>>()?;
    let bits = septets.len() * 7;
    let mut out = vec![0u8; bits.div_ceil(8)];
    for (i, septet) in septets.iter().enumerate() {
        let offset = i * 7;
        let (index, shift) = (offset / 8, offset % 8);
        out[index] |= septet << shift;
        if shift > 1 {
            out[index + 1] |= septet >> (8 - shift);
        }
    }
    let spare = (out.len() * 8 - bits) as u8;
    Ok((out, spare))
}

pub fn unpack_gsm7(octets: &[u8], spare_bits: u8) -> String {
    let bits = (octets.len() * 8).saturating_sub(usize::from(spare_bits));
    (0..bits / 7)
        .map(|i| {
            let offset = i * 7;
            let (index, shift) = (offset / 8, offset % 8);
            let mut value = u16::from(octets[index]) >> shift;
            if shift > 1 {
                value |= u16::from(octets[index + 1]) << (8 - shift);
            }
            gsm_char((value & 0x7F) as u8)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IeNetworkName {
    pub name: String,
    /// Add CI: the UE should append its country initials
    pub add_ci: bool,
}

impl IeNetworkName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            add_ci: false,
        }
    }

    fn contents(&self) -> CodecResult<Vec<u8>> {
        let (packed, spare) = pack_gsm7(&self.name)?;
        // ext = 1, coding scheme 000 (GSM default alphabet)
        let mut out = vec![0x80 | (u8::from(self.add_ci) << 3) | (spare & 0x07)];
        out.extend_from_slice(&packed);
        Ok(out)
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        let head = contents[0];
        let coding = (head >> 4) & 0x07;
        if coding != 0 {
            return Err(CodecError::InvalidValue(format!("network name coding scheme {coding}")));
        }
        Ok(Self {
            name: unpack_gsm7(&contents[1..], head & 0x07),
            add_ci: head & 0x08 != 0,
        })
    }
}

impl_lv!(IeNetworkName, 1, 255);

// ============================================================================
// GPRS timer 2 / GPRS timer 3 (TS 24.008 §10.5.7.4, §10.5.7.4a)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IeGprsTimer2(pub GprsTimer);

impl IeGprsTimer2 {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(vec![self.0.to_octet()])
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self(GprsTimer::from_octet(contents[0])))
    }
}

impl_lv!(IeGprsTimer2, 1, 1);

/// GPRS timer 3, unit codes in bits 8-6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IeGprsTimer3 {
    pub unit: u8,
    pub value: u8,
}

impl IeGprsTimer3 {
    pub const UNIT_DEACTIVATED: u8 = 0b111;

    /// (unit code, seconds per step) in ascending step order
    const UNITS: [(u8, u64); 7] = [
        (0b011, 2),
        (0b100, 30),
        (0b101, 60),
        (0b000, 600),
        (0b001, 3_600),
        (0b010, 36_000),
        (0b110, 1_152_000),
    ];

    pub fn deactivated() -> Self {
        Self {
            unit: Self::UNIT_DEACTIVATED,
            value: 0,
        }
    }

    /// Picks the finest unit that represents `secs` in five bits.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            return Self::deactivated();
        }
        for (unit, step) in Self::UNITS {
            if secs / step <= 31 {
                return Self {
                    unit,
                    value: (secs / step) as u8,
                };
            }
        }
        Self { unit: 0b110, value: 31 }
    }

    pub fn as_secs(&self) -> Option<u64> {
        Self::UNITS
            .iter()
            .find(|(unit, _)| *unit == self.unit)
            .map(|(_, step)| step * u64::from(self.value))
    }

    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(vec![(self.unit << 5) | (self.value & 0x1F)])
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self {
            unit: contents[0] >> 5,
            value: contents[0] & 0x1F,
        })
    }
}

impl_lv!(IeGprsTimer3, 1, 1);

// ============================================================================
// Capability octets carried opaquely (9.11.3.1, 9.11.4.1)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ie5gmmCapability(pub Vec<u8>);

impl Ie5gmmCapability {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self(contents.to_vec()))
    }
}

impl_lv!(Ie5gmmCapability, 1, 13);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ie5gsmCapability(pub Vec<u8>);

impl Ie5gsmCapability {
    fn contents(&self) -> CodecResult<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn from_contents(contents: &[u8]) -> CodecResult<Self> {
        Ok(Self(contents.to_vec()))
    }
}

impl_lv!(Ie5gsmCapability, 1, 13);

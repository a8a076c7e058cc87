//! Subscriber and network identities shared by the AMF crates.
//!
//! Wire encodings follow 3GPP TS 24.501 / TS 23.003 (BCD digits, low nibble first).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Public Land Mobile Network identifier (MCC + MNC).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (0-999)
    pub mcc: u16,
    /// Mobile Network Code (0-999)
    pub mnc: u16,
    /// MNC carries three digits
    pub long_mnc: bool,
}

impl Plmn {
    /// Size of the BCD encoding.
    pub const ENCODED_LEN: usize = 3;

    pub const fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Parses the leading PLMN of an IMSI digit string.
    ///
    /// The caller decides the MNC length since it cannot be derived from
    /// the digits alone.
    pub fn from_imsi(imsi: &str, long_mnc: bool) -> Option<Self> {
        let mnc_len = if long_mnc { 3 } else { 2 };
        if imsi.len() < 3 + mnc_len || !imsi.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mcc = imsi[..3].parse().ok()?;
        let mnc = imsi[3..3 + mnc_len].parse().ok()?;
        Some(Self::new(mcc, mnc, long_mnc))
    }

    fn digits(&self) -> ([u8; 3], [u8; 3]) {
        let mcc = [
            (self.mcc / 100 % 10) as u8,
            (self.mcc / 10 % 10) as u8,
            (self.mcc % 10) as u8,
        ];
        let mnc = if self.long_mnc {
            [
                (self.mnc / 100 % 10) as u8,
                (self.mnc / 10 % 10) as u8,
                (self.mnc % 10) as u8,
            ]
        } else {
            [(self.mnc / 10 % 10) as u8, (self.mnc % 10) as u8, 0x0F]
        };
        (mcc, mnc)
    }

    /// Encodes to the 3-octet BCD form. A 2-digit MNC pads with 0xF.
    pub fn encode(&self) -> [u8; 3] {
        let (mcc, mnc) = self.digits();
        [
            (mcc[1] << 4) | mcc[0],
            (mnc[2] << 4) | mcc[2],
            (mnc[1] << 4) | mnc[0],
        ]
    }

    pub fn decode(bytes: [u8; 3]) -> Self {
        let mcc = 100 * (bytes[0] & 0x0F) as u16
            + 10 * (bytes[0] >> 4) as u16
            + (bytes[1] & 0x0F) as u16;
        let mnc3 = bytes[1] >> 4;
        let mnc12 = 10 * (bytes[2] & 0x0F) as u16 + (bytes[2] >> 4) as u16;
        if mnc3 == 0x0F {
            Self::new(mcc, mnc12, false)
        } else {
            Self::new(mcc, mnc12 * 10 + mnc3 as u16, true)
        }
    }
}

impl fmt::Debug for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plmn({self})")
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}-{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}-{:02}", self.mcc, self.mnc)
        }
    }
}

/// Tracking Area Identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tai {
    pub plmn: Plmn,
    /// Tracking Area Code (24-bit)
    pub tac: u32,
}

impl Tai {
    pub const fn new(plmn: Plmn, tac: u32) -> Self {
        Self { plmn, tac }
    }

    pub fn encode(&self) -> [u8; 6] {
        let p = self.plmn.encode();
        let t = self.tac.to_be_bytes();
        [p[0], p[1], p[2], t[1], t[2], t[3]]
    }

    pub fn decode(bytes: [u8; 6]) -> Self {
        let plmn = Plmn::decode([bytes[0], bytes[1], bytes[2]]);
        let tac = u32::from_be_bytes([0, bytes[3], bytes[4], bytes[5]]);
        Self { plmn, tac }
    }
}

impl fmt::Display for Tai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:06X}", self.plmn, self.tac)
    }
}

/// Single Network Slice Selection Assistance Information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator (24-bit)
    pub sd: Option<u32>,
}

impl SNssai {
    pub const fn new(sst: u8) -> Self {
        Self { sst, sd: None }
    }

    pub const fn with_sd(sst: u8, sd: u32) -> Self {
        Self { sst, sd: Some(sd & 0x00FF_FFFF) }
    }

    /// Encoded contents without the length octet (1 or 4 octets).
    pub fn encode(&self) -> Vec<u8> {
        match self.sd {
            Some(sd) => {
                let b = sd.to_be_bytes();
                vec![self.sst, b[1], b[2], b[3]]
            }
            None => vec![self.sst],
        }
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [sst] => Some(Self::new(sst)),
            [sst, a, b, c] => Some(Self::with_sd(sst, u32::from_be_bytes([0, a, b, c]))),
            // SST+SD followed by mapped HPLMN values, which are not tracked
            [sst, a, b, c, ..] if bytes.len() == 5 || bytes.len() == 8 => {
                Some(Self::with_sd(sst, u32::from_be_bytes([0, a, b, c])))
            }
            _ => None,
        }
    }
}

impl fmt::Display for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd {
            Some(sd) => write!(f, "{}:{:06X}", self.sst, sd),
            None => write!(f, "{}", self.sst),
        }
    }
}

/// Subscription Permanent Identifier in IMSI form.
///
/// The AMF keys every persisted subscriber record by this value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Supi(String);

impl Supi {
    /// Builds a SUPI from IMSI digits. Returns `None` unless 6-15 decimal digits.
    pub fn from_imsi(digits: impl Into<String>) -> Option<Self> {
        let digits = digits.into();
        let valid = (6..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit());
        valid.then_some(Self(digits))
    }

    /// Parses `imsi-<digits>` or bare digits.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_imsi(s.strip_prefix("imsi-").unwrap_or(s))
    }

    pub fn imsi(&self) -> &str {
        &self.0
    }

    /// Numeric form, used where the IMSI acts as a compact key.
    pub fn imsi64(&self) -> u64 {
        self.0.bytes().fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'))
    }
}

impl fmt::Debug for Supi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Supi(imsi-{})", self.0)
    }
}

impl fmt::Display for Supi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "imsi-{}", self.0)
    }
}

/// Globally Unique AMF Identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guami {
    pub plmn: Plmn,
    pub amf_region_id: u8,
    /// 10-bit AMF set id
    pub amf_set_id: u16,
    /// 6-bit AMF pointer
    pub amf_pointer: u8,
}

impl Guami {
    pub const fn new(plmn: Plmn, amf_region_id: u8, amf_set_id: u16, amf_pointer: u8) -> Self {
        Self {
            plmn,
            amf_region_id,
            amf_set_id: amf_set_id & 0x03FF,
            amf_pointer: amf_pointer & 0x3F,
        }
    }

    /// Set id and pointer packed as they appear on the wire.
    pub fn set_and_pointer(&self) -> u16 {
        (self.amf_set_id << 6) | u16::from(self.amf_pointer)
    }
}

/// 5G Globally Unique Temporary Identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guti {
    pub guami: Guami,
    /// 5G-TMSI
    pub tmsi: u32,
}

impl Guti {
    /// Length of the identity contents after the type octet.
    pub const ENCODED_LEN: usize = 10;

    pub const fn new(guami: Guami, tmsi: u32) -> Self {
        Self { guami, tmsi }
    }

    pub fn s_tmsi(&self) -> STmsi {
        STmsi {
            amf_set_id: self.guami.amf_set_id,
            amf_pointer: self.guami.amf_pointer,
            tmsi: self.tmsi,
        }
    }

    /// PLMN, region, set/pointer, TMSI.
    pub fn encode(&self) -> [u8; 10] {
        let p = self.guami.plmn.encode();
        let sp = self.guami.set_and_pointer().to_be_bytes();
        let t = self.tmsi.to_be_bytes();
        [p[0], p[1], p[2], self.guami.amf_region_id, sp[0], sp[1], t[0], t[1], t[2], t[3]]
    }

    pub fn decode(bytes: [u8; 10]) -> Self {
        let plmn = Plmn::decode([bytes[0], bytes[1], bytes[2]]);
        let sp = u16::from_be_bytes([bytes[4], bytes[5]]);
        let guami = Guami::new(plmn, bytes[3], sp >> 6, (sp & 0x3F) as u8);
        let tmsi = u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        Self { guami, tmsi }
    }
}

impl fmt::Display for Guti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02X}-{:03X}-{:02X}-{:08X}",
            self.guami.plmn,
            self.guami.amf_region_id,
            self.guami.amf_set_id,
            self.guami.amf_pointer,
            self.tmsi
        )
    }
}

/// 5G-S-TMSI: the shortened temporary identity used in service requests and paging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct STmsi {
    pub amf_set_id: u16,
    pub amf_pointer: u8,
    pub tmsi: u32,
}

impl STmsi {
    pub const ENCODED_LEN: usize = 6;

    pub fn encode(&self) -> [u8; 6] {
        let sp = ((self.amf_set_id & 0x03FF) << 6 | u16::from(self.amf_pointer & 0x3F)).to_be_bytes();
        let t = self.tmsi.to_be_bytes();
        [sp[0], sp[1], t[0], t[1], t[2], t[3]]
    }

    pub fn decode(bytes: [u8; 6]) -> Self {
        let sp = u16::from_be_bytes([bytes[0], bytes[1]]);
        Self {
            amf_set_id: sp >> 6,
            amf_pointer: (sp & 0x3F) as u8,
            tmsi: u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
        }
    }
}

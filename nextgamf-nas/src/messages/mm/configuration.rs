//! Configuration update command (TS 24.501 §8.2.19)

use bytes::{Buf, BufMut};

use crate::codec::{peek_iei, CodecResult, IeBounds};
use crate::enums::MmMessageType;
use crate::header::PlainMmHeader;
use crate::ies::ie1::IeConfigurationUpdateIndication;
use crate::ies::ie4::{IeNetworkName, IeNssai, IeTaiList};
use crate::ies::ie6::Ie5gsMobileIdentity;
use crate::messages::{opt_ie1_len, opt_len, presence_mask, put_opt, put_opt_ie1, take_opt, take_opt_ie1, MmBody};

mod configuration_iei {
    pub const INDICATION: u8 = 0x0D;
    pub const GUTI: u8 = 0x77;
    pub const TAI_LIST: u8 = 0x54;
    pub const ALLOWED_NSSAI: u8 = 0x15;
    pub const FULL_NAME: u8 = 0x43;
    pub const SHORT_NAME: u8 = 0x45;
}

/// Network-initiated update of the UE's configuration. Every IE is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigurationUpdateCommand {
    pub indication: Option<IeConfigurationUpdateIndication>,
    pub guti: Option<Ie5gsMobileIdentity>,
    pub tai_list: Option<IeTaiList>,
    pub allowed_nssai: Option<IeNssai>,
    pub full_network_name: Option<IeNetworkName>,
    pub short_network_name: Option<IeNetworkName>,
}

impl ConfigurationUpdateCommand {
    pub fn presence_mask(&self) -> u32 {
        presence_mask(&[
            self.indication.is_some(),
            self.guti.is_some(),
            self.tai_list.is_some(),
            self.allowed_nssai.is_some(),
            self.full_network_name.is_some(),
            self.short_network_name.is_some(),
        ])
    }
}

impl IeBounds for ConfigurationUpdateCommand {
    const MIN_LEN: usize = PlainMmHeader::SIZE;
    const MAX_LEN: usize = PlainMmHeader::SIZE
        + 1
        + (1 + Ie5gsMobileIdentity::MAX_LEN)
        + (1 + IeTaiList::MAX_LEN)
        + (1 + IeNssai::MAX_LEN)
        + 2 * (1 + IeNetworkName::MAX_LEN);
}

impl MmBody for ConfigurationUpdateCommand {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::ConfigurationUpdateCommand;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        use configuration_iei::*;
        put_opt_ie1(buf, INDICATION, &self.indication);
        put_opt(buf, GUTI, &self.guti)?;
        put_opt(buf, TAI_LIST, &self.tai_list)?;
        put_opt(buf, ALLOWED_NSSAI, &self.allowed_nssai)?;
        put_opt(buf, FULL_NAME, &self.full_network_name)?;
        put_opt(buf, SHORT_NAME, &self.short_network_name)
    }

    fn body_len(&self) -> usize {
        opt_ie1_len(&self.indication)
            + opt_len(&self.guti)
            + opt_len(&self.tai_list)
            + opt_len(&self.allowed_nssai)
            + opt_len(&self.full_network_name)
            + opt_len(&self.short_network_name)
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        use configuration_iei::*;
        let mut msg = Self::default();
        while let Some(iei) = peek_iei(buf) {
            match iei {
                iei if iei >> 4 == INDICATION => msg.indication = take_opt_ie1(buf)?,
                GUTI => msg.guti = take_opt(buf)?,
                TAI_LIST => msg.tai_list = take_opt(buf)?,
                ALLOWED_NSSAI => msg.allowed_nssai = take_opt(buf)?,
                FULL_NAME => msg.full_network_name = take_opt(buf)?,
                SHORT_NAME => msg.short_network_name = take_opt(buf)?,
                _ => break,
            }
        }
        Ok(msg)
    }
}

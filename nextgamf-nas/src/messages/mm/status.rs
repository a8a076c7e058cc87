//! 5GMM status (TS 24.501 §8.2.29)

use bytes::{Buf, BufMut};

use crate::codec::{CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::MmMessageType;
use crate::header::PlainMmHeader;
use crate::ies::ie3::MmCause;
use crate::messages::MmBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmStatus {
    pub cause: MmCause,
}

impl IeBounds for MmStatus {
    const MIN_LEN: usize = PlainMmHeader::SIZE + 1;
    const MAX_LEN: usize = PlainMmHeader::SIZE + 1;
}

impl MmBody for MmStatus {
    const MESSAGE_TYPE: MmMessageType = MmMessageType::MmStatus;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.cause.nas_encode(buf)
    }

    fn body_len(&self) -> usize {
        1
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self {
            cause: MmCause::nas_decode(buf)?,
        })
    }
}

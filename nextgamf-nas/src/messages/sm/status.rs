//! 5GSM status (TS 24.501 §8.3.16)

use bytes::{Buf, BufMut};

use crate::codec::{CodecResult, IeBounds, NasDecode, NasEncode};
use crate::enums::SmMessageType;
use crate::header::PlainSmHeader;
use crate::ies::ie3::SmCause;
use crate::messages::SmBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmStatus {
    pub cause: SmCause,
}

impl IeBounds for SmStatus {
    const MIN_LEN: usize = PlainSmHeader::SIZE + 1;
    const MAX_LEN: usize = PlainSmHeader::SIZE + 1;
}

impl SmBody for SmStatus {
    const MESSAGE_TYPE: SmMessageType = SmMessageType::SmStatus;

    fn encode_body<B: BufMut>(&self, buf: &mut B) -> CodecResult<()> {
        self.cause.nas_encode(buf)
    }

    fn body_len(&self) -> usize {
        1
    }

    fn decode_body<B: Buf>(buf: &mut B) -> CodecResult<Self> {
        Ok(Self {
            cause: SmCause::nas_decode(buf)?,
        })
    }
}

//! NAS COUNT bookkeeping (TS 33.501 §6.4.3)
//!
//! A NAS COUNT is a 24-bit value: a 16-bit overflow counter followed by the
//! 8-bit sequence number carried in the security protected header. Only the
//! sequence number travels on the wire, so the receiver estimates the full
//! COUNT from the last value it accepted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CountError {
    #[error("NAS COUNT overflow")]
    Overflow,
    /// Estimated uplink COUNT lies behind the recorded one
    #[error("replayed NAS COUNT {received:#08x}, last accepted {current:#08x}")]
    Replayed { received: u32, current: u32 },
}

/// Direction bit fed to the NAS security algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NasDirection {
    Uplink = 0,
    Downlink = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NasCount {
    pub overflow: u16,
    pub sqn: u8,
}

impl NasCount {
    pub const MAX: u32 = 0x00FF_FFFF;

    pub fn new(overflow: u16, sqn: u8) -> Self {
        Self { overflow, sqn }
    }

    /// Format: `[0x00][overflow_high][overflow_low][sqn]`
    pub fn to_u32(&self) -> u32 {
        (u32::from(self.overflow) << 8) | u32::from(self.sqn)
    }

    pub fn from_u32(value: u32) -> Self {
        Self {
            overflow: ((value >> 8) & 0xFFFF) as u16,
            sqn: (value & 0xFF) as u8,
        }
    }

    /// Advances to the next COUNT, used after sending a message.
    pub fn increment(&mut self) -> Result<(), CountError> {
        let next = self.to_u32() + 1;
        if next > Self::MAX {
            return Err(CountError::Overflow);
        }
        *self = Self::from_u32(next);
        Ok(())
    }

    /// Full COUNT for a received sequence number.
    ///
    /// A sequence number lower than the recorded one is taken to have wrapped,
    /// so the overflow counter is bumped.
    pub fn estimate(&self, received_sqn: u8) -> NasCount {
        if received_sqn < self.sqn {
            NasCount::new(self.overflow.wrapping_add(1), received_sqn)
        } else {
            NasCount::new(self.overflow, received_sqn)
        }
    }

    /// Records a received COUNT. The stored value never decreases.
    pub fn accept(&mut self, received: NasCount) -> Result<(), CountError> {
        if received < *self {
            return Err(CountError::Replayed {
                received: received.to_u32(),
                current: self.to_u32(),
            });
        }
        *self = received;
        Ok(())
    }
}

impl std::fmt::Display for NasCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.overflow, self.sqn)
    }
}

//! NAS (Non-Access Stratum) protocol library
//!
//! Implements 5G NAS message encoding/decoding for:
//! - 5GMM (Mobility Management)
//! - 5GSM (Session Management)
//!
//! # Message Structure
//!
//! NAS messages consist of:
//! - A header (plain or security protected)
//! - Mandatory information elements in a fixed order
//! - Optional information elements, each behind its IEI
//!
//! Every IE declares its encoded bounds through [`IeBounds`], and a message's
//! bounds are the sums over its IEs. Decoding checks the window against the
//! message minimum before touching the body.
//!
//! # Example
//!
//! ```rust
//! use nextgamf_nas::messages::{MmStatus, NasMessage};
//! use nextgamf_nas::ies::MmCause;
//!
//! let message = NasMessage::Mm(MmStatus { cause: MmCause::Congestion }.into());
//! let bytes = message.encode(16).unwrap();
//! assert_eq!(bytes, vec![0x7E, 0x00, 0x64, 0x16]);
//!
//! let (decoded, used) = NasMessage::decode(&bytes, bytes.len()).unwrap();
//! assert_eq!(used, 4);
//! assert_eq!(decoded, message);
//! ```

pub mod codec;
pub mod enums;
pub mod header;
pub mod ies;
pub mod messages;
pub mod security;

pub use codec::{CodecError, CodecResult, IeBounds, NasDecode, NasEncode};
pub use enums::{ExtendedProtocolDiscriminator, MessageType, MmMessageType, SecurityHeaderType, SmMessageType};
pub use header::{peek_header, PlainMmHeader, PlainSmHeader, SecuredHeader};
pub use messages::{presence_mask, MmMessage, NasMessage, NasPdu, SmMessage, SmNasMessage};
pub use security::{CountError, NasCount, NasDirection};

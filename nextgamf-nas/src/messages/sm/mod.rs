//! 5GSM (Session Management) Messages (TS 24.501 §8.3)
//!
//! - Establishment: [`PduSessionEstablishmentRequest`], [`PduSessionEstablishmentAccept`],
//!   [`PduSessionEstablishmentReject`]
//! - Network-requested modification: [`PduSessionModificationCommand`],
//!   [`PduSessionModificationComplete`]
//! - Release: [`PduSessionReleaseRequest`], [`PduSessionReleaseCommand`], [`PduSessionReleaseComplete`]
//! - [`SmStatus`]

mod pdu_session_establishment;
mod pdu_session_modification;
mod pdu_session_release;
mod status;

pub use pdu_session_establishment::*;
pub use pdu_session_modification::*;
pub use pdu_session_release::*;
pub use status::*;

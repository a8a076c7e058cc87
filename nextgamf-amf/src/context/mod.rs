//! Subscriber context store
//!
//! The AMF keeps one [`UeContext`] per UE it talks to. Security material,
//! PDU sessions and in-flight procedures live inside the context as owned
//! fields; the [`UeContextStore`] is the arena indexed by AMF UE NGAP id with
//! secondary indexes for SUPI and 5G-TMSI.

mod procedure;
mod security;
mod session;
mod store;
mod ue;

pub use procedure::{ProcedureKind, ProcedureRecord, ProcedureTable, ServicePurpose};
pub use security::{select_algorithms, SecurityContext, SecurityState, SelectedAlgorithms, SequenceCounter};
pub use session::{SessionAmbr, SessionContext, SessionState, TunnelEndpoint};
pub use store::{Generators, SupiBinding, UeContextStore};
pub use ue::{
    AuthenticationState, CmState, MmState, PendingRegistration, ReleaseCause, UeContext,
    UeSecurityCapabilities,
};

/// AMF-assigned UE association id (TS 38.413 §9.3.3.1)
pub type AmfUeNgapId = u64;

/// Radio-node-assigned UE association id (TS 38.413 §9.3.3.2)
pub type RanUeNgapId = u32;

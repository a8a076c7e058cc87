//! External collaborator contracts
//!
//! The AMF core never calls a collaborator directly. It emits a
//! [`ServiceRequest`] carrying a [`ServiceCorrelation`]; the client task runs
//! the call and posts the matching [`ServiceResponse`] back to the AMF queue.
//!
//! Collaborators:
//! - authentication vectors (subscriber database)
//! - SUCI deconcealment
//! - session management
//! - UE address allocation

pub mod client;
pub mod local;

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use nextgamf_common::{Plmn, SNssai, Supi};
use nextgamf_nas::ies::PduSessionType;
use thiserror::Error;

use crate::context::{AmfUeNgapId, SessionAmbr, TunnelEndpoint};

pub use client::{call_with_busy_retry, execute, ClientTask, RetryPolicy};
pub use local::LocalServices;

/// Result code a collaborator returns when it is temporarily overloaded.
pub const DIAMETER_TOO_BUSY: u32 = 3004;
/// Result code for a subscriber the database does not know.
pub const DIAMETER_ERROR_USER_UNKNOWN: u32 = 5001;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("rejected with result code {code}")]
    Rejected { code: u32 },
    #[error("request timed out")]
    Timeout,
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Only "too busy" answers are worth repeating.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ServiceError::Rejected { code } if *code == DIAMETER_TOO_BUSY)
    }
}

/// One 5G AKA vector.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthVector {
    pub rand: [u8; 16],
    pub autn: [u8; 16],
    pub xres_star: Vec<u8>,
    pub kseaf: [u8; 32],
}

impl fmt::Debug for AuthVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthVector")
            .field("rand", &hex::encode(self.rand))
            .field("autn", &hex::encode(self.autn))
            .finish_non_exhaustive()
    }
}

/// Material for a resynchronisation fetch after a synch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncInfo {
    pub rand: [u8; 16],
    pub auts: [u8; 14],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeconcealRequest {
    pub plmn: Plmn,
    pub protection_scheme: u8,
    pub home_network_key_id: u8,
    pub ue_public_key: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub mac_tag: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionRequest {
    pub supi: Supi,
    pub pdu_session_id: u8,
    pub dnn: String,
    pub session_type: PduSessionType,
    pub s_nssai: Option<SNssai>,
}

/// Address and default bit rate handed out by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressAllocation {
    pub address: Ipv4Addr,
    pub ambr: SessionAmbr,
}

/// What the session service allocated for a new PDU session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionAllocation {
    pub ue_address: Ipv4Addr,
    pub upf_tunnel: TunnelEndpoint,
    pub qfi: u8,
    pub five_qi: u8,
    pub ambr: SessionAmbr,
}

#[async_trait]
pub trait AuthenticationVectorService: Send + Sync {
    async fn fetch_vectors(
        &self,
        supi: &Supi,
        serving_network_name: &str,
        resync: Option<ResyncInfo>,
    ) -> Result<Vec<AuthVector>, ServiceError>;
}

#[async_trait]
pub trait DeconcealmentService: Send + Sync {
    async fn deconceal(&self, request: &DeconcealRequest) -> Result<Supi, ServiceError>;
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
        address: &AddressAllocation,
    ) -> Result<SessionAllocation, ServiceError>;

    /// Forwards the radio-side tunnel endpoint of a confirmed session.
    async fn update_session(
        &self,
        supi: &Supi,
        pdu_session_id: u8,
        gnb_tunnel: TunnelEndpoint,
    ) -> Result<(), ServiceError>;

    async fn release_session(&self, supi: &Supi, pdu_session_id: u8) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait AddressAllocationService: Send + Sync {
    async fn allocate(
        &self,
        supi: &Supi,
        dnn: &str,
        pdu_session_id: u8,
        session_type: PduSessionType,
    ) -> Result<AddressAllocation, ServiceError>;

    async fn release(&self, supi: &Supi, pdu_session_id: u8) -> Result<(), ServiceError>;
}

/// The set of collaborators the client task talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn AuthenticationVectorService>,
    pub deconceal: Arc<dyn DeconcealmentService>,
    pub sessions: Arc<dyn SessionService>,
    pub addresses: Arc<dyn AddressAllocationService>,
}

/// Ties a response to the UE and the outstanding call it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceCorrelation {
    pub ue: AmfUeNgapId,
    pub token: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    AuthenticationInfo {
        corr: ServiceCorrelation,
        supi: Supi,
        serving_network_name: String,
        resync: Option<ResyncInfo>,
    },
    Deconceal {
        corr: ServiceCorrelation,
        request: DeconcealRequest,
    },
    CreateSession {
        corr: ServiceCorrelation,
        request: CreateSessionRequest,
    },
    UpdateSession {
        corr: ServiceCorrelation,
        supi: Supi,
        pdu_session_id: u8,
        gnb_tunnel: TunnelEndpoint,
    },
    ReleaseSession {
        corr: ServiceCorrelation,
        supi: Supi,
        pdu_session_id: u8,
    },
}

impl ServiceRequest {
    pub fn corr(&self) -> ServiceCorrelation {
        match self {
            ServiceRequest::AuthenticationInfo { corr, .. }
            | ServiceRequest::Deconceal { corr, .. }
            | ServiceRequest::CreateSession { corr, .. }
            | ServiceRequest::UpdateSession { corr, .. }
            | ServiceRequest::ReleaseSession { corr, .. } => *corr,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServiceRequest::AuthenticationInfo { .. } => "AuthenticationInfo",
            ServiceRequest::Deconceal { .. } => "Deconceal",
            ServiceRequest::CreateSession { .. } => "CreateSession",
            ServiceRequest::UpdateSession { .. } => "UpdateSession",
            ServiceRequest::ReleaseSession { .. } => "ReleaseSession",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceResult {
    AuthenticationInfo(Result<Vec<AuthVector>, ServiceError>),
    Deconcealed(Result<Supi, ServiceError>),
    SessionCreated {
        pdu_session_id: u8,
        result: Result<SessionAllocation, ServiceError>,
    },
    SessionUpdated {
        pdu_session_id: u8,
        result: Result<(), ServiceError>,
    },
    SessionReleased {
        pdu_session_id: u8,
        result: Result<(), ServiceError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub corr: ServiceCorrelation,
    pub result: ServiceResult,
}

/// Serving network name for 5G AKA (TS 24.501 §9.12.1).
pub fn serving_network_name(plmn: &Plmn) -> String {
    format!("5G:mnc{:03}.mcc{:03}.3gppnetwork.org", plmn.mnc, plmn.mcc)
}

//! UE context

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use nextgamf_common::{Guti, SNssai, Supi, Tai};
use nextgamf_nas::ies::{IePduSessionStatus, IeUeSecurityCapability, RegistrationType};
use serde::{Deserialize, Serialize};

use super::{AmfUeNgapId, ProcedureTable, RanUeNgapId, SecurityContext, SessionContext};
use crate::services::AuthVector;

/// 5GMM state of the UE as tracked by the AMF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MmState {
    #[default]
    Deregistered,
    IdentificationPending,
    AuthenticationPending,
    SecurityModePending,
    ContextSetupPending,
    Registered,
}

impl fmt::Display for MmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MmState::Deregistered => "DEREGISTERED",
            MmState::IdentificationPending => "IDENTIFICATION-PENDING",
            MmState::AuthenticationPending => "AUTHENTICATION-PENDING",
            MmState::SecurityModePending => "SECURITY-MODE-PENDING",
            MmState::ContextSetupPending => "CONTEXT-SETUP-PENDING",
            MmState::Registered => "REGISTERED",
        };
        f.write_str(name)
    }
}

/// 5GMM connection management state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CmState {
    #[default]
    Idle,
    Connected,
}

impl fmt::Display for CmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmState::Idle => f.write_str("CM-IDLE"),
            CmState::Connected => f.write_str("CM-CONNECTED"),
        }
    }
}

/// Why the AMF released (or was asked to release) the UE association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseCause {
    UserInactivity,
    RadioConnectionLost,
    Deregistration,
    RegistrationFailure,
    ImplicitDeregistration,
    ContextSetupFailure,
    Unspecified,
}

/// 5G-EA / 5G-IA capability bitmaps advertised by the UE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UeSecurityCapabilities {
    pub ea: u8,
    pub ia: u8,
}

impl UeSecurityCapabilities {
    pub fn from_algorithms(ea: &[u8], ia: &[u8]) -> Self {
        Self::from(&IeUeSecurityCapability::from_algorithms(ea, ia))
    }

    pub fn supports_ea(&self, code: u8) -> bool {
        self.to_ie().supports_ea(code)
    }

    pub fn supports_ia(&self, code: u8) -> bool {
        self.to_ie().supports_ia(code)
    }

    pub fn to_ie(self) -> IeUeSecurityCapability {
        IeUeSecurityCapability::new(self.ea, self.ia)
    }
}

impl From<&IeUeSecurityCapability> for UeSecurityCapabilities {
    fn from(ie: &IeUeSecurityCapability) -> Self {
        Self { ea: ie.ea, ia: ie.ia }
    }
}

/// Parameters of the registration request being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    pub registration_type: RegistrationType,
    pub follow_on_request: bool,
    /// The UE identified itself with a 5G-GUTI
    pub identity_by_guti: bool,
    pub requested_nssai: Vec<SNssai>,
    pub uplink_data_status: Option<IePduSessionStatus>,
    pub pdu_session_status: Option<IePduSessionStatus>,
}

/// Progress of the 5G AKA run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationState {
    /// Unused vectors from the last fetch
    pub vectors: VecDeque<AuthVector>,
    /// Vector of the challenge in flight
    pub current: Option<AuthVector>,
    pub ng_ksi: u8,
    pub sync_failures: u32,
}

impl AuthenticationState {
    /// Moves to the next stored vector, if any.
    pub fn advance(&mut self) -> Option<&AuthVector> {
        self.current = self.vectors.pop_front();
        self.current.as_ref()
    }
}

/// Everything the AMF knows about one UE.
///
/// Fields marked `serde(skip)` describe in-flight work and are not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeContext {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: Option<RanUeNgapId>,
    pub supi: Option<Supi>,
    pub guti: Option<Guti>,
    /// IMEISV reported in Security Mode Complete
    pub pei: Option<String>,
    pub mm_state: MmState,
    pub cm_state: CmState,
    pub tai: Option<Tai>,
    pub ue_security_capability: Option<UeSecurityCapabilities>,
    pub allowed_nssai: Vec<SNssai>,
    pub security: SecurityContext,
    pub sessions: BTreeMap<u8, SessionContext>,
    pub release_cause: Option<ReleaseCause>,
    #[serde(skip)]
    pub registration: Option<PendingRegistration>,
    #[serde(skip)]
    pub authentication: Option<AuthenticationState>,
    #[serde(skip)]
    pub procedures: ProcedureTable,
}

impl UeContext {
    pub fn new(amf_ue_ngap_id: AmfUeNgapId, ran_ue_ngap_id: RanUeNgapId) -> Self {
        Self {
            amf_ue_ngap_id,
            ran_ue_ngap_id: Some(ran_ue_ngap_id),
            supi: None,
            guti: None,
            pei: None,
            mm_state: MmState::Deregistered,
            cm_state: CmState::Connected,
            tai: None,
            ue_security_capability: None,
            allowed_nssai: Vec::new(),
            security: SecurityContext::default(),
            sessions: BTreeMap::new(),
            release_cause: None,
            registration: None,
            authentication: None,
            procedures: ProcedureTable::default(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.mm_state == MmState::Registered
    }

    pub fn has_pending_procedure(&self) -> bool {
        !self.procedures.is_empty()
    }

    /// Identifier used in log lines: the SUPI once known.
    pub fn display_id(&self) -> String {
        match &self.supi {
            Some(supi) => supi.to_string(),
            None => format!("amf-ue-{}", self.amf_ue_ngap_id),
        }
    }

    pub fn active_session_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.sessions
            .values()
            .filter(|session| session.is_active())
            .map(|session| session.pdu_session_id)
    }

    pub fn pdu_session_status(&self) -> IePduSessionStatus {
        IePduSessionStatus::from_ids(self.active_session_ids())
    }

    /// Moves to CM-IDLE, dropping the radio association.
    pub fn enter_idle(&mut self) {
        self.cm_state = CmState::Idle;
        self.ran_ue_ngap_id = None;
        for session in self.sessions.values_mut() {
            session.gnb_tunnel = None;
        }
    }
}

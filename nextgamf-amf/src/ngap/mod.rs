//! NGAP Boundary Module
//!
//! Typed NGAP messages exchanged with the radio node (3GPP TS 38.413) and the
//! NGAP task that moves them between the radio side and the AMF task.
//!
//! # Architecture
//!
//! ```text
//! radio node <---> NGAP Task <---> AMF Task
//! ```
//!
//! ASN.1 PER encoding is not done here; the radio side hands over already
//! decoded messages. NAS PDUs travel as opaque octets.

mod task;

pub use task::NgapTask;

use nextgamf_common::{Guami, SNssai, STmsi, Tai};

use crate::context::{
    AmfUeNgapId, RanUeNgapId, ReleaseCause, SessionAmbr, TunnelEndpoint, UeSecurityCapabilities,
};

/// The pair of ids naming a UE-associated NGAP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UeNgapIds {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub ran_ue_ngap_id: RanUeNgapId,
}

impl UeNgapIds {
    pub fn new(amf_ue_ngap_id: AmfUeNgapId, ran_ue_ngap_id: RanUeNgapId) -> Self {
        Self {
            amf_ue_ngap_id,
            ran_ue_ngap_id,
        }
    }
}

/// Radio-side result of a PDU session resource setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSetupItem {
    pub pdu_session_id: u8,
    pub gnb_tunnel: TunnelEndpoint,
}

/// PDU session resource to set up at the radio node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResource {
    pub pdu_session_id: u8,
    pub s_nssai: Option<SNssai>,
    pub upf_tunnel: Option<TunnelEndpoint>,
    pub qfi: u8,
    pub ambr: Option<SessionAmbr>,
    /// NAS PDU delivered along with the resource, if any
    pub nas_pdu: Option<Vec<u8>>,
}

/// Messages received from the radio node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RanUplink {
    InitialUeMessage {
        ran_ue_ngap_id: RanUeNgapId,
        nas_pdu: Vec<u8>,
        tai: Tai,
        /// 5G-S-TMSI from the RRC connection setup, if the UE gave one
        s_tmsi: Option<STmsi>,
    },
    UplinkNasTransport {
        ids: UeNgapIds,
        nas_pdu: Vec<u8>,
    },
    InitialContextSetupResponse {
        ids: UeNgapIds,
        pdu_sessions: Vec<SessionSetupItem>,
    },
    InitialContextSetupFailure {
        ids: UeNgapIds,
    },
    PduSessionResourceSetupResponse {
        ids: UeNgapIds,
        setup: Vec<SessionSetupItem>,
        failed: Vec<u8>,
    },
    UeContextReleaseRequest {
        ids: UeNgapIds,
        cause: ReleaseCause,
    },
    UeContextReleaseComplete {
        ids: UeNgapIds,
    },
}

impl RanUplink {
    pub fn name(&self) -> &'static str {
        match self {
            RanUplink::InitialUeMessage { .. } => "InitialUEMessage",
            RanUplink::UplinkNasTransport { .. } => "UplinkNASTransport",
            RanUplink::InitialContextSetupResponse { .. } => "InitialContextSetupResponse",
            RanUplink::InitialContextSetupFailure { .. } => "InitialContextSetupFailure",
            RanUplink::PduSessionResourceSetupResponse { .. } => "PDUSessionResourceSetupResponse",
            RanUplink::UeContextReleaseRequest { .. } => "UEContextReleaseRequest",
            RanUplink::UeContextReleaseComplete { .. } => "UEContextReleaseComplete",
        }
    }

    /// AMF UE NGAP id, absent before the AMF assigned one.
    pub fn amf_ue_ngap_id(&self) -> Option<AmfUeNgapId> {
        match self {
            RanUplink::InitialUeMessage { .. } => None,
            RanUplink::UplinkNasTransport { ids, .. }
            | RanUplink::InitialContextSetupResponse { ids, .. }
            | RanUplink::InitialContextSetupFailure { ids }
            | RanUplink::PduSessionResourceSetupResponse { ids, .. }
            | RanUplink::UeContextReleaseRequest { ids, .. }
            | RanUplink::UeContextReleaseComplete { ids } => Some(ids.amf_ue_ngap_id),
        }
    }

    pub fn nas_pdu(&self) -> Option<&[u8]> {
        match self {
            RanUplink::InitialUeMessage { nas_pdu, .. } | RanUplink::UplinkNasTransport { nas_pdu, .. } => {
                Some(nas_pdu)
            }
            _ => None,
        }
    }
}

/// Messages sent to the radio node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RanDownlink {
    DownlinkNasTransport {
        ids: UeNgapIds,
        nas_pdu: Vec<u8>,
    },
    InitialContextSetupRequest {
        ids: UeNgapIds,
        guami: Guami,
        allowed_nssai: Vec<SNssai>,
        ue_security_capability: Option<UeSecurityCapabilities>,
        nas_pdu: Option<Vec<u8>>,
        pdu_sessions: Vec<PduSessionResource>,
    },
    PduSessionResourceSetupRequest {
        ids: UeNgapIds,
        sessions: Vec<PduSessionResource>,
    },
    PduSessionResourceReleaseCommand {
        ids: UeNgapIds,
        pdu_session_id: u8,
        nas_pdu: Vec<u8>,
    },
    UeContextReleaseCommand {
        ids: UeNgapIds,
        cause: ReleaseCause,
    },
    Paging {
        s_tmsi: STmsi,
        tai_list: Vec<Tai>,
    },
}

impl RanDownlink {
    pub fn name(&self) -> &'static str {
        match self {
            RanDownlink::DownlinkNasTransport { .. } => "DownlinkNASTransport",
            RanDownlink::InitialContextSetupRequest { .. } => "InitialContextSetupRequest",
            RanDownlink::PduSessionResourceSetupRequest { .. } => "PDUSessionResourceSetupRequest",
            RanDownlink::PduSessionResourceReleaseCommand { .. } => "PDUSessionResourceReleaseCommand",
            RanDownlink::UeContextReleaseCommand { .. } => "UEContextReleaseCommand",
            RanDownlink::Paging { .. } => "Paging",
        }
    }

    /// Connection the message belongs to; paging has none.
    pub fn ids(&self) -> Option<UeNgapIds> {
        match self {
            RanDownlink::DownlinkNasTransport { ids, .. }
            | RanDownlink::InitialContextSetupRequest { ids, .. }
            | RanDownlink::PduSessionResourceSetupRequest { ids, .. }
            | RanDownlink::PduSessionResourceReleaseCommand { ids, .. }
            | RanDownlink::UeContextReleaseCommand { ids, .. } => Some(*ids),
            RanDownlink::Paging { .. } => None,
        }
    }

    /// The NAS PDU carried by the message, if any.
    pub fn nas_pdu(&self) -> Option<&[u8]> {
        match self {
            RanDownlink::DownlinkNasTransport { nas_pdu, .. }
            | RanDownlink::PduSessionResourceReleaseCommand { nas_pdu, .. } => Some(nas_pdu),
            RanDownlink::InitialContextSetupRequest { nas_pdu, .. } => nas_pdu.as_deref(),
            RanDownlink::PduSessionResourceSetupRequest { sessions, .. } => {
                sessions.iter().find_map(|session| session.nas_pdu.as_deref())
            }
            _ => None,
        }
    }
}

//! PDU session contexts held by the AMF

use std::net::Ipv4Addr;

use nextgamf_common::SNssai;
use nextgamf_nas::ies::{
    IeDnn, IePduAddress, IeQosFlowDescriptions, IeQosRules, IeSNssai, IeSessionAmbr, PduSessionType,
    QosFlowDescription, QosRule, SscMode,
};
use nextgamf_nas::messages::PduSessionEstablishmentAccept;
use serde::{Deserialize, Serialize};

/// Session lifecycle as seen by the AMF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Waiting for the session service to allocate the session
    Creating,
    /// Allocated, resource setup sent to the radio node
    Active,
    /// Radio node acknowledged the resource setup
    Confirmed,
    /// Release Command sent, waiting for the UE
    ReleasePending,
    Released,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active | SessionState::Confirmed)
    }
}

/// GTP-U tunnel endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TunnelEndpoint {
    pub address: Ipv4Addr,
    pub teid: u32,
}

impl TunnelEndpoint {
    pub fn new(address: Ipv4Addr, teid: u32) -> Self {
        Self { address, teid }
    }
}

/// Session-AMBR kept in its wire form (unit + value per direction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAmbr {
    pub uplink_unit: u8,
    pub uplink: u16,
    pub downlink_unit: u8,
    pub downlink: u16,
}

impl SessionAmbr {
    pub fn from_kbps(uplink_kbps: u64, downlink_kbps: u64) -> Self {
        IeSessionAmbr::from_kbps(uplink_kbps, downlink_kbps).into()
    }

    pub fn to_ie(self) -> IeSessionAmbr {
        IeSessionAmbr {
            downlink_unit: self.downlink_unit,
            downlink: self.downlink,
            uplink_unit: self.uplink_unit,
            uplink: self.uplink,
        }
    }

    pub fn uplink_kbps(&self) -> u64 {
        self.to_ie().uplink_kbps()
    }

    pub fn downlink_kbps(&self) -> u64 {
        self.to_ie().downlink_kbps()
    }
}

impl From<IeSessionAmbr> for SessionAmbr {
    fn from(ie: IeSessionAmbr) -> Self {
        Self {
            uplink_unit: ie.uplink_unit,
            uplink: ie.uplink,
            downlink_unit: ie.downlink_unit,
            downlink: ie.downlink,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub pdu_session_id: u8,
    /// PTI of the establishment request, echoed in the accept
    pub pti: u8,
    pub state: SessionState,
    pub session_type: PduSessionType,
    pub ssc_mode: u8,
    pub dnn: String,
    pub s_nssai: Option<SNssai>,
    pub ambr: Option<SessionAmbr>,
    pub ue_address: Option<Ipv4Addr>,
    pub qfi: u8,
    pub five_qi: u8,
    /// Network-side (UPF) tunnel endpoint
    pub upf_tunnel: Option<TunnelEndpoint>,
    /// Device-side (gNB) tunnel endpoint
    pub gnb_tunnel: Option<TunnelEndpoint>,
    /// Establishment requests received again for this session
    pub duplicate_count: u32,
    /// Downlink data is waiting for the UE to become reachable
    pub pending_downlink_data: bool,
    /// AMBR of a modification command not yet completed by the UE
    #[serde(skip)]
    pub pending_ambr: Option<SessionAmbr>,
}

impl SessionContext {
    pub const DEFAULT_QFI: u8 = 9;
    pub const DEFAULT_5QI: u8 = 9;

    pub fn new(pdu_session_id: u8, pti: u8, session_type: PduSessionType, dnn: impl Into<String>) -> Self {
        Self {
            pdu_session_id,
            pti,
            state: SessionState::Creating,
            session_type,
            ssc_mode: SscMode::Mode1.into(),
            dnn: dnn.into(),
            s_nssai: None,
            ambr: None,
            ue_address: None,
            qfi: Self::DEFAULT_QFI,
            five_qi: Self::DEFAULT_5QI,
            upf_tunnel: None,
            gnb_tunnel: None,
            duplicate_count: 0,
            pending_downlink_data: false,
            pending_ambr: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Establishment Accept rebuilt from the stored session parameters.
    ///
    /// Duplicate requests are answered with this, so the UE always sees the
    /// allocation it was first given.
    pub fn establishment_accept(&self) -> PduSessionEstablishmentAccept {
        let ambr = self.ambr.map(SessionAmbr::to_ie).unwrap_or(IeSessionAmbr::from_kbps(0, 0));
        let ssc_mode = SscMode::try_from(self.ssc_mode).unwrap_or_default();
        let mut accept = PduSessionEstablishmentAccept::new(
            self.session_type.into(),
            ssc_mode,
            IeQosRules(vec![QosRule::default_for_flow(1, self.qfi)]),
            ambr,
        );
        accept.pdu_address = self.ue_address.map(IePduAddress::Ipv4);
        accept.s_nssai = self.s_nssai.map(IeSNssai);
        accept.qos_flow_descriptions = Some(IeQosFlowDescriptions(vec![
            QosFlowDescription::create_with_5qi(self.qfi, self.five_qi),
        ]));
        accept.dnn = Some(IeDnn::new(self.dnn.clone()));
        accept
    }
}

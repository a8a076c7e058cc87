//! Drives [`AmfCore`] directly, playing UE, radio node and collaborators.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use nextgamf_common::{AmfConfig, Guami, Guti, Plmn, STmsi, Supi, Tai};
use nextgamf_nas::ies::{
    Ie5gsMobileIdentity, Ie5gsRegistrationType, IeAuthenticationResponseParameter, IeDnn,
    IeNasKeySetIdentifier, IePduSessionType, IeUeSecurityCapability, PduSessionType, RegistrationType,
    SecurityContextType, Suci,
};
use nextgamf_nas::messages::{
    AuthenticationResponse, MmMessage, NasMessage, NasPdu, PduSessionEstablishmentRequest,
    RegistrationComplete, RegistrationRequest, SecurityModeComplete, SmMessage, SmNasMessage, UlNasTransport,
};
use nextgamf_nas::{SecuredHeader, SecurityHeaderType};

use super::MAX_NAS_PDU_LEN;
use crate::amf::{Action, AmfCore, AmfEvent};
use crate::context::{AmfUeNgapId, MmState, SessionAmbr, TunnelEndpoint};
use crate::ngap::{RanDownlink, RanUplink, SessionSetupItem, UeNgapIds};
use crate::persistence::PersistOp;
use crate::services::{AuthVector, ServiceRequest, ServiceResponse, ServiceResult, SessionAllocation};
use crate::timer::{TimerExpiry, TimerId, TimerToken};

pub(crate) const IMSI: &str = "001010000000001";
pub(crate) const IMSI_2: &str = "001010000000002";

pub(crate) fn test_config() -> AmfConfig {
    let mut config = AmfConfig::new(Guami::new(Plmn::new(1, 1, false), 1, 1, 0));
    config.dnns = vec!["ims".to_string()];
    config
}

pub(crate) fn supi(imsi: &str) -> Supi {
    Supi::from_imsi(imsi).unwrap()
}

pub(crate) fn auth_vector(seed: u8) -> AuthVector {
    AuthVector {
        rand: [seed; 16],
        autn: [seed ^ 0xFF; 16],
        xres_star: vec![seed; 16],
        kseaf: [seed; 32],
    }
}

/// Response matching [`auth_vector`] with the same seed.
pub(crate) fn auth_response(seed: u8) -> AuthenticationResponse {
    AuthenticationResponse {
        response_parameter: Some(IeAuthenticationResponseParameter(vec![seed; 16])),
    }
}

fn capabilities() -> IeUeSecurityCapability {
    IeUeSecurityCapability::from_algorithms(&[0, 1, 2], &[1, 2])
}

pub(crate) fn registration_request(imsi: &str) -> RegistrationRequest {
    let suci = Suci::null_scheme(&supi(imsi), false).unwrap();
    let mut request = RegistrationRequest::new(
        Ie5gsRegistrationType::new(RegistrationType::InitialRegistration, false),
        IeNasKeySetIdentifier::no_key(),
        Ie5gsMobileIdentity::Suci(suci),
    );
    request.ue_security_capability = Some(capabilities());
    request
}

pub(crate) fn guti_registration(guti: Guti, registration_type: RegistrationType, ksi: u8) -> RegistrationRequest {
    let mut request = RegistrationRequest::new(
        Ie5gsRegistrationType::new(registration_type, false),
        IeNasKeySetIdentifier::new(SecurityContextType::Native, ksi),
        Ie5gsMobileIdentity::Guti(guti),
    );
    request.ue_security_capability = Some(capabilities());
    request
}

pub(crate) fn encode_plain(message: impl Into<MmMessage>) -> Vec<u8> {
    NasMessage::Mm(message.into()).encode(MAX_NAS_PDU_LEN).unwrap()
}

pub(crate) fn encode_protected(message: impl Into<MmMessage>, sqn: u8) -> Vec<u8> {
    NasPdu::Protected {
        header: SecuredHeader::new(SecurityHeaderType::IntegrityProtectedAndCiphered, [0; 4], sqn),
        message: NasMessage::Mm(message.into()),
    }
    .encode(MAX_NAS_PDU_LEN)
    .unwrap()
}

pub(crate) fn allocation(psi: u8) -> SessionAllocation {
    SessionAllocation {
        ue_address: Ipv4Addr::new(10, 45, 0, psi + 1),
        upf_tunnel: TunnelEndpoint::new(Ipv4Addr::new(10, 0, 0, 1), 100 + u32::from(psi)),
        qfi: 9,
        five_qi: 9,
        ambr: SessionAmbr::from_kbps(100_000, 200_000),
    }
}

pub(crate) fn gnb_tunnel(psi: u8) -> TunnelEndpoint {
    TunnelEndpoint::new(Ipv4Addr::new(10, 0, 0, 2), 200 + u32::from(psi))
}

pub(crate) fn ipv4_establishment() -> PduSessionEstablishmentRequest {
    PduSessionEstablishmentRequest {
        pdu_session_type: Some(IePduSessionType::from(PduSessionType::Ipv4)),
        ..Default::default()
    }
}

pub(crate) struct Harness {
    pub core: AmfCore,
    timers: HashMap<(AmfUeNgapId, TimerId), TimerToken>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AmfConfig) -> Self {
        Self {
            core: AmfCore::new(Arc::new(config)),
            timers: HashMap::new(),
        }
    }

    pub fn tai(&self) -> Tai {
        self.core.config().tai_list[0]
    }

    /// Runs one event, keeping track of the armed timers.
    pub fn handle(&mut self, event: AmfEvent) -> Vec<Action> {
        let actions = self.core.handle(event);
        for action in &actions {
            match action {
                Action::StartTimer { ue, timer, token, .. } => {
                    self.timers.insert((*ue, *timer), *token);
                }
                Action::StopTimer { ue, timer } => {
                    self.timers.remove(&(*ue, *timer));
                }
                Action::StopAllTimers(ue) => self.timers.retain(|(owner, _), _| owner != ue),
                _ => {}
            }
        }
        actions
    }

    pub fn ran(&mut self, message: RanUplink) -> Vec<Action> {
        self.handle(AmfEvent::Ran(message))
    }

    pub fn initial(&mut self, ran_ue_ngap_id: u32, message: impl Into<MmMessage>) -> Vec<Action> {
        self.initial_pdu(ran_ue_ngap_id, encode_plain(message), None)
    }

    pub fn initial_pdu(&mut self, ran_ue_ngap_id: u32, nas_pdu: Vec<u8>, s_tmsi: Option<STmsi>) -> Vec<Action> {
        let tai = self.tai();
        self.ran(RanUplink::InitialUeMessage {
            ran_ue_ngap_id,
            nas_pdu,
            tai,
            s_tmsi,
        })
    }

    pub fn ran_of(&self, id: AmfUeNgapId) -> u32 {
        self.core.context(id).unwrap().ran_ue_ngap_id.unwrap()
    }

    pub fn ids(&self, id: AmfUeNgapId) -> UeNgapIds {
        UeNgapIds::new(id, self.ran_of(id))
    }

    /// Sends `message` as the UE would: protected once a key set exists.
    pub fn uplink(&mut self, id: AmfUeNgapId, message: impl Into<MmMessage>) -> Vec<Action> {
        let ue = self.core.context(id).unwrap();
        let nas_pdu = if ue.security.has_key() {
            encode_protected(message, ue.security.uplink.count.sqn.wrapping_add(1))
        } else {
            encode_plain(message)
        };
        self.uplink_pdu(id, nas_pdu)
    }

    pub fn uplink_with_sqn(&mut self, id: AmfUeNgapId, message: impl Into<MmMessage>, sqn: u8) -> Vec<Action> {
        self.uplink_pdu(id, encode_protected(message, sqn))
    }

    pub fn uplink_pdu(&mut self, id: AmfUeNgapId, nas_pdu: Vec<u8>) -> Vec<Action> {
        let ids = self.ids(id);
        self.ran(RanUplink::UplinkNasTransport { ids, nas_pdu })
    }

    /// Sends a 5GSM message inside an UL NAS Transport.
    pub fn uplink_sm(
        &mut self,
        id: AmfUeNgapId,
        psi: u8,
        pti: u8,
        message: impl Into<SmMessage>,
        dnn: Option<&str>,
    ) -> Vec<Action> {
        let inner = NasMessage::Sm(SmNasMessage::new(psi, pti, message))
            .encode(MAX_NAS_PDU_LEN)
            .unwrap();
        let mut transport = UlNasTransport::for_session(psi, inner);
        transport.dnn = dnn.map(IeDnn::new);
        self.uplink(id, transport)
    }

    pub fn answer(&mut self, request: &ServiceRequest, result: ServiceResult) -> Vec<Action> {
        self.handle(AmfEvent::Service(ServiceResponse {
            corr: request.corr(),
            result,
        }))
    }

    pub fn timer_token(&self, id: AmfUeNgapId, timer: TimerId) -> Option<TimerToken> {
        self.timers.get(&(id, timer)).copied()
    }

    pub fn is_armed(&self, id: AmfUeNgapId, timer: TimerId) -> bool {
        self.timers.contains_key(&(id, timer))
    }

    /// Fires the current arm of `timer`.
    pub fn expire(&mut self, id: AmfUeNgapId, timer: TimerId) -> Vec<Action> {
        let token = self.timer_token(id, timer).expect("timer not armed");
        self.handle(AmfEvent::TimerExpired(TimerExpiry { ue: id, timer, token }))
    }

    /// Runs the registration up to and including the authentication
    /// challenge, returning the context id.
    pub fn start_registration(&mut self, imsi: &str, ran_ue_ngap_id: u32) -> AmfUeNgapId {
        let actions = self.initial(ran_ue_ngap_id, registration_request(imsi));
        let auth = service_requests(&actions).remove(0);
        let id = auth.corr().ue;
        self.answer(&auth, ServiceResult::AuthenticationInfo(Ok(vec![auth_vector(1)])));
        id
    }

    /// Full initial registration by SUCI.
    pub fn register(&mut self, imsi: &str, ran_ue_ngap_id: u32) -> AmfUeNgapId {
        let id = self.start_registration(imsi, ran_ue_ngap_id);
        self.uplink(id, auth_response(1));
        self.uplink(
            id,
            SecurityModeComplete {
                imeisv: Some(Ie5gsMobileIdentity::Imeisv("3534900698733190".into())),
                nas_message_container: None,
            },
        );
        let ids = self.ids(id);
        self.ran(RanUplink::InitialContextSetupResponse {
            ids,
            pdu_sessions: vec![],
        });
        self.uplink(id, RegistrationComplete);
        assert_eq!(self.core.context(id).unwrap().mm_state, MmState::Registered);
        id
    }

    /// Establishes PDU session `psi` up to the radio confirmation.
    pub fn establish_session(&mut self, id: AmfUeNgapId, psi: u8) -> Vec<Action> {
        let dnn = self.core.config().default_dnn.clone();
        let actions = self.uplink_sm(id, psi, 1, ipv4_establishment(), Some(&dnn));
        let create = service_requests(&actions).remove(0);
        let mut actions = self.answer(
            &create,
            ServiceResult::SessionCreated {
                pdu_session_id: psi,
                result: Ok(allocation(psi)),
            },
        );
        let ids = self.ids(id);
        actions.extend(self.ran(RanUplink::PduSessionResourceSetupResponse {
            ids,
            setup: vec![SessionSetupItem {
                pdu_session_id: psi,
                gnb_tunnel: gnb_tunnel(psi),
            }],
            failed: vec![],
        }));
        actions
    }

    /// Takes a connected UE to CM-IDLE through a radio-requested release.
    pub fn go_idle(&mut self, id: AmfUeNgapId) {
        let ids = self.ids(id);
        self.ran(RanUplink::UeContextReleaseRequest {
            ids,
            cause: crate::context::ReleaseCause::UserInactivity,
        });
        self.ran(RanUplink::UeContextReleaseComplete { ids });
    }
}

pub(crate) fn ran_messages(actions: &[Action]) -> Vec<RanDownlink> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::Ran(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn service_requests(actions: &[Action]) -> Vec<ServiceRequest> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::Service(request) => Some(request.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn persist_ops(actions: &[Action]) -> Vec<PersistOp> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::Persist(op) => Some(op.clone()),
            _ => None,
        })
        .collect()
}

/// NAS messages carried downlink, security envelope stripped.
pub(crate) fn downlink_nas(actions: &[Action]) -> Vec<NasMessage> {
    ran_messages(actions)
        .iter()
        .filter_map(|message| message.nas_pdu())
        .map(|pdu| NasPdu::decode(pdu, pdu.len()).unwrap().0.into_message())
        .collect()
}

/// 5GSM messages inside downlink DL NAS Transports.
pub(crate) fn downlink_sm(actions: &[Action]) -> Vec<SmNasMessage> {
    downlink_nas(actions)
        .into_iter()
        .filter_map(|message| match message {
            NasMessage::Mm(MmMessage::DlNasTransport(transport)) => {
                let payload = transport.payload_container.0;
                match NasMessage::decode(&payload, payload.len()).unwrap().0 {
                    NasMessage::Sm(sm) => Some(sm),
                    NasMessage::Mm(_) => None,
                }
            }
            _ => None,
        })
        .collect()
}

pub(crate) fn mm_messages(actions: &[Action]) -> Vec<MmMessage> {
    downlink_nas(actions)
        .into_iter()
        .filter_map(|message| match message {
            NasMessage::Mm(message) => Some(message),
            NasMessage::Sm(_) => None,
        })
        .collect()
}

//! Fake radio node and UE for integration testing
//!
//! [`FakeRadioNode`] sits where a gNB would: it pushes [`RanUplink`] messages
//! into the NGAP task and reads the [`RanDownlink`] messages the AMF sends
//! back. [`FakeUe`] plays the UE side of the NAS procedures on top of it and
//! [`TestAmf`] bundles a running AMF with both and the mock collaborators.

use std::sync::Arc;
use std::time::Duration;

use nextgamf_amf::context::{ReleaseCause, TunnelEndpoint};
use nextgamf_amf::ngap::SessionSetupItem;
use nextgamf_amf::{
    AmfApp, AmfUeNgapId, MemoryStore, RanDownlink, RanUplink, StartOptions, StateStore, TaskHandle,
    UeContext, UeNgapIds,
};
use nextgamf_common::{AmfConfig, Guti, STmsi, Supi, Tai};
use nextgamf_nas::ies::{
    AccessType, Ie5gsMobileIdentity, Ie5gsRegistrationType, IeAuthenticationResponseParameter, IeDeRegistrationType,
    IeDnn, IeNasKeySetIdentifier, IePduSessionStatus, IePduSessionType, IeUeSecurityCapability, PduSessionType,
    RegistrationType, SecurityContextType, ServiceType, Suci,
};
use nextgamf_nas::messages::{
    AuthenticationRequest, AuthenticationResponse, DeregistrationRequestUeOriginating, MmMessage, NasMessage,
    NasPdu, PduSessionEstablishmentRequest, RegistrationAccept, RegistrationComplete, RegistrationRequest,
    SecurityModeCommand, SecurityModeComplete, ServiceRequest, SmMessage, SmNasMessage, UlNasTransport,
};
use nextgamf_nas::{SecuredHeader, SecurityHeaderType};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::mock_services::MockServices;
use crate::test_fixtures::{expected_res_star, test_amf_config, test_supi, TEST_IMEISV};
use crate::test_utils::{wait_for_condition, TestResult, DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT};

const MAX_NAS_LEN: usize = 65_535;

/// How long a downlink may take to show up
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Decodes the NAS PDU a downlink carries, security envelope stripped.
pub fn decode_nas(message: &RanDownlink) -> Option<NasMessage> {
    let pdu = message.nas_pdu()?;
    let (pdu, _) = NasPdu::decode(pdu, pdu.len()).ok()?;
    Some(pdu.into_message())
}

/// The 5GMM message a downlink carries, if any.
pub fn mm_message(message: &RanDownlink) -> Option<MmMessage> {
    match decode_nas(message)? {
        NasMessage::Mm(message) => Some(message),
        NasMessage::Sm(_) => None,
    }
}

/// The 5GSM message inside a downlink DL NAS Transport, if any.
pub fn sm_message(message: &RanDownlink) -> Option<SmNasMessage> {
    let MmMessage::DlNasTransport(transport) = mm_message(message)? else {
        return None;
    };
    let payload = transport.payload_container.0;
    match NasMessage::decode(&payload, payload.len()).ok()?.0 {
        NasMessage::Sm(message) => Some(message),
        NasMessage::Mm(_) => None,
    }
}

/// gNB side of the N3 tunnel for session `psi`
pub fn gnb_tunnel(psi: u8) -> TunnelEndpoint {
    TunnelEndpoint::new(std::net::Ipv4Addr::new(10, 0, 0, 2), 200 + u32::from(psi))
}

/// Radio node attached to the NGAP task
pub struct FakeRadioNode {
    ngap_tx: TaskHandle<RanUplink>,
    radio_rx: mpsc::Receiver<RanDownlink>,
    tai: Tai,
}

impl FakeRadioNode {
    pub fn new(ngap_tx: TaskHandle<RanUplink>, radio_rx: mpsc::Receiver<RanDownlink>, tai: Tai) -> Self {
        Self {
            ngap_tx,
            radio_rx,
            tai,
        }
    }

    pub fn tai(&self) -> Tai {
        self.tai
    }

    pub async fn send(&self, message: RanUplink) -> TestResult {
        self.ngap_tx
            .send(message)
            .await
            .map_err(|_| "NGAP task is gone")?;
        Ok(())
    }

    /// Next downlink, failing after [`RECV_TIMEOUT`].
    pub async fn recv(&mut self) -> TestResult<RanDownlink> {
        match timeout(RECV_TIMEOUT, self.radio_rx.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err("downlink channel closed".into()),
            Err(_) => Err("no downlink within timeout".into()),
        }
    }

    /// Skips downlinks until one satisfies `accept`.
    pub async fn recv_until<F>(&mut self, mut accept: F) -> TestResult<RanDownlink>
    where
        F: FnMut(&RanDownlink) -> bool,
    {
        loop {
            let message = self.recv().await?;
            if accept(&message) {
                return Ok(message);
            }
            tracing::debug!("Skipping {}", message.name());
        }
    }

    /// True when nothing arrives within `window`.
    pub async fn is_quiet(&mut self, window: Duration) -> bool {
        timeout(window, self.radio_rx.recv()).await.is_err()
    }
}

/// UE side of the NAS procedures
#[derive(Debug, Clone)]
pub struct FakeUe {
    pub supi: Supi,
    pub ran_ue_ngap_id: u32,
    pub amf_ue_ngap_id: Option<AmfUeNgapId>,
    pub guti: Option<Guti>,
    pub ng_ksi: Option<u8>,
    /// Next uplink sequence number once security is active
    next_sqn: u8,
    secured: bool,
    next_pti: u8,
}

impl FakeUe {
    pub fn new(imsi: &str, ran_ue_ngap_id: u32) -> Self {
        Self {
            supi: test_supi(imsi),
            ran_ue_ngap_id,
            amf_ue_ngap_id: None,
            guti: None,
            ng_ksi: None,
            next_sqn: 1,
            secured: false,
            next_pti: 1,
        }
    }

    pub fn is_secured(&self) -> bool {
        self.secured
    }

    pub fn s_tmsi(&self) -> Option<STmsi> {
        self.guti.map(|guti| guti.s_tmsi())
    }

    pub fn ids(&self) -> TestResult<UeNgapIds> {
        let amf_ue_ngap_id = self.amf_ue_ngap_id.ok_or("UE has no AMF UE NGAP id yet")?;
        Ok(UeNgapIds::new(amf_ue_ngap_id, self.ran_ue_ngap_id))
    }

    /// Moves to a new radio association, as after RRC release.
    pub fn reconnect(&mut self, ran_ue_ngap_id: u32) {
        self.ran_ue_ngap_id = ran_ue_ngap_id;
        self.amf_ue_ngap_id = None;
    }

    /// Encodes `message`, integrity protected once security is active.
    pub fn encode(&mut self, message: impl Into<MmMessage>) -> Vec<u8> {
        let message = NasMessage::Mm(message.into());
        let pdu = if self.secured {
            let sqn = self.next_sqn;
            self.next_sqn = self.next_sqn.wrapping_add(1);
            NasPdu::Protected {
                header: SecuredHeader::new(SecurityHeaderType::IntegrityProtectedAndCiphered, [0; 4], sqn),
                message,
            }
        } else {
            NasPdu::Plain(message)
        };
        pdu.encode(MAX_NAS_LEN).expect("encodable NAS message")
    }

    pub async fn initial(
        &mut self,
        radio: &FakeRadioNode,
        message: impl Into<MmMessage>,
        s_tmsi: Option<STmsi>,
    ) -> TestResult {
        let nas_pdu = self.encode(message);
        radio
            .send(RanUplink::InitialUeMessage {
                ran_ue_ngap_id: self.ran_ue_ngap_id,
                nas_pdu,
                tai: radio.tai(),
                s_tmsi,
            })
            .await
    }

    pub async fn uplink(&mut self, radio: &FakeRadioNode, message: impl Into<MmMessage>) -> TestResult {
        let ids = self.ids()?;
        let nas_pdu = self.encode(message);
        radio.send(RanUplink::UplinkNasTransport { ids, nas_pdu }).await
    }

    /// Sends a 5GSM message for session `psi` inside an UL NAS Transport.
    pub async fn uplink_sm(
        &mut self,
        radio: &FakeRadioNode,
        psi: u8,
        message: impl Into<SmMessage>,
        dnn: Option<&str>,
    ) -> TestResult {
        let pti = self.next_pti;
        self.next_pti = self.next_pti.wrapping_add(1).max(1);
        let inner = NasMessage::Sm(SmNasMessage::new(psi, pti, message)).encode(MAX_NAS_LEN)?;
        let mut transport = UlNasTransport::for_session(psi, inner);
        transport.dnn = dnn.map(IeDnn::new);
        self.uplink(radio, transport).await
    }

    /// Next downlink addressed to this UE's association.
    pub async fn recv(&mut self, radio: &mut FakeRadioNode) -> TestResult<RanDownlink> {
        let ran = self.ran_ue_ngap_id;
        let message = radio
            .recv_until(|message| message.ids().is_some_and(|ids| ids.ran_ue_ngap_id == ran))
            .await?;
        if let Some(ids) = message.ids() {
            self.amf_ue_ngap_id = Some(ids.amf_ue_ngap_id);
        }
        Ok(message)
    }

    /// Next downlink carrying a 5GMM message, skipping anything else.
    pub async fn recv_mm(&mut self, radio: &mut FakeRadioNode) -> TestResult<(RanDownlink, MmMessage)> {
        loop {
            let message = self.recv(radio).await?;
            if let Some(mm) = mm_message(&message) {
                return Ok((message, mm));
            }
        }
    }

    /// Next downlink carrying a 5GSM message.
    pub async fn recv_sm(&mut self, radio: &mut FakeRadioNode) -> TestResult<(RanDownlink, SmNasMessage)> {
        loop {
            let message = self.recv(radio).await?;
            if let Some(sm) = sm_message(&message) {
                return Ok((message, sm));
            }
        }
    }

    fn capabilities() -> IeUeSecurityCapability {
        IeUeSecurityCapability::from_algorithms(&[0, 1, 2], &[1, 2])
    }

    pub fn registration_request(&self) -> RegistrationRequest {
        let suci = Suci::null_scheme(&self.supi, false).expect("encodable SUCI");
        let mut request = RegistrationRequest::new(
            Ie5gsRegistrationType::new(RegistrationType::InitialRegistration, false),
            IeNasKeySetIdentifier::no_key(),
            Ie5gsMobileIdentity::Suci(suci),
        );
        request.ue_security_capability = Some(Self::capabilities());
        request
    }

    /// Registration presenting the stored GUTI and key set.
    pub fn guti_registration(&self, registration_type: RegistrationType) -> TestResult<RegistrationRequest> {
        let guti = self.guti.ok_or("UE holds no GUTI")?;
        let ng_ksi = match self.ng_ksi {
            Some(ksi) => IeNasKeySetIdentifier::new(SecurityContextType::Native, ksi),
            None => IeNasKeySetIdentifier::no_key(),
        };
        let mut request = RegistrationRequest::new(
            Ie5gsRegistrationType::new(registration_type, false),
            ng_ksi,
            Ie5gsMobileIdentity::Guti(guti),
        );
        request.ue_security_capability = Some(Self::capabilities());
        Ok(request)
    }

    pub fn service_request(&self, service_type: ServiceType, uplink_data: &[u8]) -> TestResult<ServiceRequest> {
        let s_tmsi = self.s_tmsi().ok_or("UE holds no GUTI")?;
        Ok(ServiceRequest {
            ng_ksi: IeNasKeySetIdentifier::new(SecurityContextType::Native, self.ng_ksi.unwrap_or(0)),
            service_type,
            s_tmsi: Ie5gsMobileIdentity::STmsi(s_tmsi),
            uplink_data_status: (!uplink_data.is_empty())
                .then(|| IePduSessionStatus::from_ids(uplink_data.iter().copied())),
            pdu_session_status: None,
            nas_message_container: None,
        })
    }

    pub fn deregistration_request(&self, switch_off: bool) -> TestResult<DeregistrationRequestUeOriginating> {
        let guti = self.guti.ok_or("UE holds no GUTI")?;
        Ok(DeregistrationRequestUeOriginating {
            ng_ksi: IeNasKeySetIdentifier::new(SecurityContextType::Native, self.ng_ksi.unwrap_or(0)),
            deregistration_type: IeDeRegistrationType {
                switch_off,
                re_registration_required: false,
                access_type: AccessType::ThreeGppAccess,
            },
            mobile_identity: Ie5gsMobileIdentity::Guti(guti),
        })
    }

    /// Computes RES* for the challenge. A new key set is coming, so the
    /// uplink counter restarts once the security mode command arrives.
    pub fn authentication_response(&mut self, request: &AuthenticationRequest) -> TestResult<AuthenticationResponse> {
        let rand = request.rand.as_ref().ok_or("authentication request without RAND")?;
        self.ng_ksi = Some(request.ng_ksi.ksi);
        Ok(AuthenticationResponse {
            response_parameter: Some(IeAuthenticationResponseParameter(expected_res_star(&rand.0))),
        })
    }

    /// Takes the new key set into use.
    pub fn security_mode_complete(&mut self, _command: &SecurityModeCommand) -> SecurityModeComplete {
        self.secured = true;
        self.next_sqn = 1;
        SecurityModeComplete {
            imeisv: Some(Ie5gsMobileIdentity::Imeisv(TEST_IMEISV.into())),
            nas_message_container: None,
        }
    }

    pub fn accept_registration(&mut self, accept: &RegistrationAccept) {
        if let Some(Ie5gsMobileIdentity::Guti(guti)) = &accept.guti {
            self.guti = Some(*guti);
        }
    }

    /// Answers the authentication and security mode challenges until the
    /// Registration Accept arrives, returning the downlink that carried it.
    pub async fn complete_challenges(&mut self, radio: &mut FakeRadioNode) -> TestResult<(RanDownlink, RegistrationAccept)> {
        loop {
            let (downlink, message) = self.recv_mm(radio).await?;
            match message {
                MmMessage::AuthenticationRequest(request) => {
                    let response = self.authentication_response(&request)?;
                    self.uplink(radio, response).await?;
                }
                MmMessage::SecurityModeCommand(command) => {
                    let complete = self.security_mode_complete(&command);
                    self.uplink(radio, complete).await?;
                }
                MmMessage::RegistrationAccept(accept) => {
                    self.accept_registration(&accept);
                    return Ok((downlink, accept));
                }
                other => return Err(format!("unexpected {} during registration", other.name()).into()),
            }
        }
    }

    /// Confirms the context setup when the accept came with one, then sends
    /// Registration Complete.
    pub async fn finish_registration(&mut self, radio: &mut FakeRadioNode, downlink: &RanDownlink) -> TestResult {
        if let RanDownlink::InitialContextSetupRequest { ids, pdu_sessions, .. } = downlink {
            let setup = pdu_sessions
                .iter()
                .map(|session| SessionSetupItem {
                    pdu_session_id: session.pdu_session_id,
                    gnb_tunnel: gnb_tunnel(session.pdu_session_id),
                })
                .collect();
            radio
                .send(RanUplink::InitialContextSetupResponse {
                    ids: *ids,
                    pdu_sessions: setup,
                })
                .await?;
        }
        self.uplink(radio, RegistrationComplete).await
    }

    /// Full initial registration by SUCI.
    pub async fn register(&mut self, radio: &mut FakeRadioNode) -> TestResult<RegistrationAccept> {
        let request = self.registration_request();
        self.initial(radio, request, None).await?;
        let (downlink, accept) = self.complete_challenges(radio).await?;
        self.finish_registration(radio, &downlink).await?;
        Ok(accept)
    }

    /// Requests PDU session `psi` and answers the radio resource setup.
    pub async fn establish_session(&mut self, radio: &mut FakeRadioNode, psi: u8, dnn: Option<&str>) -> TestResult<SmNasMessage> {
        let request = PduSessionEstablishmentRequest {
            pdu_session_type: Some(IePduSessionType::from(PduSessionType::Ipv4)),
            ..Default::default()
        };
        self.uplink_sm(radio, psi, request, dnn).await?;
        let (downlink, answer) = self.recv_sm(radio).await?;
        if let RanDownlink::PduSessionResourceSetupRequest { ids, sessions } = &downlink {
            radio
                .send(RanUplink::PduSessionResourceSetupResponse {
                    ids: *ids,
                    setup: sessions
                        .iter()
                        .map(|session| SessionSetupItem {
                            pdu_session_id: session.pdu_session_id,
                            gnb_tunnel: gnb_tunnel(session.pdu_session_id),
                        })
                        .collect(),
                    failed: Vec::new(),
                })
                .await?;
        }
        Ok(answer)
    }

    /// Radio-initiated release to CM-IDLE.
    pub async fn go_idle(&mut self, radio: &mut FakeRadioNode) -> TestResult {
        let ids = self.ids()?;
        radio
            .send(RanUplink::UeContextReleaseRequest {
                ids,
                cause: ReleaseCause::UserInactivity,
            })
            .await?;
        let command = self.recv(radio).await?;
        if !matches!(command, RanDownlink::UeContextReleaseCommand { .. }) {
            return Err(format!("expected release command, got {}", command.name()).into());
        }
        radio.send(RanUplink::UeContextReleaseComplete { ids }).await
    }
}

/// A running AMF with a fake radio node and mock collaborators attached.
pub struct TestAmf {
    pub app: AmfApp,
    pub radio: FakeRadioNode,
    pub mocks: MockServices,
    pub state: Arc<dyn StateStore>,
}

impl TestAmf {
    /// AMF on [`test_amf_config`] with an empty in-memory state store.
    pub async fn start() -> TestResult<Self> {
        Self::start_with(test_amf_config(), MockServices::new(), Arc::new(MemoryStore::new()), StartOptions::default()).await
    }

    pub async fn start_with(
        config: AmfConfig,
        mocks: MockServices,
        state: Arc<dyn StateStore>,
        options: StartOptions,
    ) -> TestResult<Self> {
        let tai = config.tai_list.first().copied().ok_or("configuration has no TAI")?;
        let (radio_tx, radio_rx) = mpsc::channel(config.channel_capacity);
        let app = AmfApp::start(config, mocks.collaborators(), Arc::clone(&state), radio_tx, options).await?;
        let radio = FakeRadioNode::new(app.task_base().ngap_tx, radio_rx, tai);
        Ok(Self {
            app,
            radio,
            mocks,
            state,
        })
    }

    /// Stops this AMF after its snapshots are written and starts a new one
    /// on the same state store and collaborators.
    pub async fn restart(self, options: StartOptions) -> TestResult<Self> {
        let config = (*self.app.task_base().config).clone();
        self.app.flush().await;
        self.app.shutdown().await?;
        Self::start_with(config, self.mocks, self.state, options).await
    }

    pub async fn context(&self, supi: &Supi) -> Option<UeContext> {
        self.app
            .contexts()
            .await
            .into_iter()
            .find(|ue| ue.supi.as_ref() == Some(supi))
    }

    /// Waits until the context of `supi` satisfies `check`.
    pub async fn wait_for_context<F>(&self, supi: &Supi, check: F) -> TestResult<UeContext>
    where
        F: Fn(&UeContext) -> bool,
    {
        let check = &check;
        wait_for_condition(
            || async move { self.context(supi).await.is_some_and(|ue| check(&ue)) },
            DEFAULT_TEST_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
        )
        .await?;
        self.context(supi).await.ok_or_else(|| "context vanished".into())
    }

    pub async fn shutdown(self) -> TestResult {
        self.app.shutdown().await?;
        Ok(())
    }
}

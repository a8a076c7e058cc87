//! PDU session management relayed over NAS transport (TS 24.501 §6.3, §6.4)
//!
//! The AMF keeps a [`SessionContext`] per PDU session and relays 5GSM
//! messages between the UE and the session service. Establishment is
//! idempotent: a repeated request for a session already allocated is
//! answered with the stored accept instead of a second allocation.

use nextgamf_common::SNssai;
use nextgamf_nas::ies::{MmCause, PayloadContainerType, PduSessionType, SmCause};
use nextgamf_nas::messages::{
    DlNasTransport, NasMessage, PduSessionEstablishmentReject, PduSessionEstablishmentRequest,
    PduSessionModificationCommand, PduSessionReleaseCommand, SmMessage, SmNasMessage, SmStatus, UlNasTransport,
};
use tracing::{debug, info, warn};

use super::{mm, MAX_NAS_PDU_LEN};
use crate::amf::{AmfCore, Outbox, ProcedureError, ProcedureResult};
use crate::context::{
    AmfUeNgapId, ProcedureKind, ServicePurpose, SessionAmbr, SessionContext, SessionState, TunnelEndpoint,
};
use crate::ngap::{PduSessionResource, RanDownlink, SessionSetupItem};
use crate::services::{CreateSessionRequest, ServiceError, ServiceRequest, SessionAllocation};

/// PTI of network-requested procedures.
const NO_PTI: u8 = 0;

/// Resource entry of an allocated session for the radio node.
pub(crate) fn session_resource(session: &SessionContext, nas_pdu: Option<Vec<u8>>) -> PduSessionResource {
    PduSessionResource {
        pdu_session_id: session.pdu_session_id,
        s_nssai: session.s_nssai,
        upf_tunnel: session.upf_tunnel,
        qfi: session.qfi,
        ambr: session.ambr,
        nas_pdu,
    }
}

impl AmfCore {
    pub(crate) fn handle_ul_nas_transport(
        &mut self,
        id: AmfUeNgapId,
        transport: UlNasTransport,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if transport.payload_container_type != PayloadContainerType::N1SmInformation {
            debug!(
                amf_ue_ngap_id = id,
                container = ?transport.payload_container_type,
                "Payload container type not relayed"
            );
            return Ok(());
        }
        if !self.ue(id)?.is_registered() {
            warn!(amf_ue_ngap_id = id, "5GSM payload from unregistered UE not forwarded");
            let psi = transport.pdu_session_id.unwrap_or_default();
            let mut echo = DlNasTransport::for_session(psi, transport.payload_container.0);
            echo.pdu_session_id = transport.pdu_session_id;
            echo.mm_cause = Some(MmCause::PayloadNotForwarded);
            self.send_nas(id, mm(echo), out)?;
            return Ok(());
        }

        let SmNasMessage {
            pdu_session_id: psi,
            pti,
            message,
        } = match NasMessage::decode(&transport.payload_container.0, MAX_NAS_PDU_LEN) {
            Ok((NasMessage::Sm(message), _)) => message,
            Ok((other, _)) => {
                warn!(amf_ue_ngap_id = id, message = other.name(), "Non-5GSM message in N1 SM container");
                return Ok(());
            }
            Err(e) => {
                warn!(amf_ue_ngap_id = id, "Undecodable 5GSM payload dropped: {}", e);
                return Ok(());
            }
        };

        match message {
            SmMessage::PduSessionEstablishmentRequest(request) => {
                let dnn = transport.dnn.map(|dnn| dnn.0);
                let s_nssai = transport.s_nssai.map(|s_nssai| s_nssai.0);
                self.handle_establishment_request(id, psi, pti, request, dnn, s_nssai, out)
            }
            SmMessage::PduSessionModificationComplete(_) => self.handle_modification_complete(id, psi, out),
            SmMessage::PduSessionReleaseRequest(_) => self.handle_release_request(id, psi, pti, out),
            SmMessage::PduSessionReleaseComplete(_) => self.handle_release_complete(id, psi, out),
            SmMessage::SmStatus(status) => {
                warn!(amf_ue_ngap_id = id, pdu_session_id = psi, cause = ?status.cause, "5GSM status received");
                Ok(())
            }
            other => {
                warn!(amf_ue_ngap_id = id, message = other.name(), "Unexpected 5GSM message");
                self.send_sm(
                    id,
                    psi,
                    pti,
                    SmStatus {
                        cause: SmCause::MessageTypeNotCompatible,
                    },
                    out,
                )?;
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_establishment_request(
        &mut self,
        id: AmfUeNgapId,
        psi: u8,
        pti: u8,
        request: PduSessionEstablishmentRequest,
        dnn: Option<String>,
        s_nssai: Option<SNssai>,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if pti == 0 || pti == 255 {
            return self.reject_establishment(id, psi, pti, SmCause::InvalidPtiValue, out);
        }
        if !(1..=15).contains(&psi) {
            return self.reject_establishment(id, psi, pti, SmCause::InvalidPduSessionIdentity, out);
        }

        if let Some(session) = self.ue_mut(id)?.sessions.get_mut(&psi) {
            match session.state {
                SessionState::Active | SessionState::Confirmed => {
                    session.duplicate_count += 1;
                    let accept = session.establishment_accept();
                    info!(
                        amf_ue_ngap_id = id,
                        pdu_session_id = psi,
                        duplicates = session.duplicate_count,
                        "Duplicate establishment answered with the stored accept"
                    );
                    self.send_sm(id, psi, pti, accept, out)?;
                    return Ok(());
                }
                SessionState::Creating => {
                    session.duplicate_count += 1;
                    debug!(amf_ue_ngap_id = id, pdu_session_id = psi, "Establishment already in progress");
                    out.touch(id);
                    return Ok(());
                }
                SessionState::ReleasePending | SessionState::Released => {
                    return self.reject_establishment(id, psi, pti, SmCause::RequestRejectedUnspecified, out);
                }
            }
        }

        let session_type = match request.pdu_session_type.map(|ie| ie.session_type()) {
            None | Some(Some(PduSessionType::Ipv4 | PduSessionType::Ipv4v6)) => PduSessionType::Ipv4,
            Some(other) => {
                warn!(amf_ue_ngap_id = id, pdu_session_id = psi, session_type = ?other, "Unsupported PDU session type");
                return self.reject_establishment(id, psi, pti, SmCause::UnknownPduSessionType, out);
            }
        };
        let Some(dnn) = dnn.filter(|dnn| self.config.is_dnn_known(dnn)) else {
            warn!(amf_ue_ngap_id = id, pdu_session_id = psi, "Establishment without a known DNN");
            return self.reject_establishment(id, psi, pti, SmCause::MissingOrUnknownDnn, out);
        };
        let max_sessions = usize::from(self.config.max_pdu_sessions);
        let ue = self.ue_mut(id)?;
        if ue.sessions.len() >= max_sessions {
            return self.reject_establishment(id, psi, pti, SmCause::InsufficientResources, out);
        }
        let supi = ue.supi.clone().ok_or(ProcedureError::MissingIdentity(id))?;

        let mut session = SessionContext::new(psi, pti, session_type, dnn.clone());
        session.s_nssai = s_nssai.or_else(|| ue.allowed_nssai.first().copied());
        let request = CreateSessionRequest {
            supi,
            pdu_session_id: psi,
            dnn,
            session_type,
            s_nssai: session.s_nssai,
        };
        ue.sessions.insert(psi, session);
        info!(amf_ue_ngap_id = id, pdu_session_id = psi, dnn = %request.dnn, "PDU session establishment");
        out.touch(id);
        self.request_service(
            id,
            ServicePurpose::SessionCreate(psi),
            |corr| ServiceRequest::CreateSession { corr, request },
            out,
        )
    }

    fn reject_establishment(
        &mut self,
        id: AmfUeNgapId,
        psi: u8,
        pti: u8,
        cause: SmCause,
        out: &mut Outbox,
    ) -> ProcedureResult {
        warn!(amf_ue_ngap_id = id, pdu_session_id = psi, ?cause, "PDU session establishment rejected");
        self.send_sm(id, psi, pti, PduSessionEstablishmentReject::new(cause), out)?;
        Ok(())
    }

    pub(crate) fn handle_session_created(
        &mut self,
        id: AmfUeNgapId,
        psi: u8,
        result: Result<SessionAllocation, ServiceError>,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let Some(session) = ue.sessions.get_mut(&psi).filter(|session| session.state == SessionState::Creating)
        else {
            debug!(amf_ue_ngap_id = id, pdu_session_id = psi, "Allocation for a session no longer being created");
            return Ok(());
        };
        let pti = session.pti;

        let allocation = match result {
            Ok(allocation) => allocation,
            Err(e) => {
                warn!(amf_ue_ngap_id = id, pdu_session_id = psi, "Session allocation failed: {}", e);
                ue.sessions.remove(&psi);
                out.touch(id);
                let cause = match e {
                    ServiceError::Rejected { .. } => SmCause::InsufficientResources,
                    _ => SmCause::NetworkFailure,
                };
                return self.reject_establishment(id, psi, pti, cause, out);
            }
        };
        session.ue_address = Some(allocation.ue_address);
        session.upf_tunnel = Some(allocation.upf_tunnel);
        session.qfi = allocation.qfi;
        session.five_qi = allocation.five_qi;
        session.ambr = Some(allocation.ambr);
        session.state = SessionState::Active;
        let accept = session.establishment_accept();
        let mut resource = session_resource(session, None);
        info!(
            amf_ue_ngap_id = id,
            pdu_session_id = psi,
            ue_address = %allocation.ue_address,
            "PDU session allocated"
        );

        let ids = self.ngap_ids(id)?;
        resource.nas_pdu = Some(self.encode_sm(id, psi, pti, accept)?);
        out.ran(RanDownlink::PduSessionResourceSetupRequest {
            ids,
            sessions: vec![resource],
        });
        out.touch(id);
        Ok(())
    }

    /// The radio node set the session's resources up.
    pub(crate) fn session_resource_confirmed(
        &mut self,
        id: AmfUeNgapId,
        psi: u8,
        gnb_tunnel: TunnelEndpoint,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let registered = ue.is_registered();
        let supi = ue.supi.clone().ok_or(ProcedureError::MissingIdentity(id))?;
        let Some(session) = ue.sessions.get_mut(&psi).filter(|session| session.is_active()) else {
            debug!(amf_ue_ngap_id = id, pdu_session_id = psi, "Resource setup for an inactive session");
            return Ok(());
        };
        session.gnb_tunnel = Some(gnb_tunnel);
        session.state = SessionState::Confirmed;
        session.pending_downlink_data = false;
        debug!(amf_ue_ngap_id = id, pdu_session_id = psi, teid = gnb_tunnel.teid, "Session resources confirmed");
        if registered {
            out.snapshot(id);
        } else {
            out.touch(id);
        }
        self.request_service(
            id,
            ServicePurpose::SessionUpdate(psi),
            |corr| ServiceRequest::UpdateSession {
                corr,
                supi,
                pdu_session_id: psi,
                gnb_tunnel,
            },
            out,
        )
    }

    pub(crate) fn handle_resource_setup_response(
        &mut self,
        id: AmfUeNgapId,
        setup: Vec<SessionSetupItem>,
        failed: Vec<u8>,
        out: &mut Outbox,
    ) -> ProcedureResult {
        for item in setup {
            self.session_resource_confirmed(id, item.pdu_session_id, item.gnb_tunnel, out)?;
        }
        for psi in failed {
            warn!(amf_ue_ngap_id = id, pdu_session_id = psi, "Radio node failed to set the session up");
            if self.ue(id)?.sessions.contains_key(&psi) {
                self.start_session_release(id, psi, NO_PTI, SmCause::NetworkFailure, out)?;
            }
        }
        Ok(())
    }

    /// Sends the Release Command, or removes the session at once when the
    /// UE cannot be reached.
    fn start_session_release(
        &mut self,
        id: AmfUeNgapId,
        psi: u8,
        pti: u8,
        cause: SmCause,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let connected = ue.ran_ue_ngap_id.is_some();
        let session = ue.sessions.get_mut(&psi).ok_or(ProcedureError::UnknownSession(psi))?;
        if !connected {
            return self.remove_session(id, psi, out);
        }
        session.state = SessionState::ReleasePending;
        info!(amf_ue_ngap_id = id, pdu_session_id = psi, ?cause, "Releasing PDU session");

        let ids = self.ngap_ids(id)?;
        let nas_pdu = self.encode_sm(id, psi, pti, PduSessionReleaseCommand::new(cause))?;
        out.ran(RanDownlink::PduSessionResourceReleaseCommand {
            ids,
            pdu_session_id: psi,
            nas_pdu: nas_pdu.clone(),
        });
        out.touch(id);
        self.start_procedure(id, ProcedureKind::Release(psi), nas_pdu, out)
    }

    fn handle_release_request(&mut self, id: AmfUeNgapId, psi: u8, pti: u8, out: &mut Outbox) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let Some(session) = ue.sessions.get(&psi) else {
            warn!(amf_ue_ngap_id = id, pdu_session_id = psi, "Release requested for unknown session");
            self.send_sm(
                id,
                psi,
                pti,
                SmStatus {
                    cause: SmCause::PduSessionDoesNotExist,
                },
                out,
            )?;
            return Ok(());
        };
        if session.state == SessionState::ReleasePending {
            let duplicates = ue.procedures.record_duplicate(ProcedureKind::Release(psi));
            debug!(amf_ue_ngap_id = id, pdu_session_id = psi, ?duplicates, "Release already in progress");
            return Ok(());
        }
        self.start_session_release(id, psi, pti, SmCause::RegularDeactivation, out)
    }

    fn handle_release_complete(&mut self, id: AmfUeNgapId, psi: u8, out: &mut Outbox) -> ProcedureResult {
        if self.finish_procedure(id, ProcedureKind::Release(psi), out).is_none()
            && !self.ue(id)?.sessions.contains_key(&psi)
        {
            debug!(amf_ue_ngap_id = id, pdu_session_id = psi, "Release complete for unknown session");
            return Ok(());
        }
        info!(amf_ue_ngap_id = id, pdu_session_id = psi, "PDU session released");
        self.remove_session(id, psi, out)
    }

    /// Drops the session locally after telling the session service.
    pub(crate) fn remove_session(&mut self, id: AmfUeNgapId, psi: u8, out: &mut Outbox) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let Some(session) = ue.sessions.remove(&psi) else {
            return Ok(());
        };
        ue.procedures.cancel_service(ServicePurpose::SessionCreate(psi));
        ue.procedures.cancel_service(ServicePurpose::SessionUpdate(psi));
        let registered = ue.is_registered();
        let supi = ue.supi.clone();
        debug!(amf_ue_ngap_id = id, pdu_session_id = psi, dnn = %session.dnn, "Session context removed");

        self.finish_procedure(id, ProcedureKind::Release(psi), out);
        self.finish_procedure(id, ProcedureKind::Modification(psi), out);
        if registered {
            out.snapshot(id);
        } else {
            out.touch(id);
        }
        // The local context is already gone; the session service only learns
        // of it afterwards and its answer cannot bring the session back.
        let Some(supi) = supi else { return Ok(()) };
        self.request_service(
            id,
            ServicePurpose::SessionRelease(psi),
            |corr| ServiceRequest::ReleaseSession {
                corr,
                supi,
                pdu_session_id: psi,
            },
            out,
        )
    }

    pub(crate) fn handle_network_session_release(
        &mut self,
        supi: &nextgamf_common::Supi,
        psi: u8,
        cause: SmCause,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let id = self.id_for_supi(supi)?;
        let session = self.ue(id)?.sessions.get(&psi).ok_or(ProcedureError::UnknownSession(psi))?;
        if session.state == SessionState::ReleasePending {
            debug!(amf_ue_ngap_id = id, pdu_session_id = psi, "Release already in progress");
            return Ok(());
        }
        self.start_session_release(id, psi, NO_PTI, cause, out)
    }

    /// Pushes a new session AMBR to the UE.
    pub(crate) fn start_session_modification(
        &mut self,
        supi: &nextgamf_common::Supi,
        psi: u8,
        ambr: SessionAmbr,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let id = self.id_for_supi(supi)?;
        let ue = self.ue_mut(id)?;
        let connected = ue.ran_ue_ngap_id.is_some();
        let session = ue
            .sessions
            .get_mut(&psi)
            .filter(|session| session.is_active())
            .ok_or(ProcedureError::UnknownSession(psi))?;
        if !connected {
            info!(amf_ue_ngap_id = id, pdu_session_id = psi, "Modification for idle UE ignored");
            return Ok(());
        }
        session.pending_ambr = Some(ambr);

        let command = PduSessionModificationCommand {
            session_ambr: Some(ambr.to_ie()),
            ..Default::default()
        };
        let nas_pdu = self.send_sm(id, psi, NO_PTI, command, out)?;
        info!(amf_ue_ngap_id = id, pdu_session_id = psi, "PDU session modification");
        self.start_procedure(id, ProcedureKind::Modification(psi), nas_pdu, out)
    }

    fn handle_modification_complete(&mut self, id: AmfUeNgapId, psi: u8, out: &mut Outbox) -> ProcedureResult {
        if self.finish_procedure(id, ProcedureKind::Modification(psi), out).is_none() {
            debug!(amf_ue_ngap_id = id, pdu_session_id = psi, "Modification complete without a command");
            return Ok(());
        }
        let ue = self.ue_mut(id)?;
        let registered = ue.is_registered();
        if let Some(session) = ue.sessions.get_mut(&psi) {
            if let Some(ambr) = session.pending_ambr.take() {
                session.ambr = Some(ambr);
            }
        }
        if registered {
            out.snapshot(id);
        } else {
            out.touch(id);
        }
        Ok(())
    }
}

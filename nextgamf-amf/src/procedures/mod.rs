//! NAS procedure handlers
//!
//! Each submodule adds the handlers of one procedure family to
//! [`AmfCore`]. This module holds what they share: event routing, NAS
//! encoding under the UE's security context, procedure records with their
//! timers, and context teardown.
//!
//! # Retransmission
//!
//! Every message that waits for a UE answer is stored in a
//! [`ProcedureRecord`] together with the token of the timer arm guarding it.
//! An expiry whose token no longer matches the record is stale and ignored.
//! A current expiry resends the stored octets until the configured limit is
//! reached, after which the procedure fails.

mod authentication;
mod deregistration;
mod identification;
mod paging;
mod registration;
mod security_mode;
mod service_request;
mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use nextgamf_common::{log_nas_message, Direction, Supi};
use nextgamf_nas::ies::MmCause;
use nextgamf_nas::messages::{DlNasTransport, MmMessage, MmStatus, NasMessage, NasPdu, SmMessage, SmNasMessage};
use nextgamf_nas::{SecuredHeader, SecurityHeaderType};
use tracing::{debug, info, warn};

use crate::amf::{Action, AmfCore, NetworkEvent, Outbox, ProcedureError, ProcedureResult};
use crate::context::{AmfUeNgapId, ProcedureKind, ProcedureRecord, ReleaseCause, ServicePurpose, UeContext};
use crate::ngap::{RanDownlink, RanUplink, UeNgapIds};
use crate::services::{ServiceCorrelation, ServiceRequest, ServiceResponse, ServiceResult};
use crate::timer::{TimerExpiry, TimerId, TimerToken};

/// Upper bound handed to the NAS codec for any single PDU.
pub(crate) const MAX_NAS_PDU_LEN: usize = 65_535;

pub(crate) fn mm(message: impl Into<MmMessage>) -> NasMessage {
    NasMessage::Mm(message.into())
}

impl AmfCore {
    pub(crate) fn ue(&self, id: AmfUeNgapId) -> ProcedureResult<&UeContext> {
        self.store.get(id).ok_or(ProcedureError::UnknownContext(id))
    }

    pub(crate) fn ue_mut(&mut self, id: AmfUeNgapId) -> ProcedureResult<&mut UeContext> {
        self.store.get_mut(id).ok_or(ProcedureError::UnknownContext(id))
    }

    pub(crate) fn id_for_supi(&self, supi: &Supi) -> ProcedureResult<AmfUeNgapId> {
        self.store
            .find_by_supi(supi)
            .ok_or_else(|| ProcedureError::UnknownSubscriber(supi.clone()))
    }

    /// NGAP ids of the UE's current radio association.
    pub(crate) fn ngap_ids(&self, id: AmfUeNgapId) -> ProcedureResult<UeNgapIds> {
        self.ue(id)?
            .ran_ue_ngap_id
            .map(|ran| UeNgapIds::new(id, ran))
            .ok_or(ProcedureError::NotConnected(id))
    }

    /// The context addressed by a UE-associated uplink message, provided the
    /// radio side id matches the current association.
    fn connected_context(&self, ids: UeNgapIds) -> ProcedureResult<AmfUeNgapId> {
        let ue = self.ue(ids.amf_ue_ngap_id)?;
        if ue.ran_ue_ngap_id != Some(ids.ran_ue_ngap_id) {
            return Err(ProcedureError::NotConnected(ids.amf_ue_ngap_id));
        }
        Ok(ids.amf_ue_ngap_id)
    }

    /// Moves the context onto a new radio association. An older association
    /// still held is released towards the radio node.
    pub(crate) fn rebind_radio(
        &mut self,
        id: AmfUeNgapId,
        ran_ue_ngap_id: u32,
        tai: nextgamf_common::Tai,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let previous = ue.ran_ue_ngap_id.replace(ran_ue_ngap_id);
        ue.cm_state = crate::context::CmState::Connected;
        ue.tai = Some(tai);
        ue.release_cause = None;
        if let Some(previous) = previous.filter(|previous| *previous != ran_ue_ngap_id) {
            debug!(amf_ue_ngap_id = id, ran_ue_ngap_id = previous, "Releasing superseded radio association");
            out.ran(RanDownlink::UeContextReleaseCommand {
                ids: UeNgapIds::new(id, previous),
                cause: ReleaseCause::Unspecified,
            });
        }
        out.touch(id);
        Ok(())
    }

    /// Encodes `message` for the UE, protected once security is active.
    pub(crate) fn encode_downlink(&mut self, id: AmfUeNgapId, message: NasMessage) -> ProcedureResult<Vec<u8>> {
        let ue = self.ue(id)?;
        let header_type = if !ue.security.is_active() {
            None
        } else if ue.security.is_ciphered() {
            Some(SecurityHeaderType::IntegrityProtectedAndCiphered)
        } else {
            Some(SecurityHeaderType::IntegrityProtected)
        };
        self.encode_nas(id, message, header_type)
    }

    /// Encodes `message` under an explicit security header type.
    ///
    /// The MAC field is left zero; integrity and ciphering algorithms are
    /// applied outside the AMF core.
    pub(crate) fn encode_nas(
        &mut self,
        id: AmfUeNgapId,
        message: NasMessage,
        header_type: Option<SecurityHeaderType>,
    ) -> ProcedureResult<Vec<u8>> {
        let name = message.name();
        let pdu = match header_type {
            Some(header_type) => {
                let sqn = self.ue_mut(id)?.security.next_downlink_sqn()?;
                NasPdu::Protected {
                    header: SecuredHeader::new(header_type, [0; 4], sqn),
                    message,
                }
            }
            None => NasPdu::Plain(message),
        };
        let octets = pdu.encode(MAX_NAS_PDU_LEN)?;
        log_nas_message(Direction::Tx, id, name, &octets);
        Ok(octets)
    }

    /// Sends `message` in a Downlink NAS Transport, returning the octets sent.
    pub(crate) fn send_nas(&mut self, id: AmfUeNgapId, message: NasMessage, out: &mut Outbox) -> ProcedureResult<Vec<u8>> {
        let ids = self.ngap_ids(id)?;
        let nas_pdu = self.encode_downlink(id, message)?;
        out.ran(RanDownlink::DownlinkNasTransport {
            ids,
            nas_pdu: nas_pdu.clone(),
        });
        out.touch(id);
        Ok(nas_pdu)
    }

    /// Encodes a 5GSM message inside a DL NAS Transport for session `psi`.
    pub(crate) fn encode_sm(
        &mut self,
        id: AmfUeNgapId,
        psi: u8,
        pti: u8,
        message: impl Into<SmMessage>,
    ) -> ProcedureResult<Vec<u8>> {
        let inner = NasMessage::Sm(SmNasMessage::new(psi, pti, message)).encode(MAX_NAS_PDU_LEN)?;
        self.encode_downlink(id, mm(DlNasTransport::for_session(psi, inner)))
    }

    pub(crate) fn send_sm(
        &mut self,
        id: AmfUeNgapId,
        psi: u8,
        pti: u8,
        message: impl Into<SmMessage>,
        out: &mut Outbox,
    ) -> ProcedureResult<Vec<u8>> {
        let ids = self.ngap_ids(id)?;
        let nas_pdu = self.encode_sm(id, psi, pti, message)?;
        out.ran(RanDownlink::DownlinkNasTransport {
            ids,
            nas_pdu: nas_pdu.clone(),
        });
        out.touch(id);
        Ok(nas_pdu)
    }

    /// Issues a collaborator call; the response claims `purpose` by token.
    pub(crate) fn request_service(
        &mut self,
        id: AmfUeNgapId,
        purpose: ServicePurpose,
        build: impl FnOnce(ServiceCorrelation) -> ServiceRequest,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let token = self.next_token();
        self.ue_mut(id)?.procedures.await_service(token, purpose);
        out.service(build(ServiceCorrelation { ue: id, token }));
        Ok(())
    }

    /// Installs the record for `kind` and arms its timer.
    pub(crate) fn start_procedure(
        &mut self,
        id: AmfUeNgapId,
        kind: ProcedureKind,
        last_sent: Vec<u8>,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let token = TimerToken(self.next_token());
        let timer = kind.timer();
        let duration = self.timer_duration(timer);
        self.ue_mut(id)?
            .procedures
            .start(ProcedureRecord::new(kind, id, token, last_sent));
        out.push(Action::StartTimer {
            ue: id,
            timer,
            token,
            duration,
        });
        Ok(())
    }

    /// Ends the record for `kind` and disarms its timer.
    pub(crate) fn finish_procedure(
        &mut self,
        id: AmfUeNgapId,
        kind: ProcedureKind,
        out: &mut Outbox,
    ) -> Option<ProcedureRecord> {
        let record = self.store.get_mut(id)?.procedures.finish(kind)?;
        out.push(Action::StopTimer {
            ue: id,
            timer: kind.timer(),
        });
        Some(record)
    }

    /// Finishes every 5GMM record and forgets the 5GMM service calls.
    pub(crate) fn stop_mm_procedures(&mut self, id: AmfUeNgapId, out: &mut Outbox) {
        let Some(ue) = self.store.get(id) else { return };
        let kinds: Vec<ProcedureKind> = ue.procedures.kinds().filter(|kind| kind.is_mobility()).collect();
        for kind in kinds {
            self.finish_procedure(id, kind, out);
        }
        if let Some(ue) = self.store.get_mut(id) {
            ue.procedures.cancel_service(ServicePurpose::AuthenticationVectors);
            ue.procedures.cancel_service(ServicePurpose::Deconcealment);
        }
    }

    pub(crate) fn timer_duration(&self, timer: TimerId) -> Duration {
        let timers = &self.config.timers;
        Duration::from_secs(match timer {
            TimerId::T3513 => timers.t3513_secs,
            TimerId::T3550 => timers.t3550_secs,
            TimerId::T3560 => timers.t3560_secs,
            TimerId::T3570 => timers.t3570_secs,
            TimerId::T3591(_) => timers.t3591_secs,
            TimerId::T3592(_) => timers.t3592_secs,
        })
    }

    /// Checks the sequence number of a protected uplink PDU against the
    /// uplink COUNT. Plain PDUs and UEs without a key set pass.
    pub(crate) fn verify_uplink_count(&mut self, id: AmfUeNgapId, header: Option<&SecuredHeader>) -> ProcedureResult {
        let Some(header) = header else { return Ok(()) };
        let ue = self.ue_mut(id)?;
        if !ue.security.has_key() {
            return Ok(());
        }
        ue.security.accept_uplink(header.sequence_number)?;
        Ok(())
    }

    /// Asks the radio node to release the UE's connection. The context stays
    /// until the release completes.
    pub(crate) fn release_connection(&mut self, id: AmfUeNgapId, cause: ReleaseCause, out: &mut Outbox) -> ProcedureResult {
        let ids = self.ngap_ids(id)?;
        self.ue_mut(id)?.release_cause = Some(cause);
        out.ran(RanDownlink::UeContextReleaseCommand { ids, cause });
        out.touch(id);
        Ok(())
    }

    /// Tears the context down at once: procedures end, session management
    /// releases every session, a connected UE gets a release command and the
    /// context is deleted.
    pub(crate) fn release_context(&mut self, id: AmfUeNgapId, cause: ReleaseCause, out: &mut Outbox) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        ue.procedures.clear();
        let ran = ue.ran_ue_ngap_id;
        let supi = ue.supi.clone();
        let sessions: Vec<u8> = ue.sessions.keys().copied().collect();
        info!(ue = %ue.display_id(), amf_ue_ngap_id = id, ?cause, "Releasing UE context");

        out.push(Action::StopAllTimers(id));
        if let Some(ran) = ran {
            out.ran(RanDownlink::UeContextReleaseCommand {
                ids: UeNgapIds::new(id, ran),
                cause,
            });
        }
        if let Some(supi) = supi {
            for pdu_session_id in sessions {
                let token = self.next_token();
                out.service(ServiceRequest::ReleaseSession {
                    corr: ServiceCorrelation { ue: id, token },
                    supi: supi.clone(),
                    pdu_session_id,
                });
            }
        }
        self.delete_context(id, out);
        Ok(())
    }

    /// Deletes the context without signaling anyone.
    pub(crate) fn delete_context(&mut self, id: AmfUeNgapId, out: &mut Outbox) {
        if let Some(ue) = self.store.remove(id) {
            out.push(Action::StopAllTimers(id));
            if let Some(supi) = ue.supi {
                out.deleted(supi);
            }
        }
    }

    pub(crate) fn handle_ran(&mut self, message: RanUplink, out: &mut Outbox) -> ProcedureResult {
        debug!(message = message.name(), amf_ue_ngap_id = ?message.amf_ue_ngap_id(), "RAN message received");
        match message {
            RanUplink::InitialUeMessage {
                ran_ue_ngap_id,
                nas_pdu,
                tai,
                s_tmsi,
            } => self.handle_initial_ue_message(ran_ue_ngap_id, &nas_pdu, tai, s_tmsi, out),
            RanUplink::UplinkNasTransport { ids, nas_pdu } => self.handle_uplink_nas(ids, &nas_pdu, out),
            RanUplink::InitialContextSetupResponse { ids, pdu_sessions } => {
                let id = self.connected_context(ids)?;
                self.handle_initial_context_setup_response(id, pdu_sessions, out)
            }
            RanUplink::InitialContextSetupFailure { ids } => {
                let id = self.connected_context(ids)?;
                self.handle_initial_context_setup_failure(id, out)
            }
            RanUplink::PduSessionResourceSetupResponse { ids, setup, failed } => {
                let id = self.connected_context(ids)?;
                self.handle_resource_setup_response(id, setup, failed, out)
            }
            RanUplink::UeContextReleaseRequest { ids, cause } => {
                let id = self.connected_context(ids)?;
                self.handle_ue_context_release_request(id, cause, out)
            }
            RanUplink::UeContextReleaseComplete { ids } => self.handle_ue_context_release_complete(ids, out),
        }
    }

    fn handle_initial_ue_message(
        &mut self,
        ran_ue_ngap_id: u32,
        nas_pdu: &[u8],
        tai: nextgamf_common::Tai,
        s_tmsi: Option<nextgamf_common::STmsi>,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let pdu = match NasPdu::decode(nas_pdu, nas_pdu.len()) {
            Ok((pdu, _)) => pdu,
            Err(e) => {
                warn!(ran_ue_ngap_id, "Undecodable initial NAS message dropped: {}", e);
                return Ok(());
            }
        };
        let header = pdu.security_header().copied();
        match pdu.into_message() {
            NasMessage::Mm(MmMessage::RegistrationRequest(request)) => {
                let id = self.store.create(ran_ue_ngap_id);
                self.ue_mut(id)?.tai = Some(tai);
                log_nas_message(Direction::Rx, id, "RegistrationRequest", nas_pdu);
                debug!(amf_ue_ngap_id = id, ran_ue_ngap_id, "UE context created");
                self.handle_registration_request(id, request, out)
            }
            NasMessage::Mm(MmMessage::ServiceRequest(request)) => {
                self.handle_service_request(ran_ue_ngap_id, tai, s_tmsi, request, header, nas_pdu, out)
            }
            NasMessage::Mm(MmMessage::DeregistrationRequestUeOriginating(request)) => {
                self.handle_initial_deregistration(ran_ue_ngap_id, tai, request, nas_pdu, out)
            }
            other => {
                warn!(ran_ue_ngap_id, message = other.name(), "Initial NAS message of unexpected type dropped");
                Ok(())
            }
        }
    }

    fn handle_uplink_nas(&mut self, ids: UeNgapIds, nas_pdu: &[u8], out: &mut Outbox) -> ProcedureResult {
        let id = self.connected_context(ids)?;
        let pdu = match NasPdu::decode(nas_pdu, nas_pdu.len()) {
            Ok((pdu, _)) => pdu,
            Err(e) => {
                self.send_nas(
                    id,
                    mm(MmStatus {
                        cause: MmCause::InvalidMandatoryInformation,
                    }),
                    out,
                )?;
                return Err(e.into());
            }
        };
        if let Err(e) = self.verify_uplink_count(id, pdu.security_header()) {
            warn!(amf_ue_ngap_id = id, "Uplink NAS message dropped: {}", e);
            return Ok(());
        }
        log_nas_message(Direction::Rx, id, pdu.message().name(), nas_pdu);

        match pdu.into_message() {
            NasMessage::Mm(message) => self.dispatch_mm(id, message, out),
            NasMessage::Sm(message) => {
                warn!(
                    amf_ue_ngap_id = id,
                    pdu_session_id = message.pdu_session_id,
                    "5GSM message outside UL NAS Transport"
                );
                self.send_nas(
                    id,
                    mm(MmStatus {
                        cause: MmCause::MessageTypeNotCompatible,
                    }),
                    out,
                )?;
                Ok(())
            }
        }
    }

    fn dispatch_mm(&mut self, id: AmfUeNgapId, message: MmMessage, out: &mut Outbox) -> ProcedureResult {
        match message {
            MmMessage::RegistrationRequest(request) => {
                self.stop_mm_procedures(id, out);
                self.handle_registration_request(id, request, out)
            }
            MmMessage::RegistrationComplete(_) => self.handle_registration_complete(id, out),
            MmMessage::AuthenticationResponse(response) => self.handle_authentication_response(id, response, out),
            MmMessage::AuthenticationFailure(failure) => self.handle_authentication_failure(id, failure, out),
            MmMessage::IdentityResponse(response) => self.handle_identity_response(id, response, out),
            MmMessage::SecurityModeComplete(complete) => self.handle_security_mode_complete(id, complete, out),
            MmMessage::SecurityModeReject(reject) => self.handle_security_mode_reject(id, reject, out),
            MmMessage::UlNasTransport(transport) => self.handle_ul_nas_transport(id, transport, out),
            MmMessage::ServiceRequest(request) => self.handle_connected_service_request(id, request, out),
            MmMessage::DeregistrationRequestUeOriginating(request) => {
                self.handle_deregistration_request(id, request, out)
            }
            MmMessage::MmStatus(status) => {
                warn!(amf_ue_ngap_id = id, cause = ?status.cause, "5GMM status received");
                Ok(())
            }
            other => self.unexpected(id, other.name(), out),
        }
    }

    /// Answers a 5GMM message the current state has no use for.
    pub(crate) fn unexpected(&mut self, id: AmfUeNgapId, message: &'static str, out: &mut Outbox) -> ProcedureResult {
        let state = self.ue(id)?.mm_state;
        self.send_nas(
            id,
            mm(MmStatus {
                cause: MmCause::MessageTypeNotCompatible,
            }),
            out,
        )?;
        Err(ProcedureError::UnexpectedMessage { state, message })
    }

    pub(crate) fn handle_service_response(&mut self, response: ServiceResponse, out: &mut Outbox) -> ProcedureResult {
        let ServiceResponse { corr, result } = response;
        let id = corr.ue;
        let Some(purpose) = self.ue_mut(id)?.procedures.take_service(corr.token) else {
            debug!(amf_ue_ngap_id = id, token = corr.token, "Stale service response ignored");
            return Ok(());
        };

        match (purpose, result) {
            (ServicePurpose::AuthenticationVectors, ServiceResult::AuthenticationInfo(result)) => {
                self.handle_authentication_vectors(id, result, out)
            }
            (ServicePurpose::Deconcealment, ServiceResult::Deconcealed(result)) => {
                self.handle_deconcealed(id, result, out)
            }
            (ServicePurpose::SessionCreate(psi), ServiceResult::SessionCreated { result, .. }) => {
                self.handle_session_created(id, psi, result, out)
            }
            (ServicePurpose::SessionUpdate(psi), ServiceResult::SessionUpdated { result, .. }) => {
                if let Err(e) = result {
                    warn!(amf_ue_ngap_id = id, pdu_session_id = psi, "Session update failed: {}", e);
                }
                Ok(())
            }
            (ServicePurpose::SessionRelease(psi), ServiceResult::SessionReleased { result, .. }) => {
                if let Err(e) = result {
                    warn!(amf_ue_ngap_id = id, pdu_session_id = psi, "Session release not confirmed: {}", e);
                }
                Ok(())
            }
            (purpose, _) => {
                warn!(amf_ue_ngap_id = id, ?purpose, "Service response does not match the outstanding call");
                Ok(())
            }
        }
    }

    pub(crate) fn handle_timer_expiry(&mut self, expiry: TimerExpiry, out: &mut Outbox) -> ProcedureResult {
        let TimerExpiry { ue: id, timer, token } = expiry;
        let ue = self.ue(id)?;
        let Some(kind) = ue.procedures.find_by_timer(timer, token) else {
            debug!(amf_ue_ngap_id = id, %timer, %token, "Stale timer expiry ignored");
            return Ok(());
        };
        let retransmissions = ue.procedures.get(kind).map_or(0, |record| record.retransmissions);
        let limit = match kind {
            ProcedureKind::Paging => self.config.timers.max_paging_retries,
            _ => self.config.timers.max_retransmissions,
        };
        let reachable = match kind {
            ProcedureKind::Paging => ue.ran_ue_ngap_id.is_none(),
            _ => ue.ran_ue_ngap_id.is_some(),
        };

        if retransmissions < limit && reachable {
            return self.retransmit(id, kind, out);
        }
        warn!(
            amf_ue_ngap_id = id,
            %timer,
            procedure = %kind,
            retransmissions,
            "Procedure abandoned"
        );
        self.finish_procedure(id, kind, out);
        self.procedure_exhausted(id, kind, out)
    }

    fn retransmit(&mut self, id: AmfUeNgapId, kind: ProcedureKind, out: &mut Outbox) -> ProcedureResult {
        let token = TimerToken(self.next_token());
        let timer = kind.timer();
        let duration = self.timer_duration(timer);
        let message = match kind {
            ProcedureKind::Paging => self.paging_message(id)?,
            _ => {
                let ids = self.ngap_ids(id)?;
                let nas_pdu = self
                    .ue(id)?
                    .procedures
                    .get(kind)
                    .map(|record| record.last_sent.clone())
                    .unwrap_or_default();
                match kind {
                    ProcedureKind::Release(pdu_session_id) => RanDownlink::PduSessionResourceReleaseCommand {
                        ids,
                        pdu_session_id,
                        nas_pdu,
                    },
                    _ => RanDownlink::DownlinkNasTransport { ids, nas_pdu },
                }
            }
        };

        let ue = self.ue_mut(id)?;
        let Some(record) = ue.procedures.get_mut(kind) else { return Ok(()) };
        record.retransmissions += 1;
        record.token = token;
        debug!(
            amf_ue_ngap_id = id,
            procedure = %kind,
            attempt = record.retransmissions,
            "Retransmitting"
        );
        out.ran(message);
        out.push(Action::StartTimer {
            ue: id,
            timer,
            token,
            duration,
        });
        Ok(())
    }

    fn procedure_exhausted(&mut self, id: AmfUeNgapId, kind: ProcedureKind, out: &mut Outbox) -> ProcedureResult {
        match kind {
            // An unconfirmed update of a registered UE keeps the registration
            ProcedureKind::Registration if self.ue(id)?.is_registered() => Ok(()),
            ProcedureKind::Registration
            | ProcedureKind::Authentication
            | ProcedureKind::SecurityMode
            | ProcedureKind::Identification => self.release_context(id, ReleaseCause::RegistrationFailure, out),
            ProcedureKind::Release(psi) => self.remove_session(id, psi, out),
            ProcedureKind::Modification(psi) => {
                if let Some(session) = self.ue_mut(id)?.sessions.get_mut(&psi) {
                    session.pending_ambr = None;
                }
                out.touch(id);
                Ok(())
            }
            ProcedureKind::Paging => {
                for session in self.ue_mut(id)?.sessions.values_mut() {
                    session.pending_downlink_data = false;
                }
                out.touch(id);
                Ok(())
            }
        }
    }

    pub(crate) fn handle_network_event(&mut self, event: NetworkEvent, out: &mut Outbox) -> ProcedureResult {
        match event {
            NetworkEvent::DownlinkDataNotification { supi, pdu_session_id } => {
                self.handle_downlink_data(&supi, pdu_session_id, out)
            }
            NetworkEvent::SessionReleaseRequired {
                supi,
                pdu_session_id,
                cause,
            } => self.handle_network_session_release(&supi, pdu_session_id, cause, out),
            NetworkEvent::SessionModificationRequired {
                supi,
                pdu_session_id,
                ambr,
            } => self.start_session_modification(&supi, pdu_session_id, ambr, out),
        }
    }
}

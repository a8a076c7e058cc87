//! Service request (TS 24.501 §5.6.1)

use nextgamf_common::{log_nas_message, Direction, STmsi, Tai};
use nextgamf_nas::ies::{Ie5gsMobileIdentity, IePduSessionStatus, MmCause};
use nextgamf_nas::messages::{ServiceAccept, ServiceReject, ServiceRequest as NasServiceRequest};
use nextgamf_nas::SecuredHeader;
use tracing::{debug, info, warn};

use super::mm;
use super::session::session_resource;
use crate::amf::{AmfCore, Outbox, ProcedureResult};
use crate::context::{AmfUeNgapId, ProcedureKind, ReleaseCause};
use crate::ngap::{RanDownlink, UeNgapIds};

impl AmfCore {
    /// Service Request arriving in an Initial UE Message from an idle UE.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn handle_service_request(
        &mut self,
        ran_ue_ngap_id: u32,
        tai: Tai,
        rrc_s_tmsi: Option<STmsi>,
        request: NasServiceRequest,
        header: Option<SecuredHeader>,
        nas_pdu: &[u8],
        out: &mut Outbox,
    ) -> ProcedureResult {
        let Ie5gsMobileIdentity::STmsi(s_tmsi) = request.s_tmsi else {
            warn!(ran_ue_ngap_id, "Service request without 5G-S-TMSI");
            return self.reject_service(ran_ue_ngap_id, MmCause::UeIdentityCannotBeDerived, out);
        };
        if rrc_s_tmsi.is_some_and(|rrc| rrc != s_tmsi) {
            warn!(ran_ue_ngap_id, "5G-S-TMSI differs between RRC and NAS");
            return self.reject_service(ran_ue_ngap_id, MmCause::UeIdentityCannotBeDerived, out);
        }

        let known = self.store.find_by_tmsi(s_tmsi.tmsi).filter(|id| {
            self.store
                .get(*id)
                .and_then(|ue| ue.guti)
                .is_some_and(|guti| guti.s_tmsi() == s_tmsi)
        });
        let Some(id) = known else {
            warn!(ran_ue_ngap_id, tmsi = s_tmsi.tmsi, "No context for the presented 5G-S-TMSI");
            return self.reject_service(ran_ue_ngap_id, MmCause::UeIdentityCannotBeDerived, out);
        };
        if !self.ue(id)?.is_registered() {
            return self.reject_service(ran_ue_ngap_id, MmCause::ImplicitlyDeregistered, out);
        }
        if let Err(e) = self.verify_uplink_count(id, header.as_ref()) {
            warn!(amf_ue_ngap_id = id, "Service request failed the COUNT check: {}", e);
            return self.reject_service(ran_ue_ngap_id, MmCause::UeIdentityCannotBeDerived, out);
        }

        self.rebind_radio(id, ran_ue_ngap_id, tai, out)?;
        log_nas_message(Direction::Rx, id, "ServiceRequest", nas_pdu);
        info!(ue = %self.ue(id)?.display_id(), amf_ue_ngap_id = id, service_type = ?request.service_type, "Service request");
        self.accept_service_request(id, request.uplink_data_status, request.pdu_session_status, true, out)
    }

    /// Service Request from a UE that is already connected.
    pub(crate) fn handle_connected_service_request(
        &mut self,
        id: AmfUeNgapId,
        request: NasServiceRequest,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if !self.ue(id)?.is_registered() {
            self.send_nas(id, mm(ServiceReject::new(MmCause::ImplicitlyDeregistered)), out)?;
            return self.release_context(id, ReleaseCause::Unspecified, out);
        }
        self.accept_service_request(id, request.uplink_data_status, request.pdu_session_status, false, out)
    }

    /// Answers with Service Accept and resumes the user plane of every
    /// session that has data waiting, in either direction.
    fn accept_service_request(
        &mut self,
        id: AmfUeNgapId,
        uplink_data_status: Option<IePduSessionStatus>,
        pdu_session_status: Option<IePduSessionStatus>,
        initial: bool,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if self.finish_procedure(id, ProcedureKind::Paging, out).is_some() {
            debug!(amf_ue_ngap_id = id, "Paging answered");
        }
        if let Some(status) = pdu_session_status {
            let stale: Vec<u8> = self
                .ue(id)?
                .sessions
                .keys()
                .copied()
                .filter(|psi| !status.is_active(*psi))
                .collect();
            for psi in stale {
                info!(amf_ue_ngap_id = id, pdu_session_id = psi, "Session inactive at the UE, releasing");
                self.remove_session(id, psi, out)?;
            }
        }

        let ue = self.ue(id)?;
        let resumed: Vec<_> = ue
            .sessions
            .values()
            .filter(|session| session.is_active())
            .filter(|session| {
                session.pending_downlink_data
                    || uplink_data_status.is_some_and(|status| status.is_active(session.pdu_session_id))
            })
            .map(|session| session_resource(session, None))
            .collect();
        let accept = ServiceAccept {
            pdu_session_status: Some(ue.pdu_session_status()),
            pdu_session_reactivation_result: None,
        };
        debug!(amf_ue_ngap_id = id, resumed = resumed.len(), "Service accepted");

        if initial {
            let ids = self.ngap_ids(id)?;
            let nas_pdu = self.encode_downlink(id, mm(accept))?;
            let ue = self.ue(id)?;
            out.ran(RanDownlink::InitialContextSetupRequest {
                ids,
                guami: self.config.guami,
                allowed_nssai: ue.allowed_nssai.clone(),
                ue_security_capability: ue.ue_security_capability,
                nas_pdu: Some(nas_pdu),
                pdu_sessions: resumed,
            });
        } else {
            self.send_nas(id, mm(accept), out)?;
            if !resumed.is_empty() {
                let ids = self.ngap_ids(id)?;
                out.ran(RanDownlink::PduSessionResourceSetupRequest { ids, sessions: resumed });
            }
        }
        out.touch(id);
        Ok(())
    }

    /// Rejects a service request no context can be found for. The radio
    /// association gets a transient id only to carry the reject.
    fn reject_service(&mut self, ran_ue_ngap_id: u32, cause: MmCause, out: &mut Outbox) -> ProcedureResult {
        let transient = self.store.allocate_amf_ue_ngap_id();
        warn!(ran_ue_ngap_id, amf_ue_ngap_id = transient, ?cause, "Service rejected");
        let ids = UeNgapIds::new(transient, ran_ue_ngap_id);
        let nas_pdu = self.encode_nas(transient, mm(ServiceReject::new(cause)), None)?;
        out.ran(RanDownlink::DownlinkNasTransport { ids, nas_pdu });
        out.ran(RanDownlink::UeContextReleaseCommand {
            ids,
            cause: ReleaseCause::Unspecified,
        });
        Ok(())
    }
}

//! Registration (TS 24.501 §5.5.1)
//!
//! An initial registration resolves the SUPI (from a null-scheme SUCI, through
//! deconcealment, or through identification), authenticates, runs security
//! mode control and finally hands the Registration Accept to the radio node
//! inside an Initial Context Setup. A mobility or periodic update from a UE
//! that still holds a valid key set skips straight to the accept.

use std::sync::Arc;

use nextgamf_common::{Guti, SNssai, Supi};
use nextgamf_nas::ies::{
    GprsTimer, Ie5gsMobileIdentity, Ie5gsRegistrationResult, IeGprsTimer2, IeGprsTimer3, IeNasKeySetIdentifier,
    IeNetworkName, IeNssai, IeTaiList, MmCause, RegistrationType, Suci,
};
use nextgamf_nas::messages::{ConfigurationUpdateCommand, RegistrationAccept, RegistrationReject, RegistrationRequest};
use tracing::{debug, info, warn};

use super::mm;
use crate::amf::{AmfCore, Outbox, ProcedureError, ProcedureResult};
use crate::context::{
    AmfUeNgapId, CmState, MmState, PendingRegistration, ProcedureKind, ReleaseCause, ServicePurpose,
    SupiBinding,
};
use crate::ngap::{RanDownlink, SessionSetupItem};
use crate::services::{DeconcealRequest, ServiceError, ServiceRequest};

impl AmfCore {
    pub(crate) fn handle_registration_request(
        &mut self,
        id: AmfUeNgapId,
        request: RegistrationRequest,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let registration_type = request.registration_type.registration_type;
        let ue = self.ue_mut(id)?;
        ue.registration = Some(PendingRegistration {
            registration_type,
            follow_on_request: request.registration_type.follow_on_request,
            identity_by_guti: matches!(request.mobile_identity, Ie5gsMobileIdentity::Guti(_)),
            requested_nssai: request.requested_nssai.map(|nssai| nssai.0).unwrap_or_default(),
            uplink_data_status: request.uplink_data_status,
            pdu_session_status: request.pdu_session_status,
        });
        if let Some(capability) = &request.ue_security_capability {
            ue.ue_security_capability = Some(capability.into());
        }
        info!(amf_ue_ngap_id = id, ?registration_type, "Registration request");

        match request.mobile_identity {
            Ie5gsMobileIdentity::Suci(suci) => self.register_by_suci(id, suci, out),
            Ie5gsMobileIdentity::Guti(guti) => self.register_by_guti(id, guti, request.ng_ksi, out),
            other => {
                warn!(amf_ue_ngap_id = id, identity = ?other, "Registration with unusable identity");
                self.reject_registration(id, MmCause::InvalidMandatoryInformation, out)
            }
        }
    }

    pub(crate) fn register_by_suci(&mut self, id: AmfUeNgapId, suci: Suci, out: &mut Outbox) -> ProcedureResult {
        if !self.config.is_plmn_allowed(&suci.plmn) {
            return self.reject_registration(id, MmCause::PlmnNotAllowed, out);
        }
        if let Some(supi) = suci.plain_supi() {
            return self.identity_resolved(id, supi, out);
        }
        let Some(concealed) = suci.concealed() else {
            warn!(
                amf_ue_ngap_id = id,
                scheme = suci.protection_scheme,
                "SUCI with unsupported protection scheme"
            );
            return self.reject_registration(id, MmCause::IllegalUe, out);
        };
        let request = DeconcealRequest {
            plmn: suci.plmn,
            protection_scheme: suci.protection_scheme,
            home_network_key_id: suci.home_network_key_id,
            ue_public_key: concealed.ue_public_key.to_vec(),
            ciphertext: concealed.ciphertext.to_vec(),
            mac_tag: concealed.mac_tag.to_vec(),
        };
        self.ue_mut(id)?.mm_state = MmState::IdentificationPending;
        self.request_service(
            id,
            ServicePurpose::Deconcealment,
            |corr| ServiceRequest::Deconceal { corr, request },
            out,
        )
    }

    fn register_by_guti(
        &mut self,
        id: AmfUeNgapId,
        guti: Guti,
        ng_ksi: IeNasKeySetIdentifier,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if !self.config.is_plmn_allowed(&guti.guami.plmn) {
            return self.reject_registration(id, MmCause::PlmnNotAllowed, out);
        }
        let Some(existing) = self.store.find_by_guti(&guti) else {
            debug!(amf_ue_ngap_id = id, %guti, "GUTI not known here");
            return self.start_identification(id, out);
        };

        let registration_type = self
            .ue(id)?
            .registration
            .as_ref()
            .map(|registration| registration.registration_type);
        let known = self.ue(existing)?;
        let is_update = matches!(
            registration_type,
            Some(RegistrationType::MobilityRegistrationUpdating | RegistrationType::PeriodicRegistrationUpdating)
        );
        let same_key_set = !ng_ksi.is_no_key() && known.security.ng_ksi == Some(ng_ksi.ksi);
        if is_update && known.is_registered() && known.security.is_active() && same_key_set {
            return self.registration_update(id, existing, out);
        }
        match known.supi.clone() {
            Some(supi) => self.identity_resolved(id, supi, out),
            None => self.start_identification(id, out),
        }
    }

    /// Accepts an update from a UE whose context and key set are current.
    fn registration_update(&mut self, id: AmfUeNgapId, existing: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        if id != existing {
            let fresh = self.store.remove(id).ok_or(ProcedureError::UnknownContext(id))?;
            let (Some(ran_ue_ngap_id), Some(tai)) = (fresh.ran_ue_ngap_id, fresh.tai) else {
                return Err(ProcedureError::NotConnected(id));
            };
            self.stop_mm_procedures(existing, out);
            self.rebind_radio(existing, ran_ue_ngap_id, tai, out)?;
            let ue = self.ue_mut(existing)?;
            ue.registration = fresh.registration;
            if fresh.ue_security_capability.is_some() {
                ue.ue_security_capability = fresh.ue_security_capability;
            }
        }
        info!(amf_ue_ngap_id = existing, "Registration update accepted without authentication");

        self.reconcile_sessions(existing, out)?;
        let accept = self.build_registration_accept(existing)?;
        let nas_pdu = self.send_nas(existing, mm(accept), out)?;
        self.start_procedure(existing, ProcedureKind::Registration, nas_pdu, out)
    }

    /// Drops sessions the UE no longer reports as active.
    fn reconcile_sessions(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        let ue = self.ue(id)?;
        let Some(status) = ue.registration.as_ref().and_then(|registration| registration.pdu_session_status) else {
            return Ok(());
        };
        let stale: Vec<u8> = ue.sessions.keys().copied().filter(|psi| !status.is_active(*psi)).collect();
        for psi in stale {
            info!(amf_ue_ngap_id = id, pdu_session_id = psi, "Session inactive at the UE, releasing");
            self.remove_session(id, psi, out)?;
        }
        Ok(())
    }

    /// Binds the resolved SUPI to the context and continues with
    /// authentication. Of two contexts of one subscriber the newer survives:
    /// an older holder is released, and so is this context if a newer one
    /// already holds the SUPI.
    pub(crate) fn identity_resolved(&mut self, id: AmfUeNgapId, supi: Supi, out: &mut Outbox) -> ProcedureResult {
        match self.store.bind_supi(id, supi.clone()) {
            None => return Err(ProcedureError::UnknownContext(id)),
            Some(SupiBinding::Bound) => {}
            Some(SupiBinding::Displaced(previous)) => {
                info!(%supi, previous, current = id, "Subscriber moved to a new context");
                self.release_context(previous, ReleaseCause::ImplicitDeregistration, out)?;
            }
            Some(SupiBinding::Superseded(holder)) => {
                info!(%supi, stale = id, current = holder, "Identity resolved for a superseded context");
                return self.release_context(id, ReleaseCause::ImplicitDeregistration, out);
            }
        }
        debug!(amf_ue_ngap_id = id, %supi, "Identity resolved");
        self.start_authentication(id, out)
    }

    pub(crate) fn handle_deconcealed(
        &mut self,
        id: AmfUeNgapId,
        result: Result<Supi, ServiceError>,
        out: &mut Outbox,
    ) -> ProcedureResult {
        match result {
            Ok(supi) => self.identity_resolved(id, supi, out),
            Err(e) => {
                warn!(amf_ue_ngap_id = id, "SUCI deconcealment failed: {}", e);
                self.reject_registration(id, MmCause::IllegalUe, out)
            }
        }
    }

    /// Sends Registration Reject where possible and drops the context.
    pub(crate) fn reject_registration(&mut self, id: AmfUeNgapId, cause: MmCause, out: &mut Outbox) -> ProcedureResult {
        warn!(amf_ue_ngap_id = id, ?cause, "Registration rejected");
        match self.send_nas(id, mm(RegistrationReject::new(cause)), out) {
            Ok(_) | Err(ProcedureError::NotConnected(_)) => {}
            Err(e) => return Err(e),
        }
        self.release_context(id, ReleaseCause::RegistrationFailure, out)
    }

    /// Registration Accept for the context, with a freshly assigned GUTI.
    fn build_registration_accept(&mut self, id: AmfUeNgapId) -> ProcedureResult<RegistrationAccept> {
        let config = Arc::clone(&self.config);
        let guti = self
            .store
            .assign_guti(id, config.guami)
            .ok_or(ProcedureError::UnknownContext(id))?;
        let ue = self.ue_mut(id)?;

        let requested = ue
            .registration
            .as_ref()
            .map(|registration| registration.requested_nssai.as_slice())
            .unwrap_or_default();
        let mut allowed: Vec<SNssai> = requested
            .iter()
            .filter(|s_nssai| config.nssai.contains(s_nssai))
            .copied()
            .collect();
        if allowed.is_empty() {
            allowed = config.nssai.clone();
        }
        ue.allowed_nssai = allowed.clone();

        let mut accept = RegistrationAccept::new(Ie5gsRegistrationResult::three_gpp());
        accept.guti = Some(Ie5gsMobileIdentity::Guti(guti));
        accept.tai_list = Some(IeTaiList(config.tai_list.clone()));
        accept.allowed_nssai = Some(IeNssai(allowed));
        accept.pdu_session_status = Some(ue.pdu_session_status());
        accept.t3512 = Some(IeGprsTimer3::from_secs(u64::from(config.timers.t3512_minutes) * 60));
        accept.t3502 = Some(IeGprsTimer2(GprsTimer::from_minutes(config.timers.t3502_minutes)));
        debug!(amf_ue_ngap_id = id, %guti, "GUTI assigned");
        Ok(accept)
    }

    /// Hands the Registration Accept to the radio node with the UE context.
    pub(crate) fn send_registration_accept(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        let accept = self.build_registration_accept(id)?;
        let ids = self.ngap_ids(id)?;
        let nas_pdu = self.encode_downlink(id, mm(accept))?;

        let ue = self.ue_mut(id)?;
        ue.mm_state = MmState::ContextSetupPending;
        let allowed_nssai = ue.allowed_nssai.clone();
        let ue_security_capability = ue.ue_security_capability;
        out.ran(RanDownlink::InitialContextSetupRequest {
            ids,
            guami: self.config.guami,
            allowed_nssai,
            ue_security_capability,
            nas_pdu: Some(nas_pdu.clone()),
            pdu_sessions: Vec::new(),
        });
        out.touch(id);
        self.start_procedure(id, ProcedureKind::Registration, nas_pdu, out)
    }

    pub(crate) fn handle_registration_complete(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        if self.finish_procedure(id, ProcedureKind::Registration, out).is_none() {
            return self.unexpected(id, "RegistrationComplete", out);
        }
        let ue = self.ue_mut(id)?;
        if ue.mm_state == MmState::ContextSetupPending {
            self.enter_registered(id, out)?;
        } else {
            ue.registration = None;
            out.snapshot(id);
        }

        if let Some(names) = self.config.network_name.clone() {
            let command = ConfigurationUpdateCommand {
                full_network_name: Some(IeNetworkName::new(names.full)),
                short_network_name: Some(IeNetworkName::new(names.short)),
                ..Default::default()
            };
            self.send_nas(id, mm(command), out)?;
        }
        Ok(())
    }

    fn enter_registered(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        ue.mm_state = MmState::Registered;
        ue.cm_state = CmState::Connected;
        ue.registration = None;
        ue.authentication = None;
        ue.release_cause = None;
        info!(ue = %ue.display_id(), amf_ue_ngap_id = id, "UE registered");
        out.snapshot(id);
        Ok(())
    }

    pub(crate) fn handle_initial_context_setup_response(
        &mut self,
        id: AmfUeNgapId,
        pdu_sessions: Vec<SessionSetupItem>,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if self.ue(id)?.mm_state == MmState::ContextSetupPending {
            self.enter_registered(id, out)?;
        }
        for item in pdu_sessions {
            self.session_resource_confirmed(id, item.pdu_session_id, item.gnb_tunnel, out)?;
        }
        Ok(())
    }

    pub(crate) fn handle_initial_context_setup_failure(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        warn!(amf_ue_ngap_id = id, "Initial context setup failed");
        if self.ue(id)?.mm_state == MmState::ContextSetupPending {
            self.release_context(id, ReleaseCause::ContextSetupFailure, out)
        } else {
            self.release_connection(id, ReleaseCause::ContextSetupFailure, out)
        }
    }
}

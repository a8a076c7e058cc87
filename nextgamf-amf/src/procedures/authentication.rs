//! 5G AKA authentication (TS 24.501 §5.4.1.3, TS 33.501 §6.1.3.2)

use nextgamf_common::Supi;
use nextgamf_nas::ies::{IeAbba, IeAutn, IeNasKeySetIdentifier, IeRand, MmCause, SecurityContextType};
use nextgamf_nas::messages::{AuthenticationFailure, AuthenticationReject, AuthenticationRequest, AuthenticationResponse};
use tracing::{debug, info, warn};

use super::mm;
use crate::amf::{AmfCore, Outbox, ProcedureError, ProcedureResult};
use crate::context::{AmfUeNgapId, AuthenticationState, MmState, ProcedureKind, ReleaseCause, ServicePurpose};
use crate::services::{
    serving_network_name, AuthVector, ResyncInfo, ServiceError, ServiceRequest, DIAMETER_TOO_BUSY,
};

/// ngKSI values cycle through 0..=6; 7 means "no key".
const NG_KSI_VALUES: u8 = 7;

impl AmfCore {
    /// Starts 5G AKA under a fresh ngKSI.
    pub(crate) fn start_authentication(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let supi = ue.supi.clone().ok_or(ProcedureError::MissingIdentity(id))?;
        let ng_ksi = ue.security.ng_ksi.map_or(0, |ksi| (ksi + 1) % NG_KSI_VALUES);
        ue.authentication = Some(AuthenticationState {
            ng_ksi,
            ..Default::default()
        });
        ue.mm_state = MmState::AuthenticationPending;
        debug!(amf_ue_ngap_id = id, ng_ksi, "Starting authentication");
        self.fetch_vectors(id, supi, None, out)
    }

    fn fetch_vectors(
        &mut self,
        id: AmfUeNgapId,
        supi: Supi,
        resync: Option<ResyncInfo>,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let serving_network_name = serving_network_name(&self.config.guami.plmn);
        self.request_service(
            id,
            ServicePurpose::AuthenticationVectors,
            |corr| ServiceRequest::AuthenticationInfo {
                corr,
                supi,
                serving_network_name,
                resync,
            },
            out,
        )
    }

    pub(crate) fn handle_authentication_vectors(
        &mut self,
        id: AmfUeNgapId,
        result: Result<Vec<AuthVector>, ServiceError>,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let pending = ue.mm_state == MmState::AuthenticationPending;
        let Some(authentication) = ue.authentication.as_mut().filter(|_| pending) else {
            debug!(amf_ue_ngap_id = id, "Vectors arrived outside authentication");
            return Ok(());
        };

        match result {
            Ok(vectors) if !vectors.is_empty() => {
                debug!(amf_ue_ngap_id = id, count = vectors.len(), "Authentication vectors received");
                authentication.vectors = vectors.into();
                self.send_challenge(id, out)
            }
            Ok(_) => {
                warn!(amf_ue_ngap_id = id, "Vector service returned no vectors");
                self.reject_registration(id, MmCause::Congestion, out)
            }
            Err(ServiceError::Rejected { code }) if code != DIAMETER_TOO_BUSY => {
                warn!(amf_ue_ngap_id = id, code, "Vector fetch rejected");
                self.reject_registration(id, MmCause::FiveGsServicesNotAllowed, out)
            }
            Err(e) => {
                warn!(amf_ue_ngap_id = id, "Vector fetch failed: {}", e);
                self.reject_registration(id, MmCause::Congestion, out)
            }
        }
    }

    /// Challenges the UE with the next stored vector, fetching more when none
    /// is left.
    fn send_challenge(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let Some(authentication) = ue.authentication.as_mut() else {
            return Ok(());
        };
        let ng_ksi = authentication.ng_ksi;
        let Some(vector) = authentication.advance() else {
            let supi = ue.supi.clone().ok_or(ProcedureError::MissingIdentity(id))?;
            debug!(amf_ue_ngap_id = id, "Vectors used up, fetching more");
            return self.fetch_vectors(id, supi, None, out);
        };
        let request = AuthenticationRequest {
            ng_ksi: IeNasKeySetIdentifier::new(SecurityContextType::Native, ng_ksi),
            abba: IeAbba::default(),
            rand: Some(IeRand(vector.rand)),
            autn: Some(IeAutn(vector.autn)),
        };
        let nas_pdu = self.send_nas(id, mm(request), out)?;
        self.start_procedure(id, ProcedureKind::Authentication, nas_pdu, out)
    }

    pub(crate) fn handle_authentication_response(
        &mut self,
        id: AmfUeNgapId,
        response: AuthenticationResponse,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if self.finish_procedure(id, ProcedureKind::Authentication, out).is_none() {
            return self.unexpected(id, "AuthenticationResponse", out);
        }
        let ue = self.ue_mut(id)?;
        let Some((ng_ksi, vector)) = ue
            .authentication
            .as_ref()
            .and_then(|authentication| Some((authentication.ng_ksi, authentication.current.clone()?)))
        else {
            return Ok(());
        };

        let res_star = response.response_parameter.map(|parameter| parameter.0);
        if res_star.as_deref() != Some(vector.xres_star.as_slice()) {
            warn!(amf_ue_ngap_id = id, "RES* does not match XRES*");
            return self.authentication_failed(id, out);
        }
        ue.security.install(ng_ksi, vector.kseaf);
        ue.authentication = None;
        info!(ue = %ue.display_id(), amf_ue_ngap_id = id, ng_ksi, "UE authenticated");
        self.start_security_mode(id, out)
    }

    pub(crate) fn handle_authentication_failure(
        &mut self,
        id: AmfUeNgapId,
        failure: AuthenticationFailure,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if self.finish_procedure(id, ProcedureKind::Authentication, out).is_none() {
            return self.unexpected(id, "AuthenticationFailure", out);
        }
        warn!(amf_ue_ngap_id = id, cause = ?failure.cause, "Authentication failure reported by UE");

        match failure.cause {
            MmCause::SynchFailure => {
                let max_sync_failures = self.config.timers.max_sync_failures;
                let ue = self.ue_mut(id)?;
                let supi = ue.supi.clone();
                let Some(authentication) = ue.authentication.as_mut() else {
                    return Ok(());
                };
                authentication.sync_failures += 1;
                let resync = authentication
                    .current
                    .as_ref()
                    .zip(failure.failure_parameter)
                    .map(|(vector, auts)| ResyncInfo {
                        rand: vector.rand,
                        auts: auts.0,
                    });
                match (resync, supi) {
                    (Some(resync), Some(supi)) if authentication.sync_failures < max_sync_failures => {
                        authentication.vectors.clear();
                        authentication.current = None;
                        info!(amf_ue_ngap_id = id, "Resynchronising authentication");
                        self.fetch_vectors(id, supi, Some(resync), out)
                    }
                    _ => self.reject_authentication(id, out),
                }
            }
            MmCause::NgKsiAlreadyInUse => {
                if let Some(authentication) = self.ue_mut(id)?.authentication.as_mut() {
                    authentication.ng_ksi = (authentication.ng_ksi + 1) % NG_KSI_VALUES;
                }
                self.send_challenge(id, out)
            }
            _ => self.authentication_failed(id, out),
        }
    }

    /// A UE that registered with a GUTI may have been mistaken for another
    /// subscriber; it is asked for its SUCI before giving up.
    fn authentication_failed(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        let ue = self.ue_mut(id)?;
        let by_guti = ue
            .registration
            .as_ref()
            .is_some_and(|registration| registration.identity_by_guti);
        if by_guti {
            ue.authentication = None;
            return self.start_identification(id, out);
        }
        self.reject_authentication(id, out)
    }

    fn reject_authentication(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        warn!(amf_ue_ngap_id = id, "Authentication rejected");
        match self.send_nas(id, mm(AuthenticationReject), out) {
            Ok(_) | Err(ProcedureError::NotConnected(_)) => {}
            Err(e) => return Err(e),
        }
        self.release_context(id, ReleaseCause::RegistrationFailure, out)
    }
}

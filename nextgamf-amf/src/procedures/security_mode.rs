//! NAS security mode control (TS 24.501 §5.4.2)

use nextgamf_nas::ies::{
    IeAbba, IeImeisvRequest, IeNasKeySetIdentifier, IeNasSecurityAlgorithms, Ie5gsMobileIdentity, MmCause,
    SecurityContextType,
};
use nextgamf_nas::messages::{MmMessage, NasMessage, SecurityModeCommand, SecurityModeComplete, SecurityModeReject};
use nextgamf_nas::SecurityHeaderType;
use tracing::{debug, info, warn};

use super::{mm, MAX_NAS_PDU_LEN};
use crate::amf::{AmfCore, Outbox, ProcedureError, ProcedureResult};
use crate::context::{select_algorithms, AmfUeNgapId, MmState, ProcedureKind};
use crate::ngap::RanDownlink;

impl AmfCore {
    /// Activates the key set installed by authentication.
    pub(crate) fn start_security_mode(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        let ue = self.ue(id)?;
        let ng_ksi = ue.security.ng_ksi.ok_or(ProcedureError::MissingIdentity(id))?;
        let Some(capabilities) = ue.ue_security_capability else {
            warn!(amf_ue_ngap_id = id, "No UE security capabilities to run security mode control with");
            return self.reject_registration(id, MmCause::UeSecurityCapabilitiesMismatch, out);
        };
        let Some(selected) = select_algorithms(&self.config.security, &capabilities) else {
            warn!(amf_ue_ngap_id = id, "No NAS algorithm in common with the UE");
            return self.reject_registration(id, MmCause::UeSecurityCapabilitiesMismatch, out);
        };

        let command = SecurityModeCommand {
            selected_algorithms: IeNasSecurityAlgorithms::new(selected.ciphering.code(), selected.integrity.code()),
            ng_ksi: IeNasKeySetIdentifier::new(SecurityContextType::Native, ng_ksi),
            replayed_ue_security_capability: capabilities.to_ie(),
            imeisv_request: Some(IeImeisvRequest { requested: true }),
            abba: Some(IeAbba::default()),
        };
        let ids = self.ngap_ids(id)?;
        let nas_pdu = self.encode_nas(
            id,
            mm(command),
            Some(SecurityHeaderType::IntegrityProtectedWithNewSecurityContext),
        )?;
        let ue = self.ue_mut(id)?;
        ue.security.algorithms = Some(selected);
        ue.mm_state = MmState::SecurityModePending;
        out.ran(RanDownlink::DownlinkNasTransport {
            ids,
            nas_pdu: nas_pdu.clone(),
        });
        debug!(amf_ue_ngap_id = id, ?selected, "Security mode command sent");
        self.start_procedure(id, ProcedureKind::SecurityMode, nas_pdu, out)
    }

    pub(crate) fn handle_security_mode_complete(
        &mut self,
        id: AmfUeNgapId,
        complete: SecurityModeComplete,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if self.finish_procedure(id, ProcedureKind::SecurityMode, out).is_none() {
            return self.unexpected(id, "SecurityModeComplete", out);
        }
        let Some(selected) = self.ue(id)?.security.algorithms else {
            return self.unexpected(id, "SecurityModeComplete", out);
        };
        let ue = self.ue_mut(id)?;
        ue.security.activate(selected);
        if let Some(Ie5gsMobileIdentity::Imeisv(imeisv)) = complete.imeisv {
            ue.pei = Some(imeisv);
        }

        // The replayed initial message supersedes what the cleartext one said
        if let Some(container) = complete.nas_message_container {
            match NasMessage::decode(&container.0, MAX_NAS_PDU_LEN) {
                Ok((NasMessage::Mm(MmMessage::RegistrationRequest(request)), _)) => {
                    if let Some(registration) = ue.registration.as_mut() {
                        if let Some(nssai) = request.requested_nssai {
                            registration.requested_nssai = nssai.0;
                        }
                        registration.uplink_data_status = request.uplink_data_status.or(registration.uplink_data_status);
                        registration.pdu_session_status = request.pdu_session_status.or(registration.pdu_session_status);
                    }
                }
                Ok((other, _)) => debug!(amf_ue_ngap_id = id, message = other.name(), "Replayed message ignored"),
                Err(e) => warn!(amf_ue_ngap_id = id, "Undecodable replayed message: {}", e),
            }
        }
        info!(ue = %ue.display_id(), amf_ue_ngap_id = id, "NAS security activated");
        self.send_registration_accept(id, out)
    }

    pub(crate) fn handle_security_mode_reject(
        &mut self,
        id: AmfUeNgapId,
        reject: SecurityModeReject,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if self.finish_procedure(id, ProcedureKind::SecurityMode, out).is_none() {
            return self.unexpected(id, "SecurityModeReject", out);
        }
        warn!(amf_ue_ngap_id = id, cause = ?reject.cause, "Security mode rejected by UE");
        let cause = match reject.cause {
            MmCause::UeSecurityCapabilitiesMismatch => MmCause::UeSecurityCapabilitiesMismatch,
            _ => MmCause::SecurityModeRejectedUnspecified,
        };
        self.reject_registration(id, cause, out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::context::{SecurityState, UeSecurityCapabilities};
    use crate::timer::TimerId;
    use nextgamf_common::{CipheringAlg, IntegrityAlg, SNssai};
    use nextgamf_nas::ies::{IeNasMessageContainer, IeNssai};
    use nextgamf_nas::messages::{NasPdu, RegistrationReject};

    fn command_pdu(h: &mut Harness) -> (AmfUeNgapId, NasPdu) {
        let id = h.start_registration(IMSI, 1);
        let actions = h.uplink(id, auth_response(1));
        let nas_pdu = match ran_messages(&actions).as_slice() {
            [RanDownlink::DownlinkNasTransport { nas_pdu, .. }] => nas_pdu.clone(),
            other => panic!("expected one DL NAS transport, got {other:?}"),
        };
        (id, NasPdu::decode(&nas_pdu, nas_pdu.len()).unwrap().0)
    }

    #[test]
    fn test_command_offers_preferred_algorithms() {
        let mut h = Harness::new();
        let (id, pdu) = command_pdu(&mut h);

        let header = pdu.security_header().copied().unwrap();
        assert_eq!(
            header.security_header_type,
            SecurityHeaderType::IntegrityProtectedWithNewSecurityContext
        );
        assert_eq!(header.sequence_number, 0);
        let NasMessage::Mm(MmMessage::SecurityModeCommand(command)) = pdu.into_message() else {
            panic!("expected SecurityModeCommand");
        };
        let preferred = &h.core.config().security;
        assert_eq!(command.selected_algorithms.ciphering, preferred.ciphering_order[0].code());
        assert_eq!(command.selected_algorithms.integrity, preferred.integrity_order[0].code());
        assert_eq!(command.ng_ksi.ksi, 0);
        assert_eq!(
            command.replayed_ue_security_capability,
            UeSecurityCapabilities::from_algorithms(&[0, 1, 2], &[1, 2]).to_ie()
        );
        assert_eq!(command.imeisv_request, Some(IeImeisvRequest { requested: true }));
        assert!(h.is_armed(id, TimerId::T3560));
    }

    #[test]
    fn test_complete_activates_and_records_imeisv() {
        let mut h = Harness::new();
        let (id, _) = command_pdu(&mut h);
        let actions = h.uplink(
            id,
            SecurityModeComplete {
                imeisv: Some(Ie5gsMobileIdentity::Imeisv("3534900698733190".into())),
                nas_message_container: None,
            },
        );

        let ue = h.core.context(id).unwrap();
        assert_eq!(ue.security.state, SecurityState::Active);
        assert_eq!(ue.pei.as_deref(), Some("3534900698733190"));
        assert_eq!(ue.mm_state, MmState::ContextSetupPending);
        assert!(matches!(
            ran_messages(&actions).as_slice(),
            [RanDownlink::InitialContextSetupRequest { .. }]
        ));
    }

    #[test]
    fn test_replayed_request_overrides_requested_nssai() {
        let mut h = Harness::new();
        let (id, _) = command_pdu(&mut h);
        let mut replayed = registration_request(IMSI);
        replayed.requested_nssai = Some(IeNssai(vec![SNssai::new(1)]));
        let container = NasMessage::Mm(replayed.into()).encode(MAX_NAS_PDU_LEN).unwrap();
        h.uplink(
            id,
            SecurityModeComplete {
                imeisv: None,
                nas_message_container: Some(IeNasMessageContainer(container)),
            },
        );

        let registration = h.core.context(id).unwrap().registration.clone().unwrap();
        assert_eq!(registration.requested_nssai, vec![SNssai::new(1)]);
    }

    #[test]
    fn test_no_common_algorithm_is_mismatch() {
        let mut config = test_config();
        config.security.ciphering_order = vec![CipheringAlg::Nea2];
        config.security.integrity_order = vec![IntegrityAlg::Nia3];
        let mut h = Harness::with_config(config);
        let id = h.start_registration(IMSI, 1);
        let actions = h.uplink(id, auth_response(1));

        assert!(matches!(
            mm_messages(&actions).as_slice(),
            [MmMessage::RegistrationReject(RegistrationReject {
                cause: MmCause::UeSecurityCapabilitiesMismatch,
                ..
            })]
        ));
        assert!(h.core.context(id).is_none());
    }

    #[test]
    fn test_reject_by_ue_ends_registration() {
        let mut h = Harness::new();
        let (id, _) = command_pdu(&mut h);
        let actions = h.uplink(
            id,
            SecurityModeReject {
                cause: MmCause::SecurityModeRejectedUnspecified,
            },
        );
        assert!(matches!(
            mm_messages(&actions).as_slice(),
            [MmMessage::RegistrationReject(RegistrationReject {
                cause: MmCause::SecurityModeRejectedUnspecified,
                ..
            })]
        ));
        assert!(h.core.store().is_empty());
    }

    #[test]
    fn test_command_retransmitted_unchanged() {
        let mut h = Harness::new();
        let id = h.start_registration(IMSI, 1);
        let first = ran_messages(&h.uplink(id, auth_response(1)));
        let again = ran_messages(&h.expire(id, TimerId::T3560));
        assert_eq!(first, again);
    }
}

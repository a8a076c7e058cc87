//! UE-originating deregistration (TS 24.501 §5.5.2.2) and UE context
//! release (TS 38.413 §8.3)

use nextgamf_common::{log_nas_message, Direction, Tai};
use nextgamf_nas::ies::Ie5gsMobileIdentity;
use nextgamf_nas::messages::{DeregistrationAcceptUeOriginating, DeregistrationRequestUeOriginating};
use tracing::{debug, info, warn};

use super::mm;
use crate::amf::{AmfCore, Outbox, ProcedureResult};
use crate::context::{AmfUeNgapId, MmState, ProcedureKind, ReleaseCause};
use crate::ngap::{RanDownlink, UeNgapIds};

impl AmfCore {
    pub(crate) fn handle_deregistration_request(
        &mut self,
        id: AmfUeNgapId,
        request: DeregistrationRequestUeOriginating,
        out: &mut Outbox,
    ) -> ProcedureResult {
        let switch_off = request.deregistration_type.switch_off;
        let ue = self.ue_mut(id)?;
        ue.mm_state = MmState::Deregistered;
        info!(ue = %ue.display_id(), amf_ue_ngap_id = id, switch_off, "UE deregistering");
        let sessions: Vec<u8> = ue.sessions.keys().copied().collect();

        self.stop_mm_procedures(id, out);
        for psi in sessions {
            self.remove_session(id, psi, out)?;
        }
        if !switch_off {
            self.send_nas(id, mm(DeregistrationAcceptUeOriginating), out)?;
        }
        self.release_connection(id, ReleaseCause::Deregistration, out)
    }

    /// A deregistration arriving from an idle UE in an Initial UE Message.
    pub(crate) fn handle_initial_deregistration(
        &mut self,
        ran_ue_ngap_id: u32,
        tai: Tai,
        request: DeregistrationRequestUeOriginating,
        nas_pdu: &[u8],
        out: &mut Outbox,
    ) -> ProcedureResult {
        let known = match &request.mobile_identity {
            Ie5gsMobileIdentity::Guti(guti) => self.store.find_by_guti(guti),
            _ => None,
        };
        let Some(id) = known else {
            // Nothing to deregister; free the radio side
            let transient = self.store.allocate_amf_ue_ngap_id();
            let ids = UeNgapIds::new(transient, ran_ue_ngap_id);
            debug!(ran_ue_ngap_id, "Deregistration for an unknown UE");
            if !request.deregistration_type.switch_off {
                let nas_pdu = self.encode_nas(transient, mm(DeregistrationAcceptUeOriginating), None)?;
                out.ran(RanDownlink::DownlinkNasTransport { ids, nas_pdu });
            }
            out.ran(RanDownlink::UeContextReleaseCommand {
                ids,
                cause: ReleaseCause::Deregistration,
            });
            return Ok(());
        };

        self.rebind_radio(id, ran_ue_ngap_id, tai, out)?;
        log_nas_message(Direction::Rx, id, "DeregistrationRequestUeOriginating", nas_pdu);
        self.handle_deregistration_request(id, request, out)
    }

    pub(crate) fn handle_ue_context_release_request(
        &mut self,
        id: AmfUeNgapId,
        cause: ReleaseCause,
        out: &mut Outbox,
    ) -> ProcedureResult {
        debug!(amf_ue_ngap_id = id, ?cause, "Radio node requests UE context release");
        if self.ue(id)?.is_registered() {
            self.release_connection(id, cause, out)
        } else {
            self.release_context(id, cause, out)
        }
    }

    /// The radio association is gone. A registered UE stays in CM-IDLE,
    /// anything else is deleted.
    pub(crate) fn handle_ue_context_release_complete(&mut self, ids: UeNgapIds, out: &mut Outbox) -> ProcedureResult {
        let id = ids.amf_ue_ngap_id;
        let Some(ue) = self.store.get(id) else {
            debug!(amf_ue_ngap_id = id, "Release complete for a deleted context");
            return Ok(());
        };
        if ue.ran_ue_ngap_id != Some(ids.ran_ue_ngap_id) {
            debug!(
                amf_ue_ngap_id = id,
                ran_ue_ngap_id = ids.ran_ue_ngap_id,
                "Release complete for a superseded association"
            );
            return Ok(());
        }
        if !ue.is_registered() {
            info!(ue = %ue.display_id(), amf_ue_ngap_id = id, "UE context deleted");
            self.delete_context(id, out);
            return Ok(());
        }

        // Session procedures cannot finish without a radio connection
        let pending: Vec<ProcedureKind> = ue.procedures.kinds().filter(|kind| !kind.is_mobility()).collect();
        for kind in pending {
            match kind {
                ProcedureKind::Release(psi) => self.remove_session(id, psi, out)?,
                ProcedureKind::Modification(psi) => {
                    self.finish_procedure(id, kind, out);
                    if let Some(session) = self.ue_mut(id)?.sessions.get_mut(&psi) {
                        session.pending_ambr = None;
                    }
                }
                _ => {}
            }
        }
        self.stop_mm_procedures(id, out);

        let ue = self.ue_mut(id)?;
        let cause = ue.release_cause.take();
        ue.enter_idle();
        if cause.is_none() {
            warn!(amf_ue_ngap_id = id, "Release completed without a release command");
        }
        info!(ue = %ue.display_id(), amf_ue_ngap_id = id, ?cause, "UE entered CM-IDLE");
        out.snapshot(id);
        Ok(())
    }
}

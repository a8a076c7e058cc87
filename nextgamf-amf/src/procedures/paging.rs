//! Network-triggered paging (TS 23.502 §4.2.3.3)

use nextgamf_common::Supi;
use tracing::{debug, info};

use super::session::session_resource;
use crate::amf::{AmfCore, Outbox, ProcedureError, ProcedureResult};
use crate::context::{AmfUeNgapId, ProcedureKind};
use crate::ngap::RanDownlink;

impl AmfCore {
    /// The user plane holds downlink data for session `psi`.
    pub(crate) fn handle_downlink_data(&mut self, supi: &Supi, psi: u8, out: &mut Outbox) -> ProcedureResult {
        let id = self.id_for_supi(supi)?;
        let ids = self.ngap_ids(id).ok();
        let ue = self.ue_mut(id)?;
        let session = ue
            .sessions
            .get_mut(&psi)
            .filter(|session| session.is_active())
            .ok_or(ProcedureError::UnknownSession(psi))?;

        if let Some(ids) = ids {
            if session.gnb_tunnel.is_some() {
                debug!(amf_ue_ngap_id = id, pdu_session_id = psi, "User plane already up");
                return Ok(());
            }
            out.ran(RanDownlink::PduSessionResourceSetupRequest {
                ids,
                sessions: vec![session_resource(session, None)],
            });
            return Ok(());
        }

        session.pending_downlink_data = true;
        out.touch(id);
        if ue.procedures.contains(ProcedureKind::Paging) {
            debug!(amf_ue_ngap_id = id, pdu_session_id = psi, "Paging already in progress");
            return Ok(());
        }
        let message = self.paging_message(id)?;
        info!(amf_ue_ngap_id = id, pdu_session_id = psi, "Paging UE for downlink data");
        out.ran(message);
        self.start_procedure(id, ProcedureKind::Paging, Vec::new(), out)
    }

    pub(crate) fn paging_message(&self, id: AmfUeNgapId) -> ProcedureResult<RanDownlink> {
        let guti = self.ue(id)?.guti.ok_or(ProcedureError::MissingIdentity(id))?;
        Ok(RanDownlink::Paging {
            s_tmsi: guti.s_tmsi(),
            tai_list: self.config.tai_list.clone(),
        })
    }
}

//! Identification (TS 24.501 §5.4.3)

use nextgamf_nas::ies::{Ie5gsMobileIdentity, IdentityType, MmCause};
use nextgamf_nas::messages::{IdentityRequest, IdentityResponse};
use tracing::{debug, warn};

use super::mm;
use crate::amf::{AmfCore, Outbox, ProcedureResult};
use crate::context::{AmfUeNgapId, MmState, ProcedureKind};

impl AmfCore {
    /// Asks the UE for its SUCI.
    pub(crate) fn start_identification(&mut self, id: AmfUeNgapId, out: &mut Outbox) -> ProcedureResult {
        self.ue_mut(id)?.mm_state = MmState::IdentificationPending;
        let request = IdentityRequest {
            identity_type: IdentityType::Suci,
        };
        let nas_pdu = self.send_nas(id, mm(request), out)?;
        debug!(amf_ue_ngap_id = id, "Identity requested");
        self.start_procedure(id, ProcedureKind::Identification, nas_pdu, out)
    }

    pub(crate) fn handle_identity_response(
        &mut self,
        id: AmfUeNgapId,
        response: IdentityResponse,
        out: &mut Outbox,
    ) -> ProcedureResult {
        if self.finish_procedure(id, ProcedureKind::Identification, out).is_none() {
            return self.unexpected(id, "IdentityResponse", out);
        }
        if let Some(registration) = self.ue_mut(id)?.registration.as_mut() {
            registration.identity_by_guti = false;
        }
        match response.mobile_identity {
            Ie5gsMobileIdentity::Suci(suci) => self.register_by_suci(id, suci, out),
            other => {
                warn!(amf_ue_ngap_id = id, identity = ?other, "Identity response without SUCI");
                self.reject_registration(id, MmCause::InvalidMandatoryInformation, out)
            }
        }
    }
}

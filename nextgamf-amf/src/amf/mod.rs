//! AMF core
//!
//! [`AmfCore`] is the synchronous heart of the AMF: it owns the UE context
//! store and turns one [`AmfEvent`] at a time into a list of [`Action`]s.
//! It performs no I/O. The [`AmfTask`] feeds it messages and timer expiries
//! and carries the actions out, which keeps every procedure testable by
//! driving events and inspecting actions.
//!
//! Events are processed strictly in arrival order, so no two handlers ever
//! touch the same UE context concurrently.

mod task;

pub use task::AmfTask;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use nextgamf_common::{AmfConfig, SnapshotTrigger, Supi};
use nextgamf_nas::ies::SmCause;
use nextgamf_nas::{CodecError, CountError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::{AmfUeNgapId, MmState, SessionAmbr, UeContext, UeContextStore};
use crate::ngap::{RanDownlink, RanUplink};
use crate::persistence::PersistOp;
use crate::services::{ServiceRequest, ServiceResponse};
use crate::timer::{TimerExpiry, TimerId, TimerToken};

/// Core-network triggers that do not come from the radio side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The user plane holds downlink data for a session
    DownlinkDataNotification { supi: Supi, pdu_session_id: u8 },
    /// Session management wants the session released
    SessionReleaseRequired {
        supi: Supi,
        pdu_session_id: u8,
        cause: SmCause,
    },
    /// Session management changed the session AMBR
    SessionModificationRequired {
        supi: Supi,
        pdu_session_id: u8,
        ambr: SessionAmbr,
    },
}

/// Input of [`AmfCore::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmfEvent {
    Ran(RanUplink),
    Service(ServiceResponse),
    TimerExpired(TimerExpiry),
    Network(NetworkEvent),
}

/// Output of [`AmfCore::handle`], carried out by the AMF task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Ran(RanDownlink),
    Service(ServiceRequest),
    StartTimer {
        ue: AmfUeNgapId,
        timer: TimerId,
        token: TimerToken,
        duration: Duration,
    },
    StopTimer {
        ue: AmfUeNgapId,
        timer: TimerId,
    },
    StopAllTimers(AmfUeNgapId),
    Persist(PersistOp),
}

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("no UE context for AMF UE NGAP id {0}")]
    UnknownContext(AmfUeNgapId),
    #[error("UE {0} has no radio association")]
    NotConnected(AmfUeNgapId),
    #[error("{message} not expected in state {state}")]
    UnexpectedMessage { state: MmState, message: &'static str },
    #[error("NAS codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("NAS COUNT error: {0}")]
    Count(#[from] CountError),
    #[error("UE {0} has no SUPI")]
    MissingIdentity(AmfUeNgapId),
    #[error("no PDU session {0}")]
    UnknownSession(u8),
    #[error("no UE context for {0}")]
    UnknownSubscriber(Supi),
}

pub type ProcedureResult<T = ()> = Result<T, ProcedureError>;

/// Actions collected while handling one event, plus the contexts the
/// persistence trigger has to look at afterwards.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    actions: Vec<Action>,
    touched: BTreeSet<AmfUeNgapId>,
    snapshots: BTreeSet<AmfUeNgapId>,
    deleted: Vec<Supi>,
}

impl Outbox {
    pub(crate) fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub(crate) fn ran(&mut self, message: RanDownlink) {
        self.actions.push(Action::Ran(message));
    }

    pub(crate) fn service(&mut self, request: ServiceRequest) {
        self.actions.push(Action::Service(request));
    }

    /// The context changed.
    pub(crate) fn touch(&mut self, id: AmfUeNgapId) {
        self.touched.insert(id);
    }

    /// The context reached a quiescent point worth persisting.
    pub(crate) fn snapshot(&mut self, id: AmfUeNgapId) {
        self.touched.insert(id);
        self.snapshots.insert(id);
    }

    /// The context of `supi` is gone.
    pub(crate) fn deleted(&mut self, supi: Supi) {
        self.deleted.push(supi);
    }
}

/// The AMF signaling engine.
pub struct AmfCore {
    pub(crate) config: Arc<AmfConfig>,
    pub(crate) store: UeContextStore,
    next_token: u64,
}

impl AmfCore {
    pub fn new(config: Arc<AmfConfig>) -> Self {
        Self::with_store(config, UeContextStore::new())
    }

    /// Starts from a restored context store.
    pub fn with_store(config: Arc<AmfConfig>, store: UeContextStore) -> Self {
        Self {
            config,
            store,
            next_token: 1,
        }
    }

    pub fn config(&self) -> &AmfConfig {
        &self.config
    }

    pub fn store(&self) -> &UeContextStore {
        &self.store
    }

    pub fn context(&self, id: AmfUeNgapId) -> Option<&UeContext> {
        self.store.get(id)
    }

    /// Fresh token for a timer arm or a service call.
    pub(crate) fn next_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1).max(1);
        token
    }

    /// Processes one event to completion.
    pub fn handle(&mut self, event: AmfEvent) -> Vec<Action> {
        let mut out = Outbox::default();
        let result = match event {
            AmfEvent::Ran(message) => self.handle_ran(message, &mut out),
            AmfEvent::Service(response) => self.handle_service_response(response, &mut out),
            AmfEvent::TimerExpired(expiry) => self.handle_timer_expiry(expiry, &mut out),
            AmfEvent::Network(event) => self.handle_network_event(event, &mut out),
        };
        match result {
            Ok(()) => {}
            Err(ProcedureError::UnknownContext(id)) => {
                debug!(amf_ue_ngap_id = id, "Event for unknown UE context ignored")
            }
            Err(e) => warn!("Procedure error: {}", e),
        }
        self.finish(out)
    }

    /// Appends the persistence operations the configured trigger asks for.
    fn finish(&self, out: Outbox) -> Vec<Action> {
        let Outbox {
            mut actions,
            touched,
            snapshots,
            deleted,
        } = out;
        let persistence = &self.config.persistence;
        if !persistence.enabled || persistence.trigger == SnapshotTrigger::Never {
            return actions;
        }

        let candidates = match persistence.trigger {
            SnapshotTrigger::OnChange => touched,
            _ => snapshots,
        };
        let mut generators_changed = !deleted.is_empty();
        for supi in deleted {
            // A newer context may have taken the record over already
            if self.store.find_by_supi(&supi).is_none() {
                actions.push(Action::Persist(PersistOp::DeleteUe(supi)));
            }
        }
        for id in candidates {
            let Some(ue) = self.store.get(id) else { continue };
            let Some(supi) = ue.supi.clone() else { continue };
            if persistence.trigger == SnapshotTrigger::OnRegistered && !ue.is_registered() {
                continue;
            }
            actions.push(Action::Persist(PersistOp::SaveUe {
                supi,
                context: Box::new(ue.clone()),
            }));
            generators_changed = true;
        }
        if generators_changed {
            actions.push(Action::Persist(PersistOp::SaveGenerators(self.store.generators().clone())));
        }
        actions
    }
}

//! In-flight procedure records
//!
//! A record exists while the AMF waits for the UE to answer a message it
//! sent. It keeps the encoded message for retransmission and the token of
//! the timer arm guarding it. Outstanding external service calls are kept
//! alongside, keyed by correlation token.

use std::collections::BTreeMap;
use std::fmt;

use super::AmfUeNgapId;
use crate::timer::{TimerId, TimerToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcedureKind {
    /// Registration Accept sent, waiting for Registration Complete
    Registration,
    Authentication,
    SecurityMode,
    Identification,
    /// Network-requested PDU session modification
    Modification(u8),
    /// PDU session release
    Release(u8),
    Paging,
}

impl ProcedureKind {
    /// Timer guarding the procedure's outstanding message.
    pub fn timer(&self) -> TimerId {
        match self {
            ProcedureKind::Registration => TimerId::T3550,
            ProcedureKind::Authentication | ProcedureKind::SecurityMode => TimerId::T3560,
            ProcedureKind::Identification => TimerId::T3570,
            ProcedureKind::Modification(psi) => TimerId::T3591(*psi),
            ProcedureKind::Release(psi) => TimerId::T3592(*psi),
            ProcedureKind::Paging => TimerId::T3513,
        }
    }

    /// 5GMM procedures, as opposed to per-session 5GSM ones.
    pub fn is_mobility(&self) -> bool {
        !matches!(self, ProcedureKind::Modification(_) | ProcedureKind::Release(_))
    }
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureKind::Registration => f.write_str("registration"),
            ProcedureKind::Authentication => f.write_str("authentication"),
            ProcedureKind::SecurityMode => f.write_str("security-mode"),
            ProcedureKind::Identification => f.write_str("identification"),
            ProcedureKind::Modification(psi) => write!(f, "modification[{psi}]"),
            ProcedureKind::Release(psi) => write!(f, "release[{psi}]"),
            ProcedureKind::Paging => f.write_str("paging"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureRecord {
    pub kind: ProcedureKind,
    pub owner: AmfUeNgapId,
    /// Token of the current timer arm
    pub token: TimerToken,
    pub retransmissions: u32,
    /// Repeated UE requests absorbed by this record
    pub duplicates: u32,
    /// Encoded message resent on expiry
    pub last_sent: Vec<u8>,
}

impl ProcedureRecord {
    pub fn new(kind: ProcedureKind, owner: AmfUeNgapId, token: TimerToken, last_sent: Vec<u8>) -> Self {
        Self {
            kind,
            owner,
            token,
            retransmissions: 0,
            duplicates: 0,
            last_sent,
        }
    }
}

/// What an outstanding service call was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePurpose {
    AuthenticationVectors,
    Deconcealment,
    SessionCreate(u8),
    SessionUpdate(u8),
    SessionRelease(u8),
}

/// Procedure records of one UE, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcedureTable {
    records: Vec<ProcedureRecord>,
    awaiting: BTreeMap<u64, ServicePurpose>,
}

impl ProcedureTable {
    /// Installs `record`, returning the record of the same kind it replaces.
    pub fn start(&mut self, record: ProcedureRecord) -> Option<ProcedureRecord> {
        let previous = self.finish(record.kind);
        self.records.push(record);
        previous
    }

    pub fn get(&self, kind: ProcedureKind) -> Option<&ProcedureRecord> {
        self.records.iter().find(|record| record.kind == kind)
    }

    pub fn get_mut(&mut self, kind: ProcedureKind) -> Option<&mut ProcedureRecord> {
        self.records.iter_mut().find(|record| record.kind == kind)
    }

    pub fn contains(&self, kind: ProcedureKind) -> bool {
        self.get(kind).is_some()
    }

    /// Removes the record once its procedure reached an outcome.
    pub fn finish(&mut self, kind: ProcedureKind) -> Option<ProcedureRecord> {
        let index = self.records.iter().position(|record| record.kind == kind)?;
        Some(self.records.remove(index))
    }

    /// Counts a repeated request against the in-flight record.
    pub fn record_duplicate(&mut self, kind: ProcedureKind) -> Option<u32> {
        let record = self.get_mut(kind)?;
        record.duplicates += 1;
        Some(record.duplicates)
    }

    /// The procedure an expiry of `timer` with `token` belongs to, if it is
    /// still the current arm.
    pub fn find_by_timer(&self, timer: TimerId, token: TimerToken) -> Option<ProcedureKind> {
        self.records
            .iter()
            .find(|record| record.kind.timer() == timer && record.token == token)
            .map(|record| record.kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ProcedureKind> + '_ {
        self.records.iter().map(|record| record.kind)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record and outstanding service call.
    pub fn clear(&mut self) -> Vec<ProcedureRecord> {
        self.awaiting.clear();
        std::mem::take(&mut self.records)
    }

    pub fn await_service(&mut self, token: u64, purpose: ServicePurpose) {
        self.awaiting.insert(token, purpose);
    }

    /// Claims the outstanding call answered by `token`.
    pub fn take_service(&mut self, token: u64) -> Option<ServicePurpose> {
        self.awaiting.remove(&token)
    }

    pub fn is_awaiting(&self, purpose: ServicePurpose) -> bool {
        self.awaiting.values().any(|p| *p == purpose)
    }

    /// Forgets outstanding calls for `purpose`; their responses become stale.
    pub fn cancel_service(&mut self, purpose: ServicePurpose) {
        self.awaiting.retain(|_, p| *p != purpose);
    }
}

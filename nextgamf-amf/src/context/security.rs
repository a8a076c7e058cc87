//! 5G NAS security context (TS 33.501 §6.4)

use nextgamf_common::{CipheringAlg, IntegrityAlg, SecurityConfig};
use nextgamf_nas::{CountError, NasCount, NasDirection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::UeSecurityCapabilities;

/// NAS COUNT of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounter {
    pub direction: NasDirection,
    pub count: NasCount,
}

impl SequenceCounter {
    pub fn new(direction: NasDirection) -> Self {
        Self {
            direction,
            count: NasCount::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedAlgorithms {
    pub ciphering: CipheringAlg,
    pub integrity: IntegrityAlg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityState {
    /// No key set
    #[default]
    None,
    /// Key set derived, security mode control not yet completed
    Authenticated,
    /// Security mode control completed
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    pub state: SecurityState,
    /// ngKSI of the key set, `None` when no key set exists
    pub ng_ksi: Option<u8>,
    pub kseaf: Option<[u8; 32]>,
    pub algorithms: Option<SelectedAlgorithms>,
    pub uplink: SequenceCounter,
    pub downlink: SequenceCounter,
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self {
            state: SecurityState::None,
            ng_ksi: None,
            kseaf: None,
            algorithms: None,
            uplink: SequenceCounter::new(NasDirection::Uplink),
            downlink: SequenceCounter::new(NasDirection::Downlink),
        }
    }
}

impl SecurityContext {
    /// Installs a fresh key set. Counters restart since the ngKSI changes.
    pub fn install(&mut self, ng_ksi: u8, kseaf: [u8; 32]) {
        *self = Self {
            state: SecurityState::Authenticated,
            ng_ksi: Some(ng_ksi),
            kseaf: Some(kseaf),
            ..Self::default()
        };
    }

    /// Zeroes the context ahead of re-authentication.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn activate(&mut self, algorithms: SelectedAlgorithms) {
        self.algorithms = Some(algorithms);
        self.state = SecurityState::Active;
    }

    pub fn has_key(&self) -> bool {
        self.state != SecurityState::None
    }

    pub fn is_active(&self) -> bool {
        self.state == SecurityState::Active
    }

    /// Ciphering is in effect unless NEA0 was selected.
    pub fn is_ciphered(&self) -> bool {
        self.algorithms
            .is_some_and(|algs| algs.ciphering != CipheringAlg::Nea0)
    }

    /// Sequence number for the next downlink PDU, advancing the COUNT.
    pub fn next_downlink_sqn(&mut self) -> Result<u8, CountError> {
        let sqn = self.downlink.count.sqn;
        self.downlink.count.increment()?;
        Ok(sqn)
    }

    /// Checks a received sequence number against the uplink COUNT.
    pub fn accept_uplink(&mut self, sqn: u8) -> Result<NasCount, CountError> {
        let estimated = self.uplink.count.estimate(sqn);
        self.uplink.count.accept(estimated)?;
        Ok(estimated)
    }
}

/// Picks the first preferred algorithm of each family that the UE supports.
pub fn select_algorithms(
    config: &SecurityConfig,
    capabilities: &UeSecurityCapabilities,
) -> Option<SelectedAlgorithms> {
    let ciphering = config
        .ciphering_order
        .iter()
        .copied()
        .find(|alg| capabilities.supports_ea(alg.code()))?;
    let integrity = config
        .integrity_order
        .iter()
        .copied()
        .find(|alg| capabilities.supports_ia(alg.code()))?;
    debug!(?ciphering, ?integrity, "Selected NAS security algorithms");
    Some(SelectedAlgorithms { ciphering, integrity })
}

//! Mock collaborator services for integration testing
//!
//! One [`MockServices`] value plays the subscriber database, the SUCI
//! deconcealment function, session management and address allocation. It
//! records every call so scenarios can assert on what the AMF asked for.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use nextgamf_amf::context::{SessionAmbr, TunnelEndpoint};
use nextgamf_amf::services::{
    AddressAllocation, AddressAllocationService, AuthVector, AuthenticationVectorService, Collaborators,
    CreateSessionRequest, DeconcealRequest, DeconcealmentService, ResyncInfo, ServiceError, SessionAllocation,
    SessionService, DIAMETER_ERROR_USER_UNKNOWN, DIAMETER_TOO_BUSY,
};
use nextgamf_common::Supi;
use nextgamf_nas::ies::PduSessionType;
use tokio::sync::Mutex;

use crate::test_fixtures::{test_supi, test_vector, TEST_IMSI, TEST_IMSI_2};

/// Vectors handed out per fetch
const VECTORS_PER_FETCH: u8 = 2;

/// UPF N3 address seen in every session allocation
pub const UPF_ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

/// An authentication vector fetch as the mock saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCall {
    pub supi: Supi,
    pub serving_network_name: String,
    pub resync: Option<ResyncInfo>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Subscribers and the seed of their next vector
    subscribers: HashMap<Supi, u8>,
    /// Fetches still to be answered with "too busy"
    busy_remaining: u32,
    auth_calls: Vec<AuthCall>,
    /// Sessions that exist at session management
    sessions: HashSet<(Supi, u8)>,
    created: Vec<(Supi, u8, String)>,
    updated: Vec<(Supi, u8, TunnelEndpoint)>,
    released: Vec<(Supi, u8)>,
    addresses_released: Vec<(Supi, u8)>,
    create_error: Option<ServiceError>,
}

/// Shared mock of every AMF collaborator
#[derive(Debug, Clone)]
pub struct MockServices {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockServices {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServices {
    /// Mock provisioned with [`TEST_IMSI`] and [`TEST_IMSI_2`].
    pub fn new() -> Self {
        let mut state = MockState::default();
        state.subscribers.insert(test_supi(TEST_IMSI), 1);
        state.subscribers.insert(test_supi(TEST_IMSI_2), 101);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Collaborator set handed to the AMF. All four share this mock.
    pub fn collaborators(&self) -> Collaborators {
        let shared = Arc::new(self.clone());
        Collaborators {
            auth: shared.clone(),
            deconceal: shared.clone(),
            sessions: shared.clone(),
            addresses: shared,
        }
    }

    /// Answers the next `count` vector fetches with "too busy".
    pub async fn set_busy(&self, count: u32) {
        self.state.lock().await.busy_remaining = count;
    }

    /// Makes every session creation fail with `error`.
    pub async fn fail_session_creation(&self, error: ServiceError) {
        self.state.lock().await.create_error = Some(error);
    }

    pub async fn auth_calls(&self) -> Vec<AuthCall> {
        self.state.lock().await.auth_calls.clone()
    }

    pub async fn created_sessions(&self) -> Vec<(Supi, u8, String)> {
        self.state.lock().await.created.clone()
    }

    pub async fn updated_sessions(&self) -> Vec<(Supi, u8, TunnelEndpoint)> {
        self.state.lock().await.updated.clone()
    }

    pub async fn released_sessions(&self) -> Vec<(Supi, u8)> {
        self.state.lock().await.released.clone()
    }

    pub async fn released_addresses(&self) -> Vec<(Supi, u8)> {
        self.state.lock().await.addresses_released.clone()
    }

    /// Sessions that currently exist at session management.
    pub async fn live_sessions(&self, supi: &Supi) -> Vec<u8> {
        let state = self.state.lock().await;
        let mut ids: Vec<u8> = state
            .sessions
            .iter()
            .filter(|(owner, _)| owner == supi)
            .map(|(_, psi)| *psi)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// UE address for session `psi`
pub fn ue_address(psi: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 45, 0, psi + 1)
}

/// UPF tunnel endpoint for session `psi`
pub fn upf_tunnel(psi: u8) -> TunnelEndpoint {
    TunnelEndpoint::new(UPF_ADDRESS, 100 + u32::from(psi))
}

#[async_trait]
impl AuthenticationVectorService for MockServices {
    async fn fetch_vectors(
        &self,
        supi: &Supi,
        serving_network_name: &str,
        resync: Option<ResyncInfo>,
    ) -> Result<Vec<AuthVector>, ServiceError> {
        let mut state = self.state.lock().await;
        state.auth_calls.push(AuthCall {
            supi: supi.clone(),
            serving_network_name: serving_network_name.to_string(),
            resync,
        });
        if state.busy_remaining > 0 {
            state.busy_remaining -= 1;
            return Err(ServiceError::Rejected { code: DIAMETER_TOO_BUSY });
        }
        let Some(seed) = state.subscribers.get_mut(supi) else {
            return Err(ServiceError::Rejected {
                code: DIAMETER_ERROR_USER_UNKNOWN,
            });
        };
        let first = *seed;
        *seed = seed.wrapping_add(VECTORS_PER_FETCH);
        Ok((0..VECTORS_PER_FETCH).map(|i| test_vector(first.wrapping_add(i))).collect())
    }
}

#[async_trait]
impl DeconcealmentService for MockServices {
    async fn deconceal(&self, _request: &DeconcealRequest) -> Result<Supi, ServiceError> {
        Err(ServiceError::Unavailable("no home network keys configured".into()))
    }
}

#[async_trait]
impl SessionService for MockServices {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
        address: &AddressAllocation,
    ) -> Result<SessionAllocation, ServiceError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.create_error.clone() {
            return Err(error);
        }
        state
            .created
            .push((request.supi.clone(), request.pdu_session_id, request.dnn.clone()));
        state.sessions.insert((request.supi.clone(), request.pdu_session_id));
        Ok(SessionAllocation {
            ue_address: address.address,
            upf_tunnel: upf_tunnel(request.pdu_session_id),
            qfi: 9,
            five_qi: 9,
            ambr: address.ambr,
        })
    }

    async fn update_session(
        &self,
        supi: &Supi,
        pdu_session_id: u8,
        gnb_tunnel: TunnelEndpoint,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        if !state.sessions.contains(&(supi.clone(), pdu_session_id)) {
            return Err(ServiceError::Rejected { code: 404 });
        }
        state.updated.push((supi.clone(), pdu_session_id, gnb_tunnel));
        Ok(())
    }

    async fn release_session(&self, supi: &Supi, pdu_session_id: u8) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        state.sessions.remove(&(supi.clone(), pdu_session_id));
        state.released.push((supi.clone(), pdu_session_id));
        Ok(())
    }
}

#[async_trait]
impl AddressAllocationService for MockServices {
    async fn allocate(
        &self,
        _supi: &Supi,
        _dnn: &str,
        pdu_session_id: u8,
        _session_type: PduSessionType,
    ) -> Result<AddressAllocation, ServiceError> {
        Ok(AddressAllocation {
            address: ue_address(pdu_session_id),
            ambr: SessionAmbr::from_kbps(100_000, 200_000),
        })
    }

    async fn release(&self, supi: &Supi, pdu_session_id: u8) -> Result<(), ServiceError> {
        self.state
            .lock()
            .await
            .addresses_released
            .push((supi.clone(), pdu_session_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_busy_then_vectors() {
        let mock = MockServices::new();
        mock.set_busy(1).await;
        let supi = test_supi(TEST_IMSI);

        let first = mock.fetch_vectors(&supi, "5G:mnc001.mcc001.3gppnetwork.org", None).await;
        assert_eq!(first, Err(ServiceError::Rejected { code: DIAMETER_TOO_BUSY }));

        let vectors = mock
            .fetch_vectors(&supi, "5G:mnc001.mcc001.3gppnetwork.org", None)
            .await
            .unwrap();
        assert_eq!(vectors, vec![test_vector(1), test_vector(2)]);
        assert_eq!(mock.auth_calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_subscriber_rejected() {
        let mock = MockServices::new();
        let supi = test_supi(crate::test_fixtures::UNKNOWN_IMSI);
        let result = mock.fetch_vectors(&supi, "snn", None).await;
        assert_eq!(
            result,
            Err(ServiceError::Rejected {
                code: DIAMETER_ERROR_USER_UNKNOWN
            })
        );
    }
}

//! In-process collaborator backends
//!
//! Serve a lab setup without an external subscriber database or session
//! manager: vectors come from the configuration, sessions terminate on one
//! configured user plane address.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nextgamf_common::{AuthVectorConfig, Error, LocalServicesConfig, Supi};
use nextgamf_nas::ies::PduSessionType;
use rand::Rng;
use tracing::{debug, info};

use super::{
    AddressAllocation, AddressAllocationService, AuthVector, AuthenticationVectorService, Collaborators,
    CreateSessionRequest, DeconcealRequest, DeconcealmentService, ResyncInfo, ServiceError, SessionAllocation,
    SessionService, DIAMETER_ERROR_USER_UNKNOWN,
};
use crate::context::{SessionAmbr, SessionContext, TunnelEndpoint};

/// Subscriber database serving configured vectors in order, round robin.
#[derive(Debug, Default)]
pub struct LocalSubscriberDb {
    vectors: Mutex<HashMap<Supi, VecDeque<AuthVector>>>,
}

impl LocalSubscriberDb {
    pub fn new(subscribers: HashMap<Supi, Vec<AuthVector>>) -> Self {
        let vectors = subscribers
            .into_iter()
            .map(|(supi, vectors)| (supi, VecDeque::from(vectors)))
            .collect();
        Self {
            vectors: Mutex::new(vectors),
        }
    }
}

#[async_trait]
impl AuthenticationVectorService for LocalSubscriberDb {
    async fn fetch_vectors(
        &self,
        supi: &Supi,
        serving_network_name: &str,
        resync: Option<ResyncInfo>,
    ) -> Result<Vec<AuthVector>, ServiceError> {
        let mut vectors = self
            .vectors
            .lock()
            .map_err(|_| ServiceError::Unavailable("subscriber db poisoned".into()))?;
        let queue = vectors
            .get_mut(supi)
            .filter(|queue| !queue.is_empty())
            .ok_or(ServiceError::Rejected {
                code: DIAMETER_ERROR_USER_UNKNOWN,
            })?;
        if resync.is_some() {
            debug!(%supi, "Resynchronisation requested, serving next vector");
        }
        let vector = queue.pop_front().ok_or(ServiceError::Rejected {
            code: DIAMETER_ERROR_USER_UNKNOWN,
        })?;
        queue.push_back(vector.clone());
        debug!(%supi, serving_network_name, "Authentication vector served");
        Ok(vec![vector])
    }
}

/// Deconcealer for setups without a home network private key.
#[derive(Debug, Default)]
pub struct LocalDeconcealer;

#[async_trait]
impl DeconcealmentService for LocalDeconcealer {
    async fn deconceal(&self, request: &DeconcealRequest) -> Result<Supi, ServiceError> {
        Err(ServiceError::Unavailable(format!(
            "no home network key {} for protection scheme {}",
            request.home_network_key_id, request.protection_scheme
        )))
    }
}

/// Session service answering with one user plane endpoint.
#[derive(Debug)]
pub struct LocalSessionService {
    upf_address: Ipv4Addr,
    sessions: Mutex<BTreeMap<(Supi, u8), TunnelEndpoint>>,
}

impl LocalSessionService {
    pub fn new(upf_address: Ipv4Addr) -> Self {
        Self {
            upf_address,
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    fn sessions(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<(Supi, u8), TunnelEndpoint>>, ServiceError> {
        self.sessions
            .lock()
            .map_err(|_| ServiceError::Unavailable("session table poisoned".into()))
    }
}

#[async_trait]
impl SessionService for LocalSessionService {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
        address: &AddressAllocation,
    ) -> Result<SessionAllocation, ServiceError> {
        let teid = rand::thread_rng().gen_range(1..=u32::MAX);
        let upf_tunnel = TunnelEndpoint::new(self.upf_address, teid);
        self.sessions()?
            .insert((request.supi.clone(), request.pdu_session_id), upf_tunnel);
        Ok(SessionAllocation {
            ue_address: address.address,
            upf_tunnel,
            qfi: SessionContext::DEFAULT_QFI,
            five_qi: SessionContext::DEFAULT_5QI,
            ambr: address.ambr,
        })
    }

    async fn update_session(
        &self,
        supi: &Supi,
        pdu_session_id: u8,
        gnb_tunnel: TunnelEndpoint,
    ) -> Result<(), ServiceError> {
        if !self.sessions()?.contains_key(&(supi.clone(), pdu_session_id)) {
            return Err(ServiceError::Rejected {
                code: DIAMETER_ERROR_USER_UNKNOWN,
            });
        }
        debug!(%supi, pdu_session_id, gnb = %gnb_tunnel.address, teid = gnb_tunnel.teid, "Downlink tunnel set");
        Ok(())
    }

    async fn release_session(&self, supi: &Supi, pdu_session_id: u8) -> Result<(), ServiceError> {
        self.sessions()?.remove(&(supi.clone(), pdu_session_id));
        Ok(())
    }
}

/// Sequential IPv4 pool.
#[derive(Debug)]
pub struct LocalAddressPool {
    ambr: SessionAmbr,
    state: Mutex<PoolState>,
}

#[derive(Debug)]
struct PoolState {
    next: u32,
    free: Vec<Ipv4Addr>,
    leases: BTreeMap<(Supi, u8), Ipv4Addr>,
}

impl LocalAddressPool {
    pub fn new(start: Ipv4Addr, ambr: SessionAmbr) -> Self {
        Self {
            ambr,
            state: Mutex::new(PoolState {
                next: u32::from(start),
                free: Vec::new(),
                leases: BTreeMap::new(),
            }),
        }
    }
}

#[async_trait]
impl AddressAllocationService for LocalAddressPool {
    async fn allocate(
        &self,
        supi: &Supi,
        dnn: &str,
        pdu_session_id: u8,
        session_type: PduSessionType,
    ) -> Result<AddressAllocation, ServiceError> {
        if session_type != PduSessionType::Ipv4 {
            return Err(ServiceError::Unavailable(format!("no pool for {session_type:?}")));
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| ServiceError::Unavailable("address pool poisoned".into()))?;
        let key = (supi.clone(), pdu_session_id);
        if let Some(address) = state.leases.get(&key) {
            return Ok(AddressAllocation {
                address: *address,
                ambr: self.ambr,
            });
        }
        let address = match state.free.pop() {
            Some(address) => address,
            None => {
                let next = state.next;
                state.next = next
                    .checked_add(1)
                    .ok_or_else(|| ServiceError::Unavailable("address pool exhausted".into()))?;
                Ipv4Addr::from(next)
            }
        };
        state.leases.insert(key, address);
        debug!(%supi, dnn, pdu_session_id, %address, "UE address allocated");
        Ok(AddressAllocation {
            address,
            ambr: self.ambr,
        })
    }

    async fn release(&self, supi: &Supi, pdu_session_id: u8) -> Result<(), ServiceError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ServiceError::Unavailable("address pool poisoned".into()))?;
        if let Some(address) = state.leases.remove(&(supi.clone(), pdu_session_id)) {
            state.free.push(address);
        }
        Ok(())
    }
}

/// Builder for the local backends from configuration.
pub struct LocalServices;

impl LocalServices {
    pub fn from_config(config: &LocalServicesConfig) -> Result<Collaborators, Error> {
        let mut subscribers = HashMap::new();
        for subscriber in &config.subscribers {
            let supi = Supi::from_imsi(subscriber.imsi.clone())
                .ok_or_else(|| Error::Config(format!("invalid subscriber IMSI {}", subscriber.imsi)))?;
            let vectors = subscriber
                .vectors
                .iter()
                .map(parse_vector)
                .collect::<Result<Vec<_>, _>>()?;
            subscribers.insert(supi, vectors);
        }
        info!("Local services: {} subscribers", subscribers.len());

        let ambr = SessionAmbr::from_kbps(config.session_ambr_ul_kbps, config.session_ambr_dl_kbps);
        Ok(Collaborators {
            auth: Arc::new(LocalSubscriberDb::new(subscribers)),
            deconceal: Arc::new(LocalDeconcealer),
            sessions: Arc::new(LocalSessionService::new(config.upf_ipv4)),
            addresses: Arc::new(LocalAddressPool::new(config.ue_ipv4_pool_start, ambr)),
        })
    }
}

fn parse_hex<const N: usize>(field: &str, value: &str) -> Result<[u8; N], Error> {
    let bytes = hex::decode(value).map_err(|e| Error::Config(format!("{field}: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| Error::Config(format!("{field}: expected {N} bytes, got {}", b.len())))
}

fn parse_vector(config: &AuthVectorConfig) -> Result<AuthVector, Error> {
    Ok(AuthVector {
        rand: parse_hex("rand", &config.rand)?,
        autn: parse_hex("autn", &config.autn)?,
        xres_star: hex::decode(&config.xres_star).map_err(|e| Error::Config(format!("xres_star: {e}")))?,
        kseaf: parse_hex("kseaf", &config.kseaf)?,
    })
}

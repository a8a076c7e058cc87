//! AMF configuration
//!
//! Loaded once at startup from YAML and handed to each task by `Arc`.
//! Every group except the GUAMI has defaults so small lab configs stay short.

use std::fmt;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{Guami, Plmn, SNssai, Tai};

/// NAS ciphering algorithm identifiers (TS 33.501).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CipheringAlg {
    Nea0,
    Nea1,
    Nea2,
    Nea3,
}

impl CipheringAlg {
    /// Numeric identifier used on the wire.
    pub fn code(self) -> u8 {
        match self {
            CipheringAlg::Nea0 => 0,
            CipheringAlg::Nea1 => 1,
            CipheringAlg::Nea2 => 2,
            CipheringAlg::Nea3 => 3,
        }
    }
}

/// NAS integrity algorithm identifiers (TS 33.501).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntegrityAlg {
    Nia0,
    Nia1,
    Nia2,
    Nia3,
}

impl IntegrityAlg {
    pub fn code(self) -> u8 {
        match self {
            IntegrityAlg::Nia0 => 0,
            IntegrityAlg::Nia1 => 1,
            IntegrityAlg::Nia2 => 2,
            IntegrityAlg::Nia3 => 3,
        }
    }
}

/// Algorithm preference order used by security mode control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub ciphering_order: Vec<CipheringAlg>,
    pub integrity_order: Vec<IntegrityAlg>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            ciphering_order: vec![CipheringAlg::Nea0, CipheringAlg::Nea1, CipheringAlg::Nea2],
            integrity_order: vec![IntegrityAlg::Nia2, IntegrityAlg::Nia1],
        }
    }
}

/// NAS timer values and retransmission limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NasTimerConfig {
    /// Registration Accept retransmission
    pub t3550_secs: u64,
    /// Authentication / Security Mode Command retransmission
    pub t3560_secs: u64,
    /// Identity Request retransmission
    pub t3570_secs: u64,
    /// PDU Session Modification Command retransmission
    pub t3591_secs: u64,
    /// PDU Session Release Command retransmission
    pub t3592_secs: u64,
    /// Paging
    pub t3513_secs: u64,
    /// Periodic registration timer sent to the UE, in minutes
    pub t3512_minutes: u32,
    /// Registration retry timer sent to the UE, in minutes
    pub t3502_minutes: u32,
    /// Retransmissions before a procedure fails
    pub max_retransmissions: u32,
    pub max_paging_retries: u32,
    /// Synch failures tolerated before authentication is rejected
    pub max_sync_failures: u32,
}

impl Default for NasTimerConfig {
    fn default() -> Self {
        Self {
            t3550_secs: 6,
            t3560_secs: 6,
            t3570_secs: 6,
            t3591_secs: 16,
            t3592_secs: 16,
            t3513_secs: 4,
            t3512_minutes: 54,
            t3502_minutes: 12,
            max_retransmissions: 5,
            max_paging_retries: 4,
            max_sync_failures: 2,
        }
    }
}

/// Retry policy for external collaborator calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Retries when a collaborator answers "too busy"
    pub max_busy_retries: u32,
    pub busy_backoff_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_busy_retries: 3,
            busy_backoff_ms: 100,
            request_timeout_ms: 5000,
        }
    }
}

/// Where subscriber snapshots are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceBackend {
    #[default]
    Memory,
    File,
}

/// When a UE context is snapshotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotTrigger {
    /// When a UE reaches Registered or a session is confirmed active
    #[default]
    OnRegistered,
    /// After every message that touched the context
    OnChange,
    Never,
}

impl fmt::Display for SnapshotTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotTrigger::OnRegistered => write!(f, "on_registered"),
            SnapshotTrigger::OnChange => write!(f, "on_change"),
            SnapshotTrigger::Never => write!(f, "never"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub backend: PersistenceBackend,
    /// Directory for the file backend
    pub directory: PathBuf,
    pub trigger: SnapshotTrigger,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: PersistenceBackend::Memory,
            directory: PathBuf::from("/var/lib/nextgamf"),
            trigger: SnapshotTrigger::OnRegistered,
        }
    }
}

/// Network names sent in the Configuration Update Command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNameConfig {
    pub full: String,
    pub short: String,
}

/// A pre-computed 5G-AKA vector, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthVectorConfig {
    pub rand: String,
    pub autn: String,
    pub xres_star: String,
    pub kseaf: String,
}

/// Subscriber served by the local collaborator backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    pub imsi: String,
    #[serde(default)]
    pub vectors: Vec<AuthVectorConfig>,
}

/// In-process stand-ins for the subscriber database, session manager and
/// address allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalServicesConfig {
    pub subscribers: Vec<SubscriberConfig>,
    pub ue_ipv4_pool_start: Ipv4Addr,
    pub session_ambr_ul_kbps: u64,
    pub session_ambr_dl_kbps: u64,
    /// Tunnel endpoint the user plane is reached at
    pub upf_ipv4: Ipv4Addr,
}

impl Default for LocalServicesConfig {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            ue_ipv4_pool_start: Ipv4Addr::new(10, 45, 0, 2),
            session_ambr_ul_kbps: 100_000,
            session_ambr_dl_kbps: 200_000,
            upf_ipv4: Ipv4Addr::new(127, 0, 0, 8),
        }
    }
}

/// Top-level AMF configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmfConfig {
    /// Served GUAMI, also the prefix of every allocated GUTI
    pub guami: Guami,
    /// Registrations from other PLMNs are rejected
    #[serde(default)]
    pub allowed_plmns: Vec<Plmn>,
    #[serde(default)]
    pub tai_list: Vec<Tai>,
    #[serde(default = "default_nssai")]
    pub nssai: Vec<SNssai>,
    #[serde(default = "default_dnn")]
    pub default_dnn: String,
    /// DNNs accepted in establishment requests; the default DNN is always accepted
    #[serde(default)]
    pub dnns: Vec<String>,
    #[serde(default = "default_max_pdu_sessions")]
    pub max_pdu_sessions: u8,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub timers: NasTimerConfig,
    #[serde(default)]
    pub services: ServiceConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub network_name: Option<NetworkNameConfig>,
    #[serde(default)]
    pub local_services: LocalServicesConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_nssai() -> Vec<SNssai> {
    vec![SNssai::new(1)]
}

fn default_dnn() -> String {
    "internet".to_string()
}

fn default_max_pdu_sessions() -> u8 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

impl AmfConfig {
    /// Minimal configuration serving one PLMN.
    pub fn new(guami: Guami) -> Self {
        Self {
            guami,
            allowed_plmns: vec![guami.plmn],
            tai_list: vec![Tai::new(guami.plmn, 1)],
            nssai: default_nssai(),
            default_dnn: default_dnn(),
            dnns: Vec::new(),
            max_pdu_sessions: default_max_pdu_sessions(),
            security: SecurityConfig::default(),
            timers: NasTimerConfig::default(),
            services: ServiceConfig::default(),
            persistence: PersistenceConfig::default(),
            network_name: None,
            local_services: LocalServicesConfig::default(),
            log_level: default_log_level(),
            channel_capacity: default_channel_capacity(),
        }
    }

    pub fn is_plmn_allowed(&self, plmn: &Plmn) -> bool {
        self.allowed_plmns.contains(plmn)
    }

    pub fn is_dnn_known(&self, dnn: &str) -> bool {
        dnn == self.default_dnn || self.dnns.iter().any(|d| d == dnn)
    }

    /// Rejects configurations the AMF cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.allowed_plmns.is_empty() {
            return Err(Error::Config("allowed_plmns must not be empty".into()));
        }
        if self.security.ciphering_order.is_empty() || self.security.integrity_order.is_empty() {
            return Err(Error::Config(
                "security algorithm preference lists must not be empty".into(),
            ));
        }
        if self.max_pdu_sessions == 0 || self.max_pdu_sessions > 15 {
            return Err(Error::Config("max_pdu_sessions must be within 1..=15".into()));
        }
        if self.timers.max_retransmissions == 0 {
            return Err(Error::Config("timers.max_retransmissions must be non-zero".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be non-zero".into()));
        }
        if self.default_dnn.is_empty() {
            return Err(Error::Config("default_dnn must not be empty".into()));
        }
        Ok(())
    }

    /// Parses a configuration from a YAML string.
    ///
    /// # Example
    /// ```
    /// use nextgamf_common::AmfConfig;
    ///
    /// let yaml = r#"
    /// guami:
    ///   plmn: { mcc: 1, mnc: 1, long_mnc: false }
    ///   amf_region_id: 1
    ///   amf_set_id: 1
    ///   amf_pointer: 0
    /// allowed_plmns:
    ///   - { mcc: 1, mnc: 1, long_mnc: false }
    /// "#;
    ///
    /// let config = AmfConfig::from_yaml(yaml).unwrap();
    /// assert_eq!(config.default_dnn, "internet");
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads and validates a configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_yaml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }
}

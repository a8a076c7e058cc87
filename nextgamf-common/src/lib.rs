//! Common types and utilities for nextgamf
//!
//! Identity types, configuration, and logging shared by the NAS codec and
//! the AMF tasks.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    AmfConfig, AuthVectorConfig, CipheringAlg, IntegrityAlg, LocalServicesConfig,
    NasTimerConfig, NetworkNameConfig, PersistenceBackend, PersistenceConfig, SecurityConfig,
    ServiceConfig, SnapshotTrigger, SubscriberConfig,
};
pub use error::Error;
pub use logging::{init_logging, init_logging_with_filter, log_nas_message, Direction, HexDump, LogLevel};
pub use types::*;

//! Stateless persistence
//!
//! UE contexts are written to an external key/value [`StateStore`] so a
//! restarted AMF can pick up registered subscribers. The AMF core decides
//! *when* to snapshot and emits [`PersistOp`]s; the persistence task applies
//! them in order.
//!
//! Record layout:
//! - `ue:<imsi>`: JSON [`UeContext`] without in-flight procedure state
//! - `amf:generators`: JSON [`Generators`]

mod file;
mod memory;
mod task;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use task::PersistenceTask;

use std::sync::Arc;

use async_trait::async_trait;
use nextgamf_common::{PersistenceBackend, PersistenceConfig, Supi};
use thiserror::Error;
use tracing::{info, warn};

use crate::context::{Generators, UeContext, UeContextStore};

/// Key prefix of UE context records.
pub const UE_KEY_PREFIX: &str = "ue:";
/// Key of the identifier generator record.
pub const GENERATORS_KEY: &str = "amf:generators";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("no record for key {0}")]
    NotFound(String),
}

/// Key/value backend for snapshots.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), PersistenceError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, PersistenceError>;
    async fn delete(&self, key: &str) -> Result<(), PersistenceError>;
    /// Keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, PersistenceError>;
}

/// A write the AMF core asks the persistence task to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOp {
    SaveUe { supi: Supi, context: Box<UeContext> },
    DeleteUe(Supi),
    SaveGenerators(Generators),
}

pub fn ue_key(supi: &Supi) -> String {
    format!("{UE_KEY_PREFIX}{}", supi.imsi())
}

/// Applies one operation to `store`.
pub async fn apply(store: &dyn StateStore, op: &PersistOp) -> Result<(), PersistenceError> {
    match op {
        PersistOp::SaveUe { supi, context } => store.put(&ue_key(supi), serde_json::to_vec(context)?).await,
        PersistOp::DeleteUe(supi) => match store.delete(&ue_key(supi)).await {
            Err(PersistenceError::NotFound(_)) => Ok(()),
            other => other,
        },
        PersistOp::SaveGenerators(generators) => store.put(GENERATORS_KEY, serde_json::to_vec(generators)?).await,
    }
}

/// Outcome of a restore.
#[derive(Debug)]
pub struct RestoreReport {
    pub restored: usize,
    /// Keys that could not be read or parsed
    pub failed: Vec<String>,
    pub store: UeContextStore,
}

/// Rebuilds the context store from `store`.
///
/// A record that cannot be read or parsed is skipped and reported; the rest
/// are still restored.
pub async fn restore(store: &dyn StateStore) -> Result<RestoreReport, PersistenceError> {
    let generators = match store.get(GENERATORS_KEY).await {
        Ok(bytes) => match serde_json::from_slice::<Generators>(&bytes) {
            Ok(generators) => Some(generators),
            Err(e) => {
                warn!("Generator record unreadable, starting fresh: {}", e);
                None
            }
        },
        Err(PersistenceError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let mut contexts = Vec::new();
    let mut failed = Vec::new();
    for key in store.keys(UE_KEY_PREFIX).await? {
        let parsed = match store.get(&key).await {
            Ok(bytes) => serde_json::from_slice::<UeContext>(&bytes).map_err(PersistenceError::from),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(ue) => contexts.push(ue),
            Err(e) => {
                warn!(key = %key, "Skipping UE record: {}", e);
                failed.push(key);
            }
        }
    }

    let restored = contexts.len();
    let store = UeContextStore::from_restored(contexts, generators);
    info!("Restored {} UE contexts ({} failed)", store.len(), failed.len());
    Ok(RestoreReport {
        restored,
        failed,
        store,
    })
}

/// Opens the backend named by the configuration.
pub fn open_store(config: &PersistenceConfig) -> Result<Arc<dyn StateStore>, PersistenceError> {
    match config.backend {
        PersistenceBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        PersistenceBackend::File => Ok(Arc::new(FileStore::open(&config.directory)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nextgamf_common::{Guami, Guti, Plmn};

    fn supi(n: u32) -> Supi {
        Supi::from_imsi(format!("00101{n:010}")).unwrap()
    }

    #[test]
    fn test_ue_key_format() {
        assert_eq!(ue_key(&supi(1)), "ue:001010000000001");
    }

    #[tokio::test]
    async fn test_restore_skips_corrupt_records() {
        let store = MemoryStore::new();
        let mut ue = UeContext::new(3, 1);
        ue.supi = Some(supi(1));
        ue.guti = Some(Guti::new(Guami::new(Plmn::new(1, 1, false), 1, 1, 0), 10));
        apply(
            &store,
            &PersistOp::SaveUe {
                supi: supi(1),
                context: Box::new(ue.clone()),
            },
        )
        .await
        .unwrap();
        store.put("ue:001010000000002", b"{not json".to_vec()).await.unwrap();

        let report = restore(&store).await.unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.failed, vec!["ue:001010000000002".to_string()]);
        assert_eq!(report.store.get(3), Some(&ue));
        assert_eq!(report.store.find_by_tmsi(10), Some(3));
    }

    #[tokio::test]
    async fn test_delete_of_missing_record_is_ok() {
        let store = MemoryStore::new();
        apply(&store, &PersistOp::DeleteUe(supi(4))).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_reads_generators() {
        let store = MemoryStore::new();
        let generators = Generators {
            next_amf_ue_ngap_id: 50,
            next_tmsi: 900,
            ..Generators::default()
        };
        apply(&store, &PersistOp::SaveGenerators(generators)).await.unwrap();

        let mut report = restore(&store).await.unwrap();
        assert_eq!(report.restored, 0);
        assert_eq!(report.store.generators().next_tmsi, 900);
        assert_eq!(report.store.allocate_amf_ue_ngap_id(), 50);
    }
}

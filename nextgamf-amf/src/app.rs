//! AMF application assembly
//!
//! Restores the context store, spawns the four tasks and tracks them in a
//! [`TaskManager`]. The radio side attaches through the NGAP task: uplinks
//! are sent to [`AmfTaskBase::ngap_tx`] and downlinks arrive on the channel
//! given to [`AmfApp::start`]. A radio side that stops reading loses
//! downlinks but never stalls the AMF.

use std::sync::Arc;

use nextgamf_common::AmfConfig;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::amf::{AmfCore, AmfTask};
use crate::context::{UeContext, UeContextStore};
use crate::ngap::{NgapTask, RanDownlink};
use crate::persistence::{restore, PersistenceError, PersistenceTask, StateStore};
use crate::services::{ClientTask, Collaborators};
use crate::tasks::{AmfMessage, AmfTaskBase, PersistenceMessage, TaskError, TaskId, TaskManager, TaskReceivers};

/// How the AMF starts up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOptions {
    /// Rebuild UE contexts from the state store
    pub restore: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self { restore: true }
    }
}

/// A running AMF.
pub struct AmfApp {
    task_manager: TaskManager,
    restored: usize,
}

impl AmfApp {
    pub async fn start(
        config: AmfConfig,
        collaborators: Collaborators,
        state: Arc<dyn StateStore>,
        radio_tx: mpsc::Sender<RanDownlink>,
        options: StartOptions,
    ) -> Result<Self, PersistenceError> {
        let store = if options.restore && config.persistence.enabled {
            let report = restore(state.as_ref()).await?;
            if !report.failed.is_empty() {
                warn!("{} UE records could not be restored", report.failed.len());
            }
            report.store
        } else {
            info!("Starting with an empty UE context store");
            UeContextStore::new()
        };
        let restored = store.len();

        let capacity = config.channel_capacity;
        let (mut task_manager, receivers) = TaskManager::new(config, capacity);
        let TaskReceivers {
            amf_rx,
            ngap,
            client_rx,
            persistence_rx,
        } = receivers;
        let task_base = task_manager.task_base();
        let core = AmfCore::with_store(Arc::clone(&task_base.config), store);

        task_manager.spawn(TaskId::Persistence, PersistenceTask::new(state), persistence_rx);
        task_manager.spawn(
            TaskId::Client,
            ClientTask::new(task_base.clone(), collaborators),
            client_rx,
        );
        task_manager.spawn(TaskId::Amf, AmfTask::new(task_base.clone(), core), amf_rx);
        task_manager.spawn(TaskId::Ngap, NgapTask::new(task_base, radio_tx), ngap);

        info!("AMF tasks spawned, {} UE contexts restored", restored);
        Ok(Self {
            task_manager,
            restored,
        })
    }

    pub fn task_base(&self) -> AmfTaskBase {
        self.task_manager.task_base()
    }

    pub fn task_manager(&self) -> &TaskManager {
        &self.task_manager
    }

    /// Number of UE contexts taken over from the state store.
    pub fn restored(&self) -> usize {
        self.restored
    }

    /// Copies of the UE contexts the AMF task holds right now.
    pub async fn contexts(&self) -> Vec<UeContext> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.task_base().amf_tx.send(AmfMessage::Inspect(reply_tx)).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Waits until the persistence task has written everything queued so far.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .task_base()
            .persistence_tx
            .send(PersistenceMessage::Flush(done_tx))
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }

    pub async fn shutdown(mut self) -> Result<(), TaskError> {
        info!("Initiating graceful shutdown...");
        self.task_manager.shutdown().await
    }
}

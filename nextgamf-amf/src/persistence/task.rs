//! Persistence task: applies snapshot operations in arrival order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{apply, PersistOp, StateStore};
use crate::tasks::{PersistenceMessage, Task, TaskMessage};

pub struct PersistenceTask {
    store: Arc<dyn StateStore>,
    written: u64,
    failed: u64,
}

impl PersistenceTask {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            written: 0,
            failed: 0,
        }
    }

    async fn handle_op(&mut self, op: PersistOp) {
        match apply(self.store.as_ref(), &op).await {
            Ok(()) => {
                self.written += 1;
                match &op {
                    PersistOp::SaveUe { supi, .. } => debug!(%supi, "UE snapshot written"),
                    PersistOp::DeleteUe(supi) => debug!(%supi, "UE record deleted"),
                    PersistOp::SaveGenerators(_) => debug!("Generators written"),
                }
            }
            Err(e) => {
                // The AMF keeps serving from memory; the next snapshot retries
                self.failed += 1;
                warn!("Persistence operation failed: {}", e);
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for PersistenceTask {
    type Inbox = mpsc::UnboundedReceiver<TaskMessage<PersistenceMessage>>;

    async fn run(&mut self, mut rx: Self::Inbox) {
        info!("Persistence task started");

        loop {
            match rx.recv().await {
                Some(TaskMessage::Message(PersistenceMessage::Apply(op))) => self.handle_op(op).await,
                Some(TaskMessage::Message(PersistenceMessage::Flush(done))) => {
                    let _ = done.send(());
                }
                Some(TaskMessage::Shutdown) => {
                    info!("Persistence task received shutdown signal");
                    break;
                }
                None => {
                    info!("Persistence task channel closed");
                    break;
                }
            }
        }

        info!(
            "Persistence task stopped, {} writes ({} failed)",
            self.written, self.failed
        );
    }
}

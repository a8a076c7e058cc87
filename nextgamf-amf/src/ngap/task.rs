//! NGAP Task Implementation
//!
//! Moves typed NGAP messages between the radio side and the AMF task, logging
//! every message and the NAS PDU it carries. Downlinks that find the radio
//! link full are dropped; uplinks wait for room in the AMF inbox.

use nextgamf_common::logging::log_protocol_message;
use nextgamf_common::{log_nas_message, Direction};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use super::{RanDownlink, RanUplink};
use crate::tasks::{AmfMessage, AmfTaskBase, Inbox, NgapInbox, NgapMessage, Task, TaskMessage};

/// NGAP task
pub struct NgapTask {
    /// Task base for inter-task communication
    task_base: AmfTaskBase,
    /// Towards the radio node
    radio_tx: mpsc::Sender<RanDownlink>,
    uplink_count: u64,
    downlink_count: u64,
    dropped_count: u64,
}

impl NgapTask {
    pub fn new(task_base: AmfTaskBase, radio_tx: mpsc::Sender<RanDownlink>) -> Self {
        Self {
            task_base,
            radio_tx,
            uplink_count: 0,
            downlink_count: 0,
            dropped_count: 0,
        }
    }

    async fn handle_uplink(&mut self, message: RanUplink) {
        self.uplink_count += 1;
        // Initial messages carry no AMF id yet
        let ue_id = message.amf_ue_ngap_id().unwrap_or_default();
        log_protocol_message("NGAP", Direction::Rx, ue_id, message.name(), &[]);
        if let Some(pdu) = message.nas_pdu() {
            log_nas_message(Direction::Rx, ue_id, message.name(), pdu);
        }

        if let Err(e) = self.task_base.amf_tx.send(AmfMessage::Ran(message)).await {
            warn!("Failed to forward uplink to AMF task: {}", e);
        }
    }

    fn handle_downlink(&mut self, message: RanDownlink) {
        self.downlink_count += 1;
        let ue_id = message.ids().map(|ids| ids.amf_ue_ngap_id).unwrap_or_default();
        log_protocol_message("NGAP", Direction::Tx, ue_id, message.name(), &[]);
        if let Some(pdu) = message.nas_pdu() {
            log_nas_message(Direction::Tx, ue_id, message.name(), pdu);
        }

        match self.radio_tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                self.dropped_count += 1;
                warn!(amf_ue_ngap_id = ue_id, "Radio link full, dropping {}", message.name());
            }
            Err(TrySendError::Closed(message)) => {
                self.dropped_count += 1;
                warn!(amf_ue_ngap_id = ue_id, "Radio link closed, dropping {}", message.name());
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for NgapTask {
    type Inbox = NgapInbox;

    async fn run(&mut self, mut inbox: NgapInbox) {
        info!("NGAP task started");

        loop {
            match inbox.recv().await {
                Some(TaskMessage::Message(msg)) => match msg {
                    NgapMessage::Uplink(message) => self.handle_uplink(message).await,
                    NgapMessage::Downlink(message) => self.handle_downlink(message),
                },
                Some(TaskMessage::Shutdown) => {
                    info!("NGAP task received shutdown signal");
                    break;
                }
                None => {
                    info!("NGAP task channel closed");
                    break;
                }
            }
        }

        info!(
            "NGAP task stopped, {} uplink / {} downlink messages, {} dropped",
            self.uplink_count, self.downlink_count, self.dropped_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ReleaseCause;
    use crate::ngap::UeNgapIds;
    use nextgamf_common::{AmfConfig, Guami, Plmn};

    fn test_config() -> AmfConfig {
        AmfConfig::new(Guami::new(Plmn::new(1, 1, false), 1, 1, 0))
    }

    #[tokio::test]
    async fn test_ngap_task_routes_both_directions() {
        let (base, mut receivers) = AmfTaskBase::new(test_config(), 16);
        let (radio_tx, mut radio_rx) = mpsc::channel(16);
        let mut task = NgapTask::new(base.clone(), radio_tx);
        let inbox = receivers.ngap;
        let join = tokio::spawn(async move { task.run(inbox).await });

        let ids = UeNgapIds::new(3, 7);
        base.ngap_tx
            .send(RanUplink::UeContextReleaseComplete { ids })
            .await
            .unwrap();
        base.downlink_tx
            .send(RanDownlink::DownlinkNasTransport {
                ids,
                nas_pdu: vec![0x7E, 0x00, 0x56],
            })
            .unwrap();

        match receivers.amf_rx.recv().await {
            Some(TaskMessage::Message(AmfMessage::Ran(RanUplink::UeContextReleaseComplete { ids: got }))) => {
                assert_eq!(got, ids)
            }
            other => panic!("unexpected {other:?}"),
        }
        match radio_rx.recv().await {
            Some(RanDownlink::DownlinkNasTransport { nas_pdu, .. }) => assert_eq!(nas_pdu[2], 0x56),
            other => panic!("unexpected {other:?}"),
        }

        base.ngap_tx.shutdown().await.unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn test_full_radio_link_drops_downlinks() {
        let (base, mut receivers) = AmfTaskBase::new(test_config(), 4);
        // Nobody reads the radio side past its single slot
        let (radio_tx, mut radio_rx) = mpsc::channel(1);
        let mut task = NgapTask::new(base.clone(), radio_tx);
        let inbox = receivers.ngap;
        let join = tokio::spawn(async move { task.run(inbox).await });

        for id in 1..=20 {
            base.downlink_tx
                .send(RanDownlink::UeContextReleaseCommand {
                    ids: UeNgapIds::new(id, id as u32),
                    cause: ReleaseCause::Unspecified,
                })
                .unwrap();
        }
        // Uplinks still flow while the radio link is full
        let ids = UeNgapIds::new(1, 1);
        base.ngap_tx
            .send(RanUplink::UeContextReleaseComplete { ids })
            .await
            .unwrap();
        assert!(matches!(
            receivers.amf_rx.recv().await,
            Some(TaskMessage::Message(AmfMessage::Ran(RanUplink::UeContextReleaseComplete { .. })))
        ));

        base.ngap_tx.shutdown().await.unwrap();
        join.await.unwrap();
        match radio_rx.recv().await {
            Some(RanDownlink::UeContextReleaseCommand { ids, .. }) => assert_eq!(ids.amf_ue_ngap_id, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(radio_rx.recv().await.is_none());
    }
}

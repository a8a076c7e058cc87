//! AMF Task Framework
//!
//! Actor-style task model for the AMF. Each task runs as an independent async
//! task and owns its state; tasks talk to each other only through typed
//! message channels.
//!
//! # Architecture
//!
//! - **AMF Task**: owns the UE context store and every procedure state machine
//! - **NGAP Task**: boundary to the radio side, typed NGAP messages in and out
//! - **Client Task**: calls the external collaborators and posts responses back
//! - **Persistence Task**: writes UE snapshots to the state store
//!
//! Only the queues fed from outside the AMF task are bounded: the AMF inbox
//! and the NGAP uplink queue. Everything the AMF task emits goes through
//! unbounded queues, so the AMF loop never waits on a task that feeds it.
//!
//! Messages from one sender to one queue arrive in send order. A shutdown
//! signal travels behind them, so everything sent before it is handled first.
//! [`TaskManager::shutdown`] stops the tasks one by one in [`SHUTDOWN_ORDER`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use nextgamf_common::AmfConfig;

use crate::amf::NetworkEvent;
use crate::context::UeContext;
use crate::ngap::{RanDownlink, RanUplink};
use crate::persistence::PersistOp;
use crate::services::{ServiceRequest, ServiceResponse};

/// Default channel capacity for task message queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// How long one task may take to stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Radio side first, persistence last: the AMF task's final snapshots are
/// queued before the persistence task sees its shutdown signal.
pub const SHUTDOWN_ORDER: [TaskId; 4] = [TaskId::Ngap, TaskId::Amf, TaskId::Client, TaskId::Persistence];

/// Task message envelope wrapping typed messages with control signals.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular message payload
    Message(T),
    /// Shutdown signal - task should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TaskMessage<U> {
        match self {
            TaskMessage::Message(msg) => TaskMessage::Message(f(msg)),
            TaskMessage::Shutdown => TaskMessage::Shutdown,
        }
    }
}

/// Receive side of a task.
#[async_trait::async_trait]
pub trait Inbox: Send + 'static {
    type Message: Send;

    /// Next message, `None` once every sender is gone.
    async fn recv(&mut self) -> Option<TaskMessage<Self::Message>>;
}

#[async_trait::async_trait]
impl<T: Send + 'static> Inbox for mpsc::Receiver<TaskMessage<T>> {
    type Message = T;

    async fn recv(&mut self) -> Option<TaskMessage<T>> {
        mpsc::Receiver::recv(self).await
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Inbox for mpsc::UnboundedReceiver<TaskMessage<T>> {
    type Message = T;

    async fn recv(&mut self) -> Option<TaskMessage<T>> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

/// Base trait for all AMF tasks.
///
/// A task consumes its inbox until it reads [`TaskMessage::Shutdown`] or the
/// inbox closes.
#[async_trait::async_trait]
pub trait Task: Send + 'static {
    type Inbox: Inbox;

    async fn run(&mut self, inbox: Self::Inbox);
}

/// Messages for the AMF task.
#[derive(Debug)]
pub enum AmfMessage {
    /// Uplink NGAP message forwarded by the NGAP task
    Ran(RanUplink),
    /// Answer of an external collaborator
    Service(ServiceResponse),
    /// Core-network trigger (downlink data, session release/modify)
    Network(NetworkEvent),
    /// Snapshot of every UE context, for status reporting and tests
    Inspect(oneshot::Sender<Vec<UeContext>>),
}

/// Messages for the NGAP task.
#[derive(Debug)]
pub enum NgapMessage {
    /// Received from the radio node, to be handed to the AMF
    Uplink(RanUplink),
    /// Produced by the AMF, to be sent to the radio node
    Downlink(RanDownlink),
}

/// The two NGAP queues: uplinks from the radio node, bounded, and downlinks
/// from the AMF task, unbounded. Pending downlinks are read first. The
/// shutdown signal travels the uplink queue.
pub struct NgapInbox {
    pub uplink_rx: mpsc::Receiver<TaskMessage<RanUplink>>,
    pub downlink_rx: mpsc::UnboundedReceiver<TaskMessage<RanDownlink>>,
}

#[async_trait::async_trait]
impl Inbox for NgapInbox {
    type Message = NgapMessage;

    async fn recv(&mut self) -> Option<TaskMessage<NgapMessage>> {
        tokio::select! {
            biased;
            Some(msg) = self.downlink_rx.recv() => Some(msg.map(NgapMessage::Downlink)),
            Some(msg) = self.uplink_rx.recv() => Some(msg.map(NgapMessage::Uplink)),
            else => None,
        }
    }
}

/// Messages for the persistence task.
#[derive(Debug)]
pub enum PersistenceMessage {
    Apply(PersistOp),
    /// Answered once every earlier operation was written
    Flush(oneshot::Sender<()>),
}

/// Sending side of a task queue.
#[derive(Debug)]
pub struct TaskHandle<T> {
    tx: mpsc::Sender<TaskMessage<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> TaskHandle<T> {
    pub fn new(tx: mpsc::Sender<TaskMessage<T>>) -> Self {
        Self { tx }
    }

    /// Queues `msg`, waiting for room. Fails once the task is gone.
    pub async fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg)).await
    }

    pub async fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Sending side of an unbounded task queue. Sending never waits.
#[derive(Debug)]
pub struct UnboundedTaskHandle<T> {
    tx: mpsc::UnboundedSender<TaskMessage<T>>,
}

impl<T> Clone for UnboundedTaskHandle<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> UnboundedTaskHandle<T> {
    pub fn new(tx: mpsc::UnboundedSender<TaskMessage<T>>) -> Self {
        Self { tx }
    }

    /// Queues `msg`. Fails once the task is gone.
    pub fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg))
    }

    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handles of every AMF task, shared among the tasks.
#[derive(Clone)]
pub struct AmfTaskBase {
    pub config: Arc<AmfConfig>,
    pub amf_tx: TaskHandle<AmfMessage>,
    /// Uplinks from the radio node
    pub ngap_tx: TaskHandle<RanUplink>,
    /// Downlinks from the AMF task
    pub downlink_tx: UnboundedTaskHandle<RanDownlink>,
    pub client_tx: UnboundedTaskHandle<ServiceRequest>,
    pub persistence_tx: UnboundedTaskHandle<PersistenceMessage>,
}

/// Receive sides of the task channels, handed to the tasks at spawn.
pub struct TaskReceivers {
    pub amf_rx: mpsc::Receiver<TaskMessage<AmfMessage>>,
    pub ngap: NgapInbox,
    pub client_rx: mpsc::UnboundedReceiver<TaskMessage<ServiceRequest>>,
    pub persistence_rx: mpsc::UnboundedReceiver<TaskMessage<PersistenceMessage>>,
}

impl AmfTaskBase {
    /// Creates the task channels. `channel_capacity` bounds the AMF inbox and
    /// the NGAP uplink queue.
    pub fn new(config: AmfConfig, channel_capacity: usize) -> (Self, TaskReceivers) {
        let (amf_tx, amf_rx) = mpsc::channel(channel_capacity);
        let (ngap_tx, uplink_rx) = mpsc::channel(channel_capacity);
        let (downlink_tx, downlink_rx) = mpsc::unbounded_channel();
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (persistence_tx, persistence_rx) = mpsc::unbounded_channel();

        let base = Self {
            config: Arc::new(config),
            amf_tx: TaskHandle::new(amf_tx),
            ngap_tx: TaskHandle::new(ngap_tx),
            downlink_tx: UnboundedTaskHandle::new(downlink_tx),
            client_tx: UnboundedTaskHandle::new(client_tx),
            persistence_tx: UnboundedTaskHandle::new(persistence_tx),
        };
        let receivers = TaskReceivers {
            amf_rx,
            ngap: NgapInbox { uplink_rx, downlink_rx },
            client_rx,
            persistence_rx,
        };
        (base, receivers)
    }

    /// Sends the shutdown signal to one task. A task that is already gone
    /// counts as signalled.
    pub async fn signal_shutdown(&self, task_id: TaskId) {
        let sent = match task_id {
            TaskId::Amf => self.amf_tx.shutdown().await.is_ok(),
            TaskId::Ngap => self.ngap_tx.shutdown().await.is_ok(),
            TaskId::Client => self.client_tx.shutdown().is_ok(),
            TaskId::Persistence => self.persistence_tx.shutdown().is_ok(),
        };
        if !sent {
            debug!("{} task queue already closed", task_id);
        }
    }
}

/// Task identifier for the AMF tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    Amf,
    Ngap,
    Client,
    Persistence,
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskId::Amf => write!(f, "AMF"),
            TaskId::Ngap => write!(f, "NGAP"),
            TaskId::Client => write!(f, "Client"),
            TaskId::Persistence => write!(f, "Persistence"),
        }
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Created,
    Running,
    Stopped,
    Failed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Created => write!(f, "Created"),
            TaskState::Running => write!(f, "Running"),
            TaskState::Stopped => write!(f, "Stopped"),
            TaskState::Failed => write!(f, "Failed"),
        }
    }
}

/// A task that did not stop cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("{0} task panicked")]
    Panicked(TaskId),
    #[error("{0} task did not stop within {1:?}")]
    ShutdownTimeout(TaskId, Duration),
}

impl TaskError {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskError::Panicked(id) | TaskError::ShutdownTimeout(id, _) => *id,
        }
    }
}

/// Spawns the AMF tasks and stops them again.
pub struct TaskManager {
    task_base: AmfTaskBase,
    states: HashMap<TaskId, TaskState>,
    join_handles: HashMap<TaskId, JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl TaskManager {
    /// Creates the task channels. The receivers go to [`TaskManager::spawn`].
    pub fn new(config: AmfConfig, channel_capacity: usize) -> (Self, TaskReceivers) {
        let (task_base, receivers) = AmfTaskBase::new(config, channel_capacity);
        let manager = Self {
            task_base,
            states: SHUTDOWN_ORDER.iter().map(|id| (*id, TaskState::Created)).collect(),
            join_handles: HashMap::new(),
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        };
        (manager, receivers)
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Returns a clone of the task base for inter-task communication.
    pub fn task_base(&self) -> AmfTaskBase {
        self.task_base.clone()
    }

    /// Runs `task` on its own tokio task, reading from `inbox`.
    pub fn spawn<T: Task>(&mut self, task_id: TaskId, mut task: T, inbox: T::Inbox) {
        let handle = tokio::spawn(async move { task.run(inbox).await });
        if self.join_handles.insert(task_id, handle).is_some() {
            warn!("{} task spawned twice, the first instance is detached", task_id);
        }
        self.states.insert(task_id, TaskState::Running);
    }

    pub fn state(&self, task_id: TaskId) -> TaskState {
        self.states.get(&task_id).copied().unwrap_or_default()
    }

    pub fn all_tasks_running(&self) -> bool {
        self.states.values().all(|state| *state == TaskState::Running)
    }

    /// Stops every spawned task in [`SHUTDOWN_ORDER`], waiting for each one
    /// before signalling the next. Returns the first failure after all tasks
    /// were dealt with.
    pub async fn shutdown(&mut self) -> Result<(), TaskError> {
        let mut first_error = None;
        for task_id in SHUTDOWN_ORDER {
            let Some(handle) = self.join_handles.remove(&task_id) else {
                continue;
            };
            self.task_base.signal_shutdown(task_id).await;
            let result = match tokio::time::timeout(self.shutdown_timeout, handle).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(TaskError::Panicked(task_id)),
                Err(_) => Err(TaskError::ShutdownTimeout(task_id, self.shutdown_timeout)),
            };
            match result {
                Ok(()) => {
                    debug!("{} task stopped", task_id);
                    self.states.insert(task_id, TaskState::Stopped);
                }
                Err(e) => {
                    warn!("{}", e);
                    self.states.insert(task_id, TaskState::Failed);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::marker::PhantomData;
    use std::sync::Mutex;

    use nextgamf_common::{Guami, Plmn};

    use crate::context::ReleaseCause;
    use crate::ngap::UeNgapIds;

    fn test_config() -> AmfConfig {
        AmfConfig::new(Guami::new(Plmn::new(1, 1, false), 1, 1, 0))
    }

    /// Logs every message and its own stop into a shared log.
    struct Recorder<I> {
        task_id: TaskId,
        log: Arc<Mutex<Vec<String>>>,
        _inbox: PhantomData<fn() -> I>,
    }

    impl<I> Recorder<I> {
        fn new(task_id: TaskId, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                task_id,
                log: Arc::clone(log),
                _inbox: PhantomData,
            }
        }
    }

    #[async_trait::async_trait]
    impl<I: Inbox> Task for Recorder<I> {
        type Inbox = I;

        async fn run(&mut self, mut inbox: I) {
            while let Some(TaskMessage::Message(_)) = inbox.recv().await {
                self.log.lock().unwrap().push(format!("{} message", self.task_id));
            }
            self.log.lock().unwrap().push(format!("{} stopped", self.task_id));
        }
    }

    struct Panicker;

    #[async_trait::async_trait]
    impl Task for Panicker {
        type Inbox = mpsc::UnboundedReceiver<TaskMessage<PersistenceMessage>>;

        async fn run(&mut self, mut rx: Self::Inbox) {
            let _ = rx.recv().await;
            panic!("boom");
        }
    }

    struct Stubborn;

    #[async_trait::async_trait]
    impl Task for Stubborn {
        type Inbox = mpsc::UnboundedReceiver<TaskMessage<ServiceRequest>>;

        async fn run(&mut self, _rx: Self::Inbox) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    #[tokio::test]
    async fn test_task_handle_send() {
        let (tx, mut rx) = mpsc::channel::<TaskMessage<i32>>(10);
        let handle = TaskHandle::new(tx);

        handle.send(42).await.unwrap();
        handle.shutdown().await.unwrap();

        assert!(matches!(rx.recv().await, Some(TaskMessage::Message(42))));
        assert!(matches!(rx.recv().await, Some(TaskMessage::Shutdown)));
    }

    #[tokio::test]
    async fn test_amf_task_base_creation() {
        let (base, receivers) = AmfTaskBase::new(test_config(), DEFAULT_CHANNEL_CAPACITY);
        assert!(!base.amf_tx.is_closed());
        assert!(!base.persistence_tx.is_closed());

        drop(receivers);
        assert!(base.amf_tx.is_closed());
        assert!(base.ngap_tx.is_closed());
        assert!(base.client_tx.is_closed());
        assert!(base.persistence_tx.is_closed());
        // Signalling a closed queue is not an error
        base.signal_shutdown(TaskId::Client).await;
    }

    #[tokio::test]
    async fn test_inter_task_communication() {
        let (base, mut receivers) = AmfTaskBase::new(test_config(), DEFAULT_CHANNEL_CAPACITY);

        let (reply_tx, _reply_rx) = oneshot::channel();
        base.amf_tx.send(AmfMessage::Inspect(reply_tx)).await.unwrap();
        assert!(matches!(
            receivers.amf_rx.recv().await,
            Some(TaskMessage::Message(AmfMessage::Inspect(_)))
        ));

        let (flush_tx, _flush_rx) = oneshot::channel();
        base.persistence_tx.send(PersistenceMessage::Flush(flush_tx)).unwrap();
        assert!(matches!(
            receivers.persistence_rx.recv().await,
            Some(TaskMessage::Message(PersistenceMessage::Flush(_)))
        ));
    }

    #[tokio::test]
    async fn test_unbounded_queues_take_more_than_capacity() {
        let (base, mut receivers) = AmfTaskBase::new(test_config(), 1);
        let ids = UeNgapIds::new(1, 1);
        for _ in 0..10 {
            base.downlink_tx
                .send(RanDownlink::UeContextReleaseCommand {
                    ids,
                    cause: ReleaseCause::Unspecified,
                })
                .unwrap();
        }
        base.ngap_tx.send(RanUplink::UeContextReleaseComplete { ids }).await.unwrap();

        // Downlinks queued first leave first, then the uplink
        for _ in 0..10 {
            assert!(matches!(
                receivers.ngap.recv().await,
                Some(TaskMessage::Message(NgapMessage::Downlink(_)))
            ));
        }
        assert!(matches!(
            receivers.ngap.recv().await,
            Some(TaskMessage::Message(NgapMessage::Uplink(_)))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_follows_order() {
        let (mut manager, receivers) = TaskManager::new(test_config(), DEFAULT_CHANNEL_CAPACITY);
        let log = Arc::new(Mutex::new(Vec::new()));
        manager.spawn(TaskId::Persistence, Recorder::new(TaskId::Persistence, &log), receivers.persistence_rx);
        manager.spawn(TaskId::Client, Recorder::new(TaskId::Client, &log), receivers.client_rx);
        manager.spawn(TaskId::Amf, Recorder::new(TaskId::Amf, &log), receivers.amf_rx);
        manager.spawn(TaskId::Ngap, Recorder::new(TaskId::Ngap, &log), receivers.ngap);
        assert!(manager.all_tasks_running());

        // Queued before the shutdown signal, so handled before it
        let (flush_tx, _flush_rx) = oneshot::channel();
        let base = manager.task_base();
        base.persistence_tx.send(PersistenceMessage::Flush(flush_tx)).unwrap();

        manager.shutdown().await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "Persistence message",
                "NGAP stopped",
                "AMF stopped",
                "Client stopped",
                "Persistence stopped"
            ]
        );
        for task_id in SHUTDOWN_ORDER {
            assert_eq!(manager.state(task_id), TaskState::Stopped);
        }
    }

    #[tokio::test]
    async fn test_panicked_task_reported() {
        let (mut manager, receivers) = TaskManager::new(test_config(), DEFAULT_CHANNEL_CAPACITY);
        manager.spawn(TaskId::Persistence, Panicker, receivers.persistence_rx);

        let result = manager.shutdown().await;
        assert_eq!(result, Err(TaskError::Panicked(TaskId::Persistence)));
        assert_eq!(manager.state(TaskId::Persistence), TaskState::Failed);
        // Tasks never spawned stay untouched
        assert_eq!(manager.state(TaskId::Amf), TaskState::Created);
    }

    #[tokio::test]
    async fn test_stuck_task_times_out() {
        let (manager, receivers) = TaskManager::new(test_config(), DEFAULT_CHANNEL_CAPACITY);
        let mut manager = manager.with_shutdown_timeout(Duration::from_millis(50));
        manager.spawn(TaskId::Client, Stubborn, receivers.client_rx);
        assert!(!manager.all_tasks_running());

        let error = manager.shutdown().await.unwrap_err();
        assert_eq!(error.task_id(), TaskId::Client);
        assert_eq!(error.to_string(), "Client task did not stop within 50ms");
    }
}

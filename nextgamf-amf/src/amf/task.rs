//! AMF Task Implementation
//!
//! Runs [`AmfCore`] inside the task framework: messages from the other tasks
//! and timer expiries become [`AmfEvent`]s, and the resulting [`Action`]s
//! are routed to the NGAP, client and persistence tasks. Those queues are
//! unbounded: the loop only ever waits on its own inbox and the timer tick.

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{Action, AmfCore, AmfEvent};
use crate::tasks::{AmfMessage, AmfTaskBase, PersistenceMessage, Task, TaskMessage};
use crate::timer::{TimerManager, TIMER_TICK};

/// AMF task
pub struct AmfTask {
    /// Task base for inter-task communication
    task_base: AmfTaskBase,
    core: AmfCore,
    timers: TimerManager,
    events: u64,
}

impl AmfTask {
    pub fn new(task_base: AmfTaskBase, core: AmfCore) -> Self {
        Self {
            task_base,
            core,
            timers: TimerManager::new(),
            events: 0,
        }
    }

    fn handle_message(&mut self, message: AmfMessage) {
        let event = match message {
            AmfMessage::Ran(message) => AmfEvent::Ran(message),
            AmfMessage::Service(response) => AmfEvent::Service(response),
            AmfMessage::Network(event) => AmfEvent::Network(event),
            AmfMessage::Inspect(reply) => {
                let contexts = self.core.store().iter().cloned().collect();
                let _ = reply.send(contexts);
                return;
            }
        };
        self.process(event);
    }

    fn process(&mut self, event: AmfEvent) {
        self.events += 1;
        let actions = self.core.handle(event);
        for action in actions {
            self.apply(action);
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Ran(message) => {
                if let Err(e) = self.task_base.downlink_tx.send(message) {
                    warn!("Failed to send downlink to NGAP task: {}", e);
                }
            }
            Action::Service(request) => {
                if let Err(e) = self.task_base.client_tx.send(request) {
                    warn!("Failed to send service request to client task: {}", e);
                }
            }
            Action::StartTimer {
                ue,
                timer,
                token,
                duration,
            } => {
                debug!(amf_ue_ngap_id = ue, %timer, %token, "Timer started");
                self.timers.start(ue, timer, token, duration, Instant::now());
            }
            Action::StopTimer { ue, timer } => {
                self.timers.stop(ue, timer);
            }
            Action::StopAllTimers(ue) => {
                self.timers.stop_all(ue);
            }
            Action::Persist(op) => {
                if let Err(e) = self.task_base.persistence_tx.send(PersistenceMessage::Apply(op)) {
                    warn!("Failed to send snapshot to persistence task: {}", e);
                }
            }
        }
    }

    fn handle_tick(&mut self) {
        for expiry in self.timers.perform_tick(Instant::now()) {
            debug!(amf_ue_ngap_id = expiry.ue, timer = %expiry.timer, "Timer expired");
            self.process(AmfEvent::TimerExpired(expiry));
        }
    }
}

#[async_trait::async_trait]
impl Task for AmfTask {
    type Inbox = mpsc::Receiver<TaskMessage<AmfMessage>>;

    async fn run(&mut self, mut rx: Self::Inbox) {
        info!("AMF task started with {} UE contexts", self.core.store().len());
        let mut tick = interval(TIMER_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    match msg {
                        TaskMessage::Message(message) => self.handle_message(message),
                        TaskMessage::Shutdown => {
                            info!("AMF task received shutdown signal");
                            break;
                        }
                    }
                }
                _ = tick.tick() => self.handle_tick(),
                else => {
                    info!("AMF task channel closed");
                    break;
                }
            }
        }

        info!(
            "AMF task stopped, {} events handled, {} UE contexts held",
            self.events,
            self.core.store().len()
        );
    }
}

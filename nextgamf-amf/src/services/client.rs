//! Collaborator client task
//!
//! Runs every [`ServiceRequest`] the AMF emits on its own tokio task, so a
//! slow collaborator never blocks the AMF queue, and posts the
//! [`ServiceResponse`] back as an [`AmfMessage::Service`].

use std::future::Future;
use std::time::Duration;

use nextgamf_common::ServiceConfig;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{AddressAllocation, Collaborators, ServiceError, ServiceRequest, ServiceResponse, ServiceResult};
use crate::tasks::{AmfMessage, AmfTaskBase, Task, TaskMessage};

/// Bounds applied to each collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_busy_retries: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl From<&ServiceConfig> for RetryPolicy {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            max_busy_retries: config.max_busy_retries,
            backoff: Duration::from_millis(config.busy_backoff_ms),
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

/// Runs `call`, repeating it while the collaborator answers "too busy".
///
/// Each attempt is bounded by the policy timeout; the backoff doubles after
/// every busy answer.
pub async fn call_with_busy_retry<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut backoff = policy.backoff;
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout),
        };
        match result {
            Err(e) if e.is_retriable() && attempt < policy.max_busy_retries => {
                attempt += 1;
                debug!(attempt, backoff_ms = backoff.as_millis() as u64, "Collaborator busy, retrying");
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            other => return other,
        }
    }
}

/// Performs one request against the collaborators.
pub async fn execute(collaborators: &Collaborators, policy: &RetryPolicy, request: ServiceRequest) -> ServiceResponse {
    let corr = request.corr();
    let result = match request {
        ServiceRequest::AuthenticationInfo {
            supi,
            serving_network_name,
            resync,
            ..
        } => {
            let result = call_with_busy_retry(policy, || {
                collaborators.auth.fetch_vectors(&supi, &serving_network_name, resync)
            })
            .await;
            ServiceResult::AuthenticationInfo(result)
        }
        ServiceRequest::Deconceal { request, .. } => {
            let result = call_with_busy_retry(policy, || collaborators.deconceal.deconceal(&request)).await;
            ServiceResult::Deconcealed(result)
        }
        ServiceRequest::CreateSession { request, .. } => {
            let pdu_session_id = request.pdu_session_id;
            let address: Result<AddressAllocation, ServiceError> = call_with_busy_retry(policy, || {
                collaborators.addresses.allocate(
                    &request.supi,
                    &request.dnn,
                    request.pdu_session_id,
                    request.session_type,
                )
            })
            .await;
            let result = match address {
                Ok(address) => {
                    let created =
                        call_with_busy_retry(policy, || collaborators.sessions.create_session(&request, &address))
                            .await;
                    if created.is_err() {
                        // Hand the address back, the session never came up
                        if let Err(e) = collaborators.addresses.release(&request.supi, pdu_session_id).await {
                            warn!(supi = %request.supi, pdu_session_id, "Address release failed: {}", e);
                        }
                    }
                    created
                }
                Err(e) => Err(e),
            };
            ServiceResult::SessionCreated { pdu_session_id, result }
        }
        ServiceRequest::UpdateSession {
            supi,
            pdu_session_id,
            gnb_tunnel,
            ..
        } => {
            let result = call_with_busy_retry(policy, || {
                collaborators.sessions.update_session(&supi, pdu_session_id, gnb_tunnel)
            })
            .await;
            ServiceResult::SessionUpdated { pdu_session_id, result }
        }
        ServiceRequest::ReleaseSession { supi, pdu_session_id, .. } => {
            let result =
                call_with_busy_retry(policy, || collaborators.sessions.release_session(&supi, pdu_session_id)).await;
            if let Err(e) = collaborators.addresses.release(&supi, pdu_session_id).await {
                warn!(%supi, pdu_session_id, "Address release failed: {}", e);
            }
            ServiceResult::SessionReleased { pdu_session_id, result }
        }
    };
    ServiceResponse { corr, result }
}

/// Client task forwarding AMF requests to the collaborators.
pub struct ClientTask {
    task_base: AmfTaskBase,
    collaborators: Collaborators,
    policy: RetryPolicy,
    requests: u64,
}

impl ClientTask {
    pub fn new(task_base: AmfTaskBase, collaborators: Collaborators) -> Self {
        let policy = RetryPolicy::from(&task_base.config.services);
        Self {
            task_base,
            collaborators,
            policy,
            requests: 0,
        }
    }

    fn dispatch(&mut self, request: ServiceRequest) {
        self.requests += 1;
        debug!(
            ue = request.corr().ue,
            token = request.corr().token,
            "Service request {}",
            request.name()
        );
        let collaborators = self.collaborators.clone();
        let policy = self.policy;
        let amf_tx = self.task_base.amf_tx.clone();
        tokio::spawn(async move {
            let response = execute(&collaborators, &policy, request).await;
            if let Err(e) = amf_tx.send(AmfMessage::Service(response)).await {
                warn!("Failed to deliver service response to AMF: {}", e);
            }
        });
    }
}

#[async_trait::async_trait]
impl Task for ClientTask {
    type Inbox = mpsc::UnboundedReceiver<TaskMessage<ServiceRequest>>;

    async fn run(&mut self, mut rx: Self::Inbox) {
        info!("Client task started");

        loop {
            match rx.recv().await {
                Some(TaskMessage::Message(request)) => self.dispatch(request),
                Some(TaskMessage::Shutdown) => {
                    info!("Client task received shutdown signal");
                    break;
                }
                None => {
                    info!("Client task channel closed");
                    break;
                }
            }
        }

        info!("Client task stopped, {} requests dispatched", self.requests);
    }
}

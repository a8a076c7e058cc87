//! Logging and polling helpers shared by the scenario files

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing_subscriber::{fmt, EnvFilter};

/// Result type for integration tests
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Upper bound for anything a scenario waits on. Longer than the 1 s NAS
/// timers of the test configuration times their retransmission limit.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Routes `tracing` output through the test harness. `RUST_LOG` overrides
/// the default of AMF debug logs over info for everything else.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nextgamf_amf=debug"));
    // Several tests in one binary race to install the subscriber
    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// Polls `condition` every `poll_interval` until it holds, giving up after
/// `limit`. The condition is always checked at least once.
pub async fn wait_for_condition<F, Fut>(mut condition: F, limit: Duration, poll_interval: Duration) -> TestResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + limit;
    loop {
        if condition().await {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(format!("condition not met within {limit:?}").into());
        }
        sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_for_condition_polls_until_true() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);

        wait_for_condition(
            || {
                let counter = Arc::clone(&counter);
                async move { counter.fetch_add(1, Ordering::SeqCst) >= 3 }
            },
            Duration::from_secs(1),
            Duration::from_millis(5),
        )
        .await
        .expect("condition never held");

        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_wait_for_condition_timeout() {
        let error = wait_for_condition(|| async { false }, Duration::from_millis(50), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "condition not met within 50ms");
    }

    #[tokio::test]
    async fn test_zero_limit_still_checks_once() {
        assert!(wait_for_condition(|| async { true }, Duration::ZERO, DEFAULT_POLL_INTERVAL)
            .await
            .is_ok());
    }
}

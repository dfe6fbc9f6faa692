//! Retry policy for model calls.
//!
//! Failures are classified by [`classify`]: rate limits cool down for a
//! growing interval, permission problems give up at once, and everything
//! else retries immediately until attempts run out.
use autofy_common::{AutofyError, Result};
use autofy_config::RetryConfig;
use autofy_llm::traits::LlmError;
use autofy_runtime::{Cancellation, sleep_or_cancel};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited,
    PermissionDenied,
    Parse,
    Other,
}

/// Classify a provider failure. Typed variants win; otherwise the message
/// is searched for the markers providers put in quota and auth errors.
pub fn classify(err: &LlmError) -> FailureClass {
    match err {
        LlmError::RateLimited(_) => return FailureClass::RateLimited,
        LlmError::PermissionDenied(_) => return FailureClass::PermissionDenied,
        LlmError::Parse(_) => return FailureClass::Parse,
        LlmError::Api { status: 429, .. } => return FailureClass::RateLimited,
        LlmError::Api {
            status: 401 | 403, ..
        } => return FailureClass::PermissionDenied,
        _ => {}
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if msg.contains("429") || msg.contains("RESOURCE_EXHAUSTED") || lower.contains("rate limit") {
        FailureClass::RateLimited
    } else if msg.contains("PERMISSION_DENIED") || lower.contains("invalid api key") {
        FailureClass::PermissionDenied
    } else {
        FailureClass::Other
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    /// Multiplied by the 1-based attempt number.
    pub rate_limit_cooldown: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            rate_limit_cooldown: Duration::from_secs(config.rate_limit_cooldown_secs),
        }
    }

    pub fn cooldown(&self, attempt: usize) -> Duration {
        self.rate_limit_cooldown.saturating_mul(attempt as u32)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `op` under `policy`. `Ok(None)` means the call gave up; the only
/// error is [`AutofyError::Cancelled`].
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &Cancellation,
    label: &str,
    mut op: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, LlmError>>,
{
    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(AutofyError::Cancelled);
        }
        let err = match op().await {
            Ok(value) => return Ok(Some(value)),
            Err(e) => e,
        };

        match classify(&err) {
            FailureClass::PermissionDenied => {
                error!(
                    target: "agent.retry",
                    call = label,
                    error = %err,
                    "permission denied; check the API key. Giving up"
                );
                return Ok(None);
            }
            FailureClass::RateLimited => {
                if attempt == policy.max_attempts {
                    warn!(target: "agent.retry", call = label, error = %err, "rate limited on final attempt");
                    break;
                }
                let wait = policy.cooldown(attempt);
                warn!(
                    target: "agent.retry",
                    call = label,
                    attempt,
                    cooldown_secs = wait.as_secs(),
                    "rate limit hit, cooling down"
                );
                if !sleep_or_cancel(wait, cancel).await {
                    return Err(AutofyError::Cancelled);
                }
            }
            FailureClass::Parse => {
                info!(target: "agent.retry", call = label, attempt, error = %err, "unparseable reply, retrying");
            }
            FailureClass::Other => {
                warn!(target: "agent.retry", call = label, attempt, error = %err, "model call failed, retrying");
            }
        }
    }

    error!(target: "agent.retry", call = label, attempts = policy.max_attempts, "max retries exceeded");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            rate_limit_cooldown: Duration::from_secs(30),
        }
    }

    #[test]
    fn classifies_by_variant_and_message() {
        assert_eq!(classify(&LlmError::RateLimited("x".into())), FailureClass::RateLimited);
        assert_eq!(
            classify(&LlmError::Api {
                status: 500,
                message: "RESOURCE_EXHAUSTED: quota".into()
            }),
            FailureClass::RateLimited
        );
        assert_eq!(
            classify(&LlmError::Network("Rate limit reached for requests".into())),
            FailureClass::RateLimited
        );
        assert_eq!(
            classify(&LlmError::Api {
                status: 400,
                message: "API key not valid. Invalid API key".into()
            }),
            FailureClass::PermissionDenied
        );
        assert_eq!(classify(&LlmError::PermissionDenied("x".into())), FailureClass::PermissionDenied);
        assert_eq!(classify(&LlmError::Parse("x".into())), FailureClass::Parse);
        assert_eq!(classify(&LlmError::Network("reset".into())), FailureClass::Other);
    }

    #[test]
    fn cooldown_grows_with_attempts() {
        let p = policy();
        assert_eq!(p.cooldown(1), Duration::from_secs(30));
        assert_eq!(p.cooldown(3), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_cool_down_then_succeed() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();
        let out = call_with_retry(&policy(), &Cancellation::new(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LlmError::RateLimited("429".into()))
            } else {
                Ok("done")
            }
        })
        .await
        .unwrap();

        assert_eq!(out, Some("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 30s after the first failure, 60s after the second.
        assert!(start.elapsed() >= Duration::from_secs(90));
    }

    #[tokio::test]
    async fn permission_denied_gives_up_immediately() {
        let calls = AtomicUsize::new(0);
        let out: Option<()> = call_with_retry(&policy(), &Cancellation::new(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::PermissionDenied("403".into()))
        })
        .await
        .unwrap();

        assert_eq!(out, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_errors_exhaust_attempts() {
        let calls = AtomicUsize::new(0);
        let out: Option<()> = call_with_retry(&policy(), &Cancellation::new(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Parse("not json".into()))
        })
        .await
        .unwrap();

        assert_eq!(out, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_interrupts_cooldown() {
        let cancel = Cancellation::new();
        let trigger = cancel.clone();
        let handle = tokio::spawn(async move {
            call_with_retry(&policy(), &cancel, "test", || async {
                Err::<(), _>(LlmError::RateLimited("429".into()))
            })
            .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();

        let res = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("retry loop should stop promptly")
            .unwrap();
        assert!(matches!(res, Err(AutofyError::Cancelled)));
    }
}

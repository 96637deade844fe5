//! Resilient invocation of remote operations
//!
//! Wraps an async operation with a per-attempt timeout, a bounded number of
//! retries separated by a fixed delay, and an optional fallback generator
//! that stands in for the payload once every attempt has failed.

mod error;
mod fallback;

pub use error::{CallError, FailureReason};
pub use fallback::{FallbackReplies, DEFAULT_FALLBACK_REPLIES};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Produces a stand-in payload when all attempts fail
pub type FallbackFactory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Per-invocation policy
pub struct CallOptions<T> {
    /// Budget for a single attempt
    pub timeout: Duration,
    /// Additional attempts after the first one fails
    pub max_retries: u32,
    /// Pause between a failed attempt and the next one
    pub retry_delay: Duration,
    pub fallback: Option<FallbackFactory<T>>,
}

impl<T> CallOptions<T> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            retry_delay: Duration::ZERO,
            fallback: None,
        }
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Worst-case wall clock time before an outcome is produced.
    /// Saturates at `Duration::MAX`.
    pub fn budget(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        self.timeout
            .saturating_mul(attempts)
            .saturating_add(self.retry_delay.saturating_mul(self.max_retries))
    }
}

impl<T> Clone for CallOptions<T> {
    fn clone(&self) -> Self {
        Self {
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            fallback: self.fallback.clone(),
        }
    }
}

impl<T> std::fmt::Debug for CallOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Result of a resilient invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    Success {
        payload: T,
        /// The payload came from the fallback factory, not the remote side
        is_fallback: bool,
    },
    Failure {
        reason: FailureReason,
        message: String,
    },
}

impl<T> CallOutcome<T> {
    pub fn success(payload: T) -> Self {
        CallOutcome::Success {
            payload,
            is_fallback: false,
        }
    }

    pub fn fallback(payload: T) -> Self {
        CallOutcome::Success {
            payload,
            is_fallback: true,
        }
    }
}

impl<T> From<CallError> for CallOutcome<T> {
    fn from(err: CallError) -> Self {
        CallOutcome::Failure {
            reason: err.reason,
            message: err.message,
        }
    }
}

/// Stateless invoker; each call is independent of every other call.
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    label: &'static str,
}

impl ResilientCaller {
    /// `label` identifies the remote dependency in log output
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }

    pub async fn invoke<T, F, Fut>(&self, operation: F, options: &CallOptions<T>) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        match self.run(operation, options, None).await {
            Ok(outcome) => outcome,
            Err(Cancelled) => CallError::remote("call cancelled").into(),
        }
    }

    /// Same as [`invoke`](Self::invoke), but gives up silently once `cancel`
    /// fires. Returns `None` when cancelled, whether mid-attempt or during
    /// the retry delay.
    pub async fn invoke_with_cancel<T, F, Fut>(
        &self,
        operation: F,
        options: &CallOptions<T>,
        cancel: &CancellationToken,
    ) -> Option<CallOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        self.run(operation, options, Some(cancel)).await.ok()
    }

    async fn run<T, F, Fut>(
        &self,
        mut operation: F,
        options: &CallOptions<T>,
        cancel: Option<&CancellationToken>,
    ) -> Result<CallOutcome<T>, Cancelled>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let mut remaining = options.max_retries;
        let mut attempt: u32 = 0;

        let last_error = loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(Cancelled);
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                () = cancelled(cancel) => {
                    tracing::debug!(caller = self.label, attempt, "Call cancelled");
                    return Err(Cancelled);
                }
                result = tokio::time::timeout(options.timeout, operation()) => result,
            };

            let error = match result {
                Ok(Ok(payload)) => {
                    if attempt > 1 {
                        tracing::info!(caller = self.label, attempt, "Call succeeded after retry");
                    }
                    return Ok(CallOutcome::success(payload));
                }
                Ok(Err(e)) => e,
                Err(_) => CallError::timeout(options.timeout),
            };

            if remaining == 0 {
                break error;
            }

            tracing::warn!(
                caller = self.label,
                attempt,
                attempts_remaining = remaining,
                reason = %error.reason,
                error = %error.message,
                delay_ms = %options.retry_delay.as_millis(),
                "Call failed, retrying"
            );
            remaining -= 1;

            tokio::select! {
                biased;
                () = cancelled(cancel) => {
                    tracing::debug!(caller = self.label, "Cancelled during retry delay");
                    return Err(Cancelled);
                }
                () = tokio::time::sleep(options.retry_delay) => {}
            }
        };

        if let Some(fallback) = &options.fallback {
            tracing::info!(
                caller = self.label,
                attempts = attempt,
                reason = %last_error.reason,
                "Serving fallback payload"
            );
            return Ok(CallOutcome::fallback(fallback()));
        }

        tracing::warn!(
            caller = self.label,
            attempts = attempt,
            reason = %last_error.reason,
            error = %last_error.message,
            "Call failed, attempts exhausted"
        );
        Ok(last_error.into())
    }
}

/// The invocation was abandoned through its cancellation token
#[derive(Debug)]
struct Cancelled;

/// Resolves when `cancel` fires; never, without a token
async fn cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing(reason: FailureReason) -> impl FnMut() -> std::future::Ready<Result<String, CallError>> {
        move || std::future::ready(Err(CallError::new(reason, "boom")))
    }

    #[tokio::test]
    async fn test_success_returns_immediately() {
        let calls = AtomicU32::new(0);
        let caller = ResilientCaller::new("test");
        let options = CallOptions::new(Duration::from_secs(1))
            .with_retries(3, Duration::from_millis(10));

        let outcome = caller
            .invoke(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, CallError>("hi".to_string()) }
                },
                &options,
            )
            .await;

        assert_eq!(outcome, CallOutcome::success("hi".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_without_fallback_reports_remote_error() {
        let caller = ResilientCaller::new("test");
        let options = CallOptions::<String>::new(Duration::from_secs(1));

        let outcome = caller.invoke(failing(FailureReason::RemoteError), &options).await;

        assert_eq!(
            outcome,
            CallOutcome::Failure {
                reason: FailureReason::RemoteError,
                message: "boom".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_rate_limited_reason_is_preserved() {
        let caller = ResilientCaller::new("test");
        let options = CallOptions::<String>::new(Duration::from_secs(1));

        let outcome = caller.invoke(failing(FailureReason::RateLimited), &options).await;

        assert!(matches!(
            outcome,
            CallOutcome::Failure {
                reason: FailureReason::RateLimited,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_fallback_reports_timeout() {
        let caller = ResilientCaller::new("test");
        let options = CallOptions::<String>::new(Duration::from_millis(100));

        let outcome = caller
            .invoke(
                || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok("late".to_string())
                },
                &options,
            )
            .await;

        assert!(matches!(
            outcome,
            CallOutcome::Failure {
                reason: FailureReason::Timeout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failure_with_fallback_returns_flagged_success() {
        let replies = Arc::new(FallbackReplies::with_rng(
            vec!["one".into(), "two".into()],
            StdRng::seed_from_u64(3),
        ));
        let picker = replies.clone();
        let caller = ResilientCaller::new("test");
        let options = CallOptions::new(Duration::from_secs(1)).with_fallback(move || picker.pick());

        let outcome = caller.invoke(failing(FailureReason::RemoteError), &options).await;

        match outcome {
            CallOutcome::Success {
                payload,
                is_fallback,
            } => {
                assert!(is_fallback);
                assert!(replies.contains(&payload));
            }
            CallOutcome::Failure { .. } => panic!("expected fallback success"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let caller = ResilientCaller::new("test");
        let options = CallOptions::new(Duration::from_secs(1))
            .with_retries(2, Duration::from_millis(500))
            .with_fallback(|| "fallback".to_string());

        let outcome = caller
            .invoke(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(CallError::remote("not yet"))
                        } else {
                            Ok("real".to_string())
                        }
                    }
                },
                &options,
            )
            .await;

        assert_eq!(outcome, CallOutcome::success("real".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_spacing_and_attempt_count() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let caller = ResilientCaller::new("test");
        let options = CallOptions::<String>::new(Duration::from_secs(5))
            .with_retries(2, Duration::from_millis(2000));

        let outcome = caller
            .invoke(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(Err(CallError::remote("down")))
                },
                &options,
            )
            .await;

        assert!(matches!(outcome, CallOutcome::Failure { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(4000), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(4100), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_retry_gets_full_timeout() {
        let calls = AtomicU32::new(0);
        let caller = ResilientCaller::new("test");
        let options = CallOptions::new(Duration::from_millis(300))
            .with_retries(1, Duration::from_millis(100));

        let outcome = caller
            .invoke(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        // First attempt hangs, second answers just inside the budget.
                        let wait = if n == 0 { 10_000 } else { 250 };
                        tokio::time::sleep(Duration::from_millis(wait)).await;
                        Ok::<_, CallError>(n)
                    }
                },
                &options,
            )
            .await;

        assert_eq!(outcome, CallOutcome::success(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_delay() {
        let cancel = CancellationToken::new();
        let caller = ResilientCaller::new("test");
        let options = CallOptions::<String>::new(Duration::from_secs(1))
            .with_retries(5, Duration::from_secs(60))
            .with_fallback(|| "fallback".to_string());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let outcome = caller
            .invoke_with_cancel(failing(FailureReason::RemoteError), &options, &cancel)
            .await;

        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_attempt() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let caller = ResilientCaller::new("test");
        let options = CallOptions::<String>::new(Duration::from_secs(1));

        let outcome = caller
            .invoke_with_cancel(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok("never".to_string()) }
                },
                &options,
                &cancel,
            )
            .await;

        assert!(outcome.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_budget() {
        let options = CallOptions::<()>::new(Duration::from_secs(5))
            .with_retries(3, Duration::from_secs(2));
        assert_eq!(options.budget(), Duration::from_secs(26));
    }

    #[test]
    fn test_budget_with_max_retries() {
        let options = CallOptions::<()>::new(Duration::from_secs(5))
            .with_retries(u32::MAX, Duration::from_secs(2));
        assert_eq!(options.budget(), Duration::from_secs(7 * u64::from(u32::MAX)));

        let options = CallOptions::<()>::new(Duration::MAX).with_retries(u32::MAX, Duration::MAX);
        assert_eq!(options.budget(), Duration::MAX);
    }
}

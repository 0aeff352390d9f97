//! Retrying call layer
//!
//! Every call to an external oracle goes through [`retry_call`]: transient
//! failures are retried with randomized exponential backoff up to a fixed
//! number of attempts, everything else propagates at once. The last failure
//! is always handed back to the caller.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::text::truncate_for_log;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
pub const DEFAULT_MIN_WAIT: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

const MAX_LOG_ERROR_CHARS: usize = 1_000;

/// Classifies errors worth retrying.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Retry policy: attempt bound and backoff window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_wait: Duration,
    max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_wait: DEFAULT_MIN_WAIT,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl RetryPolicy {
    /// Create a policy. At least one attempt is always made and the
    /// maximum wait is never below the minimum.
    pub fn new(max_attempts: u32, min_wait: Duration, max_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_wait,
            max_wait: max_wait.max(min_wait),
        }
    }

    /// Policy that retries without sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn min_wait(&self) -> Duration {
        self.min_wait
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Upper bound of the wait before retry number `retry` (1-based).
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let shift = retry.min(20);
        self.min_wait
            .saturating_mul(1u32 << shift)
            .clamp(self.min_wait, self.max_wait)
    }

    /// Jittered wait before retry number `retry`, uniform in
    /// `[min_wait, backoff_ceiling(retry)]`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let ceiling = self.backoff_ceiling(retry);
        if ceiling <= self.min_wait {
            return self.min_wait;
        }
        let low = u64::try_from(self.min_wait.as_millis()).unwrap_or(u64::MAX);
        let high = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }
}

/// Terminal outcome of a retried call
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed transiently
    Exhausted {
        operation: String,
        attempts: u32,
        last: E,
    },
    /// A non-transient failure stopped the retries
    Fatal {
        operation: String,
        attempt: u32,
        error: E,
    },
    /// The run was cancelled before or between attempts
    Cancelled {
        operation: String,
        attempts: u32,
        last: Option<E>,
    },
}

impl<E> RetryError<E> {
    pub fn operation(&self) -> &str {
        match self {
            RetryError::Exhausted { operation, .. }
            | RetryError::Fatal { operation, .. }
            | RetryError::Cancelled { operation, .. } => operation,
        }
    }

    /// Number of attempts actually made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
            RetryError::Fatal { attempt, .. } => *attempt,
        }
    }

    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Fatal { error, .. } => Some(error),
            RetryError::Cancelled { last, .. } => last.as_ref(),
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Fatal { error, .. } => Some(error),
            RetryError::Cancelled { last, .. } => last,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                operation,
                attempts,
                last,
            } => write!(
                f,
                "{} failed after {} attempt(s): {}",
                operation, attempts, last
            ),
            RetryError::Fatal {
                operation,
                attempt,
                error,
            } => write!(
                f,
                "{} failed with non-retryable error on attempt {}: {}",
                operation, attempt, error
            ),
            RetryError::Cancelled {
                operation,
                attempts,
                ..
            } => write!(f, "{} cancelled after {} attempt(s)", operation, attempts),
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error()
            .map(|error| error as &(dyn std::error::Error + 'static))
    }
}

/// Run `call` under `policy`, retrying transient failures.
///
/// Cancellation is observed before every attempt and during each backoff
/// wait; a call already in flight is not interrupted.
pub async fn retry_call<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancellation: &CancellationToken,
    operation: &str,
    mut call: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + fmt::Display,
{
    let max_attempts = policy.max_attempts();
    let mut last: Option<E> = None;
    let mut attempt: u32 = 0;

    loop {
        if cancellation.is_cancelled() {
            return Err(RetryError::Cancelled {
                operation: operation.to_string(),
                attempts: attempt,
                last,
            });
        }

        attempt += 1;
        debug!(operation, attempt, max_attempts, "oracle call attempt");

        let error = match call().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation, attempt, "oracle call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let message = truncate_for_log(&error.to_string(), MAX_LOG_ERROR_CHARS);
        if !error.is_transient() {
            warn!(
                operation,
                attempt,
                error = %message,
                "oracle call failed with non-retryable error"
            );
            return Err(RetryError::Fatal {
                operation: operation.to_string(),
                attempt,
                error,
            });
        }

        if attempt >= max_attempts {
            warn!(
                operation,
                attempts = attempt,
                error = %message,
                "oracle call retries exhausted"
            );
            return Err(RetryError::Exhausted {
                operation: operation.to_string(),
                attempts: attempt,
                last: error,
            });
        }

        let delay = policy.backoff_delay(attempt);
        warn!(
            operation,
            attempt,
            max_attempts,
            retry_in_ms = delay.as_millis() as u64,
            error = %message,
            "transient oracle failure; backing off"
        );
        last = Some(error);

        if !delay.is_zero() {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    return Err(RetryError::Cancelled {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last,
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum FakeError {
        Flaky(u32),
        Denied,
    }

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                FakeError::Flaky(n) => write!(f, "flaky failure #{}", n),
                FakeError::Denied => f.write_str("denied"),
            }
        }
    }

    impl Transient for FakeError {
        fn is_transient(&self) -> bool {
            matches!(self, FakeError::Flaky(_))
        }
    }

    #[tokio::test]
    async fn test_always_transient_failure_is_retried_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(6);

        let result: Result<(), RetryError<FakeError>> =
            retry_call(&policy, &CancellationToken::new(), "always_fails", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(FakeError::Flaky(n)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        match result {
            Err(RetryError::Exhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 6);
                assert_eq!(last, FakeError::Flaky(6));
            }
            other => panic!("expected exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_transient_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(6);

        let result: Result<(), RetryError<FakeError>> =
            retry_call(&policy, &CancellationToken::new(), "denied", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Denied) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Fatal { attempt: 1, .. })));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(6);

        let result = retry_call(&policy, &CancellationToken::new(), "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(FakeError::Flaky(n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_attempt() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<(), RetryError<FakeError>> =
            retry_call(&RetryPolicy::immediate(3), &token, "cancelled", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_backoff_wait() {
        let token = CancellationToken::new();
        let policy = RetryPolicy::new(6, Duration::from_secs(30), Duration::from_secs(60));
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<(), RetryError<FakeError>> =
            retry_call(&policy, &token, "slow_backoff", || async {
                Err(FakeError::Flaky(1))
            })
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        match result {
            Err(RetryError::Cancelled { attempts, last, .. }) => {
                assert_eq!(attempts, 1);
                assert_eq!(last, Some(FakeError::Flaky(1)));
            }
            other => panic!("expected cancelled, got {:?}", other),
        }
    }

    #[test]
    fn test_backoff_window_is_exponential_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.backoff_ceiling(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_ceiling(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_ceiling(10), Duration::from_secs(60));

        for retry in 1..6 {
            let delay = policy.backoff_delay(retry);
            assert!(delay >= policy.min_wait());
            assert!(delay <= policy.backoff_ceiling(retry));
        }
    }

    #[test]
    fn test_policy_normalizes_bounds() {
        let policy = RetryPolicy::new(0, Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.max_wait(), Duration::from_secs(5));
    }
}

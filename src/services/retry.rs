use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryPolicy;

/// Run `operation` with bounded retries.
///
/// `operation` receives the 1-based attempt number. Errors that
/// `is_retryable` rejects propagate immediately; otherwise the call is
/// re-attempted up to `policy.max_attempts` total attempts with capped
/// exponential backoff plus jitter. `on_retry` fires before each re-attempt
/// with the attempt number that just failed and its error.
///
/// The last error is returned as-is; wrapping it (e.g. into an "exhausted"
/// variant) is the caller's decision.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: impl Fn(&E) -> bool,
    mut on_retry: impl FnMut(u32, &E),
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) || attempt >= policy.max_attempts {
                    return Err(err);
                }
                on_retry(attempt, &err);
                tokio::time::sleep(backoff_delay(policy, attempt)).await;
                attempt += 1;
            }
        }
    }
}

fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let jitter = if policy.jitter_ms > 0 {
        // Jitter avoids synchronized retries from concurrent callers.
        rand::thread_rng().gen_range(0..=policy.jitter_ms)
    } else {
        0
    };
    policy.delay_for(attempt) + Duration::from_millis(jitter)
}

use std::future::Future;
use std::time::Duration;

use super::PipelineError;

/// Run `op` with a bounded timeout per attempt, retrying retryable failures
/// up to `retries` more times. Non-retryable errors return immediately.
pub async fn call_with_retry<T, F, Fut>(
    label: &str,
    timeout: Duration,
    retries: usize,
    mut op: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                label: label.to_string(),
                secs: timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                tracing::warn!(
                    call = label,
                    attempt,
                    error = %e,
                    "Service call failed, retrying"
                );
            }
            Err(e) => return Err(e),
        }
    }
}

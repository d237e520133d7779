//! Capped exponential backoff for transient provider failures.

use std::thread;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;

use super::ProviderError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
        }
    }

    #[cfg(test)]
    pub fn none() -> Self {
        RetryPolicy::new(0)
    }
}

/// Call `attempt` until it succeeds, fails permanently, or retries run out.
pub fn retry_transient<T, F>(policy: &RetryPolicy, mut attempt: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Result<T, ProviderError>,
{
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_interval)
        .with_max_interval(policy.max_interval)
        .with_max_elapsed_time(None)
        .build();

    let mut retries = 0;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) if e.transient && retries < policy.max_retries => {
                retries += 1;
                let wait = backoff.next_backoff().unwrap_or(policy.max_interval);
                log::warn!(
                    "{e}; retrying in {:.1}s ({retries}/{})",
                    wait.as_secs_f32(),
                    policy.max_retries
                );
                thread::sleep(wait);
            }
            Err(e) => return Err(e),
        }
    }
}

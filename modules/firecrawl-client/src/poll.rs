use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{FirecrawlError, Result};

/// Where an async provider job stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Completed,
    Failed(String),
}

/// Anything that can be polled to a terminal state.
pub trait JobStatus {
    fn state(&self) -> JobState;

    /// Short human-readable status, used in logs and timeout errors.
    fn label(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub max_wait: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(15 * 60),
            initial_interval: Duration::from_millis(2500),
            max_interval: Duration::from_secs(15),
        }
    }
}

/// Poll `status_fn` until the job completes, fails, or `max_wait` runs out.
///
/// The interval doubles after every non-terminal poll, capped at `max_interval`,
/// and never sleeps past the remaining budget. Rate-limited polls count as
/// non-terminal; any other error is returned as-is.
pub async fn poll_with_backoff<T, F, Fut>(mut status_fn: F, opts: &PollOptions) -> Result<T>
where
    T: JobStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut interval = opts.initial_interval;
    let mut last_status: Option<String> = None;
    let mut polls = 0u32;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= opts.max_wait {
            return Err(FirecrawlError::Timeout {
                waited: elapsed,
                last_status,
            });
        }

        polls += 1;
        match status_fn().await {
            Ok(status) => match status.state() {
                JobState::Completed => {
                    debug!(polls, elapsed_ms = elapsed.as_millis() as u64, "Job completed");
                    return Ok(status);
                }
                JobState::Failed(reason) => return Err(FirecrawlError::JobFailed(reason)),
                JobState::Pending => {
                    let label = status.label();
                    debug!(polls, status = %label, "Job still running");
                    last_status = Some(label);
                }
            },
            Err(err) if err.is_rate_limited() => {
                warn!(polls, error = %err, "Status poll rate limited");
            }
            Err(err) => return Err(err),
        }

        let remaining = opts.max_wait.saturating_sub(started.elapsed());
        tokio::time::sleep(interval.min(remaining)).await;
        interval = interval.saturating_mul(2).min(opts.max_interval);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug)]
    struct Fake(JobState);

    impl JobStatus for Fake {
        fn state(&self) -> JobState {
            self.0.clone()
        }

        fn label(&self) -> String {
            format!("{:?}", self.0)
        }
    }

    fn opts() -> PollOptions {
        PollOptions {
            max_wait: Duration::from_secs(60),
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_after_exactly_n_polls() {
        let polls = AtomicU32::new(0);
        let counter = &polls;
        let started = Instant::now();

        let status = poll_with_backoff(
            move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Fake(if n == 4 {
                    JobState::Completed
                } else {
                    JobState::Pending
                }))
            },
            &opts(),
        )
        .await
        .unwrap();

        assert_eq!(status.0, JobState::Completed);
        assert_eq!(polls.load(Ordering::SeqCst), 4);
        // 2 + 4 + 8 seconds of sleeping between the four polls.
        assert_eq!(started.elapsed(), Duration::from_secs(14));
        assert!(started.elapsed() <= opts().max_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn never_completing_job_times_out_at_max_wait() {
        let started = Instant::now();
        let err = poll_with_backoff(|| async { Ok(Fake(JobState::Pending)) }, &opts())
            .await
            .unwrap_err();

        assert!(matches!(err, FirecrawlError::Timeout { .. }));
        assert_eq!(started.elapsed(), opts().max_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_surfaces_job_failed() {
        let err = poll_with_backoff(
            || async { Ok(Fake(JobState::Failed("cancelled".into()))) },
            &opts(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FirecrawlError::JobFailed(reason) if reason == "cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_polls_keep_polling() {
        let polls = AtomicU32::new(0);
        let counter = &polls;

        let status = poll_with_backoff(
            move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FirecrawlError::Api {
                        status: 429,
                        message: "slow down".into(),
                        retry_after: None,
                    })
                } else {
                    Ok(Fake(JobState::Completed))
                }
            },
            &opts(),
        )
        .await;

        assert!(status.is_ok());
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn other_poll_errors_propagate() {
        let err = poll_with_backoff(
            || async {
                Err::<Fake, _>(FirecrawlError::Api {
                    status: 404,
                    message: "unknown job".into(),
                    retry_after: None,
                })
            },
            &opts(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}

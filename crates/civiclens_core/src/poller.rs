//! Job submission and polling.
//!
//! Polling is an explicit state machine: `Polling { attempt }` advances on every
//! non-terminal observation or retryable transport failure, and ends in
//! `Completed` or `Failed`. Waits go through [`Sleeper`] so the loop does not
//! depend on a particular timer implementation.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::{JobSnapshot, ResponsesBackend};
use crate::config::PollingSettings;
use crate::error::{CoreError, CoreResult};
use crate::request::JobSpec;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Wait lengths, indexed by how many waits have already happened.
/// Never decreases over a run.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSchedule {
    short: Duration,
    short_waits: u32,
    medium: Duration,
    medium_waits: u32,
    long: Duration,
}

impl IntervalSchedule {
    pub fn new(
        short: Duration,
        short_waits: u32,
        medium: Duration,
        medium_waits: u32,
        long: Duration,
    ) -> Self {
        let medium = medium.max(short);
        let long = long.max(medium);
        Self {
            short,
            short_waits,
            medium,
            medium_waits,
            long,
        }
    }

    pub fn fixed(interval: Duration) -> Self {
        Self::new(interval, 0, interval, 0, interval)
    }

    pub fn interval(&self, wait_index: u32) -> Duration {
        if wait_index < self.short_waits {
            self.short
        } else if wait_index < self.short_waits + self.medium_waits {
            self.medium
        } else {
            self.long
        }
    }

    /// Sum of the first `waits` intervals.
    pub fn total(&self, waits: u32) -> Duration {
        (0..waits).map(|i| self.interval(i)).sum()
    }
}

/// Attempt budget, pacing, and which errors earn another attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub schedule: IntervalSchedule,
    pub retryable: fn(&CoreError) -> bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, schedule: IntervalSchedule) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            schedule,
            retryable: CoreError::is_retryable,
        }
    }

    pub fn from_settings(settings: &PollingSettings) -> Self {
        Self::new(
            settings.max_attempts,
            IntervalSchedule::new(
                settings.short(),
                settings.short_waits,
                settings.medium(),
                settings.medium_waits,
                settings.long(),
            ),
        )
    }

    /// Worst-case time spent waiting when every attempt is used.
    pub fn worst_case_wait(&self) -> Duration {
        self.schedule.total(self.max_attempts - 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&PollingSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
}

#[derive(Debug)]
enum PollState {
    Polling {
        attempt: u32,
        last_error: Option<String>,
    },
    Completed(JobSnapshot),
    Failed(CoreError),
}

impl PollState {
    /// Transition after one `retrieve` call made on `attempt` (1-based).
    fn advance(
        attempt: u32,
        last_error: Option<String>,
        observed: CoreResult<JobSnapshot>,
        policy: &RetryPolicy,
    ) -> Self {
        let last_error = match observed {
            Ok(snapshot) if snapshot.status.is_failure() => {
                let reason = snapshot
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("status {}", snapshot.status));
                return PollState::Failed(CoreError::JobFailed {
                    job_id: snapshot.id,
                    reason,
                });
            }
            Ok(snapshot) if snapshot.status.is_terminal() => {
                return PollState::Completed(snapshot);
            }
            Ok(snapshot) => {
                debug!(
                    job_id = %snapshot.id,
                    status = %snapshot.status,
                    "attempt {attempt}/{}",
                    policy.max_attempts
                );
                last_error
            }
            Err(err) if (policy.retryable)(&err) => {
                warn!(error = %err, "polling attempt {attempt} failed, retrying");
                Some(err.to_string())
            }
            Err(err) => return PollState::Failed(err),
        };

        if attempt >= policy.max_attempts {
            PollState::Failed(CoreError::JobTimedOut {
                attempts: policy.max_attempts,
                last_error,
            })
        } else {
            PollState::Polling {
                attempt: attempt + 1,
                last_error,
            }
        }
    }
}

pub struct JobPoller {
    backend: Arc<dyn ResponsesBackend>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn ResponsesBackend>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(backend, policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        backend: Arc<dyn ResponsesBackend>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            backend,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Create the job. Transport failures are retried within the attempt budget.
    pub async fn submit(&self, spec: &JobSpec) -> CoreResult<JobHandle> {
        let (handle, _) = self.submit_within(spec, self.policy.max_attempts).await?;
        Ok(handle)
    }

    /// Returns the handle and how many create calls it took.
    async fn submit_within(&self, spec: &JobSpec, limit: u32) -> CoreResult<(JobHandle, u32)> {
        let mut last_error = None;
        for attempt in 1..=limit {
            match self.backend.create(spec).await {
                Ok(snapshot) => {
                    info!(job_id = %snapshot.id, kind = ?spec.kind, backend = self.backend.name(), "job submitted");
                    return Ok((JobHandle { id: snapshot.id }, attempt));
                }
                Err(err) if (self.policy.retryable)(&err) => {
                    warn!(error = %err, "submit attempt {attempt} failed, retrying");
                    last_error = Some(err.to_string());
                }
                Err(err) => return Err(err),
            }
            if attempt < limit {
                self.sleeper
                    .sleep(self.policy.schedule.interval(attempt - 1))
                    .await;
            }
        }
        Err(CoreError::JobTimedOut {
            attempts: limit,
            last_error,
        })
    }

    /// Poll until the job completes, fails, or the attempt budget runs out.
    pub async fn await_completion(&self, handle: &JobHandle) -> CoreResult<JobSnapshot> {
        self.poll_from(handle, 1).await
    }

    /// Poll starting at `first_attempt` of the shared budget; waits continue the
    /// schedule from that point.
    async fn poll_from(&self, handle: &JobHandle, first_attempt: u32) -> CoreResult<JobSnapshot> {
        let mut state = PollState::Polling {
            attempt: first_attempt,
            last_error: None,
        };
        loop {
            state = match state {
                PollState::Polling {
                    attempt,
                    last_error,
                } => {
                    let observed = self.backend.retrieve(&handle.id).await;
                    let next = PollState::advance(attempt, last_error, observed, &self.policy);
                    if matches!(next, PollState::Polling { .. }) {
                        self.sleeper
                            .sleep(self.policy.schedule.interval(attempt - 1))
                            .await;
                    }
                    next
                }
                PollState::Completed(snapshot) => {
                    info!(job_id = %snapshot.id, "job completed");
                    return Ok(snapshot);
                }
                PollState::Failed(err) => return Err(err),
            };
        }
    }

    /// Submit then poll under one budget: create calls and polls together make
    /// at most `max_attempts` backend calls, so the total wait stays within
    /// [`RetryPolicy::worst_case_wait`]. At least one poll is always left.
    pub async fn run(&self, spec: &JobSpec) -> CoreResult<JobSnapshot> {
        let submit_limit = self.policy.max_attempts.saturating_sub(1).max(1);
        let (handle, used) = self.submit_within(spec, submit_limit).await?;
        self.poll_from(&handle, used + 1).await
    }
}

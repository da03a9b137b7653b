use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::domain::{JobStatus, RemoteStatus};
use crate::error::KiraError;
use crate::foldseek::{FoldseekClient, SearchPayload};

#[derive(Debug, Clone, Serialize)]
pub struct SearchJob {
    pub ticket: String,
    pub status: JobStatus,
    pub payload: SearchPayload,
    pub polls: u32,
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

// A pending response on the last allowed poll times the job out.
pub fn next_status(
    current: JobStatus,
    remote: &RemoteStatus,
    polls: u32,
    max_attempts: u32,
) -> JobStatus {
    if current.is_terminal() {
        return current;
    }
    match remote {
        RemoteStatus::Complete => JobStatus::Complete,
        RemoteStatus::Error => JobStatus::Error,
        RemoteStatus::Pending(_) if polls >= max_attempts => JobStatus::TimedOut,
        RemoteStatus::Pending(_) => JobStatus::Running,
    }
}

pub struct JobPoller<C: FoldseekClient, S: Sleeper> {
    client: C,
    sleeper: S,
}

impl<C: FoldseekClient, S: Sleeper> JobPoller<C, S> {
    pub fn new(client: C, sleeper: S) -> Self {
        Self { client, sleeper }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn submit(&self, payload: SearchPayload) -> Result<SearchJob, KiraError> {
        let response = self.client.submit(&payload)?;
        let ticket = response
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| KiraError::Submission(response.raw_json.to_string()))?;
        tracing::info!(ticket = %ticket, mode = %payload.mode, "submitted search job");
        Ok(SearchJob {
            ticket,
            status: JobStatus::Submitted,
            payload,
            polls: 0,
        })
    }

    pub fn await_completion(
        &self,
        mut job: SearchJob,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Result<SearchJob, KiraError> {
        if max_attempts == 0 {
            return Err(KiraError::PollTimeout {
                ticket: job.ticket,
                attempts: 0,
            });
        }

        for attempt in 1..=max_attempts {
            let remote = self.client.ticket_status(&job.ticket)?;
            job.polls = attempt;
            job.status = next_status(job.status, &remote, attempt, max_attempts);
            tracing::debug!(ticket = %job.ticket, attempt, remote = ?remote, status = %job.status, "polled ticket");

            match job.status {
                JobStatus::Complete => {
                    tracing::info!(ticket = %job.ticket, polls = attempt, "search job complete");
                    return Ok(job);
                }
                JobStatus::Error => return Err(KiraError::RemoteJob { ticket: job.ticket }),
                JobStatus::TimedOut => {
                    return Err(KiraError::PollTimeout {
                        ticket: job.ticket,
                        attempts: attempt,
                    });
                }
                JobStatus::Submitted | JobStatus::Running => self.sleeper.sleep(poll_interval),
            }
        }

        Err(KiraError::PollTimeout {
            ticket: job.ticket,
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> RemoteStatus {
        RemoteStatus::Pending("RUNNING".to_string())
    }

    #[test]
    fn pending_keeps_running_until_budget() {
        assert_eq!(
            next_status(JobStatus::Submitted, &pending(), 1, 3),
            JobStatus::Running
        );
        assert_eq!(
            next_status(JobStatus::Running, &pending(), 3, 3),
            JobStatus::TimedOut
        );
    }

    #[test]
    fn remote_outcomes_are_terminal() {
        assert_eq!(
            next_status(JobStatus::Running, &RemoteStatus::Complete, 3, 3),
            JobStatus::Complete
        );
        assert_eq!(
            next_status(JobStatus::Submitted, &RemoteStatus::Error, 1, 3),
            JobStatus::Error
        );
    }

    #[test]
    fn terminal_status_is_absorbing() {
        assert_eq!(
            next_status(JobStatus::Error, &RemoteStatus::Complete, 2, 3),
            JobStatus::Error
        );
        assert_eq!(
            next_status(JobStatus::Complete, &pending(), 9, 3),
            JobStatus::Complete
        );
    }
}

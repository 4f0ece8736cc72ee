//! Realization poller - waits for a created switch to reach a terminal state.
//!
//! The poller only reads. It queries the realization state at the configured
//! cadence and stops on:
//! - terminal success
//! - terminal failure, or a non-zero failure code in any response
//! - a transport error (unless the policy tolerates it), a non-200 status or
//!   a vanished resource
//! - the wall-clock deadline, or cancellation by the caller

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, warn};

use super::error::RealizationError;
use crate::clients::{ApiResponse, TransportError};
use crate::config::{RealizationConfig, TransportErrorPolicy};
use crate::model::{LogicalSwitchState, RealizationState, StateClass};

/// One round of state querying.
#[derive(Debug, Clone)]
pub struct PollAttempt {
    pub attempt: u32,
    pub observed_at: DateTime<Utc>,
    pub state: Option<RealizationState>,
    pub failure: Option<(i64, String)>,
}

/// Summary of a poll loop that reached terminal success.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub attempts: Vec<PollAttempt>,
    pub elapsed: Duration,
}

impl PollReport {
    pub fn polls(&self) -> usize {
        self.attempts.len()
    }
}

/// What one round decided.
enum Round {
    Done,
    Pending(Option<RealizationState>),
}

/// Waits for realization of one resource.
pub struct RealizationPoller<'a> {
    config: &'a RealizationConfig,
}

impl<'a> RealizationPoller<'a> {
    pub fn new(config: &'a RealizationConfig) -> Self {
        Self { config }
    }

    /// Poll `query` until the resource `id` is realized.
    pub async fn wait<F, Fut>(&self, id: &str, query: F) -> Result<PollReport, RealizationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse<LogicalSwitchState>, TransportError>>,
    {
        self.wait_until(id, query, std::future::pending::<()>()).await
    }

    /// Like [`RealizationPoller::wait`], abandoning the loop once `cancel`
    /// resolves.
    pub async fn wait_until<F, Fut, C>(
        &self,
        id: &str,
        mut query: F,
        cancel: C,
    ) -> Result<PollReport, RealizationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse<LogicalSwitchState>, TransportError>>,
        C: Future<Output = ()>,
    {
        self.config.validate()?;

        let start = Instant::now();
        let deadline = start + self.config.timeout;
        let mut attempts = Vec::new();
        let mut last_state = None;
        let mut transport_errors = 0u32;
        let mut interval = self.config.min_interval;

        tokio::pin!(cancel);

        let timed_out = |last_state: Option<RealizationState>| RealizationError::Timeout {
            id: id.to_string(),
            elapsed: start.elapsed(),
            timeout: self.config.timeout,
            last_state,
        };
        let cancelled = || RealizationError::Cancelled {
            id: id.to_string(),
            elapsed: start.elapsed(),
        };

        let mut wait = self.config.initial_delay.min(self.config.timeout);
        loop {
            tokio::select! {
                _ = &mut cancel => return Err(cancelled()),
                _ = sleep(wait) => {}
            }

            let attempt = attempts.len() as u32 + 1;
            let result = tokio::select! {
                _ = &mut cancel => return Err(cancelled()),
                result = timeout_at(deadline, query()) => match result {
                    Ok(result) => result,
                    Err(_) => return Err(timed_out(last_state)),
                },
            };

            let round = match result {
                Ok(response) => {
                    transport_errors = 0;
                    self.evaluate(id, attempt, response, &mut attempts)?
                }
                Err(e) => {
                    transport_errors += 1;
                    attempts.push(PollAttempt {
                        attempt,
                        observed_at: Utc::now(),
                        state: None,
                        failure: None,
                    });
                    if !self.tolerates(transport_errors) {
                        return Err(RealizationError::StateQuery {
                            id: id.to_string(),
                            source: e,
                        });
                    }
                    warn!(
                        id = %id,
                        attempt,
                        consecutive = transport_errors,
                        error = %e,
                        "State query failed, retrying"
                    );
                    Round::Pending(None)
                }
            };

            match round {
                Round::Done => {
                    let elapsed = start.elapsed();
                    debug!(
                        id = %id,
                        polls = attempts.len(),
                        elapsed_ms = elapsed.as_millis(),
                        "Realization confirmed"
                    );
                    return Ok(PollReport { attempts, elapsed });
                }
                Round::Pending(state) => {
                    if state.is_some() {
                        last_state = state;
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out(last_state));
            }
            wait = interval.min(deadline - now);
            interval = self.config.next_interval(interval);
        }
    }

    fn tolerates(&self, consecutive: u32) -> bool {
        match self.config.transport_errors {
            TransportErrorPolicy::Abort => false,
            TransportErrorPolicy::Tolerate { max_consecutive } => consecutive <= max_consecutive,
        }
    }

    /// Interpret one structured response.
    fn evaluate(
        &self,
        id: &str,
        attempt: u32,
        response: ApiResponse<LogicalSwitchState>,
        attempts: &mut Vec<PollAttempt>,
    ) -> Result<Round, RealizationError> {
        if response.status == StatusCode::NOT_FOUND {
            return Err(RealizationError::ResourceVanished { id: id.to_string() });
        }
        if response.status != StatusCode::OK {
            return Err(RealizationError::StateQueryStatus {
                id: id.to_string(),
                status: response.status,
            });
        }
        let Some(report) = response.body else {
            return Err(RealizationError::StateQuery {
                id: id.to_string(),
                source: TransportError::Decode("empty realization state body".to_string()),
            });
        };

        let state: Result<RealizationState, _> = report.state.parse();
        attempts.push(PollAttempt {
            attempt,
            observed_at: Utc::now(),
            state: state.as_ref().ok().copied(),
            failure: report.failure().map(|(c, m)| (c, m.to_string())),
        });

        let state = match state {
            Ok(state) => state,
            Err(raw) => {
                return Err(RealizationError::UnrecognizedState {
                    id: id.to_string(),
                    state: raw,
                });
            }
        };

        if let Some((code, message)) = report.failure() {
            return Err(RealizationError::Failed {
                id: id.to_string(),
                state,
                code,
                message: message.to_string(),
            });
        }

        debug!(id = %id, attempt, state = %state, "Realization state");

        match state.class() {
            StateClass::Success => Ok(Round::Done),
            StateClass::Pending => Ok(Round::Pending(Some(state))),
            StateClass::Failure => Err(RealizationError::Failed {
                id: id.to_string(),
                state,
                code: 0,
                message: report
                    .failure_message
                    .unwrap_or_else(|| format!("controller reported state {}", state)),
            }),
        }
    }
}

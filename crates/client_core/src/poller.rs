//! Task observation loops.
//!
//! A [`Poller`] owns at most one running loop. Every `start_*` call cancels the
//! previous loop first, and [`Poller::stop`] may be called any number of times.
//! Each tick spawns its request independently of the ticker, so a slow response
//! never delays the schedule. Responses that arrive after the loop stopped are
//! dropped with it.

use std::{fmt, sync::Arc, time::Duration};

use shared::{
    domain::{TaskId, TaskStatus},
    protocol::{StatusResponse, TaskSnapshot},
};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::{JoinHandle, JoinSet},
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{error::ClientError, status::StatusBadge, ContractApi};

pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
pub const RESULT_POLL_MAX_ATTEMPTS: u32 = 60;
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub status_interval: Duration,
    pub result_interval: Duration,
    pub result_max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            status_interval: STATUS_POLL_INTERVAL,
            result_interval: RESULT_POLL_INTERVAL,
            result_max_attempts: RESULT_POLL_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    /// Lightweight status endpoint, unbounded, stops on completed/failed.
    Status,
    /// Full result endpoint, bounded, also stops on waiting_human.
    Result,
}

impl PollKind {
    fn as_str(self) -> &'static str {
        match self {
            PollKind::Status => "status",
            PollKind::Result => "result",
        }
    }
}

impl fmt::Display for PollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The status loop observed `completed` or `failed`.
    Settled(StatusBadge),
    /// The result loop observed `completed`, `waiting_human` or `failed`.
    ResultReady(TaskSnapshot),
    /// The result loop ran out of attempts. The task may still be running.
    Exhausted { attempts: u32 },
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum PollEvent {
    Status(StatusBadge),
    Snapshot {
        task_id: TaskId,
        snapshot: TaskSnapshot,
    },
    TransientFailure {
        task_id: TaskId,
        kind: PollKind,
        attempt: u32,
        error: String,
    },
    Stopped {
        task_id: TaskId,
        kind: PollKind,
        outcome: PollOutcome,
    },
}

/// Statuses that end the result loop. `waiting_human` is included because the
/// review form needs the findings while the backend waits.
fn stops_result_poll(status: TaskStatus) -> bool {
    match status {
        TaskStatus::Completed | TaskStatus::WaitingHuman | TaskStatus::Failed => true,
        TaskStatus::Pending | TaskStatus::InProgress => false,
    }
}

struct ActivePoll {
    task_id: TaskId,
    kind: PollKind,
    handle: JoinHandle<()>,
    outcome: watch::Receiver<Option<PollOutcome>>,
}

pub struct Poller {
    api: Arc<dyn ContractApi>,
    config: PollConfig,
    events: broadcast::Sender<PollEvent>,
    active: Mutex<Option<ActivePoll>>,
}

impl Poller {
    pub fn new(api: Arc<dyn ContractApi>, config: PollConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            config,
            events,
            active: Mutex::new(None),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PollEvent> {
        self.events.subscribe()
    }

    pub async fn start_status_poll(&self, task_id: TaskId) {
        self.start(task_id, PollKind::Status).await;
    }

    pub async fn start_result_poll(&self, task_id: TaskId) {
        self.start(task_id, PollKind::Result).await;
    }

    async fn start(&self, task_id: TaskId, kind: PollKind) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            self.cancel(previous);
        }

        let (interval, max_attempts) = match kind {
            PollKind::Status => (self.config.status_interval, None),
            PollKind::Result => (
                self.config.result_interval,
                Some(self.config.result_max_attempts.max(1)),
            ),
        };
        let driver = PollDriver {
            api: Arc::clone(&self.api),
            events: self.events.clone(),
            task_id: task_id.clone(),
            kind,
            interval,
            max_attempts,
        };

        let (outcome_tx, outcome_rx) = watch::channel(None);
        let handle = tokio::spawn(async move {
            let outcome = driver.run().await;
            let _ = outcome_tx.send(Some(outcome));
        });

        info!(
            task_id = %task_id,
            kind = %kind,
            interval_ms = interval.as_millis() as u64,
            max_attempts = ?max_attempts,
            "poll: started"
        );
        *active = Some(ActivePoll {
            task_id,
            kind,
            handle,
            outcome: outcome_rx,
        });
    }

    /// Cancels the running loop, if any.
    pub async fn stop(&self) {
        let previous = self.active.lock().await.take();
        match previous {
            Some(previous) => self.cancel(previous),
            None => debug!("poll: stop requested with no active loop"),
        }
    }

    fn cancel(&self, previous: ActivePoll) {
        if previous.handle.is_finished() {
            return;
        }
        previous.handle.abort();
        info!(task_id = %previous.task_id, kind = %previous.kind, "poll: cancelled");
        let _ = self.events.send(PollEvent::Stopped {
            task_id: previous.task_id,
            kind: previous.kind,
            outcome: PollOutcome::Cancelled,
        });
    }

    /// Task and kind of the loop that is still running.
    pub async fn active_task(&self) -> Option<(TaskId, PollKind)> {
        let guard = self.active.lock().await;
        let active = guard.as_ref()?;
        let running = (!active.handle.is_finished()).then(|| (active.task_id.clone(), active.kind));
        running
    }

    /// Waits for the current loop to stop. Returns `None` when no loop has been
    /// started since the last `stop`, and `Cancelled` when the awaited loop
    /// is replaced or stopped meanwhile.
    pub async fn join(&self) -> Option<PollOutcome> {
        let mut outcome = {
            let guard = self.active.lock().await;
            guard.as_ref()?.outcome.clone()
        };
        let joined = match outcome.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => Some(PollOutcome::Cancelled),
        };
        joined
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.handle.abort();
        }
    }
}

enum Observation {
    Status(StatusResponse),
    Result(TaskSnapshot),
}

struct PollDriver {
    api: Arc<dyn ContractApi>,
    events: broadcast::Sender<PollEvent>,
    task_id: TaskId,
    kind: PollKind,
    interval: Duration,
    max_attempts: Option<u32>,
}

impl PollDriver {
    async fn run(self) -> PollOutcome {
        let outcome = self.drive().await;
        info!(
            task_id = %self.task_id,
            kind = %self.kind,
            outcome = outcome_name(&outcome),
            "poll: stopped"
        );
        let _ = self.events.send(PollEvent::Stopped {
            task_id: self.task_id.clone(),
            kind: self.kind,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn drive(&self) -> PollOutcome {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: JoinSet<(u32, Result<Observation, ClientError>)> = JoinSet::new();
        let mut attempts: u32 = 0;

        loop {
            let budget_left = self.max_attempts.map_or(true, |max| attempts < max);
            if !budget_left && in_flight.is_empty() {
                return PollOutcome::Exhausted { attempts };
            }

            tokio::select! {
                _ = ticker.tick(), if budget_left => {
                    attempts += 1;
                    let attempt = attempts;
                    let api = Arc::clone(&self.api);
                    let task_id = self.task_id.clone();
                    let kind = self.kind;
                    in_flight.spawn(async move {
                        (attempt, fetch(api.as_ref(), kind, &task_id).await)
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    match joined {
                        Ok((_, Ok(observation))) => {
                            if let Some(outcome) = self.observe(observation) {
                                return outcome;
                            }
                        }
                        Ok((attempt, Err(err))) => self.report_failure(attempt, &err),
                        Err(join_err) => {
                            warn!(task_id = %self.task_id, error = %join_err, "poll: request task ended abnormally");
                        }
                    }
                }
            }
        }
    }

    fn observe(&self, observation: Observation) -> Option<PollOutcome> {
        match observation {
            Observation::Status(response) => {
                let badge = StatusBadge::observe(self.task_id.clone(), &response);
                debug!(task_id = %self.task_id, status = %badge.status, "poll: status observed");
                let _ = self.events.send(PollEvent::Status(badge.clone()));
                badge.is_settled().then(|| PollOutcome::Settled(badge))
            }
            Observation::Result(snapshot) => {
                debug!(
                    task_id = %self.task_id,
                    status = %snapshot.status,
                    evaluations = snapshot.evaluations.len(),
                    "poll: result observed"
                );
                let _ = self.events.send(PollEvent::Snapshot {
                    task_id: self.task_id.clone(),
                    snapshot: snapshot.clone(),
                });
                stops_result_poll(snapshot.status).then(|| PollOutcome::ResultReady(snapshot))
            }
        }
    }

    fn report_failure(&self, attempt: u32, err: &ClientError) {
        if err.is_decode() {
            error!(task_id = %self.task_id, kind = %self.kind, attempt, error = %err, "poll: unreadable response");
        } else {
            warn!(task_id = %self.task_id, kind = %self.kind, attempt, error = %err, "poll: request failed; will retry on next tick");
        }
        let _ = self.events.send(PollEvent::TransientFailure {
            task_id: self.task_id.clone(),
            kind: self.kind,
            attempt,
            error: err.to_string(),
        });
    }
}

async fn fetch(
    api: &dyn ContractApi,
    kind: PollKind,
    task_id: &TaskId,
) -> Result<Observation, ClientError> {
    match kind {
        PollKind::Status => api.status(task_id).await.map(Observation::Status),
        PollKind::Result => api.result(task_id).await.map(Observation::Result),
    }
}

fn outcome_name(outcome: &PollOutcome) -> &'static str {
    match outcome {
        PollOutcome::Settled(_) => "settled",
        PollOutcome::ResultReady(_) => "result_ready",
        PollOutcome::Exhausted { .. } => "exhausted",
        PollOutcome::Cancelled => "cancelled",
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;

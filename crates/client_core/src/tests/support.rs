//! In-memory backend used by the poller and workflow tests.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use shared::{
    domain::{EvaluationId, RiskLevel, TaskId, TaskStatus},
    protocol::{
        CompareRequest, CompareResponse, Difference, Evaluation, HealthResponse, ReviewAck,
        ReviewBatch, StatusResponse, TaskSnapshot,
    },
};

use crate::{ClientError, ContractApi};

#[derive(Debug, Clone)]
pub(crate) enum Step<T> {
    Respond(T),
    Fail,
}

pub(crate) fn evaluation(id: i64, risk_level: RiskLevel) -> Evaluation {
    Evaluation {
        id: EvaluationId(id),
        risk_level,
        explanation: format!("explanation {id}"),
        suggestion: format!("suggestion {id}"),
        difference: Difference {
            original_section: Some(format!("original section {id}")),
            modified_section: Some(format!("modified section {id}")),
            similarity: Some(0.5),
            change_type: None,
        },
        matched_rule: None,
    }
}

pub(crate) fn snapshot(status: TaskStatus, evaluations: Vec<Evaluation>) -> TaskSnapshot {
    TaskSnapshot {
        task_id: None,
        status,
        category: None,
        final_report: None,
        evaluations,
        human_reviews: Vec::new(),
        created_at: None,
    }
}

fn unavailable() -> ClientError {
    ClientError::Rejected {
        status: 503,
        detail: "service unavailable".to_string(),
    }
}

/// Scripted backend. Each task walks the script independently; once the
/// script is exhausted the last step repeats, and an empty script keeps the
/// task `in_progress`.
pub(crate) struct FakeApi {
    task_id: TaskId,
    latency: Duration,
    status_script: Vec<Step<TaskStatus>>,
    result_script: Vec<Step<TaskSnapshot>>,
    review_failures: Mutex<usize>,
    compare_requests: Mutex<Vec<CompareRequest>>,
    review_batches: Mutex<Vec<ReviewBatch>>,
    status_calls: Mutex<HashMap<TaskId, usize>>,
    result_calls: Mutex<HashMap<TaskId, usize>>,
}

impl FakeApi {
    pub(crate) fn new(task_id: &str) -> Self {
        Self {
            task_id: TaskId::new(task_id),
            latency: Duration::ZERO,
            status_script: Vec::new(),
            result_script: Vec::new(),
            review_failures: Mutex::new(0),
            compare_requests: Mutex::new(Vec::new()),
            review_batches: Mutex::new(Vec::new()),
            status_calls: Mutex::new(HashMap::new()),
            result_calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn with_statuses(mut self, steps: Vec<Step<TaskStatus>>) -> Self {
        self.status_script = steps;
        self
    }

    pub(crate) fn with_results(mut self, steps: Vec<Step<TaskSnapshot>>) -> Self {
        self.result_script = steps;
        self
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn failing_reviews(self, count: usize) -> Self {
        *self.review_failures.lock().expect("review failures lock") = count;
        self
    }

    pub(crate) fn status_calls(&self, task_id: &str) -> usize {
        calls_for(&self.status_calls, task_id)
    }

    pub(crate) fn result_calls(&self, task_id: &str) -> usize {
        calls_for(&self.result_calls, task_id)
    }

    pub(crate) fn compare_requests(&self) -> Vec<CompareRequest> {
        self.compare_requests.lock().expect("compare lock").clone()
    }

    pub(crate) fn review_batches(&self) -> Vec<ReviewBatch> {
        self.review_batches.lock().expect("review lock").clone()
    }

    async fn respond_later(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn calls_for(calls: &Mutex<HashMap<TaskId, usize>>, task_id: &str) -> usize {
    calls
        .lock()
        .expect("calls lock")
        .get(&TaskId::new(task_id))
        .copied()
        .unwrap_or(0)
}

fn next_step<T: Clone>(
    script: &[Step<T>],
    calls: &Mutex<HashMap<TaskId, usize>>,
    task_id: &TaskId,
) -> Option<Step<T>> {
    let mut calls = calls.lock().expect("calls lock");
    let count = calls.entry(task_id.clone()).or_insert(0);
    let step = script.get(*count).or_else(|| script.last()).cloned();
    *count += 1;
    step
}

#[async_trait]
impl ContractApi for FakeApi {
    async fn compare(&self, request: &CompareRequest) -> Result<CompareResponse, ClientError> {
        self.compare_requests
            .lock()
            .expect("compare lock")
            .push(request.clone());
        Ok(CompareResponse {
            task_id: self.task_id.clone(),
            status: Some(TaskStatus::Pending),
            message: Some("task created".to_string()),
        })
    }

    async fn status(&self, task_id: &TaskId) -> Result<StatusResponse, ClientError> {
        let step = next_step(&self.status_script, &self.status_calls, task_id);
        self.respond_later().await;
        match step {
            Some(Step::Respond(status)) => Ok(StatusResponse {
                task_id: Some(task_id.clone()),
                status,
                message: Some(format!("task is {status}")),
            }),
            Some(Step::Fail) => Err(unavailable()),
            None => Ok(StatusResponse {
                task_id: Some(task_id.clone()),
                status: TaskStatus::InProgress,
                message: None,
            }),
        }
    }

    async fn result(&self, task_id: &TaskId) -> Result<TaskSnapshot, ClientError> {
        let step = next_step(&self.result_script, &self.result_calls, task_id);
        self.respond_later().await;
        match step {
            Some(Step::Respond(snapshot)) => Ok(snapshot),
            Some(Step::Fail) => Err(unavailable()),
            None => Ok(snapshot(TaskStatus::InProgress, Vec::new())),
        }
    }

    async fn submit_review(&self, batch: &ReviewBatch) -> Result<ReviewAck, ClientError> {
        {
            let mut failures = self.review_failures.lock().expect("review failures lock");
            if *failures > 0 {
                *failures -= 1;
                return Err(unavailable());
            }
        }
        self.review_batches
            .lock()
            .expect("review lock")
            .push(batch.clone());
        Ok(ReviewAck {
            message: "Review submitted successfully".to_string(),
            task_id: Some(batch.task_id.clone()),
        })
    }

    async fn health(&self) -> Result<HealthResponse, ClientError> {
        Ok(HealthResponse {
            status: "healthy".to_string(),
        })
    }
}

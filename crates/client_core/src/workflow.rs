use std::sync::Arc;

use shared::{
    domain::TaskId,
    protocol::{CompareRequest, HealthResponse},
};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    poller::{PollConfig, PollOutcome, Poller},
    presenter::{present, ResultView},
    review::ReviewForm,
    status::StatusBadge,
    view::ViewContext,
    ContractApi,
};

/// Raw form input for a new comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonInput {
    pub original_text: String,
    pub modified_text: String,
    pub category: Option<String>,
}

impl ComparisonInput {
    pub fn new(original_text: impl Into<String>, modified_text: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            modified_text: modified_text.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Trims both texts and rejects empty ones. A blank category is dropped.
    pub fn into_request(self) -> Result<CompareRequest, ClientError> {
        let original_text = self.original_text.trim();
        let modified_text = self.modified_text.trim();
        if original_text.is_empty() || modified_text.is_empty() {
            return Err(ClientError::Validation(
                "both the original and the modified contract text are required".to_string(),
            ));
        }

        Ok(CompareRequest {
            original_text: original_text.to_string(),
            modified_text: modified_text.to_string(),
            category: self
                .category
                .map(|category| category.trim().to_string())
                .filter(|category| !category.is_empty()),
        })
    }
}

/// How opening a result view ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultOutcome {
    Ready(ResultView),
    /// The attempt budget ran out before the task settled.
    TimedOut { attempts: u32 },
    Cancelled,
}

/// How a review submission ended. The batch counts as recorded as soon as
/// the backend accepts it, whatever happens to the follow-up fetch.
#[derive(Debug)]
pub enum ReviewSubmission {
    /// The form was already sent; nothing went out again.
    AlreadySubmitted,
    /// Recorded, and the task result was fetched again.
    Refreshed(ResultView),
    /// Recorded, but fetching the updated result failed.
    RefreshFailed(ClientError),
}

/// Drives one task from submission through human review.
pub struct ReviewWorkflow {
    api: Arc<dyn ContractApi>,
    poller: Poller,
}

impl ReviewWorkflow {
    pub fn new(api: Arc<dyn ContractApi>, config: PollConfig) -> Self {
        let poller = Poller::new(Arc::clone(&api), config);
        Self { api, poller }
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub async fn check_health(&self) -> Result<HealthResponse, ClientError> {
        self.api.health().await
    }

    /// Validates the input, submits it once and starts the status poll for
    /// the returned task. Nothing is sent when validation fails.
    pub async fn submit_comparison(&self, input: ComparisonInput) -> Result<TaskId, ClientError> {
        let request = input.into_request()?;
        let response = self.api.compare(&request).await.inspect_err(|err| {
            warn!(error = %err, "submission: compare request failed");
        })?;

        info!(
            task_id = %response.task_id,
            category = request.category.as_deref().unwrap_or("-"),
            "submission: task accepted"
        );
        self.poller
            .start_status_poll(response.task_id.clone())
            .await;
        Ok(response.task_id)
    }

    pub async fn fetch_status(&self, task_id: &TaskId) -> Result<StatusBadge, ClientError> {
        let response = self.api.status(task_id).await?;
        Ok(StatusBadge::observe(task_id.clone(), &response))
    }

    /// Polls the result of the view's task and presents it. Returns `None`
    /// without contacting the backend when the view has no task id.
    pub async fn open_result(&self, view: &ViewContext) -> Option<ResultOutcome> {
        let Some(task_id) = view.task_id() else {
            warn!("result: view has no task id; nothing to open");
            return None;
        };

        self.poller.start_result_poll(task_id.clone()).await;
        let outcome = match self.poller.join().await {
            Some(PollOutcome::ResultReady(snapshot)) => {
                ResultOutcome::Ready(present(view, &snapshot))
            }
            Some(PollOutcome::Exhausted { attempts }) => {
                info!(task_id = %task_id, attempts, "result: stopped observing; task may still be running");
                ResultOutcome::TimedOut { attempts }
            }
            Some(PollOutcome::Settled(_)) | Some(PollOutcome::Cancelled) | None => {
                ResultOutcome::Cancelled
            }
        };
        Some(outcome)
    }

    /// Sends the form's batch once. On failure the form is left untouched so
    /// it can be resubmitted. On success the form is closed and the task
    /// result is fetched again, since the backend holds the only copy of the
    /// post-review state. A failed fetch does not undo the submission.
    pub async fn submit_review(
        &self,
        form: &mut ReviewForm,
    ) -> Result<ReviewSubmission, ClientError> {
        if form.is_submitted() {
            debug!(task_id = %form.task_id(), "review: form already submitted; ignoring");
            return Ok(ReviewSubmission::AlreadySubmitted);
        }

        let batch = form.build_batch();
        let approved = batch.reviews.iter().filter(|review| review.approved).count();
        self.api.submit_review(&batch).await.inspect_err(|err| {
            warn!(task_id = %batch.task_id, error = %err, "review: submission failed");
        })?;
        form.mark_submitted();
        info!(
            task_id = %batch.task_id,
            approved,
            rejected = batch.reviews.len() - approved,
            "review: submitted"
        );

        let view = ViewContext::for_task(batch.task_id.clone());
        match self.api.result(&batch.task_id).await {
            Ok(snapshot) => Ok(ReviewSubmission::Refreshed(present(&view, &snapshot))),
            Err(err) => {
                warn!(task_id = %batch.task_id, error = %err, "review: recorded but refresh failed");
                Ok(ReviewSubmission::RefreshFailed(err))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;

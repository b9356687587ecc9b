use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::TaskId,
    error::ApiErrorBody,
    protocol::{
        CompareRequest, CompareResponse, HealthResponse, ReviewAck, ReviewBatch, StatusResponse,
        TaskSnapshot,
    },
};
use tracing::debug;
use url::Url;

pub mod error;
pub mod poller;
pub mod presenter;
pub mod review;
pub mod status;
pub mod view;
pub mod workflow;

pub use error::ClientError;
pub use poller::{PollConfig, PollEvent, PollKind, PollOutcome, Poller};
pub use presenter::{present, ResultView, RiskCounts};
pub use review::{risk_badge, Decision, ReviewForm, ReviewItem};
pub use status::{status_label, StatusBadge};
pub use view::{result_link, ViewContext};
pub use workflow::{ComparisonInput, ResultOutcome, ReviewSubmission, ReviewWorkflow};

const API_PREFIX: [&str; 2] = ["api", "contracts"];

/// Backend operations the workflow depends on.
#[async_trait]
pub trait ContractApi: Send + Sync {
    async fn compare(&self, request: &CompareRequest) -> Result<CompareResponse, ClientError>;
    async fn status(&self, task_id: &TaskId) -> Result<StatusResponse, ClientError>;
    async fn result(&self, task_id: &TaskId) -> Result<TaskSnapshot, ClientError>;
    async fn submit_review(&self, batch: &ReviewBatch) -> Result<ReviewAck, ClientError>;
    async fn health(&self) -> Result<HealthResponse, ClientError>;
}

pub struct HttpContractApi {
    http: Client,
    base_url: Url,
}

impl HttpContractApi {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Validation(format!(
                "backend url {base_url} cannot carry api paths"
            )));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        // cannot_be_a_base urls are rejected in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn contracts_endpoint(&self, tail: &[&str]) -> Url {
        let segments: Vec<&str> = API_PREFIX.iter().copied().chain(tail.iter().copied()).collect();
        self.endpoint(&segments)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let detail = serde_json::from_slice::<ApiErrorBody>(&bytes)
            .ok()
            .and_then(|body| body.message())
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(&bytes).trim().to_string();
                if text.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                } else {
                    text
                }
            });
        return Err(ClientError::Rejected {
            status: status.as_u16(),
            detail,
        });
    }

    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl ContractApi for HttpContractApi {
    async fn compare(&self, request: &CompareRequest) -> Result<CompareResponse, ClientError> {
        let url = self.contracts_endpoint(&["compare"]);
        debug!(%url, "api: submitting comparison");
        let response = self.http.post(url).json(request).send().await?;
        read_json(response).await
    }

    async fn status(&self, task_id: &TaskId) -> Result<StatusResponse, ClientError> {
        let response = self
            .http
            .get(self.contracts_endpoint(&["status", task_id.as_str()]))
            .send()
            .await?;
        read_json(response).await
    }

    async fn result(&self, task_id: &TaskId) -> Result<TaskSnapshot, ClientError> {
        let response = self
            .http
            .get(self.contracts_endpoint(&["result", task_id.as_str()]))
            .send()
            .await?;
        read_json(response).await
    }

    async fn submit_review(&self, batch: &ReviewBatch) -> Result<ReviewAck, ClientError> {
        let url = self.contracts_endpoint(&["review"]);
        debug!(%url, task_id = %batch.task_id, reviews = batch.reviews.len(), "api: submitting review");
        let response = self.http.post(url).json(batch).send().await?;
        read_json(response).await
    }

    async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.http.get(self.endpoint(&["health"])).send().await?;
        read_json(response).await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

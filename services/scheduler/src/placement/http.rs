//! Backend that talks to a scheduler over HTTP.

use async_trait::async_trait;
use crewboard_id::AllocationId;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::backend::{AllocationBackend, BackendError};
use crate::model::{Allocation, AllocationPatch, NewAllocation};

/// Client for the `/v1/allocations` endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        id: Option<AllocationId>,
    ) -> Result<T, BackendError> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| BackendError::Transport(format!("failed to parse response: {e}")))
        } else {
            Err(self.handle_error(response, id).await)
        }
    }

    /// Turns a problem-details body into a typed error.
    async fn handle_error(
        &self,
        response: reqwest::Response,
        id: Option<AllocationId>,
    ) -> BackendError {
        let status = response.status();
        let problem: ProblemBody = response.json().await.unwrap_or_else(|_| ProblemBody {
            code: None,
            detail: None,
            title: status.canonical_reason().map(str::to_string),
            retryable: None,
        });

        debug!(status = status.as_u16(), code = ?problem.code, "Allocation request failed");

        if let (StatusCode::NOT_FOUND, Some(id)) = (status, id) {
            return BackendError::NotFound(id);
        }

        let message = problem
            .detail
            .or(problem.title)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        if status.is_server_error() || problem.retryable == Some(true) {
            return BackendError::Transport(message);
        }

        BackendError::Rejected {
            code: problem
                .code
                .unwrap_or_else(|| format!("http_{}", status.as_u16())),
            message,
        }
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

#[async_trait]
impl AllocationBackend for HttpBackend {
    async fn create(&self, new: NewAllocation) -> Result<Allocation, BackendError> {
        let response = self
            .client
            .post(self.url("/v1/allocations"))
            .json(&new)
            .send()
            .await
            .map_err(transport)?;

        self.handle_response(response, None).await
    }

    async fn update(
        &self,
        id: AllocationId,
        patch: AllocationPatch,
    ) -> Result<Allocation, BackendError> {
        let response = self
            .client
            .patch(self.url(&format!("/v1/allocations/{id}")))
            .json(&patch)
            .send()
            .await
            .map_err(transport)?;

        self.handle_response(response, Some(id)).await
    }

    async fn delete(&self, id: AllocationId) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.url(&format!("/v1/allocations/{id}")))
            .send()
            .await
            .map_err(transport)?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.handle_error(response, Some(id)).await)
        }
    }
}

/// The fields of a problem-details body the client acts on.
#[derive(Debug, Deserialize)]
struct ProblemBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    retryable: Option<bool>,
}

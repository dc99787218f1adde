//! HTTP implementation of [`TaskApi`] on top of `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ApiError, ApiResult, HealthStatus, TaskApi, TaskQuery};
use crate::model::{BulkPatch, NewTask, ProjectId, Task, TaskId, TaskPatch, Zone};

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    /// API root, e.g. `http://localhost:8080/api/v1`.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl HttpApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// `PATCH /tasks/bulk` answers either with the updated rows or, on older
/// servers, with a summary of the ids it touched.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BulkUpdateResponse {
    Rows(Vec<Task>),
    Summary { ids: Vec<TaskId> },
}

/// Task API client speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpTaskApi {
    /// Build a client for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the underlying client cannot be
    /// constructed (e.g. TLS backend initialisation failure).
    pub fn new(config: HttpApiConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ApiError::transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
        })
    }

    /// The API root this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    fn map_send_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout {
                after_ms: self.timeout_ms,
            }
        } else if err.is_decode() {
            ApiError::decode(err.to_string())
        } else {
            ApiError::transport(err.to_string())
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = body.trim();
        Err(ApiError::status(
            status.as_u16(),
            if message.is_empty() {
                status.canonical_reason().unwrap_or("request failed")
            } else {
                message
            },
        ))
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> ApiResult<T> {
        let bytes = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::decode(e.to_string()))
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = self.send(builder).await?;
        self.decode(response).await
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn health(&self) -> ApiResult<HealthStatus> {
        self.fetch(self.request(Method::GET, "/health")).await
    }

    async fn fetch_zone_tree(&self, project: ProjectId) -> ApiResult<Vec<Zone>> {
        debug!("GET zone tree for project {}", project);
        let zones: Option<Vec<Zone>> = self
            .fetch(self.request(Method::GET, &format!("/zones/{project}/tree")))
            .await?;
        // an empty project encodes as `null`
        Ok(zones.unwrap_or_default())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<Vec<Task>> {
        debug!("GET tasks {:?}", query.to_pairs());
        let tasks: Option<Vec<Task>> = self
            .fetch(self.request(Method::GET, "/tasks").query(&query.to_pairs()))
            .await?;
        Ok(tasks.unwrap_or_default())
    }

    async fn get_task(&self, id: TaskId) -> ApiResult<Task> {
        self.fetch(self.request(Method::GET, &format!("/tasks/{id}")))
            .await
    }

    async fn create_task(&self, task: &NewTask) -> ApiResult<Task> {
        self.fetch(self.request(Method::POST, "/tasks").json(task))
            .await
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> ApiResult<Task> {
        let response = self
            .send(self.request(Method::PATCH, &format!("/tasks/{id}")).json(patch))
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            // the change is committed; read back the canonical row
            debug!("PATCH /tasks/{} returned no body, re-reading", id);
            return self.get_task(id).await;
        }
        self.decode(response).await
    }

    async fn create_tasks(&self, tasks: &[NewTask]) -> ApiResult<Vec<Task>> {
        self.fetch(self.request(Method::POST, "/tasks/bulk").json(tasks))
            .await
    }

    async fn update_tasks(&self, patches: &[BulkPatch]) -> ApiResult<Vec<Task>> {
        let response = self
            .send(self.request(Method::PATCH, "/tasks/bulk").json(patches))
            .await?;
        match self.decode::<BulkUpdateResponse>(response).await? {
            BulkUpdateResponse::Rows(rows) => Ok(rows),
            BulkUpdateResponse::Summary { ids } => {
                let mut rows = Vec::with_capacity(ids.len());
                for id in ids {
                    rows.push(self.get_task(id).await?);
                }
                Ok(rows)
            }
        }
    }
}

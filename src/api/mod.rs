//! Remote task/zone service boundary.
//!
//! The sync core only depends on the [`TaskApi`] trait; [`HttpTaskApi`] is
//! the production implementation and [`crate::testing::MockTaskApi`] the
//! in-memory one used by tests.
//!
//! Timeouts are enforced here and reported as [`ApiError::Timeout`], which
//! callers treat as a transient failure.

pub mod error;
pub mod http;
pub mod query;

pub use error::ApiError;
pub use http::HttpTaskApi;
pub use query::TaskQuery;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{BulkPatch, NewTask, ProjectId, Task, TaskId, TaskPatch, Zone};

/// Result of a remote call.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Server clock, unix seconds.
    #[serde(default)]
    pub time: i64,
}

impl HealthStatus {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// The remote system of record for zones and tasks.
///
/// Every mutating call returns the canonical server row(s).
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// `GET /health`
    async fn health(&self) -> ApiResult<HealthStatus>;

    /// `GET /zones/{project}/tree`
    async fn fetch_zone_tree(&self, project: ProjectId) -> ApiResult<Vec<Zone>>;

    /// `GET /tasks?project_id=&zone_ids=&date_from=&date_to=`
    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<Vec<Task>>;

    /// `GET /tasks/{id}`
    async fn get_task(&self, id: TaskId) -> ApiResult<Task>;

    /// `POST /tasks`
    async fn create_task(&self, task: &NewTask) -> ApiResult<Task>;

    /// `PATCH /tasks/{id}`
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> ApiResult<Task>;

    /// `POST /tasks/bulk`
    async fn create_tasks(&self, tasks: &[NewTask]) -> ApiResult<Vec<Task>>;

    /// `PATCH /tasks/bulk`
    async fn update_tasks(&self, patches: &[BulkPatch]) -> ApiResult<Vec<Task>>;
}

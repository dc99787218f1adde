//! Selection-driven task loads.
//!
//! Every load captures the selection it was issued for. When the response
//! arrives the selection is compared again under the state lock; if it moved
//! on, or a newer load was issued meanwhile, the response is dropped.

use chrono::{Days, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backoff::RetryPolicy;
use super::state::SharedTimeline;
use crate::api::{TaskApi, TaskQuery};
use crate::error::{LoadTarget, Result, TaktError};
use crate::model::{ProjectId, Task};
use crate::tasks::{DiscardReason, LoadOutcome, LoadTicket};
use crate::zones::SelectionScope;

/// Reloads the task projection for the current selection.
#[derive(Clone)]
pub struct TaskLoader {
    api: Arc<dyn TaskApi>,
    timeline: SharedTimeline,
    project_id: ProjectId,
    scope: SelectionScope,
    retry: RetryPolicy,
    window_days: Option<u32>,
}

impl TaskLoader {
    pub fn new(api: Arc<dyn TaskApi>, timeline: SharedTimeline, project_id: ProjectId) -> Self {
        Self {
            api,
            timeline,
            project_id,
            scope: SelectionScope::default(),
            retry: RetryPolicy::default(),
            window_days: None,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: SelectionScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Only load tasks starting within `days` of today.
    #[must_use]
    pub fn with_window_days(mut self, days: Option<u32>) -> Self {
        self.window_days = days;
        self
    }

    #[must_use]
    pub fn scope(&self) -> SelectionScope {
        self.scope
    }

    /// Load the tasks for whatever is selected right now.
    ///
    /// An empty selection clears the projection without a request.
    ///
    /// # Errors
    ///
    /// Returns [`TaktError::Load`] when the list cannot be fetched after
    /// retries; the projection keeps its previous rows.
    pub async fn reload(&self) -> Result<LoadOutcome> {
        let scope = self.scope;
        let (project_id, ticket) = self
            .timeline
            .write(|state| {
                let project = state.zones.project_id().unwrap_or(self.project_id);
                (project, state.begin_load(scope))
            })
            .await;

        if ticket.zone_ids().is_empty() {
            debug!("Selection empty, clearing tasks");
            return Ok(self.finish(&ticket, Vec::new()).await);
        }

        let (from, to) = self.window(Utc::now().date_naive());
        let query = TaskQuery::new(project_id)
            .with_zones(ticket.zone_ids().iter().copied())
            .with_range(from, to);
        debug!(
            "Loading tasks for zones {:?} (load {})",
            ticket.zone_ids(),
            ticket.generation()
        );

        let tasks = self.fetch_with_retry(&query).await?;
        Ok(self.finish(&ticket, tasks).await)
    }

    async fn finish(&self, ticket: &LoadTicket, tasks: Vec<Task>) -> LoadOutcome {
        let scope = self.scope;
        let outcome = self
            .timeline
            .write(|state| state.finish_load(ticket, scope, tasks))
            .await;
        match outcome {
            LoadOutcome::Applied { tasks } => {
                info!("Loaded {} tasks for zones {:?}", tasks, ticket.zone_ids());
            }
            LoadOutcome::Discarded(DiscardReason::SelectionChanged) => {
                debug!(
                    "Discarding load {}: selection changed from {:?}",
                    ticket.generation(),
                    ticket.zone_ids()
                );
            }
            LoadOutcome::Discarded(DiscardReason::Superseded) => {
                debug!("Discarding load {}: newer load issued", ticket.generation());
            }
        }
        outcome
    }

    /// Retry only transient list failures; the list read is idempotent.
    async fn fetch_with_retry(&self, query: &TaskQuery) -> Result<Vec<Task>> {
        let mut retry = 0;
        loop {
            match self.api.list_tasks(query).await {
                Ok(tasks) => return Ok(tasks),
                Err(e) if e.is_transient() && retry < self.retry.retries => {
                    retry += 1;
                    let delay = self.retry.delay_for(retry);
                    warn!(
                        "Task load failed ({}), retry {}/{} in {:?}",
                        e, retry, self.retry.retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!("Task load failed: {}", e);
                    return Err(TaktError::load(LoadTarget::Tasks, e));
                }
            }
        }
    }

    fn window(&self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self.window_days {
            Some(days) => {
                let span = Days::new(u64::from(days));
                (today.checked_sub_days(span), today.checked_add_days(span))
            }
            None => (None, None),
        }
    }
}

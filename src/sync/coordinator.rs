//! Edit Coordinator.
//!
//! Turns operator gestures into an optimistic local change plus a remote
//! request, then reconciles:
//!
//! ```text
//!            apply_optimistic ──► PATCH /tasks/{id}
//!                                    │
//!            ┌───────────── ok ──────┴────── err ──────────────┐
//!            ▼                                                 ▼
//!   confirm(canonical)                             rollback(token)
//!                                                      │
//!                                  transient? ──► reload selection
//!                                  permanent? ──► surface message only
//! ```
//!
//! The mutation itself is never retried; only the reload is.

use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::loader::TaskLoader;
use super::state::SharedTimeline;
use crate::api::{ApiError, TaskApi};
use crate::config::DurationPolicy;
use crate::error::{Result, TaktError};
use crate::model::{
    span_days, BulkPatch, NewTask, ProjectId, Task, TaskDraft, TaskId, TaskPatch, ZoneId,
};
use crate::tasks::{RollbackOutcome, RollbackToken};
use crate::zones::ZoneHierarchyStore;

/// Applies operator edits against the shared timeline and the remote API.
#[derive(Clone)]
pub struct EditCoordinator {
    api: Arc<dyn TaskApi>,
    timeline: SharedTimeline,
    loader: TaskLoader,
    project_id: ProjectId,
    duration_policy: DurationPolicy,
}

impl EditCoordinator {
    pub fn new(
        api: Arc<dyn TaskApi>,
        timeline: SharedTimeline,
        loader: TaskLoader,
        project_id: ProjectId,
    ) -> Self {
        Self {
            api,
            timeline,
            loader,
            project_id,
            duration_policy: DurationPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_duration_policy(mut self, policy: DurationPolicy) -> Self {
        self.duration_policy = policy;
        self
    }

    // =========================================================================
    // Gestures
    // =========================================================================

    /// Drag a bar to another day and/or zone.
    pub async fn move_task(
        &self,
        task_id: TaskId,
        start_date: NaiveDate,
        zone_id: ZoneId,
    ) -> Result<Task> {
        self.edit(task_id, TaskPatch::moved(start_date, zone_id)).await
    }

    /// Drag a bar edge. The duration is the number of days between `start`
    /// and `end`, counting a partial day as a whole one.
    pub async fn resize_task(
        &self,
        task_id: TaskId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Task> {
        let duration = self.resolve_duration(span_days(start, end))?;
        self.edit(task_id, TaskPatch::resized(start.date(), duration))
            .await
    }

    /// Form-based edit of an existing task.
    pub async fn update_task(&self, task_id: TaskId, patch: TaskPatch) -> Result<Task> {
        self.edit(task_id, patch).await
    }

    /// Create a task. Nothing is inserted locally until the server answers.
    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task> {
        let new_task = self
            .timeline
            .read(|state| self.resolve_draft(&state.zones, draft))
            .await?;

        match self.api.create_task(&new_task).await {
            Ok(task) => {
                info!("Created task {} in zone {}", task.id, task.zone_id);
                self.timeline
                    .write(|state| state.upsert_task(task.clone()))
                    .await;
                Ok(task)
            }
            Err(e) => {
                warn!("Create failed: {}", e);
                Err(TaktError::mutation(None, e))
            }
        }
    }

    /// Create several tasks in one request; all-or-nothing locally.
    pub async fn create_tasks(&self, drafts: Vec<TaskDraft>) -> Result<Vec<Task>> {
        let new_tasks = self
            .timeline
            .read(|state| {
                drafts
                    .into_iter()
                    .map(|draft| self.resolve_draft(&state.zones, draft))
                    .collect::<Result<Vec<NewTask>>>()
            })
            .await?;

        match self.api.create_tasks(&new_tasks).await {
            Ok(tasks) => {
                info!("Created {} tasks", tasks.len());
                self.timeline
                    .write(|state| {
                        for task in &tasks {
                            state.upsert_task(task.clone());
                        }
                    })
                    .await;
                Ok(tasks)
            }
            Err(e) => {
                warn!("Bulk create failed: {}", e);
                Err(TaktError::mutation(None, e))
            }
        }
    }

    /// Apply several patches optimistically and send them in one request.
    ///
    /// Each task is reconciled on its own: returned rows are confirmed,
    /// tasks missing from the response are rolled back and trigger a reload.
    pub async fn update_tasks(&self, patches: Vec<BulkPatch>) -> Result<Vec<Task>> {
        let tokens = self
            .timeline
            .write(|state| {
                let mut tokens: Vec<RollbackToken> = Vec::with_capacity(patches.len());
                for item in &patches {
                    let applied = validate_patch(&state.zones, &item.patch)
                        .and_then(|()| state.apply_optimistic(item.id, &item.patch));
                    match applied {
                        Ok(token) => tokens.push(token),
                        Err(e) => {
                            for token in tokens.drain(..).rev() {
                                state.rollback(token);
                            }
                            return Err(e);
                        }
                    }
                }
                Ok(tokens)
            })
            .await?;

        match self.api.update_tasks(&patches).await {
            Ok(rows) => {
                let missing = self
                    .timeline
                    .write(|state| {
                        let mut missing = 0;
                        for token in &tokens {
                            match rows.iter().find(|row| row.id == token.task_id()) {
                                Some(row) => {
                                    state.confirm(*token, row.clone());
                                }
                                None => {
                                    state.rollback(*token);
                                    missing += 1;
                                }
                            }
                        }
                        missing
                    })
                    .await;
                if missing > 0 {
                    warn!("{} tasks missing from bulk update response", missing);
                    self.resync().await;
                }
                Ok(rows)
            }
            Err(e) => {
                self.timeline
                    .write(|state| {
                        for token in tokens.iter().rev() {
                            state.rollback(*token);
                        }
                    })
                    .await;
                let err = TaktError::mutation(None, e);
                warn!("Bulk update failed: {}", err);
                if err.requires_reload() {
                    self.resync().await;
                }
                Err(err)
            }
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    async fn edit(&self, task_id: TaskId, patch: TaskPatch) -> Result<Task> {
        let token = self
            .timeline
            .write(|state| {
                validate_patch(&state.zones, &patch)?;
                state.apply_optimistic(task_id, &patch)
            })
            .await?;
        debug!(
            "Applied edit {} to task {}: {:?}",
            token.seq(),
            task_id,
            patch.fields()
        );

        match self.api.update_task(task_id, &patch).await {
            Ok(canonical) => {
                let outcome = self
                    .timeline
                    .write(|state| state.confirm(token, canonical.clone()))
                    .await;
                debug!("Edit {} on task {} confirmed: {:?}", token.seq(), task_id, outcome);
                Ok(canonical)
            }
            Err(e) => Err(self.fail(token, e).await),
        }
    }

    async fn fail(&self, token: RollbackToken, source: ApiError) -> TaktError {
        let outcome = self.timeline.write(|state| state.rollback(token)).await;
        let err = TaktError::mutation(Some(token.task_id()), source);
        match outcome {
            RollbackOutcome::Restored => warn!("{}; rolled back", err),
            RollbackOutcome::Superseded => {
                warn!("{}; newer edit still pending, nothing rolled back", err);
            }
            RollbackOutcome::Stale => debug!("{}; edit already resolved", err),
        }
        if err.requires_reload() {
            self.resync().await;
        }
        err
    }

    /// Authoritative reload after a failure of unknown effect. Its own
    /// failure is logged; the mutation error is what the caller sees.
    async fn resync(&self) {
        if let Err(e) = self.loader.reload().await {
            warn!("Reload after failed edit also failed: {}", e);
        }
    }

    // =========================================================================
    // Input resolution
    // =========================================================================

    fn resolve_duration(&self, days: i64) -> Result<u32> {
        if days >= 1 {
            return u32::try_from(days).map_err(|_| TaktError::InvalidDuration { days });
        }
        match self.duration_policy {
            DurationPolicy::Clamp => {
                debug!("Clamping resize duration {} to 1", days);
                Ok(1)
            }
            DurationPolicy::Reject => Err(TaktError::InvalidDuration { days }),
        }
    }

    fn resolve_draft(&self, zones: &ZoneHierarchyStore, draft: TaskDraft) -> Result<NewTask> {
        draft
            .validate()
            .map_err(|reason| TaktError::InvalidTask { reason })?;
        let zone_id = draft
            .zone_id
            .or_else(|| zones.last_selected())
            .ok_or(TaktError::NoTargetZone)?;
        if !zones.contains(zone_id) {
            return Err(TaktError::UnknownZone { zone_id });
        }
        let project_id = zones.project_id().unwrap_or(self.project_id);
        Ok(draft.into_new_task(project_id, zone_id))
    }
}

fn validate_patch(zones: &ZoneHierarchyStore, patch: &TaskPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(TaktError::InvalidTask {
            reason: "nothing to change".to_string(),
        });
    }
    if patch.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(TaktError::InvalidTask {
            reason: "task name must not be empty".to_string(),
        });
    }
    if patch.duration == Some(0) {
        return Err(TaktError::InvalidDuration { days: 0 });
    }
    if let Some(zone_id) = patch.zone_id {
        if !zones.contains(zone_id) {
            return Err(TaktError::UnknownZone { zone_id });
        }
    }
    Ok(())
}

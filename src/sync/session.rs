//! One mounted timeline: api, shared state, loader, and editor wired
//! together.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::backoff::ReconnectPolicy;
use super::coordinator::EditCoordinator;
use super::live::{LiveUpdateChannel, PushConnector};
use super::loader::TaskLoader;
use super::state::{SharedTimeline, StoreChange};
use crate::api::TaskApi;
use crate::config::TaktConfig;
use crate::error::{LoadTarget, Result, TaktError};
use crate::model::{ProjectId, Task, TaskId, ZoneId};
use crate::tasks::LoadOutcome;
use crate::view::{compose, TimelineView, ViewSettings, ViewWatcher};
use crate::zones::SelectMode;

/// Entry point for a client of the sync core.
///
/// # Example
///
/// ```rust,ignore
/// let session = TimelineSession::from_config(api, &config);
/// session.load_zones().await?;
/// session.select_zone(ZoneId(5), SelectMode::Replace).await?;
/// session.editor().move_task(TaskId(42), start, ZoneId(6)).await?;
/// let view = session.view().await;
/// ```
pub struct TimelineSession {
    api: Arc<dyn TaskApi>,
    timeline: SharedTimeline,
    loader: TaskLoader,
    editor: EditCoordinator,
    project_id: ProjectId,
    settings: ViewSettings,
    reconnect: ReconnectPolicy,
}

impl TimelineSession {
    /// Session with default loader, editor, and view settings.
    pub fn new(api: Arc<dyn TaskApi>, project_id: ProjectId) -> Self {
        Self::build(api, project_id, &TaktConfig::default())
    }

    pub fn from_config(api: Arc<dyn TaskApi>, config: &TaktConfig) -> Self {
        Self::build(api, config.project(), config)
    }

    fn build(api: Arc<dyn TaskApi>, project_id: ProjectId, config: &TaktConfig) -> Self {
        let timeline = SharedTimeline::new();
        let loader = TaskLoader::new(api.clone(), timeline.clone(), project_id)
            .with_scope(config.view.selection_scope)
            .with_retry(config.reload_policy())
            .with_window_days(config.view.window_days);
        let editor = EditCoordinator::new(api.clone(), timeline.clone(), loader.clone(), project_id)
            .with_duration_policy(config.view.duration_policy);
        Self {
            api,
            timeline,
            loader,
            editor,
            project_id,
            settings: config.view_settings(),
            reconnect: config.reconnect_policy(),
        }
    }

    #[must_use]
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Fetch and install the zone tree. Returns the number of zones.
    ///
    /// # Errors
    ///
    /// [`TaktError::Load`] if the fetch fails, [`TaktError::InvalidZoneTree`]
    /// if the tree is malformed. Either way the previous tree stays.
    pub async fn load_zones(&self) -> Result<usize> {
        let project = self.project_id;
        let forest = self.api.fetch_zone_tree(project).await.map_err(|e| {
            warn!("Zone tree load failed: {}", e);
            TaktError::load(LoadTarget::ZoneTree(project), e)
        })?;
        let count = self
            .timeline
            .write(|state| {
                state.install_zones(project, &forest)?;
                Ok::<_, TaktError>(state.zones.arena().len())
            })
            .await?;
        info!("Loaded {} zones for project {}", count, project);
        Ok(count)
    }

    /// Change the selection and reload tasks for it.
    ///
    /// Returns `None` when the gesture left the selection unchanged.
    pub async fn select_zone(&self, zone_id: ZoneId, mode: SelectMode) -> Result<Option<LoadOutcome>> {
        let changed = self
            .timeline
            .write(|state| state.select(zone_id, mode))
            .await?;
        if !changed {
            return Ok(None);
        }
        self.loader.reload().await.map(Some)
    }

    /// Make the selection exactly `zone_ids`, then load once.
    pub async fn select_zones(&self, zone_ids: &[ZoneId]) -> Result<LoadOutcome> {
        self.timeline
            .write(|state| {
                state.clear_selection();
                for zone_id in zone_ids {
                    if !state.zones.selection().contains(*zone_id) {
                        state.select(*zone_id, SelectMode::Toggle)?;
                    }
                }
                Ok::<_, TaktError>(())
            })
            .await?;
        self.loader.reload().await
    }

    pub async fn clear_selection(&self) -> Result<LoadOutcome> {
        self.timeline.write(|state| state.clear_selection()).await;
        self.loader.reload().await
    }

    /// Reload tasks for the current selection.
    pub async fn reload(&self) -> Result<LoadOutcome> {
        self.loader.reload().await
    }

    /// Point-fetch one task and merge it, whether or not it is in view.
    pub async fn refresh_task(&self, task_id: TaskId) -> Result<Task> {
        let task = self
            .api
            .get_task(task_id)
            .await
            .map_err(|e| TaktError::load(LoadTarget::Task(task_id), e))?;
        self.timeline
            .write(|state| state.upsert_task(task.clone()))
            .await;
        Ok(task)
    }

    /// Compose the view from the current state.
    pub async fn view(&self) -> TimelineView {
        let settings = self.settings;
        self.timeline
            .read(|state| compose(&state.zones, &state.tasks, &settings))
            .await
    }

    /// Start a background view watcher.
    pub async fn watch_view(&self) -> ViewWatcher {
        ViewWatcher::start(self.timeline.clone(), self.settings).await
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.timeline.subscribe()
    }

    /// Build a push channel feeding this session's state.
    pub fn live_channel(&self, connector: Arc<dyn PushConnector>) -> LiveUpdateChannel {
        LiveUpdateChannel::new(
            connector,
            self.api.clone(),
            self.timeline.clone(),
            self.reconnect,
        )
    }

    #[must_use]
    pub fn editor(&self) -> &EditCoordinator {
        &self.editor
    }

    #[must_use]
    pub fn timeline(&self) -> &SharedTimeline {
        &self.timeline
    }

    #[must_use]
    pub fn settings(&self) -> &ViewSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::testing::fixtures::{sample_tasks, zone_forest, PROJECT};
    use crate::testing::{Endpoint, MockTaskApi};

    fn session(api: &MockTaskApi) -> TimelineSession {
        TimelineSession::new(Arc::new(api.clone()), PROJECT)
    }

    #[tokio::test]
    async fn test_load_zones_then_select() {
        let api = MockTaskApi::new()
            .with_zones(zone_forest())
            .with_tasks(sample_tasks());
        let session = session(&api);
        assert_eq!(session.load_zones().await.unwrap(), 10);

        let outcome = session.select_zone(ZoneId(6), SelectMode::Replace).await.unwrap();
        assert_eq!(outcome, Some(LoadOutcome::Applied { tasks: 1 }));
        let again = session.select_zone(ZoneId(6), SelectMode::Replace).await.unwrap();
        assert_eq!(again, None);

        let view = session.view().await;
        assert_eq!(view.events.len(), 1);
    }

    #[tokio::test]
    async fn test_zone_load_failure_keeps_tree() {
        let api = MockTaskApi::new().with_zones(zone_forest());
        let session = session(&api);
        session.load_zones().await.unwrap();

        api.fail_next(Endpoint::ZoneTree, ApiError::status(502, "bad gateway"));
        let err = session.load_zones().await.unwrap_err();
        assert!(matches!(err, TaktError::Load { target: LoadTarget::ZoneTree(_), .. }));
        assert_eq!(session.view().await.resources.len(), 10);
    }

    #[tokio::test]
    async fn test_empty_tree_is_valid() {
        let api = MockTaskApi::new();
        let session = session(&api);
        assert_eq!(session.load_zones().await.unwrap(), 0);
        assert!(session.view().await.resources.is_empty());
    }

    #[tokio::test]
    async fn test_select_zones_and_clear() {
        let api = MockTaskApi::new()
            .with_zones(zone_forest())
            .with_tasks(sample_tasks());
        let session = session(&api);
        session.load_zones().await.unwrap();

        let outcome = session.select_zones(&[ZoneId(5), ZoneId(6)]).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Applied { tasks: 3 });
        let outcome = session.clear_selection().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Applied { tasks: 0 });
        assert!(session.view().await.events.is_empty());
    }
}

//! Shared state behind the sync components.
//!
//! Both stores live behind one lock so a selection check and the task
//! replace it guards happen atomically. All access goes through closures:
//! the guard never escapes, so it can never be held across a network await.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

use crate::error::Result;
use crate::model::{ProjectId, Task, TaskId, TaskPatch, Zone, ZoneId};
use crate::tasks::{
    ConfirmOutcome, LoadOutcome, LoadTicket, RollbackOutcome, RollbackToken, TaskProjectionStore,
};
use crate::zones::{SelectMode, SelectionScope, ZoneHierarchyStore};

/// Capacity of the change broadcast; slow subscribers see `Lagged`.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A mutation observers may need to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    ZonesLoaded,
    SelectionChanged,
    TasksReplaced,
    TaskChanged(TaskId),
}

/// The zone store and task store, mutated together.
#[derive(Debug, Default)]
pub struct TimelineState {
    pub zones: ZoneHierarchyStore,
    pub tasks: TaskProjectionStore,
    changes: Vec<StoreChange>,
}

impl TimelineState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, change: StoreChange) {
        trace!("store change: {:?}", change);
        self.changes.push(change);
    }

    pub(crate) fn take_changes(&mut self) -> Vec<StoreChange> {
        std::mem::take(&mut self.changes)
    }

    // =========================================================================
    // Zones
    // =========================================================================

    /// Install a zone tree. Records a selection change too if pruning
    /// dropped selected zones.
    pub fn install_zones(&mut self, project_id: ProjectId, forest: &[Zone]) -> Result<()> {
        let before = self.zones.selection().clone();
        self.zones.install(project_id, forest)?;
        self.record(StoreChange::ZonesLoaded);
        if self.zones.selection() != &before {
            self.record(StoreChange::SelectionChanged);
        }
        Ok(())
    }

    pub fn select(&mut self, zone_id: ZoneId, mode: SelectMode) -> Result<bool> {
        let changed = self.zones.select(zone_id, mode)?;
        if changed {
            self.record(StoreChange::SelectionChanged);
        }
        Ok(changed)
    }

    pub fn clear_selection(&mut self) -> bool {
        let changed = self.zones.clear_selection();
        if changed {
            self.record(StoreChange::SelectionChanged);
        }
        changed
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Start a load for whatever the selection currently covers.
    pub fn begin_load(&mut self, scope: SelectionScope) -> LoadTicket {
        let zone_ids = self.zones.query_zone_ids(scope);
        self.tasks.begin_load(zone_ids)
    }

    /// Apply a load result if it is still current for the selection.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        scope: SelectionScope,
        tasks: Vec<Task>,
    ) -> LoadOutcome {
        let current = self.zones.query_zone_ids(scope);
        let outcome = self.tasks.finish_load(ticket, &current, tasks);
        if outcome.is_applied() {
            self.record(StoreChange::TasksReplaced);
        }
        outcome
    }

    pub fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks.replace_all(tasks);
        self.record(StoreChange::TasksReplaced);
    }

    pub fn upsert_task(&mut self, task: Task) -> bool {
        let id = task.id;
        let inserted = self.tasks.upsert(task);
        self.record(StoreChange::TaskChanged(id));
        inserted
    }

    pub fn apply_optimistic(&mut self, task_id: TaskId, patch: &TaskPatch) -> Result<RollbackToken> {
        let token = self.tasks.apply_optimistic(task_id, patch)?;
        self.record(StoreChange::TaskChanged(task_id));
        Ok(token)
    }

    pub fn confirm(&mut self, token: RollbackToken, canonical: Task) -> ConfirmOutcome {
        let outcome = self.tasks.confirm(token, canonical);
        if outcome != ConfirmOutcome::Ignored {
            self.record(StoreChange::TaskChanged(token.task_id()));
        }
        outcome
    }

    pub fn rollback(&mut self, token: RollbackToken) -> RollbackOutcome {
        let outcome = self.tasks.rollback(token);
        if outcome == RollbackOutcome::Restored {
            self.record(StoreChange::TaskChanged(token.task_id()));
        }
        outcome
    }
}

/// Fan-out of store changes to any number of observers.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<StoreChange>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl ChangeNotifier {
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    fn publish(&self, changes: Vec<StoreChange>) {
        for change in changes {
            // No receivers is fine.
            let _ = self.sender.send(change);
        }
    }
}

/// Cloneable handle to the timeline state.
#[derive(Debug, Clone, Default)]
pub struct SharedTimeline {
    state: Arc<RwLock<TimelineState>>,
    notifier: ChangeNotifier,
}

impl SharedTimeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against a consistent snapshot.
    pub async fn read<R>(&self, f: impl FnOnce(&TimelineState) -> R) -> R {
        let guard = self.state.read().await;
        f(&guard)
    }

    /// Run `f` with exclusive access, then broadcast what it changed.
    pub async fn write<R>(&self, f: impl FnOnce(&mut TimelineState) -> R) -> R {
        let (result, changes) = {
            let mut guard = self.state.write().await;
            let result = f(&mut guard);
            (result, guard.take_changes())
        };
        self.notifier.publish(changes);
        result
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.notifier.subscribe()
    }

    #[must_use]
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{task, zone_forest, PROJECT};

    #[tokio::test]
    async fn test_write_broadcasts_changes() {
        let shared = SharedTimeline::new();
        let mut rx = shared.subscribe();

        shared
            .write(|state| {
                state.install_zones(PROJECT, &zone_forest())?;
                state.select(ZoneId(5), SelectMode::Replace)
            })
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), StoreChange::ZonesLoaded);
        assert_eq!(rx.recv().await.unwrap(), StoreChange::SelectionChanged);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_write_records_nothing() {
        let shared = SharedTimeline::new();
        let mut rx = shared.subscribe();
        let result = shared
            .write(|state| state.apply_optimistic(TaskId(1), &TaskPatch::default()))
            .await;
        assert!(result.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_read_sees_writes() {
        let shared = SharedTimeline::new();
        shared
            .write(|state| state.replace_tasks(vec![task(1, 5, "2025-08-01", 2)]))
            .await;
        let len = shared.read(|state| state.tasks.len()).await;
        assert_eq!(len, 1);
    }

    #[test]
    fn test_stale_load_not_recorded() {
        let mut state = TimelineState::new();
        state.install_zones(PROJECT, &zone_forest()).unwrap();
        state.select(ZoneId(5), SelectMode::Replace).unwrap();
        let ticket = state.begin_load(SelectionScope::Exact);
        state.select(ZoneId(6), SelectMode::Replace).unwrap();
        state.take_changes();

        let outcome = state.finish_load(&ticket, SelectionScope::Exact, vec![task(1, 5, "2025-08-01", 1)]);
        assert!(!outcome.is_applied());
        assert!(state.take_changes().is_empty());
        assert!(state.tasks.is_empty());
    }
}

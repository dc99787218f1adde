//! Task Projection Store.
//!
//! The authoritative local copy of the tasks in view. Writers are the edit
//! coordinator (optimistic edits and their resolution), the task loader
//! (bulk replace), and the live update channel (point upserts).
//!
//! # Supersede policy
//!
//! At most one optimistic edit per task is outstanding. A second edit on the
//! same task supersedes the first: its token replaces the older one, and the
//! older request's eventual success or failure can no longer overwrite
//! fields the newer edit wrote.
//!
//! ```text
//! apply_optimistic(P1) ─► token1 ─┐
//! apply_optimistic(P2) ─► token2 ─┤  token2 now owns the task
//!                                 │
//! rollback(token1)   ─► Superseded (no-op)
//! confirm(token1, C1) ─► Merged    (C1 beneath P2's overlay)
//! rollback(token2)   ─► Restored  (baseline = pre-P1 or C1)
//! ```

pub mod pending;

pub use pending::{ConfirmOutcome, RollbackOutcome, RollbackToken};

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{Result, TaktError};
use crate::model::{Task, TaskId, TaskPatch, ZoneId};
use pending::PendingEdit;

/// Identifies one task-list load so late results can be recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    zone_ids: Vec<ZoneId>,
}

impl LoadTicket {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Zone ids the load was issued for.
    #[must_use]
    pub fn zone_ids(&self) -> &[ZoneId] {
        &self.zone_ids
    }
}

/// Why a load result was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The selection changed while the load was in flight.
    SelectionChanged,
    /// A newer load was issued after this one.
    Superseded,
}

/// What happened to a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { tasks: usize },
    Discarded(DiscardReason),
}

impl LoadOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Local projection of the tasks currently in view.
#[derive(Debug, Clone, Default)]
pub struct TaskProjectionStore {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    pending: HashMap<TaskId, PendingEdit>,
    /// Highest edit sequence whose canonical row has been applied, per task.
    confirmed: HashMap<TaskId, u64>,
    next_seq: u64,
    load_generation: u64,
}

impl TaskProjectionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks in server order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.index.get(&id).map(|idx| &self.tasks[*idx])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether an optimistic edit on `id` is awaiting resolution.
    #[must_use]
    pub fn has_pending(&self, id: TaskId) -> bool {
        self.pending.contains_key(&id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Swap the whole list. Outstanding edits are re-applied on top of the
    /// fresh rows; edits whose task is gone are dropped.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        let mut seen = HashSet::with_capacity(tasks.len());
        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            if seen.insert(task.id) {
                rows.push(task);
            } else {
                warn!("Duplicate task {} in load result, keeping first", task.id);
            }
        }

        self.pending.retain(|id, _| seen.contains(id));
        self.confirmed.retain(|id, _| seen.contains(id));
        for row in &mut rows {
            if let Some(edit) = self.pending.get_mut(&row.id) {
                edit.rebase(row);
            }
        }

        self.index = rows
            .iter()
            .enumerate()
            .map(|(idx, task)| (task.id, idx))
            .collect();
        self.tasks = rows;
    }

    /// Replace the row with the same id, or append it.
    ///
    /// Rows keep their position; new rows go last. Only the next
    /// `replace_all` restores server order.
    ///
    /// An outstanding optimistic edit on the task stays visible on top of
    /// the new row. Returns true if the task was not present before.
    pub fn upsert(&mut self, mut task: Task) -> bool {
        if let Some(edit) = self.pending.get_mut(&task.id) {
            edit.rebase(&mut task);
        }
        self.put(task)
    }

    fn put(&mut self, task: Task) -> bool {
        match self.index.get(&task.id) {
            Some(idx) => {
                self.tasks[*idx] = task;
                false
            }
            None => {
                self.index.insert(task.id, self.tasks.len());
                self.tasks.push(task);
                true
            }
        }
    }

    /// Write `patch` into the local row immediately.
    ///
    /// The returned token supersedes any older token for the same task.
    ///
    /// # Errors
    ///
    /// Returns [`TaktError::UnknownTask`] if the task is not in the store.
    pub fn apply_optimistic(&mut self, task_id: TaskId, patch: &TaskPatch) -> Result<RollbackToken> {
        let Some(&idx) = self.index.get(&task_id) else {
            return Err(TaktError::UnknownTask { task_id });
        };
        self.next_seq += 1;
        let seq = self.next_seq;
        let row = &mut self.tasks[idx];

        let edit = match self.pending.remove(&task_id) {
            Some(older) => {
                debug!(
                    "Edit {} on task {} supersedes edit {}",
                    seq, task_id, older.seq
                );
                older.supersede(seq, patch, row)
            }
            None => PendingEdit::first(seq, patch, row),
        };
        patch.apply_to(row);
        self.pending.insert(task_id, edit);

        Ok(RollbackToken { task_id, seq })
    }

    /// Merge the server's canonical row for a successful edit.
    ///
    /// A task that a reload dropped while the edit was in flight stays out.
    pub fn confirm(&mut self, token: RollbackToken, mut canonical: Task) -> ConfirmOutcome {
        let task_id = token.task_id;
        if !self.pending.contains_key(&task_id) && !self.index.contains_key(&task_id) {
            debug!(
                "Ignoring response to edit {} on task {}: no longer loaded",
                token.seq, task_id
            );
            return ConfirmOutcome::Ignored;
        }
        if self
            .confirmed
            .get(&task_id)
            .is_some_and(|applied| *applied >= token.seq)
        {
            debug!(
                "Ignoring response to edit {} on task {}: newer row applied",
                token.seq, task_id
            );
            return ConfirmOutcome::Ignored;
        }
        self.confirmed.insert(task_id, token.seq);

        let outcome = match self.pending.get_mut(&task_id) {
            Some(edit) if edit.seq > token.seq => {
                edit.rebase(&mut canonical);
                ConfirmOutcome::Merged
            }
            Some(_) => {
                self.pending.remove(&task_id);
                ConfirmOutcome::Applied
            }
            None => ConfirmOutcome::Applied,
        };
        self.put(canonical);
        outcome
    }

    /// Undo an optimistic edit, if it is still the outstanding one.
    pub fn rollback(&mut self, token: RollbackToken) -> RollbackOutcome {
        let task_id = token.task_id;
        match self.pending.get(&task_id) {
            Some(edit) if edit.seq == token.seq => {
                if let Some(edit) = self.pending.remove(&task_id) {
                    if let Some(&idx) = self.index.get(&task_id) {
                        edit.baseline.apply_to(&mut self.tasks[idx]);
                    }
                }
                debug!("Rolled back edit {} on task {}", token.seq, task_id);
                RollbackOutcome::Restored
            }
            Some(_) => RollbackOutcome::Superseded,
            None => RollbackOutcome::Stale,
        }
    }

    /// Start a load for the given zone ids; any earlier ticket becomes stale.
    pub fn begin_load(&mut self, zone_ids: Vec<ZoneId>) -> LoadTicket {
        self.load_generation += 1;
        LoadTicket {
            generation: self.load_generation,
            zone_ids,
        }
    }

    /// Apply a load result unless the selection moved on or a newer load
    /// was started.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        current_zone_ids: &[ZoneId],
        tasks: Vec<Task>,
    ) -> LoadOutcome {
        if ticket.zone_ids != current_zone_ids {
            return LoadOutcome::Discarded(DiscardReason::SelectionChanged);
        }
        if ticket.generation != self.load_generation {
            return LoadOutcome::Discarded(DiscardReason::Superseded);
        }
        let count = tasks.len();
        self.replace_all(tasks);
        LoadOutcome::Applied { tasks: count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskStatus, ZoneId};
    use crate::testing::fixtures::{date, task};

    fn store_with(tasks: Vec<Task>) -> TaskProjectionStore {
        let mut store = TaskProjectionStore::new();
        store.replace_all(tasks);
        store
    }

    fn moved(start: &str, zone: i64) -> TaskPatch {
        TaskPatch::moved(date(start), ZoneId(zone))
    }

    #[test]
    fn test_upsert_replaces_or_appends() {
        let mut store = store_with(vec![task(1, 5, "2025-08-01", 3)]);
        let mut changed = task(1, 5, "2025-08-02", 3);
        changed.name = "Renamed".into();
        assert!(!store.upsert(changed.clone()));
        assert_eq!(store.get(TaskId(1)), Some(&changed));
        assert!(store.upsert(task(2, 6, "2025-08-01", 1)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_upsert_same_row_is_idempotent() {
        let rows = vec![task(1, 5, "2025-08-01", 3), task(2, 6, "2025-08-02", 2)];
        let mut store = store_with(rows.clone());
        store.upsert(rows[1].clone());
        assert_eq!(store.tasks(), rows.as_slice());
    }

    #[test]
    fn test_replace_all_dedups() {
        let store = store_with(vec![
            task(1, 5, "2025-08-01", 3),
            task(1, 6, "2025-08-09", 3),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(TaskId(1)).unwrap().zone_id, ZoneId(5));
    }

    #[test]
    fn test_optimistic_then_rollback_restores() {
        let original = task(42, 5, "2025-08-01", 3);
        let mut store = store_with(vec![original.clone()]);
        let token = store
            .apply_optimistic(TaskId(42), &moved("2025-08-05", 6))
            .unwrap();
        let row = store.get(TaskId(42)).unwrap();
        assert_eq!(row.zone_id, ZoneId(6));
        assert_eq!(row.start_date, date("2025-08-05"));

        assert_eq!(store.rollback(token), RollbackOutcome::Restored);
        assert_eq!(store.get(TaskId(42)), Some(&original));
        assert_eq!(store.rollback(token), RollbackOutcome::Stale);
    }

    #[test]
    fn test_optimistic_unknown_task() {
        let mut store = TaskProjectionStore::new();
        let err = store
            .apply_optimistic(TaskId(7), &TaskPatch::default())
            .unwrap_err();
        assert!(matches!(err, TaktError::UnknownTask { .. }));
    }

    #[test]
    fn test_confirm_applies_canonical() {
        let mut store = store_with(vec![task(42, 5, "2025-08-01", 3)]);
        let token = store
            .apply_optimistic(TaskId(42), &moved("2025-08-05", 6))
            .unwrap();
        let canonical = task(42, 6, "2025-08-05", 3);
        assert_eq!(store.confirm(token, canonical.clone()), ConfirmOutcome::Applied);
        assert_eq!(store.get(TaskId(42)), Some(&canonical));
        assert!(!store.has_pending(TaskId(42)));
    }

    #[test]
    fn test_supersede_both_fail_restores_pre_first() {
        let original = task(42, 5, "2025-08-01", 3);
        let mut store = store_with(vec![original.clone()]);
        let t1 = store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();
        let t2 = store
            .apply_optimistic(TaskId(42), &TaskPatch::resized(date("2025-08-07"), 4))
            .unwrap();

        assert_eq!(store.rollback(t1), RollbackOutcome::Superseded);
        // P2 still visible after P1 failed
        assert_eq!(store.get(TaskId(42)).unwrap().start_date, date("2025-08-07"));

        assert_eq!(store.rollback(t2), RollbackOutcome::Restored);
        assert_eq!(store.get(TaskId(42)), Some(&original));
    }

    #[test]
    fn test_supersede_both_fail_newer_first() {
        let original = task(42, 5, "2025-08-01", 3);
        let mut store = store_with(vec![original.clone()]);
        let t1 = store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();
        let t2 = store.apply_optimistic(TaskId(42), &moved("2025-08-09", 7)).unwrap();
        assert_eq!(store.rollback(t2), RollbackOutcome::Restored);
        assert_eq!(store.rollback(t1), RollbackOutcome::Stale);
        assert_eq!(store.get(TaskId(42)), Some(&original));
    }

    #[test]
    fn test_older_success_after_newer_success_is_ignored() {
        let mut store = store_with(vec![task(42, 5, "2025-08-01", 3)]);
        let t1 = store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();
        let t2 = store.apply_optimistic(TaskId(42), &moved("2025-08-09", 7)).unwrap();

        let c2 = task(42, 7, "2025-08-09", 3);
        assert_eq!(store.confirm(t2, c2.clone()), ConfirmOutcome::Applied);
        assert_eq!(
            store.confirm(t1, task(42, 6, "2025-08-05", 3)),
            ConfirmOutcome::Ignored
        );
        assert_eq!(store.get(TaskId(42)), Some(&c2));
    }

    #[test]
    fn test_older_success_merges_beneath_newer_overlay() {
        let mut store = store_with(vec![task(42, 5, "2025-08-01", 3)]);
        let t1 = store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();
        let status = TaskPatch {
            status: Some(TaskStatus::InProgress),
            start_date: Some(date("2025-08-06")),
            ..TaskPatch::default()
        };
        let t2 = store.apply_optimistic(TaskId(42), &status).unwrap();

        let mut c1 = task(42, 6, "2025-08-05", 3);
        c1.name = "Server name".into();
        assert_eq!(store.confirm(t1, c1), ConfirmOutcome::Merged);
        let row = store.get(TaskId(42)).unwrap();
        assert_eq!(row.name, "Server name");
        assert_eq!(row.start_date, date("2025-08-06"));
        assert_eq!(row.status, TaskStatus::InProgress);
        assert!(store.has_pending(TaskId(42)));

        // P2 fails: fall back to what the server confirmed for P1
        assert_eq!(store.rollback(t2), RollbackOutcome::Restored);
        let row = store.get(TaskId(42)).unwrap();
        assert_eq!(row.start_date, date("2025-08-05"));
        assert_eq!(row.zone_id, ZoneId(6));
        assert_eq!(row.status, TaskStatus::Planned);
    }

    #[test]
    fn test_older_success_after_newer_failure_applies() {
        let mut store = store_with(vec![task(42, 5, "2025-08-01", 3)]);
        let t1 = store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();
        let t2 = store.apply_optimistic(TaskId(42), &moved("2025-08-09", 7)).unwrap();
        store.rollback(t2);
        let c1 = task(42, 6, "2025-08-05", 3);
        assert_eq!(store.confirm(t1, c1.clone()), ConfirmOutcome::Applied);
        assert_eq!(store.get(TaskId(42)), Some(&c1));
    }

    #[test]
    fn test_reload_keeps_outstanding_overlay() {
        let mut store = store_with(vec![task(42, 5, "2025-08-01", 3)]);
        let token = store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();

        let mut fresh = task(42, 5, "2025-08-01", 3);
        fresh.name = "Renamed elsewhere".into();
        store.replace_all(vec![fresh]);
        let row = store.get(TaskId(42)).unwrap();
        assert_eq!(row.zone_id, ZoneId(6));
        assert_eq!(row.name, "Renamed elsewhere");

        assert_eq!(store.rollback(token), RollbackOutcome::Restored);
        let row = store.get(TaskId(42)).unwrap();
        assert_eq!(row.zone_id, ZoneId(5));
        assert_eq!(row.name, "Renamed elsewhere");
    }

    #[test]
    fn test_reload_without_task_drops_pending() {
        let mut store = store_with(vec![task(42, 5, "2025-08-01", 3)]);
        let token = store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();
        store.replace_all(vec![task(1, 5, "2025-08-01", 1)]);
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.rollback(token), RollbackOutcome::Stale);
    }

    #[test]
    fn test_late_success_for_dropped_task_stays_out() {
        let mut store = store_with(vec![task(42, 5, "2025-08-01", 3)]);
        let token = store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();
        store.replace_all(vec![task(1, 7, "2025-08-01", 1)]);

        let outcome = store.confirm(token, task(42, 6, "2025-08-05", 3));
        assert_eq!(outcome, ConfirmOutcome::Ignored);
        assert_eq!(store.len(), 1);
        assert!(store.get(TaskId(42)).is_none());
    }

    #[test]
    fn test_reload_prunes_confirmed_marks() {
        let mut store = store_with(vec![task(42, 5, "2025-08-01", 3), task(43, 6, "2025-08-04", 5)]);
        let token = store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();
        store.confirm(token, task(42, 6, "2025-08-05", 3));
        assert!(store.confirmed.contains_key(&TaskId(42)));

        store.replace_all(vec![task(43, 6, "2025-08-04", 5)]);
        assert!(store.confirmed.is_empty());
    }

    #[test]
    fn test_upsert_of_new_row_appends_without_reordering() {
        let mut store = store_with(vec![task(1, 5, "2025-08-10", 1), task(2, 5, "2025-08-20", 1)]);
        store.upsert(task(3, 5, "2025-08-01", 1));
        let ids: Vec<TaskId> = store.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TaskId(1), TaskId(2), TaskId(3)]);
    }

    #[test]
    fn test_live_upsert_keeps_overlay() {
        let mut store = store_with(vec![task(42, 5, "2025-08-01", 3)]);
        store.apply_optimistic(TaskId(42), &moved("2025-08-05", 6)).unwrap();
        let mut pushed = task(42, 5, "2025-08-01", 3);
        pushed.status = TaskStatus::Completed;
        store.upsert(pushed);
        let row = store.get(TaskId(42)).unwrap();
        assert_eq!(row.zone_id, ZoneId(6));
        assert_eq!(row.status, TaskStatus::Completed);
    }

    #[test]
    fn test_stale_load_discarded() {
        let mut store = TaskProjectionStore::new();
        let first = store.begin_load(vec![ZoneId(5)]);
        let second = store.begin_load(vec![ZoneId(6)]);

        let outcome = store.finish_load(&first, &[ZoneId(6)], vec![task(1, 5, "2025-08-01", 1)]);
        assert_eq!(outcome, LoadOutcome::Discarded(DiscardReason::SelectionChanged));

        let outcome = store.finish_load(&second, &[ZoneId(6)], vec![task(2, 6, "2025-08-01", 1)]);
        assert_eq!(outcome, LoadOutcome::Applied { tasks: 1 });
        assert!(store.tasks().iter().all(|t| t.zone_id == ZoneId(6)));
    }

    #[test]
    fn test_older_load_same_selection_superseded() {
        let mut store = TaskProjectionStore::new();
        let first = store.begin_load(vec![ZoneId(5)]);
        let _second = store.begin_load(vec![ZoneId(5)]);
        let outcome = store.finish_load(&first, &[ZoneId(5)], vec![]);
        assert_eq!(outcome, LoadOutcome::Discarded(DiscardReason::Superseded));
    }
}

//! Outstanding optimistic edits and the tokens that resolve them.

use crate::model::{Task, TaskId, TaskPatch};

/// Handle returned by an optimistic edit, used to confirm or undo it.
///
/// Tokens are ordered per task by their sequence number; a newer token
/// supersedes every older one for the same task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollbackToken {
    pub(crate) task_id: TaskId,
    pub(crate) seq: u64,
}

impl RollbackToken {
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What `rollback` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Pre-edit values were written back.
    Restored,
    /// A newer edit owns the fields now; nothing was touched.
    Superseded,
    /// The edit was already resolved or its task left the view.
    Stale,
}

/// What `confirm` did with a canonical row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The canonical row replaced the local one.
    Applied,
    /// The canonical row was applied beneath a still-outstanding newer edit.
    Merged,
    /// A response to a newer request was already applied; row dropped.
    Ignored,
}

/// The single outstanding edit for one task.
///
/// `overlay` is every optimistically written field (older edits merged
/// with newer ones); `baseline` is what those fields held before the first
/// of them was applied, or the latest server value since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingEdit {
    pub(crate) seq: u64,
    pub(crate) overlay: TaskPatch,
    pub(crate) baseline: TaskPatch,
}

impl PendingEdit {
    pub(crate) fn first(seq: u64, patch: &TaskPatch, row: &Task) -> Self {
        Self {
            seq,
            overlay: patch.clone(),
            baseline: patch.capture(row),
        }
    }

    /// Stack a newer patch on top, keeping the oldest baseline per field.
    pub(crate) fn supersede(self, seq: u64, patch: &TaskPatch, row: &Task) -> Self {
        let mut baseline = patch.capture(row);
        baseline.merge(&self.baseline);
        let mut overlay = self.overlay;
        overlay.merge(patch);
        Self {
            seq,
            overlay,
            baseline,
        }
    }

    /// Re-base on a fresh server row: remember its values as the new
    /// baseline and write the overlay on top of it.
    pub(crate) fn rebase(&mut self, row: &mut Task) {
        self.baseline = self.overlay.capture(row);
        self.overlay.apply_to(row);
    }
}

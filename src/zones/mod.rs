//! Zone Hierarchy Store.
//!
//! Holds the zone forest of one project, the current selection, and derived
//! views of both. The tree is read-mostly: it is replaced wholesale by
//! [`ZoneHierarchyStore::install`] and never edited structurally.
//!
//! # Example
//!
//! ```rust,ignore
//! use takt::zones::{SelectMode, ZoneHierarchyStore};
//!
//! let mut store = ZoneHierarchyStore::new();
//! store.install(project, forest)?;
//! store.select(ZoneId(5), SelectMode::Replace)?;
//! store.select(ZoneId(6), SelectMode::Toggle)?;
//! assert_eq!(store.selection().ids(), &[ZoneId(5), ZoneId(6)]);
//! ```

pub mod arena;
pub mod selection;

pub use arena::{FlatZone, ZoneArena, ZoneNode};
pub use selection::{SelectMode, Selection, SelectionScope};

use std::collections::HashSet;
use tracing::debug;

use crate::error::{Result, TaktError};
use crate::model::{ProjectId, Zone, ZoneId};

/// The zone forest plus selection state for one project.
#[derive(Debug, Clone, Default)]
pub struct ZoneHierarchyStore {
    project_id: Option<ProjectId>,
    arena: ZoneArena,
    selection: Selection,
}

impl ZoneHierarchyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tree with a freshly fetched forest.
    ///
    /// Selected ids that no longer exist are dropped from the selection.
    ///
    /// # Errors
    ///
    /// Returns [`TaktError::InvalidZoneTree`] if the forest violates its
    /// invariants; the previous tree is kept in that case.
    pub fn install(&mut self, project_id: ProjectId, forest: &[Zone]) -> Result<()> {
        let arena = ZoneArena::from_forest(forest)?;
        debug!(
            "Installed {} zones for project {}",
            arena.len(),
            project_id
        );
        self.project_id = Some(project_id);
        self.arena = arena;
        let arena = &self.arena;
        if self.selection.retain(|id| arena.contains(*id)) {
            debug!("Pruned selection to zones present in the new tree");
        }
        Ok(())
    }

    /// Project of the installed tree, if any.
    #[must_use]
    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    #[must_use]
    pub fn arena(&self) -> &ZoneArena {
        &self.arena
    }

    #[must_use]
    pub fn get(&self, id: ZoneId) -> Option<&ZoneNode> {
        self.arena.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: ZoneId) -> bool {
        self.arena.contains(id)
    }

    /// Ordered rows for the timeline, see [`ZoneArena::flatten`].
    #[must_use]
    pub fn flatten(&self) -> Vec<FlatZone> {
        self.arena.flatten()
    }

    /// Apply a selection gesture. Returns true if the selection changed.
    ///
    /// # Errors
    ///
    /// Returns [`TaktError::UnknownZone`] if `zone_id` is not in the tree.
    pub fn select(&mut self, zone_id: ZoneId, mode: SelectMode) -> Result<bool> {
        if !self.arena.contains(zone_id) {
            return Err(TaktError::UnknownZone { zone_id });
        }
        Ok(self.selection.apply(zone_id, mode))
    }

    /// Returns true if anything was selected.
    pub fn clear_selection(&mut self) -> bool {
        self.selection.clear()
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Default zone for newly created tasks.
    #[must_use]
    pub fn last_selected(&self) -> Option<ZoneId> {
        self.selection.last()
    }

    /// Zone ids a task query should cover for the current selection.
    #[must_use]
    pub fn query_zone_ids(&self, scope: SelectionScope) -> Vec<ZoneId> {
        match scope {
            SelectionScope::Exact => self.selection.ids().to_vec(),
            SelectionScope::Subtree => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for id in self.selection.ids() {
                    let subtree = std::iter::once(*id).chain(self.arena.descendants(*id));
                    for zone in subtree {
                        if seen.insert(zone) {
                            out.push(zone);
                        }
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn loaded() -> ZoneHierarchyStore {
        let mut store = ZoneHierarchyStore::new();
        store
            .install(ProjectId(1), &fixtures::zone_forest())
            .unwrap();
        store
    }

    #[test]
    fn test_install_and_flatten() {
        let store = loaded();
        assert_eq!(store.project_id(), Some(ProjectId(1)));
        let rows = store.flatten();
        assert_eq!(rows.first().map(|r| r.indent_level), Some(0));
        assert_eq!(rows.len(), store.arena().len());
    }

    #[test]
    fn test_select_unknown_zone_rejected() {
        let mut store = loaded();
        let err = store.select(ZoneId(999), SelectMode::Replace).unwrap_err();
        assert!(matches!(err, TaktError::UnknownZone { zone_id } if zone_id == ZoneId(999)));
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_replace_then_toggle() {
        let mut store = loaded();
        assert!(store.select(ZoneId(5), SelectMode::Replace).unwrap());
        assert!(store.select(ZoneId(6), SelectMode::Toggle).unwrap());
        assert_eq!(store.selection().ids(), &[ZoneId(5), ZoneId(6)]);
        assert_eq!(store.last_selected(), Some(ZoneId(6)));
        assert!(store.select(ZoneId(6), SelectMode::Replace).unwrap());
        assert_eq!(store.selection().ids(), &[ZoneId(6)]);
    }

    #[test]
    fn test_invalid_tree_keeps_previous() {
        let mut store = loaded();
        store.select(ZoneId(5), SelectMode::Replace).unwrap();
        let before = store.flatten();

        let mut bad = fixtures::zone_forest();
        bad[0].level = 3;
        assert!(store.install(ProjectId(1), &bad).is_err());
        assert_eq!(store.flatten(), before);
        assert_eq!(store.selection().ids(), &[ZoneId(5)]);
    }

    #[test]
    fn test_install_prunes_selection() {
        let mut store = loaded();
        store.select(ZoneId(5), SelectMode::Replace).unwrap();
        store.select(ZoneId(6), SelectMode::Toggle).unwrap();

        let mut forest = fixtures::zone_forest();
        // drop zone 6 from the tree
        forest[0].children[0].children.retain(|z| z.id != ZoneId(6));
        store.install(ProjectId(1), &forest).unwrap();
        assert_eq!(store.selection().ids(), &[ZoneId(5)]);
    }

    #[test]
    fn test_query_zone_ids_scope() {
        let mut store = loaded();
        store.select(ZoneId(2), SelectMode::Replace).unwrap();
        assert_eq!(store.query_zone_ids(SelectionScope::Exact), vec![ZoneId(2)]);
        let subtree = store.query_zone_ids(SelectionScope::Subtree);
        assert_eq!(subtree[0], ZoneId(2));
        assert!(subtree.contains(&ZoneId(5)));
        assert!(subtree.contains(&ZoneId(6)));
        assert!(!subtree.contains(&ZoneId(9)));
    }
}

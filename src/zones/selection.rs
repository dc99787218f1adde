//! Zone selection state.

use serde::{Deserialize, Serialize};

use crate::model::ZoneId;

/// How a click changes the selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMode {
    /// Plain click: the selection becomes exactly the clicked zone.
    #[default]
    Replace,
    /// Modifier click: add if absent, remove if present.
    Toggle,
}

/// Whether selecting a zone also selects everything beneath it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionScope {
    /// Only the selected zone ids themselves.
    #[default]
    Exact,
    /// Selected zones plus all their descendants.
    Subtree,
}

/// The set of chosen zones, in the order they were chosen.
///
/// Empty means "show nothing". The most recently added zone is the default
/// target for newly created tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<ZoneId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a click. Returns true if the selection changed.
    pub fn apply(&mut self, zone_id: ZoneId, mode: SelectMode) -> bool {
        match mode {
            SelectMode::Replace => {
                if self.ids == [zone_id] {
                    return false;
                }
                self.ids.clear();
                self.ids.push(zone_id);
            }
            SelectMode::Toggle => {
                if let Some(pos) = self.ids.iter().position(|id| *id == zone_id) {
                    self.ids.remove(pos);
                } else {
                    self.ids.push(zone_id);
                }
            }
        }
        true
    }

    #[must_use]
    pub fn contains(&self, zone_id: ZoneId) -> bool {
        self.ids.contains(&zone_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Selected ids, oldest first.
    #[must_use]
    pub fn ids(&self) -> &[ZoneId] {
        &self.ids
    }

    /// Most recently selected zone still in the selection.
    #[must_use]
    pub fn last(&self) -> Option<ZoneId> {
        self.ids.last().copied()
    }

    /// Returns true if anything was selected.
    pub fn clear(&mut self) -> bool {
        let changed = !self.ids.is_empty();
        self.ids.clear();
        changed
    }

    /// Keep only ids matching `keep`. Returns true if anything was removed.
    pub fn retain(&mut self, keep: impl FnMut(&ZoneId) -> bool) -> bool {
        let before = self.ids.len();
        self.ids.retain(keep);
        self.ids.len() != before
    }
}

impl FromIterator<ZoneId> for Selection {
    fn from_iter<I: IntoIterator<Item = ZoneId>>(iter: I) -> Self {
        let mut selection = Self::new();
        for id in iter {
            if !selection.contains(id) {
                selection.ids.push(id);
            }
        }
        selection
    }
}

//! Arena representation of the zone forest.
//!
//! Nodes live in a map keyed by id and refer to their children by id, so a
//! malformed payload can never produce an ownership cycle. Structural
//! invariants are checked once, when the arena is built.

use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::error::{Result, TaktError};
use crate::model::{ProjectId, Zone, ZoneId};

/// One zone record with child ids instead of owned children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneNode {
    pub id: ZoneId,
    pub project_id: ProjectId,
    pub parent_id: Option<ZoneId>,
    pub name: String,
    pub level: u32,
    pub path: String,
    pub children: Vec<ZoneId>,
}

impl ZoneNode {
    fn from_wire(zone: &Zone) -> Self {
        Self {
            id: zone.id,
            project_id: zone.project_id,
            parent_id: zone.parent_id,
            name: zone.name.clone(),
            level: zone.level,
            path: zone.path.clone(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A row of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatZone {
    pub zone_id: ZoneId,
    pub name: String,
    pub indent_level: u32,
}

/// Validated zone forest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneArena {
    nodes: HashMap<ZoneId, ZoneNode>,
    roots: Vec<ZoneId>,
}

impl ZoneArena {
    /// Build from the nested wire forest, preserving sibling order.
    ///
    /// # Errors
    ///
    /// Returns [`TaktError::InvalidZoneTree`] when an id repeats, a child
    /// names a different parent, or a level is not its depth.
    pub fn from_forest(forest: &[Zone]) -> Result<Self> {
        let mut arena = Self::default();
        // (zone, parent id, depth)
        let mut stack: Vec<(&Zone, Option<ZoneId>, u32)> =
            forest.iter().rev().map(|z| (z, None, 0)).collect();

        while let Some((zone, parent, depth)) = stack.pop() {
            if arena.nodes.contains_key(&zone.id) {
                return Err(TaktError::invalid_tree(format!(
                    "zone {} appears more than once",
                    zone.id
                )));
            }
            if let (Some(declared), Some(actual)) = (zone.parent_id, parent) {
                if declared != actual {
                    return Err(TaktError::invalid_tree(format!(
                        "zone {} declares parent {} but is nested under {}",
                        zone.id, declared, actual
                    )));
                }
            }
            if parent.is_none() && zone.parent_id.is_some() {
                return Err(TaktError::invalid_tree(format!(
                    "root zone {} declares a parent",
                    zone.id
                )));
            }
            if zone.level != depth {
                return Err(TaktError::invalid_tree(format!(
                    "zone {} has level {} at depth {}",
                    zone.id, zone.level, depth
                )));
            }

            let mut node = ZoneNode::from_wire(zone);
            node.parent_id = parent;
            match parent {
                Some(parent_id) => {
                    if let Some(parent_node) = arena.nodes.get_mut(&parent_id) {
                        parent_node.children.push(zone.id);
                    }
                }
                None => arena.roots.push(zone.id),
            }
            arena.nodes.insert(zone.id, node);

            for child in zone.children.iter().rev() {
                stack.push((child, Some(zone.id), depth + 1));
            }
        }

        Ok(arena)
    }

    /// Build from flat rows linked by `parent_id` (nested `children` are
    /// ignored). Rows whose parent chain ends at a missing zone are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TaktError::InvalidZoneTree`] on duplicate ids, on a zone
    /// that is its own ancestor, or on a level that is not its depth.
    pub fn from_flat(rows: &[Zone]) -> Result<Self> {
        let mut nodes: HashMap<ZoneId, ZoneNode> = HashMap::with_capacity(rows.len());
        for row in rows {
            if nodes.insert(row.id, ZoneNode::from_wire(row)).is_some() {
                return Err(TaktError::invalid_tree(format!(
                    "zone {} appears more than once",
                    row.id
                )));
            }
        }

        // a zone is kept only if its parent chain reaches a root
        let mut kept: HashSet<ZoneId> = HashSet::with_capacity(rows.len());
        let mut dropped: HashSet<ZoneId> = HashSet::new();
        for row in rows {
            let mut chain = Vec::new();
            let mut seen = HashSet::new();
            let mut cursor = Some(row.id);
            let reaches_root = loop {
                let Some(id) = cursor else { break true };
                if kept.contains(&id) {
                    break true;
                }
                if dropped.contains(&id) {
                    break false;
                }
                if !seen.insert(id) {
                    return Err(TaktError::invalid_tree(format!(
                        "zone {id} is its own ancestor"
                    )));
                }
                match nodes.get(&id) {
                    Some(node) => {
                        chain.push(id);
                        cursor = node.parent_id;
                    }
                    None => break false,
                }
            };
            if reaches_root {
                kept.extend(chain);
            } else {
                dropped.extend(chain);
            }
        }
        if !dropped.is_empty() {
            warn!(
                "Dropping {} zone(s) whose parent is missing from the tree",
                dropped.len()
            );
        }

        let mut arena = Self::default();
        for row in rows {
            if !kept.contains(&row.id) {
                continue;
            }
            match row.parent_id {
                None => arena.roots.push(row.id),
                Some(parent_id) => {
                    if let Some(parent) = nodes.get_mut(&parent_id) {
                        parent.children.push(row.id);
                    }
                }
            }
        }
        nodes.retain(|id, _| kept.contains(id));
        arena.nodes = nodes;

        for entry in arena.flatten() {
            let level = arena.nodes.get(&entry.zone_id).map(|n| n.level);
            if level != Some(entry.indent_level) {
                return Err(TaktError::invalid_tree(format!(
                    "zone {} has level {} at depth {}",
                    entry.zone_id,
                    level.unwrap_or_default(),
                    entry.indent_level
                )));
            }
        }

        Ok(arena)
    }

    #[must_use]
    pub fn get(&self, id: ZoneId) -> Option<&ZoneNode> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ZoneId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn roots(&self) -> &[ZoneId] {
        &self.roots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ancestors of `id`, nearest first. Empty for roots and unknown ids.
    #[must_use]
    pub fn ancestors(&self, id: ZoneId) -> Vec<ZoneId> {
        let mut out = Vec::new();
        let mut cursor = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(parent) = cursor {
            out.push(parent);
            cursor = self.nodes.get(&parent).and_then(|n| n.parent_id);
        }
        out
    }

    /// Strict descendants of `id` in pre-order.
    #[must_use]
    pub fn descendants(&self, id: ZoneId) -> Vec<ZoneId> {
        let mut out = Vec::new();
        let mut stack: Vec<ZoneId> = match self.nodes.get(&id) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.nodes.get(&next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Pre-order traversal of the forest, preserving sibling order.
    #[must_use]
    pub fn flatten(&self) -> Vec<FlatZone> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(ZoneId, u32)> = self.roots.iter().rev().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(FlatZone {
                zone_id: id,
                name: node.name.clone(),
                indent_level: depth,
            });
            stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        }
        out
    }
}

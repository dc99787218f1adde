//! Zone wire shape.

use serde::{Deserialize, Serialize};

use super::ids::{ProjectId, ZoneId};

/// A node of the zone forest as returned by `GET /zones/{project}/tree`.
///
/// Children are owned by their parent on the wire only; the store keeps
/// them in an arena keyed by id (see [`crate::zones`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ZoneId>,
    pub name: String,
    /// Depth from the root (roots are level 0).
    pub level: u32,
    /// Materialized path, e.g. `/Building A/Level 2`.
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Zone>,
}

impl Zone {
    /// Leaf zones have no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

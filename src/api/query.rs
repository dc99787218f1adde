//! Task list query parameters.

use chrono::NaiveDate;

use crate::model::{ProjectId, ZoneId};

/// Filter for `GET /tasks`: OR over zone ids, inclusive date range on the
/// start date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub project_id: ProjectId,
    pub zone_ids: Vec<ZoneId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl TaskQuery {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            zone_ids: Vec::new(),
            date_from: None,
            date_to: None,
        }
    }

    #[must_use]
    pub fn with_zones(mut self, zone_ids: impl IntoIterator<Item = ZoneId>) -> Self {
        self.zone_ids = zone_ids.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Whether a task with this zone and start date matches the filter.
    #[must_use]
    pub fn matches(&self, zone_id: ZoneId, start_date: NaiveDate) -> bool {
        (self.zone_ids.is_empty() || self.zone_ids.contains(&zone_id))
            && self.date_from.is_none_or(|from| start_date >= from)
            && self.date_to.is_none_or(|to| start_date <= to)
    }

    /// Query-string pairs in the order the server documents them.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("project_id", self.project_id.to_string())];
        if !self.zone_ids.is_empty() {
            let joined = self
                .zone_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("zone_ids", joined));
        }
        if let Some(from) = self.date_from {
            pairs.push(("date_from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            pairs.push(("date_to", to.format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}

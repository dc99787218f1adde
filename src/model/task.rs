//! Task records, partial updates, and creation drafts.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ProjectId, TaskId, TradeId, ZoneId};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Not started yet.
    #[default]
    Planned,
    /// Work is underway.
    InProgress,
    /// Done.
    Completed,
}

impl TaskStatus {
    /// Wire / CSS spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planned" => Ok(Self::Planned),
            "in-progress" | "in_progress" | "inprogress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!(
                "unknown status '{other}' (expected planned, in-progress, completed)"
            )),
        }
    }
}

/// A scheduled work item occupying one zone for a run of days.
///
/// This is the canonical wire shape returned by the task endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub zone_id: ZoneId,
    pub name: String,
    /// First scheduled day (`YYYY-MM-DD`).
    pub start_date: NaiveDate,
    /// Length in whole days.
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<TradeId>,
    pub status: TaskStatus,
    /// Tie-break ordering within a zone and date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Exclusive end date: `start_date + duration` days.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.start_date
            .checked_add_days(Days::new(u64::from(self.duration)))
            .unwrap_or(NaiveDate::MAX)
    }
}

/// Which task fields a patch touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskField {
    ZoneId,
    Name,
    StartDate,
    Duration,
    Status,
}

/// A partial field set for `PATCH /tasks/{id}`.
///
/// `None` means "leave unchanged" and is omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    /// Patch produced by dragging a bar to another day and row.
    #[must_use]
    pub fn moved(start_date: NaiveDate, zone_id: ZoneId) -> Self {
        Self {
            start_date: Some(start_date),
            zone_id: Some(zone_id),
            ..Self::default()
        }
    }

    /// Patch produced by dragging a bar edge.
    #[must_use]
    pub fn resized(start_date: NaiveDate, duration: u32) -> Self {
        Self {
            start_date: Some(start_date),
            duration: Some(duration),
            ..Self::default()
        }
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Fields this patch sets.
    #[must_use]
    pub fn fields(&self) -> Vec<TaskField> {
        let mut fields = Vec::with_capacity(5);
        if self.zone_id.is_some() {
            fields.push(TaskField::ZoneId);
        }
        if self.name.is_some() {
            fields.push(TaskField::Name);
        }
        if self.start_date.is_some() {
            fields.push(TaskField::StartDate);
        }
        if self.duration.is_some() {
            fields.push(TaskField::Duration);
        }
        if self.status.is_some() {
            fields.push(TaskField::Status);
        }
        fields
    }

    /// Whether this patch sets `field`.
    #[must_use]
    pub fn touches(&self, field: TaskField) -> bool {
        self.fields().contains(&field)
    }

    /// Write every set field into `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(zone_id) = self.zone_id {
            task.zone_id = zone_id;
        }
        if let Some(name) = &self.name {
            task.name.clone_from(name);
        }
        if let Some(start_date) = self.start_date {
            task.start_date = start_date;
        }
        if let Some(duration) = self.duration {
            task.duration = duration;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
    }

    /// Snapshot `task`'s current values for exactly the fields `self` sets.
    #[must_use]
    pub fn capture(&self, task: &Task) -> TaskPatch {
        TaskPatch {
            zone_id: self.zone_id.map(|_| task.zone_id),
            name: self.name.as_ref().map(|_| task.name.clone()),
            start_date: self.start_date.map(|_| task.start_date),
            duration: self.duration.map(|_| task.duration),
            status: self.status.map(|_| task.status),
        }
    }

    /// Overlay `newer` on top of `self`; fields set in `newer` win.
    pub fn merge(&mut self, newer: &TaskPatch) {
        if newer.zone_id.is_some() {
            self.zone_id = newer.zone_id;
        }
        if newer.name.is_some() {
            self.name.clone_from(&newer.name);
        }
        if newer.start_date.is_some() {
            self.start_date = newer.start_date;
        }
        if newer.duration.is_some() {
            self.duration = newer.duration;
        }
        if newer.status.is_some() {
            self.status = newer.status;
        }
    }
}

/// One entry of a `PATCH /tasks/bulk` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkPatch {
    pub id: TaskId,
    #[serde(flatten)]
    pub patch: TaskPatch,
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub zone_id: ZoneId,
    pub name: String,
    pub start_date: NaiveDate,
    pub duration: u32,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<TradeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i32>,
}

/// Operator input for creating a task.
///
/// `zone_id` is optional: when absent the last-selected zone is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: String,
    pub start_date: NaiveDate,
    pub duration: u32,
    pub status: TaskStatus,
    pub zone_id: Option<ZoneId>,
    pub trade_id: Option<TradeId>,
    pub sequence_number: Option<i32>,
}

impl TaskDraft {
    /// Draft with the form defaults (status planned, no zone, no trade).
    pub fn new(name: impl Into<String>, start_date: NaiveDate, duration: u32) -> Self {
        Self {
            name: name.into(),
            start_date,
            duration,
            status: TaskStatus::Planned,
            zone_id: None,
            trade_id: None,
            sequence_number: None,
        }
    }

    #[must_use]
    pub fn with_zone(mut self, zone_id: ZoneId) -> Self {
        self.zone_id = Some(zone_id);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_trade(mut self, trade_id: TradeId) -> Self {
        self.trade_id = Some(trade_id);
        self
    }

    /// Check the fields the form itself enforces.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("task name must not be empty".to_string());
        }
        if self.duration == 0 {
            return Err("duration must be at least one day".to_string());
        }
        Ok(())
    }

    /// Resolve into the wire body for a concrete project and zone.
    #[must_use]
    pub fn into_new_task(self, project_id: ProjectId, zone_id: ZoneId) -> NewTask {
        NewTask {
            project_id,
            zone_id,
            name: self.name,
            start_date: self.start_date,
            duration: self.duration,
            status: self.status,
            trade_id: self.trade_id,
            sequence_number: self.sequence_number,
        }
    }
}

/// Number of days spanned by a resize, rounding any partial day up.
///
/// The result may be zero or negative when `end <= start`; callers decide
/// whether to clamp or reject.
#[must_use]
pub fn span_days(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    let seconds = (end - start).num_seconds();
    // ceil(a / b) == -floor(-a / b)
    -(-seconds).div_euclid(SECONDS_PER_DAY)
}

//! Pure derivation of the widget's rows and bars from store state.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

use crate::model::{Task, TaskId, TaskStatus, TradeId, ZoneId};
use crate::tasks::TaskProjectionStore;
use crate::zones::{SelectionScope, ZoneHierarchyStore};

/// Presentation knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSettings {
    /// Pixels of indent per nesting level.
    pub indent_unit: u32,
    /// Trade used for the color class of tasks without one.
    pub default_trade: TradeId,
    pub scope: SelectionScope,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            indent_unit: 20,
            default_trade: TradeId(1),
            scope: SelectionScope::Exact,
        }
    }
}

/// One timeline row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRow {
    pub id: ZoneId,
    pub name: String,
    pub indent_level: u32,
    pub indent_px: u32,
    pub expanded: bool,
}

/// One task bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventBar {
    pub id: TaskId,
    pub text: String,
    pub start: NaiveDate,
    /// Exclusive.
    pub end: NaiveDate,
    /// Row the bar sits on.
    pub resource: ZoneId,
    pub status: TaskStatus,
    pub css_class: String,
}

/// Everything the widget paints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimelineView {
    pub resources: Vec<ResourceRow>,
    pub events: Vec<EventBar>,
}

impl TimelineView {
    /// Bars on one row, in projection order.
    pub fn events_for(&self, zone_id: ZoneId) -> impl Iterator<Item = &EventBar> {
        self.events.iter().filter(move |bar| bar.resource == zone_id)
    }

    #[must_use]
    pub fn event(&self, task_id: TaskId) -> Option<&EventBar> {
        self.events.iter().find(|bar| bar.id == task_id)
    }
}

/// `trade-color-{trade} status-{status}`.
#[must_use]
pub fn css_class(task: &Task, default_trade: TradeId) -> String {
    format!(
        "trade-color-{} status-{}",
        task.trade_id.unwrap_or(default_trade),
        task.status
    )
}

/// Build the view. Reads both stores, mutates neither.
///
/// Every zone gets a row. A task gets a bar only if its zone passes the
/// selection filter; with nothing selected there are no bars.
#[must_use]
pub fn compose(
    zones: &ZoneHierarchyStore,
    tasks: &TaskProjectionStore,
    settings: &ViewSettings,
) -> TimelineView {
    let resources = zones
        .flatten()
        .into_iter()
        .map(|row| ResourceRow {
            id: row.zone_id,
            name: row.name,
            indent_level: row.indent_level,
            indent_px: row.indent_level.saturating_mul(settings.indent_unit),
            expanded: true,
        })
        .collect();

    let visible: HashSet<ZoneId> = zones.query_zone_ids(settings.scope).into_iter().collect();
    let events = tasks
        .tasks()
        .iter()
        .filter(|task| visible.contains(&task.zone_id))
        .map(|task| EventBar {
            id: task.id,
            text: task.name.clone(),
            start: task.start_date,
            end: task.end_date(),
            resource: task.zone_id,
            status: task.status,
            css_class: css_class(task, settings.default_trade),
        })
        .collect();

    TimelineView { resources, events }
}

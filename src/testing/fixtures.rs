//! Canned zone forests and task rows.
//!
//! The standard forest used throughout the tests:
//!
//! ```text
//! 1 Site
//! ├── 2 Building A
//! │   ├── 5 Level 1
//! │   └── 6 Level 2
//! └── 3 Building B
//!     ├── 7 Level 1
//!     └── 8 Level 2
//! 4 Yard
//! ├── 9 Laydown
//! └── 10 Crane Pad
//! ```

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::model::{ProjectId, Task, TaskId, TaskStatus, TradeId, Zone, ZoneId};

/// Project every fixture belongs to.
pub const PROJECT: ProjectId = ProjectId(1);

/// Parse a `YYYY-MM-DD` literal.
///
/// # Panics
///
/// Panics if `s` is not a valid date.
#[must_use]
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("fixture date must be YYYY-MM-DD")
}

/// Fixed modification stamp so rows compare equal across runs.
#[must_use]
pub fn stamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// A zone with the given children, parent ids filled in.
#[must_use]
pub fn zone(id: i64, name: &str, level: u32, parent_path: &str, children: Vec<Zone>) -> Zone {
    let path = format!("{parent_path}/{name}");
    let children = children
        .into_iter()
        .map(|mut child| {
            child.parent_id = Some(ZoneId(id));
            child
        })
        .collect();
    Zone {
        id: ZoneId(id),
        project_id: PROJECT,
        parent_id: None,
        name: name.to_string(),
        level,
        path,
        children,
    }
}

/// The standard two-root forest shown in the module docs.
#[must_use]
pub fn zone_forest() -> Vec<Zone> {
    let site = "/Site";
    let building_a = "/Site/Building A";
    let building_b = "/Site/Building B";
    let yard = "/Yard";
    vec![
        zone(
            1,
            "Site",
            0,
            "",
            vec![
                zone(
                    2,
                    "Building A",
                    1,
                    site,
                    vec![
                        zone(5, "Level 1", 2, building_a, vec![]),
                        zone(6, "Level 2", 2, building_a, vec![]),
                    ],
                ),
                zone(
                    3,
                    "Building B",
                    1,
                    site,
                    vec![
                        zone(7, "Level 1", 2, building_b, vec![]),
                        zone(8, "Level 2", 2, building_b, vec![]),
                    ],
                ),
            ],
        ),
        zone(
            4,
            "Yard",
            0,
            "",
            vec![
                zone(9, "Laydown", 1, yard, vec![]),
                zone(10, "Crane Pad", 1, yard, vec![]),
            ],
        ),
    ]
}

/// A planned task in `zone` starting on `start`.
#[must_use]
pub fn task(id: i64, zone: i64, start: &str, duration: u32) -> Task {
    Task {
        id: TaskId(id),
        project_id: PROJECT,
        zone_id: ZoneId(zone),
        name: format!("Task {id}"),
        start_date: date(start),
        duration,
        trade_id: None,
        status: TaskStatus::Planned,
        sequence_number: None,
        color: None,
        updated_at: stamp(),
    }
}

/// Task 42 in zone 5, the row most end-to-end tests drag around.
#[must_use]
pub fn task_42() -> Task {
    let mut row = task(42, 5, "2025-08-01", 3);
    row.name = "Pour slab".to_string();
    row.trade_id = Some(TradeId(3));
    row
}

/// A handful of tasks spread over the forest.
#[must_use]
pub fn sample_tasks() -> Vec<Task> {
    let mut formwork = task(41, 5, "2025-07-28", 4);
    formwork.name = "Formwork".to_string();
    formwork.trade_id = Some(TradeId(2));
    formwork.status = TaskStatus::Completed;

    let mut framing = task(43, 6, "2025-08-04", 5);
    framing.name = "Framing".to_string();
    framing.status = TaskStatus::InProgress;

    let mut drywall = task(44, 7, "2025-08-11", 2);
    drywall.name = "Drywall".to_string();
    drywall.trade_id = Some(TradeId(4));

    let mut delivery = task(45, 9, "2025-08-01", 1);
    delivery.name = "Steel delivery".to_string();

    vec![formwork, task_42(), framing, drywall, delivery]
}

/// Wide forest for benchmarks: `roots` roots, each with `fanout` children
/// per level down to `depth` levels.
#[must_use]
pub fn wide_forest(roots: usize, fanout: usize, depth: u32) -> Vec<Zone> {
    fn build(next: &mut i64, level: u32, depth: u32, fanout: usize, parent_path: &str) -> Zone {
        let id = *next;
        *next += 1;
        let name = format!("Z{id}");
        let path = format!("{parent_path}/{name}");
        let children = if level + 1 < depth {
            (0..fanout)
                .map(|_| build(next, level + 1, depth, fanout, &path))
                .collect()
        } else {
            Vec::new()
        };
        zone(id, &name, level, parent_path, children)
    }

    let mut next = 1;
    (0..roots)
        .map(|_| build(&mut next, 0, depth, fanout, ""))
        .collect()
}

/// `count` tasks spread round-robin across `zone_ids`.
#[must_use]
pub fn spread_tasks(count: usize, zone_ids: &[ZoneId]) -> Vec<Task> {
    let first = date("2025-01-06");
    let mut rows = Vec::with_capacity(count);
    for (i, id) in (1..=count as i64).enumerate() {
        let zone = zone_ids.get(i % zone_ids.len().max(1)).map_or(1, |z| z.get());
        let mut row = task(id, zone, "2025-01-06", 1 + (i % 7) as u32);
        row.start_date = first
            .checked_add_days(chrono::Days::new((i % 180) as u64))
            .unwrap_or(first);
        row.trade_id = Some(TradeId(1 + (i % 6) as i64));
        rows.push(row);
    }
    rows
}

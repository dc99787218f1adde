//! End-to-end tests of the sync core against the in-memory API.
//!
//! Interleavings are forced with request holds: a future is polled once so
//! it parks on its held request, other operations run to completion, then
//! the hold is released.

use futures::poll;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use takt::api::{ApiError, TaskApi};
use takt::testing::fixtures::{date, sample_tasks, task_42, zone_forest, PROJECT};
use takt::testing::{ApiCall, Endpoint, HoldKey, MockPushConnector, MockTaskApi};
use takt::{
    ChannelStatus, LoadOutcome, SelectMode, Task, TaktError, TaskDraft, TaskId, TaskPatch,
    TimelineSession, ZoneId,
};
use takt::tasks::DiscardReason;

fn server() -> MockTaskApi {
    MockTaskApi::new()
        .with_zones(zone_forest())
        .with_tasks(sample_tasks())
}

async fn session_on(api: &MockTaskApi, zones: &[i64]) -> TimelineSession {
    let session = TimelineSession::new(Arc::new(api.clone()), PROJECT);
    session.load_zones().await.unwrap();
    let ids: Vec<ZoneId> = zones.iter().map(|z| ZoneId(*z)).collect();
    session.select_zones(&ids).await.unwrap();
    session
}

async fn local(session: &TimelineSession, id: i64) -> Option<Task> {
    session
        .timeline()
        .read(|state| state.tasks.get(TaskId(id)).cloned())
        .await
}

// =========================================================================
// Drag scenario
// =========================================================================

#[tokio::test]
async fn test_drag_applies_locally_before_server_answers() {
    let api = server();
    let session = session_on(&api, &[5, 6]).await;
    let release = api.hold(HoldKey::Update(TaskId(42)));

    let drag = session
        .editor()
        .move_task(TaskId(42), date("2025-08-05"), ZoneId(6));
    tokio::pin!(drag);
    assert!(matches!(poll!(&mut drag), Poll::Pending));

    let row = local(&session, 42).await.unwrap();
    assert_eq!(row.zone_id, ZoneId(6));
    assert_eq!(row.start_date, date("2025-08-05"));
    assert!(api.calls().contains(&ApiCall::UpdateTask(
        TaskId(42),
        TaskPatch::moved(date("2025-08-05"), ZoneId(6))
    )));

    release.release();
    let canonical = drag.await.unwrap();
    assert_eq!(local(&session, 42).await, Some(canonical.clone()));
    assert_eq!(api.stored_task(TaskId(42)), Some(canonical));
}

#[tokio::test]
async fn test_drag_failure_reverts_and_reloads_both_zones() {
    let api = server();
    let session = session_on(&api, &[5, 6]).await;
    api.fail_next(Endpoint::UpdateTask, ApiError::status(500, "internal error"));

    let err = session
        .editor()
        .move_task(TaskId(42), date("2025-08-05"), ZoneId(6))
        .await
        .unwrap_err();
    assert!(err.requires_reload());

    let row = local(&session, 42).await.unwrap();
    assert_eq!(row.zone_id, ZoneId(5));
    assert_eq!(row.start_date, date("2025-08-01"));

    let calls = api.calls();
    let update_at = calls
        .iter()
        .position(|c| c.endpoint() == Endpoint::UpdateTask)
        .unwrap();
    let reload = calls[update_at..]
        .iter()
        .find_map(|c| match c {
            ApiCall::ListTasks(query) => Some(query.zone_ids.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(reload, vec![ZoneId(5), ZoneId(6)]);
}

#[tokio::test]
async fn test_timeout_is_transient() {
    let api = server();
    let session = session_on(&api, &[5]).await;
    api.fail_next(Endpoint::UpdateTask, ApiError::Timeout { after_ms: 10_000 });

    let err = session
        .editor()
        .update_task(
            TaskId(42),
            TaskPatch {
                duration: Some(5),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaktError::MutationTransient { task_id: Some(TaskId(42)), .. }));
    assert_eq!(local(&session, 42).await, Some(task_42()));
}

// =========================================================================
// Supersede
// =========================================================================

#[tokio::test]
async fn test_slow_first_success_does_not_clobber_second() {
    let api = server();
    let session = session_on(&api, &[5, 6, 7]).await;
    let first_release = api.hold(HoldKey::Update(TaskId(42)));

    let first = session
        .editor()
        .move_task(TaskId(42), date("2025-08-05"), ZoneId(6));
    tokio::pin!(first);
    assert!(matches!(poll!(&mut first), Poll::Pending));

    let second = session
        .editor()
        .move_task(TaskId(42), date("2025-08-09"), ZoneId(7))
        .await
        .unwrap();
    assert_eq!(second.zone_id, ZoneId(7));

    first_release.release();
    first.await.unwrap();

    let row = local(&session, 42).await.unwrap();
    assert_eq!(row.zone_id, ZoneId(7));
    assert_eq!(row.start_date, date("2025-08-09"));
}

#[tokio::test]
async fn test_slow_first_failure_does_not_undo_second() {
    let api = server();
    let session = session_on(&api, &[5, 6, 7]).await;
    let first_release = api.hold(HoldKey::Update(TaskId(42)));

    let first = session
        .editor()
        .move_task(TaskId(42), date("2025-08-05"), ZoneId(6));
    tokio::pin!(first);
    assert!(matches!(poll!(&mut first), Poll::Pending));

    session
        .editor()
        .move_task(TaskId(42), date("2025-08-09"), ZoneId(7))
        .await
        .unwrap();

    api.fail_next(Endpoint::UpdateTask, ApiError::status(409, "conflict"));
    first_release.release();
    let err = first.await.unwrap_err();
    assert!(matches!(err, TaktError::MutationRejected { .. }));

    let row = local(&session, 42).await.unwrap();
    assert_eq!(row.zone_id, ZoneId(7));
    assert_eq!(row.start_date, date("2025-08-09"));
}

#[tokio::test]
async fn test_both_fail_restores_pre_first_state() {
    let api = server();
    let session = session_on(&api, &[5, 6, 7]).await;
    let first_release = api.hold(HoldKey::Update(TaskId(42)));
    api.fail_next(Endpoint::UpdateTask, ApiError::status(422, "second rejected"));
    api.fail_next(Endpoint::UpdateTask, ApiError::status(422, "first rejected"));

    let first = session
        .editor()
        .move_task(TaskId(42), date("2025-08-05"), ZoneId(6));
    tokio::pin!(first);
    assert!(matches!(poll!(&mut first), Poll::Pending));

    let resize = TaskPatch::resized(date("2025-08-07"), 4);
    assert!(session.editor().update_task(TaskId(42), resize).await.is_err());

    first_release.release();
    assert!(first.await.is_err());
    assert_eq!(local(&session, 42).await, Some(task_42()));
}

#[tokio::test]
async fn test_reload_during_pending_edit_keeps_edit_visible() {
    let api = server();
    let session = session_on(&api, &[5, 6]).await;
    let release = api.hold(HoldKey::Update(TaskId(42)));

    let drag = session
        .editor()
        .move_task(TaskId(42), date("2025-08-05"), ZoneId(6));
    tokio::pin!(drag);
    assert!(matches!(poll!(&mut drag), Poll::Pending));

    session.reload().await.unwrap();
    assert_eq!(local(&session, 42).await.unwrap().zone_id, ZoneId(6));

    release.release();
    drag.await.unwrap();
    assert_eq!(local(&session, 42).await.unwrap().zone_id, ZoneId(6));
}

// =========================================================================
// Selection-driven loads
// =========================================================================

#[tokio::test]
async fn test_stale_load_is_discarded() {
    let api = server();
    let session = session_on(&api, &[]).await;
    let release = api.hold(HoldKey::List);

    let slow = session.select_zone(ZoneId(5), SelectMode::Replace);
    tokio::pin!(slow);
    assert!(matches!(poll!(&mut slow), Poll::Pending));

    let fast = session
        .select_zone(ZoneId(6), SelectMode::Replace)
        .await
        .unwrap();
    assert_eq!(fast, Some(LoadOutcome::Applied { tasks: 1 }));

    release.release();
    let stale = slow.await.unwrap();
    assert_eq!(
        stale,
        Some(LoadOutcome::Discarded(DiscardReason::SelectionChanged))
    );

    let zones: Vec<ZoneId> = session
        .timeline()
        .read(|state| state.tasks.tasks().iter().map(|t| t.zone_id).collect())
        .await;
    assert!(!zones.is_empty());
    assert!(zones.iter().all(|z| *z == ZoneId(6)));
    assert!(session.view().await.events.iter().all(|e| e.resource == ZoneId(6)));
}

#[tokio::test]
async fn test_load_failure_keeps_previous_view() {
    let api = server();
    let session = session_on(&api, &[5]).await;
    let before = session.view().await;

    for _ in 0..3 {
        api.fail_next(Endpoint::ListTasks, ApiError::status(503, "unavailable"));
    }
    let err = session.reload().await.unwrap_err();
    assert!(matches!(err, TaktError::Load { .. }));
    assert_eq!(session.view().await, before);
}

// =========================================================================
// Create
// =========================================================================

#[tokio::test]
async fn test_create_waits_for_server_and_uses_last_selected_zone() {
    let api = server();
    let session = session_on(&api, &[5, 7]).await;
    let release = api.hold(HoldKey::Create);

    let create = session
        .editor()
        .create_task(TaskDraft::new("Rough-in", date("2025-08-18"), 3));
    tokio::pin!(create);
    assert!(matches!(poll!(&mut create), Poll::Pending));
    let count = session.timeline().read(|state| state.tasks.len()).await;
    assert_eq!(count, 3);

    release.release();
    let created = create.await.unwrap();
    assert_eq!(created.zone_id, ZoneId(7));
    assert_eq!(local(&session, created.id.get()).await, Some(created));
}

// =========================================================================
// Live updates
// =========================================================================

#[tokio::test]
async fn test_push_update_merges_other_operators_change() {
    let api = server();
    let session = session_on(&api, &[5, 6]).await;
    let watcher = session.watch_view().await;
    let mut views = watcher.subscribe();

    let mut changed = task_42();
    changed.zone_id = ZoneId(6);
    changed.name = "Pour slab (moved by site office)".into();
    api.set_task(changed.clone());

    let connector = MockPushConnector::new();
    let feed = connector.session();
    let live = session.live_channel(Arc::new(connector.clone()));
    let mut status = live.status();
    let _channel = live.spawn();

    tokio::time::timeout(Duration::from_secs(2), async {
        while *status.borrow_and_update() != ChannelStatus::Connected {
            status.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    feed.send(r#"{"type":"presence","user":"ops"}"#);
    feed.send("garbage");
    feed.send(r#"{"type":"task_update","task_id":"42"}"#);

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            views.changed().await.unwrap();
            let done = views
                .borrow_and_update()
                .event(TaskId(42))
                .is_some_and(|bar| bar.resource == ZoneId(6));
            if done {
                break;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(local(&session, 42).await, Some(changed));
}

#[tokio::test]
async fn test_upsert_of_fetched_row_is_idempotent() {
    let api = server();
    let session = session_on(&api, &[5, 6]).await;
    let before = session
        .timeline()
        .read(|state| state.tasks.tasks().to_vec())
        .await;

    let fetched = api.get_task(TaskId(42)).await.unwrap();
    session
        .timeline()
        .write(|state| state.upsert_task(fetched))
        .await;

    let after = session
        .timeline()
        .read(|state| state.tasks.tasks().to_vec())
        .await;
    assert_eq!(before, after);
}

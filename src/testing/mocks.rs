//! Controllable test doubles for the remote boundaries.
//!
//! [`MockTaskApi`] is an in-memory server: it answers from its own task and
//! zone tables, records every call, fails on demand, and can hold a request
//! open until the test releases it. Holds make interleavings explicit:
//!
//! ```rust,ignore
//! let api = MockTaskApi::new().with_tasks(fixtures::sample_tasks());
//! let release = api.hold(HoldKey::List);
//! let slow = session.select_zone(ZoneId(5), SelectMode::Replace); // parks on the hold
//! // ... change selection, let the second load finish ...
//! release.release();
//! ```

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};

use crate::api::{ApiError, ApiResult, HealthStatus, TaskApi, TaskQuery};
use crate::model::{BulkPatch, NewTask, ProjectId, Task, TaskId, TaskPatch, Zone};
use crate::sync::{PushConnector, PushStream};

/// Ids handed out by [`MockTaskApi::create_task`] start here.
pub const FIRST_CREATED_ID: i64 = 1000;

/// One remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    ZoneTree,
    ListTasks,
    GetTask,
    CreateTask,
    UpdateTask,
    CreateTasks,
    UpdateTasks,
}

/// A recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Health,
    ZoneTree(ProjectId),
    ListTasks(TaskQuery),
    GetTask(TaskId),
    CreateTask(NewTask),
    UpdateTask(TaskId, TaskPatch),
    CreateTasks(Vec<NewTask>),
    UpdateTasks(Vec<BulkPatch>),
}

impl ApiCall {
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Health => Endpoint::Health,
            Self::ZoneTree(_) => Endpoint::ZoneTree,
            Self::ListTasks(_) => Endpoint::ListTasks,
            Self::GetTask(_) => Endpoint::GetTask,
            Self::CreateTask(_) => Endpoint::CreateTask,
            Self::UpdateTask(..) => Endpoint::UpdateTask,
            Self::CreateTasks(_) => Endpoint::CreateTasks,
            Self::UpdateTasks(_) => Endpoint::UpdateTasks,
        }
    }
}

/// Which requests a hold applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldKey {
    List,
    Get(TaskId),
    Update(TaskId),
    Create,
}

/// Releases one held request. Dropping it releases too.
#[derive(Debug)]
pub struct HoldRelease {
    sender: oneshot::Sender<()>,
}

impl HoldRelease {
    pub fn release(self) {
        let _ = self.sender.send(());
    }
}

#[derive(Debug, Default)]
struct ServerState {
    zones: Vec<Zone>,
    tasks: Vec<Task>,
    next_id: i64,
    failures: HashMap<Endpoint, VecDeque<ApiError>>,
    holds: HashMap<HoldKey, VecDeque<oneshot::Receiver<()>>>,
    calls: Vec<ApiCall>,
}

/// In-memory [`TaskApi`].
#[derive(Debug, Clone)]
pub struct MockTaskApi {
    state: Arc<Mutex<ServerState>>,
}

impl Default for MockTaskApi {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                next_id: FIRST_CREATED_ID,
                ..ServerState::default()
            })),
        }
    }
}

impl MockTaskApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this zone forest.
    #[must_use]
    pub fn with_zones(self, zones: Vec<Zone>) -> Self {
        self.lock().zones = zones;
        self
    }

    /// Serve these task rows.
    #[must_use]
    pub fn with_tasks(self, tasks: Vec<Task>) -> Self {
        self.lock().tasks = tasks;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        // A panicking test thread must not hide the real failure.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next call to `endpoint` with `error`. Queues up.
    pub fn fail_next(&self, endpoint: Endpoint, error: ApiError) {
        self.lock()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(error);
    }

    /// Park the next request matching `key` until the handle is released.
    pub fn hold(&self, key: HoldKey) -> HoldRelease {
        let (sender, receiver) = oneshot::channel();
        self.lock().holds.entry(key).or_default().push_back(receiver);
        HoldRelease { sender }
    }

    /// Change a row server-side, as another operator would.
    pub fn set_task(&self, task: Task) {
        let mut state = self.lock();
        match state.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(row) => *row = task,
            None => state.tasks.push(task),
        }
    }

    /// Current server-side row.
    #[must_use]
    pub fn stored_task(&self, id: TaskId) -> Option<Task> {
        self.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    /// Every call so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Number of calls to `endpoint`.
    #[must_use]
    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.endpoint() == endpoint)
            .count()
    }

    /// Record the call, wait out any hold, then pop an injected failure.
    async fn enter(&self, call: ApiCall, hold: Option<HoldKey>) -> ApiResult<()> {
        let endpoint = call.endpoint();
        let parked = {
            let mut state = self.lock();
            state.calls.push(call);
            hold.and_then(|key| state.holds.get_mut(&key).and_then(VecDeque::pop_front))
        };
        if let Some(receiver) = parked {
            let _ = receiver.await;
        }
        let failure = self
            .lock()
            .failures
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front);
        failure.map_or(Ok(()), Err)
    }

    fn not_found(id: TaskId) -> ApiError {
        ApiError::status(404, format!("task {id} not found"))
    }

    fn store_new(state: &mut ServerState, new_task: &NewTask) -> Task {
        let id = TaskId(state.next_id);
        state.next_id += 1;
        let task = Task {
            id,
            project_id: new_task.project_id,
            zone_id: new_task.zone_id,
            name: new_task.name.clone(),
            start_date: new_task.start_date,
            duration: new_task.duration,
            trade_id: new_task.trade_id,
            status: new_task.status,
            sequence_number: new_task.sequence_number,
            color: None,
            updated_at: Utc::now(),
        };
        state.tasks.push(task.clone());
        task
    }

    fn store_patch(state: &mut ServerState, id: TaskId, patch: &TaskPatch) -> ApiResult<Task> {
        let row = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        patch.apply_to(row);
        Ok(row.clone())
    }
}

#[async_trait]
impl TaskApi for MockTaskApi {
    async fn health(&self) -> ApiResult<HealthStatus> {
        self.enter(ApiCall::Health, None).await?;
        Ok(HealthStatus {
            status: "healthy".to_string(),
            time: Utc::now().timestamp(),
        })
    }

    async fn fetch_zone_tree(&self, project: ProjectId) -> ApiResult<Vec<Zone>> {
        self.enter(ApiCall::ZoneTree(project), None).await?;
        Ok(self
            .lock()
            .zones
            .iter()
            .filter(|z| z.project_id == project)
            .cloned()
            .collect())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<Vec<Task>> {
        self.enter(ApiCall::ListTasks(query.clone()), Some(HoldKey::List))
            .await?;
        let mut rows: Vec<Task> = self
            .lock()
            .tasks
            .iter()
            .filter(|t| t.project_id == query.project_id && query.matches(t.zone_id, t.start_date))
            .cloned()
            .collect();
        // start date, then sequence number with unsequenced rows last
        rows.sort_by_key(|t| (t.start_date, t.sequence_number.is_none(), t.sequence_number, t.id));
        Ok(rows)
    }

    async fn get_task(&self, id: TaskId) -> ApiResult<Task> {
        self.enter(ApiCall::GetTask(id), Some(HoldKey::Get(id))).await?;
        self.stored_task(id).ok_or_else(|| Self::not_found(id))
    }

    async fn create_task(&self, task: &NewTask) -> ApiResult<Task> {
        self.enter(ApiCall::CreateTask(task.clone()), Some(HoldKey::Create))
            .await?;
        Ok(Self::store_new(&mut self.lock(), task))
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> ApiResult<Task> {
        self.enter(ApiCall::UpdateTask(id, patch.clone()), Some(HoldKey::Update(id)))
            .await?;
        Self::store_patch(&mut self.lock(), id, patch)
    }

    async fn create_tasks(&self, tasks: &[NewTask]) -> ApiResult<Vec<Task>> {
        self.enter(ApiCall::CreateTasks(tasks.to_vec()), Some(HoldKey::Create))
            .await?;
        let mut state = self.lock();
        Ok(tasks.iter().map(|t| Self::store_new(&mut state, t)).collect())
    }

    async fn update_tasks(&self, patches: &[BulkPatch]) -> ApiResult<Vec<Task>> {
        self.enter(ApiCall::UpdateTasks(patches.to_vec()), None).await?;
        let mut state = self.lock();
        // All or nothing, as a single transaction would be.
        if let Some(missing) = patches
            .iter()
            .find(|item| !state.tasks.iter().any(|t| t.id == item.id))
        {
            return Err(Self::not_found(missing.id));
        }
        patches
            .iter()
            .map(|item| Self::store_patch(&mut state, item.id, &item.patch))
            .collect()
    }
}

// ============================================================================
// Push connector
// ============================================================================

enum Script {
    Fail(ApiError),
    Session(mpsc::UnboundedReceiver<ApiResult<String>>),
}

/// Feeds one scripted push session. Dropping it ends the session.
#[derive(Debug, Clone)]
pub struct PushSession {
    sender: mpsc::UnboundedSender<ApiResult<String>>,
}

impl PushSession {
    /// Deliver a text frame.
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.sender.send(Ok(text.into()));
    }

    /// Deliver a transport error, which drops the connection.
    pub fn error(&self, error: ApiError) {
        let _ = self.sender.send(Err(error));
    }

    /// End the session after the frames already sent.
    pub fn close(self) {}
}

/// [`PushConnector`] that plays back scripted connect outcomes in order.
///
/// Once the script is exhausted every connect fails.
#[derive(Clone, Default)]
pub struct MockPushConnector {
    script: Arc<Mutex<VecDeque<Script>>>,
    connects: Arc<AtomicU32>,
}

impl MockPushConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, VecDeque<Script>> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a successful connect and return its feed.
    pub fn session(&self) -> PushSession {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.script().push_back(Script::Session(receiver));
        PushSession { sender }
    }

    /// Queue a failed connect.
    pub fn fail_connect(&self, error: ApiError) {
        self.script().push_back(Script::Fail(error));
    }

    /// Connect attempts so far.
    #[must_use]
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushConnector for MockPushConnector {
    async fn connect(&self) -> ApiResult<PushStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.script().pop_front();
        match next {
            Some(Script::Session(receiver)) => Ok(stream::unfold(receiver, |mut rx| async move {
                rx.recv().await.map(|frame| (frame, rx))
            })
            .boxed()),
            Some(Script::Fail(error)) => Err(error),
            None => Err(ApiError::transport("connection refused")),
        }
    }
}

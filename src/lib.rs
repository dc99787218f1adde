//! Takt - timeline sync core
//!
//! Keeps a local projection of scheduled tasks against a hierarchy of zones,
//! applies operator edits optimistically against a remote system of record,
//! and merges pushed changes from other operators without races.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`model`] - Zones, tasks, patches and id newtypes
//! - [`api`] - Remote API boundary and its reqwest implementation
//! - [`zones`] - Zone Hierarchy Store (arena, selection, flatten)
//! - [`tasks`] - Task Projection Store (optimistic edits, rollback, load tickets)
//! - [`sync`] - Shared state, loader, Edit Coordinator, Live Update Channel
//! - [`view`] - View Composer
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Custom error types and handling
//! - [`testing`] - Testing infrastructure (mocks, fixtures)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use takt::{HttpTaskApi, TaktConfig, TimelineSession};
//!
//! let config = TaktConfig::load(&TaktConfig::default_path())?;
//! let api = Arc::new(HttpTaskApi::new(config.http())?);
//! let session = TimelineSession::from_config(api, &config);
//!
//! session.load_zones().await?;
//! session.select_zone(ZoneId(5), SelectMode::Replace).await?;
//! session.editor().move_task(TaskId(42), start, ZoneId(6)).await?;
//! let view = session.view().await;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod sync;
pub mod tasks;
pub mod testing;
pub mod view;
pub mod zones;

// Re-export commonly used types
pub use error::{IntoTaktError, LoadTarget, Result, TaktError};

pub use api::{ApiError, HttpTaskApi, TaskApi, TaskQuery};
pub use config::{DurationPolicy, TaktConfig};
pub use model::{
    ProjectId, Task, TaskDraft, TaskId, TaskPatch, TaskStatus, TradeId, Zone, ZoneId,
};
pub use sync::{
    ChannelStatus, EditCoordinator, LiveUpdateChannel, SharedTimeline, StoreChange,
    TimelineSession, WebSocketConnector,
};
pub use tasks::{LoadOutcome, RollbackOutcome, RollbackToken, TaskProjectionStore};
pub use view::{compose, TimelineView, ViewSettings, ViewWatcher};
pub use zones::{SelectMode, SelectionScope, ZoneHierarchyStore};

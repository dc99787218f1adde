//! Synchronization core.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   select ──────►│        SharedTimeline        │◄────── LiveUpdateChannel
//!                 │  ZoneHierarchyStore          │        (point fetch + upsert)
//!   TaskLoader ──►│  TaskProjectionStore         │
//!                 └──────┬───────────────▲───────┘
//!                        │ StoreChange   │ optimistic / confirm / rollback
//!                        ▼               │
//!                   ViewWatcher     EditCoordinator ──► TaskApi
//! ```
//!
//! All state lives behind one lock and is only touched inside short
//! closures, never across a remote call.

pub mod backoff;
pub mod coordinator;
pub mod live;
pub mod loader;
pub mod session;
pub mod state;

pub use backoff::{calculate_backoff, ReconnectPolicy, RetryPolicy};
pub use coordinator::EditCoordinator;
pub use live::{
    ChannelStatus, LiveUpdateChannel, PushConnector, PushMessage, PushStream, WebSocketConnector,
};
pub use loader::TaskLoader;
pub use session::TimelineSession;
pub use state::{ChangeNotifier, SharedTimeline, StoreChange, TimelineState};

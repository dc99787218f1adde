//! Domain records shared by the stores, the remote API, and the view.

pub mod ids;
pub mod task;
pub mod zone;

pub use ids::{ProjectId, TaskId, TradeId, ZoneId};
pub use task::{
    span_days, BulkPatch, NewTask, Task, TaskDraft, TaskField, TaskPatch, TaskStatus,
};
pub use zone::Zone;

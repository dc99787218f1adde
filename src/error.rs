//! Custom error types for takt.
//!
//! Every remote-call failure is caught by the component that issued the call
//! and converted into one of the variants below; nothing escapes to the view
//! layer as an unhandled fault.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::api::ApiError;
use crate::model::{ProjectId, TaskId, ZoneId};

/// What a failed load was trying to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget {
    ZoneTree(ProjectId),
    Tasks,
    Task(TaskId),
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZoneTree(project) => write!(f, "zone tree for project {project}"),
            Self::Tasks => f.write_str("task list"),
            Self::Task(id) => write!(f, "task {id}"),
        }
    }
}

/// Main error type for takt operations
#[derive(Error, Debug)]
pub enum TaktError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Load Errors
    // =========================================================================
    /// A zone or task fetch failed; the store keeps its last good state.
    #[error("Failed to load {target}: {source}")]
    Load { target: LoadTarget, source: ApiError },

    /// The fetched zone tree violates the forest invariants.
    #[error("Invalid zone tree: {reason}")]
    InvalidZoneTree { reason: String },

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// Zone id not present in the loaded hierarchy
    #[error("Unknown zone: {zone_id}")]
    UnknownZone { zone_id: ZoneId },

    /// Task id not present in the local projection
    #[error("Unknown task: {task_id}")]
    UnknownTask { task_id: TaskId },

    /// Create was requested without a zone and nothing is selected
    #[error("No zone given and no zone selected")]
    NoTargetZone,

    // =========================================================================
    // Mutation Errors
    // =========================================================================
    /// Input rejected locally before any request was sent
    #[error("Invalid task: {reason}")]
    InvalidTask { reason: String },

    /// A resize produced a non-positive duration under the reject policy
    #[error("Invalid duration: {days} days")]
    InvalidDuration { days: i64 },

    /// The server refused the change; server state is unchanged.
    #[error("Change rejected{}: {message}", fmt_task(.task_id))]
    MutationRejected {
        task_id: Option<TaskId>,
        status: Option<u16>,
        message: String,
    },

    /// The change failed with unknown effect; an authoritative reload follows.
    #[error("Change failed{} (outcome unknown): {source}", fmt_task(.task_id))]
    MutationTransient {
        task_id: Option<TaskId>,
        source: ApiError,
    },

    // =========================================================================
    // Live Update Errors
    // =========================================================================
    /// The push channel could not be re-established within its budget.
    #[error("Live updates disconnected after {attempts} reconnect attempts")]
    ChannelDisconnected { attempts: u32 },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn fmt_task(task_id: &Option<TaskId>) -> String {
    task_id.map(|id| format!(" for task {id}")).unwrap_or_default()
}

impl TaktError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid-configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a load error
    pub fn load(target: LoadTarget, source: ApiError) -> Self {
        Self::Load { target, source }
    }

    /// Create an invalid-tree error
    pub fn invalid_tree(reason: impl Into<String>) -> Self {
        Self::InvalidZoneTree {
            reason: reason.into(),
        }
    }

    /// Classify a failed create/update into rejected or transient.
    pub fn mutation(task_id: Option<TaskId>, source: ApiError) -> Self {
        if source.is_transient() {
            Self::MutationTransient { task_id, source }
        } else {
            Self::MutationRejected {
                task_id,
                status: source.http_status(),
                message: source.to_string(),
            }
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if the view can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Load { .. }
                | Self::MutationRejected { .. }
                | Self::MutationTransient { .. }
                | Self::ChannelDisconnected { .. }
                | Self::UnknownZone { .. }
                | Self::UnknownTask { .. }
                | Self::NoTargetZone
                | Self::InvalidTask { .. }
                | Self::InvalidDuration { .. }
        )
    }

    /// Check if an authoritative reload is needed to resynchronize
    pub fn requires_reload(&self) -> bool {
        matches!(self, Self::MutationTransient { .. })
    }

    /// Check if the operator should see a message
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::MutationRejected { .. }
                | Self::MutationTransient { .. }
                | Self::ChannelDisconnected { .. }
                | Self::InvalidTask { .. }
                | Self::InvalidDuration { .. }
                | Self::NoTargetZone
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Load { .. } | Self::InvalidZoneTree { .. } => 2,
            Self::MutationRejected { .. }
            | Self::InvalidTask { .. }
            | Self::InvalidDuration { .. }
            | Self::NoTargetZone => 3,
            Self::MutationTransient { .. } => 4,
            Self::ChannelDisconnected { .. } => 5,
            Self::UnknownZone { .. } | Self::UnknownTask { .. } => 6,
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for takt results
pub type Result<T> = std::result::Result<T, TaktError>;

/// Extension trait for converting foreign errors to TaktError
pub trait IntoTaktError<T> {
    fn into_takt_config(self, path: &std::path::Path) -> Result<T>;
}

impl<T, E: Into<anyhow::Error>> IntoTaktError<T> for std::result::Result<T, E> {
    fn into_takt_config(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| TaktError::config_with_path(e.into().to_string(), path.to_path_buf()))
    }
}

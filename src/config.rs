//! Configuration for the timeline sync core.
//!
//! Loaded from a TOML file (`takt.toml` by default). Every field has a
//! default, so an absent file or an empty table is a valid configuration.
//!
//! # Example takt.toml
//!
//! ```toml
//! project_id = 3
//!
//! [api]
//! base_url = "https://takt.example.com/api/v1"
//! timeout_ms = 5000
//!
//! [live]
//! url = "wss://takt.example.com/api/v1/ws"
//! max_reconnect_attempts = 12
//!
//! [view]
//! selection_scope = "subtree"
//! duration_policy = "reject"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::http::HttpApiConfig;
use crate::error::{IntoTaktError, Result, TaktError};
use crate::model::{ProjectId, TradeId};
use crate::sync::backoff::{ReconnectPolicy, RetryPolicy};
use crate::view::ViewSettings;
use crate::zones::SelectionScope;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "takt.toml";

/// What to do when a resize computes a duration below one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationPolicy {
    /// Floor the duration to one day.
    #[default]
    Clamp,
    /// Refuse the gesture with `InvalidDuration`.
    Reject,
}

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Push channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    pub url: String,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for LiveSettings {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            url: "ws://localhost:8080/api/v1/ws".to_string(),
            reconnect_base_ms: policy.base_ms,
            reconnect_max_ms: policy.max_ms,
            max_reconnect_attempts: policy.max_attempts,
        }
    }
}

/// Presentation and gesture settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Pixels of indent per nesting level.
    pub indent_unit: u32,
    /// Trade used for the css class when a task has none.
    pub default_trade: i64,
    /// Limit task loads to this many days either side of today.
    pub window_days: Option<u32>,
    pub selection_scope: SelectionScope,
    pub duration_policy: DurationPolicy,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            indent_unit: 20,
            default_trade: 1,
            window_days: None,
            selection_scope: SelectionScope::Exact,
            duration_policy: DurationPolicy::Clamp,
        }
    }
}

/// Retry settings for authoritative reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadSettings {
    pub retries: u32,
    pub retry_base_ms: u64,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            retries: policy.retries,
            retry_base_ms: policy.base_ms,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaktConfig {
    pub project_id: i64,
    pub api: ApiSettings,
    pub live: LiveSettings,
    pub view: ViewConfig,
    pub reload: ReloadSettings,
}

impl Default for TaktConfig {
    fn default() -> Self {
        Self {
            project_id: 1,
            api: ApiSettings::default(),
            live: LiveSettings::default(),
            view: ViewConfig::default(),
            reload: ReloadSettings::default(),
        }
    }
}

impl TaktConfig {
    /// Load from `path`, falling back to defaults if the file does not
    /// exist. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`TaktError::Config`] if the file cannot be read or parsed,
    /// and [`TaktError::InvalidConfig`] if a value is out of range.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).into_takt_config(path)?;
        let config = Self::parse(&content).map_err(|e| match e {
            TaktError::Config { message, .. } => {
                TaktError::config_with_path(message, path.to_path_buf())
            }
            other => other,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| TaktError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Default config path in the working directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`TaktError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(TaktError::invalid_config("api.base_url", "must not be empty"));
        }
        if self.api.timeout_ms == 0 {
            return Err(TaktError::invalid_config("api.timeout_ms", "must be positive"));
        }
        if self.live.url.trim().is_empty() {
            return Err(TaktError::invalid_config("live.url", "must not be empty"));
        }
        if self.live.reconnect_base_ms > self.live.reconnect_max_ms {
            return Err(TaktError::invalid_config(
                "live.reconnect_base_ms",
                format!(
                    "{} exceeds reconnect_max_ms {}",
                    self.live.reconnect_base_ms, self.live.reconnect_max_ms
                ),
            ));
        }
        if self.view.indent_unit == 0 {
            return Err(TaktError::invalid_config("view.indent_unit", "must be positive"));
        }
        if self.project_id <= 0 {
            return Err(TaktError::invalid_config("project_id", "must be positive"));
        }
        Ok(())
    }

    #[must_use]
    pub fn project(&self) -> ProjectId {
        ProjectId(self.project_id)
    }

    #[must_use]
    pub fn http(&self) -> HttpApiConfig {
        HttpApiConfig::new(self.api.base_url.clone()).with_timeout_ms(self.api.timeout_ms)
    }

    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.live.reconnect_base_ms,
            self.live.reconnect_max_ms,
            self.live.max_reconnect_attempts,
        )
    }

    #[must_use]
    pub fn reload_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.reload.retries,
            base_ms: self.reload.retry_base_ms,
            max_ms: self.live.reconnect_max_ms.max(self.reload.retry_base_ms),
        }
    }

    #[must_use]
    pub fn view_settings(&self) -> ViewSettings {
        ViewSettings {
            indent_unit: self.view.indent_unit,
            default_trade: TradeId(self.view.default_trade),
            scope: self.view.selection_scope,
        }
    }
}

//! Live Update Channel.
//!
//! Keeps one push connection open and merges every `task_update`
//! notification into the projection through a point fetch.
//!
//! ```text
//! Connecting ──ok──► Connected ──drop──► Reconnecting(1) ──immediate──► connect
//!     ▲                                        │ fail
//!     │                                        ▼
//!     └──────────── ok ◄──── Reconnecting(n) backoff ... budget spent ──► Degraded
//! ```
//!
//! A drop is never fatal to the view; only an exhausted reconnect budget is
//! reported, as [`TaktError::ChannelDisconnected`].

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use super::backoff::ReconnectPolicy;
use super::state::SharedTimeline;
use crate::api::{ApiError, TaskApi};
use crate::error::{Result, TaktError};
use crate::model::TaskId;

/// Raw text frames from the push endpoint.
pub type PushStream = BoxStream<'static, std::result::Result<String, ApiError>>;

/// Opens push connections. The stream ending means the connection dropped.
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self) -> std::result::Result<PushStream, ApiError>;
}

/// WebSocket push endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    async fn connect(&self) -> std::result::Result<PushStream, ApiError> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;
        debug!("Push channel connected to {}", self.url);

        let frames = socket.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        warn!("Dropping non-UTF-8 binary push frame");
                        None
                    }
                },
                Ok(_) => None,
                Err(e) => Some(Err(ApiError::transport(e.to_string()))),
            }
        });
        Ok(frames.boxed())
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A decoded push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    TaskUpdate(TaskId),
    /// Any other message type; ignored.
    Other(String),
}

#[derive(Deserialize)]
struct RawPush {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    task_id: Option<serde_json::Value>,
}

impl PushMessage {
    /// Decode a text frame. `task_id` may be a number or a numeric string.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let raw: RawPush = serde_json::from_str(text).map_err(|e| e.to_string())?;
        if raw.kind != "task_update" {
            return Ok(Self::Other(raw.kind));
        }
        let id = match raw.task_id {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        id.map(|id| Self::TaskUpdate(TaskId(id)))
            .ok_or_else(|| "task_update without a usable task_id".to_string())
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Connection state, as shown by a live-updates indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect budget spent; live updates are off.
    Degraded,
}

impl ChannelStatus {
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Push connection bound to a shared timeline.
pub struct LiveUpdateChannel {
    connector: Arc<dyn PushConnector>,
    api: Arc<dyn TaskApi>,
    timeline: SharedTimeline,
    policy: ReconnectPolicy,
    status: watch::Sender<ChannelStatus>,
}

impl LiveUpdateChannel {
    pub fn new(
        connector: Arc<dyn PushConnector>,
        api: Arc<dyn TaskApi>,
        timeline: SharedTimeline,
        policy: ReconnectPolicy,
    ) -> Self {
        let (status, _) = watch::channel(ChannelStatus::Connecting);
        Self {
            connector,
            api,
            timeline,
            policy,
            status,
        }
    }

    /// Watch the connection state.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, status: ChannelStatus) {
        self.status.send_replace(status);
    }

    /// Run on a background task.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }

    /// Connect, pump messages, and reconnect until the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`TaktError::ChannelDisconnected`] once reconnecting has
    /// failed `max_attempts` times in a row. Sessions that close without
    /// delivering a frame count as failures.
    pub async fn run(&self) -> Result<()> {
        self.set_status(ChannelStatus::Connecting);
        let mut attempt: u32 = 0;
        loop {
            match self.connector.connect().await {
                Ok(stream) => {
                    self.set_status(ChannelStatus::Connected);
                    info!("Live updates connected");
                    let frames = self.pump(stream).await;
                    // a session that closes before its first frame counts
                    // as a failed attempt
                    if frames > 0 {
                        attempt = 0;
                        warn!("Live update connection dropped after {} frames", frames);
                    } else {
                        warn!("Live update connection closed before delivering anything");
                    }
                }
                Err(e) => warn!("Live update connect failed: {}", e),
            }

            attempt += 1;
            let Some(delay) = self.policy.delay_for(attempt) else {
                let attempts = attempt - 1;
                self.set_status(ChannelStatus::Degraded);
                warn!("Live updates degraded after {} reconnect attempts", attempts);
                return Err(TaktError::ChannelDisconnected { attempts });
            };
            self.set_status(ChannelStatus::Reconnecting { attempt });
            debug!("Reconnect attempt {} in {:?}", attempt, delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Drain one session. Returns the number of frames it delivered.
    async fn pump(&self, mut stream: PushStream) -> usize {
        let mut frames = 0;
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(text) => {
                    frames += 1;
                    self.handle(&text).await;
                }
                Err(e) => {
                    warn!("Push channel error: {}", e);
                    break;
                }
            }
        }
        frames
    }

    /// Apply one text frame. Malformed frames are logged and dropped.
    pub async fn handle(&self, text: &str) {
        match PushMessage::parse(text) {
            Ok(PushMessage::TaskUpdate(task_id)) => self.refresh(task_id).await,
            Ok(PushMessage::Other(kind)) => trace!("Ignoring push message of type {}", kind),
            Err(reason) => warn!("Dropping malformed push message ({}): {}", reason, text),
        }
    }

    async fn refresh(&self, task_id: TaskId) {
        match self.api.get_task(task_id).await {
            Ok(task) => {
                let inserted = self.timeline.write(|state| state.upsert_task(task)).await;
                debug!(
                    "Merged pushed update for task {}{}",
                    task_id,
                    if inserted { " (new)" } else { "" }
                );
            }
            Err(e) if e.is_not_found() => debug!("Pushed task {} no longer exists", task_id),
            Err(e) => warn!("Point fetch for pushed task {} failed: {}", task_id, e),
        }
    }
}

//! Recompose the view whenever either store changes.

use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use super::composer::{compose, TimelineView, ViewSettings};
use crate::sync::SharedTimeline;

/// Background observer that keeps an up-to-date [`TimelineView`].
///
/// Bursts of changes are coalesced into a single recompute.
pub struct ViewWatcher {
    view: watch::Receiver<Arc<TimelineView>>,
    handle: JoinHandle<()>,
}

impl ViewWatcher {
    /// Compose the current view and start following changes.
    pub async fn start(timeline: SharedTimeline, settings: ViewSettings) -> Self {
        let mut changes = timeline.subscribe();
        let initial = timeline
            .read(|state| compose(&state.zones, &state.tasks, &settings))
            .await;
        let (sender, view) = watch::channel(Arc::new(initial));

        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                        Err(_) => break,
                    }
                }
                let next = timeline
                    .read(|state| compose(&state.zones, &state.tasks, &settings))
                    .await;
                trace!(
                    "Recomposed view: {} rows, {} bars",
                    next.resources.len(),
                    next.events.len()
                );
                if sender.send(Arc::new(next)).is_err() {
                    break;
                }
            }
        });

        Self { view, handle }
    }

    /// Latest composed view.
    #[must_use]
    pub fn current(&self) -> Arc<TimelineView> {
        self.view.borrow().clone()
    }

    /// A receiver that is notified on every recompose.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<TimelineView>> {
        self.view.clone()
    }
}

impl Drop for ViewWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

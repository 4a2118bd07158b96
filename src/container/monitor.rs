//! Background engine event drain.
//!
//! [`EventMonitor`] subscribes to the engine's event stream when it is
//! spawned and prints every event as a JSON line from a tokio task. The task runs until it is stopped,
//! the stream ends, or the monitor is dropped.

use crate::container::{Engine, EngineEvent};
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a running event drain.
pub struct EventMonitor {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    seen: Arc<AtomicU64>,
}

impl EventMonitor {
    /// Subscribe to engine events and start draining them.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(engine: Arc<dyn Engine>) -> Self {
        Self::spawn_with(engine, |line| println!("{}", line))
    }

    /// Like [`spawn`](Self::spawn), handing each rendered event to `sink`.
    pub fn spawn_with<F>(engine: Arc<dyn Engine>, sink: F) -> Self
    where
        F: Fn(String) + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let seen = Arc::new(AtomicU64::new(0));
        let counter = seen.clone();
        let mut events = engine.events();
        debug!("Event monitor subscribed");

        let handle = tokio::spawn(async move {

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("Event monitor shutting down");
                        break;
                    }
                    next = events.next() => match next {
                        Some(Ok(event)) => {
                            counter.fetch_add(1, Ordering::Relaxed);
                            sink(render_event(&event));
                        }
                        Some(Err(e)) => warn!("Engine event stream error: {}", e),
                        None => {
                            info!("Engine event stream ended");
                            break;
                        }
                    },
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
            seen,
        }
    }

    /// Number of events received so far.
    pub fn events_seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }

    /// Whether the drain task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Signal the task to stop and wait for it.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!("Event monitor task failed: {}", e);
        }
    }
}

impl Drop for EventMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One event as a JSON line, with a readable timestamp alongside the raw one.
pub(crate) fn render_event(event: &EngineEvent) -> String {
    let timestamp = DateTime::<Utc>::from_timestamp(event.time, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    let value = serde_json::json!({
        "timestamp": timestamp,
        "event": event,
    });
    value.to_string()
}

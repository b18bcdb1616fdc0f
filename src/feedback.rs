//! Ingestion feedback
//!
//! Every terminal crawl outcome is reported to an [`IngestionSink`] through a
//! [`FeedbackLogger`]. Sends are at-most-once and never block the caller: a
//! full channel drops the event, and sink failures are logged and forgotten.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default capacity of the feedback channel
pub const DEFAULT_FEEDBACK_CAPACITY: usize = 1024;

/// One fetch outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionEvent {
    pub url: String,
    pub ok: bool,
    pub status: Option<u16>,
    pub bytes: Option<u64>,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Destination for ingestion events
#[async_trait]
pub trait IngestionSink: Send + Sync {
    async fn log_ingestion(&self, event: IngestionEvent) -> anyhow::Result<()>;
}

/// Fire-and-forget handle onto a background sink writer
#[derive(Debug, Clone)]
pub struct FeedbackLogger {
    tx: Option<mpsc::Sender<IngestionEvent>>,
}

impl FeedbackLogger {
    /// Starts the background writer
    ///
    /// The writer task ends once every clone of the returned logger has been
    /// dropped and the channel has drained.
    pub fn spawn(sink: Arc<dyn IngestionSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<IngestionEvent>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let url = event.url.clone();
                if let Err(e) = sink.log_ingestion(event).await {
                    tracing::debug!(url = %url, error = %e, "Ingestion sink rejected event");
                }
            }
        });

        (Self { tx: Some(tx) }, handle)
    }

    /// A logger that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Queues `event` without waiting; drops it if the channel is full
    pub fn log(&self, event: IngestionEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        if let Err(e) = tx.try_send(event) {
            let reason = match &e {
                mpsc::error::TrySendError::Full(_) => "channel full",
                mpsc::error::TrySendError::Closed(_) => "writer stopped",
            };
            tracing::trace!(url = %e.into_inner().url, reason, "Dropped ingestion event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        events: Mutex<Vec<IngestionEvent>>,
    }

    #[async_trait]
    impl IngestionSink for CollectingSink {
        async fn log_ingestion(&self, event: IngestionEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl IngestionSink for FailingSink {
        async fn log_ingestion(&self, _event: IngestionEvent) -> anyhow::Result<()> {
            anyhow::bail!("database is down")
        }
    }

    fn event(url: &str) -> IngestionEvent {
        IngestionEvent {
            url: url.to_string(),
            ok: true,
            status: Some(200),
            bytes: Some(512),
            reason: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_events_reach_sink() {
        let sink = Arc::new(CollectingSink::default());
        let (logger, handle) = FeedbackLogger::spawn(sink.clone(), 8);

        logger.log(event("https://a.ca/"));
        logger.log(event("https://b.ca/"));
        drop(logger);
        handle.await.unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].url, "https://b.ca/");
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let sink = Arc::new(CollectingSink::default());
        let (logger, handle) = FeedbackLogger::spawn(sink.clone(), 1);

        // The writer has not run yet on this single-threaded runtime
        for i in 0..10 {
            logger.log(event(&format!("https://{}.ca/", i)));
        }
        drop(logger);
        handle.await.unwrap();

        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let (logger, handle) = FeedbackLogger::spawn(Arc::new(FailingSink), 4);
        logger.log(event("https://a.ca/"));
        drop(logger);
        assert!(handle.await.is_ok());
    }

    #[test]
    fn test_disabled_logger_is_noop() {
        FeedbackLogger::disabled().log(event("https://a.ca/"));
    }
}

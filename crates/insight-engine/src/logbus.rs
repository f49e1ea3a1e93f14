//! LogBus — single-process pub/sub keyed by job id.
//!
//! Delivery is at-most-once and best-effort. Each subscriber gets a bounded
//! buffer; when it is full the newest entry is dropped for that subscriber
//! (drop-newest policy). Subscribers see only entries published after their
//! subscribe returns; full history comes from `get_job`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use insight_core::models::LogEntry;

/// Per-subscriber buffer capacity.
const SUBSCRIBER_BUFFER: usize = 64;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<LogEntry>,
}

type SubscriberTable = Arc<DashMap<String, Vec<Subscriber>>>;

#[derive(Default)]
pub struct LogBus {
    subscribers: SubscriberTable,
    next_id: AtomicU64,
}

impl LogBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for `job_id`. The returned stream
    /// unsubscribes itself when dropped.
    pub fn subscribe(&self, job_id: &str) -> LogStream {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers
            .entry(job_id.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        LogStream {
            job_id: job_id.to_string(),
            id,
            rx,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Broadcast an entry to the current subscribers of `job_id`. A slow
    /// subscriber loses this entry; a closed one is removed.
    pub fn publish(&self, job_id: &str, entry: &LogEntry) {
        let Some(mut subs) = self.subscribers.get_mut(job_id) else {
            return;
        };
        subs.retain(|sub| match sub.tx.try_send(entry.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(job_id, subscriber = sub.id, "subscriber buffer full; dropping entry");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        let empty = subs.is_empty();
        drop(subs);
        if empty {
            self.subscribers.remove_if(job_id, |_, v| v.is_empty());
        }
    }

    /// Number of live subscribers for a job.
    pub fn subscriber_count(&self, job_id: &str) -> usize {
        self.subscribers.get(job_id).map_or(0, |v| v.len())
    }
}

impl std::fmt::Debug for LogBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBus")
            .field("jobs", &self.subscribers.len())
            .finish()
    }
}

/// A live subscription to one job's log entries.
pub struct LogStream {
    job_id: String,
    id: u64,
    rx: mpsc::Receiver<LogEntry>,
    subscribers: SubscriberTable,
}

impl LogStream {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Receive the next entry; `None` once the stream is unsubscribed and
    /// drained.
    pub async fn recv(&mut self) -> Option<LogEntry> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<LogEntry> {
        self.rx.try_recv().ok()
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        if let Some(mut subs) = self.subscribers.get_mut(&self.job_id) {
            subs.retain(|sub| sub.id != self.id);
            let empty = subs.is_empty();
            drop(subs);
            if empty {
                self.subscribers.remove_if(&self.job_id, |_, v| v.is_empty());
            }
        }
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("job_id", &self.job_id)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(step: &str) -> LogEntry {
        LogEntry::new(step, format!("message for {step}"), None)
    }

    #[tokio::test]
    async fn delivers_entries_published_after_subscribe() {
        let bus = LogBus::new();
        bus.publish("job-1", &entry("before"));

        let mut stream = bus.subscribe("job-1");
        bus.publish("job-1", &entry("after"));

        let got = stream.recv().await.unwrap();
        assert_eq!(got.step, "after");
    }

    #[tokio::test]
    async fn subscribers_are_isolated_per_job() {
        let bus = LogBus::new();
        let mut a = bus.subscribe("job-a");
        let _b = bus.subscribe("job-b");

        bus.publish("job-b", &entry("only-b"));
        assert!(a.try_recv().is_none());
    }

    #[tokio::test]
    async fn full_buffer_drops_newest_without_blocking() {
        let bus = LogBus::new();
        let mut stream = bus.subscribe("job-1");

        for i in 0..(SUBSCRIBER_BUFFER + 10) {
            bus.publish("job-1", &entry(&format!("s{i}")));
        }

        // The first SUBSCRIBER_BUFFER entries survive; the overflow is gone.
        let mut received = 0;
        while stream.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_BUFFER);
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let bus = LogBus::new();
        let stream = bus.subscribe("job-1");
        assert_eq!(bus.subscriber_count("job-1"), 1);
        drop(stream);
        assert_eq!(bus.subscriber_count("job-1"), 0);
    }
}

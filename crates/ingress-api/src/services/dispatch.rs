//! Sharded outbound dispatch
//!
//! Status events and validation requests leave the request path through a
//! [`Dispatcher`]: a fixed set of bounded FIFO channels, each drained by one
//! worker. Items are routed by a hash of their request id, so everything sent
//! for one request is delivered in submission order while different requests
//! proceed independently.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ingress_core::models::{StagedRequest, StatusEvent};
use reqwest::Client;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Items that carry the request id they must be ordered by.
pub trait Keyed {
    fn routing_key(&self) -> &str;
}

impl Keyed for StatusEvent {
    fn routing_key(&self) -> &str {
        &self.request_id
    }
}

impl Keyed for StagedRequest {
    fn routing_key(&self) -> &str {
        self.request_id()
    }
}

/// Final destination of dispatched items.
#[async_trait]
pub trait Sink<T>: Send + Sync {
    async fn deliver(&self, item: T) -> Result<()>;
}

pub struct Dispatcher<T> {
    name: &'static str,
    shards: Vec<mpsc::Sender<T>>,
}

impl<T> Dispatcher<T>
where
    T: Keyed + Send + 'static,
{
    /// Create a dispatcher with `shards` channels of `queue_size` items each and
    /// spawn one worker per channel.
    pub fn new(
        name: &'static str,
        sink: Arc<dyn Sink<T>>,
        shards: usize,
        queue_size: usize,
    ) -> Self {
        let shard_count = shards.max(1);
        let queue_size = queue_size.max(1);

        let shards = (0..shard_count)
            .map(|shard| {
                let (tx, rx) = mpsc::channel(queue_size);
                tokio::spawn(Self::worker(name, shard, rx, sink.clone()));
                tx
            })
            .collect();

        tracing::info!(
            dispatcher = name,
            shards = shard_count,
            queue_size,
            "Dispatcher initialized with bounded shards"
        );

        Self { name, shards }
    }

    /// Queue an item without waiting. Returns `false` if it was dropped because
    /// its shard is full or shut down.
    pub fn dispatch(&self, item: T) -> bool {
        let shard = self.shard_for(item.routing_key());
        match self.shards[shard].try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(item)) => {
                tracing::warn!(
                    dispatcher = self.name,
                    shard,
                    request_id = %item.routing_key(),
                    "Dispatch queue is full, dropping item"
                );
                false
            }
            Err(TrySendError::Closed(item)) => {
                tracing::error!(
                    dispatcher = self.name,
                    shard,
                    request_id = %item.routing_key(),
                    "Dispatch worker has stopped, dropping item"
                );
                false
            }
        }
    }

    fn shard_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    async fn worker(
        name: &'static str,
        shard: usize,
        mut rx: mpsc::Receiver<T>,
        sink: Arc<dyn Sink<T>>,
    ) {
        while let Some(item) = rx.recv().await {
            let request_id = item.routing_key().to_string();
            if let Err(e) = sink.deliver(item).await {
                tracing::error!(
                    dispatcher = name,
                    shard,
                    request_id = %request_id,
                    error = %e,
                    "Delivery failed"
                );
            }
        }
        tracing::debug!(dispatcher = name, shard, "Dispatch worker stopped");
    }
}

/// Sink that records items in the service log.
pub struct LogSink {
    kind: &'static str,
}

impl LogSink {
    pub fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl<T> Sink<T> for LogSink
where
    T: Serialize + Send + 'static,
{
    async fn deliver(&self, item: T) -> Result<()> {
        let payload = serde_json::to_string(&item)?;
        tracing::info!(kind = self.kind, payload = %payload, "Outbound message");
        Ok(())
    }
}

/// Sink that POSTs each item as JSON to a collaborator endpoint.
pub struct HttpSink {
    client: Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl<T> Sink<T> for HttpSink
where
    T: Serialize + Send + Sync + 'static,
{
    async fn deliver(&self, item: T) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&item)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("POST {} rejected", self.url))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingress_core::models::UploadStatus;
    use tokio::sync::{Mutex, Notify, Semaphore};

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(String, UploadStatus)>>,
    }

    #[async_trait]
    impl Sink<StatusEvent> for Recording {
        async fn deliver(&self, item: StatusEvent) -> Result<()> {
            self.seen.lock().await.push((item.request_id, item.status));
            Ok(())
        }
    }

    async fn drain(sink: &Recording, expected: usize) -> Vec<(String, UploadStatus)> {
        for _ in 0..200 {
            if sink.seen.lock().await.len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sink.seen.lock().await.clone()
    }

    #[tokio::test]
    async fn preserves_order_per_request_id() {
        let sink = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new("test", sink.clone(), 4, 64);

        for i in 0..10 {
            let id = format!("req-{i}");
            assert!(dispatcher.dispatch(StatusEvent::new("", &id, UploadStatus::Received, "")));
            assert!(dispatcher.dispatch(StatusEvent::new("", &id, UploadStatus::Success, "")));
        }

        let seen = drain(&sink, 20).await;
        assert_eq!(seen.len(), 20);
        for i in 0..10 {
            let id = format!("req-{i}");
            let statuses: Vec<_> = seen
                .iter()
                .filter(|(rid, _)| *rid == id)
                .map(|(_, s)| *s)
                .collect();
            assert_eq!(statuses, vec![UploadStatus::Received, UploadStatus::Success]);
        }
    }

    struct Stalled;

    #[async_trait]
    impl Sink<StatusEvent> for Stalled {
        async fn deliver(&self, _item: StatusEvent) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let dispatcher = Dispatcher::new("test", Arc::new(Stalled), 1, 1);
        let event = || StatusEvent::new("", "same", UploadStatus::Received, "");

        // The worker takes one item and stalls; the channel holds one more.
        let mut accepted = 0;
        for _ in 0..10 {
            if dispatcher.dispatch(event()) {
                accepted += 1;
            }
            tokio::task::yield_now().await;
        }
        assert!(accepted <= 2);
        assert!(accepted >= 1);
    }

    /// Holds every delivery until the test opens the gate.
    struct Gated {
        gate: Semaphore,
        started: Notify,
        seen: Mutex<Vec<(String, UploadStatus)>>,
    }

    #[async_trait]
    impl Sink<StatusEvent> for Gated {
        async fn deliver(&self, item: StatusEvent) -> Result<()> {
            self.started.notify_one();
            self.gate.acquire().await?.forget();
            self.seen.lock().await.push((item.request_id, item.status));
            Ok(())
        }
    }

    #[tokio::test]
    async fn full_shard_reports_the_drop_to_the_caller() {
        let sink = Arc::new(Gated {
            gate: Semaphore::new(0),
            started: Notify::new(),
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = Dispatcher::new("test", sink.clone(), 1, 1);
        let event = |id: &str, status| StatusEvent::new("", id, status, "");

        // The worker holds other-1 at the gate; other-2 fills the channel.
        assert!(dispatcher.dispatch(event("other-1", UploadStatus::Received)));
        sink.started.notified().await;
        assert!(dispatcher.dispatch(event("other-2", UploadStatus::Received)));
        assert!(!dispatcher.dispatch(event("req-x", UploadStatus::Received)));

        sink.gate.add_permits(8);
        for _ in 0..200 {
            if sink.seen.lock().await.len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            sink.seen.lock().await.clone(),
            vec![
                ("other-1".to_string(), UploadStatus::Received),
                ("other-2".to_string(), UploadStatus::Received),
            ]
        );
    }

    #[test]
    fn shard_choice_is_stable() {
        let (tx, _rx) = mpsc::channel::<StatusEvent>(1);
        let dispatcher = Dispatcher {
            name: "test",
            shards: vec![tx.clone(), tx.clone(), tx],
        };
        assert_eq!(dispatcher.shard_for("abc"), dispatcher.shard_for("abc"));
        assert!(dispatcher.shard_for("xyz") < 3);
    }
}

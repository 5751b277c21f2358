//! In-process event bus.
//!
//! Subscribers for a given event key are invoked in registration
//! order. Each invocation runs on its own task, so a panicking or
//! erroring subscriber is recorded and skipped without ever affecting
//! the publisher or sibling subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::metrics::BusMetrics;

/// A published event: a stable string key plus a JSON payload.
#[derive(Debug, Clone)]
pub struct Event {
    pub key: String,
    pub payload: Value,
}

#[async_trait]
pub trait Listener: Send + Sync {
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

pub struct EventBus {
    listeners: Arc<RwLock<HashMap<String, Vec<Arc<dyn Listener>>>>>,
    metrics: Arc<RwLock<BusMetrics>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(HashMap::new())),
            metrics: Arc::new(RwLock::new(BusMetrics::default())),
        }
    }

    /// Register a listener for `event_key`. Listeners are appended, so
    /// dispatch order matches subscription order.
    pub async fn subscribe(&self, event_key: impl Into<String>, listener: Arc<dyn Listener>) {
        self.listeners
            .write()
            .await
            .entry(event_key.into())
            .or_default()
            .push(listener);
    }

    pub async fn active_listener_count(&self) -> usize {
        self.listeners.read().await.values().map(Vec::len).sum()
    }

    pub async fn metrics(&self) -> BusMetrics {
        let mut snapshot = self.metrics.read().await.clone();
        snapshot.active_listeners = self.active_listener_count().await as u64;
        snapshot
    }

    /// Publish `event` to every subscriber of `event.key`, in
    /// registration order. Each subscriber runs isolated: an error or
    /// panic is logged and counted, never propagated here.
    pub async fn publish(&self, event: Event) {
        {
            let mut metrics = self.metrics.write().await;
            metrics.total_events += 1;
        }

        let listeners = {
            let guard = self.listeners.read().await;
            guard.get(&event.key).cloned().unwrap_or_default()
        };

        for listener in listeners {
            let event_for_task = event.clone();
            let outcome = tokio::spawn(async move { listener.handle(&event_for_task).await }).await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(event_key = %event.key, error = %err, "listener returned an error");
                    self.metrics.write().await.total_errors += 1;
                }
                Err(join_err) => {
                    tracing::error!(event_key = %event.key, error = %join_err, "listener panicked");
                    self.metrics.write().await.total_errors += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use serde_json::json;

    struct CountingListener {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Listener for CountingListener {
        async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingListener;

    #[async_trait]
    impl Listener for FailingListener {
        async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct PanickingListener;

    #[async_trait]
    impl Listener for PanickingListener {
        async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
            panic!("listener exploded");
        }
    }

    struct OrderRecordingListener {
        id: &'static str,
        order: Arc<RwLock<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Listener for OrderRecordingListener {
        async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
            self.order.write().await.push(self.id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe("user.registered", Arc::new(CountingListener { calls: calls.clone() })).await;

        bus.publish(Event { key: "user.registered".to_string(), payload: json!({}) }).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_listener_does_not_block_siblings() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe("transaction.created", Arc::new(FailingListener)).await;
        bus.subscribe("transaction.created", Arc::new(CountingListener { calls: calls.clone() })).await;

        bus.publish(Event { key: "transaction.created".to_string(), payload: json!({}) }).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.metrics().await.total_errors, 1);
    }

    #[tokio::test]
    async fn panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe("workspace.frozen", Arc::new(PanickingListener)).await;
        bus.subscribe("workspace.frozen", Arc::new(CountingListener { calls: calls.clone() })).await;

        bus.publish(Event { key: "workspace.frozen".to_string(), payload: json!({}) }).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.metrics().await.total_errors, 1);
    }

    #[tokio::test]
    async fn dispatch_order_matches_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(RwLock::new(Vec::new()));
        bus.subscribe("x", Arc::new(OrderRecordingListener { id: "first", order: order.clone() })).await;
        bus.subscribe("x", Arc::new(OrderRecordingListener { id: "second", order: order.clone() })).await;
        bus.subscribe("x", Arc::new(OrderRecordingListener { id: "third", order: order.clone() })).await;

        bus.publish(Event { key: "x".to_string(), payload: json!({}) }).await;
        assert_eq!(*order.read().await, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn metrics_track_totals_and_listener_count() {
        let bus = EventBus::new();
        bus.subscribe("a", Arc::new(CountingListener { calls: Arc::new(AtomicUsize::new(0)) })).await;
        bus.subscribe("b", Arc::new(CountingListener { calls: Arc::new(AtomicUsize::new(0)) })).await;

        bus.publish(Event { key: "a".to_string(), payload: json!(null) }).await;
        bus.publish(Event { key: "unknown".to_string(), payload: json!(null) }).await;

        let metrics = bus.metrics().await;
        assert_eq!(metrics.total_events, 2);
        assert_eq!(metrics.active_listeners, 2);
    }
}

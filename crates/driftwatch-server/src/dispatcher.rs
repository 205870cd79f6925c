use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use driftwatch_core::{ChangeEvent, Notifier, RepositoryUpdater, SinkError};

/// A downstream consumer of change events.
#[derive(Clone)]
pub enum Sink {
    Notifier(Arc<dyn Notifier>),
    Repository(Arc<dyn RepositoryUpdater>),
}

impl Sink {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Notifier(_) => "notifier",
            Self::Repository(_) => "repository",
        }
    }

    async fn deliver(&self, event: &ChangeEvent) -> Result<(), SinkError> {
        match self {
            Self::Notifier(n) => n.notify(event).await,
            Self::Repository(r) => r.update(event).await,
        }
    }
}

#[derive(Clone)]
pub struct Consumer {
    pub name: String,
    pub sink: Sink,
}

/// How one consumer handled one event.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerOutcome {
    pub consumer: String,
    pub kind: &'static str,
    pub result: Result<(), String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub event_name: String,
    pub outcomes: Vec<ConsumerOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn is_unmatched(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Running totals, exposed on `/health`.
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    unmatched: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStatsSnapshot {
    pub dispatched: u64,
    pub delivered: u64,
    pub failed: u64,
    pub unmatched: u64,
}

impl DispatchStats {
    fn record(&self, report: &DispatchReport) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        if report.is_unmatched() {
            self.unmatched.fetch_add(1, Ordering::Relaxed);
        }
        self.delivered
            .fetch_add(report.delivered() as u64, Ordering::Relaxed);
        self.failed.fetch_add(report.failed() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
        }
    }
}

/// Routes change events to the consumers subscribed to their event name.
///
/// The subscription table is filled during startup and shared read-only
/// behind an `Arc` afterwards. Delivery is best-effort: every consumer is
/// invoked concurrently, each under its own timeout, and one consumer's
/// failure never affects another.
pub struct Dispatcher {
    table: HashMap<String, Vec<Consumer>>,
    consumer_timeout: Duration,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(consumer_timeout: Duration) -> Self {
        Self {
            table: HashMap::new(),
            consumer_timeout,
            stats: DispatchStats::default(),
        }
    }

    /// Subscribe `consumer` to `event_name`. Repeat subscriptions of the same
    /// consumer to the same event are collapsed.
    pub fn subscribe(&mut self, event_name: &str, consumer: Consumer) {
        let consumers = self.table.entry(event_name.to_string()).or_default();
        let duplicate = consumers
            .iter()
            .any(|c| c.name == consumer.name && c.sink.kind() == consumer.sink.kind());
        if !duplicate {
            consumers.push(consumer);
        }
    }

    pub fn consumers_for(&self, event_name: &str) -> &[Consumer] {
        self.table.get(event_name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn dispatch(&self, event: &ChangeEvent) -> DispatchReport {
        let consumers = self.consumers_for(&event.event_name);
        if consumers.is_empty() {
            tracing::warn!(
                event_name = %event.event_name,
                artifact = %event.artifact,
                "No consumers subscribed to event"
            );
        }

        let deliveries = consumers.iter().map(|c| async move {
            let result = match tokio::time::timeout(self.consumer_timeout, c.sink.deliver(event))
                .await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!(
                    "timed out after {}s",
                    self.consumer_timeout.as_secs_f32()
                )),
            };
            match &result {
                Ok(()) => tracing::debug!(
                    event_name = %event.event_name,
                    artifact = %event.artifact,
                    consumer = %c.name,
                    "Delivered"
                ),
                Err(error) => tracing::warn!(
                    event_name = %event.event_name,
                    artifact = %event.artifact,
                    consumer = %c.name,
                    kind = c.sink.kind(),
                    error = %error,
                    "Consumer failed"
                ),
            }
            ConsumerOutcome {
                consumer: c.name.clone(),
                kind: c.sink.kind(),
                result,
            }
        });

        let report = DispatchReport {
            event_name: event.event_name.clone(),
            outcomes: join_all(deliveries).await,
        };
        self.stats.record(&report);
        report
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use driftwatch_core::{ChangeEvent, SourceAdapter, SourceConfig, select_latest};

use crate::dispatcher::Dispatcher;

/// Periodically checks one source's targets and emits a change event whenever
/// an artifact's newest version differs from the last one seen.
///
/// The cache of last-seen versions is owned by the worker task, so ticks of a
/// single poller never overlap.
pub struct Poller {
    config: SourceConfig,
    source: Arc<dyn SourceAdapter>,
    dispatcher: Arc<Dispatcher>,
    last_seen: HashMap<String, String>,
}

/// Handle to a running poller task.
pub struct PollerHandle {
    pub event_name: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the poller to stop, wait up to `grace` for the in-flight tick,
    /// then abort. Returns `true` if it stopped on its own.
    pub async fn stop(mut self, grace: Duration) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(())) => {
                tracing::debug!(event_name = %self.event_name, "Poller stopped");
                true
            },
            Ok(Err(e)) => {
                tracing::warn!(event_name = %self.event_name, error = %e, "Poller task failed");
                false
            },
            Err(_) => {
                tracing::warn!(
                    event_name = %self.event_name,
                    grace_secs = grace.as_secs(),
                    "Poller did not stop in time, aborting"
                );
                self.task.abort();
                false
            },
        }
    }
}

impl Poller {
    pub fn new(
        config: SourceConfig,
        source: Arc<dyn SourceAdapter>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            config,
            source,
            dispatcher,
            last_seen: HashMap::new(),
        }
    }

    pub fn event_name(&self) -> &str {
        &self.config.event_name
    }

    /// Spawn the worker loop. The first tick runs immediately.
    pub fn start(self, cancel: CancellationToken) -> PollerHandle {
        let event_name = self.config.event_name.clone();
        let task = tokio::spawn(self.run(cancel.clone()));
        PollerHandle {
            event_name,
            cancel,
            task,
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        let period = Duration::from_secs(self.config.interval_seconds.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            event_name = %self.config.event_name,
            source = %self.config.kind,
            targets = self.config.targets.len(),
            interval_secs = period.as_secs(),
            "Poller started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick(&cancel).await;
                },
            }
        }

        tracing::info!(event_name = %self.config.event_name, "Poller stopping");
    }

    /// Check every target once. Returns the number of change events emitted.
    async fn tick(&mut self, cancel: &CancellationToken) -> usize {
        let mut emitted = 0;
        for target in &self.config.targets {
            if cancel.is_cancelled() {
                break;
            }

            let candidates = match self.source.list_versions(target).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(
                        event_name = %self.config.event_name,
                        artifact = %target,
                        error = %e,
                        "Failed to list versions"
                    );
                    continue;
                },
            };
            let Some(latest) = select_latest(&candidates) else {
                tracing::debug!(
                    event_name = %self.config.event_name,
                    artifact = %target,
                    "No versions listed"
                );
                continue;
            };

            let previous = self.last_seen.get(target).map_or("", String::as_str);
            if latest.version == previous {
                continue;
            }
            let version = latest.version.clone();
            self.last_seen.insert(target.clone(), version.clone());

            let event = ChangeEvent::new(
                self.config.event_name.as_str(),
                self.config.source_url(),
                target.as_str(),
                version,
            );
            tracing::info!(
                event_name = %event.event_name,
                artifact = %event.artifact,
                version = %event.version,
                "New version detected"
            );
            self.dispatcher.dispatch(&event).await;
            emitted += 1;
        }
        emitted
    }
}

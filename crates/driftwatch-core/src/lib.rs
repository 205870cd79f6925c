pub mod config;
pub mod event;
pub mod registry;
pub mod sink;
pub mod source;
pub mod validation;

pub use config::{NotifierConfig, RepositoryConfig, SourceConfig, WatchConfig, WebhookConfig};
pub use event::{ChangeEvent, VersionCandidate, select_latest};
pub use registry::{TypeRegistry, UnknownTypeError};
pub use sink::{Notifier, RepositoryUpdater, SinkError};
pub use source::{SourceAdapter, SourceError};
pub use validation::{ValidationOutcome, ValidationReport};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::event::{ChangeEvent, VersionCandidate};
    use crate::sink::{Notifier, RepositoryUpdater, SinkError};
    use crate::source::{SourceAdapter, SourceError};

    /// Build a change event with placeholder source and artifact.
    pub fn make_change_event(event_name: &str, version: &str) -> ChangeEvent {
        ChangeEvent::new(event_name, "registry.test", "app", version)
    }

    /// Source that replays a scripted list of responses, one per
    /// `list_versions` call. Once the script runs out it keeps returning the
    /// last response.
    ///
    /// Tracks how many calls overlap so tests can assert ticks never run
    /// concurrently.
    pub struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<VersionCandidate>, String>>>,
        last: Mutex<Option<Result<Vec<VersionCandidate>, String>>>,
        delay: Duration,
        validate_ok: bool,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        /// One single-candidate response per entry; `""` means "no versions".
        pub fn versions(versions: &[&str]) -> Self {
            let script = versions
                .iter()
                .map(|v| {
                    if v.is_empty() {
                        Ok(Vec::new())
                    } else {
                        Ok(vec![VersionCandidate::new(*v, None)])
                    }
                })
                .collect();
            Self::from_script(script)
        }

        pub fn from_script(script: Vec<Result<Vec<VersionCandidate>, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                delay: Duration::ZERO,
                validate_ok: true,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        /// Make every call take `delay` before answering.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn failing_validation(mut self) -> Self {
            self.validate_ok = false;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        fn next_response(&self) -> Result<Vec<VersionCandidate>, String> {
            let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(next) = script.pop_front() {
                *last = Some(next.clone());
                next
            } else {
                last.clone().unwrap_or_else(|| Ok(Vec::new()))
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedSource {
        async fn list_versions(
            &self,
            _artifact: &str,
        ) -> Result<Vec<VersionCandidate>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let response = self.next_response();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            response.map_err(SourceError::Request)
        }

        async fn validate_connection(&self) -> Result<(), SourceError> {
            if self.validate_ok {
                Ok(())
            } else {
                Err(SourceError::Auth("scripted failure".to_string()))
            }
        }
    }

    /// How a [`RecordingSink`] reacts to an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SinkBehavior {
        Succeed,
        Fail,
        /// Sleep this long before succeeding.
        Stall(Duration),
    }

    /// Notifier/updater that records every event it receives.
    pub struct RecordingSink {
        behavior: SinkBehavior,
        validate_ok: bool,
        received: Mutex<Vec<ChangeEvent>>,
    }

    impl RecordingSink {
        pub fn new(behavior: SinkBehavior) -> Self {
            Self {
                behavior,
                validate_ok: true,
                received: Mutex::new(Vec::new()),
            }
        }

        pub fn succeeding() -> Self {
            Self::new(SinkBehavior::Succeed)
        }

        pub fn failing() -> Self {
            Self::new(SinkBehavior::Fail)
        }

        pub fn failing_validation(mut self) -> Self {
            self.validate_ok = false;
            self
        }

        pub fn received(&self) -> Vec<ChangeEvent> {
            self.received
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }

        async fn handle(&self, event: &ChangeEvent) -> Result<(), SinkError> {
            self.received
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event.clone());
            match self.behavior {
                SinkBehavior::Succeed => Ok(()),
                SinkBehavior::Fail => Err(SinkError::Rejected("recorded failure".to_string())),
                SinkBehavior::Stall(d) => {
                    tokio::time::sleep(d).await;
                    Ok(())
                },
            }
        }

        fn probe(&self) -> Result<(), SinkError> {
            if self.validate_ok {
                Ok(())
            } else {
                Err(SinkError::Rejected("probe refused".to_string()))
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingSink {
        async fn notify(&self, event: &ChangeEvent) -> Result<(), SinkError> {
            self.handle(event).await
        }

        async fn validate_connection(&self) -> Result<(), SinkError> {
            self.probe()
        }
    }

    #[async_trait]
    impl RepositoryUpdater for RecordingSink {
        async fn update(&self, event: &ChangeEvent) -> Result<(), SinkError> {
            self.handle(event).await
        }

        async fn validate_connection(&self) -> Result<(), SinkError> {
            self.probe()
        }
    }
}

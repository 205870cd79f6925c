use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use driftwatch_core::{
    Notifier, RepositoryUpdater, SourceAdapter, ValidationOutcome, ValidationReport,
};

/// Probe of one external dependency, run once at startup.
#[async_trait]
pub trait ExternalValidator: Send + Sync {
    /// Entry label used in error messages, e.g. `poller 'hub'`.
    fn label(&self) -> String;

    async fn validate(&self) -> ValidationOutcome;
}

pub struct PollerValidator {
    pub event_name: String,
    pub source: Arc<dyn SourceAdapter>,
}

pub struct NotifierValidator {
    pub name: String,
    pub notifier: Arc<dyn Notifier>,
}

pub struct RepositoryValidator {
    pub name: String,
    pub updater: Arc<dyn RepositoryUpdater>,
}

#[async_trait]
impl ExternalValidator for PollerValidator {
    fn label(&self) -> String {
        format!("poller '{}'", self.event_name)
    }

    async fn validate(&self) -> ValidationOutcome {
        match self.source.validate_connection().await {
            Ok(()) => ValidationOutcome::ok(),
            Err(e) => ValidationOutcome::failed(format!("{}: {e}", self.label())),
        }
    }
}

#[async_trait]
impl ExternalValidator for NotifierValidator {
    fn label(&self) -> String {
        format!("notifier '{}'", self.name)
    }

    async fn validate(&self) -> ValidationOutcome {
        match self.notifier.validate_connection().await {
            Ok(()) => ValidationOutcome::ok(),
            Err(e) => ValidationOutcome::failed(format!("{}: {e}", self.label())),
        }
    }
}

#[async_trait]
impl ExternalValidator for RepositoryValidator {
    fn label(&self) -> String {
        format!("repository '{}'", self.name)
    }

    async fn validate(&self) -> ValidationOutcome {
        match self.updater.validate_connection().await {
            Ok(()) => ValidationOutcome::ok(),
            Err(e) => ValidationOutcome::failed(format!("{}: {e}", self.label())),
        }
    }
}

/// Runs every probe concurrently and folds the results into one report.
///
/// Probes are registered repositories first, then notifiers, then pollers;
/// errors in the report follow that order no matter which probe finishes
/// first. Nothing short-circuits. A probe still running after
/// `probe_timeout` counts as failed.
pub struct ExternalValidatorService {
    validators: Vec<Arc<dyn ExternalValidator>>,
    probe_timeout: Duration,
}

impl ExternalValidatorService {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            validators: Vec::new(),
            probe_timeout,
        }
    }

    pub fn add(&mut self, validator: Arc<dyn ExternalValidator>) -> &mut Self {
        self.validators.push(validator);
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub async fn validate_all(&self) -> ValidationReport {
        let tasks: Vec<_> = self
            .validators
            .iter()
            .map(|v| {
                let v = Arc::clone(v);
                let label = v.label();
                let limit = self.probe_timeout;
                let task = tokio::spawn(async move {
                    match tokio::time::timeout(limit, v.validate()).await {
                        Ok(outcome) => outcome,
                        Err(_) => ValidationOutcome::failed(format!(
                            "{}: timed out after {}s",
                            v.label(),
                            limit.as_secs()
                        )),
                    }
                });
                (label, task)
            })
            .collect();

        let mut report = ValidationReport::default();
        for (label, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => ValidationOutcome::failed(format!("{label}: probe crashed: {e}")),
            };
            if !outcome.success {
                tracing::warn!(entry = %label, errors = ?outcome.errors, "External validation failed");
            }
            report.push(outcome);
        }
        report
    }
}

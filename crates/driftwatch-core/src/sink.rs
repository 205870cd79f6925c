use async_trait::async_trait;
use thiserror::Error;

use crate::event::ChangeEvent;

/// Failure delivering a change to a downstream consumer.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("rejected by remote: {0}")]
    Rejected(String),
    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid sink configuration: {0}")]
    Config(String),
}

/// Chat-style notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), SinkError>;

    async fn validate_connection(&self) -> Result<(), SinkError>;
}

/// Sink that rewrites artifact references in a source repository.
#[async_trait]
pub trait RepositoryUpdater: Send + Sync {
    async fn update(&self, event: &ChangeEvent) -> Result<(), SinkError>;

    async fn validate_connection(&self) -> Result<(), SinkError>;
}

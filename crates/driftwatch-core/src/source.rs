use async_trait::async_trait;
use thiserror::Error;

use crate::event::VersionCandidate;

/// Failure talking to a registry. Always recoverable: the poller logs it and
/// skips the artifact for this tick.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },
    #[error("unparseable response: {0}")]
    Parse(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid source configuration: {0}")]
    Config(String),
}

/// A registry that can list published versions of an artifact.
///
/// One instance is built per configured source, so implementations carry
/// their URL and credentials and may cache auth tokens between calls.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// All versions the registry currently reports for `artifact`.
    async fn list_versions(&self, artifact: &str) -> Result<Vec<VersionCandidate>, SourceError>;

    /// Cheap connectivity/credential probe used by the startup validator.
    async fn validate_connection(&self) -> Result<(), SourceError>;
}

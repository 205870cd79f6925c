use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use driftwatch_core::{SourceAdapter, SourceConfig, SourceError, VersionCandidate};

use crate::http::{fetch_json, parse_timestamp};

/// Docker Hub issues login JWTs valid for about an hour; refresh a bit early.
const TOKEN_REUSE: Duration = Duration::from_secs(50 * 60);

/// Source adapter for Docker Hub repositories.
pub struct DockerHubSource {
    client: reqwest::Client,
    base_uri: String,
    username: Option<String>,
    password: Option<String>,
    targets: Vec<String>,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    token: String,
    fetched_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    results: Vec<TagResult>,
}

#[derive(Debug, Deserialize)]
struct TagResult {
    name: String,
    tag_last_pushed: Option<String>,
    last_updated: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

impl DockerHubSource {
    pub fn new(client: reqwest::Client, base_uri: &str, config: &SourceConfig) -> Self {
        Self {
            client,
            base_uri: base_uri.trim_end_matches('/').to_string(),
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone().filter(|p| !p.is_empty()),
            targets: config.targets.clone(),
            token: Mutex::new(None),
        }
    }

    fn tags_url(&self, image: &str) -> String {
        format!(
            "{}/repositories/{}/tags?page_size=100&ordering=last_updated",
            self.base_uri,
            repository_path(image)
        )
    }

    /// Bearer token for authenticated requests, or `None` for anonymous access.
    async fn bearer(&self) -> Result<Option<String>, SourceError> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Ok(None);
        };

        let mut cached = self.token.lock().await;
        if let Some(ref t) = *cached
            && t.fetched_at.elapsed() < TOKEN_REUSE
        {
            return Ok(Some(t.token.clone()));
        }

        let login: LoginResponse = fetch_json(
            self.client
                .post(format!("{}/users/login", self.base_uri))
                .json(&LoginRequest { username, password }),
        )
        .await
        .map_err(|e| match e {
            SourceError::Status { status, .. } => {
                SourceError::Auth(format!("Docker Hub login returned HTTP {status}"))
            },
            other => other,
        })?;

        tracing::debug!(username = %username, "Refreshed Docker Hub token");
        *cached = Some(CachedToken {
            token: login.token.clone(),
            fetched_at: Instant::now(),
        });
        Ok(Some(login.token))
    }
}

/// Official images live under `library/` (`nginx` → `library/nginx`).
fn repository_path(image: &str) -> String {
    if image.contains('/') {
        image.to_string()
    } else {
        format!("library/{image}")
    }
}

fn into_candidates(resp: TagsResponse) -> Vec<VersionCandidate> {
    resp.results
        .into_iter()
        .map(|t| {
            let pushed = t.tag_last_pushed.as_deref().or(t.last_updated.as_deref());
            VersionCandidate::new(t.name, parse_timestamp(pushed))
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for DockerHubSource {
    async fn list_versions(&self, artifact: &str) -> Result<Vec<VersionCandidate>, SourceError> {
        let mut request = self.client.get(self.tags_url(artifact));
        if let Some(token) = self.bearer().await? {
            request = request.bearer_auth(token);
        }
        let resp: TagsResponse = fetch_json(request).await?;
        Ok(into_candidates(resp))
    }

    async fn validate_connection(&self) -> Result<(), SourceError> {
        for target in &self.targets {
            self.list_versions(target).await?;
        }
        tracing::info!(targets = self.targets.len(), "Connected to Docker Hub");
        Ok(())
    }
}

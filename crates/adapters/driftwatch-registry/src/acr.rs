use async_trait::async_trait;
use serde::Deserialize;

use driftwatch_core::{SourceAdapter, SourceConfig, SourceError, VersionCandidate};

use crate::http::{check_status, fetch_json, parse_timestamp};

/// Source adapter for an Azure Container Registry.
pub struct AcrSource {
    client: reqwest::Client,
    base: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AcrTagsResponse {
    #[serde(default)]
    tags: Vec<AcrTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcrTag {
    name: String,
    created_time: Option<String>,
    last_update_time: Option<String>,
}

impl AcrSource {
    /// Fails when the source has no registry URL.
    pub fn new(client: reqwest::Client, config: &SourceConfig) -> Result<Self, SourceError> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                SourceError::Config(format!(
                    "acr source '{}' requires a registry url",
                    config.event_name
                ))
            })?;
        Ok(Self {
            client,
            base: registry_base(url),
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone(),
        })
    }

    fn tags_url(&self, image: &str) -> String {
        format!("{}/acr/v1/{image}/_tags?orderby=timedesc", self.base)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }
}

/// Accept either a bare login server (`myreg.azurecr.io`) or a full URL.
fn registry_base(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("https://") || url.starts_with("http://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn into_candidates(resp: AcrTagsResponse) -> Vec<VersionCandidate> {
    resp.tags
        .into_iter()
        .map(|t| {
            let created = t.created_time.as_deref().or(t.last_update_time.as_deref());
            VersionCandidate::new(t.name, parse_timestamp(created))
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for AcrSource {
    async fn list_versions(&self, artifact: &str) -> Result<Vec<VersionCandidate>, SourceError> {
        let request = self.authed(self.client.get(self.tags_url(artifact)));
        let resp: AcrTagsResponse = fetch_json(request).await?;
        Ok(into_candidates(resp))
    }

    async fn validate_connection(&self) -> Result<(), SourceError> {
        let request = self.authed(self.client.get(format!("{}/v2/_catalog", self.base)));
        let resp = request
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;
        check_status(resp)?;
        tracing::info!(registry = %self.base, "Connected to ACR");
        Ok(())
    }
}

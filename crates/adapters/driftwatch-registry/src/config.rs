use std::time::Duration;

/// Settings shared by every registry adapter instance.
#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// Base of the Docker Hub v2 API.
    pub docker_hub_uri: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            docker_hub_uri: "https://hub.docker.com/v2".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Build the HTTP client shared by all adapters.
pub fn build_http_client(config: &RegistryClientConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("driftwatch/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout)
        .build()
}

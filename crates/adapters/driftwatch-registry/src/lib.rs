//! Registry source adapters: Docker Hub and Azure Container Registry.

pub mod acr;
pub mod config;
pub mod docker;
mod http;

pub use acr::AcrSource;
pub use config::{RegistryClientConfig, build_http_client};
pub use docker::DockerHubSource;

use std::sync::Arc;
use std::time::Duration;

use driftwatch_core::{
    Notifier, NotifierConfig, RepositoryConfig, RepositoryUpdater, SourceAdapter, SourceConfig,
    SourceError, TypeRegistry, WatchConfig,
};
use driftwatch_git::GitRepositoryUpdater;
use driftwatch_registry::{AcrSource, DockerHubSource, RegistryClientConfig, build_http_client};
use driftwatch_slack::SlackNotifier;

use crate::config::SystemConfig;
use crate::webhooks::{self, Normalizer};

pub type SourceConstructor = Box<
    dyn Fn(&SourceConfig) -> Result<Arc<dyn SourceAdapter>, SourceError> + Send + Sync,
>;
pub type NotifierConstructor = Box<dyn Fn(&NotifierConfig) -> Arc<dyn Notifier> + Send + Sync>;
pub type RepositoryConstructor =
    Box<dyn Fn(&RepositoryConfig) -> Arc<dyn RepositoryUpdater> + Send + Sync>;

/// Type-tag registries for every pluggable component.
pub struct Factories {
    pub sources: TypeRegistry<SourceConstructor>,
    pub notifiers: TypeRegistry<NotifierConstructor>,
    pub repositories: TypeRegistry<RepositoryConstructor>,
    pub webhooks: TypeRegistry<Normalizer>,
}

impl Default for Factories {
    fn default() -> Self {
        Self {
            sources: TypeRegistry::new("poller"),
            notifiers: TypeRegistry::new("notifier"),
            repositories: TypeRegistry::new("repository"),
            webhooks: TypeRegistry::new("webhook"),
        }
    }
}

impl Factories {
    /// Registries holding the compiled-in adapters, sharing one HTTP client.
    pub fn builtin(system: &SystemConfig) -> reqwest::Result<Self> {
        let registry = RegistryClientConfig {
            docker_hub_uri: system.docker_hub_uri.clone(),
            request_timeout: Duration::from_secs(system.http_timeout_secs),
        };
        let client = build_http_client(&registry)?;
        let mut factories = Self::default();

        let (c, hub) = (client.clone(), registry.docker_hub_uri.clone());
        factories.sources.register(
            "docker",
            Box::new(move |cfg: &SourceConfig| {
                Ok(Arc::new(DockerHubSource::new(c.clone(), &hub, cfg)) as Arc<dyn SourceAdapter>)
            }),
        );
        let c = client.clone();
        factories.sources.register(
            "acr",
            Box::new(move |cfg: &SourceConfig| {
                Ok(Arc::new(AcrSource::new(c.clone(), cfg)?) as Arc<dyn SourceAdapter>)
            }),
        );

        let (c, slack_api) = (client, system.slack_api_uri.clone());
        factories.notifiers.register(
            "slack",
            Box::new(move |cfg: &NotifierConfig| {
                Arc::new(SlackNotifier::new(cfg, c.clone(), &slack_api)) as Arc<dyn Notifier>
            }),
        );

        factories.repositories.register(
            "git",
            Box::new(|cfg: &RepositoryConfig| {
                Arc::new(GitRepositoryUpdater::new(cfg)) as Arc<dyn RepositoryUpdater>
            }),
        );

        factories
            .webhooks
            .register("docker", webhooks::docker::normalize as Normalizer)
            .register("acr", webhooks::acr::normalize as Normalizer);

        Ok(factories)
    }

    /// Every config entry whose type tag has no registered constructor.
    pub fn check_types(&self, watch: &WatchConfig) -> Vec<String> {
        let mut issues = Vec::new();
        for (i, p) in watch.pollers.iter().enumerate() {
            if let Err(e) = self.sources.resolve(&p.kind) {
                issues.push(format!("pollers[{i}] ('{}'): {e}", p.event_name));
            }
        }
        for (i, w) in watch.webhooks.iter().enumerate() {
            if let Err(e) = self.webhooks.resolve(&w.kind) {
                issues.push(format!("webhooks[{i}] ('{}'): {e}", w.event_name));
            }
        }
        for (i, n) in watch.notifiers.iter().enumerate() {
            if let Err(e) = self.notifiers.resolve(&n.kind) {
                issues.push(format!("notifiers[{i}] ('{}'): {e}", n.name));
            }
        }
        for (i, r) in watch.repositories.iter().enumerate() {
            if let Err(e) = self.repositories.resolve(&r.kind) {
                issues.push(format!("repositories[{i}] ('{}'): {e}", r.name));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use driftwatch_core::WebhookConfig;

    use super::*;

    fn builtin() -> Factories {
        Factories::builtin(&SystemConfig::default()).unwrap()
    }

    #[test]
    fn builtin_tags_registered() {
        let f = builtin();
        assert_eq!(f.sources.tags(), vec!["acr", "docker"]);
        assert_eq!(f.notifiers.tags(), vec!["slack"]);
        assert_eq!(f.repositories.tags(), vec!["git"]);
        assert_eq!(f.webhooks.tags(), vec!["acr", "docker"]);
    }

    #[test]
    fn unknown_types_name_their_entry() {
        let watch = WatchConfig {
            pollers: vec![SourceConfig {
                event_name: "quay".to_string(),
                kind: "quay".to_string(),
                url: None,
                username: None,
                password: None,
                targets: vec!["x".to_string()],
                interval_seconds: 60,
            }],
            webhooks: vec![WebhookConfig {
                event_name: "gh".to_string(),
                path: "/gh".to_string(),
                kind: "github".to_string(),
            }],
            notifiers: vec![NotifierConfig {
                name: "chat".to_string(),
                kind: "teams".to_string(),
                token: String::new(),
                channel: String::new(),
                event_subscriptions: vec!["quay".to_string()],
            }],
            repositories: Vec::new(),
        };

        let issues = builtin().check_types(&watch);

        assert_eq!(
            issues,
            vec![
                "pollers[0] ('quay'): unknown poller type 'quay'".to_string(),
                "webhooks[0] ('gh'): unknown webhook type 'github'".to_string(),
                "notifiers[0] ('chat'): unknown notifier type 'teams'".to_string(),
            ]
        );
    }

    #[test]
    fn acr_without_url_fails_construction() {
        let f = builtin();
        let cfg = SourceConfig {
            event_name: "acr".to_string(),
            kind: "acr".to_string(),
            url: None,
            username: None,
            password: None,
            targets: vec!["api".to_string()],
            interval_seconds: 60,
        };
        let ctor = f.sources.resolve("acr").unwrap();
        assert!(ctor(&cfg).is_err());
    }
}

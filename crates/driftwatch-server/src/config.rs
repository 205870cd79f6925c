use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use driftwatch_core::WatchConfig;

pub const DEFAULT_CONFIG_PATH: &str = "driftwatch.toml";

/// Routes served by the app itself; webhooks may not claim them.
const RESERVED_PATHS: [&str; 2] = ["/health", "/status"];
const SECRET_ENV_PREFIX: &str = "env:";

/// Top-level configuration, loaded from `driftwatch.toml`.
///
/// The watch graph (`pollers`, `webhooks`, `notifiers`, `repositories`) sits
/// at the top level of the file next to the server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// How long in-flight poller ticks get to finish on shutdown.
    pub shutdown_grace_secs: u64,
    pub dispatch: DispatchConfig,
    pub system: SystemConfig,
    #[serde(flatten)]
    pub watch: WatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            shutdown_grace_secs: 10,
            dispatch: DispatchConfig::default(),
            system: SystemConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on a single consumer invocation.
    pub consumer_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            consumer_timeout_secs: 30,
        }
    }
}

/// Endpoints and client settings shared by the adapters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub docker_hub_uri: String,
    pub slack_api_uri: String,
    pub http_timeout_secs: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            docker_hub_uri: "https://hub.docker.com/v2".to_string(),
            slack_api_uri: driftwatch_slack::DEFAULT_SLACK_API.to_string(),
            http_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unresolved secrets: {}", .0.join("; "))]
    Secrets(Vec<String>),
}

impl ServerConfig {
    /// Config file path: `DRIFTWATCH_CONFIG` or `driftwatch.toml`.
    pub fn path_from_env() -> PathBuf {
        match std::env::var("DRIFTWATCH_CONFIG") {
            Ok(p) if !p.is_empty() => PathBuf::from(p),
            _ => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Read and parse `path`, then apply env overrides and resolve `env:`
    /// secrets from the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ServerConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "Loaded configuration");

        let env = |name: &str| std::env::var(name).ok();
        config.apply_env_overrides(env);
        config.resolve_secrets(env)?;
        Ok(config)
    }

    /// Apply `DRIFTWATCH_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("DRIFTWATCH_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(val) = lookup("DRIFTWATCH_CONSUMER_TIMEOUT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            self.dispatch.consumer_timeout_secs = n;
        }
    }

    /// Replace every `env:NAME` secret with the value of `NAME`.
    ///
    /// All missing variables are reported together.
    pub fn resolve_secrets(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        let mut resolve = |owner: String, value: &mut String| {
            let Some(var) = value.strip_prefix(SECRET_ENV_PREFIX).map(str::to_string) else {
                return;
            };
            match lookup(&var) {
                Some(v) => *value = v,
                None => {
                    missing.push(format!("{owner}: environment variable '{var}' is not set"));
                },
            }
        };

        for p in &mut self.watch.pollers {
            if let Some(pw) = p.password.as_mut() {
                resolve(format!("poller '{}' password", p.event_name), pw);
            }
        }
        for n in &mut self.watch.notifiers {
            resolve(format!("notifier '{}' token", n.name), &mut n.token);
        }
        for r in &mut self.watch.repositories {
            if let Some(token) = r.token.as_mut() {
                resolve(format!("repository '{}' token", r.name), token);
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Secrets(missing))
        }
    }

    /// Every structural problem with this configuration. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.watch.validate_structure();
        for (i, w) in self.watch.webhooks.iter().enumerate() {
            if RESERVED_PATHS.contains(&w.path.as_str()) {
                issues.push(format!(
                    "webhooks[{i}] ('{}'): path '{}' is reserved",
                    w.event_name, w.path
                ));
            }
        }
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            issues.push(format!(
                "listen_addr '{}' is not a valid socket address",
                self.listen_addr
            ));
        }
        if self.dispatch.consumer_timeout_secs == 0 {
            issues.push("dispatch.consumer_timeout_secs must be > 0".to_string());
        }
        if self.system.http_timeout_secs == 0 {
            issues.push("system.http_timeout_secs must be > 0".to_string());
        }
        issues
    }

    pub fn consumer_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch.consumer_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const FULL: &str = r##"
listen_addr = "127.0.0.1:9090"
shutdown_grace_secs = 5

[dispatch]
consumer_timeout_secs = 12

[system]
slack_api_uri = "http://localhost:9999/api"

[[pollers]]
event_name = "hub"
type = "docker"
targets = ["nginx", "bitnami/redis"]
interval_seconds = 300

[[pollers]]
event_name = "acr-prod"
type = "acr"
url = "myreg.azurecr.io"
username = "reader"
password = "env:ACR_PASSWORD"
targets = ["team/api"]

[[webhooks]]
event_name = "acr-push"
path = "/hooks/acr"
type = "acr"

[[notifiers]]
name = "ops"
type = "slack"
token = "env:SLACK_TOKEN"
channel = "#deploys"
event_subscriptions = ["hub", "acr-push"]

[[repositories]]
name = "infra"
url = "https://github.com/acme/infra.git"
file_extensions = [".yaml"]
event_subscriptions = ["acr-prod"]
"##;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.shutdown_grace_secs, 10);
        assert_eq!(cfg.dispatch.consumer_timeout_secs, 30);
        assert_eq!(cfg.system.docker_hub_uri, "https://hub.docker.com/v2");
        assert!(cfg.watch.pollers.is_empty());
    }

    #[test]
    fn parse_full_toml() {
        let cfg: ServerConfig = toml::from_str(FULL).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.dispatch.consumer_timeout_secs, 12);
        assert_eq!(cfg.system.slack_api_uri, "http://localhost:9999/api");
        assert_eq!(cfg.system.http_timeout_secs, 30);
        assert_eq!(cfg.watch.pollers.len(), 2);
        assert_eq!(cfg.watch.pollers[0].interval_seconds, 300);
        assert_eq!(cfg.watch.pollers[1].interval_seconds, 60);
        assert_eq!(cfg.watch.webhooks[0].path, "/hooks/acr");
        assert_eq!(cfg.watch.repositories[0].kind, "git");
        assert_eq!(cfg.watch.repositories[0].branch, "main");
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg: ServerConfig = toml::from_str(FULL).unwrap();
        let env = vars(&[
            ("DRIFTWATCH_LISTEN_ADDR", "0.0.0.0:7000"),
            ("DRIFTWATCH_CONSUMER_TIMEOUT_SECS", "3"),
        ]);
        cfg.apply_env_overrides(|k| env.get(k).cloned());
        assert_eq!(cfg.listen_addr, "0.0.0.0:7000");
        assert_eq!(cfg.dispatch.consumer_timeout_secs, 3);
    }

    #[test]
    fn unparseable_override_ignored() {
        let mut cfg = ServerConfig::default();
        let env = vars(&[("DRIFTWATCH_CONSUMER_TIMEOUT_SECS", "soon")]);
        cfg.apply_env_overrides(|k| env.get(k).cloned());
        assert_eq!(cfg.dispatch.consumer_timeout_secs, 30);
    }

    #[test]
    fn secrets_resolved_from_env() {
        let mut cfg: ServerConfig = toml::from_str(FULL).unwrap();
        let env = vars(&[("ACR_PASSWORD", "hunter2"), ("SLACK_TOKEN", "xoxb-1")]);
        cfg.resolve_secrets(|k| env.get(k).cloned()).unwrap();
        assert_eq!(cfg.watch.pollers[1].password.as_deref(), Some("hunter2"));
        assert_eq!(cfg.watch.notifiers[0].token, "xoxb-1");
    }

    #[test]
    fn missing_secrets_all_reported() {
        let mut cfg: ServerConfig = toml::from_str(FULL).unwrap();
        let err = cfg.resolve_secrets(|_| None).unwrap_err();
        match err {
            ConfigError::Secrets(missing) => {
                assert_eq!(missing.len(), 2);
                assert!(missing[0].contains("ACR_PASSWORD"));
                assert!(missing[1].contains("SLACK_TOKEN"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_invalid_addr() {
        let cfg: ServerConfig = toml::from_str(FULL).unwrap();
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..cfg
        };
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("listen_addr"));
    }

    #[test]
    fn webhook_cannot_claim_builtin_routes() {
        let mut cfg: ServerConfig = toml::from_str(FULL).unwrap();
        cfg.watch.webhooks[0].path = "/health".to_string();
        let issues = cfg.validate();
        assert_eq!(
            issues,
            vec!["webhooks[0] ('acr-push'): path '/health' is reserved".to_string()]
        );
    }

    #[test]
    fn empty_config_fails_root_rule() {
        let issues = ServerConfig::default().validate();
        assert!(issues.iter().any(|i| i.contains("at least one poller or one webhook")));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ServerConfig::load(Path::new("/nonexistent/driftwatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One watched source (`[[pollers]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub event_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Registry host or base URL. Required by some source types.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Artifact names (images) to check on every tick.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

fn default_interval_seconds() -> u64 {
    60
}

impl SourceConfig {
    /// URL recorded on change events. Falls back to the source type when the
    /// source has no configured URL (e.g. the public Docker Hub).
    pub fn source_url(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.kind)
    }
}

/// Inbound webhook route (`[[webhooks]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub event_name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Chat notification sink (`[[notifiers]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub event_subscriptions: Vec<String>,
}

/// Repository-update sink (`[[repositories]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_repository_kind")]
    pub kind: String,
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    /// Only files with these extensions (".yaml", ".env", ...) are rewritten.
    #[serde(default)]
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub event_subscriptions: Vec<String>,
}

fn default_repository_kind() -> String {
    "git".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

/// The event graph: what to watch and who reacts. Loaded once at startup and
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub pollers: Vec<SourceConfig>,
    pub webhooks: Vec<WebhookConfig>,
    pub notifiers: Vec<NotifierConfig>,
    pub repositories: Vec<RepositoryConfig>,
}

impl WatchConfig {
    /// Every trigger event name (pollers first, then webhooks), duplicates kept.
    pub fn trigger_event_names(&self) -> impl Iterator<Item = &str> {
        self.pollers
            .iter()
            .map(|p| p.event_name.as_str())
            .chain(self.webhooks.iter().map(|w| w.event_name.as_str()))
    }

    /// Check structural and cross-record rules.
    ///
    /// Returns every problem found, in config order, so an operator can fix
    /// them all in one pass. An empty list means the graph is well-formed.
    pub fn validate_structure(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.pollers.is_empty() && self.webhooks.is_empty() {
            issues.push("configuration must have at least one poller or one webhook".to_string());
        }

        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for name in self.trigger_event_names() {
            if !name.is_empty() && !seen.insert(name) && reported.insert(name) {
                issues.push(format!(
                    "event name '{name}' is used by more than one poller/webhook"
                ));
            }
        }

        for (i, p) in self.pollers.iter().enumerate() {
            let label = format!("pollers[{i}] ('{}')", p.event_name);
            if p.event_name.is_empty() {
                issues.push(format!("{label}: event_name is required"));
            }
            if p.kind.is_empty() {
                issues.push(format!("{label}: type is required"));
            }
            if p.targets.is_empty() {
                issues.push(format!("{label}: at least one target is required"));
            }
            if p.targets.iter().any(|t| t.trim().is_empty()) {
                issues.push(format!("{label}: targets must not be empty"));
            }
            if p.interval_seconds == 0 {
                issues.push(format!("{label}: interval_seconds must be > 0"));
            }
        }

        let mut paths = HashSet::new();
        for (i, w) in self.webhooks.iter().enumerate() {
            let label = format!("webhooks[{i}] ('{}')", w.event_name);
            if w.event_name.is_empty() {
                issues.push(format!("{label}: event_name is required"));
            }
            if w.kind.is_empty() {
                issues.push(format!("{label}: type is required"));
            }
            if !w.path.starts_with('/') {
                issues.push(format!("{label}: path '{}' must start with '/'", w.path));
            } else if w.path.contains([':', '*', '{', '}']) {
                issues.push(format!(
                    "{label}: path '{}' must be literal (no ':', '*', '{{' or '}}')",
                    w.path
                ));
            } else if !paths.insert(w.path.as_str()) {
                issues.push(format!("{label}: path '{}' is already in use", w.path));
            }
        }

        let mut names = HashSet::new();
        for (i, n) in self.notifiers.iter().enumerate() {
            let label = format!("notifiers[{i}] ('{}')", n.name);
            if n.name.is_empty() {
                issues.push(format!("{label}: name is required"));
            } else if !names.insert(n.name.as_str()) {
                issues.push(format!("{label}: duplicate notifier name"));
            }
            if n.kind.is_empty() {
                issues.push(format!("{label}: type is required"));
            }
            check_subscriptions(&label, &n.event_subscriptions, &mut issues);
        }

        let mut names = HashSet::new();
        for (i, r) in self.repositories.iter().enumerate() {
            let label = format!("repositories[{i}] ('{}')", r.name);
            if r.name.is_empty() {
                issues.push(format!("{label}: name is required"));
            } else if !names.insert(r.name.as_str()) {
                issues.push(format!("{label}: duplicate repository name"));
            }
            if r.url.is_empty() {
                issues.push(format!("{label}: url is required"));
            }
            if r.branch.is_empty() {
                issues.push(format!("{label}: branch is required"));
            }
            if r.file_extensions.is_empty() {
                issues.push(format!("{label}: at least one file extension is required"));
            }
            for ext in &r.file_extensions {
                if !ext.starts_with('.') || ext.len() < 2 {
                    issues.push(format!("{label}: file extension '{ext}' must start with '.'"));
                }
            }
            check_subscriptions(&label, &r.event_subscriptions, &mut issues);
        }

        issues
    }

    /// Sink subscriptions that no poller or webhook can ever trigger.
    ///
    /// Valid, but almost always a typo, so callers log these as warnings.
    pub fn dangling_subscriptions(&self) -> Vec<(String, String)> {
        let triggers: HashSet<&str> = self.trigger_event_names().collect();
        let notifier_subs = self
            .notifiers
            .iter()
            .flat_map(|n| n.event_subscriptions.iter().map(move |s| (&n.name, s)));
        let repo_subs = self
            .repositories
            .iter()
            .flat_map(|r| r.event_subscriptions.iter().map(move |s| (&r.name, s)));
        notifier_subs
            .chain(repo_subs)
            .filter(|(_, s)| !s.is_empty() && !triggers.contains(s.as_str()))
            .map(|(sink, s)| (sink.clone(), s.clone()))
            .collect()
    }
}

fn check_subscriptions(label: &str, subscriptions: &[String], issues: &mut Vec<String>) {
    if subscriptions.is_empty() {
        issues.push(format!("{label}: at least one event subscription is required"));
    }
    if subscriptions.iter().any(|s| s.is_empty()) {
        issues.push(format!("{label}: event subscriptions must not be empty"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poller(event_name: &str) -> SourceConfig {
        SourceConfig {
            event_name: event_name.to_string(),
            kind: "docker".to_string(),
            url: None,
            username: None,
            password: None,
            targets: vec!["nginx".to_string()],
            interval_seconds: 60,
        }
    }

    fn webhook(event_name: &str, path: &str) -> WebhookConfig {
        WebhookConfig {
            event_name: event_name.to_string(),
            path: path.to_string(),
            kind: "acr".to_string(),
        }
    }

    fn notifier(name: &str, subs: &[&str]) -> NotifierConfig {
        NotifierConfig {
            name: name.to_string(),
            kind: "slack".to_string(),
            token: "xoxb-test".to_string(),
            channel: "#deploys".to_string(),
            event_subscriptions: subs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn valid_graph_has_no_issues() {
        let cfg = WatchConfig {
            pollers: vec![poller("web")],
            webhooks: vec![webhook("api", "/hooks/api")],
            notifiers: vec![notifier("ops", &["web", "api"])],
            repositories: vec![],
        };
        assert!(cfg.validate_structure().is_empty());
        assert!(cfg.dangling_subscriptions().is_empty());
    }

    #[test]
    fn empty_graph_is_rejected() {
        let issues = WatchConfig::default().validate_structure();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("at least one poller or one webhook"));
    }

    #[test]
    fn duplicate_event_name_across_poller_and_webhook() {
        let cfg = WatchConfig {
            pollers: vec![poller("web")],
            webhooks: vec![webhook("web", "/hooks/web")],
            ..WatchConfig::default()
        };
        let issues = cfg.validate_structure();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("'web'"));
    }

    #[test]
    fn duplicate_reported_once_per_name() {
        let cfg = WatchConfig {
            pollers: vec![poller("web"), poller("web"), poller("web")],
            ..WatchConfig::default()
        };
        let dupes: Vec<_> = cfg
            .validate_structure()
            .into_iter()
            .filter(|i| i.contains("more than one"))
            .collect();
        assert_eq!(dupes.len(), 1);
    }

    #[test]
    fn all_issues_collected() {
        let mut bad = poller("");
        bad.targets.clear();
        bad.interval_seconds = 0;
        let cfg = WatchConfig {
            pollers: vec![bad],
            webhooks: vec![webhook("api", "no-slash")],
            notifiers: vec![notifier("", &[])],
            repositories: vec![],
        };
        let issues = cfg.validate_structure();
        assert!(issues.iter().any(|i| i.contains("event_name is required")));
        assert!(issues.iter().any(|i| i.contains("at least one target")));
        assert!(issues.iter().any(|i| i.contains("interval_seconds")));
        assert!(issues.iter().any(|i| i.contains("must start with '/'")));
        assert!(issues.iter().any(|i| i.contains("name is required")));
        assert!(issues.iter().any(|i| i.contains("event subscription")));
    }

    #[test]
    fn repository_extensions_need_leading_dot() {
        let cfg = WatchConfig {
            pollers: vec![poller("web")],
            repositories: vec![RepositoryConfig {
                name: "infra".to_string(),
                kind: "git".to_string(),
                url: "https://example.com/infra.git".to_string(),
                branch: "main".to_string(),
                username: None,
                token: None,
                file_extensions: vec!["yaml".to_string()],
                author_name: None,
                author_email: None,
                event_subscriptions: vec!["web".to_string()],
            }],
            ..WatchConfig::default()
        };
        let issues = cfg.validate_structure();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("'yaml'"));
    }

    #[test]
    fn webhook_path_must_be_literal() {
        let cfg = WatchConfig {
            webhooks: vec![
                webhook("a", "/hooks/:id"),
                webhook("b", "/hooks/{x"),
                webhook("c", "/hooks/*rest"),
                webhook("d", "/hooks/plain-v1.2"),
            ],
            notifiers: vec![notifier("ops", &["a"])],
            ..Default::default()
        };
        let issues = cfg.validate_structure();
        assert_eq!(issues.len(), 3, "{issues:?}");
        assert!(issues[0].starts_with("webhooks[0] ('a'): path '/hooks/:id'"));
        assert!(issues[1].contains("'/hooks/{x'"));
        assert!(issues[2].contains("'/hooks/*rest'"));
    }

    #[test]
    fn dangling_subscription_is_reported() {
        let cfg = WatchConfig {
            pollers: vec![poller("web")],
            notifiers: vec![notifier("ops", &["web", "wbe"])],
            ..WatchConfig::default()
        };
        assert_eq!(
            cfg.dangling_subscriptions(),
            vec![("ops".to_string(), "wbe".to_string())]
        );
    }

    #[test]
    fn parse_toml_graph() {
        let toml_str = r##"
[[pollers]]
event_name = "web"
type = "acr"
url = "myregistry.azurecr.io"
username = "svc"
password = "hunter2"
targets = ["web", "worker"]
interval_seconds = 30

[[webhooks]]
event_name = "hub"
path = "/hooks/hub"
type = "docker"

[[notifiers]]
name = "ops"
type = "slack"
token = "xoxb-1"
channel = "#ops"
event_subscriptions = ["web", "hub"]

[[repositories]]
name = "infra"
url = "https://example.com/infra.git"
file_extensions = [".yaml"]
event_subscriptions = ["web"]
"##;
        let cfg: WatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.pollers[0].kind, "acr");
        assert_eq!(cfg.pollers[0].targets.len(), 2);
        assert_eq!(cfg.webhooks[0].path, "/hooks/hub");
        assert_eq!(cfg.repositories[0].kind, "git");
        assert_eq!(cfg.repositories[0].branch, "main");
        assert!(cfg.validate_structure().is_empty());
    }

    #[test]
    fn source_url_falls_back_to_kind() {
        let p = poller("web");
        assert_eq!(p.source_url(), "docker");
    }
}

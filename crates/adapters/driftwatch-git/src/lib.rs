//! Repository updater backed by the `git` CLI.
//!
//! Each update shallow-clones the configured branch into a temporary
//! directory, rewrites `artifact:<tag>` references in files with the
//! configured extensions, then commits and pushes. Nothing is committed when
//! no file changed.

pub mod rewrite;

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use driftwatch_core::{ChangeEvent, RepositoryConfig, RepositoryUpdater, SinkError};

pub use rewrite::{rewrite_references, rewrite_tree};

const DEFAULT_AUTHOR_NAME: &str = "driftwatch";
const DEFAULT_AUTHOR_EMAIL: &str = "driftwatch@localhost";

pub struct GitRepositoryUpdater {
    name: String,
    url: String,
    branch: String,
    username: Option<String>,
    token: Option<String>,
    file_extensions: Vec<String>,
    author_name: String,
    author_email: String,
}

impl GitRepositoryUpdater {
    pub fn new(config: &RepositoryConfig) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url.clone(),
            branch: config.branch.clone(),
            username: config.username.clone(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            file_extensions: config.file_extensions.clone(),
            author_name: config
                .author_name
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_string()),
            author_email: config
                .author_email
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL.to_string()),
        }
    }

    /// Remote URL with credentials embedded, for HTTP(S) remotes only.
    fn remote_url(&self) -> String {
        let Some(token) = &self.token else {
            return self.url.clone();
        };
        match reqwest::Url::parse(&self.url) {
            Ok(mut url) if url.scheme().starts_with("http") => {
                let user = self.username.as_deref().unwrap_or("x-access-token");
                if url.set_username(user).is_err() || url.set_password(Some(token)).is_err() {
                    return self.url.clone();
                }
                url.to_string()
            },
            _ => self.url.clone(),
        }
    }

    fn commit_message(event: &ChangeEvent) -> String {
        format!(
            "Bump {} to {}\n\nDetected by driftwatch ({} from {}).",
            event.artifact, event.version, event.event_name, event.source_url
        )
    }
}

/// Run `git` with `args`, returning stdout. Only the subcommand name is kept
/// in errors so credentials in URLs never reach the logs.
async fn git(args: &[&str], cwd: Option<&Path>) -> Result<String, SinkError> {
    let mut cmd = Command::new("git");
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0").kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd.output().await?;
    let subcommand = args
        .iter()
        .find(|a| !a.starts_with('-') && !a.contains('='))
        .copied()
        .unwrap_or("git");
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(SinkError::Command {
            command: format!("git {subcommand}"),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[async_trait]
impl RepositoryUpdater for GitRepositoryUpdater {
    async fn update(&self, event: &ChangeEvent) -> Result<(), SinkError> {
        let workdir = tempfile::tempdir()?;
        let checkout = workdir.path().join("repo");
        let checkout_str = checkout.to_string_lossy().into_owned();
        let remote = self.remote_url();

        git(
            &[
                "clone",
                "--depth",
                "1",
                "--branch",
                self.branch.as_str(),
                remote.as_str(),
                checkout_str.as_str(),
            ],
            None,
        )
        .await?;

        let root = checkout.clone();
        let extensions = self.file_extensions.clone();
        let artifact = event.artifact.clone();
        let version = event.version.clone();
        let changed = tokio::task::spawn_blocking(move || {
            rewrite_tree(&root, &extensions, &artifact, &version)
        })
        .await
        .map_err(|e| SinkError::Rejected(format!("rewrite task failed: {e}")))??;

        if changed.is_empty() {
            tracing::info!(
                consumer = %self.name,
                artifact = %event.artifact,
                version = %event.version,
                "No references to update"
            );
            return Ok(());
        }

        let name_cfg = format!("user.name={}", self.author_name);
        let email_cfg = format!("user.email={}", self.author_email);
        let message = Self::commit_message(event);
        git(&["add", "--all"], Some(&checkout)).await?;
        git(
            &[
                "-c",
                name_cfg.as_str(),
                "-c",
                email_cfg.as_str(),
                "commit",
                "-m",
                message.as_str(),
            ],
            Some(&checkout),
        )
        .await?;
        let refspec = format!("HEAD:{}", self.branch);
        git(&["push", "origin", refspec.as_str()], Some(&checkout)).await?;

        tracing::info!(
            consumer = %self.name,
            artifact = %event.artifact,
            version = %event.version,
            files = changed.len(),
            "Pushed reference update"
        );
        Ok(())
    }

    async fn validate_connection(&self) -> Result<(), SinkError> {
        let remote = self.remote_url();
        let heads = git(
            &["ls-remote", "--heads", remote.as_str(), self.branch.as_str()],
            None,
        )
        .await?;
        if heads.trim().is_empty() {
            return Err(SinkError::Rejected(format!(
                "branch '{}' not found in repository '{}'",
                self.branch, self.name
            )));
        }
        tracing::info!(consumer = %self.name, branch = %self.branch, "Repository reachable");
        Ok(())
    }
}

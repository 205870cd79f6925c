//! Slack notifier: posts change events to a channel via the Web API.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use driftwatch_core::{ChangeEvent, Notifier, NotifierConfig, SinkError};

pub const DEFAULT_SLACK_API: &str = "https://slack.com/api";

pub struct SlackNotifier {
    name: String,
    token: String,
    channel: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: String,
}

impl SlackNotifier {
    pub fn new(config: &NotifierConfig, client: reqwest::Client, api_base: &str) -> Self {
        Self {
            name: config.name.clone(),
            token: config.token.clone(),
            channel: config.channel.clone(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn build_payload(&self, event: &ChangeEvent) -> PostMessage<'_> {
        PostMessage {
            channel: &self.channel,
            text: format_message(event),
        }
    }

    /// Call a Web API method and insist on `"ok": true`.
    async fn call(&self, method: &str, body: Option<&PostMessage<'_>>) -> Result<Value, SinkError> {
        if self.token.trim().is_empty() {
            return Err(SinkError::Config(format!(
                "slack notifier '{}' has an empty token",
                self.name
            )));
        }

        let mut request = self
            .client
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Request(format!("Failed to call Slack {method}: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SinkError::Request(format!("Failed to read Slack response: {e}")))?;

        if !status.is_success() {
            return Err(SinkError::Rejected(format!(
                "Slack {method} returned HTTP {status}: {body}"
            )));
        }
        check_ok(method, &body)
    }
}

/// Human-readable message for a change event.
pub fn format_message(event: &ChangeEvent) -> String {
    format!(
        "New version of `{}` detected: `{}` (source: {}, event: {})",
        event.artifact, event.version, event.source_url, event.event_name
    )
}

fn check_ok(method: &str, body: &str) -> Result<Value, SinkError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| SinkError::Rejected(format!("Invalid Slack {method} response: {e}")))?;
    if json.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        Ok(json)
    } else {
        let api_error = json
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        Err(SinkError::Rejected(format!("Slack {method}: {api_error}")))
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), SinkError> {
        let payload = self.build_payload(event);
        self.call("chat.postMessage", Some(&payload)).await?;
        tracing::info!(
            consumer = %self.name,
            channel = %self.channel,
            artifact = %event.artifact,
            version = %event.version,
            "Slack message sent"
        );
        Ok(())
    }

    async fn validate_connection(&self) -> Result<(), SinkError> {
        let json = self.call("auth.test", None).await?;
        let team = json.get("team").and_then(Value::as_str).unwrap_or("?");
        tracing::info!(
            consumer = %self.name,
            team,
            "Connected to Slack"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(token: &str) -> SlackNotifier {
        let config = NotifierConfig {
            name: "ops".to_string(),
            kind: "slack".to_string(),
            token: token.to_string(),
            channel: "#deploys".to_string(),
            event_subscriptions: vec!["hub".to_string()],
        };
        SlackNotifier::new(&config, reqwest::Client::new(), "https://slack.test/api/")
    }

    #[test]
    fn payload_targets_configured_channel() {
        let event = ChangeEvent::new("hub", "docker", "nginx", "1.27.1");
        let n = notifier("xoxb-1");
        let payload = serde_json::to_value(n.build_payload(&event)).unwrap();
        assert_eq!(payload["channel"], "#deploys");
        let text = payload["text"].as_str().unwrap();
        assert!(text.contains("`nginx`"));
        assert!(text.contains("`1.27.1`"));
    }

    #[test]
    fn ok_response_accepted() {
        let json = check_ok("auth.test", r#"{"ok": true, "team": "acme"}"#).unwrap();
        assert_eq!(json["team"], "acme");
    }

    #[test]
    fn not_ok_response_reports_api_error() {
        let err = check_ok("chat.postMessage", r#"{"ok": false, "error": "channel_not_found"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[test]
    fn non_json_response_rejected() {
        assert!(check_ok("auth.test", "<html>").is_err());
    }

    #[tokio::test]
    async fn empty_token_fails_without_network() {
        let err = notifier("  ").validate_connection().await.unwrap_err();
        assert!(matches!(err, SinkError::Config(_)));
    }
}

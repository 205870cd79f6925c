use serde::Deserialize;

use driftwatch_core::ChangeEvent;

use super::{NormalizeError, required};

const DOCKER_HUB_URL: &str = "https://hub.docker.com";

#[derive(Debug, Deserialize)]
struct DockerHubPayload {
    push_data: Option<PushData>,
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct PushData {
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    repo_name: Option<String>,
    repo_url: Option<String>,
}

/// Normalize a Docker Hub repository webhook.
pub fn normalize(event_name: &str, body: &[u8]) -> Result<Option<ChangeEvent>, NormalizeError> {
    let payload: DockerHubPayload = serde_json::from_slice(body)?;
    let push = payload
        .push_data
        .ok_or(NormalizeError::MissingField("push_data"))?;
    let repo = payload
        .repository
        .ok_or(NormalizeError::MissingField("repository"))?;

    let tag = required(push.tag, "push_data.tag")?;
    let name = required(repo.repo_name, "repository.repo_name")?;
    let source = repo
        .repo_url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DOCKER_HUB_URL.to_string());

    Ok(Some(ChangeEvent::new(event_name, source, name, tag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_payload(tag: &str, repo_name: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "callback_url": "https://registry.hub.docker.com/u/acme/api/hook/abc/",
            "push_data": {"pushed_at": 1417566161, "pusher": "ci", "tag": tag},
            "repository": {
                "name": "api",
                "namespace": "acme",
                "repo_name": repo_name,
                "repo_url": "https://registry.hub.docker.com/u/acme/api/",
                "status": "Active"
            }
        }))
        .unwrap()
    }

    #[test]
    fn push_becomes_change_event() {
        let event = normalize("hub-push", &make_payload("2.0.1", "acme/api"))
            .unwrap()
            .unwrap();
        assert_eq!(event.event_name, "hub-push");
        assert_eq!(event.artifact, "acme/api");
        assert_eq!(event.version, "2.0.1");
        assert_eq!(event.source_url, "https://registry.hub.docker.com/u/acme/api/");
    }

    #[test]
    fn missing_repo_url_falls_back_to_hub() {
        let body = br#"{"push_data": {"tag": "1"}, "repository": {"repo_name": "nginx"}}"#;
        let event = normalize("hub-push", body).unwrap().unwrap();
        assert_eq!(event.source_url, DOCKER_HUB_URL);
    }

    #[test]
    fn blank_tag_rejected() {
        let err = normalize("hub-push", &make_payload(" ", "acme/api")).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingField("push_data.tag")));
    }

    #[test]
    fn missing_sections_rejected() {
        assert!(matches!(
            normalize("hub-push", br#"{"repository": {"repo_name": "x"}}"#),
            Err(NormalizeError::MissingField("push_data"))
        ));
    }
}

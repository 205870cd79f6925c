use serde::Deserialize;

use driftwatch_core::ChangeEvent;

use super::{NormalizeError, required};

#[derive(Debug, Deserialize)]
struct AcrPayload {
    action: Option<String>,
    target: Option<AcrTarget>,
    request: Option<AcrRequest>,
}

#[derive(Debug, Deserialize)]
struct AcrTarget {
    repository: Option<String>,
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AcrRequest {
    host: Option<String>,
}

/// Normalize an Azure Container Registry push notification.
pub fn normalize(event_name: &str, body: &[u8]) -> Result<Option<ChangeEvent>, NormalizeError> {
    let payload: AcrPayload = serde_json::from_slice(body)?;
    if let Some(action) = payload.action.as_deref()
        && action != "push"
    {
        return Ok(None);
    }

    let target = payload.target.ok_or(NormalizeError::MissingField("target"))?;
    let repository = required(target.repository, "target.repository")?;
    let tag = required(target.tag, "target.tag")?;
    let host = payload
        .request
        .and_then(|r| r.host)
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "acr".to_string());

    Ok(Some(ChangeEvent::new(event_name, host, repository, tag)))
}

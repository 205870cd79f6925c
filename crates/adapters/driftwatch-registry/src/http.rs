use chrono::{DateTime, Utc};
use driftwatch_core::SourceError;
use serde::de::DeserializeOwned;

/// Send `request` and decode a JSON body, mapping every failure to a
/// [`SourceError`].
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, SourceError> {
    let resp = request
        .send()
        .await
        .map_err(|e| SourceError::Request(e.to_string()))?;
    let resp = check_status(resp)?;
    resp.json::<T>()
        .await
        .map_err(|e| SourceError::Parse(e.to_string()))
}

pub(crate) fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SourceError::Auth(format!(
            "{} returned HTTP {}",
            resp.url(),
            status.as_u16()
        )));
    }
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: resp.url().to_string(),
        });
    }
    Ok(resp)
}

/// Lenient RFC 3339 parse; registries occasionally omit or garble timestamps
/// and a bad one should only demote the candidate, not fail the listing.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339() {
        let ts = parse_timestamp(Some("2024-05-01T12:30:00.123456Z")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:30:00.123456+00:00");
    }

    #[test]
    fn garbage_timestamp_is_none() {
        assert!(parse_timestamp(Some("yesterday")).is_none());
        assert!(parse_timestamp(None).is_none());
    }
}

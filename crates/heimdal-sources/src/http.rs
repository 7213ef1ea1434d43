//! Request plumbing shared by every client.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SourceError;
use crate::Fetched;

const USER_AGENT: &str = "heimdal/0.1 (social-metrics-collector)";
const MAX_ERROR_BODY_CHARS: usize = 512;

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, SourceError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Parses `base_url`, forcing exactly one trailing slash so `Url::join`
/// appends to the path instead of replacing its last segment.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, SourceError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| SourceError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn join(base: &Url, path: &str) -> Result<Url, SourceError> {
    base.join(path).map_err(|e| SourceError::InvalidBaseUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

/// Sends the request and returns the body text of a 2xx response.
///
/// 401/403 become [`SourceError::Auth`], other non-2xx statuses become
/// [`SourceError::Upstream`], and an elapsed client timeout becomes
/// [`SourceError::Timeout`].
pub(crate) async fn send_text(request: RequestBuilder, url: &Url) -> Result<String, SourceError> {
    let response = request.send().await.map_err(|e| map_send_error(e, url))?;
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SourceError::Auth {
            status: status.as_u16(),
            url: redact_query(url),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Upstream {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    response.text().await.map_err(|e| map_send_error(e, url))
}

pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &Url,
    context: &str,
) -> Result<T, SourceError> {
    let body = send_text(request, url).await?;
    parse_json(&body, context)
}

pub(crate) fn parse_json<T: DeserializeOwned>(body: &str, context: &str) -> Result<T, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}

/// Decodes each element independently, counting the ones that do not fit `T`.
pub(crate) fn decode_items<T: DeserializeOwned>(values: Vec<Value>) -> Fetched<T> {
    let mut fetched = Fetched::default();
    for value in values {
        match serde_json::from_value::<T>(value) {
            Ok(item) => fetched.items.push(item),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed upstream item");
                fetched.malformed += 1;
            }
        }
    }
    fetched
}

fn map_send_error(err: reqwest::Error, url: &Url) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout {
            url: redact_query(url),
        }
    } else {
        SourceError::Http(err.without_url())
    }
}

/// Query strings may carry access tokens; keep them out of error messages.
fn redact_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Item {
        name: String,
    }

    #[test]
    fn parse_base_url_adds_single_trailing_slash() {
        let url = parse_base_url("http://localhost:8080//").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/");
        let joined = join(&url, "1.1/trends/place.json").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:8080/1.1/trends/place.json");
    }

    #[test]
    fn parse_base_url_rejects_garbage() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(SourceError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn decode_items_counts_malformed_entries() {
        let values = vec![
            serde_json::json!({"name": "ok"}),
            serde_json::json!({"name": 42}),
            serde_json::json!({"other": true}),
        ];
        let fetched = decode_items::<Item>(values);
        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.items[0].name, "ok");
        assert_eq!(fetched.malformed, 2);
    }

    #[test]
    fn redact_query_drops_tokens() {
        let url = Url::parse("https://graph.facebook.com/v19.0/meta/posts?access_token=abc").unwrap();
        assert_eq!(redact_query(&url), "https://graph.facebook.com/v19.0/meta/posts");
    }
}

use thiserror::Error;

/// Errors returned by the upstream source clients.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream rejected the request's credentials (HTTP 401 or 403).
    #[error("credentials rejected by {url} (HTTP {status})")]
    Auth { status: u16, url: String },

    /// Any other non-2xx response. `body` is truncated for logging.
    #[error("HTTP {status} from upstream: {body}")]
    Upstream { status: u16, body: String },

    /// The bounded request timeout elapsed.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response parsed but did not contain what the protocol requires.
    #[error("unexpected response from {context}: {reason}")]
    Protocol { context: String, reason: String },

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl SourceError {
    /// Short stable label used in logs and the collection-run ledger.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Auth { .. } => "auth",
            SourceError::Upstream { .. } => "upstream",
            SourceError::Timeout { .. } => "timeout",
            SourceError::Http(_) => "network",
            SourceError::Deserialize { .. } | SourceError::Protocol { .. } => "protocol",
            SourceError::InvalidBaseUrl { .. } => "configuration",
        }
    }

    /// Returns `true` for failures that may succeed on a later attempt:
    /// timeouts, connection failures, HTTP 5xx and HTTP 429.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Timeout { .. } => true,
            SourceError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            SourceError::Upstream { status, .. } => *status == 429 || *status >= 500,
            SourceError::Auth { .. }
            | SourceError::Deserialize { .. }
            | SourceError::Protocol { .. }
            | SourceError::InvalidBaseUrl { .. } => false,
        }
    }
}

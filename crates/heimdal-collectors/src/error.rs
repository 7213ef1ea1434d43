use heimdal_core::CredentialProblem;
use heimdal_db::DbError;
use heimdal_sources::SourceError;
use serde::Serialize;
use thiserror::Error;

/// Failure categories reported in collector results and the run ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Upstream,
    Timeout,
    Persistence,
    Configuration,
    /// The collector task panicked.
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("credentials unusable: {0}")]
    Credentials(#[from] CredentialProblem),

    #[error("persistence failed: {0}")]
    Persistence(#[from] DbError),

    #[error("collector exceeded its {secs}s deadline")]
    DeadlineExceeded { secs: u64 },

    #[error("collector panicked: {0}")]
    Panicked(String),
}

impl CollectError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::Source(e) => match e {
                SourceError::Auth { .. } => ErrorKind::Auth,
                SourceError::Timeout { .. } => ErrorKind::Timeout,
                SourceError::InvalidBaseUrl { .. } => ErrorKind::Configuration,
                SourceError::Upstream { .. }
                | SourceError::Http(_)
                | SourceError::Deserialize { .. }
                | SourceError::Protocol { .. } => ErrorKind::Upstream,
            },
            CollectError::Credentials(_) => ErrorKind::Configuration,
            CollectError::Persistence(_) => ErrorKind::Persistence,
            CollectError::DeadlineExceeded { .. } => ErrorKind::Timeout,
            CollectError::Panicked(_) => ErrorKind::Internal,
        }
    }
}

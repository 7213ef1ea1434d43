//! Shared configuration, credentials, and normalized record types for Heimdal.

pub mod app_config;
pub mod config;
pub mod credentials;
pub mod records;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use credentials::{
    CredentialProblem, FacebookCredentials, PlatformCredentials, Secret, TikTokCredentials,
    TwitterCredentials,
};
pub use records::{
    truncate_snippet, EngagementMetrics, HashtagTrend, Platform, RecordBatch, RecordError, SeoData,
    SocialEngagement, CONTENT_SNIPPET_MAX_CHARS, IDENTIFIER_MAX_CHARS, LABEL_MAX_CHARS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

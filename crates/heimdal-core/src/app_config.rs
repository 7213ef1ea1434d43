use std::net::SocketAddr;

use crate::credentials::PlatformCredentials;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Six-field cron expression (seconds first) driving scheduled cycles.
    pub collection_schedule: String,
    pub request_timeout_secs: u64,
    pub collector_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub facebook_page_id: String,
    /// Yahoo "where on earth" id used for Twitter trend lookups; `1` is worldwide.
    pub twitter_woeid: u32,
    pub trends_keywords: Vec<String>,
    pub trends_geo: String,
    pub credentials: PlatformCredentials,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("collection_schedule", &self.collection_schedule)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("collector_timeout_secs", &self.collector_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("facebook_page_id", &self.facebook_page_id)
            .field("twitter_woeid", &self.twitter_woeid)
            .field("trends_keywords", &self.trends_keywords)
            .field("trends_geo", &self.trends_geo)
            .field("credentials", &self.credentials)
            .finish()
    }
}

use crate::app_config::{AppConfig, Environment};
use crate::credentials::{
    FacebookCredentials, PlatformCredentials, Secret, TikTokCredentials, TwitterCredentials,
};
use crate::ConfigError;

/// Daily at 00:00 UTC, in the six-field form the scheduler expects.
pub const DEFAULT_COLLECTION_SCHEDULE: &str = "0 0 0 * * *";

const DEFAULT_TRENDS_KEYWORDS: &str =
    "digital marketing,social media marketing,content marketing,SEO,influencer marketing";

/// Reads `.env` (when present) into the process environment, then builds the
/// [`AppConfig`] from it.
///
/// # Errors
///
/// Returns [`ConfigError`] when `DATABASE_URL` is unset or any variable fails to parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Same as [`load_app_config`] without touching `.env`.
///
/// # Errors
///
/// Returns [`ConfigError`] when `DATABASE_URL` is unset or any variable fails to parse.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Every variable is read through `lookup`, so tests drive this with a map.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let secret = |var: &str| -> Option<Secret> { lookup(var).ok().map(Secret::new) };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("HEIMDAL_ENV", "development"))?;

    let mut bind_addr = or_default("HEIMDAL_BIND_ADDR", "0.0.0.0:8000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("HEIMDAL_BIND_ADDR", e.to_string()))?;
    // Hosting platforms hand out the port through `PORT`.
    if let Ok(port) = lookup("PORT") {
        let port = port
            .parse::<u16>()
            .map_err(|e| invalid("PORT", e.to_string()))?;
        bind_addr.set_port(port);
    }

    let log_level = or_default("HEIMDAL_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("HEIMDAL_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("HEIMDAL_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("HEIMDAL_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let collection_schedule = normalize_cron(&or_default(
        "DATA_COLLECTION_SCHEDULE",
        DEFAULT_COLLECTION_SCHEDULE,
    ))
    .map_err(|reason| invalid("DATA_COLLECTION_SCHEDULE", reason))?;

    let request_timeout_secs = parse_u64("HEIMDAL_REQUEST_TIMEOUT_SECS", "30")?;
    let collector_timeout_secs = parse_u64("HEIMDAL_COLLECTOR_TIMEOUT_SECS", "300")?;
    if request_timeout_secs == 0 {
        return Err(invalid(
            "HEIMDAL_REQUEST_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    if collector_timeout_secs == 0 {
        return Err(invalid(
            "HEIMDAL_COLLECTOR_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    let max_retries = parse_u32("HEIMDAL_MAX_RETRIES", "2")?;
    let retry_backoff_ms = parse_u64("HEIMDAL_RETRY_BACKOFF_MS", "1000")?;

    let facebook_page_id = or_default("HEIMDAL_FACEBOOK_PAGE_ID", "meta");
    let twitter_woeid = parse_u32("HEIMDAL_TWITTER_WOEID", "1")?;
    let trends_keywords = parse_keywords(&or_default(
        "HEIMDAL_TRENDS_KEYWORDS",
        DEFAULT_TRENDS_KEYWORDS,
    ))
    .map_err(|reason| invalid("HEIMDAL_TRENDS_KEYWORDS", reason))?;
    let trends_geo = or_default("HEIMDAL_TRENDS_GEO", "DK");

    let credentials = PlatformCredentials {
        twitter: TwitterCredentials {
            bearer_token: secret("TWITTER_BEARER_TOKEN"),
        },
        facebook: FacebookCredentials {
            app_id: secret("FACEBOOK_APP_ID"),
            app_secret: secret("FACEBOOK_APP_SECRET"),
            access_token: secret("FACEBOOK_ACCESS_TOKEN"),
        },
        tiktok: TikTokCredentials {
            api_key: secret("TIKTOK_API_KEY"),
            api_secret: secret("TIKTOK_API_SECRET"),
        },
    };

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        collection_schedule,
        request_timeout_secs,
        collector_timeout_secs,
        max_retries,
        retry_backoff_ms,
        facebook_page_id,
        twitter_woeid,
        trends_keywords,
        trends_geo,
        credentials,
    })
}

/// Maps `HEIMDAL_ENV` onto [`Environment`]. Only the lowercase names are accepted.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "HEIMDAL_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Accepts a five-field crontab expression (`0 0 * * *`) or the six/seven
/// field form with seconds, and returns the seconds-first form.
///
/// Only the field count is checked here; the scheduler parses the fields
/// themselves at startup.
fn normalize_cron(raw: &str) -> Result<String, String> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(format!("expected 5, 6 or 7 cron fields, got {n}")),
    }
}

fn parse_keywords(raw: &str) -> Result<Vec<String>, String> {
    let keywords: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    if keywords.is_empty() {
        return Err("at least one keyword is required".to_string());
    }
    Ok(keywords)
}

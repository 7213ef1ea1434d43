//! Platform credentials and the checks that gate collector enablement.
//!
//! Raw values are wrapped in [`Secret`] as soon as they are read so they can
//! never reach a log line through `Debug` or `Display`.

use thiserror::Error;

/// A credential value that prints as `[redacted]`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value for use in an outgoing request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Why a platform's credentials cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialProblem {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{0} holds a placeholder value")]
    Placeholder(&'static str),

    #[error("{var} is malformed: {reason}")]
    Malformed {
        var: &'static str,
        reason: &'static str,
    },
}

/// Returns `true` for values copied from an `.env.example` rather than real
/// credentials: `placeholder…`, `your_…`, `changeme`, `<…>`.
#[must_use]
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    v.starts_with("placeholder")
        || v.starts_with("your_")
        || v.starts_with("your-")
        || v == "changeme"
        || v == "todo"
        || (v.starts_with('<') && v.ends_with('>'))
}

fn require<'a>(
    var: &'static str,
    value: Option<&'a Secret>,
) -> Result<&'a Secret, CredentialProblem> {
    let secret = value.ok_or(CredentialProblem::Missing(var))?;
    let raw = secret.expose();
    if raw.trim().is_empty() {
        return Err(CredentialProblem::Missing(var));
    }
    if is_placeholder(raw) {
        return Err(CredentialProblem::Placeholder(var));
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CredentialProblem::Malformed {
            var,
            reason: "contains whitespace or control characters",
        });
    }
    Ok(secret)
}

#[derive(Debug, Clone, Default)]
pub struct TwitterCredentials {
    pub bearer_token: Option<Secret>,
}

impl TwitterCredentials {
    /// App-only bearer token used for the trends endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialProblem`] if the token is absent, a placeholder, or malformed.
    pub fn bearer_token(&self) -> Result<&Secret, CredentialProblem> {
        require("TWITTER_BEARER_TOKEN", self.bearer_token.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FacebookCredentials {
    pub app_id: Option<Secret>,
    pub app_secret: Option<Secret>,
    pub access_token: Option<Secret>,
}

impl FacebookCredentials {
    /// Graph API access token, provided the owning app is fully configured.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialProblem`] for the first of `FACEBOOK_APP_ID`,
    /// `FACEBOOK_APP_SECRET`, `FACEBOOK_ACCESS_TOKEN` that is unusable.
    pub fn access_token(&self) -> Result<&Secret, CredentialProblem> {
        require("FACEBOOK_APP_ID", self.app_id.as_ref())?;
        require("FACEBOOK_APP_SECRET", self.app_secret.as_ref())?;
        require("FACEBOOK_ACCESS_TOKEN", self.access_token.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TikTokCredentials {
    pub api_key: Option<Secret>,
    pub api_secret: Option<Secret>,
}

impl TikTokCredentials {
    /// API key sent as the bearer token; the secret must also be configured.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialProblem`] if either value is unusable.
    pub fn api_key(&self) -> Result<&Secret, CredentialProblem> {
        let key = require("TIKTOK_API_KEY", self.api_key.as_ref())?;
        require("TIKTOK_API_SECRET", self.api_secret.as_ref())?;
        Ok(key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlatformCredentials {
    pub twitter: TwitterCredentials,
    pub facebook: FacebookCredentials,
    pub tiktok: TikTokCredentials,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_never_prints_its_value() {
        let secret = Secret::new("super-secret-token");
        assert_eq!(format!("{secret}"), "[redacted]");
        assert!(!format!("{secret:?}").contains("super-secret-token"));
    }

    #[test]
    fn placeholder_detection_matches_example_values() {
        assert!(is_placeholder("placeholder_twitter_key"));
        assert!(is_placeholder("PLACEHOLDER"));
        assert!(is_placeholder("your_api_key_here"));
        assert!(is_placeholder("<token>"));
        assert!(!is_placeholder("AAAAAAAAAAAAAAAAAAAAAMLheAAAAAAA0%2BuSeid"));
    }

    #[test]
    fn twitter_requires_bearer_token() {
        let creds = TwitterCredentials::default();
        assert_eq!(
            creds.bearer_token().unwrap_err(),
            CredentialProblem::Missing("TWITTER_BEARER_TOKEN")
        );
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let creds = TwitterCredentials {
            bearer_token: Some(Secret::new("   ")),
        };
        assert_eq!(
            creds.bearer_token().unwrap_err(),
            CredentialProblem::Missing("TWITTER_BEARER_TOKEN")
        );
    }

    #[test]
    fn token_with_inner_whitespace_is_malformed() {
        let creds = TwitterCredentials {
            bearer_token: Some(Secret::new("abc def")),
        };
        assert!(matches!(
            creds.bearer_token(),
            Err(CredentialProblem::Malformed { var: "TWITTER_BEARER_TOKEN", .. })
        ));
    }

    #[test]
    fn facebook_reports_first_unusable_value() {
        let creds = FacebookCredentials {
            app_id: Some(Secret::new("1234567890")),
            app_secret: Some(Secret::new("placeholder_secret")),
            access_token: Some(Secret::new("EAAB-token")),
        };
        assert_eq!(
            creds.access_token().unwrap_err(),
            CredentialProblem::Placeholder("FACEBOOK_APP_SECRET")
        );
    }

    #[test]
    fn tiktok_returns_key_when_both_values_present() {
        let creds = TikTokCredentials {
            api_key: Some(Secret::new("tt-key")),
            api_secret: Some(Secret::new("tt-secret")),
        };
        assert_eq!(creds.api_key().expect("usable").expose(), "tt-key");
    }
}

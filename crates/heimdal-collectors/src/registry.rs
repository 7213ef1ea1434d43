//! Which collectors are usable right now.
//!
//! The registry is built from a fixed list of [`CollectorSpec`]s. Each spec's
//! builder checks its platform credentials and constructs the source client;
//! a builder that fails leaves only its own collector out. Initialization is
//! explicit and can be re-run to pick up fixed credentials or re-enable a
//! collector that was disabled after an auth failure.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use heimdal_core::{AppConfig, CredentialProblem};
use heimdal_db::Repository;
use heimdal_sources::{
    FacebookClient, GoogleTrendsClient, SourceError, TikTokClient, TwitterClient,
};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::collector::{panic_message, Collector};
use crate::collectors::{
    FacebookCollector, GoogleTrendsCollector, TikTokCollector, TwitterCollector, FACEBOOK,
    GOOGLE_TRENDS, TIKTOK, TWITTER,
};
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("credentials unusable: {0}")]
    Credentials(#[from] CredentialProblem),

    #[error("source client could not be built: {0}")]
    Source(#[from] SourceError),
}

type BuildFn = dyn Fn() -> Result<Arc<dyn Collector>, RegistryError> + Send + Sync;

/// A named collector builder.
pub struct CollectorSpec {
    pub name: &'static str,
    build: Box<BuildFn>,
}

impl CollectorSpec {
    pub fn new<F>(name: &'static str, build: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Collector>, RegistryError> + Send + Sync + 'static,
    {
        Self {
            name,
            build: Box::new(build),
        }
    }
}

impl std::fmt::Debug for CollectorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorSpec")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Specs for the four platform collectors, in run order.
///
/// Twitter, Facebook and TikTok are gated on their credentials; Google Trends
/// needs none and is always built.
#[must_use]
pub fn default_specs(config: &Arc<AppConfig>, repo: &Arc<dyn Repository>) -> Vec<CollectorSpec> {
    let retry = RetryPolicy::from(config.as_ref());
    let timeout = config.request_timeout_secs;

    let twitter = {
        let config = Arc::clone(config);
        let repo = Arc::clone(repo);
        CollectorSpec::new(TWITTER, move || {
            let token = config.credentials.twitter.bearer_token()?.clone();
            let client = TwitterClient::new(token, timeout)?;
            Ok(Arc::new(TwitterCollector::new(
                client,
                config.twitter_woeid,
                Arc::clone(&repo),
                retry,
            )) as Arc<dyn Collector>)
        })
    };

    let facebook = {
        let config = Arc::clone(config);
        let repo = Arc::clone(repo);
        CollectorSpec::new(FACEBOOK, move || {
            let token = config.credentials.facebook.access_token()?.clone();
            let client = FacebookClient::new(token, timeout)?;
            Ok(Arc::new(FacebookCollector::new(
                client,
                config.facebook_page_id.clone(),
                Arc::clone(&repo),
                retry,
            )) as Arc<dyn Collector>)
        })
    };

    let tiktok = {
        let config = Arc::clone(config);
        let repo = Arc::clone(repo);
        CollectorSpec::new(TIKTOK, move || {
            let key = config.credentials.tiktok.api_key()?.clone();
            let client = TikTokClient::new(key, timeout)?;
            Ok(Arc::new(TikTokCollector::new(client, Arc::clone(&repo), retry))
                as Arc<dyn Collector>)
        })
    };

    let google_trends = {
        let config = Arc::clone(config);
        let repo = Arc::clone(repo);
        CollectorSpec::new(GOOGLE_TRENDS, move || {
            let client = GoogleTrendsClient::new(timeout)?;
            Ok(Arc::new(GoogleTrendsCollector::new(
                client,
                config.trends_keywords.clone(),
                config.trends_geo.clone(),
                Arc::clone(&repo),
                retry,
            )) as Arc<dyn Collector>)
        })
    };

    vec![twitter, facebook, tiktok, google_trends]
}

#[derive(Default)]
struct RegistryState {
    initialized: bool,
    enabled: Vec<Arc<dyn Collector>>,
}

pub struct CollectorRegistry {
    specs: Vec<CollectorSpec>,
    state: RwLock<RegistryState>,
}

impl CollectorRegistry {
    #[must_use]
    pub fn new(specs: Vec<CollectorSpec>) -> Self {
        Self {
            specs,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Runs every builder and replaces the enabled set with the ones that
    /// succeeded. Returns the enabled collector names in run order.
    pub async fn initialize(&self) -> Vec<&'static str> {
        let mut enabled: Vec<Arc<dyn Collector>> = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            match std::panic::catch_unwind(AssertUnwindSafe(|| (spec.build)())) {
                Ok(Ok(collector)) => enabled.push(collector),
                Ok(Err(e)) => {
                    tracing::warn!(collector = spec.name, reason = %e, "registry: collector disabled");
                }
                Err(panic) => {
                    tracing::error!(
                        collector = spec.name,
                        panic = %panic_message(&*panic),
                        "registry: collector builder panicked"
                    );
                }
            }
        }

        let names: Vec<&'static str> = enabled.iter().map(|c| c.name()).collect();
        tracing::info!(enabled = ?names, "registry: initialized");

        let mut state = self.state.write().await;
        state.enabled = enabled;
        state.initialized = true;
        names
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    pub async fn enabled_collectors(&self) -> Vec<Arc<dyn Collector>> {
        self.state.read().await.enabled.clone()
    }

    pub async fn enabled_names(&self) -> Vec<&'static str> {
        self.state
            .read()
            .await
            .enabled
            .iter()
            .map(|c| c.name())
            .collect()
    }

    /// Removes a collector until the next [`initialize`](Self::initialize).
    /// Returns whether it was enabled.
    pub async fn disable(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        let before = state.enabled.len();
        state.enabled.retain(|c| c.name() != name);
        let removed = state.enabled.len() < before;
        if removed {
            tracing::warn!(collector = name, "registry: collector disabled until re-initialization");
        }
        removed
    }
}

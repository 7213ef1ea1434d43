//! HTTP clients for the upstream platforms Heimdal collects from.
//!
//! Each client performs one round-trip (or one paginated sequence) and returns
//! source-shaped data. None of them retry; retry policy belongs to the caller.

pub mod error;
pub mod facebook;
pub mod google_trends;
mod http;
pub mod tiktok;
pub mod twitter;

pub use error::SourceError;
pub use facebook::{FacebookClient, FacebookPost};
pub use google_trends::{GoogleTrendsClient, KeywordInterest};
pub use tiktok::{TikTokClient, TikTokHashtag, TikTokVideo};
pub use twitter::{TwitterClient, TwitterTrend};

/// Items decoded from an upstream response.
///
/// Items that failed to decode are dropped and counted in `malformed` so one
/// bad entry never fails the whole fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub malformed: usize,
}

impl<T> Default for Fetched<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            malformed: 0,
        }
    }
}

impl<T> Fetched<T> {
    pub(crate) fn absorb(&mut self, other: Fetched<T>) {
        self.items.extend(other.items);
        self.malformed += other.malformed;
    }
}

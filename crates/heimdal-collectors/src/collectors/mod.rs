//! The four platform collectors.
//!
//! Each collector owns its source client, a shared [`Repository`] handle and
//! the retry policy for its upstream calls. Mapping from source-shaped items
//! to normalized records lives next to each collector as a plain function so
//! it can be tested without a network.
//!
//! [`Repository`]: heimdal_db::Repository

mod facebook;
mod google_trends;
mod tiktok;
mod twitter;

pub use facebook::FacebookCollector;
pub use google_trends::GoogleTrendsCollector;
pub use tiktok::TikTokCollector;
pub use twitter::TwitterCollector;

use heimdal_core::RecordError;

pub const TWITTER: &str = "twitter";
pub const FACEBOOK: &str = "facebook";
pub const TIKTOK: &str = "tiktok";
pub const GOOGLE_TRENDS: &str = "google_trends";

/// Splits mapped items into valid records and a count of rejected ones.
fn keep_valid<T>(
    collector: &'static str,
    mapped: impl IntoIterator<Item = Result<T, RecordError>>,
) -> (Vec<T>, usize) {
    let mut records = Vec::new();
    let mut rejected = 0;
    for item in mapped {
        match item {
            Ok(record) => records.push(record),
            Err(e) => {
                rejected += 1;
                tracing::debug!(collector, error = %e, "collector: skipping invalid item");
            }
        }
    }
    (records, rejected)
}

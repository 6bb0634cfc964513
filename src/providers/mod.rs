//! Provider fetch clients for the two upstream platforms.
//!
//! Each client answers "list events whose date falls in `[start, end]`" and
//! owns its own pagination, bearer auth, request timeout and single
//! timeout-retry. Everything downstream works on [`RawStreamEvent`]s.

use crate::model::Source;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;

pub mod vimeo;
pub mod youtube;

pub use vimeo::VimeoClient;
pub use youtube::YoutubeClient;

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire-side event record both provider clients produce.
///
/// Instant fields stay provider-native strings; the normalizer owns their
/// parsing. Unparseable view counts already defaulted to 0 here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStreamEvent {
    pub id: String,
    pub title: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_secs: Option<u64>,
    pub views: u64,
    pub status: Option<String>,
}

/// One upstream platform's event listing.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn source(&self) -> Source;

    /// List events whose date falls within the inclusive range.
    async fn fetch_events(&self, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<RawStreamEvent>>;
}

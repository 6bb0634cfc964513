use super::{EventSource, RawStreamEvent, REQUEST_TIMEOUT};
use crate::model::Source;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

const VIMEO_API_BASE: &str = "https://api.vimeo.com/";
const VIMEO_ACCEPT: &str = "application/vnd.vimeo.*+json;version=3.4";
const PAGE_SIZE: usize = 100;
const FIELDS: &str = "uri,name,created_time,stats,privacy,duration";

/// Vimeo API client scoped to one user's videos.
#[derive(Clone)]
pub struct VimeoClient {
    http: Client,
    base_url: Url,
    token: String,
    user_id: String,
    fetch_cap: usize,
}

impl fmt::Debug for VimeoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VimeoClient")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl VimeoClient {
    pub fn new(token: String, user_id: String, fetch_cap: usize) -> Self {
        let base_url = Url::parse(VIMEO_API_BASE).expect("valid default Vimeo URL");
        Self::with_base_url(token, user_id, fetch_cap, base_url)
    }

    pub fn with_base_url(token: String, user_id: String, fetch_cap: usize, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("stream-tally/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token,
            user_id,
            fetch_cap,
        }
    }

    fn page_url(&self, start: NaiveDate, end: NaiveDate, page: usize) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("users/{}/videos", self.user_id))
            .context("invalid Vimeo base URL")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &PAGE_SIZE.to_string())
            .append_pair("fields", FIELDS)
            .append_pair("sort", "date")
            .append_pair("direction", "asc")
            .append_pair("min_date_created", &format!("{start}T00:00:00Z"))
            .append_pair("max_date_created", &format!("{end}T23:59:59Z"));
        Ok(url)
    }

    /// GET one page, retrying once on timeout.
    async fn fetch_page(&self, url: Url) -> Result<VideoPageResp> {
        let request = || {
            self.http
                .get(url.clone())
                .header("Authorization", format!("Bearer {}", self.token))
                .header("Accept", VIMEO_ACCEPT)
        };

        let res = match request().send().await {
            Ok(res) => res,
            Err(err) if err.is_timeout() => {
                warn!(url = %url, "vimeo request timed out, retrying once");
                request()
                    .send()
                    .await
                    .context("failed to reach Vimeo after retry")?
            }
            Err(err) => return Err(err).context("failed to reach Vimeo"),
        };

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!("Vimeo API error - Status: {}, Body: {}", status, body);
            return Err(anyhow!("vimeo error {}: {}", status, body));
        }
        res.json::<VideoPageResp>()
            .await
            .context("invalid Vimeo response JSON")
    }
}

#[async_trait]
impl EventSource for VimeoClient {
    fn source(&self) -> Source {
        Source::Vimeo
    }

    async fn fetch_events(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawStreamEvent>> {
        let mut events = Vec::new();
        let mut page = 1;
        loop {
            let url = self.page_url(start, end, page)?;
            let resp = self.fetch_page(url).await?;
            if resp.data.is_empty() {
                break;
            }

            events.extend(resp.data.iter().filter_map(to_raw));

            if events.len() >= self.fetch_cap {
                warn!(cap = self.fetch_cap, "vimeo fetch cap reached, stopping pagination");
                events.truncate(self.fetch_cap);
                break;
            }
            if resp.paging.next.is_none() {
                break;
            }
            page += 1;
        }

        debug!(count = events.len(), "vimeo videos fetched");
        Ok(events)
    }
}

/// Map one API item to the wire record; `None` when the uri carries no id.
/// `duration` is integer seconds, `stats.plays` the view count (0 when the
/// account tier hides it).
fn to_raw(video: &VimeoVideo) -> Option<RawStreamEvent> {
    let id = video.uri.rsplit('/').next().filter(|s| !s.is_empty())?;
    Some(RawStreamEvent {
        id: id.to_string(),
        title: video.name.clone(),
        started_at: video.created_time.clone(),
        ended_at: None,
        duration_secs: Some(video.duration.unwrap_or(0)),
        views: video
            .stats
            .as_ref()
            .and_then(|s| s.plays)
            .unwrap_or(0),
        status: video.privacy.as_ref().map(|p| p.view.clone()),
    })
}

#[derive(Debug, Deserialize)]
struct VideoPageResp {
    #[serde(default)]
    data: Vec<VimeoVideo>,
    #[serde(default)]
    paging: Paging,
}

#[derive(Debug, Default, Deserialize)]
struct Paging {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VimeoVideo {
    uri: String,
    name: Option<String>,
    created_time: String,
    duration: Option<u64>,
    stats: Option<VideoStats>,
    privacy: Option<Privacy>,
}

#[derive(Debug, Deserialize)]
struct VideoStats {
    plays: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Privacy {
    view: String,
}

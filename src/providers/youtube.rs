use super::{EventSource, RawStreamEvent, REQUEST_TIMEOUT};
use crate::model::Source;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3/";
const PAGE_SIZE: usize = 50;

/// YouTube Data API client scoped to one channel's uploads.
#[derive(Clone)]
pub struct YoutubeClient {
    http: Client,
    base_url: Url,
    api_key: String,
    channel_id: String,
    fetch_cap: usize,
}

impl fmt::Debug for YoutubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YoutubeClient")
            .field("base_url", &self.base_url)
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

impl YoutubeClient {
    pub fn new(api_key: String, channel_id: String, fetch_cap: usize) -> Self {
        let base_url = Url::parse(YOUTUBE_API_BASE).expect("valid default YouTube URL");
        Self::with_base_url(api_key, channel_id, fetch_cap, base_url)
    }

    pub fn with_base_url(
        api_key: String,
        channel_id: String,
        fetch_cap: usize,
        base_url: Url,
    ) -> Self {
        let http = Client::builder()
            .user_agent("stream-tally/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            api_key,
            channel_id,
            fetch_cap,
        }
    }

    /// GET a JSON endpoint, retrying once on timeout.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let res = match self.http.get(url.clone()).send().await {
            Ok(res) => res,
            Err(err) if err.is_timeout() => {
                warn!(url = %url, "youtube request timed out, retrying once");
                self.http
                    .get(url)
                    .send()
                    .await
                    .context("failed to reach YouTube after retry")?
            }
            Err(err) => return Err(err).context("failed to reach YouTube"),
        };

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!("YouTube API error - Status: {}, Body: {}", status, body);
            return Err(anyhow!("youtube error {}: {}", status, body));
        }
        res.json::<T>().await.context("invalid YouTube response JSON")
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .context("invalid YouTube base URL")?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    /// Resolve the channel's uploads playlist id.
    async fn uploads_playlist_id(&self) -> Result<String> {
        let mut url = self.endpoint("channels")?;
        url.query_pairs_mut()
            .append_pair("part", "contentDetails")
            .append_pair("id", &self.channel_id);

        let resp: ChannelListResp = self.get_json(url).await?;
        resp.items
            .into_iter()
            .next()
            .map(|item| item.content_details.related_playlists.uploads)
            .ok_or_else(|| anyhow!("channel {} not found", self.channel_id))
    }

    async fn playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistPageResp> {
        let mut url = self.endpoint("playlistItems")?;
        url.query_pairs_mut()
            .append_pair("part", "contentDetails")
            .append_pair("playlistId", playlist_id)
            .append_pair("maxResults", &PAGE_SIZE.to_string());
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }
        self.get_json(url).await
    }

    async fn videos_batch(&self, ids: &[String]) -> Result<Vec<VideoItem>> {
        let mut url = self.endpoint("videos")?;
        url.query_pairs_mut()
            .append_pair("part", "snippet,statistics,liveStreamingDetails,status")
            .append_pair("id", &ids.join(","));
        let resp: VideoListResp = self.get_json(url).await?;
        Ok(resp.items)
    }
}

#[async_trait]
impl EventSource for YoutubeClient {
    fn source(&self) -> Source {
        Source::Youtube
    }

    async fn fetch_events(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawStreamEvent>> {
        let playlist_id = self.uploads_playlist_id().await?;
        debug!(%playlist_id, "fetching uploads playlist");

        // The published-date filter is applied client-side, widened by one
        // day each way; exact local-date bounds are enforced downstream.
        let published_lo = start - Duration::days(1);
        let published_hi = end + Duration::days(1);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.playlist_page(&playlist_id, page_token.as_deref()).await?;
            if page.items.is_empty() {
                break;
            }

            let ids: Vec<String> = page
                .items
                .into_iter()
                .map(|item| item.content_details.video_id)
                .collect();
            for video in self.videos_batch(&ids).await? {
                if !published_in_range(&video, published_lo, published_hi) {
                    continue;
                }
                if let Some(event) = to_raw(&video) {
                    events.push(event);
                }
            }

            if events.len() >= self.fetch_cap {
                warn!(cap = self.fetch_cap, "youtube fetch cap reached, stopping pagination");
                events.truncate(self.fetch_cap);
                break;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = events.len(), "youtube live streams fetched");
        Ok(events)
    }
}

fn published_in_range(video: &VideoItem, lo: NaiveDate, hi: NaiveDate) -> bool {
    let Some(published) = video
        .snippet
        .as_ref()
        .and_then(|s| DateTime::parse_from_rfc3339(&s.published_at).ok())
    else {
        // Keep it; the normalizer's local-date grouping is the real bound.
        return true;
    };
    let date = published.date_naive();
    lo <= date && date <= hi
}

/// Map one API item to the wire record; `None` for videos that were never
/// live. View counts arrive as strings and default to 0 when unparseable.
fn to_raw(video: &VideoItem) -> Option<RawStreamEvent> {
    let live = video.live_streaming_details.as_ref()?;
    let started_at = live.actual_start_time.clone()?;
    let views = video
        .statistics
        .as_ref()
        .and_then(|s| s.view_count.as_deref())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    Some(RawStreamEvent {
        id: video.id.clone(),
        title: video.snippet.as_ref().map(|s| s.title.clone()),
        started_at,
        ended_at: live.actual_end_time.clone(),
        duration_secs: None,
        views,
        status: video
            .status
            .as_ref()
            .map(|s| s.privacy_status.clone()),
    })
}

#[derive(Debug, Deserialize)]
struct ChannelListResp {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistPageResp {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResp {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Option<VideoSnippet>,
    status: Option<VideoStatus>,
    statistics: Option<VideoStatistics>,
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    published_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatus {
    privacy_status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    actual_start_time: Option<String>,
    actual_end_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn live_video() -> VideoItem {
        serde_json::from_value(json!({
            "id": "vid-1",
            "snippet": { "title": "Sunday Service", "publishedAt": "2024-01-07T14:00:00Z" },
            "status": { "privacyStatus": "unlisted" },
            "statistics": { "viewCount": "1234" },
            "liveStreamingDetails": {
                "actualStartTime": "2024-01-07T13:50:00Z",
                "actualEndTime": "2024-01-07T15:05:00Z"
            }
        }))
        .unwrap()
    }

    #[test]
    fn maps_live_video_to_raw_event() {
        let raw = to_raw(&live_video()).unwrap();
        assert_eq!(raw.id, "vid-1");
        assert_eq!(raw.started_at, "2024-01-07T13:50:00Z");
        assert_eq!(raw.ended_at.as_deref(), Some("2024-01-07T15:05:00Z"));
        assert_eq!(raw.views, 1234);
        assert_eq!(raw.status.as_deref(), Some("unlisted"));
        assert_eq!(raw.duration_secs, None);
    }

    #[test]
    fn skips_videos_that_were_never_live() {
        let video: VideoItem = serde_json::from_value(json!({
            "id": "vid-2",
            "snippet": { "title": "Trailer", "publishedAt": "2024-01-07T14:00:00Z" }
        }))
        .unwrap();
        assert!(to_raw(&video).is_none());
    }

    #[test]
    fn unparseable_view_count_defaults_to_zero() {
        let video: VideoItem = serde_json::from_value(json!({
            "id": "vid-3",
            "statistics": { "viewCount": "n/a" },
            "liveStreamingDetails": { "actualStartTime": "2024-01-07T13:50:00Z" }
        }))
        .unwrap();
        assert_eq!(to_raw(&video).unwrap().views, 0);
    }

    #[test]
    fn published_filter_widens_one_day() {
        let video = live_video();
        let start = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        // Published on the 7th; a range starting the 8th still admits it
        // through the widened lower bound.
        assert!(published_in_range(
            &video,
            start - Duration::days(1),
            start + Duration::days(1)
        ));
        assert!(!published_in_range(
            &video,
            NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
        ));
    }

    #[test]
    fn parses_playlist_page_token() {
        let page: PlaylistPageResp = serde_json::from_value(json!({
            "items": [ { "contentDetails": { "videoId": "vid-1" } } ],
            "nextPageToken": "tok-2"
        }))
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_page_token.as_deref(), Some("tok-2"));
    }
}

//! YouTube Data API v3 access: search, video statistics, channel statistics.
//!
//! Every keyword costs three dependent calls. The search call yields the
//! candidate videos; the two statistics calls are keyed by the ids that the
//! search returned, so they can only run once it has completed. The
//! [`MetadataSource`] trait is the seam between that sequence and the HTTP
//! client so batches can run against canned data.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Base used when building watch links for results.
pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Why a single keyword's fetch failed. None of these abort a batch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{endpoint} request failed: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} request returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("{endpoint} response could not be parsed: {source}")]
    Malformed {
        endpoint: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{field} for {id} is not a count: {value:?}")]
    InvalidCount {
        field: &'static str,
        id: String,
        value: String,
    },
}

impl FetchError {
    fn from_ureq(endpoint: &'static str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => Self::Status { endpoint, status },
            ureq::Error::Transport(transport) => Self::Transport {
                endpoint,
                message: transport.to_string(),
            },
        }
    }
}

/// One search request: a keyword plus the earliest publish time of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub published_after: DateTime<Utc>,
}

impl SearchQuery {
    /// The `publishedAfter` parameter: ISO-8601 UTC with a trailing `Z`.
    pub fn published_after_param(&self) -> String {
        self.published_after
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }
}

/// A video surfaced by the search call, before statistics are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCandidate {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

impl VideoCandidate {
    pub fn watch_url(&self) -> String {
        format!("{WATCH_URL}{}", self.video_id)
    }
}

/// View counts keyed by video id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoStatistics(HashMap<String, u64>);

impl VideoStatistics {
    /// Ids missing from the response count as zero views.
    pub fn views(&self, video_id: &str) -> u64 {
        self.0.get(video_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u64)> for VideoStatistics {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Subscriber counts keyed by channel id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStatistics(HashMap<String, u64>);

impl ChannelStatistics {
    /// Ids missing from the response (or with hidden counts) count as zero.
    pub fn subscribers(&self, channel_id: &str) -> u64 {
        self.0.get(channel_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u64)> for ChannelStatistics {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything fetched for one keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordOutcome {
    pub keyword: String,
    pub candidates: Vec<VideoCandidate>,
    pub video_stats: VideoStatistics,
    pub channel_stats: ChannelStatistics,
}

/// The three calls a keyword needs, in the order they must run.
pub trait MetadataSource {
    fn search(
        &self,
        query: &SearchQuery,
        max_results: u32,
    ) -> Result<Vec<VideoCandidate>, FetchError>;

    fn video_statistics(&self, video_ids: &[String]) -> Result<VideoStatistics, FetchError>;

    fn channel_statistics(&self, channel_ids: &[String])
    -> Result<ChannelStatistics, FetchError>;
}

/// Runs search, then both statistics lookups, for a single keyword.
/// A search with no hits is an empty outcome rather than an error.
pub fn fetch_keyword<S>(
    source: &S,
    query: &SearchQuery,
    max_results: u32,
) -> Result<KeywordOutcome, FetchError>
where
    S: MetadataSource + ?Sized,
{
    let candidates = source.search(query, max_results)?;
    if candidates.is_empty() {
        debug!(keyword = %query.keyword, "search returned no videos");
        return Ok(KeywordOutcome {
            keyword: query.keyword.clone(),
            ..KeywordOutcome::default()
        });
    }

    let video_ids = unique_ids(candidates.iter().map(|c| c.video_id.as_str()));
    let channel_ids = unique_ids(candidates.iter().map(|c| c.channel_id.as_str()));

    let video_stats = source.video_statistics(&video_ids)?;
    let channel_stats = source.channel_statistics(&channel_ids)?;
    debug!(
        keyword = %query.keyword,
        candidates = candidates.len(),
        videos = video_stats.len(),
        channels = channel_stats.len(),
        "fetched keyword metadata"
    );

    Ok(KeywordOutcome {
        keyword: query.keyword.clone(),
        candidates,
        video_stats,
        channel_stats,
    })
}

fn unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id))
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    #[serde(rename = "channelId")]
    channel_id: String,
    title: String,
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct StatisticsItem<S> {
    id: String,
    #[serde(default)]
    statistics: Option<S>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoCounts {
    #[serde(rename = "viewCount")]
    view_count: Option<Count>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelCounts {
    #[serde(rename = "subscriberCount")]
    subscriber_count: Option<Count>,
}

/// The API encodes counts as decimal strings; plain numbers are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Count {
    Number(u64),
    Text(String),
}

impl Count {
    fn resolve(self, field: &'static str, id: &str) -> Result<u64, FetchError> {
        match self {
            Count::Number(value) => Ok(value),
            Count::Text(text) => text.trim().parse().map_err(|_| FetchError::InvalidCount {
                field,
                id: id.to_owned(),
                value: text,
            }),
        }
    }
}

/// Search snippets arrive HTML-encoded (`Rock &amp; Roll`, `Rescuer&#39;s`).
/// Titles are decoded once here so every renderer starts from plain text.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let ch = match &tail[1..end] {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                entity => entity.strip_prefix('#').and_then(|code| {
                    let value = match code.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => code.parse().ok(),
                    };
                    value.and_then(char::from_u32)
                }),
            };
            ch.map(|ch| (ch, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Blocking client for the three Data API endpoints, authenticated with a
/// static API key passed as the `key` query parameter.
#[derive(Clone)]
pub struct YoutubeApi {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl YoutubeApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let mut request = self.agent.get(&format!("{}/{endpoint}", self.base_url));
        for (name, value) in params {
            request = request.query(name, value);
        }
        let response = request
            .query("key", &self.api_key)
            .call()
            .map_err(|err| FetchError::from_ureq(endpoint, err))?;
        response
            .into_json::<T>()
            .map_err(|source| FetchError::Malformed { endpoint, source })
    }
}

impl MetadataSource for YoutubeApi {
    fn search(
        &self,
        query: &SearchQuery,
        max_results: u32,
    ) -> Result<Vec<VideoCandidate>, FetchError> {
        let published_after = query.published_after_param();
        let max_results = max_results.to_string();
        let response: ListResponse<SearchItem> = self.get_json(
            "search",
            &[
                ("part", "snippet"),
                ("q", &query.keyword),
                ("type", "video"),
                ("order", "viewCount"),
                ("publishedAfter", &published_after),
                ("maxResults", &max_results),
            ],
        )?;

        Ok(response
            .items
            .into_iter()
            .map(|item| VideoCandidate {
                video_id: item.id.video_id,
                channel_id: item.snippet.channel_id,
                title: decode_entities(&item.snippet.title),
                published_at: item.snippet.published_at,
            })
            .collect())
    }

    fn video_statistics(&self, video_ids: &[String]) -> Result<VideoStatistics, FetchError> {
        let ids = video_ids.join(",");
        let response: ListResponse<StatisticsItem<VideoCounts>> =
            self.get_json("videos", &[("part", "statistics"), ("id", &ids)])?;

        response
            .items
            .into_iter()
            .map(|item| {
                let views = match item.statistics.and_then(|s| s.view_count) {
                    Some(count) => count.resolve("viewCount", &item.id)?,
                    None => 0,
                };
                Ok((item.id, views))
            })
            .collect()
    }

    fn channel_statistics(
        &self,
        channel_ids: &[String],
    ) -> Result<ChannelStatistics, FetchError> {
        let ids = channel_ids.join(",");
        let response: ListResponse<StatisticsItem<ChannelCounts>> =
            self.get_json("channels", &[("part", "statistics"), ("id", &ids)])?;

        response
            .items
            .into_iter()
            .map(|item| {
                let subscribers = match item.statistics.and_then(|s| s.subscriber_count) {
                    Some(count) => count.resolve("subscriberCount", &item.id)?,
                    None => 0,
                };
                Ok((item.id, subscribers))
            })
            .collect()
    }
}

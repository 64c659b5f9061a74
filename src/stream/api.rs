use crate::config::types::ServerConfig;
use crate::model::{ContainerRef, StreamConfig, Target};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid URL: {0}")]
    Url(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Raw body chunks of a push stream
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Transport seam to the log backend.
///
/// URLs are fully built by the caller; implementations only move bytes.
#[async_trait]
pub trait LogApi: Send + Sync {
    /// Open a long-lived event stream
    async fn open_stream(&self, url: &Url) -> Result<ByteStream>;

    /// Fetch a complete text body (history pages)
    async fn fetch_text(&self, url: &Url) -> Result<String>;
}

/// reqwest-backed implementation of [`LogApi`]
#[derive(Debug, Clone)]
pub struct HttpLogApi {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpLogApi {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        // No overall client timeout: it would also cut long-lived streams.
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl LogApi for HttpLogApi {
    async fn open_stream(&self, url: &Url) -> Result<ByteStream> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ApiError::from))
            .boxed())
    }

    async fn fetch_text(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Paging and window parameters of a history request.
///
/// `min`, `max_start`, `max_end`, `last_seen_id` and `start_id` are passed
/// through to the backend untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub min: Option<usize>,
    pub max_start: Option<usize>,
    pub max_end: Option<usize>,
    pub last_seen_id: Option<u64>,
    pub start_id: Option<u64>,
}

impl HistoryQuery {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            min: None,
            max_start: None,
            max_end: None,
            last_seen_id: None,
            start_id: None,
        }
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("from".to_string(), self.from.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("to".to_string(), self.to.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ];
        let optional = [
            ("min", self.min.map(|v| v.to_string())),
            ("maxStart", self.max_start.map(|v| v.to_string())),
            ("maxEnd", self.max_end.map(|v| v.to_string())),
            ("lastSeenId", self.last_seen_id.map(|v| v.to_string())),
            ("startId", self.start_id.map(|v| v.to_string())),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                params.push((name.to_string(), value));
            }
        }
        params
    }
}

fn build_url(base: &Url, segments: &[String], query: &[(String, String)]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::Url(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);

    url.set_query(None);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// URL of the push stream for a target under the current stream settings
pub fn stream_url(base: &Url, target: &Target, config: &StreamConfig) -> Result<Url> {
    let mut query = target.stream_query();
    query.extend(config.query());
    build_url(base, &target.stream_segments(), &query)
}

/// URL of one history page for a single container
pub fn history_url(
    base: &Url,
    container: &ContainerRef,
    config: &StreamConfig,
    history: &HistoryQuery,
) -> Result<Url> {
    let mut query = config.query();
    query.extend(history.params());
    build_url(base, &container.history_segments(), &query)
}

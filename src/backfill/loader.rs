use super::plan::BackfillRequest;
use crate::model::{parse_entries, LogEntry, StreamConfig};
use crate::stream::api::{history_url, ApiError, LogApi};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use reqwest::Url;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("history request failed: {0}")]
    Api(#[from] ApiError),

    #[error("backfill aborted")]
    Aborted,

    #[error("entry {0} is not a skipped-logs placeholder")]
    NotSkipped(usize),
}

/// Identifies the skipped placeholder a fetch was issued for
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedAnchor {
    pub date: DateTime<Utc>,
    pub first_id: u64,
}

impl SkippedAnchor {
    pub fn of(entry: &LogEntry) -> Option<Self> {
        entry.as_skipped().map(|skipped| Self {
            date: entry.date,
            first_id: skipped.first_skipped().id,
        })
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        entry.date == self.date
            && entry
                .as_skipped()
                .is_some_and(|skipped| skipped.first_skipped().id == self.first_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackfillKind {
    Older,
    Skipped(SkippedAnchor),
}

/// Result of a finished fetch, delivered back to the owning viewer
#[derive(Debug)]
pub struct BackfillDone {
    pub ticket: u64,
    pub kind: BackfillKind,
    pub outcome: Result<Vec<LogEntry>, BackfillError>,
}

struct InFlight {
    ticket: u64,
    token: CancellationToken,
}

/// Tracks the single in-flight history fetch of a viewer.
pub struct BackfillLoader {
    api: Arc<dyn LogApi>,
    results: mpsc::Sender<BackfillDone>,
    loading: watch::Sender<bool>,
    next_ticket: u64,
    in_flight: Option<InFlight>,
}

impl BackfillLoader {
    pub fn new(api: Arc<dyn LogApi>, results: mpsc::Sender<BackfillDone>) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            api,
            results,
            loading,
            next_ticket: 0,
            in_flight: None,
        }
    }

    /// Observe the "loading more" flag
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start fetching `requests` concurrently.
    ///
    /// Returns false without doing anything when a fetch is already running
    /// or there is nothing to request.
    pub fn start(
        &mut self,
        base: &Url,
        stream_config: &StreamConfig,
        kind: BackfillKind,
        requests: Vec<BackfillRequest>,
    ) -> Result<bool, BackfillError> {
        if self.in_flight.is_some() {
            tracing::debug!("Backfill already in progress, ignoring trigger");
            return Ok(false);
        }
        if requests.is_empty() {
            return Ok(false);
        }

        let urls = requests
            .iter()
            .map(|request| {
                history_url(base, &request.container, stream_config, &request.query)
                    .map(|url| (url, request.container.id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let token = CancellationToken::new();

        tracing::debug!(ticket, requests = urls.len(), kind = ?kind, "Starting backfill");

        let api = Arc::clone(&self.api);
        let results = self.results.clone();
        let cancelled = token.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancelled.cancelled() => Err(BackfillError::Aborted),
                fetched = fetch_all(api, urls) => fetched,
            };
            let _ = results.send(BackfillDone { ticket, kind, outcome }).await;
        });

        self.in_flight = Some(InFlight { ticket, token });
        self.loading.send_replace(true);
        Ok(true)
    }

    /// Accept a finished fetch. Returns false for stale or superseded tickets,
    /// whose results must be discarded.
    pub fn finish(&mut self, ticket: u64) -> bool {
        match &self.in_flight {
            Some(in_flight) if in_flight.ticket == ticket => {
                self.in_flight = None;
                self.loading.send_replace(false);
                true
            }
            _ => false,
        }
    }

    /// Cancel the running fetch, if any
    pub fn abort(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
            self.loading.send_replace(false);
            tracing::debug!(ticket = in_flight.ticket, "Aborted backfill");
        }
    }
}

impl Drop for BackfillLoader {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
        }
    }
}

async fn fetch_all(
    api: Arc<dyn LogApi>,
    urls: Vec<(Url, String)>,
) -> Result<Vec<LogEntry>, BackfillError> {
    let pages = try_join_all(urls.iter().map(|(url, container_id)| {
        let api = Arc::clone(&api);
        async move {
            let body = api.fetch_text(url).await?;
            Ok::<_, BackfillError>(parse_entries(&body, Some(container_id)))
        }
    }))
    .await?;

    Ok(pages.into_iter().flatten().collect())
}

use crate::config::types::BackfillConfig;
use crate::model::{ContainerRef, LogEntry, SkippedLogs};
use crate::stream::api::HistoryQuery;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;

/// One history request for a single container
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillRequest {
    pub container: ContainerRef,
    pub query: HistoryQuery,
}

/// Plan the requests that load the window just before the oldest visible entries.
///
/// Each container is anchored on its own oldest visible entry; containers with
/// nothing visible yet are anchored on the oldest visible entry overall.
/// Returns no requests when nothing is visible.
pub fn plan_older(
    messages: &[LogEntry],
    containers: &[ContainerRef],
    config: &BackfillConfig,
) -> Vec<BackfillRequest> {
    let real: Vec<&LogEntry> = messages.iter().filter(|e| !e.is_synthetic()).collect();
    let Some(&oldest) = real.first() else {
        return Vec::new();
    };

    let fallback = ChronoDuration::from_std(config.fallback_window)
        .unwrap_or_else(|_| ChronoDuration::minutes(10));

    containers
        .iter()
        .map(|container| {
            let own: Vec<&LogEntry> = real
                .iter()
                .copied()
                .filter(|e| e.container_id.as_deref() == Some(container.id.as_str()))
                .collect();

            let (anchor, sample, last_seen_id) = match own.first() {
                Some(&anchor) => (anchor, &own, Some(anchor.id)),
                None => (oldest, &real, None),
            };

            let delta = sample
                .get(config.sample_size.saturating_sub(1))
                .map(|nth| nth.date.signed_duration_since(anchor.date))
                .filter(|delta| *delta > ChronoDuration::zero())
                .unwrap_or(fallback);

            // windows reaching past the representable range start at its edge
            let from = anchor
                .date
                .checked_sub_signed(delta)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);

            let mut query = HistoryQuery::new(from, anchor.date);
            query.min = Some(config.min_entries);
            query.last_seen_id = last_seen_id;

            BackfillRequest {
                container: container.clone(),
                query,
            }
        })
        .collect()
}

/// Plan the requests that fill in a skipped range
pub fn plan_skipped(
    skipped: &SkippedLogs,
    containers: &[ContainerRef],
    config: &BackfillConfig,
) -> Vec<BackfillRequest> {
    let first = skipped.first_skipped();
    let last = skipped.last_skipped();
    // the range is inclusive of the last skipped entry
    let to = last
        .date
        .checked_add_signed(ChronoDuration::milliseconds(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let owners: Vec<&ContainerRef> = containers
        .iter()
        .filter(|c| {
            first.container_id.as_deref() == Some(c.id.as_str())
                || last.container_id.as_deref() == Some(c.id.as_str())
        })
        .collect();
    let owners = if owners.is_empty() {
        containers.iter().collect()
    } else {
        owners
    };

    owners
        .into_iter()
        .map(|container| {
            let mut query = HistoryQuery::new(first.date, to);
            query.max_start = Some(config.skipped_page);
            query.max_end = Some(config.skipped_page);
            if first.container_id.as_deref() == Some(container.id.as_str()) {
                query.start_id = Some(first.id);
            }
            if last.container_id.as_deref() == Some(container.id.as_str()) {
                query.last_seen_id = Some(last.id);
            }

            BackfillRequest {
                container: container.clone(),
                query,
            }
        })
        .collect()
}

fn visible_keys(visible: &[LogEntry]) -> HashSet<(String, u64)> {
    visible
        .iter()
        .filter_map(|e| e.key().map(|(container, id)| (container.to_string(), id)))
        .collect()
}

/// Drop entries already visible or repeated, then order by date
fn dedup_sorted(visible: &[LogEntry], fetched: Vec<LogEntry>) -> Vec<LogEntry> {
    let mut seen = visible_keys(visible);
    let mut block: Vec<LogEntry> = fetched
        .into_iter()
        .filter(|e| match e.key() {
            Some((container, id)) => seen.insert((container.to_string(), id)),
            None => true,
        })
        .collect();
    block.sort_by_key(|e| e.date);
    block
}

/// Build the contiguous block that goes in front of the visible sequence
pub fn merge_older(visible: &[LogEntry], fetched: Vec<LogEntry>) -> Vec<LogEntry> {
    dedup_sorted(visible, fetched)
}

/// Build the replacement for the skipped placeholder `placeholder`.
///
/// When the fetch covered the whole range the placeholder disappears.
/// Otherwise the first `max_start` fetched entries go before a smaller
/// placeholder for what is still missing, and the rest after it.
pub fn split_skipped(
    placeholder: &LogEntry,
    visible: &[LogEntry],
    fetched: Vec<LogEntry>,
    max_start: usize,
) -> Vec<LogEntry> {
    let Some(skipped) = placeholder.as_skipped() else {
        return vec![placeholder.clone()];
    };

    let mut fetched = dedup_sorted(visible, fetched);
    if fetched.is_empty() {
        return vec![placeholder.clone()];
    }
    if fetched.len() >= skipped.total_skipped() {
        return fetched;
    }

    let remaining = skipped.total_skipped() - fetched.len();
    let tail = fetched.split_off(max_start.min(fetched.len()));
    let head = fetched;

    let first = head
        .last()
        .cloned()
        .unwrap_or_else(|| skipped.first_skipped().clone());
    let last = tail
        .first()
        .cloned()
        .unwrap_or_else(|| skipped.last_skipped().clone());

    let mut replacement = head;
    replacement.push(LogEntry::skipped(
        placeholder.date,
        SkippedLogs::new(remaining, first, last),
    ));
    replacement.extend(tail);
    replacement
}

use super::debounce::Debounce;
use crate::config::types::ViewerConfig;
use crate::model::{LogEntry, SkippedLogs};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// Snapshot of the visible message sequence handed to observers
pub type Snapshot = Arc<Vec<LogEntry>>;

/// What a flush did with the pending buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending
    Empty,
    Appended(usize),
    /// Entries were appended and the oldest `dropped` visible entries removed
    Truncated { appended: usize, dropped: usize },
    /// Consumer is paused; entries were folded into a skipped placeholder
    Skipped(usize),
}

/// Stages incoming entries and merges them into the visible sequence.
///
/// The controller is the only writer of the visible sequence. Observers get a
/// fresh snapshot after every change.
pub struct FlushController {
    max_logs: usize,
    messages: Vec<LogEntry>,
    pending: Vec<LogEntry>,
    debounce: Debounce,
    paused: watch::Receiver<bool>,
    notify: watch::Sender<Snapshot>,
}

impl FlushController {
    pub fn new(config: &ViewerConfig, paused: watch::Receiver<bool>) -> Self {
        let (notify, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            max_logs: config.max_logs,
            messages: Vec::new(),
            pending: Vec::new(),
            debounce: Debounce::new(config.debounce, config.max_wait),
            paused,
            notify,
        }
    }

    /// Observe the visible sequence
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.notify.subscribe()
    }

    pub fn messages(&self) -> &[LogEntry] {
        &self.messages
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Next time the debounced flush is due
    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Stage an entry and (re)arm the debounced flush
    pub fn push(&mut self, entry: LogEntry, now: Instant) {
        self.pending.push(entry);
        self.debounce.schedule(now);
    }

    /// Run the debounced flush if its deadline has passed
    pub fn flush_if_due(&mut self, now: Instant) -> Option<FlushOutcome> {
        if self.debounce.is_due(now) {
            Some(self.flush_now())
        } else {
            None
        }
    }

    /// Merge the pending buffer into the visible sequence immediately
    pub fn flush_now(&mut self) -> FlushOutcome {
        self.debounce.cancel();

        if self.pending.is_empty() {
            return FlushOutcome::Empty;
        }

        // Several upstream sources race when a stream opens, so the very first
        // burst is put in order once. Later flushes append in arrival order.
        if self.messages.is_empty() && self.pending.len() > 1 {
            self.pending.sort_by_key(|entry| entry.date);
        }

        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();

        let outcome = if self.messages.len() + count > self.max_logs {
            let paused = *self.paused.borrow();
            if paused {
                let mut dropped = pending.into_iter();
                if let Some(first) = dropped.next() {
                    let last = dropped.last().unwrap_or_else(|| first.clone());
                    match self.messages.last_mut().and_then(LogEntry::as_skipped_mut) {
                        Some(skipped) => skipped.add_skipped_entries(count, last),
                        None => {
                            let skipped = SkippedLogs::new(count, first, last);
                            self.messages.push(LogEntry::skipped(Utc::now(), skipped));
                        }
                    }
                }
                FlushOutcome::Skipped(count)
            } else {
                self.messages.extend(pending);
                let dropped = self.messages.len().saturating_sub(self.max_logs);
                self.messages.drain(..dropped);
                FlushOutcome::Truncated {
                    appended: count,
                    dropped,
                }
            }
        } else {
            self.messages.extend(pending);
            FlushOutcome::Appended(count)
        };

        tracing::debug!(
            outcome = ?outcome,
            visible = self.messages.len(),
            "Flushed pending entries"
        );
        self.publish();
        outcome
    }

    /// Cancel any scheduled flush and drop both pending and visible entries
    pub fn clear_messages(&mut self) {
        self.debounce.cancel();
        self.pending.clear();
        self.messages.clear();
        self.publish();
    }

    /// Insert an older block in front of the visible sequence
    pub fn splice_front(&mut self, entries: Vec<LogEntry>) {
        if entries.is_empty() {
            return;
        }
        self.messages.splice(0..0, entries);
        self.publish();
    }

    /// Replace the entry at `index` with `entries`
    pub fn replace(&mut self, index: usize, entries: Vec<LogEntry>) {
        if index >= self.messages.len() {
            return;
        }
        self.messages.splice(index..=index, entries);
        self.publish();
    }

    fn publish(&self) {
        self.notify.send_replace(Arc::new(self.messages.clone()));
    }
}

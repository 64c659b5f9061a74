use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Severity reported by the backend for a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    #[serde(other)]
    Unknown,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
            Level::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fatal" => Ok(Level::Fatal),
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdStream {
    Stdout,
    Stderr,
}

/// Where a line sits inside a multi-line group emitted by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Start,
    Middle,
    End,
}

/// Summary of a run of entries that were received but not rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLogs {
    total_skipped: usize,
    first_skipped: Box<LogEntry>,
    last_skipped: Box<LogEntry>,
}

impl SkippedLogs {
    pub fn new(total_skipped: usize, first_skipped: LogEntry, last_skipped: LogEntry) -> Self {
        Self {
            total_skipped,
            first_skipped: Box::new(first_skipped),
            last_skipped: Box::new(last_skipped),
        }
    }

    /// Absorb another run of dropped entries ending at `last`
    pub fn add_skipped_entries(&mut self, count: usize, last: LogEntry) {
        self.total_skipped += count;
        self.last_skipped = Box::new(last);
    }

    pub fn total_skipped(&self) -> usize {
        self.total_skipped
    }

    pub fn first_skipped(&self) -> &LogEntry {
        &self.first_skipped
    }

    pub fn last_skipped(&self) -> &LogEntry {
        &self.last_skipped
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// Plain-text line
    Simple(String),
    /// Structured (JSON object) line
    Complex(Map<String, Value>),
    /// Synthetic lifecycle marker such as `container-stopped`
    DockerEvent { event: String, actor_id: String },
    /// Synthetic placeholder for dropped entries
    Skipped(SkippedLogs),
}

/// One observed log event, or a synthetic marker in the visible sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: u64,
    pub date: DateTime<Utc>,
    pub stream: StdStream,
    pub level: Option<Level>,
    pub position: Option<Position>,
    pub container_id: Option<String>,
    pub kind: EntryKind,
}

impl LogEntry {
    pub fn docker_event(event: &str, actor_id: &str, date: DateTime<Utc>) -> Self {
        Self {
            id: synthetic_id(date),
            date,
            stream: StdStream::Stdout,
            level: Some(Level::Info),
            position: None,
            container_id: Some(actor_id.to_string()),
            kind: EntryKind::DockerEvent {
                event: event.to_string(),
                actor_id: actor_id.to_string(),
            },
        }
    }

    pub fn skipped(date: DateTime<Utc>, skipped: SkippedLogs) -> Self {
        Self {
            id: synthetic_id(date),
            date,
            stream: StdStream::Stdout,
            level: Some(Level::Info),
            position: None,
            container_id: None,
            kind: EntryKind::Skipped(skipped),
        }
    }

    /// True for entries fabricated on the client (lifecycle markers and skip placeholders)
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self.kind,
            EntryKind::DockerEvent { .. } | EntryKind::Skipped(_)
        )
    }

    pub fn as_skipped(&self) -> Option<&SkippedLogs> {
        match &self.kind {
            EntryKind::Skipped(skipped) => Some(skipped),
            _ => None,
        }
    }

    pub fn as_skipped_mut(&mut self) -> Option<&mut SkippedLogs> {
        match &mut self.kind {
            EntryKind::Skipped(skipped) => Some(skipped),
            _ => None,
        }
    }

    /// Identity used to recognise the same backend line across fetches.
    ///
    /// Synthetic entries have no identity.
    pub fn key(&self) -> Option<(&str, u64)> {
        if self.is_synthetic() {
            return None;
        }
        Some((self.container_id.as_deref().unwrap_or_default(), self.id))
    }

    /// Fields of a structured entry restricted to the given key paths.
    ///
    /// An empty path list keeps every field. Returns None for non-structured entries.
    pub fn visible_fields(&self, paths: &[Vec<String>]) -> Option<Map<String, Value>> {
        let EntryKind::Complex(fields) = &self.kind else {
            return None;
        };

        if paths.is_empty() {
            return Some(fields.clone());
        }

        let mut visible = Map::new();
        for path in paths {
            if let Some(value) = lookup_path(fields, path) {
                insert_path(&mut visible, path, value.clone());
            }
        }
        Some(visible)
    }

    /// Single-line text rendering of the entry
    pub fn text(&self) -> String {
        match &self.kind {
            EntryKind::Simple(message) => message.clone(),
            EntryKind::Complex(fields) => Value::Object(fields.clone()).to_string(),
            EntryKind::DockerEvent { event, .. } => match event.as_str() {
                "container-stopped" => "Container stopped".to_string(),
                "container-started" => "Container started".to_string(),
                other => other.to_string(),
            },
            EntryKind::Skipped(skipped) => format!("Skipped {} entries", skipped.total_skipped),
        }
    }
}

fn synthetic_id(date: DateTime<Utc>) -> u64 {
    u64::try_from(date.timestamp_millis()).unwrap_or_default()
}

fn lookup_path<'a>(fields: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let value = fields.get(first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        Value::Object(nested) => lookup_path(nested, rest),
        _ => None,
    }
}

fn insert_path(target: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        target.insert(first.clone(), value);
        return;
    }
    let slot = target
        .entry(first.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(nested) = slot {
        insert_path(nested, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn simple(id: u64, secs: i64) -> LogEntry {
        LogEntry {
            id,
            date: Utc.timestamp_opt(secs, 0).unwrap(),
            stream: StdStream::Stdout,
            level: None,
            position: None,
            container_id: Some("abc".to_string()),
            kind: EntryKind::Simple(format!("line {}", id)),
        }
    }

    #[test]
    fn test_skipped_accumulates_count_and_last() {
        let mut skipped = SkippedLogs::new(3, simple(1, 1), simple(3, 3));
        skipped.add_skipped_entries(4, simple(7, 7));

        assert_eq!(skipped.total_skipped(), 7);
        assert_eq!(skipped.first_skipped().id, 1);
        assert_eq!(skipped.last_skipped().id, 7);
    }

    #[test]
    fn test_skipped_text() {
        let entry = LogEntry::skipped(Utc::now(), SkippedLogs::new(12, simple(1, 1), simple(2, 2)));
        assert_eq!(entry.text(), "Skipped 12 entries");
        assert!(entry.is_synthetic());
        assert!(entry.key().is_none());
    }

    #[test]
    fn test_docker_event_entry() {
        let entry = LogEntry::docker_event("container-stopped", "abc", Utc::now());
        assert_eq!(entry.text(), "Container stopped");
        assert!(matches!(
            &entry.kind,
            EntryKind::DockerEvent { event, .. } if event == "container-stopped"
        ));
    }

    #[test]
    fn test_visible_fields_filters_nested_paths() {
        let fields = json!({
            "msg": "hello",
            "http": {"status": 200, "path": "/"},
            "extra": true
        });
        let entry = LogEntry {
            kind: EntryKind::Complex(fields.as_object().unwrap().clone()),
            ..simple(1, 1)
        };

        let visible = entry
            .visible_fields(&[
                vec!["msg".to_string()],
                vec!["http".to_string(), "status".to_string()],
                vec!["missing".to_string()],
            ])
            .unwrap();

        assert_eq!(Value::Object(visible), json!({"msg": "hello", "http": {"status": 200}}));
    }

    #[test]
    fn test_visible_fields_without_paths_keeps_everything() {
        let fields = json!({"a": 1, "b": 2});
        let entry = LogEntry {
            kind: EntryKind::Complex(fields.as_object().unwrap().clone()),
            ..simple(1, 1)
        };

        assert_eq!(entry.visible_fields(&[]).unwrap().len(), 2);
        assert!(simple(2, 2).visible_fields(&[]).is_none());
    }
}

use super::entry::{EntryKind, Level, LogEntry, Position, StdStream};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
}

/// Log event as serialized by the backend, both on the push stream and in
/// history pages.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEvent {
    /// Unix milliseconds
    pub ts: i64,
    pub m: Value,
    pub id: u64,
    #[serde(default)]
    pub l: Option<Level>,
    #[serde(default = "default_stream", deserialize_with = "deserialize_stream")]
    pub s: StdStream,
    #[serde(default)]
    pub p: Option<Position>,
    /// Container id, present on merged and grouped streams
    #[serde(default)]
    pub c: Option<String>,
}

/// Payload of the `container-stopped` named event
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerEvent {
    pub actor_id: String,
}

fn default_stream() -> StdStream {
    StdStream::Stdout
}

fn deserialize_stream<'de, D>(deserializer: D) -> Result<StdStream, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Code(u8),
        Name(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Code(0) => Ok(StdStream::Stdout),
        Raw::Code(1) => Ok(StdStream::Stderr),
        Raw::Name(name) if name == "stdout" => Ok(StdStream::Stdout),
        Raw::Name(name) if name == "stderr" => Ok(StdStream::Stderr),
        Raw::Code(code) => Err(serde::de::Error::custom(format!("invalid stream code {}", code))),
        Raw::Name(name) => Err(serde::de::Error::custom(format!("invalid stream name {}", name))),
    }
}

impl LogEvent {
    /// Convert into an entry, attributing it to `default_container` when the
    /// event does not name its container.
    pub fn into_entry(self, default_container: Option<&str>) -> Result<LogEntry, EventParseError> {
        let date = millis_to_date(self.ts)?;
        let kind = match self.m {
            Value::Object(fields) => EntryKind::Complex(fields),
            Value::String(message) => EntryKind::Simple(message),
            other => EntryKind::Simple(other.to_string()),
        };

        Ok(LogEntry {
            id: self.id,
            date,
            stream: self.s,
            level: self.l,
            position: self.p,
            container_id: self.c.or_else(|| default_container.map(str::to_string)),
            kind,
        })
    }
}

fn millis_to_date(ts: i64) -> Result<DateTime<Utc>, EventParseError> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .ok_or(EventParseError::TimestampOutOfRange(ts))
}

/// Parse one serialized event into an entry
pub fn parse_entry(data: &str, default_container: Option<&str>) -> Result<LogEntry, EventParseError> {
    let event: LogEvent = serde_json::from_str(data)?;
    event.into_entry(default_container)
}

/// Parse a newline-delimited page of events.
///
/// Malformed lines are logged and skipped; blank lines are ignored.
pub fn parse_entries(body: &str, default_container: Option<&str>) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    for (line_no, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_entry(line, default_container) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(
                    line_no = line_no + 1,
                    error = %e,
                    "Skipping malformed log line"
                );
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_entry() {
        let entry = parse_entry(
            r#"{"ts":1706436000000,"m":"hello world","id":42,"l":"info","s":0}"#,
            Some("abc"),
        )
        .unwrap();

        assert_eq!(entry.id, 42);
        assert_eq!(entry.date.timestamp_millis(), 1706436000000);
        assert_eq!(entry.level, Some(Level::Info));
        assert_eq!(entry.stream, StdStream::Stdout);
        assert_eq!(entry.container_id.as_deref(), Some("abc"));
        assert_eq!(entry.kind, EntryKind::Simple("hello world".to_string()));
    }

    #[test]
    fn test_parse_complex_entry_on_stderr() {
        let entry = parse_entry(
            r#"{"ts":1000,"m":{"msg":"boom","code":7},"id":1,"s":1,"p":"start","c":"xyz"}"#,
            Some("abc"),
        )
        .unwrap();

        assert_eq!(entry.stream, StdStream::Stderr);
        assert_eq!(entry.position, Some(Position::Start));
        // explicit container wins over the default
        assert_eq!(entry.container_id.as_deref(), Some("xyz"));
        assert!(matches!(entry.kind, EntryKind::Complex(ref fields) if fields.len() == 2));
    }

    #[test]
    fn test_stream_accepts_names() {
        let entry = parse_entry(r#"{"ts":1,"m":"x","id":1,"s":"stderr"}"#, None).unwrap();
        assert_eq!(entry.stream, StdStream::Stderr);
    }

    #[test]
    fn test_unknown_level_maps_to_unknown() {
        let entry = parse_entry(r#"{"ts":1,"m":"x","id":1,"l":"notice"}"#, None).unwrap();
        assert_eq!(entry.level, Some(Level::Unknown));
    }

    #[test]
    fn test_invalid_stream_is_error() {
        assert!(parse_entry(r#"{"ts":1,"m":"x","id":1,"s":5}"#, None).is_err());
    }

    #[test]
    fn test_non_string_scalar_message_is_simple() {
        let entry = parse_entry(r#"{"ts":1,"m":12,"id":1}"#, None).unwrap();
        assert_eq!(entry.kind, EntryKind::Simple("12".to_string()));
    }

    #[test]
    fn test_parse_entries_skips_malformed_lines() {
        let body = concat!(
            r#"{"ts":1,"m":"a","id":1}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"ts":2,"m":"b","id":2}"#,
            "\n"
        );

        let entries = parse_entries(body, Some("abc"));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[1].id, 2);
    }

    #[test]
    fn test_container_event_payload() {
        let event: ContainerEvent = serde_json::from_str(r#"{"actorId":"abc"}"#).unwrap();
        assert_eq!(event.actor_id, "abc");
    }
}

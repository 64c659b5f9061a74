pub mod entry;
pub mod event;
pub mod target;

pub use entry::{EntryKind, Level, LogEntry, Position, SkippedLogs, StdStream};
pub use event::{parse_entries, parse_entry, ContainerEvent, EventParseError, LogEvent};
pub use target::{ContainerRef, ContainerState, StreamConfig, Target};

pub mod api;
pub mod connection;
pub mod sse;

pub use api::{history_url, stream_url, ApiError, ByteStream, HistoryQuery, HttpLogApi, LogApi};
pub use connection::{ConnectionOptions, StreamConnection, StreamEvent, TaggedEvent};
pub use sse::{SseDecoder, SseEvent, SseFrame};

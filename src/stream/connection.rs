use crate::model::{parse_entry, ContainerEvent, LogEntry};
use crate::stream::api::{ByteStream, LogApi};
use crate::stream::sse::{SseDecoder, SseEvent, SseFrame};
use futures::StreamExt;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Upper bound for the reconnect delay
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Named event the server sends when the streamed container stops
pub const CONTAINER_STOPPED: &str = "container-stopped";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The server accepted the stream (initially or after a reconnect)
    Opened,
    Entry(LogEntry),
    ContainerStopped { actor_id: String },
    /// The transport dropped; the connection retries on its own
    Error(String),
    /// The retry delay elapsed and the stream is being opened again
    Reconnecting,
}

/// A stream event stamped with the connection generation that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: StreamEvent,
}

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub retry_interval: Duration,
    pub idle_timeout: Option<Duration>,
}

struct ActiveStream {
    url: Url,
    handle: JoinHandle<()>,
}

/// Owns at most one live push-stream connection.
///
/// Every `open` bumps the generation so that events still in flight from a
/// previous connection can be told apart and dropped by the consumer.
pub struct StreamConnection {
    api: Arc<dyn LogApi>,
    options: ConnectionOptions,
    events: mpsc::Sender<TaggedEvent>,
    generation: u64,
    current: Option<ActiveStream>,
}

impl StreamConnection {
    pub fn new(
        api: Arc<dyn LogApi>,
        options: ConnectionOptions,
        events: mpsc::Sender<TaggedEvent>,
    ) -> Self {
        Self {
            api,
            options,
            events,
            generation: 0,
            current: None,
        }
    }

    /// Close any existing connection and open a new one to `url`.
    ///
    /// Returns the generation of the new connection.
    pub fn open(&mut self, url: Url, default_container: Option<String>) -> u64 {
        self.close();
        self.generation += 1;

        tracing::debug!(url = %url, generation = self.generation, "Opening log stream");

        let handle = tokio::spawn(run_stream(
            Arc::clone(&self.api),
            url.clone(),
            default_container,
            self.generation,
            self.options.clone(),
            self.events.clone(),
        ));

        self.current = Some(ActiveStream { url, handle });
        self.generation
    }

    /// Terminate the connection. Safe to call when already closed.
    pub fn close(&mut self) {
        if let Some(active) = self.current.take() {
            active.handle.abort();
            tracing::debug!(url = %active.url, generation = self.generation, "Closed log stream");
        }
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Generation of the most recently opened connection
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn url(&self) -> Option<&Url> {
        self.current.as_ref().map(|active| &active.url)
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Delay before the next reconnect attempt
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    current: Duration,
    /// Set by a server `retry:` field, replaces only the next delay
    server_hint: Option<Duration>,
}

impl Backoff {
    fn new(initial: Duration) -> Self {
        Self {
            initial,
            current: initial,
            server_hint: None,
        }
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }

    fn hint(&mut self, delay: Duration) {
        self.server_hint = Some(delay);
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.server_hint.take().unwrap_or(self.current);
        self.current = self.current.saturating_mul(2).min(MAX_BACKOFF);
        delay
    }
}

enum ReadEnd {
    /// Nobody listens any more; stop for good
    ReceiverGone,
    Failed(String),
}

async fn run_stream(
    api: Arc<dyn LogApi>,
    url: Url,
    default_container: Option<String>,
    generation: u64,
    options: ConnectionOptions,
    events: mpsc::Sender<TaggedEvent>,
) {
    let send = |event: StreamEvent| {
        let events = events.clone();
        async move { events.send(TaggedEvent { generation, event }).await.is_ok() }
    };

    let mut backoff = Backoff::new(options.retry_interval);

    loop {
        let reason = match api.open_stream(&url).await {
            Ok(body) => {
                backoff.reset();
                if !send(StreamEvent::Opened).await {
                    return;
                }
                tracing::info!(url = %url, generation, "Log stream opened");

                let end = read_stream(
                    body,
                    default_container.as_deref(),
                    generation,
                    options.idle_timeout,
                    &events,
                    &mut backoff,
                )
                .await;

                match end {
                    ReadEnd::ReceiverGone => return,
                    ReadEnd::Failed(reason) => reason,
                }
            }
            Err(e) => e.to_string(),
        };

        let delay = backoff.next_delay();
        tracing::warn!(
            url = %url,
            generation,
            error = %reason,
            retry_ms = delay.as_millis() as u64,
            "Log stream failed, reconnecting"
        );

        if !send(StreamEvent::Error(reason)).await {
            return;
        }

        tokio::time::sleep(delay).await;
        if !send(StreamEvent::Reconnecting).await {
            return;
        }
    }
}

async fn read_stream(
    mut body: ByteStream,
    default_container: Option<&str>,
    generation: u64,
    idle_timeout: Option<Duration>,
    events: &mpsc::Sender<TaggedEvent>,
    backoff: &mut Backoff,
) -> ReadEnd {
    let mut decoder = SseDecoder::new();

    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                Ok(next) => next,
                Err(_) => return ReadEnd::Failed(format!("no data received for {:?}", limit)),
            },
            None => body.next().await,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return ReadEnd::Failed(e.to_string()),
            None => return ReadEnd::Failed("stream ended".to_string()),
        };

        for frame in decoder.feed(&chunk) {
            match frame {
                SseFrame::Retry(delay) => backoff.hint(delay),
                SseFrame::Event(sse) => {
                    let Some(event) = decode_event(sse, default_container) else {
                        continue;
                    };
                    if events.send(TaggedEvent { generation, event }).await.is_err() {
                        return ReadEnd::ReceiverGone;
                    }
                }
            }
        }
    }
}

/// Interpret one SSE event. Malformed payloads are logged and dropped.
pub fn decode_event(sse: SseEvent, default_container: Option<&str>) -> Option<StreamEvent> {
    match sse.event.as_deref() {
        None => {
            if sse.data.is_empty() {
                return None;
            }
            match parse_entry(&sse.data, default_container) {
                Ok(entry) => Some(StreamEvent::Entry(entry)),
                Err(e) => {
                    tracing::warn!(error = %e, data = %sse.data, "Dropping malformed log message");
                    None
                }
            }
        }
        Some(CONTAINER_STOPPED) => match serde_json::from_str::<ContainerEvent>(&sse.data) {
            Ok(payload) => Some(StreamEvent::ContainerStopped {
                actor_id: payload.actor_id,
            }),
            Err(e) => {
                tracing::warn!(error = %e, data = %sse.data, "Dropping malformed container event");
                None
            }
        },
        Some(other) => {
            tracing::debug!(event = other, "Ignoring unknown stream event");
            None
        }
    }
}

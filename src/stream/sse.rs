use std::time::Duration;

/// A dispatched Server-Sent Event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; None for the default `message` event
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Output of the decoder for one chunk of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Event(SseEvent),
    /// Server asked for a different reconnection delay
    Retry(Duration),
}

/// Incremental text/event-stream decoder.
///
/// Bytes are fed as they arrive from the network; complete events are
/// returned once their terminating blank line has been seen.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    /// Last chunk ended with '\r', so a leading '\n' in the next chunk is part of CRLF
    pending_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        let mut bytes = chunk;

        if self.pending_cr {
            self.pending_cr = false;
            if bytes.first() == Some(&b'\n') {
                bytes = &bytes[1..];
            }
        }

        let mut start = 0;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    self.buffer.extend_from_slice(&bytes[start..i]);
                    self.take_line(&mut frames);
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    self.buffer.extend_from_slice(&bytes[start..i]);
                    self.take_line(&mut frames);
                    i += 1;
                    if i == bytes.len() {
                        self.pending_cr = true;
                    } else if bytes[i] == b'\n' {
                        i += 1;
                    }
                    start = i;
                }
                _ => i += 1,
            }
        }
        self.buffer.extend_from_slice(&bytes[start..]);

        frames
    }

    fn take_line(&mut self, frames: &mut Vec<SseFrame>) {
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                frames.push(SseFrame::Event(event));
            }
            return;
        }

        // comment, used by servers as keep-alive
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(millis) = value.parse::<u64>() {
                    frames.push(SseFrame::Retry(Duration::from_millis(millis)));
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");

        Some(SseEvent {
            event: event.filter(|name| !name.is_empty() && name != "message"),
            data,
            id: self.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(frames: Vec<SseFrame>) -> Vec<SseEvent> {
        frames
            .into_iter()
            .filter_map(|f| match f {
                SseFrame::Event(e) => Some(e),
                SseFrame::Retry(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_default_message() {
        let mut decoder = SseDecoder::new();
        let out = events(decoder.feed(b"data: hello\n\n"));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event, None);
        assert_eq!(out[0].data, "hello");
    }

    #[test]
    fn test_named_event_and_id() {
        let mut decoder = SseDecoder::new();
        let out = events(decoder.feed(
            b"event: container-stopped\nid: 7\ndata: {\"actorId\":\"abc\"}\n\n",
        ));

        assert_eq!(out[0].event.as_deref(), Some("container-stopped"));
        assert_eq!(out[0].id.as_deref(), Some("7"));
        assert_eq!(out[0].data, "{\"actorId\":\"abc\"}");
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: par").is_empty());
        assert!(decoder.feed(b"tial\n").is_empty());

        let out = events(decoder.feed(b"\n"));
        assert_eq!(out[0].data, "partial");
    }

    #[test]
    fn test_multiline_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let out = events(decoder.feed(b"data: one\ndata: two\n\n"));
        assert_eq!(out[0].data, "one\ntwo");
    }

    #[test]
    fn test_crlf_and_cr_line_endings() {
        let mut decoder = SseDecoder::new();
        let out = events(decoder.feed(b"data: a\r\n\r\ndata: b\r\rdata: c\r"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].data, "a");
        assert_eq!(out[1].data, "b");

        // CR at end of chunk followed by LF in the next chunk is one line break
        let out = events(decoder.feed(b"\n\n"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data, "c");
    }

    #[test]
    fn test_comments_and_empty_events_are_ignored() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b": ping\n\nevent: noop\n\n");
        assert!(out.is_empty());
    }

    #[test]
    fn test_retry_field() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b"retry: 2500\n");
        assert_eq!(out, vec![SseFrame::Retry(Duration::from_millis(2500))]);

        assert!(decoder.feed(b"retry: soon\n").is_empty());
    }

    #[test]
    fn test_explicit_message_name_is_default_event() {
        let mut decoder = SseDecoder::new();
        let out = events(decoder.feed(b"event: message\ndata: x\n\n"));
        assert_eq!(out[0].event, None);
    }
}

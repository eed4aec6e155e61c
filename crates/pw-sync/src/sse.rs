// sse.rs — Incremental Server-Sent Events frame parser.
//
// Bytes arrive in arbitrary chunks from the response body. Complete frames
// (terminated by a blank line) are returned as they become available; a
// partial frame stays buffered until the rest arrives. Comment lines
// (leading ':') are ignored. Multiple `data:` lines are joined with '\n'.

/// One dispatched SSE frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field; `None` means the default `message` event.
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<u8>,
}

impl SseFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&raw[..end]);
            if let Some(frame) = parse_frame(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes buffered for a frame that has not been terminated yet.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut frame = SseFrame::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => frame.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => frame.id = Some(value.to_string()),
            // `retry` and unknown fields are ignored.
            _ => {}
        }
    }

    if data_lines.is_empty() && frame.event.is_none() {
        return None;
    }
    frame.data = data_lines.join("\n");
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_frame() {
        let mut parser = SseFrameParser::new();
        let frames = parser.feed(b"event: heartbeat\ndata: {\"a\":1}\nid: 7\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_name(), "heartbeat");
        assert_eq!(frames[0].data, "{\"a\":1}");
        assert_eq!(frames[0].id.as_deref(), Some("7"));
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut parser = SseFrameParser::new();
        assert!(parser.feed(b"event: task_up").is_empty());
        assert!(parser.feed(b"date\ndata: {}\n").is_empty());
        let frames = parser.feed(b"\nevent: heartbeat\ndata: x\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event_name(), "task_update");
        assert_eq!(frames[1].data, "x");
    }

    #[test]
    fn crlf_comments_and_multiline_data() {
        let mut parser = SseFrameParser::new();
        let frames = parser.feed(b": keep-alive\r\n\r\ndata: one\r\ndata: two\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_name(), "message");
        assert_eq!(frames[0].data, "one\ntwo");
    }
}

//! Line-delimited frame decoder for generation streams.
//!
//! Bytes are buffered across chunks until a `\n` arrives, so a frame (or a
//! multi-byte character) split across two chunks is decoded exactly once.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::stream::StreamEvent;

/// Payload that marks the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder from raw chunks to `StreamEvent`s.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buf: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the events of every frame it completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=idx).collect();
            if let Some(event) = decode_line(&line[..idx]) {
                events.push(event);
            }
        }
        events
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.push_chunk(chunk.as_bytes())
    }

    /// Bytes buffered while waiting for a line boundary.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Ends decoding. An unterminated trailing frame is discarded.
    pub fn finish(self) {
        if !self.buf.is_empty() {
            debug!(
                event = "stream.leftover_discarded",
                leftover_len = self.buf.len() as u64,
                "discarding incomplete trailing frame"
            );
        }
    }
}

fn decode_line(bytes: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(bytes);
    let payload = frame_payload(&text)?;
    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }
    match decode_frame(payload) {
        Ok(event) => event,
        Err(err) => {
            warn!(
                event = "stream.frame_skipped",
                frame_len = payload.len() as u64,
                error = %err,
                "skipping undecodable frame"
            );
            None
        }
    }
}

/// Strips SSE framing from one line. Returns `None` for lines that never carry
/// a payload (blank, comments, `event:`/`id:`/`retry:` fields).
fn frame_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    if let Some(rest) = line.strip_prefix("data:") {
        return Some(rest.trim());
    }
    if ["event:", "id:", "retry:"]
        .iter()
        .any(|field| line.starts_with(field))
    {
        return None;
    }
    Some(line)
}

/// Decodes one frame payload. `Ok(None)` means the frame was well formed but
/// carried nothing (no content, reasoning, or session id).
pub fn decode_frame(payload: &str) -> Result<Option<StreamEvent>, serde_json::Error> {
    let frame: WireFrame = serde_json::from_str(payload)?;
    Ok(frame.into_event())
}

#[derive(Deserialize)]
struct WireFrame {
    #[serde(default, alias = "answer", alias = "delta", alias = "text")]
    content: Option<String>,
    #[serde(default, alias = "reasoning_content", alias = "thought")]
    reasoning: Option<String>,
    #[serde(default, alias = "sessionId", alias = "conversation_id")]
    session_id: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: Option<WireDelta>,
}

#[derive(Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "reasoning")]
    reasoning_content: Option<String>,
}

impl WireFrame {
    fn into_event(self) -> Option<StreamEvent> {
        let delta = self.choices.into_iter().next().and_then(|c| c.delta);
        let (choice_content, choice_reasoning) = match delta {
            Some(d) => (d.content, d.reasoning_content),
            None => (None, None),
        };
        let content_delta = self.content.or(choice_content).unwrap_or_default();
        let reasoning_delta = self
            .reasoning
            .or(choice_reasoning)
            .filter(|r| !r.is_empty());
        let session_id = self.session_id.filter(|s| !s.trim().is_empty());
        if content_delta.is_empty() && reasoning_delta.is_none() && session_id.is_none() {
            return None;
        }
        Some(StreamEvent {
            content_delta,
            reasoning_delta,
            session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(events: &[StreamEvent]) -> Vec<&str> {
        events.iter().map(|e| e.content_delta.as_str()).collect()
    }

    #[test]
    fn frame_split_across_chunks_is_emitted_once() {
        let mut decoder = StreamDecoder::new();
        let first = decoder.push_str("data: {\"content\":\"hel");
        assert!(first.is_empty());
        assert!(decoder.pending_len() > 0);
        let second = decoder.push_str("lo\"}\n");
        assert_eq!(contents(&second), vec!["hello"]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn several_frames_in_one_chunk() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.push_str(
            "data: {\"content\":\"a\"}\n\ndata: {\"content\":\"b\"}\r\ndata: {\"content\":\"c\"}\n",
        );
        assert_eq!(contents(&events), vec!["a", "b", "c"]);
    }

    #[test]
    fn done_sentinel_and_sse_fields_produce_nothing() {
        let mut decoder = StreamDecoder::new();
        let events =
            decoder.push_str(": keep-alive\nevent: message\nid: 7\nretry: 100\ndata: [DONE]\n");
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_frame_is_skipped_without_aborting() {
        let mut decoder = StreamDecoder::new();
        let events =
            decoder.push_str("data: {not json\ndata: [1,2]\ndata: {\"content\":\"ok\"}\n");
        assert_eq!(contents(&events), vec!["ok"]);
    }

    #[test]
    fn leftover_without_line_boundary_is_discarded() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.push_str("data: {\"content\":\"x\"}\ndata: {\"content\":\"y\"}");
        assert_eq!(contents(&events), vec!["x"]);
        assert!(decoder.pending_len() > 0);
        decoder.finish();
    }

    #[test]
    fn multibyte_character_split_between_chunks() {
        let mut decoder = StreamDecoder::new();
        let frame = "data: {\"content\":\"caf\u{e9}\"}\n".as_bytes().to_vec();
        let split = frame.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(decoder.push_chunk(&frame[..split]).is_empty());
        let events = decoder.push_chunk(&frame[split..]);
        assert_eq!(contents(&events), vec!["caf\u{e9}"]);
    }

    #[test]
    fn flat_frame_with_reasoning_and_session() {
        let event = decode_frame(
            r#"{"answer":"","reasoning_content":"thinking","conversation_id":"conv-1"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.content_delta, "");
        assert_eq!(event.reasoning_delta.as_deref(), Some("thinking"));
        assert_eq!(event.session_id.as_deref(), Some("conv-1"));
    }

    #[test]
    fn chat_completion_chunk_shape() {
        let event = decode_frame(
            r#"{"id":"x","choices":[{"index":0,"delta":{"content":"{\"a\"","reasoning_content":null}}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.content_delta, "{\"a\"");
        assert_eq!(event.reasoning_delta, None);
    }

    #[test]
    fn empty_frame_object_produces_no_event() {
        assert_eq!(decode_frame("{}").unwrap(), None);
        assert_eq!(
            decode_frame(r#"{"choices":[{"delta":{}}]}"#).unwrap(),
            None
        );
    }
}

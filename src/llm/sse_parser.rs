// ABOUTME: SSE framing for streamed completions, independent of any provider
// ABOUTME: Reassembles events that TCP split or batched before JSON parsing runs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # SSE Framing
//!
//! Completion providers stream tokens as Server-Sent Events, but the byte
//! stream below them is plain TCP: one network read may carry half an event
//! or half a dozen of them. [`SseDecoder`] buffers bytes until whole lines
//! are available and emits one [`SseEvent`] per complete `data:` line, so the
//! provider-specific JSON parsing above it never sees a torn payload.
//!
//! [`sse_chunk_stream`] packages the decoder as a [`ChatStream`]: the caller
//! supplies a closure that turns each JSON payload into a [`StreamChunk`],
//! and the `[DONE]` sentinel terminates the stream.

use std::mem;

use bytes::Bytes;
use futures_util::{future, Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

/// One decoded SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line, prefix stripped
    Data(String),
    /// The `data: [DONE]` sentinel ending an OpenAI-style stream
    Done,
}

/// Incremental SSE decoder
///
/// Bytes go in via [`feed`](Self::feed) as they arrive off the wire; whole
/// events come out. A trailing partial line stays buffered until the next
/// read completes it, or until [`finish`](Self::finish) drains it at
/// end-of-stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: String,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one network read, returning every event it completed
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(end) = self.pending.find('\n') {
            let line = self.pending[..end].trim_end_matches('\r').to_owned();
            self.pending = self.pending[end + 1..].to_owned();

            if let Some(event) = Self::decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Drain a final unterminated line once the byte stream is exhausted
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let tail = mem::take(&mut self.pending);
        Self::decode_line(&tail).into_iter().collect()
    }

    // Blank separator lines and non-data fields (event:, id:, retry:,
    // comments) carry nothing we use.
    fn decode_line(line: &str) -> Option<SseEvent> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == "data: [DONE]" {
            return Some(SseEvent::Done);
        }
        let payload = trimmed.strip_prefix("data: ")?;
        (!payload.trim().is_empty()).then(|| SseEvent::Data(payload.to_owned()))
    }
}

/// Adapt a raw HTTP byte stream into a [`ChatStream`]
///
/// `parse_data` maps each JSON payload to a chunk; returning `None` drops
/// events with nothing to forward (metadata-only frames). Chunks with an
/// empty delta are filtered out unless they are the final chunk, and a
/// transport error ends the stream with that error as its last item.
pub fn sse_chunk_stream<S, F>(
    byte_stream: S,
    parse_data: F,
    provider_name: &'static str,
) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let chunks = async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut byte_stream = Box::pin(byte_stream);

        while let Some(read) = byte_stream.next().await {
            match read {
                Ok(bytes) => {
                    for event in decoder.feed(&bytes) {
                        match event {
                            SseEvent::Data(payload) => {
                                if let Some(chunk) = parse_data(&payload) {
                                    yield chunk;
                                }
                            }
                            SseEvent::Done => {
                                yield Ok(StreamChunk::done());
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(AppError::external_service(
                        provider_name,
                        format!("stream read error: {e}"),
                    ));
                    return;
                }
            }
        }

        // Stream ended without [DONE]; whatever is buffered is the last word.
        for event in decoder.finish() {
            match event {
                SseEvent::Data(payload) => {
                    if let Some(chunk) = parse_data(&payload) {
                        yield chunk;
                    }
                }
                SseEvent::Done => {
                    yield Ok(StreamChunk::done());
                    return;
                }
            }
        }
    };

    Box::pin(chunks.filter(|item| {
        future::ready(
            item.as_ref()
                .map_or(true, |chunk| !chunk.delta.is_empty() || chunk.is_final),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_event_in_one_read() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"x\":1}\n\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_batched_events_in_one_read() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_owned()),
                SseEvent::Data("{\"b\":2}".to_owned()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn test_event_torn_across_reads() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"delta\":\"he").is_empty());
        let events = decoder.feed(b"llo\"}\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"delta\":\"hello\"}".to_owned())]
        );
    }

    #[test]
    fn test_crlf_terminated_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"x\":1}\r\n\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_non_data_fields_are_dropped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: message\nid: 42\nretry: 1000\n: comment\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_finish_drains_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Done]);
        assert!(decoder.finish().is_empty());
    }

    #[tokio::test]
    async fn test_chunk_stream_skips_empty_deltas() {
        let reads: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"d\":\"\"}\n")),
            Ok(Bytes::from_static(b"data: {\"d\":\"hi\"}\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n")),
        ];

        let parse = |json: &str| {
            let value: serde_json::Value = serde_json::from_str(json).ok()?;
            Some(Ok(StreamChunk {
                delta: value["d"].as_str().unwrap_or_default().to_owned(),
                is_final: false,
                finish_reason: None,
            }))
        };

        let mut stream = sse_chunk_stream(tokio_stream::iter(reads), parse, "test");
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.delta, "hi");
        let last = stream.next().await.unwrap().unwrap();
        assert!(last.is_final);
        assert!(stream.next().await.is_none());
    }
}

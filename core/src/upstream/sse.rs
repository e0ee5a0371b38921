//! Hand-rolled framing for the upstream's `text/event-stream` chat-completions
//! body: buffers raw bytes into blank-line-delimited SSE frames, strips the
//! `data:` prefix, and recognizes the `[DONE]` sentinel some providers send
//! in place of closing the connection. A narrow, purpose-built parser rather
//! than a general SSE crate, in the idiom of this caller's other hand-rolled
//! state machines (retry, degrade).

use futures::{Stream, StreamExt};

use super::{ByteStream, TransportError};
use crate::models::ChatCompletionChunk;

/// One decoded frame of the upstream chat-completions stream.
pub enum ChatStreamFrame {
    Chunk(ChatCompletionChunk),
    /// The `data: [DONE]` sentinel, or a clean end of the byte stream.
    Done,
}

struct DecoderState {
    body: ByteStream,
    buf: String,
    finished: bool,
}

/// Turns the raw upstream byte stream into a stream of decoded frames. Frames
/// that are not parseable JSON (e.g. provider comment/keep-alive lines) are
/// silently skipped rather than surfaced as errors.
pub fn decode_chat_stream(
    body: ByteStream,
) -> impl Stream<Item = Result<ChatStreamFrame, TransportError>> {
    futures::stream::unfold(
        DecoderState {
            body,
            buf: String::new(),
            finished: false,
        },
        |mut state| async move {
            loop {
                if state.finished {
                    return None;
                }
                if let Some(frame) = take_next_frame(&mut state.buf) {
                    match parse_frame(&frame) {
                        Some(ChatStreamFrame::Done) => {
                            state.finished = true;
                            return Some((Ok(ChatStreamFrame::Done), state));
                        }
                        Some(other) => return Some((Ok(other), state)),
                        None => continue,
                    }
                }
                match state.body.next().await {
                    Some(Ok(bytes)) => {
                        state.buf.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => return Some((Err(e), state)),
                    None => {
                        state.finished = true;
                        let remainder = std::mem::take(&mut state.buf);
                        return parse_frame(remainder.trim()).map(|f| (Ok(f), state));
                    }
                }
            }
        },
    )
}

/// Extracts and removes the first complete blank-line-delimited frame from
/// `buf`, if one is present.
fn take_next_frame(buf: &mut String) -> Option<String> {
    let (idx, sep_len) = match (buf.find("\r\n\r\n"), buf.find("\n\n")) {
        (Some(crlf), Some(lf)) if crlf <= lf => (crlf, 4),
        (Some(crlf), None) => (crlf, 4),
        (_, Some(lf)) => (lf, 2),
        (None, None) => return None,
    };
    let frame = buf[..idx].to_string();
    buf.drain(..idx + sep_len);
    Some(frame)
}

/// Parses the first `data:` line of a frame. Returns `None` for frames with
/// no data line (comments, keep-alives) or an unparseable payload.
fn parse_frame(frame: &str) -> Option<ChatStreamFrame> {
    for line in frame.lines() {
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        if data == "[DONE]" {
            return Some(ChatStreamFrame::Done);
        }
        return serde_json::from_str::<ChatCompletionChunk>(data)
            .ok()
            .map(ChatStreamFrame::Chunk);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn byte_stream_of(chunks: Vec<&'static str>) -> ByteStream {
        let iter = chunks.into_iter().map(|s| Ok(Bytes::from(s)));
        Box::pin(futures::stream::iter(iter))
    }

    #[tokio::test]
    async fn decodes_chunk_then_done() {
        let body = byte_stream_of(vec![
            "data: {\"id\":\"1\",\"choices\":[]}\n\n",
            "data: [DONE]\n\n",
        ]);
        let frames: Vec<_> = decode_chat_stream(body).collect().await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Ok(ChatStreamFrame::Chunk(_))));
        assert!(matches!(frames[1], Ok(ChatStreamFrame::Done)));
    }

    #[tokio::test]
    async fn frame_split_across_chunks_is_reassembled() {
        let body = byte_stream_of(vec!["data: {\"id\":\"1\",", "\"choices\":[]}\n\n"]);
        let frames: Vec<_> = decode_chat_stream(body).collect().await;
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Ok(ChatStreamFrame::Chunk(_))));
    }

    #[tokio::test]
    async fn clean_end_without_done_sentinel_yields_no_trailing_frame() {
        let body = byte_stream_of(vec!["data: {\"id\":\"1\",\"choices\":[]}\n\n"]);
        let frames: Vec<_> = decode_chat_stream(body).collect().await;
        assert_eq!(frames.len(), 1);
    }
}

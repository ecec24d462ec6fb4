//! Server-Sent Events (SSE) decoding for streaming chat responses.
//!
//! The chat service writes one `data: {json}` line per event.  Bytes are
//! buffered until a full line is available, so a payload (or a multi-byte
//! character) split across network chunks still decodes as one event.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS};
use crate::{Error, Result, StreamEvent};

const DATA_PREFIX: &[u8] = b"data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Process a stream of bytes into a stream of decoded events.
///
/// A line that fails to decode yields a serialization or encoding error and
/// decoding continues with the next line.  A transport error is yielded once
/// and ends the stream, as does a `data: [DONE]` line.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = SseState {
        stream: byte_stream,
        lines: LineBuffer::default(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            let line = match state.lines.next_line() {
                Some(line) => line,
                None if state.finished => state.lines.take_remainder()?,
                None => {
                    match state.stream.next().await {
                        Some(Ok(bytes)) => {
                            STREAM_BYTES.count(bytes.len() as u64);
                            state.lines.push(&bytes);
                        }
                        Some(Err(e)) => {
                            STREAM_ERRORS.click();
                            state.finished = true;
                            state.lines.clear();
                            return Some((
                                Err(Error::streaming(
                                    format!("Error in HTTP stream: {e}"),
                                    Some(Box::new(e)),
                                )),
                                state,
                            ));
                        }
                        None => state.finished = true,
                    }
                    continue;
                }
            };

            match parse_line(&line) {
                Some(Ok(Frame::Event(event))) => return Some((Ok(event), state)),
                Some(Ok(Frame::Done)) => return None,
                Some(Err(err)) => return Some((Err(err), state)),
                None => continue,
            }
        }
    })
}

struct SseState<S> {
    stream: S,
    lines: LineBuffer,
    finished: bool,
}

enum Frame {
    Event(StreamEvent),
    Done,
}

/// Accumulates raw bytes and hands out complete lines without their terminator.
#[derive(Default)]
struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        strip_carriage_return(&mut line);
        Some(line)
    }

    /// The final line of a stream that did not end with a newline.
    fn take_remainder(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        strip_carriage_return(&mut line);
        Some(line)
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

fn strip_carriage_return(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

/// Decode one line.  Returns `None` for lines that carry no event.
fn parse_line(line: &[u8]) -> Option<Result<Frame>> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(b" ").unwrap_or(payload);
    let payload = match std::str::from_utf8(payload) {
        Ok(payload) => payload.trim(),
        Err(e) => {
            return Some(Err(Error::encoding(
                format!("Invalid UTF-8 in stream line: {e}"),
                Some(Box::new(e)),
            )));
        }
    };

    if payload.is_empty() {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(Ok(Frame::Done));
    }

    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Some(Ok(Frame::Event(event))),
        Err(e) => Some(Err(Error::serialization(
            format!("Failed to parse event JSON `{payload}`: {e}"),
            Some(Box::new(e)),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io;

    fn chunks(
        parts: &[&'static [u8]],
    ) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Unpin {
        stream::iter(
            parts
                .iter()
                .copied()
                .map(|part| Ok(Bytes::from_static(part)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(
        s: impl Stream<Item = Result<StreamEvent>>,
    ) -> Vec<Result<StreamEvent>> {
        Box::pin(s).collect().await
    }

    #[tokio::test]
    async fn decodes_data_lines_and_reports_malformed_ones() {
        let body: &'static [u8] = b"data: {\"token\":\"a\"}\n\
data: {\"token\":\"b\"}\n\
data: {not-json}\n\
data: {\"token\":\"c\"}\n";
        let items = collect(process_sse(chunks(&[body]))).await;

        assert_eq!(items.len(), 4);
        assert_eq!(items[0].as_ref().unwrap().value(), &json!({"token": "a"}));
        assert_eq!(items[1].as_ref().unwrap().value(), &json!({"token": "b"}));
        assert!(items[2].as_ref().unwrap_err().is_malformed_chunk());
        assert_eq!(items[3].as_ref().unwrap().value(), &json!({"token": "c"}));
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_chunks() {
        let items = collect(process_sse(chunks(&[
            b"da",
            b"ta: {\"tok",
            b"en\":\"x\"}",
            b"\n",
        ])))
        .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().text(), Some("x"));
    }

    #[tokio::test]
    async fn reassembles_split_multibyte_characters() {
        let line = "data: {\"token\":\"红烧肉\"}\n".as_bytes();
        // Split in the middle of the first CJK character.
        let split = line.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let (head, tail) = line.split_at(split);
        let stream = stream::iter(vec![
            Ok::<_, io::Error>(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ]);
        let items = collect(process_sse(stream)).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().text(), Some("红烧肉"));
    }

    #[tokio::test]
    async fn ignores_non_data_lines() {
        let items = collect(process_sse(chunks(&[
            b": keep-alive\r\nevent: token\r\nid: 7\r\n\r\ndata:{\"token\":\"y\"}\r\n\r\n",
        ])))
        .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().text(), Some("y"));
    }

    #[tokio::test]
    async fn done_sentinel_ends_stream() {
        let items = collect(process_sse(chunks(&[
            b"data: {\"token\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"token\":\"late\"}\n",
        ])))
        .await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn final_line_without_newline() {
        let items = collect(process_sse(chunks(&[b"data: {\"token\":\"z\"}"]))).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().text(), Some("z"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_malformed_chunk() {
        let items = collect(process_sse(chunks(&[
            b"data: \xff\xfe\n",
            b"data: {\"token\":\"ok\"}\n",
        ])))
        .await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Err(Error::Encoding { .. })));
        assert_eq!(items[1].as_ref().unwrap().text(), Some("ok"));
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let stream = stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"token\":\"a\"}\ndata: {\"tok")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: {\"token\":\"never\"}\n")),
        ]);
        let items = collect(process_sse(stream)).await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Streaming { .. })));
    }
}

//! Cancellable event streams.
//!
//! [`ChatStream`] is what callers pull streamed replies from.  It skips lines
//! that fail to decode, ends after a transport error, and stops as soon as its
//! [`StreamCancel`] handle fires, dropping the underlying response body.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::observability::{STREAM_CANCELLED, STREAM_EVENTS, STREAM_MALFORMED};
use crate::{Result, StreamEvent};

/// A cloneable handle that stops a [`ChatStream`].
#[derive(Debug, Clone, Default)]
pub struct StreamCancel {
    token: CancellationToken,
}

impl StreamCancel {
    /// Create a handle that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the stream.  The stream yields no further items once this returns.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// A stream of decoded chat events.
pub struct ChatStream {
    inner: Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>,
    cancel: StreamCancel,
}

impl ChatStream {
    /// Wrap a raw event stream, such as the output of [`process_sse`](crate::sse::process_sse).
    pub fn new<S>(events: S, cancel: StreamCancel) -> Self
    where
        S: Stream<Item = Result<StreamEvent>> + Send + 'static,
    {
        let events = Box::pin(skip_malformed(events));
        let token = cancel.token();
        let inner = stream::unfold(Some(events), move |events| {
            let token = token.clone();
            async move {
                let mut events = events?;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        STREAM_CANCELLED.click();
                        tracing::debug!("chat stream cancelled");
                        None
                    }
                    item = events.next() => match item {
                        Some(Err(err)) => Some((Err(err), None)),
                        Some(ok) => Some((ok, Some(events))),
                        None => None,
                    },
                }
            }
        });
        Self {
            inner: Box::pin(inner),
            cancel,
        }
    }

    /// A handle that stops this stream.
    pub fn cancel_handle(&self) -> StreamCancel {
        self.cancel.clone()
    }

    /// Stop this stream.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for ChatStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

fn skip_malformed<S>(events: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = Result<StreamEvent>> + Send,
{
    events.filter_map(|item| async move {
        match item {
            Ok(event) => {
                STREAM_EVENTS.click();
                Some(Ok(event))
            }
            Err(err) if err.is_malformed_chunk() => {
                STREAM_MALFORMED.click();
                tracing::warn!(error = %err, "skipping malformed stream chunk");
                None
            }
            Err(err) => Some(Err(err)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::sse::process_sse;
    use bytes::Bytes;
    use serde_json::json;
    use std::io;

    fn sse_body(body: &'static str) -> ChatStream {
        let bytes = stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(body.as_bytes()))]);
        ChatStream::new(process_sse(bytes), StreamCancel::new())
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let stream = sse_body(
            "data: {\"token\":\"a\"}\n\
             data: {\"token\":\"b\"}\n\
             data: {not-json}\n\
             data: {\"token\":\"c\"}\n",
        );
        let events: Vec<_> = stream.collect().await;
        let values: Vec<_> = events
            .into_iter()
            .map(|event| event.unwrap().0)
            .collect();
        assert_eq!(
            values,
            vec![json!({"token": "a"}), json!({"token": "b"}), json!({"token": "c"})]
        );
    }

    #[tokio::test]
    async fn transport_error_is_final() {
        let events = stream::iter(vec![
            Ok(StreamEvent::new(json!({"token": "a"}))),
            Err(Error::streaming("connection reset", None)),
            Ok(StreamEvent::new(json!({"token": "b"}))),
        ]);
        let items: Vec<_> = ChatStream::new(events, StreamCancel::new()).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Streaming { .. })));
    }

    #[tokio::test]
    async fn cancel_before_first_poll_yields_nothing() {
        let mut stream = sse_body("data: {\"token\":\"a\"}\n");
        stream.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_wakes_a_pending_stream() {
        let cancel = StreamCancel::new();
        let mut stream = ChatStream::new(stream::pending::<Result<StreamEvent>>(), cancel.clone());

        let mut next = tokio_test::task::spawn(stream.next());
        tokio_test::assert_pending!(next.poll());

        cancel.cancel();
        assert!(next.is_woken());
        assert!(tokio_test::assert_ready!(next.poll()).is_none());
    }

    #[tokio::test]
    async fn cancel_mid_stream() {
        let cancel = StreamCancel::new();
        let events = stream::iter(vec![
            Ok(StreamEvent::new(json!({"token": "a"}))),
            Ok(StreamEvent::new(json!({"token": "b"}))),
        ])
        .chain(stream::pending());
        let mut stream = ChatStream::new(events, cancel.clone());

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_ok());
        stream.cancel_handle().cancel();
        assert!(cancel.is_cancelled());
        assert!(stream.next().await.is_none());
    }
}

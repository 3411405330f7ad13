//! Pull-based body stream around [`StreamTranscoder`].
//!
//! Wraps the upstream data stream and yields recompressed chunks. The
//! downstream connection polls this stream only when it can accept more
//! data, so backpressure flows straight through to the upstream read.

use bytes::Bytes;
use futures_util::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::http::StatusCode;

use crate::observability::metrics;
use crate::transcode::gzip::{BoxError, StreamTranscoder, TranscodeError};

/// A stream that decompresses, inspects and recompresses upstream chunks.
pub struct TranscodingStream<S> {
    /// Upstream data; `None` once it ended, failed or was abandoned.
    inner: Option<S>,
    transcoder: StreamTranscoder,
    /// Output produced by `settle` before the response head was sent.
    queued: VecDeque<Bytes>,
    /// Error hit by `settle`, reported after the queued output.
    failed: Option<TranscodeError>,
    done: bool,
}

impl<S, E> TranscodingStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
{
    pub fn new(inner: S, transcoder: StreamTranscoder) -> Self {
        Self {
            inner: Some(inner),
            transcoder,
            queued: VecDeque::new(),
            failed: None,
            done: false,
        }
    }

    /// Pull input until the status can no longer change.
    ///
    /// Output produced meanwhile is queued and yielded first by the stream.
    /// Returns the status found in the body, if any.
    pub async fn settle(&mut self) -> Option<StatusCode> {
        futures_util::future::poll_fn(|cx| self.poll_settle(cx)).await
    }

    /// Stop looking for the status; the rest of the body is only transcoded.
    pub fn give_up(&mut self) {
        self.transcoder.give_up();
    }

    pub fn transcoder(&self) -> &StreamTranscoder {
        &self.transcoder
    }

    fn poll_settle(&mut self, cx: &mut Context<'_>) -> Poll<Option<StatusCode>> {
        while self.transcoder.is_buffering() && self.failed.is_none() {
            match ready!(self.poll_step(cx)) {
                Some(Ok(bytes)) => {
                    if !bytes.is_empty() {
                        self.queued.push_back(bytes);
                    }
                }
                Some(Err(e)) => {
                    self.fail();
                    self.failed = Some(e);
                }
                None => break,
            }
        }
        Poll::Ready(self.transcoder.extracted_status())
    }

    /// Read one upstream item and run it through the transcoder.
    fn poll_step(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, TranscodeError>>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(inner).poll_next(cx)) {
            Some(Ok(chunk)) => Poll::Ready(Some(self.transcoder.on_chunk(&chunk))),
            Some(Err(e)) => Poll::Ready(Some(Err(TranscodeError::Upstream(e.into())))),
            None => {
                self.inner = None;
                Poll::Ready(Some(self.transcoder.on_end()))
            }
        }
    }

    fn fail(&mut self) {
        self.inner = None;
        self.transcoder.abort();
        metrics::record_transcode_error();
    }
}

impl<S, E> Stream for TranscodingStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
{
    type Item = Result<Bytes, TranscodeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(bytes) = this.queued.pop_front() {
                return Poll::Ready(Some(Ok(bytes)));
            }
            if let Some(e) = this.failed.take() {
                this.done = true;
                return Poll::Ready(Some(Err(e)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match ready!(this.poll_step(cx)) {
                Some(Ok(bytes)) if bytes.is_empty() => continue,
                Some(Ok(bytes)) => return Poll::Ready(Some(Ok(bytes))),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Aborting transcoded response body");
                    this.fail();
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.done = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl<S> Drop for TranscodingStream<S> {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(
                state = ?self.transcoder.state(),
                "Transcoded exchange abandoned before completion"
            );
        }
    }
}

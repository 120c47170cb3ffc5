//! Lazy sequence of decoded requests.
//!
//! # Responsibilities
//! - Pull one request at a time from the transport's read half
//! - Stop after a non-keep-alive request, a disconnect or an error
//! - Give up the underlying reader for a protocol switch
//!
//! # Design Decisions
//! - The completion flag is shared with the connection and only ever moves
//!   from unset to set
//! - Disconnects end the stream quietly; other errors are yielded once

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures_util::stream::{FusedStream, Stream};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::http::decoder::RequestDecoder;
use crate::http::error::HttpError;
use crate::http::request::Request;

/// Monotonic "no more requests" flag for one connection.
#[derive(Debug, Clone, Default)]
pub struct CompletionFlag(Arc<AtomicBool>);

impl CompletionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Stream of requests read from one connection.
pub struct RequestSequence<R> {
    reader: Option<FramedRead<R, RequestDecoder>>,
    completion: CompletionFlag,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> RequestSequence<R> {
    pub fn new(reader: R, decoder: RequestDecoder, completion: CompletionFlag) -> Self {
        Self {
            reader: Some(FramedRead::new(reader, decoder)),
            completion,
            exhausted: false,
        }
    }

    /// Handle to the flag that ends this sequence.
    pub fn completion(&self) -> &CompletionFlag {
        &self.completion
    }

    pub fn is_complete(&self) -> bool {
        self.exhausted || self.completion.is_set()
    }

    /// Take the framed reader, including any bytes it has buffered past the
    /// last request. The sequence yields nothing afterwards.
    pub fn take_reader(&mut self) -> Option<FramedRead<R, RequestDecoder>> {
        self.exhausted = true;
        self.reader.take()
    }
}

impl<R: AsyncRead + Unpin> Stream for RequestSequence<R> {
    type Item = Result<Request, HttpError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.is_complete() {
            return Poll::Ready(None);
        }
        let Some(reader) = this.reader.as_mut() else {
            this.exhausted = true;
            return Poll::Ready(None);
        };

        match ready!(Pin::new(reader).poll_next(cx)) {
            Some(Ok(request)) => {
                if !request.should_keep_alive() {
                    this.completion.set();
                }
                Poll::Ready(Some(Ok(request)))
            }
            Some(Err(e)) if e.is_disconnect() => {
                tracing::debug!(error = %e, "Peer disconnected");
                this.exhausted = true;
                Poll::Ready(None)
            }
            Some(Err(e)) => {
                this.exhausted = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.exhausted = true;
                Poll::Ready(None)
            }
        }
    }
}

impl<R: AsyncRead + Unpin> FusedStream for RequestSequence<R> {
    fn is_terminated(&self) -> bool {
        self.is_complete()
    }
}

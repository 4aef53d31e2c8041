//! Responses and their bodies.
//!
//! [`ResponseBody`] layers an optional decompressor over a [`RawBody`]. The
//! decompressor pulls from the raw stream, never the other way round, and
//! closing the outer body closes the raw one.

use crate::body::BoxError;
use crate::compression::{Compression, Decoder};
use crate::error::HttpError;
use bytes::Bytes;
use futures::task::AtomicWaker;
use http::{HeaderMap, Response, StatusCode, Version};
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyDataStream, BodyExt};
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use tokio_util::io::StreamReader;
use url::Url;

/// `AsyncRead` view over a response body, see [`HttpResponse::into_reader`].
pub type ResponseReader = StreamReader<BodyDataStream<ResponseBody>, Bytes>;

/// Aborts a response stream from anywhere.
///
/// Once cancelled, every pending or later read of the body fails with
/// [`HttpError::Canceled`]. A body that was already read to the end or closed
/// is unaffected.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    waker: AtomicWaker,
}

impl CancelHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.waker.wake();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn register(&self, cx: &Context<'_>) {
        self.inner.waker.register(cx.waker());
    }
}

/// Whole-call deadline carried from the request into its body.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    pub(crate) at: Instant,
    pub(crate) timeout: Duration,
}

impl Deadline {
    pub(crate) fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }
}

enum RawState {
    Open(BoxBody<Bytes, BoxError>),
    Finished,
    Canceled,
    TimedOut(Duration),
    Closed,
}

/// Undecoded response stream.
///
/// Reading after [`close`](RawBody::close) fails with [`HttpError::BodyClosed`].
pub struct RawBody {
    state: RawState,
    cancel: CancelHandle,
    deadline: Option<(Pin<Box<Sleep>>, Duration)>,
}

impl RawBody {
    pub(crate) fn new<B>(body: B, cancel: CancelHandle, deadline: Option<Deadline>) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        Self {
            state: RawState::Open(body.map_err(Into::into).boxed()),
            cancel,
            deadline: deadline.map(|d| (Box::pin(tokio::time::sleep_until(d.at)), d.timeout)),
        }
    }

    /// Release the underlying connection. Later reads fail with `BodyClosed`.
    pub fn close(&mut self) {
        self.state = RawState::Closed;
        self.deadline = None;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state, RawState::Closed)
    }

    fn is_cancelled(&self) -> bool {
        matches!(self.state, RawState::Canceled)
            || (matches!(self.state, RawState::Open(_)) && self.cancel.is_cancelled())
    }
}

impl HttpBody for RawBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, HttpError>>> {
        let this = self.get_mut();

        match &this.state {
            RawState::Open(_) => {}
            RawState::Finished => return Poll::Ready(None),
            RawState::Canceled => return Poll::Ready(Some(Err(HttpError::Canceled))),
            RawState::TimedOut(d) => return Poll::Ready(Some(Err(HttpError::RequestTimeout(*d)))),
            RawState::Closed => return Poll::Ready(Some(Err(HttpError::BodyClosed))),
        }

        this.cancel.register(cx);
        if this.cancel.is_cancelled() {
            this.state = RawState::Canceled;
            this.deadline = None;
            return Poll::Ready(Some(Err(HttpError::Canceled)));
        }

        if let Some((sleep, timeout)) = &mut this.deadline
            && sleep.as_mut().poll(cx).is_ready()
        {
            let timeout = *timeout;
            this.state = RawState::TimedOut(timeout);
            this.deadline = None;
            return Poll::Ready(Some(Err(HttpError::RequestTimeout(timeout))));
        }

        let RawState::Open(inner) = &mut this.state else {
            return Poll::Ready(None);
        };
        match ready!(Pin::new(inner).poll_frame(cx)) {
            Some(Ok(frame)) => Poll::Ready(Some(Ok(frame))),
            Some(Err(e)) => Poll::Ready(Some(Err(HttpError::Transport(e)))),
            None => {
                this.state = RawState::Finished;
                this.deadline = None;
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.state {
            RawState::Open(inner) => inner.is_end_stream(),
            RawState::Finished => true,
            RawState::Canceled | RawState::TimedOut(_) | RawState::Closed => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.state {
            RawState::Open(inner) => inner.size_hint(),
            _ => SizeHint::with_exact(0),
        }
    }
}

impl fmt::Debug for RawBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            RawState::Open(_) => "open",
            RawState::Finished => "finished",
            RawState::Canceled => "canceled",
            RawState::TimedOut(_) => "timed out",
            RawState::Closed => "closed",
        };
        f.debug_struct("RawBody").field("state", &state).finish()
    }
}

/// Response body, decompressed when the response's `Content-Encoding`
/// matches the configured codec and passed through otherwise.
///
/// After [`close`](ResponseBody::close) the raw stream reports
/// [`HttpError::BodyClosed`] while the decoded stream simply ends.
pub struct ResponseBody {
    raw: RawBody,
    decoder: Option<Decoder>,
    decoding: bool,
}

impl ResponseBody {
    pub(crate) fn new(raw: RawBody, decoder: Option<Decoder>) -> Self {
        let decoding = decoder.is_some();
        Self {
            raw,
            decoder,
            decoding,
        }
    }

    /// The undecoded stream underneath.
    pub fn raw_mut(&mut self) -> &mut RawBody {
        &mut self.raw
    }

    /// Whether reads go through a decompressor.
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        self.decoding
    }

    /// Release the decompressor and the raw stream.
    pub fn close(&mut self) {
        self.decoder = None;
        self.raw.close();
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, HttpError>>> {
        let this = self.get_mut();
        if !this.decoding {
            return Pin::new(&mut this.raw).poll_frame(cx);
        }

        if this.raw.is_cancelled() {
            return Poll::Ready(Some(Err(HttpError::Canceled)));
        }
        if this.raw.is_closed() {
            return Poll::Ready(None);
        }

        loop {
            if this.decoder.is_none() {
                return Poll::Ready(None);
            }
            match ready!(Pin::new(&mut this.raw).poll_frame(cx)) {
                Some(Ok(frame)) => {
                    let Ok(data) = frame.into_data() else {
                        continue;
                    };
                    let Some(decoder) = this.decoder.as_mut() else {
                        return Poll::Ready(None);
                    };
                    let out = decoder.push(&data).map_err(HttpError::Compression)?;
                    if !out.is_empty() {
                        return Poll::Ready(Some(Ok(Frame::data(out))));
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {
                    let Some(decoder) = this.decoder.take() else {
                        return Poll::Ready(None);
                    };
                    let tail = decoder.finish().map_err(HttpError::Compression)?;
                    if tail.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(Frame::data(tail))));
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        if self.decoding {
            self.decoder.is_none()
        } else {
            self.raw.is_end_stream()
        }
    }

    fn size_hint(&self) -> SizeHint {
        if self.decoding {
            SizeHint::default()
        } else {
            self.raw.size_hint()
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("raw", &self.raw)
            .field("decoder", &self.decoder)
            .finish()
    }
}

/// Response of one logical call.
///
/// The body is a scoped resource: read it to the end, close it or drop the
/// response to give the connection back.
#[derive(Debug)]
pub struct HttpResponse {
    inner: Response<ResponseBody>,
    uri: Url,
    cancel: CancelHandle,
}

impl HttpResponse {
    pub(crate) fn new<B>(
        response: Response<B>,
        uri: Url,
        compression: Compression,
        deadline: Option<Deadline>,
    ) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let cancel = CancelHandle::new();
        let decoder = compression.decoder_for(response.headers());
        let (parts, body) = response.into_parts();
        let body = ResponseBody::new(RawBody::new(body, cancel.clone(), deadline), decoder);
        Self {
            inner: Response::from_parts(parts, body),
            uri,
            cancel,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// `Content-Length` announced by the server, if any.
    ///
    /// This is the length on the wire; a decompressed body is usually longer.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.inner
            .headers()
            .get(http::header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// URI of the last hop actually reached.
    #[must_use]
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        self.inner.body_mut()
    }

    #[must_use]
    pub fn into_body(self) -> ResponseBody {
        self.inner.into_body()
    }

    /// The underlying `http::Response`.
    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Read the whole (decoded) body.
    ///
    /// # Errors
    /// Fails on transport errors, cancellation, the whole-call deadline or a
    /// corrupt compressed stream.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        Ok(self.inner.into_body().collect().await?.to_bytes())
    }

    /// Read the body as text; invalid UTF-8 is replaced.
    ///
    /// # Errors
    /// Same as [`bytes`](Self::bytes).
    pub async fn text(self) -> Result<String, HttpError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the body and decode it as JSON.
    ///
    /// # Errors
    /// Same as [`bytes`](Self::bytes), plus `HttpError::Json` when decoding fails.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(HttpError::Json)
    }

    /// Stream the body through `tokio::io::AsyncRead`.
    #[must_use]
    pub fn into_reader(self) -> ResponseReader {
        StreamReader::new(self.inner.into_body().into_data_stream())
    }
}

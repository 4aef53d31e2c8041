//! Request bodies and their wire payload.

use crate::compression::{Compression, Encoder};
use crate::error::HttpError;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http_body::{Body as HttpBody, Frame};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use pin_project_lite::pin_project;
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Boxed error type used by streaming bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type handed to the transport and to `on_before_request` hooks
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// Caller-supplied request body.
///
/// Structured values go through [`Body::json`] (or [`Body::form`]); encoding
/// failures surface before any connection is opened.
#[derive(Default)]
#[non_exhaustive]
pub enum Body {
    /// No body
    #[default]
    Empty,
    /// UTF-8 text sent verbatim
    Text(String),
    /// Raw bytes sent verbatim
    Bytes(Bytes),
    /// Pre-encoded JSON document
    Json(Bytes),
    /// Pre-encoded `application/x-www-form-urlencoded` document
    Form(Bytes),
    /// Unconsumed stream, forwarded without buffering
    Stream(BodyStream),
}

/// Streaming body with an optional known length.
pub struct BodyStream {
    body: RequestBody,
    len: Option<u64>,
}

impl Body {
    /// Text body.
    pub fn text(text: impl Into<String>) -> Self {
        Body::Text(text.into())
    }

    /// Raw byte body.
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Body::Bytes(bytes.into())
    }

    /// Encode `value` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Encoding`] if `value` cannot be represented as JSON
    /// (for example a map with non-string keys, or a NaN).
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, HttpError> {
        let encoded = crate::json::to_vec(value).map_err(HttpError::Encoding)?;
        Ok(Body::Json(Bytes::from(encoded)))
    }

    /// Encode `value` as a URL-encoded form.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::FormEncoding`] if `value` is not a flat record or
    /// list of pairs.
    pub fn form<T: Serialize + ?Sized>(value: &T) -> Result<Self, HttpError> {
        let encoded = serde_urlencoded::to_string(value)?;
        Ok(Body::Form(Bytes::from(encoded)))
    }

    /// Forward a stream of chunks. Length is unknown, so the body goes out chunked.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let frames = stream.map_ok(Frame::data).map_err(Into::into);
        Body::Stream(BodyStream {
            body: StreamBody::new(frames).boxed_unsync(),
            len: None,
        })
    }

    /// Forward an async reader. Pass `len` when the size is known up front to
    /// send a `Content-Length` instead of chunked encoding.
    pub fn from_reader<R>(reader: R, len: Option<u64>) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        let frames = ReaderStream::new(reader)
            .map_ok(Frame::data)
            .map_err(BoxError::from);
        Body::Stream(BodyStream {
            body: StreamBody::new(frames).boxed_unsync(),
            len,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Text(text) => text.is_empty(),
            Body::Bytes(bytes) | Body::Json(bytes) | Body::Form(bytes) => bytes.is_empty(),
            Body::Stream(_) => false,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Json(bytes) => f.debug_tuple("Json").field(&bytes.len()).finish(),
            Body::Form(bytes) => f.debug_tuple("Form").field(&bytes.len()).finish(),
            Body::Stream(stream) => f.debug_tuple("Stream").field(&stream.len).finish(),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

enum PayloadKind {
    Empty,
    Buffered(Bytes),
    /// Consumed by the first hop; later hops send nothing.
    Streaming(Option<BodyStream>),
}

/// Materialized wire payload of one call.
///
/// Buffered payloads are replayed on every redirect hop.
pub(crate) struct Payload {
    kind: PayloadKind,
    content_type: Option<&'static str>,
}

impl Payload {
    /// Turn a caller body into its wire form, compressing it when a codec is set.
    pub(crate) fn encode(body: Body, compression: Compression) -> Result<Self, HttpError> {
        let (kind, content_type) = match body {
            Body::Empty => (PayloadKind::Empty, None),
            Body::Text(text) => (PayloadKind::Buffered(Bytes::from(text)), None),
            Body::Bytes(bytes) => (PayloadKind::Buffered(bytes), None),
            Body::Json(bytes) => (PayloadKind::Buffered(bytes), Some("application/json")),
            Body::Form(bytes) => (
                PayloadKind::Buffered(bytes),
                Some("application/x-www-form-urlencoded"),
            ),
            Body::Stream(stream) => (PayloadKind::Streaming(Some(stream)), None),
        };

        let kind = match (kind, compression.encoder()) {
            (PayloadKind::Buffered(bytes), Some(_)) if !bytes.is_empty() => PayloadKind::Buffered(
                compression
                    .compress(&bytes)
                    .map_err(HttpError::Compression)?,
            ),
            (PayloadKind::Streaming(Some(stream)), Some(encoder)) => {
                PayloadKind::Streaming(Some(BodyStream {
                    body: EncodedBody::new(stream.body, encoder).boxed_unsync(),
                    len: None,
                }))
            }
            (kind, _) => kind,
        };

        Ok(Self { kind, content_type })
    }

    /// Content-Type to apply when the caller did not choose one.
    pub(crate) fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    /// Explicit length for streamed payloads whose size is known.
    pub(crate) fn stream_length(&self) -> Option<u64> {
        match &self.kind {
            PayloadKind::Streaming(Some(stream)) => stream.len,
            PayloadKind::Empty | PayloadKind::Buffered(_) | PayloadKind::Streaming(None) => None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        match &self.kind {
            PayloadKind::Empty | PayloadKind::Streaming(None) => true,
            PayloadKind::Buffered(bytes) => bytes.is_empty(),
            PayloadKind::Streaming(Some(_)) => false,
        }
    }

    /// Body for the next hop.
    pub(crate) fn next_hop_body(&mut self) -> RequestBody {
        match &mut self.kind {
            PayloadKind::Buffered(bytes) => Full::new(bytes.clone())
                .map_err(|never| match never {})
                .boxed_unsync(),
            PayloadKind::Streaming(stream) => match stream.take() {
                Some(stream) => stream.body,
                None => empty_body(),
            },
            PayloadKind::Empty => empty_body(),
        }
    }
}

pub(crate) fn empty_body() -> RequestBody {
    Empty::new().map_err(|never| match never {}).boxed_unsync()
}

pin_project! {
    /// Compresses a body frame by frame.
    struct EncodedBody<B> {
        #[pin]
        inner: B,
        encoder: Option<Encoder>,
    }
}

impl<B> EncodedBody<B> {
    fn new(inner: B, encoder: Encoder) -> Self {
        Self {
            inner,
            encoder: Some(encoder),
        }
    }
}

impl<B> HttpBody for EncodedBody<B>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let mut this = self.project();
        loop {
            if this.encoder.is_none() {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_frame(cx)) {
                Some(Ok(frame)) => {
                    // trailers cannot be carried through the codec
                    let Ok(data) = frame.into_data() else {
                        continue;
                    };
                    let Some(encoder) = this.encoder.as_mut() else {
                        return Poll::Ready(None);
                    };
                    let out = encoder.push(&data)?;
                    if !out.is_empty() {
                        return Poll::Ready(Some(Ok(Frame::data(out))));
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e.into()))),
                None => {
                    let Some(encoder) = this.encoder.take() else {
                        return Poll::Ready(None);
                    };
                    let tail = encoder.finish()?;
                    if tail.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(Frame::data(tail))));
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.encoder.is_none()
    }
}

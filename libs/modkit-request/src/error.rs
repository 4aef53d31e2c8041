use crate::response::HttpResponse;
use std::time::Duration;
use thiserror::Error;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL has no host component
    MissingHost,
    /// URL scheme is neither `http` nor `https`
    UnsupportedScheme,
}

/// Request layer error types.
///
/// Every variant except [`HttpError::RedirectLimitExceeded`] means no response
/// was produced. Use [`HttpError::is_timeout`] rather than matching on the
/// message to detect either timeout axis.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Invalid URL (failed to parse or unusable for HTTP)
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field contains
    /// a diagnostic message intended for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that failed validation
        url: String,
        /// Structured failure classification for programmatic matching
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// Method token is not a valid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(#[from] http::method::InvalidMethod),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Proxy URL could not be used
    #[error("Invalid proxy '{proxy}': {reason}")]
    InvalidProxy { proxy: String, reason: String },

    /// Request body could not be encoded as JSON
    #[error("Body encoding failed: {0}")]
    Encoding(#[source] serde_json::Error),

    /// Request body could not be encoded as a URL-encoded form
    #[error("Form encoding failed: {0}")]
    FormEncoding(#[from] serde_urlencoded::ser::Error),

    /// Query parameter input is neither a record nor a key/value container
    #[error("Unsupported query parameter input: {0}")]
    UnsupportedType(String),

    /// A value inside query parameter input could not be encoded
    #[error("Query encoding failed: {0}")]
    QueryEncoding(String),

    /// Connection establishment (TCP, proxy tunnel, TLS) exceeded the connect timeout
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Whole-call deadline elapsed (all redirect hops plus body receipt)
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// Connection could not be established (DNS, refused, proxy tunnel rejected)
    #[error("Connection failed: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Transport error after the connection was established
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS configuration error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Redirect limit reached while the latest response was still a redirect.
    ///
    /// The last redirect response is kept and available via
    /// [`HttpError::response`] / [`HttpError::into_response`].
    #[error("Stopped after {max_redirects} redirects")]
    RedirectLimitExceeded {
        max_redirects: usize,
        response: Box<HttpResponse>,
    },

    /// Response stream was aborted through its cancel handle
    #[error("Request canceled")]
    Canceled,

    /// Raw response stream was read after being closed
    #[error("Response body is closed")]
    BodyClosed,

    /// Payload could not be compressed or decompressed
    #[error("Compression stream error: {0}")]
    Compression(#[source] std::io::Error),

    /// JSON parsing error on a response body
    #[error("JSON parsing failed: {0}")]
    Json(#[source] serde_json::Error),

    /// Request could not be assembled
    #[error("Failed to build request: {0}")]
    Build(String),
}

impl HttpError {
    /// Returns `true` for both connect-phase and whole-call timeouts.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            HttpError::ConnectTimeout(_) | HttpError::RequestTimeout(_)
        )
    }

    /// Returns `true` when the failure happened while establishing the connection.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, HttpError::Connect(_) | HttpError::ConnectTimeout(_))
    }

    /// Returns `true` for [`HttpError::RedirectLimitExceeded`].
    #[must_use]
    pub fn is_redirect_limit(&self) -> bool {
        matches!(self, HttpError::RedirectLimitExceeded { .. })
    }

    /// Last redirect response carried by a redirect-limit error.
    #[must_use]
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            HttpError::RedirectLimitExceeded { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Take ownership of the response carried by a redirect-limit error.
    #[must_use]
    pub fn into_response(self) -> Option<HttpResponse> {
        match self {
            HttpError::RedirectLimitExceeded { response, .. } => Some(*response),
            _ => None,
        }
    }
}

impl From<http::Error> for HttpError {
    fn from(err: http::Error) -> Self {
        HttpError::Build(err.to_string())
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<HttpError> for std::io::Error {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::RequestTimeout(_) | HttpError::ConnectTimeout(_) => {
                std::io::Error::new(std::io::ErrorKind::TimedOut, err)
            }
            HttpError::Compression(io) => io,
            other => std::io::Error::other(other),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_connect_error_preserves_source() {
        let err = HttpError::Connect(Box::new(TestError("no such host")));

        let source = err.source().expect("Connect error should have a source");
        let downcast = source.downcast_ref::<TestError>();
        assert_eq!(downcast.map(|e| e.0), Some("no such host"));
        assert!(err.is_connect());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_predicate_covers_both_axes() {
        assert!(HttpError::ConnectTimeout(Duration::from_millis(1000)).is_timeout());
        assert!(HttpError::RequestTimeout(Duration::from_millis(500)).is_timeout());
        assert!(!HttpError::Canceled.is_timeout());
        assert!(!HttpError::Transport(Box::new(TestError("reset"))).is_timeout());
    }

    #[test]
    fn test_non_redirect_errors_carry_no_response() {
        let err = HttpError::BodyClosed;
        assert!(err.response().is_none());
        assert!(!err.is_redirect_limit());
        assert!(err.into_response().is_none());
    }

    #[test]
    fn test_io_conversion_keeps_timeout_kind() {
        let io: std::io::Error = HttpError::RequestTimeout(Duration::from_secs(1)).into();
        assert_eq!(io.kind(), std::io::ErrorKind::TimedOut);

        let io: std::io::Error = HttpError::Canceled.into();
        assert_eq!(io.kind(), std::io::ErrorKind::Other);
    }

    #[test]
    fn test_error_chain_traversal() {
        let err = HttpError::Transport(Box::new(TestError("root cause")));

        let mut count = 0;
        let mut current: Option<&(dyn Error + 'static)> = Some(&err);
        while let Some(e) = current {
            count += 1;
            current = e.source();
        }

        assert_eq!(count, 2, "chain should be HttpError -> TestError");
    }
}

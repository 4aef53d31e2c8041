use std::time::Duration;

/// Default User-Agent header value
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-request/", env!("CARGO_PKG_VERSION"));

/// Default bound on connection establishment (TCP, proxy tunnel and TLS) per hop
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Client-wide configuration.
///
/// Everything that is decided per call (timeouts of the whole call, redirects,
/// proxy, cookies, compression) lives on [`RequestSpec`](crate::RequestSpec)
/// instead.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Bound on connection establishment for every hop (default: 1000 ms)
    ///
    /// Covers DNS, TCP connect, the proxy CONNECT handshake and the TLS
    /// handshake. Expiry surfaces as [`HttpError::ConnectTimeout`](crate::HttpError::ConnectTimeout).
    pub connect_timeout: Duration,

    /// User-Agent sent when a request does not carry its own
    pub user_agent: String,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Timeout for idle connections in the pool (default: 90 seconds)
    ///
    /// Set to `None` to use hyper-util's default idle timeout.
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 32)
    ///
    /// Setting this to `0` disables connection reuse entirely.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Configuration for tests against local fixtures: no connection reuse and
    /// a short connect timeout.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            connect_timeout: Duration::from_millis(500),
            pool_idle_timeout: Some(Duration::from_secs(5)),
            pool_max_idle_per_host: 0,
            ..Self::default()
        }
    }
}

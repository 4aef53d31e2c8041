use crate::builder::{HttpClientBuilder, Transport, build_transport};
use crate::config::HttpClientConfig;
use crate::error::HttpError;
use crate::proxy::ProxyConfig;
use crate::request::{RequestBuilder, RequestSpec};
use crate::response::HttpResponse;
use http::Method;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// HTTP client executing declarative requests.
///
/// Holds the pooled transport and the client-wide configuration. Everything
/// decided per call (redirects, timeout, proxy, cookies, compression) travels
/// with the request.
///
/// # Thread Safety
///
/// `HttpClient` is `Clone + Send + Sync` and cloning is cheap; clones share
/// the connection pool. Store it directly, no `Mutex` needed.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     http: HttpClient,
/// }
///
/// impl MyService {
///     async fn fetch(&self) -> Result<Data, HttpError> {
///         self.http
///             .get("https://example.com/api")
///             .max_redirects(3)
///             .send()
///             .await?
///             .json()
///             .await
///     }
/// }
/// ```
#[derive(Clone)]
pub struct HttpClient {
    config: Arc<HttpClientConfig>,
    transport: Transport,
    /// Built on first use of `insecure(true)`
    insecure: Arc<Mutex<Option<Transport>>>,
}

impl HttpClient {
    pub(crate) fn from_parts(config: Arc<HttpClientConfig>, transport: Transport) -> Self {
        Self {
            config,
            transport,
            insecure: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    #[must_use]
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Create a GET request builder.
    ///
    /// The URL must be absolute with an `http` or `https` scheme and a host;
    /// anything else fails on `send()` with [`HttpError::InvalidUri`].
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn head(&self, url: &str) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Request builder for any method, including extension methods.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(Some(self.clone()), method, url.to_owned())
    }

    /// Execute a request.
    ///
    /// Every HTTP status, 4xx and 5xx included, is an `Ok` response. The one
    /// exception is [`HttpError::RedirectLimitExceeded`], which still carries
    /// the last redirect response.
    ///
    /// # Errors
    /// Invalid input, connection and transport failures, either timeout, and
    /// an exhausted redirect budget.
    pub async fn execute(&self, spec: RequestSpec) -> Result<HttpResponse, HttpError> {
        crate::executor::execute(self, spec).await
    }

    /// Transport for one call.
    ///
    /// A proxied call gets its own connector; insecure calls share a lazily
    /// built transport.
    pub(crate) fn transport(
        &self,
        insecure: bool,
        proxy: Option<ProxyConfig>,
    ) -> Result<Transport, HttpError> {
        if proxy.is_some() {
            return build_transport(&self.config, insecure, proxy);
        }
        if !insecure {
            return Ok(self.transport.clone());
        }

        let mut slot = self.insecure.lock();
        if let Some(transport) = slot.as_ref() {
            return Ok(transport.clone());
        }
        let transport = build_transport(&self.config, true, None)?;
        *slot = Some(transport.clone());
        Ok(transport)
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("insecure_transport", &self.insecure.lock().is_some())
            .finish_non_exhaustive()
    }
}

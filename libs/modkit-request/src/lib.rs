#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Declarative HTTP requests for `ModKit`
//!
//! A request is described once (method, target, query, body, headers,
//! redirects, proxy, cookies, compression, timeout) and executed as one
//! logical call of one or more hops over a pooled hyper transport:
//! - Redirects followed up to a per-call limit, method preserved on every hop
//! - Query strings from any `Serialize` record or key/value container
//! - Optional gzip / deflate / zlib for the request body and the response
//! - Per-hop cookie store updates, Basic auth, HTTP proxies with `CONNECT`
//! - Separate connect-phase and whole-call timeouts, one `is_timeout` check
//! - Cancellable response streams
//!
//! # Conditional Decompression
//!
//! With a codec configured the response is decoded only when its
//! `Content-Encoding` equals the codec token; otherwise the bytes pass through
//! untouched. Check [`ResponseBody::is_decoded`] instead of assuming.
//!
//! # Example
//!
//! ```ignore
//! use modkit_request::{Compression, HttpClient};
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .connect_timeout(Duration::from_millis(500))
//!     .user_agent("my-app/1.0")
//!     .build()?;
//!
//! let data: MyData = client
//!     .get("https://example.com/api")
//!     .query(&Filter { status: "open", page: 2 })
//!     .compression(Compression::Gzip)
//!     .max_redirects(3)
//!     .timeout(Duration::from_secs(10))
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod auth;
mod body;
mod builder;
mod client;
mod compression;
mod config;
mod connect;
mod cookie;
pub mod defaults;
mod error;
mod executor;
mod json;
mod layers;
mod proxy;
mod query;
mod redirect;
mod request;
mod response;
mod tls;

#[cfg(test)]
mod test_support;

pub use auth::BasicAuth;
pub use body::{Body, BodyStream, BoxError, RequestBody};
pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use compression::Compression;
pub use config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_USER_AGENT, HttpClientConfig, TlsRootConfig};
pub use cookie::{Cookie, CookieStore, MemoryCookieJar};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{HopSpanLayer, HopSpanService, UserAgentLayer, UserAgentService};
pub use query::{QueryValues, to_query_string, to_query_values};
pub use redirect::{RedirectAction, RedirectPolicy};
pub use request::{BeforeRequestHook, RequestBuilder, RequestSpec};
pub use response::{CancelHandle, HttpResponse, RawBody, ResponseBody, ResponseReader};

use http::Method;

/// Request builder for any method on the process-wide client.
pub fn request(method: Method, url: &str) -> RequestBuilder {
    RequestBuilder::new(None, method, url.to_owned())
}

/// GET through the process-wide client, see [`defaults`].
pub fn get(url: &str) -> RequestBuilder {
    request(Method::GET, url)
}

pub fn post(url: &str) -> RequestBuilder {
    request(Method::POST, url)
}

pub fn put(url: &str) -> RequestBuilder {
    request(Method::PUT, url)
}

pub fn patch(url: &str) -> RequestBuilder {
    request(Method::PATCH, url)
}

pub fn delete(url: &str) -> RequestBuilder {
    request(Method::DELETE, url)
}

pub fn head(url: &str) -> RequestBuilder {
    request(Method::HEAD, url)
}

//! Cookie storage consulted around every hop.

use http::HeaderMap;
use parking_lot::RwLock;
use std::fmt;
use std::time::{Duration, SystemTime};
use url::Url;

/// Caller-owned cookie storage.
///
/// Implementations must be safe for concurrent use: the executor reads and
/// writes the store from whichever task drives the call.
pub trait CookieStore: Send + Sync {
    /// Record every `Set-Cookie` header of a response received from `url`.
    fn set_cookies(&self, url: &Url, headers: &HeaderMap);

    /// `Cookie` header value for a request to `url`, if any cookie applies.
    fn cookies(&self, url: &Url) -> Option<String>;
}

/// A single cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
    expires: Option<SystemTime>,
}

impl Cookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
            expires: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn http_only(&self) -> bool {
        self.http_only
    }

    /// Parse a `Set-Cookie` header value.
    ///
    /// Returns `None` when the header has no `name=value` pair.
    #[must_use]
    pub fn parse_set_cookie(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim().trim_matches('"'));
        let mut max_age: Option<i64> = None;

        for attr in parts {
            let attr = attr.trim();
            let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
            let val = val.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    cookie.domain = Some(val.trim_start_matches('.').to_ascii_lowercase());
                }
                "path" if val.starts_with('/') => cookie.path = Some(val.to_owned()),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "max-age" => max_age = val.parse().ok(),
                "expires" => cookie.expires = httpdate::parse_http_date(val).ok(),
                _ => {}
            }
        }

        // Max-Age wins over Expires
        if let Some(seconds) = max_age {
            cookie.expires = Some(if seconds <= 0 {
                SystemTime::UNIX_EPOCH
            } else {
                SystemTime::now() + Duration::from_secs(seconds.unsigned_abs())
            });
        }

        Some(cookie)
    }

    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Join explicit cookies into a single `Cookie` header value.
pub(crate) fn join_cookies<'a>(cookies: impl IntoIterator<Item = &'a Cookie>) -> Option<String> {
    let joined = cookies
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if joined.is_empty() { None } else { Some(joined) }
}

#[derive(Debug, Clone)]
struct StoredCookie {
    cookie: Cookie,
    /// No `Domain` attribute: only the exact setting host matches
    host_only: bool,
}

impl StoredCookie {
    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.cookie.name == other.cookie.name
            && self.cookie.domain == other.cookie.domain
            && self.cookie.path == other.cookie.path
    }

    fn matches(&self, url: &Url, now: SystemTime) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let Some(domain) = self.cookie.domain.as_deref() else {
            return false;
        };

        let domain_ok = if self.host_only {
            host.eq_ignore_ascii_case(domain)
        } else {
            host.eq_ignore_ascii_case(domain)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{domain}"))
        };

        let path_ok = path_matches(url.path(), self.cookie.path.as_deref().unwrap_or("/"));
        let secure_ok = !self.cookie.secure || url.scheme() == "https";

        domain_ok && path_ok && secure_ok && !self.cookie.is_expired(now)
    }
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Directory of the request path, used when `Set-Cookie` has no `Path`.
fn default_path(url: &Url) -> String {
    match url.path().rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_owned(),
        _ => "/".to_owned(),
    }
}

/// In-memory, thread-safe cookie jar.
///
/// Share it between calls as `Arc<MemoryCookieJar>`; the same jar observes
/// every hop of every call it is attached to.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    entries: RwLock<Vec<StoredCookie>>,
}

impl MemoryCookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cookie as if `url` had set it.
    ///
    /// A cookie without a domain becomes host-only for `url`'s host; a cookie
    /// without a path applies to the whole host.
    pub fn add_cookie(&self, url: &Url, mut cookie: Cookie) {
        let Some(host) = url.host_str() else {
            return;
        };
        let host_only = cookie.domain.is_none();
        if host_only {
            cookie.domain = Some(host.to_ascii_lowercase());
        }
        if cookie.path.is_none() {
            cookie.path = Some("/".to_owned());
        }
        self.upsert(StoredCookie { cookie, host_only });
    }

    /// Cookies that would be sent to `url`, in storage order.
    #[must_use]
    pub fn cookies_for(&self, url: &Url) -> Vec<Cookie> {
        let now = SystemTime::now();
        self.entries
            .read()
            .iter()
            .filter(|stored| stored.matches(url, now))
            .map(|stored| stored.cookie.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn upsert(&self, stored: StoredCookie) {
        let mut entries = self.entries.write();
        entries.retain(|existing| !existing.same_slot(&stored));
        if !stored.cookie.is_expired(SystemTime::now()) {
            entries.push(stored);
        }
    }
}

impl CookieStore for MemoryCookieJar {
    fn set_cookies(&self, url: &Url, headers: &HeaderMap) {
        let Some(host) = url.host_str() else {
            return;
        };
        let host = host.to_ascii_lowercase();

        for header in headers.get_all(http::header::SET_COOKIE) {
            let Some(mut cookie) = header.to_str().ok().and_then(Cookie::parse_set_cookie) else {
                tracing::warn!(url = %url, "ignoring malformed Set-Cookie header");
                continue;
            };

            let host_only = match cookie.domain.as_deref() {
                None => true,
                Some(domain) if host == domain || host.ends_with(&format!(".{domain}")) => false,
                Some(domain) => {
                    tracing::warn!(url = %url, domain, "ignoring Set-Cookie for foreign domain");
                    continue;
                }
            };
            if host_only {
                cookie.domain = Some(host.clone());
            }
            if cookie.path.is_none() {
                cookie.path = Some(default_path(url));
            }

            tracing::debug!(url = %url, name = %cookie.name, "storing response cookie");
            self.upsert(StoredCookie { cookie, host_only });
        }
    }

    fn cookies(&self, url: &Url) -> Option<String> {
        join_cookies(&self.cookies_for(url))
    }
}

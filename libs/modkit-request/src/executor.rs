//! The hop loop: turns a [`RequestSpec`] into a response.
//!
//! Each call is one logical operation of one or more hops. Every hop is an
//! independent request through the client's transport; the redirect policy
//! decides after each hop whether another one follows. The whole-call
//! timeout spans all hops and keeps running into the response body.

use crate::auth::BasicAuth;
use crate::body::{Payload, RequestBody};
use crate::builder::Transport;
use crate::client::HttpClient;
use crate::compression::Compression;
use crate::connect::classify_client_error;
use crate::cookie::{CookieStore, join_cookies};
use crate::error::{HttpError, InvalidUriKind};
use crate::layers::HopIndex;
use crate::proxy::ProxyConfig;
use crate::redirect::{RedirectAction, RedirectPolicy};
use crate::request::{BeforeRequestHook, RequestSpec};
use crate::response::{Deadline, HttpResponse};
use http::header::{
    ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE,
    COOKIE, HOST, HeaderName, PROXY_AUTHORIZATION, USER_AGENT,
};
use http::{HeaderMap, HeaderValue, Method, Request, Uri};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

/// A validated call, ready to produce hops.
pub(crate) struct Prepared {
    method: Method,
    url: Url,
    /// Headers of the original request, re-attached on redirect hops only
    /// when `redirect_headers` is set
    caller_headers: HeaderMap,
    payload: Payload,
    compression: Compression,
    cookie_store: Option<Arc<dyn CookieStore>>,
    redirect_headers: bool,
    policy: RedirectPolicy,
    timeout: Option<Duration>,
    insecure: bool,
    proxy: Option<ProxyConfig>,
    proxy_authorization: Option<HeaderValue>,
    hook: Option<BeforeRequestHook>,
}

impl Prepared {
    /// Validate and encode everything that can fail before the network.
    pub(crate) fn new(spec: RequestSpec) -> Result<Self, HttpError> {
        let mut url = parse_target(&spec.uri)?;
        if let Some(query) = &spec.query {
            query.append_to(&mut url);
        }

        let mut headers = spec.headers;
        replace_header(&mut headers, CONTENT_TYPE, spec.content_type.as_deref())?;
        replace_header(&mut headers, ACCEPT, spec.accept.as_deref())?;
        replace_header(&mut headers, USER_AGENT, spec.user_agent.as_deref())?;
        replace_header(&mut headers, HOST, spec.host.as_deref())?;
        if let Some(auth) = spec.basic_auth.as_ref().and_then(BasicAuth::header_value) {
            headers.insert(AUTHORIZATION, auth);
        }
        if let Some(cookies) = join_cookies(&spec.cookies) {
            append_cookie(&mut headers, &cookies)?;
        }

        let proxy = spec
            .proxy
            .as_deref()
            .map(|proxy| ProxyConfig::parse(proxy, spec.proxy_connect_headers))
            .transpose()?;
        let proxy_authorization = proxy
            .as_ref()
            .and_then(|proxy| proxy.authorization().cloned());

        Ok(Self {
            method: spec.method.unwrap_or(Method::GET),
            url,
            caller_headers: headers,
            payload: Payload::encode(spec.body, spec.compression)?,
            compression: spec.compression,
            cookie_store: spec.cookie_store,
            redirect_headers: spec.redirect_headers,
            policy: RedirectPolicy::new(spec.max_redirects),
            timeout: spec.timeout,
            insecure: spec.insecure,
            proxy,
            proxy_authorization,
            hook: spec.on_before_request,
        })
    }

    /// Build the request for hop number `hop` against the current URL.
    pub(crate) fn hop_request(&mut self, hop: usize) -> Result<Request<RequestBody>, HttpError> {
        let mut headers = if hop == 0 || self.redirect_headers {
            self.caller_headers.clone()
        } else {
            HeaderMap::new()
        };
        // later hops take their Host from the hop URL
        if hop > 0 {
            headers.remove(HOST);
        }

        if let Some(token) = self.compression.token() {
            let token = HeaderValue::from_static(token);
            headers.insert(CONTENT_ENCODING, token.clone());
            headers.insert(ACCEPT_ENCODING, token);
        }

        if !self.payload.is_empty() {
            if let Some(content_type) = self.payload.content_type()
                && !headers.contains_key(CONTENT_TYPE)
            {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            if let Some(len) = self.payload.stream_length() {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
            }
        }

        if let Some(store) = &self.cookie_store
            && let Some(cookies) = store.cookies(&self.url)
        {
            append_cookie(&mut headers, &cookies)?;
        }

        // https targets authenticate on the CONNECT handshake instead
        if self.url.scheme() == "http"
            && let Some(auth) = &self.proxy_authorization
        {
            headers.insert(PROXY_AUTHORIZATION, auth.clone());
        }

        let mut req = Request::builder()
            .method(self.method.clone())
            .uri(to_uri(&self.url)?)
            .body(self.payload.next_hop_body())?;
        *req.headers_mut() = headers;
        req.extensions_mut().insert(HopIndex(hop));

        if hop == 0
            && let Some(hook) = &self.hook
        {
            hook(&mut req);
        }

        Ok(req)
    }

    async fn run(
        mut self,
        transport: Transport,
        deadline: Option<Deadline>,
    ) -> Result<HttpResponse, HttpError> {
        let mut hop = 0;
        loop {
            let req = self.hop_request(hop)?;
            let response = transport
                .clone()
                .oneshot(req)
                .await
                .map_err(classify_client_error)?;

            if let Some(store) = &self.cookie_store {
                store.set_cookies(&self.url, response.headers());
            }

            match self
                .policy
                .evaluate(hop, response.status(), response.headers(), &self.url)
            {
                RedirectAction::Follow(next) => {
                    self.url = check_target(next)?;
                    hop += 1;
                }
                RedirectAction::Stop => {
                    return Ok(HttpResponse::new(
                        response,
                        self.url,
                        self.compression,
                        deadline,
                    ));
                }
                RedirectAction::LimitReached => {
                    let max_redirects = self.policy.max_redirects();
                    let response =
                        HttpResponse::new(response, self.url, self.compression, deadline);
                    return Err(HttpError::RedirectLimitExceeded {
                        max_redirects,
                        response: Box::new(response),
                    });
                }
            }
        }
    }
}

/// Execute `spec` through `client`.
pub(crate) async fn execute(
    client: &HttpClient,
    spec: RequestSpec,
) -> Result<HttpResponse, HttpError> {
    let mut prepared = Prepared::new(spec)?;
    let transport = client.transport(prepared.insecure, prepared.proxy.take())?;

    match prepared.timeout {
        Some(timeout) => {
            let deadline = Deadline::after(timeout);
            tokio::time::timeout_at(deadline.at, prepared.run(transport, Some(deadline)))
                .await
                .map_err(|_| HttpError::RequestTimeout(timeout))?
        }
        None => prepared.run(transport, None).await,
    }
}

fn invalid_uri(url: &str, kind: InvalidUriKind, reason: impl Into<String>) -> HttpError {
    HttpError::InvalidUri {
        url: url.to_owned(),
        kind,
        reason: reason.into(),
    }
}

fn parse_target(raw: &str) -> Result<Url, HttpError> {
    let url = Url::parse(raw)
        .map_err(|e| invalid_uri(raw, InvalidUriKind::ParseError, e.to_string()))?;
    check_target(url)
}

/// Only absolute `http`/`https` URLs with a host can be sent.
fn check_target(url: Url) -> Result<Url, HttpError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid_uri(
            url.as_str(),
            InvalidUriKind::UnsupportedScheme,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid_uri(
            url.as_str(),
            InvalidUriKind::MissingHost,
            "URL has no host",
        ));
    }
    Ok(url)
}

fn to_uri(url: &Url) -> Result<Uri, HttpError> {
    let mut url = url.clone();
    url.set_fragment(None);
    Uri::try_from(url.as_str())
        .map_err(|e| invalid_uri(url.as_str(), InvalidUriKind::ParseError, e.to_string()))
}

fn replace_header(
    headers: &mut HeaderMap,
    name: HeaderName,
    value: Option<&str>,
) -> Result<(), HttpError> {
    if let Some(value) = value {
        headers.insert(name, HeaderValue::from_str(value)?);
    }
    Ok(())
}

/// Merge `cookies` into the single `Cookie` header.
fn append_cookie(headers: &mut HeaderMap, cookies: &str) -> Result<(), HttpError> {
    let merged = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}; {cookies}"),
        _ => cookies.to_owned(),
    };
    headers.insert(COOKIE, HeaderValue::from_str(&merged)?);
    Ok(())
}

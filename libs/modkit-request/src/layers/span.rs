use http::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;

/// Position of a request inside its redirect chain, carried as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HopIndex(pub(crate) usize);

/// Tower layer that wraps every hop in a `tracing` span.
///
/// Span fields:
/// - `http.method`
/// - `url.full`: scheme, authority and path; the query is left out
/// - `redirect.hop`: zero-based hop number
/// - `http.status_code`: recorded once the response head arrives
#[derive(Clone, Copy, Debug, Default)]
pub struct HopSpanLayer;

impl HopSpanLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for HopSpanLayer {
    type Service = HopSpanService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HopSpanService { inner }
    }
}

#[derive(Clone, Debug)]
pub struct HopSpanService<S> {
    inner: S,
}

impl<S, B, ResBody> Service<Request<B>> for HopSpanService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send + 'static,
    B: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let uri = req.uri();
        let url = format!(
            "{}://{}{}",
            uri.scheme_str().unwrap_or("http"),
            uri.authority().map_or("", http::uri::Authority::as_str),
            uri.path()
        );
        let hop = req.extensions().get::<HopIndex>().map_or(0, |h| h.0);

        let span = tracing::debug_span!(
            "http_hop",
            http.method = %req.method(),
            url.full = %url,
            redirect.hop = hop,
            http.status_code = tracing::field::Empty,
        );

        // Call the instance that was poll_ready'd; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let result = inner.call(req).instrument(span.clone()).await;
            if let Ok(response) = &result {
                span.record("http.status_code", response.status().as_u16());
            }
            result
        })
    }
}

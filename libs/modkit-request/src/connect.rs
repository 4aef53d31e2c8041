//! Connect-phase deadline for the connector chain.

use crate::body::BoxError;
use crate::error::HttpError;
use http::Uri;
use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tower::Service;

/// Marker error produced when connection establishment overruns its deadline.
#[derive(Debug, Error)]
#[error("connect timed out after {0:?}")]
pub(crate) struct ConnectTimedOut(pub(crate) Duration);

/// Bounds the whole connect phase of the wrapped connector: DNS, TCP, proxy
/// tunnel and TLS handshake all count against one deadline.
#[derive(Clone, Debug)]
pub(crate) struct TimeoutConnector<C> {
    inner: C,
    timeout: Duration,
}

impl<C> TimeoutConnector<C> {
    pub(crate) fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<C> Service<Uri> for TimeoutConnector<C>
where
    C: Service<Uri>,
    C::Response: Send + 'static,
    C::Future: Send + 'static,
    C::Error: Into<BoxError>,
{
    type Response = C::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<C::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let timeout = self.timeout;
        let connecting = self.inner.call(dst);
        Box::pin(async move {
            match tokio::time::timeout(timeout, connecting).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(Box::new(ConnectTimedOut(timeout)) as BoxError),
            }
        })
    }
}

/// Find a [`ConnectTimedOut`] anywhere in the source chain.
fn find_connect_timeout(err: &(dyn StdError + 'static)) -> Option<Duration> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(ConnectTimedOut(d)) = e.downcast_ref::<ConnectTimedOut>() {
            return Some(*d);
        }
        current = e.source();
    }
    None
}

/// Classify a pooled-client failure into the public error type.
pub(crate) fn classify_client_error(err: hyper_util::client::legacy::Error) -> HttpError {
    if let Some(timeout) = find_connect_timeout(&err) {
        return HttpError::ConnectTimeout(timeout);
    }
    if err.is_connect() {
        HttpError::Connect(Box::new(err))
    } else {
        HttpError::Transport(Box::new(err))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_pending_connect_times_out() {
        let never = tower::service_fn(|_dst: Uri| async {
            futures::future::pending::<Result<(), io::Error>>().await
        });
        let connector = TimeoutConnector::new(never, Duration::from_millis(50));

        let err = connector
            .oneshot(Uri::from_static("http://10.255.255.1/"))
            .await
            .unwrap_err();

        assert_eq!(find_connect_timeout(&*err), Some(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_fast_connect_passes_through() {
        let ready = tower::service_fn(|dst: Uri| async move { Ok::<_, io::Error>(dst.to_string()) });
        let connector = TimeoutConnector::new(ready, Duration::from_secs(5));

        let out = connector
            .oneshot(Uri::from_static("http://localhost/"))
            .await
            .unwrap();
        assert_eq!(out, "http://localhost/");
    }

    #[tokio::test]
    async fn test_inner_error_is_not_a_timeout() {
        let failing = tower::service_fn(|_dst: Uri| async {
            Err::<(), _>(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        });
        let connector = TimeoutConnector::new(failing, Duration::from_secs(5));

        let err = connector
            .oneshot(Uri::from_static("http://localhost/"))
            .await
            .unwrap_err();
        assert!(find_connect_timeout(&*err).is_none());
        assert!(err.downcast_ref::<io::Error>().is_some());
    }

    #[test]
    fn test_timeout_found_through_wrapping() {
        #[derive(Debug, Error)]
        #[error("wrapped")]
        struct Wrapper(#[source] BoxError);

        let wrapped = Wrapper(Box::new(ConnectTimedOut(Duration::from_secs(1))));
        assert_eq!(find_connect_timeout(&wrapped), Some(Duration::from_secs(1)));
    }
}

//! Redirect decisions for the hop loop.
//!
//! The method is never rewritten and targets resolve against the hop that
//! produced them. The hop count is the only limit.

use http::{HeaderMap, StatusCode, header};
use url::Url;

/// What to do with a hop's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectAction {
    /// Send the next hop to this absolute URL.
    Follow(Url),
    /// Hand the response to the caller as the final one.
    Stop,
    /// Still a redirect, but no hops are left.
    LimitReached,
}

/// Decides whether a hop's response is chased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedirectPolicy {
    max_redirects: usize,
}

impl RedirectPolicy {
    /// Follow at most `max_redirects` hops; `0` never follows.
    #[must_use]
    pub fn new(max_redirects: usize) -> Self {
        Self { max_redirects }
    }

    /// Policy that returns every response as-is.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0)
    }

    #[must_use]
    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// 301, 302, 303, 307 and 308.
    #[must_use]
    pub fn is_redirect_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::MOVED_PERMANENTLY
                | StatusCode::FOUND
                | StatusCode::SEE_OTHER
                | StatusCode::TEMPORARY_REDIRECT
                | StatusCode::PERMANENT_REDIRECT
        )
    }

    /// Evaluate the response of a hop.
    ///
    /// `followed` is the number of redirects already chased in this call and
    /// `current` the URL the response came from.
    #[must_use]
    pub fn evaluate(
        &self,
        followed: usize,
        status: StatusCode,
        headers: &HeaderMap,
        current: &Url,
    ) -> RedirectAction {
        if self.max_redirects == 0 || !Self::is_redirect_status(status) {
            return RedirectAction::Stop;
        }
        if followed >= self.max_redirects {
            tracing::debug!(
                max_redirects = self.max_redirects,
                status = status.as_u16(),
                "redirect limit reached"
            );
            return RedirectAction::LimitReached;
        }

        let Some(location) = headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
        else {
            tracing::debug!(status = status.as_u16(), "redirect without usable Location");
            return RedirectAction::Stop;
        };

        match current.join(location) {
            Ok(next) => {
                tracing::debug!(
                    status = status.as_u16(),
                    from = %current,
                    to = %next,
                    hop = followed + 1,
                    "following redirect"
                );
                RedirectAction::Follow(next)
            }
            Err(e) => {
                tracing::warn!(location, error = %e, "ignoring unresolvable redirect target");
                RedirectAction::Stop
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn location(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static(value));
        headers
    }

    fn base() -> Url {
        Url::parse("http://example.com/a/b?x=1").unwrap()
    }

    #[test]
    fn test_zero_never_follows() {
        let policy = RedirectPolicy::none();
        for status in [301u16, 302, 303, 307, 308] {
            let status = StatusCode::from_u16(status).unwrap();
            assert_eq!(
                policy.evaluate(0, status, &location("/next"), &base()),
                RedirectAction::Stop
            );
        }
    }

    #[test]
    fn test_relative_and_absolute_targets() {
        let policy = RedirectPolicy::new(5);

        let action = policy.evaluate(0, StatusCode::FOUND, &location("c"), &base());
        assert_eq!(
            action,
            RedirectAction::Follow(Url::parse("http://example.com/a/c").unwrap())
        );

        let action = policy.evaluate(0, StatusCode::FOUND, &location("/root"), &base());
        assert_eq!(
            action,
            RedirectAction::Follow(Url::parse("http://example.com/root").unwrap())
        );

        let action = policy.evaluate(
            0,
            StatusCode::TEMPORARY_REDIRECT,
            &location("https://other.example/z"),
            &base(),
        );
        assert_eq!(
            action,
            RedirectAction::Follow(Url::parse("https://other.example/z").unwrap())
        );
    }

    #[test]
    fn test_limit_reached_only_while_still_redirecting() {
        let policy = RedirectPolicy::new(2);
        assert_eq!(
            policy.evaluate(2, StatusCode::SEE_OTHER, &location("/n"), &base()),
            RedirectAction::LimitReached
        );
        assert_eq!(
            policy.evaluate(2, StatusCode::OK, &HeaderMap::new(), &base()),
            RedirectAction::Stop
        );
    }

    #[test]
    fn test_non_redirect_statuses_stop() {
        let policy = RedirectPolicy::new(3);
        for status in [200u16, 204, 300, 304, 401, 500] {
            let status = StatusCode::from_u16(status).unwrap();
            assert_eq!(
                policy.evaluate(0, status, &location("/next"), &base()),
                RedirectAction::Stop,
                "{status}"
            );
        }
    }

    #[test]
    fn test_missing_location_stops() {
        let policy = RedirectPolicy::new(3);
        assert_eq!(
            policy.evaluate(0, StatusCode::MOVED_PERMANENTLY, &HeaderMap::new(), &base()),
            RedirectAction::Stop
        );
    }
}

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;
use std::fmt;

/// Basic-scheme credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// `Authorization` value, or `None` when the username is empty.
    pub(crate) fn header_value(&self) -> Option<HeaderValue> {
        if self.username.is_empty() {
            return None;
        }
        Some(basic_header(&self.username, &self.password))
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `Basic base64(user:password)`, marked sensitive.
pub(crate) fn basic_header(username: &str, password: &str) -> HeaderValue {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    // base64 output is always a valid header value
    let mut value = HeaderValue::try_from(format!("Basic {encoded}"))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
    value.set_sensitive(true);
    value
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header_encoding() {
        let value = basic_header("username", "password");
        assert_eq!(value, "Basic dXNlcm5hbWU6cGFzc3dvcmQ=");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_empty_password_is_allowed() {
        let auth = BasicAuth::new("user", "");
        assert_eq!(auth.header_value().unwrap(), "Basic dXNlcjo=");
    }

    #[test]
    fn test_empty_username_adds_nothing() {
        assert!(BasicAuth::new("", "secret").header_value().is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", BasicAuth::new("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}

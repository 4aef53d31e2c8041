//! Process-wide defaults for the free request functions.
//!
//! Last write wins. Code that owns an [`HttpClient`] should thread it through
//! explicitly; these settings only back [`RequestSpec::send`] and the free
//! functions such as [`crate::get`].
//!
//! [`RequestSpec::send`]: crate::RequestSpec::send

use crate::builder::HttpClientBuilder;
use crate::client::HttpClient;
use crate::config::{DEFAULT_CONNECT_TIMEOUT, HttpClientConfig};
use crate::error::HttpError;
use parking_lot::RwLock;
use std::sync::LazyLock;
use std::time::Duration;

static CONNECT_TIMEOUT: LazyLock<RwLock<Duration>> =
    LazyLock::new(|| RwLock::new(DEFAULT_CONNECT_TIMEOUT));

static CLIENT: LazyLock<RwLock<Slot>> = LazyLock::new(|| RwLock::new(Slot::Empty));

enum Slot {
    Empty,
    /// Built lazily from the process-wide settings
    Built(HttpClient),
    /// Installed through [`set_default_client`]
    Installed(HttpClient),
}

impl Slot {
    fn client(&self) -> Option<&HttpClient> {
        match self {
            Slot::Empty => None,
            Slot::Built(client) | Slot::Installed(client) => Some(client),
        }
    }
}

/// Connect timeout of the process-wide client.
///
/// A client built earlier with the old value is dropped, so the next call
/// uses the new timeout. A client installed with [`set_default_client`] is
/// kept as is.
pub fn set_default_connect_timeout(timeout: Duration) {
    *CONNECT_TIMEOUT.write() = timeout;
    let mut slot = CLIENT.write();
    if matches!(*slot, Slot::Built(_)) {
        *slot = Slot::Empty;
    }
}

#[must_use]
pub fn default_connect_timeout() -> Duration {
    *CONNECT_TIMEOUT.read()
}

/// Replace the process-wide client.
///
/// The installed client keeps its own connect timeout until
/// [`reset_default_client`].
pub fn set_default_client(client: HttpClient) {
    *CLIENT.write() = Slot::Installed(client);
}

/// The process-wide client, built on first use.
///
/// # Errors
/// Returns an error if the client cannot be built (TLS initialization).
pub fn default_client() -> Result<HttpClient, HttpError> {
    if let Some(client) = CLIENT.read().client() {
        return Ok(client.clone());
    }

    let mut slot = CLIENT.write();
    if let Some(client) = slot.client() {
        return Ok(client.clone());
    }
    let config = HttpClientConfig {
        connect_timeout: default_connect_timeout(),
        ..HttpClientConfig::default()
    };
    let client = HttpClientBuilder::with_config(config).build()?;
    tracing::debug!(
        connect_timeout_ms = client.config().connect_timeout.as_millis(),
        "built default HTTP client"
    );
    *slot = Slot::Built(client.clone());
    Ok(client)
}

/// Drop the process-wide client and restore the default connect timeout.
pub fn reset_default_client() {
    *CONNECT_TIMEOUT.write() = DEFAULT_CONNECT_TIMEOUT;
    *CLIENT.write() = Slot::Empty;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Serializes tests touching the process-wide state.
    static GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_client_is_cached() {
        let _guard = GUARD.lock();
        reset_default_client();

        let first = default_client().unwrap();
        let second = default_client().unwrap();
        assert_eq!(first.config().connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(std::ptr::eq(first.config(), second.config()));

        reset_default_client();
    }

    #[test]
    fn test_connect_timeout_applies_to_next_client() {
        let _guard = GUARD.lock();
        reset_default_client();

        let _ = default_client().unwrap();
        set_default_connect_timeout(Duration::from_millis(250));
        assert_eq!(default_connect_timeout(), Duration::from_millis(250));

        let client = default_client().unwrap();
        assert_eq!(client.config().connect_timeout, Duration::from_millis(250));

        reset_default_client();
        assert_eq!(default_connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_set_default_client_wins() {
        let _guard = GUARD.lock();
        reset_default_client();

        let custom = HttpClientBuilder::new()
            .user_agent("process-wide/1.0")
            .build()
            .unwrap();
        set_default_client(custom);
        assert_eq!(default_client().unwrap().config().user_agent, "process-wide/1.0");

        reset_default_client();
        assert_ne!(default_client().unwrap().config().user_agent, "process-wide/1.0");
        reset_default_client();
    }

    #[test]
    fn test_connect_timeout_keeps_installed_client() {
        let _guard = GUARD.lock();
        reset_default_client();

        let custom = HttpClientBuilder::new()
            .user_agent("installed/1.0")
            .connect_timeout(Duration::from_millis(400))
            .build()
            .unwrap();
        set_default_client(custom);
        set_default_connect_timeout(Duration::from_millis(250));

        let client = default_client().unwrap();
        assert_eq!(client.config().user_agent, "installed/1.0");
        assert_eq!(client.config().connect_timeout, Duration::from_millis(400));

        reset_default_client();
        assert_eq!(
            default_client().unwrap().config().connect_timeout,
            DEFAULT_CONNECT_TIMEOUT
        );
        reset_default_client();
    }
}

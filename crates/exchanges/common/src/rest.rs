use reqwest::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;
use tradesync_core::ExchangeError;

/// Per-request timeout applied to every exchange client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client an adapter owns. Performs no network I/O.
pub fn http_client() -> reqwest::Client {
    build_or_default(
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("tradesync/", env!("CARGO_PKG_VERSION"))),
    )
}

fn build_or_default(builder: reqwest::ClientBuilder) -> reqwest::Client {
    match builder.build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "HTTP client configuration rejected, using reqwest defaults");
            reqwest::Client::new()
        }
    }
}

/// Map a reqwest failure (no response received) onto the exchange taxonomy.
pub fn transport_error(err: reqwest::Error) -> ExchangeError {
    if err.is_timeout() {
        ExchangeError::Network(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        ExchangeError::Network(format!("Connection failed: {}", err))
    } else if err.is_decode() {
        ExchangeError::BadResponse(err.to_string())
    } else {
        ExchangeError::Network(err.to_string())
    }
}

/// Classify an HTTP status for which the exchange sent no error payload we
/// could read. Returns `None` for success statuses.
///
/// A bare 403 (CDN, geo block, proxy) is not the exchange's permission
/// verdict; only the exchange's own error vocabulary yields `PermissionDenied`.
pub fn status_error(status: StatusCode, body: &str) -> Option<ExchangeError> {
    if status.is_success() {
        return None;
    }
    let detail = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    Some(match status {
        StatusCode::UNAUTHORIZED => ExchangeError::Authentication(detail),
        StatusCode::FORBIDDEN => ExchangeError::Unavailable(detail),
        StatusCode::TOO_MANY_REQUESTS => ExchangeError::RateLimited(detail),
        s if s.is_server_error() => ExchangeError::Unavailable(detail),
        _ => ExchangeError::Exchange(detail),
    })
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Millisecond nonces that never repeat or go backwards within one client.
#[derive(Debug, Default)]
pub struct NonceSource {
    last: AtomicU64,
}

impl NonceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = now_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(current) => last = current,
            }
        }
    }
}

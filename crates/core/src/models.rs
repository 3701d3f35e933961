use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::traits::AdapterError;

// ---------------------------------------------------------------------------
// Exchange identity
// ---------------------------------------------------------------------------

/// The exchanges an adapter exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeName {
    Kraken,
    Bitstamp,
}

impl ExchangeName {
    pub const ALL: [ExchangeName; 2] = [ExchangeName::Kraken, ExchangeName::Bitstamp];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeName::Kraken => "kraken",
            ExchangeName::Bitstamp => "bitstamp",
        }
    }
}

impl fmt::Display for ExchangeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kraken" => Ok(ExchangeName::Kraken),
            "bitstamp" => Ok(ExchangeName::Bitstamp),
            other => Err(format!("unknown exchange: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// API key/secret pair for one exchange account.
///
/// Supplied by the caller's credential store. Adapters only read it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    exchange: ExchangeName,
    api_key: String,
    api_secret: String,
}

impl Credential {
    /// Build a credential, checking only that key and secret are present.
    pub fn new(
        exchange: ExchangeName,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        if api_key.trim().is_empty() {
            return Err(AdapterError::MissingCredential("api_key"));
        }
        if api_secret.trim().is_empty() {
            return Err(AdapterError::MissingCredential("api_secret"));
        }
        Ok(Self {
            exchange,
            api_key,
            api_secret,
        })
    }

    pub fn exchange(&self) -> ExchangeName {
        self.exchange
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// The key with everything past the first four characters hidden, for logs.
    pub fn masked_key(&self) -> String {
        let visible: String = self.api_key.chars().take(4).collect();
        format!("{}****", visible)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("exchange", &self.exchange)
            .field("api_key", &self.masked_key())
            .field("api_secret", &"****")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Adapter settings
// ---------------------------------------------------------------------------

/// Order in which an exchange returns closed orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDirection {
    Asc,
    Desc,
}

/// Per-exchange pacing and paging constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterSettings {
    /// Minimum wait between two consecutive requests.
    pub rate_limit: Duration,
    /// Page size; a shorter page means the source is exhausted.
    pub fetch_limit: usize,
    pub fetch_direction: FetchDirection,
}

// ---------------------------------------------------------------------------
// Sync window & cursor
// ---------------------------------------------------------------------------

/// Inclusive date range of orders to retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AdapterError> {
        if start > end {
            return Err(AdapterError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }
}

/// Offset pagination position. Page numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub offset: usize,
    pub page: u32,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self { offset: 0, page: 1 }
    }
}

impl PageCursor {
    /// Move past a page that held `received` entries.
    pub fn advance(&mut self, received: usize) {
        self.offset += received;
        self.page += 1;
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// A closed order as the exchange reported it.
///
/// `payload` is the exchange-native record and is never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub datetime: DateTime<Utc>,
    pub exchange: ExchangeName,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_exchange_name_parse() {
        assert_eq!("Kraken".parse::<ExchangeName>(), Ok(ExchangeName::Kraken));
        assert_eq!(" bitstamp ".parse::<ExchangeName>(), Ok(ExchangeName::Bitstamp));
        assert!("binance".parse::<ExchangeName>().is_err());
    }

    #[test]
    fn test_credential_requires_key_and_secret() {
        let err = Credential::new(ExchangeName::Kraken, "", "secret").unwrap_err();
        assert!(matches!(err, AdapterError::MissingCredential("api_key")));

        let err = Credential::new(ExchangeName::Kraken, "key", "  ").unwrap_err();
        assert!(matches!(err, AdapterError::MissingCredential("api_secret")));
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let cred = Credential::new(ExchangeName::Bitstamp, "abcdefgh", "topsecret").unwrap();
        let debug = format!("{:?}", cred);
        assert!(debug.contains("abcd****"));
        assert!(!debug.contains("efgh"));
        assert!(!debug.contains("topsecret"));
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(SyncWindow::new(start, end).is_err());
        // A single instant is a valid window
        assert!(SyncWindow::new(start, start).is_ok());
    }

    #[test]
    fn test_cursor_advance() {
        let mut cursor = PageCursor::default();
        assert_eq!(cursor, PageCursor { offset: 0, page: 1 });
        cursor.advance(50);
        cursor.advance(50);
        assert_eq!(cursor, PageCursor { offset: 100, page: 3 });
    }
}

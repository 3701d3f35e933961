use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Exchange errors
// ---------------------------------------------------------------------------

/// How a caller should read an exchange failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Authentication,
    PermissionDenied,
    Unexpected,
}

/// A failure reported by an exchange client, already classified.
///
/// Each client maps its raw error vocabulary into these variants, so nothing
/// downstream ever matches on exchange-specific strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Exchange not available: {0}")]
    Unavailable(String),
    #[error("Bad response: {0}")]
    BadResponse(String),
    #[error("Exchange error: {0}")]
    Exchange(String),
}

impl ExchangeError {
    /// Stable identifier used in logs and wrapped error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ExchangeError::Authentication(_) => "AuthenticationError",
            ExchangeError::PermissionDenied(_) => "PermissionDenied",
            ExchangeError::RateLimited(_) => "RateLimitExceeded",
            ExchangeError::Network(_) => "NetworkError",
            ExchangeError::Unavailable(_) => "ExchangeNotAvailable",
            ExchangeError::BadResponse(_) => "BadResponse",
            ExchangeError::Exchange(_) => "ExchangeError",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ExchangeError::Authentication(_) => ErrorClass::Authentication,
            ExchangeError::PermissionDenied(_) => ErrorClass::PermissionDenied,
            _ => ErrorClass::Unexpected,
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter errors
// ---------------------------------------------------------------------------

/// Fatal, caller-visible failures of an adapter operation.
///
/// A rejected credential is never one of these: validation reports it as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{operation} failed with an unexpected {} ({source})", .source.name())]
    Exchange {
        operation: &'static str,
        source: ExchangeError,
    },
    #[error("Sync of {exchange} orders aborted at page {page} (offset {offset}): {} ({source})", .source.name())]
    SyncAborted {
        exchange: ExchangeName,
        page: u32,
        offset: usize,
        source: ExchangeError,
    },
    #[error("Sync cancelled before page {page} (offset {offset})")]
    Cancelled { page: u32, offset: usize },
    #[error("{operation} is not supported by {exchange}")]
    Unsupported {
        exchange: ExchangeName,
        operation: &'static str,
    },
    #[error("Missing credential field: {0}")]
    MissingCredential(&'static str),
    #[error("Invalid sync window: start {start} is after end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// Exchange Adapter Trait
// ---------------------------------------------------------------------------

/// One exchange account, seen through a uniform validation and sync surface.
///
/// An adapter is built from a [`Credential`] without touching the network.
/// It owns its REST client; `sync_orders` takes `&mut self` so a single
/// instance never runs two syncs at once.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Which exchange this adapter talks to.
    fn name(&self) -> ExchangeName;

    /// Pacing and paging constants from the exchange's published limits.
    fn settings(&self) -> AdapterSettings;

    /// Whether `sync_orders` is implemented.
    fn supports_sync(&self) -> bool {
        false
    }

    /// Send one cheap authenticated request.
    ///
    /// `Ok(false)` means the exchange rejected the credential.
    async fn validate_credentials(&self) -> Result<bool, AdapterError>;

    /// Probe a sensitive endpoint (balances) that a read-only key must not reach.
    ///
    /// `Ok(true)` means the exchange refused with a permission error.
    async fn validate_credential_limitations(&self) -> Result<bool, AdapterError>;

    /// Fetch every closed order in `window`, honoring the rate limit.
    async fn sync_orders(
        &mut self,
        _window: SyncWindow,
        _cancel: CancellationToken,
    ) -> Result<Vec<Order>, AdapterError> {
        Err(AdapterError::Unsupported {
            exchange: self.name(),
            operation: "sync_orders",
        })
    }
}

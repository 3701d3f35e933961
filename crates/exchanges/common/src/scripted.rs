use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tradesync_core::*;

use crate::paginate::{PageSource, PaginatedSync};

/// A request the scripted exchange received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub cursor: PageCursor,
    pub limit: usize,
    /// Tokio clock reading, so paused-time tests can check pacing.
    pub at: Instant,
}

/// An in-memory exchange that replays a fixed list of page responses.
///
/// Once the script runs out every further request gets an empty page.
pub struct ScriptedExchange {
    exchange: ExchangeName,
    pages: Mutex<VecDeque<Result<Vec<Order>, ExchangeError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedExchange {
    pub fn new(exchange: ExchangeName) -> Self {
        Self {
            exchange,
            pages: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue the response for the next request.
    pub fn with_page(mut self, page: Result<Vec<Order>, ExchangeError>) -> Self {
        self.pages.get_mut().push_back(page);
        self
    }

    pub fn exchange(&self) -> ExchangeName {
        self.exchange
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PageSource for ScriptedExchange {
    async fn fetch_page(
        &self,
        _window: &SyncWindow,
        cursor: PageCursor,
        limit: usize,
    ) -> Result<Vec<Order>, ExchangeError> {
        self.requests.lock().await.push(RecordedRequest {
            cursor,
            limit,
            at: Instant::now(),
        });
        self.pages.lock().await.pop_front().unwrap_or(Ok(Vec::new()))
    }
}

/// Build `count` synthetic orders numbered from `start_index`.
pub fn sample_orders(exchange: ExchangeName, start_index: usize, count: usize) -> Vec<Order> {
    // 2024-01-01T00:00:00Z
    let base = DateTime::<Utc>::UNIX_EPOCH + ChronoDuration::seconds(1_704_067_200);
    (start_index..start_index + count)
        .map(|i| {
            let id = format!("O{:06}", i);
            Order {
                id: id.clone(),
                datetime: base + ChronoDuration::minutes(i as i64),
                exchange,
                payload: serde_json::json!({ "txid": id, "status": "closed" }),
            }
        })
        .collect()
}

/// A full adapter over a [`ScriptedExchange`], with fixed probe outcomes.
///
/// Lets callers of the adapter contract run without network access.
pub struct ScriptedAdapter {
    source: ScriptedExchange,
    settings: AdapterSettings,
    credential_probe: Result<(), ExchangeError>,
    limitation_probe: Result<(), ExchangeError>,
    reject_on: RejectOn,
    sync_enabled: bool,
}

impl ScriptedAdapter {
    /// A well-behaved read-only account: credentials work, balances are denied.
    pub fn new(source: ScriptedExchange) -> Self {
        Self {
            source,
            settings: AdapterSettings {
                rate_limit: Duration::from_millis(1000),
                fetch_limit: 50,
                fetch_direction: FetchDirection::Asc,
            },
            credential_probe: Ok(()),
            limitation_probe: Err(ExchangeError::PermissionDenied(
                "balance access denied".to_string(),
            )),
            reject_on: RejectOn::AuthenticationOrPermission,
            sync_enabled: true,
        }
    }

    pub fn with_settings(mut self, settings: AdapterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_credential_probe(mut self, outcome: Result<(), ExchangeError>) -> Self {
        self.credential_probe = outcome;
        self
    }

    pub fn with_limitation_probe(mut self, outcome: Result<(), ExchangeError>) -> Self {
        self.limitation_probe = outcome;
        self
    }

    pub fn with_reject_on(mut self, reject_on: RejectOn) -> Self {
        self.reject_on = reject_on;
        self
    }

    /// Behave like an adapter that only validates credentials.
    pub fn without_sync(mut self) -> Self {
        self.sync_enabled = false;
        self
    }

    pub fn source(&self) -> &ScriptedExchange {
        &self.source
    }
}

#[async_trait]
impl ExchangeAdapter for ScriptedAdapter {
    fn name(&self) -> ExchangeName {
        self.source.exchange()
    }

    fn settings(&self) -> AdapterSettings {
        self.settings
    }

    fn supports_sync(&self) -> bool {
        self.sync_enabled
    }

    async fn validate_credentials(&self) -> Result<bool, AdapterError> {
        interpret_credential_probe(self.credential_probe.clone(), self.reject_on)
    }

    async fn validate_credential_limitations(&self) -> Result<bool, AdapterError> {
        interpret_limitation_probe(self.limitation_probe.clone())
    }

    async fn sync_orders(
        &mut self,
        window: SyncWindow,
        cancel: CancellationToken,
    ) -> Result<Vec<Order>, AdapterError> {
        if !self.sync_enabled {
            return Err(AdapterError::Unsupported {
                exchange: self.name(),
                operation: "sync_orders",
            });
        }
        PaginatedSync::new(&self.source, self.name(), self.settings)
            .run(&window, &cancel)
            .await
    }
}

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use tradesync_core::*;

/// An exchange endpoint that serves closed orders by offset.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch up to `limit` closed orders of `window` (trade details included)
    /// starting at `cursor.offset`.
    async fn fetch_page(
        &self,
        window: &SyncWindow,
        cursor: PageCursor,
        limit: usize,
    ) -> Result<Vec<Order>, ExchangeError>;
}

/// Offset-paginated, rate-paced fetch of a sync window.
///
/// Requests run strictly one after another. After a full page the loop waits
/// `settings.rate_limit` before asking for the next one; the first short page
/// (an empty one included) ends the sync. A failed request aborts the whole
/// sync and the pages gathered so far are dropped.
pub struct PaginatedSync<'a, S: PageSource + ?Sized> {
    source: &'a S,
    exchange: ExchangeName,
    settings: AdapterSettings,
}

impl<'a, S: PageSource + ?Sized> PaginatedSync<'a, S> {
    pub fn new(source: &'a S, exchange: ExchangeName, settings: AdapterSettings) -> Self {
        Self {
            source,
            exchange,
            settings,
        }
    }

    pub async fn run(
        &self,
        window: &SyncWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<Order>, AdapterError> {
        let limit = self.settings.fetch_limit;
        let mut cursor = PageCursor::default();
        let mut accumulated: Vec<Order> = Vec::new();

        info!(
            exchange = %self.exchange,
            start = %window.start,
            end = %window.end,
            fetch_limit = limit,
            "Starting paginated order sync"
        );

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(cursor));
            }

            debug!(
                exchange = %self.exchange,
                page = cursor.page,
                offset = cursor.offset,
                "Fetching orders page"
            );
            let page = self
                .source
                .fetch_page(window, cursor, limit)
                .await
                .map_err(|source| {
                    tracing::error!(
                        exchange = %self.exchange,
                        page = cursor.page,
                        offset = cursor.offset,
                        error = %source,
                        "Order page request failed"
                    );
                    AdapterError::SyncAborted {
                        exchange: self.exchange,
                        page: cursor.page,
                        offset: cursor.offset,
                        source,
                    }
                })?;

            let received = page.len();
            if let (Some(first), Some(last)) = (page.first(), page.last()) {
                trace!(first_id = %first.id, last_id = %last.id, "Page bounds");
            }
            accumulated.extend(page);

            info!(
                exchange = %self.exchange,
                page = cursor.page,
                offset = cursor.offset,
                received,
                total = accumulated.len(),
                "Fetched orders page"
            );

            if received == 0 || received < limit {
                break;
            }

            cursor.advance(received);

            debug!(
                exchange = %self.exchange,
                sleep_ms = self.settings.rate_limit.as_millis() as u64,
                "Pacing before next page"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(cursor)),
                _ = tokio::time::sleep(self.settings.rate_limit) => {}
            }
        }

        info!(
            exchange = %self.exchange,
            orders = accumulated.len(),
            pages = cursor.page,
            "Order sync complete"
        );
        Ok(accumulated)
    }

    fn cancelled(&self, cursor: PageCursor) -> AdapterError {
        info!(
            exchange = %self.exchange,
            page = cursor.page,
            offset = cursor.offset,
            "Order sync cancelled"
        );
        AdapterError::Cancelled {
            page: cursor.page,
            offset: cursor.offset,
        }
    }
}

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tradesync_core::*;
use tradesync_exchanges_common::{PageSource, PaginatedSync};

use crate::client::KrakenClient;

/// Kraken's published limits: https://docs.kraken.com/rest/#section/Rate-Limits
/// `ClosedOrders` pages are fixed at 50 entries, newest first.
pub const KRAKEN_SETTINGS: AdapterSettings = AdapterSettings {
    rate_limit: Duration::from_millis(3000),
    fetch_limit: 50,
    fetch_direction: FetchDirection::Desc,
};

/// Kraken adapter: credential checks plus closed-order sync.
pub struct KrakenAdapter {
    credential: Credential,
    client: KrakenClient,
    settings: AdapterSettings,
}

impl KrakenAdapter {
    pub fn new(credential: Credential) -> Self {
        let client = KrakenClient::new(&credential);
        Self {
            credential,
            client,
            settings: KRAKEN_SETTINGS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    #[cfg(test)]
    fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.settings.rate_limit = rate_limit;
        self
    }
}

#[async_trait]
impl PageSource for KrakenClient {
    async fn fetch_page(
        &self,
        window: &SyncWindow,
        cursor: PageCursor,
        _limit: usize,
    ) -> Result<Vec<Order>, ExchangeError> {
        self.closed_orders(window.start, window.end, cursor.offset)
            .await?
            .into_orders()
    }
}

#[async_trait]
impl ExchangeAdapter for KrakenAdapter {
    fn name(&self) -> ExchangeName {
        ExchangeName::Kraken
    }

    fn settings(&self) -> AdapterSettings {
        self.settings
    }

    fn supports_sync(&self) -> bool {
        true
    }

    async fn validate_credentials(&self) -> Result<bool, AdapterError> {
        // Keys without websocket access answer with a permission error
        interpret_credential_probe(
            self.client.websockets_token().await,
            RejectOn::AuthenticationOrPermission,
        )
    }

    async fn validate_credential_limitations(&self) -> Result<bool, AdapterError> {
        interpret_limitation_probe(self.client.balance().await)
    }

    async fn sync_orders(
        &mut self,
        window: SyncWindow,
        cancel: CancellationToken,
    ) -> Result<Vec<Order>, AdapterError> {
        info!(key = %self.credential.masked_key(), exchange = %self.name(), "[START] Sync orders");
        let orders = PaginatedSync::new(&self.client, self.name(), self.settings)
            .run(&window, &cancel)
            .await?;
        info!(key = %self.credential.masked_key(), exchange = %self.name(), orders = orders.len(), "[END] Sync orders");
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use serde_json::json;

    const SECRET: &str = "c2VjcmV0LWtleS1ieXRlcw=="; // "secret-key-bytes"

    fn adapter(server: &mockito::Server) -> KrakenAdapter {
        let credential = Credential::new(ExchangeName::Kraken, "test-key", SECRET).unwrap();
        KrakenAdapter::new(credential).with_base_url(server.url())
    }

    fn window() -> SyncWindow {
        SyncWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn closed_page(from: usize, count: usize) -> String {
        let mut closed = serde_json::Map::new();
        for i in from..from + count {
            closed.insert(
                format!("O{:05}-KRKN-TEST", i),
                json!({ "status": "closed", "opentm": 1_704_067_200.0 + i as f64, "trades": [] }),
            );
        }
        json!({ "error": [], "result": { "closed": closed, "count": 53 } }).to_string()
    }

    fn error_body(error: &str) -> String {
        json!({ "error": [error] }).to_string()
    }

    #[tokio::test]
    async fn test_validate_credentials_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/0/private/GetWebSocketsToken")
            .match_header("API-Key", "test-key")
            .match_header("API-Sign", Matcher::Any)
            .match_body(Matcher::Regex("^nonce=[0-9]+$".to_string()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":[],"result":{"token":"abc","expires":900}}"#)
            .create_async()
            .await;

        assert!(adapter(&server).validate_credentials().await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_validate_credentials_invalid_key() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/0/private/GetWebSocketsToken")
            .with_body(error_body("EAPI:Invalid key"))
            .create_async()
            .await;

        assert!(!adapter(&server).validate_credentials().await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_credentials_permission_denied_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/0/private/GetWebSocketsToken")
            .with_body(error_body("EGeneral:Permission denied"))
            .create_async()
            .await;

        assert!(!adapter(&server).validate_credentials().await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_credentials_outage_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/0/private/GetWebSocketsToken")
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let err = adapter(&server).validate_credentials().await.unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Exchange {
                operation: "validate_credentials",
                source: ExchangeError::Unavailable(_),
            }
        ));
    }

    #[tokio::test]
    async fn test_limitations_balance_denied_is_good() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/0/private/Balance")
            .with_body(error_body("EGeneral:Permission denied"))
            .create_async()
            .await;

        assert!(adapter(&server).validate_credential_limitations().await.unwrap());
    }

    #[tokio::test]
    async fn test_limitations_balance_visible_is_bad() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/0/private/Balance")
            .with_body(r#"{"error":[],"result":{"ZUSD":"171288.6158","XXBT":"0.0011"}}"#)
            .create_async()
            .await;

        assert!(!adapter(&server).validate_credential_limitations().await.unwrap());
    }

    #[tokio::test]
    async fn test_limitations_bare_forbidden_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/0/private/Balance")
            .with_status(403)
            .with_header("content-type", "text/html")
            .with_body("<html><title>Access denied | api.kraken.com used Cloudflare</title></html>")
            .create_async()
            .await;

        let err = adapter(&server).validate_credential_limitations().await.unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Exchange {
                operation: "validate_credential_limitations",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_limitations_other_error_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/0/private/Balance")
            .with_body(error_body("EAPI:Invalid nonce"))
            .create_async()
            .await;

        assert!(adapter(&server).validate_credential_limitations().await.is_err());
    }

    #[tokio::test]
    async fn test_sync_orders_pages_by_offset() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/0/private/ClosedOrders")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("trades".into(), "true".into()),
                Matcher::UrlEncoded("start".into(), "1704067199.999".into()),
                Matcher::UrlEncoded("end".into(), "1706745600".into()),
                Matcher::UrlEncoded("ofs".into(), "0".into()),
            ]))
            .with_body(closed_page(0, 50))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/0/private/ClosedOrders")
            .match_body(Matcher::UrlEncoded("ofs".into(), "50".into()))
            .with_body(closed_page(50, 3))
            .expect(1)
            .create_async()
            .await;

        let mut kraken = adapter(&server).with_rate_limit(Duration::from_millis(5));
        let orders = kraken
            .sync_orders(window(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(orders.len(), 53);
        assert_eq!(orders[0].id, "O00000-KRKN-TEST");
        assert_eq!(orders[52].id, "O00052-KRKN-TEST");
        assert!(orders.iter().all(|o| o.exchange == ExchangeName::Kraken));
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_sync_orders_aborts_on_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/0/private/ClosedOrders")
            .match_body(Matcher::UrlEncoded("ofs".into(), "0".into()))
            .with_body(closed_page(0, 50))
            .create_async()
            .await;
        server
            .mock("POST", "/0/private/ClosedOrders")
            .match_body(Matcher::UrlEncoded("ofs".into(), "50".into()))
            .with_body(error_body("EAPI:Rate limit exceeded"))
            .create_async()
            .await;

        let mut kraken = adapter(&server).with_rate_limit(Duration::from_millis(5));
        let err = kraken
            .sync_orders(window(), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            AdapterError::SyncAborted {
                page,
                offset,
                source: ExchangeError::RateLimited(_),
                ..
            } => {
                assert_eq!(page, 2);
                assert_eq!(offset, 50);
            }
            other => panic!("Expected SyncAborted, got {:?}", other),
        }
    }

    #[test]
    fn test_settings() {
        let credential = Credential::new(ExchangeName::Kraken, "k", SECRET).unwrap();
        let kraken = KrakenAdapter::new(credential);
        assert_eq!(kraken.settings().rate_limit, Duration::from_millis(3000));
        assert_eq!(kraken.settings().fetch_limit, 50);
        assert!(kraken.supports_sync());
    }
}

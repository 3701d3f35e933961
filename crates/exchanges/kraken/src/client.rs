use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;
use tradesync_core::{Credential, ExchangeError};
use tradesync_exchanges_common::rest::{http_client, status_error, transport_error, NonceSource};

use crate::protocol::*;

pub const KRAKEN_REST_URL: &str = "https://api.kraken.com";

const WEBSOCKETS_TOKEN_PATH: &str = "/0/private/GetWebSocketsToken";
const BALANCE_PATH: &str = "/0/private/Balance";
const CLOSED_ORDERS_PATH: &str = "/0/private/ClosedOrders";

/// Signed client for Kraken's private REST endpoints.
///
/// Owned by exactly one adapter. Building it performs no network I/O.
pub struct KrakenClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    nonces: NonceSource,
}

impl KrakenClient {
    pub fn new(credential: &Credential) -> Self {
        Self {
            http: http_client(),
            base_url: KRAKEN_REST_URL.to_string(),
            api_key: credential.api_key().to_string(),
            api_secret: credential.api_secret().to_string(),
            nonces: NonceSource::new(),
        }
    }

    /// Point the client at another host (sandbox or test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `API-Sign` header value:
    /// base64(HMAC-SHA512(base64decode(secret), path + SHA256(nonce + postdata))).
    pub fn sign(&self, path: &str, nonce: u64, postdata: &str) -> Result<String, ExchangeError> {
        let secret = STANDARD.decode(self.api_secret.trim()).map_err(|_| {
            ExchangeError::Authentication("API secret is not valid base64".to_string())
        })?;

        let mut sha256 = Sha256::new();
        sha256.update(nonce.to_string().as_bytes());
        sha256.update(postdata.as_bytes());
        let digest = sha256.finalize();

        let mut message = path.as_bytes().to_vec();
        message.extend_from_slice(&digest);

        let mut mac = Hmac::<Sha512>::new_from_slice(&secret)
            .map_err(|e| ExchangeError::Authentication(format!("Unusable API secret: {}", e)))?;
        mac.update(&message);
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn post_private<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T, ExchangeError> {
        let nonce = self.nonces.next();
        let mut form = vec![("nonce", nonce.to_string())];
        form.extend(params);
        let postdata = serde_urlencoded::to_string(&form)
            .map_err(|e| ExchangeError::Exchange(format!("Could not encode request: {}", e)))?;
        let signature = self.sign(path, nonce, &postdata)?;

        debug!(path, "Kraken private request");
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("API-Key", &self.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .body(postdata)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        match serde_json::from_str::<KrakenResponse>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(parse_err) => Err(status_error(status, &body).unwrap_or_else(|| {
                ExchangeError::BadResponse(format!("Unparsable Kraken response: {}", parse_err))
            })),
        }
    }

    /// Cheap authenticated call used to check a credential.
    pub async fn websockets_token(&self) -> Result<WebSocketsToken, ExchangeError> {
        self.post_private(WEBSOCKETS_TOKEN_PATH, Vec::new()).await
    }

    /// Account balances; a read-only key must be refused here.
    pub async fn balance(&self) -> Result<serde_json::Map<String, serde_json::Value>, ExchangeError> {
        self.post_private(BALANCE_PATH, Vec::new()).await
    }

    /// One page of closed orders (Kraken serves at most 50 per call), trades included.
    ///
    /// Both bounds are inclusive. Kraken's `start` is exclusive, so it is sent
    /// one millisecond early.
    pub async fn closed_orders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        offset: usize,
    ) -> Result<ClosedOrders, ExchangeError> {
        let params = vec![
            ("trades", "true".to_string()),
            ("start", unix_seconds(start - ChronoDuration::milliseconds(1))),
            ("end", unix_seconds(end)),
            ("ofs", offset.to_string()),
        ];
        self.post_private(CLOSED_ORDERS_PATH, params).await
    }
}

/// Kraken takes seconds, fractional part allowed.
fn unix_seconds(dt: DateTime<Utc>) -> String {
    (dt.timestamp_millis() as f64 / 1000.0).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tradesync_core::ExchangeName;

    #[test]
    fn test_sign_matches_documented_example() {
        // Example from Kraken's REST authentication guide
        let credential = Credential::new(
            ExchangeName::Kraken,
            "key",
            "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==",
        )
        .unwrap();
        let client = KrakenClient::new(&credential);
        let signature = client
            .sign(
                "/0/private/AddOrder",
                1616492376594,
                "nonce=1616492376594&ordertype=limit&pair=XBTUSD&price=37500&type=buy&volume=1.25",
            )
            .unwrap();
        assert_eq!(
            signature,
            "4/dpxb3iT4tp/ZCVEwSnEsLxx0bqyhLpdfOpc6fn7OR8+UClSV5n9E6aSS8MPtnRfp32bAb0nmbRn6H8ndwLUQ=="
        );
    }

    #[test]
    fn test_sign_rejects_non_base64_secret() {
        let credential = Credential::new(ExchangeName::Kraken, "key", "not base64!").unwrap();
        let client = KrakenClient::new(&credential);
        assert!(matches!(
            client.sign("/0/private/Balance", 1, "nonce=1"),
            Err(ExchangeError::Authentication(_))
        ));
    }

    #[test]
    fn test_unix_seconds() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(unix_seconds(dt), "1704067200");
        let dt = Utc.timestamp_millis_opt(1_704_067_200_500).unwrap();
        assert_eq!(unix_seconds(dt), "1704067200.5");
    }
}

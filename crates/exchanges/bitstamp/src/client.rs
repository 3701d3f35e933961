use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;
use tradesync_core::{Credential, ExchangeError};
use tradesync_exchanges_common::rest::{http_client, now_millis, status_error, transport_error};
use url::Url;
use uuid::Uuid;

use crate::protocol::*;

pub const BITSTAMP_REST_URL: &str = "https://www.bitstamp.net";

const WEBSOCKETS_TOKEN_PATH: &str = "/api/v2/websockets_token/";
const ACCOUNT_BALANCES_PATH: &str = "/api/v2/account_balances/";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Client for Bitstamp's private v2 REST API (`X-Auth` header signing).
pub struct BitstampClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl BitstampClient {
    pub fn new(credential: &Credential) -> Self {
        Self {
            http: http_client(),
            base_url: BITSTAMP_REST_URL.to_string(),
            api_key: credential.api_key().to_string(),
            api_secret: credential.api_secret().to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Uppercase hex HMAC-SHA256 over the v2 signature message.
    ///
    /// The message is the concatenation of `"BITSTAMP " + key`, the method,
    /// `host[:port]`, path, query, content type (empty without a body),
    /// nonce, timestamp, `"v2"` and the body.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        content_type: &str,
        nonce: &str,
        timestamp: u64,
        body: &str,
    ) -> Result<String, ExchangeError> {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ExchangeError::Exchange(format!("URL has no host: {}", url)));
            }
        };
        let message = format!(
            "BITSTAMP {}{}{}{}{}{}{}{}v2{}",
            self.api_key,
            method,
            host,
            url.path(),
            url.query().unwrap_or_default(),
            content_type,
            nonce,
            timestamp,
            body
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Authentication(format!("Unusable API secret: {}", e)))?;
        mac.update(message.as_bytes());
        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }

    async fn post_private<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ExchangeError::Exchange(format!("Invalid Bitstamp URL: {}", e)))?;
        let body = if form.is_empty() {
            String::new()
        } else {
            serde_urlencoded::to_string(form)
                .map_err(|e| ExchangeError::Exchange(format!("Could not encode request: {}", e)))?
        };
        let content_type = if body.is_empty() { "" } else { FORM_CONTENT_TYPE };
        let nonce = Uuid::new_v4().to_string();
        let timestamp = now_millis();
        let signature = self.sign("POST", &url, content_type, &nonce, timestamp, &body)?;

        debug!(path, "Bitstamp private request");
        let mut request = self
            .http
            .post(url)
            .header("X-Auth", format!("BITSTAMP {}", self.api_key))
            .header("X-Auth-Signature", signature)
            .header("X-Auth-Nonce", nonce)
            .header("X-Auth-Timestamp", timestamp.to_string())
            .header("X-Auth-Version", "v2");
        if !body.is_empty() {
            request = request.header("Content-Type", content_type).body(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(parse_err) => {
                return Err(status_error(status, &text).unwrap_or_else(|| {
                    ExchangeError::BadResponse(format!("Unparsable Bitstamp response: {}", parse_err))
                }));
            }
        };
        if let Some(error) = BitstampErrorBody::detect(&value) {
            return Err(error.classify());
        }
        if let Some(error) = status_error(status, &text) {
            return Err(error);
        }
        serde_json::from_value(value)
            .map_err(|e| ExchangeError::BadResponse(format!("Unexpected Bitstamp result: {}", e)))
    }

    /// Cheap authenticated call used to check a credential.
    pub async fn websockets_token(&self) -> Result<WebSocketsToken, ExchangeError> {
        self.post_private(WEBSOCKETS_TOKEN_PATH, &[]).await
    }

    /// Balances of every currency; a read-only key must be refused here.
    pub async fn account_balances(&self) -> Result<Vec<AccountBalance>, ExchangeError> {
        self.post_private(ACCOUNT_BALANCES_PATH, &[]).await
    }
}

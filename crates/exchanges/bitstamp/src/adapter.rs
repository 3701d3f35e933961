use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use tradesync_core::*;

use crate::client::BitstampClient;

/// Bitstamp request limits: https://www.bitstamp.net/api/#section/Request-limits
/// (400 requests per second, capped at 10,000 every 10 minutes).
pub const BITSTAMP_SETTINGS: AdapterSettings = AdapterSettings {
    rate_limit: Duration::from_millis(1000),
    fetch_limit: 1000,
    fetch_direction: FetchDirection::Asc,
};

/// Bitstamp adapter. Validates credentials only; order sync is not offered.
pub struct BitstampAdapter {
    credential: Credential,
    client: BitstampClient,
}

impl BitstampAdapter {
    pub fn new(credential: Credential) -> Self {
        let client = BitstampClient::new(&credential);
        Self { credential, client }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }
}

#[async_trait]
impl ExchangeAdapter for BitstampAdapter {
    fn name(&self) -> ExchangeName {
        ExchangeName::Bitstamp
    }

    fn settings(&self) -> AdapterSettings {
        BITSTAMP_SETTINGS
    }

    async fn validate_credentials(&self) -> Result<bool, AdapterError> {
        debug!(key = %self.credential.masked_key(), "Probing Bitstamp credential");
        interpret_credential_probe(self.client.websockets_token().await, RejectOn::Authentication)
    }

    async fn validate_credential_limitations(&self) -> Result<bool, AdapterError> {
        debug!(key = %self.credential.masked_key(), "Probing Bitstamp balance access");
        interpret_limitation_probe(self.client.account_balances().await)
    }
}

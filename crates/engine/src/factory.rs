use tradesync_core::*;
use tradesync_exchanges_bitstamp::{BitstampAdapter, BITSTAMP_SETTINGS};
use tradesync_exchanges_kraken::{KrakenAdapter, KRAKEN_SETTINGS};

/// Build the adapter for the credential's exchange. No network I/O.
pub fn build_adapter(credential: Credential) -> Box<dyn ExchangeAdapter> {
    match credential.exchange() {
        ExchangeName::Kraken => Box::new(KrakenAdapter::new(credential)),
        ExchangeName::Bitstamp => Box::new(BitstampAdapter::new(credential)),
    }
}

/// What an exchange offers, without needing a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeInfo {
    pub name: ExchangeName,
    pub settings: AdapterSettings,
    pub supports_sync: bool,
}

pub fn supported_exchanges() -> Vec<ExchangeInfo> {
    ExchangeName::ALL
        .iter()
        .map(|&name| match name {
            ExchangeName::Kraken => ExchangeInfo {
                name,
                settings: KRAKEN_SETTINGS,
                supports_sync: true,
            },
            ExchangeName::Bitstamp => ExchangeInfo {
                name,
                settings: BITSTAMP_SETTINGS,
                supports_sync: false,
            },
        })
        .collect()
}

//! Kraken exchange adapter.
//!
//! Signed REST calls against Kraken's private API: `GetWebSocketsToken` to
//! check a credential, `Balance` to confirm it is scope-restricted, and
//! offset-paginated `ClosedOrders` for sync.

pub mod adapter;
pub mod client;
pub mod protocol;

pub use adapter::{KrakenAdapter, KRAKEN_SETTINGS};
pub use client::KrakenClient;

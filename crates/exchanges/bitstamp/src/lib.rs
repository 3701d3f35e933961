//! Bitstamp exchange adapter.
//!
//! Credential checks over Bitstamp's v2 REST API. Order sync is not offered
//! for this exchange and reports `AdapterError::Unsupported`.

pub mod adapter;
pub mod client;
pub mod protocol;

pub use adapter::{BitstampAdapter, BITSTAMP_SETTINGS};
pub use client::BitstampClient;

pub mod factory;
pub mod report;
pub mod service;

pub use factory::{build_adapter, supported_exchanges, ExchangeInfo};
pub use report::{SyncReport, SyncSummary};
pub use service::{AccountResult, CredentialCheck, EngineError, SyncJob, SyncService};

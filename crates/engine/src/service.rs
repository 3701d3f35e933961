use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, trace, warn};
use tradesync_core::*;

use crate::report::SyncReport;

/// Verdict of the two-phase credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialCheck {
    /// Authenticates and cannot read balances.
    Accepted,
    /// The exchange refused the credential.
    Rejected,
    /// Authenticates but can read balances, so it must not be stored.
    OverlyPermissive,
}

impl CredentialCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CredentialCheck::Accepted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialCheck::Accepted => "accepted",
            CredentialCheck::Rejected => "rejected",
            CredentialCheck::OverlyPermissive => "overly-permissive",
        }
    }
}

impl fmt::Display for CredentialCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("Credential not accepted: {0}")]
    CredentialRefused(CredentialCheck),
    #[error("Sync task for account {account} did not complete: {reason}")]
    TaskFailed { account: String, reason: String },
}

/// One account to sync. The job owns its adapter outright.
pub struct SyncJob {
    pub account: String,
    pub adapter: Box<dyn ExchangeAdapter>,
    /// Run the two-phase credential check first and skip the sync unless accepted.
    pub validate_first: bool,
}

impl SyncJob {
    pub fn new(account: impl Into<String>, adapter: Box<dyn ExchangeAdapter>) -> Self {
        Self {
            account: account.into(),
            adapter,
            validate_first: false,
        }
    }

    pub fn validated(mut self) -> Self {
        self.validate_first = true;
        self
    }
}

#[derive(Debug)]
pub struct AccountResult {
    pub account: String,
    pub exchange: ExchangeName,
    pub outcome: Result<SyncReport, EngineError>,
}

/// Drives adapters through registration and sync, optionally reporting
/// progress on an [`AccountEvent`] channel.
///
/// Holds no per-account state, so one service can serve many accounts
/// concurrently.
#[derive(Debug, Clone, Default)]
pub struct SyncService {
    events: Option<mpsc::Sender<AccountEvent>>,
}

impl SyncService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report progress on `events`. A full or closed channel drops the event.
    pub fn with_events(events: mpsc::Sender<AccountEvent>) -> Self {
        Self {
            events: Some(events),
        }
    }

    fn emit(&self, account: &str, exchange: ExchangeName, kind: AccountEventKind) {
        if let Some(tx) = &self.events {
            let event = AccountEvent {
                account: account.to_string(),
                exchange,
                kind,
            };
            if let Err(e) = tx.try_send(event) {
                trace!(account, error = %e, "Dropped account event");
            }
        }
    }

    /// Two-phase credential check. The balance probe only runs once the
    /// credential itself has been accepted.
    pub async fn register(
        &self,
        account: &str,
        adapter: &dyn ExchangeAdapter,
    ) -> Result<CredentialCheck, AdapterError> {
        let exchange = adapter.name();
        info!(account, %exchange, "Validating credential");

        let check = match Self::check_credential(adapter).await {
            Ok(check) => check,
            Err(err) => {
                warn!(account, %exchange, error = %err, "Credential validation failed");
                self.emit(account, exchange, AccountEventKind::Failed { error: err.to_string() });
                return Err(err);
            }
        };

        let kind = match check {
            CredentialCheck::Accepted => AccountEventKind::Validated,
            CredentialCheck::Rejected => AccountEventKind::Rejected,
            CredentialCheck::OverlyPermissive => AccountEventKind::OverlyPermissive,
        };
        self.emit(account, exchange, kind);
        info!(account, %exchange, result = %check, "Credential check complete");
        Ok(check)
    }

    async fn check_credential(adapter: &dyn ExchangeAdapter) -> Result<CredentialCheck, AdapterError> {
        if !adapter.validate_credentials().await? {
            return Ok(CredentialCheck::Rejected);
        }
        if !adapter.validate_credential_limitations().await? {
            return Ok(CredentialCheck::OverlyPermissive);
        }
        Ok(CredentialCheck::Accepted)
    }

    /// Sync one account. Adapters without sync support are refused before any I/O.
    pub async fn sync(
        &self,
        account: &str,
        adapter: &mut dyn ExchangeAdapter,
        window: SyncWindow,
        cancel: CancellationToken,
    ) -> Result<SyncReport, AdapterError> {
        let exchange = adapter.name();
        if !adapter.supports_sync() {
            let err = AdapterError::Unsupported {
                exchange,
                operation: "sync_orders",
            };
            self.emit(account, exchange, AccountEventKind::Failed { error: err.to_string() });
            return Err(err);
        }

        self.emit(account, exchange, AccountEventKind::SyncStarted { window });
        let started = Instant::now();

        match adapter.sync_orders(window, cancel).await {
            Ok(orders) => {
                let report = SyncReport {
                    exchange,
                    window,
                    orders,
                    elapsed: started.elapsed(),
                };
                info!(
                    account,
                    %exchange,
                    orders = report.order_count(),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Account synced"
                );
                self.emit(
                    account,
                    exchange,
                    AccountEventKind::Synced {
                        orders: report.order_count(),
                    },
                );
                Ok(report)
            }
            Err(err) => {
                warn!(account, %exchange, error = %err, "Account sync failed");
                self.emit(account, exchange, AccountEventKind::Failed { error: err.to_string() });
                Err(err)
            }
        }
    }

    /// Sync many accounts at once, one task per job.
    ///
    /// Jobs share nothing but the cancellation token; a failing job leaves the
    /// others untouched. Results come back in job order.
    pub async fn sync_accounts(
        &self,
        jobs: Vec<SyncJob>,
        window: SyncWindow,
        cancel: CancellationToken,
    ) -> Vec<AccountResult> {
        info!(accounts = jobs.len(), "Starting account sync");

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let account = job.account.clone();
            let exchange = job.adapter.name();
            let service = self.clone();
            let cancel = cancel.clone();
            let handle = tokio::spawn(async move { service.run_job(job, window, cancel).await });
            handles.push((account, exchange, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (account, exchange, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(account = %account, %exchange, error = %e, "Sync task aborted");
                    Err(EngineError::TaskFailed {
                        account: account.clone(),
                        reason: e.to_string(),
                    })
                }
            };
            results.push(AccountResult {
                account,
                exchange,
                outcome,
            });
        }

        let synced = results.iter().filter(|r| r.outcome.is_ok()).count();
        info!(synced, failed = results.len() - synced, "Account sync finished");
        results
    }

    async fn run_job(
        &self,
        job: SyncJob,
        window: SyncWindow,
        cancel: CancellationToken,
    ) -> Result<SyncReport, EngineError> {
        let SyncJob {
            account,
            mut adapter,
            validate_first,
        } = job;

        if validate_first {
            let check = self.register(&account, adapter.as_ref()).await?;
            if !check.is_accepted() {
                return Err(EngineError::CredentialRefused(check));
            }
        }

        Ok(self.sync(&account, adapter.as_mut(), window, cancel).await?)
    }
}

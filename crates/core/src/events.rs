use crate::models::*;
use serde::{Deserialize, Serialize};

/// Progress of one account through registration and sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEvent {
    /// Caller-chosen label for the account (e.g. user id or config name).
    pub account: String,
    pub exchange: ExchangeName,
    pub kind: AccountEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AccountEventKind {
    /// Both validation phases passed.
    Validated,
    /// The exchange rejected the credential.
    Rejected,
    /// The credential can see balances and should not be stored.
    OverlyPermissive,
    SyncStarted { window: SyncWindow },
    Synced { orders: usize },
    Failed { error: String },
}

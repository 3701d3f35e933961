//! Account list for `tradesync run`.
//!
//! ```toml
//! [[accounts]]
//! name = "desk-kraken"
//! exchange = "kraken"
//! api_key_env = "DESK_KRAKEN_KEY"
//! api_secret_env = "DESK_KRAKEN_SECRET"
//! validate = true
//! ```
//!
//! Secrets never live in the file, only the names of the environment
//! variables holding them.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tradesync_core::{Credential, ExchangeName};

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub exchange: ExchangeName,
    pub api_key_env: String,
    pub api_secret_env: String,
    /// Run the credential check before syncing.
    #[serde(default)]
    pub validate: bool,
}

impl AccountsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: AccountsConfig = toml::from_str(raw)?;
        if config.accounts.is_empty() {
            bail!("No accounts configured");
        }
        let mut seen = std::collections::HashSet::new();
        for account in &config.accounts {
            validate_account_name(&account.name)?;
            if !seen.insert(account.name.as_str()) {
                bail!("Duplicate account name: {}", account.name);
            }
        }
        Ok(config)
    }
}

/// Account names double as order file names under `--output-dir`.
fn validate_account_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("Account name must not be empty");
    }
    if trimmed == "." || trimmed == ".." || name.contains(['/', '\\', '\0']) {
        bail!("Invalid account name {:?}: path separators are not allowed", name);
    }
    Ok(())
}

impl AccountConfig {
    /// Resolve the credential through `lookup` (normally the process environment).
    pub fn credential(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Credential> {
        let api_key = lookup(&self.api_key_env).with_context(|| {
            format!("Account {}: environment variable {} is not set", self.name, self.api_key_env)
        })?;
        let api_secret = lookup(&self.api_secret_env).with_context(|| {
            format!(
                "Account {}: environment variable {} is not set",
                self.name, self.api_secret_env
            )
        })?;
        Credential::new(self.exchange, api_key, api_secret)
            .with_context(|| format!("Account {}", self.name))
    }
}

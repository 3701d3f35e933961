mod config;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use tradesync_core::*;
use tradesync_engine::{build_adapter, supported_exchanges, CredentialCheck, SyncJob, SyncService};

use crate::config::AccountsConfig;

#[derive(Parser)]
#[command(name = "tradesync")]
#[command(about = "Validate exchange API credentials and sync closed orders")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(clap::Args)]
struct CredentialArgs {
    /// Exchange name (kraken, bitstamp)
    #[arg(short, long)]
    exchange: ExchangeName,

    #[arg(long, env = "TRADESYNC_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "TRADESYNC_API_SECRET", hide_env_values = true)]
    api_secret: String,
}

impl CredentialArgs {
    fn credential(&self) -> Result<Credential> {
        Ok(Credential::new(self.exchange, &self.api_key, &self.api_secret)?)
    }
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Window start, RFC 3339 or YYYY-MM-DD (start of day, UTC)
    #[arg(long)]
    start: String,

    /// Window end, RFC 3339 or YYYY-MM-DD (end of day, UTC)
    #[arg(long)]
    end: String,
}

impl WindowArgs {
    fn window(&self) -> Result<SyncWindow> {
        let start = parse_bound(&self.start, Bound::Start)?;
        let end = parse_bound(&self.end, Bound::End)?;
        Ok(SyncWindow::new(start, end)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a credential works and cannot read balances
    Validate {
        #[command(flatten)]
        credential: CredentialArgs,
    },

    /// Fetch every closed order in a date window
    Sync {
        #[command(flatten)]
        credential: CredentialArgs,

        #[command(flatten)]
        window: WindowArgs,

        /// Write orders here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sync every account in a config file concurrently
    Run {
        /// Path to the accounts TOML file
        #[arg(short, long)]
        config: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Directory for one `<account>.json` order file per account
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// List supported exchanges
    Exchanges,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries results
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    match cli.log_format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Commands::Validate { credential } => validate(credential).await,
        Commands::Sync {
            credential,
            window,
            output,
        } => {
            sync(credential, window, output, cancel).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            config,
            window,
            output_dir,
        } => run(&config, window, output_dir, cancel).await,
        Commands::Exchanges => {
            println!("Supported exchanges:");
            for info in supported_exchanges() {
                println!(
                    "  {:<10} rate limit {:>5} ms | page size {:>4} | {:?} | sync {}",
                    info.name.as_str(),
                    info.settings.rate_limit.as_millis(),
                    info.settings.fetch_limit,
                    info.settings.fetch_direction,
                    if info.supports_sync { "yes" } else { "no" },
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn validate(args: CredentialArgs) -> Result<ExitCode> {
    let credential = args.credential()?;
    info!(exchange = %credential.exchange(), key = %credential.masked_key(), "Validating credential");

    let adapter = build_adapter(credential);
    let check = SyncService::new()
        .register("cli", adapter.as_ref())
        .await
        .context("Credential validation failed")?;

    println!("{}", check);
    Ok(match check {
        CredentialCheck::Accepted => ExitCode::SUCCESS,
        CredentialCheck::Rejected => ExitCode::from(2),
        CredentialCheck::OverlyPermissive => ExitCode::from(3),
    })
}

async fn sync(
    args: CredentialArgs,
    window: WindowArgs,
    output: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<()> {
    let window = window.window()?;
    let mut adapter = build_adapter(args.credential()?);

    let report = SyncService::new()
        .sync("cli", adapter.as_mut(), window, cancel)
        .await
        .context("Sync failed")?;

    let summary = report.summary();
    info!(
        exchange = %summary.exchange,
        orders = summary.orders,
        elapsed_ms = summary.elapsed_ms,
        "Sync complete"
    );

    let json = serde_json::to_string_pretty(&report.orders)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Orders written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn run(
    config_path: &Path,
    window: WindowArgs,
    output_dir: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<ExitCode> {
    let config = AccountsConfig::load(config_path)?;
    let window = window.window()?;

    let mut jobs = Vec::with_capacity(config.accounts.len());
    for account in &config.accounts {
        let credential = account.credential(|name| std::env::var(name).ok())?;
        let job = SyncJob::new(account.name.clone(), build_adapter(credential));
        jobs.push(if account.validate { job.validated() } else { job });
    }

    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let (tx, mut rx) = mpsc::channel::<AccountEvent>(256);
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!(account = %event.account, exchange = %event.exchange, event = ?event.kind, "Account progress");
        }
    });

    let results = SyncService::with_events(tx)
        .sync_accounts(jobs, window, cancel)
        .await;
    // Every sender is gone once the service is dropped
    let _ = progress.await;

    let mut failed = 0;
    for result in &results {
        let line = match &result.outcome {
            Ok(report) => {
                if let Some(dir) = &output_dir {
                    let path = dir.join(format!("{}.json", result.account));
                    std::fs::write(&path, serde_json::to_string_pretty(&report.orders)?)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                serde_json::json!({
                    "account": result.account,
                    "status": "ok",
                    "summary": report.summary(),
                })
            }
            Err(e) => {
                failed += 1;
                serde_json::json!({
                    "account": result.account,
                    "exchange": result.exchange,
                    "status": "failed",
                    "error": e.to_string(),
                })
            }
        };
        println!("{}", line);
    }

    if failed == results.len() && !results.is_empty() {
        bail!("All {} accounts failed to sync", failed);
    }
    Ok(if failed > 0 { ExitCode::from(1) } else { ExitCode::SUCCESS })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Parse an RFC 3339 timestamp, or a bare date widened to the whole UTC day.
fn parse_bound(value: &str, bound: Bound) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Expected RFC 3339 or YYYY-MM-DD, got {:?}", value))?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
            .context("Invalid end-of-day time")?,
    };
    Ok(date.and_time(time).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_bound_dates() {
        assert_eq!(
            parse_bound("2024-01-01", Bound::Start).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        let end = parse_bound("2024-01-31", Bound::End).unwrap();
        assert_eq!(end.timestamp_millis(), Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap().timestamp_millis() - 1);
    }

    #[test]
    fn test_parse_bound_rfc3339() {
        assert_eq!(
            parse_bound("2024-01-01T12:00:00+02:00", Bound::End).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
        );
        assert!(parse_bound("01/02/2024", Bound::Start).is_err());
    }

    #[test]
    fn test_window_rejects_reversed_bounds() {
        let args = WindowArgs {
            start: "2024-02-01".to_string(),
            end: "2024-01-01".to_string(),
        };
        assert!(args.window().is_err());
    }

    #[test]
    fn test_cli_parses_sync() {
        let cli = Cli::try_parse_from([
            "tradesync",
            "sync",
            "--exchange",
            "kraken",
            "--api-key",
            "key",
            "--api-secret",
            "secret",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-31",
        ])
        .unwrap();
        match cli.command {
            Commands::Sync {
                credential, output, ..
            } => {
                assert_eq!(credential.exchange, ExchangeName::Kraken);
                assert!(output.is_none());
            }
            _ => panic!("Expected sync command"),
        }
    }
}

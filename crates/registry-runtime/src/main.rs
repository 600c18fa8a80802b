//! # registry-node
//!
//! The BlueCarbon registry process.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging and metrics
//! 2. Load configuration (env, then command-line overrides) and validate it
//! 3. Build the component container (opens the audit log if configured)
//! 4. Start the background reconciler
//! 5. Serve JSON-lines requests from stdin until EOF or Ctrl+C
//!
//! Logs go to stderr; stdout carries only RPC responses.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use carbon_telemetry::{init_telemetry, TelemetryConfig};
use clap::{Parser, Subcommand};
use shared_types::{ProposedAction, SystemTimeSource, TimeSource};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use registry_runtime::handlers::{handle_line, OfflineSigner};
use registry_runtime::{RegistryConfig, RegistryContainer, RegistryService};

#[derive(Debug, Parser)]
#[command(name = "registry-node", version, about = "BlueCarbon verification and issuance registry")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory of the append-only audit log (overrides BC_AUDIT_DIR)
    #[arg(long, global = true)]
    audit_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `info,bc_04_project_workflow=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve JSON-lines RPC on stdin/stdout (default)
    Serve,
    /// Sign one ProposedAction read as JSON from stdin and print the SignedAction
    Sign {
        /// Hex secp256k1 secret of the signing identity
        #[arg(long, env = "BC_SIGNER_SECRET", hide_env_values = true)]
        secret: String,
        /// File whose bytes are attached as action metadata
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Sign {
            ref secret,
            ref metadata,
        }) => sign(secret, metadata.clone()),
        Some(Command::Serve) | None => serve(&cli).await,
    }
}

fn sign(secret: &str, metadata: Option<PathBuf>) -> Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let action: ProposedAction =
        serde_json::from_str(&input).context("stdin must hold one ProposedAction as JSON")?;
    let metadata = metadata
        .map(|path| std::fs::read(&path).with_context(|| format!("reading {}", path.display())))
        .transpose()?;

    let signer = OfflineSigner::from_secret_hex(secret)?;
    let signed = signer.sign(action, SystemTimeSource.now(), metadata)?;
    println!("{}", serde_json::to_string(&signed)?);
    Ok(())
}

async fn serve(cli: &Cli) -> Result<()> {
    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &cli.log_level {
        telemetry.log_level = level.clone();
    }
    telemetry.json_logs |= cli.json_logs;
    let _telemetry = init_telemetry(telemetry).context("failed to initialize telemetry")?;

    let mut config = RegistryConfig::from_env()?;
    if let Some(dir) = &cli.audit_dir {
        config.audit.data_dir = Some(dir.clone());
    }
    let reconcile_every = Duration::from_millis(config.ledger.reconcile_interval_ms);

    info!("===========================================");
    info!("  BlueCarbon Registry v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let container = RegistryContainer::new(config).context("failed to build registry")?;
    let service = Arc::new(RegistryService::new(Arc::new(container)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = spawn_reconciler(Arc::clone(&service), reconcile_every, shutdown_rx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!("Serving JSON-lines requests on stdin");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = handle_line(&service, &line).await;
                stdout.write_all(response.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        }
    }

    if shutdown_tx.send(true).is_err() {
        warn!("Reconciler already stopped");
    }
    if let Err(e) = reconciler.await {
        warn!(error = %e, "Reconciler task failed");
    }
    let pending = service.projects_needing_reconciliation();
    if !pending.is_empty() {
        warn!(projects = ?pending, "Shutting down with unreconciled projects");
    }
    info!("Shutdown complete");
    Ok(())
}

/// Periodically settles unconfirmed transitions and drains the audit backlog.
fn spawn_reconciler(
    service: Arc<RegistryService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = service.reconcile_all().await {
                        warn!(error = %e, "Background reconciliation failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Reconciler stopping");
                    break;
                }
            }
        }
    })
}

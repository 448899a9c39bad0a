//! # OpsAudit — Records-Audit Tracker
//!
//! Audit-task workflow, live event push over SSE, and scheduled
//! video-retention reminders, served from a single binary.
//!
//! Usage:
//!   opsaudit                                 # defaults (config at ./opsaudit.toml if present)
//!   opsaudit --listen 0.0.0.0:8090           # custom bind address
//!   opsaudit --db /var/lib/opsaudit/audit.db # custom database path

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "opsaudit",
    version,
    about = "📋 OpsAudit — records-audit tracker with live updates and retention reminders"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "opsaudit.toml")]
    config: PathBuf,

    /// Database path (overrides config)
    #[arg(long)]
    db: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "opsaudit=debug,tower_http=debug"
    } else {
        "opsaudit=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = opsaudit_core::config::OpsAuditConfig::load(&cli.config)?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(listen) = cli.listen {
        config.gateway.listen = listen;
    }

    let db = Arc::new(opsaudit_db::AuditDb::open(std::path::Path::new(
        &config.db_path,
    ))?);
    tracing::info!("💾 database ready at {}", config.db_path);

    let (hub, handle) = opsaudit_hub::EventHub::with_capacity(config.hub.queue_capacity);
    tokio::spawn(hub.run());

    let workflow = Arc::new(opsaudit_workflow::AuditWorkflow::new(
        db.clone(),
        handle.clone(),
    ));

    let runner = Arc::new(opsaudit_scheduler::ScheduleRunner::new(db));
    runner.start().await;

    let state = opsaudit_gateway::AppState::new(
        workflow,
        handle,
        runner.clone(),
        &config.gateway,
        &config.hub,
    );
    let result = opsaudit_gateway::serve(state, &config.gateway.listen).await;

    runner.shutdown().await;
    result
}

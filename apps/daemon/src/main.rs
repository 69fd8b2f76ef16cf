//! Headless veil host.
//!
//! Runs the protection service against the platform provider and a logging
//! presenter, and reads console commands from stdin.
//!
//! # Usage
//!
//! ```bash
//! veil                              # platform permission check
//! veil --assume-permissions         # host grants permissions out of band
//! veil --config ./veil.json         # explicit config file
//! ```

mod console;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use veil_context::platform::PlatformProvider;
use veil_context::{
    ForegroundSource, LauncherQuery, PermissionProbe, PermissionReport, StaticPermissions,
    UsageForegroundSource,
};
use veil_engine::{EngineConfig, LogPresenter, PlatformServices, ProtectionService};
use veil_events::{EventBus, EventBusRef};
use veil_storage::{Database, PolicyStore};

/// Headless veil app lock
#[derive(Parser, Debug)]
#[command(name = "veil")]
#[command(about = "Foreground-tracking app lock")]
#[command(version)]
struct Args {
    /// Treat every platform permission as granted
    #[arg(long)]
    assume_permissions: bool,

    /// Config file [default: $CONFIG_DIR/veil/config.json]
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Event bus that writes outbound events to the log.
struct LogEventBus;

impl EventBus for LogEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        tracing::info!(topic, %payload, "event");
    }
}

fn app_dir(base: Option<PathBuf>) -> Result<PathBuf> {
    let dir = base
        .context("could not resolve platform directory")?
        .join("veil");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,veil=debug")),
        )
        .init();

    tracing::info!("Starting veil daemon");

    let config_path = match args.config {
        Some(path) => {
            ensure!(path.exists(), "config file {} not found", path.display());
            path
        }
        None => app_dir(dirs::config_dir())?.join("config.json"),
    };
    let config = EngineConfig::load(&config_path)?;

    let db_path = app_dir(dirs::data_dir())?.join("veil.db");
    tracing::info!(path = %db_path.display(), "opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    let store = Arc::new(PolicyStore::new(Arc::new(db)));

    let provider = Arc::new(PlatformProvider::new());
    let source: Arc<dyn ForegroundSource> = Arc::new(UsageForegroundSource::with_windows(
        PlatformProvider::new(),
        config.usage_windows(),
    ));
    let permissions: Arc<dyn PermissionProbe> = if args.assume_permissions {
        Arc::new(StaticPermissions(PermissionReport::all_granted()))
    } else {
        Arc::clone(&provider) as Arc<dyn PermissionProbe>
    };
    let launchers: Arc<dyn LauncherQuery> = provider;

    let bus: EventBusRef = Arc::new(LogEventBus);
    let service = ProtectionService::new(
        config,
        store,
        PlatformServices {
            source,
            permissions,
            launchers,
        },
        Arc::new(LogPresenter::new()),
        bus,
    );

    if !service.enable_protection().await? {
        tracing::warn!(
            permissions = ?service.check_permissions(),
            "protection not enabled; grant permissions or pass --assume-permissions"
        );
    }

    let interrupted = tokio::select! {
        result = console::run(&service) => {
            result?;
            false
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            true
        }
    };

    service.disable_protection().await;
    tracing::info!("veil daemon stopped");

    if interrupted {
        // A pending stdin read cannot be cancelled and would block runtime shutdown.
        std::process::exit(0);
    }
    Ok(())
}

//! Daemon binary for dinnerbell.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dinnerbell::store::Datastore;
use dinnerbell::{
    ConfigIssueSeverity, DinnerbellConfig, EngineRunner, FcmGateway, MemoryStore, ReminderEngine,
    validate_config,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Dinnerbell: reminder and push dispatch daemon.
#[derive(Parser)]
#[command(name = "dinnerbell", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the reminder dispatch loop.
    Run,

    /// Check the configuration file and report issues.
    Validate,

    /// Write the default configuration to the config path.
    InitConfig,
}

/// Initialize tracing once. Suppresses noisy dependency logs by
/// default; override with RUST_LOG=debug to see everything.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("dinnerbell=info,reqwest=warn,hyper=warn")
            }))
            .init();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    // Flag beats environment beats the per-user default path.
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("DINNERBELL_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(DinnerbellConfig::default_config_path);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(&config_path).await,
        Command::Validate => validate(&config_path),
        Command::InitConfig => init_config(&config_path),
    }
}

fn load_config(path: &Path) -> anyhow::Result<DinnerbellConfig> {
    if path.exists() {
        Ok(DinnerbellConfig::from_file(path)?)
    } else {
        info!(path = %path.display(), "no config file found; using defaults");
        Ok(DinnerbellConfig::default())
    }
}

/// Log every validation issue; fail when any is an error.
fn check_config(config: &DinnerbellConfig) -> anyhow::Result<()> {
    let issues = validate_config(config);
    let mut blocking = 0usize;
    for issue in &issues {
        match issue.severity {
            ConfigIssueSeverity::Warning => {
                warn!(issue = %issue.id, "{}: {}", issue.title, issue.summary);
            }
            ConfigIssueSeverity::Error => {
                tracing::error!(issue = %issue.id, "{}: {}", issue.title, issue.summary);
                blocking += 1;
            }
        }
    }
    if blocking > 0 {
        anyhow::bail!("configuration has {blocking} blocking issue(s)");
    }
    Ok(())
}

async fn run_daemon(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    check_config(&config)?;

    let store = Arc::new(MemoryStore::new(&config.store)) as Arc<dyn Datastore>;
    let gateway = Arc::new(FcmGateway::new(&config.push)?);
    let engine = Arc::new(ReminderEngine::new(config, store, gateway));

    let handle = EngineRunner::new(engine).run();

    tokio::signal::ctrl_c().await?;
    info!("received Ctrl+C, shutting down");
    handle.abort();

    Ok(())
}

fn validate(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let issues = validate_config(&config);
    if issues.is_empty() {
        println!("configuration ok: {}", config_path.display());
        return Ok(());
    }
    for issue in &issues {
        println!("[{:?}] {} ({}): {}", issue.severity, issue.title, issue.id, issue.summary);
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigIssueSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("{errors} blocking issue(s)");
    }
    Ok(())
}

fn init_config(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        anyhow::bail!("refusing to overwrite {}", config_path.display());
    }
    DinnerbellConfig::default().save_to_file(config_path)?;
    println!("wrote default configuration to {}", config_path.display());
    Ok(())
}

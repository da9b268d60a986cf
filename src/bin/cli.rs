use anyhow::{Context, Result};
use chart_playlist_sync as lib;
use clap::{Parser, Subcommand};
use lib::cancel::CancelToken;
use lib::config::ConfigStore;
use std::path::{Path, PathBuf};
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "chart-playlist-sync", version)]
struct Cli {
    /// Path to config JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one chart sync (the default when no subcommand is given)
    Run,
    /// Authorize the playlist account interactively and store the tokens
    Auth,
    /// Validate config file and exit
    ConfigValidate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Resolve config path: explicit --config overrides; otherwise prefer
    // config.json in the working directory and fall back to the repository
    // example config for local/dev usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let local_path = Path::new("config.json");
            if local_path.exists() {
                local_path.to_path_buf()
            } else {
                PathBuf::from("config/example-config.json")
            }
        }
    };

    let store = ConfigStore::new(&resolved_config_path);
    let cfg = store
        .load()
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to both stdout and a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(&cfg.log_dir, "chart-sync.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(non_blocking);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    // Install as global default tracing subscriber without triggering
    // tracing-subscriber's internal log bridge (we already call LogTracer).
    tracing_subscriber_global::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let services = lib::worker::Services::from_config(&cfg);
            let cancel = CancelToken::new();

            // First Ctrl-C stops the run before the next remote call; a
            // rerun starts over from a clean drain.
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling sync");
                    interrupt.cancel();
                }
            });

            lib::worker::run_sync_once(&store, &services, &cancel)
                .await
                .with_context(|| "running chart sync".to_string())?;
        }
        Commands::Auth => {
            let services = lib::worker::Services::from_config(&cfg);
            let access = services
                .credentials
                .obtain_access_credentials()
                .await
                .with_context(|| "running authorization flow".to_string())?;
            let mut updated = cfg.clone();
            updated.access = Some(access);
            store
                .save(&updated)
                .with_context(|| format!("saving config to {}", resolved_config_path.display()))?;
            println!(
                "Saved access credentials to {}. You can now run the sync.",
                resolved_config_path.display()
            );
        }
        Commands::ConfigValidate => match store.load() {
            Ok(_) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {}", e);
                std::process::exit(2);
            }
        },
    }

    Ok(())
}

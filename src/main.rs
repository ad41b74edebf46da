mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod forms;
mod pipeline;
mod query;
mod routes;
mod toast;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::{CachedCrm, CrmClient, CrmService};
use crate::cache::QueryCache;
use crate::routes::Route;
use crate::ui::renderfns::extract_domain;

#[derive(Parser, Debug)]
#[command(name = "crmdeck")]
#[command(about = "A terminal client for your CRM: dashboard, clients, projects and pipeline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/crmdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Override the API base URL from the config file
  #[arg(long)]
  api_url: Option<String>,

  /// Route to open at startup, e.g. /pipeline or /clients/42
  #[arg(short, long, default_value = "/")]
  route: String,

  /// Log file (default: $XDG_DATA_HOME/crmdeck/crmdeck.log)
  #[arg(long)]
  log_file: Option<PathBuf>,
}

/// Log to a file; the terminal belongs to the UI.
///
/// Filter with `CRMDECK_LOG` (e.g. `crmdeck=debug`), default `info`.
fn init_logging(path: &Path) -> Result<WorkerGuard> {
  let dir = path
    .parent()
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
  std::fs::create_dir_all(dir)?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
  let filter = EnvFilter::try_from_env("CRMDECK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let log_path = match args.log_file {
    Some(path) => path,
    None => config::Config::default_log_path()?,
  };
  let _log_guard = init_logging(&log_path)?;

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.url = url;
  }

  let start = Route::parse(&args.route).ok_or_else(|| eyre!("Unknown route: {}", args.route))?;

  let client = CrmClient::new(&config)?;
  let title = config
    .title
    .clone()
    .unwrap_or_else(|| extract_domain(&config.api.url).to_string());
  tracing::info!(api = %config.api.url, route = %start.path(), "starting crmdeck");

  let service: Arc<dyn CrmService> = Arc::new(client);
  let crm = CachedCrm::new(service, QueryCache::new(config.cache.stale_time()));

  // Initialize and run the app
  let mut app = app::App::new(&config, crm, title, start);
  app.run().await?;

  Ok(())
}

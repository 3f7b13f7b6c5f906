//! zeitgeist daemon binary.
//!
//! Reads `zeitgeist.toml` (or the path given with `--config`), opens the
//! SQLite event log with the configured taxonomy and extensions, and serves
//! the JSON API over HTTP until interrupted.

mod config;

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use zeit_core::{
  blacklist::Blacklist, datasource::DataSourceRegistry, extension::ExtensionChain,
  store::EventLog, taxonomy::Taxonomy,
};
use zeit_store_sqlite::{SqliteStore, StoreOptions};

use crate::config::{DaemonConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Zeitgeist activity log daemon")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "zeitgeist.toml")]
  config: std::path::PathBuf,

  /// Print the resolved configuration and exit.
  #[arg(long)]
  print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = DaemonConfig::load(&cli.config)?;

  if cli.print_config {
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    return Ok(());
  }

  let taxonomy = match &cfg.taxonomy_path {
    Some(path) => {
      let path = expand_tilde(path);
      let taxonomy = Taxonomy::load(&path)
        .with_context(|| format!("failed to load taxonomy from {path:?}"))?;
      Arc::new(taxonomy)
    }
    None => Arc::default(),
  };

  let blacklist = cfg.enable_blacklist.then(|| {
    Arc::new(match &cfg.blacklist_path {
      Some(path) => Blacklist::open(expand_tilde(path), taxonomy.clone()),
      None => Blacklist::new(taxonomy.clone()),
    })
  });

  let data_sources = cfg.enable_data_sources.then(|| {
    Arc::new(match &cfg.data_sources_path {
      Some(path) => DataSourceRegistry::open(expand_tilde(path)),
      None => DataSourceRegistry::new(),
    })
  });

  let mut extensions = ExtensionChain::new();
  if let Some(blacklist) = &blacklist {
    extensions.push(blacklist.clone());
  }
  if let Some(registry) = &data_sources {
    extensions.push(registry.clone());
  }

  let options = StoreOptions {
    cache_size: cfg.cache_size,
    related_window: cfg.related_window,
    taxonomy,
    extensions,
  };

  // Open SQLite store.
  let store = if cfg.is_in_memory() {
    SqliteStore::open_in_memory(options)
      .await
      .context("failed to open in-memory store")?
  } else {
    let path = expand_tilde(&cfg.database_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {parent:?}"))?;
    }
    SqliteStore::open(&path, options)
      .await
      .with_context(|| format!("failed to open store at {path:?}"))?
  };
  let store = Arc::new(store);

  let app = zeit_api::api_router(store.clone(), blacklist, data_sources).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  store.close().await.context("failed to close the event log")?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("Shutting down");
}

mod api;
mod cache;
mod config;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tracing_subscriber::EnvFilter;

use api::RemoteClient;
use cache::{CatalogCache, SeedData};
use store::SqliteStore;

#[derive(Parser, Debug)]
#[command(name = "pocketprice")]
#[command(about = "Pocket Price catalog connector")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pocketprice/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Path to the cache database (default: XDG data dir)
  #[arg(long)]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List services from the cache
  Services {
    /// Only services in this category
    #[arg(long)]
    category: Option<String>,
    /// Only services in this subcategory
    #[arg(long)]
    subcategory: Option<String>,
    /// Bypass the live cache entry
    #[arg(long)]
    force: bool,
  },
  /// List categories from the cache
  Categories {
    #[arg(long)]
    force: bool,
  },
  /// List subcategories from the cache
  Subcategories {
    #[arg(long)]
    force: bool,
  },
  /// Show a single service by id
  Service {
    id: String,
    /// Fetch the raw record from the remote API instead of the cache
    #[arg(long)]
    remote: bool,
  },
  /// Show how a service's price should be displayed
  Price { id: String },
  /// Show catalog metadata
  Meta,
  /// Resync all collections from the remote API
  Refresh,
  /// Drop live cache entries (fallback snapshots are kept)
  Flush,
  /// Remove all cached data, fallback snapshots and metadata
  Reset,
  /// Import fallback data from a JSON seed file
  Seed { file: PathBuf },
  /// Check remote API health
  Health,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let store = Arc::new(match &args.db {
    Some(path) => SqliteStore::open_at(path)?,
    None => SqliteStore::open()?,
  });

  let client = RemoteClient::new(&config)?;
  let cache = CatalogCache::new(store, client.clone(), config.cache_ttl_seconds);

  match args.command {
    Command::Services {
      category,
      subcategory,
      force,
    } => {
      if force {
        cache.get_services(true).await?;
      }
      let services = match (category, subcategory) {
        (Some(cat), _) => cache.get_services_by_category(&cat).await?,
        (None, Some(sub)) => cache.get_services_by_subcategory(&sub).await?,
        (None, None) => cache.get_services(false).await?,
      };
      print_json(&services)?;
    }
    Command::Categories { force } => {
      print_json(&cache.get_categories(force).await?)?;
    }
    Command::Subcategories { force } => {
      print_json(&cache.get_subcategories(force).await?)?;
    }
    Command::Service { id, remote } => {
      if remote {
        let record = client
          .get_record("services", &id)
          .await
          .map_err(|e| eyre!("Failed to fetch service {}: {}", id, e))?;
        print_json(&record)?;
      } else {
        let service = cache
          .get_service(&id)
          .await?
          .ok_or_else(|| eyre!("Service not found: {}", id))?;
        print_json(&service)?;
      }
    }
    Command::Price { id } => {
      let service = cache
        .get_service(&id)
        .await?
        .ok_or_else(|| eyre!("Service not found: {}", id))?;
      print_json(&service.price_display())?;
    }
    Command::Meta => {
      print_json(&cache.get_meta().await?)?;
    }
    Command::Refresh => {
      let summary = cache.refresh().await?;
      print_json(&summary)?;
    }
    Command::Flush => {
      cache.flush()?;
      eprintln!("Live cache entries dropped.");
    }
    Command::Reset => {
      cache.reset()?;
      eprintln!("All cached data removed.");
    }
    Command::Seed { file } => {
      let contents = std::fs::read_to_string(&file)
        .map_err(|e| eyre!("Failed to read seed file {}: {}", file.display(), e))?;
      let data: SeedData = serde_json::from_str(&contents)
        .map_err(|e| eyre!("Failed to parse seed file {}: {}", file.display(), e))?;

      if cache.seed(data).await? {
        eprintln!("Seed data imported.");
      } else {
        eprintln!("Seed skipped: fallback data already present.");
      }
    }
    Command::Health => {
      let health = client
        .health()
        .await
        .map_err(|e| eyre!("Health check failed: {}", e))?;
      print_json(&health)?;
    }
  }

  Ok(())
}

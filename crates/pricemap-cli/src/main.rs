mod display;
mod pipeline;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use pricemap_config::{LOCAL_CONFIG_FILE, PricemapConfig};
use pricemap_core::{UnboundedPolicy, point_collection};
use pricemap_store::DuckStore;
use pricemap_zones::{PartitionOptions, partition};
use tracing::info;

#[derive(Parser)]
#[command(name = "pricemap", version, about = "Discount-shop registry and service-area maps")]
struct Cli {
    /// Project config file.
    #[arg(long, global = true, default_value = LOCAL_CONFIG_FILE)]
    config: PathBuf,

    /// Override the database path from the config.
    #[arg(long, global = true, env = "PRICEMAP_DB")]
    db: Option<PathBuf>,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug detail.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and its schema
    Init,

    /// Fetch offers, geocode new shops and reconcile the registry
    Update {
        /// Plan and report without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Write shop service areas as GeoJSON polygons
    Zones {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Frame margin in degrees
        #[arg(long)]
        margin: Option<f64>,

        /// What to do with cells of shops on the outer edge: drop or clip
        #[arg(long)]
        unbounded: Option<UnboundedPolicy>,
    },

    /// Write shops as GeoJSON points
    Points {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the registry as a table
    List,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("pricemap error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let mut config = PricemapConfig::load_with_dotenv(&cli.config)
        .with_context(|| format!("failed to load config ({})", cli.config.display()))?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    match cli.command {
        Commands::Init => {
            let store = open_store(&config.store.path)?;
            info!(
                path = %config.store.path.display(),
                shops = store.shop_count()?,
                "registry ready"
            );
        }
        Commands::Update { dry_run } => {
            let mut store = open_store(&config.store.path)?;
            let sources = pipeline::build_sources(&config.ingest);
            let geocoder = pipeline::build_geocoder(&config)?;
            match pipeline::update_registry(&mut store, &sources, &geocoder, dry_run).await? {
                Some(report) => display::print_report(&report, dry_run),
                None => display::print_skipped(),
            }
        }
        Commands::Zones {
            out,
            margin,
            unbounded,
        } => {
            let store = open_store(&config.store.path)?;
            let options = PartitionOptions {
                margin: margin.unwrap_or(config.partition.margin),
                policy: unbounded.unwrap_or(config.partition.unbounded),
            };
            let records = store.load_registry()?;
            let zones = partition(&records, &options)?;
            display::write_geojson(&zones.to_feature_collection(), out.as_deref())?;
            info!(report = %zones.report, "service areas written");
        }
        Commands::Points { out } => {
            let store = open_store(&config.store.path)?;
            let records = store.load_registry()?;
            display::write_geojson(&point_collection(&records), out.as_deref())?;
            info!(shops = records.len(), "points written");
        }
        Commands::List => {
            let store = open_store(&config.store.path)?;
            display::print_registry(&store.registry_arrow()?)?;
        }
    }

    Ok(())
}

fn open_store(path: &Path) -> anyhow::Result<DuckStore> {
    DuckStore::open_persistent(path)
        .with_context(|| format!("failed to open registry at {}", path.display()))
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("PRICEMAP_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

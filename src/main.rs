// 🔗 product-linkage - batch CLI
//
//   product-linkage -p data/products.txt -l data/listings.txt -o output
//   product-linkage --config linkage.json --rates eurofxref-hist.csv
//
// Log verbosity follows RUST_LOG (default: info).

use anyhow::Result;
use clap::Parser;
use product_linkage::{run, ConfigOverrides, LinkageConfig, VERSION};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "product-linkage", version, about = "Link retailer listings to catalog products")]
struct Cli {
    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LinkageConfig::load(path)?,
        None => LinkageConfig::default(),
    };
    config.apply(cli.overrides);

    info!("🔗 product-linkage v{}", VERSION);
    let (outcome, paths) = run(&config)?;

    info!(
        "✅ {} products, {} listings matched, {} outliers → {}",
        outcome.summary.products_indexed,
        outcome.summary.listings_matched,
        outcome.summary.listings_outliers,
        paths.results.display()
    );

    Ok(())
}

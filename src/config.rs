// ⚙️ Configuration - JSON file defaults, CLI flags on top
use crate::currency::RateFallback;
use crate::error::LinkageError;
use crate::indexer::{IndexerConfig, ModelTokenStrategy};
use crate::outliers::{FilterConfig, PriceComparison};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkageConfig {
    pub products: PathBuf,
    pub listings: PathBuf,
    pub output_dir: PathBuf,

    /// ECB-style reference rate CSV; without it only same-currency buckets
    /// can be filtered
    pub rates: Option<PathBuf>,

    pub strict: bool,
    pub n_stdevs: f64,
    pub base_currency: String,
    pub min_manufacturer_len: usize,
    pub min_model_len: usize,
    pub model_token: ModelTokenStrategy,
    pub price_comparison: PriceComparison,
    pub rate_fallback: RateFallback,

    /// Currencies of the English-language market
    pub english_currencies: Vec<String>,
}

impl Default for LinkageConfig {
    fn default() -> Self {
        LinkageConfig {
            products: PathBuf::from("data/products.txt"),
            listings: PathBuf::from("data/listings.txt"),
            output_dir: PathBuf::from("output"),
            rates: None,
            strict: false,
            n_stdevs: 2.0,
            base_currency: "USD".to_string(),
            min_manufacturer_len: 2,
            min_model_len: 2,
            model_token: ModelTokenStrategy::default(),
            price_comparison: PriceComparison::default(),
            rate_fallback: RateFallback::default(),
            english_currencies: vec!["USD".to_string(), "CAD".to_string(), "GBP".to_string()],
        }
    }
}

/// Command-line overrides; anything left unset keeps the file/default value
#[derive(Debug, Clone, Default, PartialEq, clap::Args)]
pub struct ConfigOverrides {
    /// Products file (JSON lines)
    #[arg(short = 'p', long)]
    pub products: Option<PathBuf>,

    /// Listings file (JSON lines)
    #[arg(short = 'l', long)]
    pub listings: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long = "output")]
    pub output_dir: Option<PathBuf>,

    /// Exchange rate CSV (ECB eurofxref-hist layout)
    #[arg(long)]
    pub rates: Option<PathBuf>,

    /// Require explicit manufacturer/model matches
    #[arg(long)]
    pub strict: bool,

    /// Outlier band half-width in standard deviations
    #[arg(long)]
    pub n_stdevs: Option<f64>,

    /// Currency prices are compared in
    #[arg(long)]
    pub base_currency: Option<String>,

    #[arg(long)]
    pub min_manufacturer_len: Option<usize>,

    #[arg(long)]
    pub min_model_len: Option<usize>,

    #[arg(long, value_enum)]
    pub model_token: Option<ModelTokenStrategy>,

    #[arg(long, value_enum)]
    pub price_comparison: Option<PriceComparison>,

    #[arg(long, value_enum)]
    pub rate_fallback: Option<RateFallback>,
}

impl LinkageConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: LinkageConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(v) = overrides.products {
            self.products = v;
        }
        if let Some(v) = overrides.listings {
            self.listings = v;
        }
        if let Some(v) = overrides.output_dir {
            self.output_dir = v;
        }
        if overrides.rates.is_some() {
            self.rates = overrides.rates;
        }
        if overrides.strict {
            self.strict = true;
        }
        if let Some(v) = overrides.n_stdevs {
            self.n_stdevs = v;
        }
        if let Some(v) = overrides.base_currency {
            self.base_currency = v;
        }
        if let Some(v) = overrides.min_manufacturer_len {
            self.min_manufacturer_len = v;
        }
        if let Some(v) = overrides.min_model_len {
            self.min_model_len = v;
        }
        if let Some(v) = overrides.model_token {
            self.model_token = v;
        }
        if let Some(v) = overrides.price_comparison {
            self.price_comparison = v;
        }
        if let Some(v) = overrides.rate_fallback {
            self.rate_fallback = v;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), LinkageError> {
        if !self.n_stdevs.is_finite() || self.n_stdevs < 0.0 {
            return Err(LinkageError::InvalidConfig(format!(
                "n_stdevs must be a non-negative number, got {}",
                self.n_stdevs
            )));
        }
        if self.base_currency.trim().is_empty() {
            return Err(LinkageError::InvalidConfig("base_currency is empty".to_string()));
        }
        Ok(())
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            min_manufacturer_len: self.min_manufacturer_len,
            min_model_len: self.min_model_len,
            strict: self.strict,
            model_token: self.model_token,
        }
    }

    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            n_stdevs: self.n_stdevs,
            base_currency: self.base_currency.trim().to_ascii_uppercase(),
            comparison: self.price_comparison,
        }
    }
}

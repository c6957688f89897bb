// 🏭 Catalog Indexer - hash products into manufacturer → model buckets
//
// Products whose manufacturer or model is too short to be a reliable
// substring key are rejected (reported, not an error). Near-identical model
// names are deduplicated: "cl30" and "cl30 clik" share one bucket, first
// seen wins. Multi-word models are reduced to their most discriminating
// token, e.g. "powershot sd1300 is" → "sd1300".

use crate::error::{LinkageError, Result, RESERVED_NAME};
use crate::index::{CatalogIndex, ManufacturerBucket, ModelBucket};
use crate::models::Product;
use crate::sanitize::has_digit;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// How a multi-word model name is reduced to a single hash key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelTokenStrategy {
    /// First long-enough token containing a digit
    #[default]
    FirstDigit,

    /// Longest long-enough token containing a digit (first one on ties)
    LongestDigit,

    /// Never reduce; hash the whole model string
    KeepFull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    /// Manufacturer must be strictly longer than this (default: 2)
    pub min_manufacturer_len: usize,

    /// Model must be strictly longer than this (default: 2)
    pub min_model_len: usize,

    /// Disables family-name expansion of short models
    pub strict: bool,

    pub model_token: ModelTokenStrategy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            min_manufacturer_len: 2,
            min_model_len: 2,
            strict: false,
            model_token: ModelTokenStrategy::FirstDigit,
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// A product folded into an existing model bucket by the substring rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedProduct {
    pub manufacturer: String,
    pub kept_model: String,
    pub product: Product,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexOutcome {
    pub index: CatalogIndex,

    /// Products that could not be confidently hashed
    pub rejected: Vec<Product>,

    /// Products represented by an earlier, substring-related model
    pub merged: Vec<MergedProduct>,
}

// ============================================================================
// CATALOG INDEXER
// ============================================================================

pub struct CatalogIndexer {
    config: IndexerConfig,
}

impl CatalogIndexer {
    pub fn new(config: IndexerConfig) -> Self {
        CatalogIndexer { config }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Build the index from the full product list
    ///
    /// Fails only if an accepted product sanitizes to the reserved name
    /// "unknown"; every other problem is a per-product rejection.
    pub fn build(&self, products: Vec<Product>) -> Result<IndexOutcome> {
        let total = products.len();
        let mut index = CatalogIndex::new();
        let mut rejected = Vec::new();
        let mut merged = Vec::new();

        for product in products {
            let Some((manu, model)) = self.hash_names(&product) else {
                debug!(product = %product.product_name, "rejected: manufacturer/model too short");
                rejected.push(product);
                continue;
            };

            if manu == RESERVED_NAME {
                return Err(LinkageError::ReservedName {
                    kind: "manufacturer",
                    product_name: product.product_name,
                });
            }

            let key = self.reduce_model(&model);

            let position = match index.manufacturers.iter().position(|m| m.manufacturer == manu) {
                Some(position) => position,
                None => {
                    index.manufacturers.push(ManufacturerBucket::new(&manu));
                    index.manufacturers.len() - 1
                }
            };
            let bucket = &mut index.manufacturers[position];

            if let Some(existing) = bucket
                .model_keys()
                .find(|existing| overlaps(existing, &model))
            {
                debug!(
                    product = %product.product_name,
                    model = %model,
                    kept = %existing,
                    "merged into existing model"
                );
                merged.push(MergedProduct {
                    manufacturer: manu.clone(),
                    kept_model: existing.to_string(),
                    product,
                });
                continue;
            }

            if key == RESERVED_NAME {
                return Err(LinkageError::ReservedName {
                    kind: "model",
                    product_name: product.product_name,
                });
            }

            bucket.models.push(ModelBucket {
                model: key,
                product,
                listings: Vec::new(),
            });
        }

        info!(
            "Indexed {} of {} products ({} manufacturers, {} rejected, {} merged)",
            index.model_count(),
            total,
            index.manufacturers.len(),
            rejected.len(),
            merged.len()
        );

        Ok(IndexOutcome {
            index,
            rejected,
            merged,
        })
    }

    /// Sanitized (manufacturer, model) if both are long enough to hash
    ///
    /// Short models ("30") are expanded with the family name ("cl30") unless
    /// strict mode is on.
    fn hash_names(&self, product: &Product) -> Option<(String, String)> {
        let view = product.sanitized();
        let manu = view.manufacturer;
        let mut model = view.model;

        if !model.is_empty() && char_len(&model) <= self.config.min_model_len && !self.config.strict {
            if let Some(family) = view.family {
                model = format!("{}{}", family, model);
            }
        }

        if char_len(&manu) > self.config.min_manufacturer_len
            && char_len(&model) > self.config.min_model_len
        {
            Some((manu, model))
        } else {
            None
        }
    }

    /// Reduce a multi-word model to one discriminating token
    fn reduce_model(&self, model: &str) -> String {
        let tokens: Vec<&str> = model.split_whitespace().collect();
        if tokens.len() < 2 {
            return model.to_string();
        }

        let min_len = self.config.min_model_len;
        let mut candidates = tokens
            .into_iter()
            .filter(|t| char_len(t) > min_len && has_digit(t));

        let chosen = match self.config.model_token {
            ModelTokenStrategy::FirstDigit => candidates.next(),
            ModelTokenStrategy::LongestDigit => candidates.fold(None, |best: Option<&str>, t| match best {
                Some(b) if char_len(b) >= char_len(t) => Some(b),
                _ => Some(t),
            }),
            ModelTokenStrategy::KeepFull => None,
        };

        chosen.unwrap_or(model).to_string()
    }
}

impl Default for CatalogIndexer {
    fn default() -> Self {
        Self::new(IndexerConfig::default())
    }
}

fn overlaps(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

// ============================================================================
// TESTS
// ============================================================================

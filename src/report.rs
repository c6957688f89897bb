// 📝 Result Assembler - write run artifacts and the run summary
//
// Artifacts (inside the output directory):
//   results.txt              one JSON line per product:
//                            {"product_name": ..., "listings": [...]}
//                            matched products first, then every rejected
//                            product with an empty listing array
//   unhashed_products.json   products the indexer rejected
//   merged_products.json     products folded into an earlier model bucket,
//                            with the key they were folded into
//   unmatched_listings.json  listings with no manufacturer, then listings
//                            with a manufacturer but no single model
//   outlier_listings.json    listings evicted as cost outliers
//   summary.json             RunSummary
//
// Nothing is dropped silently: every input record lands in exactly one of
// these sets.

use crate::index::CatalogIndex;
use crate::indexer::MergedProduct;
use crate::models::{Listing, Market, Product};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// RESULT LINES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultLine<'a> {
    pub product_name: &'a str,
    pub listings: &'a [Listing],
}

/// Result lines in output order
pub fn result_lines<'a>(index: &'a CatalogIndex, rejected: &'a [Product]) -> Vec<ResultLine<'a>> {
    let matched = index.model_buckets().map(|bucket| ResultLine {
        product_name: &bucket.product.product_name,
        listings: &bucket.listings,
    });
    let unhashed = rejected.iter().map(|product| ResultLine {
        product_name: &product.product_name,
        listings: &[],
    });

    matched.chain(unhashed).collect()
}

/// Listings not placed under a specific product
pub fn unmatched_listings(index: &CatalogIndex) -> Vec<&Listing> {
    index
        .unknown
        .iter()
        .chain(index.manufacturers.iter().flat_map(|m| m.unknown.iter()))
        .collect()
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSummary {
    pub listings: usize,
    pub matched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub products_total: usize,
    pub products_indexed: usize,
    pub products_rejected: usize,
    pub products_merged: usize,

    pub listings_total: usize,
    pub listings_matched: usize,
    pub listings_without_manufacturer: usize,
    pub listings_without_model: usize,
    pub listings_ambiguous: usize,
    pub listings_outliers: usize,

    pub buckets_filtered: usize,
    pub buckets_skipped: usize,
    pub buckets_with_fallback_rates: usize,

    pub markets: BTreeMap<String, MarketSummary>,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl RunSummary {
    pub fn indexed_percent(&self) -> f64 {
        percent(self.products_indexed, self.products_total)
    }

    pub fn matched_percent(&self) -> f64 {
        percent(self.listings_matched, self.listings_total)
    }

    /// Count listings and matched listings per market
    pub fn record_markets<'a>(
        &mut self,
        listings: impl IntoIterator<Item = &'a Listing>,
        index: &CatalogIndex,
        english: &[String],
    ) {
        self.markets.clear();
        for listing in listings {
            self.market_entry(listing.market(english)).listings += 1;
        }
        for listing in index.model_buckets().flat_map(|b| b.listings.iter()) {
            self.market_entry(listing.market(english)).matched += 1;
        }
    }

    fn market_entry(&mut self, market: Market) -> &mut MarketSummary {
        self.markets.entry(market.as_str().to_string()).or_default()
    }

    pub fn log(&self) {
        info!(
            "Indexed {:.1}% of products ({} of {}, {} rejected, {} merged)",
            self.indexed_percent(),
            self.products_indexed,
            self.products_total,
            self.products_rejected,
            self.products_merged
        );
        info!(
            "Matched {:.1}% of listings to products ({} of {})",
            self.matched_percent(),
            self.listings_matched,
            self.listings_total
        );
        info!(
            "Unmatched: {} without manufacturer, {} without model ({} ambiguous); removed {} cost outliers",
            self.listings_without_manufacturer,
            self.listings_without_model,
            self.listings_ambiguous,
            self.listings_outliers
        );
        for (market, summary) in &self.markets {
            info!(
                "  {} market: {} of {} listings matched ({:.1}%)",
                market,
                summary.matched,
                summary.listings,
                percent(summary.matched, summary.listings)
            );
        }
    }
}

// ============================================================================
// ARTIFACT WRITER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub results: PathBuf,
    pub unhashed_products: PathBuf,
    pub merged_products: PathBuf,
    pub unmatched_listings: PathBuf,
    pub outlier_listings: PathBuf,
    pub summary: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        OutputPaths {
            results: dir.join("results.txt"),
            unhashed_products: dir.join("unhashed_products.json"),
            merged_products: dir.join("merged_products.json"),
            unmatched_listings: dir.join("unmatched_listings.json"),
            outlier_listings: dir.join("outlier_listings.json"),
            summary: dir.join("summary.json"),
        }
    }
}

pub fn write_artifacts(
    dir: &Path,
    index: &CatalogIndex,
    rejected: &[Product],
    merged: &[MergedProduct],
    outliers: &[Listing],
    summary: &RunSummary,
) -> Result<OutputPaths> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let paths = OutputPaths::in_dir(dir);

    let file = File::create(&paths.results)
        .with_context(|| format!("Failed to create {}", paths.results.display()))?;
    let mut out = BufWriter::new(file);
    for line in result_lines(index, rejected) {
        serde_json::to_writer(&mut out, &line).context("Failed to serialize result line")?;
        out.write_all(b"\n")?;
    }
    out.flush()
        .with_context(|| format!("Failed to write {}", paths.results.display()))?;

    write_pretty(&paths.unhashed_products, rejected)?;
    write_pretty(&paths.merged_products, merged)?;
    write_pretty(&paths.unmatched_listings, &unmatched_listings(index))?;
    write_pretty(&paths.outlier_listings, outliers)?;
    write_pretty(&paths.summary, summary)?;

    info!("Wrote results to {}", paths.results.display());
    Ok(paths)
}

fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut ser)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;

    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ManufacturerBucket, ModelBucket};
    use serde_json::{json, Value};

    fn sample_index() -> CatalogIndex {
        let mut acme = ManufacturerBucket::new("acme");
        acme.models.push(ModelBucket {
            model: "x100".to_string(),
            product: Product::new("Acme", "X100", "Acme X100"),
            listings: vec![Listing::new("acme x100 camera", "Acme Corp", "USD", 199.99)],
        });
        acme.unknown.push(Listing::new("acme strap", "Acme", "USD", 9.99));

        CatalogIndex {
            manufacturers: vec![acme],
            unknown: vec![Listing::new("unrelated gadget", "Zeta", "USD", 49.99)],
        }
    }

    #[test]
    fn test_result_lines_include_rejected_products() {
        let index = sample_index();
        let rejected = vec![Product::new("HP", "R9", "HP R9")];

        let lines: Vec<Value> = result_lines(&index, &rejected)
            .iter()
            .map(|l| serde_json::to_value(l).unwrap())
            .collect();

        assert_eq!(
            lines,
            vec![
                json!({
                    "product_name": "Acme X100",
                    "listings": [{
                        "title": "acme x100 camera",
                        "manufacturer": "Acme Corp",
                        "currency": "USD",
                        "price": 199.99
                    }]
                }),
                json!({"product_name": "HP R9", "listings": []}),
            ]
        );
    }

    #[test]
    fn test_unmatched_listings_order() {
        let index = sample_index();
        let titles: Vec<&str> = unmatched_listings(&index)
            .iter()
            .map(|l| l.title.as_str())
            .collect();
        assert_eq!(titles, vec!["unrelated gadget", "acme strap"]);
    }

    #[test]
    fn test_write_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        let outliers = vec![Listing::new("acme x100 gold", "Acme", "USD", 9999.0)];

        let merged = vec![MergedProduct {
            manufacturer: "acme".to_string(),
            kept_model: "x100".to_string(),
            product: Product::new("Acme", "X100 Kit", "Acme X100 Kit"),
        }];

        let paths = write_artifacts(
            &out,
            &sample_index(),
            &[],
            &merged,
            &outliers,
            &RunSummary::default(),
        )
        .unwrap();

        let results = fs::read_to_string(&paths.results).unwrap();
        assert_eq!(results.lines().count(), 1);
        assert!(results.starts_with(r#"{"product_name":"Acme X100""#));

        let unmatched: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&paths.unmatched_listings).unwrap()).unwrap();
        assert_eq!(unmatched.len(), 2);

        let evicted: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&paths.outlier_listings).unwrap()).unwrap();
        assert_eq!(evicted[0]["price"], json!(9999.0));

        let unhashed: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&paths.unhashed_products).unwrap()).unwrap();
        assert!(unhashed.is_empty());

        let folded: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&paths.merged_products).unwrap()).unwrap();
        assert_eq!(
            folded,
            vec![json!({
                "manufacturer": "acme",
                "kept_model": "x100",
                "product": {"product_name": "Acme X100 Kit", "manufacturer": "Acme", "model": "X100 Kit"}
            })]
        );
    }

    #[test]
    fn test_summary_percentages() {
        let summary = RunSummary {
            products_total: 4,
            products_indexed: 3,
            listings_total: 0,
            ..RunSummary::default()
        };
        assert_eq!(summary.indexed_percent(), 75.0);
        assert_eq!(summary.matched_percent(), 0.0);
    }

    #[test]
    fn test_record_markets() {
        let index = sample_index();
        let foreign = Listing::new("Appareil", "Acme", "EUR", 10.0);

        let mut summary = RunSummary::default();
        summary.record_markets(
            index.all_listings().chain([&foreign]),
            &index,
            &["USD".to_string()],
        );

        assert_eq!(summary.markets["english"], MarketSummary { listings: 3, matched: 1 });
        assert_eq!(summary.markets["foreign"], MarketSummary { listings: 1, matched: 0 });
    }
}

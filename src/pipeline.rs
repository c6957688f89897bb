// 🚚 Pipeline - one batch run: index → match → filter → write
//
// Each stage takes ownership of the catalog index and hands it to the next,
// so there is exactly one writer at a time. Stages run strictly in sequence.

use crate::config::LinkageConfig;
use crate::currency::{CurrencyConverter, RateTable};
use crate::error::LinkageError;
use crate::index::CatalogIndex;
use crate::indexer::{CatalogIndexer, MergedProduct};
use crate::io::load_json_lines;
use crate::matcher::{ListingMatcher, MatchReport};
use crate::models::{Listing, Product};
use crate::outliers::{FilterReport, OutlierFilter};
use crate::report::{write_artifacts, OutputPaths, RunSummary};
use anyhow::Result;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub index: CatalogIndex,
    pub rejected: Vec<Product>,
    pub merged: Vec<MergedProduct>,
    pub match_report: MatchReport,
    pub filter_report: FilterReport,
    pub summary: RunSummary,
}

impl LinkOutcome {
    pub fn outliers(&self) -> &[Listing] {
        &self.filter_report.evicted
    }
}

/// Run the matching engine over in-memory records
pub fn link<C>(
    config: &LinkageConfig,
    products: Vec<Product>,
    listings: Vec<Listing>,
    converter: &C,
) -> std::result::Result<LinkOutcome, LinkageError>
where
    C: CurrencyConverter + ?Sized,
{
    config.validate()?;

    let products_total = products.len();
    let before = fingerprints(listings.iter());

    let outcome = CatalogIndexer::new(config.indexer_config()).build(products)?;
    let (index, match_report) = ListingMatcher::new(config.strict).match_listings(outcome.index, listings);
    let (index, filter_report) = OutlierFilter::new(config.filter_config()).filter(index, converter);

    let after = fingerprints(index.all_listings().chain(filter_report.evicted.iter()));
    if before != after {
        return Err(LinkageError::ConservationViolated(format!(
            "{} distinct listings in, {} distinct listings out",
            before.len(),
            after.len()
        )));
    }

    let mut summary = RunSummary {
        products_total,
        products_indexed: index.model_count(),
        products_rejected: outcome.rejected.len(),
        products_merged: outcome.merged.len(),
        listings_total: match_report.total,
        listings_matched: index.matched_listing_count(),
        listings_without_manufacturer: index.unknown.len(),
        listings_without_model: index.manufacturers.iter().map(|m| m.unknown.len()).sum(),
        listings_ambiguous: match_report.ambiguous,
        listings_outliers: filter_report.evicted.len(),
        buckets_filtered: filter_report.buckets_filtered,
        buckets_skipped: filter_report.skipped.len(),
        buckets_with_fallback_rates: filter_report.buckets_with_fallback_rates,
        ..RunSummary::default()
    };
    summary.record_markets(
        index.all_listings().chain(filter_report.evicted.iter()),
        &index,
        &config.english_currencies,
    );

    Ok(LinkOutcome {
        index,
        rejected: outcome.rejected,
        merged: outcome.merged,
        match_report,
        filter_report,
        summary,
    })
}

/// Full batch run from files to artifacts
pub fn run(config: &LinkageConfig) -> Result<(LinkOutcome, OutputPaths)> {
    info!("Loading products from {}", config.products.display());
    let products: Vec<Product> = load_json_lines(&config.products)?;

    info!("Loading listings from {}", config.listings.display());
    let listings: Vec<Listing> = load_json_lines(&config.listings)?;

    let rates = match &config.rates {
        Some(path) => {
            let table = RateTable::load(path, config.rate_fallback)?;
            info!("Loaded exchange rates for {} days", table.day_count());
            table
        }
        None => {
            warn!("No exchange rate file configured; only same-currency buckets can be filtered");
            RateTable::empty()
        }
    };

    let outcome = link(config, products, listings, &rates)?;
    outcome.summary.log();

    let paths = write_artifacts(
        &config.output_dir,
        &outcome.index,
        &outcome.rejected,
        &outcome.merged,
        outcome.outliers(),
        &outcome.summary,
    )?;

    Ok((outcome, paths))
}

fn fingerprints<'a>(listings: impl Iterator<Item = &'a Listing>) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for listing in listings {
        *counts.entry(listing.fingerprint()).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BucketKey;

    fn config() -> LinkageConfig {
        LinkageConfig::default()
    }

    #[test]
    fn test_link_end_to_end_example() {
        let products = vec![Product::new("Acme", "X100", "Acme X100")];
        let listings = vec![
            Listing::new("acme x100 camera", "Acme Corp", "USD", 199.99),
            Listing::new("unrelated gadget", "Zeta", "USD", 49.99),
        ];

        let outcome = link(&config(), products, listings, &RateTable::empty()).unwrap();

        let matched = outcome
            .index
            .listings(&BucketKey::known("acme"), &BucketKey::known("x100"))
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(outcome.index.unknown[0].title, "unrelated gadget");

        let summary = &outcome.summary;
        assert_eq!(summary.products_indexed, 1);
        assert_eq!(summary.listings_matched, 1);
        assert_eq!(summary.listings_without_manufacturer, 1);
        assert_eq!(summary.matched_percent(), 50.0);
        assert_eq!(summary.markets["english"].listings, 2);
    }

    #[test]
    fn test_link_removes_outliers_and_accounts_for_every_listing() {
        let products = vec![
            Product::new("Acme", "X100", "Acme X100"),
            Product::new("HP", "R967", "HP R967"),
        ];
        let mut listings: Vec<Listing> = (0..4)
            .map(|i| Listing::new(&format!("Acme X100 offer {}", i), "Acme", "USD", 100.0))
            .collect();
        listings.push(Listing::new("Acme X100 gold edition", "Acme", "USD", 1000.0));
        listings.push(Listing::new("Acme Z200 objectif", "Acme", "EUR", 80.0));

        let outcome = link(&config(), products, listings, &RateTable::empty()).unwrap();

        assert_eq!(outcome.outliers().len(), 1);
        assert_eq!(outcome.outliers()[0].title, "Acme X100 gold edition");
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.summary.listings_matched, 4);
        assert_eq!(outcome.summary.listings_without_model, 1);
        assert_eq!(outcome.summary.markets["foreign"], crate::report::MarketSummary { listings: 1, matched: 0 });
    }

    #[test]
    fn test_link_rejects_invalid_config() {
        let bad = LinkageConfig {
            n_stdevs: f64::NAN,
            ..config()
        };
        let err = link(&bad, vec![], vec![], &RateTable::empty()).unwrap_err();
        assert!(matches!(err, LinkageError::InvalidConfig(_)));
    }

    #[test]
    fn test_link_propagates_reserved_name() {
        let products = vec![Product::new("Unknown", "X100", "Mystery X100")];
        let err = link(&config(), products, vec![], &RateTable::empty()).unwrap_err();
        assert!(matches!(err, LinkageError::ReservedName { .. }));
    }
}

// 📉 Outlier Filter - evict listings priced far from their product's median
//
// Per model bucket with at least two listings:
//   1. convert every price to the base currency as of the product's
//      announcement date (one reference date per product)
//   2. bounds = median ± n_stdevs · sample stdev
//   3. evict listings outside the bounds
//
// By default each listing's RAW price is tested against bounds computed from
// CONVERTED costs. That only holds up when currencies have similar
// magnitudes; PriceComparison::ConvertedCost compares like with like.
//
// A bucket whose prices cannot all be converted is left untouched and
// reported in FilterReport::skipped. It never aborts the stage.

use crate::currency::{CurrencyConverter, RateFallbackNote};
use crate::error::RateError;
use crate::index::{CatalogIndex, ModelBucket};
use crate::models::Listing;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Which value of a listing is tested against the bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PriceComparison {
    /// Unconverted listing price
    #[default]
    RawPrice,

    /// Listing price converted to the base currency
    ConvertedCost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Half-width of the accepted band in standard deviations (default: 2.0)
    pub n_stdevs: f64,

    /// Currency all costs are compared in (default: USD)
    pub base_currency: String,

    pub comparison: PriceComparison,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            n_stdevs: 2.0,
            base_currency: "USD".to_string(),
            comparison: PriceComparison::RawPrice,
        }
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Middle value; mean of the two middle values for even counts
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n - 1 denominator); needs two values
pub fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBounds {
    pub median: f64,
    pub stdev: f64,
    pub lower: f64,
    pub upper: f64,
}

impl PriceBounds {
    pub fn from_costs(costs: &[f64], n_stdevs: f64) -> Option<Self> {
        let median = median(costs)?;
        let stdev = sample_stdev(costs)?;

        Some(PriceBounds {
            median,
            stdev,
            lower: median - n_stdevs * stdev,
            upper: median + n_stdevs * stdev,
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

// ============================================================================
// FILTER REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedBucket {
    pub manufacturer: String,
    pub model: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterReport {
    /// Evicted listings, bucket by bucket in index order
    pub evicted: Vec<Listing>,

    /// Buckets excluded because a rate could not be resolved
    pub skipped: Vec<SkippedBucket>,

    /// Buckets that had enough listings and were filtered
    pub buckets_filtered: usize,

    /// Buckets filtered with at least one nearest-date rate
    pub buckets_with_fallback_rates: usize,
}

enum BucketOutcome {
    TooSmall,
    Filtered {
        evicted: Vec<Listing>,
        fallback: Option<RateFallbackNote>,
    },
}

// ============================================================================
// OUTLIER FILTER
// ============================================================================

pub struct OutlierFilter {
    config: FilterConfig,
}

impl OutlierFilter {
    pub fn new(config: FilterConfig) -> Self {
        OutlierFilter { config }
    }

    /// Evict cost outliers from every model bucket
    ///
    /// Reserved unknown buckets are never filtered.
    pub fn filter<C>(&self, mut index: CatalogIndex, converter: &C) -> (CatalogIndex, FilterReport)
    where
        C: CurrencyConverter + ?Sized,
    {
        let mut report = FilterReport::default();

        for manufacturer in index.manufacturers.iter_mut() {
            for bucket in manufacturer.models.iter_mut() {
                match self.filter_bucket(bucket, converter) {
                    Ok(BucketOutcome::TooSmall) => {}
                    Ok(BucketOutcome::Filtered { evicted, fallback }) => {
                        report.buckets_filtered += 1;
                        if let Some(note) = fallback {
                            report.buckets_with_fallback_rates += 1;
                            warn!(
                                manufacturer = %manufacturer.manufacturer,
                                model = %bucket.model,
                                currency = %note.currency,
                                requested = ?note.requested,
                                used = %note.used,
                                "converted with fallback rate"
                            );
                        }
                        report.evicted.extend(evicted);
                    }
                    Err(e) => {
                        warn!(
                            manufacturer = %manufacturer.manufacturer,
                            model = %bucket.model,
                            "skipping outlier filter: {}",
                            e
                        );
                        report.skipped.push(SkippedBucket {
                            manufacturer: manufacturer.manufacturer.clone(),
                            model: bucket.model.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            "Removed {} cost outliers from {} buckets ({} skipped for missing rates)",
            report.evicted.len(),
            report.buckets_filtered,
            report.skipped.len()
        );

        (index, report)
    }

    fn filter_bucket<C>(&self, bucket: &mut ModelBucket, converter: &C) -> Result<BucketOutcome, RateError>
    where
        C: CurrencyConverter + ?Sized,
    {
        if bucket.listings.len() < 2 {
            return Ok(BucketOutcome::TooSmall);
        }

        let as_of = bucket.product.announced_on();
        let base = self.config.base_currency.as_str();

        // Convert everything before touching the bucket
        let conversions = bucket
            .listings
            .iter()
            .map(|l| converter.convert(l.price.amount(), &l.currency, base, as_of))
            .collect::<Result<Vec<_>, _>>()?;

        let fallback = conversions.iter().find_map(|c| c.fallback.clone());
        let costs: Vec<f64> = conversions.iter().map(|c| c.amount).collect();

        let Some(bounds) = PriceBounds::from_costs(&costs, self.config.n_stdevs) else {
            return Ok(BucketOutcome::TooSmall);
        };

        // Identical costs leave nothing to stand out; the bucket stays as is
        if bounds.stdev == 0.0 {
            return Ok(BucketOutcome::Filtered {
                evicted: Vec::new(),
                fallback,
            });
        }

        let (kept, evicted): (Vec<_>, Vec<_>) = std::mem::take(&mut bucket.listings)
            .into_iter()
            .zip(costs)
            .partition(|(listing, cost)| {
                let value = match self.config.comparison {
                    PriceComparison::RawPrice => listing.price.amount(),
                    PriceComparison::ConvertedCost => *cost,
                };
                bounds.contains(value)
            });

        bucket.listings = kept.into_iter().map(|(listing, _)| listing).collect();
        let evicted: Vec<Listing> = evicted.into_iter().map(|(listing, _)| listing).collect();

        if !evicted.is_empty() {
            debug!(
                model = %bucket.model,
                median = bounds.median,
                stdev = bounds.stdev,
                evicted = evicted.len(),
                "evicted cost outliers"
            );
        }

        Ok(BucketOutcome::Filtered { evicted, fallback })
    }
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::{RateFallback, RateTable};
    use crate::index::ManufacturerBucket;
    use crate::models::Product;
    use chrono::NaiveDate;

    fn index_with(prices: &[(f64, &str)]) -> CatalogIndex {
        let mut acme = ManufacturerBucket::new("acme");
        acme.models.push(ModelBucket {
            model: "x100".to_string(),
            product: Product::new("Acme", "X100", "Acme X100").with_announced_date("2010-01-04"),
            listings: prices
                .iter()
                .enumerate()
                .map(|(i, (price, currency))| {
                    Listing::new(&format!("acme x100 #{}", i), "Acme", currency, *price)
                })
                .collect(),
        });
        CatalogIndex {
            manufacturers: vec![acme],
            unknown: Vec::new(),
        }
    }

    fn bucket(index: &CatalogIndex) -> &ModelBucket {
        &index.manufacturers[0].models[0]
    }

    fn rates() -> RateTable {
        let mut table = RateTable::new("EUR", RateFallback::Exact);
        let day = NaiveDate::from_ymd_opt(2010, 1, 4).unwrap();
        table.insert(day, "USD", 1.25);
        table.insert(day, "JPY", 125.0);
        table
    }

    #[test]
    fn test_median_and_stdev() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);

        assert_eq!(sample_stdev(&[5.0]), None);
        assert_eq!(sample_stdev(&[2.0, 2.0]), Some(0.0));
        let s = sample_stdev(&[100.0, 100.0, 100.0, 100.0, 1000.0]).unwrap();
        assert!((s - 402.4922).abs() < 1e-3);
    }

    #[test]
    fn test_single_expensive_listing_is_evicted() {
        let index = index_with(&[
            (100.0, "USD"),
            (100.0, "USD"),
            (100.0, "USD"),
            (100.0, "USD"),
            (1000.0, "USD"),
        ]);

        let (index, report) = OutlierFilter::default().filter(index, &RateTable::empty());

        assert_eq!(report.evicted.len(), 1);
        assert_eq!(report.evicted[0].price.amount(), 1000.0);
        assert_eq!(bucket(&index).listings.len(), 4);
        assert_eq!(report.buckets_filtered, 1);
    }

    #[test]
    fn test_identical_prices_are_never_evicted() {
        let index = index_with(&[(250.0, "USD"), (250.0, "USD")]);
        let (index, report) = OutlierFilter::default().filter(index, &RateTable::empty());

        assert!(report.evicted.is_empty());
        assert_eq!(bucket(&index).listings.len(), 2);
    }

    #[test]
    fn test_identical_foreign_prices_are_never_evicted() {
        // 250 EUR converts to 312.5 USD, so raw prices sit outside a zero-width band
        let index = index_with(&[(250.0, "EUR"), (250.0, "EUR")]);
        let (index, report) = OutlierFilter::default().filter(index, &rates());

        assert!(report.evicted.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(bucket(&index).listings.len(), 2);
    }

    #[test]
    fn test_singleton_and_unknown_buckets_untouched() {
        let mut index = index_with(&[(5000.0, "USD")]);
        index.manufacturers[0]
            .unknown
            .extend([Listing::new("a", "Acme", "USD", 1.0), Listing::new("b", "Acme", "USD", 1e6)]);
        index
            .unknown
            .extend([Listing::new("c", "Zeta", "USD", 1.0), Listing::new("d", "Zeta", "USD", 1e6)]);

        let (index, report) = OutlierFilter::default().filter(index, &RateTable::empty());

        assert!(report.evicted.is_empty());
        assert_eq!(report.buckets_filtered, 0);
        assert_eq!(index.listing_count(), 5);
    }

    #[test]
    fn test_missing_rate_skips_bucket() {
        let index = index_with(&[(100.0, "USD"), (100.0, "GBP"), (9000.0, "USD")]);
        let (index, report) = OutlierFilter::default().filter(index, &rates());

        assert!(report.evicted.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].model, "x100");
        assert_eq!(bucket(&index).listings.len(), 3);
    }

    #[test]
    fn test_remaining_order_is_preserved() {
        let index = index_with(&[
            (100.0, "USD"),
            (1000.0, "USD"),
            (101.0, "USD"),
            (99.0, "USD"),
            (100.0, "USD"),
        ]);
        let (index, report) = OutlierFilter::default().filter(index, &RateTable::empty());

        assert_eq!(report.evicted.len(), 1);
        let titles: Vec<&str> = bucket(&index).listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["acme x100 #0", "acme x100 #2", "acme x100 #3", "acme x100 #4"]
        );
    }

    #[test]
    fn test_raw_price_versus_converted_cost() {
        // 10000 JPY ≈ 100 USD on the announcement day
        let prices = [(10000.0, "JPY"), (10100.0, "JPY"), (9900.0, "JPY")];

        let (_, raw) = OutlierFilter::default().filter(index_with(&prices), &rates());
        assert_eq!(raw.evicted.len(), 3);

        let converted = OutlierFilter::new(FilterConfig {
            comparison: PriceComparison::ConvertedCost,
            ..FilterConfig::default()
        });
        let (index, report) = converted.filter(index_with(&prices), &rates());
        assert!(report.evicted.is_empty());
        assert_eq!(bucket(&index).listings.len(), 3);
    }

    #[test]
    fn test_fallback_rates_are_counted() {
        let mut table = RateTable::new("EUR", RateFallback::NearestDate);
        table.insert(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(), "USD", 1.25);
        table.insert(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(), "CAD", 1.25);

        let index = index_with(&[(100.0, "CAD"), (100.0, "USD")]);
        let (_, report) = OutlierFilter::default().filter(index, &table);

        assert_eq!(report.buckets_filtered, 1);
        assert_eq!(report.buckets_with_fallback_rates, 1);
        assert!(report.skipped.is_empty());
    }
}

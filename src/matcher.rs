// 🔗 Listing Matcher - hash listings into the catalog index
//
// One pass over the working listing list per manufacturer, in index order.
// Each pass partitions the list into listings claimed by that manufacturer
// and listings left for later passes, so a listing is placed at most once
// and no index-shifting removal is needed.
//
// Manufacturer signals, strongest first:
//   1. manufacturer key ⊂ listing manufacturer   ("canon" ⊂ "canon canada")
//   2. listing manufacturer ⊂ manufacturer key   ("fuji" ⊂ "fujifilm")
//   3. manufacturer key ⊂ title (non-strict only)
//
// A title naming two or more models of the manufacturer is ambiguous and
// lands in the manufacturer's unknown bucket rather than guessing.

use crate::index::{CatalogIndex, ManufacturerBucket};
use crate::models::{Listing, SanitizedListing};
use serde::Serialize;
use tracing::{debug, info};

// ============================================================================
// MATCH DECISIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ManufacturerSignal {
    /// Manufacturer key found inside the listing's manufacturer field
    ManufacturerField,

    /// Listing's (non-empty) manufacturer field found inside the key
    ReverseManufacturerField,

    /// Manufacturer key found inside the title - weakest signal
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelMatch {
    /// Exactly one model key appears in the title (position in bucket)
    Single(usize),

    /// No model key appears in the title
    NoModel,

    /// Several model keys appear in the title
    Ambiguous(usize),
}

// ============================================================================
// MATCH REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchReport {
    pub total: usize,
    pub by_manufacturer_field: usize,
    pub by_reverse_manufacturer_field: usize,
    pub by_title: usize,
    pub model_matched: usize,
    pub model_unknown: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
}

impl MatchReport {
    fn record_signal(&mut self, signal: ManufacturerSignal) {
        match signal {
            ManufacturerSignal::ManufacturerField => self.by_manufacturer_field += 1,
            ManufacturerSignal::ReverseManufacturerField => self.by_reverse_manufacturer_field += 1,
            ManufacturerSignal::Title => self.by_title += 1,
        }
    }

    pub fn manufacturer_matched(&self) -> usize {
        self.by_manufacturer_field + self.by_reverse_manufacturer_field + self.by_title
    }
}

// ============================================================================
// LISTING MATCHER
// ============================================================================

pub struct ListingMatcher {
    /// Disables the title-only manufacturer signal
    pub strict: bool,
}

impl ListingMatcher {
    pub fn new(strict: bool) -> Self {
        ListingMatcher { strict }
    }

    /// Which signal, if any, ties a listing to `manufacturer`
    pub fn manufacturer_signal(
        &self,
        manufacturer: &str,
        listing: &SanitizedListing,
    ) -> Option<ManufacturerSignal> {
        if listing.manufacturer.contains(manufacturer) {
            return Some(ManufacturerSignal::ManufacturerField);
        }

        if !listing.manufacturer.is_empty() && manufacturer.contains(&listing.manufacturer) {
            return Some(ManufacturerSignal::ReverseManufacturerField);
        }

        if !self.strict && listing.title.contains(manufacturer) {
            return Some(ManufacturerSignal::Title);
        }

        None
    }

    /// Count the manufacturer's model keys that occur in `title`
    pub fn model_match(bucket: &ManufacturerBucket, title: &str) -> ModelMatch {
        let mut hits = bucket
            .models
            .iter()
            .enumerate()
            .filter(|(_, m)| title.contains(m.model.as_str()))
            .map(|(position, _)| position);

        match (hits.next(), hits.count()) {
            (None, _) => ModelMatch::NoModel,
            (Some(position), 0) => ModelMatch::Single(position),
            (Some(_), more) => ModelMatch::Ambiguous(more + 1),
        }
    }

    /// Place every listing into the index
    ///
    /// Takes ownership of both the index and the listings and hands the
    /// populated index back. Listings no manufacturer claimed end up in the
    /// index's top-level unknown bucket.
    pub fn match_listings(
        &self,
        mut index: CatalogIndex,
        listings: Vec<Listing>,
    ) -> (CatalogIndex, MatchReport) {
        let mut report = MatchReport {
            total: listings.len(),
            ..MatchReport::default()
        };

        let mut working: Vec<(Listing, SanitizedListing)> = listings
            .into_iter()
            .map(|listing| {
                let view = listing.sanitized();
                (listing, view)
            })
            .collect();

        for bucket in index.manufacturers.iter_mut() {
            let mut remaining = Vec::with_capacity(working.len());

            for (listing, view) in working {
                let Some(signal) = self.manufacturer_signal(&bucket.manufacturer, &view) else {
                    remaining.push((listing, view));
                    continue;
                };
                report.record_signal(signal);

                match Self::model_match(bucket, &view.title) {
                    ModelMatch::Single(position) => {
                        report.model_matched += 1;
                        bucket.models[position].listings.push(listing);
                    }
                    ModelMatch::NoModel => {
                        report.model_unknown += 1;
                        bucket.unknown.push(listing);
                    }
                    ModelMatch::Ambiguous(count) => {
                        debug!(
                            manufacturer = %bucket.manufacturer,
                            title = %listing.title,
                            models = count,
                            "ambiguous model match, keeping under manufacturer"
                        );
                        report.ambiguous += 1;
                        bucket.unknown.push(listing);
                    }
                }
            }

            working = remaining;
        }

        report.unmatched = working.len();
        index.unknown.extend(working.into_iter().map(|(listing, _)| listing));

        info!(
            "Matched {} of {} listings to a manufacturer ({} to a model, {} ambiguous)",
            report.manufacturer_matched(),
            report.total,
            report.model_matched,
            report.ambiguous
        );

        (index, report)
    }
}

impl Default for ListingMatcher {
    fn default() -> Self {
        Self::new(false)
    }
}

// ============================================================================
// TESTS
// ============================================================================

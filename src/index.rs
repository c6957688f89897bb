// 🗂️ Catalog Index - manufacturer → model → {product, listings}
//
// The reserved catch-all buckets live in their own fields instead of under
// a sentinel map key, so a real manufacturer or model literally named
// "unknown" cannot collide with them. BucketKey addresses either kind.
//
// Manufacturers and models keep insertion order: the matcher walks them in
// that order and the first-seen model wins deduplication.

use crate::models::{Listing, Product};
use serde::Serialize;
use std::fmt;

// ============================================================================
// BUCKET KEY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum BucketKey {
    Known(String),
    Unknown,
}

impl BucketKey {
    pub fn known(key: &str) -> Self {
        BucketKey::Known(key.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, BucketKey::Unknown)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Known(key) => f.write_str(key),
            BucketKey::Unknown => f.write_str("<unknown>"),
        }
    }
}

// ============================================================================
// BUCKETS
// ============================================================================

/// Listings matched to one specific catalog product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelBucket {
    pub model: String,
    pub product: Product,
    pub listings: Vec<Listing>,
}

/// All buckets of one manufacturer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManufacturerBucket {
    pub manufacturer: String,
    pub models: Vec<ModelBucket>,

    /// Listings matched to this manufacturer but to no single model
    pub unknown: Vec<Listing>,
}

impl ManufacturerBucket {
    pub fn new(manufacturer: &str) -> Self {
        ManufacturerBucket {
            manufacturer: manufacturer.to_string(),
            models: Vec::new(),
            unknown: Vec::new(),
        }
    }

    pub fn model(&self, model: &str) -> Option<&ModelBucket> {
        self.models.iter().find(|m| m.model == model)
    }

    pub fn model_keys(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.model.as_str())
    }

    pub fn listing_count(&self) -> usize {
        self.unknown.len() + self.models.iter().map(|m| m.listings.len()).sum::<usize>()
    }
}

// ============================================================================
// CATALOG INDEX
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogIndex {
    pub manufacturers: Vec<ManufacturerBucket>,

    /// Listings whose manufacturer could not be determined
    pub unknown: Vec<Listing>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        CatalogIndex::default()
    }

    pub fn manufacturer(&self, manufacturer: &str) -> Option<&ManufacturerBucket> {
        self.manufacturers
            .iter()
            .find(|m| m.manufacturer == manufacturer)
    }

    pub fn manufacturer_mut(&mut self, manufacturer: &str) -> Option<&mut ManufacturerBucket> {
        self.manufacturers
            .iter_mut()
            .find(|m| m.manufacturer == manufacturer)
    }

    pub fn manufacturer_keys(&self) -> impl Iterator<Item = &str> {
        self.manufacturers.iter().map(|m| m.manufacturer.as_str())
    }

    /// Listings stored under (manufacturer, model)
    ///
    /// `(Unknown, _)` is the top-level unknown bucket; `(Known(m), Unknown)`
    /// is manufacturer `m`'s no-model bucket.
    pub fn listings(&self, manufacturer: &BucketKey, model: &BucketKey) -> Option<&[Listing]> {
        match (manufacturer, model) {
            (BucketKey::Unknown, _) => Some(&self.unknown),
            (BucketKey::Known(manu), BucketKey::Unknown) => {
                self.manufacturer(manu).map(|m| m.unknown.as_slice())
            }
            (BucketKey::Known(manu), BucketKey::Known(model)) => self
                .manufacturer(manu)
                .and_then(|m| m.model(model))
                .map(|b| b.listings.as_slice()),
        }
    }

    /// Every model bucket, in index order
    pub fn model_buckets(&self) -> impl Iterator<Item = &ModelBucket> {
        self.manufacturers.iter().flat_map(|m| m.models.iter())
    }

    pub fn model_count(&self) -> usize {
        self.manufacturers.iter().map(|m| m.models.len()).sum()
    }

    /// Listings matched to a specific product
    pub fn matched_listing_count(&self) -> usize {
        self.model_buckets().map(|b| b.listings.len()).sum()
    }

    /// Every listing held anywhere in the index
    pub fn listing_count(&self) -> usize {
        self.unknown.len()
            + self
                .manufacturers
                .iter()
                .map(ManufacturerBucket::listing_count)
                .sum::<usize>()
    }

    /// Every listing held anywhere in the index, in index order
    pub fn all_listings(&self) -> impl Iterator<Item = &Listing> {
        self.manufacturers
            .iter()
            .flat_map(|m| {
                m.models
                    .iter()
                    .flat_map(|b| b.listings.iter())
                    .chain(m.unknown.iter())
            })
            .chain(self.unknown.iter())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> CatalogIndex {
        let mut acme = ManufacturerBucket::new("acme");
        acme.models.push(ModelBucket {
            model: "x100".to_string(),
            product: Product::new("Acme", "X100", "Acme X100"),
            listings: vec![Listing::new("acme x100", "Acme", "USD", 199.99)],
        });
        acme.unknown.push(Listing::new("acme thing", "Acme", "USD", 10.0));

        CatalogIndex {
            manufacturers: vec![acme],
            unknown: vec![Listing::new("gadget", "Zeta", "USD", 49.99)],
        }
    }

    #[test]
    fn test_listings_by_bucket_key() {
        let index = sample_index();

        let matched = index
            .listings(&BucketKey::known("acme"), &BucketKey::known("x100"))
            .unwrap();
        assert_eq!(matched.len(), 1);

        let no_model = index
            .listings(&BucketKey::known("acme"), &BucketKey::Unknown)
            .unwrap();
        assert_eq!(no_model[0].title, "acme thing");

        let top = index.listings(&BucketKey::Unknown, &BucketKey::Unknown).unwrap();
        assert_eq!(top[0].title, "gadget");

        assert!(index
            .listings(&BucketKey::known("zeta"), &BucketKey::Unknown)
            .is_none());
    }

    #[test]
    fn test_reserved_bucket_never_collides_with_real_key() {
        let mut index = sample_index();
        index.manufacturers.push(ManufacturerBucket::new("unknown"));

        let top = index.listings(&BucketKey::Unknown, &BucketKey::Unknown).unwrap();
        assert_eq!(top.len(), 1);
        let real = index
            .listings(&BucketKey::known("unknown"), &BucketKey::Unknown)
            .unwrap();
        assert!(real.is_empty());
    }

    #[test]
    fn test_counts() {
        let index = sample_index();
        assert_eq!(index.model_count(), 1);
        assert_eq!(index.matched_listing_count(), 1);
        assert_eq!(index.listing_count(), 3);
        assert_eq!(index.all_listings().count(), 3);
    }
}

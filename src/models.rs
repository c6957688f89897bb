// 📦 Records: catalog products and noisy listings
//
// Products are immutable once loaded. Listings only ever carry their
// original fields: the sanitized view used while matching is a separate
// value (SanitizedListing) and never ends up inside a bucket.

use crate::sanitize::sanitize;
use chrono::{DateTime, NaiveDate};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::fmt;

// ============================================================================
// PRICE
// ============================================================================

/// Listing price
///
/// Feeds publish prices either as JSON numbers or as numeric strings
/// ("35.99"). The amount is parsed once at load time; the original JSON
/// value is kept so the listing serializes back exactly as it came in.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    amount: f64,
    original: Option<RawPrice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Number(Number),
    Text(String),
}

impl Price {
    pub fn new(amount: f64) -> Self {
        Price { amount, original: None }
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.original {
            Some(RawPrice::Number(number)) => write!(f, "{}", number),
            Some(RawPrice::Text(text)) => f.write_str(text),
            None => write!(f, "{}", self.amount),
        }
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.original {
            Some(raw) => raw.serialize(serializer),
            None => serializer.serialize_f64(self.amount),
        }
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPrice::deserialize(deserializer)?;
        let amount = match &raw {
            RawPrice::Number(number) => number.as_f64(),
            RawPrice::Text(text) => text.trim().parse::<f64>().ok(),
        };

        match amount {
            Some(amount) if amount.is_finite() => Ok(Price {
                amount,
                original: Some(raw),
            }),
            _ => {
                let shown = match raw {
                    RawPrice::Number(number) => number.to_string(),
                    RawPrice::Text(text) => text,
                };
                Err(de::Error::custom(format!("invalid price '{}'", shown)))
            }
        }
    }
}

// ============================================================================
// PRODUCT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_name: String,
    pub manufacturer: String,
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    /// Announcement timestamp as published ("2010-01-06T19:00:00.000-05:00")
    #[serde(rename = "announced-date", default, skip_serializing_if = "Option::is_none")]
    pub announced_date: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lowercased, punctuation-free view of the fields used for hashing
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedProduct {
    pub manufacturer: String,
    pub model: String,
    pub family: Option<String>,
}

impl Product {
    pub fn new(manufacturer: &str, model: &str, product_name: &str) -> Self {
        Product {
            product_name: product_name.to_string(),
            manufacturer: manufacturer.to_string(),
            model: model.to_string(),
            family: None,
            announced_date: None,
            extra: Map::new(),
        }
    }

    pub fn with_family(mut self, family: &str) -> Self {
        self.family = Some(family.to_string());
        self
    }

    pub fn with_announced_date(mut self, date: &str) -> Self {
        self.announced_date = Some(date.to_string());
        self
    }

    pub fn sanitized(&self) -> SanitizedProduct {
        SanitizedProduct {
            manufacturer: sanitize(&self.manufacturer),
            model: sanitize(&self.model),
            family: self.family.as_deref().map(sanitize),
        }
    }

    /// Calendar date the product was announced, if it can be read
    ///
    /// Accepts RFC 3339 timestamps, plain `YYYY-MM-DD` dates and anything
    /// starting with a `YYYY-MM-DD` prefix.
    pub fn announced_on(&self) -> Option<NaiveDate> {
        let raw = self.announced_date.as_deref()?.trim();

        if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
            return Some(timestamp.date_naive());
        }

        raw.get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
    }
}

// ============================================================================
// LISTING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub manufacturer: String,
    pub currency: String,
    pub price: Price,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Transient matching view of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedListing {
    pub manufacturer: String,
    pub title: String,
}

/// Fixed currency-based market split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    English,
    Foreign,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::English => "english",
            Market::Foreign => "foreign",
        }
    }
}

impl Listing {
    pub fn new(title: &str, manufacturer: &str, currency: &str, price: f64) -> Self {
        Listing {
            title: title.to_string(),
            manufacturer: manufacturer.to_string(),
            currency: currency.to_string(),
            price: Price::new(price),
            extra: Map::new(),
        }
    }

    pub fn sanitized(&self) -> SanitizedListing {
        SanitizedListing {
            manufacturer: sanitize(&self.manufacturer),
            title: sanitize(&self.title),
        }
    }

    pub fn market(&self, english_currencies: &[String]) -> Market {
        if english_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(self.currency.trim()))
        {
            Market::English
        } else {
            Market::Foreign
        }
    }

    /// Content hash used to check that no listing is lost or duplicated
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.title, self.manufacturer, self.currency, self.price
        ));
        for (key, value) in &self.extra {
            hasher.update(format!("\u{1e}{}={}", key, value));
        }
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_price_accepts_number_and_text() {
        let listing: Listing = serde_json::from_value(json!({
            "title": "Canon PowerShot SD1300",
            "manufacturer": "Canon",
            "currency": "CAD",
            "price": "129.99"
        }))
        .unwrap();
        assert_eq!(listing.price.amount(), 129.99);

        let listing: Listing = serde_json::from_value(json!({
            "title": "Canon PowerShot SD1300",
            "manufacturer": "Canon",
            "currency": "CAD",
            "price": 129.99
        }))
        .unwrap();
        assert_eq!(listing.price.amount(), 129.99);
    }

    #[test]
    fn test_integer_price_written_back_unchanged() {
        let line = r#"{"title":"Nikon D90","manufacturer":"Nikon","currency":"USD","price":100}"#;
        let listing: Listing = serde_json::from_str(line).unwrap();

        assert_eq!(listing.price.amount(), 100.0);
        assert_eq!(serde_json::to_string(&listing).unwrap(), line);
        assert_eq!(listing.price.to_string(), "100");
    }

    #[test]
    fn test_price_rejects_garbage() {
        let result: Result<Listing, _> = serde_json::from_value(json!({
            "title": "t",
            "manufacturer": "m",
            "currency": "USD",
            "price": "call for price"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_listing_serializes_original_fields_only() {
        let line = r#"{"title":"Nikon D90","manufacturer":"Nikon","currency":"USD","price":"499.00","seller":"bob"}"#;
        let listing: Listing = serde_json::from_str(line).unwrap();
        let _view = listing.sanitized();

        let out = serde_json::to_value(&listing).unwrap();
        assert_eq!(
            out,
            json!({
                "title": "Nikon D90",
                "manufacturer": "Nikon",
                "currency": "USD",
                "price": "499.00",
                "seller": "bob"
            })
        );
    }

    #[test]
    fn test_product_wire_format() {
        let product: Product = serde_json::from_value(json!({
            "product_name": "Sony_Cyber-shot_DSC-W310",
            "manufacturer": "Sony",
            "model": "DSC-W310",
            "family": "Cyber-shot",
            "announced-date": "2010-01-06T19:00:00.000-05:00"
        }))
        .unwrap();

        assert_eq!(product.family.as_deref(), Some("Cyber-shot"));
        assert_eq!(
            product.announced_on(),
            NaiveDate::from_ymd_opt(2010, 1, 6)
        );

        let view = product.sanitized();
        assert_eq!(view.manufacturer, "sony");
        assert_eq!(view.model, "dscw310");
        assert_eq!(view.family.as_deref(), Some("cybershot"));
    }

    #[test]
    fn test_announced_on_formats() {
        let plain = Product::new("Acme", "X100", "Acme X100").with_announced_date("2011-03-02");
        assert_eq!(plain.announced_on(), NaiveDate::from_ymd_opt(2011, 3, 2));

        let garbage = Product::new("Acme", "X100", "Acme X100").with_announced_date("soon");
        assert_eq!(garbage.announced_on(), None);

        let missing = Product::new("Acme", "X100", "Acme X100");
        assert_eq!(missing.announced_on(), None);
    }

    #[test]
    fn test_market_split() {
        let english = vec!["USD".to_string(), "CAD".to_string(), "GBP".to_string()];
        assert_eq!(Listing::new("t", "m", "usd", 1.0).market(&english), Market::English);
        assert_eq!(Listing::new("t", "m", "EUR", 1.0).market(&english), Market::Foreign);
    }

    #[test]
    fn test_fingerprint_distinguishes_listings() {
        let a = Listing::new("Nikon D90", "Nikon", "USD", 499.0);
        let b = Listing::new("Nikon D90", "Nikon", "USD", 499.5);
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}

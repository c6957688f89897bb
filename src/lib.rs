// Product Linkage - Core Library
// Links retailer listings to catalog products: index → match → filter → write

pub mod config;
pub mod currency;
pub mod error;
pub mod index;
pub mod indexer;
pub mod io;
pub mod matcher;
pub mod models;
pub mod outliers;
pub mod pipeline;
pub mod report;
pub mod sanitize;

// Re-export commonly used types
pub use config::{ConfigOverrides, LinkageConfig};
pub use currency::{Conversion, CurrencyConverter, RateFallback, RateFallbackNote, RateTable};
pub use error::{LinkageError, RateError, RESERVED_NAME};
pub use index::{BucketKey, CatalogIndex, ManufacturerBucket, ModelBucket};
pub use indexer::{CatalogIndexer, IndexOutcome, IndexerConfig, MergedProduct, ModelTokenStrategy};
pub use io::{load_json_lines, JsonRecord};
pub use matcher::{ListingMatcher, ManufacturerSignal, MatchReport, ModelMatch};
pub use models::{Listing, Market, Price, Product};
pub use outliers::{FilterConfig, FilterReport, OutlierFilter, PriceBounds, PriceComparison};
pub use pipeline::{link, run, LinkOutcome};
pub use report::{write_artifacts, OutputPaths, RunSummary};
pub use sanitize::sanitize;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

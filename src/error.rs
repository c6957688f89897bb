// ⚠️ Error taxonomy for the linkage engine
//
// Fatal errors abort the run (malformed input, broken invariants).
// Per-record conditions are NOT errors: rejected products, unmatched
// listings and ambiguous model matches are routed to their own buckets.
// RateError is the only recoverable error and is contained to one bucket.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Name reserved for the catch-all buckets of the catalog index
pub const RESERVED_NAME: &str = "unknown";

// ============================================================================
// FATAL ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LinkageError {
    #[error("input file not found: {0}")]
    MissingFile(PathBuf),

    #[error("{path}:{line}: malformed record: {source}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("record is missing required key '{0}'")]
    MissingKey(String),

    #[error("cannot sanitize non-string value for '{field}': {found}")]
    NotAString { field: String, found: String },

    #[error("invalid price '{0}'")]
    InvalidPrice(String),

    #[error("cannot index reserved {kind} name 'unknown' (product '{product_name}')")]
    ReservedName { kind: &'static str, product_name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("listing conservation violated: {0}")]
    ConservationViolated(String),
}

// ============================================================================
// RECOVERABLE RATE ERRORS (contained to one bucket)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    #[error("no exchange rate for currency {0}")]
    UnknownCurrency(String),

    #[error("no exchange rate for {currency} on {date}")]
    MissingRate { currency: String, date: NaiveDate },

    #[error("rate table is empty")]
    EmptyTable,
}

pub type Result<T> = std::result::Result<T, LinkageError>;

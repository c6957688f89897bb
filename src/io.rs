// 📂 JSON-lines loading
//
// One JSON object per line. Every line is checked for its required keys
// and string-typed fields before being deserialized, so a malformed feed
// fails with the file, line and field instead of a generic serde message.

use crate::error::LinkageError;
use crate::models::{Listing, Product};
use crate::sanitize::require_text;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// A record type read from a JSON-lines feed
pub trait JsonRecord: DeserializeOwned {
    /// Keys every record must carry
    const REQUIRED: &'static [&'static str];

    /// Keys that must hold strings when present
    const TEXT: &'static [&'static str];
}

impl JsonRecord for Product {
    const REQUIRED: &'static [&'static str] = &["product_name", "manufacturer", "model"];
    const TEXT: &'static [&'static str] =
        &["product_name", "manufacturer", "model", "family", "announced-date"];
}

impl JsonRecord for Listing {
    const REQUIRED: &'static [&'static str] = &["title", "manufacturer", "currency", "price"];
    const TEXT: &'static [&'static str] = &["title", "manufacturer", "currency"];
}

/// Check one raw record against its type's key contract
pub fn check_record<T: JsonRecord>(value: &Value) -> std::result::Result<(), LinkageError> {
    let Value::Object(fields) = value else {
        return Err(LinkageError::NotAString {
            field: "<record>".to_string(),
            found: value.to_string(),
        });
    };

    for key in T::REQUIRED {
        if !fields.contains_key(*key) {
            return Err(LinkageError::MissingKey(key.to_string()));
        }
    }

    for key in T::TEXT {
        match fields.get(*key) {
            // Optional text fields may be absent or null
            None | Some(Value::Null) if !T::REQUIRED.contains(key) => {}
            Some(v) => {
                require_text(key, v)?;
            }
            None => return Err(LinkageError::MissingKey(key.to_string())),
        }
    }

    Ok(())
}

/// Load every record of a JSON-lines file; blank lines are skipped
pub fn load_json_lines<T: JsonRecord>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(LinkageError::MissingFile(path.to_path_buf()).into());
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.with_context(|| format!("Failed to read {}:{}", path.display(), line_no))?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = serde_json::from_str::<Value>(&line).and_then(|value| {
            check_record::<T>(&value)
                .map(|_| value)
                .map_err(<serde_json::Error as serde::de::Error>::custom)
        });
        let value = match parsed {
            Ok(value) => value,
            Err(source) => {
                return Err(LinkageError::MalformedRecord {
                    path: path.to_path_buf(),
                    line: line_no,
                    source,
                }
                .into())
            }
        };

        let record = serde_json::from_value::<T>(value).map_err(|source| LinkageError::MalformedRecord {
            path: path.to_path_buf(),
            line: line_no,
            source,
        })?;
        records.push(record);
    }

    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

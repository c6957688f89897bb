// 💱 Currency conversion - external rate capability + ECB rate table
//
// The outlier filter only needs `CurrencyConverter`. RateTable is the
// bundled implementation: daily reference rates against a pivot currency
// (EUR for the ECB `eurofxref-hist.csv` feed). Any answer that had to use a
// different day than the one requested says so in `Conversion::fallback`.

use crate::error::RateError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

// ============================================================================
// CONVERTER CAPABILITY
// ============================================================================

/// Rate lookup had to use a different day than requested
#[derive(Debug, Clone, PartialEq)]
pub struct RateFallbackNote {
    pub currency: String,
    pub requested: Option<NaiveDate>,
    pub used: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub amount: f64,
    pub fallback: Option<RateFallbackNote>,
}

impl Conversion {
    pub fn exact(amount: f64) -> Self {
        Conversion {
            amount,
            fallback: None,
        }
    }
}

pub trait CurrencyConverter {
    /// Convert `amount` from one currency to another as of a date
    ///
    /// `as_of = None` asks for the most recent rate available.
    fn convert(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        as_of: Option<NaiveDate>,
    ) -> std::result::Result<Conversion, RateError>;
}

// ============================================================================
// RATE TABLE
// ============================================================================

/// What to do when a currency has no rate on the requested day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RateFallback {
    /// Use the closest day that has a rate (earlier day on ties)
    #[default]
    NearestDate,

    /// Fail the lookup
    Exact,
}

#[derive(Debug, Clone)]
pub struct RateTable {
    pivot: String,
    fallback: RateFallback,

    /// date → currency → units of currency per one pivot unit
    rates: BTreeMap<NaiveDate, HashMap<String, f64>>,
}

impl RateTable {
    pub fn new(pivot: &str, fallback: RateFallback) -> Self {
        RateTable {
            pivot: pivot.to_ascii_uppercase(),
            fallback,
            rates: BTreeMap::new(),
        }
    }

    /// Table with no rates: only same-currency conversions succeed
    pub fn empty() -> Self {
        Self::new("EUR", RateFallback::default())
    }

    pub fn insert(&mut self, date: NaiveDate, currency: &str, rate: f64) {
        self.rates
            .entry(date)
            .or_default()
            .insert(currency.to_ascii_uppercase(), rate);
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn day_count(&self) -> usize {
        self.rates.len()
    }

    /// Load an ECB reference-rate file (`Date,USD,JPY,...`, "N/A" for gaps)
    pub fn load(path: &Path, fallback: RateFallback) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open rate file {}", path.display()))?;
        Self::from_ecb_csv(file, fallback)
            .with_context(|| format!("Failed to read rate file {}", path.display()))
    }

    pub fn from_ecb_csv<R: Read>(reader: R, fallback: RateFallback) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers().context("Missing header row")?.clone();
        let mut table = RateTable::new("EUR", fallback);

        for (row, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("Bad rate row {}", row + 2))?;

            let raw_date = record.get(0).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
                .with_context(|| format!("Bad date '{}' on row {}", raw_date, row + 2))?;

            for (currency, value) in headers.iter().zip(record.iter()).skip(1) {
                if currency.is_empty() {
                    continue;
                }
                // "N/A" and blanks are gaps, not errors
                if let Ok(rate) = value.parse::<f64>() {
                    if rate > 0.0 {
                        table.insert(date, currency, rate);
                    }
                }
            }
        }

        Ok(table)
    }

    /// Units of `currency` per pivot unit, plus the day actually used
    fn rate(
        &self,
        currency: &str,
        as_of: Option<NaiveDate>,
    ) -> std::result::Result<(f64, Option<NaiveDate>), RateError> {
        let currency = currency.to_ascii_uppercase();
        if currency == self.pivot {
            return Ok((1.0, as_of));
        }
        if self.rates.is_empty() {
            return Err(RateError::EmptyTable);
        }

        let has = |(_, day): &(&NaiveDate, &HashMap<String, f64>)| day.contains_key(&currency);
        let pick = |(date, day): (&NaiveDate, &HashMap<String, f64>)| (day[&currency], Some(*date));

        let Some(date) = as_of else {
            return self
                .rates
                .iter()
                .rev()
                .find(has)
                .map(pick)
                .ok_or(RateError::UnknownCurrency(currency.clone()));
        };

        if let Some(rate) = self.rates.get(&date).and_then(|day| day.get(&currency)) {
            return Ok((*rate, Some(date)));
        }

        if self.fallback == RateFallback::Exact {
            return Err(RateError::MissingRate {
                currency: currency.clone(),
                date,
            });
        }

        let before = self.rates.range(..=date).rev().find(has);
        let after = self.rates.range(date..).find(has);

        let nearest = match (before, after) {
            (Some(b), Some(a)) => {
                if (date - *b.0) <= (*a.0 - date) {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (b, a) => b.or(a),
        };

        nearest
            .map(pick)
            .ok_or(RateError::UnknownCurrency(currency.clone()))
    }
}

impl CurrencyConverter for RateTable {
    fn convert(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        as_of: Option<NaiveDate>,
    ) -> std::result::Result<Conversion, RateError> {
        if from.trim().eq_ignore_ascii_case(to.trim()) {
            return Ok(Conversion::exact(amount));
        }

        let (from_rate, from_day) = self.rate(from.trim(), as_of)?;
        let (to_rate, to_day) = self.rate(to.trim(), as_of)?;

        let note = |currency: &str, used: Option<NaiveDate>| match used {
            Some(used) if Some(used) != as_of => Some(RateFallbackNote {
                currency: currency.to_ascii_uppercase(),
                requested: as_of,
                used,
            }),
            _ => None,
        };

        Ok(Conversion {
            amount: amount / from_rate * to_rate,
            fallback: note(from, from_day).or_else(|| note(to, to_day)),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Snipe detection
//!
//! A snipe is a router buy paid with a gas price far above that day's average.
//! Daily averages come from the explorer's "average gas price" chart export.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{EnrichedTransaction, SwapType};

/// Default multiple of the daily average above which a buy counts as a snipe
pub const DEFAULT_OVERSHOOT_FACTOR: f64 = 1.6;

/// One row of the daily gas price CSV
#[derive(Debug, Deserialize)]
struct GasPriceRow {
    #[serde(rename = "Date(UTC)")]
    date: String,
    #[serde(rename = "UnixTimeStamp", default)]
    unix_timestamp: Option<i64>,
    #[serde(rename = "Value (Wei)")]
    value_wei: f64,
}

/// Calendar date (UTC) -> average gas price in wei
#[derive(Debug, Clone, Default)]
pub struct GasPriceBaseline {
    by_date: FxHashMap<NaiveDate, f64>,
}

fn utc_date(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

impl GasPriceBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, avg_gas_price_wei: f64) {
        self.by_date.insert(date, avg_gas_price_wei);
    }

    /// Load the explorer export (`"Date(UTC)","UnixTimeStamp","Value (Wei)"`)
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open gas price file {}", path.display()))?;
        Self::from_reader(file)
    }

    /// Rows that cannot be parsed are skipped with a warning
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut baseline = Self::new();
        let mut skipped = 0usize;

        for (line, result) in reader.deserialize::<GasPriceRow>().enumerate() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!(line = line + 2, error = %e, "Skipping malformed gas price row");
                    skipped += 1;
                    continue;
                }
            };

            let date = NaiveDate::parse_from_str(&row.date, "%m/%d/%Y")
                .ok()
                .or_else(|| row.unix_timestamp.and_then(utc_date));

            match date {
                Some(date) => baseline.insert(date, row.value_wei),
                None => {
                    warn!(line = line + 2, date = %row.date, "Skipping gas price row without a usable date");
                    skipped += 1;
                }
            }
        }

        debug!(days = baseline.len(), skipped, "Loaded gas price baseline");
        Ok(baseline)
    }

    /// Average gas price of `date`; unknown days have an infinite baseline
    pub fn baseline(&self, date: NaiveDate) -> f64 {
        self.by_date.get(&date).copied().unwrap_or(f64::INFINITY)
    }

    /// Baseline of the UTC day containing `timestamp`
    pub fn baseline_at(&self, timestamp: i64) -> f64 {
        utc_date(timestamp).map_or(f64::INFINITY, |d| self.baseline(d))
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

/// Set `snipe` on every row; only `swap_buy` rows can be snipes.
/// Returns the number of snipes found.
pub fn detect_snipes(
    txs: &mut [EnrichedTransaction],
    baseline: &GasPriceBaseline,
    overshoot_factor: f64,
) -> usize {
    let mut found = 0usize;
    for tx in txs.iter_mut() {
        tx.snipe = tx.swap_type == Some(SwapType::SwapBuy)
            && (tx.gas_price as f64) > overshoot_factor * baseline.baseline_at(tx.timestamp);
        if tx.snipe {
            found += 1;
        }
    }
    debug!(snipes = found, overshoot_factor, "Snipe detection finished");
    found
}

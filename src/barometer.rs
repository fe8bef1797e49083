//! Volatility term-structure barometer.
//!
//! Turns a [`JoinedTable`] of volatility indices into one scalar:
//!
//! 1. **Crossover ratios**: each [`Feature`] divides one series by another
//!    (e.g. `vix9d / vix`). A row missing either operand has no ratio.
//! 2. **Percentile rank** of every ratio within the whole retained window.
//! 3. **Blend**: weighted mean of the ranks, normalised by the weight sum so
//!    the score stays in `[0, 1]`. Any missing rank leaves the row blank.
//! 4. **Smoothing**: exponentially weighted mean with a fixed half-life.
//!
//! The reading is the smoothed value of the most recent row.
//!
//! # Look-ahead
//!
//! Step 2 ranks each row against *all* rows in the window, later ones
//! included, so historical barometer values are not what a live run on that
//! date would have produced. Only the latest value is consumed for trading,
//! where the window ends at "now" and the distinction disappears. Step 4 is
//! causal.

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::series::JoinedTable;
use crate::stats::{ewm_mean, percentile_rank};

/// A crossover ratio feature: `numerator / denominator`, blended with `weight`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Feature {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
    pub weight: f64,
}

impl Feature {
    pub fn new(numerator: &str, denominator: &str, weight: f64) -> Self {
        Self {
            name: format!("{numerator}/{denominator}"),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            weight,
        }
    }
}

/// Pipeline parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BarometerConfig {
    pub features: Vec<Feature>,
    /// Smoothing half-life in rows (trading days).
    pub halflife: f64,
}

impl Default for BarometerConfig {
    /// The production barometer: short-term inversion weighted highest.
    fn default() -> Self {
        Self {
            features: vec![
                Feature::new("vix9d", "vix", 3.0),
                Feature::new("vix", "vix3m", 2.0),
                Feature::new("vix", "vix6m", 1.0),
            ],
            halflife: 3.0,
        }
    }
}

impl BarometerConfig {
    /// Check weights and half-life.
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(Error::InvalidConfig("barometer needs at least one feature".into()));
        }
        for f in &self.features {
            if !f.weight.is_finite() || f.weight <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "feature {} weight must be positive, got {}",
                    f.name, f.weight
                )));
            }
        }
        if !self.halflife.is_finite() || self.halflife <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "halflife must be positive, got {}",
                self.halflife
            )));
        }
        Ok(())
    }

    /// Names of every series the features reference, deduplicated, in
    /// first-use order.
    pub fn required_series(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for f in &self.features {
            for s in [f.numerator.as_str(), f.denominator.as_str()] {
                if !out.contains(&s) {
                    out.push(s);
                }
            }
        }
        out
    }
}

/// Every intermediate column of a barometer run, row-aligned with `dates`.
#[derive(Clone, Debug)]
pub struct BarometerFrame {
    pub dates: Vec<NaiveDate>,
    /// One ratio column per feature, in feature order.
    pub ratios: Vec<Vec<Option<f64>>>,
    /// One percentile-rank column per feature, in feature order.
    pub ranks: Vec<Vec<Option<f64>>>,
    pub blended: Vec<Option<f64>>,
    pub smoothed: Vec<Option<f64>>,
}

/// The scalar output of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BarometerReading {
    /// Date of the most recent row.
    pub as_of: NaiveDate,
    /// Smoothed blended rank, in `[0, 1]`.
    pub value: f64,
    /// Rows in the retained window.
    pub rows: usize,
}

impl BarometerReading {
    /// The reading on a `0..=scale` axis (thresholds are usually 0-100).
    pub fn scaled(&self, scale: f64) -> f64 {
        self.value * scale
    }
}

/// Ratio of two aligned columns. Non-finite quotients are absent.
fn ratio(num: &[Option<f64>], den: &[Option<f64>]) -> Vec<Option<f64>> {
    num.iter()
        .zip(den)
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) => Some(n / d).filter(|q| q.is_finite()),
            _ => None,
        })
        .collect()
}

/// Weighted mean of rank columns; any missing input blanks the row.
fn blend(ranks: &[Vec<Option<f64>>], weights: &[f64], rows: usize) -> Vec<Option<f64>> {
    let total: f64 = weights.iter().sum();
    (0..rows)
        .map(|r| {
            let mut acc = 0.0;
            for (col, w) in ranks.iter().zip(weights) {
                acc += col[r]? * w;
            }
            Some(acc / total)
        })
        .collect()
}

/// Run every pipeline stage and keep the intermediate columns.
pub fn compute_frame(table: &JoinedTable, config: &BarometerConfig) -> Result<BarometerFrame> {
    config.validate()?;

    let mut ratios = Vec::with_capacity(config.features.len());
    for f in &config.features {
        let num = table.column(&f.numerator).ok_or_else(|| {
            Error::DataShape(format!("feature {} needs series {}", f.name, f.numerator))
        })?;
        let den = table.column(&f.denominator).ok_or_else(|| {
            Error::DataShape(format!("feature {} needs series {}", f.name, f.denominator))
        })?;
        ratios.push(ratio(num, den));
    }

    let ranks: Vec<Vec<Option<f64>>> = ratios.iter().map(|r| percentile_rank(r)).collect();
    let weights: Vec<f64> = config.features.iter().map(|f| f.weight).collect();
    let blended = blend(&ranks, &weights, table.len());
    let smoothed = ewm_mean(&blended, config.halflife);

    Ok(BarometerFrame {
        dates: table.dates().to_vec(),
        ratios,
        ranks,
        blended,
        smoothed,
    })
}

/// Compute the current barometer reading.
///
/// Fails with [`Error::DataShape`] if the table is empty or the most recent
/// row has no smoothed value (e.g. a feature with fewer than two usable
/// ratios in the window).
pub fn compute(table: &JoinedTable, config: &BarometerConfig) -> Result<BarometerReading> {
    let frame = compute_frame(table, config)?;
    frame.reading()
}

impl BarometerFrame {
    /// The smoothed value of the last row.
    pub fn reading(&self) -> Result<BarometerReading> {
        let (Some(&as_of), Some(&last)) = (self.dates.last(), self.smoothed.last()) else {
            return Err(Error::DataShape("no rows in the barometer window".into()));
        };
        let value = last.ok_or_else(|| {
            Error::DataShape(format!(
                "no barometer value on {as_of}: insufficient overlapping data to rank"
            ))
        })?;
        Ok(BarometerReading {
            as_of,
            value,
            rows: self.dates.len(),
        })
    }
}

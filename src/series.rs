//! Named time series and the date-aligned join used by the barometer.
//!
//! Series are fetched independently and rarely cover the same trading days
//! (VIX9D history starts decades after VIX). [`join_outer`] keeps every date
//! seen in any input; a series with no observation on a date leaves an
//! absent cell (`None`), never a zero.

use std::collections::BTreeMap;

use chrono::{Months, NaiveDate};
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};

/// One observation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimePoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// A named, date-ordered sequence of observations with unique dates.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    name: String,
    points: Vec<TimePoint>,
}

impl Series {
    /// Build a series, sorting by date.
    ///
    /// Fails with [`Error::DataShape`] if two points share a date.
    pub fn new(name: impl Into<String>, mut points: Vec<TimePoint>) -> Result<Self> {
        let name = name.into();
        points.sort_by_key(|p| p.date);
        if let Some(w) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(Error::DataShape(format!(
                "series {name} has duplicate date {}",
                w[0].date
            )));
        }
        Ok(Self { name, points })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent observation.
    pub fn last(&self) -> Option<&TimePoint> {
        self.points.last()
    }
}

/// Date-indexed table with one column per joined series.
///
/// Stored column-major: `values[c][r]` is column `c` on `dates[r]`.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedTable {
    columns: Vec<String>,
    dates: Vec<NaiveDate>,
    values: Vec<Vec<Option<f64>>>,
}

impl JoinedTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of rows (distinct dates).
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Values of a named column, aligned with [`dates`](Self::dates).
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }

    /// Value of `column` on row `row`.
    pub fn get(&self, column: &str, row: usize) -> Option<f64> {
        self.column(column).and_then(|c| c.get(row).copied().flatten())
    }

    /// Keep only rows dated strictly after `cutoff`.
    pub fn retain_after(&mut self, cutoff: NaiveDate) {
        let start = self.dates.partition_point(|d| *d <= cutoff);
        self.dates.drain(..start);
        for col in &mut self.values {
            col.drain(..start);
        }
    }

    /// Keep the trailing window of `years` calendar years ending at `today`.
    ///
    /// Rows dated on the anniversary itself are dropped, matching a
    /// wall-clock cutoff taken during the day.
    pub fn retain_window(&mut self, today: NaiveDate, years: u32) {
        let cutoff = today
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        self.retain_after(cutoff);
    }
}

/// Outer-join series on date.
///
/// The result holds every distinct date across `series` in ascending order.
/// Column order follows input order. Series names must be unique.
pub fn join_outer(series: &[Series]) -> Result<JoinedTable> {
    let mut seen = FxHashSet::default();
    for s in series {
        if !seen.insert(s.name()) {
            return Err(Error::DataShape(format!("duplicate series name: {}", s.name())));
        }
    }

    let n_cols = series.len();
    let mut rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for (c, s) in series.iter().enumerate() {
        for p in s.points() {
            rows.entry(p.date).or_insert_with(|| vec![None; n_cols])[c] = Some(p.value);
        }
    }

    let mut dates = Vec::with_capacity(rows.len());
    let mut values = vec![Vec::with_capacity(rows.len()); n_cols];
    for (date, row) in rows {
        dates.push(date);
        for (c, v) in row.into_iter().enumerate() {
            values[c].push(v);
        }
    }

    Ok(JoinedTable {
        columns: series.iter().map(|s| s.name().to_string()).collect(),
        dates,
        values,
    })
}

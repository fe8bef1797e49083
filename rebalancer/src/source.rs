//! Daily series download and CSV parsing.
//!
//! A [`SeriesSource`] returns the raw CSV body for a configured source;
//! [`parse_csv`] turns it into a [`Series`]; [`load_table`] fetches every
//! source, joins them on date and trims the table to the lookback window.

use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info};
use reqwest::blocking::Client;
use rustc_hash::FxHashMap;
use volbarometer::{JoinedTable, Series, TimePoint, join_outer};

use crate::config::{DataConfig, SourceConfig};
use crate::error::{Error, Result};

/// Accepted date formats, tried in order.
const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%Y-%m-%d"];

/// Something that can produce the CSV body of a daily series.
pub trait SeriesSource {
    fn fetch(&self, source: &SourceConfig) -> Result<String>;
}

/// Downloads series over HTTP(S) with a per-request timeout.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("volbarometer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::DataFetch {
                source_name: "http client".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl SeriesSource for HttpSource {
    fn fetch(&self, source: &SourceConfig) -> Result<String> {
        let fetch_err = |reason: String| Error::DataFetch {
            source_name: source.name.clone(),
            reason,
        };
        debug!("GET {}", source.url);
        let resp = self
            .client
            .get(&source.url)
            .send()
            .map_err(|e| fetch_err(format!("request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("{} returned {status}", source.url)));
        }
        resp.text()
            .map_err(|e| fetch_err(format!("failed to read body: {e}")))
    }
}

/// In-memory source keyed by series name.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    bodies: FxHashMap<String, String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, csv: impl Into<String>) -> Self {
        self.bodies.insert(name.to_string(), csv.into());
        self
    }
}

impl SeriesSource for StaticSource {
    fn fetch(&self, source: &SourceConfig) -> Result<String> {
        self.bodies
            .get(&source.name)
            .cloned()
            .ok_or_else(|| Error::DataFetch {
                source_name: source.name.clone(),
                reason: "no data".into(),
            })
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a CSV body into a series named `name`.
///
/// Columns are found by header, case-insensitively. Rows with an empty value
/// cell are skipped; any other unparseable cell is an error.
pub fn parse_csv(name: &str, body: &str, date_column: &str, value_column: &str) -> Result<Series> {
    let shape = |msg: String| Error::DataShape(format!("{name}: {msg}"));

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| shape(format!("CSV header error: {e}")))?
        .clone();
    let find = |column: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column))
            .ok_or_else(|| shape(format!("missing column {column}")))
    };
    let date_idx = find(date_column)?;
    let value_idx = find(value_column)?;

    let mut points = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| shape(format!("CSV parse error: {e}")))?;
        // header is line 1
        let row = line + 2;

        let date_str = record.get(date_idx).unwrap_or("");
        if date_str.is_empty() && record.iter().all(str::is_empty) {
            continue;
        }
        let date = parse_date(date_str)
            .ok_or_else(|| shape(format!("row {row}: invalid date {date_str:?}")))?;

        let value_str = record.get(value_idx).unwrap_or("");
        if value_str.is_empty() {
            continue;
        }
        let value: f64 = value_str
            .parse()
            .map_err(|_| shape(format!("row {row}: invalid value {value_str:?}")))?;
        points.push(TimePoint::new(date, value));
    }

    Ok(Series::new(name, points)?)
}

/// Fetch every configured source, join on date and keep the lookback window
/// ending at `today`.
pub fn load_table(
    source: &dyn SeriesSource,
    data: &DataConfig,
    today: NaiveDate,
) -> Result<JoinedTable> {
    let mut series = Vec::with_capacity(data.sources.len());
    for src in &data.sources {
        let body = source.fetch(src)?;
        let s = parse_csv(&src.name, &body, &data.date_column, &data.value_column)?;
        info!(
            "Fetched {}: {} rows, last {}",
            src.name,
            s.len(),
            s.last()
                .map(|p| p.date.to_string())
                .unwrap_or_else(|| "-".into())
        );
        series.push(s);
    }

    let mut table = join_outer(&series)?;
    table.retain_window(today, data.lookback_years);
    if table.is_empty() {
        return Err(Error::DataShape(format!(
            "no rows in the {}-year window ending {today}",
            data.lookback_years
        )));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const CBOE: &str = "DATE,OPEN,HIGH,LOW,CLOSE\n\
                        01/02/2024,13.21,14.23,13.10,13.20\n\
                        01/03/2024,13.38,14.22,13.36,14.04\n";

    #[test]
    fn parse_cboe_format() {
        let s = parse_csv("vix", CBOE, "DATE", "CLOSE").unwrap();
        assert_eq!(s.name(), "vix");
        assert_eq!(s.len(), 2);
        assert_eq!(s.points()[0].date, d(2024, 1, 2));
        assert_eq!(s.points()[1].value, 14.04);
    }

    #[test]
    fn parse_iso_dates_and_case_insensitive_headers() {
        let body = "date,close\n2024-01-03,14.0\n2024-01-02,13.0\n";
        let s = parse_csv("x", body, "DATE", "CLOSE").unwrap();
        // sorted by date
        assert_eq!(s.points()[0].date, d(2024, 1, 2));
    }

    #[test]
    fn parse_skips_empty_values() {
        let body = "DATE,CLOSE\n01/02/2024,\n01/03/2024,14.0\n\n";
        let s = parse_csv("x", body, "DATE", "CLOSE").unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn parse_missing_column() {
        let body = "DATE,OPEN\n01/02/2024,13.0\n";
        assert!(matches!(
            parse_csv("x", body, "DATE", "CLOSE"),
            Err(Error::DataShape(m)) if m.contains("CLOSE")
        ));
    }

    #[test]
    fn parse_bad_cells() {
        let body = "DATE,CLOSE\n2024/31/31,13.0\n";
        assert!(matches!(parse_csv("x", body, "DATE", "CLOSE"), Err(Error::DataShape(_))));
        let body = "DATE,CLOSE\n01/02/2024,n/a\n";
        assert!(matches!(parse_csv("x", body, "DATE", "CLOSE"), Err(Error::DataShape(_))));
    }

    #[test]
    fn parse_duplicate_dates() {
        let body = "DATE,CLOSE\n01/02/2024,13.0\n01/02/2024,14.0\n";
        assert!(matches!(parse_csv("x", body, "DATE", "CLOSE"), Err(Error::DataShape(_))));
    }

    fn two_sources() -> DataConfig {
        DataConfig {
            sources: vec![
                SourceConfig {
                    name: "a".into(),
                    url: "mem://a".into(),
                },
                SourceConfig {
                    name: "b".into(),
                    url: "mem://b".into(),
                },
            ],
            lookback_years: 1,
            ..DataConfig::default()
        }
    }

    #[test]
    fn load_table_joins_and_windows() {
        let source = StaticSource::new()
            .with("a", "DATE,CLOSE\n01/02/2023,1\n06/01/2024,2\n06/03/2024,3\n")
            .with("b", "DATE,CLOSE\n06/01/2024,4\n06/04/2024,5\n");
        let table = load_table(&source, &two_sources(), d(2024, 6, 10)).unwrap();
        assert_eq!(
            table.dates(),
            [d(2024, 6, 1), d(2024, 6, 3), d(2024, 6, 4)]
        );
        assert_eq!(table.get("b", 1), None);
        assert_eq!(table.get("a", 2), None);
    }

    #[test]
    fn load_table_missing_source_fails() {
        let source = StaticSource::new().with("a", "DATE,CLOSE\n06/01/2024,2\n");
        assert!(matches!(
            load_table(&source, &two_sources(), d(2024, 6, 10)),
            Err(Error::DataFetch { source_name, .. }) if source_name == "b"
        ));
    }

    #[test]
    fn load_table_empty_window_fails() {
        let source = StaticSource::new()
            .with("a", "DATE,CLOSE\n01/02/2020,1\n")
            .with("b", "DATE,CLOSE\n01/02/2020,1\n");
        assert!(matches!(
            load_table(&source, &two_sources(), d(2024, 6, 10)),
            Err(Error::DataShape(_))
        ));
    }
}

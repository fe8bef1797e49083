//! # volbarometer
//!
//! Volatility term-structure barometer, regime classification and
//! strategy allocation.
//!
//! The crate is pure computation; fetching data and talking to a broker live
//! in `volbarometer-rebalancer` and `volbarometer-broker`.
//!
//! ## Pipeline
//!
//! ```text
//! Series* ──join_outer──▶ JoinedTable ──retain_window──▶ barometer::compute
//!     ──▶ BarometerReading ──VolatilityLevels::classify──▶ VolLevel
//!     ──plan_allocation──▶ TargetAllocation
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use chrono::NaiveDate;
//! use volbarometer::{
//!     join_outer, plan_allocation, BarometerConfig, Feature, Series, Strategy, TimePoint,
//!     VolatilityLevels,
//! };
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
//! let short = Series::new("vix9d", vec![
//!     TimePoint::new(day(1), 12.0),
//!     TimePoint::new(day(2), 14.0),
//!     TimePoint::new(day(3), 11.0),
//! ]).unwrap();
//! let spot = Series::new("vix", vec![
//!     TimePoint::new(day(1), 13.0),
//!     TimePoint::new(day(2), 13.5),
//!     TimePoint::new(day(3), 13.0),
//! ]).unwrap();
//!
//! let table = join_outer(&[short, spot]).unwrap();
//! let config = BarometerConfig {
//!     features: vec![Feature::new("vix9d", "vix", 1.0)],
//!     halflife: 3.0,
//! };
//! let reading = volbarometer::barometer::compute(&table, &config).unwrap();
//! assert!(reading.value > 0.0 && reading.value <= 1.0);
//!
//! let levels = VolatilityLevels::standard();
//! let level = levels.classify(reading.scaled(100.0)).unwrap();
//!
//! let strategy = Strategy::new("trend", 0.5)
//!     .hold("minimum", "SVXY")
//!     .hold("moderate", "SVXY")
//!     .hold("average", "SVXY")
//!     .cash("elevated")
//!     .cash("extreme");
//! let target = plan_allocation(&level.name, &[strategy]).unwrap();
//! assert_eq!(target.len(), 1);
//! ```

pub mod barometer;
mod error;
pub mod regime;
pub mod series;
pub mod stats;
pub mod strategy;
mod symbol;

pub use barometer::{BarometerConfig, BarometerReading, Feature};
pub use error::{Error, Result};
pub use regime::{OverflowPolicy, VolLevel, VolatilityLevels};
pub use series::{JoinedTable, Series, TimePoint, join_outer};
pub use strategy::{Strategy, TargetAllocation, TargetEntry, plan_allocation};
pub use symbol::{MAX_SYMBOL_LEN, Symbol};

//! volbarometer-rebalancer: volatility-regime rebalancer for an Alpaca account.
//!
//! Downloads CBOE volatility index histories, computes the term-structure
//! barometer, classifies the regime, plans the strategy allocation and
//! reconciles the broker account against it, with an audit trail. Runs from
//! the CLI or behind an HTTP trigger.

pub mod audit;
pub mod config;
pub mod diff;
pub mod error;
pub mod execution;
pub mod flight;
pub mod server;
pub mod source;

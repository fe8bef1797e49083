//! TOML configuration loading and validation.
//!
//! Every section except `[broker]` may be omitted; the defaults reproduce the
//! production barometer, levels and strategies. Credentials never live in the
//! file: they are read from environment variables named in `[broker]`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::warn;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use volbarometer::{
    BarometerConfig, Feature, OverflowPolicy, Strategy, Symbol, VolLevel, VolatilityLevels,
};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub broker: BrokerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub barometer: BarometerSection,
    #[serde(default = "default_levels")]
    pub levels: Vec<LevelConfig>,
    #[serde(default)]
    pub regime: RegimeConfig,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_key_env")]
    pub key_env: String,
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    /// When set in the environment, overrides `base_url`.
    #[serde(default = "default_base_url_env")]
    pub base_url_env: String,
}

fn default_base_url() -> String {
    "https://paper-api.alpaca.markets".into()
}
fn default_key_env() -> String {
    "ALPACA_API_KEY".into()
}
fn default_secret_env() -> String {
    "ALPACA_API_SECRET".into()
}
fn default_base_url_env() -> String {
    "ALPACA_API_BASE_URL".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_lookback")]
    pub lookback_years: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            lookback_years: default_lookback(),
            timeout_secs: default_timeout(),
            date_column: default_date_column(),
            value_column: default_value_column(),
            sources: default_sources(),
        }
    }
}

fn default_lookback() -> u32 {
    3
}
fn default_timeout() -> u64 {
    30
}
fn default_date_column() -> String {
    "DATE".into()
}
fn default_value_column() -> String {
    "CLOSE".into()
}

const CBOE_DAILY_PRICES: &str = "https://cdn.cboe.com/api/global/us_indices/daily_prices";

fn default_sources() -> Vec<SourceConfig> {
    [
        ("vix9d", "VIX9D"),
        ("vix", "VIX"),
        ("vix3m", "VIX3M"),
        ("vix6m", "VIX6M"),
    ]
    .into_iter()
    .map(|(name, index)| SourceConfig {
        name: name.into(),
        url: format!("{CBOE_DAILY_PRICES}/{index}_History.csv"),
    })
    .collect()
}

/// One downloadable daily series.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BarometerSection {
    #[serde(default = "default_halflife")]
    pub halflife: f64,
    /// Multiplier applied to the `[0, 1]` reading before classification.
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_features")]
    pub features: Vec<FeatureConfig>,
}

impl Default for BarometerSection {
    fn default() -> Self {
        Self {
            halflife: default_halflife(),
            scale: default_scale(),
            features: default_features(),
        }
    }
}

fn default_halflife() -> f64 {
    3.0
}
fn default_scale() -> f64 {
    100.0
}

fn default_features() -> Vec<FeatureConfig> {
    BarometerConfig::default()
        .features
        .into_iter()
        .map(|f| FeatureConfig {
            numerator: f.numerator,
            denominator: f.denominator,
            weight: f.weight,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureConfig {
    pub numerator: String,
    pub denominator: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LevelConfig {
    pub name: String,
    pub threshold: f64,
}

fn default_levels() -> Vec<LevelConfig> {
    VolatilityLevels::standard()
        .levels()
        .iter()
        .map(|l| LevelConfig {
            name: l.name.clone(),
            threshold: l.threshold,
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegimeConfig {
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

/// A strategy as written in TOML: `symbols` maps level name to ticker, with
/// `""` meaning cash.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub weight: f64,
    pub symbols: BTreeMap<String, String>,
}

fn default_strategies() -> Vec<StrategyConfig> {
    let table = |name: &str, syms: [&str; 5]| StrategyConfig {
        name: name.into(),
        weight: 0.25,
        symbols: ["minimum", "moderate", "average", "elevated", "extreme"]
            .into_iter()
            .zip(syms)
            .map(|(l, s)| (l.to_string(), s.to_string()))
            .collect(),
    };
    vec![
        table("defensive_rotation", ["VGLT", "QLD", "QLD", "XLU", ""]),
        table("tactical_balanced", ["MVV", "MVV", "MVV", "IEF", "GLD"]),
        table("strategic_tail_risk", ["SSO", "SSO", "SSO", "IYR", "VIXM"]),
        table("vol_trend", ["SVXY", "SVXY", "SVXY", "", ""]),
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Falls back to `$PORT`, then 8080.
    #[serde(default)]
    pub port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

/// Default HTTP port when neither config nor `$PORT` sets one.
pub const DEFAULT_PORT: u16 = 8080;

/// Broker credentials resolved from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    pub fn validate(&self) -> Result<()> {
        if self.data.lookback_years == 0 {
            return Err(Error::Config("lookback_years must be > 0".into()));
        }
        if self.data.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".into()));
        }
        if self.data.sources.is_empty() {
            return Err(Error::Config("at least one data source is required".into()));
        }
        let mut names = FxHashSet::default();
        for s in &self.data.sources {
            if s.name.is_empty() {
                return Err(Error::Config("data source name must not be empty".into()));
            }
            if !names.insert(s.name.as_str()) {
                return Err(Error::Config(format!("duplicate data source {}", s.name)));
            }
        }

        let barometer = self.barometer_config();
        barometer.validate()?;
        for name in barometer.required_series() {
            if !names.contains(name) {
                return Err(Error::Config(format!(
                    "barometer feature references unknown series {name}"
                )));
            }
        }
        if !self.barometer.scale.is_finite() || self.barometer.scale <= 0.0 {
            return Err(Error::Config(format!(
                "barometer scale must be positive, got {}",
                self.barometer.scale
            )));
        }

        self.volatility_levels()?;
        let strategies = self.strategies()?;
        if strategies.is_empty() {
            return Err(Error::Config("at least one strategy is required".into()));
        }
        let mut strategy_names = FxHashSet::default();
        for s in &strategies {
            if !strategy_names.insert(s.name()) {
                return Err(Error::Config(format!("duplicate strategy {}", s.name())));
            }
        }
        let total: f64 = strategies.iter().map(Strategy::weight).sum();
        if total > 1.0 + 1e-9 {
            warn!("strategy weights sum to {total:.4}; orders may exceed equity");
        }
        Ok(())
    }

    /// Pipeline parameters for the core barometer.
    pub fn barometer_config(&self) -> BarometerConfig {
        BarometerConfig {
            features: self
                .barometer
                .features
                .iter()
                .map(|f| Feature::new(&f.numerator, &f.denominator, f.weight))
                .collect(),
            halflife: self.barometer.halflife,
        }
    }

    /// Ordered levels with the configured overflow policy.
    pub fn volatility_levels(&self) -> Result<VolatilityLevels> {
        let levels = self
            .levels
            .iter()
            .map(|l| VolLevel::new(&l.name, l.threshold))
            .collect();
        Ok(VolatilityLevels::new(levels)?.with_overflow(self.regime.overflow))
    }

    /// Typed strategies, validated against the configured levels.
    pub fn strategies(&self) -> Result<Vec<Strategy>> {
        let levels = self.volatility_levels()?;
        self.strategies
            .iter()
            .map(|sc| -> Result<Strategy> {
                let mut strategy = Strategy::new(&sc.name, sc.weight);
                for (level, ticker) in &sc.symbols {
                    let symbol = if ticker.is_empty() {
                        None
                    } else {
                        Some(ticker.parse::<Symbol>()?)
                    };
                    strategy.set(level, symbol);
                }
                strategy.validate(&levels)?;
                Ok(strategy)
            })
            .collect()
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }

    /// Resolve credentials from the process environment.
    pub fn credentials(&self) -> Result<Credentials> {
        self.credentials_from(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through `lookup`. Missing or empty key/secret is
    /// an error.
    pub fn credentials_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("environment variable {name} is not set")))
        };
        let api_key = required(&self.broker.key_env)?;
        let api_secret = required(&self.broker.secret_env)?;
        let base_url = lookup(&self.broker.base_url_env)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.broker.base_url.clone());
        Ok(Credentials {
            api_key,
            api_secret,
            base_url,
        })
    }

    /// HTTP listen port: config, then `$PORT`, then 8080.
    pub fn server_port(&self) -> u16 {
        self.server_port_from(std::env::var("PORT").ok())
    }

    pub fn server_port_from(&self, env_port: Option<String>) -> u16 {
        self.server
            .port
            .or_else(|| env_port.and_then(|p| p.parse().ok()))
            .unwrap_or(DEFAULT_PORT)
    }
}

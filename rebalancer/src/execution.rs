//! Execution orchestrator: data → barometer → regime → target → reconcile.
//!
//! This is the main workflow that ties together all components. The broker
//! is reached only through the [`Broker`] trait so the whole cycle runs
//! against [`volbarometer_broker::mock::MockBroker`] in tests.

use std::time::Duration;

use chrono::{Local, NaiveDate};
use log::{info, warn};
use volbarometer::{BarometerReading, Symbol, TargetAllocation, VolLevel, plan_allocation};
use volbarometer_broker::alpaca::AlpacaBroker;
use volbarometer_broker::{Broker, NotionalOrder, OrderId, Position, format_cents};

use crate::audit::{self, AuditLog};
use crate::config::Config;
use crate::diff;
use crate::error::{Error, Result};
use crate::source::{self, HttpSource, SeriesSource};

/// Options for a rebalance run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Skip the confirmation prompt.
    pub force: bool,
    /// What started the run ("cli", "http"); recorded in the audit trail.
    pub trigger: String,
    /// End of the lookback window.
    pub today: NaiveDate,
}

impl RunOptions {
    pub fn new(trigger: &str) -> Self {
        Self {
            dry_run: false,
            force: false,
            trigger: trigger.to_string(),
            today: Local::now().date_naive(),
        }
    }
}

/// Barometer reading, its regime and the target it implies.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub reading: BarometerReading,
    /// Reading on the threshold axis.
    pub scaled: f64,
    pub level: VolLevel,
    /// True when the value overflowed and was clamped to the highest level.
    pub clamped: bool,
    pub target: TargetAllocation,
}

/// An order the reconciler placed (or would place, in a dry run).
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub order: NotionalOrder,
    /// `None` in a dry run.
    pub id: Option<OrderId>,
}

/// What one reconciliation did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebalanceReport {
    pub dry_run: bool,
    pub cancelled: Vec<OrderId>,
    pub closed: Vec<Symbol>,
    pub retained: Vec<Symbol>,
    pub submitted: Vec<SubmittedOrder>,
    /// Equity read after closes, used to size the opens.
    pub equity_cents: i64,
}

impl RebalanceReport {
    /// True if the run changed (or would change) nothing.
    pub fn is_noop(&self) -> bool {
        self.cancelled.is_empty() && self.closed.is_empty() && self.submitted.is_empty()
    }
}

/// Fetch data, compute the barometer, classify it and plan the target.
pub fn assess(config: &Config, source: &dyn SeriesSource, today: NaiveDate) -> Result<Assessment> {
    let table = source::load_table(source, &config.data, today)?;
    let reading = volbarometer::barometer::compute(&table, &config.barometer_config())?;
    let scaled = reading.scaled(config.barometer.scale);

    let levels = config.volatility_levels()?;
    let level = levels.classify(scaled)?.clone();
    let clamped = levels.is_overflow(scaled);
    if clamped {
        warn!(
            "Barometer {scaled:.2} is at or above the highest threshold {}; clamped to {}",
            levels.highest().threshold,
            level.name
        );
    }

    let target = plan_allocation(&level.name, &config.strategies()?)?;
    info!(
        "Barometer {:.4} (scaled {scaled:.2}) as of {} over {} rows: level {}",
        reading.value, reading.as_of, reading.rows, level.name
    );

    Ok(Assessment {
        reading,
        scaled,
        level,
        clamped,
        target,
    })
}

/// Bring the broker account in line with `target`.
///
/// Strict order: cancel every open order, diff positions against the target,
/// close untargeted positions, read equity, open the missing targets. Any
/// broker failure stops the cycle immediately; earlier steps are not undone.
/// With `dry_run` only read-only calls are made.
pub fn reconcile(
    broker: &dyn Broker,
    target: &TargetAllocation,
    dry_run: bool,
    mut audit: Option<&mut AuditLog>,
) -> Result<RebalanceReport> {
    let mut report = RebalanceReport {
        dry_run,
        ..RebalanceReport::default()
    };

    // 1. Cancel
    for order in broker.open_orders()? {
        if !dry_run {
            broker.cancel_order(&order.id)?;
            info!("Cancelled order {} ({})", order.id, order.symbol);
            if let Some(a) = audit.as_deref_mut() {
                audit::log_order_cancelled(a, &order)?;
            }
        }
        report.cancelled.push(order.id);
    }

    // 2. Diff
    let positions = broker.positions()?;
    let diff = diff::compute_diff(&positions, target);

    // 3. Close
    for symbol in &diff.close {
        if !dry_run {
            broker.close_position(symbol)?;
            info!("Closed position {symbol}");
            if let Some(a) = audit.as_deref_mut() {
                audit::log_position_closed(a, symbol)?;
            }
        }
    }
    for symbol in &diff.retained {
        info!("Retaining position {symbol}");
        if let Some(a) = audit.as_deref_mut() {
            audit::log_position_retained(a, symbol)?;
        }
    }

    // 4. Equity
    report.equity_cents = broker.account()?.equity_cents;

    // 5. Open
    for order in diff::plan_opens(target, &diff.blocklist, report.equity_cents) {
        let id = if dry_run {
            None
        } else {
            let id = broker.submit_order(&order)?;
            info!(
                "Submitted {} {} ${} -> {id}",
                order.side.as_str(),
                order.symbol,
                format_cents(order.notional_cents)
            );
            if let Some(a) = audit.as_deref_mut() {
                audit::log_order_submitted(a, &order, &id)?;
            }
            Some(id)
        };
        report.submitted.push(SubmittedOrder { order, id });
    }

    report.closed = diff.close;
    report.retained = diff.retained;
    Ok(report)
}

/// Execute a full rebalance run with audit logging.
///
/// Without `force` (and outside a dry run) the plan is computed read-only,
/// displayed, and confirmed interactively before anything is changed.
pub fn run(
    config: &Config,
    broker: &dyn Broker,
    source: &dyn SeriesSource,
    opts: &RunOptions,
) -> Result<RebalanceReport> {
    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(&mut audit, &opts.trigger, opts.dry_run)?;

    match run_inner(config, broker, source, opts, &mut audit) {
        Ok(report) => {
            audit::log_run_completed(&mut audit, &report)?;
            Ok(report)
        }
        Err(e) => {
            if let Err(log_err) = audit::log_run_failed(&mut audit, &e) {
                warn!("Failed to record run failure in audit log: {log_err}");
            }
            Err(e)
        }
    }
}

fn run_inner(
    config: &Config,
    broker: &dyn Broker,
    source: &dyn SeriesSource,
    opts: &RunOptions,
    audit: &mut AuditLog,
) -> Result<RebalanceReport> {
    let assessment = assess(config, source, opts.today)?;
    audit::log_barometer(
        audit,
        &assessment.reading,
        assessment.scaled,
        &assessment.target,
    )?;
    display_assessment(&assessment);

    if opts.dry_run || !opts.force {
        let plan = reconcile(broker, &assessment.target, true, None)?;
        display_report(&plan);
        if opts.dry_run {
            println!("\n[DRY RUN] No orders cancelled, closed or submitted.");
            return Ok(plan);
        }
        if plan.is_noop() {
            println!("\nNo rebalancing needed: portfolio matches target.");
            return Ok(plan);
        }

        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Execute?")
            .default(false)
            .interact()
            .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;
        audit.log("user_confirmed", serde_json::json!({ "approved": confirmed }))?;
        if !confirmed {
            return Err(Error::Aborted("rebalance declined".into()));
        }
    }

    let report = reconcile(broker, &assessment.target, false, Some(audit))?;
    display_report(&report);
    println!("\nAudit logged to {}", config.audit_path().display());
    Ok(report)
}

/// Build and connect the Alpaca broker from config and environment.
pub fn connect_broker(config: &Config) -> Result<AlpacaBroker> {
    let creds = config.credentials()?;
    let mut broker = AlpacaBroker::new(&creds.api_key, &creds.api_secret, &creds.base_url);
    broker.connect()?;
    Ok(broker)
}

/// HTTP data source with the configured timeout.
pub fn http_source(config: &Config) -> Result<HttpSource> {
    HttpSource::new(Duration::from_secs(config.data.timeout_secs))
}

/// Connect, download and run: the whole production cycle.
pub fn run_live(config: &Config, opts: &RunOptions) -> Result<RebalanceReport> {
    let source = http_source(config)?;
    let mut broker = connect_broker(config)?;
    let result = run(config, &broker, &source, opts);
    if let Err(e) = broker.disconnect() {
        warn!("Disconnect failed: {e}");
    }
    result
}

/// Print the current barometer, regime and target without touching the broker.
pub fn show_barometer(config: &Config) -> Result<()> {
    let source = http_source(config)?;
    let assessment = assess(config, &source, Local::now().date_naive())?;
    display_assessment(&assessment);
    Ok(())
}

/// Show current broker positions.
pub fn show_positions(config: &Config) -> Result<()> {
    let broker = connect_broker(config)?;
    let account = broker.account()?;
    let positions = broker.positions()?;

    println!(
        "Account: ${} equity, ${} cash\n",
        format_cents(account.equity_cents),
        format_cents(account.cash_cents),
    );
    display_positions(&positions, account.equity_cents);
    Ok(())
}

/// Check broker connection status.
pub fn check_status(config: &Config) -> Result<()> {
    let creds = config.credentials()?;
    print!("Connecting to {}... ", creds.base_url);

    let broker = connect_broker(config)?;
    println!("OK");

    let account = broker.account()?;
    let open = broker.open_orders()?;
    println!(
        "Equity ${}, buying power ${}, {} open order(s)",
        format_cents(account.equity_cents),
        format_cents(account.buying_power_cents),
        open.len()
    );
    Ok(())
}

// === Display ===

fn display_assessment(a: &Assessment) {
    println!(
        "BAROMETER {:.4} (scaled {:.2}) as of {} [{} rows]",
        a.reading.value, a.scaled, a.reading.as_of, a.reading.rows
    );
    println!(
        "LEVEL     {}{}",
        a.level.name,
        if a.clamped { " (clamped)" } else { "" }
    );
    println!("\nTARGET:");
    for e in &a.target.entries {
        let symbol = e.symbol.as_ref().map_or("(cash)", Symbol::as_str);
        println!("  {:24} {:8} {:>5.1}%", e.strategy, symbol, e.weight * 100.0);
    }
}

fn display_positions(positions: &[Position], equity_cents: i64) {
    if positions.is_empty() {
        println!("No positions.");
        return;
    }

    println!("CURRENT PORTFOLIO:");
    for pos in positions {
        let weight = if equity_cents > 0 {
            pos.market_value_cents as f64 / equity_cents as f64
        } else {
            0.0
        };
        println!(
            "  {:8} {:>12.4} = ${:>12}  ({:.1}%)",
            pos.symbol,
            pos.quantity,
            format_cents(pos.market_value_cents),
            weight * 100.0,
        );
    }
}

fn display_report(report: &RebalanceReport) {
    let verb = if report.dry_run { "WOULD" } else { "DID" };
    println!("\nREBALANCE ({verb}):");
    for id in &report.cancelled {
        println!("  cancel  {id}");
    }
    for s in &report.closed {
        println!("  close   {s}");
    }
    for s in &report.retained {
        println!("  keep    {s}");
    }
    for o in &report.submitted {
        println!(
            "  buy     {:8} ${:>12}",
            o.order.symbol,
            format_cents(o.order.notional_cents)
        );
    }
    if report.is_noop() {
        println!("  (nothing to do)");
    }
    println!("  equity  ${}", format_cents(report.equity_cents));
}

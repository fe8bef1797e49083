// Allow our dollar.cents digit grouping convention (e.g., 100_00 = $100.00)
#![allow(clippy::inconsistent_digit_grouping)]

//! Integration tests for the rebalance cycle against the mock broker.

use chrono::NaiveDate;
use volbarometer::{Strategy, Symbol, TargetAllocation, plan_allocation};
use volbarometer_broker::mock::{BrokerCall, MockBroker, Operation};
use volbarometer_broker::{Broker, BrokerError, OrderId};
use volbarometer_rebalancer::config::Config;
use volbarometer_rebalancer::error::Error;
use volbarometer_rebalancer::execution::{self, RunOptions, reconcile};
use volbarometer_rebalancer::source::StaticSource;

fn sym(s: &str) -> Symbol {
    Symbol::new(s)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
}

fn connected(mut broker: MockBroker) -> MockBroker {
    broker.connect().unwrap();
    broker
}

/// Target with one strategy per `(symbol, weight)`; `""` is cash.
fn target(pairs: &[(&str, f64)]) -> TargetAllocation {
    let strategies: Vec<Strategy> = pairs
        .iter()
        .enumerate()
        .map(|(i, (s, w))| {
            let st = Strategy::new(&format!("s{i}"), *w);
            if s.is_empty() {
                st.cash("calm")
            } else {
                st.hold("calm", s)
            }
        })
        .collect();
    plan_allocation("calm", &strategies).unwrap()
}

/// Ten days of identical closes: every ratio ties, so every rank (and the
/// smoothed barometer) is 5.5 / 10 = 0.55, scaled 55 → "average".
fn flat_csv() -> String {
    let mut csv = String::from("DATE,OPEN,HIGH,LOW,CLOSE\n");
    for day in 10..20 {
        csv.push_str(&format!("06/{day}/2024,15.0,15.0,15.0,15.0\n"));
    }
    csv
}

fn flat_source() -> StaticSource {
    ["vix9d", "vix", "vix3m", "vix6m"]
        .into_iter()
        .fold(StaticSource::new(), |s, name| s.with(name, flat_csv()))
}

fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::from_toml_str("[broker]\n").unwrap();
    config.logging.dir = dir.path().display().to_string();
    config
}

fn forced() -> RunOptions {
    RunOptions {
        force: true,
        today: today(),
        ..RunOptions::new("test")
    }
}

fn audit_events(config: &Config) -> Vec<String> {
    std::fs::read_to_string(config.audit_path())
        .unwrap()
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect()
}

// ============================================================================
// reconcile
// ============================================================================

#[test]
fn reconcile_is_idempotent() {
    let broker = connected(
        MockBroker::builder()
            .with_position(sym("AAA"), 10.0, 50_000_00)
            .with_equity(100_000_00)
            .build(),
    );
    let t = target(&[("AAA", 0.5), ("BBB", 0.5)]);

    let first = reconcile(&broker, &t, false, None).unwrap();
    assert!(first.closed.is_empty());
    assert_eq!(first.retained, vec![sym("AAA")]);
    assert_eq!(first.submitted.len(), 1);
    assert_eq!(first.submitted[0].order.symbol, sym("BBB"));
    assert_eq!(first.submitted[0].order.notional_cents, 50_000_00);

    broker.clear_calls();
    let second = reconcile(&broker, &t, false, None).unwrap();
    assert!(second.is_noop());
    assert!(broker.mutations().is_empty());
}

#[test]
fn reconcile_closes_untargeted() {
    let broker = connected(
        MockBroker::builder()
            .with_position(sym("ZZZ"), 5.0, 1_000_00)
            .with_position(sym("AAA"), 5.0, 1_000_00)
            .build(),
    );
    let t = target(&[("AAA", 0.5)]);

    let report = reconcile(&broker, &t, false, None).unwrap();
    assert_eq!(report.closed, vec![sym("ZZZ")]);
    assert_eq!(broker.held_symbols(), vec![sym("AAA")]);
    assert!(report.submitted.is_empty());
}

#[test]
fn reconcile_sizes_from_equity() {
    let broker = connected(MockBroker::builder().with_equity(100_000_00).build());
    let t = target(&[("SSO", 0.25), ("MVV", 0.25)]);

    let report = reconcile(&broker, &t, false, None).unwrap();
    assert_eq!(report.equity_cents, 100_000_00);
    let notionals: Vec<i64> = broker
        .submitted_orders()
        .iter()
        .map(|o| o.notional_cents)
        .collect();
    assert_eq!(notionals, vec![25_000_00, 25_000_00]);
}

#[test]
fn reconcile_never_submits_cash() {
    let broker = connected(MockBroker::builder().build());
    let t = target(&[("", 0.25), ("SSO", 0.25), ("", 0.5)]);

    let report = reconcile(&broker, &t, false, None).unwrap();
    assert_eq!(report.submitted.len(), 1);
    assert_eq!(broker.submitted_orders()[0].symbol, sym("SSO"));
}

#[test]
fn reconcile_all_cash_target_closes_everything() {
    let broker = connected(
        MockBroker::builder()
            .with_position(sym("SSO"), 5.0, 1_000_00)
            .build(),
    );
    let t = target(&[("", 0.5), ("", 0.5)]);

    let report = reconcile(&broker, &t, false, None).unwrap();
    assert_eq!(report.closed, vec![sym("SSO")]);
    assert!(broker.submitted_orders().is_empty());
}

#[test]
fn reconcile_call_order() {
    let broker = connected(
        MockBroker::builder()
            .with_open_order("o-1", sym("AAA"))
            .with_position(sym("ZZZ"), 1.0, 100_00)
            .build(),
    );
    let t = target(&[("AAA", 0.5)]);

    reconcile(&broker, &t, false, None).unwrap();
    let calls = broker.calls();
    assert_eq!(calls[0], BrokerCall::OpenOrders);
    assert_eq!(calls[1], BrokerCall::CancelOrder(OrderId("o-1".into())));
    assert_eq!(calls[2], BrokerCall::Positions);
    assert_eq!(calls[3], BrokerCall::ClosePosition(sym("ZZZ")));
    assert_eq!(calls[4], BrokerCall::Account);
    assert!(matches!(calls[5], BrokerCall::SubmitOrder(ref o) if o.symbol == sym("AAA")));
    assert_eq!(calls.len(), 6);
}

#[test]
fn reconcile_dry_run_is_read_only() {
    let broker = connected(
        MockBroker::builder()
            .with_open_order("o-1", sym("AAA"))
            .with_position(sym("ZZZ"), 1.0, 100_00)
            .with_equity(10_000_00)
            .build(),
    );
    let t = target(&[("AAA", 0.5)]);

    let plan = reconcile(&broker, &t, true, None).unwrap();
    assert!(plan.dry_run);
    assert_eq!(plan.cancelled, vec![OrderId("o-1".into())]);
    assert_eq!(plan.closed, vec![sym("ZZZ")]);
    assert_eq!(plan.submitted.len(), 1);
    assert_eq!(plan.submitted[0].id, None);
    assert!(broker.mutations().is_empty());
    assert_eq!(broker.held_symbols(), vec![sym("ZZZ")]);
}

#[test]
fn reconcile_stops_on_close_failure() {
    let broker = connected(
        MockBroker::builder()
            .with_position(sym("ZZZ"), 1.0, 100_00)
            .fail_on(Operation::ClosePosition)
            .build(),
    );
    let t = target(&[("AAA", 0.5)]);

    let err = reconcile(&broker, &t, false, None).unwrap_err();
    assert!(matches!(err, Error::Broker(BrokerError::Other(_))));
    assert!(broker.submitted_orders().is_empty());
    assert!(!broker.calls().contains(&BrokerCall::Account));
}

#[test]
fn reconcile_stops_on_cancel_failure() {
    let broker = connected(
        MockBroker::builder()
            .with_open_order("o-1", sym("AAA"))
            .fail_on(Operation::CancelOrder)
            .build(),
    );
    let err = reconcile(&broker, &target(&[("AAA", 1.0)]), false, None).unwrap_err();
    assert!(matches!(err, Error::Broker(_)));
    assert!(!broker.calls().contains(&BrokerCall::Positions));
}

#[test]
fn reconcile_requires_connection() {
    let broker = MockBroker::builder().build();
    let err = reconcile(&broker, &target(&[("AAA", 1.0)]), false, None).unwrap_err();
    assert!(matches!(err, Error::Broker(BrokerError::NotConnected)));
}

// ============================================================================
// full run
// ============================================================================

#[test]
fn assess_flat_market_is_average() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let a = execution::assess(&config, &flat_source(), today()).unwrap();
    assert!((a.reading.value - 0.55).abs() < 1e-9);
    assert!((a.scaled - 55.0).abs() < 1e-6);
    assert_eq!(a.level.name, "average");
    assert!(!a.clamped);
    assert_eq!(a.reading.rows, 10);
    assert_eq!(a.target.len(), 4);
    assert_eq!(
        a.target.symbols(),
        [&sym("QLD"), &sym("MVV"), &sym("SSO"), &sym("SVXY")]
    );
}

#[test]
fn run_end_to_end_then_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let broker = connected(
        MockBroker::builder()
            .with_open_order("o-1", sym("SSO"))
            .with_position(sym("SSO"), 100.0, 25_000_00)
            .with_position(sym("ZZZ"), 10.0, 5_000_00)
            .with_equity(100_000_00)
            .build(),
    );

    let report = execution::run(&config, &broker, &flat_source(), &forced()).unwrap();
    assert_eq!(report.cancelled, vec![OrderId("o-1".into())]);
    assert_eq!(report.closed, vec![sym("ZZZ")]);
    assert_eq!(report.retained, vec![sym("SSO")]);
    let bought: Vec<(Symbol, i64)> = report
        .submitted
        .iter()
        .map(|s| (s.order.symbol.clone(), s.order.notional_cents))
        .collect();
    assert_eq!(
        bought,
        vec![
            (sym("QLD"), 25_000_00),
            (sym("MVV"), 25_000_00),
            (sym("SVXY"), 25_000_00),
        ]
    );

    broker.clear_calls();
    let again = execution::run(&config, &broker, &flat_source(), &forced()).unwrap();
    assert!(again.is_noop());
    assert!(broker.mutations().is_empty());

    let events = audit_events(&config);
    assert_eq!(events.first().map(String::as_str), Some("run_started"));
    assert!(events.contains(&"barometer_computed".to_string()));
    assert!(events.contains(&"order_cancelled".to_string()));
    assert!(events.contains(&"position_closed".to_string()));
    assert!(events.contains(&"position_retained".to_string()));
    assert_eq!(events.iter().filter(|e| *e == "order_submitted").count(), 3);
    assert_eq!(events.iter().filter(|e| *e == "run_completed").count(), 2);
}

#[test]
fn run_dry_run_leaves_account_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let broker = connected(
        MockBroker::builder()
            .with_position(sym("ZZZ"), 10.0, 5_000_00)
            .build(),
    );
    let opts = RunOptions {
        dry_run: true,
        ..forced()
    };

    let report = execution::run(&config, &broker, &flat_source(), &opts).unwrap();
    assert!(report.dry_run);
    assert_eq!(report.closed, vec![sym("ZZZ")]);
    assert_eq!(report.submitted.len(), 4);
    assert!(broker.mutations().is_empty());
}

#[test]
fn run_overflow_rejected_before_broker() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    // 0.55 * 200 = 110, above the highest threshold
    config.barometer.scale = 200.0;
    let broker = connected(MockBroker::builder().build());

    let err = execution::run(&config, &broker, &flat_source(), &forced()).unwrap_err();
    assert!(matches!(err, Error::UnclassifiedRegime { highest, .. } if highest == 100.0));
    assert!(broker.calls().is_empty());
    assert_eq!(audit_events(&config).last().map(String::as_str), Some("run_failed"));
}

#[test]
fn run_overflow_clamped_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.barometer.scale = 200.0;
    config.regime.overflow = volbarometer::OverflowPolicy::ClampToHighest;

    let a = execution::assess(&config, &flat_source(), today()).unwrap();
    assert!(a.clamped);
    assert_eq!(a.level.name, "extreme");
    // defensive_rotation and vol_trend hold cash at "extreme"
    assert_eq!(a.target.symbols(), [&sym("GLD"), &sym("VIXM")]);
}

#[test]
fn run_data_failure_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let broker = connected(MockBroker::builder().build());
    let source = StaticSource::new().with("vix", flat_csv());

    let err = execution::run(&config, &broker, &source, &forced()).unwrap_err();
    assert!(matches!(err, Error::DataFetch { .. }));
    assert!(broker.calls().is_empty());
}

#[test]
fn run_broker_failure_is_audited() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let broker = connected(
        MockBroker::builder()
            .fail_on(Operation::SubmitOrder)
            .build(),
    );

    let err = execution::run(&config, &broker, &flat_source(), &forced()).unwrap_err();
    assert!(matches!(err, Error::Broker(_)));
    assert_eq!(broker.submitted_orders().len(), 1);
    assert_eq!(audit_events(&config).last().map(String::as_str), Some("run_failed"));
}

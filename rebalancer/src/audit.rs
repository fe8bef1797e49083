//! JSONL audit trail logging.
//!
//! Each rebalancer run appends events to an audit.jsonl file,
//! one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use volbarometer::{BarometerReading, Symbol, TargetAllocation};
use volbarometer_broker::{NotionalOrder, OpenOrder, OrderId, format_cents};

use crate::error::{Error, Result};
use crate::execution::RebalanceReport;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Log a run start event.
pub fn log_run_started(audit: &mut AuditLog, trigger: &str, dry_run: bool) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({ "trigger": trigger, "dry_run": dry_run }),
    )
}

/// Log the barometer reading, its level and the resulting target.
pub fn log_barometer(
    audit: &mut AuditLog,
    reading: &BarometerReading,
    scaled: f64,
    target: &TargetAllocation,
) -> Result<()> {
    audit.log(
        "barometer_computed",
        serde_json::json!({
            "as_of": reading.as_of.to_string(),
            "value": reading.value,
            "scaled": scaled,
            "rows": reading.rows,
            "level": target.level,
            "target": target.entries,
        }),
    )
}

pub fn log_order_cancelled(audit: &mut AuditLog, order: &OpenOrder) -> Result<()> {
    audit.log(
        "order_cancelled",
        serde_json::json!({ "id": order.id.0, "symbol": order.symbol.as_str() }),
    )
}

pub fn log_position_closed(audit: &mut AuditLog, symbol: &Symbol) -> Result<()> {
    audit.log(
        "position_closed",
        serde_json::json!({ "symbol": symbol.as_str() }),
    )
}

pub fn log_position_retained(audit: &mut AuditLog, symbol: &Symbol) -> Result<()> {
    audit.log(
        "position_retained",
        serde_json::json!({ "symbol": symbol.as_str() }),
    )
}

pub fn log_order_submitted(audit: &mut AuditLog, order: &NotionalOrder, id: &OrderId) -> Result<()> {
    audit.log(
        "order_submitted",
        serde_json::json!({
            "id": id.0,
            "symbol": order.symbol.as_str(),
            "side": order.side.as_str(),
            "notional": format_cents(order.notional_cents),
        }),
    )
}

/// Log run completion with the report counters.
pub fn log_run_completed(audit: &mut AuditLog, report: &RebalanceReport) -> Result<()> {
    audit.log(
        "run_completed",
        serde_json::json!({
            "dry_run": report.dry_run,
            "cancelled": report.cancelled.len(),
            "closed": report.closed.len(),
            "retained": report.retained.len(),
            "submitted": report.submitted.len(),
            "equity": format_cents(report.equity_cents),
        }),
    )
}

pub fn log_run_failed(audit: &mut AuditLog, err: &Error) -> Result<()> {
    audit.log(
        "run_failed",
        serde_json::json!({ "kind": err.kind(), "error": err.to_string() }),
    )
}

//! Reports
//!
//! Read-only text rendering over the ledger, for whatever front-end drives
//! it: facility status, the visit log, and the subscription registry. All
//! tables are plain text via `tabled`.

use std::fmt::Write;

use humanize_duration::{Truncate, prelude::DurationExt};
use tabled::{builder::Builder, settings::Style};
use thiserror::Error;

use crate::ledger::{LedgerError, ParkingLedger};
use crate::tariffs;
use crate::vehicles::Vehicle;

/// Errors building a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Formatting into the output string failed.
    #[error("failed to format report")]
    Fmt(#[from] std::fmt::Error),

    /// The underlying ledger query failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Renders the facility summary and a table of parked vehicles.
///
/// # Errors
///
/// Returns a [`ReportError`] if a fare cannot be computed for a parked
/// vehicle.
pub fn facility_status(ledger: &ParkingLedger) -> Result<String, ReportError> {
    let mut out = String::new();

    let occupied = ledger.active_count();
    let capacity = ledger.capacity();
    let occupancy = if capacity == 0 {
        0.0
    } else {
        f64::from(u32::try_from(occupied).unwrap_or(u32::MAX)) / f64::from(capacity) * 100.0
    };

    writeln!(out, "{}", ledger.name())?;
    writeln!(out, "Capacity: {capacity} slots")?;
    writeln!(out, "Occupied: {occupied}")?;
    writeln!(out, "Available: {}", ledger.available_slots())?;
    writeln!(out, "Occupancy: {occupancy:.1}%")?;

    let statuses = ledger.active_statuses()?;
    if statuses.is_empty() {
        return Ok(out);
    }

    let mut builder = Builder::default();
    builder.push_record(["Slot", "Plate", "Class", "Owner", "Parked", "Due so far"]);

    for status in statuses {
        builder.push_record([
            status.slot.map_or_else(|| "-".to_string(), |s| s.to_string()),
            status.plate.to_string(),
            status.class.to_string(),
            status.owner.unwrap_or_else(|| "-".to_string()),
            elapsed(status.elapsed),
            tariffs::money(status.due).to_string(),
        ]);
    }

    writeln!(out)?;
    writeln!(out, "{}", builder.build().with(Style::sharp()))?;

    Ok(out)
}

/// Renders the visit log (most recent `limit` completed visits) with the
/// total collected across the whole in-memory history.
///
/// # Errors
///
/// Returns a [`ReportError`] if formatting fails.
pub fn visit_log(ledger: &ParkingLedger, limit: usize) -> Result<String, ReportError> {
    let mut out = String::new();
    let history = ledger.history();

    if history.is_empty() {
        writeln!(out, "No completed visits yet")?;
        return Ok(out);
    }

    let mut builder = Builder::default();
    builder.push_record(["Plate", "Class", "Stayed", "Fare"]);

    let tail_start = history.len().saturating_sub(limit);
    for vehicle in history.iter().skip(tail_start) {
        builder.push_record([
            vehicle.plate().to_string(),
            vehicle.class().to_string(),
            stayed(vehicle),
            tariffs::money(vehicle.fee_paid()).to_string(),
        ]);
    }

    writeln!(out, "{}", builder.build().with(Style::sharp()))?;
    writeln!(
        out,
        "Collected in total: {}",
        tariffs::money(ledger.collected_total())
    )?;

    Ok(out)
}

/// Renders the subscription registry with validity, days remaining, and the
/// current price list per class.
///
/// # Errors
///
/// Returns a [`ReportError`] if subscription pricing fails.
pub fn subscription_summary(ledger: &ParkingLedger) -> Result<String, ReportError> {
    let mut out = String::new();
    let now = ledger.now();

    let stats = ledger.subscription_stats();
    writeln!(
        out,
        "Subscriptions: {} total, {} valid, {} lapsed",
        stats.total, stats.valid, stats.lapsed
    )?;
    writeln!(
        out,
        "Monthly income: {}",
        tariffs::money(stats.monthly_income)
    )?;

    let mut subscriptions: Vec<_> = ledger.subscriptions().collect();
    if !subscriptions.is_empty() {
        subscriptions.sort_by(|a, b| a.plate().as_str().cmp(b.plate().as_str()));

        let mut builder = Builder::default();
        builder.push_record(["Plate", "Owner", "Class", "State", "Days left", "Paid"]);

        for subscription in subscriptions {
            let state = if subscription.is_valid_at(now) {
                "valid"
            } else {
                "lapsed"
            };

            builder.push_record([
                subscription.plate().to_string(),
                subscription.owner().to_string(),
                subscription.class().to_string(),
                state.to_string(),
                subscription.days_remaining_at(now).to_string(),
                tariffs::money(subscription.amount_paid()).to_string(),
            ]);
        }

        writeln!(out)?;
        writeln!(out, "{}", builder.build().with(Style::sharp()))?;
    }

    writeln!(out)?;
    writeln!(out, "Current monthly prices:")?;
    for (class, price) in ledger
        .subscription_prices()
        .map_err(LedgerError::from)?
    {
        writeln!(out, "  {class}: {}", tariffs::money(price))?;
    }

    Ok(out)
}

fn elapsed(duration: jiff::SignedDuration) -> String {
    duration.unsigned_abs().human(Truncate::Minute).to_string()
}

fn stayed(vehicle: &Vehicle) -> String {
    // Completed visits carry their exit time, so "now" is never consulted.
    vehicle
        .exited_at()
        .map_or_else(String::new, |exit| {
            vehicle.stay(exit).unsigned_abs().human(Truncate::Minute).to_string()
        })
}

#[cfg(test)]
mod tests {
    use jiff::{SignedDuration, Timestamp};
    use testresult::TestResult;

    use crate::clock::FixedClock;

    use super::*;

    fn ledger() -> (ParkingLedger, FixedClock) {
        let clock = FixedClock::at(Timestamp::UNIX_EPOCH);
        let ledger = ParkingLedger::new("Central", 10).with_clock(Box::new(clock.clone()));

        (ledger, clock)
    }

    #[test]
    fn facility_status_lists_parked_vehicles() -> TestResult {
        let (mut ledger, clock) = ledger();

        ledger.register_entry("ABC123", "car", "Ana")?;
        clock.advance(SignedDuration::from_mins(45));

        let report = facility_status(&ledger)?;

        assert!(report.contains("Central"), "report: {report}");
        assert!(report.contains("Occupancy: 10.0%"), "report: {report}");
        assert!(report.contains("ABC123"), "report: {report}");
        assert!(report.contains("Ana"), "report: {report}");

        Ok(())
    }

    #[test]
    fn facility_status_without_vehicles_has_no_table() -> TestResult {
        let (ledger, _clock) = ledger();

        let report = facility_status(&ledger)?;

        assert!(report.contains("Occupied: 0"), "report: {report}");
        assert!(!report.contains("Plate"), "report: {report}");

        Ok(())
    }

    #[test]
    fn visit_log_shows_recent_exits_and_total() -> TestResult {
        let (mut ledger, clock) = ledger();

        ledger.register_entry("AAA111", "car", "")?;
        ledger.register_entry("BBB222", "motorcycle", "")?;
        clock.advance(SignedDuration::from_mins(30));
        ledger.register_exit("AAA111")?;
        ledger.register_exit("BBB222")?;

        let report = visit_log(&ledger, 10)?;

        assert!(report.contains("AAA111"), "report: {report}");
        assert!(report.contains("BBB222"), "report: {report}");
        assert!(report.contains("Collected in total"), "report: {report}");

        Ok(())
    }

    #[test]
    fn visit_log_limit_drops_older_entries() -> TestResult {
        let (mut ledger, clock) = ledger();

        ledger.register_entry("AAA111", "car", "")?;
        clock.advance(SignedDuration::from_mins(5));
        ledger.register_exit("AAA111")?;
        ledger.register_entry("BBB222", "car", "")?;
        clock.advance(SignedDuration::from_mins(5));
        ledger.register_exit("BBB222")?;

        let report = visit_log(&ledger, 1)?;

        assert!(!report.contains("AAA111"), "report: {report}");
        assert!(report.contains("BBB222"), "report: {report}");

        Ok(())
    }

    #[test]
    fn subscription_summary_shows_registry_and_prices() -> TestResult {
        let (mut ledger, _clock) = ledger();

        ledger.register_subscription("ABC123", "Ana Diaz", "car", "555", "ana@example.com")?;

        let report = subscription_summary(&ledger)?;

        assert!(report.contains("1 valid"), "report: {report}");
        assert!(report.contains("ABC123"), "report: {report}");
        assert!(report.contains("Current monthly prices"), "report: {report}");
        assert!(report.contains("pickup"), "report: {report}");

        Ok(())
    }
}

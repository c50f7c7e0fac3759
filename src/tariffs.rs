//! Tariffs
//!
//! The rate table and the pure fare policy. All amounts are whole units of
//! the facility currency (Colombian pesos); [`money`] wraps one for display.
//!
//! The policy is deliberately simple: stays are billed per started hour with
//! a one-hour minimum, a currently valid subscription takes a flat 10% off,
//! and the monthly subscription price is an estimated month of parking at a
//! 30% reduction.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use jiff::SignedDuration;

use crate::vehicles::VehicleClass;

/// The facility currency.
pub const CURRENCY: &iso::Currency = iso::COP;

/// Flat percentage taken off the base fare for a valid subscription.
pub const FARE_DISCOUNT_PERCENT: u8 = 10;

/// Percentage taken off the estimated month of parking when pricing a
/// subscription; the incentive for committing to one.
pub const SUBSCRIPTION_DISCOUNT_PERCENT: u8 = 30;

/// Estimated billable hours in a month: 8 hours a day over 22 working days.
pub const MONTHLY_HOURS: i64 = 176;

/// Errors from fare arithmetic.
///
/// These signal amounts outside the representable range, not bad user input;
/// the ledger validates input before fares are ever computed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FareError {
    /// Multiplying hours by the hourly rate overflowed.
    #[error("fare amount overflowed")]
    AmountOverflow,

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,
}

/// Hourly rates per vehicle class.
///
/// Mutable configuration: the ledger merges changes in at runtime and fares
/// always read the table as it is now, including for vehicles that entered
/// under older rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTable {
    rates: FxHashMap<VehicleClass, i64>,
}

impl Default for RateTable {
    fn default() -> Self {
        let mut rates = FxHashMap::default();
        rates.insert(VehicleClass::Motorcycle, 1_500);
        rates.insert(VehicleClass::Car, 2_500);
        rates.insert(VehicleClass::Pickup, 3_500);

        Self { rates }
    }
}

impl RateTable {
    /// Fallback when even the car rate is missing from a restored table.
    const DEFAULT_CAR_RATE: i64 = 2_500;

    /// The hourly rate for `class`.
    ///
    /// A class missing from the table (possible only in a hand-edited or
    /// legacy snapshot) falls back to the car rate rather than failing, so a
    /// restore can never poison later exits.
    pub fn hourly_rate(&self, class: VehicleClass) -> i64 {
        self.rates.get(&class).copied().unwrap_or_else(|| {
            self.rates
                .get(&VehicleClass::Car)
                .copied()
                .unwrap_or(Self::DEFAULT_CAR_RATE)
        })
    }

    /// Overwrites the rate for `class`.
    pub fn set(&mut self, class: VehicleClass, rate: i64) {
        self.rates.insert(class, rate);
    }

    /// Rates in display order.
    pub fn entries(&self) -> impl Iterator<Item = (VehicleClass, i64)> + '_ {
        VehicleClass::ALL
            .into_iter()
            .map(|class| (class, self.hourly_rate(class)))
    }
}

/// Wraps a whole-unit amount for display in the facility currency.
pub fn money(amount: i64) -> Money<'static, iso::Currency> {
    Money::from_major(amount, CURRENCY)
}

/// Hours to bill for a stay: any started hour counts, minimum one.
///
/// A zero or negative duration (clock skew) still bills the minimum hour.
pub fn billable_hours(stay: SignedDuration) -> i64 {
    stay.as_secs()
        .max(0)
        .cast_unsigned()
        .div_ceil(3_600)
        .cast_signed()
        .max(1)
}

/// Computes the fare for a stay.
///
/// Base amount is billable hours times the class rate; a valid subscription
/// takes [`FARE_DISCOUNT_PERCENT`] off, rounded midpoint-away-from-zero.
/// Pure: no clock reads, no state.
///
/// # Errors
///
/// Returns a [`FareError`] if the amount overflows or the percentage cannot
/// be represented.
pub fn compute_fare(
    stay: SignedDuration,
    class: VehicleClass,
    rates: &RateTable,
    has_valid_subscription: bool,
) -> Result<i64, FareError> {
    let base = billable_hours(stay)
        .checked_mul(rates.hourly_rate(class))
        .ok_or(FareError::AmountOverflow)?;

    if !has_valid_subscription {
        return Ok(base);
    }

    let discount = percent_of(percentage(FARE_DISCOUNT_PERCENT), base)?;

    base.checked_sub(discount).ok_or(FareError::AmountOverflow)
}

/// Prices a monthly subscription for `class` from the current rate table:
/// `floor(176 × hourly rate × 0.70)`.
///
/// Renewals call this again, so the price follows rate changes.
///
/// # Errors
///
/// Returns a [`FareError`] if the amount overflows or the percentage cannot
/// be represented.
pub fn subscription_price(class: VehicleClass, rates: &RateTable) -> Result<i64, FareError> {
    let gross = MONTHLY_HOURS
        .checked_mul(rates.hourly_rate(class))
        .ok_or(FareError::AmountOverflow)?;

    let gross = Decimal::from_i64(gross).ok_or(FareError::PercentConversion)?;

    let discount = (percentage(SUBSCRIPTION_DISCOUNT_PERCENT) * Decimal::ONE)
        .checked_mul(gross)
        .ok_or(FareError::PercentConversion)?;

    gross
        .checked_sub(discount)
        .ok_or(FareError::AmountOverflow)?
        .round_dp_with_strategy(0, RoundingStrategy::ToZero)
        .to_i64()
        .ok_or(FareError::PercentConversion)
}

fn percentage(percent: u8) -> Percentage {
    Percentage::from(f64::from(percent) / 100.0)
}

/// The given percentage of an amount, rounded midpoint-away-from-zero.
fn percent_of(percent: Percentage, amount: i64) -> Result<i64, FareError> {
    let amount = Decimal::from_i64(amount).ok_or(FareError::PercentConversion)?;

    // decimal_percentage does not expose its inner Decimal.
    (percent * Decimal::ONE)
        .checked_mul(amount)
        .ok_or(FareError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(FareError::PercentConversion)
}

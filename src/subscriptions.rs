//! Subscriptions
//!
//! A subscription ("abono") is a 30-day contract tied to a plate. While valid
//! it takes a flat percentage off every fare for that plate. Records are
//! never deleted: cancellation clears the active flag and expiry simply
//! passes, but the record stays queryable for audit and can be renewed.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::plates::Plate;
use crate::tariffs::FARE_DISCOUNT_PERCENT;
use crate::vehicles::VehicleClass;

/// Length of one subscription period.
pub const SUBSCRIPTION_TERM: SignedDuration = SignedDuration::from_hours(30 * 24);

/// A monthly subscription contract for one plate.
///
/// Invariant: `expires_at` is always exactly [`SUBSCRIPTION_TERM`] after the
/// most recent start, whether that start came from registration or renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    plate: Plate,
    owner: String,
    class: VehicleClass,
    /// Contact phone; opaque pass-through, not validated.
    phone: String,
    /// Contact email; opaque pass-through, not validated.
    email: String,
    started_at: Timestamp,
    expires_at: Timestamp,
    active: bool,
    amount_paid: i64,
    fare_discount_percent: u8,
}

impl Subscription {
    /// Opens a subscription starting at `now`, with `amount_paid` already
    /// priced by the caller from the current rate table.
    pub(crate) fn start(
        plate: Plate,
        owner: String,
        class: VehicleClass,
        phone: String,
        email: String,
        now: Timestamp,
        amount_paid: i64,
    ) -> Self {
        Self {
            plate,
            owner,
            class,
            phone,
            email,
            started_at: now,
            expires_at: now
                .saturating_add(SUBSCRIPTION_TERM)
                .unwrap_or_else(|_| unreachable!("`SignedDuration` arithmetic cannot fail")),
            active: true,
            amount_paid,
            fare_discount_percent: FARE_DISCOUNT_PERCENT,
        }
    }

    /// Restarts the 30-day window at `now` and reactivates the record.
    ///
    /// Any remaining days are discarded; there is no stacking.
    pub(crate) fn renew(&mut self, now: Timestamp, amount_paid: i64) {
        self.started_at = now;
        self.expires_at = now
            .saturating_add(SUBSCRIPTION_TERM)
            .unwrap_or_else(|_| unreachable!("`SignedDuration` arithmetic cannot fail"));
        self.active = true;
        self.amount_paid = amount_paid;
    }

    /// Deactivates the record, keeping it for audit.
    pub(crate) fn cancel(&mut self) {
        self.active = false;
    }

    /// True iff the record is active and `now` is within the window.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.active && now <= self.expires_at
    }

    /// Whole days left at `now`; zero once invalid.
    pub fn days_remaining_at(&self, now: Timestamp) -> i64 {
        if !self.is_valid_at(now) {
            return 0;
        }

        (self.expires_at.duration_since(now).as_hours() / 24).max(0)
    }

    /// The subscribed plate.
    pub fn plate(&self) -> &Plate {
        &self.plate
    }

    /// The owner's name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The vehicle class the price was computed for.
    pub fn class(&self) -> VehicleClass {
        self.class
    }

    /// Contact phone as registered.
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Contact email as registered.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Start of the current window.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// End of the current window (inclusive).
    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    /// False once cancelled.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Amount paid for the current window.
    pub fn amount_paid(&self) -> i64 {
        self.amount_paid
    }

    /// The fare discount this record grants, in percent.
    pub fn fare_discount_percent(&self) -> u8 {
        self.fare_discount_percent
    }
}

//! Vehicles
//!
//! A [`Vehicle`] is one occupancy of a parking slot, from entry to exit. Once
//! the exit is recorded the record is frozen and lives on in the ledger's
//! visit history.

use std::fmt;
use std::str::FromStr;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plates::Plate;

/// The fixed set of vehicle classes the facility prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    /// Two-wheelers.
    Motorcycle,
    /// Standard cars; also the defensive fallback rate class.
    Car,
    /// Pickups and light trucks.
    Pickup,
}

impl VehicleClass {
    /// Every class, in rate-table display order.
    pub const ALL: [Self; 3] = [Self::Motorcycle, Self::Car, Self::Pickup];

    /// The lowercase name used in snapshots and messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Motorcycle => "motorcycle",
            Self::Car => "car",
            Self::Pickup => "pickup",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when input names a vehicle class the rate table does not know.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown vehicle class `{given}`; recognized classes: motorcycle, car, pickup")]
pub struct UnknownClassError {
    /// The rejected input, as given.
    pub given: String,
}

impl FromStr for VehicleClass {
    type Err = UnknownClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "motorcycle" => Ok(Self::Motorcycle),
            "car" => Ok(Self::Car),
            "pickup" => Ok(Self::Pickup),
            _ => Err(UnknownClassError {
                given: s.trim().to_string(),
            }),
        }
    }
}

/// One vehicle's stay in the facility, current or completed.
#[derive(Debug, Clone)]
pub struct Vehicle {
    plate: Plate,
    class: VehicleClass,
    owner: Option<String>,
    entered_at: Timestamp,
    exited_at: Option<Timestamp>,
    slot: Option<u32>,
    fee_paid: i64,
}

impl Vehicle {
    /// Records a vehicle entering the given slot at `now`.
    ///
    /// The entry timestamp is set here, exactly once.
    pub(crate) fn enter(
        plate: Plate,
        class: VehicleClass,
        owner: Option<String>,
        slot: u32,
        now: Timestamp,
    ) -> Self {
        Self {
            plate,
            class,
            owner,
            entered_at: now,
            exited_at: None,
            slot: Some(slot),
            fee_paid: 0,
        }
    }

    /// Rebuilds a record from snapshot data.
    pub(crate) fn restore(
        plate: Plate,
        class: VehicleClass,
        owner: Option<String>,
        entered_at: Timestamp,
        exited_at: Option<Timestamp>,
        slot: Option<u32>,
        fee_paid: i64,
    ) -> Self {
        Self {
            plate,
            class,
            owner,
            entered_at,
            exited_at,
            slot,
            fee_paid,
        }
    }

    /// Records the exit at `now` with the computed fare.
    ///
    /// The ledger calls this exactly once, when the vehicle moves from the
    /// active set to the history log; exit time and fee never change again.
    pub(crate) fn depart(&mut self, now: Timestamp, fare: i64) {
        self.exited_at = Some(now);
        self.fee_paid = fare;
    }

    /// Time spent in the facility: up to the exit if recorded, else up to `now`.
    pub fn stay(&self, now: Timestamp) -> SignedDuration {
        self.exited_at.unwrap_or(now).duration_since(self.entered_at)
    }

    /// True while the vehicle has not exited.
    pub fn is_parked(&self) -> bool {
        self.exited_at.is_none()
    }

    /// The vehicle's plate.
    pub fn plate(&self) -> &Plate {
        &self.plate
    }

    /// The vehicle's class.
    pub fn class(&self) -> VehicleClass {
        self.class
    }

    /// Owner name, if one was given at entry.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// When the vehicle entered.
    pub fn entered_at(&self) -> Timestamp {
        self.entered_at
    }

    /// When the vehicle exited, if it has.
    pub fn exited_at(&self) -> Option<Timestamp> {
        self.exited_at
    }

    /// The assigned slot. `None` only for history records restored from a
    /// snapshot, which does not persist slots for completed visits.
    pub fn slot(&self) -> Option<u32> {
        self.slot
    }

    /// The fare paid at exit; zero while parked.
    pub fn fee_paid(&self) -> i64 {
        self.fee_paid
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn plate() -> Result<Plate, crate::plates::PlateError> {
        Plate::new("ABC123")
    }

    #[test]
    fn class_parses_case_insensitively() -> TestResult {
        assert_eq!("Car".parse::<VehicleClass>()?, VehicleClass::Car);
        assert_eq!(" PICKUP ".parse::<VehicleClass>()?, VehicleClass::Pickup);
        assert_eq!(
            "motorcycle".parse::<VehicleClass>()?,
            VehicleClass::Motorcycle
        );

        Ok(())
    }

    #[test]
    fn class_parse_rejects_unknown_names() {
        let err = "bicycle".parse::<VehicleClass>();

        assert!(matches!(err, Err(UnknownClassError { given }) if given == "bicycle"));
    }

    #[test]
    fn unknown_class_message_enumerates_valid_classes() {
        let Err(err) = "van".parse::<VehicleClass>() else {
            unreachable!("`van` is not a recognized class");
        };

        let message = err.to_string();

        assert!(message.contains("motorcycle"), "message: {message}");
        assert!(message.contains("car"), "message: {message}");
        assert!(message.contains("pickup"), "message: {message}");
    }

    #[test]
    fn enter_sets_entry_and_slot() -> TestResult {
        let now = Timestamp::from_second(1_000)?;
        let vehicle = Vehicle::enter(plate()?, VehicleClass::Car, None, 3, now);

        assert!(vehicle.is_parked());
        assert_eq!(vehicle.entered_at(), now);
        assert_eq!(vehicle.slot(), Some(3));
        assert_eq!(vehicle.fee_paid(), 0);

        Ok(())
    }

    #[test]
    fn depart_freezes_exit_and_fee() -> TestResult {
        let entered = Timestamp::from_second(0)?;
        let exited = Timestamp::from_second(5_400)?;
        let mut vehicle = Vehicle::enter(plate()?, VehicleClass::Car, None, 1, entered);

        vehicle.depart(exited, 5_000);

        assert!(!vehicle.is_parked());
        assert_eq!(vehicle.exited_at(), Some(exited));
        assert_eq!(vehicle.fee_paid(), 5_000);
        // Slot is retained for history.
        assert_eq!(vehicle.slot(), Some(1));

        Ok(())
    }

    #[test]
    fn stay_uses_exit_time_once_departed() -> TestResult {
        let entered = Timestamp::from_second(0)?;
        let mut vehicle = Vehicle::enter(plate()?, VehicleClass::Car, None, 1, entered);

        vehicle.depart(Timestamp::from_second(3_600)?, 2_500);

        let much_later = Timestamp::from_second(100_000)?;

        assert_eq!(
            vehicle.stay(much_later),
            SignedDuration::from_hours(1),
            "stay is fixed at exit"
        );

        Ok(())
    }

    #[test]
    fn stay_tracks_now_while_parked() -> TestResult {
        let vehicle = Vehicle::enter(
            plate()?,
            VehicleClass::Motorcycle,
            Some("Ana".to_string()),
            2,
            Timestamp::from_second(0)?,
        );

        assert_eq!(
            vehicle.stay(Timestamp::from_second(1_800)?),
            SignedDuration::from_mins(30)
        );

        Ok(())
    }
}

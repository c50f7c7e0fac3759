//! Parking ledger
//!
//! [`ParkingLedger`] is the aggregate root: it owns the active vehicle set,
//! the occupied-slot set, the visit history, the subscription registry and
//! the rate table, and it is the only place any of them are mutated. Every
//! mutating operation ends with a snapshot write when a store is attached.
//!
//! The ledger assumes a single caller at a time; anything exposing it to
//! concurrent callers must wrap the whole instance in one lock or a
//! single-writer queue, because slot assignment and the capacity check are
//! read-then-write over shared state.

use std::fmt;

use jiff::{SignedDuration, Timestamp};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::plates::{Plate, PlateError};
use crate::snapshot::{ActiveRecord, HISTORY_TAIL, Snapshot, SnapshotStore, VisitRecord};
use crate::subscriptions::Subscription;
use crate::tariffs::{self, FareError, RateTable};
use crate::vehicles::{UnknownClassError, Vehicle, VehicleClass};

/// Rejections and failures from ledger operations.
///
/// Everything except [`LedgerError::SlotAccounting`] and
/// [`LedgerError::Fare`] is an ordinary user-facing rejection.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The plate failed normalization.
    #[error(transparent)]
    Plate(#[from] PlateError),

    /// The plate is already in the active set.
    #[error("vehicle {0} is already in the facility")]
    AlreadyParked(Plate),

    /// No capacity left.
    #[error("the facility is full")]
    FacilityFull,

    /// The vehicle class is not a recognized rate key.
    #[error(transparent)]
    UnknownClass(#[from] UnknownClassError),

    /// The plate is not in the active set.
    #[error("vehicle {0} is not in the facility")]
    VehicleNotFound(Plate),

    /// Subscriptions require an owner name.
    #[error("owner name must not be empty")]
    EmptyOwner,

    /// The plate already holds a currently valid subscription.
    #[error("vehicle {0} already has a valid subscription")]
    SubscriptionActive(Plate),

    /// No subscription record exists for the plate.
    #[error("no subscription is registered for vehicle {0}")]
    SubscriptionNotFound(Plate),

    /// The occupied-slot set disagrees with the active count. The capacity
    /// check guarantees a free slot exists, so this is a programming error,
    /// not a rejection to show a user.
    #[error("slot accounting is out of sync with the active vehicle set")]
    SlotAccounting,

    /// Fare arithmetic failed.
    #[error(transparent)]
    Fare(#[from] FareError),
}

/// Returned by [`ParkingLedger::register_exit`]: the fare owed and the stay
/// it was billed for.
#[derive(Debug, Clone)]
pub struct ExitReceipt {
    plate: Plate,
    fare: i64,
    stay: SignedDuration,
}

impl ExitReceipt {
    /// The departing vehicle's plate.
    pub fn plate(&self) -> &Plate {
        &self.plate
    }

    /// The fare owed, in whole currency units.
    pub fn fare(&self) -> i64 {
        self.fare
    }

    /// The full stay duration.
    pub fn stay(&self) -> SignedDuration {
        self.stay
    }

    /// Whole hours of the stay.
    pub fn hours(&self) -> i64 {
        self.stay.as_secs().max(0) / 3_600
    }

    /// Minutes past the last whole hour, floored.
    pub fn minutes(&self) -> i64 {
        (self.stay.as_secs().max(0) % 3_600) / 60
    }
}

impl fmt::Display for ExitReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} left after {}h {}m; fare {}",
            self.plate,
            self.hours(),
            self.minutes(),
            tariffs::money(self.fare)
        )
    }
}

/// Point-in-time view of a parked vehicle, including what it would owe if it
/// left now.
#[derive(Debug, Clone)]
pub struct VehicleStatus {
    /// The vehicle's plate.
    pub plate: Plate,
    /// The vehicle's class.
    pub class: VehicleClass,
    /// Owner name, if given at entry.
    pub owner: Option<String>,
    /// Assigned slot.
    pub slot: Option<u32>,
    /// Entry timestamp.
    pub entered_at: Timestamp,
    /// Time parked so far.
    pub elapsed: SignedDuration,
    /// Fare due if the vehicle exited now, subscription discount included.
    pub due: i64,
}

/// Aggregate counters over the subscription registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// All records, valid or not.
    pub total: usize,
    /// Currently valid records.
    pub valid: usize,
    /// Cancelled or expired records.
    pub lapsed: usize,
    /// Sum of amounts paid on currently valid records.
    pub monthly_income: i64,
}

/// The facility's full state and every rule over it.
///
/// Constructed once at process start and passed explicitly to whatever
/// front-end drives it; there is deliberately no global instance.
#[derive(Debug)]
pub struct ParkingLedger {
    name: String,
    capacity: u32,
    active: FxHashMap<Plate, Vehicle>,
    occupied: FxHashSet<u32>,
    history: Vec<Vehicle>,
    subscriptions: FxHashMap<Plate, Subscription>,
    rates: RateTable,
    store: Option<SnapshotStore>,
    clock: Box<dyn Clock>,
}

impl ParkingLedger {
    /// Creates an empty in-memory ledger with default rates and the system
    /// clock. Attach persistence with [`ParkingLedger::attach_store`].
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            active: FxHashMap::default(),
            occupied: FxHashSet::default(),
            history: Vec::new(),
            subscriptions: FxHashMap::default(),
            rates: RateTable::default(),
            store: None,
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the clock. Intended for tests and deterministic replays.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attaches a snapshot store and seeds state from it.
    ///
    /// If the store holds a readable snapshot, its state (including name,
    /// capacity and rates) replaces the current one. An absent or unreadable
    /// store is logged and the ledger keeps its current state; startup never
    /// fails on a bad snapshot.
    pub fn attach_store(&mut self, store: SnapshotStore) {
        match store.load() {
            Ok(Some(snapshot)) => {
                debug!(path = %store.path().display(), "restoring ledger from snapshot");
                self.restore(snapshot);
            }
            Ok(None) => {
                debug!(path = %store.path().display(), "no snapshot found; starting empty");
            }
            Err(error) => {
                warn!(
                    path = %store.path().display(),
                    %error,
                    "snapshot unreadable; starting empty"
                );
            }
        }

        self.store = Some(store);
    }

    /// Registers a vehicle entering the facility and returns its slot.
    ///
    /// The vehicle gets the lowest free slot number. An empty `owner` is
    /// recorded as no owner.
    ///
    /// # Errors
    ///
    /// First failing precondition wins: empty plate, plate already parked,
    /// facility full, unrecognized vehicle class.
    pub fn register_entry(
        &mut self,
        plate: &str,
        class: &str,
        owner: &str,
    ) -> Result<u32, LedgerError> {
        let plate = Plate::new(plate)?;

        if self.active.contains_key(&plate) {
            return Err(LedgerError::AlreadyParked(plate));
        }

        if self.active.len() >= self.capacity as usize {
            return Err(LedgerError::FacilityFull);
        }

        let class: VehicleClass = class.parse()?;

        // The capacity check above guarantees a free slot; not finding one
        // means the occupied set has desynced from the active map.
        let slot = self.lowest_free_slot().ok_or(LedgerError::SlotAccounting)?;

        let owner = Some(owner.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string);

        let now = self.clock.now();
        let vehicle = Vehicle::enter(plate.clone(), class, owner, slot, now);

        self.active.insert(plate.clone(), vehicle);
        self.occupied.insert(slot);

        debug!(%plate, %class, slot, "vehicle entered");
        self.persist();

        Ok(slot)
    }

    /// Registers a vehicle leaving the facility.
    ///
    /// Computes the fare from the current rate table and subscription
    /// status, frees the slot, and appends the completed visit to the
    /// history log (chronological exit order).
    ///
    /// # Errors
    ///
    /// Rejects an empty plate or a plate that is not currently parked; fare
    /// arithmetic failures leave the ledger unchanged.
    pub fn register_exit(&mut self, plate: &str) -> Result<ExitReceipt, LedgerError> {
        let plate = Plate::new(plate)?;
        let now = self.clock.now();

        let vehicle = self
            .active
            .get(&plate)
            .ok_or_else(|| LedgerError::VehicleNotFound(plate.clone()))?;

        let stay = vehicle.stay(now);
        let fare = tariffs::compute_fare(
            stay,
            vehicle.class(),
            &self.rates,
            self.subscription_valid(&plate, now),
        )?;

        // Nothing can fail past this point; now mutate.
        let Some(mut vehicle) = self.active.remove(&plate) else {
            return Err(LedgerError::SlotAccounting);
        };

        vehicle.depart(now, fare);

        if let Some(slot) = vehicle.slot() {
            self.occupied.remove(&slot);
        }

        self.history.push(vehicle);

        debug!(%plate, fare, "vehicle exited");
        self.persist();

        Ok(ExitReceipt { plate, fare, stay })
    }

    /// Registers a new monthly subscription, priced from the current rates.
    ///
    /// An expired or cancelled record for the same plate is replaced; a
    /// currently valid one is a rejection.
    ///
    /// Unlike entries, subscriptions are long-lived registrations, so the
    /// plate must pass the strict format check here.
    ///
    /// # Errors
    ///
    /// Rejects a malformed plate, an empty owner, an unrecognized class, or a
    /// plate that already holds a valid subscription.
    pub fn register_subscription(
        &mut self,
        plate: &str,
        owner: &str,
        class: &str,
        phone: &str,
        email: &str,
    ) -> Result<Subscription, LedgerError> {
        let plate = Plate::parse_strict(plate)?;

        let owner = owner.trim();
        if owner.is_empty() {
            return Err(LedgerError::EmptyOwner);
        }

        let class: VehicleClass = class.parse()?;

        let now = self.clock.now();
        if let Some(existing) = self.subscriptions.get(&plate)
            && existing.is_valid_at(now)
        {
            return Err(LedgerError::SubscriptionActive(plate));
        }

        let amount = tariffs::subscription_price(class, &self.rates)?;
        let subscription = Subscription::start(
            plate.clone(),
            owner.to_string(),
            class,
            phone.trim().to_string(),
            email.trim().to_string(),
            now,
            amount,
        );

        self.subscriptions
            .insert(plate.clone(), subscription.clone());

        debug!(%plate, %class, amount, "subscription registered");
        self.persist();

        Ok(subscription)
    }

    /// Renews an existing subscription: the 30-day window restarts at now
    /// and the price is recomputed from the current rate table.
    ///
    /// Expired and cancelled records can be renewed; only a missing record
    /// is a rejection.
    ///
    /// # Errors
    ///
    /// Rejects an empty plate or a plate with no subscription record.
    pub fn renew_subscription(&mut self, plate: &str) -> Result<Subscription, LedgerError> {
        let plate = Plate::new(plate)?;
        let now = self.clock.now();

        let Some(subscription) = self.subscriptions.get_mut(&plate) else {
            return Err(LedgerError::SubscriptionNotFound(plate));
        };

        let amount = tariffs::subscription_price(subscription.class(), &self.rates)?;
        subscription.renew(now, amount);
        let renewed = subscription.clone();

        debug!(%plate, amount, "subscription renewed");
        self.persist();

        Ok(renewed)
    }

    /// Cancels a subscription. The record stays queryable but is no longer
    /// valid.
    ///
    /// # Errors
    ///
    /// Rejects an empty plate or a plate with no subscription record.
    pub fn cancel_subscription(&mut self, plate: &str) -> Result<(), LedgerError> {
        let plate = Plate::new(plate)?;

        let Some(subscription) = self.subscriptions.get_mut(&plate) else {
            return Err(LedgerError::SubscriptionNotFound(plate));
        };

        subscription.cancel();

        debug!(%plate, "subscription cancelled");
        self.persist();

        Ok(())
    }

    /// True iff the plate holds a subscription that is active and unexpired
    /// right now. Unparseable plates are simply not subscribed.
    pub fn has_valid_subscription(&self, plate: &str) -> bool {
        Plate::new(plate).is_ok_and(|plate| self.subscription_valid(&plate, self.clock.now()))
    }

    /// The subscription record for a plate, valid or not.
    pub fn subscription(&self, plate: &str) -> Option<&Subscription> {
        let plate = Plate::new(plate).ok()?;
        self.subscriptions.get(&plate)
    }

    /// All subscription records, in no particular order.
    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values()
    }

    /// Currently valid subscription records.
    pub fn valid_subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        let now = self.clock.now();
        self.subscriptions
            .values()
            .filter(move |subscription| subscription.is_valid_at(now))
    }

    /// What a new subscription costs today for each class.
    ///
    /// # Errors
    ///
    /// Returns a [`FareError`] if pricing arithmetic fails.
    pub fn subscription_prices(&self) -> Result<Vec<(VehicleClass, i64)>, FareError> {
        VehicleClass::ALL
            .into_iter()
            .map(|class| Ok((class, tariffs::subscription_price(class, &self.rates)?)))
            .collect()
    }

    /// Aggregate counters over the subscription registry.
    pub fn subscription_stats(&self) -> SubscriptionStats {
        let now = self.clock.now();
        let total = self.subscriptions.len();

        let mut valid = 0;
        let mut monthly_income = 0;
        for subscription in self.subscriptions.values() {
            if subscription.is_valid_at(now) {
                valid += 1;
                monthly_income += subscription.amount_paid();
            }
        }

        SubscriptionStats {
            total,
            valid,
            lapsed: total - valid,
            monthly_income,
        }
    }

    /// Merges rate changes into the table. Unrecognized class names are
    /// skipped silently; recognized ones take effect immediately, including
    /// for vehicles already parked.
    pub fn change_rates<I, S>(&mut self, changes: I)
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut changed = false;

        for (class, rate) in changes {
            match class.as_ref().parse::<VehicleClass>() {
                Ok(class) => {
                    self.rates.set(class, rate);
                    debug!(%class, rate, "hourly rate changed");
                    changed = true;
                }
                Err(error) => {
                    debug!(class = %error.given, "ignoring rate change for unrecognized class");
                }
            }
        }

        if changed {
            self.persist();
        }
    }

    /// Point-in-time status of a parked vehicle, including the fare it
    /// would owe if it left now.
    ///
    /// # Errors
    ///
    /// Rejects an empty plate or a plate that is not currently parked.
    pub fn vehicle_status(&self, plate: &str) -> Result<VehicleStatus, LedgerError> {
        let plate = Plate::new(plate)?;
        let now = self.clock.now();

        let vehicle = self
            .active
            .get(&plate)
            .ok_or_else(|| LedgerError::VehicleNotFound(plate.clone()))?;

        let elapsed = vehicle.stay(now);
        let due = tariffs::compute_fare(
            elapsed,
            vehicle.class(),
            &self.rates,
            self.subscription_valid(&plate, now),
        )?;

        Ok(VehicleStatus {
            plate,
            class: vehicle.class(),
            owner: vehicle.owner().map(str::to_string),
            slot: vehicle.slot(),
            entered_at: vehicle.entered_at(),
            elapsed,
            due,
        })
    }

    /// Status of every parked vehicle, ordered by slot.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] if fare arithmetic fails for any vehicle.
    pub fn active_statuses(&self) -> Result<Vec<VehicleStatus>, LedgerError> {
        let mut statuses: Vec<VehicleStatus> = self
            .active
            .keys()
            .map(|plate| self.vehicle_status(plate.as_str()))
            .collect::<Result<_, _>>()?;

        statuses.sort_by_key(|status| status.slot);

        Ok(statuses)
    }

    /// The facility name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total slot capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of vehicles currently parked.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of free slots.
    pub fn available_slots(&self) -> u32 {
        self.capacity
            .saturating_sub(u32::try_from(self.active.len()).unwrap_or(u32::MAX))
    }

    /// True when no further entries can be accepted.
    pub fn is_full(&self) -> bool {
        self.active.len() >= self.capacity as usize
    }

    /// Occupied slot numbers, ascending.
    pub fn occupied_slots(&self) -> Vec<u32> {
        let mut slots: Vec<u32> = self.occupied.iter().copied().collect();
        slots.sort_unstable();
        slots
    }

    /// Completed visits, oldest first. Unbounded in memory; only the
    /// persisted tail is capped.
    pub fn history(&self) -> &[Vehicle] {
        &self.history
    }

    /// Sum of all fares collected in the in-memory history.
    pub fn collected_total(&self) -> i64 {
        self.history.iter().map(Vehicle::fee_paid).sum()
    }

    /// The current rate table.
    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    /// The ledger's current clock reading.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Builds the persistable document for the current state.
    pub fn snapshot(&self) -> Snapshot {
        let active = self
            .active
            .iter()
            .map(|(plate, vehicle)| (plate.clone(), ActiveRecord::from(vehicle)))
            .collect();

        let tail_start = self.history.len().saturating_sub(HISTORY_TAIL);
        let history = self
            .history
            .iter()
            .skip(tail_start)
            .map(VisitRecord::from)
            .collect();

        let subscriptions = self
            .subscriptions
            .iter()
            .map(|(plate, subscription)| (plate.clone(), subscription.clone()))
            .collect();

        Snapshot {
            name: self.name.clone(),
            capacity: self.capacity,
            rates: self.rates.clone(),
            active,
            history,
            subscriptions,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.name = snapshot.name;
        self.capacity = snapshot.capacity;
        self.rates = snapshot.rates;

        self.active.clear();
        self.occupied.clear();
        for (plate, record) in snapshot.active {
            let vehicle = record.into_vehicle();
            if let Some(slot) = vehicle.slot() {
                self.occupied.insert(slot);
            }
            self.active.insert(plate, vehicle);
        }

        self.history = snapshot
            .history
            .into_iter()
            .map(VisitRecord::into_vehicle)
            .collect();

        self.subscriptions = snapshot.subscriptions;
    }

    fn subscription_valid(&self, plate: &Plate, now: Timestamp) -> bool {
        self.subscriptions
            .get(plate)
            .is_some_and(|subscription| subscription.is_valid_at(now))
    }

    fn lowest_free_slot(&self) -> Option<u32> {
        (1..=self.capacity).find(|slot| !self.occupied.contains(slot))
    }

    /// Best-effort snapshot write. A failure is logged and the in-memory
    /// operation stands: availability over durability. Callers needing hard
    /// durability can save [`ParkingLedger::snapshot`] through their own
    /// [`SnapshotStore`] and observe the error.
    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };

        if let Err(error) = store.save(&self.snapshot()) {
            warn!(
                path = %store.path().display(),
                %error,
                "snapshot write failed; in-memory state retained"
            );
        }
    }
}

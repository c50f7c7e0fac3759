//! Snapshots
//!
//! Durable persistence for the ledger: a single YAML document holding the
//! full state, rewritten after every mutation. Loading is best-effort — an
//! absent or unreadable store means "start empty", never a failure, so a
//! corrupt file cannot brick the facility.

use std::fs;
use std::path::PathBuf;

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plates::Plate;
use crate::subscriptions::Subscription;
use crate::tariffs::RateTable;
use crate::vehicles::{Vehicle, VehicleClass};

/// Completed visits kept in the persisted history tail.
pub const HISTORY_TAIL: usize = 100;

/// Errors reading or writing the snapshot store.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error touching the store file.
    #[error("failed to access snapshot store: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error.
    #[error("failed to (de)serialize snapshot: {0}")]
    Yaml(#[from] serde_norway::Error),
}

/// A currently parked vehicle as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRecord {
    /// The vehicle's plate.
    pub plate: Plate,
    /// The vehicle's class.
    pub class: VehicleClass,
    /// Owner name, if given at entry.
    pub owner: Option<String>,
    /// Entry timestamp.
    pub entered_at: Timestamp,
    /// Assigned slot.
    pub slot: Option<u32>,
}

impl From<&Vehicle> for ActiveRecord {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            plate: vehicle.plate().clone(),
            class: vehicle.class(),
            owner: vehicle.owner().map(str::to_string),
            entered_at: vehicle.entered_at(),
            slot: vehicle.slot(),
        }
    }
}

impl ActiveRecord {
    pub(crate) fn into_vehicle(self) -> Vehicle {
        Vehicle::restore(
            self.plate,
            self.class,
            self.owner,
            self.entered_at,
            None,
            self.slot,
            0,
        )
    }
}

/// A completed visit as persisted. Owner and slot are not kept for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
    /// The vehicle's plate.
    pub plate: Plate,
    /// The vehicle's class.
    pub class: VehicleClass,
    /// Entry timestamp.
    pub entered_at: Timestamp,
    /// Exit timestamp.
    pub exited_at: Option<Timestamp>,
    /// Fare paid at exit.
    pub fee: i64,
}

impl From<&Vehicle> for VisitRecord {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            plate: vehicle.plate().clone(),
            class: vehicle.class(),
            entered_at: vehicle.entered_at(),
            exited_at: vehicle.exited_at(),
            fee: vehicle.fee_paid(),
        }
    }
}

impl VisitRecord {
    pub(crate) fn into_vehicle(self) -> Vehicle {
        Vehicle::restore(
            self.plate,
            self.class,
            None,
            self.entered_at,
            self.exited_at,
            None,
            self.fee,
        )
    }
}

/// The complete serialized ledger state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Facility name.
    pub name: String,
    /// Total slot capacity.
    pub capacity: u32,
    /// Hourly rates per class.
    pub rates: RateTable,
    /// Currently parked vehicles, keyed by plate.
    pub active: FxHashMap<Plate, ActiveRecord>,
    /// Tail of completed visits, oldest first, capped at [`HISTORY_TAIL`].
    pub history: Vec<VisitRecord>,
    /// Subscription registry, keyed by plate.
    pub subscriptions: FxHashMap<Plate, Subscription>,
}

/// File-backed store for [`Snapshot`] documents.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store's file path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Loads the stored snapshot, or `None` if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the file exists but cannot be read or
    /// parsed. The ledger treats this as "start empty" after logging.
    pub fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let snapshot = serde_norway::from_str(&contents)?;

        Ok(Some(snapshot))
    }

    /// Writes `snapshot`, replacing any previous document.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if serialization or the write fails.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let contents = serde_norway::to_string(snapshot)?;
        fs::write(&self.path, contents)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn sample_snapshot() -> Result<Snapshot, crate::plates::PlateError> {
        let plate = Plate::new("ABC123")?;

        let mut active = FxHashMap::default();
        active.insert(
            plate.clone(),
            ActiveRecord {
                plate,
                class: VehicleClass::Car,
                owner: Some("Ana".to_string()),
                entered_at: Timestamp::UNIX_EPOCH,
                slot: Some(1),
            },
        );

        Ok(Snapshot {
            name: "Central".to_string(),
            capacity: 50,
            rates: RateTable::default(),
            active,
            history: vec![VisitRecord {
                plate: Plate::new("XYZ789")?,
                class: VehicleClass::Motorcycle,
                entered_at: Timestamp::UNIX_EPOCH,
                exited_at: Some(Timestamp::UNIX_EPOCH),
                fee: 1_500,
            }],
            subscriptions: FxHashMap::default(),
        })
    }

    #[test]
    fn load_returns_none_for_missing_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = SnapshotStore::new(dir.path().join("state.yml"));

        assert!(store.load()?.is_none());

        Ok(())
    }

    #[test]
    fn save_then_load_round_trips() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = SnapshotStore::new(dir.path().join("state.yml"));

        store.save(&sample_snapshot()?)?;

        let Some(loaded) = store.load()? else {
            unreachable!("snapshot was just saved");
        };

        assert_eq!(loaded.name, "Central");
        assert_eq!(loaded.capacity, 50);
        assert_eq!(loaded.active.len(), 1);
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(loaded.rates, RateTable::default());

        let record = loaded.active.get(&Plate::new("ABC123")?);
        assert!(
            matches!(record, Some(rec) if rec.slot == Some(1)),
            "active record should survive the round trip"
        );

        Ok(())
    }

    #[test]
    fn load_reports_unparseable_documents() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.yml");

        std::fs::write(&path, ":: this is not yaml {{{{")?;

        let store = SnapshotStore::new(&path);

        assert!(matches!(store.load(), Err(SnapshotError::Yaml(_))));

        Ok(())
    }

    #[test]
    fn save_overwrites_previous_document() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = SnapshotStore::new(dir.path().join("state.yml"));

        let mut snapshot = sample_snapshot()?;
        store.save(&snapshot)?;

        snapshot.name = "Renamed".to_string();
        store.save(&snapshot)?;

        let Some(loaded) = store.load()? else {
            unreachable!("snapshot was just saved");
        };

        assert_eq!(loaded.name, "Renamed");

        Ok(())
    }

    #[test]
    fn timestamps_persist_as_iso_8601() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.yml");
        let store = SnapshotStore::new(&path);

        store.save(&sample_snapshot()?)?;

        let raw = std::fs::read_to_string(&path)?;

        assert!(
            raw.contains("1970-01-01T00:00:00Z"),
            "expected ISO-8601 timestamps, got:\n{raw}"
        );

        Ok(())
    }
}

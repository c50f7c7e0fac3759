//! Valet
//!
//! A parking facility state-and-rules engine: vehicle occupancy, slot
//! allocation, per-started-hour fares, monthly subscriptions with fare
//! discounts, and durable snapshot persistence.
//!
//! [`ledger::ParkingLedger`] is the aggregate root and the whole public
//! contract; front-ends (web, CLI) call its operations and render the
//! results. It assumes one caller at a time — wrap it in a single lock
//! before sharing it.
//!
//! ```
//! use valet::ledger::ParkingLedger;
//!
//! let mut ledger = ParkingLedger::new("Central", 50);
//!
//! let slot = ledger.register_entry("ABC123", "car", "Ana Diaz")?;
//! assert_eq!(slot, 1);
//!
//! let receipt = ledger.register_exit("ABC123")?;
//! assert!(receipt.fare() >= 2_500); // one hour minimum at the car rate
//! # Ok::<(), valet::ledger::LedgerError>(())
//! ```

pub mod clock;
pub mod ledger;
pub mod plates;
pub mod report;
pub mod snapshot;
pub mod subscriptions;
pub mod tariffs;
pub mod vehicles;

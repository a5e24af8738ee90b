//! Core types for decoded telemetry.
//!
//! ## Architecture
//!
//! - [`FieldKind`] and [`FieldValue`] describe one primitive read from the game process
//! - [`EnumTable`] translates raw codes into labels, total over every input
//! - [`FieldId`] names every decoded field and the snapshot slot it lands in
//! - [`Snapshot`] maps entity ids to fully populated [`EntitySnapshot`] records
//!
//! Snapshots are replaced wholesale every cycle. Labels are owned strings so a
//! snapshot decoded from the shared channel has the same shape as one built by
//! the decoder.
//!
//! ## Usage Example
//!
//! ```rust
//! use f1m_telemetry::types::{EntitySnapshot, EnumTable, FieldId, FieldValue, Snapshot};
//!
//! let mut entity = EntitySnapshot::default();
//! entity.assign(FieldId::PitstopStatus, FieldValue::Label(EnumTable::PitStatus.label(6)));
//! entity.assign(FieldId::TurnNumber, FieldValue::Int(12));
//!
//! let mut snapshot = Snapshot::new();
//! snapshot.insert("MyTeam1", entity);
//!
//! let entity = snapshot.get("MyTeam1").unwrap();
//! assert_eq!(entity.driver.pitstop_status, "In Garage");
//! assert_eq!(entity.driver.turn_number, 12);
//! ```

mod enums;
mod field;
mod snapshot;

pub use enums::{EnumTable, UNKNOWN_LABEL};
pub use field::{FieldId, FieldKind, FieldValue, SlotKind, Structure};
pub use snapshot::{
    CarData, DriverData, EntitySnapshot, Resolved, SessionData, Snapshot, WeatherData,
};

//! Typed snapshot tree carried across the shared channel and every queue.

use super::enums::UNKNOWN_LABEL;
use super::field::{FieldId, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn unknown() -> String {
    UNKNOWN_LABEL.to_string()
}

/// Session-level values as seen from one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SessionData {
    pub time_elapsed: f32,
    pub track_name: String,
    pub session_type: String,
    pub best_session_time: f32,
    pub rubber: f32,
    pub water_on_track: f32,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            time_elapsed: 0.0,
            track_name: unknown(),
            session_type: unknown(),
            best_session_time: 0.0,
            rubber: 0.0,
            water_on_track: 0.0,
        }
    }
}

/// Driver identity, race state and timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DriverData {
    pub driver_id: i32,
    pub driver_number: u8,
    pub team_name: String,
    pub position: i32,
    pub pitstop_status: String,
    pub turn_number: i32,
    pub current_lap: i32,
    pub distance_travelled: f32,
    pub gap_to_leader: f32,
    pub current_lap_time: f32,
    pub driver_best_lap: f32,
    pub last_lap_time: f32,
    pub last_s1_time: f32,
    pub last_s2_time: f32,
    pub last_s3_time: f32,
}

impl Default for DriverData {
    fn default() -> Self {
        Self {
            driver_id: 0,
            driver_number: 0,
            team_name: unknown(),
            position: 0,
            pitstop_status: unknown(),
            turn_number: 0,
            current_lap: 0,
            distance_travelled: 0.0,
            gap_to_leader: 0.0,
            current_lap_time: 0.0,
            driver_best_lap: 0.0,
            last_lap_time: 0.0,
            last_s1_time: 0.0,
            last_s2_time: 0.0,
            last_s3_time: 0.0,
        }
    }
}

/// Car telematics, tyres, power unit and mode selections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CarData {
    pub speed: i32,
    pub rpm: i32,
    pub gear: i32,
    pub charge: f32,
    pub fuel: f32,
    pub fuel_delta: f32,
    pub energy_harvested: f32,
    pub energy_spent: f32,
    pub tyre_compound: String,
    pub fl_temp: f32,
    pub fl_deg: f32,
    pub fr_temp: f32,
    pub fr_deg: f32,
    pub rl_temp: f32,
    pub rl_deg: f32,
    pub rr_temp: f32,
    pub rr_deg: f32,
    pub fl_brake_temp: f32,
    pub fr_brake_temp: f32,
    pub rl_brake_temp: f32,
    pub rr_brake_temp: f32,
    pub engine_temp: f32,
    pub engine_deg: f32,
    pub gearbox_deg: f32,
    pub ers_deg: f32,
    pub pace_mode: String,
    pub fuel_mode: String,
    pub ers_mode: String,
    pub drs_mode: String,
}

impl Default for CarData {
    fn default() -> Self {
        Self {
            speed: 0,
            rpm: 0,
            gear: 0,
            charge: 0.0,
            fuel: 0.0,
            fuel_delta: 0.0,
            energy_harvested: 0.0,
            energy_spent: 0.0,
            tyre_compound: unknown(),
            fl_temp: 0.0,
            fl_deg: 0.0,
            fr_temp: 0.0,
            fr_deg: 0.0,
            rl_temp: 0.0,
            rl_deg: 0.0,
            rr_temp: 0.0,
            rr_deg: 0.0,
            fl_brake_temp: 0.0,
            fr_brake_temp: 0.0,
            rl_brake_temp: 0.0,
            rr_brake_temp: 0.0,
            engine_temp: 0.0,
            engine_deg: 0.0,
            gearbox_deg: 0.0,
            ers_deg: 0.0,
            pace_mode: unknown(),
            fuel_mode: unknown(),
            ers_mode: unknown(),
            drs_mode: unknown(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct WeatherData {
    pub air_temp: f32,
    pub track_temp: f32,
    pub weather: String,
}

impl Default for WeatherData {
    fn default() -> Self {
        Self { air_temp: 0.0, track_temp: 0.0, weather: unknown() }
    }
}

/// Which dependent structures resolved during the decode cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default, deny_unknown_fields)]
pub struct Resolved {
    pub driver: bool,
    pub session: bool,
    pub weather: bool,
}

/// Fully populated record for one tracked slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default, deny_unknown_fields)]
pub struct EntitySnapshot {
    pub session: SessionData,
    pub driver: DriverData,
    pub car: CarData,
    pub weather: WeatherData,
    pub resolved: Resolved,
}

impl EntitySnapshot {
    /// Every dependent structure resolved, so no group holds defaults only.
    pub fn is_complete(&self) -> bool {
        self.resolved.driver && self.resolved.session && self.resolved.weather
    }

    /// Store a decoded value into the slot named by `id`.
    ///
    /// Returns false when the value type does not match the slot.
    pub fn assign(&mut self, id: FieldId, value: FieldValue) -> bool {
        use FieldId as F;
        use FieldValue as V;

        let s = &mut self.session;
        let d = &mut self.driver;
        let c = &mut self.car;
        let w = &mut self.weather;

        match (id, value) {
            (F::TimeElapsed, V::Float(v)) => s.time_elapsed = v,
            (F::TrackName, V::Label(v)) => s.track_name = v.to_string(),
            (F::SessionType, V::Label(v)) => s.session_type = v.to_string(),
            (F::BestSessionTime, V::Float(v)) => s.best_session_time = v,
            (F::Rubber, V::Float(v)) => s.rubber = v,
            (F::WaterOnTrack, V::Float(v)) => s.water_on_track = v,

            (F::DriverId, V::Int(v)) => d.driver_id = v,
            (F::DriverNumber, V::Byte(v)) => d.driver_number = v,
            (F::TeamName, V::Label(v)) => d.team_name = v.to_string(),
            (F::Position, V::Int(v)) => d.position = v,
            (F::PitstopStatus, V::Label(v)) => d.pitstop_status = v.to_string(),
            (F::TurnNumber, V::Int(v)) => d.turn_number = v,
            (F::CurrentLap, V::Int(v)) => d.current_lap = v,
            (F::DistanceTravelled, V::Float(v)) => d.distance_travelled = v,
            (F::GapToLeader, V::Float(v)) => d.gap_to_leader = v,
            (F::CurrentLapTime, V::Float(v)) => d.current_lap_time = v,
            (F::DriverBestLap, V::Float(v)) => d.driver_best_lap = v,
            (F::LastLapTime, V::Float(v)) => d.last_lap_time = v,
            (F::LastS1Time, V::Float(v)) => d.last_s1_time = v,
            (F::LastS2Time, V::Float(v)) => d.last_s2_time = v,
            (F::LastS3Time, V::Float(v)) => d.last_s3_time = v,

            (F::Speed, V::Int(v)) => c.speed = v,
            (F::Rpm, V::Int(v)) => c.rpm = v,
            (F::Gear, V::Int(v)) => c.gear = v,
            (F::Charge, V::Float(v)) => c.charge = v,
            (F::Fuel, V::Float(v)) => c.fuel = v,
            (F::FuelDelta, V::Float(v)) => c.fuel_delta = v,
            (F::EnergyHarvested, V::Float(v)) => c.energy_harvested = v,
            (F::EnergySpent, V::Float(v)) => c.energy_spent = v,
            (F::TyreCompound, V::Label(v)) => c.tyre_compound = v.to_string(),
            (F::FlTemp, V::Float(v)) => c.fl_temp = v,
            (F::FlDeg, V::Float(v)) => c.fl_deg = v,
            (F::FrTemp, V::Float(v)) => c.fr_temp = v,
            (F::FrDeg, V::Float(v)) => c.fr_deg = v,
            (F::RlTemp, V::Float(v)) => c.rl_temp = v,
            (F::RlDeg, V::Float(v)) => c.rl_deg = v,
            (F::RrTemp, V::Float(v)) => c.rr_temp = v,
            (F::RrDeg, V::Float(v)) => c.rr_deg = v,
            (F::FlBrakeTemp, V::Float(v)) => c.fl_brake_temp = v,
            (F::FrBrakeTemp, V::Float(v)) => c.fr_brake_temp = v,
            (F::RlBrakeTemp, V::Float(v)) => c.rl_brake_temp = v,
            (F::RrBrakeTemp, V::Float(v)) => c.rr_brake_temp = v,
            (F::EngineTemp, V::Float(v)) => c.engine_temp = v,
            (F::EngineDeg, V::Float(v)) => c.engine_deg = v,
            (F::GearboxDeg, V::Float(v)) => c.gearbox_deg = v,
            (F::ErsDeg, V::Float(v)) => c.ers_deg = v,
            (F::PaceMode, V::Label(v)) => c.pace_mode = v.to_string(),
            (F::FuelMode, V::Label(v)) => c.fuel_mode = v.to_string(),
            (F::ErsMode, V::Label(v)) => c.ers_mode = v.to_string(),
            (F::DrsMode, V::Label(v)) => c.drs_mode = v.to_string(),

            (F::AirTemp, V::Float(v)) => w.air_temp = v,
            (F::TrackTemp, V::Float(v)) => w.track_temp = v,
            (F::Weather, V::Label(v)) => w.weather = v.to_string(),

            _ => return false,
        }
        true
    }
}

/// All entities decoded in one cycle, keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(transparent)]
pub struct Snapshot(pub BTreeMap<String, EntitySnapshot>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: impl Into<String>, snapshot: EntitySnapshot) {
        self.0.insert(entity.into(), snapshot);
    }

    pub fn get(&self, entity: &str) -> Option<&EntitySnapshot> {
        self.0.get(entity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntitySnapshot)> {
        self.0.iter().map(|(id, entity)| (id.as_str(), entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnumTable;
    use crate::types::field::SlotKind;
    use proptest::prelude::*;

    fn sample_value(id: FieldId) -> FieldValue {
        match id.slot() {
            SlotKind::Byte => FieldValue::Byte(44),
            SlotKind::Int => FieldValue::Int(7),
            SlotKind::Float => FieldValue::Float(1.5),
            SlotKind::Label => FieldValue::Label("Soft"),
        }
    }

    #[test]
    fn every_field_has_a_slot() {
        let mut entity = EntitySnapshot::default();
        for id in FieldId::ALL {
            assert!(entity.assign(*id, sample_value(*id)), "{} rejected its slot type", id.name());
        }
        assert_eq!(entity.car.tyre_compound, "Soft");
        assert_eq!(entity.driver.driver_number, 44);
        assert_eq!(entity.weather.air_temp, 1.5);
    }

    #[test]
    fn mismatched_value_is_rejected() {
        let mut entity = EntitySnapshot::default();
        assert!(!entity.assign(FieldId::TurnNumber, FieldValue::Float(3.0)));
        assert!(!entity.assign(FieldId::Weather, FieldValue::Byte(4)));
        assert!(!entity.assign(FieldId::Speed, FieldValue::Pointer(0x1000)));
        assert_eq!(entity, EntitySnapshot::default());
    }

    #[test]
    fn defaults_use_unknown_labels() {
        let entity = EntitySnapshot::default();
        assert_eq!(entity.driver.pitstop_status, UNKNOWN_LABEL);
        assert_eq!(entity.car.drs_mode, UNKNOWN_LABEL);
        assert_eq!(entity.session.track_name, UNKNOWN_LABEL);
        assert!(!entity.is_complete());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let json = r#"{"MyTeam1":{"driver":{"turnNumber":3,"bogus":1}}}"#;
        assert!(serde_json::from_str::<Snapshot>(json).is_err());
    }

    #[test]
    fn missing_keys_take_defaults() {
        let json = r#"{"MyTeam1":{"driver":{"turnNumber":3}}}"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let entity = snapshot.get("MyTeam1").unwrap();
        assert_eq!(entity.driver.turn_number, 3);
        assert_eq!(entity.driver.pitstop_status, UNKNOWN_LABEL);
    }

    #[test]
    fn snapshot_serializes_as_plain_map() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("Ferrari1", EntitySnapshot::default());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("Ferrari1").and_then(|e| e.get("car")).is_some());
    }

    /// One random value per field, typed by the field's slot.
    fn any_entity() -> impl Strategy<Value = EntitySnapshot> {
        let values = proptest::collection::vec(
            (any::<u8>(), any::<i32>(), -1.0e6f32..1.0e6f32, 0usize..EnumTable::ALL.len(), -2i64..40),
            FieldId::ALL.len(),
        );
        (values, any::<[bool; 3]>()).prop_map(|(values, [driver, session, weather])| {
            let mut entity = EntitySnapshot::default();
            for (id, (byte, int, float, table, raw)) in FieldId::ALL.iter().zip(values) {
                let value = match id.slot() {
                    SlotKind::Byte => FieldValue::Byte(byte),
                    SlotKind::Int => FieldValue::Int(int),
                    SlotKind::Float => FieldValue::Float(float),
                    SlotKind::Label => FieldValue::Label(EnumTable::ALL[table].label(raw)),
                };
                assert!(entity.assign(*id, value), "{} rejected its own slot kind", id.name());
            }
            entity.resolved = Resolved { driver, session, weather };
            entity
        })
    }

    proptest! {
        #[test]
        fn decode_of_encode_is_identity(
            entities in proptest::collection::btree_map("[A-Za-z0-9]{1,12}", any_entity(), 0..6)
        ) {
            let mut snapshot = Snapshot::new();
            for (id, entity) in entities {
                snapshot.insert(id, entity);
            }

            let bytes = serde_json::to_vec(&snapshot).unwrap();
            let decoded: Snapshot = serde_json::from_slice(&bytes).unwrap();
            prop_assert_eq!(decoded, snapshot);
        }
    }
}

//! Field identities, primitive kinds and decoded values.

use serde::{Deserialize, Serialize};

/// Primitive memory representation of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Byte,
    Int32,
    Float32,
    /// 8-byte little-endian address.
    Pointer,
}

impl FieldKind {
    /// Returns the size in bytes read for this kind.
    pub const fn size(&self) -> usize {
        match self {
            FieldKind::Byte => 1,
            FieldKind::Int32 | FieldKind::Float32 => 4,
            FieldKind::Pointer => 8,
        }
    }
}

/// A value produced by one field read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Byte(u8),
    Int(i32),
    Float(f32),
    Label(&'static str),
    Pointer(u64),
}

/// Snapshot slot type a field is stored into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Byte,
    Int,
    Float,
    Label,
}

impl FieldValue {
    pub fn slot_kind(&self) -> Option<SlotKind> {
        match self {
            FieldValue::Byte(_) => Some(SlotKind::Byte),
            FieldValue::Int(_) => Some(SlotKind::Int),
            FieldValue::Float(_) => Some(SlotKind::Float),
            FieldValue::Label(_) => Some(SlotKind::Label),
            FieldValue::Pointer(_) => None,
        }
    }
}

/// Memory structure a field offset is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub enum Structure {
    Car,
    Driver,
    Session,
    Weather,
}

macro_rules! field_ids {
    ($($variant:ident => $name:literal : $slot:ident),+ $(,)?) => {
        /// Every decoded field, named by its snapshot key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "tauri", derive(specta::Type))]
        #[serde(rename_all = "camelCase")]
        pub enum FieldId {
            $($variant),+
        }

        impl FieldId {
            pub const ALL: &'static [FieldId] = &[$(FieldId::$variant),+];

            /// camelCase key used in snapshots, CSV headers and UDP payloads.
            pub const fn name(&self) -> &'static str {
                match self {
                    $(FieldId::$variant => $name),+
                }
            }

            /// Slot type the decoded value must have.
            pub const fn slot(&self) -> SlotKind {
                match self {
                    $(FieldId::$variant => SlotKind::$slot),+
                }
            }
        }
    };
}

field_ids! {
    TimeElapsed => "timeElapsed": Float,
    TrackName => "trackName": Label,
    SessionType => "sessionType": Label,
    BestSessionTime => "bestSessionTime": Float,
    Rubber => "rubber": Float,
    WaterOnTrack => "waterOnTrack": Float,

    DriverId => "driverId": Int,
    DriverNumber => "driverNumber": Byte,
    TeamName => "teamName": Label,
    Position => "position": Int,
    PitstopStatus => "pitstopStatus": Label,
    TurnNumber => "turnNumber": Int,
    CurrentLap => "currentLap": Int,
    DistanceTravelled => "distanceTravelled": Float,
    GapToLeader => "gapToLeader": Float,
    CurrentLapTime => "currentLapTime": Float,
    DriverBestLap => "driverBestLap": Float,
    LastLapTime => "lastLapTime": Float,
    LastS1Time => "lastS1Time": Float,
    LastS2Time => "lastS2Time": Float,
    LastS3Time => "lastS3Time": Float,

    Speed => "speed": Int,
    Rpm => "rpm": Int,
    Gear => "gear": Int,
    Charge => "charge": Float,
    Fuel => "fuel": Float,
    FuelDelta => "fuelDelta": Float,
    EnergyHarvested => "energyHarvested": Float,
    EnergySpent => "energySpent": Float,
    TyreCompound => "tyreCompound": Label,
    FlTemp => "flTemp": Float,
    FlDeg => "flDeg": Float,
    FrTemp => "frTemp": Float,
    FrDeg => "frDeg": Float,
    RlTemp => "rlTemp": Float,
    RlDeg => "rlDeg": Float,
    RrTemp => "rrTemp": Float,
    RrDeg => "rrDeg": Float,
    FlBrakeTemp => "flBrakeTemp": Float,
    FrBrakeTemp => "frBrakeTemp": Float,
    RlBrakeTemp => "rlBrakeTemp": Float,
    RrBrakeTemp => "rrBrakeTemp": Float,
    EngineTemp => "engineTemp": Float,
    EngineDeg => "engineDeg": Float,
    GearboxDeg => "gearboxDeg": Float,
    ErsDeg => "ersDeg": Float,
    PaceMode => "paceMode": Label,
    FuelMode => "fuelMode": Label,
    ErsMode => "ersMode": Label,
    DrsMode => "drsMode": Label,

    AirTemp => "airTemp": Float,
    TrackTemp => "trackTemp": Float,
    Weather => "weather": Label,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn field_names_are_unique() {
        let names: HashSet<_> = FieldId::ALL.iter().map(FieldId::name).collect();
        assert_eq!(names.len(), FieldId::ALL.len());
    }

    #[test]
    fn serde_name_matches_key() {
        for id in FieldId::ALL {
            let json = serde_json::to_string(id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.name()));
        }
    }

    #[test]
    fn kind_sizes() {
        assert_eq!(FieldKind::Byte.size(), 1);
        assert_eq!(FieldKind::Int32.size(), 4);
        assert_eq!(FieldKind::Float32.size(), 4);
        assert_eq!(FieldKind::Pointer.size(), 8);
    }
}

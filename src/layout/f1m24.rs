//! Offsets for F1 Manager 2024 (Steam build).

use super::{FieldDef, SubPointers};
use crate::types::{EnumTable, FieldId as F, FieldKind, Structure};

use Structure::{Car, Driver, Session, Weather};

pub const F1M24_MODULE: &str = "F1Manager24.exe";

/// Module base to car array base.
pub const DEFAULT_POINTER_CHAIN: [u64; 6] = [0x798F570, 0x150, 0x3E8, 0x130, 0x0, 0x28];

pub const F1M24_SUB_POINTERS: SubPointers =
    SubPointers { driver: 0x708, session: 0x940, weather: 0xA12990 };

/// Size of one car structure in the car array.
pub const ENTITY_STRIDE: u64 = 0x10D8;

/// Tracked slots in grid order.
pub const F1M24_ENTITIES: [(&str, u64); 22] = [
    ("Ferrari1", 0),
    ("Ferrari2", ENTITY_STRIDE),
    ("McLaren1", 2 * ENTITY_STRIDE),
    ("McLaren2", 3 * ENTITY_STRIDE),
    ("RedBull1", 4 * ENTITY_STRIDE),
    ("RedBull2", 5 * ENTITY_STRIDE),
    ("Mercedes1", 6 * ENTITY_STRIDE),
    ("Mercedes2", 7 * ENTITY_STRIDE),
    ("Alpine1", 8 * ENTITY_STRIDE),
    ("Alpine2", 9 * ENTITY_STRIDE),
    ("Williams1", 10 * ENTITY_STRIDE),
    ("Williams2", 11 * ENTITY_STRIDE),
    ("Haas1", 12 * ENTITY_STRIDE),
    ("Haas2", 13 * ENTITY_STRIDE),
    ("RacingBulls1", 14 * ENTITY_STRIDE),
    ("RacingBulls2", 15 * ENTITY_STRIDE),
    ("KickSauber1", 16 * ENTITY_STRIDE),
    ("KickSauber2", 17 * ENTITY_STRIDE),
    ("AstonMartin1", 18 * ENTITY_STRIDE),
    ("AstonMartin2", 19 * ENTITY_STRIDE),
    ("MyTeam1", 20 * ENTITY_STRIDE),
    ("MyTeam2", 21 * ENTITY_STRIDE),
];

pub const F1M24_FIELDS: &[FieldDef] = &[
    // session
    FieldDef::float(F::TimeElapsed, Session, 0x148),
    FieldDef::coded(F::TrackName, Session, 0x228, FieldKind::Byte, EnumTable::Track),
    FieldDef::coded(F::SessionType, Session, 0x288, FieldKind::Int32, EnumTable::SessionType),
    FieldDef::float(F::BestSessionTime, Session, 0x768),
    FieldDef::float(F::Rubber, Session, 0x278),
    FieldDef::float(F::WaterOnTrack, Session, 0xA132C8),
    // driver
    FieldDef::int(F::DriverId, Driver, 0x590),
    FieldDef::byte(F::DriverNumber, Driver, 0x58C),
    FieldDef::coded(F::TeamName, Driver, 0x579, FieldKind::Byte, EnumTable::Team),
    FieldDef::int(F::Position, Driver, 0x528),
    FieldDef::coded(F::PitstopStatus, Car, 0x8A8, FieldKind::Byte, EnumTable::PitStatus),
    FieldDef::int(F::TurnNumber, Driver, 0x530),
    FieldDef::int(F::CurrentLap, Car, 0x7E4),
    FieldDef::float(F::DistanceTravelled, Driver, 0x87C),
    FieldDef::float(F::GapToLeader, Driver, 0x53C),
    FieldDef::float(F::CurrentLapTime, Driver, 0x544),
    FieldDef::float(F::DriverBestLap, Driver, 0x538),
    FieldDef::float(F::LastLapTime, Driver, 0x540),
    FieldDef::float(F::LastS1Time, Driver, 0x548),
    FieldDef::float(F::LastS2Time, Driver, 0x550),
    FieldDef::float(F::LastS3Time, Driver, 0x558),
    // car
    FieldDef::int(F::Speed, Driver, 0x4F0),
    FieldDef::int(F::Rpm, Driver, 0x4EC),
    FieldDef::int(F::Gear, Driver, 0x524),
    FieldDef::float(F::Charge, Car, 0x878),
    FieldDef::float(F::Fuel, Car, 0x778),
    FieldDef::float(F::FuelDelta, Car, 0x7C8),
    FieldDef::float(F::EnergyHarvested, Car, 0x884),
    FieldDef::float(F::EnergySpent, Car, 0x888),
    FieldDef::coded(F::TyreCompound, Car, 0xEF9, FieldKind::Byte, EnumTable::TyreCompound),
    FieldDef::float(F::FlTemp, Car, 0x980),
    FieldDef::float(F::FlDeg, Car, 0x984),
    FieldDef::float(F::FrTemp, Car, 0x98C),
    FieldDef::float(F::FrDeg, Car, 0x990),
    FieldDef::float(F::RlTemp, Car, 0x998),
    FieldDef::float(F::RlDeg, Car, 0x99C),
    FieldDef::float(F::RrTemp, Car, 0x9A4),
    FieldDef::float(F::RrDeg, Car, 0x9A8),
    FieldDef::float(F::FlBrakeTemp, Driver, 0x5D0),
    FieldDef::float(F::FrBrakeTemp, Driver, 0x5D4),
    FieldDef::float(F::RlBrakeTemp, Driver, 0x5D8),
    FieldDef::float(F::RrBrakeTemp, Driver, 0x5DC),
    FieldDef::float(F::EngineTemp, Car, 0x77C),
    FieldDef::float(F::EngineDeg, Car, 0x784),
    FieldDef::float(F::GearboxDeg, Car, 0x78C),
    FieldDef::float(F::ErsDeg, Car, 0x788),
    FieldDef::coded(F::PaceMode, Car, 0xEF1, FieldKind::Byte, EnumTable::PaceMode),
    FieldDef::coded(F::FuelMode, Car, 0xEF0, FieldKind::Byte, EnumTable::FuelMode),
    FieldDef::coded(F::ErsMode, Car, 0xEF2, FieldKind::Byte, EnumTable::ErsMode),
    FieldDef::coded(F::DrsMode, Driver, 0x521, FieldKind::Byte, EnumTable::Drs),
    // weather
    FieldDef::float(F::AirTemp, Weather, 0xAC),
    FieldDef::float(F::TrackTemp, Weather, 0xB0),
    FieldDef::coded(F::Weather, Weather, 0xBC, FieldKind::Byte, EnumTable::Weather),
];

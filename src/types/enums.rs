//! Raw code to label translation tables.

use serde::{Deserialize, Serialize};

/// Label produced for any raw code a table does not map.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Identifies one translation table.
///
/// Lookups are total: every raw integer maps to a label, falling back to
/// [`UNKNOWN_LABEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub enum EnumTable {
    TyreCompound,
    PitStatus,
    PaceMode,
    FuelMode,
    ErsMode,
    Drs,
    Weather,
    Track,
    SessionType,
    Team,
}

impl EnumTable {
    pub const ALL: [EnumTable; 10] = [
        EnumTable::TyreCompound,
        EnumTable::PitStatus,
        EnumTable::PaceMode,
        EnumTable::FuelMode,
        EnumTable::ErsMode,
        EnumTable::Drs,
        EnumTable::Weather,
        EnumTable::Track,
        EnumTable::SessionType,
        EnumTable::Team,
    ];

    /// Translate a raw code into its label.
    pub fn label(self, raw: i64) -> &'static str {
        let label = match self {
            EnumTable::TyreCompound => tyre_compound(raw),
            EnumTable::PitStatus => pit_status(raw),
            EnumTable::PaceMode => pace_mode(raw),
            EnumTable::FuelMode => fuel_mode(raw),
            EnumTable::ErsMode => ers_mode(raw),
            EnumTable::Drs => drs(raw),
            EnumTable::Weather => weather(raw),
            EnumTable::Track => track(raw),
            EnumTable::SessionType => session_type(raw),
            EnumTable::Team => team(raw),
        };
        label.unwrap_or(UNKNOWN_LABEL)
    }
}

fn tyre_compound(raw: i64) -> Option<&'static str> {
    // The game encodes compound and sub-compound together; only the family is reported.
    match raw {
        0..=7 => Some("Soft"),
        8..=10 => Some("Medium"),
        11..=12 => Some("Hard"),
        13..=17 => Some("Inter"),
        18..=19 => Some("Wet"),
        _ => None,
    }
}

fn pit_status(raw: i64) -> Option<&'static str> {
    Some(match raw {
        0 => "None",
        1 => "Requested",
        2 => "Entering",
        3 => "Queuing",
        4 => "Stopped",
        5 => "Exiting",
        6 => "In Garage",
        7 => "Jack Up",
        8 => "Releasing",
        9 => "Car Setup",
        10 => "Pit Stop Approach",
        11 => "Pit Stop Penalty",
        12 => "Waiting for Release",
        _ => return None,
    })
}

fn pace_mode(raw: i64) -> Option<&'static str> {
    Some(match raw {
        0 => "Attack",
        1 => "Aggressive",
        2 => "Standard",
        3 => "Light",
        4 => "Conserve",
        _ => return None,
    })
}

fn fuel_mode(raw: i64) -> Option<&'static str> {
    Some(match raw {
        0 => "Push",
        1 => "Balanced",
        2 => "Conserve",
        _ => return None,
    })
}

fn ers_mode(raw: i64) -> Option<&'static str> {
    Some(match raw {
        0 => "Neutral",
        1 => "Harvest",
        2 => "Deploy",
        3 => "Top Up",
        _ => return None,
    })
}

fn drs(raw: i64) -> Option<&'static str> {
    Some(match raw {
        0 => "Disabled",
        1 => "Detected",
        2 => "Enabled",
        3 => "Active",
        _ => return None,
    })
}

fn weather(raw: i64) -> Option<&'static str> {
    // Bit flags in memory, but only one bit is ever set.
    Some(match raw {
        0 => "None",
        1 => "Sunny",
        2 => "Partly Sunny",
        4 => "Cloudy",
        8 => "Light Rain",
        16 => "Moderate Rain",
        32 => "Heavy Rain",
        _ => return None,
    })
}

const TRACKS: [&str; 27] = [
    "INVALID",
    "Albert Park",
    "Bahrain",
    "Shanghai",
    "Baku",
    "Barcelona",
    "Monaco",
    "Montreal",
    "PaulRicard",
    "RedBull Ring",
    "Silverstone",
    "Jeddah",
    "Hungaroring",
    "Spa-Francorchamps",
    "Monza",
    "Marina Bay",
    "Sochi",
    "Suzuka",
    "Hermanos Rodriguez",
    "Circuit Of The Americas",
    "Interlagos",
    "Yas Marina",
    "Miami",
    "Zandvoort",
    "Imola",
    "Vegas",
    "Qatar",
];

fn track(raw: i64) -> Option<&'static str> {
    usize::try_from(raw).ok().and_then(|index| TRACKS.get(index).copied())
}

const SESSION_TYPES: [&str; 11] = [
    "Practice 1",
    "Practice 2",
    "Practice 3",
    "Qualifying 1",
    "Qualifying 2",
    "Qualifying 3",
    "Race",
    "Sprint",
    "Sprint Qualifying 1",
    "Sprint Qualifying 2",
    "Sprint Qualifying 3",
];

fn session_type(raw: i64) -> Option<&'static str> {
    usize::try_from(raw).ok().and_then(|index| SESSION_TYPES.get(index).copied())
}

fn team(raw: i64) -> Option<&'static str> {
    Some(match raw {
        1 => "Ferrari",
        2 => "McLaren",
        3 => "Red Bull Racing",
        4 => "Mercedes AMG Petronas F1",
        5 => "Alpine",
        6 => "Williams Racing",
        7 => "Haas F1",
        8 => "Racing Bulls",
        9 => "Kick Sauber",
        10 => "Aston Martin",
        32 => "Custom Team",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn every_raw_code_yields_a_label(raw in any::<i64>()) {
            for table in EnumTable::ALL {
                let label = table.label(raw);
                prop_assert!(!label.is_empty());
            }
        }

        #[test]
        fn negative_codes_are_unknown(raw in i64::MIN..0) {
            for table in EnumTable::ALL {
                prop_assert_eq!(table.label(raw), UNKNOWN_LABEL);
            }
        }
    }

    #[test]
    fn tyre_compounds_collapse_to_families() {
        assert_eq!(EnumTable::TyreCompound.label(0), "Soft");
        assert_eq!(EnumTable::TyreCompound.label(7), "Soft");
        assert_eq!(EnumTable::TyreCompound.label(10), "Medium");
        assert_eq!(EnumTable::TyreCompound.label(12), "Hard");
        assert_eq!(EnumTable::TyreCompound.label(15), "Inter");
        assert_eq!(EnumTable::TyreCompound.label(19), "Wet");
        assert_eq!(EnumTable::TyreCompound.label(20), UNKNOWN_LABEL);
    }

    #[test]
    fn weather_gaps_are_unknown() {
        assert_eq!(EnumTable::Weather.label(4), "Cloudy");
        assert_eq!(EnumTable::Weather.label(3), UNKNOWN_LABEL);
        assert_eq!(EnumTable::Weather.label(64), UNKNOWN_LABEL);
    }

    #[test]
    fn index_tables_cover_their_ranges() {
        assert_eq!(EnumTable::Track.label(0), "INVALID");
        assert_eq!(EnumTable::Track.label(10), "Silverstone");
        assert_eq!(EnumTable::Track.label(26), "Qatar");
        assert_eq!(EnumTable::Track.label(27), UNKNOWN_LABEL);
        assert_eq!(EnumTable::SessionType.label(6), "Race");
        assert_eq!(EnumTable::SessionType.label(11), UNKNOWN_LABEL);
    }

    #[test]
    fn pit_status_garage_label_is_exact() {
        assert_eq!(EnumTable::PitStatus.label(6), "In Garage");
        assert_eq!(EnumTable::Team.label(32), "Custom Team");
        assert_eq!(EnumTable::Team.label(0), UNKNOWN_LABEL);
    }
}

//! Change-gated CSV recorder, one file per tracked entity.

use super::SnapshotSink;
use crate::types::{EntitySnapshot, Snapshot};
use crate::{Result, TelemetryError};
use chrono::Local;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pit status for which no rows are recorded.
pub const GARAGE_STATUS: &str = "In Garage";

pub const CSV_HEADER: [&str; 53] = [
    "timestamp",
    "trackName",
    "sessionType",
    "timeElapsed",
    "driverNumber",
    "teamName",
    "position",
    "pitstopStatus",
    "currentLap",
    "turnNumber",
    "distanceTravelled",
    "gapToLeader",
    "compound",
    "speed",
    "rpm",
    "gear",
    "flTemp",
    "flDeg",
    "frTemp",
    "frDeg",
    "rlTemp",
    "rlDeg",
    "rrTemp",
    "rrDeg",
    "flBrakeTemp",
    "frBrakeTemp",
    "rlBrakeTemp",
    "rrBrakeTemp",
    "engineTemp",
    "engineDeg",
    "gearboxDeg",
    "ersDeg",
    "charge",
    "energyHarvested",
    "energySpent",
    "fuel",
    "fuelDelta",
    "paceMode",
    "fuelMode",
    "ersMode",
    "drsMode",
    "currentLapTime",
    "driverBestLap",
    "lastLapTime",
    "lastS1Time",
    "lastS2Time",
    "lastS3Time",
    "bestSessionTime",
    "rubber",
    "waterOnTrack",
    "airTemp",
    "trackTemp",
    "weather",
];

fn row(timestamp: &str, e: &EntitySnapshot) -> [String; 53] {
    let (s, d, c, w) = (&e.session, &e.driver, &e.car, &e.weather);
    [
        timestamp.to_string(),
        s.track_name.clone(),
        s.session_type.clone(),
        s.time_elapsed.to_string(),
        d.driver_number.to_string(),
        d.team_name.clone(),
        d.position.to_string(),
        d.pitstop_status.clone(),
        d.current_lap.to_string(),
        d.turn_number.to_string(),
        d.distance_travelled.to_string(),
        d.gap_to_leader.to_string(),
        c.tyre_compound.clone(),
        c.speed.to_string(),
        c.rpm.to_string(),
        c.gear.to_string(),
        c.fl_temp.to_string(),
        c.fl_deg.to_string(),
        c.fr_temp.to_string(),
        c.fr_deg.to_string(),
        c.rl_temp.to_string(),
        c.rl_deg.to_string(),
        c.rr_temp.to_string(),
        c.rr_deg.to_string(),
        c.fl_brake_temp.to_string(),
        c.fr_brake_temp.to_string(),
        c.rl_brake_temp.to_string(),
        c.rr_brake_temp.to_string(),
        c.engine_temp.to_string(),
        c.engine_deg.to_string(),
        c.gearbox_deg.to_string(),
        c.ers_deg.to_string(),
        c.charge.to_string(),
        c.energy_harvested.to_string(),
        c.energy_spent.to_string(),
        c.fuel.to_string(),
        c.fuel_delta.to_string(),
        c.pace_mode.clone(),
        c.fuel_mode.clone(),
        c.ers_mode.clone(),
        c.drs_mode.clone(),
        d.current_lap_time.to_string(),
        d.driver_best_lap.to_string(),
        d.last_lap_time.to_string(),
        d.last_s1_time.to_string(),
        d.last_s2_time.to_string(),
        d.last_s3_time.to_string(),
        s.best_session_time.to_string(),
        s.rubber.to_string(),
        s.water_on_track.to_string(),
        w.air_temp.to_string(),
        w.track_temp.to_string(),
        w.weather.clone(),
    ]
}

/// Writes a row per tracked entity only when its turn or lap changed.
///
/// Gating state is the last written `(turn, lap)` per entity; `None` until
/// the first row so that the first observation always writes.
pub struct CsvSink {
    writers: BTreeMap<String, ::csv::Writer<File>>,
    paths: BTreeMap<String, PathBuf>,
    gating: HashMap<String, Option<(i32, i32)>>,
    rows_written: u64,
}

impl CsvSink {
    /// Open `<dir>/<entity>_<YYYYmmdd_HHMMSS>.csv` for every tracked entity
    /// and write the header row. The directory is created when missing.
    pub fn new(dir: impl AsRef<Path>, tracked: &[String]) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| io_error("create output directory", e))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut writers = BTreeMap::new();
        let mut paths = BTreeMap::new();
        let mut gating = HashMap::new();

        for entity in tracked {
            let path = dir.join(format!("{}_{}.csv", entity, stamp));
            let mut writer = ::csv::Writer::from_path(&path).map_err(csv_error)?;
            writer.write_record(CSV_HEADER).map_err(csv_error)?;
            writer.flush().map_err(|e| io_error("flush header", e))?;

            info!(entity = %entity, path = %path.display(), "CSV output opened");
            writers.insert(entity.clone(), writer);
            paths.insert(entity.clone(), path);
            gating.insert(entity.clone(), None);
        }

        Ok(Self { writers, paths, gating, rows_written: 0 })
    }

    /// Whether an observation should become a row.
    ///
    /// False in the garage; true on the first observation; otherwise true
    /// only if turn or lap differ from the last written row.
    pub fn should_write(&self, entity: &str, turn: i32, lap: i32, pit_status: &str) -> bool {
        if pit_status == GARAGE_STATUS {
            return false;
        }
        match self.gating.get(entity) {
            Some(None) => true,
            Some(Some(last)) => *last != (turn, lap),
            None => false,
        }
    }

    /// Last written `(turn, lap)` for an entity.
    pub fn last_written(&self, entity: &str) -> Option<(i32, i32)> {
        self.gating.get(entity).copied().flatten()
    }

    pub fn path(&self, entity: &str) -> Option<&Path> {
        self.paths.get(entity).map(PathBuf::as_path)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn write_row(&mut self, entity: &str, snapshot: &EntitySnapshot) -> Result<()> {
        let writer = self
            .writers
            .get_mut(entity)
            .ok_or_else(|| TelemetryError::sink_error("csv", format!("{} is closed", entity), None))?;

        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        writer.write_record(row(&timestamp, snapshot)).map_err(csv_error)?;
        writer.flush().map_err(|e| io_error("flush row", e))?;

        let turn = snapshot.driver.turn_number;
        let lap = snapshot.driver.current_lap;
        self.gating.insert(entity.to_string(), Some((turn, lap)));
        self.rows_written += 1;
        debug!(entity, turn, lap, "CSV row written");
        Ok(())
    }
}

impl SnapshotSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    /// Write every tracked entity that changed. A failed row does not stop
    /// the others; the first failure is returned once all were tried.
    fn consume(&mut self, snapshot: &Snapshot) -> Result<()> {
        let mut first_error = None;
        let tracked: Vec<String> = self.writers.keys().cloned().collect();
        for entity in tracked {
            let Some(state) = snapshot.get(&entity) else {
                continue;
            };
            if !state.is_complete() {
                debug!(entity = %entity, resolved = ?state.resolved, "Incomplete entity skipped");
                continue;
            }

            let driver = &state.driver;
            if !self.should_write(&entity, driver.turn_number, driver.current_lap, &driver.pitstop_status) {
                continue;
            }
            if let Err(e) = self.write_row(&entity, state) {
                warn!(entity = %entity, error = %e, "CSV row not written");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<()> {
        let mut first_error = None;
        for (entity, mut writer) in std::mem::take(&mut self.writers) {
            if let Err(e) = writer.flush() {
                warn!(entity = %entity, error = %e, "CSV flush on close failed");
                first_error.get_or_insert(io_error("flush on close", e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn csv_error(e: ::csv::Error) -> TelemetryError {
    TelemetryError::sink_error("csv", e.to_string(), Some(Box::new(e)))
}

fn io_error(action: &str, e: std::io::Error) -> TelemetryError {
    TelemetryError::sink_error("csv", action.to_string(), Some(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_entity, sample_snapshot};
    use proptest::prelude::*;

    fn tracked() -> Vec<String> {
        vec!["MyTeam1".to_string(), "MyTeam2".to_string()]
    }

    fn data_rows(path: &Path) -> Vec<::csv::StringRecord> {
        let mut reader = ::csv::Reader::from_path(path).unwrap();
        reader.records().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn header_row_is_written_per_entity() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("telemetry_data"), &tracked()).unwrap();

        for entity in tracked() {
            let path = sink.path(&entity).unwrap();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with(&format!("{}_", entity)));
            assert!(name.ends_with(".csv"));

            let mut reader = ::csv::Reader::from_path(path).unwrap();
            let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
            assert_eq!(header, CSV_HEADER);
        }
    }

    #[test]
    fn garage_then_new_turn_writes_exactly_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), &tracked()).unwrap();

        for _ in 0..3 {
            sink.consume(&sample_snapshot(&["MyTeam1"], 12, 3, GARAGE_STATUS)).unwrap();
        }
        assert_eq!(data_rows(sink.path("MyTeam1").unwrap()).len(), 0);
        assert_eq!(sink.last_written("MyTeam1"), None);

        sink.consume(&sample_snapshot(&["MyTeam1"], 13, 3, "None")).unwrap();

        let rows = data_rows(sink.path("MyTeam1").unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(sink.last_written("MyTeam1"), Some((13, 3)));
        assert_eq!(&rows[0][9], "13");
        assert_eq!(&rows[0][8], "3");
    }

    #[test]
    fn repeated_state_is_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), &tracked()).unwrap();

        for _ in 0..5 {
            sink.consume(&sample_snapshot(&["MyTeam1", "MyTeam2"], 4, 1, "None")).unwrap();
        }
        sink.consume(&sample_snapshot(&["MyTeam1"], 4, 2, "None")).unwrap();

        assert_eq!(data_rows(sink.path("MyTeam1").unwrap()).len(), 2);
        assert_eq!(data_rows(sink.path("MyTeam2").unwrap()).len(), 1);
        assert_eq!(sink.rows_written(), 3);
    }

    #[test]
    fn row_follows_header_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), &tracked()).unwrap();
        sink.consume(&sample_snapshot(&["MyTeam1"], 7, 2, "None")).unwrap();

        let rows = data_rows(sink.path("MyTeam1").unwrap());
        let row = &rows[0];
        assert_eq!(row.len(), CSV_HEADER.len());

        let column = |name: &str| CSV_HEADER.iter().position(|h| *h == name).unwrap();
        assert_eq!(&row[column("trackName")], "Silverstone");
        assert_eq!(&row[column("compound")], "Medium");
        assert_eq!(&row[column("speed")], "287");
        assert_eq!(&row[column("lastLapTime")], "91.25");
        assert_eq!(&row[column("weather")], "Sunny");
    }

    #[test]
    fn incomplete_and_untracked_entities_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), &tracked()).unwrap();

        let mut snapshot = sample_snapshot(&["Ferrari1"], 1, 1, "None");
        let mut partial = sample_entity(1, 1, "None");
        partial.resolved.weather = false;
        snapshot.insert("MyTeam1", partial);

        sink.consume(&snapshot).unwrap();
        assert_eq!(sink.rows_written(), 0);
        assert!(sink.path("Ferrari1").is_none());
    }

    #[test]
    fn failed_row_is_reported_after_other_entities() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), &tracked()).unwrap();

        // A read-only handle makes every flush fail.
        let readonly = File::open(sink.path("MyTeam1").unwrap()).unwrap();
        sink.writers.insert("MyTeam1".to_string(), ::csv::Writer::from_writer(readonly));

        let snapshot = sample_snapshot(&["MyTeam1", "MyTeam2"], 13, 3, "None");
        let err = sink.consume(&snapshot).unwrap_err();

        assert!(matches!(err, TelemetryError::Sink { sink: "csv", .. }));
        assert_eq!(sink.last_written("MyTeam1"), None);
        assert_eq!(sink.last_written("MyTeam2"), Some((13, 3)));
        assert_eq!(sink.rows_written(), 1);
        assert_eq!(data_rows(sink.path("MyTeam2").unwrap()).len(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), &tracked()).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();

        assert!(sink.consume(&sample_snapshot(&["MyTeam1"], 1, 1, "None")).is_ok());
        assert_eq!(sink.rows_written(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn gating_matches_change_rule(
            observations in proptest::collection::vec((0i32..4, 0i32..3, any::<bool>()), 1..40)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let mut sink = CsvSink::new(dir.path(), &tracked()).unwrap();
            let mut last: Option<(i32, i32)> = None;
            let mut expected_rows = 0;

            for (turn, lap, in_garage) in observations {
                let status = if in_garage { GARAGE_STATUS } else { "None" };
                let expect = !in_garage && last != Some((turn, lap));

                prop_assert_eq!(sink.should_write("MyTeam1", turn, lap, status), expect);
                sink.consume(&sample_snapshot(&["MyTeam1"], turn, lap, status)).unwrap();

                if expect {
                    last = Some((turn, lap));
                    expected_rows += 1;
                }
                prop_assert_eq!(sink.last_written("MyTeam1"), last);
            }

            prop_assert_eq!(sink.rows_written(), expected_rows);
            prop_assert_eq!(data_rows(sink.path("MyTeam1").unwrap()).len() as u64, expected_rows);
        }
    }
}

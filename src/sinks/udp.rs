//! Best-effort JSON datagrams for live dashboards.
//!
//! Each consumed snapshot becomes at most one datagram:
//!
//! ```json
//! { "cars": { "MyTeam1": { "position": 3, ... } }, "session": { "trackName": "Monza", ... } }
//! ```
//!
//! Session fields come from the first complete entity. Delivery is never
//! confirmed and send failures are only logged.

use super::SnapshotSink;
use crate::types::{EntitySnapshot, Snapshot};
use crate::{Result, TelemetryError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPayload<'a> {
    pub cars: BTreeMap<&'a str, CarPayload<'a>>,
    pub session: SessionPayload<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload<'a> {
    time_elapsed: f32,
    track_name: &'a str,
    session_type: &'a str,
    best_session_time: f32,
    rubber_state: f32,
    water_on_track: f32,
    air_temp: f32,
    track_temp: f32,
    weather: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarPayload<'a> {
    position: i32,
    driver_number: u8,
    team_name: &'a str,
    pitstop_status: &'a str,
    turn_number: i32,
    current_lap: i32,
    distance_travelled: f32,
    gap_to_leader: f32,
    timings: Timings,
    speed: i32,
    rpm: i32,
    gear: i32,
    charge: f32,
    energy_harvested: f32,
    energy_spent: f32,
    fuel: f32,
    fuel_delta: f32,
    tyre_compound: &'a str,
    tyres: Corners,
    brakes: BrakeTemps,
    modes: Modes<'a>,
    components: Components,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Timings {
    current_lap_time: f32,
    driver_best_lap: f32,
    last_lap_time: f32,
    last_s1_time: f32,
    last_s2_time: f32,
    last_s3_time: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Corners {
    fl_temp: f32,
    fl_deg: f32,
    fr_temp: f32,
    fr_deg: f32,
    rl_temp: f32,
    rl_deg: f32,
    rr_temp: f32,
    rr_deg: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrakeTemps {
    fl: f32,
    fr: f32,
    rl: f32,
    rr: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Modes<'a> {
    pace: &'a str,
    fuel: &'a str,
    ers: &'a str,
    drs: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Components {
    engine_temp: f32,
    engine_deg: f32,
    gearbox_deg: f32,
    ers_deg: f32,
}

impl<'a> SessionPayload<'a> {
    fn from_entity(e: &'a EntitySnapshot) -> Self {
        Self {
            time_elapsed: e.session.time_elapsed,
            track_name: &e.session.track_name,
            session_type: &e.session.session_type,
            best_session_time: e.session.best_session_time,
            rubber_state: e.session.rubber,
            water_on_track: e.session.water_on_track,
            air_temp: e.weather.air_temp,
            track_temp: e.weather.track_temp,
            weather: &e.weather.weather,
        }
    }
}

impl<'a> CarPayload<'a> {
    fn from_entity(e: &'a EntitySnapshot) -> Self {
        let (d, c) = (&e.driver, &e.car);
        Self {
            position: d.position,
            driver_number: d.driver_number,
            team_name: &d.team_name,
            pitstop_status: &d.pitstop_status,
            turn_number: d.turn_number,
            current_lap: d.current_lap,
            distance_travelled: d.distance_travelled,
            gap_to_leader: d.gap_to_leader,
            timings: Timings {
                current_lap_time: d.current_lap_time,
                driver_best_lap: d.driver_best_lap,
                last_lap_time: d.last_lap_time,
                last_s1_time: d.last_s1_time,
                last_s2_time: d.last_s2_time,
                last_s3_time: d.last_s3_time,
            },
            speed: c.speed,
            rpm: c.rpm,
            gear: c.gear,
            charge: c.charge,
            energy_harvested: c.energy_harvested,
            energy_spent: c.energy_spent,
            fuel: c.fuel,
            fuel_delta: c.fuel_delta,
            tyre_compound: &c.tyre_compound,
            tyres: Corners {
                fl_temp: c.fl_temp,
                fl_deg: c.fl_deg,
                fr_temp: c.fr_temp,
                fr_deg: c.fr_deg,
                rl_temp: c.rl_temp,
                rl_deg: c.rl_deg,
                rr_temp: c.rr_temp,
                rr_deg: c.rr_deg,
            },
            brakes: BrakeTemps {
                fl: c.fl_brake_temp,
                fr: c.fr_brake_temp,
                rl: c.rl_brake_temp,
                rr: c.rr_brake_temp,
            },
            modes: Modes { pace: &c.pace_mode, fuel: &c.fuel_mode, ers: &c.ers_mode, drs: &c.drs_mode },
            components: Components {
                engine_temp: c.engine_temp,
                engine_deg: c.engine_deg,
                gearbox_deg: c.gearbox_deg,
                ers_deg: c.ers_deg,
            },
        }
    }
}

/// Build the datagram view of a snapshot.
///
/// Incomplete entities are left out. Returns `None` when no entity remains.
pub fn build_payload(snapshot: &Snapshot) -> Option<TelemetryPayload<'_>> {
    let mut cars = BTreeMap::new();
    let mut session = None;

    for (id, entity) in snapshot.iter() {
        if !entity.is_complete() {
            trace!(entity = id, "Incomplete entity left out of datagram");
            continue;
        }
        session.get_or_insert_with(|| SessionPayload::from_entity(entity));
        cars.insert(id, CarPayload::from_entity(entity));
    }

    session.map(|session| TelemetryPayload { cars, session })
}

/// Sends one compact JSON datagram per snapshot to a fixed target.
pub struct TelemetryBroadcastSink {
    socket: Option<UdpSocket>,
    target: SocketAddr,
    sent: u64,
}

impl TelemetryBroadcastSink {
    pub fn new(target: SocketAddr) -> Result<Self> {
        let bind: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind).map_err(|e| {
            TelemetryError::sink_error("udp", format!("bind {}", bind), Some(Box::new(e)))
        })?;

        info!(target = %target, "UDP telemetry feed ready");
        Ok(Self { socket: Some(socket), target, sent: 0 })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Datagrams handed to the OS so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl SnapshotSink for TelemetryBroadcastSink {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn consume(&mut self, snapshot: &Snapshot) -> Result<()> {
        let Some(socket) = &self.socket else {
            return Ok(());
        };
        let Some(payload) = build_payload(snapshot) else {
            debug!("No complete entity; nothing sent");
            return Ok(());
        };

        let bytes = serde_json::to_vec(&payload)?;
        match socket.send_to(&bytes, self.target) {
            Ok(_) => {
                self.sent += 1;
                trace!(bytes = bytes.len(), cars = payload.cars.len(), "Datagram sent");
            }
            Err(e) => warn!(target = %self.target, error = %e, "Datagram not sent"),
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            info!(sent = self.sent, "UDP telemetry feed closed");
        }
        Ok(())
    }
}

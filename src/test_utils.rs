//! Test helpers shared by unit tests, integration tests and benches.
//!
//! [`FakeMemory`] stands in for a live game process: a sparse byte map with
//! named modules. Reads of bytes never written fail like an unmapped page.

#![cfg(any(test, feature = "benchmark"))]

use crate::layout::FieldLayout;
use crate::memory::MemorySource;
use crate::types::{EntitySnapshot, FieldKind, Resolved, Snapshot, Structure};
use crate::{Result, TelemetryError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Sparse in-memory address space implementing [`MemorySource`].
#[derive(Debug, Default)]
pub struct FakeMemory {
    bytes: Mutex<BTreeMap<u64, u8>>,
    modules: Mutex<HashMap<String, u64>>,
}

impl FakeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&self, name: &str, base: u64) {
        self.modules.lock().unwrap().insert(name.to_string(), base);
    }

    pub fn write(&self, address: u64, data: &[u8]) {
        let mut bytes = self.bytes.lock().unwrap();
        for (i, byte) in data.iter().enumerate() {
            bytes.insert(address + i as u64, *byte);
        }
    }

    pub fn write_u8(&self, address: u64, value: u8) {
        self.write(address, &[value]);
    }

    pub fn write_i32(&self, address: u64, value: i32) {
        self.write(address, &value.to_le_bytes());
    }

    pub fn write_f32(&self, address: u64, value: f32) {
        self.write(address, &value.to_le_bytes());
    }

    pub fn write_u64(&self, address: u64, value: u64) {
        self.write(address, &value.to_le_bytes());
    }

    /// Lay out a complete process image for `layout`: a resolvable pointer
    /// chain and every entity with all dependent structures populated.
    ///
    /// Integer fields hold `entity index + 1`, floats `1.5 * (index + 1)` and
    /// coded fields the raw code 1.
    pub fn populated(layout: &FieldLayout) -> Self {
        const MODULE_BASE: u64 = 0x1_4000_0000;

        let memory = Self::new();
        memory.add_module(&layout.chain.module, MODULE_BASE);

        let mut current = MODULE_BASE;
        for (hop, offset) in layout.chain.offsets.iter().enumerate() {
            let next = 0x10_0000_0000 + hop as u64 * 0x1_0000_0000;
            memory.write_u64(current + offset, next);
            current = next;
        }
        let base = current;

        for (index, slot) in layout.entities.iter().enumerate() {
            let n = index as u64;
            let car = base + slot.offset;
            let driver = 0x40_0000_0000 + n * 0x100_0000;
            let session = 0x50_0000_0000 + n * 0x1000_0000;
            let weather = 0x60_0000_0000 + n * 0x100_0000;

            memory.write_u64(car + layout.pointers.driver, driver);
            memory.write_u64(driver + layout.pointers.session, session);
            memory.write_u64(session + layout.pointers.weather, weather);

            for def in &layout.fields {
                let owner = match def.owner {
                    Structure::Car => car,
                    Structure::Driver => driver,
                    Structure::Session => session,
                    Structure::Weather => weather,
                };
                let address = owner + def.offset;
                match (def.kind, def.table) {
                    (FieldKind::Byte, Some(_)) => memory.write_u8(address, 1),
                    (FieldKind::Int32, Some(_)) => memory.write_i32(address, 1),
                    (FieldKind::Byte, None) => memory.write_u8(address, index as u8 + 1),
                    (FieldKind::Int32, None) => memory.write_i32(address, index as i32 + 1),
                    (FieldKind::Float32, _) => memory.write_f32(address, 1.5 * (index as f32 + 1.0)),
                    (FieldKind::Pointer, _) => memory.write_u64(address, 0),
                }
            }
        }

        memory
    }
}

impl MemorySource for FakeMemory {
    fn read_bytes(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        let bytes = self.bytes.lock().unwrap();
        let len = buf.len();
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = *bytes
                .get(&(address + i as u64))
                .ok_or_else(|| TelemetryError::memory_access_error(address, len))?;
        }
        Ok(())
    }

    fn module_base(&self, module: &str) -> Result<u64> {
        self.modules
            .lock()
            .unwrap()
            .get(module)
            .copied()
            .ok_or_else(|| TelemetryError::connection_failed(format!("module {} not loaded", module)))
    }
}

/// Entity with every structure resolved and the gating inputs set.
pub fn sample_entity(turn: i32, lap: i32, pit_status: &str) -> EntitySnapshot {
    let mut entity = EntitySnapshot::default();
    entity.resolved = Resolved { driver: true, session: true, weather: true };
    entity.session.track_name = "Silverstone".to_string();
    entity.session.session_type = "Race".to_string();
    entity.session.time_elapsed = 1234.5;
    entity.driver.driver_number = 44;
    entity.driver.team_name = "Custom Team".to_string();
    entity.driver.position = 3;
    entity.driver.turn_number = turn;
    entity.driver.current_lap = lap;
    entity.driver.pitstop_status = pit_status.to_string();
    entity.driver.last_lap_time = 91.25;
    entity.car.speed = 287;
    entity.car.rpm = 11250;
    entity.car.gear = 7;
    entity.car.tyre_compound = "Medium".to_string();
    entity.car.fl_temp = 96.5;
    entity.car.pace_mode = "Standard".to_string();
    entity.weather.air_temp = 21.0;
    entity.weather.weather = "Sunny".to_string();
    entity
}

/// Snapshot holding one [`sample_entity`] per id.
pub fn sample_snapshot(ids: &[&str], turn: i32, lap: i32, pit_status: &str) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for id in ids {
        snapshot.insert(*id, sample_entity(turn, lap, pit_status));
    }
    snapshot
}

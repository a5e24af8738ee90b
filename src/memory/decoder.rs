//! Pointer chain resolution and per-entity field decoding.

use super::MemorySource;
use crate::layout::{FieldLayout, SubPointers};
use crate::types::{EntitySnapshot, EnumTable, FieldKind, FieldValue, Resolved, Snapshot, Structure};
use crate::{Result, TelemetryError};
use tracing::{debug, info, trace};

/// Addresses below this are never mapped in a 64-bit Windows process.
pub const MIN_VALID_ADDRESS: u64 = 0x10000;

/// Decodes entity snapshots out of a foreign process using a [`FieldLayout`].
///
/// Field reads never fail past this type: a failed or out-of-range read is
/// replaced by the field's configured default.
pub struct MemoryLayoutDecoder<M> {
    source: M,
    layout: FieldLayout,
    base: Option<u64>,
}

impl<M: MemorySource> MemoryLayoutDecoder<M> {
    /// Create a decoder after validating the layout.
    pub fn new(source: M, layout: FieldLayout) -> Result<Self> {
        layout.validate()?;
        Ok(Self { source, layout, base: None })
    }

    /// Walk the pointer chain from the module base to the car array.
    ///
    /// Each hop adds the next offset to the current address and reads the
    /// pointer stored there. A null or unmapped result at any hop fails the
    /// whole chain.
    pub fn initialize(&mut self) -> Result<u64> {
        let chain = &self.layout.chain;
        let mut address = self.source.module_base(&chain.module)?;
        debug!(module = %chain.module, base = format_args!("{:#x}", address), "Module located");

        for (hop, offset) in chain.offsets.iter().enumerate() {
            let slot = address
                .checked_add(*offset)
                .ok_or(TelemetryError::PointerChain { hop, address })?;

            let mut buf = [0u8; 8];
            self.source.read_bytes(slot, &mut buf)?;
            let next = u64::from_le_bytes(buf);

            if next < MIN_VALID_ADDRESS {
                self.base = None;
                return Err(TelemetryError::PointerChain { hop, address: slot });
            }
            trace!(hop, from = format_args!("{:#x}", slot), to = format_args!("{:#x}", next), "Pointer hop");
            address = next;
        }

        info!(
            base = format_args!("{:#x}", address),
            entities = self.layout.entities.len(),
            "Pointer chain resolved"
        );
        self.base = Some(address);
        Ok(address)
    }

    /// Car array base, once [`initialize`](Self::initialize) succeeded.
    pub fn base(&self) -> Option<u64> {
        self.base
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn source(&self) -> &M {
        &self.source
    }

    /// Read an 8-byte pointer; null and unmapped values resolve to `None`.
    pub fn read_pointer(&self, address: u64) -> Option<u64> {
        let value = u64::from_le_bytes(self.read_array::<8>(address)?);
        (value >= MIN_VALID_ADDRESS).then_some(value)
    }

    /// Read one primitive at `address`, translating it through `table` when given.
    ///
    /// Returns `None` for invalid addresses, failed reads and non-finite floats.
    pub fn read_field(
        &self,
        address: u64,
        kind: FieldKind,
        table: Option<EnumTable>,
    ) -> Option<FieldValue> {
        let value = match kind {
            FieldKind::Byte => {
                let [byte] = self.read_array::<1>(address)?;
                match table {
                    Some(table) => FieldValue::Label(table.label(i64::from(byte))),
                    None => FieldValue::Byte(byte),
                }
            }
            FieldKind::Int32 => {
                let raw = i32::from_le_bytes(self.read_array::<4>(address)?);
                match table {
                    Some(table) => FieldValue::Label(table.label(i64::from(raw))),
                    None => FieldValue::Int(raw),
                }
            }
            FieldKind::Float32 => {
                let raw = f32::from_le_bytes(self.read_array::<4>(address)?);
                if !raw.is_finite() {
                    trace!(address = format_args!("{:#x}", address), "Non-finite float discarded");
                    return None;
                }
                FieldValue::Float(raw)
            }
            FieldKind::Pointer => FieldValue::Pointer(u64::from_le_bytes(self.read_array::<8>(address)?)),
        };
        Some(value)
    }

    /// Decode one tracked entity.
    ///
    /// Dependent structures resolve in order: car, driver, session, weather.
    /// Fields owned by a structure that did not resolve take their default.
    /// Returns `None` only when the entity base itself cannot be computed.
    pub fn collect_entity(&self, entity_id: &str) -> Option<EntitySnapshot> {
        let base = self.base?;
        let slot = self.layout.entity(entity_id)?;
        let car = base.checked_add(slot.offset)?;

        let SubPointers { driver: to_driver, session: to_session, weather: to_weather } =
            self.layout.pointers;
        let driver = self.follow(car, to_driver);
        let session = driver.and_then(|driver| self.follow(driver, to_session));
        let weather = session.and_then(|session| self.follow(session, to_weather));

        let mut entity = EntitySnapshot {
            resolved: Resolved {
                driver: driver.is_some(),
                session: session.is_some(),
                weather: weather.is_some(),
            },
            ..EntitySnapshot::default()
        };

        for def in &self.layout.fields {
            let owner_base = match def.owner {
                Structure::Car => Some(car),
                Structure::Driver => driver,
                Structure::Session => session,
                Structure::Weather => weather,
            };
            let value = owner_base
                .and_then(|base| base.checked_add(def.offset))
                .and_then(|address| self.read_field(address, def.kind, def.table))
                .unwrap_or(def.default);

            if !entity.assign(def.id, value) {
                debug!(entity = entity_id, field = def.id.name(), ?value, "Value does not fit slot");
            }
        }

        if !entity.is_complete() {
            trace!(entity = entity_id, resolved = ?entity.resolved, "Entity partially resolved");
        }
        Some(entity)
    }

    /// Decode every configured entity independently.
    pub fn decode_all(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for slot in &self.layout.entities {
            match self.collect_entity(&slot.id) {
                Some(entity) => snapshot.insert(slot.id.clone(), entity),
                None => debug!(entity = %slot.id, "Entity base unavailable"),
            }
        }
        snapshot
    }

    fn follow(&self, from: u64, offset: u64) -> Option<u64> {
        self.read_pointer(from.checked_add(offset)?)
    }

    fn read_array<const N: usize>(&self, address: u64) -> Option<[u8; N]> {
        if address < MIN_VALID_ADDRESS {
            return None;
        }
        let mut buf = [0u8; N];
        match self.source.read_bytes(address, &mut buf) {
            Ok(()) => Some(buf),
            Err(e) => {
                trace!(address = format_args!("{:#x}", address), error = %e, "Read failed");
                None
            }
        }
    }
}

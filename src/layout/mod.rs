//! Static description of where every field lives in the game process.
//!
//! A [`FieldLayout`] is loaded once at startup and shared read-only by the
//! decoder. It holds the pointer chain to the car array, the per-entity slot
//! offsets, the sub-pointer offsets that lead from a car to its driver,
//! session and weather structures, and the field table itself.

mod f1m24;

use crate::types::{EnumTable, FieldId, FieldKind, FieldValue, SlotKind, Structure, UNKNOWN_LABEL};
use crate::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use f1m24::{
    DEFAULT_POINTER_CHAIN, ENTITY_STRIDE, F1M24_ENTITIES, F1M24_FIELDS, F1M24_MODULE,
    F1M24_SUB_POINTERS,
};

/// One field: which structure it hangs off, where, and how to read it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDef {
    pub id: FieldId,
    pub owner: Structure,
    pub offset: u64,
    pub kind: FieldKind,
    pub table: Option<EnumTable>,
    /// Stored when the owner never resolved or the read failed.
    pub default: FieldValue,
}

impl FieldDef {
    pub const fn float(id: FieldId, owner: Structure, offset: u64) -> Self {
        Self { id, owner, offset, kind: FieldKind::Float32, table: None, default: FieldValue::Float(0.0) }
    }

    pub const fn int(id: FieldId, owner: Structure, offset: u64) -> Self {
        Self { id, owner, offset, kind: FieldKind::Int32, table: None, default: FieldValue::Int(0) }
    }

    pub const fn byte(id: FieldId, owner: Structure, offset: u64) -> Self {
        Self { id, owner, offset, kind: FieldKind::Byte, table: None, default: FieldValue::Byte(0) }
    }

    /// Byte or int32 code translated through `table`.
    pub const fn coded(
        id: FieldId,
        owner: Structure,
        offset: u64,
        kind: FieldKind,
        table: EnumTable,
    ) -> Self {
        Self {
            id,
            owner,
            offset,
            kind,
            table: Some(table),
            default: FieldValue::Label(UNKNOWN_LABEL),
        }
    }

    /// Slot type this definition produces, or `None` for an unusable combination.
    pub fn produces(&self) -> Option<SlotKind> {
        match (self.kind, self.table) {
            (FieldKind::Byte | FieldKind::Int32, Some(_)) => Some(SlotKind::Label),
            (FieldKind::Byte, None) => Some(SlotKind::Byte),
            (FieldKind::Int32, None) => Some(SlotKind::Int),
            (FieldKind::Float32, None) => Some(SlotKind::Float),
            (FieldKind::Float32, Some(_)) | (FieldKind::Pointer, _) => None,
        }
    }
}

/// Module-relative pointer path to the first car structure.
///
/// Starting at the module base, each offset is added and the 8-byte pointer
/// at the result is read. The final value read is the car array base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerChain {
    pub module: String,
    pub offsets: Vec<u64>,
}

impl Default for PointerChain {
    fn default() -> Self {
        Self { module: F1M24_MODULE.to_string(), offsets: DEFAULT_POINTER_CHAIN.to_vec() }
    }
}

/// Offsets of the pointers leading from one structure to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubPointers {
    /// Car base to driver structure.
    pub driver: u64,
    /// Driver structure to session structure.
    pub session: u64,
    /// Session structure to weather structure.
    pub weather: u64,
}

/// A tracked slot in the car array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySlot {
    pub id: String,
    pub offset: u64,
}

/// Complete static layout consumed by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub chain: PointerChain,
    pub pointers: SubPointers,
    pub entities: Vec<EntitySlot>,
    pub fields: Vec<FieldDef>,
}

impl FieldLayout {
    /// Built-in layout for the Steam build of F1 Manager 2024.
    pub fn f1_manager_2024() -> Self {
        Self {
            chain: PointerChain::default(),
            pointers: F1M24_SUB_POINTERS,
            entities: F1M24_ENTITIES
                .iter()
                .map(|(id, offset)| EntitySlot { id: (*id).to_string(), offset: *offset })
                .collect(),
            fields: F1M24_FIELDS.to_vec(),
        }
    }

    /// Replace the pointer chain, keeping everything else.
    pub fn with_chain(mut self, chain: PointerChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn entity(&self, id: &str) -> Option<&EntitySlot> {
        self.entities.iter().find(|slot| slot.id == id)
    }

    pub fn fields_of(&self, owner: Structure) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(move |def| def.owner == owner)
    }

    /// Validate the layout for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.chain.module.is_empty() {
            return Err(layout_error("pointer chain has no module name"));
        }
        if self.chain.offsets.is_empty() {
            return Err(layout_error("pointer chain has no offsets"));
        }
        if self.entities.is_empty() {
            return Err(layout_error("no entities to track"));
        }

        let mut entity_ids = HashSet::new();
        for slot in &self.entities {
            if !entity_ids.insert(slot.id.as_str()) {
                return Err(layout_error(format!("entity '{}' listed twice", slot.id)));
            }
        }

        let mut field_ids = HashSet::new();
        for def in &self.fields {
            let name = def.id.name();
            if !field_ids.insert(def.id) {
                return Err(layout_error(format!("field '{}' listed twice", name)));
            }

            let produced = def.produces().ok_or_else(|| {
                layout_error(format!(
                    "field '{}' combines {:?} with table {:?}",
                    name, def.kind, def.table
                ))
            })?;
            if produced != def.id.slot() {
                return Err(layout_error(format!(
                    "field '{}' decodes to {:?} but its slot holds {:?}",
                    name,
                    produced,
                    def.id.slot()
                )));
            }
            if def.default.slot_kind() != Some(def.id.slot()) {
                return Err(layout_error(format!(
                    "field '{}' default {:?} does not fit its slot",
                    name, def.default
                )));
            }
        }

        Ok(())
    }
}

fn layout_error(reason: impl Into<String>) -> TelemetryError {
    TelemetryError::Layout { reason: reason.into() }
}

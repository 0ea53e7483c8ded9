//! Value tables with changed-only merge semantics
//!
//! Both the variable table (blendable rig-interface parameters) and the
//! context data table (non-blendable contextual data) are id-keyed stores
//! where every row tracks whether it has been written at all, and whether
//! it changed since the last time changed-bits were cleared. Per-frame
//! refresh copies only changed rows; wholesale copies are reserved for
//! admission seeding and hard cuts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{Value, ValueType};

/// Identifier for a table row, hashed from the authored name
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct VariableId(pub u64);

impl VariableId {
    /// Create an ID from a name using FNV-1a
    pub fn from_name(name: &str) -> Self {
        let mut hash = 0xcbf29ce484222325u64;
        for byte in name.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        Self(hash)
    }

    /// Create from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

/// One authored row of a table schema
#[derive(Clone, Debug)]
pub struct SchemaRow {
    /// Row ID
    pub id: VariableId,
    /// Authored name
    pub name: String,
    /// Default value, applied to rows the context left unset
    pub default: Value,
}

/// Ordered schema for a value table, attached to a rig definition by the
/// authoring builder.
#[derive(Clone, Debug, Default)]
pub struct TableSchema {
    rows: Vec<SchemaRow>,
}

impl TableSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row, returning its ID
    pub fn add(&mut self, name: &str, default: Value) -> VariableId {
        let id = VariableId::from_name(name);
        if !self.rows.iter().any(|row| row.id == id) {
            self.rows.push(SchemaRow {
                id,
                name: name.to_string(),
                default,
            });
        }
        id
    }

    /// Builder-style row addition
    pub fn with(mut self, name: &str, default: Value) -> Self {
        self.add(name, default);
        self
    }

    /// Append rows from another schema, skipping ids already present.
    /// Used when a rig definition embeds sub-rigs.
    pub fn combine(&mut self, other: &TableSchema) {
        for row in &other.rows {
            if !self.rows.iter().any(|existing| existing.id == row.id) {
                self.rows.push(row.clone());
            }
        }
    }

    /// Get the rows in authored order
    pub fn rows(&self) -> &[SchemaRow] {
        &self.rows
    }

    /// Find a row by id
    pub fn find(&self, id: VariableId) -> Option<&SchemaRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Get the row count
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Slot {
    value: Value,
    written: bool,
    changed: bool,
}

/// Id-keyed value storage with written/changed tracking per row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueTable {
    slots: BTreeMap<VariableId, Slot>,
}

/// Blendable rig-interface parameters
pub type VariableTable = ValueTable;
/// Non-blendable contextual data
pub type ContextDataTable = ValueTable;
/// Row id in a context data table; same hash space as variables
pub type DataId = VariableId;

impl ValueTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with one unwritten row per schema row
    pub fn from_schema(schema: &TableSchema) -> Self {
        let mut table = Self::new();
        for row in schema.rows() {
            table.slots.insert(row.id, Slot::default());
        }
        table
    }

    /// Write a value, marking the row written and changed
    pub fn set(&mut self, id: VariableId, value: Value) {
        let slot = self.slots.entry(id).or_default();
        slot.value = value;
        slot.written = true;
        slot.changed = true;
    }

    /// Get a value if its row has been written
    pub fn get(&self, id: VariableId) -> Option<&Value> {
        self.slots
            .get(&id)
            .filter(|slot| slot.written)
            .map(|slot| &slot.value)
    }

    /// Check if a row has been written
    pub fn is_written(&self, id: VariableId) -> bool {
        self.slots.get(&id).is_some_and(|slot| slot.written)
    }

    /// Check if a row changed since the last [`clear_changed`](Self::clear_changed)
    pub fn is_changed(&self, id: VariableId) -> bool {
        self.slots.get(&id).is_some_and(|slot| slot.changed)
    }

    /// Copy every written row from `other`, including its changed bits.
    /// This is the wholesale seed used at admission and on hard cuts.
    pub fn override_all(&mut self, other: &ValueTable) {
        for (id, src) in &other.slots {
            if src.written {
                self.slots.insert(*id, src.clone());
            }
        }
    }

    /// Copy only the rows `other` has flagged as changed. Rows not
    /// flagged are left untouched.
    pub fn override_changed(&mut self, other: &ValueTable) {
        for (id, src) in &other.slots {
            if src.written && src.changed {
                self.slots.insert(*id, src.clone());
            }
        }
    }

    /// Write schema defaults into rows not yet written, so entries
    /// blending in from nothing have defined values to blend from.
    pub fn apply_defaults(&mut self, schema: &TableSchema) {
        for row in schema.rows() {
            let slot = self.slots.entry(row.id).or_default();
            if !slot.written {
                slot.value = row.default.clone();
                slot.written = true;
            }
        }
    }

    /// Clear every row back to unwritten. Values are dropped; the row set
    /// is kept so the table's shape survives.
    pub fn unset_all(&mut self) {
        for slot in self.slots.values_mut() {
            slot.value = Value::None;
            slot.written = false;
            slot.changed = false;
        }
    }

    /// Clear all changed bits
    pub fn clear_changed(&mut self) {
        for slot in self.slots.values_mut() {
            slot.changed = false;
        }
    }

    /// Blend the written rows of `top` onto this table with the given
    /// weight. Interpolable values lerp; discrete values switch once the
    /// weight reaches 0.5.
    pub fn blend_apply(&mut self, top: &ValueTable, alpha: f32) {
        for (id, src) in &top.slots {
            if !src.written {
                continue;
            }
            let slot = self.slots.entry(*id).or_default();
            slot.value = if slot.written {
                Value::lerp(&slot.value, &src.value, alpha)
            } else {
                src.value.clone()
            };
            slot.written = true;
        }
    }

    /// Iterate written rows
    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Value)> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.written)
            .map(|(id, slot)| (*id, &slot.value))
    }

    /// Get the number of written rows
    pub fn len(&self) -> usize {
        self.slots.values().filter(|slot| slot.written).count()
    }

    /// Check if no row has been written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a typed float value, falling back to the schema default type
    pub fn get_float(&self, id: VariableId) -> Option<f32> {
        self.get(id).and_then(Value::as_float)
    }
}

/// Convenience for schemas built from `(name, type)` pairs
pub fn schema_of(rows: &[(&str, ValueType)]) -> TableSchema {
    let mut schema = TableSchema::new();
    for (name, value_type) in rows {
        schema.add(name, value_type.default_value());
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> VariableId {
        VariableId::from_name(name)
    }

    #[test]
    fn test_set_and_get() {
        let mut table = ValueTable::new();
        table.set(id("zoom"), Value::Float(2.0));

        assert_eq!(table.get(id("zoom")), Some(&Value::Float(2.0)));
        assert!(table.is_changed(id("zoom")));
        assert_eq!(table.get(id("missing")), None);
    }

    #[test]
    fn test_override_changed_ignores_unchanged_rows() {
        let mut source = ValueTable::new();
        source.set(id("a"), Value::Float(1.0));
        source.set(id("b"), Value::Float(2.0));
        source.clear_changed();
        source.set(id("b"), Value::Float(3.0));

        let mut dest = ValueTable::new();
        dest.set(id("a"), Value::Float(100.0));
        dest.override_changed(&source);

        // Only the changed row was merged; "a" kept its local value.
        assert_eq!(dest.get(id("a")), Some(&Value::Float(100.0)));
        assert_eq!(dest.get(id("b")), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_apply_defaults_only_fills_unwritten() {
        let schema = TableSchema::new()
            .with("fov", Value::Float(60.0))
            .with("near", Value::Float(0.1));

        let mut table = ValueTable::from_schema(&schema);
        table.set(id("fov"), Value::Float(90.0));
        table.apply_defaults(&schema);

        assert_eq!(table.get(id("fov")), Some(&Value::Float(90.0)));
        assert_eq!(table.get(id("near")), Some(&Value::Float(0.1)));
        // Defaults do not count as changes.
        assert!(!table.is_changed(id("near")));
    }

    #[test]
    fn test_unset_all_keeps_shape() {
        let mut table = ValueTable::new();
        table.set(id("a"), Value::Int(1));
        table.unset_all();

        assert!(table.is_empty());
        assert!(!table.is_written(id("a")));
        assert!(table.slots.contains_key(&id("a")));
    }

    #[test]
    fn test_blend_apply() {
        let mut running = ValueTable::new();
        running.set(id("weight"), Value::Float(0.0));

        let mut top = ValueTable::new();
        top.set(id("weight"), Value::Float(10.0));

        running.blend_apply(&top, 0.25);
        assert_eq!(running.get(id("weight")), Some(&Value::Float(2.5)));
    }

    #[test]
    fn test_schema_combine_skips_duplicates() {
        let a = TableSchema::new().with("x", Value::Float(0.0));
        let mut b = TableSchema::new()
            .with("x", Value::Float(1.0))
            .with("y", Value::Float(2.0));
        b.combine(&a);

        assert_eq!(b.len(), 2);
        assert_eq!(b.find(id("x")).unwrap().default, Value::Float(1.0));
    }
}

//! Units (records) and the inputs used to write them.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::values::Values;

/// One instance of a unit type, with a dense business value map.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub id: String,
    pub unit_type_id: String,
    pub values: Values,
    pub metadata: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    /// Value of an item, `None` when the item is undeclared or null.
    pub fn value(&self, item: &str) -> Option<&Value> {
        self.values.get(item).filter(|value| !value.is_null())
    }
}

/// Input for [`UnitStore::create_unit`](crate::store::UnitStore::create_unit).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUnit {
    /// Business id. Generated when absent.
    pub id: Option<String>,
    pub unit_type_id: String,
    pub values: Values,
    pub metadata: Option<Map<String, Value>>,
}

impl NewUnit {
    pub fn new(unit_type_id: impl Into<String>) -> Self {
        Self {
            unit_type_id: unit_type_id.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn value(mut self, item: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(item.into(), value.into());
        self
    }

    pub fn values(mut self, values: Values) -> Self {
        self.values.extend(values);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A partial update of a unit.
///
/// Items that are not mentioned keep their stored value. [`set`](Self::set) replaces a
/// value and [`clear`](Self::clear) removes it; setting a value to null is the same as
/// clearing it. Metadata is merged key by key onto the existing metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitPatch {
    pub values: Values,
    pub metadata: Option<Map<String, Value>>,
}

impl UnitPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, item: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(item.into(), value.into());
        self
    }

    pub fn clear(mut self, item: impl Into<String>) -> Self {
        self.values.insert(item.into(), Value::Null);
        self
    }

    pub fn values(mut self, values: Values) -> Self {
        self.values.extend(values);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.metadata.is_none()
    }
}

//! Binding application types to units.
//!
//! Implement [`UnitBinding`] for a struct to save it with
//! [`UnitStore::save_bound`](crate::store::UnitStore::save_bound) and read it back with
//! [`UnitStore::load_bound`](crate::store::UnitStore::load_bound). Structs that derive
//! serde traits with field names matching item ids can use [`values_from_serde`] and
//! [`from_values_serde`].
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Project {
//!     #[serde(skip)]
//!     id: Option<String>,
//!     name: String,
//!     budget: Option<f64>,
//! }
//!
//! impl UnitBinding for Project {
//!     fn unit_type_id() -> &'static str {
//!         "project"
//!     }
//!
//!     fn unit_id(&self) -> Option<&str> {
//!         self.id.as_deref()
//!     }
//!
//!     fn to_values(&self) -> UnitStoreResult<Values> {
//!         values_from_serde(self)
//!     }
//!
//!     fn from_unit(unit: &Unit) -> UnitStoreResult<Self> {
//!         let mut project: Project = from_values_serde(&unit.values)?;
//!         project.id = Some(unit.id.clone());
//!         Ok(project)
//!     }
//! }
//! ```

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    error::{UnitStoreError, UnitStoreResult},
    unit::Unit,
    values::Values,
};

/// A Rust type stored as units of one unit type.
pub trait UnitBinding: Sized {
    /// Business id of the unit type this type maps to.
    fn unit_type_id() -> &'static str;

    /// Business id of the unit, `None` for a value that has not been saved yet.
    fn unit_id(&self) -> Option<&str>;

    /// Business values to write. Absent keys keep their stored value on update.
    fn to_values(&self) -> UnitStoreResult<Values>;

    fn from_unit(unit: &Unit) -> UnitStoreResult<Self>;
}

/// Serializes `value` into a business value map.
///
/// # Errors
///
/// [`UnitStoreError::Validation`] if `value` does not serialize to a JSON object.
pub fn values_from_serde<T: Serialize>(value: &T) -> UnitStoreResult<Values> {
    match serde_json::to_value(value)? {
        Value::Object(values) => Ok(values),
        other => Err(UnitStoreError::Validation(format!(
            "Bound values must serialize to an object, got {other}"
        ))),
    }
}

/// Deserializes a business value map. Null values deserialize like absent ones.
pub fn from_values_serde<T: DeserializeOwned>(values: &Values) -> UnitStoreResult<T> {
    let present: Values = values
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    serde_json::from_value(Value::Object(present))
        .map_err(|err| UnitStoreError::Validation(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Task {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimate: Option<f64>,
    }

    #[test]
    fn structs_map_to_values() {
        let values = values_from_serde(&Task { title: "Write docs".into(), estimate: None }).unwrap();

        assert_eq!(Value::Object(values), json!({ "title": "Write docs" }));
    }

    #[test]
    fn nulls_read_as_absent() {
        let values = json!({ "title": "Write docs", "estimate": null })
            .as_object()
            .cloned()
            .unwrap();

        let task: Task = from_values_serde(&values).unwrap();
        assert_eq!(task, Task { title: "Write docs".into(), estimate: None });
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(matches!(
            values_from_serde(&vec![1, 2]),
            Err(UnitStoreError::Validation(_))
        ));
    }
}

//! Record-level (un)marshalling of value maps.
//!
//! [`RecordCodec`] walks a [`UnitType`] and runs every value through the codec of its
//! item's kind:
//!
//! - [`encode_values`](RecordCodec::encode_values) turns a sparse business map into a
//!   stored map, optionally reconciling it against a stored baseline. A value that encodes
//!   to nothing (null) removes the key; a key absent from the sparse map is left untouched.
//! - [`decode_values`](RecordCodec::decode_values) turns a stored map into a dense business
//!   map with one entry per declared item, null where nothing is stored.
//!
//! Both directions are keyed by business item identifiers. Translating to the technical
//! identifiers used in storage documents is the job of [`crate::document`].

use bson::Document;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{
    error::{UnitStoreError, UnitStoreResult},
    registry::KindRegistry,
    schema::UnitType,
};

/// Business values: item identifier to JSON value (or null).
pub type Values = Map<String, Value>;

/// Stored values: item identifier to encoded BSON value. Never contains nulls.
pub type StoredValues = Document;

#[derive(Debug, Clone)]
pub struct RecordCodec {
    registry: Arc<KindRegistry>,
}

impl RecordCodec {
    pub fn new(registry: Arc<KindRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<KindRegistry> {
        &self.registry
    }

    /// Encodes `sparse` on top of a copy of `baseline`.
    ///
    /// The result is only produced once every key has been encoded, so an error means
    /// nothing was built.
    ///
    /// # Errors
    ///
    /// - [`UnitStoreError::UnknownDataItem`] for a key the unit type does not declare
    /// - [`UnitStoreError::UnknownKind`] for an item whose kind is not registered
    /// - [`UnitStoreError::InvalidValue`] when a codec rejects a value
    pub fn encode_values(
        &self,
        schema: &UnitType,
        sparse: &Values,
        baseline: Option<&StoredValues>,
    ) -> UnitStoreResult<StoredValues> {
        let mut stored = baseline.cloned().unwrap_or_default();

        for (key, value) in sparse {
            let item = schema
                .item(key)
                .ok_or_else(|| UnitStoreError::unknown_item(key, schema.id()))?;
            let codec = self.registry.require(item.kind())?;

            match codec
                .encode(value)
                .map_err(|err| UnitStoreError::invalid_value(key, err))?
            {
                Some(encoded) => {
                    stored.insert(key.clone(), encoded);
                }
                None => {
                    stored.remove(key);
                }
            }
        }

        Ok(stored)
    }

    /// Decodes every declared item of `schema` from `stored`.
    ///
    /// Missing keys decode to null. Keys in `stored` that the unit type does not declare
    /// are ignored.
    pub fn decode_values(&self, schema: &UnitType, stored: &StoredValues) -> UnitStoreResult<Values> {
        let mut values = Values::new();

        for item in schema.items() {
            let value = match stored.get(item.id()) {
                Some(encoded) => self
                    .registry
                    .require(item.kind())?
                    .decode(encoded)
                    .map_err(|err| UnitStoreError::invalid_value(item.id(), err))?,
                None => None,
            };

            values.insert(item.id().to_string(), value.unwrap_or(Value::Null));
        }

        Ok(values)
    }

    /// Canonical business shape of `sparse`: encode, then decode.
    pub fn normalize_values(&self, schema: &UnitType, sparse: &Values) -> UnitStoreResult<Values> {
        self.decode_values(schema, &self.encode_values(schema, sparse, None)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kind::{self, FnCodec},
        registry::RegisterOptions,
        schema::DataItem,
    };
    use bson::{Bson, doc};
    use serde_json::json;

    fn codec() -> RecordCodec {
        RecordCodec::new(Arc::new(KindRegistry::new()))
    }

    fn values(value: Value) -> Values {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn schema() -> UnitType {
        UnitType::builder("project")
            .item(DataItem::new("name", kind::STRING))
            .item(DataItem::new("age", kind::NUMBER))
            .item(DataItem::new("progress", kind::PERCENTAGE))
            .item(DataItem::new("due", kind::DATE))
            .build()
            .unwrap()
    }

    #[test]
    fn percentage_scenario() {
        let schema = UnitType::builder("task")
            .item(DataItem::new("progress", kind::PERCENTAGE))
            .build()
            .unwrap();
        let codec = codec();

        let stored = codec
            .encode_values(&schema, &values(json!({ "progress": { "value": 42.5 } })), None)
            .unwrap();
        assert_eq!(stored, doc! { "progress": 4250_i64 });

        let decoded = codec.decode_values(&schema, &stored).unwrap();
        assert_eq!(decoded, values(json!({ "progress": { "value": 42.5 } })));
    }

    #[test]
    fn decode_is_dense() {
        let codec = codec();
        let stored = codec
            .encode_values(&schema(), &values(json!({ "name": "Apollo" })), None)
            .unwrap();

        assert_eq!(
            codec.decode_values(&schema(), &stored).unwrap(),
            values(json!({ "name": "Apollo", "age": null, "progress": null, "due": null }))
        );
    }

    #[test]
    fn decode_follows_item_order() {
        let codec = codec();
        let stored = codec
            .encode_values(&schema(), &values(json!({ "due": "2024-03-01", "age": 3 })), None)
            .unwrap();

        let keys = codec
            .decode_values(&schema(), &stored)
            .unwrap()
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["name", "age", "progress", "due"]);
    }

    #[test]
    fn explicit_null_removes_baseline_key() {
        let codec = codec();
        let baseline = doc! { "name": "Apollo", "age": 3_i64 };

        let stored = codec
            .encode_values(&schema(), &values(json!({ "age": null })), Some(&baseline))
            .unwrap();

        assert_eq!(stored, doc! { "name": "Apollo" });
    }

    #[test]
    fn absent_keys_keep_baseline() {
        let codec = codec();
        let baseline = doc! { "name": "Apollo", "age": 3_i64 };

        let stored = codec
            .encode_values(&schema(), &values(json!({ "progress": 10 })), Some(&baseline))
            .unwrap();

        assert_eq!(stored, doc! { "name": "Apollo", "age": 3_i64, "progress": 1000_i64 });
    }

    #[test]
    fn unknown_item_is_fatal() {
        let err = codec()
            .encode_values(&schema(), &values(json!({ "name": "A", "extra": "x" })), None)
            .unwrap_err();

        assert!(matches!(err, UnitStoreError::UnknownDataItem { ref item, .. } if item == "extra"));
        assert!(err.to_string().contains("\"extra\""));
    }

    #[test]
    fn codec_errors_name_the_item() {
        let err = codec()
            .encode_values(&schema(), &values(json!({ "progress": 120 })), None)
            .unwrap_err();

        assert!(matches!(err, UnitStoreError::InvalidValue { ref item, .. } if item == "progress"));
    }

    #[test]
    fn malformed_stored_values_fail_decode() {
        let err = codec()
            .decode_values(&schema(), &doc! { "due": { "iso": "garbage" } })
            .unwrap_err();

        assert!(matches!(err, UnitStoreError::InvalidValue { ref item, .. } if item == "due"));
    }

    #[test]
    fn unregistered_kinds_are_reported() {
        let schema = UnitType::builder("custom")
            .item(DataItem::new("rating", "rating"))
            .build()
            .unwrap();
        let registry = Arc::new(KindRegistry::new());
        let codec = RecordCodec::new(registry.clone());

        assert!(matches!(
            codec.encode_values(&schema, &values(json!({ "rating": 3 })), None),
            Err(UnitStoreError::UnknownKind(name)) if name == "rating"
        ));

        registry
            .register(
                "rating",
                FnCodec::new(
                    |value: &Value| Ok(value.as_i64().map(|stars| Bson::String("*".repeat(stars as usize)))),
                    |stored: &Bson| Ok(stored.as_str().map(|stars| Value::from(stars.len()))),
                ),
                RegisterOptions::default(),
            )
            .unwrap();

        let stored = codec
            .encode_values(&schema, &values(json!({ "rating": 3 })), None)
            .unwrap();
        assert_eq!(stored, doc! { "rating": "***" });
        assert_eq!(codec.decode_values(&schema, &stored).unwrap(), values(json!({ "rating": 3 })));
    }

    #[test]
    fn normalize_applies_canonical_shapes() {
        let normalized = codec()
            .normalize_values(&schema(), &values(json!({ "name": 7, "progress": 50, "due": "2024-03-01" })))
            .unwrap();

        assert_eq!(
            normalized,
            values(json!({
                "name": "7",
                "age": null,
                "progress": { "value": 50 },
                "due": { "iso": "2024-03-01T00:00:00.000Z" },
            }))
        );
    }
}

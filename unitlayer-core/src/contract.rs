//! Validation of untyped payloads against unit types.
//!
//! These functions are the trust boundary between untyped JSON (parsed from whatever
//! transport the application uses) and validated [`UnitType`] / [`Unit`] values.
//! Payload keys are camelCase (`unitTypeId`, `createdAt`, `updatedAt`) and timestamps are
//! ISO-8601 strings.
//!
//! For every unit `u` of unit type `s` built by this crate,
//! `deserialize_unit(&serialize_unit(&u, &s, codec)?, &s, codec)? == u`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};

use crate::{
    error::{UnitStoreError, UnitStoreResult},
    kind::temporal::{format_iso, now_millis, parse_iso},
    schema::{DataItem, Documentation, UnitType},
    unit::Unit,
    values::{RecordCodec, Values},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitTypePayload {
    id: String,
    #[serde(default)]
    documentation: Documentation,
    #[serde(default)]
    items: Vec<DataItem>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitPayload {
    id: String,
    unit_type_id: String,
    #[serde(default)]
    values: Values,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

fn parse_payload<T: DeserializeOwned>(what: &str, payload: &Value) -> UnitStoreResult<T> {
    T::deserialize(payload)
        .map_err(|err| UnitStoreError::Validation(format!("invalid {what} payload: {err}")))
}

fn require_non_empty(field: &str, value: &str) -> UnitStoreResult<()> {
    if value.trim().is_empty() {
        return Err(UnitStoreError::Validation(format!("`{field}` must not be empty")));
    }

    Ok(())
}

fn parse_timestamp(field: &str, text: &str) -> UnitStoreResult<DateTime<Utc>> {
    parse_iso(text).ok_or_else(|| {
        UnitStoreError::Validation(format!("`{field}` is not an ISO timestamp: \"{text}\""))
    })
}

/// `updatedAt` defaults to `createdAt`, which defaults to now.
fn timestamps(
    created_at: Option<&str>,
    updated_at: Option<&str>,
) -> UnitStoreResult<(DateTime<Utc>, DateTime<Utc>)> {
    let created_at = match created_at {
        Some(text) => parse_timestamp("createdAt", text)?,
        None => now_millis(),
    };
    let updated_at = match updated_at {
        Some(text) => parse_timestamp("updatedAt", text)?,
        None => created_at,
    };

    Ok((created_at, updated_at))
}

fn insert_metadata(payload: &mut Value, metadata: Option<&Map<String, Value>>) {
    if let (Some(metadata), Some(object)) = (metadata, payload.as_object_mut()) {
        object.insert("metadata".to_string(), Value::Object(metadata.clone()));
    }
}

pub fn serialize_unit_type(unit_type: &UnitType) -> UnitStoreResult<Value> {
    let mut payload = json!({
        "id": unit_type.id(),
        "documentation": serde_json::to_value(unit_type.documentation())?,
        "items": serde_json::to_value(unit_type.items())?,
        "createdAt": format_iso(&unit_type.created_at()),
        "updatedAt": format_iso(&unit_type.updated_at()),
    });

    insert_metadata(&mut payload, unit_type.metadata());

    Ok(payload)
}

/// Validates a unit type payload.
///
/// # Errors
///
/// [`UnitStoreError::Validation`] for malformed payloads, empty identifiers and bad
/// documentation; [`UnitStoreError::DuplicateDataItem`] for repeated item ids.
pub fn deserialize_unit_type(payload: &Value) -> UnitStoreResult<UnitType> {
    let payload: UnitTypePayload = parse_payload("unit type", payload)?;
    let (created_at, updated_at) =
        timestamps(payload.created_at.as_deref(), payload.updated_at.as_deref())?;

    UnitType::from_parts(
        payload.id,
        payload.documentation,
        payload.items,
        payload.metadata,
        created_at,
        updated_at,
    )
}

/// Serializes a unit with its values in canonical form.
pub fn serialize_unit(unit: &Unit, unit_type: &UnitType, codec: &RecordCodec) -> UnitStoreResult<Value> {
    if unit.unit_type_id != unit_type.id() {
        return Err(UnitStoreError::UnitTypeMismatch {
            expected: unit_type.id().to_string(),
            actual: unit.unit_type_id.clone(),
        });
    }

    let mut payload = json!({
        "id": unit.id,
        "unitTypeId": unit.unit_type_id,
        "values": codec.normalize_values(unit_type, &unit.values)?,
        "createdAt": format_iso(&unit.created_at),
        "updatedAt": format_iso(&unit.updated_at),
    });

    insert_metadata(&mut payload, unit.metadata.as_ref());

    Ok(payload)
}

/// Validates a unit payload against `unit_type`.
///
/// Values are normalized through their kinds, so the returned unit carries one canonical
/// value (or null) per declared item.
///
/// # Errors
///
/// - [`UnitStoreError::Validation`] for malformed payloads or empty ids
/// - [`UnitStoreError::UnitTypeMismatch`] if `unitTypeId` names another unit type
/// - [`UnitStoreError::UnknownDataItem`] for undeclared value keys
/// - [`UnitStoreError::InvalidValue`] when a kind rejects a value
/// - [`UnitStoreError::MissingRequiredValue`] for a required item without a value
pub fn deserialize_unit(payload: &Value, unit_type: &UnitType, codec: &RecordCodec) -> UnitStoreResult<Unit> {
    let payload: UnitPayload = parse_payload("unit", payload)?;

    require_non_empty("id", &payload.id)?;
    require_non_empty("unitTypeId", &payload.unit_type_id)?;

    if payload.unit_type_id != unit_type.id() {
        return Err(UnitStoreError::UnitTypeMismatch {
            expected: unit_type.id().to_string(),
            actual: payload.unit_type_id,
        });
    }

    let values = codec.normalize_values(unit_type, &payload.values)?;

    check_required(unit_type, &values)?;

    let (created_at, updated_at) =
        timestamps(payload.created_at.as_deref(), payload.updated_at.as_deref())?;

    Ok(Unit {
        id: payload.id,
        unit_type_id: payload.unit_type_id,
        values,
        metadata: payload.metadata,
        created_at,
        updated_at,
    })
}

pub(crate) fn check_required(unit_type: &UnitType, values: &Values) -> UnitStoreResult<()> {
    match unit_type
        .items()
        .iter()
        .filter(|item| item.is_required())
        .find(|item| values.get(item.id()).is_none_or(Value::is_null))
    {
        Some(item) => Err(UnitStoreError::MissingRequiredValue(item.id().to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kind, registry::KindRegistry, schema::DataItem};
    use std::sync::Arc;

    fn codec() -> RecordCodec {
        RecordCodec::new(Arc::new(KindRegistry::new()))
    }

    fn people() -> UnitType {
        UnitType::builder("person")
            .item(DataItem::new("name", kind::STRING))
            .item(DataItem::new("age", kind::NUMBER))
            .build()
            .unwrap()
    }

    #[test]
    fn required_value_scenario() {
        let unit_type = UnitType::builder("person")
            .item(DataItem::new("name", kind::STRING).required())
            .build()
            .unwrap();
        let payload = json!({ "id": "p1", "unitTypeId": "person", "values": {} });

        let err = deserialize_unit(&payload, &unit_type, &codec()).unwrap_err();
        assert_eq!(err.to_string(), "Missing required value for data item \"name\"");

        let payload = json!({ "id": "p1", "unitTypeId": "person", "values": { "name": "Ada" } });
        assert!(deserialize_unit(&payload, &unit_type, &codec()).is_ok());
    }

    #[test]
    fn unknown_value_scenario() {
        let payload = json!({
            "id": "p1",
            "unitTypeId": "person",
            "values": { "name": "A", "age": 1, "extra": "x" },
        });

        let err = deserialize_unit(&payload, &people(), &codec()).unwrap_err();

        assert!(matches!(err, UnitStoreError::UnknownDataItem { .. }));
        assert!(err.to_string().contains("\"extra\""));
    }

    #[test]
    fn unit_type_mismatch_is_fatal() {
        let payload = json!({ "id": "p1", "unitTypeId": "animal", "values": {} });

        assert!(matches!(
            deserialize_unit(&payload, &people(), &codec()),
            Err(UnitStoreError::UnitTypeMismatch { ref expected, ref actual }) if expected == "person" && actual == "animal"
        ));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let codec = codec();

        for payload in [
            json!({ "unitTypeId": "person" }),
            json!({ "id": "", "unitTypeId": "person" }),
            json!({ "id": "p1", "unitTypeId": " " }),
            json!({ "id": "p1", "unitTypeId": "person", "values": [] }),
            json!({ "id": "p1", "unitTypeId": "person", "metadata": "x" }),
            json!({ "id": "p1", "unitTypeId": "person", "createdAt": "noon" }),
        ] {
            assert!(
                matches!(deserialize_unit(&payload, &people(), &codec), Err(UnitStoreError::Validation(_))),
                "{payload}"
            );
        }
    }

    #[test]
    fn timestamps_default_sensibly() {
        let codec = codec();
        let payload = json!({
            "id": "p1",
            "unitTypeId": "person",
            "createdAt": "2024-03-01T12:00:00Z",
        });

        let unit = deserialize_unit(&payload, &people(), &codec).unwrap();
        assert_eq!(format_iso(&unit.created_at), "2024-03-01T12:00:00.000Z");
        assert_eq!(unit.updated_at, unit.created_at);

        let unit = deserialize_unit(&json!({ "id": "p2", "unitTypeId": "person" }), &people(), &codec).unwrap();
        assert_eq!(unit.updated_at, unit.created_at);
        assert_eq!(unit.values, json!({ "name": null, "age": null }).as_object().cloned().unwrap());
    }

    #[test]
    fn units_survive_a_round_trip() {
        let codec = codec();
        let payload = json!({
            "id": "p1",
            "unitTypeId": "person",
            "values": { "name": "Ada", "age": 36 },
            "metadata": { "source": "import" },
            "createdAt": "2024-03-01T12:00:00.123Z",
            "updatedAt": "2024-03-02T08:30:00Z",
        });

        let unit = deserialize_unit(&payload, &people(), &codec).unwrap();
        let serialized = serialize_unit(&unit, &people(), &codec).unwrap();

        assert_eq!(serialized["updatedAt"], json!("2024-03-02T08:30:00.000Z"));
        assert_eq!(deserialize_unit(&serialized, &people(), &codec).unwrap(), unit);
    }

    #[test]
    fn unit_types_survive_a_round_trip() {
        let payload = json!({
            "id": "project",
            "documentation": {
                "name": { "en": "Project", "fr": "Projet" },
                "description": "Tracked work",
                "icon": "folder",
                "tags": ["work"],
                "links": [{ "url": "https://example.com/projects", "title": "Guide" }],
                "examples": [{ "value": { "name": "Apollo" } }],
            },
            "items": [
                { "id": "name", "type": "string", "metadata": { "required": true } },
                { "id": "progress", "type": "percentage", "status": { "state": "beta" } },
            ],
            "metadata": { "owner": "ops" },
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-02T00:00:00.000Z",
        });

        let unit_type = deserialize_unit_type(&payload).unwrap();

        assert!(unit_type.item("name").unwrap().is_required());
        assert_eq!(unit_type.item("progress").unwrap().status().unwrap()["state"], json!("beta"));
        assert_eq!(serialize_unit_type(&unit_type).unwrap(), payload);
    }

    #[test]
    fn unit_type_payloads_are_validated() {
        for payload in [
            json!({ "id": "" }),
            json!({ "id": "project", "items": [{ "id": "name" }] }),
            json!({ "id": "project", "items": [{ "id": "", "type": "string" }] }),
            json!({ "id": "project", "documentation": { "name": 4 } }),
            json!({ "id": "project", "documentation": { "tags": "work" } }),
            json!({ "id": "project", "documentation": { "links": [{ "title": "no url" }] } }),
            json!({ "id": "project", "items": [{ "id": "name", "type": "string", "metadata": [] }] }),
        ] {
            assert!(
                matches!(deserialize_unit_type(&payload), Err(UnitStoreError::Validation(_))),
                "{payload}"
            );
        }

        assert!(matches!(
            deserialize_unit_type(&json!({
                "id": "project",
                "items": [{ "id": "name", "type": "string" }, { "id": "name", "type": "number" }],
            })),
            Err(UnitStoreError::DuplicateDataItem { .. })
        ));
    }
}

//! Value codecs, one per kind.
//!
//! A kind is the named contract that governs how the value of a data item is validated,
//! normalized and encoded for storage. Each kind is implemented by a [`KindCodec`]:
//!
//! - `encode` takes a business value (JSON) and produces the storage encoding (BSON).
//! - `decode` takes a stored value and reproduces the canonical business value.
//!
//! Both are total on absence: a null input yields `Ok(None)`. Encoding to `None` is a
//! removal signal for the record codec, never an explicit null marker.
//!
//! The built-in kinds live in [`scalar`], [`temporal`] and [`structured`]. Additional
//! kinds are registered at runtime through [`KindRegistry`](crate::registry::KindRegistry),
//! either by implementing [`KindCodec`] or by wrapping two closures in a [`FnCodec`].
//!
//! # Example
//!
//! ```ignore
//! use unitlayer::kind::{KindCodec, structured::PercentageCodec};
//! use serde_json::json;
//!
//! let stored = PercentageCodec.encode(&json!({ "value": 42.5 }))?;
//! assert_eq!(stored, Some(bson::Bson::Int64(4250)));
//! ```

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Number, Value};
use std::{fmt::Debug, sync::Arc};

use crate::error::{KindError, KindResult};

pub mod scalar;
pub mod structured;
pub mod temporal;

pub const STRING: &str = "string";
pub const MARKDOWN: &str = "markdown";
pub const NUMBER: &str = "number";
pub const NUMBER_RANGE: &str = "numberRange";
pub const BOOLEAN: &str = "boolean";
pub const PERCENTAGE: &str = "percentage";
pub const DATE: &str = "date";
pub const DATE_RANGE: &str = "dateRange";
pub const MONTH: &str = "month";
pub const ENUM: &str = "enum";
pub const FILES: &str = "files";
pub const FORMULA: &str = "formula";
pub const DISTANCE: &str = "distance";
pub const ICON: &str = "icon";
pub const GEO_ADDRESS: &str = "geoAddress";
pub const REFERENCE: &str = "reference";

/// The encode/decode pair implementing one kind.
///
/// Implementors only handle present values through [`encode_present`](Self::encode_present)
/// and [`decode_present`](Self::decode_present); the provided `encode`/`decode` map null
/// (and BSON `undefined`) to `None` before dispatching.
pub trait KindCodec: Send + Sync + Debug {
    /// Validates and encodes a non-null business value.
    ///
    /// Returning `Ok(None)` asks the record codec to drop the stored key.
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>>;

    /// Decodes a non-null stored value into its canonical business shape.
    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>>;

    /// Encodes a business value, treating null as absent.
    fn encode(&self, value: &Value) -> KindResult<Option<Bson>> {
        match value {
            Value::Null => Ok(None),
            value => self.encode_present(value),
        }
    }

    /// Decodes a stored value, treating null as absent.
    fn decode(&self, stored: &Bson) -> KindResult<Option<Value>> {
        match stored {
            Bson::Null | Bson::Undefined => Ok(None),
            stored => self.decode_present(stored),
        }
    }
}

impl<C: KindCodec + ?Sized> KindCodec for Arc<C> {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        (**self).encode_present(value)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        (**self).decode_present(stored)
    }
}

/// A codec assembled from two closures.
///
/// Handy for domain extensions and test doubles that don't warrant a dedicated type.
///
/// ```ignore
/// let upper = FnCodec::new(
///     |value| Ok(value.as_str().map(|s| Bson::String(s.to_uppercase()))),
///     |stored| Ok(stored.as_str().map(|s| Value::String(s.to_string()))),
/// );
/// registry.register("shout", upper, RegisterOptions::default())?;
/// ```
pub struct FnCodec<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnCodec<E, D>
where
    E: Fn(&Value) -> KindResult<Option<Bson>> + Send + Sync,
    D: Fn(&Bson) -> KindResult<Option<Value>> + Send + Sync,
{
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<E, D> Debug for FnCodec<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}

impl<E, D> KindCodec for FnCodec<E, D>
where
    E: Fn(&Value) -> KindResult<Option<Bson>> + Send + Sync,
    D: Fn(&Bson) -> KindResult<Option<Value>> + Send + Sync,
{
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        (self.encode)(value)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        (self.decode)(stored)
    }
}

/// Returns the built-in kinds paired with their codecs.
pub fn builtins() -> Vec<(&'static str, Arc<dyn KindCodec>)> {
    vec![
        (STRING, Arc::new(scalar::StringCodec) as Arc<dyn KindCodec>),
        (MARKDOWN, Arc::new(scalar::MarkdownCodec)),
        (NUMBER, Arc::new(scalar::NumberCodec)),
        (BOOLEAN, Arc::new(scalar::BooleanCodec)),
        (NUMBER_RANGE, Arc::new(structured::NumberRangeCodec)),
        (PERCENTAGE, Arc::new(structured::PercentageCodec)),
        (DATE, Arc::new(temporal::DateCodec)),
        (DATE_RANGE, Arc::new(temporal::DateRangeCodec)),
        (MONTH, Arc::new(temporal::MonthCodec)),
        (ENUM, Arc::new(structured::EnumCodec)),
        (FILES, Arc::new(structured::FilesCodec)),
        (FORMULA, Arc::new(structured::FormulaCodec)),
        (DISTANCE, Arc::new(structured::DistanceCodec)),
        (ICON, Arc::new(structured::IconCodec)),
        (GEO_ADDRESS, Arc::new(structured::GeoAddressCodec)),
        (REFERENCE, Arc::new(structured::ReferenceCodec)),
    ]
}

/// Deserializes a business value into one of the accepted input shapes of a kind.
pub(crate) fn accept<T: DeserializeOwned>(
    kind: &'static str,
    expected: &'static str,
    value: &Value,
) -> KindResult<T> {
    T::deserialize(value).map_err(|_| KindError::mismatch(kind, expected))
}

/// Deserializes a stored value into the stored shape of a kind.
pub(crate) fn from_stored<T: DeserializeOwned>(
    kind: &'static str,
    expected: &'static str,
    stored: &Bson,
) -> KindResult<T> {
    deserialize_from_bson(stored.clone()).map_err(|_| KindError::mismatch(kind, expected))
}

pub(crate) fn to_stored<T: Serialize>(kind: &'static str, value: &T) -> KindResult<Bson> {
    serialize_to_bson(value).map_err(|err| KindError::out_of_range(kind, err.to_string()))
}

pub(crate) fn to_business<T: Serialize>(kind: &'static str, value: &T) -> KindResult<Value> {
    serde_json::to_value(value).map_err(|err| KindError::out_of_range(kind, err.to_string()))
}

/// Integers stay integers in storage so that decoding reproduces the same JSON number.
pub(crate) fn number_to_bson(number: &Number) -> Bson {
    match number.as_i64() {
        Some(int) => Bson::Int64(int),
        None => number
            .as_f64()
            .map(Bson::Double)
            .unwrap_or(Bson::Null),
    }
}

pub(crate) fn bson_to_number(stored: &Bson) -> Option<Number> {
    match stored {
        Bson::Int32(int) => Some(Number::from(*int)),
        Bson::Int64(int) => Some(Number::from(*int)),
        Bson::Double(float) => Number::from_f64(*float),
        _ => None,
    }
}

pub(crate) fn number_as_f64(number: &Number) -> f64 {
    number.as_f64().unwrap_or(f64::NAN)
}

/// Coerces a scalar JSON value to a string, `None` for anything that has no
/// sensible scalar rendering.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) if number.is_f64() => Some(number_as_f64(number).to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub(crate) fn non_empty(
    kind: &'static str,
    field: &str,
    value: String,
) -> KindResult<String> {
    if value.trim().is_empty() {
        return Err(KindError::invalid_format(kind, format!("`{field}` must not be empty")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_cover_every_kind_once() {
        let names = builtins()
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();

        assert_eq!(names.len(), 16);
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn every_builtin_is_total_on_absence() {
        for (name, codec) in builtins() {
            assert_eq!(codec.encode(&Value::Null), Ok(None), "{name} encode");
            assert_eq!(codec.decode(&Bson::Null), Ok(None), "{name} decode");
        }
    }

    #[test]
    fn every_builtin_round_trips_its_canonical_shape() {
        let samples = [
            (STRING, json!("Apollo")),
            (MARKDOWN, json!("# Apollo")),
            (NUMBER, json!(42)),
            (BOOLEAN, json!(true)),
            (NUMBER_RANGE, json!({ "start": 1, "end": 2.5 })),
            (PERCENTAGE, json!({ "value": 42.5 })),
            (DATE, json!({ "iso": "2024-03-01T12:00:00.000Z" })),
            (
                DATE_RANGE,
                json!({
                    "start": { "iso": "2024-01-01T00:00:00.000Z" },
                    "end": { "iso": "2024-02-01T00:00:00.000Z" },
                }),
            ),
            (MONTH, json!({ "month": "2024-06" })),
            (ENUM, json!({ "key": "done", "label": "Done" })),
            (FILES, json!([{ "id": "f1", "name": "a.pdf" }])),
            (FORMULA, json!({ "expression": "a * 2", "result": 84 })),
            (DISTANCE, json!({ "value": 12.5, "unit": "km" })),
            (ICON, json!({ "name": "star", "color": "gold" })),
            (GEO_ADDRESS, json!({ "city": "Lyon", "coordinates": { "lat": 45.76, "lng": 4.84 } })),
            (REFERENCE, json!({ "unitId": "apollo", "unitType": "project" })),
        ];
        assert_eq!(samples.len(), builtins().len());

        for (name, codec) in builtins() {
            let (_, value) = samples
                .iter()
                .find(|(kind, _)| *kind == name)
                .unwrap();
            let stored = codec.encode(value).unwrap().unwrap();

            assert_eq!(codec.decode(&stored).unwrap().as_ref(), Some(value), "{name}");
        }
    }

    #[test]
    fn fn_codec_dispatches_to_closures() {
        let codec = FnCodec::new(
            |value: &Value| Ok(value.as_str().map(|s| Bson::String(s.to_uppercase()))),
            |stored: &Bson| Ok(stored.as_str().map(|s| Value::String(s.to_lowercase()))),
        );

        assert_eq!(codec.encode(&json!("abc")), Ok(Some(Bson::String("ABC".into()))));
        assert_eq!(codec.decode(&Bson::String("ABC".into())), Ok(Some(json!("abc"))));
        assert_eq!(codec.encode(&Value::Null), Ok(None));
    }

    #[test]
    fn numbers_keep_their_integer_shape() {
        assert_eq!(number_to_bson(&Number::from(7)), Bson::Int64(7));
        assert_eq!(bson_to_number(&Bson::Int64(7)), Some(Number::from(7)));
        assert_eq!(bson_to_number(&Bson::Int32(7)), Some(Number::from(7)));
        assert_eq!(bson_to_number(&Bson::Double(f64::NAN)), None);
        assert_eq!(scalar_to_string(&json!(1.5)), Some("1.5".to_string()));
        assert_eq!(scalar_to_string(&json!(true)), Some("true".to_string()));
        assert_eq!(scalar_to_string(&json!([1])), None);
    }
}

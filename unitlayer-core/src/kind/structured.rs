//! Structured kinds: tagged objects and arrays of objects.
//!
//! Most of these kinds store the same shape they accept. Where a kind also accepts a bare
//! shorthand (an enum key, an icon name, a formula expression, a percentage number), the
//! accepted shapes are an explicit untagged enum and normalization is a `match` over it.

use bson::Bson;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::{
    KindCodec, accept, from_stored, non_empty, number_as_f64, scalar_to_string, to_business,
    to_stored,
};
use crate::error::{KindError, KindResult};

fn ensure_finite(kind: &'static str, field: &str, number: &Number) -> KindResult<()> {
    if !number_as_f64(number).is_finite() {
        return Err(KindError::out_of_range(kind, format!("`{field}` must be finite")));
    }

    Ok(())
}

/// `{ start, end }` with finite bounds and `start <= end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberRange {
    pub start: Number,
    pub end: Number,
}

impl NumberRange {
    fn validated(self) -> KindResult<Self> {
        ensure_finite(super::NUMBER_RANGE, "start", &self.start)?;
        ensure_finite(super::NUMBER_RANGE, "end", &self.end)?;

        if number_as_f64(&self.start) > number_as_f64(&self.end) {
            return Err(KindError::out_of_range(
                super::NUMBER_RANGE,
                format!("start {} is greater than end {}", self.start, self.end),
            ));
        }

        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberRangeCodec;

impl KindCodec for NumberRangeCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let range: NumberRange =
            accept(super::NUMBER_RANGE, "an object with numeric `start` and `end`", value)?;

        to_stored(super::NUMBER_RANGE, &range.validated()?).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let range: NumberRange =
            from_stored(super::NUMBER_RANGE, "a stored { start, end } document", stored)?;

        to_business(super::NUMBER_RANGE, &range.validated()?).map(Some)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PercentageInput {
    Bare(f64),
    Entry { value: f64 },
}

/// A percentage in `[0, 100]`, stored as integer basis points.
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentageCodec;

impl PercentageCodec {
    const SCALE: f64 = 100.0;
    const MAX_BASIS_POINTS: i64 = 10_000;

    fn business(basis_points: i64) -> Value {
        let value = if basis_points % 100 == 0 {
            Value::from(basis_points / 100)
        } else {
            Value::from(basis_points as f64 / Self::SCALE)
        };

        serde_json::json!({ "value": value })
    }
}

impl KindCodec for PercentageCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let percent = match accept(super::PERCENTAGE, "a number or { value }", value)? {
            PercentageInput::Bare(percent) | PercentageInput::Entry { value: percent } => percent,
        };

        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(KindError::out_of_range(
                super::PERCENTAGE,
                format!("{percent} is outside [0, 100]"),
            ));
        }

        Ok(Some(Bson::Int64((percent * Self::SCALE).round() as i64)))
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let basis_points = match stored {
            Bson::Int32(int) => i64::from(*int),
            Bson::Int64(int) => *int,
            Bson::Double(float) if float.is_finite() => float.round() as i64,
            _ => return Err(KindError::mismatch(super::PERCENTAGE, "stored integer basis points")),
        };

        if !(0..=Self::MAX_BASIS_POINTS).contains(&basis_points) {
            return Err(KindError::out_of_range(
                super::PERCENTAGE,
                format!("{basis_points} basis points is outside [0, 10000]"),
            ));
        }

        Ok(Some(Self::business(basis_points)))
    }
}

/// A selected option of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnumInput {
    Key(String),
    Entry(EnumValue),
}

impl EnumInput {
    fn normalize(self) -> KindResult<EnumValue> {
        let value = match self {
            EnumInput::Key(key) => EnumValue { key, label: None },
            EnumInput::Entry(value) => value,
        };

        Ok(EnumValue { key: non_empty(super::ENUM, "key", value.key)?, ..value })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnumCodec;

impl KindCodec for EnumCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let input: EnumInput = accept(super::ENUM, "a key string or { key, label? }", value)?;

        to_stored(super::ENUM, &input.normalize()?).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let input: EnumInput = from_stored(super::ENUM, "a stored { key, label? } document", stored)?;

        to_business(super::ENUM, &input.normalize()?).map(Some)
    }
}

/// One attached file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileRef {
    fn validated(self, index: usize) -> KindResult<Self> {
        if self.id.trim().is_empty() {
            return Err(KindError::invalid_format(
                super::FILES,
                format!("entry {index} has an empty `id`"),
            ));
        }

        Ok(self)
    }
}

fn entry_error(index: usize) -> KindError {
    KindError::invalid_format(
        super::FILES,
        format!("entry {index} must be an object with a string `id`"),
    )
}

/// An ordered list of file references.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesCodec;

impl KindCodec for FilesCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let entries = value
            .as_array()
            .ok_or_else(|| KindError::mismatch(super::FILES, "an array of files"))?;

        let files = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                FileRef::deserialize(entry)
                    .map_err(|_| entry_error(index))?
                    .validated(index)
            })
            .collect::<KindResult<Vec<_>>>()?;

        to_stored(super::FILES, &files).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let entries = stored
            .as_array()
            .ok_or_else(|| KindError::mismatch(super::FILES, "a stored array of files"))?;

        let files = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                bson::de::deserialize_from_bson::<FileRef>(entry.clone())
                    .map_err(|_| entry_error(index))?
                    .validated(index)
            })
            .collect::<KindResult<Vec<_>>>()?;

        to_business(super::FILES, &files).map(Some)
    }
}

/// A formula expression and its last computed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FormulaInput {
    Expression(String),
    Entry(Formula),
}

impl FormulaInput {
    fn normalize(self) -> KindResult<Formula> {
        let formula = match self {
            FormulaInput::Expression(expression) => Formula { expression, result: None },
            FormulaInput::Entry(formula) => formula,
        };

        Ok(Formula {
            expression: non_empty(super::FORMULA, "expression", formula.expression)?,
            ..formula
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaCodec;

impl KindCodec for FormulaCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let input: FormulaInput =
            accept(super::FORMULA, "an expression string or { expression, result? }", value)?;

        to_stored(super::FORMULA, &input.normalize()?).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let input: FormulaInput =
            from_stored(super::FORMULA, "a stored { expression, result? } document", stored)?;

        to_business(super::FORMULA, &input.normalize()?).map(Some)
    }
}

/// A measured distance with an optional unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub value: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceCodec;

impl KindCodec for DistanceCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let distance: Distance =
            accept(super::DISTANCE, "an object with a numeric `value` and optional `unit`", value)?;
        ensure_finite(super::DISTANCE, "value", &distance.value)?;

        to_stored(super::DISTANCE, &distance).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let distance: Distance =
            from_stored(super::DISTANCE, "a stored { value, unit? } document", stored)?;

        to_business(super::DISTANCE, &distance).map(Some)
    }
}

/// An icon from an icon library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IconInput {
    Name(String),
    Entry(Icon),
}

impl IconInput {
    fn normalize(self) -> KindResult<Icon> {
        let icon = match self {
            IconInput::Name(name) => Icon { name, color: None, library: None },
            IconInput::Entry(icon) => icon,
        };

        Ok(Icon { name: non_empty(super::ICON, "name", icon.name)?, ..icon })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IconCodec;

impl KindCodec for IconCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let input: IconInput = accept(super::ICON, "an icon name or { name, color?, library? }", value)?;

        to_stored(super::ICON, &input.normalize()?).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let input: IconInput = from_stored(super::ICON, "a stored { name } document", stored)?;

        to_business(super::ICON, &input.normalize()?).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: Number,
    pub lng: Number,
}

/// A postal address with optional coordinates. Absent parts are not stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl GeoAddress {
    fn validated(self) -> KindResult<Self> {
        if let Some(coordinates) = &self.coordinates {
            ensure_finite(super::GEO_ADDRESS, "coordinates.lat", &coordinates.lat)?;
            ensure_finite(super::GEO_ADDRESS, "coordinates.lng", &coordinates.lng)?;
        }

        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeoAddressCodec;

impl KindCodec for GeoAddressCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let address: GeoAddress = accept(
            super::GEO_ADDRESS,
            "an address object with optional numeric { lat, lng } coordinates",
            value,
        )?;

        to_stored(super::GEO_ADDRESS, &address.validated()?).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let address: GeoAddress =
            from_stored(super::GEO_ADDRESS, "a stored address document", stored)?;

        to_business(super::GEO_ADDRESS, &address.validated()?).map(Some)
    }
}

/// A pointer at another unit by its business id and unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub unit_id: String,
    pub unit_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceInput {
    #[serde(default)]
    unit_id: Option<Value>,
    #[serde(default)]
    unit_type: Option<Value>,
}

impl ReferenceInput {
    fn normalize(self) -> KindResult<Reference> {
        let field = |value: Option<Value>, name: &str| {
            value
                .as_ref()
                .and_then(scalar_to_string)
                .ok_or_else(|| {
                    KindError::invalid_format(super::REFERENCE, format!("`{name}` is required"))
                })
                .and_then(|text| non_empty(super::REFERENCE, name, text))
        };

        Ok(Reference {
            unit_id: field(self.unit_id, "unitId")?,
            unit_type: field(self.unit_type, "unitType")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceCodec;

impl KindCodec for ReferenceCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let input: ReferenceInput = accept(super::REFERENCE, "an object with `unitId` and `unitType`", value)?;

        to_stored(super::REFERENCE, &input.normalize()?).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let reference: Reference =
            from_stored(super::REFERENCE, "a stored { unitId, unitType } document", stored)?;

        to_business(super::REFERENCE, &reference).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use proptest::prelude::*;
    use serde_json::json;

    fn round_trip(codec: &dyn KindCodec, value: Value) -> Value {
        let stored = codec.encode(&value).unwrap().unwrap();
        codec.decode(&stored).unwrap().unwrap()
    }

    #[test]
    fn number_range_rejects_inverted_bounds() {
        let err = NumberRangeCodec.encode(&json!({ "start": 10, "end": 5 })).unwrap_err();

        assert!(matches!(err, KindError::OutOfRange { .. }));
        assert!(NumberRangeCodec.encode(&json!({ "start": "a", "end": 5 })).is_err());
        assert_eq!(
            round_trip(&NumberRangeCodec, json!({ "start": 1, "end": 2.5 })),
            json!({ "start": 1, "end": 2.5 })
        );
    }

    #[test]
    fn percentage_is_stored_in_basis_points() {
        assert_eq!(PercentageCodec.encode(&json!({ "value": 42.5 })), Ok(Some(Bson::Int64(4250))));
        assert_eq!(PercentageCodec.encode(&json!(7)), Ok(Some(Bson::Int64(700))));
        assert_eq!(PercentageCodec.decode(&Bson::Int64(4250)), Ok(Some(json!({ "value": 42.5 }))));
        assert_eq!(PercentageCodec.decode(&Bson::Int32(700)), Ok(Some(json!({ "value": 7 }))));
        assert!(PercentageCodec.encode(&json!(100.5)).is_err());
        assert!(PercentageCodec.encode(&json!({ "value": -1 })).is_err());
        assert!(PercentageCodec.decode(&Bson::Int64(10_001)).is_err());
    }

    #[test]
    fn enum_accepts_bare_keys() {
        assert_eq!(EnumCodec.encode(&json!("open")), Ok(Some(Bson::Document(doc! { "key": "open" }))));
        assert_eq!(
            round_trip(&EnumCodec, json!({ "key": "done", "label": "Done" })),
            json!({ "key": "done", "label": "Done" })
        );
        assert!(EnumCodec.encode(&json!({ "label": "Done" })).is_err());
        assert!(EnumCodec.encode(&json!({ "key": 3 })).is_err());
    }

    #[test]
    fn files_require_ids() {
        let files = json!([
            { "id": "f1", "name": "a.pdf", "size": 1024, "mimeType": "application/pdf" },
            { "id": "f2" },
        ]);

        assert_eq!(round_trip(&FilesCodec, files.clone()), files);
        assert!(FilesCodec.encode(&json!({ "id": "f1" })).is_err());

        let err = FilesCodec.encode(&json!([{ "id": "f1" }, { "name": "x" }])).unwrap_err();
        assert!(err.to_string().contains("entry 1"));
    }

    #[test]
    fn formula_accepts_bare_expression() {
        assert_eq!(
            FormulaCodec.encode(&json!("a + b")),
            Ok(Some(Bson::Document(doc! { "expression": "a + b" })))
        );
        assert_eq!(
            round_trip(&FormulaCodec, json!({ "expression": "a * 2", "result": 84 })),
            json!({ "expression": "a * 2", "result": 84 })
        );
        assert!(FormulaCodec.encode(&json!({ "result": 1 })).is_err());
    }

    #[test]
    fn distance_and_icon() {
        assert_eq!(
            round_trip(&DistanceCodec, json!({ "value": 12.5, "unit": "km" })),
            json!({ "value": 12.5, "unit": "km" })
        );
        assert!(DistanceCodec.encode(&json!({ "value": "far" })).is_err());
        assert_eq!(IconCodec.encode(&json!("star")), Ok(Some(Bson::Document(doc! { "name": "star" }))));
        assert_eq!(
            round_trip(&IconCodec, json!({ "name": "star", "color": "gold", "library": "lucide" })),
            json!({ "name": "star", "color": "gold", "library": "lucide" })
        );
        assert_eq!(round_trip(&IconCodec, json!("flag")), json!({ "name": "flag" }));
        assert!(IconCodec.encode(&json!({ "color": "red" })).is_err());
    }

    #[test]
    fn geo_address_drops_absent_parts() {
        let stored = GeoAddressCodec
            .encode(&json!({ "city": "Lyon", "coordinates": { "lat": 45.76, "lng": 4.84 }, "street": null }))
            .unwrap()
            .unwrap();

        assert_eq!(
            stored,
            Bson::Document(doc! { "coordinates": { "lat": 45.76, "lng": 4.84 }, "city": "Lyon" })
        );
        assert!(GeoAddressCodec.encode(&json!({ "coordinates": { "lat": "north", "lng": 1 } })).is_err());

        let address = json!({
            "label": "Office",
            "coordinates": { "lat": 45.76, "lng": 4.84 },
            "street": "1 Rue de la République",
            "city": "Lyon",
            "postalCode": "69001",
            "region": "Auvergne-Rhône-Alpes",
            "country": "FR",
        });
        assert_eq!(round_trip(&GeoAddressCodec, address.clone()), address);
    }

    #[test]
    fn reference_stringifies_ids() {
        assert_eq!(
            ReferenceCodec.encode(&json!({ "unitId": 42, "unitType": "task" })),
            Ok(Some(Bson::Document(doc! { "unitId": "42", "unitType": "task" })))
        );
        assert!(ReferenceCodec.encode(&json!({ "unitId": "42" })).is_err());
        assert_eq!(
            round_trip(&ReferenceCodec, json!({ "unitId": "apollo", "unitType": "project" })),
            json!({ "unitId": "apollo", "unitType": "project" })
        );
    }

    proptest! {
        #[test]
        fn percentage_round_trips_within_a_basis_point(percent in 0.0f64..=100.0) {
            let stored = PercentageCodec.encode(&json!(percent)).unwrap().unwrap();
            let decoded = PercentageCodec.decode(&stored).unwrap().unwrap();
            let value = decoded["value"].as_f64().unwrap();

            prop_assert!((value - percent).abs() <= 0.005 + f64::EPSILON);
        }

        #[test]
        fn number_range_round_trips(start in -1.0e9f64..1.0e9, width in 0.0f64..1.0e9) {
            let range = json!({ "start": start, "end": start + width });

            prop_assert_eq!(round_trip(&NumberRangeCodec, range.clone()), range);
        }
    }
}

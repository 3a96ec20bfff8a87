//! Scalar kinds: `string`, `markdown`, `number` and `boolean`.

use bson::Bson;
use serde_json::Value;

use super::{KindCodec, bson_to_number, number_to_bson, scalar_to_string};
use crate::error::{KindError, KindResult};

/// Free text. Anything that isn't a string is coerced, in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl StringCodec {
    fn coerce(value: &Value) -> String {
        scalar_to_string(value).unwrap_or_else(|| value.to_string())
    }
}

impl KindCodec for StringCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        Ok(Some(Bson::String(Self::coerce(value))))
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let text = match stored {
            Bson::String(text) => text.clone(),
            Bson::Boolean(flag) => flag.to_string(),
            Bson::Int32(int) => int.to_string(),
            Bson::Int64(int) => int.to_string(),
            Bson::Double(float) => float.to_string(),
            other => other.to_string(),
        };

        Ok(Some(Value::String(text)))
    }
}

/// Markdown source. Unlike `string`, no coercion takes place.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownCodec;

impl KindCodec for MarkdownCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        match value {
            Value::String(text) => Ok(Some(Bson::String(text.clone()))),
            _ => Err(KindError::mismatch(super::MARKDOWN, "a string")),
        }
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        match stored {
            Bson::String(text) => Ok(Some(Value::String(text.clone()))),
            _ => Err(KindError::mismatch(super::MARKDOWN, "a stored string")),
        }
    }
}

/// A finite number.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberCodec;

impl KindCodec for NumberCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        match value {
            Value::Number(number) => Ok(Some(number_to_bson(number))),
            _ => Err(KindError::mismatch(super::NUMBER, "a finite number")),
        }
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        match stored {
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => bson_to_number(stored)
                .map(|number| Some(Value::Number(number)))
                .ok_or_else(|| KindError::out_of_range(super::NUMBER, "stored number is not finite")),
            _ => Err(KindError::mismatch(super::NUMBER, "a stored number")),
        }
    }
}

/// A boolean. The strings `"true"` and `"false"` are accepted on encode only.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCodec;

impl KindCodec for BooleanCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        match value {
            Value::Bool(flag) => Ok(Some(Bson::Boolean(*flag))),
            Value::String(text) if text == "true" => Ok(Some(Bson::Boolean(true))),
            Value::String(text) if text == "false" => Ok(Some(Bson::Boolean(false))),
            _ => Err(KindError::mismatch(super::BOOLEAN, "a boolean or \"true\"/\"false\"")),
        }
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        match stored {
            Bson::Boolean(flag) => Ok(Some(Value::Bool(*flag))),
            _ => Err(KindError::mismatch(super::BOOLEAN, "a stored boolean")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_coerces_scalars_on_both_sides() {
        assert_eq!(StringCodec.encode(&json!("abc")), Ok(Some(Bson::String("abc".into()))));
        assert_eq!(StringCodec.encode(&json!(42)), Ok(Some(Bson::String("42".into()))));
        assert_eq!(StringCodec.encode(&json!(false)), Ok(Some(Bson::String("false".into()))));
        assert_eq!(
            StringCodec.encode(&json!({ "a": 1 })),
            Ok(Some(Bson::String("{\"a\":1}".into())))
        );
        assert_eq!(StringCodec.decode(&Bson::Int32(3)), Ok(Some(json!("3"))));
        assert_eq!(StringCodec.decode(&Bson::Double(2.5)), Ok(Some(json!("2.5"))));
    }

    #[test]
    fn markdown_is_strict() {
        assert_eq!(MarkdownCodec.encode(&json!("# Title")), Ok(Some(Bson::String("# Title".into()))));
        assert!(MarkdownCodec.encode(&json!(12)).is_err());
        assert!(MarkdownCodec.decode(&Bson::Int32(12)).is_err());
    }

    #[test]
    fn number_rejects_non_numbers_and_non_finite_storage() {
        assert_eq!(NumberCodec.encode(&json!(3)), Ok(Some(Bson::Int64(3))));
        assert_eq!(NumberCodec.encode(&json!(3.25)), Ok(Some(Bson::Double(3.25))));
        assert!(NumberCodec.encode(&json!("3")).is_err());
        assert!(NumberCodec.decode(&Bson::Double(f64::INFINITY)).is_err());
        assert!(NumberCodec.decode(&Bson::String("3".into())).is_err());
        assert_eq!(NumberCodec.decode(&Bson::Int64(3)), Ok(Some(json!(3))));
    }

    #[test]
    fn boolean_accepts_strings_on_encode_only() {
        assert_eq!(BooleanCodec.encode(&json!("true")), Ok(Some(Bson::Boolean(true))));
        assert_eq!(BooleanCodec.encode(&json!("false")), Ok(Some(Bson::Boolean(false))));
        assert!(BooleanCodec.encode(&json!("yes")).is_err());
        assert!(BooleanCodec.encode(&json!(1)).is_err());
        assert!(BooleanCodec.decode(&Bson::String("true".into())).is_err());
        assert_eq!(BooleanCodec.decode(&Bson::Boolean(true)), Ok(Some(json!(true))));
    }
}

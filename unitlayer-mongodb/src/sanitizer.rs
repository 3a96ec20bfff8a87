//! Key sanitization for MongoDB compatibility.
//!
//! MongoDB field names should not contain dots or dollar signs, which its query syntax
//! treats specially, nor null bytes. Metadata and status maps carry caller-chosen keys,
//! so every key of a stored document is escaped on write and restored on read. Values are
//! left untouched.

use bson::{Bson, Document};

pub(crate) struct KeySanitizer;

impl KeySanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    pub(crate) fn sanitize_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(key, value)| (Self::sanitize_key(key), Self::map_value(value, Self::sanitize_document)))
            .collect()
    }

    pub(crate) fn restore_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(key, value)| (Self::restore_key(key), Self::map_value(value, Self::restore_document)))
            .collect()
    }

    fn map_value(value: &Bson, map: fn(&Document) -> Document) -> Bson {
        match value {
            Bson::Document(document) => Bson::Document(map(document)),
            Bson::Array(items) => Bson::Array(items.iter().map(|item| Self::map_value(item, map)).collect()),
            _ => value.clone(),
        }
    }

    fn sanitize_key(input: &str) -> String {
        let mut sanitized = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter() {
            sanitized = sanitized.replace(*target, *replacement);
        }
        sanitized
    }

    fn restore_key(input: &str) -> String {
        let mut restored = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter().rev() {
            restored = restored.replace(*replacement, *target);
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn keys_are_escaped_and_values_kept() {
        let document = doc! {
            "metadata": { "owner.name": "a.b", "$cost": [{ "x.y": 1 }] },
            "id": "unit.1",
        };

        let sanitized = KeySanitizer::sanitize_document(&document);
        assert_eq!(
            sanitized,
            doc! {
                "metadata": { "owner__dot__name": "a.b", "__dollar__cost": [{ "x__dot__y": 1 }] },
                "id": "unit.1",
            }
        );
        assert_eq!(KeySanitizer::restore_document(&sanitized), document);
    }
}

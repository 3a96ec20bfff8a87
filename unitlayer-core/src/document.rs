//! Storage documents and the business/technical identifier split.
//!
//! Backends persist two kinds of documents:
//!
//! - [`UnitTypeDocument`]: a unit type with a technical id for itself and for every item.
//! - [`UnitDocument`]: a unit referencing its unit type by technical id, with its stored
//!   value map keyed by **item technical id**.
//!
//! Because stored records only ever mention technical ids, unit types and data items can
//! be renamed without rewriting a single unit. Translating between business keys (what
//! the [`RecordCodec`](crate::values::RecordCodec) works with) and technical keys happens
//! in [`UnitTypeDocument::to_technical_values`] and [`UnitTypeDocument::to_business_values`].

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    error::{UnitStoreError, UnitStoreResult},
    schema::{DataItem, Documentation, UnitType},
    values::StoredValues,
};

/// Field names of stored documents, as seen by queries and backends.
pub mod fields {
    pub const TECHNICAL_ID: &str = "technicalId";
    pub const ID: &str = "id";
    pub const UNIT_TYPE: &str = "unitTypeTechnicalId";
    pub const VALUES: &str = "values";
    pub const METADATA: &str = "metadata";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Implemented by every document a backend stores.
///
/// Every stored document has a technical id that never changes and a business id that
/// callers look it up by.
pub trait StoredDocument: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    fn technical_id(&self) -> &Uuid;

    fn business_id(&self) -> &str;

    /// Converts this document to BSON for storage.
    fn to_bson(&self) -> UnitStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    /// Restores a document from its stored BSON.
    fn from_bson(bson: Bson) -> UnitStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }
}

/// Timestamps are stored as canonical ISO strings, which sort chronologically.
pub(crate) mod iso_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use crate::kind::temporal::{format_iso, parse_iso};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_iso(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;

        parse_iso(&text).ok_or_else(|| D::Error::custom(format!("invalid timestamp \"{text}\"")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataItemDocument {
    pub technical_id: Uuid,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub documentation: Documentation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Map<String, Value>>,
}

impl DataItemDocument {
    fn from_item(item: &DataItem, technical_id: Uuid) -> Self {
        Self {
            technical_id,
            id: item.id().to_string(),
            kind: item.kind().to_string(),
            documentation: item.documentation().clone(),
            metadata: item.metadata().cloned(),
            status: item.status().cloned(),
        }
    }

    fn to_item(&self) -> DataItem {
        DataItem::from_parts(
            self.id.clone(),
            self.kind.clone(),
            self.documentation.clone(),
            self.metadata.clone(),
            self.status.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitTypeDocument {
    pub technical_id: Uuid,
    pub id: String,
    #[serde(default)]
    pub documentation: Documentation,
    pub items: Vec<DataItemDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(with = "iso_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl UnitTypeDocument {
    /// Builds the stored form of `unit_type`.
    ///
    /// When `previous` is the currently stored definition, its technical id, its
    /// `created_at` and the technical ids of items whose business id and kind are
    /// unchanged are kept. New items, and items whose kind changed, get fresh technical
    /// ids, so values stored under the old kind are left behind instead of misread.
    pub fn reconcile(
        unit_type: &UnitType,
        previous: Option<&UnitTypeDocument>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let items = unit_type
            .items()
            .iter()
            .map(|item| {
                let technical_id = previous
                    .and_then(|previous| previous.item(item.id()))
                    .filter(|existing| existing.kind == item.kind())
                    .map(|existing| existing.technical_id)
                    .unwrap_or_else(Uuid::new);

                DataItemDocument::from_item(item, technical_id)
            })
            .collect();

        Self {
            technical_id: previous
                .map(|previous| previous.technical_id)
                .unwrap_or_else(Uuid::new),
            id: unit_type.id().to_string(),
            documentation: unit_type.documentation().clone(),
            items,
            metadata: unit_type.metadata().cloned(),
            created_at: previous
                .map(|previous| previous.created_at)
                .unwrap_or_else(|| unit_type.created_at()),
            updated_at,
        }
    }

    /// Rebuilds and revalidates the business-facing unit type.
    pub fn to_unit_type(&self) -> UnitStoreResult<UnitType> {
        UnitType::from_parts(
            self.id.clone(),
            self.documentation.clone(),
            self.items.iter().map(DataItemDocument::to_item).collect(),
            self.metadata.clone(),
            self.created_at,
            self.updated_at,
        )
    }

    pub fn item(&self, business_id: &str) -> Option<&DataItemDocument> {
        self.items.iter().find(|item| item.id == business_id)
    }

    pub fn item_by_technical_id(&self, technical_id: &str) -> Option<&DataItemDocument> {
        self.items
            .iter()
            .find(|item| item.technical_id.to_string() == technical_id)
    }

    /// Stored key of the item with the given business id.
    pub fn technical_key(&self, business_id: &str) -> UnitStoreResult<String> {
        self.item(business_id)
            .map(|item| item.technical_id.to_string())
            .ok_or_else(|| UnitStoreError::unknown_item(business_id, &self.id))
    }

    /// Rekeys a business-keyed stored map by item technical id.
    pub fn to_technical_values(&self, values: StoredValues) -> UnitStoreResult<StoredValues> {
        values
            .into_iter()
            .map(|(key, value)| Ok::<_, UnitStoreError>((self.technical_key(&key)?, value)))
            .collect()
    }

    /// Rekeys a technical-keyed stored map by business id.
    ///
    /// Returns the business-keyed values and, separately, entries whose item is no
    /// longer declared so they can be carried over untouched.
    pub fn to_business_values(&self, stored: &StoredValues) -> (StoredValues, StoredValues) {
        let mut values = StoredValues::new();
        let mut orphans = StoredValues::new();

        for (key, value) in stored {
            match self.item_by_technical_id(key) {
                Some(item) => values.insert(item.id.clone(), value.clone()),
                None => orphans.insert(key.clone(), value.clone()),
            };
        }

        (values, orphans)
    }
}

impl StoredDocument for UnitTypeDocument {
    fn technical_id(&self) -> &Uuid {
        &self.technical_id
    }

    fn business_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDocument {
    pub technical_id: Uuid,
    pub id: String,
    pub unit_type_technical_id: Uuid,
    /// Encoded values keyed by item technical id.
    #[serde(default)]
    pub values: StoredValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(with = "iso_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument for UnitDocument {
    fn technical_id(&self) -> &Uuid {
        &self.technical_id
    }

    fn business_id(&self) -> &str {
        &self.id
    }
}

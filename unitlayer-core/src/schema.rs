//! Unit type definitions: the schema side of the mapping.
//!
//! A [`UnitType`] is an ordered list of [`DataItem`] declarations plus documentation and
//! metadata. Unit types are immutable once built. Every constructor enforces that item
//! identifiers are non-empty and unique, and "changing" a unit type means building a new
//! one (see [`UnitType::with_item_renamed`] and [`UnitType::with_id`]).
//!
//! # Example
//!
//! ```ignore
//! use unitlayer::schema::{DataItem, UnitType};
//! use unitlayer::kind;
//!
//! let project = UnitType::builder("project")
//!     .name("Project")
//!     .item(DataItem::new("name", kind::STRING).required())
//!     .item(DataItem::new("progress", kind::PERCENTAGE))
//!     .build()?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::{
    error::{UnitStoreError, UnitStoreResult},
    kind::temporal::now_millis,
};

/// Human readable text, either plain or keyed by locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedText {
    /// Text for `locale`, falling back to the plain variant.
    pub fn get(&self, locale: &str) -> Option<&str> {
        match self {
            LocalizedText::Plain(text) => Some(text),
            LocalizedText::Localized(texts) => texts.get(locale).map(String::as_str),
        }
    }
}

impl From<&str> for LocalizedText {
    fn from(text: &str) -> Self {
        LocalizedText::Plain(text.to_string())
    }
}

impl From<String> for LocalizedText {
    fn from(text: String) -> Self {
        LocalizedText::Plain(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<LocalizedText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<LocalizedText>,
}

/// Documentation attached to unit types and data items. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Documentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,
}

impl Documentation {
    pub fn named(name: impl Into<LocalizedText>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn validate(&self, owner: &str) -> UnitStoreResult<()> {
        if let Some(index) = self.links.iter().position(|link| link.url.trim().is_empty()) {
            return Err(UnitStoreError::Validation(format!(
                "{owner}: documentation link {index} has an empty url"
            )));
        }

        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(UnitStoreError::Validation(format!(
                "{owner}: documentation tags must not be empty"
            )));
        }

        Ok(())
    }
}

/// One typed field of a unit type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Documentation::is_empty")]
    documentation: Documentation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<Map<String, Value>>,
}

impl DataItem {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            documentation: Documentation::default(),
            metadata: None,
            status: None,
        }
    }

    /// Flags the item as required by setting `metadata.required`.
    pub fn required(mut self) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert("required".to_string(), Value::Bool(true));
        self
    }

    pub fn with_documentation(mut self, documentation: Documentation) -> Self {
        self.documentation = documentation;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_status(mut self, status: Map<String, Value>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the kind governing this item's values.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn documentation(&self) -> &Documentation {
        &self.documentation
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    pub fn status(&self) -> Option<&Map<String, Value>> {
        self.status.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub(crate) fn from_parts(
        id: String,
        kind: String,
        documentation: Documentation,
        metadata: Option<Map<String, Value>>,
        status: Option<Map<String, Value>>,
    ) -> Self {
        Self { id, kind, documentation, metadata, status }
    }

    pub(crate) fn renamed(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    fn validate(&self, unit_type: &str) -> UnitStoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(UnitStoreError::Validation(format!(
                "unit type \"{unit_type}\": data item id must not be empty"
            )));
        }

        // Query paths address items as `values.<item>.<sub-field>`.
        if self.id.contains('.') {
            return Err(UnitStoreError::Validation(format!(
                "unit type \"{unit_type}\": data item id \"{}\" must not contain '.'",
                self.id
            )));
        }

        if self.kind.trim().is_empty() {
            return Err(UnitStoreError::Validation(format!(
                "data item \"{}\": type must not be empty",
                self.id
            )));
        }

        self.documentation
            .validate(&format!("data item \"{}\"", self.id))
    }
}

/// A validated, immutable unit type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitType {
    id: String,
    documentation: Documentation,
    items: Vec<DataItem>,
    metadata: Option<Map<String, Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UnitType {
    pub fn builder(id: impl Into<String>) -> UnitTypeBuilder {
        UnitTypeBuilder::new(id)
    }

    pub(crate) fn from_parts(
        id: String,
        documentation: Documentation,
        items: Vec<DataItem>,
        metadata: Option<Map<String, Value>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> UnitStoreResult<Self> {
        if id.trim().is_empty() {
            return Err(UnitStoreError::Validation(
                "unit type id must not be empty".to_string(),
            ));
        }

        documentation.validate(&format!("unit type \"{id}\""))?;

        let mut seen = HashSet::with_capacity(items.len());

        for item in &items {
            item.validate(&id)?;

            if !seen.insert(item.id()) {
                return Err(UnitStoreError::DuplicateDataItem {
                    item: item.id().to_string(),
                    unit_type: id,
                });
            }
        }

        Ok(Self { id, documentation, items, metadata, created_at, updated_at })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn documentation(&self) -> &Documentation {
        &self.documentation
    }

    /// Data items in declaration order.
    pub fn items(&self) -> &[DataItem] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&DataItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns a copy of this unit type whose item `from` is called `to`.
    ///
    /// # Errors
    ///
    /// [`UnitStoreError::UnknownDataItem`] if `from` is not declared,
    /// [`UnitStoreError::DuplicateDataItem`] if `to` already is.
    pub fn with_item_renamed(&self, from: &str, to: &str) -> UnitStoreResult<Self> {
        if self.item(from).is_none() {
            return Err(UnitStoreError::unknown_item(from, &self.id));
        }

        let items = self
            .items
            .iter()
            .cloned()
            .map(|item| if item.id == from { item.renamed(to) } else { item })
            .collect();

        Self::from_parts(
            self.id.clone(),
            self.documentation.clone(),
            items,
            self.metadata.clone(),
            self.created_at,
            self.updated_at,
        )
    }

    /// Returns a copy of this unit type under a new business identifier.
    pub fn with_id(&self, id: impl Into<String>) -> UnitStoreResult<Self> {
        Self::from_parts(
            id.into(),
            self.documentation.clone(),
            self.items.clone(),
            self.metadata.clone(),
            self.created_at,
            self.updated_at,
        )
    }

    pub(crate) fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }
}

/// Builder for [`UnitType`]. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct UnitTypeBuilder {
    id: String,
    documentation: Documentation,
    items: Vec<DataItem>,
    metadata: Option<Map<String, Value>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl UnitTypeBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            documentation: Documentation::default(),
            items: Vec::new(),
            metadata: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn name(mut self, name: impl Into<LocalizedText>) -> Self {
        self.documentation.name = Some(name.into());
        self
    }

    pub fn documentation(mut self, documentation: Documentation) -> Self {
        self.documentation = documentation;
        self
    }

    pub fn item(mut self, item: DataItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(mut self, items: impl IntoIterator<Item = DataItem>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Validates and builds the unit type. Missing timestamps default to now, and a
    /// missing `updated_at` defaults to `created_at`.
    pub fn build(self) -> UnitStoreResult<UnitType> {
        let created_at = self.created_at.unwrap_or_else(now_millis);

        UnitType::from_parts(
            self.id,
            self.documentation,
            self.items,
            self.metadata,
            created_at,
            self.updated_at.unwrap_or(created_at),
        )
    }
}

//! Main unit store interface.
//!
//! [`UnitStore`] is what applications talk to. It owns a backend and a
//! [`RecordCodec`], and for every operation it:
//!
//! 1. resolves the unit type,
//! 2. validates and encodes business values with the codec,
//! 3. translates item business ids to technical ids,
//! 4. performs exactly one backend write (or one read).
//!
//! A failed validation therefore never leaves a partial write behind.
//!
//! # Example
//!
//! ```ignore
//! use unitlayer::prelude::*;
//!
//! let store = UnitStore::new(InMemoryUnitStore::builder().build().await?);
//!
//! store
//!     .define_unit_type(
//!         UnitType::builder("project")
//!             .item(DataItem::new("name", kind::STRING).required())
//!             .item(DataItem::new("progress", kind::PERCENTAGE))
//!             .build()?,
//!     )
//!     .await?;
//!
//! let unit = store
//!     .create_unit(NewUnit::new("project").value("name", "Apollo").value("progress", 42.5))
//!     .await?;
//! ```

use std::{collections::HashMap, sync::Arc};

use bson::Uuid;
use serde_json::Map;
use tracing::debug;

use crate::{
    backend::{DynUnitStoreBackend, UnitStoreBackend},
    binding::UnitBinding,
    document::{UnitDocument, UnitTypeDocument, fields},
    error::{UnitStoreError, UnitStoreResult},
    kind::temporal::now_millis,
    query::{Filter, Query, Sort, UnitQuery},
    registry::KindRegistry,
    schema::UnitType,
    unit::{NewUnit, Unit, UnitPatch},
    values::RecordCodec,
};

/// A unit store bound to a specific backend implementation.
#[derive(Debug)]
pub struct UnitStore<B: UnitStoreBackend> {
    backend: B,
    codec: RecordCodec,
}

/// A unit store over a boxed backend, for runtime backend selection.
pub type DynUnitStore = UnitStore<Box<dyn DynUnitStoreBackend>>;

impl<B: UnitStoreBackend> UnitStore<B> {
    /// Creates a store with its own registry seeded with the built-in kinds.
    pub fn new(backend: B) -> Self {
        Self::with_registry(backend, Arc::new(KindRegistry::new()))
    }

    /// Creates a store sharing `registry`, so custom kinds registered there are visible.
    pub fn with_registry(backend: B, registry: Arc<KindRegistry>) -> Self {
        Self {
            backend,
            codec: RecordCodec::new(registry),
        }
    }

    pub fn registry(&self) -> &Arc<KindRegistry> {
        self.codec.registry()
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Creates or redefines a unit type.
    ///
    /// Redefining keeps the unit type's technical id and creation time, as well as the
    /// technical ids of items whose business id did not change, so existing units stay
    /// readable.
    ///
    /// # Errors
    ///
    /// [`UnitStoreError::UnknownKind`] when an item refers to an unregistered kind.
    pub async fn define_unit_type(&self, unit_type: UnitType) -> UnitStoreResult<UnitType> {
        for item in unit_type.items() {
            self.registry().require(item.kind())?;
        }

        let previous = self.backend.find_unit_type_by_id(unit_type.id()).await?;
        let document = UnitTypeDocument::reconcile(&unit_type, previous.as_ref(), now_millis());

        self.backend.upsert_unit_type(document.clone()).await?;

        debug!(
            unit_type = %document.id,
            technical_id = %document.technical_id,
            items = document.items.len(),
            redefined = previous.is_some(),
            "defined unit type"
        );

        document.to_unit_type()
    }

    /// Looks up a unit type by business id.
    pub async fn unit_type(&self, id: &str) -> UnitStoreResult<Option<UnitType>> {
        self.backend
            .find_unit_type_by_id(id)
            .await?
            .map(|document| document.to_unit_type())
            .transpose()
    }

    /// Renames a data item. Stored units are untouched since they key values by
    /// technical id.
    ///
    /// # Errors
    ///
    /// - [`UnitStoreError::UnitTypeNotFound`] if the unit type does not exist
    /// - [`UnitStoreError::UnknownDataItem`] if `from` is not declared
    /// - [`UnitStoreError::DuplicateDataItem`] if `to` is already declared
    pub async fn rename_data_item(
        &self,
        unit_type_id: &str,
        from: &str,
        to: &str,
    ) -> UnitStoreResult<UnitType> {
        let mut document = self.require_unit_type_document(unit_type_id).await?;
        document.to_unit_type()?.with_item_renamed(from, to)?;

        for item in document.items.iter_mut().filter(|item| item.id == from) {
            item.id = to.to_string();
        }
        document.updated_at = now_millis();

        self.backend.upsert_unit_type(document.clone()).await?;

        debug!(unit_type = %unit_type_id, from, to, "renamed data item");

        document.to_unit_type()
    }

    /// Gives a unit type a new business id. Its units follow along.
    ///
    /// # Errors
    ///
    /// - [`UnitStoreError::UnitTypeNotFound`] if `from` does not exist
    /// - [`UnitStoreError::Validation`] if `to` is empty or already taken
    pub async fn rename_unit_type(&self, from: &str, to: &str) -> UnitStoreResult<UnitType> {
        let mut document = self.require_unit_type_document(from).await?;
        document.to_unit_type()?.with_id(to)?;

        if from != to && self.backend.find_unit_type_by_id(to).await?.is_some() {
            return Err(UnitStoreError::Validation(format!(
                "Unit type \"{to}\" already exists"
            )));
        }

        document.id = to.to_string();
        document.updated_at = now_millis();

        self.backend.upsert_unit_type(document.clone()).await?;

        debug!(from, to, "renamed unit type");

        document.to_unit_type()
    }

    /// Creates a unit from sparse business values.
    ///
    /// A business id is generated when the input has none. Required items are not
    /// enforced here; see [`deserialize_unit`](crate::contract::deserialize_unit).
    ///
    /// # Errors
    ///
    /// - [`UnitStoreError::UnitTypeNotFound`] if the unit type does not exist
    /// - [`UnitStoreError::UnknownDataItem`] / [`UnitStoreError::InvalidValue`] for bad values
    /// - [`UnitStoreError::UnitAlreadyExists`] if the business id is taken
    pub async fn create_unit(&self, new_unit: NewUnit) -> UnitStoreResult<Unit> {
        let type_document = self.require_unit_type_document(&new_unit.unit_type_id).await?;
        let unit_type = type_document.to_unit_type()?;

        let id = match new_unit.id {
            Some(id) if id.trim().is_empty() => {
                return Err(UnitStoreError::Validation(
                    "Unit id must not be empty".to_string(),
                ));
            }
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };

        let stored = self.codec.encode_values(&unit_type, &new_unit.values, None)?;
        let values = self.codec.decode_values(&unit_type, &stored)?;
        let now = now_millis();

        let document = UnitDocument {
            technical_id: Uuid::new(),
            id,
            unit_type_technical_id: type_document.technical_id,
            values: type_document.to_technical_values(stored)?,
            metadata: new_unit.metadata,
            created_at: now,
            updated_at: now,
        };

        self.backend.insert_unit(document.clone()).await?;

        debug!(
            unit = %document.id,
            unit_type = %type_document.id,
            values = document.values.len(),
            "created unit"
        );

        Ok(Unit {
            id: document.id,
            unit_type_id: type_document.id,
            values,
            metadata: document.metadata,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }

    /// Applies a partial update to a unit.
    ///
    /// Items missing from the patch keep their stored value, nulls remove a value and
    /// metadata is merged key by key. Stored values of items that were removed from the
    /// unit type are carried over untouched.
    ///
    /// # Errors
    ///
    /// - [`UnitStoreError::UnitNotFound`] if the unit does not exist
    /// - [`UnitStoreError::UnknownDataItem`] / [`UnitStoreError::InvalidValue`] for bad values
    pub async fn update_unit(&self, id: &str, patch: UnitPatch) -> UnitStoreResult<Unit> {
        let mut document = self
            .backend
            .find_unit_by_id(id)
            .await?
            .ok_or_else(|| UnitStoreError::UnitNotFound(id.to_string()))?;
        let type_document = self
            .require_unit_type_by_technical_id(&document.unit_type_technical_id)
            .await?;
        let unit_type = type_document.to_unit_type()?;

        let (baseline, orphans) = type_document.to_business_values(&document.values);
        let stored = self
            .codec
            .encode_values(&unit_type, &patch.values, Some(&baseline))?;
        let values = self.codec.decode_values(&unit_type, &stored)?;

        let mut technical = type_document.to_technical_values(stored)?;
        technical.extend(orphans);
        document.values = technical;

        if let Some(metadata) = patch.metadata {
            document.metadata.get_or_insert_with(Map::new).extend(metadata);
        }
        document.updated_at = now_millis();

        self.backend.replace_unit(document.clone()).await?;

        debug!(unit = %document.id, unit_type = %type_document.id, "updated unit");

        Ok(Unit {
            id: document.id,
            unit_type_id: type_document.id,
            values,
            metadata: document.metadata,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }

    /// Looks up a unit by business id.
    pub async fn unit(&self, id: &str) -> UnitStoreResult<Option<Unit>> {
        match self.backend.find_unit_by_id(id).await? {
            Some(document) => self.to_unit(document).await.map(Some),
            None => Ok(None),
        }
    }

    /// Looks up a unit by technical id.
    pub async fn unit_by_technical_id(&self, technical_id: &Uuid) -> UnitStoreResult<Option<Unit>> {
        match self.backend.find_unit_by_technical_id(technical_id).await? {
            Some(document) => self.to_unit(document).await.map(Some),
            None => Ok(None),
        }
    }

    /// Lists units.
    ///
    /// Filters and sort keys on `values.<item>` are only accepted when the query names a
    /// unit type, since item ids are resolved against it.
    ///
    /// # Errors
    ///
    /// - [`UnitStoreError::UnitTypeNotFound`] if the named unit type does not exist
    /// - [`UnitStoreError::UnknownDataItem`] if a path names an undeclared item
    /// - [`UnitStoreError::Validation`] for a `values` path without a unit type
    pub async fn list_units(&self, query: UnitQuery) -> UnitStoreResult<Vec<Unit>> {
        let scope = match &query.unit_type {
            Some(id) => Some(self.require_unit_type_document(id).await?),
            None => None,
        };
        let backend_query = stored_query(query.query, scope.as_ref())?;

        let documents = self.backend.list_units(backend_query).await?;

        let mut unit_types: HashMap<String, (UnitTypeDocument, UnitType)> = HashMap::new();
        if let Some(document) = scope {
            let unit_type = document.to_unit_type()?;
            unit_types.insert(document.technical_id.to_string(), (document, unit_type));
        }

        let mut units = Vec::with_capacity(documents.len());
        for document in documents {
            let key = document.unit_type_technical_id.to_string();
            if !unit_types.contains_key(&key) {
                let type_document = self
                    .require_unit_type_by_technical_id(&document.unit_type_technical_id)
                    .await?;
                let unit_type = type_document.to_unit_type()?;
                unit_types.insert(key.clone(), (type_document, unit_type));
            }

            if let Some((type_document, unit_type)) = unit_types.get(&key) {
                units.push(self.decode_unit(document, type_document, unit_type)?);
            }
        }

        Ok(units)
    }

    /// Stores a bound value, creating the unit or updating it when it already exists.
    pub async fn save_bound<T: UnitBinding>(&self, value: &T) -> UnitStoreResult<Unit> {
        let values = value.to_values()?;

        if let Some(id) = value.unit_id() {
            if self.backend.find_unit_by_id(id).await?.is_some() {
                return self.update_unit(id, UnitPatch::new().values(values)).await;
            }
        }

        let mut new_unit = NewUnit::new(T::unit_type_id()).values(values);
        new_unit.id = value.unit_id().map(str::to_string);

        self.create_unit(new_unit).await
    }

    /// Loads a unit into its bound type.
    ///
    /// # Errors
    ///
    /// [`UnitStoreError::UnitTypeMismatch`] if the unit belongs to another unit type.
    pub async fn load_bound<T: UnitBinding>(&self, id: &str) -> UnitStoreResult<Option<T>> {
        match self.unit(id).await? {
            Some(unit) if unit.unit_type_id != T::unit_type_id() => {
                Err(UnitStoreError::UnitTypeMismatch {
                    expected: T::unit_type_id().to_string(),
                    actual: unit.unit_type_id,
                })
            }
            Some(unit) => T::from_unit(&unit).map(Some),
            None => Ok(None),
        }
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> UnitStoreResult<()> {
        self.backend.shutdown().await
    }

    async fn require_unit_type_document(&self, id: &str) -> UnitStoreResult<UnitTypeDocument> {
        self.backend
            .find_unit_type_by_id(id)
            .await?
            .ok_or_else(|| UnitStoreError::UnitTypeNotFound(id.to_string()))
    }

    async fn require_unit_type_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<UnitTypeDocument> {
        self.backend
            .find_unit_type_by_technical_id(technical_id)
            .await?
            .ok_or_else(|| UnitStoreError::UnitTypeNotFound(technical_id.to_string()))
    }

    async fn to_unit(&self, document: UnitDocument) -> UnitStoreResult<Unit> {
        let type_document = self
            .require_unit_type_by_technical_id(&document.unit_type_technical_id)
            .await?;
        let unit_type = type_document.to_unit_type()?;

        self.decode_unit(document, &type_document, &unit_type)
    }

    fn decode_unit(
        &self,
        document: UnitDocument,
        type_document: &UnitTypeDocument,
        unit_type: &UnitType,
    ) -> UnitStoreResult<Unit> {
        let (business, _) = type_document.to_business_values(&document.values);

        Ok(Unit {
            id: document.id,
            unit_type_id: type_document.id.clone(),
            values: self.codec.decode_values(unit_type, &business)?,
            metadata: document.metadata,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }
}

impl<B: UnitStoreBackend + 'static> UnitStore<B> {
    /// Erases the backend type.
    pub fn into_dyn(self) -> DynUnitStore {
        UnitStore {
            backend: Box::new(self.backend),
            codec: self.codec,
        }
    }
}

impl DynUnitStore {
    /// Borrows the concrete backend, if it is a `B`.
    pub fn backend_as<B: UnitStoreBackend + 'static>(&self) -> Option<&B> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::as_any(&*self.backend).downcast_ref::<B>()
    }

    /// Recovers a typed store, if the backend is a `B`.
    pub fn into_static<B: UnitStoreBackend + 'static>(self) -> Option<UnitStore<B>> {
        let codec = self.codec;

        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::into_any(self.backend)
            .downcast::<B>()
            .ok()
            .map(|backend| UnitStore { backend: *backend, codec })
    }
}

/// Rewrites a caller query into stored field paths and scopes it to `unit_type`.
fn stored_query(query: Query, unit_type: Option<&UnitTypeDocument>) -> UnitStoreResult<Query> {
    let mut map = |field: &str| stored_path(field, unit_type);

    let filter = query
        .filter
        .map(|filter| filter.try_map_fields(&mut map))
        .transpose()?;
    let sort = query
        .sort
        .into_iter()
        .map(|sort| {
            Ok(Sort {
                field: stored_path(&sort.field, unit_type)?,
                direction: sort.direction,
            })
        })
        .collect::<UnitStoreResult<Vec<_>>>()?;

    let filter = match (unit_type, filter) {
        (Some(document), Some(filter)) => {
            Some(Filter::eq(fields::UNIT_TYPE, document.technical_id).and(filter))
        }
        (Some(document), None) => Some(Filter::eq(fields::UNIT_TYPE, document.technical_id)),
        (None, filter) => filter,
    };

    Ok(Query { filter, sort, ..query })
}

fn stored_path(field: &str, unit_type: Option<&UnitTypeDocument>) -> UnitStoreResult<String> {
    let Some(rest) = field.strip_prefix("values.") else {
        if field == fields::VALUES {
            return Err(UnitStoreError::Validation(
                "Queries must name a data item under \"values\"".to_string(),
            ));
        }
        return Ok(field.to_string());
    };

    let unit_type = unit_type.ok_or_else(|| {
        UnitStoreError::Validation(format!(
            "Querying \"{field}\" requires a unit type"
        ))
    })?;

    let (item, tail) = match rest.split_once('.') {
        Some((item, tail)) => (item, Some(tail)),
        None => (rest, None),
    };
    let key = unit_type.technical_key(item)?;

    Ok(match tail {
        Some(tail) => format!("values.{key}.{tail}"),
        None => format!("values.{key}"),
    })
}

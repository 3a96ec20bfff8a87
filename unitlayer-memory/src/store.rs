//! In-memory storage implementation for unit stores.
//!
//! Unit types and units are kept as BSON documents, in exactly the shape the MongoDB
//! backend persists, so queries evaluate against the same field paths.

use async_trait::async_trait;
use bson::{Bson, Document, Uuid};
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use tracing::trace;

use unitlayer_core::{
    backend::{UnitStoreBackend, UnitStoreBackendBuilder},
    document::{StoredDocument, UnitDocument, UnitTypeDocument, fields},
    error::{UnitStoreError, UnitStoreResult},
    query::{Query, SortDirection},
};

use crate::evaluator::{Comparable, CompiledPatterns, DocumentEvaluator, lookup};

/// Technical id -> stored document.
type DocumentMap = HashMap<String, Document>;

#[derive(Debug, Default)]
struct Collections {
    unit_types: DocumentMap,
    units: DocumentMap,
}

/// Thread-safe in-memory unit storage backend.
///
/// `InMemoryUnitStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be shared across async tasks. Clones share the same underlying data.
///
/// Queries scan every stored unit; there is no indexing.
///
/// # Example
///
/// ```ignore
/// use unitlayer::{UnitStore, memory::InMemoryUnitStore};
///
/// let store = UnitStore::new(InMemoryUnitStore::builder().build().await?);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryUnitStore {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryUnitStore {
    /// Creates a new empty in-memory unit store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryUnitStoreBuilder {
        InMemoryUnitStoreBuilder::default()
    }
}

fn to_document<D: StoredDocument>(document: &D) -> UnitStoreResult<Document> {
    match document.to_bson()? {
        Bson::Document(stored) => Ok(stored),
        other => Err(UnitStoreError::Serialization(format!(
            "expected a document, got {other}"
        ))),
    }
}

fn from_document<D: StoredDocument>(document: &Document) -> UnitStoreResult<D> {
    D::from_bson(Bson::Document(document.clone()))
}

fn find_by_business_id<'a>(documents: &'a DocumentMap, id: &str) -> Option<&'a Document> {
    documents
        .values()
        .find(|document| document.get_str(fields::ID).is_ok_and(|stored| stored == id))
}

fn matches_search(document: &Document, term: &str) -> bool {
    document
        .get_str(fields::ID)
        .is_ok_and(|id| id.to_lowercase().contains(term))
}

fn compare_field(left: &Document, right: &Document, field: &str) -> Ordering {
    let left = lookup(left, field).map(Comparable::from).unwrap_or(Comparable::Null);
    let right = lookup(right, field).map(Comparable::from).unwrap_or(Comparable::Null);

    left.sort_cmp(&right)
}

#[async_trait]
impl UnitStoreBackend for InMemoryUnitStore {
    async fn upsert_unit_type(&self, document: UnitTypeDocument) -> UnitStoreResult<()> {
        let key = document.technical_id.to_string();
        let stored = to_document(&document)?;
        let mut collections = self.collections.write().await;

        if find_by_business_id(&collections.unit_types, &document.id).is_some_and(|existing| {
            existing.get(fields::TECHNICAL_ID) != Some(&Bson::from(document.technical_id))
        }) {
            return Err(UnitStoreError::Validation(format!(
                "Unit type \"{}\" already exists",
                document.id
            )));
        }

        collections.unit_types.insert(key, stored);

        Ok(())
    }

    async fn find_unit_type_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitTypeDocument>> {
        let collections = self.collections.read().await;

        find_by_business_id(&collections.unit_types, id)
            .map(from_document)
            .transpose()
    }

    async fn find_unit_type_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitTypeDocument>> {
        let collections = self.collections.read().await;

        collections
            .unit_types
            .get(&technical_id.to_string())
            .map(from_document)
            .transpose()
    }

    async fn insert_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        let key = document.technical_id.to_string();
        let stored = to_document(&document)?;
        let mut collections = self.collections.write().await;

        if collections.units.contains_key(&key)
            || find_by_business_id(&collections.units, &document.id).is_some()
        {
            return Err(UnitStoreError::UnitAlreadyExists(document.id));
        }

        collections.units.insert(key, stored);

        Ok(())
    }

    async fn replace_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        let key = document.technical_id.to_string();
        let stored = to_document(&document)?;
        let mut collections = self.collections.write().await;

        match collections.units.get_mut(&key) {
            Some(slot) => {
                *slot = stored;
                Ok(())
            }
            None => Err(UnitStoreError::UnitNotFound(document.id)),
        }
    }

    async fn find_unit_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitDocument>> {
        let collections = self.collections.read().await;

        find_by_business_id(&collections.units, id)
            .map(from_document)
            .transpose()
    }

    async fn find_unit_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitDocument>> {
        let collections = self.collections.read().await;

        collections
            .units
            .get(&technical_id.to_string())
            .map(from_document)
            .transpose()
    }

    async fn list_units(&self, query: Query) -> UnitStoreResult<Vec<UnitDocument>> {
        let patterns = query
            .filter
            .as_ref()
            .map(CompiledPatterns::compile)
            .transpose()?
            .unwrap_or_default();
        let collections = self.collections.read().await;
        let search = query.search_term();

        let mut matched = Vec::new();
        for document in collections.units.values() {
            if let Some(term) = &search {
                if !matches_search(document, term) {
                    continue;
                }
            }

            if let Some(filter) = &query.filter {
                if !DocumentEvaluator::new(document, &patterns).evaluate(filter)? {
                    continue;
                }
            }

            matched.push(document);
        }

        matched.sort_by(|left, right| {
            query
                .sort
                .iter()
                .map(|sort| {
                    let ordering = compare_field(left, right, &sort.field);

                    match sort.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| compare_field(left, right, fields::ID))
        });

        trace!(matched = matched.len(), "evaluated unit query");

        matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(from_document)
            .collect()
    }
}

/// Builder for constructing [`InMemoryUnitStore`] instances.
#[derive(Default)]
pub struct InMemoryUnitStoreBuilder;

#[async_trait]
impl UnitStoreBackendBuilder for InMemoryUnitStoreBuilder {
    type Backend = InMemoryUnitStore;

    async fn build(self) -> UnitStoreResult<Self::Backend> {
        Ok(InMemoryUnitStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use unitlayer_core::query::Filter;

    fn unit(id: &str, unit_type: Uuid, rank: i64) -> UnitDocument {
        let mut values = Document::new();
        values.insert("rank", rank);

        UnitDocument {
            technical_id: Uuid::new(),
            id: id.to_string(),
            unit_type_technical_id: unit_type,
            values,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_business_ids() {
        let store = InMemoryUnitStore::new();
        let unit_type = Uuid::new();

        store.insert_unit(unit("a", unit_type, 1)).await.unwrap();

        let result = store.insert_unit(unit("a", unit_type, 2)).await;
        assert!(matches!(result, Err(UnitStoreError::UnitAlreadyExists(id)) if id == "a"));
    }

    #[tokio::test]
    async fn replace_requires_existing_unit() {
        let store = InMemoryUnitStore::new();

        let result = store.replace_unit(unit("a", Uuid::new(), 1)).await;
        assert!(matches!(result, Err(UnitStoreError::UnitNotFound(_))));
    }

    #[tokio::test]
    async fn list_filters_sorts_and_pages() {
        let store = InMemoryUnitStore::builder().build().await.unwrap();
        let unit_type = Uuid::new();
        let other = Uuid::new();

        store.insert_unit(unit("Apollo-2", unit_type, 2)).await.unwrap();
        store.insert_unit(unit("apollo-1", unit_type, 1)).await.unwrap();
        store.insert_unit(unit("gemini", unit_type, 3)).await.unwrap();
        store.insert_unit(unit("apollo-x", other, 9)).await.unwrap();

        let query = Query::builder()
            .filter(Filter::eq(fields::UNIT_TYPE, unit_type))
            .search("APOLLO")
            .sort("values.rank", SortDirection::Desc)
            .build();
        let ids: Vec<_> = store
            .list_units(query)
            .await
            .unwrap()
            .into_iter()
            .map(|unit| unit.id)
            .collect();
        assert_eq!(ids, vec!["Apollo-2", "apollo-1"]);

        let page = Query::builder().offset(1).limit(2).build();
        let ids: Vec<_> = store
            .list_units(page)
            .await
            .unwrap()
            .into_iter()
            .map(|unit| unit.id)
            .collect();
        assert_eq!(ids, vec!["apollo-1", "apollo-x"]);
    }
}

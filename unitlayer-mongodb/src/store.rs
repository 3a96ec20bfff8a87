use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
};
use tracing::debug;

use unitlayer_core::{
    backend::{UnitStoreBackend, UnitStoreBackendBuilder},
    document::{StoredDocument, UnitDocument, UnitTypeDocument, fields},
    error::{UnitStoreError, UnitStoreResult},
    query::Query,
};

use crate::{query::MongoQueryTranslator, sanitizer::KeySanitizer};

pub const DEFAULT_UNIT_TYPES_COLLECTION: &str = "unit_types";
pub const DEFAULT_UNITS_COLLECTION: &str = "units";

const DUPLICATE_KEY: i32 = 11000;

fn backend_error(err: MongoError) -> UnitStoreError {
    UnitStoreError::Backend(err.to_string())
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY
    )
}

/// MongoDB unit storage backend.
///
/// Unit types and units live in two collections. Each stored document uses its
/// technical id as `_id`; business ids carry a unique index.
#[derive(Debug)]
pub struct MongoUnitStore {
    client: Client,
    database: String,
    unit_types: String,
    units: String,
}

impl MongoUnitStore {
    pub fn new(client: Client, database: String) -> Self {
        Self {
            client,
            database,
            unit_types: DEFAULT_UNIT_TYPES_COLLECTION.to_string(),
            units: DEFAULT_UNITS_COLLECTION.to_string(),
        }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoUnitStoreBuilder {
        MongoUnitStoreBuilder::new(dsn, database)
    }

    fn unit_types(&self) -> MongoCollection<Document> {
        self.client.database(&self.database).collection(&self.unit_types)
    }

    fn units(&self) -> MongoCollection<Document> {
        self.client.database(&self.database).collection(&self.units)
    }

    /// Creates the business id and unit type indexes.
    pub async fn ensure_indexes(&self) -> UnitStoreResult<()> {
        let index = |field: &str, unique: bool| {
            IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(IndexOptions::builder().unique(unique).build())
                .build()
        };

        self.unit_types()
            .create_index(index(fields::ID, true))
            .await
            .map_err(backend_error)?;
        self.units()
            .create_index(index(fields::ID, true))
            .await
            .map_err(backend_error)?;
        self.units()
            .create_index(index(fields::UNIT_TYPE, false))
            .await
            .map_err(backend_error)?;

        debug!(database = %self.database, "ensured unit store indexes");

        Ok(())
    }

    fn prepare_document<D: StoredDocument>(&self, document: &D) -> UnitStoreResult<Document> {
        let Bson::Document(stored) = document.to_bson()? else {
            return Err(UnitStoreError::Serialization("Expected document".to_string()));
        };

        let mut prepared = KeySanitizer::sanitize_document(&stored);
        prepared.insert("_id", *document.technical_id());

        Ok(prepared)
    }

    fn restore_document<D: StoredDocument>(&self, mut document: Document) -> UnitStoreResult<D> {
        document.remove("_id");

        D::from_bson(Bson::Document(KeySanitizer::restore_document(&document)))
    }

    async fn find_one<D: StoredDocument>(
        &self,
        collection: MongoCollection<Document>,
        filter: Document,
    ) -> UnitStoreResult<Option<D>> {
        collection
            .find_one(filter)
            .await
            .map_err(backend_error)?
            .map(|document| self.restore_document(document))
            .transpose()
    }
}

#[async_trait]
impl UnitStoreBackend for MongoUnitStore {
    async fn upsert_unit_type(&self, document: UnitTypeDocument) -> UnitStoreResult<()> {
        self.unit_types()
            .replace_one(doc! { "_id": document.technical_id }, self.prepare_document(&document)?)
            .upsert(true)
            .await
            .map_err(|err| {
                if is_duplicate_key(&err) {
                    UnitStoreError::Validation(format!("Unit type \"{}\" already exists", document.id))
                } else {
                    backend_error(err)
                }
            })?;

        Ok(())
    }

    async fn find_unit_type_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitTypeDocument>> {
        self.find_one(self.unit_types(), doc! { "id": id }).await
    }

    async fn find_unit_type_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitTypeDocument>> {
        self.find_one(self.unit_types(), doc! { "_id": *technical_id }).await
    }

    async fn insert_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        self.units()
            .insert_one(self.prepare_document(&document)?)
            .await
            .map_err(|err| {
                if is_duplicate_key(&err) {
                    UnitStoreError::UnitAlreadyExists(document.id.clone())
                } else {
                    backend_error(err)
                }
            })?;

        Ok(())
    }

    async fn replace_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        let result = self
            .units()
            .replace_one(doc! { "_id": document.technical_id }, self.prepare_document(&document)?)
            .await
            .map_err(backend_error)?;

        if result.matched_count == 0 {
            return Err(UnitStoreError::UnitNotFound(document.id));
        }

        Ok(())
    }

    async fn find_unit_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitDocument>> {
        self.find_one(self.units(), doc! { "id": id }).await
    }

    async fn find_unit_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitDocument>> {
        self.find_one(self.units(), doc! { "_id": *technical_id }).await
    }

    async fn list_units(&self, query: Query) -> UnitStoreResult<Vec<UnitDocument>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        options.sort = Some(MongoQueryTranslator::sort(&query));

        self.units()
            .find(MongoQueryTranslator::filter(&query)?)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .map(|document| self.restore_document(document))
            .collect()
    }

    async fn shutdown(self) -> UnitStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoUnitStoreBuilder {
    dsn: String,
    database: String,
    unit_types: String,
    units: String,
    create_indexes: bool,
}

impl MongoUnitStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            unit_types: DEFAULT_UNIT_TYPES_COLLECTION.to_string(),
            units: DEFAULT_UNITS_COLLECTION.to_string(),
            create_indexes: true,
        }
    }

    /// Overrides the collection names.
    pub fn with_collection_names(mut self, unit_types: &str, units: &str) -> Self {
        self.unit_types = unit_types.to_string();
        self.units = units.to_string();
        self
    }

    /// Whether `build` creates indexes. Enabled by default.
    pub fn with_indexes(mut self, create_indexes: bool) -> Self {
        self.create_indexes = create_indexes;
        self
    }
}

#[async_trait]
impl UnitStoreBackendBuilder for MongoUnitStoreBuilder {
    type Backend = MongoUnitStore;

    async fn build(self) -> UnitStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| UnitStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| UnitStoreError::Initialization(e.to_string()))?;

        let store = MongoUnitStore {
            client,
            database: self.database,
            unit_types: self.unit_types,
            units: self.units,
        };

        if self.create_indexes {
            store.ensure_indexes().await?;
        }

        debug!(
            database = %store.database,
            unit_types = %store.unit_types,
            units = %store.units,
            "connected mongodb unit store"
        );

        Ok(store)
    }
}

//! Storage backend abstraction for unit types and units.
//!
//! Backends only ever see storage documents ([`UnitTypeDocument`], [`UnitDocument`]) and
//! backend-level [`Query`] values. Schema checks, value encoding and the translation from
//! business to technical identifiers all happen in [`UnitStore`](crate::store::UnitStore)
//! before a backend is called.
//!
//! # Traits
//!
//! - [`UnitStoreBackend`]: The core trait for storage backends
//! - [`DynUnitStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`UnitStoreBackendBuilder`]: Factory trait for creating backend instances

use async_trait::async_trait;
use bson::Uuid;
use std::{any::Any, fmt::Debug};

use crate::{
    document::{UnitDocument, UnitTypeDocument},
    error::UnitStoreResult,
    query::Query,
};

/// Abstract interface for unit storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Every write touches a single document, so backends only need per-document
/// atomicity.
///
/// # Lookups
///
/// `find_*` methods return `Ok(None)` for a missing document. Only writes that require an
/// existing (or absent) target return not-found or already-exists errors.
#[async_trait]
pub trait UnitStoreBackend: Send + Sync + Debug {
    /// Inserts a unit type or replaces the stored one with the same technical id.
    async fn upsert_unit_type(&self, document: UnitTypeDocument) -> UnitStoreResult<()>;

    /// Looks up a unit type by business id.
    async fn find_unit_type_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitTypeDocument>>;

    /// Looks up a unit type by technical id.
    async fn find_unit_type_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitTypeDocument>>;

    /// Inserts a new unit.
    ///
    /// Returns [`UnitAlreadyExists`](crate::error::UnitStoreError::UnitAlreadyExists) when a
    /// unit with the same technical id or business id is already stored.
    async fn insert_unit(&self, document: UnitDocument) -> UnitStoreResult<()>;

    /// Replaces a stored unit, matched by technical id.
    ///
    /// Returns [`UnitNotFound`](crate::error::UnitStoreError::UnitNotFound) when no such unit
    /// is stored.
    async fn replace_unit(&self, document: UnitDocument) -> UnitStoreResult<()>;

    /// Looks up a unit by business id.
    async fn find_unit_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitDocument>>;

    /// Looks up a unit by technical id.
    async fn find_unit_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitDocument>>;

    /// Lists units matching `query`.
    ///
    /// Field paths in the query refer to stored documents (`values.<item technical id>`).
    /// Results are ordered by the query's sort keys, then by business id.
    async fn list_units(&self, query: Query) -> UnitStoreResult<Vec<UnitDocument>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> UnitStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> UnitStoreBackend for &B
where
    B: UnitStoreBackend,
{
    async fn upsert_unit_type(&self, document: UnitTypeDocument) -> UnitStoreResult<()> {
        <B as UnitStoreBackend>::upsert_unit_type(*self, document).await
    }

    async fn find_unit_type_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitTypeDocument>> {
        <B as UnitStoreBackend>::find_unit_type_by_id(*self, id).await
    }

    async fn find_unit_type_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitTypeDocument>> {
        <B as UnitStoreBackend>::find_unit_type_by_technical_id(*self, technical_id).await
    }

    async fn insert_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        <B as UnitStoreBackend>::insert_unit(*self, document).await
    }

    async fn replace_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        <B as UnitStoreBackend>::replace_unit(*self, document).await
    }

    async fn find_unit_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitDocument>> {
        <B as UnitStoreBackend>::find_unit_by_id(*self, id).await
    }

    async fn find_unit_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitDocument>> {
        <B as UnitStoreBackend>::find_unit_by_technical_id(*self, technical_id).await
    }

    async fn list_units(&self, query: Query) -> UnitStoreResult<Vec<UnitDocument>> {
        <B as UnitStoreBackend>::list_units(*self, query).await
    }
}

/// Object-safe counterpart of [`UnitStoreBackend`], implemented for every backend.
#[async_trait]
pub trait DynUnitStoreBackend: Send + Sync + Debug {
    async fn upsert_unit_type(&self, document: UnitTypeDocument) -> UnitStoreResult<()>;
    async fn find_unit_type_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitTypeDocument>>;
    async fn find_unit_type_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitTypeDocument>>;
    async fn insert_unit(&self, document: UnitDocument) -> UnitStoreResult<()>;
    async fn replace_unit(&self, document: UnitDocument) -> UnitStoreResult<()>;
    async fn find_unit_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitDocument>>;
    async fn find_unit_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitDocument>>;
    async fn list_units(&self, query: Query) -> UnitStoreResult<Vec<UnitDocument>>;
    async fn shutdown_boxed(self: Box<Self>) -> UnitStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: UnitStoreBackend + 'static> DynUnitStoreBackend for B {
    async fn upsert_unit_type(&self, document: UnitTypeDocument) -> UnitStoreResult<()> {
        <B as UnitStoreBackend>::upsert_unit_type(self, document).await
    }

    async fn find_unit_type_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitTypeDocument>> {
        <B as UnitStoreBackend>::find_unit_type_by_id(self, id).await
    }

    async fn find_unit_type_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitTypeDocument>> {
        <B as UnitStoreBackend>::find_unit_type_by_technical_id(self, technical_id).await
    }

    async fn insert_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        <B as UnitStoreBackend>::insert_unit(self, document).await
    }

    async fn replace_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        <B as UnitStoreBackend>::replace_unit(self, document).await
    }

    async fn find_unit_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitDocument>> {
        <B as UnitStoreBackend>::find_unit_by_id(self, id).await
    }

    async fn find_unit_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitDocument>> {
        <B as UnitStoreBackend>::find_unit_by_technical_id(self, technical_id).await
    }

    async fn list_units(&self, query: Query) -> UnitStoreResult<Vec<UnitDocument>> {
        <B as UnitStoreBackend>::list_units(self, query).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> UnitStoreResult<()> {
        <B as UnitStoreBackend>::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
impl UnitStoreBackend for Box<dyn DynUnitStoreBackend> {
    async fn upsert_unit_type(&self, document: UnitTypeDocument) -> UnitStoreResult<()> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::upsert_unit_type(&**self, document).await
    }

    async fn find_unit_type_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitTypeDocument>> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::find_unit_type_by_id(&**self, id).await
    }

    async fn find_unit_type_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitTypeDocument>> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::find_unit_type_by_technical_id(
            &**self,
            technical_id,
        )
        .await
    }

    async fn insert_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::insert_unit(&**self, document).await
    }

    async fn replace_unit(&self, document: UnitDocument) -> UnitStoreResult<()> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::replace_unit(&**self, document).await
    }

    async fn find_unit_by_id(&self, id: &str) -> UnitStoreResult<Option<UnitDocument>> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::find_unit_by_id(&**self, id).await
    }

    async fn find_unit_by_technical_id(
        &self,
        technical_id: &Uuid,
    ) -> UnitStoreResult<Option<UnitDocument>> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::find_unit_by_technical_id(
            &**self,
            technical_id,
        )
        .await
    }

    async fn list_units(&self, query: Query) -> UnitStoreResult<Vec<UnitDocument>> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::list_units(&**self, query).await
    }

    async fn shutdown(self) -> UnitStoreResult<()> {
        <dyn DynUnitStoreBackend as DynUnitStoreBackend>::shutdown_boxed(self).await
    }
}

#[async_trait]
pub trait UnitStoreBackendBuilder {
    type Backend: UnitStoreBackend;

    async fn build(self) -> UnitStoreResult<Self::Backend>;
}

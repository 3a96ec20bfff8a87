//! Typed unit documents on top of pluggable storage backends.
//!
//! This crate is the primary entry point for users of the unitlayer framework. It
//! re-exports the core types from the sub-crates and gives access to the storage
//! backends.
//!
//! # Concepts
//!
//! - A **unit type** is a named, ordered list of **data items**, each bound to a **kind**.
//! - A **kind** is a codec that validates a business value (JSON) and encodes it for
//!   storage (BSON). Kinds are looked up by name in a [`KindRegistry`](registry::KindRegistry).
//! - A **unit** is one record of a unit type. Its values are written sparsely and always
//!   read back densely, with null for every item that has no value.
//!
//! # Quick Start
//!
//! ```ignore
//! use unitlayer::{prelude::*, memory::InMemoryUnitStore};
//!
//! #[tokio::main]
//! async fn main() -> UnitStoreResult<()> {
//!     let store = UnitStore::new(InMemoryUnitStore::builder().build().await?);
//!
//!     store
//!         .define_unit_type(
//!             UnitType::builder("project")
//!                 .name("Project")
//!                 .item(DataItem::new("name", kind::STRING).required())
//!                 .item(DataItem::new("progress", kind::PERCENTAGE))
//!                 .build()?,
//!         )
//!         .await?;
//!
//!     let unit = store
//!         .create_unit(
//!             NewUnit::new("project")
//!                 .with_id("apollo")
//!                 .value("name", "Apollo")
//!                 .value("progress", serde_json::json!({ "value": 42.5 })),
//!         )
//!         .await?;
//!
//!     let started = store
//!         .list_units(
//!             UnitQuery::builder()
//!                 .unit_type("project")
//!                 .filter(Filter::gt("values.progress", 0))
//!                 .build(),
//!         )
//!         .await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! A typed [`UnitStore`](store::UnitStore) can be turned into a
//! [`DynUnitStore`](store::DynUnitStore) with `into_dyn` when the backend is picked at
//! runtime, and recovered with `into_static`.
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use unitlayer_core::{
    backend, binding, contract, document, error, kind, query, registry, schema, store, unit,
    values,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use unitlayer_memory::{InMemoryUnitStore, InMemoryUnitStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use unitlayer_mongodb::{MongoUnitStore, MongoUnitStoreBuilder};
}

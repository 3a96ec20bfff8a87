//! MongoDB backend implementation for unitlayer.
//!
//! This crate provides a MongoDB-based implementation of the `UnitStoreBackend` trait,
//! persisting unit types and units in two collections and using MongoDB's query engine
//! for filtering, search and sorting.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! unitlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Storage layout
//!
//! - `_id` is the document's technical id.
//! - `id` (the business id) has a unique index in both collections.
//! - Units are indexed on `unitTypeTechnicalId`.
//! - Keys containing `.`, `$` or null bytes are escaped on write and restored on read.
//!
//! # Example
//!
//! ```ignore
//! use unitlayer::{UnitStore, backend::UnitStoreBackendBuilder, mongodb::MongoUnitStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoUnitStore::builder("mongodb://localhost:27017", "my_database")
//!         .with_collection_names("unit_types", "units")
//!         .build()
//!         .await?;
//!     let store = UnitStore::new(backend);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as unitlayer_mongodb;

pub mod query;
pub mod sanitizer;
pub mod store;

pub use store::{MongoUnitStore, MongoUnitStoreBuilder};

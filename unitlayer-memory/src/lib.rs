//! In-memory unit storage backend for unitlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `UnitStoreBackend`
//! trait. It uses async-aware read-write locks for concurrent access and is meant for
//! development, testing and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Storage-shaped documents** - Units are kept as the same BSON the MongoDB backend stores
//! - **Full query support** - Filtering, search, multi-key sorting and pagination
//!
//! # Quick Start
//!
//! ```ignore
//! use unitlayer::{UnitStore, memory::InMemoryUnitStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryUnitStore::builder().build().await?;
//!     let store = UnitStore::new(backend);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as unitlayer_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryUnitStore, InMemoryUnitStoreBuilder};

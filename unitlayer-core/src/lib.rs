//! Typed unit documents: the codec layer between declarative unit type schemas and
//! storage documents.
//!
//! This crate is the core of the unitlayer project and provides:
//!
//! - **Kinds** ([`kind`]) - Value codecs for every built-in kind, plus the [`KindCodec`](kind::KindCodec) trait for custom ones
//! - **Kind registry** ([`registry`]) - Name to codec lookup shared by a store
//! - **Schemas** ([`schema`]) - Unit types, data items and their documentation
//! - **Record codec** ([`values`]) - Sparse encoding and dense decoding of whole value maps
//! - **Contract** ([`contract`]) - Validation of external unit and unit type payloads
//! - **Storage documents** ([`document`]) - Stored forms keyed by technical ids
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Query and filtering API** ([`query`]) - Type-safe query construction and filtering
//! - **Unit store** ([`store`]) - Main interface for defining unit types and writing units
//! - **Bindings** ([`binding`]) - Mapping application types to units
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use unitlayer::prelude::*;
//! use serde_json::json;
//!
//! let project = UnitType::builder("project")
//!     .item(DataItem::new("name", kind::STRING).required())
//!     .item(DataItem::new("progress", kind::PERCENTAGE))
//!     .build()?;
//!
//! let codec = RecordCodec::new(Arc::new(KindRegistry::new()));
//! let stored = codec.encode_values(
//!     &project,
//!     json!({ "progress": { "value": 42.5 } }).as_object().unwrap(),
//!     None,
//! )?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as unitlayer_core;

pub mod backend;
pub mod binding;
pub mod contract;
pub mod document;
pub mod error;
pub mod kind;
pub mod query;
pub mod registry;
pub mod schema;
pub mod store;
pub mod unit;
pub mod values;

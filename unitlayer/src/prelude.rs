//! Convenient re-exports of commonly used types from unitlayer.
//!
//! ```ignore
//! use unitlayer::prelude::*;
//! ```

pub use unitlayer_core::{
    backend::{UnitStoreBackend, UnitStoreBackendBuilder},
    binding::{UnitBinding, from_values_serde, values_from_serde},
    contract::{deserialize_unit, deserialize_unit_type, serialize_unit, serialize_unit_type},
    error::{KindError, KindResult, UnitStoreError, UnitStoreResult},
    kind::{self, FnCodec, KindCodec},
    query::{
        Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection, UnitQuery,
        UnitQueryBuilder,
    },
    registry::{KindRegistry, RegisterOptions},
    schema::{DataItem, Documentation, Example, Link, LocalizedText, UnitType, UnitTypeBuilder},
    store::{DynUnitStore, UnitStore},
    unit::{NewUnit, Unit, UnitPatch},
    values::{RecordCodec, StoredValues, Values},
};

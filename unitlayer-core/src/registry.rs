//! Kind registry mapping kind names to value codecs.
//!
//! A [`KindRegistry`] is an explicit object handed to whatever needs to resolve kinds
//! (the [`RecordCodec`](crate::values::RecordCodec), the [`UnitStore`](crate::store::UnitStore)).
//! It is seeded with the built-in kinds on construction, so isolated registries can be
//! created per test or per tenant without touching shared state.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use unitlayer::registry::{KindRegistry, RegisterOptions};
//!
//! let registry = Arc::new(KindRegistry::new());
//! registry.register("rating", RatingCodec, RegisterOptions::default())?;
//!
//! // Built-ins may be overridden explicitly.
//! registry.register("string", StrictStringCodec, RegisterOptions::replace())?;
//! ```

use parking_lot::RwLock;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, warn};

use crate::{
    error::{UnitStoreError, UnitStoreResult},
    kind::{self, KindCodec},
};

/// Options controlling [`KindRegistry::register`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Overwrite an existing registration instead of failing.
    pub replace: bool,
}

impl RegisterOptions {
    pub fn replace() -> Self {
        Self { replace: true }
    }
}

/// Thread-safe table of kind codecs.
///
/// Lookups take a read lock and hand out an `Arc` to the codec, so a codec replaced
/// while an operation is running does not affect that operation.
pub struct KindRegistry {
    kinds: RwLock<HashMap<String, Arc<dyn KindCodec>>>,
}

impl KindRegistry {
    /// Creates a registry seeded with every built-in kind.
    pub fn new() -> Self {
        Self {
            kinds: RwLock::new(
                kind::builtins()
                    .into_iter()
                    .map(|(name, codec)| (name.to_string(), codec))
                    .collect(),
            ),
        }
    }

    /// Creates a registry without any kinds.
    pub fn empty() -> Self {
        Self { kinds: RwLock::new(HashMap::new()) }
    }

    /// Registers a codec under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitStoreError::DuplicateKind`] if `name` is taken and
    /// `options.replace` is not set.
    pub fn register(
        &self,
        name: impl Into<String>,
        codec: impl KindCodec + 'static,
        options: RegisterOptions,
    ) -> UnitStoreResult<()> {
        self.register_arc(name, Arc::new(codec), options)
    }

    /// Registers an already shared codec under `name`.
    pub fn register_arc(
        &self,
        name: impl Into<String>,
        codec: Arc<dyn KindCodec>,
        options: RegisterOptions,
    ) -> UnitStoreResult<()> {
        let name = name.into();
        let mut kinds = self.kinds.write();

        if kinds.contains_key(&name) {
            if !options.replace {
                return Err(UnitStoreError::DuplicateKind(name));
            }

            warn!(kind = %name, "replacing registered kind codec");
        } else {
            debug!(kind = %name, "registering kind codec");
        }

        kinds.insert(name, codec);

        Ok(())
    }

    /// Looks up the codec registered under `name`.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn KindCodec>> {
        self.kinds.read().get(name).cloned()
    }

    /// Like [`resolve`](Self::resolve) but fails with [`UnitStoreError::UnknownKind`].
    pub fn require(&self, name: &str) -> UnitStoreResult<Arc<dyn KindCodec>> {
        self.resolve(name)
            .ok_or_else(|| UnitStoreError::UnknownKind(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.read().contains_key(name)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut names = self.kinds.read().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.kinds.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.read().is_empty()
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{FnCodec, scalar::StringCodec};
    use bson::Bson;
    use serde_json::{Value, json};

    fn constant(text: &'static str) -> impl KindCodec {
        FnCodec::new(
            move |_: &Value| Ok(Some(Bson::String(text.to_string()))),
            move |_: &Bson| Ok(Some(Value::String(text.to_string()))),
        )
    }

    #[test]
    fn seeded_with_builtins() {
        let registry = KindRegistry::new();

        assert_eq!(registry.len(), 16);
        assert!(registry.contains("geoAddress"));
        assert!(registry.resolve("percentage").is_some());
        assert!(registry.resolve("nope").is_none());
        assert!(KindRegistry::empty().is_empty());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = KindRegistry::new();
        registry
            .register("rating", constant("a"), RegisterOptions::default())
            .unwrap();

        let err = registry
            .register("rating", constant("b"), RegisterOptions::default())
            .unwrap_err();

        assert!(matches!(err, UnitStoreError::DuplicateKind(name) if name == "rating"));
        assert!(matches!(
            registry.register("string", StringCodec, RegisterOptions::default()),
            Err(UnitStoreError::DuplicateKind(_))
        ));
    }

    #[test]
    fn replace_swaps_the_resolved_codec() {
        let registry = KindRegistry::new();
        registry
            .register("string", constant("replaced"), RegisterOptions::replace())
            .unwrap();

        let codec = registry.resolve("string").unwrap();

        assert_eq!(codec.encode(&json!("x")), Ok(Some(Bson::String("replaced".into()))));
    }

    #[test]
    fn registries_are_isolated() {
        let first = KindRegistry::new();
        let second = KindRegistry::new();

        first
            .register("custom", constant("a"), RegisterOptions::default())
            .unwrap();

        assert!(first.contains("custom"));
        assert!(!second.contains("custom"));
        assert!(matches!(second.require("custom"), Err(UnitStoreError::UnknownKind(_))));
    }
}

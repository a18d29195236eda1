//! Compiled schemas, shared per component type.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use homebus_domain::error::SchemaError;
use homebus_domain::schema::schema_hash;

use super::compiler::ComponentTypeSchema;
use crate::ports::Component;
use crate::ports::component::as_any;

/// Most morphed variants kept per component type.
pub const MAX_VARIANTS: usize = 16;

/// Compiled schemas keyed by component type, then by schema text hash for
/// morphing types.
///
/// Non-morphing types compile once; their schema text is not even re-read.
/// At most [`MAX_VARIANTS`] variants are kept per type. When full, variants
/// nobody outside the cache holds are evicted; if none can go, the new
/// variant is handed out without being stored.
/// Compilation runs outside the cache lock, so two racing first lookups may
/// both compile; the first stored result wins.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<TypeId, TypeEntry>>,
}

#[derive(Debug)]
struct TypeEntry {
    base: Arc<ComponentTypeSchema>,
    variants: HashMap<u64, Arc<ComponentTypeSchema>>,
}

impl TypeEntry {
    fn store_variant(&mut self, compiled: &Arc<ComponentTypeSchema>) {
        if self.variants.len() >= MAX_VARIANTS {
            self.variants.retain(|_, variant| Arc::strong_count(variant) > 1);
        }
        if self.variants.len() < MAX_VARIANTS {
            self.variants.insert(compiled.hash(), Arc::clone(compiled));
        } else {
            tracing::debug!(
                class = compiled.class_name(),
                "schema variant limit reached, not caching"
            );
        }
    }
}

impl SchemaCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled schema matching what `component` currently publishes.
    ///
    /// # Errors
    ///
    /// Returns the compilation failure; failures are not cached.
    pub fn schema_for(
        &self,
        component: &dyn Component,
    ) -> Result<Arc<ComponentTypeSchema>, SchemaError> {
        let key = as_any(component).type_id();

        if let Some(entry) = self.lock().get(&key) {
            if !entry.base.is_morphing() {
                return Ok(Arc::clone(&entry.base));
            }
            let hash = schema_hash(&component.schema());
            if hash == entry.base.hash() {
                return Ok(Arc::clone(&entry.base));
            }
            if let Some(variant) = entry.variants.get(&hash) {
                return Ok(Arc::clone(variant));
            }
        }

        let compiled = Arc::new(ComponentTypeSchema::compile(component)?);
        tracing::debug!(
            class = compiled.class_name(),
            morphing = compiled.is_morphing(),
            "compiled component schema"
        );

        let mut entries = self.lock();
        let stored = match entries.get_mut(&key) {
            Some(entry) if entry.base.hash() == compiled.hash() => Arc::clone(&entry.base),
            Some(entry) => match entry.variants.get(&compiled.hash()) {
                Some(existing) => Arc::clone(existing),
                None => {
                    entry.store_variant(&compiled);
                    compiled
                }
            },
            None => {
                entries.insert(
                    key,
                    TypeEntry {
                        base: Arc::clone(&compiled),
                        variants: HashMap::new(),
                    },
                );
                compiled
            }
        };
        Ok(stored)
    }

    /// Number of compiled schemas held, variants included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .map(|entry| 1 + entry.variants.len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every compiled schema.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TypeId, TypeEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Process-wide registry of PDX type schemas.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{PdxError, Result};

use super::TypeSchema;

/// First id handed out by a fresh or cleared registry.
pub const FIRST_TYPE_ID: i32 = 1;

#[derive(Debug, Default)]
struct RegistryState {
    by_id: HashMap<i32, Arc<TypeSchema>>,
    by_class_name: HashMap<String, Vec<Arc<TypeSchema>>>,
    local_types: HashMap<String, Arc<TypeSchema>>,
    epoch: u64,
}

/// Maps type ids to schemas and class names to their known versions.
///
/// Lookups take a shared lock; registration and `clear` take it
/// exclusively. Structurally equal schemas share one id.
#[derive(Debug)]
pub struct TypeRegistry {
    state: RwLock<RegistryState>,
    next_id: AtomicI32,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            next_id: AtomicI32::new(FIRST_TYPE_ID),
        }
    }

    /// Registers `schema` unless a structurally equal one exists, and
    /// returns the registered schema carrying its type id.
    pub fn register(&self, mut schema: TypeSchema) -> Result<Arc<TypeSchema>> {
        let mut state = self.state.write();
        if let Some(existing) = state
            .by_class_name
            .get(schema.class_name())
            .and_then(|versions| versions.iter().find(|v| v.structural_equals(&schema)))
        {
            tracing::trace!(
                type_id = existing.type_id(),
                class_name = %schema.class_name(),
                "reusing structurally equal PDX type"
            );
            return Ok(Arc::clone(existing));
        }

        let type_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if type_id <= 0 {
            return Err(PdxError::IllegalState(
                "PDX type id space exhausted".to_string(),
            ));
        }
        schema.set_type_id(type_id);
        let schema = Arc::new(schema);
        Self::insert(&mut state, Arc::clone(&schema));
        tracing::debug!(
            type_id,
            class_name = %schema.class_name(),
            fields = schema.field_count(),
            "registered PDX type"
        );
        Ok(schema)
    }

    /// Registers `schema` and returns its type id.
    pub fn register_or_get(&self, schema: TypeSchema) -> Result<i32> {
        self.register(schema).map(|s| s.type_id())
    }

    /// Inserts a schema under an id assigned by a peer.
    ///
    /// Local allocation continues past the highest id seen.
    pub fn add_remote_type(&self, type_id: i32, mut schema: TypeSchema) -> Result<Arc<TypeSchema>> {
        if type_id < FIRST_TYPE_ID {
            return Err(PdxError::IllegalState(format!(
                "invalid remote type id: {}",
                type_id
            )));
        }
        let mut state = self.state.write();
        if let Some(existing) = state.by_id.get(&type_id) {
            if existing.structural_equals(&schema) {
                return Ok(Arc::clone(existing));
            }
            return Err(PdxError::IllegalState(format!(
                "type id {} already registered for '{}'",
                type_id,
                existing.class_name()
            )));
        }
        schema.set_type_id(type_id);
        let schema = Arc::new(schema);
        Self::insert(&mut state, Arc::clone(&schema));
        self.next_id
            .fetch_max(type_id.saturating_add(1), Ordering::SeqCst);
        tracing::debug!(
            type_id,
            class_name = %schema.class_name(),
            "added remote PDX type"
        );
        Ok(schema)
    }

    fn insert(state: &mut RegistryState, schema: Arc<TypeSchema>) {
        state
            .by_class_name
            .entry(schema.class_name().to_string())
            .or_default()
            .push(Arc::clone(&schema));
        state.by_id.insert(schema.type_id(), schema);
    }

    /// Returns the schema registered under `type_id`.
    pub fn get_by_id(&self, type_id: i32) -> Option<Arc<TypeSchema>> {
        self.state.read().by_id.get(&type_id).cloned()
    }

    /// Returns the schema registered under `type_id`, provided the registry
    /// has not been cleared since `epoch` was observed.
    pub fn get_by_id_in_epoch(&self, type_id: i32, epoch: u64) -> Option<Arc<TypeSchema>> {
        let state = self.state.read();
        if state.epoch != epoch {
            return None;
        }
        state.by_id.get(&type_id).cloned()
    }

    /// Returns the number of times the registry has been cleared.
    pub fn epoch(&self) -> u64 {
        self.state.read().epoch
    }

    /// Returns every known version of `class_name`, oldest first.
    pub fn get_versions_by_class_name(&self, class_name: &str) -> Vec<Arc<TypeSchema>> {
        self.state
            .read()
            .by_class_name
            .get(class_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the schema used to serialize local objects of `class_name`.
    pub fn local_type(&self, class_name: &str) -> Option<Arc<TypeSchema>> {
        self.state.read().local_types.get(class_name).cloned()
    }

    /// Sets the schema used to serialize local objects of `class_name`.
    pub fn set_local_type(&self, class_name: &str, schema: Arc<TypeSchema>) {
        tracing::debug!(
            type_id = schema.type_id(),
            class_name = %class_name,
            "set local PDX type"
        );
        self.state
            .write()
            .local_types
            .insert(class_name.to_string(), schema);
    }

    /// Drops every schema and restarts id allocation.
    ///
    /// Ids handed out before the clear may be reused; the epoch advances so
    /// that lookups made on behalf of older data can tell them apart.
    pub fn clear(&self) {
        let mut state = self.state.write();
        let dropped = state.by_id.len();
        *state = RegistryState {
            epoch: state.epoch + 1,
            ..RegistryState::default()
        };
        self.next_id.store(FIRST_TYPE_ID, Ordering::SeqCst);
        tracing::info!(dropped, "cleared PDX type registry");
    }

    /// Returns the number of registered schemas.
    pub fn len(&self) -> usize {
        self.state.read().by_id.len()
    }

    /// Returns true if no schema is registered.
    pub fn is_empty(&self) -> bool {
        self.state.read().by_id.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

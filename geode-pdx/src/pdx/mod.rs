//! PDX: schema-carrying portable object serialization.
//!
//! Domain types implement [`PdxSerializable`] and write their fields by
//! name through a [`PdxWriter`]. The first serialization of a class
//! discovers its [`TypeSchema`] and registers it in the [`TypeRegistry`];
//! later ones replay that layout. Serialized objects can be read back
//! without their concrete class as a [`PdxInstance`].

mod factory;
mod field_type;
mod field_value;
mod instance;
mod reader;
mod registry;
mod schema;
mod serializer;
mod writable;
mod writer;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

pub use factory::PdxInstanceFactory;
pub use field_type::FieldType;
pub(crate) use field_value::expect_variant;
pub use field_value::FieldValue;
pub use instance::{PdxFieldAccess, PdxInstance};
pub use reader::{InstanceReader, PdxReader};
pub use registry::{TypeRegistry, FIRST_TYPE_ID};
pub use schema::{FieldDescriptor, TypeSchema};
pub use serializer::{Deserialized, PdxSerializer};
pub use writable::WritablePdxInstance;
pub use writer::{LocalWriter, PdxWriter, SchemaCollectingWriter, PDX_HEADER_LEN};

/// Trait for types that can be serialized using PDX serialization.
pub trait PdxSerializable: Send + Sync {
    /// Returns the class name identifying this type across peers.
    fn class_name(&self) -> &str;

    /// Writes this object's fields to the given writer.
    fn to_data(&self, writer: &mut dyn PdxWriter) -> Result<()>;

    /// Reads this object's fields from the given reader.
    fn from_data(&mut self, reader: &mut dyn PdxReader) -> Result<()>;

    /// Returns `self` for downcasting materialized objects.
    fn as_any(&self) -> &dyn Any;
}

/// Creates empty instances of one PDX class for materialization.
pub trait PdxClassFactory: Send + Sync {
    /// Creates a default/empty instance.
    fn create(&self) -> Box<dyn PdxSerializable>;
}

impl<F> PdxClassFactory for F
where
    F: Fn() -> Box<dyn PdxSerializable> + Send + Sync,
{
    fn create(&self) -> Box<dyn PdxSerializable> {
        self()
    }
}

/// Registry mapping class names to `PdxClassFactory` instances.
#[derive(Default)]
pub struct PdxClassRegistry {
    factories: RwLock<HashMap<String, Arc<dyn PdxClassFactory>>>,
}

impl PdxClassRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for a class name, replacing any previous one.
    pub fn register(&self, class_name: impl Into<String>, factory: Arc<dyn PdxClassFactory>) {
        self.factories.write().insert(class_name.into(), factory);
    }

    /// Registers `T::default` under the class name `T` reports.
    pub fn register_default<T>(&self)
    where
        T: PdxSerializable + Default + 'static,
    {
        let class_name = T::default().class_name().to_string();
        self.register(
            class_name,
            Arc::new(|| Box::new(T::default()) as Box<dyn PdxSerializable>),
        );
    }

    /// Removes the factory for a class name, returning it if it was present.
    pub fn unregister(&self, class_name: &str) -> Option<Arc<dyn PdxClassFactory>> {
        self.factories.write().remove(class_name)
    }

    /// Creates an empty instance of the class, if a factory is registered.
    pub fn create(&self, class_name: &str) -> Option<Box<dyn PdxSerializable>> {
        let factory = self.factories.read().get(class_name).cloned()?;
        Some(factory.create())
    }

    /// Returns `true` if a factory is registered for the class name.
    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.read().contains_key(class_name)
    }

    /// Returns the number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    /// Returns `true` if no factories are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl fmt::Debug for PdxClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdxClassRegistry")
            .field("factories", &self.len())
            .finish()
    }
}

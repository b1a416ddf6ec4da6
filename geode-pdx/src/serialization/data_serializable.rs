//! User-defined data serializable types carried inside object fields.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

use super::ds_code::ClassId;
use super::{DataInput, DataOutput};

/// Trait for application types serialized by numeric class id.
///
/// Such values can appear inside `OBJECT` fields but have no key
/// contract: hashing or deep-comparing them is an error.
pub trait DataSerializable: Send + Sync + fmt::Debug {
    /// Returns the class id used to select the wire type code.
    fn class_id(&self) -> ClassId;

    /// Writes the object's data to the output.
    fn to_data(&self, output: &mut dyn DataOutput) -> Result<()>;

    /// Reads the object's data from the input, populating this instance.
    fn from_data(&mut self, input: &mut dyn DataInput) -> Result<()>;
}

/// Creates empty `DataSerializable` instances for one class id.
pub trait DataSerializableFactory: Send + Sync {
    /// Creates a default/empty instance.
    fn create(&self) -> Box<dyn DataSerializable>;
}

impl<F> DataSerializableFactory for F
where
    F: Fn() -> Box<dyn DataSerializable> + Send + Sync,
{
    fn create(&self) -> Box<dyn DataSerializable> {
        self()
    }
}

/// Registry mapping class ids to `DataSerializableFactory` instances.
#[derive(Default)]
pub struct DataSerializableRegistry {
    factories: RwLock<HashMap<ClassId, Arc<dyn DataSerializableFactory>>>,
}

impl DataSerializableRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for a class id, replacing any previous one.
    pub fn register(&self, class_id: ClassId, factory: Arc<dyn DataSerializableFactory>) {
        self.factories.write().insert(class_id, factory);
    }

    /// Removes the factory for a class id, returning it if it was present.
    pub fn unregister(&self, class_id: ClassId) -> Option<Arc<dyn DataSerializableFactory>> {
        self.factories.write().remove(&class_id)
    }

    /// Creates an empty instance for the class id, if a factory is registered.
    pub fn create(&self, class_id: ClassId) -> Option<Box<dyn DataSerializable>> {
        let factory = self.factories.read().get(&class_id).cloned()?;
        Some(factory.create())
    }

    /// Returns `true` if a factory is registered for the class id.
    pub fn contains(&self, class_id: ClassId) -> bool {
        self.factories.read().contains_key(&class_id)
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

impl fmt::Debug for DataSerializableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSerializableRegistry")
            .field("factories", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{ObjectDataInput, ObjectDataOutput};

    const TEST_CLASS_ID: ClassId = ClassId::User(7);

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl DataSerializable for Point {
        fn class_id(&self) -> ClassId {
            TEST_CLASS_ID
        }

        fn to_data(&self, output: &mut dyn DataOutput) -> Result<()> {
            output.write_int(self.x)?;
            output.write_int(self.y)
        }

        fn from_data(&mut self, input: &mut dyn DataInput) -> Result<()> {
            self.x = input.read_int()?;
            self.y = input.read_int()?;
            Ok(())
        }
    }

    fn point_factory() -> Arc<dyn DataSerializableFactory> {
        Arc::new(|| Box::new(Point::default()) as Box<dyn DataSerializable>)
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = DataSerializableRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_and_create() {
        let registry = DataSerializableRegistry::new();
        registry.register(TEST_CLASS_ID, point_factory());
        assert!(registry.contains(TEST_CLASS_ID));

        let created = registry.create(TEST_CLASS_ID).unwrap();
        assert_eq!(created.class_id(), TEST_CLASS_ID);
        assert!(registry.create(ClassId::User(8)).is_none());
    }

    #[test]
    fn test_unregister() {
        let registry = DataSerializableRegistry::new();
        registry.register(TEST_CLASS_ID, point_factory());
        assert!(registry.unregister(TEST_CLASS_ID).is_some());
        assert!(registry.unregister(TEST_CLASS_ID).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let registry = DataSerializableRegistry::new();
        registry.register(TEST_CLASS_ID, point_factory());
        registry.register(TEST_CLASS_ID, point_factory());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_round_trip_via_registry() {
        let registry = DataSerializableRegistry::new();
        registry.register(TEST_CLASS_ID, point_factory());

        let original = Point { x: 3, y: -4 };
        let mut output = ObjectDataOutput::new();
        original.to_data(&mut output).unwrap();

        let bytes = output.into_bytes();
        let mut input = ObjectDataInput::new(&bytes);
        let mut restored = registry.create(TEST_CLASS_ID).unwrap();
        restored.from_data(&mut input).unwrap();
        assert_eq!(format!("{:?}", restored), format!("{:?}", original));
    }
}

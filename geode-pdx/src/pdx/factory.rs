//! Building PDX instances without a concrete class.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::PdxContext;
use crate::error::{PdxError, Result};

use super::{FieldValue, PdxInstance, PdxWriter, TypeSchema};

/// Accumulates named field values and yields one `PdxInstance`.
///
/// The schema is discovered from the writes and registered by `create`.
/// A factory can be used only once.
pub struct PdxInstanceFactory {
    ctx: Arc<PdxContext>,
    schema: TypeSchema,
    values: HashMap<String, FieldValue>,
    created: bool,
}

impl PdxInstanceFactory {
    /// Creates a factory for an instance of `class_name`.
    pub fn new(ctx: &Arc<PdxContext>, class_name: &str) -> Self {
        Self {
            ctx: Arc::clone(ctx),
            schema: TypeSchema::new(class_name),
            values: HashMap::new(),
            created: false,
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.created {
            return Err(PdxError::IllegalState(format!(
                "instance of '{}' already created",
                self.schema.class_name()
            )));
        }
        Ok(())
    }

    /// Registers the schema and returns the instance.
    ///
    /// The instance owns the registered schema with this factory's
    /// identity marks and encodes its bytes on first need.
    pub fn create(&mut self) -> Result<PdxInstance> {
        self.check_open()?;
        self.created = true;
        let registered = self.ctx.registry().register(self.schema.clone())?;
        let schema = if registered.marked_identity_names() == self.schema.marked_identity_names() {
            registered
        } else {
            Arc::new(registered.with_identity_of(&self.schema))
        };
        self.ctx.statistics().increment_instance_creation_count();
        tracing::trace!(
            type_id = schema.type_id(),
            class_name = %schema.class_name(),
            "created PDX instance"
        );
        Ok(PdxInstance::from_values(
            Arc::clone(&self.ctx),
            schema,
            std::mem::take(&mut self.values),
        ))
    }
}

impl PdxWriter for PdxInstanceFactory {
    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        self.check_open()?;
        self.schema.add_field(name, value.field_type())?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn mark_identity_field(&mut self, name: &str) -> Result<()> {
        self.check_open()?;
        self.schema.mark_identity_field(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdx::{FieldType, PdxFieldAccess};
    use crate::serialization::Value;
    use crate::statistics::PdxStatistics;

    #[test]
    fn test_create_registers_schema() {
        let ctx = PdxContext::new_shared();
        let mut factory = PdxInstanceFactory::new(&ctx, "Order");
        factory.write_long("id", 9).unwrap();
        factory.write_object("lines", Value::ArrayList(vec![])).unwrap();
        let instance = factory.create().unwrap();

        let registered = ctx.registry().get_by_id(instance.type_id()).unwrap();
        assert_eq!(registered.class_name(), "Order");
        assert_eq!(registered.field("lines").unwrap().field_type(), FieldType::Object);
        assert_eq!(instance.get_long("id").unwrap(), 9);
    }

    #[test]
    fn test_duplicate_field() {
        let ctx = PdxContext::new_shared();
        let mut factory = PdxInstanceFactory::new(&ctx, "Dup");
        factory.write_int("x", 1).unwrap();
        assert!(matches!(
            factory.write_int("x", 2),
            Err(PdxError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_identity_before_write() {
        let ctx = PdxContext::new_shared();
        let mut factory = PdxInstanceFactory::new(&ctx, "Id");
        assert!(matches!(
            factory.mark_identity_field("x"),
            Err(PdxError::IllegalState(_))
        ));
    }

    #[test]
    fn test_single_use() {
        let ctx = PdxContext::new_shared();
        let mut factory = PdxInstanceFactory::new(&ctx, "Once");
        factory.write_int("x", 1).unwrap();
        factory.create().unwrap();
        assert!(matches!(factory.create(), Err(PdxError::IllegalState(_))));
        assert!(matches!(
            factory.write_int("y", 1),
            Err(PdxError::IllegalState(_))
        ));
        assert!(matches!(
            factory.mark_identity_field("x"),
            Err(PdxError::IllegalState(_))
        ));
    }

    #[test]
    fn test_counts_instance_creation() {
        let statistics = Arc::new(PdxStatistics::new());
        let ctx = Arc::new(PdxContext::builder().statistics(statistics.clone()).build());
        let mut factory = PdxInstanceFactory::new(&ctx, "Counted");
        factory.write_int("x", 1).unwrap();
        factory.create().unwrap();
        assert_eq!(statistics.instance_creation_count(), 1);
    }

    #[test]
    fn test_identity_marks_survive_dedup() {
        let ctx = PdxContext::new_shared();
        let mut plain = PdxInstanceFactory::new(&ctx, "Keyed");
        plain.write_int("k", 1).unwrap();
        plain.write_int("v", 2).unwrap();
        let plain = plain.create().unwrap();

        let mut keyed = PdxInstanceFactory::new(&ctx, "Keyed");
        keyed.write_int("k", 1).unwrap();
        keyed.write_int("v", 3).unwrap();
        keyed.mark_identity_field("k").unwrap();
        let keyed = keyed.create().unwrap();

        assert_eq!(keyed.type_id(), plain.type_id());
        assert_eq!(keyed.to_string(), format!("PDX[{},Keyed]{{k=1}}", keyed.type_id()));
        assert!(!plain.equals(&keyed).unwrap());
    }
}

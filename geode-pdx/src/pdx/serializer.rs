//! Entry points for serializing domain objects and reading them back.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::context::PdxContext;
use crate::error::{PdxError, Result};

use super::{LocalWriter, PdxInstance, PdxSerializable, SchemaCollectingWriter, TypeSchema};

/// The result of `PdxSerializer::deserialize_value`.
pub enum Deserialized {
    /// The generic view, returned when `read_serialized` is enabled.
    Instance(PdxInstance),
    /// The materialized domain object.
    Object(Box<dyn PdxSerializable>),
}

impl Deserialized {
    /// Returns the instance if this is the generic view.
    pub fn as_instance(&self) -> Option<&PdxInstance> {
        match self {
            Deserialized::Instance(instance) => Some(instance),
            Deserialized::Object(_) => None,
        }
    }

    /// Returns the domain object if one was materialized.
    pub fn as_object(&self) -> Option<&dyn PdxSerializable> {
        match self {
            Deserialized::Instance(_) => None,
            Deserialized::Object(object) => Some(object.as_ref()),
        }
    }
}

impl fmt::Debug for Deserialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deserialized::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
            Deserialized::Object(object) => f.debug_tuple("Object").field(&object.class_name()).finish(),
        }
    }
}

/// Serializes `PdxSerializable` objects into framed PDX bytes.
#[derive(Debug, Clone)]
pub struct PdxSerializer {
    ctx: Arc<PdxContext>,
}

impl PdxSerializer {
    /// Creates a serializer over `ctx`.
    pub fn new(ctx: Arc<PdxContext>) -> Self {
        Self { ctx }
    }

    /// Returns the context.
    pub fn context(&self) -> &Arc<PdxContext> {
        &self.ctx
    }

    /// Serializes `object` into a framed PDX byte sequence.
    ///
    /// The first serialization of a class discovers and registers its
    /// schema; later ones replay the cached local type. An object whose
    /// writes no longer fit the local type is rediscovered.
    pub fn serialize(&self, object: &dyn PdxSerializable) -> Result<Bytes> {
        let class_name = object.class_name();
        let bytes = match self.ctx.registry().local_type(class_name) {
            Some(local) => match self.replay(object, local) {
                Err(
                    err @ (PdxError::UnknownField(_)
                    | PdxError::IllegalState(_)
                    | PdxError::FieldTypeMismatch { .. }),
                ) => {
                    tracing::debug!(
                        class_name = %class_name,
                        error = %err,
                        "PDX class no longer matches its local type; rediscovering schema"
                    );
                    self.discover(object)?
                }
                other => other?,
            },
            None => self.discover(object)?,
        };
        self.ctx.statistics().increment_serialization_count();
        Ok(bytes)
    }

    fn replay(&self, object: &dyn PdxSerializable, schema: Arc<TypeSchema>) -> Result<Bytes> {
        let mut writer = LocalWriter::new(&self.ctx, schema)?;
        object.to_data(&mut writer)?;
        writer.finish()
    }

    fn discover(&self, object: &dyn PdxSerializable) -> Result<Bytes> {
        let class_name = object.class_name();
        let mut writer = SchemaCollectingWriter::new(Arc::clone(&self.ctx), class_name)?;
        object.to_data(&mut writer)?;
        let written_order = writer.schema().field_names().join(",");
        let (registered, bytes) = writer.finish()?;
        if registered.field_names().join(",") == written_order {
            self.ctx
                .registry()
                .set_local_type(class_name, Arc::clone(&registered));
        }
        Ok(bytes)
    }

    /// Parses one framed PDX object into a generic instance.
    pub fn deserialize(&self, data: &[u8]) -> Result<PdxInstance> {
        PdxInstance::from_bytes(Arc::clone(&self.ctx), data)
    }

    /// Parses one framed PDX object and materializes its domain class.
    pub fn deserialize_object(&self, data: &[u8]) -> Result<Box<dyn PdxSerializable>> {
        self.deserialize(data)?.to_object()
    }

    /// Parses one framed PDX object, returning the generic view or the
    /// domain object as configured by `read_serialized`.
    pub fn deserialize_value(&self, data: &[u8]) -> Result<Deserialized> {
        let instance = self.deserialize(data)?;
        if self.ctx.config().read_serialized() {
            Ok(Deserialized::Instance(instance))
        } else {
            instance.to_object().map(Deserialized::Object)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::config::PdxConfig;
    use crate::pdx::{PdxFieldAccess, PdxReader, PdxWriter};
    use crate::statistics::PdxStatistics;

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
        label: Option<String>,
    }

    impl PdxSerializable for Point {
        fn class_name(&self) -> &str {
            "test.Point"
        }

        fn to_data(&self, writer: &mut dyn PdxWriter) -> Result<()> {
            writer.write_int("x", self.x)?;
            writer.write_int("y", self.y)?;
            writer.write_string("label", self.label.as_deref())?;
            writer.mark_identity_field("x")
        }

        fn from_data(&mut self, reader: &mut dyn PdxReader) -> Result<()> {
            self.x = reader.read_int("x")?;
            self.y = reader.read_int("y")?;
            self.label = reader.read_string("label")?;
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn context(read_serialized: bool) -> Arc<PdxContext> {
        let config = PdxConfig::builder()
            .read_serialized(read_serialized)
            .build()
            .unwrap();
        let ctx = PdxContext::new(config);
        ctx.classes().register_default::<Point>();
        Arc::new(ctx)
    }

    #[test]
    fn test_first_serialize_registers_local_type() {
        let ctx = context(true);
        let serializer = PdxSerializer::new(Arc::clone(&ctx));
        let point = Point { x: 1, y: 2, label: None };

        let first = serializer.serialize(&point).unwrap();
        let local = ctx.registry().local_type("test.Point").unwrap();
        assert_eq!(local.field_names(), vec!["x", "y", "label"]);

        let second = serializer.serialize(&point).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.registry().len(), 1);
    }

    #[test]
    fn test_round_trip_object() {
        let ctx = context(false);
        let serializer = PdxSerializer::new(ctx);
        let point = Point {
            x: -4,
            y: 9,
            label: Some("p".to_string()),
        };
        let bytes = serializer.serialize(&point).unwrap();

        let object = serializer.deserialize_object(&bytes).unwrap();
        let read = object.as_any().downcast_ref::<Point>().unwrap();
        assert_eq!(read, &point);
    }

    #[test]
    fn test_deserialize_value_follows_read_serialized() {
        let point = Point { x: 3, y: 4, label: None };

        let generic = PdxSerializer::new(context(true));
        let bytes = generic.serialize(&point).unwrap();
        let value = generic.deserialize_value(&bytes).unwrap();
        let instance = value.as_instance().unwrap();
        assert_eq!(instance.get_int("y").unwrap(), 4);
        assert_eq!(
            instance.to_string(),
            format!("PDX[{},test.Point]{{x=3}}", instance.type_id())
        );

        let typed = PdxSerializer::new(context(false));
        let bytes = typed.serialize(&point).unwrap();
        let value = typed.deserialize_value(&bytes).unwrap();
        assert_eq!(value.as_object().unwrap().class_name(), "test.Point");
    }

    #[test]
    fn test_statistics() {
        let statistics = Arc::new(PdxStatistics::new());
        let ctx = PdxContext::builder().statistics(statistics.clone()).build();
        ctx.classes().register_default::<Point>();
        let serializer = PdxSerializer::new(Arc::new(ctx));

        let bytes = serializer.serialize(&Point::default()).unwrap();
        serializer.serialize(&Point::default()).unwrap();
        serializer.deserialize_object(&bytes).unwrap();

        assert_eq!(statistics.serialization_count(), 2);
        assert_eq!(statistics.deserialization_count(), 1);
    }

    #[test]
    fn test_deserialize_rejects_other_codes() {
        let serializer = PdxSerializer::new(context(true));
        assert!(matches!(
            serializer.deserialize(&[87, 0, 1, b'a']),
            Err(PdxError::Serialization(_))
        ));
    }

    #[test]
    fn test_reordered_class_reuses_type() {
        struct Reordered;

        impl PdxSerializable for Reordered {
            fn class_name(&self) -> &str {
                "test.Point"
            }

            fn to_data(&self, writer: &mut dyn PdxWriter) -> Result<()> {
                writer.write_string("label", None)?;
                writer.write_int("y", 2)?;
                writer.write_int("x", 1)
            }

            fn from_data(&mut self, _reader: &mut dyn PdxReader) -> Result<()> {
                Ok(())
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let ctx = context(true);
        let serializer = PdxSerializer::new(Arc::clone(&ctx));
        let expected = serializer
            .serialize(&Point { x: 1, y: 2, label: None })
            .unwrap();
        let reordered = serializer.serialize(&Reordered).unwrap();
        assert_eq!(reordered, expected);
        assert_eq!(ctx.registry().len(), 1);
    }

    #[test]
    fn test_retyped_field_rediscovers_schema() {
        struct Retyped;

        impl PdxSerializable for Retyped {
            fn class_name(&self) -> &str {
                "test.Point"
            }

            fn to_data(&self, writer: &mut dyn PdxWriter) -> Result<()> {
                writer.write_int("x", 1)?;
                writer.write_long("y", 1 << 40)?;
                writer.write_string("label", None)
            }

            fn from_data(&mut self, _reader: &mut dyn PdxReader) -> Result<()> {
                Ok(())
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let ctx = context(true);
        let serializer = PdxSerializer::new(Arc::clone(&ctx));
        serializer
            .serialize(&Point { x: 1, y: 2, label: None })
            .unwrap();

        let bytes = serializer.serialize(&Retyped).unwrap();
        assert_eq!(ctx.registry().len(), 2);
        let instance = serializer.deserialize(&bytes).unwrap();
        assert_eq!(instance.get_long("y").unwrap(), 1 << 40);
        assert_eq!(serializer.serialize(&Retyped).unwrap(), bytes);

        let point = serializer
            .serialize(&Point { x: 5, y: 6, label: None })
            .unwrap();
        assert_eq!(ctx.registry().len(), 2);
        assert_eq!(serializer.deserialize(&point).unwrap().get_int("y").unwrap(), 6);
    }
}

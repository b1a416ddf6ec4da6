//! Reading PDX fields into concrete objects.

use crate::error::Result;
use crate::serialization::Value;

use super::{expect_variant, FieldType, FieldValue, PdxFieldAccess, PdxInstance};

/// Trait for reading named PDX fields during materialization.
///
/// A field absent from the serialized version reads as its type's default
/// value, so objects can be read from older or newer versions of their
/// class. A field present with a different type is a
/// `FieldTypeMismatch`.
pub trait PdxReader {
    /// Reads the field `name`, expected to be of `field_type`.
    fn read_field(&mut self, name: &str, field_type: FieldType) -> Result<FieldValue>;

    /// Returns true if the serialized version has the field.
    fn has_field(&self, name: &str) -> bool;

    /// Reads a boolean field.
    fn read_boolean(&mut self, name: &str) -> Result<bool> {
        expect_variant!(self.read_field(name, FieldType::Boolean)?, name, Boolean)
    }

    /// Reads a byte field.
    fn read_byte(&mut self, name: &str) -> Result<i8> {
        expect_variant!(self.read_field(name, FieldType::Byte)?, name, Byte)
    }

    /// Reads a char field.
    fn read_char(&mut self, name: &str) -> Result<u16> {
        expect_variant!(self.read_field(name, FieldType::Char)?, name, Char)
    }

    /// Reads a short field.
    fn read_short(&mut self, name: &str) -> Result<i16> {
        expect_variant!(self.read_field(name, FieldType::Short)?, name, Short)
    }

    /// Reads an int field.
    fn read_int(&mut self, name: &str) -> Result<i32> {
        expect_variant!(self.read_field(name, FieldType::Int)?, name, Int)
    }

    /// Reads a long field.
    fn read_long(&mut self, name: &str) -> Result<i64> {
        expect_variant!(self.read_field(name, FieldType::Long)?, name, Long)
    }

    /// Reads a float field.
    fn read_float(&mut self, name: &str) -> Result<f32> {
        expect_variant!(self.read_field(name, FieldType::Float)?, name, Float)
    }

    /// Reads a double field.
    fn read_double(&mut self, name: &str) -> Result<f64> {
        expect_variant!(self.read_field(name, FieldType::Double)?, name, Double)
    }

    /// Reads a date field.
    fn read_date(&mut self, name: &str) -> Result<Option<i64>> {
        expect_variant!(self.read_field(name, FieldType::Date)?, name, Date)
    }

    /// Reads a string field.
    fn read_string(&mut self, name: &str) -> Result<Option<String>> {
        expect_variant!(self.read_field(name, FieldType::String)?, name, String)
    }

    /// Reads an object field.
    fn read_object(&mut self, name: &str) -> Result<Value> {
        expect_variant!(self.read_field(name, FieldType::Object)?, name, Object)
    }

    /// Reads a boolean array field.
    fn read_boolean_array(&mut self, name: &str) -> Result<Option<Vec<bool>>> {
        expect_variant!(self.read_field(name, FieldType::BooleanArray)?, name, BooleanArray)
    }

    /// Reads a char array field.
    fn read_char_array(&mut self, name: &str) -> Result<Option<Vec<u16>>> {
        expect_variant!(self.read_field(name, FieldType::CharArray)?, name, CharArray)
    }

    /// Reads a byte array field.
    fn read_byte_array(&mut self, name: &str) -> Result<Option<Vec<i8>>> {
        expect_variant!(self.read_field(name, FieldType::ByteArray)?, name, ByteArray)
    }

    /// Reads a short array field.
    fn read_short_array(&mut self, name: &str) -> Result<Option<Vec<i16>>> {
        expect_variant!(self.read_field(name, FieldType::ShortArray)?, name, ShortArray)
    }

    /// Reads an int array field.
    fn read_int_array(&mut self, name: &str) -> Result<Option<Vec<i32>>> {
        expect_variant!(self.read_field(name, FieldType::IntArray)?, name, IntArray)
    }

    /// Reads a long array field.
    fn read_long_array(&mut self, name: &str) -> Result<Option<Vec<i64>>> {
        expect_variant!(self.read_field(name, FieldType::LongArray)?, name, LongArray)
    }

    /// Reads a float array field.
    fn read_float_array(&mut self, name: &str) -> Result<Option<Vec<f32>>> {
        expect_variant!(self.read_field(name, FieldType::FloatArray)?, name, FloatArray)
    }

    /// Reads a double array field.
    fn read_double_array(&mut self, name: &str) -> Result<Option<Vec<f64>>> {
        expect_variant!(self.read_field(name, FieldType::DoubleArray)?, name, DoubleArray)
    }

    /// Reads a string array field.
    fn read_string_array(&mut self, name: &str) -> Result<Option<Vec<Option<String>>>> {
        expect_variant!(self.read_field(name, FieldType::StringArray)?, name, StringArray)
    }

    /// Reads an object array field.
    fn read_object_array(&mut self, name: &str) -> Result<Option<Vec<Value>>> {
        expect_variant!(self.read_field(name, FieldType::ObjectArray)?, name, ObjectArray)
    }

    /// Reads an array of byte arrays.
    fn read_array_of_byte_arrays(&mut self, name: &str) -> Result<Option<Vec<Option<Vec<i8>>>>> {
        expect_variant!(
            self.read_field(name, FieldType::ArrayOfByteArrays)?,
            name,
            ArrayOfByteArrays
        )
    }
}

/// A `PdxReader` over the fields of a `PdxInstance`.
#[derive(Debug)]
pub struct InstanceReader<'a> {
    instance: &'a PdxInstance,
}

impl<'a> InstanceReader<'a> {
    /// Creates a reader over `instance`.
    pub fn new(instance: &'a PdxInstance) -> Self {
        Self { instance }
    }
}

impl PdxReader for InstanceReader<'_> {
    fn read_field(&mut self, name: &str, field_type: FieldType) -> Result<FieldValue> {
        if self.instance.has_field(name) {
            self.instance.get_field_as(name, field_type)
        } else {
            Ok(field_type.default_value())
        }
    }

    fn has_field(&self, name: &str) -> bool {
        self.instance.has_field(name)
    }
}

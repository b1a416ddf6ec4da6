//! Logical field types of the PDX format.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PdxError, Result};

use super::FieldValue;
use crate::serialization::Value;

/// The logical type of a PDX field.
///
/// Discriminants are the type ids shared with peer implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum FieldType {
    /// Boolean value.
    Boolean = 0,
    /// Signed 8-bit integer.
    Byte = 1,
    /// UTF-16 code unit.
    Char = 2,
    /// Signed 16-bit integer.
    Short = 3,
    /// Signed 32-bit integer.
    Int = 4,
    /// Signed 64-bit integer.
    Long = 5,
    /// 32-bit floating point.
    Float = 6,
    /// 64-bit floating point.
    Double = 7,
    /// Milliseconds since the epoch.
    Date = 8,
    /// String.
    String = 9,
    /// Any tagged object value.
    Object = 10,
    /// Array of booleans.
    BooleanArray = 11,
    /// Array of chars.
    CharArray = 12,
    /// Array of bytes.
    ByteArray = 13,
    /// Array of shorts.
    ShortArray = 14,
    /// Array of ints.
    IntArray = 15,
    /// Array of longs.
    LongArray = 16,
    /// Array of floats.
    FloatArray = 17,
    /// Array of doubles.
    DoubleArray = 18,
    /// Array of strings.
    StringArray = 19,
    /// Array of tagged objects.
    ObjectArray = 20,
    /// Array of byte arrays.
    ArrayOfByteArrays = 21,
}

const DEFAULT_ZERO: [u8; 8] = [0; 8];
const DEFAULT_DATE: [u8; 8] = [0xFF; 8];
const DEFAULT_NULL_STRING: [u8; 1] = [69];
const DEFAULT_NULL_OBJECT: [u8; 1] = [41];
const DEFAULT_NULL_ARRAY: [u8; 1] = [0xFF];

impl FieldType {
    /// Every field type, in id order.
    pub const ALL: [FieldType; 22] = [
        FieldType::Boolean,
        FieldType::Byte,
        FieldType::Char,
        FieldType::Short,
        FieldType::Int,
        FieldType::Long,
        FieldType::Float,
        FieldType::Double,
        FieldType::Date,
        FieldType::String,
        FieldType::Object,
        FieldType::BooleanArray,
        FieldType::CharArray,
        FieldType::ByteArray,
        FieldType::ShortArray,
        FieldType::IntArray,
        FieldType::LongArray,
        FieldType::FloatArray,
        FieldType::DoubleArray,
        FieldType::StringArray,
        FieldType::ObjectArray,
        FieldType::ArrayOfByteArrays,
    ];

    /// Creates a FieldType from its wire id.
    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or_else(|| PdxError::Serialization(format!("unknown field type id: {}", id)))
    }

    /// Returns the wire id of this field type.
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Returns the encoded width for fixed-length types, `None` otherwise.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Boolean | Self::Byte => Some(1),
            Self::Char | Self::Short => Some(2),
            Self::Int | Self::Float => Some(4),
            Self::Long | Self::Double | Self::Date => Some(8),
            Self::String
            | Self::Object
            | Self::BooleanArray
            | Self::CharArray
            | Self::ByteArray
            | Self::ShortArray
            | Self::IntArray
            | Self::LongArray
            | Self::FloatArray
            | Self::DoubleArray
            | Self::StringArray
            | Self::ObjectArray
            | Self::ArrayOfByteArrays => None,
        }
    }

    /// Returns true if values of this type always occupy the same width.
    pub fn is_fixed_length(&self) -> bool {
        self.fixed_width().is_some()
    }

    /// Returns true if this is an array type.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Self::BooleanArray
                | Self::CharArray
                | Self::ByteArray
                | Self::ShortArray
                | Self::IntArray
                | Self::LongArray
                | Self::FloatArray
                | Self::DoubleArray
                | Self::StringArray
                | Self::ObjectArray
                | Self::ArrayOfByteArrays
        )
    }

    /// Returns true if identity operations must decode the value instead
    /// of working on raw bytes.
    pub fn needs_deep_compare(&self) -> bool {
        matches!(self, Self::Object | Self::ObjectArray)
    }

    /// Returns the encoding of an unset field of this type.
    pub fn default_bytes(&self) -> &'static [u8] {
        match self {
            Self::Boolean | Self::Byte => &DEFAULT_ZERO[..1],
            Self::Char | Self::Short => &DEFAULT_ZERO[..2],
            Self::Int | Self::Float => &DEFAULT_ZERO[..4],
            Self::Long | Self::Double => &DEFAULT_ZERO[..8],
            Self::Date => &DEFAULT_DATE,
            Self::String => &DEFAULT_NULL_STRING,
            Self::Object => &DEFAULT_NULL_OBJECT,
            Self::BooleanArray
            | Self::CharArray
            | Self::ByteArray
            | Self::ShortArray
            | Self::IntArray
            | Self::LongArray
            | Self::FloatArray
            | Self::DoubleArray
            | Self::StringArray
            | Self::ObjectArray
            | Self::ArrayOfByteArrays => &DEFAULT_NULL_ARRAY,
        }
    }

    /// Returns the value an unset field of this type reads as.
    pub fn default_value(&self) -> FieldValue {
        match self {
            Self::Boolean => FieldValue::Boolean(false),
            Self::Byte => FieldValue::Byte(0),
            Self::Char => FieldValue::Char(0),
            Self::Short => FieldValue::Short(0),
            Self::Int => FieldValue::Int(0),
            Self::Long => FieldValue::Long(0),
            Self::Float => FieldValue::Float(0.0),
            Self::Double => FieldValue::Double(0.0),
            Self::Date => FieldValue::Date(None),
            Self::String => FieldValue::String(None),
            Self::Object => FieldValue::Object(Value::Null),
            Self::BooleanArray => FieldValue::BooleanArray(None),
            Self::CharArray => FieldValue::CharArray(None),
            Self::ByteArray => FieldValue::ByteArray(None),
            Self::ShortArray => FieldValue::ShortArray(None),
            Self::IntArray => FieldValue::IntArray(None),
            Self::LongArray => FieldValue::LongArray(None),
            Self::FloatArray => FieldValue::FloatArray(None),
            Self::DoubleArray => FieldValue::DoubleArray(None),
            Self::StringArray => FieldValue::StringArray(None),
            Self::ObjectArray => FieldValue::ObjectArray(None),
            Self::ArrayOfByteArrays => FieldValue::ArrayOfByteArrays(None),
        }
    }

    /// Returns the Java name of the type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Date => "Date",
            Self::String => "String",
            Self::Object => "Object",
            Self::BooleanArray => "boolean[]",
            Self::CharArray => "char[]",
            Self::ByteArray => "byte[]",
            Self::ShortArray => "short[]",
            Self::IntArray => "int[]",
            Self::LongArray => "long[]",
            Self::FloatArray => "float[]",
            Self::DoubleArray => "double[]",
            Self::StringArray => "String[]",
            Self::ObjectArray => "Object[]",
            Self::ArrayOfByteArrays => "byte[][]",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::ObjectDataOutput;

    #[test]
    fn test_field_type_ids_round_trip() {
        for (i, ft) in FieldType::ALL.iter().enumerate() {
            assert_eq!(ft.id() as usize, i);
            assert_eq!(FieldType::from_id(ft.id()).unwrap(), *ft);
        }
    }

    #[test]
    fn test_unknown_field_type_id() {
        assert!(FieldType::from_id(22).is_err());
        assert!(FieldType::from_id(255).is_err());
    }

    #[test]
    fn test_peer_ids() {
        assert_eq!(FieldType::Boolean.id(), 0);
        assert_eq!(FieldType::Date.id(), 8);
        assert_eq!(FieldType::String.id(), 9);
        assert_eq!(FieldType::Object.id(), 10);
        assert_eq!(FieldType::ByteArray.id(), 13);
        assert_eq!(FieldType::ArrayOfByteArrays.id(), 21);
    }

    #[test]
    fn test_fixed_widths() {
        assert_eq!(FieldType::Boolean.fixed_width(), Some(1));
        assert_eq!(FieldType::Char.fixed_width(), Some(2));
        assert_eq!(FieldType::Float.fixed_width(), Some(4));
        assert_eq!(FieldType::Date.fixed_width(), Some(8));
        assert_eq!(FieldType::String.fixed_width(), None);
        assert!(!FieldType::IntArray.is_fixed_length());
    }

    #[test]
    fn test_default_bytes() {
        assert_eq!(FieldType::Boolean.default_bytes(), &[0]);
        assert_eq!(FieldType::Short.default_bytes(), &[0, 0]);
        assert_eq!(FieldType::Int.default_bytes(), &[0, 0, 0, 0]);
        assert_eq!(FieldType::Double.default_bytes(), &[0; 8]);
        assert_eq!(FieldType::Date.default_bytes(), &[0xFF; 8]);
        assert_eq!(FieldType::String.default_bytes(), &[69]);
        assert_eq!(FieldType::Object.default_bytes(), &[41]);
        assert_eq!(FieldType::ObjectArray.default_bytes(), &[0xFF]);
    }

    #[test]
    fn test_default_value_encodes_to_default_bytes() {
        for ft in FieldType::ALL {
            let mut output = ObjectDataOutput::new();
            ft.default_value().write(&mut output).unwrap();
            assert_eq!(output.as_bytes(), ft.default_bytes(), "{}", ft);
            assert_eq!(ft.default_value().field_type(), ft);
        }
    }

    #[test]
    fn test_fixed_width_matches_default_bytes() {
        for ft in FieldType::ALL {
            if let Some(width) = ft.fixed_width() {
                assert_eq!(ft.default_bytes().len(), width);
            }
        }
    }

    #[test]
    fn test_deep_compare_types() {
        assert!(FieldType::Object.needs_deep_compare());
        assert!(FieldType::ObjectArray.needs_deep_compare());
        assert!(!FieldType::StringArray.needs_deep_compare());
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldType::Int.to_string(), "int");
        assert_eq!(FieldType::ArrayOfByteArrays.to_string(), "byte[][]");
    }
}

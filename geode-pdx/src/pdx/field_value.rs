//! Typed values of PDX fields and their field-level encoding.

use std::fmt;
use std::sync::Arc;

use crate::context::PdxContext;
use crate::error::Result;
use crate::serialization::value::{
    char_display, read_array, read_object_array, write_array, write_list, write_object_array,
    DecodeScope,
};
use crate::serialization::{DataInput, DataOutput, Value};

use super::FieldType;

/// The value of one PDX field, tagged with its logical type.
///
/// Nullable kinds use `Option`; `None` encodes as the type's null sentinel.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum FieldValue {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Milliseconds since the epoch; `None` is the null date.
    Date(Option<i64>),
    String(Option<String>),
    Object(Value),
    BooleanArray(Option<Vec<bool>>),
    CharArray(Option<Vec<u16>>),
    ByteArray(Option<Vec<i8>>),
    ShortArray(Option<Vec<i16>>),
    IntArray(Option<Vec<i32>>),
    LongArray(Option<Vec<i64>>),
    FloatArray(Option<Vec<f32>>),
    DoubleArray(Option<Vec<f64>>),
    StringArray(Option<Vec<Option<String>>>),
    ObjectArray(Option<Vec<Value>>),
    ArrayOfByteArrays(Option<Vec<Option<Vec<i8>>>>),
}

/// Date value written for a null date.
const NULL_DATE: i64 = -1;

/// Unwraps `$value` as `FieldValue::$variant` or fails with a type mismatch
/// on field `$name`.
macro_rules! expect_variant {
    ($value:expr, $name:expr, $variant:ident) => {
        match $value {
            $crate::pdx::FieldValue::$variant(v) => Ok(v),
            other => Err($crate::error::PdxError::type_mismatch(
                $name,
                $crate::pdx::FieldType::$variant,
                other.field_type(),
            )),
        }
    };
}

pub(crate) use expect_variant;

impl FieldValue {
    /// Returns the logical type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Boolean(_) => FieldType::Boolean,
            FieldValue::Byte(_) => FieldType::Byte,
            FieldValue::Char(_) => FieldType::Char,
            FieldValue::Short(_) => FieldType::Short,
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Long(_) => FieldType::Long,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Double(_) => FieldType::Double,
            FieldValue::Date(_) => FieldType::Date,
            FieldValue::String(_) => FieldType::String,
            FieldValue::Object(_) => FieldType::Object,
            FieldValue::BooleanArray(_) => FieldType::BooleanArray,
            FieldValue::CharArray(_) => FieldType::CharArray,
            FieldValue::ByteArray(_) => FieldType::ByteArray,
            FieldValue::ShortArray(_) => FieldType::ShortArray,
            FieldValue::IntArray(_) => FieldType::IntArray,
            FieldValue::LongArray(_) => FieldType::LongArray,
            FieldValue::FloatArray(_) => FieldType::FloatArray,
            FieldValue::DoubleArray(_) => FieldType::DoubleArray,
            FieldValue::StringArray(_) => FieldType::StringArray,
            FieldValue::ObjectArray(_) => FieldType::ObjectArray,
            FieldValue::ArrayOfByteArrays(_) => FieldType::ArrayOfByteArrays,
        }
    }

    /// Writes the field encoding of this value (no type code, no name).
    pub fn write(&self, output: &mut dyn DataOutput) -> Result<()> {
        match self {
            FieldValue::Boolean(v) => output.write_bool(*v),
            FieldValue::Byte(v) => output.write_byte(*v),
            FieldValue::Char(v) => output.write_char(*v),
            FieldValue::Short(v) => output.write_short(*v),
            FieldValue::Int(v) => output.write_int(*v),
            FieldValue::Long(v) => output.write_long(*v),
            FieldValue::Float(v) => output.write_float(*v),
            FieldValue::Double(v) => output.write_double(*v),
            FieldValue::Date(v) => output.write_long(v.unwrap_or(NULL_DATE)),
            FieldValue::String(v) => output.write_string(v.as_deref()),
            FieldValue::Object(v) => v.write(output),
            FieldValue::BooleanArray(v) => {
                write_array(output, v.as_deref(), |o, b| o.write_bool(*b))
            }
            FieldValue::CharArray(v) => write_array(output, v.as_deref(), |o, c| o.write_char(*c)),
            FieldValue::ByteArray(v) => write_array(output, v.as_deref(), |o, b| o.write_byte(*b)),
            FieldValue::ShortArray(v) => {
                write_array(output, v.as_deref(), |o, s| o.write_short(*s))
            }
            FieldValue::IntArray(v) => write_array(output, v.as_deref(), |o, i| o.write_int(*i)),
            FieldValue::LongArray(v) => write_array(output, v.as_deref(), |o, l| o.write_long(*l)),
            FieldValue::FloatArray(v) => {
                write_array(output, v.as_deref(), |o, f| o.write_float(*f))
            }
            FieldValue::DoubleArray(v) => {
                write_array(output, v.as_deref(), |o, d| o.write_double(*d))
            }
            FieldValue::StringArray(v) => {
                write_array(output, v.as_deref(), |o, s| o.write_string(s.as_deref()))
            }
            FieldValue::ObjectArray(v) => write_object_array(output, v.as_deref()),
            FieldValue::ArrayOfByteArrays(v) => write_array(output, v.as_deref(), |o, bytes| {
                write_array(o, bytes.as_deref(), |o, b| o.write_byte(*b))
            }),
        }
    }

    /// Reads a value of `field_type` from its field encoding.
    pub fn read(
        field_type: FieldType,
        input: &mut dyn DataInput,
        ctx: &Arc<PdxContext>,
    ) -> Result<FieldValue> {
        Self::read_nested(field_type, input, ctx, DecodeScope::root(ctx))
    }

    pub(crate) fn read_nested(
        field_type: FieldType,
        input: &mut dyn DataInput,
        ctx: &Arc<PdxContext>,
        scope: DecodeScope,
    ) -> Result<FieldValue> {
        let value = match field_type {
            FieldType::Boolean => FieldValue::Boolean(input.read_bool()?),
            FieldType::Byte => FieldValue::Byte(input.read_byte()?),
            FieldType::Char => FieldValue::Char(input.read_char()?),
            FieldType::Short => FieldValue::Short(input.read_short()?),
            FieldType::Int => FieldValue::Int(input.read_int()?),
            FieldType::Long => FieldValue::Long(input.read_long()?),
            FieldType::Float => FieldValue::Float(input.read_float()?),
            FieldType::Double => FieldValue::Double(input.read_double()?),
            FieldType::Date => {
                let millis = input.read_long()?;
                FieldValue::Date((millis != NULL_DATE).then_some(millis))
            }
            FieldType::String => FieldValue::String(input.read_string()?),
            FieldType::Object => FieldValue::Object(Value::read_nested(input, ctx, scope)?),
            FieldType::BooleanArray => {
                FieldValue::BooleanArray(read_array(input, |i| i.read_bool())?)
            }
            FieldType::CharArray => FieldValue::CharArray(read_array(input, |i| i.read_char())?),
            FieldType::ByteArray => FieldValue::ByteArray(read_array(input, |i| i.read_byte())?),
            FieldType::ShortArray => {
                FieldValue::ShortArray(read_array(input, |i| i.read_short())?)
            }
            FieldType::IntArray => FieldValue::IntArray(read_array(input, |i| i.read_int())?),
            FieldType::LongArray => FieldValue::LongArray(read_array(input, |i| i.read_long())?),
            FieldType::FloatArray => {
                FieldValue::FloatArray(read_array(input, |i| i.read_float())?)
            }
            FieldType::DoubleArray => {
                FieldValue::DoubleArray(read_array(input, |i| i.read_double())?)
            }
            FieldType::StringArray => {
                FieldValue::StringArray(read_array(input, |i| i.read_string())?)
            }
            FieldType::ObjectArray => {
                FieldValue::ObjectArray(read_object_array(input, ctx, scope)?)
            }
            FieldType::ArrayOfByteArrays => FieldValue::ArrayOfByteArrays(read_array(input, |i| {
                read_array(i, |i| i.read_byte())
            })?),
        };
        Ok(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt<T>(
            f: &mut fmt::Formatter<'_>,
            v: &Option<Vec<T>>,
            item: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
        ) -> fmt::Result {
            match v {
                Some(v) => write_list(f, v, item),
                None => f.write_str("null"),
            }
        }

        match self {
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::Byte(v) => write!(f, "{}", v),
            FieldValue::Char(v) => write!(f, "{}", char_display(*v)),
            FieldValue::Short(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Long(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{:?}", v),
            FieldValue::Double(v) => write!(f, "{:?}", v),
            FieldValue::Date(Some(v)) => write!(f, "{}", v),
            FieldValue::Date(None) | FieldValue::String(None) => f.write_str("null"),
            FieldValue::String(Some(s)) => f.write_str(s),
            FieldValue::Object(v) => write!(f, "{}", v),
            FieldValue::BooleanArray(v) => opt(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::CharArray(v) => opt(f, v, |f, x| write!(f, "{}", char_display(*x))),
            FieldValue::ByteArray(v) => opt(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::ShortArray(v) => opt(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::IntArray(v) => opt(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::LongArray(v) => opt(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::FloatArray(v) => opt(f, v, |f, x| write!(f, "{:?}", x)),
            FieldValue::DoubleArray(v) => opt(f, v, |f, x| write!(f, "{:?}", x)),
            FieldValue::StringArray(v) => {
                opt(f, v, |f, x| f.write_str(x.as_deref().unwrap_or("null")))
            }
            FieldValue::ObjectArray(v) => opt(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::ArrayOfByteArrays(v) => opt(f, v, |f, x| match x {
                Some(bytes) => write_list(f, bytes, |f, b| write!(f, "{}", b)),
                None => f.write_str("null"),
            }),
        }
    }
}

//! Runtime model of tagged object values.
//!
//! `OBJECT` and `OBJECT_ARRAY` fields hold values of arbitrary built-in
//! kinds: boxed primitives, strings, arrays, the collection containers,
//! nested PDX instances and user `DataSerializable` objects. Identity
//! operations on such fields decode them into a [`Value`] and use the Java
//! `hashCode`/`equals` contracts defined here.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::context::PdxContext;
use crate::error::{PdxError, Result};
use crate::pdx::PdxInstance;

use super::data_serializable::DataSerializable;
use super::ds_code::{ClassId, DsCode};
use super::{DataInput, DataOutput};

/// Component class written in front of object-array elements.
pub const OBJECT_ARRAY_COMPONENT_CLASS: &str = "java.lang.Object";

/// Deepest nesting of containers and PDX instances accepted when decoding.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Position of a value being decoded: how deeply it is nested and which
/// registry epoch nested PDX instances resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DecodeScope {
    pub(crate) depth: usize,
    pub(crate) epoch: u64,
}

impl DecodeScope {
    pub(crate) fn root(ctx: &PdxContext) -> Self {
        Self {
            depth: 0,
            epoch: ctx.registry().epoch(),
        }
    }

    fn deeper(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }
}

/// A decoded tagged value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The null object.
    #[default]
    Null,
    /// Boxed boolean.
    Boolean(bool),
    /// Boxed UTF-16 code unit.
    Char(u16),
    /// Boxed byte.
    Byte(i8),
    /// Boxed short.
    Short(i16),
    /// Boxed int.
    Int(i32),
    /// Boxed long.
    Long(i64),
    /// Boxed float.
    Float(f32),
    /// Boxed double.
    Double(f64),
    /// Date as milliseconds since the epoch.
    Date(i64),
    /// String.
    String(String),
    /// Byte array.
    Bytes(Vec<i8>),
    /// Boolean array.
    BooleanArray(Vec<bool>),
    /// Char array.
    CharArray(Vec<u16>),
    /// Short array.
    ShortArray(Vec<i16>),
    /// Int array.
    IntArray(Vec<i32>),
    /// Long array.
    LongArray(Vec<i64>),
    /// Float array.
    FloatArray(Vec<f32>),
    /// Double array.
    DoubleArray(Vec<f64>),
    /// String array; elements may be null.
    StringArray(Vec<Option<String>>),
    /// Array of objects.
    ObjectArray(Vec<Value>),
    /// `java.util.ArrayList`.
    ArrayList(Vec<Value>),
    /// `java.util.LinkedList`.
    LinkedList(Vec<Value>),
    /// `java.util.Vector`.
    Vector(Vec<Value>),
    /// `java.util.HashSet`, in wire order.
    HashSet(Vec<Value>),
    /// `java.util.LinkedHashSet`.
    LinkedHashSet(Vec<Value>),
    /// `java.util.HashMap`, in wire order.
    HashMap(Vec<(Value, Value)>),
    /// `java.util.Hashtable`, in wire order.
    HashTable(Vec<(Value, Value)>),
    /// A nested PDX object.
    Pdx(PdxInstance),
    /// An application `DataSerializable` object.
    UserObject(Arc<dyn DataSerializable>),
}

impl Value {
    /// Returns true for the null object.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns a short name of the value's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "Boolean",
            Value::Char(_) => "Character",
            Value::Byte(_) => "Byte",
            Value::Short(_) => "Short",
            Value::Int(_) => "Integer",
            Value::Long(_) => "Long",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::Date(_) => "Date",
            Value::String(_) => "String",
            Value::Bytes(_) => "byte[]",
            Value::BooleanArray(_) => "boolean[]",
            Value::CharArray(_) => "char[]",
            Value::ShortArray(_) => "short[]",
            Value::IntArray(_) => "int[]",
            Value::LongArray(_) => "long[]",
            Value::FloatArray(_) => "float[]",
            Value::DoubleArray(_) => "double[]",
            Value::StringArray(_) => "String[]",
            Value::ObjectArray(_) => "Object[]",
            Value::ArrayList(_) => "ArrayList",
            Value::LinkedList(_) => "LinkedList",
            Value::Vector(_) => "Vector",
            Value::HashSet(_) => "HashSet",
            Value::LinkedHashSet(_) => "LinkedHashSet",
            Value::HashMap(_) => "HashMap",
            Value::HashTable(_) => "Hashtable",
            Value::Pdx(_) => "PdxInstance",
            Value::UserObject(_) => "DataSerializable",
        }
    }

    /// Reads one tagged value.
    ///
    /// # Errors
    ///
    /// Returns `PdxError::Serialization` for malformed input, including
    /// nesting deeper than [`MAX_NESTING_DEPTH`].
    pub fn read(input: &mut dyn DataInput, ctx: &Arc<PdxContext>) -> Result<Value> {
        Self::read_nested(input, ctx, DecodeScope::root(ctx))
    }

    pub(crate) fn read_nested(
        input: &mut dyn DataInput,
        ctx: &Arc<PdxContext>,
        scope: DecodeScope,
    ) -> Result<Value> {
        if scope.depth > MAX_NESTING_DEPTH {
            return Err(PdxError::Serialization(format!(
                "value nesting exceeds {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        let code = input.read_unsigned_byte()?;
        Self::read_body(code, input, ctx, scope)
    }

    fn read_body(
        code: u8,
        input: &mut dyn DataInput,
        ctx: &Arc<PdxContext>,
        scope: DecodeScope,
    ) -> Result<Value> {
        let ds = DsCode::from_code(code)
            .ok_or_else(|| PdxError::Serialization(format!("unknown type code: {}", code)))?;
        let value = match ds {
            DsCode::NullObj | DsCode::NullString => Value::Null,
            DsCode::CacheableString
            | DsCode::CacheableStringHuge
            | DsCode::CacheableAsciiString
            | DsCode::CacheableAsciiStringHuge => match input.read_string_body(code)? {
                Some(s) => Value::String(s),
                None => Value::Null,
            },
            DsCode::CacheableBoolean => Value::Boolean(input.read_bool()?),
            DsCode::CacheableCharacter => Value::Char(input.read_char()?),
            DsCode::CacheableByte => Value::Byte(input.read_byte()?),
            DsCode::CacheableInt16 => Value::Short(input.read_short()?),
            DsCode::CacheableInt32 => Value::Int(input.read_int()?),
            DsCode::CacheableInt64 => Value::Long(input.read_long()?),
            DsCode::CacheableFloat => Value::Float(input.read_float()?),
            DsCode::CacheableDouble => Value::Double(input.read_double()?),
            DsCode::CacheableDate => Value::Date(input.read_long()?),
            DsCode::CacheableBytes => or_null(read_array(input, |i| i.read_byte())?, Value::Bytes),
            DsCode::BooleanArray => {
                or_null(read_array(input, |i| i.read_bool())?, Value::BooleanArray)
            }
            DsCode::CharArray => or_null(read_array(input, |i| i.read_char())?, Value::CharArray),
            DsCode::CacheableInt16Array => {
                or_null(read_array(input, |i| i.read_short())?, Value::ShortArray)
            }
            DsCode::CacheableInt32Array => {
                or_null(read_array(input, |i| i.read_int())?, Value::IntArray)
            }
            DsCode::CacheableInt64Array => {
                or_null(read_array(input, |i| i.read_long())?, Value::LongArray)
            }
            DsCode::CacheableFloatArray => {
                or_null(read_array(input, |i| i.read_float())?, Value::FloatArray)
            }
            DsCode::CacheableDoubleArray => {
                or_null(read_array(input, |i| i.read_double())?, Value::DoubleArray)
            }
            DsCode::CacheableStringArray => {
                or_null(read_array(input, |i| i.read_string())?, Value::StringArray)
            }
            DsCode::CacheableObjectArray => {
                or_null(read_object_array(input, ctx, scope)?, Value::ObjectArray)
            }
            DsCode::CacheableArrayList => {
                let values = read_array(input, |i| Value::read_nested(i, ctx, scope.deeper()))?;
                or_null(values, Value::ArrayList)
            }
            DsCode::CacheableLinkedList => {
                let values = read_array(input, |i| Value::read_nested(i, ctx, scope.deeper()))?;
                or_null(values, Value::LinkedList)
            }
            DsCode::CacheableVector => {
                let values = read_array(input, |i| Value::read_nested(i, ctx, scope.deeper()))?;
                or_null(values, Value::Vector)
            }
            DsCode::CacheableHashSet => {
                let values = read_array(input, |i| Value::read_nested(i, ctx, scope.deeper()))?;
                or_null(values, Value::HashSet)
            }
            DsCode::CacheableLinkedHashSet => {
                let values = read_array(input, |i| Value::read_nested(i, ctx, scope.deeper()))?;
                or_null(values, Value::LinkedHashSet)
            }
            DsCode::CacheableHashMap => or_null(read_entries(input, ctx, scope)?, Value::HashMap),
            DsCode::CacheableHashTable => or_null(read_entries(input, ctx, scope)?, Value::HashTable),
            DsCode::Pdx => {
                let len = input.read_int()?;
                let type_id = input.read_int()?;
                if len < 0 {
                    return Err(PdxError::Serialization(format!(
                        "invalid PDX length: {}",
                        len
                    )));
                }
                let payload = input.read_bytes(len as usize)?;
                Value::Pdx(
                    PdxInstance::from_payload(Arc::clone(ctx), type_id, Bytes::from(payload))
                        .nested_in(scope.deeper()),
                )
            }
            DsCode::CacheableUserData
            | DsCode::CacheableUserData2
            | DsCode::CacheableUserData4
            | DsCode::FixedIdByte
            | DsCode::FixedIdShort
            | DsCode::FixedIdInt => {
                let class_id = ClassId::read_after(ds, input)?;
                let mut object = ctx.data_serializables().create(class_id).ok_or_else(|| {
                    PdxError::Serialization(format!(
                        "no DataSerializable factory registered for {:?}",
                        class_id
                    ))
                })?;
                object.from_data(input)?;
                Value::UserObject(Arc::from(object))
            }
            DsCode::Class => {
                return Err(PdxError::Serialization(
                    "class literal is not a value".to_string(),
                ))
            }
        };
        Ok(value)
    }

    /// Writes this value with its type code.
    pub fn write(&self, output: &mut dyn DataOutput) -> Result<()> {
        match self {
            Value::Null => tag(output, DsCode::NullObj),
            Value::Boolean(v) => {
                tag(output, DsCode::CacheableBoolean)?;
                output.write_bool(*v)
            }
            Value::Char(v) => {
                tag(output, DsCode::CacheableCharacter)?;
                output.write_char(*v)
            }
            Value::Byte(v) => {
                tag(output, DsCode::CacheableByte)?;
                output.write_byte(*v)
            }
            Value::Short(v) => {
                tag(output, DsCode::CacheableInt16)?;
                output.write_short(*v)
            }
            Value::Int(v) => {
                tag(output, DsCode::CacheableInt32)?;
                output.write_int(*v)
            }
            Value::Long(v) => {
                tag(output, DsCode::CacheableInt64)?;
                output.write_long(*v)
            }
            Value::Float(v) => {
                tag(output, DsCode::CacheableFloat)?;
                output.write_float(*v)
            }
            Value::Double(v) => {
                tag(output, DsCode::CacheableDouble)?;
                output.write_double(*v)
            }
            Value::Date(v) => {
                tag(output, DsCode::CacheableDate)?;
                output.write_long(*v)
            }
            Value::String(s) => output.write_string(Some(s)),
            Value::Bytes(v) => {
                tag(output, DsCode::CacheableBytes)?;
                write_array(output, Some(v), |o, b| o.write_byte(*b))
            }
            Value::BooleanArray(v) => {
                tag(output, DsCode::BooleanArray)?;
                write_array(output, Some(v), |o, b| o.write_bool(*b))
            }
            Value::CharArray(v) => {
                tag(output, DsCode::CharArray)?;
                write_array(output, Some(v), |o, c| o.write_char(*c))
            }
            Value::ShortArray(v) => {
                tag(output, DsCode::CacheableInt16Array)?;
                write_array(output, Some(v), |o, s| o.write_short(*s))
            }
            Value::IntArray(v) => {
                tag(output, DsCode::CacheableInt32Array)?;
                write_array(output, Some(v), |o, i| o.write_int(*i))
            }
            Value::LongArray(v) => {
                tag(output, DsCode::CacheableInt64Array)?;
                write_array(output, Some(v), |o, l| o.write_long(*l))
            }
            Value::FloatArray(v) => {
                tag(output, DsCode::CacheableFloatArray)?;
                write_array(output, Some(v), |o, f| o.write_float(*f))
            }
            Value::DoubleArray(v) => {
                tag(output, DsCode::CacheableDoubleArray)?;
                write_array(output, Some(v), |o, d| o.write_double(*d))
            }
            Value::StringArray(v) => {
                tag(output, DsCode::CacheableStringArray)?;
                write_array(output, Some(v), |o, s| o.write_string(s.as_deref()))
            }
            Value::ObjectArray(v) => {
                tag(output, DsCode::CacheableObjectArray)?;
                write_object_array(output, Some(v))
            }
            Value::ArrayList(v) => write_collection(output, DsCode::CacheableArrayList, v),
            Value::LinkedList(v) => write_collection(output, DsCode::CacheableLinkedList, v),
            Value::Vector(v) => write_collection(output, DsCode::CacheableVector, v),
            Value::HashSet(v) => write_collection(output, DsCode::CacheableHashSet, v),
            Value::LinkedHashSet(v) => write_collection(output, DsCode::CacheableLinkedHashSet, v),
            Value::HashMap(entries) => write_entries(output, DsCode::CacheableHashMap, entries),
            Value::HashTable(entries) => write_entries(output, DsCode::CacheableHashTable, entries),
            Value::Pdx(instance) => instance.write_to(output),
            Value::UserObject(object) => {
                object.class_id().write(output)?;
                object.to_data(output)
            }
        }
    }

    /// Computes the Java `hashCode` of this value.
    ///
    /// Lists and arrays use the 31-polynomial, sets sum their element
    /// hashes and maps sum `key ^ value` per entry.
    pub fn hash_code(&self) -> Result<i32> {
        let hash = match self {
            Value::Null => 0,
            Value::Boolean(v) => java_bool_hash(*v),
            Value::Char(v) => *v as i32,
            Value::Byte(v) => *v as i32,
            Value::Short(v) => *v as i32,
            Value::Int(v) => *v,
            Value::Long(v) | Value::Date(v) => java_long_hash(*v),
            Value::Float(v) => java_float_hash(*v),
            Value::Double(v) => java_double_hash(*v),
            Value::String(s) => java_string_hash(s),
            Value::Bytes(v) => polynomial_hash(v, |b| Ok(*b as i32))?,
            Value::BooleanArray(v) => polynomial_hash(v, |b| Ok(java_bool_hash(*b)))?,
            Value::CharArray(v) => polynomial_hash(v, |c| Ok(*c as i32))?,
            Value::ShortArray(v) => polynomial_hash(v, |s| Ok(*s as i32))?,
            Value::IntArray(v) => polynomial_hash(v, |i| Ok(*i))?,
            Value::LongArray(v) => polynomial_hash(v, |l| Ok(java_long_hash(*l)))?,
            Value::FloatArray(v) => polynomial_hash(v, |f| Ok(java_float_hash(*f)))?,
            Value::DoubleArray(v) => polynomial_hash(v, |d| Ok(java_double_hash(*d)))?,
            Value::StringArray(v) => {
                polynomial_hash(v, |s| Ok(s.as_deref().map_or(0, java_string_hash)))?
            }
            Value::ObjectArray(v)
            | Value::ArrayList(v)
            | Value::LinkedList(v)
            | Value::Vector(v) => polynomial_hash(v, Value::hash_code)?,
            Value::HashSet(v) | Value::LinkedHashSet(v) => v
                .iter()
                .try_fold(0i32, |h, e| Ok::<_, PdxError>(h.wrapping_add(e.hash_code()?)))?,
            Value::HashMap(entries) | Value::HashTable(entries) => {
                entries.iter().try_fold(0i32, |h, (k, v)| {
                    Ok::<_, PdxError>(h.wrapping_add(k.hash_code()? ^ v.hash_code()?))
                })?
            }
            Value::Pdx(instance) => instance.hashcode()?,
            Value::UserObject(object) => {
                return Err(PdxError::UnsupportedKeyType(format!(
                    "cannot hash DataSerializable {:?}",
                    object.class_id()
                )))
            }
        };
        Ok(hash)
    }

    /// Compares two values with Java `equals` semantics, recursing into
    /// containers and nested PDX instances.
    ///
    /// Lists compare across list kinds, sets across set kinds and maps
    /// across map kinds, independent of element order for sets and maps.
    pub fn deep_equals(&self, other: &Value) -> Result<bool> {
        if let Value::UserObject(object) = self {
            return Err(unsupported_compare(object.as_ref()));
        }
        if let Value::UserObject(object) = other {
            return Err(unsupported_compare(object.as_ref()));
        }
        let equal = match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => java_float_bits(*a) == java_float_bits(*b),
            (Value::Double(a), Value::Double(b)) => java_double_bits(*a) == java_double_bits(*b),
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::BooleanArray(a), Value::BooleanArray(b)) => a == b,
            (Value::CharArray(a), Value::CharArray(b)) => a == b,
            (Value::ShortArray(a), Value::ShortArray(b)) => a == b,
            (Value::IntArray(a), Value::IntArray(b)) => a == b,
            (Value::LongArray(a), Value::LongArray(b)) => a == b,
            (Value::FloatArray(a), Value::FloatArray(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| java_float_bits(*x) == java_float_bits(*y))
            }
            (Value::DoubleArray(a), Value::DoubleArray(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| java_double_bits(*x) == java_double_bits(*y))
            }
            (Value::StringArray(a), Value::StringArray(b)) => a == b,
            (Value::ObjectArray(a), Value::ObjectArray(b)) => sequence_equals(a, b)?,
            (Value::Pdx(a), Value::Pdx(b)) => a.equals(b)?,
            _ => match (self.as_list(), other.as_list()) {
                (Some(a), Some(b)) => sequence_equals(a, b)?,
                _ => match (self.as_set(), other.as_set()) {
                    (Some(a), Some(b)) => set_equals(a, b)?,
                    _ => match (self.as_map(), other.as_map()) {
                        (Some(a), Some(b)) => map_equals(a, b)?,
                        _ => false,
                    },
                },
            },
        };
        Ok(equal)
    }

    fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::ArrayList(v) | Value::LinkedList(v) | Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    fn as_set(&self) -> Option<&[Value]> {
        match self {
            Value::HashSet(v) | Value::LinkedHashSet(v) => Some(v),
            _ => None,
        }
    }

    fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::HashMap(v) | Value::HashTable(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Deep equality; comparisons that cannot be decided are unequal.
    fn eq(&self, other: &Self) -> bool {
        self.deep_equals(other).unwrap_or(false)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<PdxInstance> for Value {
    fn from(v: PdxInstance) -> Self {
        Value::Pdx(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", char_display(*v)),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) | Value::Date(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::String(s) => f.write_str(s),
            Value::Bytes(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            Value::BooleanArray(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            Value::CharArray(v) => write_list(f, v, |f, x| write!(f, "{}", char_display(*x))),
            Value::ShortArray(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            Value::IntArray(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            Value::LongArray(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            Value::FloatArray(v) => write_list(f, v, |f, x| write!(f, "{:?}", x)),
            Value::DoubleArray(v) => write_list(f, v, |f, x| write!(f, "{:?}", x)),
            Value::StringArray(v) => {
                write_list(f, v, |f, x| f.write_str(x.as_deref().unwrap_or("null")))
            }
            Value::ObjectArray(v)
            | Value::ArrayList(v)
            | Value::LinkedList(v)
            | Value::Vector(v)
            | Value::HashSet(v)
            | Value::LinkedHashSet(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            Value::HashMap(entries) | Value::HashTable(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Pdx(instance) => write!(f, "{}", instance),
            Value::UserObject(object) => write!(f, "{:?}", object),
        }
    }
}

pub(crate) fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut item: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    f.write_str("[")?;
    for (i, x) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item(f, x)?;
    }
    f.write_str("]")
}

pub(crate) fn char_display(unit: u16) -> char {
    char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn tag(output: &mut dyn DataOutput, code: DsCode) -> Result<()> {
    output.write_unsigned_byte(code.code())
}

fn or_null<T>(value: Option<T>, wrap: impl FnOnce(T) -> Value) -> Value {
    value.map_or(Value::Null, wrap)
}

/// Reads an array-length prefixed sequence; a null length yields `None`.
pub(crate) fn read_array<T>(
    input: &mut dyn DataInput,
    mut read: impl FnMut(&mut dyn DataInput) -> Result<T>,
) -> Result<Option<Vec<T>>> {
    let len = input.read_array_len()?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    let mut values = Vec::with_capacity(len.min(input.remaining()));
    for _ in 0..len {
        values.push(read(input)?);
    }
    Ok(Some(values))
}

/// Writes an array-length prefixed sequence; `None` writes a null length.
pub(crate) fn write_array<T>(
    output: &mut dyn DataOutput,
    values: Option<&[T]>,
    mut write: impl FnMut(&mut dyn DataOutput, &T) -> Result<()>,
) -> Result<()> {
    match values {
        None => output.write_array_len(-1),
        Some(values) => {
            output.write_array_len(array_len(values.len())?)?;
            for v in values {
                write(output, v)?;
            }
            Ok(())
        }
    }
}

fn array_len(len: usize) -> Result<i32> {
    i32::try_from(len)
        .map_err(|_| PdxError::Serialization(format!("array too long: {} elements", len)))
}

/// Reads an object array body: length, component class, then elements.
pub(crate) fn read_object_array(
    input: &mut dyn DataInput,
    ctx: &Arc<PdxContext>,
    scope: DecodeScope,
) -> Result<Option<Vec<Value>>> {
    let len = input.read_array_len()?;
    if len < 0 {
        return Ok(None);
    }
    let class_code = input.read_unsigned_byte()?;
    if class_code != DsCode::Class.code() {
        return Err(PdxError::Serialization(format!(
            "expected component class in object array, found code {}",
            class_code
        )));
    }
    let name_code = input.read_unsigned_byte()?;
    input.read_string_body(name_code)?;
    let len = len as usize;
    let mut values = Vec::with_capacity(len.min(input.remaining()));
    for _ in 0..len {
        values.push(Value::read_nested(input, ctx, scope.deeper())?);
    }
    Ok(Some(values))
}

/// Writes an object array body: length, component class, then elements.
pub(crate) fn write_object_array(output: &mut dyn DataOutput, values: Option<&[Value]>) -> Result<()> {
    let Some(values) = values else {
        return output.write_array_len(-1);
    };
    output.write_array_len(array_len(values.len())?)?;
    tag(output, DsCode::Class)?;
    tag(output, DsCode::CacheableAsciiString)?;
    output.write_ascii(OBJECT_ARRAY_COMPONENT_CLASS)?;
    for v in values {
        v.write(output)?;
    }
    Ok(())
}

fn read_entries(
    input: &mut dyn DataInput,
    ctx: &Arc<PdxContext>,
    scope: DecodeScope,
) -> Result<Option<Vec<(Value, Value)>>> {
    read_array(input, |i| {
        let key = Value::read_nested(i, ctx, scope.deeper())?;
        let value = Value::read_nested(i, ctx, scope.deeper())?;
        Ok((key, value))
    })
}

fn write_collection(output: &mut dyn DataOutput, code: DsCode, values: &[Value]) -> Result<()> {
    tag(output, code)?;
    write_array(output, Some(values), |o, v| v.write(o))
}

fn write_entries(output: &mut dyn DataOutput, code: DsCode, entries: &[(Value, Value)]) -> Result<()> {
    tag(output, code)?;
    write_array(output, Some(entries), |o, (k, v)| {
        k.write(o)?;
        v.write(o)
    })
}

fn unsupported_compare(object: &dyn DataSerializable) -> PdxError {
    PdxError::UnsupportedKeyType(format!(
        "cannot compare DataSerializable {:?}",
        object.class_id()
    ))
}

fn sequence_equals(a: &[Value], b: &[Value]) -> Result<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.deep_equals(y)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn contains(haystack: &[Value], needle: &Value) -> Result<bool> {
    for candidate in haystack {
        if candidate.deep_equals(needle)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn set_equals(a: &[Value], b: &[Value]) -> Result<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for x in a {
        if !contains(b, x)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn map_equals(a: &[(Value, Value)], b: &[(Value, Value)]) -> Result<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    'entries: for (key, value) in a {
        for (other_key, other_value) in b {
            if key.deep_equals(other_key)? {
                if value.deep_equals(other_value)? {
                    continue 'entries;
                }
                return Ok(false);
            }
        }
        return Ok(false);
    }
    Ok(true)
}

fn polynomial_hash<T>(items: &[T], hash: impl Fn(&T) -> Result<i32>) -> Result<i32> {
    items
        .iter()
        .try_fold(1i32, |h, e| Ok(h.wrapping_mul(31).wrapping_add(hash(e)?)))
}

/// `java.lang.String.hashCode` over UTF-16 code units.
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// `java.lang.Long.hashCode`.
pub fn java_long_hash(v: i64) -> i32 {
    (v ^ ((v as u64) >> 32) as i64) as i32
}

/// `java.lang.Boolean.hashCode`.
pub fn java_bool_hash(v: bool) -> i32 {
    if v {
        1231
    } else {
        1237
    }
}

fn java_float_bits(v: f32) -> u32 {
    if v.is_nan() {
        0x7FC0_0000
    } else {
        v.to_bits()
    }
}

fn java_double_bits(v: f64) -> u64 {
    if v.is_nan() {
        0x7FF8_0000_0000_0000
    } else {
        v.to_bits()
    }
}

/// `java.lang.Float.hashCode`.
pub fn java_float_hash(v: f32) -> i32 {
    java_float_bits(v) as i32
}

/// `java.lang.Double.hashCode`.
pub fn java_double_hash(v: f64) -> i32 {
    java_long_hash(java_double_bits(v) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{ObjectDataInput, ObjectDataOutput};

    fn round_trip(value: &Value) -> Value {
        let ctx = PdxContext::new_shared();
        let mut output = ObjectDataOutput::new();
        value.write(&mut output).unwrap();
        let bytes = output.into_bytes();
        let mut input = ObjectDataInput::new(&bytes);
        let decoded = Value::read(&mut input, &ctx).unwrap();
        assert_eq!(input.remaining(), 0);
        decoded
    }

    #[test]
    fn test_java_string_hash() {
        assert_eq!(java_string_hash(""), 0);
        assert_eq!(java_string_hash("a"), 97);
        assert_eq!(java_string_hash("hello"), 99162322);
        assert_eq!(java_string_hash("Hello, World!"), 1498789909);
    }

    #[test]
    fn test_java_primitive_hashes() {
        assert_eq!(java_long_hash(0), 0);
        assert_eq!(java_long_hash(1 << 32), 1);
        assert_eq!(java_long_hash(-1), 0);
        assert_eq!(java_bool_hash(true), 1231);
        assert_eq!(java_bool_hash(false), 1237);
        assert_eq!(java_float_hash(1.0), 0x3F80_0000);
        assert_eq!(java_double_hash(1.0), 0x3FF0_0000);
        assert_eq!(java_float_hash(f32::NAN), 0x7FC0_0000);
    }

    #[test]
    fn test_list_hash_matches_java() {
        // Arrays.asList(1, 2, 3).hashCode() == 30817
        let list = Value::ArrayList(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.hash_code().unwrap(), 30817);
        let vector = Value::Vector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(vector.hash_code().unwrap(), 30817);
    }

    #[test]
    fn test_set_and_map_hash_order_independent() {
        let a = Value::HashSet(vec![Value::from("x"), Value::from("y")]);
        let b = Value::LinkedHashSet(vec![Value::from("y"), Value::from("x")]);
        assert_eq!(a.hash_code().unwrap(), b.hash_code().unwrap());

        let m1 = Value::HashMap(vec![
            (Value::from("k1"), Value::Int(1)),
            (Value::from("k2"), Value::Int(2)),
        ]);
        let m2 = Value::HashTable(vec![
            (Value::from("k2"), Value::Int(2)),
            (Value::from("k1"), Value::Int(1)),
        ]);
        assert_eq!(m1.hash_code().unwrap(), m2.hash_code().unwrap());
        assert_eq!(
            m1.hash_code().unwrap(),
            (java_string_hash("k1") ^ 1).wrapping_add(java_string_hash("k2") ^ 2)
        );
    }

    #[test]
    fn test_deep_equals_containers() {
        let a = Value::HashSet(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::HashSet(vec![Value::Int(2), Value::Int(1)]);
        assert!(a.deep_equals(&b).unwrap());

        let list = Value::ArrayList(vec![Value::Int(1), Value::Int(2)]);
        let vector = Value::Vector(vec![Value::Int(1), Value::Int(2)]);
        assert!(list.deep_equals(&vector).unwrap());
        assert!(!list.deep_equals(&a).unwrap());

        let reversed = Value::ArrayList(vec![Value::Int(2), Value::Int(1)]);
        assert!(!list.deep_equals(&reversed).unwrap());
    }

    #[test]
    fn test_deep_equals_maps() {
        let m1 = Value::HashMap(vec![(Value::from("a"), Value::Int(1))]);
        let m2 = Value::HashTable(vec![(Value::from("a"), Value::Int(1))]);
        let m3 = Value::HashMap(vec![(Value::from("a"), Value::Int(2))]);
        assert!(m1.deep_equals(&m2).unwrap());
        assert!(!m1.deep_equals(&m3).unwrap());
    }

    #[test]
    fn test_deep_equals_distinguishes_numeric_kinds() {
        assert!(!Value::Int(1).deep_equals(&Value::Long(1)).unwrap());
        assert!(Value::Double(f64::NAN)
            .deep_equals(&Value::Double(f64::NAN))
            .unwrap());
        assert!(!Value::Double(0.0).deep_equals(&Value::Double(-0.0)).unwrap());
    }

    #[test]
    fn test_round_trip_primitives() {
        for value in [
            Value::Null,
            Value::Boolean(true),
            Value::Char(0x263A),
            Value::Byte(-5),
            Value::Short(-300),
            Value::Int(123_456),
            Value::Long(-9_876_543_210),
            Value::Float(1.5),
            Value::Double(-2.25),
            Value::Date(1_700_000_000_000),
            Value::from("héllo"),
        ] {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn test_round_trip_arrays_and_containers() {
        let value = Value::HashMap(vec![
            (
                Value::from("list"),
                Value::ArrayList(vec![Value::Int(1), Value::from("two"), Value::Null]),
            ),
            (
                Value::from("objects"),
                Value::ObjectArray(vec![Value::Long(3), Value::Bytes(vec![1, -1])]),
            ),
            (
                Value::from("strings"),
                Value::StringArray(vec![Some("a".to_string()), None]),
            ),
            (
                Value::from("set"),
                Value::LinkedHashSet(vec![Value::DoubleArray(vec![0.5, 1.5])]),
            ),
        ]);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_object_array_wire_layout() {
        let mut output = ObjectDataOutput::new();
        Value::ObjectArray(vec![Value::Int(7)])
            .write(&mut output)
            .unwrap();
        let mut expected = vec![52, 1, 43, 87, 0, 16];
        expected.extend_from_slice(b"java.lang.Object");
        expected.extend_from_slice(&[57, 0, 0, 0, 7]);
        assert_eq!(output.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_null_string_reads_as_null() {
        let ctx = PdxContext::new_shared();
        let data = [69u8];
        let mut input = ObjectDataInput::new(&data);
        assert!(Value::read(&mut input, &ctx).unwrap().is_null());
    }

    fn nested_lists(levels: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(levels * 2 + 1);
        for _ in 0..levels {
            data.push(DsCode::CacheableArrayList.code());
            data.push(1);
        }
        data.push(DsCode::NullObj.code());
        data
    }

    #[test]
    fn test_nesting_up_to_limit_decodes() {
        let ctx = PdxContext::new_shared();
        let data = nested_lists(MAX_NESTING_DEPTH);
        let mut input = ObjectDataInput::new(&data);
        let value = Value::read(&mut input, &ctx).unwrap();
        let mut current = &value;
        let mut levels = 0;
        while let Value::ArrayList(items) = current {
            current = &items[0];
            levels += 1;
        }
        assert_eq!(levels, MAX_NESTING_DEPTH);
        assert!(current.is_null());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let ctx = PdxContext::new_shared();
        for levels in [MAX_NESTING_DEPTH + 1, 1_000_000] {
            let data = nested_lists(levels);
            let mut input = ObjectDataInput::new(&data);
            assert!(matches!(
                Value::read(&mut input, &ctx),
                Err(PdxError::Serialization(_))
            ));
        }
    }

    #[test]
    fn test_deep_map_nesting_is_rejected() {
        let ctx = PdxContext::new_shared();
        let mut data = Vec::new();
        for _ in 0..=MAX_NESTING_DEPTH {
            data.extend_from_slice(&[DsCode::CacheableHashMap.code(), 1]);
            data.push(DsCode::NullObj.code());
        }
        data.push(DsCode::NullObj.code());
        let mut input = ObjectDataInput::new(&data);
        assert!(matches!(
            Value::read(&mut input, &ctx),
            Err(PdxError::Serialization(_))
        ));
    }

    #[test]
    fn test_unknown_code_is_error() {
        let ctx = PdxContext::new_shared();
        let data = [200u8];
        let mut input = ObjectDataInput::new(&data);
        assert!(Value::read(&mut input, &ctx).is_err());
    }

    #[test]
    fn test_user_object_has_no_key_contract() {
        #[derive(Debug)]
        struct Opaque;

        impl DataSerializable for Opaque {
            fn class_id(&self) -> ClassId {
                ClassId::User(1)
            }

            fn to_data(&self, _output: &mut dyn DataOutput) -> Result<()> {
                Ok(())
            }

            fn from_data(&mut self, _input: &mut dyn DataInput) -> Result<()> {
                Ok(())
            }
        }

        let value = Value::UserObject(Arc::new(Opaque));
        assert!(matches!(
            value.hash_code(),
            Err(PdxError::UnsupportedKeyType(_))
        ));
        assert!(matches!(
            value.deep_equals(&Value::Null),
            Err(PdxError::UnsupportedKeyType(_))
        ));
        assert!(matches!(
            Value::Int(1).deep_equals(&value),
            Err(PdxError::UnsupportedKeyType(_))
        ));
    }

    #[test]
    fn test_display() {
        let value = Value::HashMap(vec![(
            Value::from("k"),
            Value::ArrayList(vec![Value::Int(1), Value::Double(2.0), Value::Null]),
        )]);
        assert_eq!(value.to_string(), "{k=[1, 2.0, null]}");
    }
}

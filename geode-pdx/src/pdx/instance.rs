//! Generic read model over serialized PDX objects.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use bytes::{BufMut, Bytes, BytesMut};

use crate::context::PdxContext;
use crate::error::{PdxError, Result};
use crate::serialization::value::DecodeScope;
use crate::serialization::{DataInput, DataOutput, DsCode, ObjectDataInput, Value};

use super::writer::{encode_fields, PDX_HEADER_LEN};
use super::{
    expect_variant, FieldDescriptor, FieldType, FieldValue, InstanceReader, PdxSerializable,
    TypeSchema, WritablePdxInstance,
};

/// Typed access to the fields of a PDX value.
///
/// Getters fail with `UnknownField` if the field is absent and
/// `FieldTypeMismatch` if it has a different type.
pub trait PdxFieldAccess {
    /// Returns the value of field `name`, which must be of `field_type`.
    fn get_field_as(&self, name: &str, field_type: FieldType) -> Result<FieldValue>;

    /// Returns a boolean field.
    fn get_boolean(&self, name: &str) -> Result<bool> {
        expect_variant!(self.get_field_as(name, FieldType::Boolean)?, name, Boolean)
    }

    /// Returns a byte field.
    fn get_byte(&self, name: &str) -> Result<i8> {
        expect_variant!(self.get_field_as(name, FieldType::Byte)?, name, Byte)
    }

    /// Returns a char field.
    fn get_char(&self, name: &str) -> Result<u16> {
        expect_variant!(self.get_field_as(name, FieldType::Char)?, name, Char)
    }

    /// Returns a short field.
    fn get_short(&self, name: &str) -> Result<i16> {
        expect_variant!(self.get_field_as(name, FieldType::Short)?, name, Short)
    }

    /// Returns an int field.
    fn get_int(&self, name: &str) -> Result<i32> {
        expect_variant!(self.get_field_as(name, FieldType::Int)?, name, Int)
    }

    /// Returns a long field.
    fn get_long(&self, name: &str) -> Result<i64> {
        expect_variant!(self.get_field_as(name, FieldType::Long)?, name, Long)
    }

    /// Returns a float field.
    fn get_float(&self, name: &str) -> Result<f32> {
        expect_variant!(self.get_field_as(name, FieldType::Float)?, name, Float)
    }

    /// Returns a double field.
    fn get_double(&self, name: &str) -> Result<f64> {
        expect_variant!(self.get_field_as(name, FieldType::Double)?, name, Double)
    }

    /// Returns a date field.
    fn get_date(&self, name: &str) -> Result<Option<i64>> {
        expect_variant!(self.get_field_as(name, FieldType::Date)?, name, Date)
    }

    /// Returns a string field.
    fn get_string(&self, name: &str) -> Result<Option<String>> {
        expect_variant!(self.get_field_as(name, FieldType::String)?, name, String)
    }

    /// Decodes an object field.
    fn get_object_field(&self, name: &str) -> Result<Value> {
        expect_variant!(self.get_field_as(name, FieldType::Object)?, name, Object)
    }

    /// Returns a boolean array field.
    fn get_boolean_array(&self, name: &str) -> Result<Option<Vec<bool>>> {
        expect_variant!(self.get_field_as(name, FieldType::BooleanArray)?, name, BooleanArray)
    }

    /// Returns a char array field.
    fn get_char_array(&self, name: &str) -> Result<Option<Vec<u16>>> {
        expect_variant!(self.get_field_as(name, FieldType::CharArray)?, name, CharArray)
    }

    /// Returns a byte array field.
    fn get_byte_array(&self, name: &str) -> Result<Option<Vec<i8>>> {
        expect_variant!(self.get_field_as(name, FieldType::ByteArray)?, name, ByteArray)
    }

    /// Returns a short array field.
    fn get_short_array(&self, name: &str) -> Result<Option<Vec<i16>>> {
        expect_variant!(self.get_field_as(name, FieldType::ShortArray)?, name, ShortArray)
    }

    /// Returns an int array field.
    fn get_int_array(&self, name: &str) -> Result<Option<Vec<i32>>> {
        expect_variant!(self.get_field_as(name, FieldType::IntArray)?, name, IntArray)
    }

    /// Returns a long array field.
    fn get_long_array(&self, name: &str) -> Result<Option<Vec<i64>>> {
        expect_variant!(self.get_field_as(name, FieldType::LongArray)?, name, LongArray)
    }

    /// Returns a float array field.
    fn get_float_array(&self, name: &str) -> Result<Option<Vec<f32>>> {
        expect_variant!(self.get_field_as(name, FieldType::FloatArray)?, name, FloatArray)
    }

    /// Returns a double array field.
    fn get_double_array(&self, name: &str) -> Result<Option<Vec<f64>>> {
        expect_variant!(self.get_field_as(name, FieldType::DoubleArray)?, name, DoubleArray)
    }

    /// Returns a string array field.
    fn get_string_array(&self, name: &str) -> Result<Option<Vec<Option<String>>>> {
        expect_variant!(self.get_field_as(name, FieldType::StringArray)?, name, StringArray)
    }

    /// Decodes an object array field.
    fn get_object_array(&self, name: &str) -> Result<Option<Vec<Value>>> {
        expect_variant!(self.get_field_as(name, FieldType::ObjectArray)?, name, ObjectArray)
    }

    /// Returns an array of byte arrays.
    fn get_array_of_byte_arrays(&self, name: &str) -> Result<Option<Vec<Option<Vec<i8>>>>> {
        expect_variant!(
            self.get_field_as(name, FieldType::ArrayOfByteArrays)?,
            name,
            ArrayOfByteArrays
        )
    }
}

/// A PDX object read without its concrete class.
///
/// The schema is resolved from the registry at most once and then owned,
/// so a later registry clear cannot affect an instance that has already
/// resolved. Instances created by a `PdxInstanceFactory` own their schema
/// from the start and encode their payload on first need.
#[derive(Clone)]
pub struct PdxInstance {
    ctx: Arc<PdxContext>,
    type_id: i32,
    schema: OnceLock<Arc<TypeSchema>>,
    payload: OnceLock<Bytes>,
    values: Option<HashMap<String, FieldValue>>,
    scope: DecodeScope,
}

impl PdxInstance {
    /// Creates an instance over `payload`, the bytes following the PDX
    /// header, whose schema is resolved lazily from `type_id`.
    pub fn from_payload(ctx: Arc<PdxContext>, type_id: i32, payload: Bytes) -> Self {
        let scope = DecodeScope::root(&ctx);
        Self {
            ctx,
            type_id,
            schema: OnceLock::new(),
            payload: OnceLock::from(payload),
            values: None,
            scope,
        }
    }

    /// Parses one framed PDX object, copying its payload.
    pub fn from_bytes(ctx: Arc<PdxContext>, data: &[u8]) -> Result<Self> {
        let mut input = ObjectDataInput::new(data);
        let code = input.read_unsigned_byte()?;
        if code != DsCode::Pdx.code() {
            return Err(PdxError::Serialization(format!(
                "expected PDX type code {}, found {}",
                DsCode::Pdx.code(),
                code
            )));
        }
        let length = input.read_int()?;
        let type_id = input.read_int()?;
        let length = usize::try_from(length)
            .map_err(|_| PdxError::Serialization(format!("invalid PDX length: {}", length)))?;
        let payload = input.read_slice(length)?;
        if input.remaining() != 0 {
            return Err(PdxError::Serialization(format!(
                "{} trailing bytes after PDX object",
                input.remaining()
            )));
        }
        Ok(Self::from_payload(ctx, type_id, Bytes::copy_from_slice(payload)))
    }

    pub(crate) fn with_schema(ctx: Arc<PdxContext>, schema: Arc<TypeSchema>, payload: Bytes) -> Self {
        let scope = DecodeScope::root(&ctx);
        Self {
            ctx,
            type_id: schema.type_id(),
            schema: OnceLock::from(schema),
            payload: OnceLock::from(payload),
            values: None,
            scope,
        }
    }

    pub(crate) fn from_values(
        ctx: Arc<PdxContext>,
        schema: Arc<TypeSchema>,
        values: HashMap<String, FieldValue>,
    ) -> Self {
        let scope = DecodeScope::root(&ctx);
        Self {
            ctx,
            type_id: schema.type_id(),
            schema: OnceLock::from(schema),
            payload: OnceLock::new(),
            values: Some(values),
            scope,
        }
    }

    /// Places this instance inside the value it was decoded from.
    pub(crate) fn nested_in(mut self, scope: DecodeScope) -> Self {
        self.scope = scope;
        self
    }

    /// Returns the context this instance resolves types against.
    pub fn context(&self) -> &Arc<PdxContext> {
        &self.ctx
    }

    /// Returns the type id.
    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    /// Returns the schema, resolving it on first use.
    ///
    /// # Errors
    ///
    /// Returns `PdxError::StaleType` if the schema was never resolved and
    /// the registry has since been cleared or no longer holds the type id.
    pub fn schema(&self) -> Result<&Arc<TypeSchema>> {
        if let Some(schema) = self.schema.get() {
            return Ok(schema);
        }
        let registry = self.ctx.registry();
        let resolved = registry
            .get_by_id_in_epoch(self.type_id, self.scope.epoch)
            .ok_or_else(|| {
                tracing::warn!(type_id = self.type_id, "PDX type is no longer registered");
                PdxError::StaleType(self.type_id)
            })?;
        Ok(self.schema.get_or_init(|| resolved))
    }

    /// Returns the class name.
    pub fn class_name(&self) -> Result<&str> {
        Ok(self.schema()?.class_name())
    }

    /// Returns the field names in serialization order.
    pub fn field_names(&self) -> Result<Vec<String>> {
        Ok(self
            .schema()?
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect())
    }

    /// Returns true if the schema has the field. A stale instance has none.
    pub fn has_field(&self, name: &str) -> bool {
        self.schema().map_or(false, |s| s.has_field(name))
    }

    /// Returns the type of the named field.
    pub fn field_type(&self, name: &str) -> Result<FieldType> {
        self.schema()?
            .field(name)
            .map(FieldDescriptor::field_type)
            .ok_or_else(|| PdxError::UnknownField(name.to_string()))
    }

    /// Returns the value of the named field.
    pub fn get_field(&self, name: &str) -> Result<FieldValue> {
        let schema = self.schema()?;
        let field = schema
            .field(name)
            .ok_or_else(|| PdxError::UnknownField(name.to_string()))?;
        if self.payload.get().is_none() {
            if let Some(value) = self.values.as_ref().and_then(|v| v.get(name)) {
                return Ok(value.clone());
            }
        }
        let bytes = self.field_bytes(field.sequence_index() as usize)?;
        let mut input = ObjectDataInput::new(bytes);
        let value =
            FieldValue::read_nested(field.field_type(), &mut input, &self.ctx, self.scope)?;
        if input.remaining() != 0 {
            return Err(PdxError::Serialization(format!(
                "{} unread bytes in field '{}'",
                input.remaining(),
                name
            )));
        }
        Ok(value)
    }

    /// Returns the payload, encoding it from builder values on first use.
    pub(crate) fn payload(&self) -> Result<&Bytes> {
        if let Some(payload) = self.payload.get() {
            return Ok(payload);
        }
        let schema = self.schema()?;
        let values = self.values.as_ref().ok_or_else(|| {
            PdxError::IllegalState("instance has neither payload nor values".to_string())
        })?;
        let framed = encode_fields(&self.ctx, schema, self.type_id, |_, field, output| {
            match values.get(field.name()) {
                Some(value) => value.write(output),
                None => output.write_bytes(field.field_type().default_bytes()),
            }
        })?;
        Ok(self.payload.get_or_init(|| framed.slice(PDX_HEADER_LEN..)))
    }

    fn field_bytes(&self, index: usize) -> Result<&[u8]> {
        let schema = self.schema()?;
        let payload = self.payload()?;
        let range = schema.field_range(index, payload)?;
        Ok(&payload[range])
    }

    fn identity_bytes(&self, field: Option<&FieldDescriptor>, field_type: FieldType) -> Result<&[u8]> {
        match field {
            Some(field) => self.field_bytes(field.sequence_index() as usize),
            None => Ok(field_type.default_bytes()),
        }
    }

    fn identity_value(&self, field: Option<&FieldDescriptor>) -> Result<Option<Value>> {
        match field {
            Some(field) => Ok(deep_value(self.get_field(field.name())?)),
            None => Ok(None),
        }
    }

    /// Computes the hash over the identity fields.
    ///
    /// Fields holding their default bytes and null objects contribute
    /// nothing, so a field missing from one version hashes like a default.
    pub fn hashcode(&self) -> Result<i32> {
        let schema = self.schema()?;
        let mut hash = 1i32;
        for field in schema.identity_fields() {
            let contribution = if field.field_type().needs_deep_compare() {
                match deep_value(self.get_field(field.name())?) {
                    Some(value) => value.hash_code()?,
                    None => continue,
                }
            } else {
                let raw = self.field_bytes(field.sequence_index() as usize)?;
                if raw == field.field_type().default_bytes() {
                    continue;
                }
                byte_buffer_hash(raw)
            };
            hash = hash.wrapping_mul(31).wrapping_add(contribution);
        }
        Ok(hash)
    }

    /// Compares the identity fields of two instances of the same class.
    ///
    /// A field missing on one side compares as its type's default.
    pub fn equals(&self, other: &PdxInstance) -> Result<bool> {
        let mine = self.schema()?;
        let theirs = other.schema()?;
        if mine.class_name() != theirs.class_name() {
            return Ok(false);
        }
        let mut names: BTreeSet<&str> = mine
            .identity_fields()
            .into_iter()
            .map(FieldDescriptor::name)
            .collect();
        names.extend(theirs.identity_fields().into_iter().map(FieldDescriptor::name));

        for name in names {
            let (a, b) = (mine.field(name), theirs.field(name));
            let field_type = match (a, b) {
                (Some(a), Some(b)) if a.field_type() != b.field_type() => return Ok(false),
                (Some(f), _) | (None, Some(f)) => f.field_type(),
                (None, None) => continue,
            };
            let equal = if field_type.needs_deep_compare() {
                match (self.identity_value(a)?, other.identity_value(b)?) {
                    (None, None) => true,
                    (Some(x), Some(y)) => x.deep_equals(&y)?,
                    _ => false,
                }
            } else {
                self.identity_bytes(a, field_type)? == other.identity_bytes(b, field_type)?
            };
            if !equal {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Renders `PDX[<type id>,<class name>]{field=value, ...}` over the
    /// identity fields, sorted by name.
    pub fn to_pdx_string(&self) -> Result<String> {
        let schema = self.schema()?;
        let mut rendered = format!("PDX[{},{}]{{", self.type_id, schema.class_name());
        for (i, field) in schema.identity_fields().into_iter().enumerate() {
            if i > 0 {
                rendered.push_str(", ");
            }
            let value = self.get_field(field.name())?;
            rendered.push_str(&format!("{}={}", field.name(), value));
        }
        rendered.push('}');
        Ok(rendered)
    }

    /// Materializes the concrete class through the class factory registry.
    pub fn to_object(&self) -> Result<Box<dyn PdxSerializable>> {
        let class_name = self.class_name()?;
        let mut object = self.ctx.classes().create(class_name).ok_or_else(|| {
            PdxError::Serialization(format!(
                "no PDX class factory registered for '{}'",
                class_name
            ))
        })?;
        let start = Instant::now();
        object.from_data(&mut InstanceReader::new(self))?;
        let elapsed = start.elapsed();

        let statistics = self.ctx.statistics();
        statistics.increment_deserialization_count();
        statistics.add_deserialization_time(elapsed);
        tracing::debug!(
            type_id = self.type_id,
            class_name = %class_name,
            elapsed_us = elapsed.as_micros() as u64,
            "materialized PDX object"
        );
        Ok(object)
    }

    /// Returns a copy-on-write view sharing this instance's bytes.
    pub fn create_writer(&self) -> WritablePdxInstance {
        WritablePdxInstance::new(self.clone())
    }

    /// Returns the framed encoding: PDX code, header and payload.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let payload = self.payload()?;
        let length = i32::try_from(payload.len()).map_err(|_| {
            PdxError::Serialization(format!("PDX payload too large: {} bytes", payload.len()))
        })?;
        let mut buffer = BytesMut::with_capacity(PDX_HEADER_LEN + payload.len());
        buffer.put_u8(DsCode::Pdx.code());
        buffer.put_i32(length);
        buffer.put_i32(self.type_id);
        buffer.put_slice(payload);
        Ok(buffer.freeze())
    }

    /// Writes the framed encoding to `output`.
    pub fn write_to(&self, output: &mut dyn DataOutput) -> Result<()> {
        output.write_bytes(&self.to_bytes()?)
    }
}

impl PdxFieldAccess for PdxInstance {
    fn get_field_as(&self, name: &str, field_type: FieldType) -> Result<FieldValue> {
        let actual = self.field_type(name)?;
        if actual != field_type {
            return Err(PdxError::type_mismatch(name, field_type, actual));
        }
        self.get_field(name)
    }
}

/// Identity equality; comparisons that fail are unequal.
impl PartialEq for PdxInstance {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

impl fmt::Display for PdxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_pdx_string() {
            Ok(rendered) => f.write_str(&rendered),
            Err(err) => write!(f, "PDX[{},?]{{{}}}", self.type_id, err),
        }
    }
}

impl fmt::Debug for PdxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdxInstance")
            .field("type_id", &self.type_id)
            .field("class_name", &self.schema.get().map(|s| s.class_name()))
            .field("payload_len", &self.payload.get().map(Bytes::len))
            .finish()
    }
}

/// The value an object-typed field contributes to identity, if any.
fn deep_value(value: FieldValue) -> Option<Value> {
    match value {
        FieldValue::Object(value) if !value.is_null() => Some(value),
        FieldValue::ObjectArray(Some(values)) => Some(Value::ObjectArray(values)),
        _ => None,
    }
}

/// `java.nio.ByteBuffer.hashCode` over `bytes`.
fn byte_buffer_hash(bytes: &[u8]) -> i32 {
    bytes
        .iter()
        .rev()
        .fold(1i32, |h, &b| h.wrapping_mul(31).wrapping_add(b as i8 as i32))
}

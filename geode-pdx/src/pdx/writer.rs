//! PDX writers: schema discovery and layout replay.
//!
//! Both writers frame their output as
//! `[93][length: i32][type id: i32][field data][offset table]`. The header
//! is reserved up front and back-filled once the offset table is written.

use std::sync::Arc;

use bytes::Bytes;

use crate::context::PdxContext;
use crate::error::{PdxError, Result};
use crate::serialization::{DataOutput, DsCode, ObjectDataOutput, Value};

use super::{FieldDescriptor, FieldType, FieldValue, TypeSchema};

/// Length of the PDX code plus the length and type id header.
pub const PDX_HEADER_LEN: usize = 9;

/// Trait for writing named PDX fields.
///
/// Implementors only provide `write_field` and `mark_identity_field`; the
/// typed methods wrap their argument in the matching [`FieldValue`].
pub trait PdxWriter {
    /// Writes a field holding `value`.
    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<()>;

    /// Marks an already written field as an identity field.
    fn mark_identity_field(&mut self, name: &str) -> Result<()>;

    /// Writes a boolean field.
    fn write_boolean(&mut self, name: &str, value: bool) -> Result<()> {
        self.write_field(name, FieldValue::Boolean(value))
    }

    /// Writes a byte field.
    fn write_byte(&mut self, name: &str, value: i8) -> Result<()> {
        self.write_field(name, FieldValue::Byte(value))
    }

    /// Writes a char field holding one UTF-16 code unit.
    fn write_char(&mut self, name: &str, value: u16) -> Result<()> {
        self.write_field(name, FieldValue::Char(value))
    }

    /// Writes a short field.
    fn write_short(&mut self, name: &str, value: i16) -> Result<()> {
        self.write_field(name, FieldValue::Short(value))
    }

    /// Writes an int field.
    fn write_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.write_field(name, FieldValue::Int(value))
    }

    /// Writes a long field.
    fn write_long(&mut self, name: &str, value: i64) -> Result<()> {
        self.write_field(name, FieldValue::Long(value))
    }

    /// Writes a float field.
    fn write_float(&mut self, name: &str, value: f32) -> Result<()> {
        self.write_field(name, FieldValue::Float(value))
    }

    /// Writes a double field.
    fn write_double(&mut self, name: &str, value: f64) -> Result<()> {
        self.write_field(name, FieldValue::Double(value))
    }

    /// Writes a date field as milliseconds since the epoch.
    fn write_date(&mut self, name: &str, value: Option<i64>) -> Result<()> {
        self.write_field(name, FieldValue::Date(value))
    }

    /// Writes a string field.
    fn write_string(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        self.write_field(name, FieldValue::String(value.map(str::to_string)))
    }

    /// Writes an object field.
    fn write_object(&mut self, name: &str, value: Value) -> Result<()> {
        self.write_field(name, FieldValue::Object(value))
    }

    /// Writes a boolean array field.
    fn write_boolean_array(&mut self, name: &str, value: Option<&[bool]>) -> Result<()> {
        self.write_field(name, FieldValue::BooleanArray(value.map(<[bool]>::to_vec)))
    }

    /// Writes a char array field.
    fn write_char_array(&mut self, name: &str, value: Option<&[u16]>) -> Result<()> {
        self.write_field(name, FieldValue::CharArray(value.map(<[u16]>::to_vec)))
    }

    /// Writes a byte array field.
    fn write_byte_array(&mut self, name: &str, value: Option<&[i8]>) -> Result<()> {
        self.write_field(name, FieldValue::ByteArray(value.map(<[i8]>::to_vec)))
    }

    /// Writes a short array field.
    fn write_short_array(&mut self, name: &str, value: Option<&[i16]>) -> Result<()> {
        self.write_field(name, FieldValue::ShortArray(value.map(<[i16]>::to_vec)))
    }

    /// Writes an int array field.
    fn write_int_array(&mut self, name: &str, value: Option<&[i32]>) -> Result<()> {
        self.write_field(name, FieldValue::IntArray(value.map(<[i32]>::to_vec)))
    }

    /// Writes a long array field.
    fn write_long_array(&mut self, name: &str, value: Option<&[i64]>) -> Result<()> {
        self.write_field(name, FieldValue::LongArray(value.map(<[i64]>::to_vec)))
    }

    /// Writes a float array field.
    fn write_float_array(&mut self, name: &str, value: Option<&[f32]>) -> Result<()> {
        self.write_field(name, FieldValue::FloatArray(value.map(<[f32]>::to_vec)))
    }

    /// Writes a double array field.
    fn write_double_array(&mut self, name: &str, value: Option<&[f64]>) -> Result<()> {
        self.write_field(name, FieldValue::DoubleArray(value.map(<[f64]>::to_vec)))
    }

    /// Writes a string array field; elements may be null.
    fn write_string_array(&mut self, name: &str, value: Option<&[Option<String>]>) -> Result<()> {
        self.write_field(name, FieldValue::StringArray(value.map(<[Option<String>]>::to_vec)))
    }

    /// Writes an object array field.
    fn write_object_array(&mut self, name: &str, value: Option<&[Value]>) -> Result<()> {
        self.write_field(name, FieldValue::ObjectArray(value.map(<[Value]>::to_vec)))
    }

    /// Writes an array of byte arrays.
    fn write_array_of_byte_arrays(
        &mut self,
        name: &str,
        value: Option<&[Option<Vec<i8>>]>,
    ) -> Result<()> {
        self.write_field(
            name,
            FieldValue::ArrayOfByteArrays(value.map(<[Option<Vec<i8>>]>::to_vec)),
        )
    }
}

/// Framed output shared by the writers.
///
/// Records the start of every variable-length field so the offset table
/// can be emitted at the end.
pub(crate) struct PdxOutput {
    buffer: ObjectDataOutput,
    data_start: usize,
    var_offsets: Vec<usize>,
}

impl PdxOutput {
    pub(crate) fn new(mut buffer: ObjectDataOutput) -> Result<Self> {
        buffer.write_unsigned_byte(DsCode::Pdx.code())?;
        buffer.write_int(0)?;
        buffer.write_int(0)?;
        let data_start = buffer.position();
        Ok(Self {
            buffer,
            data_start,
            var_offsets: Vec::new(),
        })
    }

    /// Prepares the output for a field of `field_type`.
    pub(crate) fn begin_field(&mut self, field_type: FieldType) -> &mut ObjectDataOutput {
        if !field_type.is_fixed_length() {
            self.var_offsets
                .push(self.buffer.position() - self.data_start);
        }
        &mut self.buffer
    }

    /// Emits the offset table and back-fills the header.
    pub(crate) fn finish(mut self, schema: &TypeSchema, type_id: i32) -> Result<Bytes> {
        if self.var_offsets.len() != schema.var_len_field_count() {
            return Err(PdxError::IllegalState(format!(
                "wrote {} variable-length fields, schema of '{}' declares {}",
                self.var_offsets.len(),
                schema.class_name(),
                schema.var_len_field_count()
            )));
        }
        let data_len = self.buffer.position() - self.data_start;
        let (length, entry_size) = schema.encoded_length(data_len);
        for &offset in self.var_offsets.iter().skip(1).rev() {
            match entry_size {
                1 => self.buffer.write_unsigned_byte(offset as u8)?,
                2 => self.buffer.write_short(offset as u16 as i16)?,
                _ => self.buffer.write_int(offset as i32)?,
            }
        }
        let length = i32::try_from(length).map_err(|_| {
            PdxError::Serialization(format!("PDX payload too large: {} bytes", length))
        })?;
        self.buffer.write_int_at(self.data_start - 8, length)?;
        self.buffer.write_int_at(self.data_start - 4, type_id)?;
        tracing::trace!(
            type_id,
            class_name = %schema.class_name(),
            length,
            entry_size,
            "finished PDX payload"
        );
        Ok(self.buffer.freeze())
    }
}

/// Emits every field of `schema` in order through `emit` and frames the
/// result under `type_id`.
pub(crate) fn encode_fields(
    ctx: &PdxContext,
    schema: &TypeSchema,
    type_id: i32,
    mut emit: impl FnMut(usize, &FieldDescriptor, &mut ObjectDataOutput) -> Result<()>,
) -> Result<Bytes> {
    let mut output = PdxOutput::new(ctx.create_data_output())?;
    for (index, field) in schema.fields().iter().enumerate() {
        let buffer = output.begin_field(field.field_type());
        emit(index, field, buffer)?;
    }
    output.finish(schema, type_id)
}

/// Re-frames a payload laid out for `from` into the field order of `to`.
pub(crate) fn relayout(
    ctx: &PdxContext,
    payload: &[u8],
    from: &TypeSchema,
    to: &TypeSchema,
) -> Result<Bytes> {
    encode_fields(ctx, to, to.type_id(), |_, field, output| {
        let index = from
            .index_of(field.name())
            .ok_or_else(|| PdxError::UnknownField(field.name().to_string()))?;
        let range = from.field_range(index, payload)?;
        output.write_bytes(&payload[range])
    })
}

/// The writer used the first time a class is serialized.
///
/// Each write appends the field to the schema under construction;
/// `finish` registers the schema and back-fills the header with its id.
pub struct SchemaCollectingWriter {
    ctx: Arc<PdxContext>,
    schema: TypeSchema,
    output: Option<PdxOutput>,
}

impl SchemaCollectingWriter {
    /// Creates a writer discovering the schema of `class_name`.
    pub fn new(ctx: Arc<PdxContext>, class_name: &str) -> Result<Self> {
        let output = PdxOutput::new(ctx.create_data_output())?;
        Ok(Self {
            ctx,
            schema: TypeSchema::new(class_name),
            output: Some(output),
        })
    }

    /// Returns the schema discovered so far, in write order.
    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }

    /// Registers the discovered schema and returns it together with the
    /// framed bytes.
    ///
    /// If the registry already holds a structurally equal schema with a
    /// different field order, the bytes are laid out in that order.
    pub fn finish(&mut self) -> Result<(Arc<TypeSchema>, Bytes)> {
        let output = self.output.take().ok_or_else(|| {
            PdxError::IllegalState(format!(
                "writer for '{}' already finished",
                self.schema.class_name()
            ))
        })?;
        let registered = self.ctx.registry().register(self.schema.clone())?;
        let bytes = output.finish(&self.schema, registered.type_id())?;
        if registered.field_names() == self.schema.field_names() {
            return Ok((registered, bytes));
        }
        tracing::debug!(
            type_id = registered.type_id(),
            class_name = %registered.class_name(),
            "re-laying out PDX payload in registered field order"
        );
        let bytes = relayout(&self.ctx, &bytes[PDX_HEADER_LEN..], &self.schema, &registered)?;
        Ok((registered, bytes))
    }
}

impl PdxWriter for SchemaCollectingWriter {
    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let output = self.output.as_mut().ok_or_else(|| {
            PdxError::IllegalState(format!("cannot write '{}' after finish", name))
        })?;
        self.schema.add_field(name, value.field_type())?;
        value.write(output.begin_field(value.field_type()))
    }

    fn mark_identity_field(&mut self, name: &str) -> Result<()> {
        self.schema.mark_identity_field(name)
    }
}

/// The writer used once a class's schema is known.
///
/// Fields must arrive in schema order. Skipped fields are copied verbatim
/// from the base payload, or written as their default bytes when there is
/// no base.
pub struct LocalWriter {
    schema: Arc<TypeSchema>,
    base: Option<Bytes>,
    output: Option<PdxOutput>,
    next_index: usize,
}

impl LocalWriter {
    /// Creates a writer replaying `schema` with no base payload.
    pub fn new(ctx: &PdxContext, schema: Arc<TypeSchema>) -> Result<Self> {
        Self::create(ctx, schema, None)
    }

    /// Creates a writer whose skipped fields are copied from `base`, a
    /// payload laid out by `schema`.
    pub fn with_base(ctx: &PdxContext, schema: Arc<TypeSchema>, base: Bytes) -> Result<Self> {
        Self::create(ctx, schema, Some(base))
    }

    fn create(ctx: &PdxContext, schema: Arc<TypeSchema>, base: Option<Bytes>) -> Result<Self> {
        Ok(Self {
            schema,
            base,
            output: Some(PdxOutput::new(ctx.create_data_output())?),
            next_index: 0,
        })
    }

    /// Returns the schema being replayed.
    pub fn schema(&self) -> &Arc<TypeSchema> {
        &self.schema
    }

    fn output(&mut self) -> Result<&mut PdxOutput> {
        self.output
            .as_mut()
            .ok_or_else(|| PdxError::IllegalState("local writer already finished".to_string()))
    }

    fn fill_until(&mut self, end: usize) -> Result<()> {
        while self.next_index < end {
            let index = self.next_index;
            let field_type = self.schema.fields()[index].field_type();
            let range = match &self.base {
                Some(base) => Some(self.schema.field_range(index, base)?),
                None => None,
            };
            let output = self
                .output
                .as_mut()
                .ok_or_else(|| PdxError::IllegalState("local writer already finished".to_string()))?;
            let buffer = output.begin_field(field_type);
            match (&self.base, range) {
                (Some(base), Some(range)) => buffer.write_bytes(&base[range])?,
                _ => buffer.write_bytes(field_type.default_bytes())?,
            }
            self.next_index += 1;
        }
        Ok(())
    }

    /// Writes the remaining fields and returns the framed bytes.
    pub fn finish(&mut self) -> Result<Bytes> {
        self.output()?;
        self.fill_until(self.schema.field_count())?;
        let output = self.output.take().ok_or_else(|| {
            PdxError::IllegalState("local writer already finished".to_string())
        })?;
        output.finish(&self.schema, self.schema.type_id())
    }
}

impl PdxWriter for LocalWriter {
    fn write_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        self.output()?;
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| PdxError::UnknownField(name.to_string()))?;
        let declared = self.schema.fields()[index].field_type();
        if declared != value.field_type() {
            return Err(PdxError::type_mismatch(name, value.field_type(), declared));
        }
        if index < self.next_index {
            return Err(PdxError::IllegalState(format!(
                "field '{}' written out of order or twice",
                name
            )));
        }
        self.fill_until(index)?;
        value.write(self.output()?.begin_field(declared))?;
        self.next_index = index + 1;
        Ok(())
    }

    fn mark_identity_field(&mut self, name: &str) -> Result<()> {
        match self.schema.index_of(name) {
            Some(index) if index < self.next_index => Ok(()),
            _ => Err(PdxError::IllegalState(format!(
                "identity field '{}' must be written before it is marked",
                name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_values(w: &mut dyn PdxWriter) -> Result<()> {
        w.write_int("a", 1)?;
        w.write_string("s", Some("x"))?;
        w.write_int("b", 2)?;
        w.write_string("t", None)?;
        w.write_long("c", 3)
    }

    #[test]
    fn test_collecting_writer_layout() {
        let ctx = PdxContext::new_shared();
        let mut writer = SchemaCollectingWriter::new(Arc::clone(&ctx), "Mixed").unwrap();
        mixed_values(&mut writer).unwrap();
        let (schema, bytes) = writer.finish().unwrap();

        assert_eq!(schema.type_id(), 1);
        assert_eq!(schema.var_len_field_count(), 2);
        let mut expected = vec![93, 0, 0, 0, 22, 0, 0, 0, 1];
        expected.extend_from_slice(&[0, 0, 0, 1]);
        expected.extend_from_slice(&[42, 0, 1, b'x']);
        expected.extend_from_slice(&[0, 0, 0, 2]);
        expected.push(69);
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 3]);
        expected.push(12);
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_collecting_writer_duplicate_field() {
        let ctx = PdxContext::new_shared();
        let mut writer = SchemaCollectingWriter::new(ctx, "Dup").unwrap();
        writer.write_int("x", 1).unwrap();
        assert!(matches!(
            writer.write_long("x", 2),
            Err(PdxError::DuplicateField(name)) if name == "x"
        ));
    }

    #[test]
    fn test_collecting_writer_finish_twice() {
        let ctx = PdxContext::new_shared();
        let mut writer = SchemaCollectingWriter::new(ctx, "Once").unwrap();
        writer.write_int("x", 1).unwrap();
        writer.finish().unwrap();
        assert!(matches!(writer.finish(), Err(PdxError::IllegalState(_))));
        assert!(matches!(
            writer.write_int("y", 1),
            Err(PdxError::IllegalState(_))
        ));
    }

    #[test]
    fn test_collecting_writer_identity_before_write() {
        let ctx = PdxContext::new_shared();
        let mut writer = SchemaCollectingWriter::new(ctx, "Id").unwrap();
        assert!(matches!(
            writer.mark_identity_field("x"),
            Err(PdxError::IllegalState(_))
        ));
        writer.write_int("x", 1).unwrap();
        writer.mark_identity_field("x").unwrap();
        assert!(writer.schema().field("x").unwrap().is_identity());
    }

    #[test]
    fn test_collecting_writer_relayouts_to_registered_order() {
        let ctx = PdxContext::new_shared();
        let mut first = SchemaCollectingWriter::new(Arc::clone(&ctx), "Pair").unwrap();
        first.write_string("name", Some("n")).unwrap();
        first.write_int("id", 7).unwrap();
        let (schema, expected) = first.finish().unwrap();

        let mut second = SchemaCollectingWriter::new(Arc::clone(&ctx), "Pair").unwrap();
        second.write_int("id", 7).unwrap();
        second.write_string("name", Some("n")).unwrap();
        let (registered, bytes) = second.finish().unwrap();

        assert_eq!(registered.type_id(), schema.type_id());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_local_writer_matches_collecting_writer() {
        let ctx = PdxContext::new_shared();
        let mut collecting = SchemaCollectingWriter::new(Arc::clone(&ctx), "Mixed").unwrap();
        mixed_values(&mut collecting).unwrap();
        let (schema, expected) = collecting.finish().unwrap();

        let mut local = LocalWriter::new(&ctx, schema).unwrap();
        mixed_values(&mut local).unwrap();
        assert_eq!(local.finish().unwrap(), expected);
    }

    #[test]
    fn test_local_writer_fills_defaults() {
        let ctx = PdxContext::new_shared();
        let mut collecting = SchemaCollectingWriter::new(Arc::clone(&ctx), "Mixed").unwrap();
        mixed_values(&mut collecting).unwrap();
        let (schema, _) = collecting.finish().unwrap();

        let mut local = LocalWriter::new(&ctx, schema).unwrap();
        local.write_int("b", 2).unwrap();
        let bytes = local.finish().unwrap();
        let mut expected = vec![93, 0, 0, 0, 19, 0, 0, 0, 1];
        expected.extend_from_slice(&[0, 0, 0, 0]);
        expected.push(69);
        expected.extend_from_slice(&[0, 0, 0, 2]);
        expected.push(69);
        expected.extend_from_slice(&[0; 8]);
        expected.push(9);
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_local_writer_copies_base() {
        let ctx = PdxContext::new_shared();
        let mut collecting = SchemaCollectingWriter::new(Arc::clone(&ctx), "Mixed").unwrap();
        mixed_values(&mut collecting).unwrap();
        let (schema, original) = collecting.finish().unwrap();

        let base = original.slice(PDX_HEADER_LEN..);
        let mut local = LocalWriter::with_base(&ctx, schema, base).unwrap();
        assert_eq!(local.finish().unwrap(), original);
    }

    #[test]
    fn test_local_writer_protocol_errors() {
        let ctx = PdxContext::new_shared();
        let mut collecting = SchemaCollectingWriter::new(Arc::clone(&ctx), "Mixed").unwrap();
        mixed_values(&mut collecting).unwrap();
        let (schema, _) = collecting.finish().unwrap();

        let mut local = LocalWriter::new(&ctx, schema).unwrap();
        assert!(matches!(
            local.write_int("zzz", 1),
            Err(PdxError::UnknownField(_))
        ));
        assert!(matches!(
            local.write_long("a", 1),
            Err(PdxError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            local.mark_identity_field("a"),
            Err(PdxError::IllegalState(_))
        ));
        local.write_int("b", 2).unwrap();
        local.mark_identity_field("b").unwrap();
        assert!(matches!(
            local.write_int("a", 1),
            Err(PdxError::IllegalState(_))
        ));
        assert!(matches!(
            local.write_int("b", 1),
            Err(PdxError::IllegalState(_))
        ));
        local.finish().unwrap();
        assert!(matches!(local.finish(), Err(PdxError::IllegalState(_))));
    }

    #[test]
    fn test_two_byte_offsets() {
        let ctx = PdxContext::new_shared();
        let long = "y".repeat(300);
        let mut writer = SchemaCollectingWriter::new(ctx, "Wide").unwrap();
        writer.write_string("a", Some(&long)).unwrap();
        writer.write_string("b", Some("z")).unwrap();
        let (_, bytes) = writer.finish().unwrap();
        // 303 bytes for "a", 4 for "b", one 2-byte entry.
        assert_eq!(&bytes[1..5], &309i32.to_be_bytes());
        assert_eq!(&bytes[bytes.len() - 2..], &303u16.to_be_bytes());
    }
}

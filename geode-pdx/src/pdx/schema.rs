//! PDX type schemas: field descriptors, layout and structural identity.
//!
//! A serialized PDX payload is the field values in schema order followed
//! by an offset table. The table holds the start offset of every
//! variable-length field except the first, most recently written field
//! first. Fixed-length fields never appear in the table; their position is
//! derived from the declared widths around the nearest variable-length
//! field.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use crate::error::{PdxError, Result};
use crate::serialization::value::java_string_hash;

use super::FieldType;

/// Description of a single field within a PDX type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    field_type: FieldType,
    sequence_index: u32,
    identity: bool,
}

impl FieldDescriptor {
    fn new(name: String, field_type: FieldType, sequence_index: u32) -> Self {
        Self {
            name,
            field_type,
            sequence_index,
            identity: false,
        }
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the logical type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns the position of the field in serialization order.
    pub fn sequence_index(&self) -> u32 {
        self.sequence_index
    }

    /// Returns true if the field always occupies the same width.
    pub fn is_fixed_length(&self) -> bool {
        self.field_type.is_fixed_length()
    }

    /// Returns true if the field participates in equality and hashing.
    pub fn is_identity(&self) -> bool {
        self.identity
    }
}

/// Two descriptors are equal when name and type match.
impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.field_type == other.field_type
    }
}

impl Eq for FieldDescriptor {}

impl Hash for FieldDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.field_type.hash(state);
    }
}

/// Where a field's first byte is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldAnchor {
    /// Fixed distance from the start of the field data.
    Start(usize),
    /// Start of variable-length field `var_index`, read from the offset table.
    OffsetTable(usize),
    /// `back` bytes before variable-length field `var_index`.
    BeforeVarLen { var_index: usize, back: usize },
    /// `back` bytes before the end of the field data.
    BeforeEnd(usize),
}

/// The layout of one version of a PDX class.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    type_id: i32,
    class_name: String,
    fields: Vec<FieldDescriptor>,
    field_indices: HashMap<String, usize>,
    anchors: Vec<FieldAnchor>,
    var_len_field_count: usize,
}

impl TypeSchema {
    /// Creates an empty, unregistered schema for `class_name`.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            type_id: 0,
            class_name: class_name.into(),
            fields: Vec::new(),
            field_indices: HashMap::new(),
            anchors: Vec::new(),
            var_len_field_count: 0,
        }
    }

    /// Returns the registered type id, or 0 while unregistered.
    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    pub(crate) fn set_type_id(&mut self, type_id: i32) {
        self.type_id = type_id;
    }

    /// Returns the class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the fields in serialization order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns the number of variable-length fields.
    pub fn var_len_field_count(&self) -> usize {
        self.var_len_field_count
    }

    /// Returns the field with the given name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_indices.get(name).map(|&i| &self.fields[i])
    }

    /// Returns the sequence index of the named field.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.field_indices.get(name).copied()
    }

    /// Returns true if the schema has a field with the given name.
    pub fn has_field(&self, name: &str) -> bool {
        self.field_indices.contains_key(name)
    }

    /// Returns the field names in serialization order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Appends a field with the next sequence index.
    pub fn add_field(&mut self, name: &str, field_type: FieldType) -> Result<&FieldDescriptor> {
        if self.field_indices.contains_key(name) {
            return Err(PdxError::DuplicateField(name.to_string()));
        }
        let index = self.fields.len();
        self.fields.push(FieldDescriptor::new(
            name.to_string(),
            field_type,
            index as u32,
        ));
        self.field_indices.insert(name.to_string(), index);
        if !field_type.is_fixed_length() {
            self.var_len_field_count += 1;
        }
        self.anchors = compute_anchors(&self.fields);
        Ok(&self.fields[index])
    }

    /// Appends a fixed-length field.
    pub fn add_fixed_length_field(
        &mut self,
        name: &str,
        field_type: FieldType,
    ) -> Result<&FieldDescriptor> {
        if !field_type.is_fixed_length() {
            return Err(PdxError::IllegalState(format!(
                "{} is not a fixed-length type",
                field_type
            )));
        }
        self.add_field(name, field_type)
    }

    /// Appends a variable-length field.
    pub fn add_variable_length_field(
        &mut self,
        name: &str,
        field_type: FieldType,
    ) -> Result<&FieldDescriptor> {
        if field_type.is_fixed_length() {
            return Err(PdxError::IllegalState(format!(
                "{} is not a variable-length type",
                field_type
            )));
        }
        self.add_field(name, field_type)
    }

    /// Marks an already added field as an identity field.
    pub fn mark_identity_field(&mut self, name: &str) -> Result<()> {
        let index = self.index_of(name).ok_or_else(|| {
            PdxError::IllegalState(format!(
                "identity field '{}' must be written before it is marked",
                name
            ))
        })?;
        self.fields[index].identity = true;
        Ok(())
    }

    /// Returns the names of the explicitly marked identity fields, sorted.
    pub fn marked_identity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.identity)
            .map(|f| f.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Returns a copy of this schema whose identity marks are taken from
    /// `other`, matched by field name.
    pub(crate) fn with_identity_of(&self, other: &TypeSchema) -> TypeSchema {
        let mut schema = self.clone();
        for field in &mut schema.fields {
            field.identity = other.field(&field.name).map_or(false, |f| f.identity);
        }
        schema
    }

    /// Returns the fields used for equality, hashing and rendering, sorted
    /// by name: the marked identity fields, or every field if none is marked.
    pub fn identity_fields(&self) -> Vec<&FieldDescriptor> {
        let mut fields: Vec<&FieldDescriptor> =
            self.fields.iter().filter(|f| f.identity).collect();
        if fields.is_empty() {
            fields = self.fields.iter().collect();
        }
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        fields
    }

    /// Returns the offset-table entry width for a payload of `payload_len` bytes.
    pub fn offset_table_entry_size(payload_len: usize) -> usize {
        if payload_len <= 0xFF {
            1
        } else if payload_len <= 0xFFFF {
            2
        } else {
            4
        }
    }

    /// Returns the payload length and entry width for `data_len` bytes of
    /// field data followed by this schema's offset table.
    pub fn encoded_length(&self, data_len: usize) -> (usize, usize) {
        let entries = self.var_len_field_count.saturating_sub(1);
        if data_len + entries <= 0xFF {
            (data_len + entries, 1)
        } else if data_len + 2 * entries <= 0xFFFF {
            (data_len + 2 * entries, 2)
        } else {
            (data_len + 4 * entries, 4)
        }
    }

    /// Returns where the field at `index` begins.
    ///
    /// `offset_table` is the trailing table, `entry_size` its entry width
    /// and `data_len` the length of the field data preceding it.
    pub fn field_position(
        &self,
        index: usize,
        offset_table: &[u8],
        entry_size: usize,
        data_len: usize,
    ) -> Result<usize> {
        let anchor = self
            .anchors
            .get(index)
            .ok_or_else(|| PdxError::Serialization(format!("no field at index {}", index)))?;
        let position = match *anchor {
            FieldAnchor::Start(offset) => Some(offset),
            FieldAnchor::OffsetTable(var_index) => {
                Some(self.read_offset(offset_table, entry_size, var_index)?)
            }
            FieldAnchor::BeforeVarLen { var_index, back } => self
                .read_offset(offset_table, entry_size, var_index)?
                .checked_sub(back),
            FieldAnchor::BeforeEnd(back) => data_len.checked_sub(back),
        };
        match position {
            Some(p) if p <= data_len => Ok(p),
            _ => Err(PdxError::Serialization(format!(
                "field {} of '{}' lies outside {} bytes of field data",
                index, self.class_name, data_len
            ))),
        }
    }

    fn read_offset(&self, offset_table: &[u8], entry_size: usize, var_index: usize) -> Result<usize> {
        let slot = self.var_len_field_count - 1 - var_index;
        let start = slot * entry_size;
        let entry = offset_table.get(start..start + entry_size).ok_or_else(|| {
            PdxError::Serialization(format!("offset table too short for slot {}", slot))
        })?;
        Ok(entry.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize))
    }

    /// Returns the validated byte range of the field at `index` in `payload`.
    pub fn field_range(&self, index: usize, payload: &[u8]) -> Result<Range<usize>> {
        let entry_size = Self::offset_table_entry_size(payload.len());
        let table_len = self.var_len_field_count.saturating_sub(1) * entry_size;
        let data_len = payload.len().checked_sub(table_len).ok_or_else(|| {
            PdxError::Serialization(format!(
                "payload of {} bytes cannot hold a {} byte offset table",
                payload.len(),
                table_len
            ))
        })?;
        let table = &payload[data_len..];
        let start = self.field_position(index, table, entry_size, data_len)?;
        let end = if index + 1 < self.fields.len() {
            self.field_position(index + 1, table, entry_size, data_len)?
        } else {
            data_len
        };
        if start > end {
            return Err(PdxError::Serialization(format!(
                "field '{}' has negative length",
                self.fields[index].name
            )));
        }
        if let Some(width) = self.fields[index].field_type.fixed_width() {
            if end - start != width {
                return Err(PdxError::Serialization(format!(
                    "field '{}' spans {} bytes, expected {}",
                    self.fields[index].name,
                    end - start,
                    width
                )));
            }
        }
        Ok(start..end)
    }

    /// Order-independent comparison of the (name, type) sets and class name.
    pub fn structural_equals(&self, other: &TypeSchema) -> bool {
        self.class_name == other.class_name
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|f| other.field(&f.name).map(|o| o.field_type) == Some(f.field_type))
    }

    /// Order-independent hash of the (name, type) set. The class name is
    /// not included.
    pub fn structural_hash(&self) -> i32 {
        self.fields.iter().fold(0i32, |h, f| {
            h.wrapping_add(
                java_string_hash(&f.name)
                    .wrapping_mul(31)
                    .wrapping_add(f.field_type.id() as i32),
            )
        })
    }
}

impl PartialEq for TypeSchema {
    fn eq(&self, other: &Self) -> bool {
        self.structural_equals(other)
    }
}

impl Eq for TypeSchema {}

impl Hash for TypeSchema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.structural_hash());
    }
}

fn compute_anchors(fields: &[FieldDescriptor]) -> Vec<FieldAnchor> {
    let mut anchors = Vec::with_capacity(fields.len());
    let mut leading = 0usize;
    let mut seen_var_len = 0usize;
    for (i, field) in fields.iter().enumerate() {
        match field.field_type.fixed_width() {
            None => {
                anchors.push(if seen_var_len == 0 {
                    FieldAnchor::Start(leading)
                } else {
                    FieldAnchor::OffsetTable(seen_var_len)
                });
                seen_var_len += 1;
            }
            Some(width) if seen_var_len == 0 => {
                anchors.push(FieldAnchor::Start(leading));
                leading += width;
            }
            Some(_) => {
                let mut back = 0;
                let mut anchor = None;
                for next in &fields[i..] {
                    match next.field_type.fixed_width() {
                        Some(w) => back += w,
                        None => {
                            anchor = Some(FieldAnchor::BeforeVarLen {
                                var_index: seen_var_len,
                                back,
                            });
                            break;
                        }
                    }
                }
                anchors.push(anchor.unwrap_or(FieldAnchor::BeforeEnd(back)));
            }
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn mixed_schema() -> TypeSchema {
        let mut schema = TypeSchema::new("Mixed");
        schema.add_field("a", FieldType::Int).unwrap();
        schema.add_field("s", FieldType::String).unwrap();
        schema.add_field("b", FieldType::Int).unwrap();
        schema.add_field("t", FieldType::String).unwrap();
        schema.add_field("c", FieldType::Long).unwrap();
        schema
    }

    fn mixed_payload() -> Vec<u8> {
        let mut payload = vec![0, 0, 0, 1];
        payload.extend_from_slice(&[42, 0, 1, b'x']);
        payload.extend_from_slice(&[0, 0, 0, 2]);
        payload.push(69);
        payload.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 3]);
        payload.push(12);
        payload
    }

    fn hash_of(schema: &TypeSchema) -> u64 {
        let mut hasher = DefaultHasher::new();
        schema.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_new_schema() {
        let schema = TypeSchema::new("Sample");
        assert_eq!(schema.class_name(), "Sample");
        assert_eq!(schema.type_id(), 0);
        assert_eq!(schema.field_count(), 0);
        assert_eq!(schema.var_len_field_count(), 0);
    }

    #[test]
    fn test_add_field_assigns_sequence() {
        let schema = mixed_schema();
        assert_eq!(schema.field("a").unwrap().sequence_index(), 0);
        assert_eq!(schema.field("c").unwrap().sequence_index(), 4);
        assert_eq!(schema.var_len_field_count(), 2);
        assert_eq!(schema.index_of("t"), Some(3));
        assert!(schema.has_field("b"));
        assert!(!schema.has_field("z"));
        assert_eq!(schema.field_names(), vec!["a", "s", "b", "t", "c"]);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut schema = TypeSchema::new("Sample");
        schema.add_field("x", FieldType::Int).unwrap();
        assert!(matches!(
            schema.add_field("x", FieldType::Long),
            Err(PdxError::DuplicateField(name)) if name == "x"
        ));
    }

    #[test]
    fn test_length_class_checked() {
        let mut schema = TypeSchema::new("Sample");
        assert!(schema.add_fixed_length_field("s", FieldType::String).is_err());
        assert!(schema.add_variable_length_field("i", FieldType::Int).is_err());
        assert!(schema.add_fixed_length_field("i", FieldType::Int).is_ok());
        assert!(schema.add_variable_length_field("s", FieldType::String).is_ok());
    }

    #[test]
    fn test_anchors() {
        let schema = mixed_schema();
        assert_eq!(
            schema.anchors,
            vec![
                FieldAnchor::Start(0),
                FieldAnchor::Start(4),
                FieldAnchor::BeforeVarLen {
                    var_index: 1,
                    back: 4
                },
                FieldAnchor::OffsetTable(1),
                FieldAnchor::BeforeEnd(8),
            ]
        );
    }

    #[test]
    fn test_field_ranges() {
        let schema = mixed_schema();
        let payload = mixed_payload();
        assert_eq!(schema.field_range(0, &payload).unwrap(), 0..4);
        assert_eq!(schema.field_range(1, &payload).unwrap(), 4..8);
        assert_eq!(schema.field_range(2, &payload).unwrap(), 8..12);
        assert_eq!(schema.field_range(3, &payload).unwrap(), 12..13);
        assert_eq!(schema.field_range(4, &payload).unwrap(), 13..21);
    }

    #[test]
    fn test_field_position_direct() {
        let schema = mixed_schema();
        let table = [12u8];
        assert_eq!(schema.field_position(2, &table, 1, 21).unwrap(), 8);
        assert_eq!(schema.field_position(3, &table, 1, 21).unwrap(), 12);
        assert_eq!(schema.field_position(4, &table, 1, 21).unwrap(), 13);
    }

    #[test]
    fn test_corrupt_offset_is_error() {
        let schema = mixed_schema();
        let mut payload = mixed_payload();
        *payload.last_mut().unwrap() = 200;
        assert!(schema.field_range(3, &payload).is_err());
        assert!(schema.field_range(2, &payload).is_err());
    }

    #[test]
    fn test_truncated_payload_is_error() {
        let schema = mixed_schema();
        assert!(schema.field_range(0, &[]).is_err());
        assert!(schema.field_range(4, &[0, 0, 0]).is_err());
    }

    #[test]
    fn test_all_fixed_layout() {
        let mut schema = TypeSchema::new("Fixed");
        schema.add_field("flag", FieldType::Boolean).unwrap();
        schema.add_field("n", FieldType::Double).unwrap();
        let payload = [1u8, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(schema.field_range(0, &payload).unwrap(), 0..1);
        assert_eq!(schema.field_range(1, &payload).unwrap(), 1..9);
    }

    #[test]
    fn test_offset_table_entry_size() {
        assert_eq!(TypeSchema::offset_table_entry_size(0), 1);
        assert_eq!(TypeSchema::offset_table_entry_size(0xFF), 1);
        assert_eq!(TypeSchema::offset_table_entry_size(0x100), 2);
        assert_eq!(TypeSchema::offset_table_entry_size(0xFFFF), 2);
        assert_eq!(TypeSchema::offset_table_entry_size(0x10000), 4);
    }

    #[test]
    fn test_encoded_length_agrees_with_reader() {
        let schema = mixed_schema();
        for data_len in [0, 200, 254, 255, 256, 0xFFFD, 0xFFFE, 0xFFFF, 0x10000] {
            let (len, size) = schema.encoded_length(data_len);
            assert_eq!(len, data_len + size);
            assert_eq!(TypeSchema::offset_table_entry_size(len), size);
        }
    }

    #[test]
    fn test_identity_fields_sorted() {
        let mut schema = mixed_schema();
        let names: Vec<&str> = schema.identity_fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a", "b", "c", "s", "t"]);

        schema.mark_identity_field("t").unwrap();
        schema.mark_identity_field("b").unwrap();
        let names: Vec<&str> = schema.identity_fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["b", "t"]);
    }

    #[test]
    fn test_with_identity_of() {
        let registered = mixed_schema();
        let mut local = TypeSchema::new("Mixed");
        local.add_field("c", FieldType::Long).unwrap();
        local.add_field("s", FieldType::String).unwrap();
        local.mark_identity_field("c").unwrap();

        let merged = registered.with_identity_of(&local);
        assert_eq!(merged.field_names(), registered.field_names());
        assert_eq!(merged.marked_identity_names(), vec!["c"]);
        assert!(registered.marked_identity_names().is_empty());
    }

    #[test]
    fn test_mark_unknown_identity_field() {
        let mut schema = TypeSchema::new("Sample");
        assert!(matches!(
            schema.mark_identity_field("x"),
            Err(PdxError::IllegalState(_))
        ));
    }

    #[test]
    fn test_structural_equality_is_order_independent() {
        let mut a = TypeSchema::new("Sample");
        a.add_field("m_bool", FieldType::Boolean).unwrap();
        a.add_field("m_int32", FieldType::Int).unwrap();
        a.add_field("m_name", FieldType::String).unwrap();

        let mut b = TypeSchema::new("Sample");
        b.add_field("m_name", FieldType::String).unwrap();
        b.add_field("m_int32", FieldType::Int).unwrap();
        b.add_field("m_bool", FieldType::Boolean).unwrap();
        b.mark_identity_field("m_int32").unwrap();

        assert!(a.structural_equals(&b));
        assert_eq!(a.structural_hash(), b.structural_hash());
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_structural_inequality() {
        let mut a = TypeSchema::new("Sample");
        a.add_field("x", FieldType::Int).unwrap();
        let mut b = TypeSchema::new("Sample");
        b.add_field("x", FieldType::Long).unwrap();
        let mut c = TypeSchema::new("Sample");
        c.add_field("x", FieldType::Int).unwrap();
        c.add_field("y", FieldType::Int).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_class_name_in_equality_not_hash() {
        let mut a = TypeSchema::new("First");
        a.add_field("x", FieldType::Int).unwrap();
        let mut b = TypeSchema::new("Second");
        b.add_field("x", FieldType::Int).unwrap();
        assert!(!a.structural_equals(&b));
        assert_eq!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn test_field_descriptor_equality_ignores_index() {
        let mut a = TypeSchema::new("A");
        a.add_field("pad", FieldType::Byte).unwrap();
        a.add_field("x", FieldType::Int).unwrap();
        let mut b = TypeSchema::new("B");
        b.add_field("x", FieldType::Int).unwrap();
        b.mark_identity_field("x").unwrap();
        assert_eq!(a.field("x"), b.field("x"));
    }
}

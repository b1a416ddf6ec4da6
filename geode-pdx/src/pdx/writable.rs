//! Copy-on-write modification of PDX instances.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{PdxError, Result};

use super::writer::{LocalWriter, PDX_HEADER_LEN};
use super::{FieldType, FieldValue, PdxFieldAccess, PdxInstance, PdxWriter};

/// A modifiable view of a `PdxInstance`.
///
/// Overwritten fields are kept in a sparse map; the base instance's bytes
/// are never mutated. `to_bytes` merges the overrides into a new payload
/// which then becomes the base.
#[derive(Debug, Clone)]
pub struct WritablePdxInstance {
    base: PdxInstance,
    overrides: HashMap<String, FieldValue>,
}

impl WritablePdxInstance {
    pub(crate) fn new(base: PdxInstance) -> Self {
        Self {
            base,
            overrides: HashMap::new(),
        }
    }

    /// Overwrites the named field.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if the schema has no such field and
    /// `FieldTypeMismatch` if `value` has a different type.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let declared = self.base.field_type(name)?;
        if declared != value.field_type() {
            return Err(PdxError::type_mismatch(name, value.field_type(), declared));
        }
        self.overrides.insert(name.to_string(), value);
        Ok(())
    }

    /// Returns the value of the named field, overrides first.
    pub fn get_field(&self, name: &str) -> Result<FieldValue> {
        match self.overrides.get(name) {
            Some(value) => Ok(value.clone()),
            None => self.base.get_field(name),
        }
    }

    /// Returns true if the field has been overwritten since the last merge.
    pub fn is_modified(&self, name: &str) -> bool {
        self.overrides.contains_key(name)
    }

    /// Returns the unmodified base instance.
    pub fn base(&self) -> &PdxInstance {
        &self.base
    }

    /// Merges the overrides and returns the framed encoding.
    ///
    /// Overwritten fields are re-encoded; every other field is copied
    /// verbatim from the base payload.
    pub fn to_bytes(&mut self) -> Result<Bytes> {
        if self.overrides.is_empty() {
            return self.base.to_bytes();
        }
        let ctx = Arc::clone(self.base.context());
        let schema = Arc::clone(self.base.schema()?);
        let mut writer = LocalWriter::with_base(&ctx, Arc::clone(&schema), self.base.payload()?.clone())?;
        for field in schema.fields() {
            if let Some(value) = self.overrides.remove(field.name()) {
                writer.write_field(field.name(), value)?;
            }
        }
        let bytes = writer.finish()?;
        self.base = PdxInstance::with_schema(ctx, schema, bytes.slice(PDX_HEADER_LEN..));
        Ok(bytes)
    }

    /// Merges the overrides and returns the resulting instance.
    pub fn to_instance(&mut self) -> Result<PdxInstance> {
        self.to_bytes()?;
        Ok(self.base.clone())
    }
}

impl PdxFieldAccess for WritablePdxInstance {
    fn get_field_as(&self, name: &str, field_type: FieldType) -> Result<FieldValue> {
        let actual = self.base.field_type(name)?;
        if actual != field_type {
            return Err(PdxError::type_mismatch(name, field_type, actual));
        }
        self.get_field(name)
    }
}

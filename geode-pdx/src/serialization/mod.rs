//! Binary primitives and tagged object values of the Geode wire format.

mod data_input;
mod data_output;
mod data_serializable;
mod ds_code;
pub(crate) mod value;

pub use data_input::{decode_modified_utf8, DataInput, ObjectDataInput};
pub use data_output::{
    encode_modified_utf8, DataOutput, ObjectDataOutput, ARRAY_LEN_INT_MARKER, ARRAY_LEN_NULL,
    ARRAY_LEN_SHORT_MARKER, MAX_SHORT_ARRAY_LEN,
};
pub use data_serializable::{DataSerializable, DataSerializableFactory, DataSerializableRegistry};
pub use ds_code::{ClassId, DsCode, FIXED_ID_BASE, FIXED_ID_FAMILY_SPAN};
pub use value::{Value, MAX_NESTING_DEPTH, OBJECT_ARRAY_COMPONENT_CLASS};

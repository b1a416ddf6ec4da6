//! PDX portable object serialization for Apache Geode compatible clients.
//!
//! Objects are written field by field through a [`PdxWriter`]; the first
//! write of a class discovers its schema and registers it in the context's
//! [`TypeRegistry`]. Serialized bytes can be materialized back into domain
//! types or inspected generically through [`PdxInstance`].

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod pdx;
pub mod serialization;
pub mod statistics;

pub use config::{PdxConfig, PdxConfigBuilder};
pub use context::{PdxContext, PdxContextBuilder};
pub use error::{PdxError, Result};
pub use pdx::{
    Deserialized, FieldType, FieldValue, PdxFieldAccess, PdxInstance, PdxInstanceFactory,
    PdxReader, PdxSerializable, PdxSerializer, PdxWriter, TypeRegistry, TypeSchema,
    WritablePdxInstance,
};
pub use serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput, Value};
pub use statistics::{PdxStatistics, StatisticsCollector};

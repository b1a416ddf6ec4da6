//! Wire type codes and the class-id codec.
//!
//! Every tagged value on the wire starts with a one byte `DsCode`. User
//! types and fixed-id (cross-language well-known) types additionally carry a
//! numeric class id whose encoded width depends on its range.

use crate::error::{PdxError, Result};

use super::{DataInput, DataOutput};

/// One-byte type codes used to tag serialized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum DsCode {
    FixedIdByte = 1,
    FixedIdShort = 2,
    FixedIdInt = 3,
    CacheableLinkedList = 10,
    BooleanArray = 26,
    CharArray = 27,
    CacheableUserData4 = 37,
    CacheableUserData2 = 38,
    CacheableUserData = 39,
    NullObj = 41,
    CacheableString = 42,
    Class = 43,
    CacheableBytes = 46,
    CacheableInt16Array = 47,
    CacheableInt32Array = 48,
    CacheableInt64Array = 49,
    CacheableFloatArray = 50,
    CacheableDoubleArray = 51,
    CacheableObjectArray = 52,
    CacheableBoolean = 53,
    CacheableCharacter = 54,
    CacheableByte = 55,
    CacheableInt16 = 56,
    CacheableInt32 = 57,
    CacheableInt64 = 58,
    CacheableFloat = 59,
    CacheableDouble = 60,
    CacheableDate = 61,
    CacheableStringArray = 64,
    CacheableArrayList = 65,
    CacheableHashSet = 66,
    CacheableHashMap = 67,
    NullString = 69,
    CacheableHashTable = 70,
    CacheableVector = 71,
    CacheableLinkedHashSet = 73,
    CacheableAsciiString = 87,
    CacheableAsciiStringHuge = 88,
    CacheableStringHuge = 89,
    Pdx = 93,
}

impl DsCode {
    /// Returns the wire byte for this code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Maps a wire byte back to its code, or `None` if it is not known.
    pub fn from_code(code: u8) -> Option<Self> {
        let ds = match code {
            1 => DsCode::FixedIdByte,
            2 => DsCode::FixedIdShort,
            3 => DsCode::FixedIdInt,
            10 => DsCode::CacheableLinkedList,
            26 => DsCode::BooleanArray,
            27 => DsCode::CharArray,
            37 => DsCode::CacheableUserData4,
            38 => DsCode::CacheableUserData2,
            39 => DsCode::CacheableUserData,
            41 => DsCode::NullObj,
            42 => DsCode::CacheableString,
            43 => DsCode::Class,
            46 => DsCode::CacheableBytes,
            47 => DsCode::CacheableInt16Array,
            48 => DsCode::CacheableInt32Array,
            49 => DsCode::CacheableInt64Array,
            50 => DsCode::CacheableFloatArray,
            51 => DsCode::CacheableDoubleArray,
            52 => DsCode::CacheableObjectArray,
            53 => DsCode::CacheableBoolean,
            54 => DsCode::CacheableCharacter,
            55 => DsCode::CacheableByte,
            56 => DsCode::CacheableInt16,
            57 => DsCode::CacheableInt32,
            58 => DsCode::CacheableInt64,
            59 => DsCode::CacheableFloat,
            60 => DsCode::CacheableDouble,
            61 => DsCode::CacheableDate,
            64 => DsCode::CacheableStringArray,
            65 => DsCode::CacheableArrayList,
            66 => DsCode::CacheableHashSet,
            67 => DsCode::CacheableHashMap,
            69 => DsCode::NullString,
            70 => DsCode::CacheableHashTable,
            71 => DsCode::CacheableVector,
            73 => DsCode::CacheableLinkedHashSet,
            87 => DsCode::CacheableAsciiString,
            88 => DsCode::CacheableAsciiStringHuge,
            89 => DsCode::CacheableStringHuge,
            93 => DsCode::Pdx,
            _ => return None,
        };
        Some(ds)
    }
}

/// First class id of the fixed-id range.
pub const FIXED_ID_BASE: u32 = 0x8000_0000;

/// Width of each fixed-id family.
pub const FIXED_ID_FAMILY_SPAN: u32 = 0x2000_0000;

/// A decoded class id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassId {
    /// An application type registered by numeric id.
    User(u32),
    /// A well-known type shared across languages.
    Fixed {
        /// Sub-type discriminator within the family.
        sub_type: u32,
        /// Serialization-format family (selects the id width).
        family: u32,
    },
}

impl ClassId {
    /// Classifies a raw 32-bit class id.
    pub fn from_raw(id: u32) -> Self {
        if id >= FIXED_ID_BASE {
            let rel = id - FIXED_ID_BASE;
            ClassId::Fixed {
                sub_type: rel % FIXED_ID_FAMILY_SPAN,
                family: rel / FIXED_ID_FAMILY_SPAN,
            }
        } else {
            ClassId::User(id)
        }
    }

    /// Returns the raw 32-bit class id.
    pub fn raw(self) -> u32 {
        match self {
            ClassId::User(id) => id,
            ClassId::Fixed { sub_type, family } => {
                FIXED_ID_BASE + family * FIXED_ID_FAMILY_SPAN + sub_type
            }
        }
    }

    /// Returns the type code that introduces this class id on the wire.
    pub fn ds_code(self) -> Result<DsCode> {
        match self {
            ClassId::User(id) if id <= 0x7F => Ok(DsCode::CacheableUserData),
            ClassId::User(id) if id <= 0x7FFF => Ok(DsCode::CacheableUserData2),
            ClassId::User(_) => Ok(DsCode::CacheableUserData4),
            ClassId::Fixed { family: 0, .. } => Ok(DsCode::FixedIdByte),
            ClassId::Fixed { family: 1, .. } => Ok(DsCode::FixedIdShort),
            ClassId::Fixed { family: 2, .. } => Ok(DsCode::FixedIdInt),
            ClassId::Fixed { family, .. } => Err(PdxError::Serialization(format!(
                "unsupported fixed id family: {}",
                family
            ))),
        }
    }

    /// Writes the type code followed by the id at its encoded width.
    pub fn write(self, output: &mut dyn DataOutput) -> Result<()> {
        let code = self.ds_code()?;
        output.write_unsigned_byte(code.code())?;
        let id = match self {
            ClassId::User(id) => id,
            ClassId::Fixed { sub_type, .. } => sub_type,
        };
        match code {
            DsCode::CacheableUserData | DsCode::FixedIdByte => output.write_byte(id as i8),
            DsCode::CacheableUserData2 | DsCode::FixedIdShort => output.write_short(id as i16),
            _ => output.write_int(id as i32),
        }
    }

    /// Reads the id that follows an already consumed class-id type code.
    pub fn read_after(code: DsCode, input: &mut dyn DataInput) -> Result<Self> {
        let class_id = match code {
            DsCode::CacheableUserData => ClassId::User(input.read_unsigned_byte()? as u32),
            DsCode::CacheableUserData2 => ClassId::User(input.read_char()? as u32),
            DsCode::CacheableUserData4 => ClassId::User(input.read_int()? as u32),
            DsCode::FixedIdByte => ClassId::Fixed {
                sub_type: input.read_unsigned_byte()? as u32,
                family: 0,
            },
            DsCode::FixedIdShort => ClassId::Fixed {
                sub_type: input.read_char()? as u32,
                family: 1,
            },
            DsCode::FixedIdInt => ClassId::Fixed {
                sub_type: input.read_int()? as u32,
                family: 2,
            },
            other => {
                return Err(PdxError::Serialization(format!(
                    "{:?} does not introduce a class id",
                    other
                )))
            }
        };
        Ok(class_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{ObjectDataInput, ObjectDataOutput};

    #[test]
    fn test_code_round_trip() {
        for code in 0u8..=255 {
            if let Some(ds) = DsCode::from_code(code) {
                assert_eq!(ds.code(), code);
            }
        }
        assert_eq!(DsCode::from_code(93), Some(DsCode::Pdx));
        assert_eq!(DsCode::from_code(200), None);
    }

    #[test]
    fn test_user_id_width_boundaries() {
        assert_eq!(
            ClassId::User(0x7F).ds_code().unwrap(),
            DsCode::CacheableUserData
        );
        assert_eq!(
            ClassId::User(0x80).ds_code().unwrap(),
            DsCode::CacheableUserData2
        );
        assert_eq!(
            ClassId::User(0x7FFF).ds_code().unwrap(),
            DsCode::CacheableUserData2
        );
        assert_eq!(
            ClassId::User(0x8000).ds_code().unwrap(),
            DsCode::CacheableUserData4
        );
    }

    #[test]
    fn test_fixed_id_decomposition() {
        assert_eq!(
            ClassId::from_raw(0x8000_0005),
            ClassId::Fixed {
                sub_type: 5,
                family: 0
            }
        );
        assert_eq!(
            ClassId::from_raw(0xA000_0007),
            ClassId::Fixed {
                sub_type: 7,
                family: 1
            }
        );
        assert_eq!(
            ClassId::from_raw(0xC000_0100),
            ClassId::Fixed {
                sub_type: 0x100,
                family: 2
            }
        );
        assert_eq!(ClassId::from_raw(0x7FFF_FFFF), ClassId::User(0x7FFF_FFFF));
        assert_eq!(ClassId::from_raw(0xC000_0100).raw(), 0xC000_0100);
    }

    #[test]
    fn test_fixed_id_unsupported_family() {
        assert!(ClassId::from_raw(0xE000_0000).ds_code().is_err());
    }

    #[test]
    fn test_write_and_read_user_ids() {
        for id in [0u32, 0x7F, 0x80, 0x7FFF, 0x8000, 0x7FFF_FFFF] {
            let mut output = ObjectDataOutput::new();
            ClassId::User(id).write(&mut output).unwrap();
            let bytes = output.into_bytes();
            let mut input = ObjectDataInput::new(&bytes);
            let code = DsCode::from_code(input.read_unsigned_byte().unwrap()).unwrap();
            assert_eq!(ClassId::read_after(code, &mut input).unwrap(), ClassId::User(id));
        }
    }

    #[test]
    fn test_encoded_widths() {
        let mut output = ObjectDataOutput::new();
        ClassId::User(5).write(&mut output).unwrap();
        assert_eq!(output.as_bytes(), &[39, 5]);

        let mut output = ObjectDataOutput::new();
        ClassId::User(0x1234).write(&mut output).unwrap();
        assert_eq!(output.as_bytes(), &[38, 0x12, 0x34]);

        let mut output = ObjectDataOutput::new();
        ClassId::from_raw(0xA000_0010).write(&mut output).unwrap();
        assert_eq!(output.as_bytes(), &[2, 0x00, 0x10]);
    }

    #[test]
    fn test_read_after_rejects_other_codes() {
        let data = [1u8];
        let mut input = ObjectDataInput::new(&data);
        assert!(ClassId::read_after(DsCode::CacheableInt32, &mut input).is_err());
    }
}

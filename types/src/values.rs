use crate::{
    marshalling::{node_codec, Marshal, MarshallingContext, Unmarshal, UnmarshallingContext},
    references::StorageReference,
    storage_types::ClassType,
};
use bytes::{Buf, BufMut};
use commonware_codec::Error;
use num_bigint::BigInt;
use std::{cmp::Ordering, fmt};

const TRUE: u8 = 0;
const FALSE: u8 = 1;
const BYTE: u8 = 2;
const CHAR: u8 = 3;
const DOUBLE: u8 = 4;
const FLOAT: u8 = 5;
const BIG_INTEGER: u8 = 6;
const LONG: u8 = 7;
const NULL: u8 = 8;
const SHORT: u8 = 9;
const STRING: u8 = 10;
const REFERENCE: u8 = 11;
const ENUM: u8 = 12;
const EMPTY_STRING: u8 = 13;
const INT: u8 = 14;

/// A value that can be kept in storage: an actual argument, a result, or the
/// content of a persistent field.
#[derive(Clone)]
pub enum StorageValue {
    Null,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInteger(BigInt),
    String(String),
    Enum { class: ClassType, name: String },
    Reference(StorageReference),
}

impl StorageValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Byte(_) => 2,
            Self::Char(_) => 3,
            Self::Short(_) => 4,
            Self::Int(_) => 5,
            Self::Long(_) => 6,
            Self::Float(_) => 7,
            Self::Double(_) => 8,
            Self::BigInteger(_) => 9,
            Self::String(_) => 10,
            Self::Enum { .. } => 11,
            Self::Reference(_) => 12,
        }
    }

    pub fn as_reference(&self) -> Option<&StorageReference> {
        match self {
            Self::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_big_integer(&self) -> Option<&BigInt> {
        match self {
            Self::BigInteger(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Ord for StorageValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Byte(a), Self::Byte(b)) => a.cmp(b),
            (Self::Char(a), Self::Char(b)) => a.cmp(b),
            (Self::Short(a), Self::Short(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Long(a), Self::Long(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            (Self::BigInteger(a), Self::BigInteger(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (
                Self::Enum { class, name },
                Self::Enum {
                    class: other_class,
                    name: other_name,
                },
            ) => class.cmp(other_class).then_with(|| name.cmp(other_name)),
            (Self::Reference(a), Self::Reference(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for StorageValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for StorageValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StorageValue {}

impl fmt::Display for StorageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Byte(value) => write!(f, "{value}"),
            Self::Char(value) => match char::from_u32(u32::from(*value)) {
                Some(c) => write!(f, "{c}"),
                None => write!(f, "\\u{value:04x}"),
            },
            Self::Short(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Long(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::BigInteger(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "\"{value}\""),
            Self::Enum { class, name } => write!(f, "{class}.{name}"),
            Self::Reference(reference) => write!(f, "{reference}"),
        }
    }
}

impl fmt::Debug for StorageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<bool> for StorageValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for StorageValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for StorageValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<BigInt> for StorageValue {
    fn from(value: BigInt) -> Self {
        Self::BigInteger(value)
    }
}

impl From<&str> for StorageValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for StorageValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<StorageReference> for StorageValue {
    fn from(reference: StorageReference) -> Self {
        Self::Reference(reference)
    }
}

impl Marshal for StorageValue {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        match self {
            Self::Null => context.write_u8(NULL),
            Self::Boolean(true) => context.write_u8(TRUE),
            Self::Boolean(false) => context.write_u8(FALSE),
            Self::Byte(value) => {
                context.write_u8(BYTE);
                context.write_u8(*value as u8);
            }
            Self::Char(value) => {
                context.write_u8(CHAR);
                context.write_char(*value);
            }
            Self::Short(value) => {
                context.write_u8(SHORT);
                context.write_i16(*value);
            }
            Self::Int(value) => {
                context.write_u8(INT);
                context.write_i32(*value);
            }
            Self::Long(value) => {
                context.write_u8(LONG);
                context.write_i64(*value);
            }
            Self::Float(value) => {
                context.write_u8(FLOAT);
                context.write_f32(*value);
            }
            Self::Double(value) => {
                context.write_u8(DOUBLE);
                context.write_f64(*value);
            }
            Self::BigInteger(value) => {
                context.write_u8(BIG_INTEGER);
                context.write_big_integer(value);
            }
            Self::String(value) if value.is_empty() => context.write_u8(EMPTY_STRING),
            Self::String(value) => {
                context.write_u8(STRING);
                context.write_string_unshared(value);
            }
            Self::Enum { class, name } => {
                context.write_u8(ENUM);
                class.marshal(context);
                context.write_string_unshared(name);
            }
            Self::Reference(reference) => {
                context.write_u8(REFERENCE);
                reference.marshal(context);
            }
        }
    }
}

impl Unmarshal for StorageValue {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        Ok(match context.read_u8()? {
            TRUE => Self::Boolean(true),
            FALSE => Self::Boolean(false),
            BYTE => Self::Byte(context.read_u8()? as i8),
            CHAR => Self::Char(context.read_char()?),
            DOUBLE => Self::Double(context.read_f64()?),
            FLOAT => Self::Float(context.read_f32()?),
            BIG_INTEGER => Self::BigInteger(context.read_big_integer()?),
            LONG => Self::Long(context.read_i64()?),
            NULL => Self::Null,
            SHORT => Self::Short(context.read_i16()?),
            STRING => Self::String(context.read_string_unshared()?),
            REFERENCE => Self::Reference(StorageReference::unmarshal(context)?),
            ENUM => Self::Enum {
                class: ClassType::unmarshal(context)?,
                name: context.read_string_unshared()?,
            },
            EMPTY_STRING => Self::String(String::new()),
            INT => Self::Int(context.read_i32()?),
            selector => return Err(Error::InvalidEnum(selector)),
        })
    }
}

node_codec!(StorageValue);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marshalling::Flavor, references::TransactionReference};
    use commonware_codec::{DecodeExt, Encode};
    use proptest::prelude::*;

    #[test]
    fn selectors_follow_the_wire_table() {
        assert_eq!(StorageValue::Boolean(true).to_bytes(Flavor::Node), vec![0]);
        assert_eq!(StorageValue::Null.to_bytes(Flavor::Node), vec![8]);
        assert_eq!(StorageValue::from("").to_bytes(Flavor::Node), vec![13]);
        assert_eq!(
            StorageValue::Int(999).to_bytes(Flavor::Node),
            vec![0x0e, 0x00, 0x00, 0x03, 0xe7]
        );
        assert_eq!(
            StorageValue::BigInteger(BigInt::from(999)).to_bytes(Flavor::Node),
            vec![0x06, 0x00, 0x03, 0xe7]
        );
    }

    #[test]
    fn floats_are_totally_ordered() {
        let nan = StorageValue::Double(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert!(StorageValue::Double(-0.0) < StorageValue::Double(0.0));
        assert!(StorageValue::Float(1.0) < StorageValue::Float(f32::INFINITY));
    }

    #[test]
    fn variants_order_by_rank_first() {
        assert!(StorageValue::Null < StorageValue::Boolean(false));
        assert!(StorageValue::Int(i32::MAX) < StorageValue::Long(i64::MIN));
        let reference = StorageReference::new(TransactionReference::new([0; 32]), 0);
        assert!(StorageValue::from("zzz") < StorageValue::from(reference));
    }

    #[test]
    fn codec_traits_use_node_flavor() {
        let value = StorageValue::Enum {
            class: ClassType::new("io.takamaka.code.lang.Color"),
            name: "RED".into(),
        };
        let encoded = value.encode();
        assert_eq!(encoded[0], ENUM);
        assert_eq!(StorageValue::decode(encoded).unwrap(), value);
    }

    #[test]
    fn unknown_value_selector_is_rejected() {
        let err = StorageValue::from_bytes(&[15], Flavor::Node).expect_err("15 is free");
        assert!(matches!(err, Error::InvalidEnum(15)));
    }

    fn arbitrary_value() -> impl Strategy<Value = StorageValue> {
        prop_oneof![
            Just(StorageValue::Null),
            any::<bool>().prop_map(StorageValue::Boolean),
            any::<i8>().prop_map(StorageValue::Byte),
            any::<u16>().prop_map(StorageValue::Char),
            any::<i16>().prop_map(StorageValue::Short),
            any::<i32>().prop_map(StorageValue::Int),
            any::<i64>().prop_map(StorageValue::Long),
            any::<f32>().prop_map(StorageValue::Float),
            any::<f64>().prop_map(StorageValue::Double),
            any::<i128>().prop_map(|v| StorageValue::BigInteger(BigInt::from(v))),
            ".{0,40}".prop_map(StorageValue::String),
            (any::<[u8; 32]>(), any::<u64>()).prop_map(|(hash, progressive)| {
                StorageValue::Reference(StorageReference::new(
                    TransactionReference::new(hash),
                    progressive,
                ))
            }),
        ]
    }

    proptest! {
        #[test]
        fn values_survive_a_shared_stream(values in proptest::collection::vec(arbitrary_value(), 0..16)) {
            let mut context = MarshallingContext::new(Vec::new(), Flavor::Node);
            context.write_array(&values);
            let bytes = context.into_inner();

            let mut reader = bytes.as_slice();
            let mut reading = UnmarshallingContext::new(&mut reader, Flavor::Node);
            let decoded: Vec<StorageValue> = reading.read_array().unwrap();
            prop_assert_eq!(decoded, values);
            prop_assert_eq!(reading.remaining(), 0);
        }
    }
}

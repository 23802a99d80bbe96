use crate::{
    marshalling::{node_codec, Marshal, MarshallingContext, Unmarshal, UnmarshallingContext},
    references::{StorageReference, TransactionReference},
    signatures::FieldSignature,
    storage_types::{ClassType, StorageType},
    values::StorageValue,
};
use bytes::{Buf, BufMut};
use commonware_codec::Error;
use num_traits::Zero;
use std::{cmp::Ordering, fmt};

const CLASS_TAG: u8 = 0;
const BALANCE: u8 = 1;
const BIG_INTEGER: u8 = 2;
const FALSE: u8 = 3;
const TRUE: u8 = 4;
const BYTE: u8 = 5;
const CHAR: u8 = 6;
const DOUBLE: u8 = 7;
const FLOAT: u8 = 8;
const INT: u8 = 9;
const SHORT: u8 = 10;
const LONG: u8 = 11;
const NONCE: u8 = 12;
const STRING: u8 = 13;
const ENUM_EAGER: u8 = 14;
const ENUM_LAZY: u8 = 15;
const REFERENCE: u8 = 16;
const NULL_EAGER: u8 = 17;
const NULL_LAZY: u8 = 18;
const BALANCE_TO_ZERO: u8 = 39;
const NONCE_TO_ZERO: u8 = 40;

/// A change to an object in storage, produced by a transaction.
#[derive(Clone, PartialEq, Eq)]
pub enum Update {
    /// The object was created with the given class, defined in `jar`.
    ClassTag {
        object: StorageReference,
        class: ClassType,
        jar: TransactionReference,
    },
    /// The field of the object now holds `value`.
    Field {
        object: StorageReference,
        field: FieldSignature,
        value: StorageValue,
    },
}

impl Update {
    pub fn class_tag(object: StorageReference, class: ClassType, jar: TransactionReference) -> Self {
        Self::ClassTag { object, class, jar }
    }

    pub fn field(
        object: StorageReference,
        field: FieldSignature,
        value: impl Into<StorageValue>,
    ) -> Self {
        Self::Field {
            object,
            field,
            value: value.into(),
        }
    }

    pub fn object(&self) -> &StorageReference {
        match self {
            Self::ClassTag { object, .. } | Self::Field { object, .. } => object,
        }
    }

    pub fn updated_field(&self) -> Option<&FieldSignature> {
        match self {
            Self::ClassTag { .. } => None,
            Self::Field { field, .. } => Some(field),
        }
    }

    /// Whether the update is loaded together with its object, rather than on
    /// first access to the field.
    pub fn is_eager(&self) -> bool {
        match self {
            Self::ClassTag { .. } => true,
            Self::Field { field, value, .. } => match value {
                StorageValue::Null | StorageValue::Reference(_) => field.field_type.is_eager(),
                StorageValue::Enum { class, .. } => {
                    field.field_type == StorageType::Class(class.clone())
                }
                _ => true,
            },
        }
    }
}

impl Ord for Update {
    fn cmp(&self, other: &Self) -> Ordering {
        self.object().cmp(other.object()).then_with(|| match (self, other) {
            (
                Self::ClassTag { class, jar, .. },
                Self::ClassTag {
                    class: other_class,
                    jar: other_jar,
                    ..
                },
            ) => class.cmp(other_class).then_with(|| jar.cmp(other_jar)),
            (Self::ClassTag { .. }, Self::Field { .. }) => Ordering::Less,
            (Self::Field { .. }, Self::ClassTag { .. }) => Ordering::Greater,
            (
                Self::Field { field, value, .. },
                Self::Field {
                    field: other_field,
                    value: other_value,
                    ..
                },
            ) => field.cmp(other_field).then_with(|| value.cmp(other_value)),
        })
    }
}

impl PartialOrd for Update {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassTag { object, class, jar } => write!(f, "<{object}.class|{class}|@{jar}>"),
            Self::Field {
                object,
                field,
                value,
            } => write!(f, "<{object}|{field}|{value}>"),
        }
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Marshal for Update {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        let (object, field, value) = match self {
            Self::ClassTag { object, class, jar } => {
                context.write_u8(CLASS_TAG);
                object.marshal(context);
                class.marshal(context);
                jar.marshal(context);
                return;
            }
            Self::Field {
                object,
                field,
                value,
            } => (object, field, value),
        };

        // balance and nonce leave the field implicit
        let compact = match (field, value) {
            (f, StorageValue::BigInteger(v)) if *f == FieldSignature::BALANCE => {
                Some((BALANCE, BALANCE_TO_ZERO, v))
            }
            (f, StorageValue::BigInteger(v)) if *f == FieldSignature::NONCE => {
                Some((NONCE, NONCE_TO_ZERO, v))
            }
            _ => None,
        };
        if let Some((selector, to_zero, amount)) = compact {
            if amount.is_zero() {
                context.write_u8(to_zero);
                object.marshal(context);
            } else {
                context.write_u8(selector);
                object.marshal(context);
                context.write_big_integer(amount);
            }
            return;
        }

        let selector = match value {
            StorageValue::Null if field.field_type.is_eager() => NULL_EAGER,
            StorageValue::Null => NULL_LAZY,
            StorageValue::Boolean(true) => TRUE,
            StorageValue::Boolean(false) => FALSE,
            StorageValue::Byte(_) => BYTE,
            StorageValue::Char(_) => CHAR,
            StorageValue::Short(_) => SHORT,
            StorageValue::Int(_) => INT,
            StorageValue::Long(_) => LONG,
            StorageValue::Float(_) => FLOAT,
            StorageValue::Double(_) => DOUBLE,
            StorageValue::BigInteger(_) => BIG_INTEGER,
            StorageValue::String(_) => STRING,
            StorageValue::Enum { .. } if self.is_eager() => ENUM_EAGER,
            StorageValue::Enum { .. } => ENUM_LAZY,
            StorageValue::Reference(_) => REFERENCE,
        };
        context.write_u8(selector);
        object.marshal(context);
        field.marshal(context);
        match value {
            StorageValue::Null | StorageValue::Boolean(_) => {}
            StorageValue::Byte(v) => context.write_u8(*v as u8),
            StorageValue::Char(v) => context.write_char(*v),
            StorageValue::Short(v) => context.write_i16(*v),
            StorageValue::Int(v) => context.write_i32(*v),
            StorageValue::Long(v) => context.write_i64(*v),
            StorageValue::Float(v) => context.write_f32(*v),
            StorageValue::Double(v) => context.write_f64(*v),
            StorageValue::BigInteger(v) => context.write_big_integer(v),
            StorageValue::String(v) => context.write_string_unshared(v),
            StorageValue::Enum { class, name } => {
                class.marshal(context);
                context.write_string_unshared(name);
            }
            StorageValue::Reference(reference) => reference.marshal(context),
        }
    }
}

impl Unmarshal for Update {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        let selector = context.read_u8()?;
        let object = StorageReference::unmarshal(context)?;
        match selector {
            CLASS_TAG => {
                let class = ClassType::unmarshal(context)?;
                let jar = TransactionReference::unmarshal(context)?;
                return Ok(Self::class_tag(object, class, jar));
            }
            BALANCE => {
                let amount = context.read_big_integer()?;
                return Ok(Self::field(object, FieldSignature::BALANCE, amount));
            }
            NONCE => {
                let amount = context.read_big_integer()?;
                return Ok(Self::field(object, FieldSignature::NONCE, amount));
            }
            BALANCE_TO_ZERO => {
                return Ok(Self::field(object, FieldSignature::BALANCE, num_bigint::BigInt::zero()))
            }
            NONCE_TO_ZERO => {
                return Ok(Self::field(object, FieldSignature::NONCE, num_bigint::BigInt::zero()))
            }
            BIG_INTEGER..=NULL_LAZY => {}
            _ => return Err(Error::InvalidEnum(selector)),
        }

        let field = FieldSignature::unmarshal(context)?;
        let value = match selector {
            BIG_INTEGER => StorageValue::BigInteger(context.read_big_integer()?),
            FALSE => StorageValue::Boolean(false),
            TRUE => StorageValue::Boolean(true),
            BYTE => StorageValue::Byte(context.read_u8()? as i8),
            CHAR => StorageValue::Char(context.read_char()?),
            DOUBLE => StorageValue::Double(context.read_f64()?),
            FLOAT => StorageValue::Float(context.read_f32()?),
            INT => StorageValue::Int(context.read_i32()?),
            SHORT => StorageValue::Short(context.read_i16()?),
            LONG => StorageValue::Long(context.read_i64()?),
            STRING => StorageValue::String(context.read_string_unshared()?),
            ENUM_EAGER | ENUM_LAZY => StorageValue::Enum {
                class: ClassType::unmarshal(context)?,
                name: context.read_string_unshared()?,
            },
            REFERENCE => StorageValue::Reference(StorageReference::unmarshal(context)?),
            NULL_EAGER | NULL_LAZY => StorageValue::Null,
            _ => return Err(Error::InvalidEnum(selector)),
        };
        Ok(Self::Field {
            object,
            field,
            value,
        })
    }
}

node_codec!(Update);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshalling::Flavor;
    use num_bigint::BigInt;
    use std::collections::BTreeSet;

    fn object(progressive: u64) -> StorageReference {
        StorageReference::new(TransactionReference::new([7; 32]), progressive)
    }

    fn counter_field() -> FieldSignature {
        FieldSignature::new(ClassType::new("com.example.Counter"), "count", StorageType::INT)
    }

    #[test]
    fn class_tag_sorts_before_fields_of_same_object() {
        let updates: BTreeSet<Update> = [
            Update::field(object(1), counter_field(), 3),
            Update::field(object(0), FieldSignature::BALANCE, BigInt::from(5)),
            Update::class_tag(
                object(1),
                ClassType::new("com.example.Counter"),
                TransactionReference::new([1; 32]),
            ),
            Update::field(object(0), FieldSignature::NONCE, BigInt::from(1)),
        ]
        .into_iter()
        .collect();

        let ordered: Vec<_> = updates.into_iter().collect();
        assert_eq!(ordered[0].object(), &object(0));
        assert!(matches!(ordered[2], Update::ClassTag { .. }));
        assert_eq!(ordered[3].updated_field(), Some(&counter_field()));
    }

    #[test]
    fn balance_and_nonce_updates_are_compact() {
        let update = Update::field(object(2), FieldSignature::BALANCE, BigInt::from(1000));
        let bytes = update.to_bytes(Flavor::Node);
        assert_eq!(bytes[0], BALANCE);
        // selector, object (1 + 1 + 32 + 1), amount (1 + 2)
        assert_eq!(bytes.len(), 1 + 35 + 3);
        assert_eq!(Update::from_bytes(&bytes, Flavor::Node).unwrap(), update);

        let zero = Update::field(object(2), FieldSignature::NONCE, BigInt::zero());
        let bytes = zero.to_bytes(Flavor::Node);
        assert_eq!(bytes[0], NONCE_TO_ZERO);
        assert_eq!(Update::from_bytes(&bytes, Flavor::Node).unwrap(), zero);
    }

    #[test]
    fn null_updates_distinguish_eager_fields() {
        let eager = FieldSignature::new(ClassType::new("com.example.C"), "s", StorageType::STRING);
        let lazy = FieldSignature::new(
            ClassType::new("com.example.C"),
            "next",
            ClassType::new("com.example.C"),
        );
        let eager_update = Update::field(object(0), eager, StorageValue::Null);
        let lazy_update = Update::field(object(0), lazy, StorageValue::Null);
        assert!(eager_update.is_eager());
        assert!(!lazy_update.is_eager());
        assert_eq!(eager_update.to_bytes(Flavor::Node)[0], NULL_EAGER);
        assert_eq!(lazy_update.to_bytes(Flavor::Node)[0], NULL_LAZY);
    }

    #[test]
    fn enum_update_is_eager_when_field_has_enum_type() {
        let color = ClassType::new("com.example.Color");
        let field = FieldSignature::new(ClassType::new("com.example.C"), "c", color.clone());
        let update = Update::field(
            object(0),
            field,
            StorageValue::Enum {
                class: color,
                name: "RED".into(),
            },
        );
        let bytes = update.to_bytes(Flavor::Node);
        assert_eq!(bytes[0], ENUM_EAGER);
        assert_eq!(Update::from_bytes(&bytes, Flavor::Node).unwrap(), update);
    }

    #[test]
    fn field_updates_round_trip_in_one_stream() {
        let updates = vec![
            Update::field(object(0), counter_field(), 42),
            Update::field(object(0), counter_field(), StorageValue::Long(-1)),
            Update::field(object(1), FieldSignature::PUBLIC_KEY, "ab12"),
            Update::field(object(1), counter_field(), object(0)),
            Update::class_tag(object(3), ClassType::EOA, TransactionReference::new([2; 32])),
        ];
        let mut context = MarshallingContext::new(Vec::new(), Flavor::Node);
        context.write_array(&updates);
        let bytes = context.into_inner();

        let mut reader = bytes.as_slice();
        let mut reading = UnmarshallingContext::new(&mut reader, Flavor::Node);
        assert_eq!(reading.read_array::<Update>().unwrap(), updates);
    }

    #[test]
    fn unknown_update_selector_is_rejected() {
        let mut bytes = vec![20u8];
        bytes.extend(object(0).to_bytes(Flavor::Node));
        let err = Update::from_bytes(&bytes, Flavor::Node).expect_err("20 is unused");
        assert!(matches!(err, Error::InvalidEnum(20)));
    }
}

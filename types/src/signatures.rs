use crate::{
    marshalling::{Marshal, MarshallingContext, Unmarshal, UnmarshallingContext},
    storage_types::{ClassType, StorageType},
};
use bytes::{Buf, BufMut};
use commonware_codec::Error;
use std::{borrow::Cow, fmt};

/// A field, identified by the class that declares it, its name and its type.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldSignature {
    pub defining_class: ClassType,
    name: Cow<'static, str>,
    pub field_type: StorageType,
}

impl FieldSignature {
    /// Balance of every contract.
    pub const BALANCE: Self = Self {
        defining_class: ClassType::CONTRACT,
        name: Cow::Borrowed("balance"),
        field_type: StorageType::BIG_INTEGER,
    };

    /// Next nonce expected from an externally owned account.
    pub const NONCE: Self = Self {
        defining_class: ClassType::EOA,
        name: Cow::Borrowed("nonce"),
        field_type: StorageType::BIG_INTEGER,
    };

    /// Hex-encoded ed25519 public key of an externally owned account.
    pub const PUBLIC_KEY: Self = Self {
        defining_class: ClassType::EOA,
        name: Cow::Borrowed("publicKey"),
        field_type: StorageType::STRING,
    };

    pub fn new(
        defining_class: ClassType,
        name: impl Into<String>,
        field_type: impl Into<StorageType>,
    ) -> Self {
        Self {
            defining_class,
            name: Cow::Owned(name.into()),
            field_type: field_type.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn marshal_without_memo<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        self.defining_class.marshal(context);
        context.write_string_unshared(&self.name);
        self.field_type.marshal(context);
    }

    pub(crate) fn unmarshal_without_memo<B: Buf>(
        context: &mut UnmarshallingContext<B>,
    ) -> Result<Self, Error> {
        let defining_class = ClassType::unmarshal(context)?;
        let name = context.read_string_unshared()?;
        let field_type = StorageType::unmarshal(context)?;
        Ok(Self::new(defining_class, name, field_type))
    }
}

impl fmt::Display for FieldSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.defining_class, self.name, self.field_type)
    }
}

impl fmt::Debug for FieldSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Marshal for FieldSignature {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        context.write_field_signature(self);
    }
}

impl Unmarshal for FieldSignature {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        context.read_field_signature()
    }
}

const CONSTRUCTOR: u8 = 0;
const NON_VOID_METHOD: u8 = 1;
const VOID_METHOD: u8 = 2;

/// A constructor or method, as named by a request.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum CodeSignature {
    Constructor {
        class: ClassType,
        formals: Vec<StorageType>,
    },
    Method {
        class: ClassType,
        name: String,
        formals: Vec<StorageType>,
        /// `None` for void methods.
        returns: Option<StorageType>,
    },
}

impl CodeSignature {
    pub fn constructor(class: ClassType, formals: Vec<StorageType>) -> Self {
        Self::Constructor { class, formals }
    }

    pub fn method(
        class: ClassType,
        name: impl Into<String>,
        formals: Vec<StorageType>,
        returns: Option<StorageType>,
    ) -> Self {
        Self::Method {
            class,
            name: name.into(),
            formals,
            returns,
        }
    }

    /// `PayableContract.receive(amount)`, the target of a plain transfer.
    pub fn receive(amount: StorageType) -> Self {
        Self::method(ClassType::PAYABLE_CONTRACT, "receive", vec![amount], None)
    }

    pub fn defining_class(&self) -> &ClassType {
        match self {
            Self::Constructor { class, .. } | Self::Method { class, .. } => class,
        }
    }

    pub fn formals(&self) -> &[StorageType] {
        match self {
            Self::Constructor { formals, .. } | Self::Method { formals, .. } => formals,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Method { returns: None, .. })
    }

    /// The same code with the trailing `(Contract, Dummy)` formals of a
    /// `@FromContract` entry appended.
    pub fn with_entry_formals(&self) -> Self {
        let mut signature = self.clone();
        match &mut signature {
            Self::Constructor { formals, .. } | Self::Method { formals, .. } => {
                formals.push(ClassType::CONTRACT.into());
                formals.push(ClassType::DUMMY.into());
            }
        }
        signature
    }
}

impl fmt::Display for CodeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formals = self
            .formals()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        match self {
            Self::Constructor { class, .. } => write!(f, "{class}({formals})"),
            Self::Method {
                class,
                name,
                returns,
                ..
            } => match returns {
                Some(returns) => write!(f, "{returns} {class}.{name}({formals})"),
                None => write!(f, "void {class}.{name}({formals})"),
            },
        }
    }
}

impl Marshal for CodeSignature {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        let selector = match self {
            Self::Constructor { .. } => CONSTRUCTOR,
            Self::Method { returns: Some(_), .. } => NON_VOID_METHOD,
            Self::Method { returns: None, .. } => VOID_METHOD,
        };
        context.write_u8(selector);
        self.defining_class().marshal(context);
        context.write_array(self.formals());
        if let Self::Method { name, returns, .. } = self {
            context.write_string_unshared(name);
            if let Some(returns) = returns {
                returns.marshal(context);
            }
        }
    }
}

impl Unmarshal for CodeSignature {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        let selector = context.read_u8()?;
        if selector > VOID_METHOD {
            return Err(Error::InvalidEnum(selector));
        }
        let class = ClassType::unmarshal(context)?;
        let formals = context.read_array()?;
        if selector == CONSTRUCTOR {
            return Ok(Self::Constructor { class, formals });
        }
        let name = context.read_string_unshared()?;
        let returns = if selector == NON_VOID_METHOD {
            Some(StorageType::unmarshal(context)?)
        } else {
            None
        };
        Ok(Self::Method {
            class,
            name,
            formals,
            returns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshalling::Flavor;

    #[test]
    fn balance_field_golden_vector() {
        let bytes = FieldSignature::BALANCE.to_bytes(Flavor::Node);
        let mut expected = vec![0xff, 0x14, 0x00, 0x07];
        expected.extend_from_slice(b"balance");
        expected.push(0x1a);
        assert_eq!(bytes, expected);

        // no memo selector outside the node flavor
        assert_eq!(FieldSignature::BALANCE.to_bytes(Flavor::Bean), expected[1..]);
    }

    #[test]
    fn repeated_field_signature_is_a_back_reference() {
        let mut context = MarshallingContext::new(Vec::new(), Flavor::Node);
        FieldSignature::NONCE.marshal(&mut context);
        FieldSignature::BALANCE.marshal(&mut context);
        FieldSignature::NONCE.marshal(&mut context);
        let bytes = context.into_inner();
        assert_eq!(*bytes.last().unwrap(), 0);

        let mut reader = bytes.as_slice();
        let mut reading = UnmarshallingContext::new(&mut reader, Flavor::Node);
        for expected in [
            FieldSignature::NONCE,
            FieldSignature::BALANCE,
            FieldSignature::NONCE,
        ] {
            assert_eq!(FieldSignature::unmarshal(&mut reading).unwrap(), expected);
        }
    }

    #[test]
    fn method_signature_golden_vector() {
        let balance = CodeSignature::method(
            ClassType::GAS_STATION,
            "balance",
            vec![ClassType::STORAGE.into()],
            Some(StorageType::BIG_INTEGER),
        );
        let mut expected = vec![0x01, 0x28, 0x01, 0x17, 0x00, 0x07];
        expected.extend_from_slice(b"balance");
        expected.push(0x1a);
        assert_eq!(balance.to_bytes(Flavor::Node), expected);
    }

    #[test]
    fn void_method_has_no_return_type() {
        let receive = CodeSignature::receive(StorageType::INT);
        let bytes = receive.to_bytes(Flavor::Node);
        assert_eq!(bytes[0], VOID_METHOD);
        assert_eq!(
            CodeSignature::from_bytes(&bytes, Flavor::Node).unwrap(),
            receive
        );
        assert!(receive.is_void());
    }

    #[test]
    fn entry_formals_are_appended() {
        let constructor = CodeSignature::constructor(ClassType::MANIFEST, vec![StorageType::INT]);
        let entry = constructor.with_entry_formals();
        assert_eq!(
            entry.formals(),
            &[
                StorageType::INT,
                ClassType::CONTRACT.into(),
                ClassType::DUMMY.into()
            ]
        );
        assert_eq!(
            entry.to_string(),
            "io.takamaka.code.governance.Manifest(int,io.takamaka.code.lang.Contract,io.hotmoka.verification.Dummy)"
        );
    }

    #[test]
    fn unknown_code_selector_is_rejected() {
        let err = CodeSignature::from_bytes(&[0x03, 0x13, 0x00], Flavor::Node)
            .expect_err("3 is not a code selector");
        assert!(matches!(err, Error::InvalidEnum(3)));
    }
}

use crate::marshalling::{Marshal, MarshallingContext, Unmarshal, UnmarshallingContext};
use bytes::{Buf, BufMut};
use commonware_codec::Error;
use std::{borrow::Cow, fmt};

/// Primitive types of the Takamaka language. The discriminant is the selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum BasicType {
    Boolean = 0,
    Byte = 1,
    Char = 2,
    Short = 3,
    Int = 4,
    Long = 5,
    Float = 6,
    Double = 7,
}

impl BasicType {
    fn from_selector(selector: u8) -> Option<Self> {
        Some(match selector {
            0 => Self::Boolean,
            1 => Self::Byte,
            2 => Self::Char,
            3 => Self::Short,
            4 => Self::Int,
            5 => Self::Long,
            6 => Self::Float,
            7 => Self::Double,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

const SELECTOR_GENERIC: u8 = 8;
const SELECTOR_IO_TAKAMAKA_CODE: u8 = 9;
const SELECTOR_IO_TAKAMAKA_CODE_LANG: u8 = 10;
const SELECTOR_IO_TAKAMAKA_CODE_UTIL: u8 = 11;
const SELECTOR_IO_TAKAMAKA_CODE_TOKENS: u8 = 34;

/// Package prefixes compacted into a selector, most specific first.
const PACKAGES: [(u8, &str); 4] = [
    (SELECTOR_IO_TAKAMAKA_CODE_LANG, "io.takamaka.code.lang."),
    (SELECTOR_IO_TAKAMAKA_CODE_UTIL, "io.takamaka.code.util."),
    (SELECTOR_IO_TAKAMAKA_CODE_TOKENS, "io.takamaka.code.tokens."),
    (SELECTOR_IO_TAKAMAKA_CODE, "io.takamaka.code."),
];

/// Classes whose name is compacted into a single selector byte.
const WELL_KNOWN: [(u8, &str); 28] = [
    (12, "io.takamaka.code.util.StorageList"),
    (13, "io.takamaka.code.util.StorageTreeMap$Node"),
    (14, "io.takamaka.code.util.StorageLinkedList$Node"),
    (15, "io.takamaka.code.lang.ExternallyOwnedAccount"),
    (16, "io.takamaka.code.governance.GasPriceUpdate"),
    (17, "java.lang.String"),
    (18, "io.takamaka.code.lang.Account"),
    (19, "io.takamaka.code.governance.Manifest"),
    (20, "io.takamaka.code.lang.Contract"),
    (22, "java.lang.Object"),
    (23, "io.takamaka.code.lang.Storage"),
    (24, "io.takamaka.code.governance.GenericGasStation"),
    (25, "io.takamaka.code.lang.Event"),
    (26, "java.math.BigInteger"),
    (27, "io.takamaka.code.lang.PayableContract"),
    (28, "io.takamaka.code.util.StorageMapView"),
    (29, "io.takamaka.code.util.StorageTreeMap"),
    (30, "io.takamaka.code.util.StorageTreeMap$BlackNode"),
    (31, "io.takamaka.code.util.StorageTreeMap$RedNode"),
    (32, "io.takamaka.code.math.UnsignedBigInteger"),
    (33, "io.takamaka.code.tokens.ERC20"),
    (35, "io.takamaka.code.tokens.IERC20"),
    (36, "io.takamaka.code.util.StorageTreeArray"),
    (37, "io.takamaka.code.util.StorageTreeArray$Node"),
    (38, "io.takamaka.code.util.StorageTreeIntMap$Node"),
    (39, "io.takamaka.code.util.StorageTreeSet"),
    (40, "io.takamaka.code.governance.GasStation"),
    (21, "io.takamaka.code.lang.Gamete"),
];

/// A class, identified by its fully-qualified name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassType(Cow<'static, str>);

impl ClassType {
    pub const OBJECT: Self = Self::known("java.lang.Object");
    pub const STRING: Self = Self::known("java.lang.String");
    pub const BIG_INTEGER: Self = Self::known("java.math.BigInteger");
    pub const STORAGE: Self = Self::known("io.takamaka.code.lang.Storage");
    pub const CONTRACT: Self = Self::known("io.takamaka.code.lang.Contract");
    pub const PAYABLE_CONTRACT: Self = Self::known("io.takamaka.code.lang.PayableContract");
    pub const ACCOUNT: Self = Self::known("io.takamaka.code.lang.Account");
    pub const EOA: Self = Self::known("io.takamaka.code.lang.ExternallyOwnedAccount");
    pub const GAMETE: Self = Self::known("io.takamaka.code.lang.Gamete");
    pub const EVENT: Self = Self::known("io.takamaka.code.lang.Event");
    pub const MANIFEST: Self = Self::known("io.takamaka.code.governance.Manifest");
    pub const GAS_STATION: Self = Self::known("io.takamaka.code.governance.GasStation");
    pub const GENERIC_GAS_STATION: Self =
        Self::known("io.takamaka.code.governance.GenericGasStation");
    pub const STORAGE_TREE_INTMAP_NODE: Self =
        Self::known("io.takamaka.code.util.StorageTreeIntMap$Node");
    /// Marker type of the trailing argument added by the entry convention.
    pub const DUMMY: Self = Self::known("io.hotmoka.verification.Dummy");

    const fn known(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn well_known_selector(&self) -> Option<u8> {
        WELL_KNOWN
            .iter()
            .find(|(_, name)| *name == self.name())
            .map(|(selector, _)| *selector)
    }

    fn unmarshal_with_selector<B: Buf>(
        selector: u8,
        context: &mut UnmarshallingContext<B>,
    ) -> Result<Self, Error> {
        if selector == SELECTOR_GENERIC {
            return Ok(Self::new(context.read_string_shared()?));
        }
        if let Some((_, prefix)) = PACKAGES.iter().find(|(s, _)| *s == selector) {
            let suffix = context.read_string_shared()?;
            return Ok(Self::new(format!("{prefix}{suffix}")));
        }
        WELL_KNOWN
            .iter()
            .find(|(s, _)| *s == selector)
            .map(|(_, name)| Self::known(name))
            .ok_or(Error::InvalidEnum(selector))
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Marshal for ClassType {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        if let Some(selector) = self.well_known_selector() {
            context.write_u8(selector);
            return;
        }
        for (selector, prefix) in PACKAGES {
            if let Some(suffix) = self.name().strip_prefix(prefix) {
                context.write_u8(selector);
                context.write_string_shared(suffix);
                return;
            }
        }
        context.write_u8(SELECTOR_GENERIC);
        context.write_string_shared(self.name());
    }
}

impl Unmarshal for ClassType {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        let selector = context.read_u8()?;
        Self::unmarshal_with_selector(selector, context)
    }
}

/// Type of a field, formal parameter or return value.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageType {
    Basic(BasicType),
    Class(ClassType),
}

impl StorageType {
    pub const BOOLEAN: Self = Self::Basic(BasicType::Boolean);
    pub const INT: Self = Self::Basic(BasicType::Int);
    pub const LONG: Self = Self::Basic(BasicType::Long);
    pub const BIG_INTEGER: Self = Self::Class(ClassType::BIG_INTEGER);
    pub const STRING: Self = Self::Class(ClassType::STRING);

    /// Eager fields are loaded together with their object; the others only on access.
    pub fn is_eager(&self) -> bool {
        match self {
            Self::Basic(_) => true,
            Self::Class(class) => *class == ClassType::STRING || *class == ClassType::BIG_INTEGER,
        }
    }
}

impl From<ClassType> for StorageType {
    fn from(class: ClassType) -> Self {
        Self::Class(class)
    }
}

impl From<BasicType> for StorageType {
    fn from(basic: BasicType) -> Self {
        Self::Basic(basic)
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(basic) => f.write_str(basic.name()),
            Self::Class(class) => fmt::Display::fmt(class, f),
        }
    }
}

impl fmt::Debug for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Marshal for StorageType {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        match self {
            Self::Basic(basic) => context.write_u8(*basic as u8),
            Self::Class(class) => class.marshal(context),
        }
    }
}

impl Unmarshal for StorageType {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        let selector = context.read_u8()?;
        match BasicType::from_selector(selector) {
            Some(basic) => Ok(Self::Basic(basic)),
            None => Ok(Self::Class(ClassType::unmarshal_with_selector(
                selector, context,
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshalling::Flavor;

    #[test]
    fn well_known_classes_take_one_byte() {
        assert_eq!(ClassType::MANIFEST.to_bytes(Flavor::Node), vec![0x13]);
        assert_eq!(ClassType::GAS_STATION.to_bytes(Flavor::Node), vec![0x28]);
        assert_eq!(StorageType::BIG_INTEGER.to_bytes(Flavor::Node), vec![0x1a]);
        assert_eq!(StorageType::INT.to_bytes(Flavor::Node), vec![0x04]);
    }

    #[test]
    fn package_prefix_is_compacted() {
        let bytes = ClassType::new("io.takamaka.code.lang.Takamaka").to_bytes(Flavor::Node);
        assert_eq!(bytes[0], SELECTOR_IO_TAKAMAKA_CODE_LANG);
        assert_eq!(&bytes[1..4], &[0xff, 0x00, 0x08]);
        assert_eq!(&bytes[4..], b"Takamaka");

        let governance = ClassType::new("io.takamaka.code.governance.Validators");
        let bytes = governance.to_bytes(Flavor::Node);
        assert_eq!(bytes[0], SELECTOR_IO_TAKAMAKA_CODE);
        assert_eq!(
            ClassType::from_bytes(&bytes, Flavor::Node).unwrap(),
            governance
        );
    }

    #[test]
    fn other_classes_use_generic_selector() {
        let class = ClassType::new("com.example.Counter");
        let bytes = class.to_bytes(Flavor::Bean);
        assert_eq!(bytes[0], SELECTOR_GENERIC);
        assert_eq!(
            StorageType::from_bytes(&bytes, Flavor::Bean).unwrap(),
            StorageType::Class(class)
        );
    }

    #[test]
    fn well_known_and_dynamic_names_compare_equal() {
        assert_eq!(
            ClassType::new("io.takamaka.code.lang.Contract"),
            ClassType::CONTRACT
        );
    }

    #[test]
    fn unknown_selector_is_rejected() {
        let err = StorageType::from_bytes(&[0x63], Flavor::Node).expect_err("99 is no class");
        assert!(matches!(err, Error::InvalidEnum(0x63)));
    }
}

//! Compact binary marshalling.
//!
//! A [MarshallingContext] wraps an output buffer together with per-stream
//! memoization tables: the first time a shared string, transaction reference,
//! storage reference or (in the [Flavor::Node] flavor) field signature is
//! written, it is preceded by [NEW_VALUE] and receives the next index; later
//! occurrences are written as that index. An [UnmarshallingContext] rebuilds
//! the same tables while reading, so the two sides stay in lockstep.
//!
//! Tables live and die with their context. Nothing is cached across streams.

use crate::{references::TransactionReference, signatures::FieldSignature, StorageReference};
use bytes::{Buf, BufMut};
use commonware_codec::{Error, ReadExt, Write};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::collections::BTreeMap;

/// Selector introducing a value seen for the first time in the stream.
pub const NEW_VALUE: u8 = 255;

/// Selector introducing a back-reference whose index does not fit a byte.
pub const EXTENDED_INDEX: u8 = 254;

/// Marker used by long unshared strings in place of a `u16` length.
const LONG_STRING: u16 = u16::MAX;

/// Largest big integer written as a single byte.
const MAX_TINY_BIG_INTEGER: i16 = 251;

const BIG_INTEGER_SHORT: u8 = 0;
const BIG_INTEGER_INT: u8 = 1;
const BIG_INTEGER_LONG: u8 = 2;
const BIG_INTEGER_BYTES: u8 = 3;
const BIG_INTEGER_TINY_OFFSET: u8 = 4;

/// Which reference kinds a context compacts through back-references.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Flavor {
    /// Interns strings, transaction references and storage references.
    Bean,
    /// Additionally interns field signatures. Used for everything the node persists.
    #[default]
    Node,
}

impl Flavor {
    pub fn memoizes_field_signatures(self) -> bool {
        matches!(self, Flavor::Node)
    }
}

/// Values that can be written into a [MarshallingContext].
pub trait Marshal {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>);

    /// Marshals `self` into a fresh context of the given flavor.
    fn to_bytes(&self, flavor: Flavor) -> Vec<u8> {
        let mut context = MarshallingContext::new(Vec::new(), flavor);
        self.marshal(&mut context);
        context.into_inner()
    }

    /// Size of `self` once marshalled in a fresh [Flavor::Node] context.
    fn marshalled_size(&self) -> usize {
        self.to_bytes(Flavor::Node).len()
    }
}

/// Values that can be read back from an [UnmarshallingContext].
pub trait Unmarshal: Sized {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error>;

    /// Unmarshals a value that must span the whole of `bytes`.
    fn from_bytes(mut bytes: &[u8], flavor: Flavor) -> Result<Self, Error> {
        let mut context = UnmarshallingContext::new(&mut bytes, flavor);
        let value = Self::unmarshal(&mut context)?;
        let remaining = context.remaining();
        if remaining > 0 {
            return Err(Error::ExtraData(remaining));
        }
        Ok(value)
    }
}

/// Write side of a memo table: value to index, in insertion order.
struct Memo<T> {
    indices: BTreeMap<T, u32>,
}

impl<T: Ord + Clone> Memo<T> {
    fn new() -> Self {
        Self {
            indices: BTreeMap::new(),
        }
    }

    /// Returns the index of `value`, or registers it and returns `None`.
    fn lookup_or_insert(&mut self, value: &T) -> Option<u32> {
        if let Some(index) = self.indices.get(value) {
            return Some(*index);
        }
        let next = self.indices.len();
        assert!(next < u32::MAX as usize, "memo table overflow");
        self.indices.insert(value.clone(), next as u32);
        None
    }
}

/// Read side of a memo table.
struct Table<T> {
    values: Vec<T>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self { values: Vec::new() }
    }

    fn get(&self, index: u32, kind: &'static str) -> Result<T, Error> {
        self.values
            .get(index as usize)
            .cloned()
            .ok_or(Error::Invalid(kind, "unknown back-reference index"))
    }
}

pub struct MarshallingContext<B: BufMut> {
    buf: B,
    flavor: Flavor,
    strings: Memo<String>,
    transactions: Memo<TransactionReference>,
    storage_references: Memo<StorageReference>,
    field_signatures: Memo<FieldSignature>,
}

impl<B: BufMut> MarshallingContext<B> {
    pub fn new(buf: B, flavor: Flavor) -> Self {
        Self {
            buf,
            flavor,
            strings: Memo::new(),
            transactions: Memo::new(),
            storage_references: Memo::new(),
            field_signatures: Memo::new(),
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn buffer(&self) -> &B {
        &self.buf
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        value.write(&mut self.buf);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_char(&mut self, value: u16) {
        value.write(&mut self.buf);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        value.write(&mut self.buf);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    /// Writes a non-negative integer: one byte below 255, else `255` and four bytes.
    pub fn write_compact_int(&mut self, value: u32) {
        if value < u32::from(NEW_VALUE) {
            self.write_u8(value as u8);
        } else {
            self.write_u8(NEW_VALUE);
            value.write(&mut self.buf);
        }
    }

    pub fn write_length(&mut self, length: usize) {
        assert!(length <= i32::MAX as usize, "length does not fit a compact int");
        self.write_compact_int(length as u32);
    }

    pub fn write_big_integer(&mut self, value: &BigInt) {
        if let Some(short) = value.to_i16() {
            if (0..=MAX_TINY_BIG_INTEGER).contains(&short) {
                self.write_u8(short as u8 + BIG_INTEGER_TINY_OFFSET);
            } else {
                self.write_u8(BIG_INTEGER_SHORT);
                self.write_i16(short);
            }
        } else if let Some(int) = value.to_i32() {
            self.write_u8(BIG_INTEGER_INT);
            self.write_i32(int);
        } else if let Some(long) = value.to_i64() {
            self.write_u8(BIG_INTEGER_LONG);
            self.write_i64(long);
        } else {
            self.write_u8(BIG_INTEGER_BYTES);
            self.write_bytes(&value.to_signed_bytes_be());
        }
    }

    /// Writes a big integer known to be a `u64`, as gas amounts are.
    pub fn write_gas(&mut self, value: u64) {
        self.write_big_integer(&BigInt::from(value));
    }

    /// Writes a UTF-8 string with a `u16` length prefix. Strings whose length
    /// does not fit use the `u16::MAX` marker followed by a `u32` length.
    pub fn write_string_unshared(&mut self, value: &str) {
        let bytes = value.as_bytes();
        if bytes.len() < LONG_STRING as usize {
            (bytes.len() as u16).write(&mut self.buf);
        } else {
            LONG_STRING.write(&mut self.buf);
            assert!(bytes.len() <= u32::MAX as usize, "string too long");
            (bytes.len() as u32).write(&mut self.buf);
        }
        self.buf.put_slice(bytes);
    }

    pub fn write_string_shared(&mut self, value: &str) {
        match self.strings.lookup_or_insert(&value.to_owned()) {
            Some(index) => self.write_index(index),
            None => {
                self.write_u8(NEW_VALUE);
                self.write_string_unshared(value);
            }
        }
    }

    /// Writes a compact length followed by the raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_length(bytes.len());
        self.buf.put_slice(bytes);
    }

    pub fn write_transaction_reference(&mut self, reference: &TransactionReference) {
        match self.transactions.lookup_or_insert(reference) {
            Some(index) => self.write_index(index),
            None => {
                self.write_u8(NEW_VALUE);
                self.buf.put_slice(reference.as_ref());
            }
        }
    }

    pub fn write_storage_reference(&mut self, reference: &StorageReference) {
        match self.storage_references.lookup_or_insert(reference) {
            Some(index) => self.write_index(index),
            None => {
                self.write_u8(NEW_VALUE);
                reference.marshal_without_memo(self);
            }
        }
    }

    pub fn write_field_signature(&mut self, field: &FieldSignature) {
        if !self.flavor.memoizes_field_signatures() {
            field.marshal_without_memo(self);
            return;
        }
        match self.field_signatures.lookup_or_insert(field) {
            Some(index) => self.write_index(index),
            None => {
                self.write_u8(NEW_VALUE);
                field.marshal_without_memo(self);
            }
        }
    }

    /// Writes a compact length followed by every element.
    pub fn write_array<T: Marshal>(&mut self, values: &[T]) {
        self.write_length(values.len());
        for value in values {
            value.marshal(self);
        }
    }

    fn write_index(&mut self, index: u32) {
        if index < u32::from(EXTENDED_INDEX) {
            self.write_u8(index as u8);
        } else {
            self.write_u8(EXTENDED_INDEX);
            index.write(&mut self.buf);
        }
    }
}

pub struct UnmarshallingContext<B: Buf> {
    buf: B,
    flavor: Flavor,
    strings: Table<String>,
    transactions: Table<TransactionReference>,
    storage_references: Table<StorageReference>,
    field_signatures: Table<FieldSignature>,
}

impl<B: Buf> UnmarshallingContext<B> {
    pub fn new(buf: B, flavor: Flavor) -> Self {
        Self {
            buf,
            flavor,
            strings: Table::new(),
            transactions: Table::new(),
            storage_references: Table::new(),
            field_signatures: Table::new(),
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), Error> {
        if self.buf.remaining() < needed {
            return Err(Error::EndOfBuffer);
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        u8::read(&mut self.buf)
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::Invalid("bool", "expected 0 or 1")),
        }
    }

    pub fn read_char(&mut self) -> Result<u16, Error> {
        u16::read(&mut self.buf)
    }

    pub fn read_i16(&mut self) -> Result<i16, Error> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_u64(&mut self) -> Result<u64, Error> {
        u64::read(&mut self.buf)
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    pub fn read_compact_int(&mut self) -> Result<u32, Error> {
        let first = self.read_u8()?;
        if first != NEW_VALUE {
            return Ok(u32::from(first));
        }
        let value = self.read_i32()?;
        u32::try_from(value).map_err(|_| Error::Invalid("compact int", "negative value"))
    }

    pub fn read_length(&mut self) -> Result<usize, Error> {
        let length = self.read_compact_int()? as usize;
        if length > self.remaining() {
            // every element takes at least a byte
            return Err(Error::EndOfBuffer);
        }
        Ok(length)
    }

    pub fn read_big_integer(&mut self) -> Result<BigInt, Error> {
        let selector = self.read_u8()?;
        match selector {
            BIG_INTEGER_SHORT => Ok(BigInt::from(self.read_i16()?)),
            BIG_INTEGER_INT => Ok(BigInt::from(self.read_i32()?)),
            BIG_INTEGER_LONG => Ok(BigInt::from(self.read_i64()?)),
            BIG_INTEGER_BYTES => {
                let bytes = self.read_bytes()?;
                if bytes.is_empty() {
                    return Err(Error::Invalid("BigInteger", "empty magnitude"));
                }
                Ok(BigInt::from_signed_bytes_be(&bytes))
            }
            tiny => Ok(BigInt::from(tiny - BIG_INTEGER_TINY_OFFSET)),
        }
    }

    /// Reads a big integer that must fit a `u64`.
    pub fn read_gas(&mut self) -> Result<u64, Error> {
        self.read_big_integer()?
            .to_u64()
            .ok_or(Error::Invalid("gas", "not a non-negative u64"))
    }

    pub fn read_string_unshared(&mut self) -> Result<String, Error> {
        let short = u16::read(&mut self.buf)?;
        let length = if short == LONG_STRING {
            u32::read(&mut self.buf)? as usize
        } else {
            short as usize
        };
        self.ensure(length)?;
        let mut bytes = vec![0u8; length];
        self.buf.copy_to_slice(&mut bytes);
        String::from_utf8(bytes).map_err(|_| Error::Invalid("String", "invalid UTF-8"))
    }

    pub fn read_string_shared(&mut self) -> Result<String, Error> {
        match self.read_selector()? {
            None => {
                let value = self.read_string_unshared()?;
                self.strings.values.push(value.clone());
                Ok(value)
            }
            Some(index) => self.strings.get(index, "String"),
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let length = self.read_length()?;
        let mut bytes = vec![0u8; length];
        self.buf.copy_to_slice(&mut bytes);
        Ok(bytes)
    }

    pub fn read_transaction_reference(&mut self) -> Result<TransactionReference, Error> {
        match self.read_selector()? {
            None => {
                self.ensure(TransactionReference::SIZE)?;
                let mut hash = [0u8; TransactionReference::SIZE];
                self.buf.copy_to_slice(&mut hash);
                let reference = TransactionReference::new(hash);
                self.transactions.values.push(reference);
                Ok(reference)
            }
            Some(index) => self.transactions.get(index, "TransactionReference"),
        }
    }

    pub fn read_storage_reference(&mut self) -> Result<StorageReference, Error> {
        match self.read_selector()? {
            None => {
                let reference = StorageReference::unmarshal_without_memo(self)?;
                self.storage_references.values.push(reference);
                Ok(reference)
            }
            Some(index) => self.storage_references.get(index, "StorageReference"),
        }
    }

    pub fn read_field_signature(&mut self) -> Result<FieldSignature, Error> {
        if !self.flavor.memoizes_field_signatures() {
            return FieldSignature::unmarshal_without_memo(self);
        }
        match self.read_selector()? {
            None => {
                let field = FieldSignature::unmarshal_without_memo(self)?;
                self.field_signatures.values.push(field.clone());
                Ok(field)
            }
            Some(index) => self.field_signatures.get(index, "FieldSignature"),
        }
    }

    pub fn read_array<T: Unmarshal>(&mut self) -> Result<Vec<T>, Error> {
        let length = self.read_length()?;
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            values.push(T::unmarshal(self)?);
        }
        Ok(values)
    }

    /// `None` for a new value, otherwise the back-reference index.
    fn read_selector(&mut self) -> Result<Option<u32>, Error> {
        match self.read_u8()? {
            NEW_VALUE => Ok(None),
            EXTENDED_INDEX => Ok(Some(u32::read(&mut self.buf)?)),
            index => Ok(Some(u32::from(index))),
        }
    }
}

/// Implements the `commonware_codec` traits for a [Marshal] + [Unmarshal] type,
/// each value going through a fresh [Flavor::Node] context.
macro_rules! node_codec {
    ($type:ty) => {
        impl commonware_codec::Write for $type {
            fn write(&self, writer: &mut impl bytes::BufMut) {
                let mut context = $crate::marshalling::MarshallingContext::new(
                    writer,
                    $crate::marshalling::Flavor::Node,
                );
                $crate::marshalling::Marshal::marshal(self, &mut context);
            }
        }

        impl commonware_codec::EncodeSize for $type {
            fn encode_size(&self) -> usize {
                $crate::marshalling::Marshal::marshalled_size(self)
            }
        }

        impl commonware_codec::Read for $type {
            type Cfg = ();

            fn read_cfg(
                reader: &mut impl bytes::Buf,
                _: &Self::Cfg,
            ) -> Result<Self, commonware_codec::Error> {
                let mut context = $crate::marshalling::UnmarshallingContext::new(
                    reader,
                    $crate::marshalling::Flavor::Node,
                );
                $crate::marshalling::Unmarshal::unmarshal(&mut context)
            }
        }
    };
}

pub(crate) use node_codec;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn marshal_with(write: impl FnOnce(&mut MarshallingContext<Vec<u8>>)) -> Vec<u8> {
        let mut context = MarshallingContext::new(Vec::new(), Flavor::Node);
        write(&mut context);
        context.into_inner()
    }

    #[test]
    fn compact_int_switches_to_long_form_at_255() {
        assert_eq!(marshal_with(|c| c.write_compact_int(254)), vec![254]);
        assert_eq!(
            marshal_with(|c| c.write_compact_int(255)),
            vec![0xff, 0, 0, 0, 0xff]
        );
        assert_eq!(
            marshal_with(|c| c.write_compact_int(30006)),
            vec![0xff, 0x00, 0x00, 0x75, 0x36]
        );
    }

    #[test]
    fn big_integer_golden_vectors() {
        let cases: [(&str, &[u8]); 6] = [
            ("9", &[0x0d]),
            ("251", &[0xff]),
            ("252", &[0x00, 0x00, 0xfc]),
            ("-1", &[0x00, 0xff, 0xff]),
            ("7654319", &[0x01, 0x00, 0x74, 0xcb, 0xaf]),
            (
                "9007199254740991765896",
                &[0x03, 0x0a, 0x01, 0xe8, 0x47, 0xff, 0xff, 0xff, 0xff, 0xfc, 0x6d, 0x88],
            ),
        ];
        for (value, expected) in cases {
            let value = BigInt::from_str(value).unwrap();
            let bytes = marshal_with(|c| c.write_big_integer(&value));
            assert_eq!(bytes, expected, "encoding of {value}");

            let mut reader = bytes.as_slice();
            let mut context = UnmarshallingContext::new(&mut reader, Flavor::Node);
            assert_eq!(context.read_big_integer().unwrap(), value);
        }
    }

    #[test]
    fn big_integer_uses_long_form_beyond_i32() {
        let value = BigInt::from(i64::MAX);
        let bytes = marshal_with(|c| c.write_big_integer(&value));
        assert_eq!(bytes[0], BIG_INTEGER_LONG);
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn unshared_string_golden_vector() {
        let bytes = marshal_with(|c| c.write_string_unshared("hello world"));
        assert_eq!(&bytes[..2], &[0x00, 0x0b]);
        assert_eq!(&bytes[2..], b"hello world");
    }

    #[test]
    fn shared_string_is_written_once() {
        let bytes = marshal_with(|c| {
            c.write_string_shared("Hotmoka");
            c.write_string_shared("Hotmoka");
            c.write_string_shared("Takamaka");
            c.write_string_shared("Hotmoka");
        });
        assert_eq!(
            &bytes[..10],
            &[0xff, 0x00, 0x07, 0x48, 0x6f, 0x74, 0x6d, 0x6f, 0x6b, 0x61]
        );
        assert_eq!(bytes[10], 0);
        assert_eq!(bytes[11], 0xff);
        assert_eq!(*bytes.last().unwrap(), 0);

        let mut reader = bytes.as_slice();
        let mut context = UnmarshallingContext::new(&mut reader, Flavor::Node);
        for expected in ["Hotmoka", "Hotmoka", "Takamaka", "Hotmoka"] {
            assert_eq!(context.read_string_shared().unwrap(), expected);
        }
        assert_eq!(context.remaining(), 0);
    }

    #[test]
    fn long_string_uses_marker() {
        let value = "x".repeat(70_000);
        let bytes = marshal_with(|c| c.write_string_unshared(&value));
        assert_eq!(&bytes[..2], &[0xff, 0xff]);
        assert_eq!(bytes.len(), 2 + 4 + 70_000);

        let mut reader = bytes.as_slice();
        let mut context = UnmarshallingContext::new(&mut reader, Flavor::Node);
        assert_eq!(context.read_string_unshared().unwrap(), value);
    }

    #[test]
    fn indices_beyond_a_byte_use_extended_form() {
        let bytes = marshal_with(|c| {
            for i in 0..300 {
                c.write_string_shared(&format!("s{i}"));
            }
            c.write_string_shared("s3");
            c.write_string_shared("s299");
        });
        let tail = &bytes[bytes.len() - 6..];
        assert_eq!(tail, &[3, EXTENDED_INDEX, 0, 0, 0x01, 0x2b]);

        let mut reader = bytes.as_slice();
        let mut context = UnmarshallingContext::new(&mut reader, Flavor::Node);
        for i in 0..300 {
            assert_eq!(context.read_string_shared().unwrap(), format!("s{i}"));
        }
        assert_eq!(context.read_string_shared().unwrap(), "s3");
        assert_eq!(context.read_string_shared().unwrap(), "s299");
    }

    #[test]
    fn unknown_back_reference_is_rejected() {
        let bytes = [7u8];
        let mut reader = &bytes[..];
        let mut context = UnmarshallingContext::new(&mut reader, Flavor::Node);
        let err = context
            .read_string_shared()
            .expect_err("index 7 was never introduced");
        assert!(matches!(err, Error::Invalid("String", _)));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = [0x01, 0x00, 0x74];
        let mut reader = &bytes[..];
        let mut context = UnmarshallingContext::new(&mut reader, Flavor::Node);
        let err = context.read_big_integer().expect_err("int needs four bytes");
        assert!(matches!(err, Error::EndOfBuffer));
    }

    #[test]
    fn tables_do_not_leak_across_contexts() {
        let first = marshal_with(|c| c.write_string_shared("again"));
        let second = marshal_with(|c| c.write_string_shared("again"));
        assert_eq!(first, second);
        assert_eq!(first[0], NEW_VALUE);
    }
}

use crate::marshalling::{Marshal, MarshallingContext, Unmarshal, UnmarshallingContext};
use bytes::{Buf, BufMut};
use commonware_codec::Error;
use commonware_cryptography::{sha256::Sha256, Hasher};
use commonware_utils::{from_hex, hex};
use num_traits::ToPrimitive;
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("transaction reference must be {expected} hex-encoded bytes")]
    InvalidHash { expected: usize },
    #[error("storage reference must have the form <transaction>#<progressive>")]
    InvalidFormat,
}

/// Content hash identifying a committed transaction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionReference([u8; TransactionReference::SIZE]);

impl TransactionReference {
    pub const SIZE: usize = 32;

    pub fn new(hash: [u8; Self::SIZE]) -> Self {
        Self(hash)
    }

    /// Hashes the given request bytes into the reference of their transaction.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::hash(bytes);
        let mut hash = [0u8; Self::SIZE];
        hash.copy_from_slice(digest.as_ref());
        Self(hash)
    }
}

impl AsRef<[u8]> for TransactionReference {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex(&self.0))
    }
}

impl fmt::Debug for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for TransactionReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = from_hex(s).ok_or(ReferenceError::InvalidHash {
            expected: Self::SIZE,
        })?;
        let hash: [u8; Self::SIZE] = bytes.try_into().map_err(|_| ReferenceError::InvalidHash {
            expected: Self::SIZE,
        })?;
        Ok(Self(hash))
    }
}

impl Marshal for TransactionReference {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        context.write_transaction_reference(self);
    }
}

impl Unmarshal for TransactionReference {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        context.read_transaction_reference()
    }
}

/// Durable identity of an object: the transaction that created it and the
/// creation order within that transaction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageReference {
    pub transaction: TransactionReference,
    pub progressive: u64,
}

impl StorageReference {
    pub fn new(transaction: TransactionReference, progressive: u64) -> Self {
        Self {
            transaction,
            progressive,
        }
    }

    pub(crate) fn marshal_without_memo<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        context.write_transaction_reference(&self.transaction);
        context.write_gas(self.progressive);
    }

    pub(crate) fn unmarshal_without_memo<B: Buf>(
        context: &mut UnmarshallingContext<B>,
    ) -> Result<Self, Error> {
        let transaction = context.read_transaction_reference()?;
        let progressive = context
            .read_big_integer()?
            .to_u64()
            .ok_or(Error::Invalid("StorageReference", "progressive out of range"))?;
        Ok(Self {
            transaction,
            progressive,
        })
    }
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:x}", self.transaction, self.progressive)
    }
}

impl fmt::Debug for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for StorageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (transaction, progressive) = s.split_once('#').ok_or(ReferenceError::InvalidFormat)?;
        let progressive =
            u64::from_str_radix(progressive, 16).map_err(|_| ReferenceError::InvalidFormat)?;
        Ok(Self::new(transaction.parse()?, progressive))
    }
}

impl Marshal for StorageReference {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        context.write_storage_reference(self);
    }
}

impl Unmarshal for StorageReference {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        context.read_storage_reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshalling::Flavor;
    use proptest::prelude::*;

    const GOLDEN_HASH: &str =
        "d0e496468c25fca59179885fa7c5ff4f440efbd0e0c96c2426b7997336619882";

    fn golden() -> TransactionReference {
        GOLDEN_HASH.parse().unwrap()
    }

    #[test]
    fn transaction_reference_golden_vector() {
        let bytes = golden().to_bytes(Flavor::Bean);
        assert_eq!(bytes.len(), 33);
        assert_eq!(bytes[0], 0xff);
        assert_eq!(hex(&bytes[1..]), GOLDEN_HASH);
    }

    #[test]
    fn storage_reference_golden_vector() {
        let reference = StorageReference::new(golden(), 19992);
        let bytes = reference.to_bytes(Flavor::Bean);
        assert_eq!(&bytes[..2], &[0xff, 0xff]);
        assert_eq!(&bytes[34..], &[0x00, 0x4e, 0x18]);
        assert_eq!(
            StorageReference::from_bytes(&bytes, Flavor::Bean).unwrap(),
            reference
        );
    }

    #[test]
    fn repeated_storage_reference_costs_one_byte() {
        let reference = StorageReference::new(golden(), 3);
        let mut context = MarshallingContext::new(Vec::new(), Flavor::Node);
        let mut sizes = Vec::new();
        for _ in 0..3 {
            let before = context.buffer().len();
            reference.marshal(&mut context);
            sizes.push(context.buffer().len() - before);
        }
        assert_eq!(sizes, vec![1 + 1 + 32 + 1, 1, 1]);
    }

    #[test]
    fn storage_reference_text_form() {
        let reference = StorageReference::new(golden(), 0x2a);
        let text = reference.to_string();
        assert_eq!(text, format!("{GOLDEN_HASH}#2a"));
        assert_eq!(text.parse::<StorageReference>().unwrap(), reference);
        assert_eq!(
            "abc#1".parse::<StorageReference>(),
            Err(ReferenceError::InvalidHash { expected: 32 })
        );
    }

    proptest! {
        #[test]
        fn storage_references_round_trip_and_back_reference(
            hashes in proptest::collection::vec(any::<[u8; 32]>(), 1..8),
            progressives in proptest::collection::vec(any::<u64>(), 1..8),
        ) {
            let references: Vec<StorageReference> = hashes
                .iter()
                .zip(progressives.iter())
                .map(|(hash, progressive)| StorageReference::new(TransactionReference::new(*hash), *progressive))
                .collect();

            let mut context = MarshallingContext::new(Vec::new(), Flavor::Bean);
            for reference in &references {
                reference.marshal(&mut context);
            }
            let first_pass = context.buffer().len();
            for reference in &references {
                reference.marshal(&mut context);
            }
            let second_pass = context.buffer().len() - first_pass;
            prop_assert!(second_pass <= 5 * references.len());

            let bytes = context.into_inner();
            let mut reader = bytes.as_slice();
            let mut reading = UnmarshallingContext::new(&mut reader, Flavor::Bean);
            for expected in references.iter().chain(references.iter()) {
                prop_assert_eq!(StorageReference::unmarshal(&mut reading).unwrap(), *expected);
            }
            prop_assert_eq!(reading.remaining(), 0);
        }
    }
}

//! Seams towards the code toolchain: loading classpaths, verifying and
//! instrumenting jars, and answering questions about loaded classes.

use crate::resolver::CodeResolver;
use anyhow::Result;
use hotmoka_types::{ClassType, FieldSignature, GasCostModel, TransactionReference};
use thiserror::Error;

/// An installed jar, as found in the response that installed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Jar {
    pub reference: TransactionReference,
    pub bytes: Vec<u8>,
}

/// A jar that passed verification and can be instrumented.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedJar {
    bytes: Vec<u8>,
}

impl VerifiedJar {
    /// Wraps a jar that is trusted to be valid.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Violations found while verifying a jar.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("jar verification failed: {}", .violations.join("; "))]
pub struct VerificationError {
    pub violations: Vec<String>,
}

/// Constraints that white-listed code imposes on its actual arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Obligation {
    MustBeFalse,
    MustRedefineHashCode,
    MustRedefineHashCodeOrToString,
    HasDeterministicTerminatingEquals,
    HasDeterministicTerminatingHashCode,
    HasDeterministicTerminatingToString,
}

/// Classes loaded from a classpath. Dropping it releases the classpath.
pub trait ClassLoader {
    /// Jar that defines `class`, if it is loaded.
    fn jar_of(&self, class: &ClassType) -> Option<TransactionReference>;
    /// Persistent fields of `class`, inherited ones first.
    fn fields_of(&self, class: &ClassType) -> Vec<FieldSignature>;
    fn is_subtype(&self, class: &ClassType, of: &ClassType) -> bool;
    /// Whether instances of `class` can be kept in storage.
    fn is_storage(&self, class: &ClassType) -> bool {
        self.is_subtype(class, &ClassType::STORAGE)
    }
    /// Whether `class` meets a class-based white-listing obligation.
    fn satisfies(&self, obligation: Obligation, class: &ClassType) -> bool;
}

pub trait Toolchain {
    type Loader: CodeResolver;

    /// Loads the given jars, dependencies included, into a fresh class loader.
    fn load(&self, jars: &[Jar]) -> Result<Self::Loader>;
    /// Verifies `jar` against the classes of its dependencies.
    fn verify(
        &self,
        jar: &[u8],
        dependencies: &Self::Loader,
        allows_self_charged: bool,
    ) -> Result<VerifiedJar, VerificationError>;
    /// Instruments a verified jar for gas metering and storage.
    fn instrument(&self, jar: VerifiedJar, gas_cost_model: &GasCostModel) -> Result<Vec<u8>>;
    /// Version of the verification rules, recorded in installed jars.
    fn verification_version(&self) -> u64;
}

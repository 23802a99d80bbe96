//! Error taxonomy of the engine.
//!
//! - [Rejection]: the request is refused before any state change; nothing is
//!   charged and no response exists.
//! - [Fault]: the transaction runs but fails; the caller pays the whole gas
//!   limit and a failed response is produced.
//! - [CodeError]: what user code returns, either a throwable it raised or an
//!   engine [Fault] it ran into.

use crate::loader::VerificationError;
use hotmoka_types::{BigInt, ClassType, FailureCause, StorageReference, TransactionReference};
use thiserror::Error;

/// Errors that refuse a request.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("incorrect chain id: expected {expected:?}, got {got:?}")]
    ChainIdMismatch { expected: String, got: String },
    #[error("gas limit {limit} exceeds the maximum {max}")]
    GasLimitTooLarge { limit: u64, max: u64 },
    #[error("gas limit {limit} is below the minimum {minimum}")]
    GasLimitTooSmall { limit: u64, minimum: u64 },
    #[error("gas price {price} is below the current price {current}")]
    GasPriceTooLow { price: u64, current: u64 },
    #[error("incorrect nonce: expected {expected}, got {got}")]
    NonceMismatch { expected: BigInt, got: BigInt },
    #[error("invalid request signature")]
    InvalidSignature,
    #[error("caller {0} is not an externally owned account")]
    CallerNotAccount(StorageReference),
    #[error("caller has {balance} coins but {required} are needed to pay for the gas")]
    InsufficientFunds { balance: BigInt, required: BigInt },
    #[error("unknown classpath {0}")]
    UnknownClasspath(TransactionReference),
    #[error("the node is already initialized")]
    AlreadyInitialized,
    #[error("initial transaction failed: {0}")]
    InitialFailed(#[source] Fault),
    #[error("only method calls can be run as views")]
    NotViewable,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Errors that make a transaction fail after it started.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("out of gas")]
    OutOfGas,
    #[error("cannot find {0}")]
    UnmatchedTarget(String),
    #[error("illegal call to non-white-listed code: {0}")]
    NonWhiteListedCall(String),
    #[error("side effects in view method {0}")]
    SideEffectsInViewMethod(String),
    #[error("cannot deserialize: {0}")]
    Deserialization(String),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("an object of class {0} cannot be kept in storage")]
    NotStorable(ClassType),
    #[error("{0}")]
    Thrown(Thrown),
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl Fault {
    /// Cause recorded in the failed response.
    pub fn cause(&self) -> FailureCause {
        let class_name = match self {
            Self::Thrown(thrown) => return thrown.cause(),
            Self::OutOfGas => "io.hotmoka.nodes.OutOfGasError",
            Self::UnmatchedTarget(_) => "java.lang.NoSuchMethodException",
            Self::NonWhiteListedCall(_) => "io.hotmoka.nodes.NonWhiteListedCallException",
            Self::SideEffectsInViewMethod(_) => "io.hotmoka.nodes.SideEffectsInViewMethodException",
            Self::Deserialization(_) => "io.hotmoka.nodes.DeserializationError",
            Self::Verification(_) => "io.hotmoka.verification.VerificationException",
            Self::NotStorable(_) => "io.hotmoka.nodes.DeserializationError",
            Self::Internal(_) => "java.lang.InternalError",
        };
        let message = match self {
            Self::OutOfGas => String::new(),
            other => other.to_string(),
        };
        FailureCause::new(class_name, message, "")
    }
}

impl From<OutOfGas> for Fault {
    fn from(_: OutOfGas) -> Self {
        Self::OutOfGas
    }
}

/// A charge exceeded the remaining gas.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("out of gas")]
pub struct OutOfGas;

/// A throwable raised by user code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thrown {
    pub class_name: String,
    pub message: String,
    /// Where it was raised, as `Class.java:line`, or empty if unknown.
    pub location: String,
    /// Whether it is a checked exception, that a callee may declare.
    pub checked: bool,
}

impl Thrown {
    pub fn checked(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            location: String::new(),
            checked: true,
        }
    }

    pub fn unchecked(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            checked: false,
            ..Self::checked(class_name, message)
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn cause(&self) -> FailureCause {
        FailureCause::new(&*self.class_name, &*self.message, &*self.location)
    }
}

impl std::fmt::Display for Thrown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.class_name)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Outcome of running user code that did not return normally.
#[derive(Debug, Error)]
pub enum CodeError {
    #[error("{0}")]
    Raised(Thrown),
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl From<OutOfGas> for CodeError {
    fn from(_: OutOfGas) -> Self {
        Self::Fault(Fault::OutOfGas)
    }
}

impl From<Thrown> for CodeError {
    fn from(thrown: Thrown) -> Self {
        Self::Raised(thrown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotmoka_types::responses::MAX_MESSAGE_LENGTH;

    #[test]
    fn faults_map_to_failure_causes() {
        let cause = Fault::OutOfGas.cause();
        assert_eq!(cause.class_name(), "io.hotmoka.nodes.OutOfGasError");
        assert_eq!(cause.message(), "");

        let cause = Fault::SideEffectsInViewMethod("C.m()".into()).cause();
        assert_eq!(
            cause.class_name(),
            "io.hotmoka.nodes.SideEffectsInViewMethodException"
        );
        assert!(cause.message().contains("C.m()"));
    }

    #[test]
    fn thrown_keeps_its_class_and_location() {
        let thrown = Thrown::unchecked("java.lang.IllegalStateException", "boom").at("C.java:12");
        let cause = Fault::Thrown(thrown).cause();
        assert_eq!(cause.class_name(), "java.lang.IllegalStateException");
        assert_eq!(cause.message(), "boom");
        assert_eq!(cause.location(), "C.java:12");
    }

    #[test]
    fn long_messages_are_capped() {
        let thrown = Thrown::checked("E", "m".repeat(MAX_MESSAGE_LENGTH * 2));
        assert_eq!(thrown.cause().message().len(), MAX_MESSAGE_LENGTH);
    }

    #[test]
    fn out_of_gas_converts_into_code_errors() {
        let error: CodeError = OutOfGas.into();
        assert!(matches!(error, CodeError::Fault(Fault::OutOfGas)));
    }
}

use crate::{
    marshalling::{node_codec, Marshal, MarshallingContext, Unmarshal, UnmarshallingContext},
    references::{StorageReference, TransactionReference},
    updates::Update,
    values::StorageValue,
};
use bytes::{Buf, BufMut};
use commonware_codec::Error;
use std::fmt;

const GAMETE_CREATION: u8 = 0;
const JAR_STORE_INITIAL: u8 = 1;
const JAR_STORE_SUCCESSFUL: u8 = 2;
const JAR_STORE_FAILED: u8 = 3;
const CONSTRUCTOR_EXCEPTION: u8 = 4;
const CONSTRUCTOR_FAILED: u8 = 5;
const CONSTRUCTOR_SUCCESSFUL: u8 = 6;
const METHOD_EXCEPTION: u8 = 7;
const METHOD_FAILED: u8 = 8;
const NON_VOID_SUCCESSFUL: u8 = 9;
const VOID_SUCCESSFUL: u8 = 10;
const INITIALIZATION: u8 = 11;
const CONSTRUCTOR_SUCCESSFUL_NO_EVENTS: u8 = 12;
const NON_VOID_SUCCESSFUL_NO_EVENTS: u8 = 13;
const VOID_SUCCESSFUL_NO_EVENTS: u8 = 14;
const NON_VOID_SUCCESSFUL_ONE_EVENT: u8 = 15;
const VOID_SUCCESSFUL_ONE_EVENT: u8 = 16;

/// Longest class name kept in a [FailureCause], in bytes.
pub const MAX_CLASS_NAME_LENGTH: usize = 256;
/// Longest message kept in a [FailureCause], in bytes.
pub const MAX_MESSAGE_LENGTH: usize = 1024;
/// Longest location kept in a [FailureCause], in bytes.
pub const MAX_LOCATION_LENGTH: usize = 256;

/// Gas consumed by a transaction, split by resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GasCosts {
    pub cpu: u64,
    pub ram: u64,
    pub storage: u64,
}

impl GasCosts {
    pub fn total(&self) -> u64 {
        self.cpu
            .saturating_add(self.ram)
            .saturating_add(self.storage)
    }

    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        context.write_gas(self.cpu);
        context.write_gas(self.ram);
        context.write_gas(self.storage);
    }

    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        Ok(Self {
            cpu: context.read_gas()?,
            ram: context.read_gas()?,
            storage: context.read_gas()?,
        })
    }
}

fn truncate(mut value: String, max: usize) -> String {
    if value.len() > max {
        let mut end = max;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value.truncate(end);
    }
    value
}

/// What went wrong in a failed or exceptional transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureCause {
    class_name: String,
    message: String,
    location: String,
}

impl FailureCause {
    /// Builds a cause, truncating each part to its maximal length.
    pub fn new(
        class_name: impl Into<String>,
        message: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            class_name: truncate(class_name.into(), MAX_CLASS_NAME_LENGTH),
            message: truncate(message.into(), MAX_MESSAGE_LENGTH),
            location: truncate(location.into(), MAX_LOCATION_LENGTH),
        }
    }

    /// The largest cause that can be recorded.
    pub fn largest() -> Self {
        Self {
            class_name: "x".repeat(MAX_CLASS_NAME_LENGTH),
            message: "x".repeat(MAX_MESSAGE_LENGTH),
            location: "x".repeat(MAX_LOCATION_LENGTH),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        context.write_string_unshared(&self.class_name);
        context.write_string_unshared(&self.message);
        context.write_string_unshared(&self.location);
    }

    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        Ok(Self::new(
            context.read_string_unshared()?,
            context.read_string_unshared()?,
            context.read_string_unshared()?,
        ))
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_name)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if !self.location.is_empty() {
            write!(f, " @{}", self.location)?;
        }
        Ok(())
    }
}

/// The transaction failed: only the payment of the gas survives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedResponse {
    pub updates: Vec<Update>,
    pub gas: GasCosts,
    /// Gas charged as a penalty: the limit minus what was consumed.
    pub penalty: u64,
    pub cause: FailureCause,
}

impl FailedResponse {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        context.write_array(&self.updates);
        self.gas.marshal(context);
        context.write_gas(self.penalty);
        self.cause.marshal(context);
    }

    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        Ok(Self {
            updates: context.read_array()?,
            gas: GasCosts::unmarshal(context)?,
            penalty: context.read_gas()?,
            cause: FailureCause::unmarshal(context)?,
        })
    }
}

/// The called code threw a checked exception it declares: its side effects are
/// kept and only the consumed gas is paid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub updates: Vec<Update>,
    pub events: Vec<StorageReference>,
    pub gas: GasCosts,
    pub cause: FailureCause,
}

impl ExceptionResponse {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        context.write_array(&self.updates);
        self.gas.marshal(context);
        context.write_array(&self.events);
        self.cause.marshal(context);
    }

    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        Ok(Self {
            updates: context.read_array()?,
            gas: GasCosts::unmarshal(context)?,
            events: context.read_array()?,
            cause: FailureCause::unmarshal(context)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JarStoreInitialResponse {
    pub instrumented_jar: Vec<u8>,
    pub dependencies: Vec<TransactionReference>,
    pub verification_version: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameteCreationResponse {
    pub updates: Vec<Update>,
    pub gamete: StorageReference,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JarStoreResponse {
    Successful {
        instrumented_jar: Vec<u8>,
        dependencies: Vec<TransactionReference>,
        verification_version: u64,
        updates: Vec<Update>,
        gas: GasCosts,
    },
    Failed(FailedResponse),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstructorCallResponse {
    Successful {
        new_object: StorageReference,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCosts,
    },
    Exception(ExceptionResponse),
    Failed(FailedResponse),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodCallResponse {
    Successful {
        result: StorageValue,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCosts,
    },
    VoidSuccessful {
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCosts,
    },
    Exception(ExceptionResponse),
    Failed(FailedResponse),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionResponse {
    JarStoreInitial(JarStoreInitialResponse),
    GameteCreation(GameteCreationResponse),
    Initialization,
    JarStore(JarStoreResponse),
    ConstructorCall(ConstructorCallResponse),
    MethodCall(MethodCallResponse),
}

impl TransactionResponse {
    pub fn updates(&self) -> &[Update] {
        match self {
            Self::JarStoreInitial(_) | Self::Initialization => &[],
            Self::GameteCreation(response) => &response.updates,
            Self::JarStore(JarStoreResponse::Successful { updates, .. })
            | Self::ConstructorCall(ConstructorCallResponse::Successful { updates, .. })
            | Self::MethodCall(MethodCallResponse::Successful { updates, .. })
            | Self::MethodCall(MethodCallResponse::VoidSuccessful { updates, .. }) => updates,
            Self::ConstructorCall(ConstructorCallResponse::Exception(response))
            | Self::MethodCall(MethodCallResponse::Exception(response)) => &response.updates,
            Self::JarStore(JarStoreResponse::Failed(response))
            | Self::ConstructorCall(ConstructorCallResponse::Failed(response))
            | Self::MethodCall(MethodCallResponse::Failed(response)) => &response.updates,
        }
    }

    pub fn events(&self) -> &[StorageReference] {
        match self {
            Self::ConstructorCall(ConstructorCallResponse::Successful { events, .. })
            | Self::MethodCall(MethodCallResponse::Successful { events, .. })
            | Self::MethodCall(MethodCallResponse::VoidSuccessful { events, .. }) => events,
            Self::ConstructorCall(ConstructorCallResponse::Exception(response))
            | Self::MethodCall(MethodCallResponse::Exception(response)) => &response.events,
            _ => &[],
        }
    }

    /// Gas consumed, for responses of non-initial transactions.
    pub fn gas(&self) -> Option<&GasCosts> {
        match self {
            Self::JarStoreInitial(_) | Self::GameteCreation(_) | Self::Initialization => None,
            Self::JarStore(JarStoreResponse::Successful { gas, .. })
            | Self::ConstructorCall(ConstructorCallResponse::Successful { gas, .. })
            | Self::MethodCall(MethodCallResponse::Successful { gas, .. })
            | Self::MethodCall(MethodCallResponse::VoidSuccessful { gas, .. }) => Some(gas),
            Self::ConstructorCall(ConstructorCallResponse::Exception(response))
            | Self::MethodCall(MethodCallResponse::Exception(response)) => Some(&response.gas),
            Self::JarStore(JarStoreResponse::Failed(response))
            | Self::ConstructorCall(ConstructorCallResponse::Failed(response))
            | Self::MethodCall(MethodCallResponse::Failed(response)) => Some(&response.gas),
        }
    }

    pub fn failed(&self) -> Option<&FailedResponse> {
        match self {
            Self::JarStore(JarStoreResponse::Failed(response))
            | Self::ConstructorCall(ConstructorCallResponse::Failed(response))
            | Self::MethodCall(MethodCallResponse::Failed(response)) => Some(response),
            _ => None,
        }
    }

    pub fn exception(&self) -> Option<&ExceptionResponse> {
        match self {
            Self::ConstructorCall(ConstructorCallResponse::Exception(response))
            | Self::MethodCall(MethodCallResponse::Exception(response)) => Some(response),
            _ => None,
        }
    }

    /// Whether the response records a successfully installed jar, usable in a classpath.
    pub fn is_installed_jar(&self) -> bool {
        matches!(
            self,
            Self::JarStoreInitial(_) | Self::JarStore(JarStoreResponse::Successful { .. })
        )
    }

    /// The installed jar and its dependencies, for jar store responses.
    pub fn installed_jar(&self) -> Option<(&[u8], &[TransactionReference])> {
        match self {
            Self::JarStoreInitial(response) => {
                Some((&response.instrumented_jar, &response.dependencies))
            }
            Self::JarStore(JarStoreResponse::Successful {
                instrumented_jar,
                dependencies,
                ..
            }) => Some((instrumented_jar, dependencies)),
            _ => None,
        }
    }
}

fn write_successful_prefix<B: BufMut>(
    context: &mut MarshallingContext<B>,
    selector: u8,
    updates: &[Update],
    gas: &GasCosts,
) {
    context.write_u8(selector);
    context.write_array(updates);
    gas.marshal(context);
}

/// Picks the shortest selector for the given events: `none` when there are
/// none, `one` for a single event where a one-event form exists, else `many`.
fn event_selector(events: &[StorageReference], many: u8, none: u8, one: Option<u8>) -> u8 {
    match (events.len(), one) {
        (0, _) => none,
        (1, Some(one)) => one,
        _ => many,
    }
}

impl Marshal for TransactionResponse {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        match self {
            Self::GameteCreation(response) => {
                context.write_u8(GAMETE_CREATION);
                context.write_array(&response.updates);
                response.gamete.marshal(context);
            }
            Self::JarStoreInitial(response) => {
                context.write_u8(JAR_STORE_INITIAL);
                context.write_bytes(&response.instrumented_jar);
                context.write_array(&response.dependencies);
                context.write_u64(response.verification_version);
            }
            Self::Initialization => context.write_u8(INITIALIZATION),
            Self::JarStore(JarStoreResponse::Successful {
                instrumented_jar,
                dependencies,
                verification_version,
                updates,
                gas,
            }) => {
                write_successful_prefix(context, JAR_STORE_SUCCESSFUL, updates, gas);
                context.write_bytes(instrumented_jar);
                context.write_array(dependencies);
                context.write_u64(*verification_version);
            }
            Self::JarStore(JarStoreResponse::Failed(response)) => {
                context.write_u8(JAR_STORE_FAILED);
                response.marshal(context);
            }
            Self::ConstructorCall(ConstructorCallResponse::Successful {
                new_object,
                updates,
                events,
                gas,
            }) => {
                let selector = event_selector(
                    events,
                    CONSTRUCTOR_SUCCESSFUL,
                    CONSTRUCTOR_SUCCESSFUL_NO_EVENTS,
                    None,
                );
                write_successful_prefix(context, selector, updates, gas);
                if selector == CONSTRUCTOR_SUCCESSFUL {
                    context.write_array(events);
                }
                new_object.marshal(context);
            }
            Self::ConstructorCall(ConstructorCallResponse::Exception(response)) => {
                context.write_u8(CONSTRUCTOR_EXCEPTION);
                response.marshal(context);
            }
            Self::ConstructorCall(ConstructorCallResponse::Failed(response)) => {
                context.write_u8(CONSTRUCTOR_FAILED);
                response.marshal(context);
            }
            Self::MethodCall(MethodCallResponse::Successful {
                result,
                updates,
                events,
                gas,
            }) => {
                let selector = event_selector(
                    events,
                    NON_VOID_SUCCESSFUL,
                    NON_VOID_SUCCESSFUL_NO_EVENTS,
                    Some(NON_VOID_SUCCESSFUL_ONE_EVENT),
                );
                write_successful_prefix(context, selector, updates, gas);
                write_events(context, selector, events, NON_VOID_SUCCESSFUL);
                result.marshal(context);
            }
            Self::MethodCall(MethodCallResponse::VoidSuccessful {
                updates,
                events,
                gas,
            }) => {
                let selector = event_selector(
                    events,
                    VOID_SUCCESSFUL,
                    VOID_SUCCESSFUL_NO_EVENTS,
                    Some(VOID_SUCCESSFUL_ONE_EVENT),
                );
                write_successful_prefix(context, selector, updates, gas);
                write_events(context, selector, events, VOID_SUCCESSFUL);
            }
            Self::MethodCall(MethodCallResponse::Exception(response)) => {
                context.write_u8(METHOD_EXCEPTION);
                response.marshal(context);
            }
            Self::MethodCall(MethodCallResponse::Failed(response)) => {
                context.write_u8(METHOD_FAILED);
                response.marshal(context);
            }
        }
    }
}

fn write_events<B: BufMut>(
    context: &mut MarshallingContext<B>,
    selector: u8,
    events: &[StorageReference],
    many: u8,
) {
    if selector == many {
        context.write_array(events);
    } else if let [event] = events {
        event.marshal(context);
    }
}

impl Unmarshal for TransactionResponse {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        let selector = context.read_u8()?;
        Ok(match selector {
            GAMETE_CREATION => Self::GameteCreation(GameteCreationResponse {
                updates: context.read_array()?,
                gamete: StorageReference::unmarshal(context)?,
            }),
            JAR_STORE_INITIAL => Self::JarStoreInitial(JarStoreInitialResponse {
                instrumented_jar: context.read_bytes()?,
                dependencies: context.read_array()?,
                verification_version: context.read_u64()?,
            }),
            INITIALIZATION => Self::Initialization,
            JAR_STORE_SUCCESSFUL => {
                let updates = context.read_array()?;
                let gas = GasCosts::unmarshal(context)?;
                Self::JarStore(JarStoreResponse::Successful {
                    instrumented_jar: context.read_bytes()?,
                    dependencies: context.read_array()?,
                    verification_version: context.read_u64()?,
                    updates,
                    gas,
                })
            }
            JAR_STORE_FAILED => Self::JarStore(JarStoreResponse::Failed(
                FailedResponse::unmarshal(context)?,
            )),
            CONSTRUCTOR_EXCEPTION => Self::ConstructorCall(ConstructorCallResponse::Exception(
                ExceptionResponse::unmarshal(context)?,
            )),
            CONSTRUCTOR_FAILED => Self::ConstructorCall(ConstructorCallResponse::Failed(
                FailedResponse::unmarshal(context)?,
            )),
            CONSTRUCTOR_SUCCESSFUL | CONSTRUCTOR_SUCCESSFUL_NO_EVENTS => {
                let updates = context.read_array()?;
                let gas = GasCosts::unmarshal(context)?;
                let events = if selector == CONSTRUCTOR_SUCCESSFUL {
                    context.read_array()?
                } else {
                    Vec::new()
                };
                Self::ConstructorCall(ConstructorCallResponse::Successful {
                    new_object: StorageReference::unmarshal(context)?,
                    updates,
                    events,
                    gas,
                })
            }
            METHOD_EXCEPTION => Self::MethodCall(MethodCallResponse::Exception(
                ExceptionResponse::unmarshal(context)?,
            )),
            METHOD_FAILED => Self::MethodCall(MethodCallResponse::Failed(
                FailedResponse::unmarshal(context)?,
            )),
            NON_VOID_SUCCESSFUL | NON_VOID_SUCCESSFUL_NO_EVENTS | NON_VOID_SUCCESSFUL_ONE_EVENT => {
                let updates = context.read_array()?;
                let gas = GasCosts::unmarshal(context)?;
                let events = read_events(
                    context,
                    selector,
                    NON_VOID_SUCCESSFUL,
                    NON_VOID_SUCCESSFUL_ONE_EVENT,
                )?;
                Self::MethodCall(MethodCallResponse::Successful {
                    result: StorageValue::unmarshal(context)?,
                    updates,
                    events,
                    gas,
                })
            }
            VOID_SUCCESSFUL | VOID_SUCCESSFUL_NO_EVENTS | VOID_SUCCESSFUL_ONE_EVENT => {
                let updates = context.read_array()?;
                let gas = GasCosts::unmarshal(context)?;
                let events =
                    read_events(context, selector, VOID_SUCCESSFUL, VOID_SUCCESSFUL_ONE_EVENT)?;
                Self::MethodCall(MethodCallResponse::VoidSuccessful {
                    updates,
                    events,
                    gas,
                })
            }
            _ => return Err(Error::InvalidEnum(selector)),
        })
    }
}

fn read_events<B: Buf>(
    context: &mut UnmarshallingContext<B>,
    selector: u8,
    many: u8,
    one: u8,
) -> Result<Vec<StorageReference>, Error> {
    if selector == many {
        context.read_array()
    } else if selector == one {
        Ok(vec![StorageReference::unmarshal(context)?])
    } else {
        Ok(Vec::new())
    }
}

node_codec!(TransactionResponse);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marshalling::Flavor, signatures::FieldSignature};
    use commonware_codec::{DecodeExt, Encode};
    use num_bigint::BigInt;

    fn object(progressive: u64) -> StorageReference {
        StorageReference::new(TransactionReference::new([3; 32]), progressive)
    }

    fn gas() -> GasCosts {
        GasCosts {
            cpu: 120,
            ram: 40,
            storage: 700,
        }
    }

    fn updates() -> Vec<Update> {
        vec![
            Update::field(object(0), FieldSignature::BALANCE, BigInt::from(99_000)),
            Update::field(object(0), FieldSignature::NONCE, BigInt::from(2)),
        ]
    }

    #[test]
    fn cause_is_truncated_on_char_boundary() {
        let message = "é".repeat(MAX_MESSAGE_LENGTH);
        let cause = FailureCause::new("C", message, "");
        assert_eq!(cause.message().len(), MAX_MESSAGE_LENGTH);
        assert!(cause.message().chars().all(|c| c == 'é'));

        let odd = format!("a{}", "é".repeat(MAX_LOCATION_LENGTH));
        let cause = FailureCause::new("C", "", odd);
        assert_eq!(cause.location().len(), MAX_LOCATION_LENGTH - 1);
    }

    #[test]
    fn largest_cause_bounds_every_cause() {
        let largest = FailureCause::largest();
        let cause = FailureCause::new(
            "ü".repeat(1000),
            "ü".repeat(1000),
            "ü".repeat(1000),
        );
        let size = |cause: &FailureCause| {
            let mut context = MarshallingContext::new(Vec::new(), Flavor::Node);
            cause.marshal(&mut context);
            context.into_inner().len()
        };
        assert!(size(&cause) <= size(&largest));
    }

    #[test]
    fn event_count_selects_the_compact_form() {
        let none = TransactionResponse::MethodCall(MethodCallResponse::VoidSuccessful {
            updates: updates(),
            events: vec![],
            gas: gas(),
        });
        let one = TransactionResponse::MethodCall(MethodCallResponse::VoidSuccessful {
            updates: updates(),
            events: vec![object(5)],
            gas: gas(),
        });
        let two = TransactionResponse::MethodCall(MethodCallResponse::VoidSuccessful {
            updates: updates(),
            events: vec![object(5), object(6)],
            gas: gas(),
        });
        assert_eq!(none.to_bytes(Flavor::Node)[0], VOID_SUCCESSFUL_NO_EVENTS);
        assert_eq!(one.to_bytes(Flavor::Node)[0], VOID_SUCCESSFUL_ONE_EVENT);
        assert_eq!(two.to_bytes(Flavor::Node)[0], VOID_SUCCESSFUL);
        for response in [none, one, two] {
            let bytes = response.to_bytes(Flavor::Node);
            assert_eq!(
                TransactionResponse::from_bytes(&bytes, Flavor::Node).unwrap(),
                response
            );
        }
    }

    #[test]
    fn constructor_with_one_event_uses_the_array_form() {
        let response = TransactionResponse::ConstructorCall(ConstructorCallResponse::Successful {
            new_object: object(9),
            updates: updates(),
            events: vec![object(4)],
            gas: gas(),
        });
        let encoded = response.encode();
        assert_eq!(encoded[0], CONSTRUCTOR_SUCCESSFUL);
        assert_eq!(TransactionResponse::decode(encoded).unwrap(), response);
    }

    #[test]
    fn failed_response_keeps_penalty_and_cause() {
        let response = TransactionResponse::ConstructorCall(ConstructorCallResponse::Failed(
            FailedResponse {
                updates: updates(),
                gas: gas(),
                penalty: 10_000 - gas().total(),
                cause: FailureCause::new("java.lang.IllegalStateException", "boom", "C.java:12"),
            },
        ));
        let bytes = response.to_bytes(Flavor::Node);
        assert_eq!(bytes[0], CONSTRUCTOR_FAILED);
        let decoded = TransactionResponse::from_bytes(&bytes, Flavor::Node).unwrap();
        let failed = decoded.failed().unwrap();
        assert_eq!(failed.penalty + failed.gas.total(), 10_000);
        assert_eq!(
            failed.cause.to_string(),
            "java.lang.IllegalStateException: boom @C.java:12"
        );
        assert!(decoded.exception().is_none());
    }

    #[test]
    fn jar_responses_expose_the_installed_jar() {
        let response = TransactionResponse::JarStore(JarStoreResponse::Successful {
            instrumented_jar: vec![0xca, 0xfe],
            dependencies: vec![TransactionReference::new([1; 32])],
            verification_version: 3,
            updates: updates(),
            gas: gas(),
        });
        assert!(response.is_installed_jar());
        let bytes = response.to_bytes(Flavor::Node);
        let decoded = TransactionResponse::from_bytes(&bytes, Flavor::Node).unwrap();
        let (jar, dependencies) = decoded.installed_jar().unwrap();
        assert_eq!(jar, &[0xca, 0xfe]);
        assert_eq!(dependencies.len(), 1);
        assert!(!TransactionResponse::Initialization.is_installed_jar());
    }

    #[test]
    fn unknown_response_selector_is_rejected() {
        let err = TransactionResponse::from_bytes(&[17], Flavor::Node).expect_err("17 is free");
        assert!(matches!(err, Error::InvalidEnum(17)));
    }
}

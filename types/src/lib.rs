//! Domain model of the Hotmoka execution core and its compact binary codec.
//!
//! Every value that crosses the boundary of a node (requests, responses,
//! updates and storage values) implements [Marshal] and [Unmarshal] against
//! the per-stream contexts of [marshalling], and the `commonware_codec`
//! traits over a fresh [Flavor::Node] context.

pub mod gas;
pub mod marshalling;
pub mod references;
pub mod requests;
pub mod responses;
pub mod signatures;
pub mod storage_types;
pub mod updates;
pub mod values;

pub use gas::GasCostModel;
pub use marshalling::{Flavor, Marshal, MarshallingContext, Unmarshal, UnmarshallingContext};
pub use references::{ReferenceError, StorageReference, TransactionReference};
pub use requests::{
    ConstructorCallRequest, GameteCreationRequest, InitializationRequest,
    InstanceMethodCallRequest, JarStoreInitialRequest, JarStoreRequest, NonInitialHeader,
    StaticMethodCallRequest, TransactionRequest, NAMESPACE,
};
pub use responses::{
    ConstructorCallResponse, ExceptionResponse, FailedResponse, FailureCause, GasCosts,
    GameteCreationResponse, JarStoreInitialResponse, JarStoreResponse, MethodCallResponse,
    TransactionResponse,
};
pub use signatures::{CodeSignature, FieldSignature};
pub use storage_types::{BasicType, ClassType, StorageType};
pub use updates::Update;
pub use values::StorageValue;

/// Big integers used for balances, nonces and amounts.
pub use num_bigint::BigInt;

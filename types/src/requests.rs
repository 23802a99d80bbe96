//! Transaction requests.
//!
//! Initial requests build the genesis state of a node and are neither signed
//! nor paid for. Every other request carries a [NonInitialHeader] naming the
//! paying caller and is signed, under [NAMESPACE], over its encoding without
//! the trailing signature.

use crate::{
    marshalling::{node_codec, Flavor, Marshal, MarshallingContext, Unmarshal, UnmarshallingContext},
    references::{StorageReference, TransactionReference},
    signatures::CodeSignature,
    storage_types::{BasicType, ClassType, StorageType},
    values::StorageValue,
};
use bytes::{Buf, BufMut};
use commonware_codec::{DecodeExt, Encode, Error};
use commonware_cryptography::{ed25519, Signer, Verifier};
use num_bigint::BigInt;

/// Namespace of request signatures.
pub const NAMESPACE: &[u8] = b"_HOTMOKA_REQUEST";

const INITIALIZATION: u8 = 0;
const JAR_STORE_INITIAL: u8 = 1;
const GAMETE_CREATION: u8 = 2;
const JAR_STORE: u8 = 3;
const CONSTRUCTOR_CALL: u8 = 4;
const INSTANCE_METHOD_CALL: u8 = 5;
const STATIC_METHOD_CALL: u8 = 6;
const TRANSFER_INT: u8 = 7;
const TRANSFER_LONG: u8 = 8;
const TRANSFER_BIG_INTEGER: u8 = 9;

/// Fields shared by all signed requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonInitialHeader {
    /// Externally owned account that pays for, and signs, the request.
    pub caller: StorageReference,
    /// Must match the `nonce` field of the caller.
    pub nonce: BigInt,
    pub chain_id: String,
    pub gas_limit: u64,
    pub gas_price: u64,
    /// Jar whose classes (and dependencies) the request runs against.
    pub classpath: TransactionReference,
    /// Ed25519 signature of the unsigned encoding. Empty until signed.
    pub signature: Vec<u8>,
}

impl NonInitialHeader {
    pub fn new(
        caller: StorageReference,
        nonce: impl Into<BigInt>,
        chain_id: impl Into<String>,
        gas_limit: u64,
        gas_price: u64,
        classpath: TransactionReference,
    ) -> Self {
        Self {
            caller,
            nonce: nonce.into(),
            chain_id: chain_id.into(),
            gas_limit,
            gas_price,
            classpath,
            signature: Vec::new(),
        }
    }

    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        context.write_string_unshared(&self.chain_id);
        self.caller.marshal(context);
        context.write_gas(self.gas_limit);
        context.write_gas(self.gas_price);
        self.classpath.marshal(context);
        context.write_big_integer(&self.nonce);
    }

    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        let chain_id = context.read_string_unshared()?;
        let caller = StorageReference::unmarshal(context)?;
        let gas_limit = context.read_gas()?;
        let gas_price = context.read_gas()?;
        let classpath = TransactionReference::unmarshal(context)?;
        let nonce = context.read_big_integer()?;
        Ok(Self {
            caller,
            nonce,
            chain_id,
            gas_limit,
            gas_price,
            classpath,
            signature: Vec::new(),
        })
    }
}

/// Installs a jar in a node that is not yet initialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JarStoreInitialRequest {
    pub jar: Vec<u8>,
    pub dependencies: Vec<TransactionReference>,
}

/// Creates the gamete, the first funded account of a chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameteCreationRequest {
    pub classpath: TransactionReference,
    pub initial_amount: BigInt,
    /// Hex-encoded ed25519 public key of the gamete.
    pub public_key: String,
}

/// Marks the node as initialized, with the given manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitializationRequest {
    pub classpath: TransactionReference,
    pub manifest: StorageReference,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JarStoreRequest {
    pub header: NonInitialHeader,
    pub jar: Vec<u8>,
    pub dependencies: Vec<TransactionReference>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructorCallRequest {
    pub header: NonInitialHeader,
    pub constructor: CodeSignature,
    pub actuals: Vec<StorageValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceMethodCallRequest {
    pub header: NonInitialHeader,
    pub method: CodeSignature,
    pub receiver: StorageReference,
    pub actuals: Vec<StorageValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticMethodCallRequest {
    pub header: NonInitialHeader,
    pub method: CodeSignature,
    pub actuals: Vec<StorageValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionRequest {
    JarStoreInitial(JarStoreInitialRequest),
    GameteCreation(GameteCreationRequest),
    Initialization(InitializationRequest),
    JarStore(JarStoreRequest),
    ConstructorCall(ConstructorCallRequest),
    InstanceMethodCall(InstanceMethodCallRequest),
    StaticMethodCall(StaticMethodCallRequest),
}

impl TransactionRequest {
    pub fn is_initial(&self) -> bool {
        self.header().is_none()
    }

    pub fn header(&self) -> Option<&NonInitialHeader> {
        match self {
            Self::JarStoreInitial(_) | Self::GameteCreation(_) | Self::Initialization(_) => None,
            Self::JarStore(request) => Some(&request.header),
            Self::ConstructorCall(request) => Some(&request.header),
            Self::InstanceMethodCall(request) => Some(&request.header),
            Self::StaticMethodCall(request) => Some(&request.header),
        }
    }

    fn header_mut(&mut self) -> Option<&mut NonInitialHeader> {
        match self {
            Self::JarStoreInitial(_) | Self::GameteCreation(_) | Self::Initialization(_) => None,
            Self::JarStore(request) => Some(&mut request.header),
            Self::ConstructorCall(request) => Some(&mut request.header),
            Self::InstanceMethodCall(request) => Some(&mut request.header),
            Self::StaticMethodCall(request) => Some(&mut request.header),
        }
    }

    /// Reference of the transaction started by this request: the SHA-256 of
    /// its complete encoding.
    pub fn reference(&self) -> TransactionReference {
        TransactionReference::of_bytes(&self.to_bytes(Flavor::Node))
    }

    /// Bytes covered by the signature.
    pub fn signed_payload(&self) -> Vec<u8> {
        let mut context = MarshallingContext::new(Vec::new(), Flavor::Node);
        self.marshal_unsigned(&mut context);
        context.into_inner()
    }

    /// Signs a non-initial request in place. Initial requests are left untouched.
    pub fn sign(&mut self, private: &ed25519::PrivateKey) {
        let payload = self.signed_payload();
        if let Some(header) = self.header_mut() {
            let signature = private.sign(NAMESPACE, &payload);
            header.signature = signature.encode().to_vec();
        }
    }

    /// Whether the signature of a non-initial request was produced by `public`.
    pub fn verify(&self, public: &ed25519::PublicKey) -> bool {
        let Some(header) = self.header() else {
            return false;
        };
        let Ok(signature) = ed25519::Signature::decode(header.signature.as_slice()) else {
            return false;
        };
        public.verify(NAMESPACE, &self.signed_payload(), &signature)
    }

    fn marshal_unsigned<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        match self {
            Self::Initialization(request) => {
                context.write_u8(INITIALIZATION);
                request.classpath.marshal(context);
                request.manifest.marshal(context);
            }
            Self::JarStoreInitial(request) => {
                context.write_u8(JAR_STORE_INITIAL);
                context.write_bytes(&request.jar);
                context.write_array(&request.dependencies);
            }
            Self::GameteCreation(request) => {
                context.write_u8(GAMETE_CREATION);
                request.classpath.marshal(context);
                context.write_big_integer(&request.initial_amount);
                context.write_string_unshared(&request.public_key);
            }
            Self::JarStore(request) => {
                context.write_u8(JAR_STORE);
                request.header.marshal(context);
                context.write_bytes(&request.jar);
                context.write_array(&request.dependencies);
            }
            Self::ConstructorCall(request) => {
                context.write_u8(CONSTRUCTOR_CALL);
                request.header.marshal(context);
                context.write_array(&request.actuals);
                request.constructor.marshal(context);
            }
            Self::InstanceMethodCall(request) => {
                if let Some((selector, amount)) = request.transfer_amount() {
                    context.write_u8(selector);
                    request.header.marshal(context);
                    request.receiver.marshal(context);
                    match amount {
                        StorageValue::Int(amount) => context.write_i32(*amount),
                        StorageValue::Long(amount) => context.write_i64(*amount),
                        StorageValue::BigInteger(amount) => context.write_big_integer(amount),
                        _ => {}
                    }
                    return;
                }
                context.write_u8(INSTANCE_METHOD_CALL);
                request.header.marshal(context);
                context.write_array(&request.actuals);
                request.method.marshal(context);
                request.receiver.marshal(context);
            }
            Self::StaticMethodCall(request) => {
                context.write_u8(STATIC_METHOD_CALL);
                request.header.marshal(context);
                context.write_array(&request.actuals);
                request.method.marshal(context);
            }
        }
    }
}

impl InstanceMethodCallRequest {
    /// A call to `PayableContract.receive` with a single amount has a
    /// dedicated, shorter encoding.
    fn transfer_amount(&self) -> Option<(u8, &StorageValue)> {
        let [amount] = self.actuals.as_slice() else {
            return None;
        };
        let (selector, formal) = match amount {
            StorageValue::Int(_) => (TRANSFER_INT, StorageType::Basic(BasicType::Int)),
            StorageValue::Long(_) => (TRANSFER_LONG, StorageType::Basic(BasicType::Long)),
            StorageValue::BigInteger(_) => (TRANSFER_BIG_INTEGER, StorageType::BIG_INTEGER),
            _ => return None,
        };
        (self.method == CodeSignature::receive(formal)).then_some((selector, amount))
    }

    /// A transfer of `amount` coins from the caller to `receiver`.
    pub fn transfer(
        header: NonInitialHeader,
        receiver: StorageReference,
        amount: StorageValue,
    ) -> Option<Self> {
        let formal = match &amount {
            StorageValue::Int(_) => StorageType::Basic(BasicType::Int),
            StorageValue::Long(_) => StorageType::Basic(BasicType::Long),
            StorageValue::BigInteger(_) => StorageType::BIG_INTEGER,
            _ => return None,
        };
        Some(Self {
            header,
            method: CodeSignature::receive(formal),
            receiver,
            actuals: vec![amount],
        })
    }
}

impl Marshal for TransactionRequest {
    fn marshal<B: BufMut>(&self, context: &mut MarshallingContext<B>) {
        self.marshal_unsigned(context);
        if let Some(header) = self.header() {
            context.write_bytes(&header.signature);
        }
    }
}

fn expect_constructor(signature: CodeSignature) -> Result<CodeSignature, Error> {
    match signature {
        CodeSignature::Constructor { .. } => Ok(signature),
        CodeSignature::Method { .. } => Err(Error::Invalid(
            "ConstructorCallRequest",
            "expected a constructor signature",
        )),
    }
}

fn expect_method(signature: CodeSignature) -> Result<CodeSignature, Error> {
    match signature {
        CodeSignature::Method { .. } => Ok(signature),
        CodeSignature::Constructor { .. } => {
            Err(Error::Invalid("MethodCallRequest", "expected a method signature"))
        }
    }
}

impl Unmarshal for TransactionRequest {
    fn unmarshal<B: Buf>(context: &mut UnmarshallingContext<B>) -> Result<Self, Error> {
        let selector = context.read_u8()?;
        let mut request = match selector {
            INITIALIZATION => {
                return Ok(Self::Initialization(InitializationRequest {
                    classpath: TransactionReference::unmarshal(context)?,
                    manifest: StorageReference::unmarshal(context)?,
                }))
            }
            JAR_STORE_INITIAL => {
                return Ok(Self::JarStoreInitial(JarStoreInitialRequest {
                    jar: context.read_bytes()?,
                    dependencies: context.read_array()?,
                }))
            }
            GAMETE_CREATION => {
                return Ok(Self::GameteCreation(GameteCreationRequest {
                    classpath: TransactionReference::unmarshal(context)?,
                    initial_amount: context.read_big_integer()?,
                    public_key: context.read_string_unshared()?,
                }))
            }
            JAR_STORE => Self::JarStore(JarStoreRequest {
                header: NonInitialHeader::unmarshal(context)?,
                jar: context.read_bytes()?,
                dependencies: context.read_array()?,
            }),
            CONSTRUCTOR_CALL => {
                let header = NonInitialHeader::unmarshal(context)?;
                let actuals = context.read_array()?;
                let constructor = expect_constructor(CodeSignature::unmarshal(context)?)?;
                Self::ConstructorCall(ConstructorCallRequest {
                    header,
                    constructor,
                    actuals,
                })
            }
            INSTANCE_METHOD_CALL => {
                let header = NonInitialHeader::unmarshal(context)?;
                let actuals = context.read_array()?;
                let method = expect_method(CodeSignature::unmarshal(context)?)?;
                let receiver = StorageReference::unmarshal(context)?;
                Self::InstanceMethodCall(InstanceMethodCallRequest {
                    header,
                    method,
                    receiver,
                    actuals,
                })
            }
            STATIC_METHOD_CALL => {
                let header = NonInitialHeader::unmarshal(context)?;
                let actuals = context.read_array()?;
                let method = expect_method(CodeSignature::unmarshal(context)?)?;
                Self::StaticMethodCall(StaticMethodCallRequest {
                    header,
                    method,
                    actuals,
                })
            }
            TRANSFER_INT | TRANSFER_LONG | TRANSFER_BIG_INTEGER => {
                let header = NonInitialHeader::unmarshal(context)?;
                let receiver = StorageReference::unmarshal(context)?;
                let amount = match selector {
                    TRANSFER_INT => StorageValue::Int(context.read_i32()?),
                    TRANSFER_LONG => StorageValue::Long(context.read_i64()?),
                    _ => StorageValue::BigInteger(context.read_big_integer()?),
                };
                let transfer = InstanceMethodCallRequest::transfer(header, receiver, amount)
                    .ok_or(Error::Invalid("TransferRequest", "invalid amount"))?;
                Self::InstanceMethodCall(transfer)
            }
            _ => return Err(Error::InvalidEnum(selector)),
        };

        let signature = context.read_bytes()?;
        if let Some(header) = request.header_mut() {
            header.signature = signature;
        }
        Ok(request)
    }
}

node_codec!(TransactionRequest);

impl From<ConstructorCallRequest> for TransactionRequest {
    fn from(request: ConstructorCallRequest) -> Self {
        Self::ConstructorCall(request)
    }
}

impl From<InstanceMethodCallRequest> for TransactionRequest {
    fn from(request: InstanceMethodCallRequest) -> Self {
        Self::InstanceMethodCall(request)
    }
}

impl From<StaticMethodCallRequest> for TransactionRequest {
    fn from(request: StaticMethodCallRequest) -> Self {
        Self::StaticMethodCall(request)
    }
}

impl From<JarStoreRequest> for TransactionRequest {
    fn from(request: JarStoreRequest) -> Self {
        Self::JarStore(request)
    }
}

/// The constructor of the manifest, as used by most initialization scripts.
pub fn manifest_constructor() -> CodeSignature {
    CodeSignature::constructor(ClassType::MANIFEST, vec![StorageType::BIG_INTEGER])
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_utils::{from_hex, hex};

    const GOLDEN_CONSTRUCTOR_CALL: &str = "040009636861696e74657374ffffd0e496468c25fca59179885fa7c5ff4f440efbd0e0c96c2426b799733661988204002cec0001f4000501060003e70013011a";

    fn classpath() -> TransactionReference {
        "d0e496468c25fca59179885fa7c5ff4f440efbd0e0c96c2426b7997336619882"
            .parse()
            .unwrap()
    }

    fn header() -> NonInitialHeader {
        NonInitialHeader::new(
            StorageReference::new(classpath(), 0),
            1,
            "chaintest",
            11500,
            500,
            classpath(),
        )
    }

    fn golden_request() -> TransactionRequest {
        TransactionRequest::ConstructorCall(ConstructorCallRequest {
            header: header(),
            constructor: manifest_constructor(),
            actuals: vec![StorageValue::BigInteger(BigInt::from(999))],
        })
    }

    #[test]
    fn constructor_call_golden_vector() {
        let request = golden_request();
        assert_eq!(hex(&request.signed_payload()), GOLDEN_CONSTRUCTOR_CALL);

        // an unsigned request ends with an empty signature
        let full = request.to_bytes(Flavor::Node);
        assert_eq!(full.last(), Some(&0));
        assert_eq!(
            TransactionRequest::from_bytes(&full, Flavor::Node).unwrap(),
            request
        );
    }

    #[test]
    fn golden_vector_decodes_into_request() {
        let mut bytes = from_hex(GOLDEN_CONSTRUCTOR_CALL).unwrap();
        bytes.push(0);
        let request = TransactionRequest::from_bytes(&bytes, Flavor::Node).unwrap();
        let header = request.header().unwrap();
        assert_eq!(header.chain_id, "chaintest");
        assert_eq!(header.gas_limit, 11500);
        assert_eq!(header.nonce, BigInt::from(1));
    }

    #[test]
    fn signature_covers_unsigned_encoding() {
        let private = ed25519::PrivateKey::from_seed(0);
        let other = ed25519::PrivateKey::from_seed(1);

        let mut request = golden_request();
        assert!(!request.verify(&private.public_key()));
        request.sign(&private);
        assert!(request.verify(&private.public_key()));
        assert!(!request.verify(&other.public_key()));

        let decoded =
            TransactionRequest::from_bytes(&request.to_bytes(Flavor::Node), Flavor::Node).unwrap();
        assert!(decoded.verify(&private.public_key()));

        if let TransactionRequest::ConstructorCall(call) = &mut request {
            call.header.gas_limit += 1;
        }
        assert!(!request.verify(&private.public_key()));
    }

    #[test]
    fn signing_changes_the_reference() {
        let private = ed25519::PrivateKey::from_seed(2);
        let mut request = golden_request();
        let unsigned = request.reference();
        request.sign(&private);
        assert_ne!(request.reference(), unsigned);
        assert_eq!(request.reference(), request.clone().reference());
    }

    #[test]
    fn transfers_use_compact_selectors() {
        let receiver = StorageReference::new(classpath(), 7);
        for (amount, selector) in [
            (StorageValue::Int(100), TRANSFER_INT),
            (StorageValue::Long(1 << 40), TRANSFER_LONG),
            (StorageValue::BigInteger(BigInt::from(5)), TRANSFER_BIG_INTEGER),
        ] {
            let transfer: TransactionRequest =
                InstanceMethodCallRequest::transfer(header(), receiver, amount)
                    .unwrap()
                    .into();
            let bytes = transfer.to_bytes(Flavor::Node);
            assert_eq!(bytes[0], selector);
            assert_eq!(
                TransactionRequest::from_bytes(&bytes, Flavor::Node).unwrap(),
                transfer
            );
        }
    }

    #[test]
    fn other_instance_calls_are_not_compacted() {
        let call: TransactionRequest = InstanceMethodCallRequest {
            header: header(),
            method: CodeSignature::method(
                ClassType::GAS_STATION,
                "balance",
                vec![ClassType::STORAGE.into()],
                Some(StorageType::BIG_INTEGER),
            ),
            receiver: StorageReference::new(classpath(), 2),
            actuals: vec![StorageValue::Reference(StorageReference::new(classpath(), 0))],
        }
        .into();
        let bytes = call.to_bytes(Flavor::Node);
        assert_eq!(bytes[0], INSTANCE_METHOD_CALL);
        assert_eq!(
            TransactionRequest::from_bytes(&bytes, Flavor::Node).unwrap(),
            call
        );
    }

    #[test]
    fn initial_requests_carry_no_signature() {
        let gamete = TransactionRequest::GameteCreation(GameteCreationRequest {
            classpath: classpath(),
            initial_amount: BigInt::from(1_000_000_000u64),
            public_key: "ab".repeat(32),
        });
        assert!(gamete.is_initial());
        let bytes = gamete.to_bytes(Flavor::Node);
        assert_eq!(bytes[0], GAMETE_CREATION);
        assert_eq!(
            TransactionRequest::from_bytes(&bytes, Flavor::Node).unwrap(),
            gamete
        );
    }

    #[test]
    fn method_selector_with_constructor_signature_is_rejected() {
        let mut context = MarshallingContext::new(Vec::new(), Flavor::Node);
        context.write_u8(STATIC_METHOD_CALL);
        header().marshal(&mut context);
        context.write_array::<StorageValue>(&[]);
        manifest_constructor().marshal(&mut context);
        context.write_bytes(&[]);
        let err = TransactionRequest::from_bytes(&context.into_inner(), Flavor::Node)
            .expect_err("static call of a constructor");
        assert!(matches!(err, Error::Invalid("MethodCallRequest", _)));
    }
}

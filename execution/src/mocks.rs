//! Test doubles: a toolchain whose classes are described in Rust, with code
//! given as closures, and helpers to set up a node.

use crate::{
    context::{ExecutionContext, Value},
    error::{CodeError, Fault, Thrown},
    loader::{ClassLoader, Jar, Obligation, Toolchain, VerificationError, VerifiedJar},
    resolver::{Callable, CodeResolver},
};
use anyhow::Result;
use commonware_cryptography::{
    ed25519::{PrivateKey, PublicKey},
    Signer,
};
use hotmoka_types::{
    BigInt, ClassType, CodeSignature, FieldSignature, GasCostModel, StorageType, StorageValue,
    TransactionReference,
};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Jars starting with these bytes fail verification.
pub const INVALID_JAR: &[u8] = b"invalid";

/// Creates an account keypair for Ed25519 signatures used by users
pub fn create_account_keypair(seed: u64) -> (PrivateKey, PublicKey) {
    let private = PrivateKey::from_seed(seed);
    let public = private.public_key();
    (private, public)
}

/// Body of a mock constructor or method.
pub type Body = Arc<
    dyn Fn(&mut ExecutionContext<'_>, Option<Value>, Vec<Value>) -> Result<Option<Value>, CodeError>,
>;

#[derive(Clone)]
struct MockCode {
    callable: Callable,
    body: Body,
}

/// A class known to the [MockToolchain].
#[derive(Clone)]
pub struct MockClass {
    name: ClassType,
    superclass: Option<ClassType>,
    fields: Vec<FieldSignature>,
    satisfies: Vec<Obligation>,
    code: Vec<MockCode>,
}

impl MockClass {
    pub fn new(name: ClassType, superclass: ClassType) -> Self {
        Self {
            name,
            superclass: Some(superclass),
            fields: Vec::new(),
            satisfies: Vec::new(),
            code: Vec::new(),
        }
    }

    fn root(name: ClassType) -> Self {
        Self {
            superclass: None,
            ..Self::new(name, ClassType::OBJECT)
        }
    }

    pub fn name(&self) -> &ClassType {
        &self.name
    }

    /// Declares a persistent field.
    pub fn field(mut self, name: &str, field_type: impl Into<StorageType>) -> Self {
        let field = FieldSignature::new(self.name.clone(), name, field_type);
        self.fields.push(field);
        self
    }

    fn declared_field(mut self, field: FieldSignature) -> Self {
        self.fields.push(field);
        self
    }

    pub fn satisfying(mut self, obligation: Obligation) -> Self {
        self.satisfies.push(obligation);
        self
    }

    /// Adds a plain constructor.
    pub fn constructor<F>(self, formals: Vec<StorageType>, body: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, Option<Value>, Vec<Value>) -> Result<Option<Value>, CodeError>
            + 'static,
    {
        let signature = CodeSignature::constructor(self.name.clone(), formals);
        self.code(Callable::new(signature), body)
    }

    /// Adds a plain instance method.
    pub fn method<F>(
        self,
        name: &str,
        formals: Vec<StorageType>,
        returns: Option<StorageType>,
        body: F,
    ) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, Option<Value>, Vec<Value>) -> Result<Option<Value>, CodeError>
            + 'static,
    {
        let signature = CodeSignature::method(self.name.clone(), name, formals, returns);
        self.code(Callable::new(signature), body)
    }

    /// Adds code with arbitrary flags. Its signature must be defined in this class.
    pub fn code<F>(mut self, callable: Callable, body: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, Option<Value>, Vec<Value>) -> Result<Option<Value>, CodeError>
            + 'static,
    {
        self.code.push(MockCode {
            callable,
            body: Arc::new(body),
        });
        self
    }
}

/// Moves `amount` coins from `payer` to `payee`.
fn pay(
    context: &mut ExecutionContext<'_>,
    payer: &Value,
    payee: &Value,
    amount: BigInt,
) -> Result<(), CodeError> {
    let (Some(payer), Some(payee)) = (payer.as_reference().copied(), payee.as_reference().copied())
    else {
        return Err(Thrown::unchecked("java.lang.NullPointerException", "").into());
    };
    if amount < BigInt::from(0) {
        return Err(Thrown::unchecked(
            "java.lang.IllegalArgumentException",
            "cannot transfer a negative amount",
        )
        .into());
    }
    let balance = context.balance(&payer)?;
    if balance < amount {
        return Err(Thrown::unchecked(
            "io.takamaka.code.lang.InsufficientFundsError",
            amount.to_string(),
        )
        .into());
    }
    context.set_balance(&payer, balance - &amount)?;
    let balance = context.balance(&payee)?;
    context.set_balance(&payee, balance + amount)?;
    Ok(())
}

/// `receive` of payable contracts: the caller, passed by the entry convention,
/// pays the receiver.
fn receive(amount: StorageType) -> MockCode {
    let signature = CodeSignature::receive(amount).with_entry_formals();
    let callable = Callable {
        from_contract: true,
        ..Callable::new(signature)
    };
    MockCode {
        callable,
        body: Arc::new(receive_body),
    }
}

fn receive_body(
    context: &mut ExecutionContext<'_>,
    receiver: Option<Value>,
    args: Vec<Value>,
) -> Result<Option<Value>, CodeError> {
    let (Some(receiver), [amount, caller, _]) = (receiver, args.as_slice()) else {
        return Err(Fault::Deserialization("bad arguments to receive".into()).into());
    };
    let amount = match amount {
        Value::Storable(StorageValue::Int(amount)) => BigInt::from(*amount),
        Value::Storable(StorageValue::Long(amount)) => BigInt::from(*amount),
        Value::Storable(StorageValue::BigInteger(amount)) => amount.clone(),
        _ => return Err(Fault::Deserialization("bad amount for receive".into()).into()),
    };
    pay(context, caller, &receiver, amount)?;
    Ok(None)
}

/// The classes of the Takamaka runtime that the engine relies on.
pub fn standard_classes() -> Vec<MockClass> {
    let mut payable = MockClass::new(ClassType::PAYABLE_CONTRACT, ClassType::CONTRACT);
    payable.code = vec![
        receive(StorageType::INT),
        receive(StorageType::LONG),
        receive(StorageType::BIG_INTEGER),
    ];
    vec![
        MockClass::root(ClassType::OBJECT),
        MockClass::new(ClassType::STORAGE, ClassType::OBJECT),
        MockClass::new(ClassType::CONTRACT, ClassType::STORAGE)
            .declared_field(FieldSignature::BALANCE),
        payable,
        MockClass::new(ClassType::EOA, ClassType::PAYABLE_CONTRACT)
            .declared_field(FieldSignature::NONCE)
            .declared_field(FieldSignature::PUBLIC_KEY),
        MockClass::new(ClassType::GAMETE, ClassType::EOA),
        MockClass::new(ClassType::EVENT, ClassType::STORAGE),
        MockClass::new(ClassType::MANIFEST, ClassType::STORAGE),
    ]
}

/// Toolchain over a fixed set of classes, that counts the class loaders it
/// hands out and those that were dropped.
#[derive(Clone)]
pub struct MockToolchain {
    classes: Arc<BTreeMap<ClassType, MockClass>>,
    loads: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl MockToolchain {
    /// The standard classes plus `classes`.
    pub fn new(classes: impl IntoIterator<Item = MockClass>) -> Self {
        let classes = standard_classes()
            .into_iter()
            .chain(classes)
            .map(|class| (class.name.clone(), class))
            .collect();
        Self {
            classes: Arc::new(classes),
            loads: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Class loaders handed out and not dropped yet.
    pub fn live_loaders(&self) -> usize {
        self.loads() - self.releases.load(Ordering::SeqCst)
    }
}

impl Toolchain for MockToolchain {
    type Loader = MockLoader;

    fn load(&self, jars: &[Jar]) -> Result<MockLoader> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(MockLoader {
            classes: self.classes.clone(),
            jar: jars.first().map(|jar| jar.reference),
            releases: self.releases.clone(),
        })
    }

    fn verify(
        &self,
        jar: &[u8],
        _dependencies: &MockLoader,
        _allows_self_charged: bool,
    ) -> Result<VerifiedJar, VerificationError> {
        if jar.starts_with(INVALID_JAR) {
            return Err(VerificationError {
                violations: vec!["illegal bytecode".to_string()],
            });
        }
        Ok(VerifiedJar::new(jar.to_vec()))
    }

    fn instrument(&self, jar: VerifiedJar, _gas_cost_model: &GasCostModel) -> Result<Vec<u8>> {
        Ok(jar.into_bytes())
    }

    fn verification_version(&self) -> u64 {
        0
    }
}

/// Class loader of a [MockToolchain]. Every class is attributed to the first
/// jar of the classpath.
pub struct MockLoader {
    classes: Arc<BTreeMap<ClassType, MockClass>>,
    jar: Option<TransactionReference>,
    releases: Arc<AtomicUsize>,
}

impl MockLoader {
    /// `class` followed by its superclasses.
    fn ancestors(&self, class: &ClassType) -> Vec<&MockClass> {
        let mut ancestors = Vec::new();
        let mut next = self.classes.get(class);
        while let Some(current) = next {
            ancestors.push(current);
            next = current
                .superclass
                .as_ref()
                .and_then(|superclass| self.classes.get(superclass));
        }
        ancestors
    }

    fn find(&self, signature: &CodeSignature) -> Option<&MockCode> {
        self.classes
            .get(signature.defining_class())?
            .code
            .iter()
            .find(|code| code.callable.signature == *signature)
    }
}

impl Drop for MockLoader {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl ClassLoader for MockLoader {
    fn jar_of(&self, class: &ClassType) -> Option<TransactionReference> {
        self.classes.get(class).and(self.jar)
    }

    fn fields_of(&self, class: &ClassType) -> Vec<FieldSignature> {
        self.ancestors(class)
            .into_iter()
            .rev()
            .flat_map(|class| class.fields.iter().cloned())
            .collect()
    }

    fn is_subtype(&self, class: &ClassType, of: &ClassType) -> bool {
        class == of
            || *of == ClassType::OBJECT
            || self.ancestors(class).iter().any(|ancestor| ancestor.name == *of)
    }

    fn satisfies(&self, obligation: Obligation, class: &ClassType) -> bool {
        self.ancestors(class)
            .iter()
            .any(|ancestor| ancestor.satisfies.contains(&obligation))
    }
}

impl CodeResolver for MockLoader {
    fn resolve_constructor(&self, class: &ClassType, formals: &[StorageType]) -> Option<Callable> {
        let signature = CodeSignature::constructor(class.clone(), formals.to_vec());
        self.find(&signature).map(|code| code.callable.clone())
    }

    fn resolve_method(
        &self,
        class: &ClassType,
        name: &str,
        formals: &[StorageType],
        returns: Option<&StorageType>,
    ) -> Option<Callable> {
        self.ancestors(class).into_iter().find_map(|ancestor| {
            let signature = CodeSignature::method(
                ancestor.name.clone(),
                name,
                formals.to_vec(),
                returns.cloned(),
            );
            self.find(&signature).map(|code| code.callable.clone())
        })
    }

    fn invoke(
        &self,
        callable: &Callable,
        context: &mut ExecutionContext<'_>,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, CodeError> {
        let code = self
            .find(&callable.signature)
            .ok_or_else(|| Fault::UnmatchedTarget(callable.signature.to_string()))?;
        (code.body)(context, receiver, args)
    }
}

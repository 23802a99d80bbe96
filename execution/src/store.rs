use anyhow::{anyhow, Context as _, Result};
use hotmoka_types::{
    BigInt, ClassType, FieldSignature, GasCostModel, StorageReference, StorageValue,
    TransactionReference, TransactionRequest, TransactionResponse, Update,
};

#[cfg(any(test, feature = "mocks"))]
use std::collections::BTreeMap;

/// Class of a storage object and the jar that defines it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassTag {
    pub class: ClassType,
    pub jar: TransactionReference,
}

/// Read access to the committed state of a node.
///
/// Unknown references are errors.
pub trait Store {
    fn request(&self, reference: &TransactionReference) -> Result<TransactionRequest>;
    fn response(&self, reference: &TransactionReference) -> Result<TransactionResponse>;
    /// Most recent update that assigned `field` of `object`.
    fn last_update_to_field(
        &self,
        object: &StorageReference,
        field: &FieldSignature,
    ) -> Result<Update>;
    fn class_tag(&self, object: &StorageReference) -> Result<ClassTag>;
    /// Manifest of the node, once it has been initialized.
    fn manifest(&self) -> Result<Option<StorageReference>>;
    /// Time of the block being executed, in milliseconds since the epoch.
    fn now(&self) -> Result<u64>;
    fn gas_cost_model(&self) -> Result<GasCostModel>;

    /// Current value of `field` of `object`.
    fn field_value(&self, object: &StorageReference, field: &FieldSignature) -> Result<StorageValue> {
        match self.last_update_to_field(object, field)? {
            Update::Field { value, .. } => Ok(value),
            Update::ClassTag { .. } => Err(anyhow!("{object} has no update for {field}")),
        }
    }

    fn balance(&self, contract: &StorageReference) -> Result<BigInt> {
        big_integer(self.field_value(contract, &FieldSignature::BALANCE)?)
            .with_context(|| format!("balance of {contract}"))
    }

    fn nonce(&self, account: &StorageReference) -> Result<BigInt> {
        big_integer(self.field_value(account, &FieldSignature::NONCE)?)
            .with_context(|| format!("nonce of {account}"))
    }

    /// Hex-encoded ed25519 public key of an externally owned account.
    fn public_key(&self, account: &StorageReference) -> Result<String> {
        match self.field_value(account, &FieldSignature::PUBLIC_KEY)? {
            StorageValue::String(key) => Ok(key),
            other => Err(anyhow!("public key of {account} is {other}")),
        }
    }
}

fn big_integer(value: StorageValue) -> Result<BigInt> {
    match value {
        StorageValue::BigInteger(value) => Ok(value),
        other => Err(anyhow!("expected a big integer, found {other}")),
    }
}

/// In-memory store that commits whatever responses it is given.
#[cfg(any(test, feature = "mocks"))]
#[derive(Default)]
pub struct Memory {
    requests: BTreeMap<TransactionReference, TransactionRequest>,
    responses: BTreeMap<TransactionReference, TransactionResponse>,
    classes: BTreeMap<StorageReference, ClassTag>,
    fields: BTreeMap<(StorageReference, FieldSignature), Update>,
    manifest: Option<StorageReference>,
    now: u64,
    gas_cost_model: GasCostModel,
}

#[cfg(any(test, feature = "mocks"))]
impl Memory {
    pub fn new(gas_cost_model: GasCostModel) -> Self {
        Self {
            gas_cost_model,
            ..Self::default()
        }
    }

    pub fn set_now(&mut self, now: u64) {
        self.now = now;
    }

    /// Records `response` as the outcome of `request` and applies its updates.
    pub fn commit(
        &mut self,
        request: TransactionRequest,
        response: TransactionResponse,
    ) -> TransactionReference {
        let reference = request.reference();
        for update in response.updates() {
            match update {
                Update::ClassTag { object, class, jar } => {
                    self.classes.insert(
                        *object,
                        ClassTag {
                            class: class.clone(),
                            jar: *jar,
                        },
                    );
                }
                Update::Field { object, field, .. } => {
                    self.fields.insert((*object, field.clone()), update.clone());
                }
            }
        }
        if let TransactionRequest::Initialization(initialization) = &request {
            self.manifest = Some(initialization.manifest);
        }
        self.requests.insert(reference, request);
        self.responses.insert(reference, response);
        reference
    }
}

#[cfg(any(test, feature = "mocks"))]
impl Store for Memory {
    fn request(&self, reference: &TransactionReference) -> Result<TransactionRequest> {
        self.requests
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow!("unknown transaction {reference}"))
    }

    fn response(&self, reference: &TransactionReference) -> Result<TransactionResponse> {
        self.responses
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow!("unknown transaction {reference}"))
    }

    fn last_update_to_field(
        &self,
        object: &StorageReference,
        field: &FieldSignature,
    ) -> Result<Update> {
        self.fields
            .get(&(*object, field.clone()))
            .cloned()
            .ok_or_else(|| anyhow!("no update to {field} of {object}"))
    }

    fn class_tag(&self, object: &StorageReference) -> Result<ClassTag> {
        self.classes
            .get(object)
            .cloned()
            .ok_or_else(|| anyhow!("unknown object {object}"))
    }

    fn manifest(&self) -> Result<Option<StorageReference>> {
        Ok(self.manifest)
    }

    fn now(&self) -> Result<u64> {
        Ok(self.now)
    }

    fn gas_cost_model(&self) -> Result<GasCostModel> {
        Ok(self.gas_cost_model.clone())
    }
}

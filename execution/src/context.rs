//! Per-transaction execution state: the gas meter, the heap of objects touched
//! by the transaction and the events it emitted.
//!
//! Storage objects are identified by their [StorageReference] and are loaded
//! from the store the first time they are reached; objects that cannot be kept
//! in storage live only in the heap, under an [ObjectId].

use crate::{
    error::{CodeError, Fault, OutOfGas},
    gas::{GasMeter, SubBudget},
    loader::Obligation,
    resolver::{self, Callable, CodeResolver},
    store::Store,
};
use anyhow::anyhow;
use hotmoka_types::{
    BasicType, BigInt, ClassType, CodeSignature, FieldSignature, GasCostModel, StorageReference,
    StorageType, StorageValue, TransactionReference,
};
use std::{
    any::Any,
    collections::BTreeMap,
    panic::{catch_unwind, AssertUnwindSafe},
};
use tracing::{trace, warn};

/// Index of an object in the heap of an [ExecutionContext].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(usize);

/// A value manipulated by running code.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A value that can be kept in storage, references to storage objects included.
    Storable(StorageValue),
    /// An object that exists only during the transaction.
    Transient(ObjectId),
}

impl Value {
    pub const NULL: Self = Self::Storable(StorageValue::Null);

    pub fn as_storable(&self) -> Option<&StorageValue> {
        match self {
            Self::Storable(value) => Some(value),
            Self::Transient(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&StorageReference> {
        self.as_storable().and_then(StorageValue::as_reference)
    }

    pub fn as_big_integer(&self) -> Option<&BigInt> {
        self.as_storable().and_then(StorageValue::as_big_integer)
    }
}

impl From<StorageValue> for Value {
    fn from(value: StorageValue) -> Self {
        Self::Storable(value)
    }
}

impl From<StorageReference> for Value {
    fn from(reference: StorageReference) -> Self {
        Self::Storable(StorageValue::Reference(reference))
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Self::Storable(StorageValue::BigInteger(value))
    }
}

pub(crate) struct Object {
    pub(crate) class: ClassType,
    /// Persistent fields as found in the store; `None` if the object was
    /// created by this transaction.
    pub(crate) persisted: Option<BTreeMap<FieldSignature, StorageValue>>,
    pub(crate) fields: BTreeMap<FieldSignature, Value>,
}

pub struct ExecutionContext<'a> {
    pub(crate) store: &'a dyn Store,
    pub(crate) code: &'a dyn CodeResolver,
    gas_cost_model: GasCostModel,
    transaction: TransactionReference,
    caller: Option<StorageReference>,
    /// Receiver of the running code, if it is a storage object.
    running: Option<StorageReference>,
    now: u64,
    meter: GasMeter,
    objects: Vec<Object>,
    loaded: BTreeMap<StorageReference, ObjectId>,
    events: Vec<StorageReference>,
    next_progressive: u64,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        store: &'a dyn Store,
        code: &'a dyn CodeResolver,
        gas_cost_model: GasCostModel,
        transaction: TransactionReference,
        now: u64,
        meter: GasMeter,
    ) -> Self {
        Self {
            store,
            code,
            gas_cost_model,
            transaction,
            caller: None,
            running: None,
            now,
            meter,
            objects: Vec::new(),
            loaded: BTreeMap::new(),
            events: Vec::new(),
            next_progressive: 0,
        }
    }

    pub(crate) fn set_caller(&mut self, caller: StorageReference) {
        self.caller = Some(caller);
    }

    /// Account that pays for the transaction. Initial transactions have none.
    pub fn caller(&self) -> Option<&StorageReference> {
        self.caller.as_ref()
    }

    pub fn transaction(&self) -> &TransactionReference {
        &self.transaction
    }

    /// Block time, read once when the transaction started.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn gas_cost_model(&self) -> &GasCostModel {
        &self.gas_cost_model
    }

    pub fn meter(&self) -> &GasMeter {
        &self.meter
    }

    pub fn charge_cpu(&mut self, amount: u64) -> Result<(), OutOfGas> {
        self.meter.charge_cpu(amount)
    }

    pub fn charge_ram(&mut self, amount: u64) -> Result<(), OutOfGas> {
        self.meter.charge_ram(amount)
    }

    pub(crate) fn charge_storage(&mut self, amount: u64) -> Result<(), OutOfGas> {
        self.meter.charge_storage(amount)
    }

    /// Charges `cpu` to the current budget, then runs `scope` with at most
    /// `amount` gas; unused gas is given back.
    pub fn with_gas<R>(
        &mut self,
        cpu: u64,
        amount: u64,
        scope: impl FnOnce(&mut Self) -> Result<R, CodeError>,
    ) -> Result<R, CodeError> {
        self.charge_cpu(cpu)?;
        let mut budget = SubBudget::enter(self, amount)?;
        scope(&mut *budget)
    }

    /// Events emitted so far, in emission order.
    pub fn events(&self) -> &[StorageReference] {
        &self.events
    }

    /// Allocates an object of `class` with default field values. Storage
    /// objects get the next reference of this transaction.
    pub fn new_object(&mut self, class: &ClassType) -> Result<Value, Fault> {
        let fields = self.code.fields_of(class);
        let model = &self.gas_cost_model;
        let ram = model
            .ram_cost_of_object()
            .saturating_add(model.ram_cost_of_field().saturating_mul(fields.len() as u64));
        self.charge_ram(ram)?;

        let fields = fields
            .into_iter()
            .map(|field| {
                let value = default_value(&field);
                (field, Value::Storable(value))
            })
            .collect();
        let object = Object {
            class: class.clone(),
            persisted: None,
            fields,
        };
        let id = ObjectId(self.objects.len());
        self.objects.push(object);

        if !self.code.is_storage(class) {
            return Ok(Value::Transient(id));
        }
        let reference = StorageReference::new(self.transaction, self.next_progressive);
        self.next_progressive += 1;
        self.loaded.insert(reference, id);
        trace!(%reference, %class, "created storage object");
        Ok(reference.into())
    }

    /// Class of the object or value, or `None` for null and primitive values.
    pub fn class_of(&mut self, value: &Value) -> Result<Option<ClassType>, Fault> {
        let class = match value {
            Value::Transient(id) => self.object(*id)?.class.clone(),
            Value::Storable(StorageValue::Reference(reference)) => {
                let id = self.load(reference)?;
                self.object(id)?.class.clone()
            }
            Value::Storable(StorageValue::String(_)) => ClassType::STRING,
            Value::Storable(StorageValue::BigInteger(_)) => ClassType::BIG_INTEGER,
            Value::Storable(StorageValue::Enum { class, .. }) => class.clone(),
            Value::Storable(_) => return Ok(None),
        };
        Ok(Some(class))
    }

    pub fn get_field(&mut self, object: &Value, field: &FieldSignature) -> Result<Value, Fault> {
        let id = self.resolve(object)?;
        self.object(id)?
            .fields
            .get(field)
            .cloned()
            .ok_or_else(|| Fault::Internal(anyhow!("no field {field} in {object:?}")))
    }

    /// Assigns `field` of `object`. The field must be declared by the class
    /// of `object` or its superclasses, and `value` must conform to its type.
    pub fn set_field(
        &mut self,
        object: &Value,
        field: &FieldSignature,
        value: Value,
    ) -> Result<(), Fault> {
        let id = self.resolve(object)?;
        let class = self.object(id)?.class.clone();
        if !self.code.fields_of(&class).contains(field) {
            return Err(Fault::Internal(anyhow!("{class} has no field {field}")));
        }
        if !self.conforms(&field.field_type, &value)? {
            return Err(Fault::Internal(anyhow!(
                "{value:?} cannot be assigned to {field} of type {}",
                field.field_type
            )));
        }
        self.object_mut(id)?.fields.insert(field.clone(), value);
        Ok(())
    }

    pub fn balance(&mut self, contract: &StorageReference) -> Result<BigInt, Fault> {
        let value = self.get_field(&(*contract).into(), &FieldSignature::BALANCE)?;
        value
            .as_big_integer()
            .cloned()
            .ok_or_else(|| Fault::Internal(anyhow!("balance of {contract} is not a big integer")))
    }

    pub fn set_balance(&mut self, contract: &StorageReference, balance: BigInt) -> Result<(), Fault> {
        self.set_field(&(*contract).into(), &FieldSignature::BALANCE, balance.into())
    }

    /// Emits an event, that must be a storage object of an event class.
    pub fn event(&mut self, event: &Value) -> Result<(), Fault> {
        let Some(reference) = event.as_reference() else {
            return Err(Fault::Internal(anyhow!("events must be storage objects")));
        };
        let id = self.load(reference)?;
        let class = &self.object(id)?.class;
        if !self.code.is_subtype(class, &ClassType::EVENT) {
            return Err(Fault::Internal(anyhow!("{class} is not an event class")));
        }
        self.events.push(*reference);
        Ok(())
    }

    /// Calls other code from running code.
    ///
    /// Static code is called without a receiver, instance code on a receiver
    /// of its defining class. Entry code gets the contract whose code is
    /// running as its caller.
    pub fn call(
        &mut self,
        receiver: Option<Value>,
        signature: &CodeSignature,
        mut args: Vec<Value>,
    ) -> Result<Option<Value>, CodeError> {
        let unmatched = || Fault::UnmatchedTarget(signature.to_string());
        let (callable, entry) = resolver::resolve(self.code, signature).ok_or_else(unmatched)?;
        match &receiver {
            None if callable.is_static => {}
            Some(receiver) if !callable.is_static => {
                let targets_receiver = self
                    .class_of(receiver)?
                    .is_some_and(|class| self.code.is_subtype(&class, signature.defining_class()));
                if !targets_receiver {
                    return Err(unmatched().into());
                }
            }
            _ => return Err(unmatched().into()),
        }
        if entry {
            let caller = self.calling_contract()?;
            args.push(caller.into());
            args.push(Value::NULL);
        }
        self.check_white_listed(&callable, &args)?;
        self.invoke(&callable, receiver, args)
    }

    /// Contract whose code is running.
    fn calling_contract(&mut self) -> Result<StorageReference, Fault> {
        let Some(running) = self.running else {
            return Err(Fault::Internal(anyhow!("entry code called from static code")));
        };
        let id = self.load(&running)?;
        let class = &self.object(id)?.class;
        if !self.code.is_subtype(class, &ClassType::CONTRACT) {
            return Err(Fault::Internal(anyhow!(
                "entry code called from {class}, that is not a contract"
            )));
        }
        Ok(running)
    }

    /// Checks the white-listing obligations of the formals of `callable`
    /// against the actual arguments.
    pub(crate) fn check_white_listed(
        &mut self,
        callable: &Callable,
        args: &[Value],
    ) -> Result<(), Fault> {
        for (obligations, arg) in callable.obligations.iter().zip(args) {
            for obligation in obligations {
                let satisfied = match obligation {
                    Obligation::MustBeFalse => {
                        matches!(arg, Value::Storable(StorageValue::Boolean(false)))
                    }
                    class_based => match self.class_of(arg)? {
                        Some(class) => self.code.satisfies(*class_based, &class),
                        None => true,
                    },
                };
                if !satisfied {
                    return Err(Fault::NonWhiteListedCall(format!(
                        "{} with an argument violating {obligation:?}",
                        callable.signature
                    )));
                }
            }
        }
        Ok(())
    }

    /// Charges the activation record of `callable` and runs it. A panic of
    /// the running code becomes an internal fault.
    pub(crate) fn invoke(
        &mut self,
        callable: &Callable,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, CodeError> {
        self.charge_ram(self.gas_cost_model.ram_cost_of_activation_record())?;
        let code = self.code;
        let frame = receiver.as_ref().and_then(Value::as_reference).copied();
        let outer = std::mem::replace(&mut self.running, frame);
        let result = catch_unwind(AssertUnwindSafe(|| code.invoke(callable, self, receiver, args)));
        self.running = outer;
        result.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(signature = %callable.signature, panic = message, "code panicked");
            Err(Fault::Internal(anyhow!("{} panicked: {message}", callable.signature)).into())
        })
    }

    pub(crate) fn loaded_object(&self, reference: &StorageReference) -> Option<&Object> {
        self.loaded
            .get(reference)
            .and_then(|id| self.objects.get(id.0))
    }

    pub(crate) fn object(&self, id: ObjectId) -> Result<&Object, Fault> {
        self.objects
            .get(id.0)
            .ok_or_else(|| Fault::Internal(anyhow!("dangling object {id:?}")))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, Fault> {
        self.objects
            .get_mut(id.0)
            .ok_or_else(|| Fault::Internal(anyhow!("dangling object {id:?}")))
    }

    fn resolve(&mut self, object: &Value) -> Result<ObjectId, Fault> {
        match object {
            Value::Transient(id) => Ok(*id),
            Value::Storable(StorageValue::Reference(reference)) => self.load(reference),
            Value::Storable(other) => Err(Fault::Internal(anyhow!("{other} is not an object"))),
        }
    }

    /// Brings a storage object in the heap, if it is not there yet.
    pub(crate) fn load(&mut self, reference: &StorageReference) -> Result<ObjectId, Fault> {
        if let Some(id) = self.loaded.get(reference) {
            return Ok(*id);
        }
        let tag = self
            .store
            .class_tag(reference)
            .map_err(|err| Fault::Deserialization(format!("{err:#}")))?;
        let mut persisted = BTreeMap::new();
        let mut fields = BTreeMap::new();
        for field in self.code.fields_of(&tag.class) {
            let value = self
                .store
                .field_value(reference, &field)
                .map_err(|err| Fault::Deserialization(format!("{err:#}")))?;
            fields.insert(field.clone(), Value::Storable(value.clone()));
            persisted.insert(field, value);
        }
        let id = ObjectId(self.objects.len());
        self.objects.push(Object {
            class: tag.class,
            persisted: Some(persisted),
            fields,
        });
        self.loaded.insert(*reference, id);
        Ok(id)
    }
}

impl AsMut<GasMeter> for ExecutionContext<'_> {
    fn as_mut(&mut self) -> &mut GasMeter {
        &mut self.meter
    }
}

/// Initial value of a field of a new object. Balances and nonces start at zero.
fn default_value(field: &FieldSignature) -> StorageValue {
    if *field == FieldSignature::BALANCE || *field == FieldSignature::NONCE {
        return StorageValue::BigInteger(BigInt::from(0));
    }
    match &field.field_type {
        StorageType::Basic(BasicType::Boolean) => StorageValue::Boolean(false),
        StorageType::Basic(BasicType::Byte) => StorageValue::Byte(0),
        StorageType::Basic(BasicType::Char) => StorageValue::Char(0),
        StorageType::Basic(BasicType::Short) => StorageValue::Short(0),
        StorageType::Basic(BasicType::Int) => StorageValue::Int(0),
        StorageType::Basic(BasicType::Long) => StorageValue::Long(0),
        StorageType::Basic(BasicType::Float) => StorageValue::Float(0.0),
        StorageType::Basic(BasicType::Double) => StorageValue::Double(0.0),
        StorageType::Class(_) => StorageValue::Null,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

//! The transaction state machine.
//!
//! A non-initial request goes through:
//!
//! 1. **precheck**: the request is validated against the configuration and the
//!    store; any failure is a [Rejection] and nothing is charged.
//! 2. **init**: the nonce of the caller is increased, the fixed costs are
//!    charged and the whole gas limit is debited from the caller.
//! 3. **execution**: the handler of the request runs against an
//!    [ExecutionContext].
//! 4. **finalization**: either the updates of the transaction are extracted,
//!    the response is charged for its storage and the unused gas is refunded,
//!    or the transaction fails and only the payment of the gas survives.

use crate::{
    config::EngineConfig,
    context::{ExecutionContext, Value},
    error::{CodeError, Fault, OutOfGas, Rejection},
    gas::GasMeter,
    loader::{ClassLoader, Jar, Toolchain, VerifiedJar},
    resolver::{self, Callable, CodeResolver},
    store::Store,
};
use anyhow::anyhow;
use commonware_codec::DecodeExt;
use commonware_cryptography::ed25519;
use hotmoka_types::{
    BigInt, ClassType, CodeSignature, ConstructorCallResponse, ExceptionResponse, FailedResponse,
    FailureCause, FieldSignature, GasCostModel, GasCosts, JarStoreResponse, Marshal,
    MethodCallResponse, NonInitialHeader, StorageReference, StorageValue, TransactionReference,
    TransactionRequest, TransactionResponse, Update,
};
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, trace};

mod handlers;

/// Whether a request is executed to be committed, or only to read its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Run {
    Commit,
    View,
}

/// Kind of response a non-initial request produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    JarStore,
    ConstructorCall,
    MethodCall,
}

/// How a non-initial transaction ended, when it did not fail.
#[derive(Clone, Debug)]
enum Completion {
    JarInstalled {
        instrumented_jar: Vec<u8>,
        dependencies: Vec<TransactionReference>,
        verification_version: u64,
    },
    Constructed(StorageReference),
    ConstructorException(FailureCause),
    Returned(StorageValue),
    ReturnedVoid,
    MethodException(FailureCause),
}

impl Completion {
    /// Object produced by the transaction, that is part of the frontier.
    fn reference(&self) -> Option<StorageReference> {
        match self {
            Self::Constructed(object) => Some(*object),
            Self::Returned(StorageValue::Reference(object)) => Some(*object),
            _ => None,
        }
    }

    fn response(
        &self,
        updates: Vec<Update>,
        events: Vec<StorageReference>,
        gas: GasCosts,
    ) -> TransactionResponse {
        match self {
            Self::JarInstalled {
                instrumented_jar,
                dependencies,
                verification_version,
            } => TransactionResponse::JarStore(JarStoreResponse::Successful {
                instrumented_jar: instrumented_jar.clone(),
                dependencies: dependencies.clone(),
                verification_version: *verification_version,
                updates,
                gas,
            }),
            Self::Constructed(new_object) => {
                TransactionResponse::ConstructorCall(ConstructorCallResponse::Successful {
                    new_object: *new_object,
                    updates,
                    events,
                    gas,
                })
            }
            Self::ConstructorException(cause) => TransactionResponse::ConstructorCall(
                ConstructorCallResponse::Exception(ExceptionResponse {
                    updates,
                    events,
                    gas,
                    cause: cause.clone(),
                }),
            ),
            Self::Returned(result) => {
                TransactionResponse::MethodCall(MethodCallResponse::Successful {
                    result: result.clone(),
                    updates,
                    events,
                    gas,
                })
            }
            Self::ReturnedVoid => {
                TransactionResponse::MethodCall(MethodCallResponse::VoidSuccessful {
                    updates,
                    events,
                    gas,
                })
            }
            Self::MethodException(cause) => TransactionResponse::MethodCall(
                MethodCallResponse::Exception(ExceptionResponse {
                    updates,
                    events,
                    gas,
                    cause: cause.clone(),
                }),
            ),
        }
    }
}

/// What the precheck established about a non-initial request.
struct Prepared<L> {
    loader: L,
    jars: Vec<Jar>,
    gas_cost_model: GasCostModel,
    minimal_gas: u64,
}

/// A non-initial transaction past its init phase.
struct Transaction<'a> {
    context: ExecutionContext<'a>,
    caller: StorageReference,
    gas_price: u64,
    /// Coins debited from the caller for the whole gas limit.
    paid: BigInt,
    updates_in_case_of_failure: Vec<Update>,
    /// Storage references among the receiver and the actual arguments.
    roots: Vec<StorageReference>,
    /// Set for runs that must not have side effects, to the code being run.
    view: Option<String>,
}

/// Executes requests against a store, through a toolchain.
///
/// The engine never writes to the store: hosts commit the responses it returns.
pub struct Engine<'a, S: Store, T: Toolchain> {
    store: &'a S,
    toolchain: &'a T,
    config: EngineConfig,
}

impl<'a, S: Store, T: Toolchain> Engine<'a, S, T> {
    pub fn new(store: &'a S, toolchain: &'a T, config: EngineConfig) -> Self {
        Self {
            store,
            toolchain,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executes `request`, yielding the response to commit.
    pub fn execute(&self, request: &TransactionRequest) -> Result<TransactionResponse, Rejection> {
        let reference = request.reference();
        let result = match request {
            TransactionRequest::JarStoreInitial(jar_store) => {
                self.handle_jar_store_initial(jar_store)
            }
            TransactionRequest::GameteCreation(creation) => {
                self.handle_gamete_creation(reference, creation)
            }
            TransactionRequest::Initialization(initialization) => {
                self.handle_initialization(initialization)
            }
            TransactionRequest::JarStore(jar_store) => {
                self.handle_jar_store(reference, request, jar_store)
            }
            TransactionRequest::ConstructorCall(call) => {
                self.handle_constructor_call(reference, request, call)
            }
            TransactionRequest::InstanceMethodCall(call) => {
                self.handle_instance_method_call(reference, request, call, Run::Commit)
            }
            TransactionRequest::StaticMethodCall(call) => {
                self.handle_static_method_call(reference, request, call, Run::Commit)
            }
        };
        if let Err(rejection) = &result {
            debug!(%reference, %rejection, "rejected request");
        }
        result
    }

    /// Runs a method call only to read its result: neither the signature nor
    /// the nonce are checked, and the response must not be committed.
    pub fn run_view(&self, request: &TransactionRequest) -> Result<TransactionResponse, Rejection> {
        let reference = request.reference();
        match request {
            TransactionRequest::InstanceMethodCall(call) => {
                self.handle_instance_method_call(reference, request, call, Run::View)
            }
            TransactionRequest::StaticMethodCall(call) => {
                self.handle_static_method_call(reference, request, call, Run::View)
            }
            _ => Err(Rejection::NotViewable),
        }
    }

    fn ensure_not_initialized(&self) -> Result<(), Rejection> {
        match self.store.manifest()? {
            Some(_) => Err(Rejection::AlreadyInitialized),
            None => Ok(()),
        }
    }

    /// Jars installed at `roots` and their dependencies, transitively, each
    /// once and in breadth-first order.
    fn jars(
        &self,
        roots: impl IntoIterator<Item = TransactionReference>,
    ) -> Result<Vec<Jar>, Rejection> {
        let mut jars = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<TransactionReference> = roots.into_iter().collect();
        while let Some(reference) = queue.pop_front() {
            if !seen.insert(reference) {
                continue;
            }
            let response = self
                .store
                .response(&reference)
                .map_err(|_| Rejection::UnknownClasspath(reference))?;
            let Some((bytes, dependencies)) = response.installed_jar() else {
                return Err(Rejection::UnknownClasspath(reference));
            };
            jars.push(Jar {
                reference,
                bytes: bytes.to_vec(),
            });
            queue.extend(dependencies.iter().copied());
        }
        Ok(jars)
    }

    fn precheck(
        &self,
        request: &TransactionRequest,
        header: &NonInitialHeader,
        run: Run,
    ) -> Result<Prepared<T::Loader>, Rejection> {
        let caller = header.caller;

        if header.chain_id != self.config.chain_id {
            return Err(Rejection::ChainIdMismatch {
                expected: self.config.chain_id.clone(),
                got: header.chain_id.clone(),
            });
        }

        let max = match run {
            Run::Commit => self.config.max_gas_per_transaction,
            Run::View => self.config.max_gas_per_view,
        };
        if header.gas_limit > max {
            return Err(Rejection::GasLimitTooLarge {
                limit: header.gas_limit,
                max,
            });
        }

        if !self.config.ignores_gas_price && header.gas_price < self.config.gas_price {
            return Err(Rejection::GasPriceTooLow {
                price: header.gas_price,
                current: self.config.gas_price,
            });
        }

        let jars = self.jars([header.classpath])?;
        let loader = self.toolchain.load(&jars)?;

        let is_account = match self.store.class_tag(&caller) {
            Ok(tag) => loader.is_subtype(&tag.class, &ClassType::EOA),
            Err(err) => {
                debug!(%caller, ?err, "unknown caller");
                false
            }
        };
        if !is_account {
            return Err(Rejection::CallerNotAccount(caller));
        }

        if run == Run::Commit && !self.config.skips_signature_check {
            let public_key = self.store.public_key(&caller)?;
            let verified = commonware_utils::from_hex(&public_key)
                .and_then(|bytes| ed25519::PublicKey::decode(bytes.as_slice()).ok())
                .is_some_and(|public| request.verify(&public));
            if !verified {
                debug!(%caller, "invalid signature; rejecting request");
                return Err(Rejection::InvalidSignature);
            }
        }

        if run == Run::Commit {
            let expected = self.store.nonce(&caller)?;
            if expected != header.nonce {
                debug!(
                    %caller,
                    %expected,
                    got = %header.nonce,
                    "nonce mismatch; rejecting request"
                );
                return Err(Rejection::NonceMismatch {
                    expected,
                    got: header.nonce.clone(),
                });
            }
        }

        let gas_cost_model = self.store.gas_cost_model()?;
        let balance = self.store.balance(&caller)?;
        let minimal_gas = minimal_gas(
            &gas_cost_model,
            request.marshalled_size(),
            &jars,
            header,
            &balance,
        );
        if header.gas_limit < minimal_gas {
            return Err(Rejection::GasLimitTooSmall {
                limit: header.gas_limit,
                minimum: minimal_gas,
            });
        }

        let required = GasCostModel::to_coins(header.gas_limit, header.gas_price);
        if balance < required {
            return Err(Rejection::InsufficientFunds { balance, required });
        }

        Ok(Prepared {
            loader,
            jars,
            gas_cost_model,
            minimal_gas,
        })
    }

    /// Init phase: from here on, the caller pays for the transaction.
    fn start<'b>(
        &'b self,
        prepared: &'b Prepared<T::Loader>,
        reference: TransactionReference,
        request: &TransactionRequest,
        header: &NonInitialHeader,
        run: Run,
    ) -> Result<Transaction<'b>, Rejection> {
        let caller = header.caller;
        let model = &prepared.gas_cost_model;
        let now = self.store.now()?;
        let mut context = ExecutionContext::new(
            self.store,
            &prepared.loader,
            model.clone(),
            reference,
            now,
            GasMeter::new(header.gas_limit),
        );
        context.set_caller(caller);

        if run == Run::Commit {
            let nonce: BigInt = &header.nonce + 1;
            context
                .set_field(&caller.into(), &FieldSignature::NONCE, nonce.into())
                .map_err(internal)?;
        }

        let too_small = |_: OutOfGas| Rejection::GasLimitTooSmall {
            limit: header.gas_limit,
            minimum: prepared.minimal_gas,
        };
        context
            .charge_cpu(model.cpu_base_transaction_cost())
            .map_err(too_small)?;
        context
            .charge_storage(model.storage_cost_of_bytes(request.marshalled_size()))
            .map_err(too_small)?;
        for _ in &prepared.jars {
            context
                .charge_cpu(model.cpu_cost_for_getting_response_at())
                .map_err(too_small)?;
        }
        for jar in &prepared.jars {
            context
                .charge_cpu(model.cpu_cost_for_loading_jar(jar.bytes.len()))
                .map_err(too_small)?;
            context
                .charge_ram(model.ram_cost_for_loading_jar(jar.bytes.len()))
                .map_err(too_small)?;
        }

        let paid = GasCostModel::to_coins(header.gas_limit, header.gas_price);
        let balance = context.balance(&caller).map_err(internal)?;
        context
            .set_balance(&caller, balance - &paid)
            .map_err(internal)?;

        let updates_in_case_of_failure = context
            .extract_updates([caller])
            .map_err(internal)?
            .into_iter()
            .collect();

        Ok(Transaction {
            context,
            caller,
            gas_price: header.gas_price,
            paid,
            updates_in_case_of_failure,
            roots: Vec::new(),
            view: (run == Run::View).then(|| "a view run".to_string()),
        })
    }

    /// Finalization phase: turns the outcome of the execution into a response.
    fn finish(
        &self,
        mut transaction: Transaction<'_>,
        kind: Kind,
        outcome: Result<Completion, Fault>,
    ) -> TransactionResponse {
        match outcome.and_then(|completion| self.complete(&mut transaction, completion)) {
            Ok(response) => response,
            Err(fault) => {
                let meter = transaction.context.meter();
                let cause = fault.cause();
                debug!(
                    caller = %transaction.caller,
                    %cause,
                    penalty = meter.penalty(),
                    "transaction failed"
                );
                let failed = FailedResponse {
                    updates: transaction.updates_in_case_of_failure,
                    gas: meter.consumed(),
                    penalty: meter.penalty(),
                    cause,
                };
                match kind {
                    Kind::JarStore => TransactionResponse::JarStore(JarStoreResponse::Failed(failed)),
                    Kind::ConstructorCall => TransactionResponse::ConstructorCall(
                        ConstructorCallResponse::Failed(failed),
                    ),
                    Kind::MethodCall => {
                        TransactionResponse::MethodCall(MethodCallResponse::Failed(failed))
                    }
                }
            }
        }
    }

    fn complete(
        &self,
        transaction: &mut Transaction<'_>,
        completion: Completion,
    ) -> Result<TransactionResponse, Fault> {
        let context = &mut transaction.context;
        let events = context.events().to_vec();
        let mut roots = transaction.roots.clone();
        roots.push(transaction.caller);
        roots.extend(events.iter().copied());
        roots.extend(completion.reference());

        let updates = context.extract_updates(roots.iter().copied())?;
        if let Some(code) = &transaction.view {
            check_view(&transaction.caller, &updates, code)?;
        }
        let response = completion.response(
            updates.into_iter().collect(),
            events.clone(),
            context.meter().consumed(),
        );
        let storage = context
            .gas_cost_model()
            .storage_cost_of_bytes(response.marshalled_size());
        context.charge_storage(storage)?;

        let remaining = context.meter().remaining();
        let refund =
            GasCostModel::to_coins(remaining, transaction.gas_price).min(transaction.paid.clone());
        let balance = context.balance(&transaction.caller)?;
        context.set_balance(&transaction.caller, balance + refund)?;
        trace!(caller = %transaction.caller, remaining, "refunded unused gas");

        let updates = context.extract_updates(roots)?;
        Ok(completion.response(
            updates.into_iter().collect(),
            events,
            context.meter().consumed(),
        ))
    }
}

/// Faults of the init phase can only come from an inconsistent store.
fn internal(fault: Fault) -> Rejection {
    Rejection::Store(anyhow!(fault))
}

/// Smallest gas limit that pays for the init phase and for storing the
/// largest failed response the request can produce.
fn minimal_gas(
    model: &GasCostModel,
    request_size: usize,
    jars: &[Jar],
    header: &NonInitialHeader,
    balance: &BigInt,
) -> u64 {
    let caller = header.caller;
    let limit = header.gas_limit;
    let worst = TransactionResponse::MethodCall(MethodCallResponse::Failed(FailedResponse {
        updates: vec![
            Update::field(caller, FieldSignature::BALANCE, balance.clone()),
            Update::field(caller, FieldSignature::NONCE, &header.nonce + 1),
        ],
        gas: GasCosts {
            cpu: limit,
            ram: limit,
            storage: limit,
        },
        penalty: limit,
        cause: FailureCause::largest(),
    }));

    let jars = jars.iter().fold(0u64, |total, jar| {
        total
            .saturating_add(model.cpu_cost_for_getting_response_at())
            .saturating_add(model.cpu_cost_for_loading_jar(jar.bytes.len()))
            .saturating_add(model.ram_cost_for_loading_jar(jar.bytes.len()))
    });
    model
        .cpu_base_transaction_cost()
        .saturating_add(model.storage_cost_of_bytes(request_size))
        .saturating_add(jars)
        .saturating_add(model.storage_cost_of_bytes(worst.marshalled_size()))
}

/// Code run as a view may only pay for its gas.
fn check_view(
    caller: &StorageReference,
    updates: &BTreeSet<Update>,
    code: &str,
) -> Result<(), Fault> {
    let allowed = |update: &Update| match update {
        Update::Field { object, field, .. } => {
            object == caller && (*field == FieldSignature::BALANCE || *field == FieldSignature::NONCE)
        }
        Update::ClassTag { .. } => false,
    };
    match updates.iter().find(|update| !allowed(update)) {
        None => Ok(()),
        Some(update) => {
            debug!(%update, "side effect in view");
            Err(Fault::SideEffectsInViewMethod(code.to_string()))
        }
    }
}

use super::super::*;
use super::{classify, references, resolve_target};
use hotmoka_types::{ConstructorCallRequest, InstanceMethodCallRequest, StaticMethodCallRequest};

impl<'a, S: Store, T: Toolchain> Engine<'a, S, T> {
    pub(in crate::engine) fn handle_constructor_call(
        &self,
        reference: TransactionReference,
        request: &TransactionRequest,
        call: &ConstructorCallRequest,
    ) -> Result<TransactionResponse, Rejection> {
        let prepared = self.precheck(request, &call.header, Run::Commit)?;
        let mut transaction = self.start(&prepared, reference, request, &call.header, Run::Commit)?;
        let outcome = construct(&mut transaction, call);
        Ok(self.finish(transaction, Kind::ConstructorCall, outcome))
    }

    pub(in crate::engine) fn handle_instance_method_call(
        &self,
        reference: TransactionReference,
        request: &TransactionRequest,
        call: &InstanceMethodCallRequest,
        run: Run,
    ) -> Result<TransactionResponse, Rejection> {
        let prepared = self.precheck(request, &call.header, run)?;
        let mut transaction = self.start(&prepared, reference, request, &call.header, run)?;
        let outcome = call_instance_method(&mut transaction, call);
        Ok(self.finish(transaction, Kind::MethodCall, outcome))
    }

    pub(in crate::engine) fn handle_static_method_call(
        &self,
        reference: TransactionReference,
        request: &TransactionRequest,
        call: &StaticMethodCallRequest,
        run: Run,
    ) -> Result<TransactionResponse, Rejection> {
        let prepared = self.precheck(request, &call.header, run)?;
        let mut transaction = self.start(&prepared, reference, request, &call.header, run)?;
        let outcome = call_static_method(&mut transaction, call);
        Ok(self.finish(transaction, Kind::MethodCall, outcome))
    }
}

fn construct(
    transaction: &mut Transaction<'_>,
    call: &ConstructorCallRequest,
) -> Result<Completion, Fault> {
    let context = &mut transaction.context;
    let class = call.constructor.defining_class();
    let mut args = context.deserialize_actuals(call.constructor.formals(), &call.actuals)?;
    transaction.roots.extend(references(&call.actuals));

    let code = context.code;
    let (callable, entry) = resolve_target(code, &call.constructor)?;
    if entry {
        args.push(transaction.caller.into());
        args.push(Value::NULL);
    }
    context.check_white_listed(&callable, &args)?;

    let object = context.new_object(class)?;
    let Some(new_object) = object.as_reference().copied() else {
        return Err(Fault::NotStorable(class.clone()));
    };
    let result = context.invoke(&callable, Some(object), args);
    Ok(match classify(&callable, result)? {
        Ok(_) => Completion::Constructed(new_object),
        Err(cause) => Completion::ConstructorException(cause),
    })
}

fn call_instance_method(
    transaction: &mut Transaction<'_>,
    call: &InstanceMethodCallRequest,
) -> Result<Completion, Fault> {
    let context = &mut transaction.context;
    let receiver = context.deserialize(&StorageValue::Reference(call.receiver))?;
    let mut args = context.deserialize_actuals(call.method.formals(), &call.actuals)?;
    transaction.roots.push(call.receiver);
    transaction.roots.extend(references(&call.actuals));

    let code = context.code;
    let (callable, entry) = resolve_target(code, &call.method)?;
    let receiver_class = context.class_of(&receiver)?;
    let targets_receiver = receiver_class
        .is_some_and(|class| code.is_subtype(&class, call.method.defining_class()));
    if callable.is_static || !targets_receiver {
        return Err(Fault::UnmatchedTarget(call.method.to_string()));
    }
    if entry {
        args.push(transaction.caller.into());
        args.push(Value::NULL);
    }
    context.check_white_listed(&callable, &args)?;
    if callable.view {
        transaction.view = Some(callable.signature.to_string());
    }

    let result = context.invoke(&callable, Some(receiver), args);
    returned(context, &call.method, classify(&callable, result)?)
}

fn call_static_method(
    transaction: &mut Transaction<'_>,
    call: &StaticMethodCallRequest,
) -> Result<Completion, Fault> {
    let context = &mut transaction.context;
    let mut args = context.deserialize_actuals(call.method.formals(), &call.actuals)?;
    transaction.roots.extend(references(&call.actuals));

    let code = context.code;
    let (callable, entry) = resolve_target(code, &call.method)?;
    if !callable.is_static {
        return Err(Fault::UnmatchedTarget(call.method.to_string()));
    }
    if entry {
        args.push(transaction.caller.into());
        args.push(Value::NULL);
    }
    context.check_white_listed(&callable, &args)?;
    if callable.view {
        transaction.view = Some(callable.signature.to_string());
    }

    let result = context.invoke(&callable, None, args);
    returned(context, &call.method, classify(&callable, result)?)
}

fn returned(
    context: &ExecutionContext<'_>,
    method: &CodeSignature,
    outcome: Result<Option<Value>, FailureCause>,
) -> Result<Completion, Fault> {
    match outcome {
        Err(cause) => Ok(Completion::MethodException(cause)),
        Ok(_) if method.is_void() => Ok(Completion::ReturnedVoid),
        Ok(Some(value)) => Ok(Completion::Returned(context.serialize(&value)?)),
        Ok(None) => Err(Fault::Internal(anyhow!("{method} returned no value"))),
    }
}

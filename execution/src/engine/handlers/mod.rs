use super::*;

/// Resolves the target of a call, falling back to its entry form.
fn resolve_target(
    code: &dyn CodeResolver,
    signature: &CodeSignature,
) -> Result<(Callable, bool), Fault> {
    resolver::resolve(code, signature).ok_or_else(|| Fault::UnmatchedTarget(signature.to_string()))
}

/// Splits what user code returned into its normal result, a checked exception
/// that the callee declares, or a failure.
fn classify<R>(
    callable: &Callable,
    result: Result<R, CodeError>,
) -> Result<Result<R, FailureCause>, Fault> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(CodeError::Raised(thrown)) if callable.throws_exceptions && thrown.checked => {
            Ok(Err(thrown.cause()))
        }
        Err(CodeError::Raised(thrown)) => Err(Fault::Thrown(thrown)),
        Err(CodeError::Fault(fault)) => Err(fault),
    }
}

/// Storage references among `values`.
fn references(values: &[StorageValue]) -> impl Iterator<Item = StorageReference> + '_ {
    values.iter().filter_map(StorageValue::as_reference).copied()
}

mod calls;
mod initial;
mod jar_store;

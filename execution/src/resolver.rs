use crate::{
    context::{ExecutionContext, Value},
    error::CodeError,
    loader::{ClassLoader, Obligation},
};
use hotmoka_types::{ClassType, CodeSignature, StorageType};

/// A constructor or method found in the loaded classes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Callable {
    pub signature: CodeSignature,
    /// Checked exceptions it raises end in an exception response rather than a
    /// failure.
    pub throws_exceptions: bool,
    /// It must not modify storage, apart from the payment of its caller.
    pub view: bool,
    /// It expects its calling contract as an extra trailing argument.
    pub from_contract: bool,
    /// White-listing obligations of each formal argument.
    pub obligations: Vec<Vec<Obligation>>,
    pub is_static: bool,
}

impl Callable {
    pub fn new(signature: CodeSignature) -> Self {
        let obligations = vec![Vec::new(); signature.formals().len()];
        Self {
            signature,
            throws_exceptions: false,
            view: false,
            from_contract: false,
            obligations,
            is_static: false,
        }
    }
}

/// Finds and runs code of the loaded classes.
pub trait CodeResolver: ClassLoader {
    fn resolve_constructor(&self, class: &ClassType, formals: &[StorageType]) -> Option<Callable>;
    fn resolve_method(
        &self,
        class: &ClassType,
        name: &str,
        formals: &[StorageType],
        returns: Option<&StorageType>,
    ) -> Option<Callable>;
    /// Runs `callable`. Constructors get the freshly allocated object as
    /// receiver and return nothing.
    fn invoke(
        &self,
        callable: &Callable,
        context: &mut ExecutionContext<'_>,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, CodeError>;
}

/// Resolves `signature`, first as written and then in its entry form, whose
/// formals end with the calling contract and a dummy.
///
/// The flag tells whether the entry form was picked.
pub(crate) fn resolve(code: &dyn CodeResolver, signature: &CodeSignature) -> Option<(Callable, bool)> {
    let find = |signature: &CodeSignature| match signature {
        CodeSignature::Constructor { class, formals } => code.resolve_constructor(class, formals),
        CodeSignature::Method {
            class,
            name,
            formals,
            returns,
        } => code.resolve_method(class, name, formals, returns.as_ref()),
    };
    if let Some(callable) = find(signature) {
        return Some((callable, false));
    }
    find(&signature.with_entry_formals()).map(|callable| (callable, true))
}

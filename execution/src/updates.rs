//! Extraction of the updates of a transaction.
//!
//! Starting from a set of root references, the heap is walked through the
//! references held in persistent fields. Objects that were never loaded
//! cannot have changed, so the walk stops at them.

use crate::{context::ExecutionContext, error::Fault};
use anyhow::anyhow;
use hotmoka_types::{StorageReference, StorageValue, Update};
use std::collections::BTreeSet;

impl ExecutionContext<'_> {
    /// Updates to the storage objects reachable from `roots`: class tags of
    /// new objects and every field that is new or differs from storage.
    pub fn extract_updates(
        &self,
        roots: impl IntoIterator<Item = StorageReference>,
    ) -> Result<BTreeSet<Update>, Fault> {
        let mut updates = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut worklist: Vec<StorageReference> = roots.into_iter().collect();

        while let Some(reference) = worklist.pop() {
            if !seen.insert(reference) {
                continue;
            }
            let Some(object) = self.loaded_object(&reference) else {
                continue;
            };
            if object.persisted.is_none() {
                let jar = self.code.jar_of(&object.class).ok_or_else(|| {
                    Fault::Internal(anyhow!("class {} is not loaded", object.class))
                })?;
                updates.insert(Update::class_tag(reference, object.class.clone(), jar));
            }
            for field in self.code.fields_of(&object.class) {
                let Some(value) = object.fields.get(&field) else {
                    continue;
                };
                let value = self.serialize(value)?;
                if let StorageValue::Reference(next) = &value {
                    if !seen.contains(next) {
                        worklist.push(*next);
                    }
                }
                let changed = match &object.persisted {
                    None => true,
                    Some(persisted) => persisted.get(&field) != Some(&value),
                };
                if changed {
                    updates.insert(Update::field(reference, field, value));
                }
            }
        }

        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::Value,
        gas::GasMeter,
        loader::{Jar, Toolchain},
        mocks::{MockClass, MockLoader, MockToolchain},
        store::Memory,
    };
    use hotmoka_types::{
        BigInt, ClassType, FieldSignature, GameteCreationRequest, GameteCreationResponse,
        GasCostModel, StorageType, TransactionReference, TransactionRequest, TransactionResponse,
    };

    fn jar() -> TransactionReference {
        TransactionReference::new([2; 32])
    }

    fn node() -> ClassType {
        ClassType::new("com.example.Node")
    }

    fn next() -> FieldSignature {
        FieldSignature::new(node(), "next", node())
    }

    fn holder() -> ClassType {
        ClassType::new("com.example.Holder")
    }

    fn loader() -> MockLoader {
        let toolchain = MockToolchain::new([
            MockClass::new(node(), ClassType::STORAGE).field("next", node()),
            MockClass::new(holder(), ClassType::STORAGE).field("held", ClassType::OBJECT),
            MockClass::new(ClassType::new("com.example.Scratch"), ClassType::OBJECT),
        ]);
        toolchain
            .load(&[Jar {
                reference: jar(),
                bytes: Vec::new(),
            }])
            .unwrap()
    }

    fn context<'a>(
        store: &'a Memory,
        loader: &'a MockLoader,
        transaction: u8,
    ) -> ExecutionContext<'a> {
        ExecutionContext::new(
            store,
            loader,
            GasCostModel::default(),
            TransactionReference::new([transaction; 32]),
            0,
            GasMeter::unlimited(),
        )
    }

    /// Commits `updates` as if a transaction produced them.
    fn persist(store: &mut Memory, updates: BTreeSet<Update>) {
        let request = TransactionRequest::GameteCreation(GameteCreationRequest {
            classpath: jar(),
            initial_amount: BigInt::from(0),
            public_key: String::new(),
        });
        let response = TransactionResponse::GameteCreation(GameteCreationResponse {
            updates: updates.into_iter().collect(),
            gamete: StorageReference::new(jar(), 0),
        });
        store.commit(request, response);
    }

    /// Two new nodes, the first pointing to the second.
    fn chain(context: &mut ExecutionContext<'_>) -> (StorageReference, StorageReference) {
        let first = context.new_object(&node()).unwrap();
        let second = context.new_object(&node()).unwrap();
        context.set_field(&first, &next(), second.clone()).unwrap();
        (
            *first.as_reference().unwrap(),
            *second.as_reference().unwrap(),
        )
    }

    #[test]
    fn new_objects_are_reported_with_all_their_fields() {
        let store = Memory::default();
        let loader = loader();
        let mut context = context(&store, &loader, 1);
        let (first, second) = chain(&mut context);

        let updates = context.extract_updates([first]).unwrap();
        assert_eq!(
            updates.into_iter().collect::<Vec<_>>(),
            vec![
                Update::class_tag(first, node(), jar()),
                Update::field(first, next(), second),
                Update::class_tag(second, node(), jar()),
                Update::field(second, next(), StorageValue::Null),
            ]
        );
    }

    #[test]
    fn stored_objects_report_only_changed_fields() {
        let mut store = Memory::default();
        let loader = loader();
        let (first, second, updates) = {
            let mut context = context(&store, &loader, 1);
            let (first, second) = chain(&mut context);
            let updates = context.extract_updates([first]).unwrap();
            (first, second, updates)
        };
        persist(&mut store, updates);

        let mut context = context(&store, &loader, 3);
        let first = context
            .deserialize(&StorageValue::Reference(first))
            .unwrap();
        let reference = *first.as_reference().unwrap();
        assert!(context.extract_updates([reference]).unwrap().is_empty());

        context.set_field(&first, &next(), Value::NULL).unwrap();
        let updates = context.extract_updates([reference, second]).unwrap();
        assert_eq!(
            updates.into_iter().collect::<Vec<_>>(),
            vec![Update::field(reference, next(), StorageValue::Null)]
        );
    }

    #[test]
    fn extraction_is_idempotent() {
        let store = Memory::default();
        let loader = loader();
        let mut context = context(&store, &loader, 1);
        let (first, second) = chain(&mut context);
        assert_eq!(
            context.extract_updates([first]).unwrap(),
            context.extract_updates([second, first, first]).unwrap()
        );
    }

    #[test]
    fn transient_objects_cannot_be_reached_from_storage() {
        let store = Memory::default();
        let loader = loader();
        let mut context = context(&store, &loader, 1);
        let object = context.new_object(&holder()).unwrap();
        let scratch = context
            .new_object(&ClassType::new("com.example.Scratch"))
            .unwrap();
        let held = FieldSignature::new(holder(), "held", ClassType::OBJECT);
        context.set_field(&object, &held, scratch).unwrap();

        let err = context
            .extract_updates([*object.as_reference().unwrap()])
            .expect_err("scratch objects are not storable");
        assert!(matches!(err, Fault::NotStorable(class) if class.name() == "com.example.Scratch"));
    }
}

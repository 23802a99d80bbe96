use crate::{
    context::{ExecutionContext, Value},
    error::Fault,
};
use hotmoka_types::StorageValue;

impl ExecutionContext<'_> {
    /// Turns a runtime value back into a value that can be kept in storage.
    pub fn serialize(&self, value: &Value) -> Result<StorageValue, Fault> {
        match value {
            Value::Storable(value) => Ok(value.clone()),
            Value::Transient(id) => Err(Fault::NotStorable(self.object(*id)?.class.clone())),
        }
    }
}

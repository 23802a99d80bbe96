use crate::{
    context::{ExecutionContext, Value},
    error::Fault,
};
use hotmoka_types::{BasicType, ClassType, StorageType, StorageValue};

impl ExecutionContext<'_> {
    /// Turns a value of a request into a runtime value. References must name
    /// objects in storage.
    pub fn deserialize(&mut self, value: &StorageValue) -> Result<Value, Fault> {
        if let StorageValue::Reference(reference) = value {
            self.load(reference)?;
        }
        Ok(Value::Storable(value.clone()))
    }

    /// Deserializes the actual arguments of a call, checking them against its formals.
    pub(crate) fn deserialize_actuals(
        &mut self,
        formals: &[StorageType],
        actuals: &[StorageValue],
    ) -> Result<Vec<Value>, Fault> {
        if formals.len() != actuals.len() {
            return Err(Fault::Deserialization(format!(
                "{} actual arguments for {} formal arguments",
                actuals.len(),
                formals.len()
            )));
        }
        let mut values = Vec::with_capacity(actuals.len());
        for (formal, actual) in formals.iter().zip(actuals) {
            let value = self.deserialize(actual)?;
            self.check_actual(formal, &value)?;
            values.push(value);
        }
        Ok(values)
    }

    fn check_actual(&mut self, formal: &StorageType, actual: &Value) -> Result<(), Fault> {
        if self.conforms(formal, actual)? {
            Ok(())
        } else {
            Err(Fault::Deserialization(format!(
                "{actual:?} is not a value of type {formal}"
            )))
        }
    }

    /// Tells whether `value` can be held by a variable of type `formal`.
    pub(crate) fn conforms(&mut self, formal: &StorageType, value: &Value) -> Result<bool, Fault> {
        Ok(match (formal, value) {
            (StorageType::Basic(basic), Value::Storable(value)) => matches!(
                (basic, value),
                (BasicType::Boolean, StorageValue::Boolean(_))
                    | (BasicType::Byte, StorageValue::Byte(_))
                    | (BasicType::Char, StorageValue::Char(_))
                    | (BasicType::Short, StorageValue::Short(_))
                    | (BasicType::Int, StorageValue::Int(_))
                    | (BasicType::Long, StorageValue::Long(_))
                    | (BasicType::Float, StorageValue::Float(_))
                    | (BasicType::Double, StorageValue::Double(_))
            ),
            (StorageType::Basic(_), Value::Transient(_)) => false,
            (StorageType::Class(_), Value::Storable(StorageValue::Null)) => true,
            (StorageType::Class(class), value) => match self.class_of(value)? {
                Some(actual) => *class == ClassType::OBJECT || self.code.is_subtype(&actual, class),
                None => false,
            },
        })
    }
}

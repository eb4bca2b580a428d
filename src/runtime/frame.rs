use crate::language::binder::{Slot, SlotTable};
use crate::runtime::value::Value;

/// Activation record of one in-flight invocation: flat slot storage laid
/// out by the function's [`SlotTable`], plus the raw argument list the
/// caller supplied.
#[derive(Debug)]
pub struct Frame {
    locals: Vec<Value>,
    arguments: Vec<Value>,
}

impl Frame {
    pub fn new(slots: &SlotTable, arguments: Vec<Value>) -> Self {
        Self {
            locals: vec![Value::Null; slots.len()],
            arguments,
        }
    }

    pub fn get(&self, slot: &Slot) -> Value {
        self.locals
            .get(slot.index())
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set(&mut self, slot: &Slot, value: Value) {
        if let Some(cell) = self.locals.get_mut(slot.index()) {
            *cell = value;
        }
    }

    /// Missing arguments read as null; surplus arguments are simply never
    /// read.
    pub fn argument(&self, index: usize) -> Value {
        self.arguments.get(index).cloned().unwrap_or(Value::Null)
    }

    pub fn set_argument(&mut self, index: usize, value: Value) {
        if index >= self.arguments.len() {
            self.arguments.resize(index + 1, Value::Null);
        }
        self.arguments[index] = value;
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }
}

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Long(i64),
    Boolean(bool),
    Str(Rc<str>),
    /// Reference to a registered function, resolved through the registry
    /// each time it is invoked so later redefinitions are honored.
    Function(Rc<str>),
    Object(ObjectValue),
}

impl Value {
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Value::Str(text.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Long(_) => "Long",
            Value::Boolean(_) => "Boolean",
            Value::Str(_) => "String",
            Value::Function(_) => "Function",
            Value::Object(_) => "Object",
        }
    }

    /// Structural equality; values of different types are unequal rather
    /// than an error.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(&a.members, &b.members),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Function(name) => write!(f, "{name}"),
            Value::Object(object) => {
                write!(f, "{{")?;
                let mut first = true;
                for (name, value) in object.members.borrow().iter() {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ObjectValue {
    pub members: Rc<RefCell<BTreeMap<String, Value>>>,
}

impl ObjectValue {
    pub fn new() -> Self {
        Self {
            members: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.members.borrow().get(name).cloned()
    }

    pub fn set(&self, name: String, value: Value) {
        self.members.borrow_mut().insert(name, value);
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }
}

impl Default for ObjectValue {
    fn default() -> Self {
        Self::new()
    }
}

//! The runtime value type shared by scopes, activations and the arguments
//! object.
//!
//! The built-in `Function`/`Object`/`Reflect` prototypes are out of scope for
//! this core (see spec §1); `JsObject` here is deliberately the minimal
//! ordered-property container the scope/activation/arguments layers need to
//! exercise their own semantics, not a full object model.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A property key: either a string name or a non-negative integer index,
/// per spec §3.1 ("A mapping from *name* ... or *index* ... to a *slot*").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name(Rc<str>),
    Index(u32),
}

impl PropertyKey {
    pub fn name(s: impl Into<Rc<str>>) -> Self {
        PropertyKey::Name(s.into())
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(n) => write!(f, "{n}"),
            PropertyKey::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::Name(Rc::from(s))
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::Name(Rc::from(s.as_str()))
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        PropertyKey::Index(i)
    }
}

/// A runtime JS value. Object identity is a cheap `Rc` clone, matching the
/// reference semantics real engines give objects.
#[derive(Debug, Clone)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Object(JsObject),
}

impl JsValue {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        JsValue::String(s.into())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    /// ECMAScript ToBoolean, restricted to the value shapes this core
    /// actually constructs.
    pub fn truthy(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Object(_) => true,
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

/// A minimal ordered-property object, used for `OBJECTLIT` values and as the
/// backing store for the arguments object's own (non-mapped) slots.
#[derive(Debug, Clone)]
pub struct JsObject(Rc<RefCell<IndexMap<PropertyKey, JsValue>>>);

impl JsObject {
    pub fn new() -> Self {
        JsObject(Rc::new(RefCell::new(IndexMap::new())))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (PropertyKey, JsValue)>) -> Self {
        let obj = JsObject::new();
        for (k, v) in entries {
            obj.set(k, v);
        }
        obj
    }

    pub fn get(&self, key: &PropertyKey) -> Option<JsValue> {
        self.0.borrow().get(key).cloned()
    }

    pub fn set(&self, key: PropertyKey, value: JsValue) {
        self.0.borrow_mut().insert(key, value);
    }

    pub fn delete(&self, key: &PropertyKey) -> bool {
        self.0.borrow_mut().shift_remove(key).is_some()
    }

    pub fn has(&self, key: &PropertyKey) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn keys_in_order(&self) -> Vec<PropertyKey> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}

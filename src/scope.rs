//! The scope object (C1): an ordered property container with per-slot
//! attribute flags, a prototype link and a parent-scope link used for name
//! resolution.
//!
//! Modeled the way the register/slot tables in this codebase's scope-builder
//! lineage are modeled (ordered maps owned behind a mutable cell, parent
//! links walked for resolution), but storing real runtime values instead of
//! register indices, since this layer is the runtime counterpart rather than
//! a compile-time allocator.

use crate::bits::bitflags_lite;
use crate::diagnostics::{EngineError, ErrorKind};
use crate::value::{JsValue, PropertyKey};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

bitflags_lite! {
    /// Slot attribute bitset, per spec §3.1.
    pub struct SlotAttributes: u8 {
        const ENUMERABLE          = 0b0000_0001;
        const WRITABLE            = 0b0000_0010;
        const CONFIGURABLE        = 0b0000_0100;
        const CONST_BINDING       = 0b0000_1000;
        const UNINITIALIZED_CONST = 0b0001_0000;
    }
}

impl SlotAttributes {
    /// Default attributes for a freshly declared `let` slot (spec §3.1).
    pub fn let_default() -> Self {
        SlotAttributes::WRITABLE | SlotAttributes::CONFIGURABLE
    }

    /// `PERMANENT`: not configurable (cannot be deleted), used throughout
    /// activation construction (spec §4.2).
    pub fn permanent() -> Self {
        SlotAttributes::WRITABLE | SlotAttributes::ENUMERABLE
    }

    pub fn readonly(self) -> bool {
        !self.contains(SlotAttributes::WRITABLE)
    }
}

/// A slot's value, distinguishing the TDZ sentinel from any ordinary value
/// including `undefined` (spec §3.1, §9 "TDZ value").
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Tdz,
    Value(JsValue),
}

impl SlotValue {
    pub fn is_tdz(&self) -> bool {
        matches!(self, SlotValue::Tdz)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: SlotValue,
    attributes: SlotAttributes,
    /// Whether this slot has transitioned out of `UNINITIALIZED_CONST`
    /// (spec §3.2: "may transition exactly once to a bound value").
    const_bound: bool,
}

/// Outcome of a `get`, distinguishing "not found" from a TDZ read, which the
/// caller must turn into a `TDZ_READ` error rather than treating as absent.
#[derive(Debug, Clone, PartialEq)]
pub enum GetResult {
    Found(JsValue),
    Tdz,
    NotFound,
}

#[derive(Debug)]
struct ScopeInner {
    slots: IndexMap<PropertyKey, Slot>,
    parent: Option<Scope>,
    prototype: Option<Scope>,
}

/// A scope object (C1). Cheaply cloneable; clones share the same underlying
/// storage, matching the reference semantics of a JS environment record.
#[derive(Debug, Clone)]
pub struct Scope(Rc<RefCell<ScopeInner>>);

impl Scope {
    pub fn new(parent: Option<Scope>) -> Self {
        Scope(Rc::new(RefCell::new(ScopeInner {
            slots: IndexMap::new(),
            parent,
            prototype: None,
        })))
    }

    pub fn with_prototype(parent: Option<Scope>, prototype: Option<Scope>) -> Self {
        Scope(Rc::new(RefCell::new(ScopeInner {
            slots: IndexMap::new(),
            parent,
            prototype,
        })))
    }

    pub fn parent(&self) -> Option<Scope> {
        self.0.borrow().parent.clone()
    }

    pub fn prototype(&self) -> Option<Scope> {
        self.0.borrow().prototype.clone()
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// `has(name|index) -> bool`. Only consults this scope's own slots, not
    /// the prototype or parent chain — callers walk the chain explicitly via
    /// `get_defining_scope`.
    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.0.borrow().slots.contains_key(key)
    }

    /// `defineSlot(name, value, attributes)`. Fails if a non-configurable
    /// slot already occupies the key (spec §4.1).
    pub fn define_slot(
        &self,
        key: PropertyKey,
        value: JsValue,
        attributes: SlotAttributes,
    ) -> Result<(), String> {
        self.define_slot_raw(key, SlotValue::Value(value), attributes)
    }

    /// Like `define_slot`, but allows seeding the TDZ sentinel directly
    /// (used by activation construction and per-iteration scope setup).
    pub fn define_slot_raw(
        &self,
        key: PropertyKey,
        value: SlotValue,
        attributes: SlotAttributes,
    ) -> Result<(), String> {
        let mut inner = self.0.borrow_mut();
        if let Some(existing) = inner.slots.get(&key) {
            if !existing.attributes.contains(SlotAttributes::CONFIGURABLE) {
                return Err(format!(
                    "cannot redefine non-configurable slot '{key}'"
                ));
            }
        }
        let const_bound = !attributes.contains(SlotAttributes::UNINITIALIZED_CONST);
        inner.slots.insert(
            key,
            Slot {
                value,
                attributes,
                const_bound,
            },
        );
        Ok(())
    }

    /// `get(name|index) -> value | TDZ | NOT_FOUND`, looking only at this
    /// scope's own slots.
    pub fn get_own(&self, key: &PropertyKey) -> GetResult {
        match self.0.borrow().slots.get(key) {
            None => GetResult::NotFound,
            Some(slot) => match &slot.value {
                SlotValue::Tdz => GetResult::Tdz,
                SlotValue::Value(v) => GetResult::Found(v.clone()),
            },
        }
    }

    /// `put(name|index, value)`, applied to this scope's own slot.
    ///
    /// `is_init` marks the declaration's own initializing opcode
    /// (`SETLETINIT`/`SETCONST`), the only write permitted to clear TDZ or to
    /// bind an `UNINITIALIZED_CONST` slot (spec §3.2, §4.1).
    pub fn put_own(
        &self,
        key: &PropertyKey,
        value: JsValue,
        is_init: bool,
        strict: bool,
    ) -> Result<(), EngineError> {
        let mut inner = self.0.borrow_mut();
        let Some(slot) = inner.slots.get_mut(key) else {
            return Err(EngineError::new(
                ErrorKind::TdzWrite,
                format!("no such binding '{key}'"),
            ));
        };

        if slot.value.is_tdz() {
            if !is_init {
                return Err(EngineError::new(
                    ErrorKind::TdzWrite,
                    format!("cannot write '{key}' before initialization"),
                ));
            }
            slot.value = SlotValue::Value(value);
            if slot.attributes.contains(SlotAttributes::UNINITIALIZED_CONST) {
                slot.const_bound = true;
                slot.attributes.remove(SlotAttributes::WRITABLE);
            }
            return Ok(());
        }

        if slot.attributes.contains(SlotAttributes::UNINITIALIZED_CONST) && !slot.const_bound {
            // First store into an uninitialized-const slot that was seeded
            // with a plain value rather than TDZ (e.g. the NFE binding).
            slot.value = SlotValue::Value(value);
            slot.const_bound = true;
            slot.attributes.remove(SlotAttributes::WRITABLE);
            return Ok(());
        }

        if slot.attributes.readonly() {
            if slot.attributes.contains(SlotAttributes::CONST_BINDING) {
                return Err(EngineError::new(
                    ErrorKind::AssignConst,
                    format!("assignment to constant binding '{key}'"),
                ));
            }
            if strict {
                return Err(EngineError::new(
                    ErrorKind::AssignConst,
                    format!("assignment to constant binding '{key}' in strict mode"),
                ));
            }
            return Ok(()); // silently ignored, non-strict
        }

        slot.value = SlotValue::Value(value);
        Ok(())
    }

    /// `delete(name|index) -> bool`. Refused for non-configurable slots.
    pub fn delete_own(&self, key: &PropertyKey) -> bool {
        let mut inner = self.0.borrow_mut();
        match inner.slots.get(key) {
            None => true, // deleting an absent property succeeds, per OrdinaryDelete
            Some(slot) => {
                if !slot.attributes.contains(SlotAttributes::CONFIGURABLE) {
                    false
                } else {
                    inner.slots.shift_remove(key);
                    true
                }
            }
        }
    }

    pub fn get_attributes(&self, key: &PropertyKey) -> Option<SlotAttributes> {
        self.0.borrow().slots.get(key).map(|s| s.attributes)
    }

    pub fn set_attributes(&self, key: &PropertyKey, attributes: SlotAttributes) -> bool {
        let mut inner = self.0.borrow_mut();
        match inner.slots.get_mut(key) {
            Some(slot) => {
                slot.attributes = attributes;
                true
            }
            None => false,
        }
    }

    /// `getDefiningScope(name) -> scope|none`, walking the parent chain.
    pub fn get_defining_scope(&self, key: &PropertyKey) -> Option<Scope> {
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            if scope.has_own(key) {
                return Some(scope);
            }
            current = scope.parent();
        }
        None
    }

    /// Ordered keys currently defined directly on this scope.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.0.borrow().slots.keys().cloned().collect()
    }
}

//! Activation records (C2): the per-call scope built from a function
//! descriptor, an argument vector and the function's lexical enclosing
//! scope, plus the reified `arguments` object.

use crate::diagnostics::{EngineError, ErrorKind};
use crate::scope::{Scope, SlotAttributes, SlotValue};
use crate::value::{JsObject, JsValue, PropertyKey};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone)]
pub struct LocalBinding {
    pub name: Rc<str>,
    pub kind: LocalKind,
    /// Compiler-generated temporaries (names beginning with a reserved
    /// sigil) start as `undefined` rather than `TDZ` even when `let`-kinded
    /// (spec §4.2 step 6).
    pub is_compiler_temp: bool,
}

impl LocalBinding {
    pub fn var(name: impl Into<Rc<str>>) -> Self {
        LocalBinding {
            name: name.into(),
            kind: LocalKind::Var,
            is_compiler_temp: false,
        }
    }

    pub fn let_binding(name: impl Into<Rc<str>>) -> Self {
        LocalBinding {
            name: name.into(),
            kind: LocalKind::Let,
            is_compiler_temp: false,
        }
    }

    pub fn const_binding(name: impl Into<Rc<str>>) -> Self {
        LocalBinding {
            name: name.into(),
            kind: LocalKind::Const,
            is_compiler_temp: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionFlags {
    pub strict: bool,
    pub is_arrow: bool,
    pub has_rest: bool,
    pub requires_arguments: bool,
    pub has_default_params: bool,
    pub has_destructured_params: bool,
}

impl FunctionFlags {
    /// Per spec §4.2.1: mapped iff non-strict, no default params, no rest,
    /// no destructured params.
    pub fn wants_mapped_arguments(&self) -> bool {
        !self.strict && !self.has_rest && !self.has_default_params && !self.has_destructured_params
    }
}

/// Static description of a function, independent of any particular call.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub param_names: Vec<Rc<str>>,
    pub rest_param_name: Option<Rc<str>>,
    /// Locals declared in `[paramCount, paramAndVarCount)`, i.e. every
    /// `var`/`let`/`const`/hoisted-function name other than the parameters.
    pub locals: Vec<LocalBinding>,
    pub nfe_name: Option<Rc<str>>,
    pub flags: FunctionFlags,
}

impl FunctionDescriptor {
    pub fn param_count(&self) -> usize {
        self.param_names.len()
    }

    pub fn param_name(&self, i: usize) -> &Rc<str> {
        &self.param_names[i]
    }
}

/// Non-owning, nullable link to the calling activation (spec §4.2 step 7,
/// and the "Caller-activation back-reference" redesign note: the caller may
/// already have returned, so this must not keep it alive).
#[derive(Debug, Clone, Default)]
pub struct CallerLink(Rc<RefCell<Option<Weak<ActivationInner>>>>);

impl CallerLink {
    pub fn new() -> Self {
        CallerLink::default()
    }

    pub fn set(&self, caller: &Activation) {
        *self.0.borrow_mut() = Some(Rc::downgrade(&caller.0));
    }

    pub fn clear(&self) {
        *self.0.borrow_mut() = None;
    }

    /// Resolves the caller, if it's still alive.
    pub fn get(&self) -> Option<Activation> {
        self.0
            .borrow()
            .as_ref()
            .and_then(|weak| weak.upgrade())
            .map(Activation)
    }
}

#[derive(Debug)]
pub struct ActivationInner {
    pub scope: Scope,
    pub descriptor: Rc<FunctionDescriptor>,
    pub strict: bool,
    pub caller: CallerLink,
    arguments: RefCell<Option<ArgumentsObject>>,
}

/// A per-call activation record (C2): a scope that additionally owns the
/// function descriptor, the caller link and the (lazily materialized)
/// arguments object.
#[derive(Debug, Clone)]
pub struct Activation(Rc<ActivationInner>);

impl Activation {
    /// Runs the construction algorithm of spec §4.2 steps 1-7.
    pub fn construct(
        descriptor: Rc<FunctionDescriptor>,
        args: Vec<JsValue>,
        enclosing: Scope,
    ) -> Result<Activation, EngineError> {
        let strict = descriptor.flags.strict;
        let scope = Scope::new(Some(enclosing));

        // Step 2: parameters.
        for (i, name) in descriptor.param_names.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(JsValue::Undefined);
            scope
                .define_slot(PropertyKey::name(name.clone()), value, SlotAttributes::permanent())
                .map_err(|msg| EngineError::new(ErrorKind::NotExtensible, msg))?;
        }

        // Step 3: rest parameter.
        if descriptor.flags.has_rest {
            if let Some(rest_name) = &descriptor.rest_param_name {
                let rest_values: Vec<JsValue> = args
                    .iter()
                    .skip(descriptor.param_count())
                    .cloned()
                    .collect();
                let rest_array = JsObject::from_entries(
                    rest_values
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| (PropertyKey::Index(i as u32), v)),
                );
                scope
                    .define_slot(
                        PropertyKey::name(rest_name.clone()),
                        JsValue::Object(rest_array),
                        SlotAttributes::permanent(),
                    )
                    .map_err(|msg| EngineError::new(ErrorKind::NotExtensible, msg))?;
            }
        }

        // Step 4: arguments object, unless an arrow function or a parameter
        // already shadows the name "arguments".
        let shadows_arguments = descriptor
            .param_names
            .iter()
            .any(|n| n.as_ref() == "arguments");
        let arguments = if descriptor.flags.requires_arguments
            && !descriptor.flags.is_arrow
            && !shadows_arguments
        {
            let mode = if descriptor.flags.wants_mapped_arguments() {
                ArgumentsMode::Mapped
            } else {
                ArgumentsMode::Unmapped
            };
            let obj = ArgumentsObject::new(mode, &args, descriptor.clone(), scope.clone());
            scope
                .define_slot(
                    PropertyKey::name("arguments"),
                    JsValue::Object(obj.backing.clone()),
                    SlotAttributes::permanent(),
                )
                .map_err(|msg| EngineError::new(ErrorKind::NotExtensible, msg))?;
            Some(obj)
        } else {
            None
        };

        // Step 5: NFE name already lives on descriptor.nfe_name.

        // Step 6: locals.
        for local in &descriptor.locals {
            let key = PropertyKey::name(local.name.clone());
            if scope.has_own(&key) {
                continue; // shadowed by a parameter
            }

            let is_nfe_name = descriptor
                .nfe_name
                .as_deref()
                .is_some_and(|n| n == local.name.as_ref());

            match local.kind {
                LocalKind::Const => {
                    let attrs = SlotAttributes::permanent()
                        | SlotAttributes::CONST_BINDING
                        | SlotAttributes::UNINITIALIZED_CONST;
                    let mut attrs = attrs;
                    attrs.remove(SlotAttributes::WRITABLE);
                    scope
                        .define_slot_raw(key, SlotValue::Tdz, attrs)
                        .map_err(|msg| EngineError::new(ErrorKind::NotExtensible, msg))?;
                }
                LocalKind::Let if is_nfe_name => {
                    // Name collision between a `let` local and the NFE name:
                    // the NFE binding rule wins (spec step 6, "else if").
                    bind_nfe_slot(&scope, key)
                        .map_err(|msg| EngineError::new(ErrorKind::NotExtensible, msg))?;
                }
                LocalKind::Let => {
                    let value = if local.is_compiler_temp {
                        SlotValue::Value(JsValue::Undefined)
                    } else {
                        SlotValue::Tdz
                    };
                    scope
                        .define_slot_raw(key, value, SlotAttributes::permanent())
                        .map_err(|msg| EngineError::new(ErrorKind::NotExtensible, msg))?;
                }
                LocalKind::Var if is_nfe_name => {
                    bind_nfe_slot(&scope, key)
                        .map_err(|msg| EngineError::new(ErrorKind::NotExtensible, msg))?;
                }
                LocalKind::Var => {
                    scope
                        .define_slot(key, JsValue::Undefined, SlotAttributes::permanent())
                        .map_err(|msg| EngineError::new(ErrorKind::NotExtensible, msg))?;
                }
            }
        }

        // If the NFE name never appeared among params/locals, bind it
        // directly (an ordinary named function expression with no
        // colliding local declaration).
        if let Some(nfe_name) = &descriptor.nfe_name {
            let key = PropertyKey::name(nfe_name.clone());
            if !scope.has_own(&key) {
                bind_nfe_slot(&scope, key)
                    .map_err(|msg| EngineError::new(ErrorKind::NotExtensible, msg))?;
            }
        }

        Ok(Activation(Rc::new(ActivationInner {
            scope,
            descriptor,
            strict,
            caller: CallerLink::new(),
            arguments: RefCell::new(arguments),
        })))
    }

    pub fn scope(&self) -> &Scope {
        &self.0.scope
    }

    pub fn descriptor(&self) -> &Rc<FunctionDescriptor> {
        &self.0.descriptor
    }

    pub fn strict(&self) -> bool {
        self.0.strict
    }

    /// Step 7: the interpreter sets this on entry, clears it on exit.
    pub fn set_caller(&self, caller: &Activation) {
        self.0.caller.set(caller);
    }

    pub fn clear_caller(&self) {
        self.0.caller.clear();
    }

    pub fn caller(&self) -> Option<Activation> {
        self.0.caller.get()
    }

    pub fn arguments(&self) -> Option<ArgumentsObject> {
        self.0.arguments.borrow().clone()
    }

    fn ptr_eq(&self, other: &Activation) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Defines the NFE binding per spec §4.2 step 6 / the "NFE binding"
/// redesign note: `UNINITIALIZED_CONST | READONLY` without `CONST_BINDING`,
/// seeded with `undefined` (not TDZ — it's immediately "initialized" to the
/// function value by the runtime's single allowed store).
fn bind_nfe_slot(scope: &Scope, key: PropertyKey) -> Result<(), String> {
    let mut attrs = SlotAttributes::permanent() | SlotAttributes::UNINITIALIZED_CONST;
    attrs.remove(SlotAttributes::WRITABLE);
    scope.define_slot_raw(key, SlotValue::Value(JsValue::Undefined), attrs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentsMode {
    Mapped,
    Unmapped,
}

#[derive(Debug)]
struct ArgumentsInner {
    mode: ArgumentsMode,
    descriptor: Rc<FunctionDescriptor>,
    activation_scope: Scope,
    length: usize,
    external_view_frozen: RefCell<bool>,
    /// Indices whose parameter mapping has been severed (spec §4.2.1: a
    /// successful `delete`, or a `defineOwnProperty` that makes the slot an
    /// accessor or explicitly `writable: false`). Once severed, `get`/`set`
    /// on that index go straight to `backing` even if it's still within
    /// `descriptor.param_count()`.
    severed_mappings: RefCell<HashSet<usize>>,
}

/// The reified `arguments` object (spec §4.2.1).
#[derive(Debug, Clone)]
pub struct ArgumentsObject {
    inner: Rc<ArgumentsInner>,
    backing: JsObject,
}

impl ArgumentsObject {
    fn new(
        mode: ArgumentsMode,
        args: &[JsValue],
        descriptor: Rc<FunctionDescriptor>,
        activation_scope: Scope,
    ) -> Self {
        let backing = JsObject::new();
        for (i, value) in args.iter().enumerate() {
            backing.set(PropertyKey::Index(i as u32), value.clone());
        }
        ArgumentsObject {
            inner: Rc::new(ArgumentsInner {
                mode,
                descriptor,
                activation_scope,
                length: args.len(),
                external_view_frozen: RefCell::new(false),
                severed_mappings: RefCell::new(HashSet::new()),
            }),
            backing,
        }
    }

    pub fn mode(&self) -> ArgumentsMode {
        self.inner.mode
    }

    pub fn length(&self) -> usize {
        self.inner.length
    }

    /// Returns the parameter name mapped to index `i`, if mapped arguments
    /// are in effect and that index isn't shadowed by a later same-named
    /// parameter (spec §4.2.1).
    fn mapped_param_name(&self, index: usize) -> Option<&Rc<str>> {
        if self.inner.mode != ArgumentsMode::Mapped {
            return None;
        }
        if index >= self.inner.descriptor.param_count() {
            return None;
        }
        if self.inner.severed_mappings.borrow().contains(&index) {
            return None;
        }
        let name = self.inner.descriptor.param_name(index);
        let shadowed_later = self.inner.descriptor.param_names[index + 1..]
            .iter()
            .any(|later| later == name);
        if shadowed_later {
            None
        } else {
            Some(name)
        }
    }

    /// `arg[i]` read, per spec §4.2.1.
    pub fn get(&self, index: usize) -> Option<JsValue> {
        if let Some(name) = self.mapped_param_name(index) {
            if let crate::scope::GetResult::Found(v) =
                self.inner.activation_scope.get_own(&PropertyKey::name(name.clone()))
            {
                return Some(v);
            }
        }
        self.backing.get(&PropertyKey::Index(index as u32))
    }

    /// `arg[i] = value`, per spec §4.2.1. No-op once `freeze_external_view`
    /// has latched.
    pub fn set(&self, index: usize, value: JsValue) {
        if *self.inner.external_view_frozen.borrow() {
            return;
        }
        if let Some(name) = self.mapped_param_name(index) {
            let _ = self.inner.activation_scope.put_own(
                &PropertyKey::name(name.clone()),
                value.clone(),
                false,
                false,
            );
        }
        self.backing.set(PropertyKey::Index(index as u32), value);
    }

    /// `delete arguments[i]`: `OrdinaryDelete` first, mapping removed only
    /// if that succeeds.
    pub fn delete(&self, index: usize) -> bool {
        if *self.inner.external_view_frozen.borrow() {
            return false;
        }
        let deleted = self.backing.delete(&PropertyKey::Index(index as u32));
        if deleted {
            self.inner.severed_mappings.borrow_mut().insert(index);
        }
        deleted
    }

    /// `Object.defineProperty(arguments, i, desc)`, per spec §4.2.1: runs
    /// `OrdinaryDefineOwnProperty` against `backing` first. If the mapping
    /// was still live, its current value is captured into `backing` before
    /// the define so the slot doesn't silently lose the parameter's value,
    /// then the mapping is severed if `desc` makes the slot an accessor or
    /// explicitly sets `writable: false`.
    pub fn define_own_property(
        &self,
        index: usize,
        value: Option<JsValue>,
        writable: Option<bool>,
        is_accessor: bool,
    ) {
        if *self.inner.external_view_frozen.borrow() {
            return;
        }
        let still_mapped = self.mapped_param_name(index).is_some();
        if still_mapped {
            if let Some(current) = self.get(index) {
                self.backing.set(PropertyKey::Index(index as u32), current);
            }
        }
        if let Some(value) = value {
            self.backing.set(PropertyKey::Index(index as u32), value);
        }
        if still_mapped && (is_accessor || writable == Some(false)) {
            self.inner.severed_mappings.borrow_mut().insert(index);
        }
    }

    /// `callee`/`caller` poison per spec §4.2.1 (unmapped case). Mapped
    /// arguments instead expose the function value directly; since this
    /// core has no function-object type, the mapped branch is represented
    /// by the absence of an error rather than a concrete callee value.
    pub fn callee(&self) -> Result<(), EngineError> {
        match self.inner.mode {
            ArgumentsMode::Unmapped => Err(EngineError::new(
                ErrorKind::StrictCaller,
                "'callee' is restricted in strict-mode/unmapped arguments",
            )),
            ArgumentsMode::Mapped => Ok(()),
        }
    }

    pub fn caller(&self) -> Result<(), EngineError> {
        match self.inner.mode {
            ArgumentsMode::Unmapped => Err(EngineError::new(
                ErrorKind::StrictCaller,
                "'caller' is restricted in strict-mode/unmapped arguments",
            )),
            ArgumentsMode::Mapped => Ok(()),
        }
    }

    /// Latches the read-only external view (spec §2.2): all further
    /// mutating operations silently no-op. Irreversible.
    pub fn freeze_external_view(&self) {
        *self.inner.external_view_frozen.borrow_mut() = true;
    }

    pub fn is_external_view_frozen(&self) -> bool {
        *self.inner.external_view_frozen.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(
        param_names: &[&str],
        locals: Vec<LocalBinding>,
        nfe_name: Option<&str>,
        flags: FunctionFlags,
    ) -> Rc<FunctionDescriptor> {
        Rc::new(FunctionDescriptor {
            param_names: param_names.iter().map(|s| Rc::from(*s)).collect(),
            rest_param_name: None,
            locals,
            nfe_name: nfe_name.map(Rc::from),
            flags,
        })
    }

    #[test]
    fn params_bind_to_arguments_and_back_when_mapped() {
        let d = descriptor(
            &["a", "b"],
            vec![],
            None,
            FunctionFlags {
                requires_arguments: true,
                ..Default::default()
            },
        );
        let global = Scope::new(None);
        let act = Activation::construct(d, vec![JsValue::Number(1.0), JsValue::Number(2.0)], global)
            .unwrap();
        let args = act.arguments().unwrap();
        assert_eq!(args.mode(), ArgumentsMode::Mapped);

        args.set(0, JsValue::Number(9.0));
        assert_eq!(
            act.scope().get_own(&PropertyKey::name("a")),
            crate::scope::GetResult::Found(JsValue::Number(9.0))
        );
    }

    #[test]
    fn strict_function_gets_unmapped_arguments() {
        let d = descriptor(
            &["a"],
            vec![],
            None,
            FunctionFlags {
                strict: true,
                requires_arguments: true,
                ..Default::default()
            },
        );
        let global = Scope::new(None);
        let act = Activation::construct(d, vec![JsValue::Number(4.0)], global).unwrap();
        let args = act.arguments().unwrap();
        assert_eq!(args.mode(), ArgumentsMode::Unmapped);

        args.set(0, JsValue::Number(9.0));
        assert_eq!(
            act.scope().get_own(&PropertyKey::name("a")),
            crate::scope::GetResult::Found(JsValue::Number(4.0))
        );
        assert!(args.callee().is_err());
    }

    #[test]
    fn deleting_a_mapped_index_severs_it_from_the_named_parameter() {
        let d = descriptor(
            &["a", "b"],
            vec![],
            None,
            FunctionFlags {
                requires_arguments: true,
                ..Default::default()
            },
        );
        let global = Scope::new(None);
        let act = Activation::construct(d, vec![JsValue::Number(1.0), JsValue::Number(2.0)], global)
            .unwrap();
        let args = act.arguments().unwrap();

        assert!(args.delete(0));
        act.scope()
            .put_own(&PropertyKey::name("a"), JsValue::Number(99.0), false, false)
            .unwrap();
        assert_eq!(args.get(0), None);

        args.set(1, JsValue::Number(7.0));
        assert_eq!(
            act.scope().get_own(&PropertyKey::name("b")),
            crate::scope::GetResult::Found(JsValue::Number(7.0))
        );
    }

    #[test]
    fn defining_a_non_writable_mapped_index_severs_it_and_keeps_its_value() {
        let d = descriptor(
            &["a"],
            vec![],
            None,
            FunctionFlags {
                requires_arguments: true,
                ..Default::default()
            },
        );
        let global = Scope::new(None);
        let act = Activation::construct(d, vec![JsValue::Number(1.0)], global).unwrap();
        let args = act.arguments().unwrap();

        act.scope()
            .put_own(&PropertyKey::name("a"), JsValue::Number(5.0), false, false)
            .unwrap();
        args.define_own_property(0, None, Some(false), false);

        act.scope()
            .put_own(&PropertyKey::name("a"), JsValue::Number(100.0), false, false)
            .unwrap();
        assert_eq!(args.get(0), Some(JsValue::Number(5.0)));
    }

    #[test]
    fn const_local_starts_in_tdz() {
        let d = descriptor(
            &[],
            vec![LocalBinding::const_binding("K")],
            None,
            FunctionFlags::default(),
        );
        let global = Scope::new(None);
        let act = Activation::construct(d, vec![], global).unwrap();
        assert_eq!(
            act.scope().get_own(&PropertyKey::name("K")),
            crate::scope::GetResult::Tdz
        );
    }

    #[test]
    fn nfe_name_binds_undefined_and_ignores_non_strict_overwrite() {
        let d = descriptor(&[], vec![], Some("recurse"), FunctionFlags::default());
        let global = Scope::new(None);
        let act = Activation::construct(d, vec![], global).unwrap();
        assert_eq!(
            act.scope().get_own(&PropertyKey::name("recurse")),
            crate::scope::GetResult::Found(JsValue::Undefined)
        );
    }

    #[test]
    fn caller_link_clears_on_exit() {
        let d = descriptor(&[], vec![], None, FunctionFlags::default());
        let global = Scope::new(None);
        let caller = Activation::construct(d.clone(), vec![], global.clone()).unwrap();
        let callee = Activation::construct(d, vec![], global).unwrap();

        callee.set_caller(&caller);
        assert!(callee.caller().unwrap().ptr_eq(&caller));

        callee.clear_caller();
        assert!(callee.caller().is_none());
    }
}

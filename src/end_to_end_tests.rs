//! Cross-module scenarios spanning the scope, activation, transformer and
//! module-scope layers together.

use crate::activation::{Activation, FunctionDescriptor, FunctionFlags, LocalBinding};
use crate::diagnostics::{CollectingDiagnostics, ErrorKind};
use crate::ir::{Declarator, IrKind, IrLiteral, IrNode, NodeFlags};
use crate::module_scope::{ImportEntry, ModuleLoader, ModuleRecord, ModuleScope};
use crate::scope::{GetResult, Scope, SlotAttributes};
use crate::transformer::{transform, TransformContext};
use crate::value::{JsValue, PropertyKey};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[test]
fn const_redeclaration_in_activation_raises_tdz_then_const_error() {
    let descriptor = Rc::new(FunctionDescriptor {
        param_names: vec![],
        rest_param_name: None,
        locals: vec![LocalBinding::const_binding("total")],
        nfe_name: None,
        flags: FunctionFlags::default(),
    });
    let global = Scope::new(None);
    let act = Activation::construct(descriptor, vec![], global).unwrap();
    let key = PropertyKey::name("total");

    assert_eq!(act.scope().get_own(&key), GetResult::Tdz);
    let read_before_init = act.scope().get_own(&key);
    assert!(matches!(read_before_init, GetResult::Tdz));

    act.scope().put_own(&key, JsValue::Number(0.0), true, true).unwrap();
    let second_write = act.scope().put_own(&key, JsValue::Number(1.0), false, true);
    assert_eq!(second_write.unwrap_err().kind, ErrorKind::AssignConst);
}

#[test]
fn mapped_arguments_round_trip_in_non_strict_simple_function() {
    let descriptor = Rc::new(FunctionDescriptor {
        param_names: vec![Rc::from("a"), Rc::from("b")],
        rest_param_name: None,
        locals: vec![],
        nfe_name: None,
        flags: FunctionFlags {
            requires_arguments: true,
            ..Default::default()
        },
    });
    let global = Scope::new(None);
    let act = Activation::construct(
        descriptor,
        vec![JsValue::Number(10.0), JsValue::Number(20.0)],
        global,
    )
    .unwrap();
    let arguments = act.arguments().unwrap();

    arguments.set(0, JsValue::Number(1.0));
    assert_eq!(
        act.scope().get_own(&PropertyKey::name("a")),
        GetResult::Found(JsValue::Number(1.0))
    );

    act.scope()
        .put_own(&PropertyKey::name("a"), JsValue::Number(2.0), false, false)
        .unwrap();
    assert_eq!(arguments.get(0), Some(JsValue::Number(2.0)));
}

#[test]
fn unmapped_arguments_do_not_propagate_in_strict_function() {
    let descriptor = Rc::new(FunctionDescriptor {
        param_names: vec![Rc::from("a")],
        rest_param_name: None,
        locals: vec![],
        nfe_name: None,
        flags: FunctionFlags {
            strict: true,
            requires_arguments: true,
            ..Default::default()
        },
    });
    let global = Scope::new(None);
    let act = Activation::construct(descriptor, vec![JsValue::Number(4.0)], global).unwrap();
    let arguments = act.arguments().unwrap();

    arguments.set(0, JsValue::Number(9.0));
    assert_eq!(
        act.scope().get_own(&PropertyKey::name("a")),
        GetResult::Found(JsValue::Number(4.0))
    );
}

#[test]
fn break_out_of_loop_nested_in_try_finally_stays_within_the_try() {
    // Mirrors `try { for (...) { if (...) break; } } finally { ... }`: the
    // break only needs to exit the loop (one GOTO, no unwind ops, since the
    // loop carries no per-iteration with-scope here) — normal completion of
    // the try body still falls through into the finally without any
    // explicit JSR, which only the RETURN path requires (see
    // `return_with_finally_prepends_jsr_before_return_result` in
    // `transformer.rs`).
    let inner_break = IrNode::new(IrKind::Break);
    let if_break = IrNode::with_children(IrKind::Ifeq, vec![inner_break]);

    let loop_node = IrNode::with_children(IrKind::Loop, vec![if_break]);

    let mut finally_block = IrNode::block(vec![]);
    finally_block.name = Some(Rc::from("finally"));
    let mut try_node = IrNode::with_children(IrKind::Try, vec![loop_node, finally_block]);
    try_node.declarators.push(Declarator::new("finally", None));

    let mut ctx = TransformContext::new(true, false);
    let mut sink = CollectingDiagnostics::new();
    let out = transform(try_node, &mut ctx, false, &mut sink);
    assert!(sink.is_empty());

    fn count_kind(node: &IrNode, kind: IrKind) -> usize {
        let mut count = if node.kind == kind { 1 } else { 0 };
        for child in &node.children {
            count += count_kind(child, kind);
        }
        count
    }

    assert_eq!(count_kind(&out, IrKind::Jsr), 0);
    assert_eq!(count_kind(&out, IrKind::Goto), 1);
}

#[test]
fn c_style_for_with_let_gets_per_iteration_copy_opcode() {
    let mut loop_node = IrNode::with_children(
        IrKind::Loop,
        vec![
            IrNode::block(vec![]),                      // body
            IrNode::block(vec![]),                      // increment
            IrNode::literal(IrLiteral::Number(1.0)),     // condition
            IrNode::new(IrKind::Target),                 // break
        ],
    );
    loop_node.loop_shape = Some(crate::ir::LoopShape::CStyle);
    loop_node.flags.insert(NodeFlags::PER_ITERATION_SCOPE);
    loop_node.per_iteration_names = Some(vec![Rc::from("i")]);

    let mut ctx = TransformContext::new(true, false);
    let mut sink = CollectingDiagnostics::new();
    let out = transform(loop_node, &mut ctx, false, &mut sink);

    fn find_kind<'a>(node: &'a IrNode, kind: IrKind) -> Option<&'a IrNode> {
        if node.kind == kind {
            return Some(node);
        }
        node.children.iter().find_map(|c| find_kind(c, kind))
    }

    assert!(find_kind(&out, IrKind::EnterWith).is_some());
    let copy = find_kind(&out, IrKind::SwitchPerIterScope).unwrap();
    assert_eq!(copy.per_iteration_names.as_deref(), Some(&[Rc::from("i")][..]));
}

struct FakeModule {
    exports: RefCell<HashMap<String, JsValue>>,
}

impl ModuleRecord for FakeModule {
    fn get_export_binding(&self, export_name: &str) -> Result<crate::value::JsValue, crate::diagnostics::EngineError> {
        self.exports
            .borrow()
            .get(export_name)
            .cloned()
            .ok_or_else(|| crate::diagnostics::EngineError::new(ErrorKind::ImportUnresolved, "missing export"))
    }

    fn namespace_object(&self) -> crate::value::JsValue {
        JsValue::Undefined
    }
}

struct FakeLoader {
    modules: HashMap<String, Rc<dyn ModuleRecord>>,
}

impl ModuleLoader for FakeLoader {
    fn resolve(&self, module_request: &str, _referencing_module: &str) -> Option<Rc<str>> {
        Some(Rc::from(module_request))
    }

    fn get_cached(&self, module_key: &str) -> Option<Rc<dyn ModuleRecord>> {
        self.modules.get(module_key).cloned()
    }
}

#[test]
fn module_import_returns_bumped_value_and_rejects_external_write() {
    let exporter = Rc::new(FakeModule {
        exports: RefCell::new(HashMap::from([("x".to_string(), JsValue::Number(1.0))])),
    });
    let loader = FakeLoader {
        modules: HashMap::from([("./a.js".to_string(), exporter.clone() as Rc<dyn ModuleRecord>)]),
    };
    let importer = ModuleScope::new(
        "./b.js",
        vec![
            ImportEntry {
                module_request: Rc::from("./a.js"),
                import_name: Some(Rc::from("x")),
                local_name: Rc::from("x"),
            },
            ImportEntry {
                module_request: Rc::from("./a.js"),
                import_name: Some(Rc::from("bump")),
                local_name: Rc::from("bump"),
            },
        ],
    );

    // b.js: bump(); return x;  (bump's effect is simulated directly here,
    // since function invocation is the out-of-scope interpreter's job)
    exporter
        .exports
        .borrow_mut()
        .insert("x".to_string(), JsValue::Number(2.0));

    let result = importer.get(&PropertyKey::name("x"), &loader).unwrap();
    assert_eq!(result, GetResult::Found(JsValue::Number(2.0)));

    let write_err = importer
        .put(&PropertyKey::name("x"), JsValue::Number(5.0), false, false)
        .unwrap_err();
    assert_eq!(write_err.kind, ErrorKind::AssignReadonlyImport);
}

#[test]
fn activation_scope_defines_param_and_local_in_insertion_order() {
    let descriptor = Rc::new(FunctionDescriptor {
        param_names: vec![Rc::from("a")],
        rest_param_name: None,
        locals: vec![LocalBinding::var("total")],
        nfe_name: None,
        flags: FunctionFlags::default(),
    });
    let global = Scope::new(None);
    let act = Activation::construct(descriptor, vec![JsValue::Number(1.0)], global).unwrap();
    let keys = act.scope().own_keys();
    assert_eq!(
        keys,
        vec![PropertyKey::name("a"), PropertyKey::name("total")]
    );
    // Sanity: PERMANENT means non-configurable.
    assert!(!act
        .scope()
        .get_attributes(&PropertyKey::name("a"))
        .unwrap()
        .contains(SlotAttributes::CONFIGURABLE));
}

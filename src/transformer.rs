//! The node transformer (C3): a depth-first, single-pass lowering of a
//! parsed function body into the IR tree whose scope-affecting opcodes are
//! the contract between compile time and run time.
//!
//! The transformer is pure: no global mutable state, just the visitor
//! context (`TransformContext`) threaded through the recursion, per the
//! "Transformer as pure function" redesign note — this makes a second pass
//! (e.g. over a generator's parameter-init block) trivially reentrant.

use crate::diagnostics::{DiagnosticSink, EngineError, ErrorKind};
use crate::ir::{Declarator, IrKind, IrLiteral, IrNode, LoopShape, NodeFlags};
use std::rc::Rc;

/// Identifies the statement a `loops`/`loopEnds` frame belongs to, so
/// `BREAK`/`CONTINUE` can walk outward to a labelled ancestor that isn't the
/// innermost loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Loop,
    Label,
    Switch,
    With { per_iteration: bool },
    TryFinally,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    /// The label name this frame answers to, if it's a `LABEL` frame or a
    /// `LOOP`/`SWITCH` immediately enclosed by one (labels bind to the next
    /// statement per grammar, represented here by copying the name down).
    label: Option<Rc<str>>,
    /// The `TARGET` id this frame's statement ends at (`break` target).
    break_target: u32,
    /// The `TARGET` id a `continue` resolves to for `LOOP` frames.
    continue_target: Option<u32>,
    /// The `JSR` target for a `TryFinally` frame.
    finally_target: Option<u32>,
}

/// Per-function transformer state: the two stacks and `hasFinally` flag
/// named in the base spec's §4.3.
#[derive(Debug, Default)]
pub struct TransformContext {
    loops: Vec<Frame>,
    has_finally: bool,
    /// Whether the enclosing function requires an activation (so
    /// block-scoped bindings lower to scope-object opcodes rather than
    /// indexed locals), per `requiresActivation()`.
    create_scope_objects: bool,
    in_generator: bool,
    next_target_id: u32,
    pending_label: Option<Rc<str>>,
}

impl TransformContext {
    pub fn new(create_scope_objects: bool, in_generator: bool) -> Self {
        TransformContext {
            loops: Vec::new(),
            has_finally: false,
            create_scope_objects,
            in_generator,
            next_target_id: 0,
            pending_label: None,
        }
    }

    fn fresh_target_id(&mut self) -> u32 {
        let id = self.next_target_id;
        self.next_target_id += 1;
        id
    }

    fn push(&mut self, frame: Frame) {
        self.loops.push(frame);
    }

    fn pop(&mut self) {
        self.loops.pop();
    }
}

/// Transforms a function (or script) body in place, per base spec §4.3.
///
/// `sink` receives source-level diagnostics (currently only `SYNTAX_ERROR`
/// for strict-mode `eval`/`arguments` assignment); everything else that goes
/// wrong here is a transformer bug and panics, per §4.3.3.
pub fn transform(
    root: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    transform_node(root, ctx, strict, sink)
}

fn transform_node(
    node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    match node.kind {
        IrKind::Block | IrKind::Loop | IrKind::ArrayComp if node.has_non_empty_symbol_table() => {
            transform_scoped_wrapper(node, ctx, strict, sink)
        }
        IrKind::Label => transform_label(node, ctx, strict, sink),
        IrKind::Switch => transform_switch(node, ctx, strict, sink),
        IrKind::Loop => transform_loop(node, ctx, strict, sink),
        IrKind::With => transform_with(node, ctx, strict, sink),
        IrKind::Try => transform_try(node, ctx, strict, sink),
        IrKind::Yield | IrKind::YieldStar | IrKind::Await => {
            transform_children(node, ctx, strict, sink)
        }
        IrKind::Return => transform_return(node, ctx, strict, sink),
        IrKind::Break | IrKind::Continue => transform_jump(node, ctx),
        IrKind::Let | IrKind::LetExpr => transform_let(node, ctx, strict, sink),
        IrKind::Const | IrKind::Var => transform_decl(node, ctx, strict, sink),
        IrKind::SetName if strict && is_banned_assignment_target(&node) => {
            sink.report(EngineError::new(
                ErrorKind::SyntaxError,
                format!(
                    "assignment to '{}' is not allowed in strict mode",
                    node.name.as_deref().unwrap_or("?")
                ),
            ));
            transform_children(node, ctx, strict, sink)
        }
        IrKind::SetName if strict => {
            let mut rewritten = node;
            rewritten.kind = IrKind::StrictSetName;
            transform_children(rewritten, ctx, strict, sink)
        }
        IrKind::Name
        | IrKind::SetName
        | IrKind::SetConst
        | IrKind::SetLetInit
        | IrKind::DelProp
            if !ctx.create_scope_objects =>
        {
            let rewritten_kind = match node.kind {
                IrKind::Name => IrKind::GetVar,
                IrKind::SetName => IrKind::SetVar,
                IrKind::SetConst => IrKind::SetConstVar,
                IrKind::SetLetInit => IrKind::SetLetVar,
                IrKind::DelProp => {
                    // A delete of a resolved local is always refused.
                    return IrNode::literal(IrLiteral::Undefined);
                }
                other => other,
            };
            let mut rewritten = node;
            rewritten.kind = rewritten_kind;
            transform_children(rewritten, ctx, strict, sink)
        }
        _ => transform_children(node, ctx, strict, sink),
    }
}

fn is_banned_assignment_target(node: &IrNode) -> bool {
    matches!(node.name.as_deref(), Some("eval") | Some("arguments"))
}

fn transform_children(
    mut node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    node.children = node
        .children
        .into_iter()
        .map(|c| transform_node(c, ctx, strict, sink))
        .collect();
    node
}

/// `BLOCK`/`LOOP`/`ARRAYCOMP` carrying a non-empty symbol table: replaced by
/// a `LET`/`LETEXPR` wrapper enumerating the declared names, symbol table
/// cleared so it isn't reprocessed (base spec §4.3).
fn transform_scoped_wrapper(
    mut node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    let declarators = std::mem::take(&mut node.declarators);
    let mut wrapper = IrNode::with_children(IrKind::Let, vec![node]);
    wrapper.declarators = declarators;
    transform_let(wrapper, ctx, strict, sink)
}

fn transform_label(
    node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    let label = node.name.clone();
    // Offered to a nested LOOP/SWITCH so `continue label;` can resolve
    // directly to that frame; a non-loop labelled statement simply leaves
    // it unconsumed and this wrapper's own frame is what `break label;`
    // will find.
    ctx.pending_label = label.clone();
    let break_target = ctx.fresh_target_id();
    ctx.push(Frame {
        kind: FrameKind::Label,
        label,
        break_target,
        continue_target: None,
        finally_target: None,
    });
    let out = transform_children(node, ctx, strict, sink);
    ctx.pop();
    ctx.pending_label = None;
    let mut block = IrNode::block(vec![out, IrNode::target(break_target)]);
    block.name = None;
    block
}

fn transform_switch(
    node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    let label = ctx.pending_label.take();
    let break_target = ctx.fresh_target_id();
    ctx.push(Frame {
        kind: FrameKind::Switch,
        label,
        break_target,
        continue_target: None,
        finally_target: None,
    });
    let out = transform_children(node, ctx, strict, sink);
    ctx.pop();
    IrNode::block(vec![out, IrNode::target(break_target)])
}

/// `LOOP`: pushes a loop frame (optionally carrying a label handed down by
/// an enclosing `transform_label`), applies the per-iteration-scope wrapper
/// of base spec §4.3.1 when flagged, then recurses.
fn transform_loop(
    mut node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    let label = ctx.pending_label.take();

    let mut per_iteration_with = None;
    if node.flags.contains(NodeFlags::PER_ITERATION_SCOPE) {
        if let Some(names) = node.per_iteration_names.clone() {
            let (wrapped, with_kind) = wrap_per_iteration_loop(node, &names);
            node = wrapped;
            per_iteration_with = with_kind;
        }
    }

    let break_target = ctx.fresh_target_id();
    let continue_target = ctx.fresh_target_id();
    ctx.push(Frame {
        kind: FrameKind::Loop,
        label,
        break_target,
        continue_target: Some(continue_target),
        finally_target: None,
    });
    // The per-iteration with-scope (if any) is spliced around the whole
    // loop body by `wrap_per_iteration_loop`; push its own frame above the
    // loop frame so a `break`/`continue` inside the body balances the
    // `ENTERWITH` with a `LEAVEWITH` (and, for the C-style shape, a
    // `COPY_PER_ITER_SCOPE`) before jumping out (base spec §4.3.1, P1, P7).
    if let Some(per_iteration) = per_iteration_with {
        push_with_frame(ctx, per_iteration);
    }
    let out = transform_children(node, ctx, strict, sink);
    if per_iteration_with.is_some() {
        ctx.pop();
    }
    ctx.pop();

    IrNode::block(vec![
        out,
        IrNode::target(continue_target),
        IrNode::target(break_target),
    ])
}

/// Base spec §4.3.1: wraps a per-iteration-scoped loop's body according to
/// its structural shape. Any shape other than the two named is left
/// unwrapped. Returns the (possibly wrapped) node plus, when a with-scope
/// was actually spliced in, whether it's the copy-back (C-style) or
/// no-copy (`for-in`/`for-of`) kind.
fn wrap_per_iteration_loop(mut node: IrNode, names: &[Rc<str>]) -> (IrNode, Option<bool>) {
    match node.loop_shape {
        Some(LoopShape::CStyle) if node.children.len() == 4 => {
            let mut children = std::mem::take(&mut node.children);
            let break_child = children.pop().unwrap();
            let condition = children.pop().unwrap();
            let increment = children.pop().unwrap();
            let body = children.pop().unwrap();

            let enter = IrNode::with_children(IrKind::EnterWith, vec![object_lit_name_lookup(names)]);
            let mut switch_scope = IrNode::new(IrKind::SwitchPerIterScope);
            switch_scope.per_iteration_names = Some(names.to_vec());

            node.children = vec![
                enter,
                body,
                switch_scope,
                increment,
                condition,
                IrNode::new(IrKind::LeaveWith),
                break_child,
            ];
            (node, Some(true))
        }
        Some(LoopShape::ForInOf) if node.children.len() == 3 => {
            let mut children = std::mem::take(&mut node.children);
            let break_child = children.pop().unwrap();
            let condition = children.pop().unwrap();
            let body = children.pop().unwrap();

            let enter =
                IrNode::with_children(IrKind::EnterWith, vec![object_lit_all_tdz_by_name(names)]);
            let wrapped_body = IrNode::block(vec![body]);

            node.children = vec![enter, wrapped_body, condition, IrNode::new(IrKind::LeaveWith), break_child];
            (node, Some(false))
        }
        _ => (node, None),
    }
}

fn object_lit_name_lookup(names: &[Rc<str>]) -> IrNode {
    let mut obj = IrNode::new(IrKind::ObjectLit);
    obj.declarators = names
        .iter()
        .map(|n| Declarator::new(n.clone(), Some(IrNode::leaf_name(IrKind::Name, n.clone()))))
        .collect();
    obj
}

fn object_lit_all_tdz_by_name(names: &[Rc<str>]) -> IrNode {
    let mut obj = IrNode::new(IrKind::ObjectLit);
    obj.declarators = names.iter().map(|n| Declarator::new(n.clone(), None)).collect();
    obj
}

/// Pushes the `FrameKind::With` frame that lets `transform_return`/
/// `transform_jump` balance this with-scope's `ENTERWITH` with a `LEAVEWITH`
/// (and, for a per-iteration scope, a `COPY_PER_ITER_SCOPE`) on every path
/// that exits through a `break`/`continue`/`return` (base spec §4.3, P1, P7).
/// `break_target`/`continue_target` are never read off a `With` frame by
/// `transform_jump` (only `Loop`/`Switch`/labelled frames are jump targets),
/// so they're left at `0`.
fn push_with_frame(ctx: &mut TransformContext, per_iteration: bool) {
    ctx.push(Frame {
        kind: FrameKind::With { per_iteration },
        label: None,
        break_target: 0,
        continue_target: None,
        finally_target: None,
    });
}

fn transform_with(
    node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    // The sibling LEAVEWITH is expected to already be present among the
    // children (produced by an earlier ENTERWITH/LEAVEWITH pairing pass, or
    // by `transform_let`).
    push_with_frame(ctx, false);
    let out = transform_children(node, ctx, strict, sink);
    ctx.pop();
    out
}

fn transform_try(
    node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    if node_has_finally(&node) {
        ctx.has_finally = true;
        let finally_target = ctx.fresh_target_id();
        ctx.push(Frame {
            kind: FrameKind::TryFinally,
            label: None,
            break_target: finally_target,
            continue_target: None,
            finally_target: Some(finally_target),
        });
        let out = transform_children(node, ctx, strict, sink);
        ctx.pop();
        out
    } else {
        transform_children(node, ctx, strict, sink)
    }
}

/// A `TRY` node's last child is conventionally its `finally` block, marked
/// by a dedicated declarator named `"finally"` set by the frontend/fixture
/// author — a structural stand-in for a real parser flag.
fn node_has_finally(node: &IrNode) -> bool {
    node.declarators.iter().any(|d| d.name.as_ref() == "finally")
}

/// `RETURN`: threads the finally/with unwind splice described in base spec
/// §4.3, and rewrites to `RETURN_RESULT` when there's an expression in a
/// non-generator function (materializing it once via `EXPR_RESULT`).
fn transform_return(
    mut node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    if ctx.in_generator {
        node.flags.insert(NodeFlags::GENERATOR_END);
    }

    let mut unwind = Vec::new();
    if ctx.has_finally {
        for frame in ctx.loops.iter().rev() {
            match frame.kind {
                FrameKind::TryFinally => {
                    if let Some(target) = frame.finally_target {
                        unwind.push(IrNode::jump(IrKind::Jsr, target));
                    }
                }
                FrameKind::With { .. } => {
                    unwind.push(IrNode::new(IrKind::LeaveWith));
                }
                _ => {}
            }
        }
    }

    let node = transform_children(node, ctx, strict, sink);

    let has_expr = !node.children.is_empty();
    let returned = if has_expr && !ctx.in_generator {
        let mut expr_result = IrNode::with_children(IrKind::ExprResult, node.children.clone());
        expr_result.name = Some(Rc::from("$$return_temp"));
        let mut return_result = IrNode::new(IrKind::ReturnResult);
        return_result.name = expr_result.name.clone();
        unwind.push(expr_result);
        unwind.push(return_result);
        IrNode::block(unwind)
    } else if unwind.is_empty() {
        node
    } else {
        unwind.push(node);
        IrNode::block(unwind)
    };

    returned
}

/// `BREAK`/`CONTINUE`: walks the `loops` stack to the named (or innermost)
/// target, emitting `COPY_PER_ITER_SCOPE`/`LEAVEWITH` for every interposed
/// `WITH` and `JSR` for every interposed `TRY...finally`, innermost-first
/// (base spec §4.3, P7).
fn transform_jump(node: IrNode, ctx: &mut TransformContext) -> IrNode {
    let is_break = node.kind == IrKind::Break;
    let label = node.name.clone();

    let stop_at = match &label {
        Some(l) => ctx
            .loops
            .iter()
            .rposition(|f| f.label.as_deref() == Some(l.as_ref())),
        None if is_break => ctx
            .loops
            .iter()
            .rposition(|f| matches!(f.kind, FrameKind::Loop | FrameKind::Switch)),
        None => ctx
            .loops
            .iter()
            .rposition(|f| matches!(f.kind, FrameKind::Loop)),
    };

    let Some(stop_at) = stop_at else {
        panic!("transformer: break/continue target not found on loop stack (structural bug)");
    };

    let mut unwind = Vec::new();
    for frame in ctx.loops[stop_at..].iter().rev() {
        match frame.kind {
            FrameKind::With { per_iteration } => {
                if per_iteration {
                    unwind.push(IrNode::new(IrKind::CopyPerIterScope));
                }
                unwind.push(IrNode::new(IrKind::LeaveWith));
            }
            FrameKind::TryFinally => {
                if let Some(target) = frame.finally_target {
                    unwind.push(IrNode::jump(IrKind::Jsr, target));
                }
            }
            _ => {}
        }
    }

    let target_frame = &ctx.loops[stop_at];
    let target_id = if is_break {
        target_frame.break_target
    } else {
        target_frame
            .continue_target
            .unwrap_or(target_frame.break_target)
    };

    unwind.push(IrNode::jump(IrKind::Goto, target_id));
    IrNode::block(unwind)
}

/// `LET`/`LETEXPR` lowering, base spec §4.3.2.
fn transform_let(
    mut node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    let is_const_for_loop = node.flags.contains(NodeFlags::CONST_FOR_LOOP_SCOPE);
    let is_let_for_loop = node.flags.contains(NodeFlags::LET_FOR_LOOP_SCOPE);
    let names: Vec<Rc<str>> = node.declarators.iter().map(|d| d.name.clone()).collect();

    if is_const_for_loop {
        let obj = object_lit_from_declarators(&node.declarators);
        let mut enter = IrNode::with_children(IrKind::EnterWith, vec![obj]);
        enter.const_names = names;
        push_with_frame(ctx, false);
        let body = transform_children(
            IrNode::block(std::mem::take(&mut node.children)),
            ctx,
            strict,
            sink,
        );
        ctx.pop();
        let with = IrNode::with_children(IrKind::With, vec![body]);
        return IrNode::block(vec![enter, with, IrNode::new(IrKind::LeaveWith)]);
    }

    if is_let_for_loop && declarators_contain_function_literal(&node.declarators) {
        let all_tdz = object_lit_all_tdz(&node.declarators);
        let enter = IrNode::with_children(IrKind::EnterWith, vec![all_tdz]);
        let mut with_body: Vec<IrNode> = node
            .declarators
            .iter()
            .map(|d| set_let_init(d))
            .collect();
        with_body.extend(std::mem::take(&mut node.children));
        push_with_frame(ctx, false);
        let body = transform_children(IrNode::block(with_body), ctx, strict, sink);
        ctx.pop();
        let with = IrNode::with_children(IrKind::With, vec![body]);
        return IrNode::block(vec![enter, with, IrNode::new(IrKind::LeaveWith)]);
    }

    // Plain let/letexpr.
    if ctx.create_scope_objects {
        let obj = object_lit_from_declarators(&node.declarators);
        let enter = IrNode::with_children(IrKind::EnterWith, vec![obj]);
        push_with_frame(ctx, false);
        let body = transform_children(
            IrNode::with_children(node.kind, std::mem::take(&mut node.children)),
            ctx,
            strict,
            sink,
        );
        ctx.pop();
        let with = IrNode::with_children(IrKind::With, vec![body]);
        IrNode::block(vec![enter, with, IrNode::new(IrKind::LeaveWith)])
    } else {
        let assigns: Vec<IrNode> = node.declarators.iter().map(set_var_from_declarator).collect();
        let mut body = assigns;
        body.extend(
            transform_children(
                IrNode::block(std::mem::take(&mut node.children)),
                ctx,
                strict,
                sink,
            )
            .children,
        );
        if node.kind == IrKind::LetExpr {
            IrNode::with_children(IrKind::Comma, body)
        } else {
            IrNode::block(body)
        }
    }
}

fn declarators_contain_function_literal(declarators: &[Declarator]) -> bool {
    // The IR has no dedicated function-literal node (function bodies are
    // out of scope for this core's fixtures); treat any declarator whose
    // initializer is itself present as the conservative signal — any
    // captured initializer forces the with-scope-as-lexical-parent
    // lowering.
    declarators.iter().any(|d| d.init.is_some())
}

fn set_let_init(d: &Declarator) -> IrNode {
    let init = d
        .init
        .clone()
        .unwrap_or_else(|| Box::new(IrNode::literal(IrLiteral::Undefined)));
    let mut set = IrNode::with_children(IrKind::SetLetInit, vec![*init]);
    set.name = Some(d.name.clone());
    IrNode::with_children(IrKind::ExprVoid, vec![set])
}

fn set_var_from_declarator(d: &Declarator) -> IrNode {
    let init = d
        .init
        .clone()
        .unwrap_or_else(|| Box::new(IrNode::literal(IrLiteral::Undefined)));
    let mut set = IrNode::with_children(IrKind::SetVar, vec![*init]);
    set.name = Some(d.name.clone());
    IrNode::with_children(IrKind::ExprVoid, vec![set])
}

fn object_lit_from_declarators(declarators: &[Declarator]) -> IrNode {
    let mut obj = IrNode::new(IrKind::ObjectLit);
    obj.declarators = declarators.to_vec();
    obj
}

fn object_lit_all_tdz(declarators: &[Declarator]) -> IrNode {
    let mut obj = IrNode::new(IrKind::ObjectLit);
    obj.declarators = declarators
        .iter()
        .map(|d| Declarator::new(d.name.clone(), None))
        .collect();
    obj
}

/// `CONST`/`VAR` (or fall-through from a `LET` declaration without a
/// wrapping scope), base spec §4.3.
fn transform_decl(
    node: IrNode,
    ctx: &mut TransformContext,
    strict: bool,
    sink: &mut dyn DiagnosticSink,
) -> IrNode {
    if node.flags.contains(NodeFlags::FOR_IN_OF_LOOP_VAR) {
        // The loop wrapper supplies the TDZ scope; erase this declaration.
        return IrNode::block(vec![]);
    }

    let set_kind = match node.kind {
        IrKind::Var => IrKind::SetName,
        IrKind::Const => IrKind::SetConst,
        _ => IrKind::SetLetInit,
    };

    let statements: Vec<IrNode> = node
        .declarators
        .iter()
        .map(|d| {
            let init = d
                .init
                .clone()
                .unwrap_or_else(|| Box::new(IrNode::literal(IrLiteral::Undefined)));
            let mut set = IrNode::with_children(set_kind, vec![*init]);
            set.name = Some(d.name.clone());
            transform_node(
                IrNode::with_children(IrKind::ExprVoid, vec![set]),
                ctx,
                strict,
                sink,
            )
        })
        .collect();

    IrNode::block(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;

    fn leaf_jump(kind: IrKind, label: Option<&str>) -> IrNode {
        let mut n = IrNode::new(kind);
        n.name = label.map(Rc::from);
        n
    }

    #[test]
    fn plain_block_with_locals_wraps_in_enterwith_leavewith() {
        let mut block = IrNode::block(vec![]);
        block.declarators.push(Declarator::new("x", None));
        let mut ctx = TransformContext::new(true, false);
        let mut sink = CollectingDiagnostics::new();
        let out = transform(block, &mut ctx, false, &mut sink);

        assert_eq!(out.kind, IrKind::Block);
        assert!(matches!(out.children[0].kind, IrKind::EnterWith));
        assert!(matches!(out.children.last().unwrap().kind, IrKind::LeaveWith));
        assert!(sink.is_empty());
    }

    #[test]
    fn const_for_loop_scope_marks_const_names_on_enterwith() {
        let mut let_node = IrNode::new(IrKind::Let);
        let_node.flags.insert(NodeFlags::CONST_FOR_LOOP_SCOPE);
        let_node.declarators.push(Declarator::new(
            "i",
            Some(IrNode::literal(IrLiteral::Number(0.0))),
        ));
        let mut ctx = TransformContext::new(true, false);
        let mut sink = CollectingDiagnostics::new();
        let out = transform(let_node, &mut ctx, false, &mut sink);

        let enter = &out.children[0];
        assert_eq!(enter.kind, IrKind::EnterWith);
        assert_eq!(enter.const_names, vec![Rc::from("i")]);
    }

    #[test]
    fn break_out_of_nested_with_emits_unwind_innermost_first() {
        let mut ctx = TransformContext::new(true, false);
        ctx.push(Frame {
            kind: FrameKind::Loop,
            label: None,
            break_target: 99,
            continue_target: Some(98),
            finally_target: None,
        });
        ctx.push(Frame {
            kind: FrameKind::With { per_iteration: false },
            label: None,
            break_target: 99,
            continue_target: None,
            finally_target: None,
        });
        ctx.push(Frame {
            kind: FrameKind::With { per_iteration: true },
            label: None,
            break_target: 99,
            continue_target: None,
            finally_target: None,
        });

        let out = transform_jump(leaf_jump(IrKind::Break, None), &mut ctx);
        let kinds: Vec<IrKind> = out.children.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IrKind::CopyPerIterScope,
                IrKind::LeaveWith,
                IrKind::LeaveWith,
                IrKind::Goto,
            ]
        );
    }

    #[test]
    fn strict_eval_assignment_reports_syntax_error() {
        let mut set = IrNode::new(IrKind::SetName);
        set.name = Some(Rc::from("eval"));
        set.children = vec![IrNode::literal(IrLiteral::Number(1.0))];

        let mut ctx = TransformContext::new(true, false);
        let mut sink = CollectingDiagnostics::new();
        transform(set, &mut ctx, true, &mut sink);

        assert_eq!(sink.errors.len(), 1);
        assert_eq!(sink.errors[0].kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn return_with_finally_prepends_jsr_before_return_result() {
        let mut ctx = TransformContext::new(true, false);
        ctx.has_finally = true;
        ctx.push(Frame {
            kind: FrameKind::TryFinally,
            label: None,
            break_target: 5,
            continue_target: None,
            finally_target: Some(5),
        });

        let ret = IrNode::with_children(
            IrKind::Return,
            vec![IrNode::literal(IrLiteral::Number(1.0))],
        );
        let mut sink = CollectingDiagnostics::new();
        let out = transform_return(ret, &mut ctx, false, &mut sink);

        assert_eq!(out.kind, IrKind::Block);
        assert!(matches!(out.children[0].kind, IrKind::Jsr));
        assert_eq!(out.children[0].target_id, Some(5));
        assert!(matches!(out.children.last().unwrap().kind, IrKind::ReturnResult));
    }
}

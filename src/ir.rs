//! The owned IR tree produced by the frontend/transformer (C3) and consumed
//! by the (out-of-scope) interpreter/codegen.
//!
//! Deliberately a single generic node type carrying a closed `IrKind` tag
//! plus a small property bag, rather than one Rust enum variant per
//! token-with-payload: the transformer rewrites node *kinds* in place while
//! leaving most of the surrounding tree untouched (see `transformer.rs`),
//! which is far more natural against a uniform node shape than against
//! distinct per-kind payload types. Every scope-affecting opcode named in
//! the base spec's §3.1 token list is a value of `IrKind`.

use crate::bits::bitflags_lite;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

bitflags_lite! {
    /// Parser-set flags consumed by the transformer (§4.3, §6).
    pub struct NodeFlags: u16 {
        const FOR_IN_OF_LOOP_VAR    = 0b0000_0001;
        const CONST_FOR_LOOP_SCOPE  = 0b0000_0010;
        const LET_FOR_LOOP_SCOPE    = 0b0000_0100;
        const PER_ITERATION_SCOPE   = 0b0000_1000;
        const GENERATOR_END         = 0b0001_0000;
        const STRICT                = 0b0010_0000;
        const IS_GENERATOR          = 0b0100_0000;
        const IS_ASYNC_GENERATOR    = 0b1000_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrKind {
    Block,
    Loop,
    ArrayComp,
    Label,
    Switch,
    With,
    EnterWith,
    LeaveWith,
    Try,
    Yield,
    YieldStar,
    Await,
    Return,
    ReturnResult,
    Break,
    Continue,
    Goto,
    Target,
    Let,
    LetExpr,
    Const,
    Var,
    Name,
    BindName,
    SetName,
    StrictSetName,
    SetConst,
    SetLetInit,
    DelProp,
    TypeofName,
    Typeof,
    Ifeq,
    Ifne,
    Jsr,
    SwitchPerIterScope,
    CopyPerIterScope,
    ObjectLit,
    Comma,
    ExprVoid,
    ExprResult,
    GetVar,
    SetVar,
    SetConstVar,
    SetLetVar,
    GetProp,
    Literal,
    Tdz,
    /// An expression the frontend did not specifically model (anything
    /// beyond identifiers and number/string literals). Carried through
    /// transformation unchanged; not one of the base spec's opcode tokens,
    /// just this crate's escape hatch for the surface syntax its frontend
    /// doesn't flag (base spec §6: "anything else is left for hand-built
    /// IR fixtures").
    Opaque,
}

/// A literal value attached to a `Literal`/`ObjectLit` node, independent of
/// the runtime `JsValue` type (the IR is produced at compile time, before
/// any activation exists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrLiteral {
    Undefined,
    Number(f64),
    String(String),
}

/// The structural shape a `LOOP` node's children take, distinguishing a
/// C-style `for` (four targets: body, increment, condition, break) from a
/// `for-in`/`for-of` loop (three targets: body, condition, break), per base
/// spec §4.3.1. Set by the frontend; consulted only by the per-iteration
/// loop wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopShape {
    CStyle,
    ForInOf,
}

/// A single declared name inside a `LET`/`LETEXPR`/`CONST`/`VAR`/`OBJECTLIT`
/// node, with its optional initializer expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declarator {
    pub name: Rc<str>,
    pub init: Option<Box<IrNode>>,
}

impl Declarator {
    pub fn new(name: impl Into<Rc<str>>, init: Option<IrNode>) -> Self {
        Declarator {
            name: name.into(),
            init: init.map(Box::new),
        }
    }
}

/// A single IR tree node. Most tree shape lives in `children`; the bespoke
/// per-token payload lives in the remaining fields, most of which are unused
/// for any given `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrNode {
    pub kind: IrKind,
    pub children: Vec<IrNode>,

    /// Declared names, e.g. a `BLOCK`/`LOOP` symbol table, or the bindings
    /// of a `LET`/`LETEXPR`/`CONST`/`VAR` node.
    pub declarators: Vec<Declarator>,

    /// `PER_ITERATION_NAMES` on a `LOOP`, `SWITCH_PER_ITER_SCOPE` or
    /// `COPY_PER_ITER_SCOPE` node.
    pub per_iteration_names: Option<Vec<Rc<str>>>,

    /// `CONST_NAMES` attached to an `ENTERWITH` node.
    pub const_names: Vec<Rc<str>>,

    /// The identifier named by `NAME`/`BINDNAME`/`SETNAME`/`SETCONST`/
    /// `SETLETINIT`/`DELPROP`/`GETVAR`/`SETVAR`/`TYPEOFNAME`, or the label
    /// of a `LABEL`/`BREAK`/`CONTINUE` node.
    pub name: Option<Rc<str>>,

    /// A stable identity for `TARGET` nodes and the jump site they're
    /// addressed from (`BREAK`/`CONTINUE`/`GOTO`/`JSR` carry the target id
    /// they resolve to once rewritten).
    pub target_id: Option<u32>,

    pub literal: Option<IrLiteral>,

    pub flags: NodeFlags,

    /// Set on `LOOP` nodes only; see `LoopShape`.
    pub loop_shape: Option<LoopShape>,
}

impl IrNode {
    pub fn new(kind: IrKind) -> Self {
        IrNode {
            kind,
            children: Vec::new(),
            declarators: Vec::new(),
            per_iteration_names: None,
            const_names: Vec::new(),
            name: None,
            target_id: None,
            literal: None,
            flags: NodeFlags::empty(),
            loop_shape: None,
        }
    }

    pub fn with_children(kind: IrKind, children: Vec<IrNode>) -> Self {
        IrNode {
            children,
            ..IrNode::new(kind)
        }
    }

    pub fn leaf_name(kind: IrKind, name: impl Into<Rc<str>>) -> Self {
        IrNode {
            name: Some(name.into()),
            ..IrNode::new(kind)
        }
    }

    pub fn target(id: u32) -> Self {
        IrNode {
            target_id: Some(id),
            ..IrNode::new(IrKind::Target)
        }
    }

    pub fn jump(kind: IrKind, target_id: u32) -> Self {
        IrNode {
            target_id: Some(target_id),
            ..IrNode::new(kind)
        }
    }

    pub fn literal(value: IrLiteral) -> Self {
        IrNode {
            literal: Some(value),
            ..IrNode::new(IrKind::Literal)
        }
    }

    pub fn block(children: Vec<IrNode>) -> Self {
        IrNode::with_children(IrKind::Block, children)
    }

    pub fn has_non_empty_symbol_table(&self) -> bool {
        matches!(self.kind, IrKind::Block | IrKind::Loop | IrKind::ArrayComp)
            && !self.declarators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_flags_round_trip() {
        let mut flags = NodeFlags::empty();
        assert!(!flags.contains(NodeFlags::PER_ITERATION_SCOPE));
        flags.insert(NodeFlags::PER_ITERATION_SCOPE | NodeFlags::STRICT);
        assert!(flags.contains(NodeFlags::PER_ITERATION_SCOPE));
        assert!(flags.contains(NodeFlags::STRICT));
        flags.remove(NodeFlags::STRICT);
        assert!(!flags.contains(NodeFlags::STRICT));
    }

    #[test]
    fn block_with_declarators_reports_non_empty_symbol_table() {
        let mut node = IrNode::block(vec![]);
        assert!(!node.has_non_empty_symbol_table());
        node.declarators.push(Declarator::new("x", None));
        assert!(node.has_non_empty_symbol_table());
    }
}

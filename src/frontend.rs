//! A thin real-source-text frontend: parses JavaScript/TypeScript with
//! `oxc_parser` and lowers variable declarations, blocks, C-style and
//! `for-in`/`for-of` loops, `break`/`continue`/`return`, labelled
//! statements, and `try`/`finally` directly into this crate's IR tree.
//!
//! Uses `Parser::new(&allocator, code, source_type).parse()` and iterates
//! `ret.program.body` by matching on `Statement` variants. Anything this
//! frontend doesn't specifically recognize lowers to `IrKind::Opaque`; the
//! test suite drives the transformer's remaining token coverage through
//! hand-built IR fixtures instead.

use crate::diagnostics::{EngineError, ErrorKind, SourcePosition};
use crate::ir::{Declarator, IrKind, IrLiteral, IrNode, LoopShape, NodeFlags};
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    self, BindingPatternKind, ForStatementInit, ForStatementLeft, Statement,
    VariableDeclarationKind,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, Default)]
pub struct FrontendOptions {
    pub strict: bool,
    pub module: bool,
    pub typescript: bool,
    pub jsx: bool,
}

/// Parses `source` and lowers its top-level statement list into a single
/// `Block` IR node.
pub fn parse_to_ir(source: &str, options: FrontendOptions) -> Result<IrNode, EngineError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_typescript(options.typescript)
        .with_module(options.module)
        .with_jsx(options.jsx);

    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(EngineError::new(
            ErrorKind::SyntaxError,
            format!("{} parse error(s) in source", ret.errors.len()),
        ));
    }

    let mut lowering = Lowering { strict: options.strict };
    let body = ret
        .program
        .body
        .iter()
        .map(|stmt| lowering.lower_statement(stmt))
        .collect();
    Ok(IrNode::block(body))
}

struct Lowering {
    strict: bool,
}

impl Lowering {
    fn lower_statement(&mut self, stmt: &Statement) -> IrNode {
        match stmt {
            Statement::VariableDeclaration(decl) => self.lower_var_decl(decl, false),
            Statement::BlockStatement(block) => {
                let children = block.body.iter().map(|s| self.lower_statement(s)).collect();
                IrNode::block(children)
            }
            Statement::ForStatement(for_stmt) => self.lower_for_statement(for_stmt),
            Statement::ForInStatement(for_in) => self.lower_for_in_of(
                &for_in.left,
                &for_in.body,
                LoopShape::ForInOf,
            ),
            Statement::ForOfStatement(for_of) => self.lower_for_in_of(
                &for_of.left,
                &for_of.body,
                LoopShape::ForInOf,
            ),
            Statement::BreakStatement(brk) => {
                let mut node = IrNode::new(IrKind::Break);
                node.name = brk.label.as_ref().map(|l| Rc::from(l.name.as_str()));
                node
            }
            Statement::ContinueStatement(cont) => {
                let mut node = IrNode::new(IrKind::Continue);
                node.name = cont.label.as_ref().map(|l| Rc::from(l.name.as_str()));
                node
            }
            Statement::ReturnStatement(ret) => {
                let children = ret
                    .argument
                    .as_ref()
                    .map(|e| vec![self.lower_expression(e)])
                    .unwrap_or_default();
                IrNode::with_children(IrKind::Return, children)
            }
            Statement::LabeledStatement(labeled) => {
                let body = self.lower_statement(&labeled.body);
                let mut node = IrNode::with_children(IrKind::Label, vec![body]);
                node.name = Some(Rc::from(labeled.label.name.as_str()));
                node
            }
            Statement::TryStatement(try_stmt) => self.lower_try(try_stmt),
            Statement::ExpressionStatement(expr_stmt) => self.lower_expression(&expr_stmt.expression),
            other => self.opaque_statement(other),
        }
    }

    fn lower_try(&mut self, try_stmt: &ast::TryStatement) -> IrNode {
        let mut children = vec![IrNode::block(
            try_stmt.block.body.iter().map(|s| self.lower_statement(s)).collect(),
        )];
        if let Some(handler) = &try_stmt.handler {
            children.push(IrNode::block(
                handler.body.body.iter().map(|s| self.lower_statement(s)).collect(),
            ));
        }
        let mut node = IrNode::with_children(IrKind::Try, children);
        if let Some(finalizer) = &try_stmt.finalizer {
            let mut finally_block = IrNode::block(
                finalizer.body.iter().map(|s| self.lower_statement(s)).collect(),
            );
            // Marker declarator consumed by `transformer::node_has_finally`.
            node.declarators.push(Declarator::new("finally", None));
            finally_block.name = Some(Rc::from("finally"));
            node.children.push(finally_block);
        }
        node
    }

    fn lower_for_statement(&mut self, for_stmt: &ast::ForStatement) -> IrNode {
        let (per_iteration_names, init_node) = match &for_stmt.init {
            Some(ForStatementInit::VariableDeclaration(decl)) => {
                let names = binding_names(decl);
                (Some(names), Some(self.lower_var_decl(decl, false)))
            }
            Some(ForStatementInit::Expression(expr)) => (None, Some(self.lower_expression(expr))),
            _ => (None, None),
        };

        let condition = for_stmt
            .test
            .as_ref()
            .map(|e| self.lower_expression(e))
            .unwrap_or_else(|| IrNode::literal(IrLiteral::Undefined));
        let increment = for_stmt
            .update
            .as_ref()
            .map(|e| self.lower_expression(e))
            .unwrap_or_else(|| IrNode::block(vec![]));
        let body = self.lower_statement(&for_stmt.body);
        let break_marker = IrNode::new(IrKind::Target);

        let mut loop_node =
            IrNode::with_children(IrKind::Loop, vec![body, increment, condition, break_marker]);
        loop_node.loop_shape = Some(LoopShape::CStyle);
        if let Some(names) = &per_iteration_names {
            loop_node.flags.insert(NodeFlags::PER_ITERATION_SCOPE);
            loop_node.per_iteration_names = Some(names.clone());
        }

        match init_node {
            Some(init) => IrNode::block(vec![init, loop_node]),
            None => loop_node,
        }
    }

    fn lower_for_in_of(&mut self, left: &ForStatementLeft, body: &Statement, shape: LoopShape) -> IrNode {
        let names = match left {
            ForStatementLeft::VariableDeclaration(decl) => binding_names(decl),
            _ => vec![],
        };

        let mut loop_body = self.lower_statement(body);
        if let ForStatementLeft::VariableDeclaration(decl) = left {
            // The loop wrapper supplies the TDZ scope; flag so the
            // transformer erases this declaration rather than emitting a
            // redundant SETLETINIT/SETNAME (base spec §4.3).
            let mut decl_node = self.lower_var_decl(decl, true);
            decl_node.flags.insert(NodeFlags::FOR_IN_OF_LOOP_VAR);
            loop_body = IrNode::block(vec![decl_node, loop_body]);
        }

        let condition = IrNode::literal(IrLiteral::Undefined);
        let break_marker = IrNode::new(IrKind::Target);
        let mut loop_node =
            IrNode::with_children(IrKind::Loop, vec![loop_body, condition, break_marker]);
        loop_node.loop_shape = Some(shape);
        if !names.is_empty() {
            loop_node.flags.insert(NodeFlags::PER_ITERATION_SCOPE);
            loop_node.per_iteration_names = Some(names);
        }
        loop_node
    }

    fn lower_var_decl(&mut self, decl: &ast::VariableDeclaration, for_in_of_var: bool) -> IrNode {
        let kind = match decl.kind {
            VariableDeclarationKind::Var => IrKind::Var,
            VariableDeclarationKind::Let => IrKind::Let,
            VariableDeclarationKind::Const => IrKind::Const,
            _ => IrKind::Var,
        };
        let mut node = IrNode::new(kind);
        node.declarators = decl
            .declarations
            .iter()
            .map(|d| {
                let name = binding_name(&d.id.kind).unwrap_or_else(|| Rc::from("$$destructured"));
                let init = d.init.as_ref().map(|e| self.lower_expression(e));
                Declarator::new(name, init)
            })
            .collect();
        if for_in_of_var {
            node.flags.insert(NodeFlags::FOR_IN_OF_LOOP_VAR);
        }
        node
    }

    fn lower_expression(&mut self, expr: &ast::Expression) -> IrNode {
        match expr {
            ast::Expression::Identifier(ident) => {
                IrNode::leaf_name(IrKind::Name, ident.name.as_str())
            }
            ast::Expression::NumericLiteral(lit) => IrNode::literal(IrLiteral::Number(lit.value)),
            ast::Expression::StringLiteral(lit) => {
                IrNode::literal(IrLiteral::String(lit.value.to_string()))
            }
            ast::Expression::AssignmentExpression(assign) => {
                let target_name = assignment_target_name(&assign.left);
                let rhs = self.lower_expression(&assign.right);
                let kind = if self.strict {
                    IrKind::StrictSetName
                } else {
                    IrKind::SetName
                };
                let mut node = IrNode::with_children(kind, vec![rhs]);
                node.name = target_name;
                node
            }
            other => self.opaque_expression(other),
        }
    }

    fn opaque_statement(&mut self, _stmt: &Statement) -> IrNode {
        IrNode::new(IrKind::Opaque)
    }

    fn opaque_expression(&mut self, _expr: &ast::Expression) -> IrNode {
        IrNode::new(IrKind::Opaque)
    }
}

fn binding_name(kind: &BindingPatternKind) -> Option<Rc<str>> {
    match kind {
        BindingPatternKind::BindingIdentifier(id) => Some(Rc::from(id.name.as_str())),
        _ => None,
    }
}

fn binding_names(decl: &ast::VariableDeclaration) -> Vec<Rc<str>> {
    decl.declarations
        .iter()
        .filter_map(|d| binding_name(&d.id.kind))
        .collect()
}

fn assignment_target_name(target: &ast::AssignmentTarget) -> Option<Rc<str>> {
    match target {
        ast::AssignmentTarget::AssignmentTargetIdentifier(id) => Some(Rc::from(id.name.as_str())),
        _ => None,
    }
}

#[allow(dead_code)]
fn source_position_of<T: GetSpan>(node: &T, source: &str) -> SourcePosition {
    let span = node.span();
    let mut line = 1u32;
    let mut column = 1u32;
    for ch in source[..span.start as usize].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    SourcePosition { line, column }
}

//! AstVisitor trait for uniform AST traversal.

use std::ops::ControlFlow;

use swc_ecma_ast::{AssignExpr, BindingIdent, CallExpr, Expr, MemberExpr, VarDeclarator};

use super::context::VisitorContext;

pub trait AstVisitor {
    /// Called for every expression, in document order, before its children.
    fn visit_expr(&mut self, _node: &Expr, _ctx: &VisitorContext) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_var_declarator(
        &mut self,
        _node: &VarDeclarator,
        _ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_assign_expr(&mut self, _node: &AssignExpr, _ctx: &VisitorContext) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_call_expr(&mut self, _node: &CallExpr, _ctx: &VisitorContext) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Member expression written to by an assignment, e.g. `document.cookie = t`.
    fn visit_member_target(
        &mut self,
        _node: &MemberExpr,
        _ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Identifier in binding position: declarators, parameters and assignment targets.
    fn visit_binding_ident(
        &mut self,
        _node: &BindingIdent,
        _ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

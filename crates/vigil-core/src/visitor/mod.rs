//! Visitor pattern for AST traversal.
//!
//! Provides a uniform way to traverse AST nodes with context information.
//! Nodes are visited in document order, parents before children.

mod context;
mod traits;

pub use context::VisitorContext;
pub use traits::AstVisitor;

use std::ops::ControlFlow;

use swc_ecma_ast::Module;
use swc_ecma_visit::{Visit, VisitWith};

struct Walker<'a, V: AstVisitor> {
    visitor: &'a mut V,
    ctx: &'a VisitorContext<'a>,
    stopped: bool,
}

impl<V: AstVisitor> Visit for Walker<'_, V> {
    fn visit_expr(&mut self, node: &swc_ecma_ast::Expr) {
        if self.stopped {
            return;
        }
        if let ControlFlow::Break(()) = self.visitor.visit_expr(node, self.ctx) {
            self.stopped = true;
            return;
        }
        node.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, node: &swc_ecma_ast::VarDeclarator) {
        if self.stopped {
            return;
        }
        if let ControlFlow::Break(()) = self.visitor.visit_var_declarator(node, self.ctx) {
            self.stopped = true;
            return;
        }
        node.visit_children_with(self);
    }

    fn visit_assign_expr(&mut self, node: &swc_ecma_ast::AssignExpr) {
        if self.stopped {
            return;
        }
        if let ControlFlow::Break(()) = self.visitor.visit_assign_expr(node, self.ctx) {
            self.stopped = true;
            return;
        }
        node.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, node: &swc_ecma_ast::CallExpr) {
        if self.stopped {
            return;
        }
        if let ControlFlow::Break(()) = self.visitor.visit_call_expr(node, self.ctx) {
            self.stopped = true;
            return;
        }
        node.visit_children_with(self);
    }

    fn visit_simple_assign_target(&mut self, node: &swc_ecma_ast::SimpleAssignTarget) {
        if self.stopped {
            return;
        }
        if let swc_ecma_ast::SimpleAssignTarget::Member(member) = node {
            if let ControlFlow::Break(()) = self.visitor.visit_member_target(member, self.ctx) {
                self.stopped = true;
                return;
            }
        }
        node.visit_children_with(self);
    }

    fn visit_binding_ident(&mut self, node: &swc_ecma_ast::BindingIdent) {
        if self.stopped {
            return;
        }
        if let ControlFlow::Break(()) = self.visitor.visit_binding_ident(node, self.ctx) {
            self.stopped = true;
            return;
        }
        node.visit_children_with(self);
    }
}

pub fn walk_ast<V: AstVisitor>(module: &Module, visitor: &mut V, ctx: &VisitorContext) {
    let mut walker = Walker {
        visitor,
        ctx,
        stopped: false,
    };
    module.visit_with(&mut walker);
}

//! Per-file data flow graph
//!
//! One pass over a module records, for every assignment, initialized
//! variable declarator and call, an edge keyed by a flow-node-id: a bare
//! identifier name or a two-level `object.property` access. Expressions with
//! no such id are left out of the graph.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

use id_arena::{Arena, Id};
use swc_ecma_ast::{
    AssignExpr, AssignTarget, CallExpr, Callee, Expr, MemberExpr, MemberProp, Module, Pat,
    SimpleAssignTarget, VarDeclarator,
};

use crate::visitor::{AstVisitor, VisitorContext, walk_ast};

pub type FlowNodeId = Id<FlowNode>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataFlowEdge {
    Assignment {
        source: Option<String>,
    },
    Declaration {
        source: Option<String>,
    },
    Call {
        callee: String,
        arguments: Vec<Option<String>>,
    },
}

impl DataFlowEdge {
    /// Flow ids this edge reads from.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            DataFlowEdge::Assignment { source } | DataFlowEdge::Declaration { source } => {
                source.as_deref().into_iter().collect()
            }
            DataFlowEdge::Call { arguments, .. } => {
                arguments.iter().filter_map(|arg| arg.as_deref()).collect()
            }
        }
    }

    fn reads(&self, id: &str) -> bool {
        self.inputs().contains(&id)
    }
}

#[derive(Debug)]
pub struct FlowNode {
    pub id: String,
    pub edge: DataFlowEdge,
}

#[derive(Debug, Default)]
pub struct DataFlowGraph {
    arena: Arena<FlowNode>,
    index: HashMap<String, FlowNodeId>,
}

impl DataFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(module: &Module, ctx: &VisitorContext) -> Self {
        let mut builder = GraphBuilder {
            graph: DataFlowGraph::new(),
        };
        walk_ast(module, &mut builder, ctx);
        builder.graph
    }

    /// Records `edge` for `id`, replacing any earlier edge for the same id.
    pub fn insert(&mut self, id: String, edge: DataFlowEdge) {
        match self.index.get(&id) {
            Some(&node) => self.arena[node].edge = edge,
            None => {
                let node = self.arena.alloc(FlowNode {
                    id: id.clone(),
                    edge,
                });
                self.index.insert(id, node);
            }
        }
    }

    pub fn edge(&self, id: &str) -> Option<&DataFlowEdge> {
        self.index.get(id).map(|&node| &self.arena[node].edge)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.arena.iter().map(|(_, node)| node)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    /// Every id `id` transitively reads from, in discovery order, without duplicates.
    pub fn sources(&self, id: &str) -> Vec<String> {
        let mut sources = Vec::new();
        let mut visited = HashSet::new();
        self.collect_sources(id, &mut sources, &mut visited);
        sources
    }

    fn collect_sources(&self, id: &str, sources: &mut Vec<String>, visited: &mut HashSet<String>) {
        let Some(edge) = self.edge(id) else {
            return;
        };

        for input in edge.inputs() {
            if !visited.insert(input.to_string()) {
                continue;
            }
            sources.push(input.to_string());
            self.collect_sources(input, sources, visited);
        }
    }

    /// Every id that transitively reads from `id`, in graph insertion order.
    pub fn sinks(&self, id: &str) -> Vec<String> {
        let mut sinks = Vec::new();
        let mut visited = HashSet::new();
        self.collect_sinks(id, &mut sinks, &mut visited);
        sinks
    }

    fn collect_sinks(&self, id: &str, sinks: &mut Vec<String>, visited: &mut HashSet<String>) {
        for node in self.nodes() {
            if !node.edge.reads(id) || !visited.insert(node.id.clone()) {
                continue;
            }
            sinks.push(node.id.clone());
            self.collect_sinks(&node.id, sinks, visited);
        }
    }
}

/// Flow-node-id of an expression: `name` for identifiers, `object.property`
/// for a static member access on an identifier.
pub fn flow_id(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::Member(member) => member_flow_id(member),
        _ => None,
    }
}

fn member_flow_id(member: &MemberExpr) -> Option<String> {
    match (member.obj.as_ref(), &member.prop) {
        (Expr::Ident(object), MemberProp::Ident(property)) => {
            Some(format!("{}.{}", object.sym, property.sym))
        }
        _ => None,
    }
}

pub fn target_flow_id(target: &AssignTarget) -> Option<String> {
    match target {
        AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
            Some(binding.id.sym.to_string())
        }
        AssignTarget::Simple(SimpleAssignTarget::Member(member)) => member_flow_id(member),
        _ => None,
    }
}

pub fn callee_flow_id(call: &CallExpr) -> Option<String> {
    match &call.callee {
        Callee::Expr(expr) => flow_id(expr),
        _ => None,
    }
}

struct GraphBuilder {
    graph: DataFlowGraph,
}

impl AstVisitor for GraphBuilder {
    fn visit_var_declarator(&mut self, node: &VarDeclarator, _ctx: &VisitorContext) -> ControlFlow<()> {
        if let (Pat::Ident(binding), Some(init)) = (&node.name, &node.init) {
            self.graph.insert(
                binding.id.sym.to_string(),
                DataFlowEdge::Declaration {
                    source: flow_id(init),
                },
            );
        }
        ControlFlow::Continue(())
    }

    fn visit_assign_expr(&mut self, node: &AssignExpr, _ctx: &VisitorContext) -> ControlFlow<()> {
        if let Some(target) = target_flow_id(&node.left) {
            self.graph.insert(
                target,
                DataFlowEdge::Assignment {
                    source: flow_id(&node.right),
                },
            );
        }
        ControlFlow::Continue(())
    }

    fn visit_call_expr(&mut self, node: &CallExpr, _ctx: &VisitorContext) -> ControlFlow<()> {
        if let Some(callee) = callee_flow_id(node) {
            let arguments = node.args.iter().map(|arg| flow_id(&arg.expr)).collect();
            self.graph.insert(
                callee.clone(),
                DataFlowEdge::Call { callee, arguments },
            );
        }
        ControlFlow::Continue(())
    }
}

//! Helpers for building trees programmatically

use crate::tree::{NodeId, NodeKind, Tree};

impl Tree {
    /// Node carrying a string payload and no children
    pub fn leaf(&mut self, kind: NodeKind, text: &str) -> NodeId {
        let id = self.alloc(kind);
        self[id].string = Some(text.to_owned());
        id
    }

    /// Bare identifier `name`
    pub fn ident(&mut self, name: &str) -> NodeId {
        self.leaf(NodeKind::Ident, name)
    }

    /// Node of `kind` over `children`, in order
    pub fn branch(&mut self, kind: NodeKind, children: &[NodeId]) -> NodeId {
        let id = self.alloc(kind);
        for &child in children {
            self.add(id, child);
        }
        id
    }

    /// `a::b::c`; a leading empty segment makes the path global
    pub fn qualified(&mut self, path: &[&str]) -> NodeId {
        let segments: Vec<NodeId> = path
            .iter()
            .map(|segment| {
                if segment.is_empty() {
                    self.alloc(NodeKind::Global)
                } else {
                    self.ident(segment)
                }
            })
            .collect();
        self.branch(NodeKind::QualifiedIdent, &segments)
    }

    /// Literal of builtin type `constant_type`
    pub fn constant(&mut self, text: &str, constant_type: &str) -> NodeId {
        let id = self.leaf(NodeKind::Const, text);
        self[id].constant_type = Some(constant_type.to_owned());
        id
    }

    /// Symbol literal, `#name`
    pub fn symbol_literal(&mut self, name: &str) -> NodeId {
        self.leaf(NodeKind::Const, &format!("#{name}"))
    }

    /// Operator application; either operand may be absent for unary forms
    pub fn op(&mut self, lhs: Option<NodeId>, operator: &str, rhs: Option<NodeId>) -> NodeId {
        let token = self.symbol_literal(operator);
        let id = self.alloc(NodeKind::Op);
        if let Some(lhs) = lhs {
            self.add(id, lhs);
        }
        self[id].op_index = self[id].children.len();
        self.add(id, token);
        if let Some(rhs) = rhs {
            self.add(id, rhs);
        }
        id
    }

    /// Binary operator application `lhs operator rhs`
    pub fn binary(&mut self, lhs: NodeId, operator: &str, rhs: NodeId) -> NodeId {
        self.op(Some(lhs), operator, Some(rhs))
    }

    /// Formal argument `name`, optionally typed by a qualified path
    pub fn arg(&mut self, name: &str, ty: Option<&[&str]>) -> NodeId {
        let ident = self.ident(name);
        let mut children = vec![ident];
        if let Some(path) = ty {
            children.push(self.qualified(path));
        }
        self.branch(NodeKind::Arg, &children)
    }

    /// Function definition `name(formals) body`
    pub fn function(&mut self, name: &[&str], formals: &[NodeId], body: NodeId) -> NodeId {
        let qid = self.qualified(name);
        let mut children = vec![qid];
        children.extend_from_slice(formals);
        children.push(body);
        self.branch(NodeKind::DefFun, &children)
    }

    /// Variable definition `name = init`
    pub fn define(&mut self, name: &str, init: Option<NodeId>) -> NodeId {
        let ident = self.ident(name);
        let mut children = vec![ident];
        children.extend(init);
        self.branch(NodeKind::DefIdent, &children)
    }

    /// Type definition `name params... = body`
    pub fn type_def(&mut self, name: &str, rest: &[NodeId]) -> NodeId {
        let ident = self.ident(name);
        let mut children = vec![ident];
        children.extend_from_slice(rest);
        self.branch(NodeKind::DefType, &children)
    }

    /// Module qualifier statement
    pub fn in_module(&mut self, name: &str) -> NodeId {
        let ident = self.ident(name);
        self.branch(NodeKind::InModule, &[ident])
    }
}

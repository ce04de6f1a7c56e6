//! Tree → IR lowering
//!
//! Lowering runs bottom-up: every node gets a result value (`Node::rval`),
//! an assignable location where it has one (`Node::lval`) and an instruction
//! sequence built from its children's sequences. Function definitions turn
//! into closures as they are met; top-level statements are collected into
//! their module's initializer, and [`lower`] finally wires every initializer
//! into one program entry.

#![allow(
    clippy::panic,
    reason = "Unresolved or unscoped nodes are compiler bugs and abort the compilation"
)]
#![allow(
    clippy::multiple_inherent_impl,
    reason = "Lowering is split by construct across modules"
)]

mod op;
mod program;

use rustc_hash::FxHashMap;
use wr_hir::{Builtin, Context, NodeId, NodeKind, ScopeId, SymbolId};
use wr_ir::{Closure, Code, CodeKind, Program};

/// Lower the resolved, typed and labelled forest `roots`, whose top-level
/// code belongs to `module`, into a program
///
/// # Panics
///
/// When a node reaches lowering without the symbol or scope an earlier pass
/// should have given it.
#[must_use]
pub fn lower(ctx: &mut Context, roots: &[NodeId], module: SymbolId) -> Program {
    let mut lowering = LoweringContext::new(ctx);
    for &root in roots {
        lowering.lower_root(root, module);
    }
    lowering.finish()
}

/// State of one lowering run
pub(crate) struct LoweringContext<'ctx> {
    ctx: &'ctx mut Context,
    /// Instructions generated for each lowered node, taken by its parent
    code: FxHashMap<NodeId, Vec<Code>>,
    /// Finished function closures in lowering order
    closures: Vec<Closure>,
    /// Statements collected for each module initializer
    inits: FxHashMap<SymbolId, Vec<Code>>,
}

impl<'ctx> LoweringContext<'ctx> {
    fn new(ctx: &'ctx mut Context) -> Self {
        Self {
            ctx,
            code: FxHashMap::default(),
            closures: Vec::new(),
            inits: FxHashMap::default(),
        }
    }

    fn take_code(&mut self, node: NodeId) -> Vec<Code> {
        self.code.remove(&node).unwrap_or_default()
    }

    fn scope_of(&self, node: NodeId) -> ScopeId {
        match self.ctx.tree[node].scope {
            Some(scope) => scope,
            None => panic!(
                "internal error: {} node reached lowering unscoped",
                self.ctx.tree[node].kind
            ),
        }
    }

    fn sym_of(&self, node: NodeId) -> SymbolId {
        match self.ctx.tree[node].sym {
            Some(sym) => sym,
            None => panic!(
                "internal error: {} node reached lowering unresolved",
                self.ctx.tree[node].kind
            ),
        }
    }

    /// Value of an operand that must produce one
    fn value_of(&self, node: NodeId) -> SymbolId {
        match self.ctx.tree[node].rval {
            Some(value) => value,
            None => panic!(
                "internal error: {} node used as a value has none",
                self.ctx.tree[node].kind
            ),
        }
    }

    /// Fresh temporary evaluated where `node` is
    fn temp_at(&mut self, node: NodeId) -> SymbolId {
        let scope = self.scope_of(node);
        self.ctx.temp(scope)
    }

    /// Lower `node` and everything below it; `function` is the innermost
    /// enclosing function, if any
    fn lower_node(&mut self, node: NodeId, function: Option<SymbolId>) {
        let children = self.ctx.tree[node].children.clone();
        let inner = match self.ctx.tree[node].kind {
            NodeKind::DefFun => Some(self.sym_of(node)),
            _ => function,
        };
        for &child in &children {
            self.lower_node(child, inner);
        }

        let mut code = Vec::new();
        let kind = self.ctx.tree[node].kind;
        match kind {
            NodeKind::DefFun => self.lower_function(node, &children, &mut code),
            NodeKind::DefIdent => self.lower_definition(node, &children, &mut code),
            NodeKind::Pattern => {
                let group = self.sym_of(node);
                self.ctx.symbols[group].pattern = true;
                self.ctx.tree[node].rval = Some(group);
            }
            NodeKind::Const | NodeKind::Arg | NodeKind::Vararg => {
                self.ctx.tree[node].rval = Some(self.sym_of(node));
            }
            NodeKind::List | NodeKind::Vector | NodeKind::Object => {
                self.lower_collection(node, &children, &mut code);
            }
            NodeKind::Scope | NodeKind::Block => {
                for &child in &children {
                    code.extend(self.take_code(child));
                }
                self.ctx.tree[node].rval = children.last().and_then(|&last| self.ctx.tree[last].rval);
            }
            NodeKind::QualifiedIdent => {
                let sym = self.sym_of(node);
                let lowered = &mut self.ctx.tree[node];
                lowered.lval = Some(sym);
                lowered.rval = Some(sym);
            }
            NodeKind::Loop => self.lower_loop(node, &children, &mut code),
            NodeKind::If => self.lower_if(node, &children, &mut code),
            NodeKind::Op => self.lower_op(node, &children, &mut code),
            NodeKind::Label => {
                if let Some(label) = self.ctx.tree[node].label[0] {
                    code.push(Code::label(label, Some(node)));
                }
            }
            NodeKind::Break | NodeKind::Continue | NodeKind::Goto => {
                if let Some(label) = self.ctx.tree[node].label[0] {
                    code.push(Code::goto(label, Some(node)));
                }
            }
            NodeKind::Return => self.lower_return(node, &children, function, &mut code),
            _ => match children.as_slice() {
                [only] => {
                    code = self.take_code(*only);
                    self.ctx.tree[node].rval = self.ctx.tree[*only].rval;
                }
                _ => {
                    for &child in &children {
                        code.extend(self.take_code(child));
                    }
                }
            },
        }
        if !code.is_empty() {
            self.code.insert(node, code);
        }
    }

    fn lower_function(&mut self, node: NodeId, children: &[NodeId], code: &mut Vec<Code>) {
        let sym = self.sym_of(node);
        let Some((&body, formals)) = children.split_last() else {
            panic!("internal error: function without a body");
        };
        let (Some(cont), Some(ret)) = (self.ctx.symbols[sym].cont, self.ctx.symbols[sym].ret)
        else {
            panic!("internal error: function lowered before it was declared");
        };

        let mut instructions = self.take_code(body);
        if let Some(value) = self.ctx.tree[body].rval {
            instructions.push(Code::mov(value, ret, Some(node)));
        }
        if let Some(label) = self.ctx.tree[node].label[0] {
            instructions.push(Code::label(label, Some(node)));
        }
        let reply = self.ctx.builtin(Builtin::Reply);
        instructions.push(Code::send(vec![reply, cont, ret], Vec::new(), Some(node)));

        let name = self.ctx.name_of(sym).unwrap_or_default().to_owned();
        let mut params = vec![self.ctx.make_symbol(&name)];
        params.extend(formals.iter().skip(1).map(|&formal| self.value_of(formal)));
        tracing::debug!(function = %name, instructions = instructions.len(), "lowered function");
        self.closures.push(Closure {
            sym,
            params,
            body: instructions,
        });

        let closure = self.temp_at(node);
        code.push(Code::mov(sym, closure, Some(node)));
        self.ctx.tree[node].rval = Some(closure);
    }

    fn lower_definition(&mut self, node: NodeId, children: &[NodeId], code: &mut Vec<Code>) {
        let sym = self.sym_of(node);
        let init = children.get(1).copied();
        // A label target brackets its initializer unless a loop carries the labels
        let bracket = self.ctx.tree[node].def_ident_label
            && init.is_none_or(|init| self.ctx.tree[init].kind != NodeKind::Loop);
        let [entry, exit] = self.ctx.tree[node].label;
        if bracket {
            code.extend(entry.map(|label| Code::label(label, Some(node))));
        }
        if let Some(init) = init {
            code.extend(self.take_code(init));
            if let Some(value) = self.ctx.tree[init].rval {
                code.push(Code::mov(value, sym, Some(node)));
            }
        }
        if bracket {
            code.extend(exit.map(|label| Code::label(label, Some(node))));
        }
        self.ctx.tree[node].rval = Some(sym);
    }

    fn lower_collection(&mut self, node: NodeId, children: &[NodeId], code: &mut Vec<Code>) {
        for &child in children {
            code.extend(self.take_code(child));
        }
        let constructor = match (self.ctx.tree[node].kind, children.is_empty()) {
            (NodeKind::Object, true) => Builtin::MakeSet,
            (NodeKind::Object, false) | (NodeKind::List, true) => Builtin::MakeTuple,
            (NodeKind::List, false) => Builtin::MakeList,
            (NodeKind::Vector, _) => Builtin::MakeVector,
            (kind, _) => panic!("internal error: {kind} is not a collection literal"),
        };
        let mut args = vec![self.ctx.builtin(constructor)];
        args.extend(children.iter().map(|&child| self.value_of(child)));
        let result = self.temp_at(node);
        code.push(Code::send(args, vec![result], Some(node)));
        self.ctx.tree[node].rval = Some(result);
    }

    fn lower_loop(&mut self, node: NodeId, children: &[NodeId], code: &mut Vec<Code>) {
        let Some(cond) = self.ctx.tree.child(node, NodeKind::LoopCond) else {
            panic!("internal error: loop without a condition");
        };
        // A loop holding only its condition has no body to test after
        let post_test = children.len() > 1 && children.last() == Some(&cond);
        let body_index = if post_test {
            children.len().checked_sub(2)
        } else {
            children.len().checked_sub(1)
        };
        let body = body_index
            .and_then(|index| children.get(index).copied())
            .filter(|&body| body != cond);
        let before = if children.len() > 2 {
            self.take_code(children[0])
        } else {
            Vec::new()
        };
        let [continue_label, break_label] = self.ctx.tree[node].label;
        let kind = CodeKind::Loop {
            continue_label,
            break_label,
            post_test,
            before,
            cond_code: self.take_code(cond),
            cond: self.ctx.tree[cond].rval,
            body: body.map(|body| self.take_code(body)).unwrap_or_default(),
        };
        code.push(Code::new(kind, Some(node)));
        self.ctx.tree[node].rval = body.and_then(|body| self.ctx.tree[body].rval);
    }

    fn lower_if(&mut self, node: NodeId, children: &[NodeId], code: &mut Vec<Code>) {
        let [cond, then, rest @ ..] = children else {
            panic!("internal error: if without a branch");
        };
        let otherwise = rest.first().copied();
        let result = self.temp_at(node);
        let kind = CodeKind::If {
            cond_code: self.take_code(*cond),
            cond: self.ctx.tree[*cond].rval,
            then_code: self.take_code(*then),
            then_value: self.ctx.tree[*then].rval,
            else_code: otherwise.map(|node| self.take_code(node)).unwrap_or_default(),
            else_value: otherwise.and_then(|node| self.ctx.tree[node].rval),
            result,
        };
        code.push(Code::new(kind, Some(node)));
        self.ctx.tree[node].rval = Some(result);
    }

    fn lower_return(
        &mut self,
        node: NodeId,
        children: &[NodeId],
        function: Option<SymbolId>,
        code: &mut Vec<Code>,
    ) {
        let ret = function.and_then(|function| self.ctx.symbols[function].ret);
        if let Some(&value) = children.first() {
            code.extend(self.take_code(value));
            if let (Some(result), Some(ret)) = (self.ctx.tree[value].rval, ret) {
                code.push(Code::mov(result, ret, Some(node)));
            }
        }
        if let Some(label) = self.ctx.tree[node].label[0] {
            code.push(Code::goto(label, Some(node)));
        }
    }
}

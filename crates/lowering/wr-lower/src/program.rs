//! Module initializers and the program entry

use crate::LoweringContext;
use std::mem;
use wr_hir::{Builtin, NodeId, NodeKind, ScopeKind, SymbolId};
use wr_ir::{Closure, Code, Program};

impl LoweringContext<'_> {
    /// Lower the statements of a top-level container into `module`'s
    /// initializer
    pub(crate) fn lower_root(&mut self, root: NodeId, module: SymbolId) {
        let init = self.init_of(module);
        self.collect(root, init);
    }

    fn init_of(&self, module: SymbolId) -> SymbolId {
        match self.ctx.symbols[module].init {
            Some(init) => init,
            None => panic!("internal error: module without an initializer"),
        }
    }

    /// Lower every statement below `node` into initializer `init`
    ///
    /// Returns the initializer in effect after the last statement, since a
    /// module qualifier switches it for the statements that follow.
    fn collect(&mut self, node: NodeId, mut init: SymbolId) -> SymbolId {
        let children = self.ctx.tree[node].children.clone();
        for child in children {
            match self.ctx.tree[child].kind {
                NodeKind::InModule => init = self.init_of(self.sym_of(child)),
                NodeKind::Block => init = self.collect(child, init),
                NodeKind::DefType | NodeKind::DeclareIdent => {}
                _ => {
                    self.lower_node(child, None);
                    let code = self.take_code(child);
                    self.inits.entry(init).or_default().extend(code);
                    let block = match self.ctx.symbols[init].ast {
                        Some(block) => block,
                        None => {
                            let block = self.ctx.tree.alloc(NodeKind::Block);
                            self.ctx.symbols[init].ast = Some(block);
                            block
                        }
                    };
                    self.ctx.tree.add(block, child);
                    self.ctx.symbols[init].ret = self.ctx.tree[child].rval;
                }
            }
        }
        init
    }

    /// Close every module initializer and synthesize the entry that runs them
    pub(crate) fn finish(mut self) -> Program {
        let modules = self.ctx.modules.clone();
        let mut closures = mem::take(&mut self.closures);
        for &module in &modules {
            let init = self.init_of(module);
            let body = self.inits.remove(&init).unwrap_or_default();
            closures.push(self.replying_closure(init, body));
        }

        let entry = self.ctx.builtin(Builtin::Init);
        let parent = self.ctx.symbols[entry]
            .ast
            .and_then(|ast| self.ctx.tree[ast].scope)
            .unwrap_or_else(|| self.ctx.scopes.global());
        let scope = self.ctx.scopes.create(parent, ScopeKind::Recursive, Some(entry));
        self.ctx.symbols[entry].scope = Some(scope);

        let calls = self.ctx.tree.alloc(NodeKind::Block);
        let mut body = Vec::new();
        for &module in &modules {
            let init = self.init_of(module);
            let result = self.ctx.temp(scope);
            let call = self.ctx.call_node(init, &[]);
            self.ctx.tree.add(calls, call);
            body.push(Code::send(vec![init], vec![result], Some(call)));
        }
        closures.push(self.replying_closure(entry, body));
        self.ctx.symbols[entry].ast = Some(calls);

        tracing::debug!(
            closures = closures.len(),
            modules = modules.len(),
            "built program"
        );
        Program { closures, entry }
    }

    /// No-argument closure running `body`, then replying null
    fn replying_closure(&mut self, function: SymbolId, mut body: Vec<Code>) -> Closure {
        let Some(scope) = self.ctx.symbols[function].scope else {
            panic!("internal error: initializer without a scope");
        };
        let null = self.ctx.builtin(Builtin::Null);
        let reply = self.ctx.builtin(Builtin::Reply);
        let cont = self.ctx.temp(scope);
        self.ctx.symbols[function].cont = Some(cont);
        self.ctx.symbols[function].ret = Some(null);
        body.push(Code::send(vec![reply, cont, null], Vec::new(), None));

        let name = self.ctx.name_of(function).unwrap_or_default().to_owned();
        let params = vec![self.ctx.make_symbol(&name)];
        Closure {
            sym: function,
            params,
            body,
        }
    }
}

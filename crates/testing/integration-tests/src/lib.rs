//! Integration test utilities for the Wren front end
//!
//! Trees are built programmatically, the way a parser would hand them over,
//! and compiled through the driver.

use wr_driver::{CompileError, CompileOptions};
use wr_hir::{CollectSink, Context, NodeId, NodeKind, ScopeKind, SymbolId};
use wr_ir::Program;

/// Test fixture helper
pub struct TestFixture {
    /// Compilation state
    pub ctx: Context,
    /// Every diagnostic reported during the run
    pub sink: CollectSink,
    /// Top-level containers, in order
    pub roots: Vec<NodeId>,
    /// Options passed to the driver
    pub options: CompileOptions,
}

impl TestFixture {
    /// Creates a new test fixture
    #[must_use]
    pub fn new() -> Self {
        let sink = CollectSink::new();
        Self {
            ctx: Context::with_sink(Box::new(sink.clone())),
            sink,
            roots: Vec::new(),
            options: CompileOptions::default(),
        }
    }

    /// Adds a top-level block holding `statements`
    pub fn root(&mut self, statements: &[NodeId]) -> NodeId {
        let root = self.ctx.tree.branch(NodeKind::Block, statements);
        self.roots.push(root);
        root
    }

    /// Runs the whole pipeline over the roots added so far
    ///
    /// # Errors
    ///
    /// Returns the first resolution error
    pub fn compile(&mut self) -> Result<Program, CompileError> {
        wr_driver::compile(&mut self.ctx, &self.roots, &self.options)
    }

    /// Symbol bound to `node`
    ///
    /// # Panics
    ///
    /// If the node was never resolved
    #[must_use]
    pub fn sym(&self, node: NodeId) -> SymbolId {
        match self.ctx.tree[node].sym {
            Some(sym) => sym,
            None => panic!("{} node is unresolved", self.ctx.tree[node].kind),
        }
    }

    /// Type a type definition stands for once aliases are collapsed
    #[must_use]
    pub fn representative(&self, node: NodeId) -> SymbolId {
        self.ctx.symbols.unalias(self.sym(node))
    }

    /// Supertypes of the type defined by `node`
    #[must_use]
    pub fn implements(&self, node: NodeId) -> Vec<SymbolId> {
        let sym = self.representative(node);
        self.ctx.symbols[sym].implements.iter().copied().collect()
    }

    /// Initializer of the first registered module
    #[must_use]
    pub fn user_init(&self) -> SymbolId {
        match self.ctx.modules.first().and_then(|&module| self.ctx.symbols[module].init) {
            Some(init) => init,
            None => panic!("no module was registered"),
        }
    }

    /// Program text with temporaries renumbered in order of appearance
    #[must_use]
    pub fn render(&self, program: &Program) -> String {
        normalize_temps(&program.render(&self.ctx.symbols, &self.ctx.interner))
    }

    /// `callee ^^ arg ^^ ...`, or a postfix `callee ^^` without arguments
    pub fn call(&mut self, callee: &str, args: &[&str]) -> NodeId {
        let mut call = self.ctx.tree.qualified(&[callee]);
        for arg in args {
            let operand = self.ctx.tree.qualified(&[arg]);
            call = self.ctx.tree.binary(call, "^^", operand);
        }
        if args.is_empty() {
            call = self.ctx.tree.op(Some(call), "^^", None);
        }
        call
    }

    /// Parameterless function `name` whose body is `body`
    pub fn function(&mut self, name: &str, body: NodeId) -> NodeId {
        self.ctx.tree.function(&[name], &[], body)
    }

    /// Scope marker of `kind` around `statements`
    pub fn scope(&mut self, kind: ScopeKind, statements: &[NodeId]) -> NodeId {
        let marker = self.ctx.tree.branch(NodeKind::Scope, statements);
        self.ctx.tree[marker].scope_kind = kind;
        marker
    }

    /// `name = record { implements parent }`
    pub fn record_implementing(&mut self, name: &str, parent: &str) -> NodeId {
        let head = self.ctx.tree.qualified(&[parent]);
        let implements = self.ctx.tree.branch(NodeKind::Implements, &[head]);
        let body = self.ctx.tree.branch(NodeKind::RecordType, &[implements]);
        self.ctx.tree.type_def(name, &[body])
    }

    /// `while true { body }`
    pub fn forever(&mut self, body: &[NodeId]) -> NodeId {
        let flag = self.ctx.tree.constant("true", "bool");
        let cond = self.ctx.tree.branch(NodeKind::LoopCond, &[flag]);
        let block = self.ctx.tree.branch(NodeKind::Block, body);
        self.ctx.tree.branch(NodeKind::Loop, &[cond, block])
    }

    /// `break` or `break target`
    pub fn break_to(&mut self, target: Option<&str>) -> NodeId {
        let children: Vec<NodeId> = target
            .map(|name| self.ctx.tree.ident(name))
            .into_iter()
            .collect();
        self.ctx.tree.branch(NodeKind::Break, &children)
    }

    /// `target: init`, a definition breaks and continues may name
    pub fn labelled(&mut self, target: &str, init: NodeId) -> NodeId {
        let def = self.ctx.tree.define(target, Some(init));
        self.ctx.tree[def].def_ident_label = true;
        def
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace every `%N` temporary with `%tK`, numbered by first appearance
#[must_use]
pub fn normalize_temps(text: &str) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' || !chars.peek().is_some_and(char::is_ascii_digit) {
            out.push(ch);
            continue;
        }
        let mut digits = String::new();
        while let Some(&digit) = chars.peek().filter(|ch| ch.is_ascii_digit()) {
            digits.push(digit);
            chars.next();
        }
        let index = match seen.iter().position(|known| *known == digits) {
            Some(index) => index,
            None => {
                seen.push(digits);
                seen.len() - 1
            }
        };
        out.push_str(&format!("%t{index}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_temps() {
        assert_eq!(
            normalize_temps("move %12 -> %3\nsend reply %3 %12 %120"),
            "move %t0 -> %t1\nsend reply %t1 %t0 %t2"
        );
        assert_eq!(normalize_temps("100% done"), "100% done");
    }
}

//! Per-compilation state threaded through every pass

use crate::{
    Builtin, Builtins, DiagnosticSink, LabelId, LabelMap, LogSink, NodeId, NodeKind,
    ResolutionError, ScopeId, ScopeKind, ScopeTree, SymbolId, SymbolTable, Tree,
};
use wr_intern::Interner;

/// Everything one compilation owns: the tree, the scope graph, the symbol
/// table, the builtin table, label counters and the diagnostic sink
pub struct Context {
    /// Identifier and literal text
    pub interner: Interner,
    /// Every node handed over by the parser or synthesized since
    pub tree: Tree,
    /// Scope graph rooted at the global scope
    pub scopes: ScopeTree,
    /// Every symbol of the compilation
    pub symbols: SymbolTable,
    /// Pre-allocated builtin symbols
    pub builtins: Builtins,
    /// Modules whose initializers the program entry runs, in registration order
    pub modules: Vec<SymbolId>,
    /// Log every symbol as it is bound
    pub trace_symbols: bool,
    sink: Box<dyn DiagnosticSink>,
    next_label: u32,
}

impl Context {
    /// Fresh context whose diagnostics are logged
    #[must_use]
    pub fn new() -> Self {
        Self::with_sink(Box::new(LogSink))
    }

    /// Fresh context reporting diagnostics to `sink`
    #[must_use]
    pub fn with_sink(sink: Box<dyn DiagnosticSink>) -> Self {
        let interner = Interner::new();
        let mut symbols = SymbolTable::new();
        let builtins = Builtins::new(&mut symbols, &interner);
        Self {
            interner,
            tree: Tree::new(),
            scopes: ScopeTree::new(),
            symbols,
            builtins,
            modules: Vec::new(),
            trace_symbols: false,
            sink,
            next_label: 0,
        }
    }

    /// Hand `error` to the diagnostic sink and give it back for propagation
    pub fn report(&mut self, error: ResolutionError) -> ResolutionError {
        self.sink.report(&error);
        error
    }

    /// Next unused instruction label
    pub fn alloc_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    /// Symbol of `builtin`
    #[must_use]
    pub fn builtin(&self, builtin: Builtin) -> SymbolId {
        self.builtins.sym(builtin)
    }

    /// Name of `sym`, if it has one
    #[must_use]
    pub fn name_of(&self, sym: SymbolId) -> Option<&str> {
        self.symbols[sym].name.map(|name| self.interner.resolve(name))
    }

    /// The interned symbol literal `#text`
    pub fn make_symbol(&mut self, text: &str) -> SymbolId {
        let name = self.interner.intern(text);
        let ty = self.builtins.sym(Builtin::Symbol);
        self.symbols.symbol_literal(name, ty)
    }

    /// Anonymous symbol evaluated in `scope`
    ///
    /// Temporaries at module level belong to the module's initializer rather
    /// than to the module itself.
    pub fn temp(&mut self, scope: ScopeId) -> SymbolId {
        let sym = self.symbols.alloc(None);
        let owner = self.scopes[scope].owner;
        self.symbols[sym].owner = match owner {
            Some(owner) if self.symbols[owner].is_module => self.symbols[owner].init,
            _ => owner,
        };
        if self.trace_symbols {
            tracing::trace!(?sym, ?scope, "new temporary");
        }
        sym
    }

    /// Bind `name` in `scope`, to `existing` if given or to a fresh symbol
    ///
    /// Binding the symbol a name already has is a no-op.
    ///
    /// # Errors
    ///
    /// `DuplicateIdentifier` when `name` is bound to another symbol in this
    /// very scope.
    ///
    /// # Panics
    ///
    /// When the scope changes between the lookup and the insertion.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        existing: Option<SymbolId>,
        site: Option<NodeId>,
    ) -> Result<SymbolId, ResolutionError> {
        let interned = self.interner.intern(name);
        if let Some(bound) = self.scopes.get_local(scope, interned) {
            if Some(bound) == existing {
                return Ok(bound);
            }
            let location = site.and_then(|site| self.tree[site].location);
            return Err(self.report(ResolutionError::DuplicateIdentifier {
                name: name.to_owned(),
                location,
            }));
        }

        let sym = match existing {
            Some(sym) => {
                assert!(
                    !self.symbols[sym].owned,
                    "internal error: symbol '{name}' is already owned by a scope"
                );
                sym
            }
            None => self.symbols.alloc(Some(interned)),
        };
        let position = site.and_then(|site| {
            let node = &self.tree[site];
            match node.kind {
                NodeKind::DefIdent | NodeKind::DeclareIdent | NodeKind::DefFun => node.order,
                _ => None,
            }
        });
        if self.scopes.insert(scope, interned, sym, position).is_err() {
            panic!("internal error: '{name}' bound while declaring it");
        }

        let owner = self.scopes[scope].owner;
        let symbol = &mut self.symbols[sym];
        symbol.owned = true;
        symbol.owner = owner;
        if self.trace_symbols {
            tracing::trace!(?sym, name, ?scope, "new symbol");
        }
        Ok(sym)
    }

    /// Create module `name` with its scope, label map and initializer
    ///
    /// # Errors
    ///
    /// `DuplicateIdentifier` when `name` is bound to something else.
    pub fn make_module(
        &mut self,
        name: &str,
        existing: Option<SymbolId>,
    ) -> Result<SymbolId, ResolutionError> {
        let global = self.scopes.global();
        let sym = self.declare(global, name, existing, None)?;
        let system = self.builtins.sym(Builtin::System);
        let scope = self.scopes.create(global, ScopeKind::Recursive, Some(sym));
        if sym != system {
            if let Some(system_scope) = self.symbols[system].scope {
                self.scopes.add_dynamic(scope, system_scope);
            }
        }
        let module_ty = self.builtins.sym(Builtin::Module);
        let symbol = &mut self.symbols[sym];
        symbol.ty = Some(module_ty);
        symbol.is_module = true;
        symbol.scope = Some(scope);
        symbol.labels = Some(LabelMap::default());

        let init = self.declare(scope, "__init", None, None)?;
        let init_scope = self.scopes.create(scope, ScopeKind::Recursive, Some(init));
        let function_ty = self.builtins.sym(Builtin::Function);
        self.symbols[init].scope = Some(init_scope);
        self.symbols[init].ty = Some(function_ty);
        self.symbols[sym].init = Some(init);

        if sym != system {
            self.modules.push(sym);
        }
        tracing::debug!(module = name, "created module");
        Ok(sym)
    }

    /// The module `name`, created on first mention
    ///
    /// # Errors
    ///
    /// `DuplicateIdentifier` when `name` is bound to something else.
    ///
    /// # Panics
    ///
    /// When `existing` differs from the module already registered.
    pub fn in_module(
        &mut self,
        name: &str,
        existing: Option<SymbolId>,
    ) -> Result<SymbolId, ResolutionError> {
        let global = self.scopes.global();
        let found = self
            .interner
            .get(name)
            .and_then(|interned| self.scopes.get_local(global, interned))
            .filter(|&sym| self.symbols[sym].is_module && self.symbols[sym].scope.is_some());
        let Some(sym) = found else {
            return self.make_module(name, existing);
        };
        assert!(
            existing.is_none_or(|existing| existing == sym),
            "internal error: module '{name}' bound to two symbols"
        );
        if !self.modules.contains(&sym) {
            self.modules.push(sym);
        }
        Ok(sym)
    }

    fn node_scope(&self, node: NodeId) -> ScopeId {
        match self.tree[node].scope {
            Some(scope) => scope,
            None => panic!(
                "internal error: {} node resolved before it was scoped",
                self.tree[node].kind
            ),
        }
    }

    /// Scope named by every segment of a qualified identifier but the last
    ///
    /// # Errors
    ///
    /// `UnresolvedQualifier` when a segment names nothing with a scope.
    ///
    /// # Panics
    ///
    /// When `qid` has no segments.
    pub fn qualified_scope(&mut self, qid: NodeId) -> Result<ScopeId, ResolutionError> {
        let mut scope = self.node_scope(qid);
        let segments = self.tree[qid].children.clone();
        let Some((_, qualifiers)) = segments.split_last() else {
            panic!("internal error: empty qualified identifier");
        };
        let mut qualifiers = qualifiers;
        if let Some((&first, rest)) = qualifiers.split_first() {
            if self.tree[first].kind == NodeKind::Global {
                scope = self.scopes.global();
                qualifiers = rest;
            }
        }
        for &segment in qualifiers {
            let text = self.tree[segment].string.clone().unwrap_or_default();
            let next = self
                .interner
                .get(&text)
                .and_then(|name| self.scopes.lookup(scope, name, None))
                .and_then(|sym| self.symbols[sym].scope);
            match next {
                Some(next) => scope = next,
                None => {
                    let location = self.tree[qid].location;
                    return Err(self.report(ResolutionError::UnresolvedQualifier {
                        name: text,
                        location,
                    }));
                }
            }
        }
        Ok(scope)
    }

    /// Resolve a qualified identifier without reporting a missing final name
    ///
    /// # Errors
    ///
    /// Only qualifier failures are errors.
    pub fn qualified_sym(&mut self, qid: NodeId) -> Result<Option<SymbolId>, ResolutionError> {
        let scope = self.qualified_scope(qid)?;
        let node = &self.tree[qid];
        let Some(&last) = node.children.last() else {
            return Ok(None);
        };
        // Ordering applies to plain names only; a qualified path names a
        // member of a fully built scope.
        let at = if node.children.len() == 1 {
            node.order
        } else {
            None
        };
        let found = self.tree[last]
            .string
            .as_deref()
            .and_then(|text| self.interner.get(text))
            .and_then(|name| self.scopes.lookup(scope, name, at));
        Ok(found)
    }

    /// Resolve and bind a qualified identifier
    ///
    /// # Errors
    ///
    /// `UnresolvedQualifier` or `UnresolvedIdentifier`.
    pub fn checked_qualified_sym(&mut self, qid: NodeId) -> Result<SymbolId, ResolutionError> {
        match self.qualified_sym(qid)? {
            Some(sym) => {
                self.tree[qid].sym = Some(sym);
                Ok(sym)
            }
            None => {
                let name = self.tree.qualified_ident_string(qid);
                let location = self.tree[qid].location;
                Err(self.report(ResolutionError::UnresolvedIdentifier { name, location }))
            }
        }
    }

    /// Operator text of an `Op` node, from its operator token's symbol
    pub fn op_text(&self, op: NodeId) -> Option<&str> {
        let node = &self.tree[op];
        let token = *node.children.get(node.op_index)?;
        self.tree[token].sym.and_then(|sym| self.name_of(sym))
    }

    fn qid_node(&mut self, sym: SymbolId) -> NodeId {
        let node = self.tree.alloc(NodeKind::QualifiedIdent);
        self.tree[node].sym = Some(sym);
        node
    }

    fn apply_token(&mut self) -> NodeId {
        let token = self.tree.leaf(NodeKind::Const, "#^^");
        self.tree[token].sym = Some(self.make_symbol("^^"));
        token
    }

    /// Source tree for a synthesized call `callee ^^ arg ^^ ...`
    pub fn call_node(&mut self, callee: SymbolId, args: &[SymbolId]) -> NodeId {
        let mut call = self.qid_node(callee);
        for &arg in args {
            let token = self.apply_token();
            let operand = self.qid_node(arg);
            let op = self.tree.branch(NodeKind::Op, &[call, token, operand]);
            self.tree[op].op_index = 1;
            call = op;
        }
        if args.is_empty() {
            let token = self.apply_token();
            call = self.tree.branch(NodeKind::Op, &[call, token]);
            self.tree[call].op_index = 1;
        }
        call
    }

    /// Indented rendering of a subtree, one node per line
    pub fn dump(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, node, 0);
        out
    }

    fn dump_into(&self, out: &mut String, id: NodeId, indent: usize) {
        let node = &self.tree[id];
        out.push_str(&" ".repeat(indent));
        out.push_str(node.kind.name());
        if let Some(sym) = node.sym {
            let symbol = &self.symbols[sym];
            let name = symbol.name.map(|name| self.interner.resolve(name));
            if let Some(constant) = &symbol.constant {
                out.push_str(" constant ");
                out.push_str(constant);
            } else if let (true, Some(name)) = (symbol.is_symbol, name) {
                out.push_str(" symbol ");
                out.push_str(name);
            } else if let Some(name) = name {
                out.push_str(" sym ");
                out.push_str(name);
            } else {
                out.push_str(&format!(" id({})", u32::from(sym.into_raw())));
            }
        }
        if let Some(string) = &node.string {
            out.push(' ');
            out.push_str(string);
        }
        if let Some(builtin) = &node.builtin {
            out.push_str(" builtin ");
            out.push_str(builtin);
        }
        out.push('\n');
        for &child in &node.children {
            self.dump_into(out, child, indent + 1);
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectSink;
    use expect_test::expect;

    #[test]
    fn test_module_creation() {
        let mut ctx = Context::new();
        let system = ctx.builtin(Builtin::System);
        ctx.make_module("system", Some(system)).unwrap();
        let user = ctx.in_module("user", None).unwrap();

        assert_eq!(ctx.modules, vec![user]);
        let user_scope = ctx.symbols[user].scope.unwrap();
        let system_scope = ctx.symbols[system].scope.unwrap();
        assert_eq!(ctx.scopes[user_scope].dynamic, vec![system_scope]);
        assert!(ctx.scopes[system_scope].dynamic.is_empty());

        let init = ctx.symbols[user].init.unwrap();
        assert_eq!(ctx.name_of(init), Some("__init"));
        assert_eq!(ctx.symbols[init].owner, Some(user));
        assert_eq!(ctx.in_module("user", None).unwrap(), user);

        // Temporaries at module level belong to the initializer
        let temp = ctx.temp(user_scope);
        assert_eq!(ctx.symbols[temp].owner, Some(init));
    }

    #[test]
    fn test_reopening_system_registers_it() {
        let mut ctx = Context::new();
        let system = ctx.builtin(Builtin::System);
        ctx.make_module("system", Some(system)).unwrap();
        assert!(ctx.modules.is_empty());
        assert_eq!(ctx.in_module("system", None).unwrap(), system);
        assert_eq!(ctx.modules, vec![system]);
    }

    #[test]
    fn test_redeclaration_is_reported() {
        let sink = CollectSink::new();
        let mut ctx = Context::with_sink(Box::new(sink.clone()));
        let global = ctx.scopes.global();
        let first = ctx.declare(global, "x", None, None).unwrap();
        assert_eq!(ctx.declare(global, "x", Some(first), None), Ok(first));

        let error = ctx.declare(global, "x", None, None).unwrap_err();
        assert_eq!(error.name(), "x");
        assert_eq!(sink.reports(), vec![error]);
    }

    #[test]
    fn test_unresolved_qualifier() {
        let sink = CollectSink::new();
        let mut ctx = Context::with_sink(Box::new(sink.clone()));
        let qid = ctx.tree.qualified(&["nowhere", "x"]);
        ctx.tree[qid].scope = Some(ctx.scopes.global());

        let error = ctx.checked_qualified_sym(qid).unwrap_err();
        assert_eq!(
            error.to_string(),
            "unresolved identifier qualifier 'nowhere'"
        );
        assert_eq!(sink.reports().len(), 1);
    }

    #[test]
    fn test_global_qualified_lookup() {
        let mut ctx = Context::new();
        let user = ctx.in_module("user", None).unwrap();
        let user_scope = ctx.symbols[user].scope.unwrap();
        let x = ctx.declare(user_scope, "x", None, None).unwrap();

        let qid = ctx.tree.qualified(&["", "user", "x"]);
        let inner = ctx.scopes.create(user_scope, ScopeKind::Recursive, None);
        ctx.tree[qid].scope = Some(inner);
        assert_eq!(ctx.checked_qualified_sym(qid), Ok(x));
        assert_eq!(ctx.tree[qid].sym, Some(x));
    }

    #[test]
    fn test_call_node_shape() {
        let mut ctx = Context::new();
        let f = ctx.make_symbol("f");
        let a = ctx.make_symbol("a");
        let b = ctx.make_symbol("b");
        let call = ctx.call_node(f, &[a, b]);
        expect![[r#"
            op
             op
              qualified_ident symbol f
              const symbol ^^ #^^
              qualified_ident symbol a
             const symbol ^^ #^^
             qualified_ident symbol b
        "#]]
        .assert_eq(&ctx.dump(call));

        let nullary = ctx.call_node(f, &[]);
        assert_eq!(ctx.tree.children(nullary).len(), 2);
        assert_eq!(ctx.op_text(nullary), Some("^^"));
    }

    #[test]
    fn test_dump_renders_bindings() {
        let mut ctx = Context::new();
        let global = ctx.scopes.global();
        let x = ctx.declare(global, "x", None, None).unwrap();
        let int = ctx.builtin(Builtin::Int32);
        let one = ctx.symbols.constant("1", Some(int));
        let temp = ctx.symbols.alloc(None);

        let name = ctx.tree.ident("x");
        ctx.tree[name].sym = Some(x);
        let value = ctx.tree.constant("1", "int32");
        ctx.tree[value].sym = Some(one);
        let def = ctx.tree.branch(NodeKind::DefIdent, &[name, value]);
        ctx.tree[def].sym = Some(temp);
        ctx.tree[def].builtin = Some("tag".to_owned());

        let id = u32::from(temp.into_raw());
        assert_eq!(
            ctx.dump(def),
            format!("def_ident id({id}) builtin tag\n ident sym x x\n const constant 1 1\n")
        );
    }
}

//! Worklist-driven scope construction
//!
//! Each unit of work is a subtree: a top-level root or the body of a function
//! whose declaration has already run. Three sub-passes walk the unit in turn:
//!
//! 1. declare modules and types, open nested scopes, defer functions
//! 2. resolve type relations, declare functions of recursive scopes
//! 3. declare variables and functions of ordered scopes, bind identifiers
//!
//! Functions met along the way are queued as units of the next generation,
//! so a nested function's body is only walked after its own declaration.

use std::mem;
use wr_hir::{
    Builtin, Context, LabelMap, NodeId, NodeKind, ResolutionError, ScopeId, ScopeKind, SymbolId,
    TypeKind,
};

pub(crate) struct ScopeBuilder<'a> {
    ctx: &'a mut Context,
    deferred: Vec<NodeId>,
}

impl<'a> ScopeBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut Context) -> Self {
        Self {
            ctx,
            deferred: Vec::new(),
        }
    }

    /// Build every scope below `root`, which is evaluated in `scope`
    pub(crate) fn build(&mut self, root: NodeId, scope: ScopeId) -> Result<(), ResolutionError> {
        self.ctx.tree[root].scope = Some(scope);
        self.deferred.push(root);
        let mut generation = 0;
        while !self.deferred.is_empty() {
            let units = mem::take(&mut self.deferred);
            tracing::debug!(generation, units = units.len(), "building scopes");
            for unit in units {
                let (scope, skip) = match self.function_scope(unit) {
                    Some(body) => (body, true),
                    None => (self.scope_of(unit), false),
                };
                self.define_types(unit, scope, skip)?;
                self.resolve_types(unit, skip)?;
                self.define_variables(unit, skip)?;
            }
            generation += 1;
        }
        Ok(())
    }

    /// Body scope of a function whose declaration has run
    fn function_scope(&self, node: NodeId) -> Option<ScopeId> {
        if self.ctx.tree[node].kind != NodeKind::DefFun {
            return None;
        }
        self.ctx.tree[node]
            .sym
            .and_then(|sym| self.ctx.symbols[sym].scope)
    }

    fn scope_of(&self, node: NodeId) -> ScopeId {
        match self.ctx.tree[node].scope {
            Some(scope) => scope,
            None => panic!(
                "internal error: {} node reached before it was scoped",
                self.ctx.tree[node].kind
            ),
        }
    }

    fn sym_of(&self, node: NodeId) -> SymbolId {
        match self.ctx.tree[node].sym {
            Some(sym) => sym,
            None => panic!(
                "internal error: {} node has no symbol",
                self.ctx.tree[node].kind
            ),
        }
    }

    fn name_of(&self, node: NodeId) -> String {
        match self.ctx.tree.ident_text(node) {
            Some(name) => name.to_owned(),
            None => panic!(
                "internal error: {} node has no identifier",
                self.ctx.tree[node].kind
            ),
        }
    }

    fn child(&self, node: NodeId, kind: NodeKind) -> NodeId {
        match self.ctx.tree.get(node, kind) {
            Some(child) => child,
            None => panic!(
                "internal error: {} node has no {kind} child",
                self.ctx.tree[node].kind
            ),
        }
    }

    fn define_types(
        &mut self,
        node: NodeId,
        mut scope: ScopeId,
        skip: bool,
    ) -> Result<(), ResolutionError> {
        if !skip {
            self.ctx.tree[node].scope = Some(scope);
            match self.ctx.tree[node].kind {
                NodeKind::InModule => {
                    let module = self.enter_module(node)?;
                    scope = self.module_scope(module);
                }
                NodeKind::DefType => scope = self.define_type(node, scope)?,
                NodeKind::DefFun => {
                    self.deferred.push(node);
                    return Ok(());
                }
                NodeKind::DeclareIdent => {
                    let name = self.name_of(node);
                    let existing = self.ctx.tree[node].sym;
                    let sym = self.ctx.declare(scope, &name, existing, Some(node))?;
                    self.ctx.tree[node].sym = Some(sym);
                }
                kind @ (NodeKind::VectorType
                | NodeKind::RefType
                | NodeKind::ProductType
                | NodeKind::SumType
                | NodeKind::FunType
                | NodeKind::TaggedType
                | NodeKind::TypeApplication) => {
                    let sym = self.ctx.temp(scope);
                    self.ctx.symbols[sym].type_kind = type_kind_of(kind);
                    self.ctx.tree[node].sym = Some(sym);
                }
                kind @ (NodeKind::RecordType | NodeKind::Loop | NodeKind::With) => {
                    let sym = self.ctx.temp(scope);
                    self.ctx.tree[node].sym = Some(sym);
                    if kind == NodeKind::RecordType {
                        self.ctx.symbols[sym].type_kind = TypeKind::Record;
                    }
                    // The body of a type definition lives in the type's own scope
                    let type_body =
                        kind == NodeKind::RecordType && self.ctx.tree[node].def_record_type;
                    if !type_body {
                        let owner = self.ctx.scopes[scope].owner;
                        let inner = self.ctx.scopes.create(scope, ScopeKind::Recursive, owner);
                        self.ctx.symbols[sym].scope = Some(inner);
                        scope = inner;
                    }
                }
                NodeKind::Scope => {
                    let owner = self.ctx.scopes[scope].owner;
                    let kind = self.ctx.tree[node].scope_kind;
                    let inner = self.ctx.scopes.create(scope, kind, owner);
                    self.ctx.tree[node].body_scope = Some(inner);
                    scope = inner;
                }
                NodeKind::DefTypeParam => {
                    let name = self.name_of(node);
                    let sym = self.ctx.declare(scope, &name, None, Some(node))?;
                    self.ctx.symbols[sym].type_kind = TypeKind::Unknown;
                    self.ctx.tree[node].sym = Some(sym);
                }
                _ => {}
            }
        }

        let children = self.ctx.tree[node].children.clone();
        for child in children {
            self.define_types(child, scope, false)?;
            // A module qualifier applies to the siblings that follow it
            if self.ctx.tree[child].kind == NodeKind::InModule {
                let module = self.sym_of(child);
                scope = self.module_scope(module);
            }
        }
        Ok(())
    }

    fn enter_module(&mut self, node: NodeId) -> Result<SymbolId, ResolutionError> {
        let name = self.name_of(node);
        let existing = self.ctx.tree[node].sym;
        let module = self.ctx.in_module(&name, existing)?;
        self.ctx.tree[node].sym = Some(module);
        Ok(module)
    }

    fn module_scope(&self, module: SymbolId) -> ScopeId {
        match self.ctx.symbols[module].scope {
            Some(scope) => scope,
            None => panic!("internal error: module without a scope"),
        }
    }

    /// Declare a type definition and open the scope of its body
    fn define_type(&mut self, node: NodeId, scope: ScopeId) -> Result<ScopeId, ResolutionError> {
        let name = self.name_of(node);
        let bound = self
            .ctx
            .interner
            .get(&name)
            .and_then(|interned| self.ctx.scopes.get_local(scope, interned));
        let sym = match bound {
            Some(sym) if self.ctx.symbols[sym].type_kind != TypeKind::Unknown => {
                let location = self.ctx.tree[node].location;
                return Err(self
                    .ctx
                    .report(ResolutionError::DuplicateIdentifier { name, location }));
            }
            Some(sym) => sym,
            None => {
                let existing = self.ctx.tree[node].sym;
                self.ctx.declare(scope, &name, existing, Some(node))?
            }
        };
        self.ctx.tree[node].sym = Some(sym);

        if matches!(
            self.ctx.symbols[sym].type_kind,
            TypeKind::None | TypeKind::Unknown
        ) {
            let has_body = self.ctx.tree[node]
                .children
                .iter()
                .skip(1)
                .any(|&child| !self.ctx.tree[child].kind.is_type_header());
            self.ctx.symbols[sym].type_kind = if has_body {
                TypeKind::Alias
            } else {
                TypeKind::Unknown
            };
        }

        let inner = self.ctx.scopes.create(scope, ScopeKind::Recursive, Some(sym));
        self.ctx.symbols[sym].scope = Some(inner);
        if let Some(record) = self.ctx.tree.get(node, NodeKind::RecordType) {
            self.ctx.tree[record].def_record_type = true;
        }
        Ok(inner)
    }

    fn resolve_types(&mut self, node: NodeId, skip: bool) -> Result<(), ResolutionError> {
        if !skip {
            match self.ctx.tree[node].kind {
                NodeKind::Arg => {
                    if let Some(constraint) = self.ctx.tree.get(node, NodeKind::Constraint) {
                        self.resolve_parameterized_type(constraint)?;
                    }
                }
                NodeKind::Inherits | NodeKind::Implements | NodeKind::Includes => {
                    self.resolve_parameterized_type(node)?;
                }
                NodeKind::DefType => {
                    let sym = self.sym_of(node);
                    self.record_type_header(node, sym)?;
                }
                NodeKind::Where => {
                    let subject = self.child(node, NodeKind::QualifiedIdent);
                    let sym = self.ctx.checked_qualified_sym(subject)?;
                    self.record_type_header(node, sym)?;
                }
                NodeKind::DefFun => {
                    let scope = self.scope_of(node);
                    if self.ctx.scopes.effective_kind(scope) == ScopeKind::Recursive {
                        self.define_function(node)?;
                    }
                    return Ok(());
                }
                _ => {}
            }
        }
        let children = self.ctx.tree[node].children.clone();
        for child in children {
            self.resolve_types(child, false)?;
        }
        Ok(())
    }

    /// Record the parameters and constraints listed by a type header
    fn record_type_header(&mut self, node: NodeId, sym: SymbolId) -> Result<(), ResolutionError> {
        let children = self.ctx.tree[node].children.clone();
        for child in children {
            match self.ctx.tree[child].kind {
                NodeKind::Constraint => {
                    let bound = self.child(child, NodeKind::QualifiedIdent);
                    let constraint = self.ctx.checked_qualified_sym(bound)?;
                    self.ctx.tree[child].sym = Some(constraint);
                    self.ctx.symbols[sym].constraints.insert(constraint);
                    if let (Some(scope), Some(extra)) = (
                        self.ctx.symbols[sym].scope,
                        self.ctx.symbols[constraint].scope,
                    ) {
                        self.ctx.scopes.add_dynamic(scope, extra);
                    }
                }
                NodeKind::DefTypeParam => {
                    let param = self.sym_of(child);
                    self.ctx.symbols[sym].add_arg(param);
                    if self.ctx.trace_symbols {
                        tracing::trace!(?sym, ?param, "type parameter");
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Bind a possibly parameterized type reference `head(param...)`
    ///
    /// A reference with parameters becomes a fresh application symbol whose
    /// first member is the head and whose arguments are the parameters.
    fn resolve_parameterized_type(&mut self, node: NodeId) -> Result<(), ResolutionError> {
        let head_qid = self.child(node, NodeKind::QualifiedIdent);
        let head = self.ctx.checked_qualified_sym(head_qid)?;
        let params: Vec<NodeId> = self.ctx.tree[node].children.iter().skip(1).copied().collect();
        if params.is_empty() {
            self.ctx.tree[node].sym = Some(head);
            return Ok(());
        }

        let scope = self.scope_of(node);
        let application = self.ctx.temp(scope);
        self.ctx.symbols[application].type_kind = TypeKind::Application;
        self.ctx.symbols[application].has.push(head);
        for param in params {
            assert_eq!(
                self.ctx.tree[param].kind,
                NodeKind::TypeParam,
                "internal error: type reference with a non-parameter argument"
            );
            let qid = self.child(param, NodeKind::QualifiedIdent);
            let arg = self.ctx.checked_qualified_sym(qid)?;
            self.ctx.symbols[application].args.push(arg);
        }
        self.ctx.tree[node].sym = Some(application);
        Ok(())
    }

    fn define_variables(&mut self, node: NodeId, skip: bool) -> Result<(), ResolutionError> {
        if !skip {
            match self.ctx.tree[node].kind {
                NodeKind::DefIdent => {
                    let ident = self.child(node, NodeKind::Ident);
                    let name = self.name_of(ident);
                    let existing = self.ctx.tree[ident].sym;
                    let scope = self.scope_of(node);
                    let sym = self.ctx.declare(scope, &name, existing, Some(node))?;
                    self.ctx.tree[node].sym = Some(sym);
                    self.ctx.symbols[sym].ast = Some(node);
                }
                NodeKind::DefFun => {
                    let scope = self.scope_of(node);
                    if self.ctx.scopes.effective_kind(scope) != ScopeKind::Recursive {
                        self.define_function(node)?;
                    }
                    return Ok(());
                }
                NodeKind::QualifiedIdent => {
                    if self.ctx.tree[node].sym.is_none() {
                        self.ctx.checked_qualified_sym(node)?;
                    }
                    return Ok(());
                }
                _ => {}
            }
        }
        let children = self.ctx.tree[node].children.clone();
        for child in children {
            self.define_variables(child, false)?;
        }
        Ok(())
    }

    /// Declare a function, open its body scope, bind its formals and queue
    /// its body for the next generation
    fn define_function(&mut self, node: NodeId) -> Result<(), ResolutionError> {
        let qid = self.child(node, NodeKind::QualifiedIdent);
        let lexical = self.scope_of(node);
        self.ctx.tree[qid].scope = Some(lexical);
        let binding = self.ctx.qualified_scope(qid)?;
        let name = match self.ctx.tree.qualified_ident_ident(qid) {
            Some(ident) => self.name_of(ident),
            None => panic!("internal error: function without a name"),
        };
        let existing = self.ctx.tree[node].sym;
        let sym = self.ctx.declare(binding, &name, existing, Some(node))?;
        self.ctx.tree[qid].sym = Some(sym);
        self.ctx.tree[node].sym = Some(sym);

        let body = self.ctx.scopes.create(lexical, ScopeKind::Recursive, Some(sym));
        if binding != lexical {
            self.ctx.scopes.add_dynamic(body, binding);
        }
        self.ctx.symbols[sym].scope = Some(body);

        let children = self.ctx.tree[node].children.clone();
        if let Some((_, formals)) = children.split_last() {
            for &formal in formals.iter().skip(1) {
                self.scope_pattern(formal, body)?;
            }
        }

        let cont = self.ctx.temp(body);
        let ret = self.ctx.temp(body);
        let function_ty = self.ctx.builtin(Builtin::Function);
        let symbol = &mut self.ctx.symbols[sym];
        symbol.cont = Some(cont);
        symbol.ret = Some(ret);
        symbol.labels = Some(LabelMap::default());
        symbol.ast = Some(node);
        symbol.ty = Some(function_ty);
        tracing::debug!(function = %name, "declared function");
        Ok(())
    }

    /// Bind a formal argument or destructuring pattern into a function body
    fn scope_pattern(&mut self, node: NodeId, scope: ScopeId) -> Result<(), ResolutionError> {
        match self.ctx.tree[node].kind {
            NodeKind::Pattern => {
                let group = self.ctx.temp(scope);
                let tuple = self.ctx.builtin(Builtin::Tuple);
                self.ctx.symbols[group].ty = Some(tuple);
                self.ctx.tree[node].sym = Some(group);
                let children = self.ctx.tree[node].children.clone();
                for child in children {
                    self.scope_pattern(child, scope)?;
                    let element = self.sym_of(child);
                    self.ctx.symbols[group].has.push(element);
                }
            }
            kind @ (NodeKind::Arg | NodeKind::Vararg) => {
                let ty = match self.ctx.tree.child(node, NodeKind::QualifiedIdent) {
                    Some(qid) => {
                        self.ctx.tree[qid].scope = Some(scope);
                        Some(self.ctx.checked_qualified_sym(qid)?)
                    }
                    None => None,
                };
                let sym = if let Some(ident) = self.ctx.tree.child(node, NodeKind::Ident) {
                    let name = self.name_of(ident);
                    let sym = self.ctx.declare(scope, &name, None, Some(node))?;
                    self.ctx.tree[ident].sym = Some(sym);
                    sym
                } else if let Some(constant) = self.ctx.tree.child(node, NodeKind::Const) {
                    self.sym_of(constant)
                } else {
                    self.ctx.temp(scope)
                };
                if kind == NodeKind::Vararg {
                    self.ctx.symbols[sym].vararg = true;
                }
                if ty.is_some() {
                    self.ctx.symbols[sym].ty = ty;
                }
                self.ctx.tree[node].sym = Some(sym);
            }
            _ => {}
        }
        Ok(())
    }
}

fn type_kind_of(kind: NodeKind) -> TypeKind {
    match kind {
        NodeKind::VectorType => TypeKind::Vector,
        NodeKind::RefType => TypeKind::Ref,
        NodeKind::ProductType => TypeKind::Product,
        NodeKind::SumType => TypeKind::Sum,
        NodeKind::FunType => TypeKind::Function,
        NodeKind::TaggedType => TypeKind::Tagged,
        NodeKind::TypeApplication => TypeKind::Application,
        NodeKind::RecordType => TypeKind::Record,
        _ => panic!("internal error: {kind} is not a type expression"),
    }
}

//! Scope construction
//!
//! Binds every module, type, function and variable of a forest to a symbol
//! and every use of a name to the symbol it denotes.
//!
//! # Architecture
//!
//! - **Builtins**: tagged nodes claim the builtin table's symbols, the rest
//!   become visible through the system module
//! - **Constants**: literals get canonical symbols
//! - **Scopes**: a worklist over the forest and over deferred function bodies
//!   builds the scope graph in three sub-passes per unit
#![allow(
    clippy::panic,
    reason = "Malformed trees are compiler bugs and abort the compilation"
)]

mod builtins;
mod scopes;

use scopes::ScopeBuilder;
use wr_hir::{Builtin, Context, NodeId, ResolutionError, SymbolId};

/// Resolve a forest of top-level nodes
///
/// Code outside any module qualifier belongs to `user_module`, which is
/// returned.
///
/// # Errors
///
/// The first resolution error, already reported to the context's sink.
///
/// # Panics
///
/// When a node lacks a child its kind requires.
pub fn resolve(
    ctx: &mut Context,
    roots: &[NodeId],
    user_module: &str,
) -> Result<SymbolId, ResolutionError> {
    for &root in roots {
        builtins::tag_builtins(ctx, root)?;
    }
    let system = ctx.builtin(Builtin::System);
    ctx.make_module(Builtin::System.name(), Some(system))?;
    builtins::install_unclaimed(ctx)?;
    for &root in roots {
        builtins::build_constants(ctx, root)?;
    }
    ctx.tree.number_preorder(roots);

    let user = ctx.in_module(user_module, None)?;
    let Some(scope) = ctx.symbols[user].scope else {
        panic!("internal error: module '{user_module}' has no scope");
    };
    tracing::debug!(roots = roots.len(), "scope construction");
    let mut builder = ScopeBuilder::new(ctx);
    for &root in roots {
        builder.build(root, scope)?;
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wr_hir::{CollectSink, NodeKind, ScopeKind, TypeKind};

    fn context() -> (Context, CollectSink) {
        let sink = CollectSink::new();
        (Context::with_sink(Box::new(sink.clone())), sink)
    }

    fn call(ctx: &mut Context, name: &str) -> NodeId {
        let callee = ctx.tree.qualified(&[name]);
        ctx.tree.op(Some(callee), "^^", None)
    }

    #[test]
    fn test_types_refer_forward() {
        let (mut ctx, _) = context();
        let member = ctx.tree.qualified(&["later"]);
        let product = ctx.tree.branch(NodeKind::ProductType, &[member]);
        let early = ctx.tree.type_def("early", &[product]);
        let int = ctx.tree.qualified(&["int32"]);
        let later = ctx.tree.type_def("later", &[int]);
        let root = ctx.tree.branch(NodeKind::Block, &[early, later]);

        resolve(&mut ctx, &[root], "user").unwrap();
        let later_sym = ctx.tree[later].sym.unwrap();
        assert_eq!(ctx.tree[member].sym, Some(later_sym));
        assert_eq!(ctx.tree[int].sym, Some(ctx.builtin(Builtin::Int32)));
        assert_eq!(ctx.symbols[later_sym].type_kind, TypeKind::Alias);
        let product_sym = ctx.tree[product].sym.unwrap();
        assert_eq!(ctx.symbols[product_sym].type_kind, TypeKind::Product);
    }

    #[test]
    fn test_duplicate_type_is_reported_once() {
        let (mut ctx, sink) = context();
        let first_body = ctx.tree.qualified(&["int32"]);
        let first = ctx.tree.type_def("t", &[first_body]);
        let second_body = ctx.tree.qualified(&["bool"]);
        let second = ctx.tree.type_def("t", &[second_body]);
        let root = ctx.tree.branch(NodeKind::Block, &[first, second]);

        let error = resolve(&mut ctx, &[root], "user").unwrap_err();
        assert!(matches!(error, ResolutionError::DuplicateIdentifier { .. }));
        assert_eq!(error.name(), "t");
        assert_eq!(sink.reports(), vec![error]);
    }

    #[test]
    fn test_declared_type_may_be_completed() {
        let (mut ctx, _) = context();
        let forward = ctx.tree.type_def("t", &[]);
        let body = ctx.tree.qualified(&["int32"]);
        let complete = ctx.tree.type_def("t", &[body]);
        let root = ctx.tree.branch(NodeKind::Block, &[forward, complete]);

        resolve(&mut ctx, &[root], "user").unwrap();
        assert_eq!(ctx.tree[forward].sym, ctx.tree[complete].sym);
        let sym = ctx.tree[complete].sym.unwrap();
        assert_eq!(ctx.symbols[sym].type_kind, TypeKind::Alias);
    }

    #[test]
    fn test_nested_function_scopes_follow_nesting() {
        let (mut ctx, _) = context();
        let x_use = ctx.tree.qualified(&["x"]);
        let inner_body = ctx.tree.branch(NodeKind::Block, &[x_use]);
        let inner = ctx.tree.function(&["inner"], &[], inner_body);
        let arg = ctx.tree.arg("x", Some(&["int32"]));
        let outer_call = call(&mut ctx, "inner");
        let outer_body = ctx.tree.branch(NodeKind::Block, &[inner, outer_call]);
        let outer = ctx.tree.function(&["outer"], &[arg], outer_body);
        let root = ctx.tree.branch(NodeKind::Block, &[outer]);

        let user = resolve(&mut ctx, &[root], "user").unwrap();
        let outer_sym = ctx.tree[outer].sym.unwrap();
        let inner_sym = ctx.tree[inner].sym.unwrap();
        let outer_scope = ctx.symbols[outer_sym].scope.unwrap();
        let inner_scope = ctx.symbols[inner_sym].scope.unwrap();
        assert_eq!(ctx.scopes[inner_scope].parent, Some(outer_scope));
        assert_eq!(ctx.symbols[outer_sym].owner, Some(user));
        assert_eq!(ctx.symbols[inner_sym].owner, Some(outer_sym));

        // The formal is visible from the nested function's body
        assert_eq!(ctx.tree[x_use].sym, ctx.tree[arg].sym);
        let x = ctx.tree[arg].sym.unwrap();
        assert_eq!(ctx.symbols[x].ty, Some(ctx.builtin(Builtin::Int32)));

        let cont = ctx.symbols[outer_sym].cont.unwrap();
        assert_eq!(ctx.symbols[cont].owner, Some(outer_sym));
        assert!(ctx.symbols[outer_sym].labels.is_some());
    }

    #[test]
    fn test_function_bound_through_qualifier() {
        let (mut ctx, _) = context();
        let lib = ctx.tree.in_module("lib");
        let user = ctx.tree.in_module("user");
        let helper_body = ctx.tree.branch(NodeKind::Block, &[]);
        let helper = ctx.tree.function(&["lib", "helper"], &[], helper_body);
        let root = ctx.tree.branch(NodeKind::Block, &[lib, user, helper]);

        resolve(&mut ctx, &[root], "user").unwrap();
        let lib_sym = ctx.tree[lib].sym.unwrap();
        let lib_scope = ctx.symbols[lib_sym].scope.unwrap();
        let helper_sym = ctx.tree[helper].sym.unwrap();
        let name = ctx.interner.get("helper").unwrap();
        assert_eq!(ctx.scopes.get_local(lib_scope, name), Some(helper_sym));

        let body = ctx.symbols[helper_sym].scope.unwrap();
        assert_eq!(ctx.scopes[body].dynamic, vec![lib_scope]);
    }

    #[test]
    fn test_sequential_scope_orders_variables() {
        let (mut ctx, sink) = context();
        let early_use = ctx.tree.qualified(&["x"]);
        let one = ctx.tree.constant("1", "int32");
        let x = ctx.tree.define("x", Some(one));
        let block = ctx.tree.branch(NodeKind::Scope, &[early_use, x]);
        ctx.tree[block].scope_kind = ScopeKind::Sequential;

        let error = resolve(&mut ctx, &[block], "user").unwrap_err();
        assert!(matches!(error, ResolutionError::UnresolvedIdentifier { .. }));
        assert_eq!(error.name(), "x");
        assert_eq!(sink.reports().len(), 1);
    }

    #[test]
    fn test_duplicate_variable_in_one_scope() {
        let (mut ctx, _) = context();
        let first = ctx.tree.define("x", None);
        let second = ctx.tree.define("x", None);
        let block = ctx.tree.branch(NodeKind::Scope, &[first, second]);
        ctx.tree[block].scope_kind = ScopeKind::Sequential;

        let error = resolve(&mut ctx, &[block], "user").unwrap_err();
        assert!(matches!(error, ResolutionError::DuplicateIdentifier { .. }));
    }

    #[test]
    fn test_type_header_records_params_and_constraints() {
        let (mut ctx, _) = context();
        let comparable = ctx.tree.type_def("comparable", &[]);
        let param_name = ctx.tree.ident("a");
        let param = ctx.tree.branch(NodeKind::DefTypeParam, &[param_name]);
        let bound = ctx.tree.qualified(&["comparable"]);
        let constraint = ctx.tree.branch(NodeKind::Constraint, &[bound]);
        let member = ctx.tree.qualified(&["a"]);
        let body = ctx.tree.branch(NodeKind::VectorType, &[member]);
        let sorted = ctx.tree.type_def("sorted", &[param, constraint, body]);
        let root = ctx.tree.branch(NodeKind::Block, &[comparable, sorted]);

        resolve(&mut ctx, &[root], "user").unwrap();
        let sorted_sym = ctx.tree[sorted].sym.unwrap();
        let comparable_sym = ctx.tree[comparable].sym.unwrap();
        let param_sym = ctx.tree[param].sym.unwrap();
        assert_eq!(ctx.symbols[sorted_sym].args, vec![param_sym]);
        assert!(ctx.symbols[sorted_sym].constraints.contains(&comparable_sym));
        assert_eq!(ctx.tree[member].sym, Some(param_sym));
        assert_eq!(ctx.symbols[comparable_sym].type_kind, TypeKind::Unknown);

        let sorted_scope = ctx.symbols[sorted_sym].scope.unwrap();
        let comparable_scope = ctx.symbols[comparable_sym].scope.unwrap();
        assert_eq!(ctx.scopes[sorted_scope].dynamic, vec![comparable_scope]);
    }

    #[test]
    fn test_where_clause_constrains_an_existing_type() {
        let (mut ctx, _) = context();
        let comparable = ctx.tree.type_def("comparable", &[]);
        let sorted = ctx.tree.type_def("sorted", &[]);
        let subject = ctx.tree.qualified(&["sorted"]);
        let bound = ctx.tree.qualified(&["comparable"]);
        let constraint = ctx.tree.branch(NodeKind::Constraint, &[bound]);
        let clause = ctx.tree.branch(NodeKind::Where, &[subject, constraint]);
        let root = ctx.tree.branch(NodeKind::Block, &[clause, comparable, sorted]);

        resolve(&mut ctx, &[root], "user").unwrap();
        let sorted_sym = ctx.tree[sorted].sym.unwrap();
        let comparable_sym = ctx.tree[comparable].sym.unwrap();
        assert_eq!(ctx.tree[subject].sym, Some(sorted_sym));
        assert_eq!(ctx.tree[constraint].sym, Some(comparable_sym));
        assert!(ctx.symbols[sorted_sym].constraints.contains(&comparable_sym));

        let sorted_scope = ctx.symbols[sorted_sym].scope.unwrap();
        let comparable_scope = ctx.symbols[comparable_sym].scope.unwrap();
        assert_eq!(ctx.scopes[sorted_scope].dynamic, vec![comparable_scope]);
    }

    #[test]
    fn test_member_declarations_bind_in_the_type_scope() {
        let (mut ctx, sink) = context();
        let x_name = ctx.tree.ident("x");
        let x = ctx.tree.branch(NodeKind::DeclareIdent, &[x_name]);
        let y_name = ctx.tree.ident("y");
        let y = ctx.tree.branch(NodeKind::DeclareIdent, &[y_name]);
        let body = ctx.tree.branch(NodeKind::RecordType, &[x, y]);
        let point = ctx.tree.type_def("point", &[body]);
        let root = ctx.tree.branch(NodeKind::Block, &[point]);

        resolve(&mut ctx, &[root], "user").unwrap();
        let point_sym = ctx.tree[point].sym.unwrap();
        let point_scope = ctx.symbols[point_sym].scope.unwrap();
        let x_sym = ctx.tree[x].sym.unwrap();
        let y_sym = ctx.tree[y].sym.unwrap();
        assert_ne!(x_sym, y_sym);
        assert_eq!(ctx.name_of(x_sym), Some("x"));
        let x_interned = ctx.interner.intern("x");
        assert_eq!(ctx.scopes.get_local(point_scope, x_interned), Some(x_sym));
        let user = ctx.modules[0];
        let user_scope = ctx.symbols[user].scope.unwrap();
        assert_eq!(ctx.scopes.get_local(user_scope, x_interned), None);
        assert!(sink.reports().is_empty());
    }

    #[test]
    fn test_parameterized_implements_builds_application() {
        let (mut ctx, _) = context();
        let list = ctx.tree.type_def("list", &[]);
        let head = ctx.tree.qualified(&["list"]);
        let arg = ctx.tree.qualified(&["int32"]);
        let param = ctx.tree.branch(NodeKind::TypeParam, &[arg]);
        let implements = ctx.tree.branch(NodeKind::Implements, &[head, param]);
        let body = ctx.tree.branch(NodeKind::RecordType, &[implements]);
        let ints = ctx.tree.type_def("ints", &[body]);
        let root = ctx.tree.branch(NodeKind::Block, &[list, ints]);

        resolve(&mut ctx, &[root], "user").unwrap();
        let application = ctx.tree[implements].sym.unwrap();
        let list_sym = ctx.tree[list].sym.unwrap();
        assert_eq!(ctx.symbols[application].type_kind, TypeKind::Application);
        assert_eq!(ctx.symbols[application].has, vec![list_sym]);
        assert_eq!(
            ctx.symbols[application].args,
            vec![ctx.builtin(Builtin::Int32)]
        );
        assert!(ctx.tree[body].def_record_type);
    }

    #[test]
    fn test_patterns_group_their_elements() {
        let (mut ctx, _) = context();
        let a = ctx.tree.arg("a", None);
        let b = ctx.tree.arg("b", None);
        let pattern = ctx.tree.branch(NodeKind::Pattern, &[a, b]);
        let rest_name = ctx.tree.ident("rest");
        let rest = ctx.tree.branch(NodeKind::Vararg, &[rest_name]);
        let body = ctx.tree.qualified(&["b"]);
        let f = ctx.tree.function(&["f"], &[pattern, rest], body);
        let root = ctx.tree.branch(NodeKind::Block, &[f]);

        resolve(&mut ctx, &[root], "user").unwrap();
        let group = ctx.tree[pattern].sym.unwrap();
        let elements = vec![ctx.tree[a].sym.unwrap(), ctx.tree[b].sym.unwrap()];
        assert_eq!(ctx.symbols[group].has, elements);
        assert_eq!(ctx.symbols[group].ty, Some(ctx.builtin(Builtin::Tuple)));
        assert!(ctx.symbols[ctx.tree[rest].sym.unwrap()].vararg);
        assert_eq!(ctx.tree[body].sym, Some(elements[1]));
    }

    #[test]
    fn test_builtins_are_visible_from_user_code() {
        let (mut ctx, _) = context();
        let reply = ctx.tree.qualified(&["reply"]);
        let root = ctx.tree.branch(NodeKind::Block, &[reply]);

        resolve(&mut ctx, &[root], "user").unwrap();
        assert_eq!(ctx.tree[reply].sym, Some(ctx.builtin(Builtin::Reply)));
        assert_eq!(ctx.modules.len(), 1);
    }
}

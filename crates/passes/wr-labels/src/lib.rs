//! Label resolution
//!
//! Two walks over each root. The first allocates the labels of label
//! statements and of declarations that break/continue may name, and records
//! them in the label map of the enclosing function or module. The second
//! links every jump to its label and tags nodes whose lowering depends on
//! their surroundings: operator chains and literals directly inside a scope
//! marker.

#![allow(
    clippy::panic,
    reason = "Undeclared labels and owners are compiler bugs and abort the compilation"
)]

use wr_hir::{Constructor, Context, LabelId, NodeId, NodeKind, ScopeKind, SymbolId};

/// Innermost jump targets in effect at a node
#[derive(Copy, Clone, Debug, Default)]
struct Targets {
    break_label: Option<LabelId>,
    continue_label: Option<LabelId>,
    return_label: Option<LabelId>,
}

/// Resolve every jump below `roots`, whose code belongs to `module`
///
/// # Panics
///
/// When a jump names a label that scope construction never declared.
pub fn resolve_labels(ctx: &mut Context, roots: &[NodeId], module: SymbolId) {
    for &root in roots {
        define_labels(ctx, root, module);
    }
    for &root in roots {
        link_labels(ctx, root, module, Targets::default());
    }
    tracing::debug!(roots = roots.len(), "resolved labels");
}

fn label_name(ctx: &Context, node: NodeId) -> Option<String> {
    let ident = ctx.tree.child(node, NodeKind::Ident)?;
    ctx.tree[ident].string.clone()
}

fn register(ctx: &mut Context, owner: SymbolId, node: NodeId) {
    let Some(name) = label_name(ctx, node) else {
        panic!("internal error: unnamed {} node", ctx.tree[node].kind);
    };
    let name = ctx.interner.intern(&name);
    match ctx.symbols[owner].labels.as_mut() {
        Some(labels) => {
            labels.insert(name, node);
        }
        None => panic!("internal error: label declared outside a function or module"),
    }
}

/// Node a label name refers to in the label map of `owner`
fn lookup(ctx: &Context, owner: SymbolId, name: &str) -> NodeId {
    let target = ctx.interner.get(name).and_then(|name| {
        ctx.symbols[owner]
            .labels
            .as_ref()
            .and_then(|labels| labels.get(&name).copied())
    });
    match target {
        Some(target) => target,
        None => panic!("internal error: label '{name}' was never declared"),
    }
}

/// Owner of the label map in effect inside a function or module qualifier
fn map_owner(ctx: &Context, node: NodeId) -> SymbolId {
    match ctx.tree[node].sym {
        Some(sym) => sym,
        None => panic!("internal error: {} node was never declared", ctx.tree[node].kind),
    }
}

fn define_labels(ctx: &mut Context, node: NodeId, mut owner: SymbolId) {
    match ctx.tree[node].kind {
        NodeKind::DefIdent if ctx.tree[node].def_ident_label => {
            let entry = ctx.alloc_label();
            let exit = ctx.alloc_label();
            ctx.tree[node].label = [Some(entry), Some(exit)];
            register(ctx, owner, node);
        }
        NodeKind::InModule | NodeKind::DefFun => owner = map_owner(ctx, node),
        NodeKind::Label => {
            let label = ctx.alloc_label();
            ctx.tree[node].label = [Some(label), Some(label)];
            register(ctx, owner, node);
        }
        _ => {}
    }

    let children = ctx.tree[node].children.clone();
    for child in children {
        define_labels(ctx, child, owner);
        if ctx.tree[child].kind == NodeKind::InModule {
            owner = map_owner(ctx, child);
        }
    }
}

fn link_labels(ctx: &mut Context, node: NodeId, mut owner: SymbolId, mut targets: Targets) {
    match ctx.tree[node].kind {
        NodeKind::DefFun => {
            owner = map_owner(ctx, node);
            let label = ctx.alloc_label();
            ctx.tree[node].label[0] = Some(label);
            targets.return_label = Some(label);
        }
        NodeKind::InModule => owner = map_owner(ctx, node),
        NodeKind::DefIdent if ctx.tree[node].def_ident_label => {
            // A loop initializing a label target is named by it
            if let Some(body) = ctx.tree.last(node) {
                if ctx.tree[body].kind == NodeKind::Loop {
                    ctx.tree[body].label = ctx.tree[node].label;
                }
            }
        }
        NodeKind::Loop => {
            if ctx.tree[node].label[0].is_none() {
                let top = ctx.alloc_label();
                let exit = ctx.alloc_label();
                ctx.tree[node].label = [Some(top), Some(exit)];
            }
            let [top, exit] = ctx.tree[node].label;
            targets.continue_label = top;
            targets.break_label = exit;
        }
        NodeKind::Break => {
            ctx.tree[node].label[0] = match label_name(ctx, node) {
                Some(name) => ctx.tree[lookup(ctx, owner, &name)].label[1],
                None => targets.break_label,
            };
        }
        NodeKind::Continue => {
            ctx.tree[node].label[0] = match label_name(ctx, node) {
                Some(name) => ctx.tree[lookup(ctx, owner, &name)].label[0],
                None => targets.continue_label,
            };
        }
        NodeKind::Goto => {
            let Some(name) = label_name(ctx, node) else {
                panic!("internal error: goto without a target");
            };
            ctx.tree[node].label[0] = ctx.tree[lookup(ctx, owner, &name)].label[0];
        }
        NodeKind::Return => ctx.tree[node].label[0] = targets.return_label,
        NodeKind::Op => tag_chain(ctx, node),
        NodeKind::Scope => {
            let parallel = ctx.tree[node]
                .body_scope
                .is_some_and(|scope| ctx.scopes.effective_kind(scope) == ScopeKind::Parallel);
            let constructor = if parallel {
                Constructor::Vector
            } else {
                Constructor::Set
            };
            let children = ctx.tree[node].children.clone();
            for child in children {
                ctx.tree[child].constructor = constructor;
            }
        }
        _ => {}
    }

    let children = ctx.tree[node].children.clone();
    for child in children {
        link_labels(ctx, child, owner, targets);
        if ctx.tree[child].kind == NodeKind::InModule {
            owner = map_owner(ctx, child);
        }
    }
}

/// Mark the left operand of a comma or apply operator when it continues the
/// same chain, so only the outermost operator builds the tuple or the call
fn tag_chain(ctx: &mut Context, node: NodeId) {
    let Some(op) = ctx.op_text(node).map(str::to_owned) else {
        return;
    };
    if ctx.tree[node].op_index == 0 {
        return;
    }
    let left = ctx.tree[node].children[0];
    if ctx.tree[left].kind != NodeKind::Op {
        return;
    }
    let Some(left_op) = ctx.op_text(left) else {
        return;
    };
    if op.starts_with(',') && left_op.starts_with(',') {
        ctx.tree[left].in_tuple = true;
    } else if op.starts_with("^^") && left_op.starts_with("^^") {
        ctx.tree[left].in_apply = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(ctx: &mut Context, root: NodeId) {
        let user = wr_resolve::resolve(ctx, &[root], "user").unwrap();
        resolve_labels(ctx, &[root], user);
    }

    fn loop_node(ctx: &mut Context, body: NodeId) -> NodeId {
        let flag = ctx.tree.constant("true", "bool");
        let cond = ctx.tree.branch(NodeKind::LoopCond, &[flag]);
        ctx.tree.branch(NodeKind::Loop, &[cond, body])
    }

    fn jump(ctx: &mut Context, kind: NodeKind, target: Option<&str>) -> NodeId {
        let children: Vec<NodeId> = target.map(|name| ctx.tree.ident(name)).into_iter().collect();
        ctx.tree.branch(kind, &children)
    }

    #[test]
    fn test_named_break_targets_outer_loop() {
        let mut ctx = Context::new();
        let named = jump(&mut ctx, NodeKind::Break, Some("outer"));
        let plain = jump(&mut ctx, NodeKind::Break, None);
        let next = jump(&mut ctx, NodeKind::Continue, None);
        let inner_body = ctx.tree.branch(NodeKind::Block, &[named, plain, next]);
        let inner = loop_node(&mut ctx, inner_body);
        let outer = loop_node(&mut ctx, inner);
        let target = ctx.tree.define("outer", Some(outer));
        ctx.tree[target].def_ident_label = true;
        let root = ctx.tree.branch(NodeKind::Block, &[target]);
        resolved(&mut ctx, root);

        assert_eq!(ctx.tree[outer].label, ctx.tree[target].label);
        assert_eq!(ctx.tree[named].label[0], ctx.tree[outer].label[1]);
        assert_eq!(ctx.tree[plain].label[0], ctx.tree[inner].label[1]);
        assert_eq!(ctx.tree[next].label[0], ctx.tree[inner].label[0]);
        assert_ne!(ctx.tree[inner].label[1], ctx.tree[outer].label[1]);
    }

    #[test]
    fn test_named_continue_targets_outer_loop_top() {
        let mut ctx = Context::new();
        let named = jump(&mut ctx, NodeKind::Continue, Some("outer"));
        let plain = jump(&mut ctx, NodeKind::Continue, None);
        let inner_body = ctx.tree.branch(NodeKind::Block, &[named, plain]);
        let inner = loop_node(&mut ctx, inner_body);
        let outer = loop_node(&mut ctx, inner);
        let target = ctx.tree.define("outer", Some(outer));
        ctx.tree[target].def_ident_label = true;
        let root = ctx.tree.branch(NodeKind::Block, &[target]);
        resolved(&mut ctx, root);

        assert_eq!(ctx.tree[named].label[0], ctx.tree[outer].label[0]);
        assert_eq!(ctx.tree[plain].label[0], ctx.tree[inner].label[0]);
        assert_ne!(ctx.tree[named].label[0], ctx.tree[plain].label[0]);
        assert!(ctx.tree[named].label[0].is_some());
    }

    #[test]
    fn test_goto_and_return() {
        let mut ctx = Context::new();
        let goto = jump(&mut ctx, NodeKind::Goto, Some("again"));
        let label = jump(&mut ctx, NodeKind::Label, Some("again"));
        let value = ctx.tree.constant("1", "int32");
        let ret = ctx.tree.branch(NodeKind::Return, &[value]);
        let body = ctx.tree.branch(NodeKind::Block, &[goto, label, ret]);
        let f = ctx.tree.function(&["f"], &[], body);
        let root = ctx.tree.branch(NodeKind::Block, &[f]);
        resolved(&mut ctx, root);

        let [entry, exit] = ctx.tree[label].label;
        assert!(entry.is_some());
        assert_eq!(entry, exit);
        assert_eq!(ctx.tree[goto].label[0], entry);
        assert_eq!(ctx.tree[ret].label[0], ctx.tree[f].label[0]);

        let f_sym = ctx.tree[f].sym.unwrap();
        let name = ctx.interner.get("again").unwrap();
        let labels = ctx.symbols[f_sym].labels.as_ref().unwrap();
        assert_eq!(labels.get(&name), Some(&label));
    }

    #[test]
    fn test_chains_tag_inner_operators() {
        let mut ctx = Context::new();
        let a = ctx.tree.qualified(&["a"]);
        let b = ctx.tree.qualified(&["b"]);
        let c = ctx.tree.qualified(&["c"]);
        let inner_comma = ctx.tree.binary(a, ",", b);
        let outer_comma = ctx.tree.binary(inner_comma, ",", c);
        let f = ctx.tree.qualified(&["f"]);
        let x = ctx.tree.qualified(&["x"]);
        let y = ctx.tree.qualified(&["y"]);
        let inner_apply = ctx.tree.binary(f, "^^", x);
        let outer_apply = ctx.tree.binary(inner_apply, "^^", y);
        let a_def = ctx.tree.define("a", None);
        let b_def = ctx.tree.define("b", None);
        let c_def = ctx.tree.define("c", None);
        let f_def = ctx.tree.define("f", None);
        let x_def = ctx.tree.define("x", None);
        let y_def = ctx.tree.define("y", None);
        let root = ctx.tree.branch(
            NodeKind::Block,
            &[a_def, b_def, c_def, f_def, x_def, y_def, outer_comma, outer_apply],
        );
        resolved(&mut ctx, root);

        assert!(ctx.tree[inner_comma].in_tuple);
        assert!(!ctx.tree[outer_comma].in_tuple);
        assert!(ctx.tree[inner_apply].in_apply);
        assert!(!ctx.tree[outer_apply].in_apply);
        assert!(!ctx.tree[inner_apply].in_tuple);
    }

    #[test]
    fn test_scope_kind_selects_literal_constructor() {
        let mut ctx = Context::new();
        let one = ctx.tree.constant("1", "int32");
        let two = ctx.tree.constant("2", "int32");
        let pair = ctx.tree.binary(one, ",", two);
        let parallel = ctx.tree.branch(NodeKind::Scope, &[pair]);
        ctx.tree[parallel].scope_kind = ScopeKind::Parallel;

        let three = ctx.tree.constant("3", "int32");
        let four = ctx.tree.constant("4", "int32");
        let other = ctx.tree.binary(three, ",", four);
        let sequential = ctx.tree.branch(NodeKind::Scope, &[other]);
        ctx.tree[sequential].scope_kind = ScopeKind::Sequential;

        let root = ctx.tree.branch(NodeKind::Block, &[parallel, sequential]);
        resolved(&mut ctx, root);

        assert_eq!(ctx.tree[pair].constructor, Constructor::Vector);
        assert_eq!(ctx.tree[other].constructor, Constructor::Set);
        assert_eq!(ctx.tree[one].constructor, Constructor::Tuple);
    }
}

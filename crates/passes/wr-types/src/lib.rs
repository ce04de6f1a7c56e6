//! Type relations
//!
//! After scope construction every type expression has a symbol. This pass
//! connects those symbols: structural members go into `has`, supertypes into
//! `implements`, mixins into `includes`. [`finalize_types`] then collapses
//! aliases and closes `implements` transitively, so later stages can test
//! interface satisfaction with a single set lookup.

#![allow(
    clippy::panic,
    reason = "Unscoped type nodes are compiler bugs and abort the compilation"
)]

use indexmap::IndexSet;
use wr_hir::{Context, NodeId, NodeKind, SymbolId, TypeKind};

/// Connect type symbols below every root, bottom-up
///
/// # Panics
///
/// When a type node was never given a symbol by scope construction.
pub fn build_types(ctx: &mut Context, roots: &[NodeId]) {
    for &root in roots {
        build(ctx, root);
    }
}

fn build(ctx: &mut Context, node: NodeId) {
    let children = ctx.tree[node].children.clone();
    for &child in &children {
        build(ctx, child);
    }

    match ctx.tree[node].kind {
        NodeKind::TypeParam => {
            if let Some(&first) = children.first() {
                ctx.tree[node].sym = ctx.tree[first].sym;
            }
        }
        NodeKind::VectorType
        | NodeKind::RefType
        | NodeKind::ProductType
        | NodeKind::FunType
        | NodeKind::TaggedType
        | NodeKind::TypeApplication
        | NodeKind::RecordType => {
            let sym = type_sym(ctx, node);
            for child in children {
                let Some(member) = ctx.tree[child].sym else {
                    continue;
                };
                let symbol = &mut ctx.symbols[sym];
                match ctx.tree[child].kind {
                    NodeKind::TypeParam => symbol.args.push(member),
                    NodeKind::Inherits => {
                        symbol.implements.insert(member);
                        symbol.includes.insert(member);
                    }
                    NodeKind::Implements => {
                        symbol.implements.insert(member);
                    }
                    NodeKind::Includes => {
                        symbol.includes.insert(member);
                    }
                    _ => symbol.has.push(member),
                }
            }
        }
        NodeKind::SumType => {
            // Each variant is a case of the sum
            let sum = type_sym(ctx, node);
            for child in children {
                if let Some(variant) = ctx.tree[child].sym {
                    ctx.symbols[variant].implements.insert(sum);
                }
            }
        }
        NodeKind::DefType => {
            let sym = type_sym(ctx, node);
            let body = children
                .iter()
                .skip(1)
                .copied()
                .find(|&child| !ctx.tree[child].kind.is_type_header());
            if let Some(member) = body.and_then(|body| ctx.tree[body].sym) {
                ctx.symbols[sym].has.push(member);
            }
            let symbol = &ctx.symbols[sym];
            if symbol.type_kind == TypeKind::Alias {
                let name = symbol.name;
                if let Some(&first) = symbol.has.first() {
                    if ctx.symbols[first].name.is_none() {
                        ctx.symbols[first].name = name;
                    }
                }
            }
        }
        _ => {}
    }
}

fn type_sym(ctx: &Context, node: NodeId) -> SymbolId {
    match ctx.tree[node].sym {
        Some(sym) => sym,
        None => panic!(
            "internal error: {} node reached type construction unscoped",
            ctx.tree[node].kind
        ),
    }
}

/// Collapse aliases and close `implements` transitively over every symbol
///
/// Running it again on its own output changes nothing.
pub fn finalize_types(ctx: &mut Context) {
    let symbols = &mut ctx.symbols;
    let ids = symbols.ids();

    for &id in &ids {
        let implements: IndexSet<SymbolId> = symbols[id]
            .implements
            .iter()
            .map(|&ty| symbols.unalias(ty))
            .collect();
        let constraints: IndexSet<SymbolId> = symbols[id]
            .constraints
            .iter()
            .map(|&ty| symbols.unalias(ty))
            .collect();
        symbols[id].implements = implements;
        symbols[id].constraints = constraints;
    }

    // An alias's supertypes belong to what it stands for
    for &id in &ids {
        let representative = symbols.unalias(id);
        if representative == id {
            continue;
        }
        let supers: Vec<SymbolId> = symbols[id].implements.iter().copied().collect();
        for ty in supers {
            symbols[representative].implements.insert(ty);
        }
    }

    let mut passes = 0;
    loop {
        passes += 1;
        let mut changed = false;
        for &id in &ids {
            if symbols[id].implements.is_empty() {
                continue;
            }
            let supers: Vec<SymbolId> = symbols[id].implements.iter().copied().collect();
            for ty in supers {
                let inherited: Vec<SymbolId> = symbols[ty].implements.iter().copied().collect();
                for inherited in inherited {
                    if symbols[id].implements.insert(inherited) {
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
    tracing::debug!(passes, "implements closure reached a fixed point");
}

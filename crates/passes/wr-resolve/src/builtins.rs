//! Builtin tags and literal constants

use wr_hir::{Builtin, Context, NodeId, NodeKind, ResolutionError};

/// Bind every builtin-tagged node below `node` to its builtin's symbol
pub(crate) fn tag_builtins(ctx: &mut Context, node: NodeId) -> Result<(), ResolutionError> {
    if let Some(tag) = ctx.tree[node].builtin.clone() {
        let Some(builtin) = Builtin::from_name(&tag) else {
            let location = ctx.tree[node].location;
            return Err(ctx.report(ResolutionError::MalformedBuiltin {
                name: tag,
                location,
            }));
        };
        let sym = ctx.builtins.claim(builtin);
        match ctx.tree[node].kind {
            NodeKind::Ident | NodeKind::Const => {}
            NodeKind::InModule
            | NodeKind::DefType
            | NodeKind::DefFun
            | NodeKind::QualifiedIdent => {
                let Some(ident) = ctx.tree.get(node, NodeKind::Ident) else {
                    panic!("internal error: builtin '{tag}' tags a node without a name");
                };
                ctx.tree[ident].sym = Some(sym);
            }
            kind => panic!("internal error: builtin '{tag}' tags a {kind} node"),
        }
        ctx.tree[node].sym = Some(sym);
        tracing::trace!(builtin = %tag, "claimed builtin");
    }
    let children = ctx.tree[node].children.clone();
    for child in children {
        tag_builtins(ctx, child)?;
    }
    Ok(())
}

/// Make builtins no tagged node defined visible from the system module
pub(crate) fn install_unclaimed(ctx: &mut Context) -> Result<(), ResolutionError> {
    let system = ctx.builtin(Builtin::System);
    let Some(scope) = ctx.symbols[system].scope else {
        panic!("internal error: builtins installed before the system module exists");
    };
    let unclaimed: Vec<Builtin> = ctx
        .builtins
        .unclaimed()
        .filter(|&builtin| builtin != Builtin::System)
        .collect();
    for builtin in unclaimed {
        let sym = ctx.builtin(builtin);
        ctx.declare(scope, builtin.name(), Some(sym), None)?;
    }
    Ok(())
}

/// Give every literal below `node` its canonical symbol
pub(crate) fn build_constants(ctx: &mut Context, node: NodeId) -> Result<(), ResolutionError> {
    if ctx.tree[node].kind == NodeKind::Const {
        if ctx.tree[node].sym.is_none() {
            let sym = constant_sym(ctx, node)?;
            ctx.tree[node].sym = Some(sym);
        }
        return Ok(());
    }
    let children = ctx.tree[node].children.clone();
    for child in children {
        build_constants(ctx, child)?;
    }
    Ok(())
}

fn constant_sym(ctx: &mut Context, node: NodeId) -> Result<wr_hir::SymbolId, ResolutionError> {
    let text = ctx.tree[node].string.clone().unwrap_or_default();
    let text = text.trim_end();
    if let Some(name) = symbol_literal(text) {
        return Ok(ctx.make_symbol(name));
    }

    let ty = match ctx.tree[node].constant_type.clone() {
        None => None,
        Some(type_name) => match Builtin::from_name(type_name.trim_end()) {
            Some(builtin) => Some(ctx.builtin(builtin)),
            None => {
                let location = ctx.tree[node].location;
                return Err(ctx.report(ResolutionError::MalformedBuiltin {
                    name: type_name,
                    location,
                }));
            }
        },
    };
    Ok(ctx.symbols.constant(text, ty))
}

/// Name of a `#name` or `#"name"` literal
fn symbol_literal(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('#').filter(|rest| !rest.is_empty())?;
    match rest.strip_prefix('"') {
        Some(quoted) => Some(quoted.strip_suffix('"').unwrap_or(quoted)),
        None => Some(rest),
    }
}

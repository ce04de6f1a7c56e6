//! Compilation driver
//!
//! Runs the front-end passes in order over a forest handed over by the
//! parser: scope construction, type relations, label resolution and
//! lowering. The first resolution error stops the pipeline; nothing is
//! lowered from a partially resolved tree.

mod options;

pub use options::CompileOptions;

use miette::Diagnostic;
use thiserror::Error;
use wr_hir::{Context, NodeId, ResolutionError};
use wr_ir::Program;

/// Errors surfaced by the driver
#[derive(Error, Debug, Diagnostic)]
pub enum CompileError {
    /// Name resolution failed; already reported to the context's sink
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ResolutionError),

    /// Options table could not be parsed
    #[error("invalid compile options: {0}")]
    #[diagnostic(code(driver::options), help("known keys are user_module and trace_symbols"))]
    Options(#[from] toml::de::Error),
}

/// Compile the forest `roots` into a program
///
/// # Errors
///
/// The first resolution error met by scope construction.
///
/// # Panics
///
/// When a pass finds the tree in a state an earlier pass should have ruled out.
pub fn compile(
    ctx: &mut Context,
    roots: &[NodeId],
    options: &CompileOptions,
) -> Result<Program, CompileError> {
    ctx.trace_symbols = options.trace_symbols;

    let user = wr_resolve::resolve(ctx, roots, &options.user_module)?;
    wr_types::build_types(ctx, roots);
    wr_types::finalize_types(ctx);
    wr_labels::resolve_labels(ctx, roots, user);
    let program = wr_lower::lower(ctx, roots, user);

    tracing::info!(
        closures = program.closures.len(),
        modules = ctx.modules.len(),
        "compiled"
    );
    Ok(program)
}

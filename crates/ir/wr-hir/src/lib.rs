//! Annotated syntax tree, scope graph and symbol table
//!
//! Every pass of the front end reads and writes the structures defined here
//! through a single [`Context`] created once per compilation.
#![allow(
    clippy::panic,
    reason = "Broken tree invariants are compiler bugs and abort the compilation"
)]
#![allow(
    clippy::multiple_inherent_impl,
    reason = "Tree construction helpers live apart from the tree itself"
)]
#![allow(
    clippy::struct_excessive_bools,
    reason = "Nodes and symbols carry independent annotation flags"
)]

mod build;
mod builtin;
mod context;
mod error;
mod scope;
mod symbol;
mod tree;

pub use builtin::{Builtin, Builtins};
pub use context::Context;
pub use error::{CollectSink, DiagnosticSink, LogSink, ResolutionError};
pub use scope::{Binding, Scope, ScopeId, ScopeKind, ScopeTree};
pub use symbol::{LabelMap, Symbol, SymbolId, SymbolTable, TypeKind};
pub use tree::{Constructor, ExternRef, LabelId, Node, NodeId, NodeKind, ParseFragment, Tree};

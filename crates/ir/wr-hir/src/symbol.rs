//! Named and anonymous entities bound by scopes

use crate::{Builtin, NodeId, ScopeId};
use indexmap::IndexSet;
use la_arena::{Arena, Idx};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::{Index, IndexMut};
use wr_intern::Name;

/// Handle to a symbol
pub type SymbolId = Idx<Symbol>;

/// Per-function or per-module table from label name to declaring node
pub type LabelMap = FxHashMap<Name, NodeId>;

/// Classification of a type symbol
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub enum TypeKind {
    /// Not a type
    #[default]
    None,
    /// Declared but without a body yet
    Unknown,
    /// Machine-level builtin type
    Primitive,
    /// Ordered tuple of members
    Product,
    /// Homogeneous sequence
    Vector,
    /// Reference to another type
    Ref,
    /// Choice between variants
    Sum,
    /// Callable signature
    Function,
    /// Member tagged by a symbol literal
    Tagged,
    /// Generic type applied to arguments
    Application,
    /// Nominal record with named fields
    Record,
    /// Another name for an existing type
    Alias,
}

/// An entity: module, type, function, variable, literal or temporary
#[derive(Debug, Clone, Default)]
pub struct Symbol {
    /// None for anonymous temporaries
    pub name: Option<Name>,
    /// Module, type or function the symbol belongs to
    pub owner: Option<SymbolId>,
    /// Installed into a scope table
    pub owned: bool,
    /// Type of the entity
    pub ty: Option<SymbolId>,
    /// Kind of type, `None` for non-types
    pub type_kind: TypeKind,
    /// Scope opened by the entity (module, type or function body)
    pub scope: Option<ScopeId>,
    /// Structural members, in order
    pub has: Vec<SymbolId>,
    /// Types this type is a subtype of
    pub implements: IndexSet<SymbolId>,
    /// Types whose members are spliced into this one
    pub includes: IndexSet<SymbolId>,
    /// Types a generic parameter must implement
    pub constraints: IndexSet<SymbolId>,
    /// Generic type parameters, in order
    pub args: Vec<SymbolId>,
    /// Continuation slot of a function
    pub cont: Option<SymbolId>,
    /// Return value slot of a function
    pub ret: Option<SymbolId>,
    /// Labels declared in a function or module body
    pub labels: Option<LabelMap>,
    /// The symbol is a module
    pub is_module: bool,
    /// Initializer function of a module
    pub init: Option<SymbolId>,
    /// Literal payload
    pub constant: Option<String>,
    /// Interned symbol literal such as `#print`
    pub is_symbol: bool,
    /// Builtin this symbol stands for
    pub builtin: Option<Builtin>,
    /// Formal that absorbs the remaining arguments
    pub vararg: bool,
    /// Destructurable tuple group of a formal pattern
    pub pattern: bool,
    /// Defining tree node
    pub ast: Option<NodeId>,
}

impl Symbol {
    /// The symbol names a type
    #[must_use]
    pub fn is_type(&self) -> bool {
        self.type_kind != TypeKind::None
    }

    /// Append a generic parameter unless it is already present
    pub fn add_arg(&mut self, arg: SymbolId) {
        if !self.args.contains(&arg) {
            self.args.push(arg);
        }
    }
}

/// Arena of every symbol plus the literal canonicalization caches
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Arena<Symbol>,
    symbol_literals: FxHashMap<Name, SymbolId>,
    constants: FxHashMap<(Option<SymbolId>, String), SymbolId>,
}

impl SymbolTable {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh symbol named `name`
    pub fn alloc(&mut self, name: Option<Name>) -> SymbolId {
        self.symbols.alloc(Symbol {
            name,
            ..Symbol::default()
        })
    }

    /// Every symbol handle, in allocation order
    #[must_use]
    pub fn ids(&self) -> Vec<SymbolId> {
        self.symbols.iter().map(|(id, _)| id).collect()
    }

    /// The unique symbol literal for `name`, typed by `ty`
    pub fn symbol_literal(&mut self, name: Name, ty: SymbolId) -> SymbolId {
        if let Some(&existing) = self.symbol_literals.get(&name) {
            return existing;
        }
        let id = self.alloc(Some(name));
        let symbol = &mut self.symbols[id];
        symbol.is_symbol = true;
        symbol.ty = Some(ty);
        self.symbol_literals.insert(name, id);
        id
    }

    /// The canonical constant for `text` of type `ty`
    pub fn constant(&mut self, text: &str, ty: Option<SymbolId>) -> SymbolId {
        let key = (ty, text.to_owned());
        if let Some(&existing) = self.constants.get(&key) {
            return existing;
        }
        let id = self.alloc(None);
        let symbol = &mut self.symbols[id];
        symbol.constant = Some(text.to_owned());
        symbol.ty = ty;
        self.constants.insert(key, id);
        id
    }

    /// Follow alias edges to the representative symbol
    #[must_use]
    pub fn unalias(&self, id: SymbolId) -> SymbolId {
        let mut seen = FxHashSet::default();
        let mut current = id;
        while self.symbols[current].type_kind == TypeKind::Alias && seen.insert(current) {
            match self.symbols[current].has.first() {
                Some(&next) => current = next,
                None => break,
            }
        }
        current
    }
}

impl Index<SymbolId> for SymbolTable {
    type Output = Symbol;

    fn index(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }
}

impl IndexMut<SymbolId> for SymbolTable {
    fn index_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }
}

//! Scope graph for name resolution

use crate::SymbolId;
use la_arena::{Arena, Idx};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::{Index, IndexMut};
use wr_intern::Name;

/// Handle to a scope
pub type ScopeId = Idx<Scope>;

/// How the members of a scope may refer to each other
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub enum ScopeKind {
    /// Takes the kind of the enclosing scope
    #[default]
    Inherit,
    /// Members may refer to each other regardless of textual order
    Recursive,
    /// Variables and functions are visible only after their definition
    Sequential,
    /// Ordered like `Sequential`; bare literal blocks build sequences
    Parallel,
}

/// A name bound in a scope
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Binding {
    /// Bound symbol
    pub sym: SymbolId,
    /// Preorder position of the definition, for ordered bindings
    pub position: Option<u32>,
}

/// A naming environment
#[derive(Debug, Clone)]
pub struct Scope {
    /// Lexical parent (None only for the global scope)
    pub parent: Option<ScopeId>,
    /// Extra parents searched on a local miss
    pub dynamic: Vec<ScopeId>,
    /// Ordering discipline of the members
    pub kind: ScopeKind,
    /// Module, type or function the scope belongs to
    pub owner: Option<SymbolId>,
    names: FxHashMap<Name, Binding>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, kind: ScopeKind, owner: Option<SymbolId>) -> Self {
        Self {
            parent,
            dynamic: Vec::new(),
            kind,
            owner,
            names: FxHashMap::default(),
        }
    }

    /// Binding of `name` in this very scope
    #[must_use]
    pub fn binding(&self, name: Name) -> Option<Binding> {
        self.names.get(&name).copied()
    }
}

/// Every scope of a compilation, rooted at the global scope
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Arena<Scope>,
    global: ScopeId,
}

impl ScopeTree {
    /// Tree holding only the global scope
    #[must_use]
    pub fn new() -> Self {
        let mut scopes = Arena::new();
        let global = scopes.alloc(Scope::new(None, ScopeKind::Recursive, None));
        Self { scopes, global }
    }

    /// The root scope
    #[must_use]
    pub fn global(&self) -> ScopeId {
        self.global
    }

    /// New child scope of `parent`
    pub fn create(
        &mut self,
        parent: ScopeId,
        kind: ScopeKind,
        owner: Option<SymbolId>,
    ) -> ScopeId {
        let scope = self.scopes.alloc(Scope::new(Some(parent), kind, owner));
        tracing::trace!(?scope, ?parent, ?kind, "creating scope");
        scope
    }

    /// Search `extra` whenever a lookup misses locally in `scope`
    pub fn add_dynamic(&mut self, scope: ScopeId, extra: ScopeId) {
        let dynamic = &mut self.scopes[scope].dynamic;
        if extra != scope && !dynamic.contains(&extra) {
            dynamic.push(extra);
        }
    }

    /// Kind of `scope` with `Inherit` resolved through its parents
    #[must_use]
    pub fn effective_kind(&self, scope: ScopeId) -> ScopeKind {
        let mut current = scope;
        loop {
            let data = &self.scopes[current];
            match (data.kind, data.parent) {
                (ScopeKind::Inherit, Some(parent)) => current = parent,
                (ScopeKind::Inherit, None) => return ScopeKind::Recursive,
                (kind, _) => return kind,
            }
        }
    }

    /// Symbol bound to `name` in `scope` itself
    #[must_use]
    pub fn get_local(&self, scope: ScopeId, name: Name) -> Option<SymbolId> {
        self.scopes[scope].binding(name).map(|binding| binding.sym)
    }

    /// Bind `name` in `scope`
    ///
    /// # Errors
    ///
    /// Returns the symbol already bound to `name` in this scope, if any.
    pub fn insert(
        &mut self,
        scope: ScopeId,
        name: Name,
        sym: SymbolId,
        position: Option<u32>,
    ) -> Result<(), SymbolId> {
        let names = &mut self.scopes[scope].names;
        if let Some(existing) = names.get(&name) {
            return Err(existing.sym);
        }
        names.insert(name, Binding { sym, position });
        Ok(())
    }

    /// Resolve `name` as seen from `scope` by a use at preorder position `at`
    ///
    /// Each scope is searched locally, then through its extra parents, then
    /// through its lexical parent.
    #[must_use]
    pub fn lookup(&self, scope: ScopeId, name: Name, at: Option<u32>) -> Option<SymbolId> {
        let mut visited = FxHashSet::default();
        self.lookup_from(scope, name, at, &mut visited)
    }

    fn lookup_from(
        &self,
        scope: ScopeId,
        name: Name,
        at: Option<u32>,
        visited: &mut FxHashSet<ScopeId>,
    ) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if !visited.insert(id) {
                return None;
            }
            let data = &self.scopes[id];
            if let Some(binding) = data.binding(name) {
                if self.is_visible(id, binding, at) {
                    return Some(binding.sym);
                }
            }
            for &extra in &data.dynamic {
                if let Some(sym) = self.lookup_from(extra, name, None, visited) {
                    return Some(sym);
                }
            }
            current = data.parent;
        }
        None
    }

    fn is_visible(&self, scope: ScopeId, binding: Binding, at: Option<u32>) -> bool {
        match (binding.position, at) {
            (Some(defined), Some(used)) if self.is_ordered(scope) => defined < used,
            _ => true,
        }
    }

    fn is_ordered(&self, scope: ScopeId) -> bool {
        matches!(
            self.effective_kind(scope),
            ScopeKind::Sequential | ScopeKind::Parallel
        )
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<ScopeId> for ScopeTree {
    type Output = Scope;

    fn index(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }
}

impl IndexMut<ScopeId> for ScopeTree {
    fn index_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id]
    }
}

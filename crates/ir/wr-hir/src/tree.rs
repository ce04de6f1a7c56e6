//! Kind-tagged n-ary tree shared by every pass
//!
//! The parser hands the pipeline a forest of [`Node`]s allocated in a
//! [`Tree`]. Passes never delete nodes; they annotate them in place (scope,
//! bound symbol, labels, lowered value) and read each other's annotations.

use crate::{ScopeId, ScopeKind, SymbolId};
use la_arena::{Arena, Idx};
use rustc_hash::FxHashMap;
use std::fmt;
use std::mem;
use std::ops::{Index, IndexMut};
use wr_span::Location;

/// Handle to a tree node
pub type NodeId = Idx<Node>;

/// Instruction-address label allocated during label resolution
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "L{}", self.0)
    }
}

/// Opaque reference from a node to something owned by a downstream consumer
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct ExternRef(pub u32);

/// Syntactic kind of a node
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum NodeKind {
    /// `in module` qualifier; switches the current module for following siblings
    InModule,
    /// Type definition: `[ident, params/constraints..., body?]`
    DefType,
    /// Formal type parameter of a type definition
    DefTypeParam,
    /// Actual type argument of an application: `[qualified_ident]`
    TypeParam,
    /// Generic bound: `[qualified_ident, type_param...]`
    Constraint,
    /// Supertype that is also included: `[qualified_ident, type_param...]`
    Inherits,
    /// Interface the enclosing type satisfies
    Implements,
    /// Mixin folded into the enclosing type
    Includes,
    /// `where` clause: `[qualified_ident, constraint/def_type_param...]`
    Where,
    /// Function definition: `[qualified_ident, formals..., body]`
    DefFun,
    /// Formal argument: `[ident?, const?, qualified_ident?, constraint?]`
    Arg,
    /// Formal collecting the remaining arguments
    Vararg,
    /// Destructuring formal: `[formal...]`
    Pattern,
    /// Variable definition: `[ident, initializer?]`
    DefIdent,
    /// Member declaration: `[ident, type?]`
    DeclareIdent,
    /// Bare name
    Ident,
    /// Leading `::` of a qualified identifier
    Global,
    /// `a::b::c`: `[global?, ident...]`
    QualifiedIdent,
    /// Operator application: `[lhs?, operator const, rhs?]`, see [`Node::op_index`]
    Op,
    /// Literal
    Const,
    /// `[before?, loop_cond, body]`, or `[body, loop_cond]` when tested after the body
    Loop,
    /// Loop condition: `[expression]`
    LoopCond,
    /// `[condition, then, else?]`
    If,
    /// `break` with an optional target name
    Break,
    /// `continue` with an optional target name
    Continue,
    /// `return` with an optional value
    Return,
    /// `goto` a named label
    Goto,
    /// Named jump target
    Label,
    /// Statement sequence without a scope of its own
    Block,
    /// Explicit scope marker, opening a scope of [`Node::scope_kind`]
    Scope,
    /// Pattern-with construct with a scope of its own
    With,
    /// `[a, b, ...]` literal
    List,
    /// Vector literal
    Vector,
    /// `{a, b, ...}` literal
    Object,
    /// Vector type expression
    VectorType,
    /// Reference type expression
    RefType,
    /// Product type expression
    ProductType,
    /// Sum type expression, one child per variant
    SumType,
    /// Function type expression
    FunType,
    /// Tagged type expression
    TaggedType,
    /// Type constructor applied to arguments
    TypeApplication,
    /// Record type expression
    RecordType,
}

impl NodeKind {
    /// Name used in tree dumps and diagnostics
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::InModule => "in_module",
            Self::DefType => "def_type",
            Self::DefTypeParam => "def_type_param",
            Self::TypeParam => "type_param",
            Self::Constraint => "constraint",
            Self::Inherits => "inherits",
            Self::Implements => "implements",
            Self::Includes => "includes",
            Self::Where => "where",
            Self::DefFun => "def_fun",
            Self::Arg => "arg",
            Self::Vararg => "vararg",
            Self::Pattern => "pattern",
            Self::DefIdent => "def_ident",
            Self::DeclareIdent => "declare_ident",
            Self::Ident => "ident",
            Self::Global => "global",
            Self::QualifiedIdent => "qualified_ident",
            Self::Op => "op",
            Self::Const => "const",
            Self::Loop => "loop",
            Self::LoopCond => "loop_cond",
            Self::If => "if",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Return => "return",
            Self::Goto => "goto",
            Self::Label => "label",
            Self::Block => "block",
            Self::Scope => "scope",
            Self::With => "with",
            Self::List => "list",
            Self::Vector => "vector",
            Self::Object => "object",
            Self::VectorType => "vector_type",
            Self::RefType => "ref_type",
            Self::ProductType => "product_type",
            Self::SumType => "sum_type",
            Self::FunType => "fun_type",
            Self::TaggedType => "tagged_type",
            Self::TypeApplication => "type_application",
            Self::RecordType => "record_type",
        }
    }

    /// Parameters and constraints of a type definition, as opposed to its body
    #[must_use]
    pub fn is_type_header(self) -> bool {
        matches!(self, Self::DefTypeParam | Self::Constraint)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Which constructor a bare comma chain lowers to
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub enum Constructor {
    /// Ordered, fixed-size product
    #[default]
    Tuple,
    /// Ordered sequence
    Vector,
    /// Unordered collection
    Set,
}

/// A tree node and every per-pass annotation attached to it
#[derive(Debug, Clone)]
pub struct Node {
    /// Syntactic kind
    pub kind: NodeKind,
    /// Ordered children; insertion order is significant
    pub children: Vec<NodeId>,
    /// Source position, inherited from the first located child
    pub location: Option<Location>,
    /// Preorder position across the forest, assigned before scope construction
    pub order: Option<u32>,
    /// Scope the node is evaluated in
    pub scope: Option<ScopeId>,
    /// Scope opened by an explicit scope marker
    pub body_scope: Option<ScopeId>,
    /// Annotated kind of an explicit scope marker
    pub scope_kind: ScopeKind,
    /// Symbol the node declares or refers to
    pub sym: Option<SymbolId>,
    /// Identifier text or literal payload
    pub string: Option<String>,
    /// Builtin type name of a literal payload
    pub constant_type: Option<String>,
    /// Name of the builtin the node defines
    pub builtin: Option<String>,
    /// Index of the operator token among an `Op` node's children
    pub op_index: usize,
    /// Entry and exit label slots
    pub label: [Option<LabelId>; 2],
    /// Value produced by lowering this node
    pub rval: Option<SymbolId>,
    /// Assignable location produced by lowering this node
    pub lval: Option<SymbolId>,
    /// Comma operator that is the left operand of another comma operator
    pub in_tuple: bool,
    /// `^^` operator that is the left operand of another `^^` operator
    pub in_apply: bool,
    /// Record type that is the body of a type definition
    pub def_record_type: bool,
    /// Definition that break/continue may name as a target
    pub def_ident_label: bool,
    /// Constructor a comma chain directly inside a scope marker builds
    pub constructor: Constructor,
    /// References into structures owned outside the tree
    pub extern_refs: Vec<ExternRef>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            location: None,
            order: None,
            scope: None,
            body_scope: None,
            scope_kind: ScopeKind::Inherit,
            sym: None,
            string: None,
            constant_type: None,
            builtin: None,
            op_index: 0,
            label: [None, None],
            rval: None,
            lval: None,
            in_tuple: false,
            in_apply: false,
            def_record_type: false,
            def_ident_label: false,
            constructor: Constructor::Tuple,
            extern_refs: Vec::new(),
        }
    }
}

/// A fragment of the parser's own tree
///
/// A fragment either already carries a semantic node, which is folded into
/// the enclosing node as-is, or is transparent and contributes whatever its
/// own fragments carry.
pub trait ParseFragment: Sized {
    /// Semantic node the fragment stands for, if it has one
    fn attached(&self) -> Option<NodeId>;

    /// Nested fragments, in source order
    fn fragments(&self) -> &[Self];
}

/// Arena owning every node of a compilation
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Arena<Node>,
}

impl Tree {
    /// Create an empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a childless node of `kind`
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.alloc(Node::new(kind))
    }

    /// Allocate a childless node of `kind` at `location`
    pub fn alloc_at(&mut self, kind: NodeKind, location: Location) -> NodeId {
        let id = self.alloc(kind);
        self.nodes[id].location = Some(location);
        id
    }

    /// Append `child`; the parent adopts the first located child's location
    pub fn add(&mut self, parent: NodeId, child: NodeId) {
        if self.nodes[parent].location.is_none() {
            self.nodes[parent].location = self.nodes[child].location;
        }
        self.nodes[parent].children.push(child);
    }

    /// Fold a parse fragment into `parent`
    pub fn add_fragment<F: ParseFragment>(&mut self, parent: NodeId, fragment: &F) {
        match fragment.attached() {
            Some(node) => self.add(parent, node),
            None => self.add_below(parent, fragment),
        }
    }

    /// Fold each of a fragment's own fragments into `parent`
    pub fn add_below<F: ParseFragment>(&mut self, parent: NodeId, fragment: &F) {
        for child in fragment.fragments() {
            self.add_fragment(parent, child);
        }
    }

    /// Ordered children of `id`
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Last child of `id`
    #[must_use]
    pub fn last(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].children.last().copied()
    }

    /// Direct child of `kind`
    #[must_use]
    pub fn child(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child].kind == kind)
    }

    /// Direct child of `kind`, else the first such descendant depth-first
    #[must_use]
    pub fn get(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        if let Some(child) = self.child(id, kind) {
            return Some(child);
        }
        self.nodes[id]
            .children
            .iter()
            .find_map(|&child| self.get(child, kind))
    }

    /// Text of the identifier below `id`
    #[must_use]
    pub fn ident_text(&self, id: NodeId) -> Option<&str> {
        let ident = if self.nodes[id].kind == NodeKind::Ident {
            id
        } else {
            self.get(id, NodeKind::Ident)?
        };
        self.nodes[ident].string.as_deref()
    }

    /// Final identifier of a qualified identifier
    #[must_use]
    pub fn qualified_ident_ident(&self, id: NodeId) -> Option<NodeId> {
        self.last(id)
    }

    /// `a::b::c` rendering of a qualified identifier
    #[must_use]
    pub fn qualified_ident_string(&self, id: NodeId) -> String {
        self.nodes[id]
            .children
            .iter()
            .map(|&segment| self.nodes[segment].string.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("::")
    }

    /// Deep-copy a subtree, remapping external references through `map`
    pub fn copy_subtree(
        &mut self,
        id: NodeId,
        map: Option<&FxHashMap<ExternRef, ExternRef>>,
    ) -> NodeId {
        let mut copy = self.nodes[id].clone();
        if let Some(map) = map {
            for reference in &mut copy.extern_refs {
                if let Some(&mapped) = map.get(reference) {
                    *reference = mapped;
                }
            }
        }
        let children = mem::take(&mut copy.children);
        copy.children = children
            .into_iter()
            .map(|child| self.copy_subtree(child, map))
            .collect();
        self.nodes.alloc(copy)
    }

    /// Number every node of `roots` in preorder
    pub fn number_preorder(&mut self, roots: &[NodeId]) {
        let mut next = 1;
        let mut stack: Vec<NodeId> = roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            self.nodes[id].order = Some(next);
            next += 1;
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wr_span::FileId;

    struct Fragment {
        node: Option<NodeId>,
        children: Vec<Fragment>,
    }

    impl ParseFragment for Fragment {
        fn attached(&self) -> Option<NodeId> {
            self.node
        }

        fn fragments(&self) -> &[Self] {
            &self.children
        }
    }

    #[test]
    fn test_location_comes_from_first_located_child() {
        let mut tree = Tree::new();
        let block = tree.alloc(NodeKind::Block);
        let unlocated = tree.alloc(NodeKind::Ident);
        let first = tree.alloc_at(NodeKind::Ident, Location::new(FileId(0), 3));
        let second = tree.alloc_at(NodeKind::Ident, Location::new(FileId(0), 9));

        tree.add(block, unlocated);
        assert_eq!(tree[block].location, None);
        tree.add(block, first);
        tree.add(block, second);
        assert_eq!(tree[block].location, Some(Location::new(FileId(0), 3)));
        assert_eq!(tree.children(block), &[unlocated, first, second]);
    }

    #[test]
    fn test_get_prefers_direct_children() {
        let mut tree = Tree::new();
        let deep = tree.ident("deep");
        let inner = tree.branch(NodeKind::Block, &[deep]);
        let direct = tree.ident("direct");
        let outer = tree.branch(NodeKind::Block, &[inner, direct]);

        assert_eq!(tree.get(outer, NodeKind::Ident), Some(direct));
        assert_eq!(tree.get(inner, NodeKind::Ident), Some(deep));
        assert_eq!(tree.child(outer, NodeKind::Const), None);
    }

    #[test]
    fn test_fragments_fold_attached_nodes_only() {
        let mut tree = Tree::new();
        let parent = tree.alloc(NodeKind::Block);
        let first = tree.ident("a");
        let second = tree.ident("b");
        let fragment = Fragment {
            node: None,
            children: vec![
                Fragment {
                    node: Some(first),
                    children: Vec::new(),
                },
                Fragment {
                    node: None,
                    children: vec![Fragment {
                        node: Some(second),
                        children: Vec::new(),
                    }],
                },
            ],
        };

        tree.add_below(parent, &fragment);
        assert_eq!(tree.children(parent), &[first, second]);
    }

    #[test]
    fn test_copy_is_independent_of_original() {
        let mut tree = Tree::new();
        let name = tree.ident("x");
        let qid = tree.branch(NodeKind::QualifiedIdent, &[name]);
        tree[qid].extern_refs.push(ExternRef(1));

        let mut map = FxHashMap::default();
        map.insert(ExternRef(1), ExternRef(7));
        let copy = tree.copy_subtree(qid, Some(&map));

        assert_ne!(copy, qid);
        assert_eq!(tree[copy].extern_refs, vec![ExternRef(7)]);
        assert_eq!(tree[qid].extern_refs, vec![ExternRef(1)]);

        let copied_name = tree.children(copy)[0];
        assert_ne!(copied_name, name);
        tree[copied_name].string = Some("y".to_owned());
        assert_eq!(tree.qualified_ident_string(qid), "x");
        assert_eq!(tree.qualified_ident_string(copy), "y");
    }

    #[test]
    fn test_preorder_numbering() {
        let mut tree = Tree::new();
        let left = tree.ident("a");
        let right = tree.ident("b");
        let root = tree.branch(NodeKind::Block, &[left, right]);
        let other = tree.ident("c");

        tree.number_preorder(&[root, other]);
        assert_eq!(tree[root].order, Some(1));
        assert_eq!(tree[left].order, Some(2));
        assert_eq!(tree[right].order, Some(3));
        assert_eq!(tree[other].order, Some(4));
    }
}

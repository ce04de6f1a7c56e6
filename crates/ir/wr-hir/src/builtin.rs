//! Fixed table of runtime-provided builtins

use crate::{SymbolId, SymbolTable, TypeKind};
use rustc_hash::FxHashSet;
use wr_intern::Interner;

/// A capability the runtime provides under a fixed name
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum Builtin {
    /// Module holding every builtin no tagged node defines
    System,
    /// Type of module symbols
    Module,
    /// Type of function symbols
    Function,
    /// Type of symbol literals
    Symbol,
    /// Type of continuation slots
    Continuation,
    /// Product type of tuples and destructuring patterns
    Tuple,
    /// Vector type
    Vector,
    /// Reference type
    Ref,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    Uint8,
    /// 16-bit unsigned integer
    Uint16,
    /// 32-bit unsigned integer
    Uint32,
    /// 64-bit unsigned integer
    Uint64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// 80-bit extended float
    Float80,
    /// 128-bit float
    Float128,
    /// Boolean
    Bool,
    /// String
    String,
    /// The null value
    Null,
    /// Reply to a continuation with a value
    Reply,
    /// Tuple constructor
    MakeTuple,
    /// Vector constructor
    MakeVector,
    /// Set constructor
    MakeSet,
    /// List constructor
    MakeList,
    /// Generic operator dispatch
    Operator,
    /// Runtime primitive dispatch
    Primitive,
    /// Dereference primitive
    Deref,
    /// Program entry
    Init,
}

impl Builtin {
    /// Every builtin, in table order
    pub const ALL: [Builtin; 32] = [
        Self::System,
        Self::Module,
        Self::Function,
        Self::Symbol,
        Self::Continuation,
        Self::Tuple,
        Self::Vector,
        Self::Ref,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Float32,
        Self::Float64,
        Self::Float80,
        Self::Float128,
        Self::Bool,
        Self::String,
        Self::Null,
        Self::Reply,
        Self::MakeTuple,
        Self::MakeVector,
        Self::MakeSet,
        Self::MakeList,
        Self::Operator,
        Self::Primitive,
        Self::Deref,
        Self::Init,
    ];

    /// Name the builtin is known by
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Module => "module",
            Self::Function => "function",
            Self::Symbol => "symbol",
            Self::Continuation => "continuation",
            Self::Tuple => "tuple",
            Self::Vector => "vector",
            Self::Ref => "ref",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Float80 => "float80",
            Self::Float128 => "float128",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Null => "null",
            Self::Reply => "reply",
            Self::MakeTuple => "make_tuple",
            Self::MakeVector => "make_vector",
            Self::MakeSet => "make_set",
            Self::MakeList => "make_list",
            Self::Operator => "operator",
            Self::Primitive => "primitive",
            Self::Deref => "deref",
            Self::Init => "init",
        }
    }

    /// Builtin called `name`
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|builtin| builtin.name() == name)
    }

    /// Type classification of the builtin
    #[must_use]
    pub fn type_kind(self) -> TypeKind {
        match self {
            Self::Int8
            | Self::Int16
            | Self::Int32
            | Self::Int64
            | Self::Uint8
            | Self::Uint16
            | Self::Uint32
            | Self::Uint64
            | Self::Float32
            | Self::Float64
            | Self::Float80
            | Self::Float128
            | Self::Bool
            | Self::String
            | Self::Symbol
            | Self::Continuation => TypeKind::Primitive,
            Self::Tuple => TypeKind::Product,
            Self::Vector => TypeKind::Vector,
            Self::Ref => TypeKind::Ref,
            _ => TypeKind::None,
        }
    }
}

/// Symbols pre-allocated for every builtin of one compilation
#[derive(Debug)]
pub struct Builtins {
    syms: Vec<SymbolId>,
    claimed: FxHashSet<Builtin>,
}

impl Builtins {
    /// Allocate one symbol per builtin
    pub fn new(symbols: &mut SymbolTable, interner: &Interner) -> Self {
        let syms = Builtin::ALL
            .iter()
            .map(|&builtin| {
                let id = symbols.alloc(Some(interner.intern(builtin.name())));
                symbols[id].builtin = Some(builtin);
                symbols[id].type_kind = builtin.type_kind();
                id
            })
            .collect();
        Self {
            syms,
            claimed: FxHashSet::default(),
        }
    }

    /// Symbol of `builtin`
    #[must_use]
    pub fn sym(&self, builtin: Builtin) -> SymbolId {
        self.syms[builtin as usize]
    }

    /// Mark a builtin as defined by a tagged node
    pub fn claim(&mut self, builtin: Builtin) -> SymbolId {
        self.claimed.insert(builtin);
        self.sym(builtin)
    }

    /// Whether a tagged node defined `builtin`
    #[must_use]
    pub fn is_claimed(&self, builtin: Builtin) -> bool {
        self.claimed.contains(&builtin)
    }

    /// Builtins no tagged node defined, in table order
    pub fn unclaimed(&self) -> impl Iterator<Item = Builtin> + '_ {
        Builtin::ALL
            .iter()
            .copied()
            .filter(|builtin| !self.claimed.contains(builtin))
    }
}

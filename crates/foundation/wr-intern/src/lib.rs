//! String interning for identifiers, operators and literal payloads

pub use lasso::Spur as Name;
use lasso::ThreadedRodeo;

/// Interner shared by every pass of one compilation
///
/// `ThreadedRodeo` interns through `&self`, so the interner can be read while
/// the rest of the compilation context is borrowed mutably.
#[derive(Debug, Default)]
pub struct Interner {
    inner: ThreadedRodeo,
}

impl Interner {
    /// Create an empty interner
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: ThreadedRodeo::new(),
        }
    }

    /// Intern `text`, returning the existing handle if it was seen before
    pub fn intern(&self, text: &str) -> Name {
        self.inner.get_or_intern(text)
    }

    /// Text behind an interned handle
    #[must_use]
    pub fn resolve(&self, name: Name) -> &str {
        self.inner.resolve(&name)
    }

    /// Look a string up without interning it
    #[must_use]
    pub fn get(&self, text: &str) -> Option<Name> {
        self.inner.get(text)
    }
}

//! Resolution errors and the sink they are reported through

#![allow(unused_assignments, reason = "Fields are read by derive macros")]

use miette::Diagnostic;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use wr_span::Location;

/// Errors that stop the pipeline before lowering
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ResolutionError {
    /// Name already bound in a scope that disallows redeclaration
    #[error("duplicate identifier '{name}'")]
    #[diagnostic(
        code(resolve::duplicate_identifier),
        help("rename one of the definitions")
    )]
    DuplicateIdentifier {
        /// Offending name as written
        name: String,
        /// Where the name was used, when known
        location: Option<Location>,
    },

    /// Final name of a qualified identifier is not visible
    #[error("unresolved identifier '{name}'")]
    #[diagnostic(code(resolve::unresolved_identifier))]
    UnresolvedIdentifier {
        /// Offending name as written
        name: String,
        /// Where the name was used, when known
        location: Option<Location>,
    },

    /// A qualifier segment does not name anything with a scope
    #[error("unresolved identifier qualifier '{name}'")]
    #[diagnostic(code(resolve::unresolved_qualifier))]
    UnresolvedQualifier {
        /// Offending name as written
        name: String,
        /// Where the name was used, when known
        location: Option<Location>,
    },

    /// Builtin tag outside the fixed builtin table
    #[error("builtin not found '{name}'")]
    #[diagnostic(code(resolve::malformed_builtin))]
    MalformedBuiltin {
        /// Offending name as written
        name: String,
        /// Where the name was used, when known
        location: Option<Location>,
    },
}

impl ResolutionError {
    /// Offending name as written
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::DuplicateIdentifier { name, .. }
            | Self::UnresolvedIdentifier { name, .. }
            | Self::UnresolvedQualifier { name, .. }
            | Self::MalformedBuiltin { name, .. } => name,
        }
    }

    /// Where the offending name was used, when known
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::DuplicateIdentifier { location, .. }
            | Self::UnresolvedIdentifier { location, .. }
            | Self::UnresolvedQualifier { location, .. }
            | Self::MalformedBuiltin { location, .. } => *location,
        }
    }
}

/// Receiver of user-facing resolution diagnostics
pub trait DiagnosticSink {
    /// Deliver one diagnostic
    fn report(&mut self, error: &ResolutionError);
}

/// Sink that logs every report
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, error: &ResolutionError) {
        match error.location() {
            Some(location) => tracing::error!(%location, "{error}"),
            None => tracing::error!("{error}"),
        }
    }
}

/// Sink that keeps every report for later inspection
#[derive(Debug, Default, Clone)]
pub struct CollectSink {
    reports: Rc<RefCell<Vec<ResolutionError>>>,
}

impl CollectSink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every diagnostic reported so far, in order
    #[must_use]
    pub fn reports(&self) -> Vec<ResolutionError> {
        self.reports.borrow().clone()
    }
}

impl DiagnosticSink for CollectSink {
    fn report(&mut self, error: &ResolutionError) {
        self.reports.borrow_mut().push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wr_span::FileId;

    #[test]
    fn test_messages() {
        let error = ResolutionError::UnresolvedQualifier {
            name: "a::b".to_owned(),
            location: Some(Location::new(FileId(0), 4)),
        };
        assert_eq!(error.to_string(), "unresolved identifier qualifier 'a::b'");
        assert_eq!(error.name(), "a::b");
        assert_eq!(error.location(), Some(Location::new(FileId(0), 4)));
    }

    #[test]
    fn test_collect_sink_shares_reports_between_clones() {
        let sink = CollectSink::new();
        let mut reporter = sink.clone();
        reporter.report(&ResolutionError::MalformedBuiltin {
            name: "int7".to_owned(),
            location: None,
        });
        assert_eq!(sink.reports().len(), 1);
    }
}
